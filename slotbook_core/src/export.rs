//! CSV audit export of reservations.
//!
//! The export is written to a temp file next to the target and renamed into
//! place, so readers never see a half-written CSV.

use crate::{Error, Reservation, Result};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    patient_id: String,
    provider_id: String,
    scheduled_at: String,
    status: String,
    payment_reference: String,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<&Reservation> for CsvRow {
    fn from(r: &Reservation) -> Self {
        CsvRow {
            id: r.id.to_string(),
            patient_id: r.patient_id.to_string(),
            provider_id: r.provider_id.to_string(),
            scheduled_at: r.scheduled_at.to_rfc3339(),
            status: r.status.as_str().to_string(),
            payment_reference: r.payment_reference.clone(),
            notes: r.notes.clone(),
            created_at: r.created_at.to_rfc3339(),
            updated_at: r.updated_at.to_rfc3339(),
        }
    }
}

/// Default export location under the data directory
pub fn default_export_path(data_dir: &Path) -> PathBuf {
    data_dir.join("exports").join("reservations.csv")
}

/// Write `reservations` to `csv_path`, replacing any previous export.
///
/// Returns the number of rows written. An empty slice still produces a
/// header-only file.
pub fn export_csv(reservations: &[Reservation], csv_path: &Path) -> Result<usize> {
    let parent = csv_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(temp.as_file());

        // Written explicitly so an empty export still has headers
        writer.write_record([
            "id",
            "patient_id",
            "provider_id",
            "scheduled_at",
            "status",
            "payment_reference",
            "notes",
            "created_at",
            "updated_at",
        ])?;
        for reservation in reservations {
            writer.serialize(CsvRow::from(reservation))?;
        }
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(csv_path).map_err(|e| Error::Io(e.error))?;

    tracing::info!(
        "Exported {} reservations to {:?}",
        reservations.len(),
        csv_path
    );
    Ok(reservations.len())
}
