//! Journal-backed reservation store.
//!
//! Reservations are kept in a JSONL (JSON Lines) file of `JournalRecord`s.
//! Every write opens the journal, takes an exclusive lock, replays it,
//! validates the change, appends one line and syncs before unlocking. The
//! lock serializes writers across processes, which makes check-and-insert
//! and compare-and-set atomic.

use crate::ledger::{JournalRecord, Ledger, StatusUpdate};
use crate::store::ReservationStore;
use crate::{
    Error, PatientId, Reservation, ReservationId, ReservationStatus, Result, SlotIdentity,
};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// File-locked JSONL reservation store
#[derive(Clone, Debug)]
pub struct JournalStore {
    path: PathBuf,
}

/// Journal contents as read under a lock
struct Snapshot {
    ledger: Ledger,
    /// File is non-empty and does not end in a newline (torn last write)
    needs_newline: bool,
}

impl JournalStore {
    /// Create a journal store for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::StoreUnavailable(format!("cannot create {:?}: {}", parent, e))
            })?;
        }
        Ok(())
    }

    /// Open the journal for read+append and take the exclusive lock
    fn open_exclusive(&self) -> Result<File> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                Error::StoreUnavailable(format!("cannot open journal {:?}: {}", self.path, e))
            })?;

        file.lock_exclusive().map_err(|e| {
            Error::StoreUnavailable(format!("cannot lock journal {:?}: {}", self.path, e))
        })?;

        Ok(file)
    }

    /// Run `f` against the replayed journal while holding the exclusive lock.
    ///
    /// If `f` returns a record it is appended before the lock is released.
    fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Ledger) -> Result<(Option<JournalRecord>, T)>,
    {
        let file = self.open_exclusive()?;

        // Lock is released on every path, including errors
        let result = (|| -> Result<T> {
            let snapshot = read_snapshot(&file)?;
            let (record, value) = f(&snapshot.ledger)?;
            if let Some(record) = record {
                append_or_rollback(&file, |file| {
                    append_record(file, &record, snapshot.needs_newline)
                })?;
            }
            Ok(value)
        })();

        file.unlock()?;
        result
    }

    /// Replay the journal under a shared lock
    pub fn load(&self) -> Result<Ledger> {
        if !self.path.exists() {
            return Ok(Ledger::new());
        }

        let file = File::open(&self.path).map_err(|e| {
            Error::StoreUnavailable(format!("cannot open journal {:?}: {}", self.path, e))
        })?;

        // Acquire shared lock for reading
        file.lock_shared().map_err(|e| {
            Error::StoreUnavailable(format!("cannot lock journal {:?}: {}", self.path, e))
        })?;

        let snapshot = read_snapshot(&file);
        file.unlock()?;
        Ok(snapshot?.ledger)
    }
}

/// Read and replay every record in the journal.
///
/// Unparseable lines are logged and skipped, so a torn final line left by a
/// crash does not take the store down.
fn read_snapshot(mut file: &File) -> Result<Snapshot> {
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    let contents = String::from_utf8_lossy(&bytes);
    let mut ledger = Ledger::new();
    let mut count = 0;

    for (line_num, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<JournalRecord>(line) {
            Ok(record) => {
                ledger.apply(&record);
                count += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to parse journal record at line {}: {}", line_num + 1, e);
                // Continue reading, don't fail completely
            }
        }
    }

    tracing::debug!("Replayed {} journal records", count);
    Ok(Snapshot {
        ledger,
        needs_newline: !bytes.is_empty() && !bytes.ends_with(b"\n"),
    })
}

/// Run `write` against the locked journal, truncating it back to its prior
/// length if `write` fails.
///
/// An error from here means nothing was committed: a line that reached the
/// file but failed to sync is cut off again before the lock is released.
fn append_or_rollback<W>(file: &File, write: W) -> Result<()>
where
    W: FnOnce(&File) -> Result<()>,
{
    let prev_len = file.metadata()?.len();

    write(file).map_err(|err| {
        match file.set_len(prev_len).and_then(|_| file.sync_all()) {
            Ok(()) => tracing::warn!("Rolled back failed journal append: {}", err),
            Err(e) => tracing::error!(
                "Failed to roll back journal to {} bytes after {}: {}",
                prev_len,
                err,
                e
            ),
        }
        err
    })
}

/// Append one record as a JSON line and sync it to disk
fn append_record(file: &File, record: &JournalRecord, needs_newline: bool) -> Result<()> {
    let mut writer = BufWriter::new(file);
    if needs_newline {
        // Terminate a torn line so the new record stays parseable
        writer.write_all(b"\n")?;
    }
    let line = serde_json::to_string(record)?;
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    drop(writer);

    file.sync_all()?;
    Ok(())
}

impl ReservationStore for JournalStore {
    fn insert_if_available(&self, reservation: Reservation) -> Result<Reservation> {
        self.mutate(|ledger| {
            let record = ledger.prepare_insert(&reservation)?;
            Ok((Some(record), ()))
        })?;

        tracing::debug!("Appended reservation {} to journal", reservation.id);
        Ok(reservation)
    }

    fn update_status(
        &self,
        id: &ReservationId,
        expected: ReservationStatus,
        next: ReservationStatus,
        at: DateTime<Utc>,
    ) -> Result<StatusUpdate> {
        self.mutate(|ledger| {
            let (record, reservation) = ledger.prepare_status_change(id, expected, next, at)?;
            let update = if record.is_some() {
                StatusUpdate::Applied(reservation)
            } else {
                StatusUpdate::Stale(reservation)
            };
            Ok((record, update))
        })
    }

    fn get(&self, id: &ReservationId) -> Result<Option<Reservation>> {
        Ok(self.load()?.get(id).cloned())
    }

    fn find_active_at(&self, slot: &SlotIdentity) -> Result<Option<Reservation>> {
        Ok(self.load()?.active_at(slot).cloned())
    }

    fn list_for_patient(&self, patient: &PatientId) -> Result<Vec<Reservation>> {
        Ok(self.load()?.for_patient(patient))
    }

    fn all(&self) -> Result<Vec<Reservation>> {
        Ok(self.load()?.all())
    }
}
