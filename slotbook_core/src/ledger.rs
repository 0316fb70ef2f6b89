//! In-memory view of the reservation journal.
//!
//! The journal is a sequence of `JournalRecord`s. A `Ledger` is what you get
//! by replaying them: current reservations plus the count of status
//! transitions. Stores validate every mutation against a ledger while holding
//! their lock, then persist the resulting record.

use crate::{
    Error, PatientId, Reservation, ReservationId, ReservationStatus, Result, SlotIdentity,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One line of the journal
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JournalRecord {
    Created {
        reservation: Reservation,
    },
    StatusChanged {
        id: ReservationId,
        from: ReservationStatus,
        to: ReservationStatus,
        at: DateTime<Utc>,
    },
}

/// Result of a conditional status update
#[derive(Clone, Debug, PartialEq)]
pub enum StatusUpdate {
    /// Status matched the expectation and was changed
    Applied(Reservation),
    /// Status no longer matched; nothing was written
    Stale(Reservation),
}

/// Replayed journal state
#[derive(Clone, Debug, Default)]
pub struct Ledger {
    reservations: HashMap<ReservationId, Reservation>,
    transitions: usize,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from journal records in append order
    pub fn replay<'a>(records: impl IntoIterator<Item = &'a JournalRecord>) -> Self {
        let mut ledger = Self::new();
        for record in records {
            ledger.apply(record);
        }
        ledger
    }

    /// Fold one record into the ledger.
    ///
    /// Records that contradict the current state (duplicate ids, transitions
    /// from a status the reservation is not in) are skipped with a warning.
    pub fn apply(&mut self, record: &JournalRecord) {
        match record {
            JournalRecord::Created { reservation } => {
                if self.reservations.contains_key(&reservation.id) {
                    tracing::warn!("Ignoring duplicate reservation {} in journal", reservation.id);
                    return;
                }
                self.reservations
                    .insert(reservation.id, reservation.clone());
            }
            JournalRecord::StatusChanged { id, from, to, at } => {
                let Some(reservation) = self.reservations.get_mut(id) else {
                    tracing::warn!("Ignoring status change for unknown reservation {}", id);
                    return;
                };
                if reservation.status != *from || !from.can_move_to(*to) {
                    tracing::warn!(
                        "Ignoring status change {} -> {} for reservation {} (currently {})",
                        from,
                        to,
                        id,
                        reservation.status
                    );
                    return;
                }
                reservation.status = *to;
                reservation.updated_at = *at;
                self.transitions += 1;
            }
        }
    }

    pub fn get(&self, id: &ReservationId) -> Option<&Reservation> {
        self.reservations.get(id)
    }

    /// The reservation currently holding `slot`, if any
    pub fn active_at(&self, slot: &SlotIdentity) -> Option<&Reservation> {
        self.reservations
            .values()
            .find(|r| r.is_at(slot) && r.status.occupies_slot())
    }

    /// True iff no pending or confirmed reservation sits on `slot`
    pub fn is_available(&self, slot: &SlotIdentity) -> bool {
        self.active_at(slot).is_none()
    }

    /// All of a patient's reservations, latest slot first
    pub fn for_patient(&self, patient: &PatientId) -> Vec<Reservation> {
        let mut found: Vec<Reservation> = self
            .reservations
            .values()
            .filter(|r| &r.patient_id == patient)
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            b.scheduled_at
                .cmp(&a.scheduled_at)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        found
    }

    /// Every reservation, ordered by creation time
    pub fn all(&self) -> Vec<Reservation> {
        let mut all: Vec<Reservation> = self.reservations.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    pub fn len(&self) -> usize {
        self.reservations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty()
    }

    /// Number of status transitions applied so far
    pub fn transition_count(&self) -> usize {
        self.transitions
    }

    /// Check that `reservation` may be inserted and produce its record.
    ///
    /// This is the availability check of the atomic check-and-insert; the
    /// caller must hold the store's write lock across this call and the
    /// subsequent persist.
    pub fn prepare_insert(&self, reservation: &Reservation) -> Result<JournalRecord> {
        if reservation.status != ReservationStatus::Pending {
            return Err(Error::InvalidRequest(format!(
                "new reservations must be PENDING, got {}",
                reservation.status
            )));
        }
        if self.reservations.contains_key(&reservation.id) {
            return Err(Error::InvalidRequest(format!(
                "reservation {} already exists",
                reservation.id
            )));
        }

        let slot = reservation.slot();
        if let Some(holder) = self.active_at(&slot) {
            tracing::warn!(
                "Slot {} already held by reservation {} ({})",
                slot,
                holder.id,
                holder.status
            );
            return Err(Error::SlotConflict(
                "This time slot is no longer available".into(),
            ));
        }

        Ok(JournalRecord::Created {
            reservation: reservation.clone(),
        })
    }

    /// Check a compare-and-set of `id` from `expected` to `next`.
    ///
    /// Returns the record to persist, or `None` with the current reservation
    /// when the status has already moved on.
    pub fn prepare_status_change(
        &self,
        id: &ReservationId,
        expected: ReservationStatus,
        next: ReservationStatus,
        at: DateTime<Utc>,
    ) -> Result<(Option<JournalRecord>, Reservation)> {
        let current = self
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("reservation {} not found", id)))?;

        if current.status != expected {
            return Ok((None, current.clone()));
        }
        if !expected.can_move_to(next) {
            return Err(Error::InvalidRequest(format!(
                "illegal transition {} -> {}",
                expected, next
            )));
        }

        let mut updated = current.clone();
        updated.status = next;
        updated.updated_at = at;

        Ok((
            Some(JournalRecord::StatusChanged {
                id: *id,
                from: expected,
                to: next,
                at,
            }),
            updated,
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ProviderId;
    use chrono::TimeZone;

    pub(crate) fn slot_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    pub(crate) fn pending(patient: &str, provider: &str, at: DateTime<Utc>) -> Reservation {
        let id = ReservationId::generate();
        let created = Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap();
        Reservation {
            id,
            patient_id: PatientId::new(patient),
            provider_id: ProviderId::new(provider),
            scheduled_at: at,
            status: ReservationStatus::Pending,
            payment_reference: format!("https://pay.example/{}/token", id),
            notes: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_insert_then_conflict() {
        let mut ledger = Ledger::new();
        let first = pending("U1", "P1", slot_time());
        let record = ledger.prepare_insert(&first).unwrap();
        ledger.apply(&record);

        let second = pending("U2", "P1", slot_time());
        let err = ledger.prepare_insert(&second).unwrap_err();
        assert!(matches!(err, Error::SlotConflict(_)));
        assert!(!ledger.is_available(&first.slot()));
    }

    #[test]
    fn test_same_time_different_provider_is_free() {
        let mut ledger = Ledger::new();
        let first = pending("U1", "P1", slot_time());
        ledger.apply(&ledger.prepare_insert(&first).unwrap());

        let other = pending("U2", "P2", slot_time());
        assert!(ledger.prepare_insert(&other).is_ok());
    }

    #[test]
    fn test_cancelled_frees_slot() {
        let mut ledger = Ledger::new();
        let first = pending("U1", "P1", slot_time());
        ledger.apply(&ledger.prepare_insert(&first).unwrap());

        let (record, updated) = ledger
            .prepare_status_change(
                &first.id,
                ReservationStatus::Pending,
                ReservationStatus::Cancelled,
                slot_time(),
            )
            .unwrap();
        ledger.apply(&record.unwrap());
        assert_eq!(updated.status, ReservationStatus::Cancelled);

        assert!(ledger.is_available(&first.slot()));
        assert!(ledger.prepare_insert(&pending("U2", "P1", slot_time())).is_ok());
    }

    #[test]
    fn test_stale_status_change_writes_nothing() {
        let mut ledger = Ledger::new();
        let r = pending("U1", "P1", slot_time());
        ledger.apply(&ledger.prepare_insert(&r).unwrap());
        let (record, _) = ledger
            .prepare_status_change(
                &r.id,
                ReservationStatus::Pending,
                ReservationStatus::Confirmed,
                slot_time(),
            )
            .unwrap();
        ledger.apply(&record.unwrap());

        let (record, current) = ledger
            .prepare_status_change(
                &r.id,
                ReservationStatus::Pending,
                ReservationStatus::Cancelled,
                slot_time(),
            )
            .unwrap();
        assert!(record.is_none());
        assert_eq!(current.status, ReservationStatus::Confirmed);
        assert_eq!(ledger.transition_count(), 1);
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let ledger = Ledger::new();
        let err = ledger
            .prepare_status_change(
                &ReservationId::generate(),
                ReservationStatus::Pending,
                ReservationStatus::Confirmed,
                slot_time(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_replay_skips_contradicting_records() {
        let r = pending("U1", "P1", slot_time());
        let records = vec![
            JournalRecord::Created {
                reservation: r.clone(),
            },
            JournalRecord::StatusChanged {
                id: r.id,
                from: ReservationStatus::Pending,
                to: ReservationStatus::Confirmed,
                at: slot_time(),
            },
            // Stale duplicate delivery that lost the race
            JournalRecord::StatusChanged {
                id: r.id,
                from: ReservationStatus::Pending,
                to: ReservationStatus::Cancelled,
                at: slot_time(),
            },
            JournalRecord::Created {
                reservation: r.clone(),
            },
        ];

        let ledger = Ledger::replay(&records);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get(&r.id).unwrap().status, ReservationStatus::Confirmed);
        assert_eq!(ledger.transition_count(), 1);
    }

    #[test]
    fn test_for_patient_sorted_latest_first() {
        let mut ledger = Ledger::new();
        let early = pending("U1", "P1", slot_time());
        let late = pending("U1", "P1", slot_time() + chrono::Duration::days(1));
        let other = pending("U2", "P2", slot_time());
        for r in [&early, &late, &other] {
            ledger.apply(&ledger.prepare_insert(r).unwrap());
        }

        let mine = ledger.for_patient(&PatientId::new("U1"));
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].id, late.id);
        assert_eq!(mine[1].id, early.id);
    }

    #[test]
    fn test_journal_record_format() {
        let r = pending("U1", "P1", slot_time());
        let line = serde_json::to_string(&JournalRecord::StatusChanged {
            id: r.id,
            from: ReservationStatus::Pending,
            to: ReservationStatus::Confirmed,
            at: slot_time(),
        })
        .unwrap();
        assert!(line.contains("\"type\":\"status_changed\""));
        assert!(line.contains("\"to\":\"CONFIRMED\""));
    }
}
