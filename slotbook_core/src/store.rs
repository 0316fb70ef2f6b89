//! Reservation persistence.
//!
//! `ReservationStore` is the seam to the durable store. Implementations must
//! make `insert_if_available` and `update_status` atomic: the availability
//! check and the insert for one slot, and the status read and write for one
//! reservation, may not interleave with any other mutation.

use crate::ledger::{Ledger, StatusUpdate};
use crate::lifecycle::{LifecycleEvent, Transition};
use crate::{
    Error, PatientId, Reservation, ReservationId, ReservationStatus, Result, SlotIdentity,
};
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};

/// Durable reservation records with conflict-checked writes
pub trait ReservationStore: Send + Sync {
    /// Insert a `PENDING` reservation unless its slot is held.
    ///
    /// Fails with `SlotConflict` if a pending or confirmed reservation
    /// already sits on the same slot.
    fn insert_if_available(&self, reservation: Reservation) -> Result<Reservation>;

    /// Compare-and-set the status of `id` from `expected` to `next`.
    ///
    /// Fails with `NotFound` for unknown ids.
    fn update_status(
        &self,
        id: &ReservationId,
        expected: ReservationStatus,
        next: ReservationStatus,
        at: DateTime<Utc>,
    ) -> Result<StatusUpdate>;

    fn get(&self, id: &ReservationId) -> Result<Option<Reservation>>;

    /// The pending or confirmed reservation on `slot`, if any
    fn find_active_at(&self, slot: &SlotIdentity) -> Result<Option<Reservation>>;

    /// A patient's reservations, latest slot first
    fn list_for_patient(&self, patient: &PatientId) -> Result<Vec<Reservation>>;

    /// Every reservation, ordered by creation time
    fn all(&self) -> Result<Vec<Reservation>>;
}

/// Drive reservation `id` through `event` with compare-and-set retries.
///
/// Returns the reservation as stored afterwards and the transition this call
/// performed. A concurrent writer that got there first shows up as
/// `Transition::Unchanged`. Statuses only move forward, so the loop ends
/// after at most as many rounds as there are states.
pub fn apply_event(
    store: &dyn ReservationStore,
    id: &ReservationId,
    event: LifecycleEvent,
    at: DateTime<Utc>,
) -> Result<(Reservation, Transition)> {
    let mut current = store
        .get(id)?
        .ok_or_else(|| Error::NotFound(format!("reservation {} not found", id)))?;

    loop {
        match current.status.on(event) {
            Transition::Unchanged(status) => {
                return Ok((current, Transition::Unchanged(status)));
            }
            Transition::Moved { from, to } => match store.update_status(id, from, to, at)? {
                StatusUpdate::Applied(updated) => {
                    return Ok((updated, Transition::Moved { from, to }));
                }
                StatusUpdate::Stale(latest) => {
                    tracing::debug!(
                        "Reservation {} moved to {} concurrently, re-evaluating",
                        id,
                        latest.status
                    );
                    current = latest;
                }
            },
        }
    }
}

/// Process-local store guarded by a mutex
#[derive(Debug, Default)]
pub struct MemoryStore {
    ledger: Mutex<Ledger>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ledger(&self) -> Result<MutexGuard<'_, Ledger>> {
        self.ledger
            .lock()
            .map_err(|_| Error::StoreUnavailable("memory store lock poisoned".into()))
    }

    /// Number of status transitions recorded
    pub fn transition_count(&self) -> Result<usize> {
        Ok(self.ledger()?.transition_count())
    }
}

impl ReservationStore for MemoryStore {
    fn insert_if_available(&self, reservation: Reservation) -> Result<Reservation> {
        let mut ledger = self.ledger()?;
        let record = ledger.prepare_insert(&reservation)?;
        ledger.apply(&record);
        Ok(reservation)
    }

    fn update_status(
        &self,
        id: &ReservationId,
        expected: ReservationStatus,
        next: ReservationStatus,
        at: DateTime<Utc>,
    ) -> Result<StatusUpdate> {
        let mut ledger = self.ledger()?;
        let (record, reservation) = ledger.prepare_status_change(id, expected, next, at)?;
        match record {
            Some(record) => {
                ledger.apply(&record);
                Ok(StatusUpdate::Applied(reservation))
            }
            None => Ok(StatusUpdate::Stale(reservation)),
        }
    }

    fn get(&self, id: &ReservationId) -> Result<Option<Reservation>> {
        Ok(self.ledger()?.get(id).cloned())
    }

    fn find_active_at(&self, slot: &SlotIdentity) -> Result<Option<Reservation>> {
        Ok(self.ledger()?.active_at(slot).cloned())
    }

    fn list_for_patient(&self, patient: &PatientId) -> Result<Vec<Reservation>> {
        Ok(self.ledger()?.for_patient(patient))
    }

    fn all(&self) -> Result<Vec<Reservation>> {
        Ok(self.ledger()?.all())
    }
}
