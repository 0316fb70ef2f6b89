//! Payment outcome handling.
//!
//! The payment notifier delivers at least once, so `apply` must be
//! idempotent: a reservation leaves `PENDING` exactly once and every later
//! delivery just reports where it ended up.
//!
//! Callers are not authenticated here. Whoever deploys this must restrict
//! the notification channel (shared secret, signed webhook) before it faces
//! anything but the payment provider.

use crate::clock::Clock;
use crate::lifecycle::{LifecycleEvent, Transition};
use crate::store::{apply_event, ReservationStore};
use crate::{PaymentOutcome, ReservationId, ReservationStatus, Result};
use std::sync::Arc;

/// Applies payment outcomes to reservations
#[derive(Clone)]
pub struct ConfirmationHandler {
    store: Arc<dyn ReservationStore>,
    clock: Arc<dyn Clock>,
}

impl ConfirmationHandler {
    pub fn new(store: Arc<dyn ReservationStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Apply a payment outcome and return the resulting status.
    ///
    /// # Errors
    /// - `NotFound` if no reservation has this id
    pub fn apply(
        &self,
        id: &ReservationId,
        outcome: PaymentOutcome,
    ) -> Result<ReservationStatus> {
        tracing::info!(
            "Processing payment outcome {:?} for reservation {}",
            outcome,
            id
        );

        let (_, transition) = apply_event(
            self.store.as_ref(),
            id,
            LifecycleEvent::Payment(outcome),
            self.clock.now(),
        )?;

        match transition {
            Transition::Moved { from, to } => {
                tracing::info!("Reservation {} moved {} -> {}", id, from, to);
            }
            Transition::Unchanged(status) => {
                tracing::info!(
                    "Reservation {} already {}, ignoring repeated payment outcome",
                    id,
                    status
                );
            }
        }

        Ok(transition.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::journal::JournalStore;
    use crate::ledger::tests::{pending, slot_time};
    use crate::store::MemoryStore;
    use crate::Error;
    use std::thread;

    fn handler(store: Arc<MemoryStore>) -> ConfirmationHandler {
        ConfirmationHandler::new(store, Arc::new(FixedClock::at(slot_time())))
    }

    fn seeded() -> (Arc<MemoryStore>, ReservationId) {
        let store = Arc::new(MemoryStore::new());
        let r = pending("U1", "P1", slot_time());
        store.insert_if_available(r.clone()).unwrap();
        (store, r.id)
    }

    #[test]
    fn test_success_confirms() {
        let (store, id) = seeded();
        let status = handler(store.clone())
            .apply(&id, PaymentOutcome::Success)
            .unwrap();

        assert_eq!(status, ReservationStatus::Confirmed);
        assert_eq!(
            store.get(&id).unwrap().unwrap().status,
            ReservationStatus::Confirmed
        );
    }

    #[test]
    fn test_failure_cancels_and_frees_slot() {
        let (store, id) = seeded();
        let status = handler(store.clone())
            .apply(&id, PaymentOutcome::Failure)
            .unwrap();

        assert_eq!(status, ReservationStatus::Cancelled);
        let slot = store.get(&id).unwrap().unwrap().slot();
        assert!(store.find_active_at(&slot).unwrap().is_none());
    }

    #[test]
    fn test_repeated_success_is_idempotent() {
        let (store, id) = seeded();
        let handler = handler(store.clone());

        assert_eq!(
            handler.apply(&id, PaymentOutcome::Success).unwrap(),
            ReservationStatus::Confirmed
        );
        assert_eq!(
            handler.apply(&id, PaymentOutcome::Success).unwrap(),
            ReservationStatus::Confirmed
        );
        assert_eq!(store.transition_count().unwrap(), 1);
    }

    #[test]
    fn test_first_terminal_outcome_wins() {
        let (store, id) = seeded();
        let handler = handler(store.clone());

        handler.apply(&id, PaymentOutcome::Success).unwrap();
        let status = handler.apply(&id, PaymentOutcome::Failure).unwrap();

        assert_eq!(status, ReservationStatus::Confirmed);
        assert_eq!(store.transition_count().unwrap(), 1);
    }

    #[test]
    fn test_cancelled_ignores_success() {
        let (store, id) = seeded();
        let handler = handler(store.clone());

        handler.apply(&id, PaymentOutcome::Failure).unwrap();
        let status = handler.apply(&id, PaymentOutcome::Success).unwrap();
        assert_eq!(status, ReservationStatus::Cancelled);
    }

    #[test]
    fn test_unknown_reservation() {
        let (store, _) = seeded();
        let err = handler(store)
            .apply(&ReservationId::generate(), PaymentOutcome::Success)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_concurrent_deliveries_single_transition() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("reservations.jsonl");
        let store = Arc::new(JournalStore::new(&path));
        let r = pending("U1", "P1", slot_time());
        store.insert_if_available(r.clone()).unwrap();

        let handler =
            ConfirmationHandler::new(store.clone(), Arc::new(FixedClock::at(slot_time())));
        let id = r.id;
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let handler = handler.clone();
                let outcome = if i % 2 == 0 {
                    PaymentOutcome::Success
                } else {
                    PaymentOutcome::Failure
                };
                thread::spawn(move || handler.apply(&id, outcome))
            })
            .collect();

        let statuses: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("Thread panicked").unwrap())
            .collect();

        // Everybody reports the one terminal status that won
        let winner = store.get(&id).unwrap().unwrap().status;
        assert_ne!(winner, ReservationStatus::Pending);
        assert!(statuses.iter().all(|s| *s == winner));
        assert_eq!(store.load().unwrap().transition_count(), 1);
    }
}
