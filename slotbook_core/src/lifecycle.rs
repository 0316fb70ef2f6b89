//! Reservation lifecycle state machine.
//!
//! `PENDING` is the only initial state. `CONFIRMED` ends the payment flow but
//! still yields to a patient cancellation; `CANCELLED` absorbs everything.
//! No transition ever leads back to `PENDING`.

use crate::{PaymentOutcome, ReservationStatus};

/// Something that may move a reservation forward
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Payment notifier reported an outcome
    Payment(PaymentOutcome),
    /// The patient asked to cancel
    PatientCancellation,
}

/// Result of feeding an event to the state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Moved {
        from: ReservationStatus,
        to: ReservationStatus,
    },
    /// Event ignored, status stays where it is
    Unchanged(ReservationStatus),
}

impl Transition {
    /// Status after the transition
    pub fn status(&self) -> ReservationStatus {
        match self {
            Transition::Moved { to, .. } => *to,
            Transition::Unchanged(status) => *status,
        }
    }
}

impl ReservationStatus {
    /// Whether a reservation in this status blocks its slot
    pub fn occupies_slot(&self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Confirmed)
    }

    /// Apply an event to this status
    pub fn on(self, event: LifecycleEvent) -> Transition {
        use ReservationStatus::*;

        let next = match (self, event) {
            (Pending, LifecycleEvent::Payment(PaymentOutcome::Success)) => Confirmed,
            (Pending, LifecycleEvent::Payment(PaymentOutcome::Failure)) => Cancelled,
            (Pending | Confirmed, LifecycleEvent::PatientCancellation) => Cancelled,
            // Re-delivered payment events and anything after cancellation
            (Confirmed, LifecycleEvent::Payment(_)) | (Cancelled, _) => {
                return Transition::Unchanged(self)
            }
        };

        Transition::Moved {
            from: self,
            to: next,
        }
    }

    /// Whether `self -> next` is an edge of the state machine
    pub fn can_move_to(&self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Cancelled)
        )
    }
}
