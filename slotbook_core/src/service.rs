//! Reservation service.
//!
//! Orchestrates a reservation attempt: resolve the caller, validate the
//! requested slot, mint a payment reference and hand the new `PENDING`
//! reservation to the store's atomic check-and-insert. Also hosts the
//! patient-facing cancellation and listing operations.

use crate::availability::AvailabilityChecker;
use crate::clock::Clock;
use crate::identity::IdentityProvider;
use crate::lifecycle::{LifecycleEvent, Transition};
use crate::payment::PaymentReferenceIssuer;
use crate::store::{apply_event, ReservationStore};
use crate::{
    Error, ProviderId, Reservation, ReservationId, ReservationListing, ReservationStatus, Result,
    SlotIdentity,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Raw reservation request, as received from a client
#[derive(Clone, Debug, Default)]
pub struct ReserveRequest {
    pub provider_id: Option<String>,
    /// ISO-8601 / RFC 3339 timestamp
    pub scheduled_at: Option<String>,
    pub notes: Option<String>,
}

/// Validate the slot part of a request against the current instant
pub fn parse_slot(request: &ReserveRequest, now: DateTime<Utc>) -> Result<SlotIdentity> {
    let provider_id = request
        .provider_id
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());
    let scheduled_at = request
        .scheduled_at
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let (Some(provider_id), Some(scheduled_at)) = (provider_id, scheduled_at) else {
        return Err(Error::InvalidRequest(
            "providerId and scheduledAt are required".into(),
        ));
    };

    let scheduled_at = parse_instant(scheduled_at)?;
    if scheduled_at < now {
        return Err(Error::InvalidRequest(format!(
            "scheduledAt {} is in the past",
            scheduled_at.to_rfc3339()
        )));
    }

    Ok(SlotIdentity::new(ProviderId::new(provider_id), scheduled_at))
}

/// Parse an RFC 3339 timestamp into an absolute UTC instant
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            Error::InvalidRequest(format!(
                "scheduledAt '{}' is not a valid timestamp: {}",
                value, e
            ))
        })
}

/// Reservation orchestration over injected collaborators
#[derive(Clone)]
pub struct ReservationService {
    store: Arc<dyn ReservationStore>,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    payments: PaymentReferenceIssuer,
}

impl ReservationService {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
        payments: PaymentReferenceIssuer,
    ) -> Self {
        Self {
            store,
            identity,
            clock,
            payments,
        }
    }

    pub fn store(&self) -> &dyn ReservationStore {
        self.store.as_ref()
    }

    pub fn availability(&self) -> AvailabilityChecker<'_> {
        AvailabilityChecker::new(self.store.as_ref())
    }

    /// Reserve a slot for the caller.
    ///
    /// # Errors
    /// - `Unauthenticated` if the credential does not resolve
    /// - `InvalidRequest` for missing/malformed fields or a past slot
    /// - `SlotConflict` if the slot is held when the insert runs
    pub fn reserve(
        &self,
        request: &ReserveRequest,
        credential: Option<&str>,
    ) -> Result<Reservation> {
        let patient_id = self.identity.resolve(credential)?;
        let now = self.clock.now();
        let slot = parse_slot(request, now)?;

        tracing::info!(
            "Creating reservation for patient {} with provider {} at {}",
            patient_id,
            slot.provider_id,
            slot.scheduled_at.to_rfc3339()
        );

        let id = ReservationId::generate();
        let reservation = Reservation {
            id,
            patient_id,
            provider_id: slot.provider_id,
            scheduled_at: slot.scheduled_at,
            status: ReservationStatus::Pending,
            payment_reference: self.payments.issue(id),
            notes: request
                .notes
                .clone()
                .filter(|n| !n.trim().is_empty()),
            created_at: now,
            updated_at: now,
        };

        let reservation = self.store.insert_if_available(reservation)?;
        tracing::info!("Reservation {} created", reservation.id);
        Ok(reservation)
    }

    /// Cancel one of the caller's reservations.
    ///
    /// Reservations owned by someone else are reported as `NotFound`.
    /// Cancelling an already cancelled reservation is a no-op.
    pub fn cancel(&self, id: &ReservationId, credential: Option<&str>) -> Result<Reservation> {
        let patient_id = self.identity.resolve(credential)?;

        let owned = self
            .store
            .get(id)?
            .filter(|r| r.patient_id == patient_id)
            .is_some();
        if !owned {
            return Err(Error::NotFound(format!("reservation {} not found", id)));
        }

        let (reservation, transition) = apply_event(
            self.store.as_ref(),
            id,
            LifecycleEvent::PatientCancellation,
            self.clock.now(),
        )?;

        match transition {
            Transition::Moved {
                from: ReservationStatus::Confirmed,
                ..
            } => {
                // Paid reservation released; no refund is issued from here
                tracing::warn!(
                    "Confirmed reservation {} cancelled by patient {}",
                    id,
                    patient_id
                );
            }
            Transition::Moved { .. } => {
                tracing::info!("Reservation {} cancelled by patient {}", id, patient_id);
            }
            Transition::Unchanged(status) => {
                tracing::debug!("Reservation {} already {}", id, status);
            }
        }

        Ok(reservation)
    }

    /// The caller's reservations, split into upcoming and past
    pub fn list(&self, credential: Option<&str>) -> Result<ReservationListing> {
        let patient_id = self.identity.resolve(credential)?;
        let now = self.clock.now();

        let (upcoming, past): (Vec<Reservation>, Vec<Reservation>) = self
            .store
            .list_for_patient(&patient_id)?
            .into_iter()
            .partition(|r| r.status != ReservationStatus::Cancelled && r.scheduled_at >= now);

        Ok(ReservationListing { upcoming, past })
    }
}
