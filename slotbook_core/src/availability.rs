//! Slot availability queries.
//!
//! This is the read-only view. The check that guards an insert runs inside
//! the store's lock (`Ledger::prepare_insert`); answers from here can be
//! stale by the time a caller acts on them.

use crate::store::ReservationStore;
use crate::{ProviderId, Result, SlotIdentity};
use chrono::{DateTime, Utc};

/// Answers whether a slot is currently free
pub struct AvailabilityChecker<'a> {
    store: &'a dyn ReservationStore,
}

impl<'a> AvailabilityChecker<'a> {
    pub fn new(store: &'a dyn ReservationStore) -> Self {
        Self { store }
    }

    /// True iff no pending or confirmed reservation holds the slot
    pub fn is_available(
        &self,
        provider_id: &ProviderId,
        scheduled_at: DateTime<Utc>,
    ) -> Result<bool> {
        let slot = SlotIdentity::new(provider_id.clone(), scheduled_at);
        self.is_slot_available(&slot)
    }

    pub fn is_slot_available(&self, slot: &SlotIdentity) -> Result<bool> {
        let holder = self.store.find_active_at(slot)?;
        if let Some(ref reservation) = holder {
            tracing::debug!("Slot {} held by {} ({})", slot, reservation.id, reservation.status);
        }
        Ok(holder.is_none())
    }
}
