//! Core domain types for the Slotbook reservation engine.
//!
//! This module defines the fundamental types used throughout the system:
//! - Party identifiers (patients, providers) and reservation ids
//! - Slot identity
//! - Reservation records and their lifecycle status
//! - Payment outcomes delivered by the payment notifier

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of the provider who offers the slot
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an authenticated patient, as issued by the identity provider
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PatientId(String);

impl PatientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reservation identifier, generated at creation
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ReservationId(Uuid);

impl ReservationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl FromStr for ReservationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// Slot Identity
// ============================================================================

/// A bookable unit of time: one provider at one absolute instant.
///
/// Equality is exact on both fields. No rounding to a slot grid happens here;
/// which start times are offerable is the caller's policy.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SlotIdentity {
    pub provider_id: ProviderId,
    pub scheduled_at: DateTime<Utc>,
}

impl SlotIdentity {
    pub fn new(provider_id: ProviderId, scheduled_at: DateTime<Utc>) -> Self {
        Self {
            provider_id,
            scheduled_at,
        }
    }
}

impl fmt::Display for SlotIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.provider_id, self.scheduled_at.to_rfc3339())
    }
}

// ============================================================================
// Status and Outcomes
// ============================================================================

/// Lifecycle status of a reservation
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome reported by the payment notifier
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Success,
    Failure,
}

impl FromStr for PaymentOutcome {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "success" => Ok(PaymentOutcome::Success),
            "failure" => Ok(PaymentOutcome::Failure),
            other => Err(format!(
                "unknown payment outcome '{}', expected 'success' or 'failure'",
                other
            )),
        }
    }
}

// ============================================================================
// Reservation
// ============================================================================

/// A record claiming a slot.
///
/// Everything except `status` and `updated_at` is fixed at creation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Reservation {
    pub id: ReservationId,
    pub patient_id: PatientId,
    pub provider_id: ProviderId,
    pub scheduled_at: DateTime<Utc>,
    pub status: ReservationStatus,
    pub payment_reference: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// The slot this reservation claims
    pub fn slot(&self) -> SlotIdentity {
        SlotIdentity::new(self.provider_id.clone(), self.scheduled_at)
    }

    /// True if this reservation sits on the given slot
    pub fn is_at(&self, slot: &SlotIdentity) -> bool {
        self.provider_id == slot.provider_id && self.scheduled_at == slot.scheduled_at
    }
}

/// A patient's reservations, split the way the bookings page shows them
#[derive(Clone, Debug, Default)]
pub struct ReservationListing {
    /// Not cancelled and not yet started, latest first
    pub upcoming: Vec<Reservation>,
    /// Cancelled or already in the past, latest first
    pub past: Vec<Reservation>,
}
