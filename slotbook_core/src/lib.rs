#![forbid(unsafe_code)]

//! Core of the slotbook reservation engine.
//!
//! This crate provides:
//! - Domain types (slots, reservations, statuses)
//! - The reservation lifecycle state machine
//! - Persistence (JSONL journal under a file lock, in-memory store)
//! - Reservation, cancellation and payment-confirmation services
//! - JSON endpoints and CSV audit export

pub mod types;
pub mod error;
pub mod lifecycle;
pub mod clock;
pub mod config;
pub mod logging;
pub mod identity;
pub mod payment;
pub mod ledger;
pub mod store;
pub mod journal;
pub mod availability;
pub mod service;
pub mod confirmation;
pub mod api;
pub mod export;

// Re-export commonly used types
pub use error::{Error, ErrorKind, Result};
pub use types::*;
pub use api::{ApiResponse, Endpoints};
pub use availability::AvailabilityChecker;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use confirmation::ConfirmationHandler;
pub use export::export_csv;
pub use identity::{IdentityProvider, StaticTokenProvider};
pub use journal::JournalStore;
pub use payment::PaymentReferenceIssuer;
pub use service::{ReservationService, ReserveRequest};
pub use store::{MemoryStore, ReservationStore};
