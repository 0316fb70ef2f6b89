//! Error types for the slotbook_core library.

use serde::Serialize;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for slotbook_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller credential missing or not recognised
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Missing or malformed request fields
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Slot already held by a pending or confirmed reservation
    #[error("Slot conflict: {0}")]
    SlotConflict(String),

    /// No reservation with the given id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persistence layer could not be reached or used
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Caller-facing error taxonomy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Unauthenticated,
    InvalidRequest,
    SlotConflict,
    NotFound,
    StoreUnavailable,
}

impl ErrorKind {
    /// HTTP-style status code for this kind
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::InvalidRequest => 400,
            ErrorKind::Unauthenticated => 401,
            ErrorKind::NotFound => 404,
            ErrorKind::SlotConflict => 409,
            ErrorKind::StoreUnavailable => 503,
        }
    }
}

impl Error {
    /// Collapse this error into the caller-facing taxonomy.
    ///
    /// Infrastructure failures all surface as `StoreUnavailable`; only
    /// that kind is worth retrying.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Error::SlotConflict(_) => ErrorKind::SlotConflict,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::StoreUnavailable(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Csv(_)
            | Error::Toml(_)
            | Error::Config(_) => ErrorKind::StoreUnavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infrastructure_errors_are_store_unavailable() {
        let io = Error::from(io::Error::new(io::ErrorKind::Other, "disk gone"));
        assert_eq!(io.kind(), ErrorKind::StoreUnavailable);
        assert_eq!(io.kind().http_status(), 503);
    }

    #[test]
    fn test_domain_error_status_codes() {
        assert_eq!(Error::InvalidRequest("x".into()).kind().http_status(), 400);
        assert_eq!(Error::Unauthenticated("x".into()).kind().http_status(), 401);
        assert_eq!(Error::NotFound("x".into()).kind().http_status(), 404);
        assert_eq!(Error::SlotConflict("x".into()).kind().http_status(), 409);
    }
}
