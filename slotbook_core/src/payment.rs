//! Payment reference generation.
//!
//! No gateway is integrated. A reference is a URL on the configured payment
//! host that embeds the reservation id and a random token, so the payment
//! front-end can route back to the reservation and the URL cannot be guessed.

use crate::config::PaymentConfig;
use crate::ReservationId;
use uuid::Uuid;

/// Builds payment references for new reservations
#[derive(Clone, Debug)]
pub struct PaymentReferenceIssuer {
    base_url: String,
}

impl PaymentReferenceIssuer {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(payment: &PaymentConfig) -> Self {
        Self::new(payment.base_url.as_str())
    }

    /// Fresh reference for `id`: `{base}/{id}/{32 hex chars}`
    pub fn issue(&self, id: ReservationId) -> String {
        let token = Uuid::new_v4().simple();
        format!("{}/{}/{}", self.base_url, id, token)
    }
}

impl Default for PaymentReferenceIssuer {
    fn default() -> Self {
        Self::from_config(&PaymentConfig::default())
    }
}
