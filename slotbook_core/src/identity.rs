//! Caller identity resolution.
//!
//! The real session provider lives outside this crate. `IdentityProvider` is
//! the seam; `StaticTokenProvider` resolves bearer tokens listed in config.

use crate::config::AuthConfig;
use crate::{Error, PatientId, Result};
use std::collections::HashMap;

/// Resolves a bearer credential to an authenticated patient
pub trait IdentityProvider: Send + Sync {
    /// `credential` is the raw header value, with or without a `Bearer ` prefix
    fn resolve(&self, credential: Option<&str>) -> Result<PatientId>;
}

/// Strip an optional `Bearer ` scheme and surrounding whitespace
pub fn bearer_token(credential: &str) -> &str {
    let trimmed = credential.trim();
    trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))
        .unwrap_or(trimmed)
        .trim()
}

/// Fixed token table, loaded from `[auth.tokens]`
#[derive(Clone, Debug, Default)]
pub struct StaticTokenProvider {
    tokens: HashMap<String, PatientId>,
}

impl StaticTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(auth: &AuthConfig) -> Self {
        let tokens = auth
            .tokens
            .iter()
            .map(|(token, patient)| (token.trim().to_string(), PatientId::new(patient.trim())))
            .collect();
        Self { tokens }
    }

    /// Register a token for a patient
    pub fn with_token(mut self, token: impl Into<String>, patient: PatientId) -> Self {
        self.tokens.insert(token.into(), patient);
        self
    }
}

impl IdentityProvider for StaticTokenProvider {
    fn resolve(&self, credential: Option<&str>) -> Result<PatientId> {
        let credential = credential
            .ok_or_else(|| Error::Unauthenticated("Authorization required".into()))?;

        let token = bearer_token(credential);
        if token.is_empty() {
            return Err(Error::Unauthenticated("Authorization required".into()));
        }

        match self.tokens.get(token) {
            Some(patient) => Ok(patient.clone()),
            None => {
                tracing::debug!("Rejected unknown bearer token");
                Err(Error::Unauthenticated("Invalid authorization".into()))
            }
        }
    }
}
