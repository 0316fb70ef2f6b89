//! Configuration file support for Slotbook.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/slotbook/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub payment: PaymentConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl DataConfig {
    /// Path of the reservation journal under a data directory
    pub fn journal_path(data_dir: &Path) -> PathBuf {
        data_dir.join("journal").join("reservations.jsonl")
    }
}

/// Payment flow configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Base URL the payment reference is built on
    #[serde(default = "default_payment_base_url")]
    pub base_url: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            base_url: default_payment_base_url(),
        }
    }
}

/// Bearer credentials accepted by the static identity provider
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Bearer token -> patient id
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(std::env::temp_dir);
    base.join("slotbook")
}

fn default_payment_base_url() -> String {
    "https://mock-payment-gateway.com/pay".into()
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        match Self::default_config_path() {
            Some(config_path) if config_path.exists() => Self::load_from(&config_path),
            config_path => {
                tracing::info!(
                    "No config file found at {:?}, using defaults",
                    config_path
                );
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|base| base.join("slotbook").join("config.toml"))
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let base = self.payment.base_url.trim();
        if !(base.starts_with("https://") || base.starts_with("http://")) {
            return Err(Error::Config(format!(
                "payment.base_url must be an http(s) URL, got '{}'",
                self.payment.base_url
            )));
        }

        if let Some((token, _)) = self
            .auth
            .tokens
            .iter()
            .find(|(token, patient)| token.trim().is_empty() || patient.trim().is_empty())
        {
            return Err(Error::Config(format!(
                "auth.tokens contains an empty token or patient id (token '{}')",
                token
            )));
        }

        Ok(())
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(
            config.payment.base_url,
            "https://mock-payment-gateway.com/pay"
        );
        assert!(config.auth.tokens.is_empty());
        assert!(config.data.data_dir.ends_with("slotbook"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[auth.tokens]
"token-u1" = "U1"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.auth.tokens.get("token-u1"), Some(&"U1".to_string()));
        assert_eq!(
            config.payment.base_url,
            "https://mock-payment-gateway.com/pay"
        ); // default
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.data.data_dir = temp_dir.path().join("data");
        config
            .auth
            .tokens
            .insert("secret".into(), "patient-7".into());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.data.data_dir, temp_dir.path().join("data"));
        assert_eq!(
            loaded.auth.tokens.get("secret"),
            Some(&"patient-7".to_string())
        );
    }

    #[test]
    fn test_rejects_non_http_payment_url() {
        let toml_str = r#"
[payment]
base_url = "ftp://pay.example"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_empty_patient_id() {
        let mut config = Config::default();
        config.auth.tokens.insert("tok".into(), "  ".into());
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_journal_path_layout() {
        let path = DataConfig::journal_path(Path::new("/var/lib/slotbook"));
        assert_eq!(
            path,
            PathBuf::from("/var/lib/slotbook/journal/reservations.jsonl")
        );
    }
}
