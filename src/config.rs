//! Configuration management for the election engine
//!
//! Loads sensitive configuration from environment variables with validation.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Security configuration for credential handling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// System-wide credential pepper (base64 encoded, minimum 32 bytes)
    pub credential_pepper: String,

    /// Out-of-band PIN required for admin logins
    pub admin_pin: String,
}

impl SecurityConfig {
    /// Load security configuration from environment variables
    ///
    /// Requires `BALLOT_CREDENTIAL_PEPPER` and `BALLOT_ADMIN_PIN`.
    pub fn from_env() -> Result<Self> {
        let credential_pepper = std::env::var("BALLOT_CREDENTIAL_PEPPER").map_err(|_| {
            Error::config("BALLOT_CREDENTIAL_PEPPER environment variable required")
        })?;
        Self::validate_pepper(&credential_pepper)?;

        let admin_pin = std::env::var("BALLOT_ADMIN_PIN")
            .map_err(|_| Error::config("BALLOT_ADMIN_PIN environment variable required"))?;
        if admin_pin.is_empty() {
            return Err(Error::config("BALLOT_ADMIN_PIN must not be empty"));
        }

        Ok(Self {
            credential_pepper,
            admin_pin,
        })
    }

    /// Create configuration for testing with a random pepper
    pub fn for_testing() -> Self {
        use base64::Engine;
        let pepper =
            base64::engine::general_purpose::STANDARD.encode(rand::random::<[u8; 32]>());
        Self {
            credential_pepper: pepper,
            admin_pin: "4242".to_string(),
        }
    }

    /// Validate a base64-encoded pepper
    fn validate_pepper(pepper: &str) -> Result<()> {
        use base64::Engine;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(pepper)
            .map_err(|_| Error::config("BALLOT_CREDENTIAL_PEPPER must be valid base64"))?;
        if decoded.len() < 32 {
            return Err(Error::config(
                "BALLOT_CREDENTIAL_PEPPER must be at least 32 bytes when decoded",
            ));
        }
        Ok(())
    }
}

/// Where snapshots and the audit log live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Snapshot directory (one file per resource)
    pub data_dir: PathBuf,

    /// Append-only audit log file
    pub audit_log: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let security = SecurityConfig::from_env()?;

        let storage = StorageConfig {
            data_dir: std::env::var("BALLOT_DATA_DIR")
                .unwrap_or_else(|_| "data".to_string())
                .into(),
            audit_log: std::env::var("BALLOT_AUDIT_LOG")
                .unwrap_or_else(|_| "audit.log".to_string())
                .into(),
        };

        let logging = LoggingConfig {
            level: std::env::var("BALLOT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: std::env::var("BALLOT_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
        };

        Ok(Self {
            storage,
            security,
            logging,
        })
    }

    /// Create configuration for testing
    pub fn for_testing() -> Self {
        let tag = std::process::id();
        Self {
            storage: StorageConfig {
                data_dir: std::env::temp_dir().join(format!("ballot-data-{tag}")),
                audit_log: std::env::temp_dir().join(format!("ballot-audit-{tag}.log")),
            },
            security: SecurityConfig::for_testing(),
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_testing_config_is_valid() {
        let config = Config::for_testing();
        assert!(SecurityConfig::validate_pepper(&config.security.credential_pepper).is_ok());
        assert!(!config.security.admin_pin.is_empty());
    }

    #[test]
    fn test_pepper_validation() {
        use base64::Engine;
        let valid = base64::engine::general_purpose::STANDARD.encode([0u8; 32]);
        assert!(SecurityConfig::validate_pepper(&valid).is_ok());

        let short = base64::engine::general_purpose::STANDARD.encode([0u8; 16]);
        assert!(SecurityConfig::validate_pepper(&short).is_err());

        assert!(SecurityConfig::validate_pepper("not base64!").is_err());
    }
}
