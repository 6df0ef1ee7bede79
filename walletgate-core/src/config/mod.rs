//! Broker configuration
//!
//! Environment-based configuration with defaults and validation.

use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Configuration for one broker process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Address the HTTP surface binds to
    pub bind_address: SocketAddr,

    /// Timeout applied to each registry / hub / manifest call
    #[serde(with = "humantime_serde")]
    pub lookup_timeout: Duration,

    /// Hard bound on identity-discovery iterations
    pub max_identity_index: u32,

    /// Upper bound on accepted token length (bytes, pre-decoding)
    pub max_token_length: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8888".parse().expect("valid default address"),
            lookup_timeout: Duration::from_secs(10),
            max_identity_index: 65536,
            max_token_length: 64 * 1024,
        }
    }
}

impl BrokerConfig {
    /// Build a configuration from `WALLETGATE_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(addr) = env::var("WALLETGATE_BIND_ADDRESS") {
            config.bind_address = addr
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("bind address: {}", e)))?;
        }
        if let Ok(secs) = env::var("WALLETGATE_LOOKUP_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("lookup timeout: {}", e)))?;
            config.lookup_timeout = Duration::from_secs(secs);
        }
        if let Ok(max) = env::var("WALLETGATE_MAX_IDENTITY_INDEX") {
            config.max_identity_index = max
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("max identity index: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lookup_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "lookup timeout must be non-zero".to_string(),
            ));
        }
        if self.max_identity_index == 0 {
            return Err(ConfigError::ValidationFailed(
                "max identity index must be non-zero".to_string(),
            ));
        }
        if self.max_token_length < 512 {
            return Err(ConfigError::ValidationFailed(
                "max token length too small to hold any valid token".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BrokerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_identity_index, 65536);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = BrokerConfig {
            lookup_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = BrokerConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: BrokerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.bind_address, config.bind_address);
        assert_eq!(restored.lookup_timeout, config.lookup_timeout);
    }
}
