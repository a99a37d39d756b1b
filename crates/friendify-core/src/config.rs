//! Friendify configuration
//!
//! Loaded from TOML. Every section has defaults matching the shipped app, so
//! an empty file (or none at all) is a valid configuration.

use crate::classifier::DEFAULT_NEAR_THRESHOLD_M;
use crate::limiter::LimiterPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default discovery service name
pub const DEFAULT_SERVICE_TYPE: &str = "friendify";

/// Default shared identity tag advertised during discovery
pub const DEFAULT_IDENTITY: &str = "MPC-UWB-Experience";

/// Default connected-peer cap
pub const DEFAULT_MAX_PEERS: usize = 1;

/// Default cap on retained diagnostic lines
pub const DEFAULT_MAX_LOG_LINES: usize = 200;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Offending path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration could not be rendered
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted field name
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Local device settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Name shown to peers
    pub display_name: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            display_name: "friendify-device".to_string(),
        }
    }
}

/// Transport discovery and capacity settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Discovery service name
    pub service_type: String,
    /// Identity tag; peers advertising a different tag are ignored
    pub identity: String,
    /// Connected-peer cap; discovery suspends when it is reached
    pub max_peers: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            service_type: DEFAULT_SERVICE_TYPE.to_string(),
            identity: DEFAULT_IDENTITY.to_string(),
            max_peers: DEFAULT_MAX_PEERS,
        }
    }
}

/// Ranging classification settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangingConfig {
    /// Distance below which a peer is "close up", in meters
    pub near_threshold_m: f32,
}

impl Default for RangingConfig {
    fn default() -> Self {
        Self {
            near_threshold_m: DEFAULT_NEAR_THRESHOLD_M,
        }
    }
}

/// UI projection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Diagnostic lines kept for the UI
    pub max_log_lines: usize,
    /// Coalescing applied to sample-driven updates; `None` publishes every sample
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_policy: Option<LimiterPolicy>,
    /// Window for `update_policy`
    pub update_interval_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_log_lines: DEFAULT_MAX_LOG_LINES,
            update_policy: None,
            update_interval_ms: 2_000,
        }
    }
}

impl DisplayConfig {
    /// Configured coalescing policy and its window, if any
    pub fn update_window(&self) -> Option<(LimiterPolicy, Duration)> {
        self.update_policy
            .map(|policy| (policy, Duration::from_millis(self.update_interval_ms)))
    }
}

/// Complete Friendify configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FriendifyConfig {
    /// Local device settings
    pub device: DeviceConfig,
    /// Transport settings
    pub transport: TransportConfig,
    /// Ranging settings
    pub ranging: RangingConfig,
    /// UI projection settings
    pub display: DisplayConfig,
}

impl FriendifyConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.service_type.trim().is_empty() {
            return Err(invalid("transport.service_type", "must not be empty"));
        }
        if self.transport.identity.trim().is_empty() {
            return Err(invalid("transport.identity", "must not be empty"));
        }
        if self.transport.max_peers == 0 {
            return Err(invalid("transport.max_peers", "must be at least 1"));
        }
        let threshold = self.ranging.near_threshold_m;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(invalid(
                "ranging.near_threshold_m",
                format!("must be a positive distance, got {threshold}"),
            ));
        }
        if self.display.update_policy.is_some() && self.display.update_interval_ms == 0 {
            return Err(invalid(
                "display.update_interval_ms",
                "must be positive when update_policy is set",
            ));
        }
        Ok(())
    }

    /// Set the display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.device.display_name = name.into();
        self
    }

    /// Set the connected-peer cap
    pub fn with_max_peers(mut self, max_peers: usize) -> Self {
        self.transport.max_peers = max_peers;
        self
    }

    /// Set the near threshold in meters
    pub fn with_near_threshold(mut self, meters: f32) -> Self {
        self.ranging.near_threshold_m = meters;
        self
    }

    /// Coalesce sample-driven UI updates
    pub fn with_update_policy(mut self, policy: LimiterPolicy, interval: Duration) -> Self {
        self.display.update_policy = Some(policy);
        self.display.update_interval_ms = interval.as_millis() as u64;
        self
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = FriendifyConfig::from_toml_str("").unwrap();
        assert_eq!(config, FriendifyConfig::default());
        assert_eq!(config.transport.identity, DEFAULT_IDENTITY);
        assert_eq!(config.transport.max_peers, 1);
        assert!(config.display.update_window().is_none());
    }

    #[test]
    fn test_partial_document() {
        let config = FriendifyConfig::from_toml_str(
            r#"
            [device]
            display_name = "Mina"

            [transport]
            max_peers = 4

            [display]
            update_policy = "throttle"
            update_interval_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.device.display_name, "Mina");
        assert_eq!(config.transport.max_peers, 4);
        assert_eq!(config.transport.service_type, DEFAULT_SERVICE_TYPE);
        assert_eq!(
            config.display.update_window(),
            Some((LimiterPolicy::Throttle, Duration::from_millis(250)))
        );
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let zero_peers = FriendifyConfig::default().with_max_peers(0);
        assert!(matches!(
            zero_peers.validate(),
            Err(ConfigError::Invalid { field: "transport.max_peers", .. })
        ));

        let negative = FriendifyConfig::default().with_near_threshold(-1.0);
        assert!(negative.validate().is_err());

        let nan = FriendifyConfig::default().with_near_threshold(f32::NAN);
        assert!(nan.validate().is_err());

        assert!(FriendifyConfig::from_toml_str("[transport]\nidentity = \"  \"").is_err());
    }

    #[test]
    fn test_round_trip_through_file() {
        let config = FriendifyConfig::default()
            .with_display_name("Sam")
            .with_update_policy(LimiterPolicy::Debounce, Duration::from_secs(2));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml_string().unwrap().as_bytes())
            .unwrap();

        let loaded = FriendifyConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = FriendifyConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
