//! Operator configuration: a JSON file with every field optional.

use crate::endpoint::EndpointConfig;
use crate::persist::RetentionPolicy;
use crate::supervisor::SupervisorConfig;
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub factor: f64,
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 1000,
            factor: 1.5,
            max_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Skip discovery and always use this port.
    pub serial_port: Option<String>,
    pub baud_rate: Option<u32>,
    pub listen_addr: String,
    pub data_path: PathBuf,
    pub keepalive_secs: u64,
    pub retention_hours: u32,
    pub prune_probability: f64,
    pub backoff: BackoffConfig,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            serial_port: None,
            baud_rate: None,
            listen_addr: "127.0.0.1:8080".to_string(),
            data_path: PathBuf::from("readings.jsonl"),
            keepalive_secs: 15,
            retention_hours: 24,
            prune_probability: 0.01,
            backoff: BackoffConfig::default(),
        }
    }
}

impl StationConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baud_rate == Some(0) {
            return Err(ConfigError::Invalid("baud_rate must be positive".into()));
        }
        if self.keepalive_secs == 0 {
            return Err(ConfigError::Invalid("keepalive_secs must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.prune_probability) {
            return Err(ConfigError::Invalid(format!(
                "prune_probability {} outside [0, 1]",
                self.prune_probability
            )));
        }
        let b = &self.backoff;
        if b.base_ms == 0 || b.max_ms < b.base_ms {
            return Err(ConfigError::Invalid(
                "backoff needs 0 < base_ms <= max_ms".into(),
            ));
        }
        if b.factor.is_nan() || b.factor < 1.0 {
            return Err(ConfigError::Invalid("backoff factor must be >= 1".into()));
        }
        Ok(())
    }

    pub fn supervisor(&self) -> SupervisorConfig {
        SupervisorConfig {
            port: self.serial_port.clone(),
            baud_rate: self.baud_rate,
            backoff: self.backoff.clone(),
        }
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            horizon: time::Duration::hours(i64::from(self.retention_hours)),
            prune_probability: self.prune_probability,
        }
    }

    pub fn endpoint(&self) -> EndpointConfig {
        EndpointConfig {
            keepalive: Duration::from_secs(self.keepalive_secs),
            ..EndpointConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = StationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retention().horizon, time::Duration::hours(24));
        assert_eq!(config.endpoint().keepalive, Duration::from_secs(15));
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            r#"{{ "serial_port": "/dev/ttyACM1", "backoff": {{ "base_ms": 250 }} }}"#
        )?;
        let config = StationConfig::load(file.path())?;
        assert_eq!(config.serial_port.as_deref(), Some("/dev/ttyACM1"));
        assert_eq!(config.baud_rate, None);
        assert_eq!(config.backoff.base_ms, 250);
        assert_eq!(config.backoff.max_ms, 30_000);
        assert_eq!(config.listen_addr, "127.0.0.1:8080");
        Ok(())
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = StationConfig {
            prune_probability: 1.5,
            ..StationConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = StationConfig {
            baud_rate: Some(0),
            ..StationConfig::default()
        };
        assert!(config.validate().is_err());

        let config = StationConfig {
            backoff: BackoffConfig {
                factor: 0.5,
                ..BackoffConfig::default()
            },
            ..StationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = StationConfig::load(Path::new("/nonexistent/station.json"));
        assert!(matches!(err, Err(ConfigError::NotFound(_))));
    }
}
