//! Workflow Controller Configuration
//!
//! Configuration for the workflow controller, loaded from a file mounted
//! into the controller pod. The outer deployment owns the file; the core
//! only ever sees the parsed record.

use anyhow::Context as AnyhowContext;
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Main controller configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerConfig {
    /// Automatic replacement of pods lost to infrastructure failures.
    /// An absent section behaves the same as `enabled: false`.
    #[serde(default)]
    pub failed_pod_restart: Option<FailedPodRestart>,

    /// How often a workflow with in-flight pods is revisited, in seconds
    #[serde(default = "default_requeue_seconds")]
    pub requeue_seconds: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            failed_pod_restart: None,
            requeue_seconds: default_requeue_seconds(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from a mounted YAML file.
    pub fn from_mounted_file(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {path}"))?;
        let config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse configuration file: {path}"))?;
        Ok(config)
    }

    /// Validate configuration values that serde cannot reject on its own.
    pub fn validate(&self) -> Result<(), String> {
        if self.requeue_seconds == 0 {
            return Err("requeueSeconds must be greater than zero".to_string());
        }
        if let Some(restart) = &self.failed_pod_restart {
            if restart.max_restarts.is_some_and(|max| max < 0) {
                return Err("failedPodRestart.maxRestarts must not be negative".to_string());
            }
        }
        Ok(())
    }
}

/// Policy for replacing pods that failed before user code ran.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedPodRestart {
    /// Master switch; defaults to off
    #[serde(default)]
    pub enabled: bool,

    /// Restart budget per node. `0` classifies failures but never
    /// restarts; absent means the default budget.
    #[serde(default)]
    pub max_restarts: Option<i32>,

    /// Minimum delay between replacement pods for the same node, in
    /// seconds
    #[serde(default)]
    pub backoff_seconds: Option<u64>,
}

impl FailedPodRestart {
    pub const DEFAULT_MAX_RESTARTS: i32 = 3;
    pub const DEFAULT_BACKOFF_SECONDS: u64 = 30;

    pub fn max_restarts(&self) -> i32 {
        self.max_restarts.unwrap_or(Self::DEFAULT_MAX_RESTARTS)
    }

    pub fn backoff(&self) -> Duration {
        let seconds = self
            .backoff_seconds
            .unwrap_or(Self::DEFAULT_BACKOFF_SECONDS);
        Duration::seconds(i64::try_from(seconds).unwrap_or(i64::MAX))
    }
}

fn default_requeue_seconds() -> u64 {
    90
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_restart_section() {
        let config: ControllerConfig = serde_yaml::from_str("requeueSeconds: 60").unwrap();
        assert!(config.failed_pod_restart.is_none());
        assert_eq!(config.requeue_seconds, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_restart_section_defaults() {
        let yaml = r"
failedPodRestart:
  enabled: true
";
        let config: ControllerConfig = serde_yaml::from_str(yaml).unwrap();
        let restart = config.failed_pod_restart.unwrap();
        assert!(restart.enabled);
        assert_eq!(restart.max_restarts(), 3);
        assert_eq!(restart.backoff(), Duration::seconds(30));
    }

    #[test]
    fn test_zero_max_restarts_is_meaningful() {
        let yaml = r"
failedPodRestart:
  enabled: true
  maxRestarts: 0
  backoffSeconds: 5
";
        let config: ControllerConfig = serde_yaml::from_str(yaml).unwrap();
        let restart = config.failed_pod_restart.unwrap();
        assert_eq!(restart.max_restarts(), 0);
        assert_eq!(restart.backoff(), Duration::seconds(5));
    }

    #[test]
    fn test_validate_rejects_negative_budget() {
        let config = ControllerConfig {
            failed_pod_restart: Some(FailedPodRestart {
                enabled: true,
                max_restarts: Some(-1),
                backoff_seconds: None,
            }),
            ..ControllerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(ControllerConfig::default().validate().is_ok());
        assert_eq!(ControllerConfig::default().requeue_seconds, 90);
    }
}
