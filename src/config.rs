use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::cluster::DEFAULT_OPERATOR_NAMESPACE;
use crate::diagnose::{HealthOptions, DEFAULT_RESTART_WARNING_THRESHOLD};
use crate::registry::store::{RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF};
use crate::registry::types::{DEFAULT_CLUSTER_SIZE, DEFAULT_GLOBAL_CIDR_RANGE};
use crate::utils::ip_utils::{address_count, parse_cidr};

/// Default mesh namespace holding the registry and the PSK secret
pub const DEFAULT_NAMESPACE: &str = "mesh-broker";

/// Default directory for file-backed records
pub const DEFAULT_STATE_DIR: &str = "/tmp/meshctl_state";

/// Default directory holding one snapshot per cluster context
pub const DEFAULT_CONTEXTS_DIR: &str = "contexts";

/// Tool configuration. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub globalnet: GlobalnetConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub diagnose: DiagnoseConfig,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.general.namespace.trim().is_empty() {
            return Err(ValidationError::InvalidGeneral(
                "namespace cannot be empty".to_string(),
            ));
        }

        if let Some(level) = &self.general.log_level {
            if level.parse::<log::LevelFilter>().is_err() {
                return Err(ValidationError::InvalidGeneral(format!(
                    "unknown log_level {:?} (expected off, error, warn, info, debug or trace)",
                    level
                )));
            }
        }

        if self.globalnet.enabled {
            let range = parse_cidr(&self.globalnet.cidr_range)
                .map_err(ValidationError::InvalidGlobalnet)?;

            if self.globalnet.cluster_size == 0 {
                return Err(ValidationError::InvalidGlobalnet(
                    "cluster_size must be greater than zero".to_string(),
                ));
            }

            let available = address_count(&range);
            if u128::from(self.globalnet.cluster_size) > available {
                return Err(ValidationError::InvalidGlobalnet(format!(
                    "cluster_size {} exceeds the {} addresses in {}",
                    self.globalnet.cluster_size, available, self.globalnet.cidr_range
                )));
            }
        }

        if self.registry.max_conflict_retries == 0 {
            return Err(ValidationError::InvalidRegistry(
                "max_conflict_retries must be at least 1".to_string(),
            ));
        }

        if self.diagnose.operator_namespace.trim().is_empty() {
            return Err(ValidationError::InvalidDiagnose(
                "operator_namespace cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.registry.max_conflict_retries,
            backoff: self.registry.retry_backoff,
        }
    }

    pub fn health_options(&self) -> HealthOptions {
        HealthOptions {
            operator_namespace: self.diagnose.operator_namespace.clone(),
            restart_warning_threshold: self.diagnose.restart_warning_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalnetConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cidr_range")]
    pub cidr_range: String,
    #[serde(default = "default_cluster_size")]
    pub cluster_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
    #[serde(default = "default_retry_backoff", with = "humantime_serde")]
    pub retry_backoff: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnoseConfig {
    #[serde(default = "default_contexts_dir")]
    pub contexts_dir: PathBuf,
    #[serde(default = "default_operator_namespace")]
    pub operator_namespace: String,
    #[serde(default = "default_restart_warning_threshold")]
    pub restart_warning_threshold: u32,
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid globalnet configuration: {0}")]
    InvalidGlobalnet(String),
    #[error("Invalid registry configuration: {0}")]
    InvalidRegistry(String),
    #[error("Invalid diagnose configuration: {0}")]
    InvalidDiagnose(String),
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_DIR)
}

fn default_cidr_range() -> String {
    DEFAULT_GLOBAL_CIDR_RANGE.to_string()
}

fn default_cluster_size() -> u64 {
    DEFAULT_CLUSTER_SIZE
}

fn default_max_conflict_retries() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_retry_backoff() -> Duration {
    DEFAULT_RETRY_BACKOFF
}

fn default_contexts_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CONTEXTS_DIR)
}

fn default_operator_namespace() -> String {
    DEFAULT_OPERATOR_NAMESPACE.to_string()
}

fn default_restart_warning_threshold() -> u32 {
    DEFAULT_RESTART_WARNING_THRESHOLD
}

/// Default implementations
impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            state_dir: default_state_dir(),
            log_level: None,
        }
    }
}

impl Default for GlobalnetConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cidr_range: default_cidr_range(),
            cluster_size: default_cluster_size(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: default_max_conflict_retries(),
            retry_backoff: default_retry_backoff(),
        }
    }
}

impl Default for DiagnoseConfig {
    fn default() -> Self {
        Self {
            contexts_dir: default_contexts_dir(),
            operator_namespace: default_operator_namespace(),
            restart_warning_threshold: default_restart_warning_threshold(),
        }
    }
}
