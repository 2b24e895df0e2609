use super::config::ControllerConfig;
use super::monitor::metrics::MetricsCollector;
use kube::Client;
use std::sync::Arc;

// Error type for the controller
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Missing object key")]
    MissingObjectKey,

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Controller configuration error: {0}")]
    ConfigError(String),

    #[error("General error: {0}")]
    GenericError(#[from] anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// Context shared across controller operations
#[derive(Clone)]
pub struct Context {
    pub client: Client,
    pub namespace: String,
    pub config: Arc<ControllerConfig>,
    pub metrics: Arc<MetricsCollector>,
}
