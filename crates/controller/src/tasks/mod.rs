use crate::crds::Workflow;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::controller::Controller;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client};
use std::sync::Arc;
use tracing::{error, info, instrument, Instrument};

pub mod config;
pub mod monitor;
pub mod restart;
pub mod types;
pub mod workflow;

// Re-export commonly used items
pub use config::ControllerConfig;
pub use types::{Error, Result};
pub use workflow::reconcile_workflow;

use monitor::metrics::MetricsCollector;
use types::Context;
use workflow::error_policy;

/// Main entry point for the workflow controller
#[instrument(skip(client, config, metrics), fields(namespace = %namespace))]
pub async fn run_workflow_controller(
    client: Client,
    namespace: String,
    config: Arc<ControllerConfig>,
    metrics: Arc<MetricsCollector>,
) -> Result<()> {
    info!("Starting workflow controller in namespace: {}", namespace);

    if let Err(validation_error) = config.validate() {
        error!("Configuration validation failed: {}", validation_error);
        return Err(Error::ConfigError(validation_error));
    }

    // Create shared context
    let context = Arc::new(Context {
        client: client.clone(),
        namespace: namespace.clone(),
        config,
        metrics,
    });

    let workflows_api: Api<Workflow> = Api::namespaced(client.clone(), &namespace);
    let pods_api: Api<Pod> = Api::namespaced(client, &namespace);
    let watcher_config = WatcherConfig::default().any_semantic();

    Controller::new(workflows_api, watcher_config.clone())
        .owns(pods_api, watcher_config)
        .run(reconcile_workflow, error_policy, context)
        .for_each(|reconciliation_result| {
            let workflow_span = tracing::info_span!("workflow_reconciliation_result");
            async move {
                match reconciliation_result {
                    Ok(workflow_resource) => {
                        info!(
                            resource = ?workflow_resource,
                            "Workflow reconciliation successful"
                        );
                    }
                    Err(reconciliation_err) => {
                        error!(
                            error = ?reconciliation_err,
                            "Workflow reconciliation error"
                        );
                    }
                }
            }
            .instrument(workflow_span)
        })
        .await;

    info!("Workflow controller shutting down");
    Ok(())
}
