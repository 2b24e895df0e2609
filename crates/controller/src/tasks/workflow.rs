//! Workflow reconciliation.
//!
//! The outer loop for the failed-pod restart subsystem: observe a
//! workflow's in-flight nodes, fetch the pods bound to them, and run the
//! restart coordinator for any pod that reached a terminal `Failed`
//! phase. All coordinator mutation happens on an in-memory copy of the
//! workflow, which is persisted here with merge patches. A conflict
//! surfaces as a kube error and the error policy requeues; replaying the
//! tick is safe because a committed restart clears the pod binding.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::events::{Recorder, Reporter};
use kube::{Api, ResourceExt};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::crds::workflow::{NodePhase, Workflow};
use crate::tasks::restart::{Outcome, RestartCoordinator};
use crate::tasks::types::{Context, Result};

const REPORTER_CONTROLLER: &str = "workflow-controller";

#[instrument(skip(ctx), fields(workflow = %workflow.name_any(), namespace = %ctx.namespace))]
pub async fn reconcile_workflow(workflow: Arc<Workflow>, ctx: Arc<Context>) -> Result<Action> {
    ctx.metrics.increment_reconciles();

    let Some(status) = &workflow.status else {
        debug!("Workflow has no status yet; waiting for the executor");
        return Ok(Action::await_change());
    };

    if matches!(status.phase.as_str(), "Succeeded" | "Failed" | "Error") {
        debug!("Workflow is finished; nothing to reconcile");
        return Ok(Action::await_change());
    }

    let pods: Api<Pod> = Api::namespaced(ctx.client.clone(), &ctx.namespace);
    let coordinator = RestartCoordinator::new(ctx.metrics.clone(), Some(recorder(&ctx)));
    let cancel = CancellationToken::new();
    let now = Utc::now();

    // Snapshot the bindings first; the coordinator mutates the node map.
    let mut bound_nodes: Vec<(String, String, Option<String>)> = status
        .nodes
        .values()
        .filter(|node| matches!(node.phase, NodePhase::Pending | NodePhase::Running))
        .filter_map(|node| {
            node.pod_name
                .clone()
                .map(|pod_name| (node.id.clone(), pod_name, node.template_name.clone()))
        })
        .collect();
    bound_nodes.sort();

    let mut updated = workflow.as_ref().clone();
    let mut restarted = false;
    let mut earliest_retry: Option<DateTime<Utc>> = None;

    for (node_id, pod_name, template_name) in bound_nodes {
        let pod = match pods.get(&pod_name).await {
            Ok(pod) => pod,
            Err(kube::Error::Api(response)) if response.code == 404 => {
                debug!(node_id, pod = %pod_name, "Bound pod not found; the executor will reschedule");
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        if pod.status.as_ref().and_then(|s| s.phase.as_deref()) != Some("Failed") {
            continue;
        }

        let template = template_name
            .as_deref()
            .and_then(|name| updated.spec.template(name))
            .cloned();

        let outcome = coordinator
            .coordinate(
                &pod,
                template.as_ref(),
                &mut updated,
                &node_id,
                now,
                ctx.config.failed_pod_restart.as_ref(),
                &cancel,
            )
            .await;

        match outcome {
            Outcome::Restarted => restarted = true,
            Outcome::Failed(reason) => {
                debug!(node_id, reason = %reason, "Node marked failed");
            }
            Outcome::Pending(until) => {
                earliest_retry = Some(earliest_retry.map_or(until, |t| t.min(until)));
            }
            Outcome::NotApplicable => {}
        }
    }

    apply_workflow_update(&workflow, &updated, &ctx).await?;

    if let Some(until) = earliest_retry {
        let delay = (until - now).to_std().unwrap_or_default();
        debug!(?delay, "Requeueing for restart backoff");
        return Ok(Action::requeue(delay));
    }

    if restarted {
        // Replacement pods surface as watch events on the owned Pod API;
        // a short requeue covers a missed event.
        return Ok(Action::requeue(Duration::from_secs(10)));
    }

    Ok(Action::requeue(Duration::from_secs(ctx.config.requeue_seconds)))
}

/// Persist coordinator mutations, skipping no-op patches.
async fn apply_workflow_update(
    original: &Workflow,
    updated: &Workflow,
    ctx: &Context,
) -> Result<()> {
    let workflows: Api<Workflow> = Api::namespaced(ctx.client.clone(), &ctx.namespace);
    let name = original.name_any();

    if original.metadata.annotations != updated.metadata.annotations {
        let patch = json!({
            "metadata": { "annotations": updated.metadata.annotations }
        });
        workflows
            .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        debug!("Patched workflow annotations");
    }

    if original.status != updated.status {
        let patch = json!({ "status": updated.status });
        workflows
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        debug!("Patched workflow status");
    }

    Ok(())
}

fn recorder(ctx: &Context) -> Recorder {
    let reporter = Reporter {
        controller: REPORTER_CONTROLLER.to_string(),
        instance: std::env::var("HOSTNAME").ok(),
    };
    Recorder::new(ctx.client.clone(), reporter)
}

/// Requeue failed reconciliations with a flat delay; the per-key
/// workqueue deduplicates bursts.
pub fn error_policy(
    workflow: Arc<Workflow>,
    error: &crate::tasks::types::Error,
    ctx: Arc<Context>,
) -> Action {
    ctx.metrics.increment_reconcile_errors();
    warn!(
        workflow = %workflow.name_any(),
        error = %error,
        "Workflow reconciliation failed; requeueing"
    );
    Action::requeue(Duration::from_secs(30))
}
