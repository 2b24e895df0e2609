//! Orchestration of the classify → account → decide pipeline for one
//! failed workflow pod.
//!
//! The coordinator mutates only the in-memory workflow object; the outer
//! reconciler persists the result. All counting state lives on the
//! workflow, so a reconcile tick can be replayed safely: the restart
//! commit clears the node's pod binding, and a later tick observing the
//! same dead pod no longer matches the binding and does nothing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::events::{Event, EventType, Recorder};
use kube::{Resource, ResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::classifier::{classify, Classification};
use super::policy::Command;
use super::{counter, eviction, policy};
use crate::crds::workflow::{NodePhase, NodeStatus, Template, Workflow};
use crate::tasks::config::FailedPodRestart;
use crate::tasks::monitor::metrics::MetricsCollector;

/// Event reason emitted on the workflow when a pod is replaced.
pub const POD_RESTARTED_EVENT_REASON: &str = "PodRestarted";

/// Result of a coordinator pass for one failed pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Accounting was updated and the pod binding cleared; the executor
    /// will schedule a replacement on its next pass
    Restarted,
    /// The node was marked failed with the given reason
    Failed(String),
    /// Backoff is still in effect; revisit at the given time
    Pending(DateTime<Utc>),
    /// Nothing to do for this (pod, node) pair
    NotApplicable,
}

pub struct RestartCoordinator {
    metrics: Arc<MetricsCollector>,
    recorder: Option<Recorder>,
}

impl RestartCoordinator {
    pub fn new(metrics: Arc<MetricsCollector>, recorder: Option<Recorder>) -> Self {
        Self { metrics, recorder }
    }

    /// Run one coordination pass for a failed pod bound to `node_id`.
    ///
    /// Mutates `workflow` in memory on `Restart` and `Fail`; `Defer` and
    /// `NotApplicable` leave it untouched.
    #[allow(clippy::too_many_arguments)]
    pub async fn coordinate(
        &self,
        pod: &Pod,
        template: Option<&Template>,
        workflow: &mut Workflow,
        node_id: &str,
        now: DateTime<Utc>,
        config: Option<&FailedPodRestart>,
        cancel: &CancellationToken,
    ) -> Outcome {
        let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref());
        if phase != Some("Failed") {
            return Outcome::NotApplicable;
        }

        // A restart clears the binding, so a stale observation of an
        // already-handled pod lands here and cannot double-increment.
        let pod_name = pod.name_any();
        let bound_pod = workflow
            .status
            .as_ref()
            .and_then(|status| status.nodes.get(node_id))
            .and_then(|node| node.pod_name.as_deref());
        if bound_pod != Some(pod_name.as_str()) {
            debug!(
                node_id,
                pod = %pod_name,
                "Pod is no longer bound to the node; skipping"
            );
            return Outcome::NotApplicable;
        }

        let classification = classify(pod, template);
        let current_count = counter::get(workflow, node_id);
        let last_attempt_at = last_attempt_at(workflow, node_id);

        match policy::decide(&classification, current_count, config, now, last_attempt_at) {
            Command::Restart => {
                if cancel.is_cancelled() {
                    debug!(
                        node_id,
                        "Cancelled before the restart commit; leaving workflow untouched"
                    );
                    return Outcome::NotApplicable;
                }

                // The cause label is derived once, here, from the
                // classification context; the metric and the event must
                // agree with each other.
                let cause = restart_cause(pod, &classification);

                let new_count = counter::increment(workflow, node_id);
                if let Some(node) = node_mut(workflow, node_id) {
                    node.failed_pod_restarts = new_count;
                    node.last_restart_attempt_at = Some(now.to_rfc3339());
                    node.pod_name = None;
                    node.phase = NodePhase::Pending;
                    node.message = Some(format!(
                        "pod deleted before user code started ({cause}); scheduling a replacement"
                    ));
                }

                self.metrics.increment_failed_pod_restarts(&cause);
                self.publish_restart_event(workflow, node_id, &pod_name, &cause)
                    .await;

                info!(
                    node_id,
                    pod = %pod_name,
                    cause = %cause,
                    restarts = new_count,
                    "Replacing pod lost to infrastructure failure"
                );
                Outcome::Restarted
            }
            Command::Fail(reason) => {
                if let Some(node) = node_mut(workflow, node_id) {
                    node.phase = NodePhase::Failed;
                    // Preserve what the kubelet said; the policy reason
                    // only travels in the outcome.
                    node.message = if classification.message.is_empty() {
                        Some(reason.clone())
                    } else {
                        Some(classification.message.clone())
                    };
                }
                debug!(node_id, pod = %pod_name, reason = %reason, "Pod failure is not restartable");
                Outcome::Failed(reason)
            }
            Command::Defer(until) => {
                debug!(node_id, pod = %pod_name, %until, "Restart backoff in effect");
                Outcome::Pending(until)
            }
        }
    }

    async fn publish_restart_event(
        &self,
        workflow: &Workflow,
        node_id: &str,
        pod_name: &str,
        cause: &str,
    ) {
        let Some(recorder) = &self.recorder else {
            return;
        };

        let reference = workflow.object_ref(&());
        let event = Event {
            type_: EventType::Normal,
            reason: POD_RESTARTED_EVENT_REASON.to_string(),
            note: Some(format!(
                "pod {pod_name} for node {node_id} was deleted before user code started ({cause}); scheduling a replacement"
            )),
            action: "FailedPodRestart".to_string(),
            secondary: None,
        };

        if let Err(err) = recorder.publish(&event, &reference).await {
            warn!(node_id, "Failed to publish {POD_RESTARTED_EVENT_REASON} event: {err}");
        }
    }
}

fn restart_cause(pod: &Pod, classification: &Classification) -> String {
    let cause = eviction::eviction_cause(pod);
    if cause.is_empty() {
        classification.reason.clone()
    } else {
        cause
    }
}

fn node_mut<'a>(workflow: &'a mut Workflow, node_id: &str) -> Option<&'a mut NodeStatus> {
    workflow
        .status
        .as_mut()
        .and_then(|status| status.nodes.get_mut(node_id))
}

fn last_attempt_at(workflow: &Workflow, node_id: &str) -> Option<DateTime<Utc>> {
    workflow
        .status
        .as_ref()
        .and_then(|status| status.nodes.get(node_id))
        .and_then(|node| node.last_restart_attempt_at.as_deref())
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|stamp| stamp.with_timezone(&Utc))
}
