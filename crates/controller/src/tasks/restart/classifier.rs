//! Terminal-state classification for failed workflow pods.
//!
//! Decides whether a failed pod died before its user code ran and whether
//! the failure reason is one the cluster caused. Pure: no I/O, no
//! side effects, and malformed input always degrades toward "do not
//! restart".

use k8s_openapi::api::core::v1::{ContainerStatus, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

use crate::crds::workflow::{Template, MAIN_CONTAINER_NAME};

/// Pod terminal reasons recognised as infrastructure-caused and eligible
/// for automatic replacement. Matching is exact and case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartableReason {
    /// Kubelet-initiated termination under node resource pressure
    Evicted,
    /// Displaced by a higher-priority pod
    Preempted,
    /// Node went through a graceful shutdown
    NodeShutdown,
    /// Node no longer satisfies the pod's node affinity
    NodeAffinity,
    /// Admission rejected the pod after scheduling
    UnexpectedAdmissionError,
}

pub const RESTARTABLE_REASONS: [RestartableReason; 5] = [
    RestartableReason::Evicted,
    RestartableReason::Preempted,
    RestartableReason::NodeShutdown,
    RestartableReason::NodeAffinity,
    RestartableReason::UnexpectedAdmissionError,
];

impl RestartableReason {
    pub fn from_reason(reason: &str) -> Option<Self> {
        match reason {
            "Evicted" => Some(Self::Evicted),
            "Preempted" => Some(Self::Preempted),
            "NodeShutdown" => Some(Self::NodeShutdown),
            "NodeAffinity" => Some(Self::NodeAffinity),
            "UnexpectedAdmissionError" => Some(Self::UnexpectedAdmissionError),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Evicted => "Evicted",
            Self::Preempted => "Preempted",
            Self::NodeShutdown => "NodeShutdown",
            Self::NodeAffinity => "NodeAffinity",
            Self::UnexpectedAdmissionError => "UnexpectedAdmissionError",
        }
    }
}

/// Outcome of examining a failed pod's terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub should_restart: bool,
    pub never_started: bool,
    pub reason: String,
    pub message: String,
}

/// Classify a pod's terminal state against its template.
///
/// `should_restart` implies `never_started`: a pod whose main container
/// shows any evidence of having run is never a restart candidate, no
/// matter what reason the kubelet recorded.
pub fn classify(pod: &Pod, template: Option<&Template>) -> Classification {
    let status = pod.status.as_ref();
    let phase = status.and_then(|s| s.phase.as_deref()).unwrap_or_default();
    let reason = status
        .and_then(|s| s.reason.clone())
        .unwrap_or_default();
    let message = status
        .and_then(|s| s.message.clone())
        .unwrap_or_default();

    // Terminal states other than Failed (including Unknown) are not
    // restart candidates.
    if phase != "Failed" {
        return Classification {
            should_restart: false,
            never_started: false,
            reason,
            message,
        };
    }

    let never_started = main_containers_never_started(pod, template);
    let should_restart = never_started && RestartableReason::from_reason(&reason).is_some();

    Classification {
        should_restart,
        never_started,
        reason,
        message,
    }
}

fn main_containers_never_started(pod: &Pod, template: Option<&Template>) -> bool {
    let statuses = pod
        .status
        .as_ref()
        .and_then(|status| status.container_statuses.as_ref());

    // No container status at all means the pod never got as far as
    // creating a container.
    let Some(statuses) = statuses else {
        return true;
    };
    if statuses.is_empty() {
        return true;
    }

    statuses
        .iter()
        .filter(|cs| is_main_container(template, &cs.name))
        .all(|cs| !has_run_evidence(cs))
}

fn is_main_container(template: Option<&Template>, name: &str) -> bool {
    match template {
        Some(template) => template.is_main_container_name(name),
        None => name == MAIN_CONTAINER_NAME,
    }
}

// Kubernetes exposes a container's history only as the current state plus
// the previous termination. A `Terminated` whose `started_at` is absent
// or zero is a container that was killed before `start` (eviction during
// image pull, OOM before exec) and therefore never ran user code.
fn has_run_evidence(cs: &ContainerStatus) -> bool {
    if let Some(state) = &cs.state {
        if state.running.is_some() {
            return true;
        }
        if let Some(terminated) = &state.terminated {
            if started(terminated.started_at.as_ref()) {
                return true;
            }
        }
    }

    if let Some(last) = &cs.last_state {
        if last.running.is_some() {
            return true;
        }
        if let Some(terminated) = &last.terminated {
            if started(terminated.started_at.as_ref()) {
                return true;
            }
        }
    }

    false
}

fn started(started_at: Option<&Time>) -> bool {
    started_at.is_some_and(|time| time.0.timestamp() > 0)
}
