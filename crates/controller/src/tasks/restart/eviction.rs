//! Extraction of the node condition behind an eviction.
//!
//! Kubelet eviction messages embed the offending node condition in
//! brackets, e.g. `The node had condition: [DiskPressure].`; that
//! condition is what operators want on the metric and event, not the
//! generic `Evicted`.

use k8s_openapi::api::core::v1::Pod;
use lazy_static::lazy_static;
use regex::Regex;

use super::classifier::RestartableReason;

lazy_static! {
    static ref BRACKETED_CAUSE: Regex =
        Regex::new(r"\[([^\[\]]+)\]").expect("bracketed cause pattern");
}

/// The condition that evicted the pod (`DiskPressure`, `MemoryPressure`,
/// ...). Falls back to the bare reason when the message carries no
/// bracketed condition, and returns an empty string for pods that were
/// not evicted.
pub fn eviction_cause(pod: &Pod) -> String {
    let status = pod.status.as_ref();
    let reason = status.and_then(|s| s.reason.as_deref()).unwrap_or_default();
    if reason != RestartableReason::Evicted.as_str() {
        return String::new();
    }

    let message = status.and_then(|s| s.message.as_deref()).unwrap_or_default();
    BRACKETED_CAUSE
        .captures(message)
        .and_then(|captures| captures.get(1))
        .map_or_else(|| reason.to_string(), |m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodStatus;

    fn pod(reason: &str, message: &str) -> Pod {
        Pod {
            status: Some(PodStatus {
                phase: Some("Failed".to_string()),
                reason: Some(reason.to_string()),
                message: Some(message.to_string()),
                ..PodStatus::default()
            }),
            ..Pod::default()
        }
    }

    #[test]
    fn test_bracketed_condition_is_extracted() {
        let evicted = pod("Evicted", "The node had condition: [DiskPressure].");
        assert_eq!(eviction_cause(&evicted), "DiskPressure");
    }

    #[test]
    fn test_first_bracketed_condition_wins() {
        let evicted = pod("Evicted", "conditions: [MemoryPressure] [DiskPressure]");
        assert_eq!(eviction_cause(&evicted), "MemoryPressure");
    }

    #[test]
    fn test_unbracketed_message_falls_back_to_reason() {
        let evicted = pod("Evicted", "The node was low on resource: ephemeral-storage.");
        assert_eq!(eviction_cause(&evicted), "Evicted");
    }

    #[test]
    fn test_missing_message_falls_back_to_reason() {
        let mut evicted = pod("Evicted", "");
        evicted.status.as_mut().unwrap().message = None;
        assert_eq!(eviction_cause(&evicted), "Evicted");
    }

    #[test]
    fn test_non_eviction_reasons_yield_empty() {
        assert_eq!(eviction_cause(&pod("Preempted", "[DiskPressure]")), "");
        assert_eq!(eviction_cause(&pod("OOMKilled", "[DiskPressure]")), "");
        assert_eq!(eviction_cause(&Pod::default()), "");
    }
}
