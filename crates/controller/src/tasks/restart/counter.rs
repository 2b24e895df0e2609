//! Per-node restart accounting on the workflow object's annotations.
//!
//! The controller is stateless across reconcile ticks, so the counter
//! lives on the workflow itself. Callers already hold the per-workflow
//! serialization guarantee of the workqueue; nothing here synchronizes.

use std::collections::BTreeMap;

use crate::crds::Workflow;

/// Annotation prefix; the full key is `<prefix><nodeID>`. The value is
/// the ASCII decimal encoding of a non-negative 32-bit integer.
/// Downstream tooling may read these keys but must not write them.
pub const RESTART_COUNT_ANNOTATION_PREFIX: &str =
    "workflows.argoproj.io/failed-pod-restart-count/";

pub fn annotation_key(node_id: &str) -> String {
    format!("{RESTART_COUNT_ANNOTATION_PREFIX}{node_id}")
}

/// Current restart count for a node. Absent and malformed values both
/// read as 0; a malformed value is only rewritten by the next [`set`].
pub fn get(workflow: &Workflow, node_id: &str) -> i32 {
    workflow
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(&annotation_key(node_id)))
        .and_then(|raw| raw.parse::<i32>().ok())
        .filter(|count| *count >= 0)
        .unwrap_or(0)
}

/// Store a restart count for a node, creating the annotations map if
/// necessary. Returns whether the stored value actually changed, so
/// callers can suppress a no-op workflow update.
pub fn set(workflow: &mut Workflow, node_id: &str, count: i32) -> bool {
    let annotations = workflow
        .metadata
        .annotations
        .get_or_insert_with(BTreeMap::new);
    let encoded = count.to_string();
    match annotations.insert(annotation_key(node_id), encoded.clone()) {
        Some(previous) => previous != encoded,
        None => true,
    }
}

/// Increment the node's restart count and return the new value.
pub fn increment(workflow: &mut Workflow, node_id: &str) -> i32 {
    let next = get(workflow, node_id).saturating_add(1);
    set(workflow, node_id, next);
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crds::WorkflowSpec;

    fn workflow() -> Workflow {
        Workflow::new(
            "wf",
            WorkflowSpec {
                entrypoint: "whalesay".to_string(),
                templates: vec![],
            },
        )
    }

    #[test]
    fn test_get_without_annotations_map() {
        let wf = workflow();
        assert!(wf.metadata.annotations.is_none());
        assert_eq!(get(&wf, "wf-1"), 0);
    }

    #[test]
    fn test_first_set_creates_map() {
        let mut wf = workflow();
        assert!(set(&mut wf, "wf-1", 1));
        let annotations = wf.metadata.annotations.as_ref().unwrap();
        assert_eq!(
            annotations
                .get("workflows.argoproj.io/failed-pod-restart-count/wf-1")
                .map(String::as_str),
            Some("1")
        );
    }

    #[test]
    fn test_set_get_round_trip() {
        let mut wf = workflow();
        for count in [0, 1, 7, 42, i32::MAX] {
            set(&mut wf, "wf-1", count);
            assert_eq!(get(&wf, "wf-1"), count);
        }
    }

    #[test]
    fn test_repeated_set_reports_unchanged() {
        let mut wf = workflow();
        assert!(set(&mut wf, "wf-1", 2));
        assert!(!set(&mut wf, "wf-1", 2));
        assert!(set(&mut wf, "wf-1", 3));
    }

    #[test]
    fn test_malformed_value_reads_as_zero_and_is_not_healed() {
        let mut wf = workflow();
        set(&mut wf, "wf-1", 1);
        wf.metadata
            .annotations
            .as_mut()
            .unwrap()
            .insert(annotation_key("wf-1"), "abc".to_string());

        assert_eq!(get(&wf, "wf-1"), 0);
        // get never rewrites the stored value
        assert_eq!(
            wf.metadata
                .annotations
                .as_ref()
                .unwrap()
                .get(&annotation_key("wf-1"))
                .map(String::as_str),
            Some("abc")
        );
    }

    #[test]
    fn test_negative_and_out_of_range_read_as_zero() {
        let mut wf = workflow();
        for raw in ["-1", "2147483648", "1e3", ""] {
            wf.metadata
                .annotations
                .get_or_insert_with(Default::default)
                .insert(annotation_key("wf-1"), raw.to_string());
            assert_eq!(get(&wf, "wf-1"), 0, "raw {raw:?}");
        }
    }

    #[test]
    fn test_increment_is_strictly_monotonic() {
        let mut wf = workflow();
        assert_eq!(increment(&mut wf, "wf-1"), 1);
        assert_eq!(increment(&mut wf, "wf-1"), 2);
        assert_eq!(increment(&mut wf, "wf-1"), 3);
        assert_eq!(get(&wf, "wf-1"), 3);
    }

    #[test]
    fn test_increment_rewrites_malformed_value() {
        let mut wf = workflow();
        wf.metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(annotation_key("wf-1"), "abc".to_string());

        assert_eq!(increment(&mut wf, "wf-1"), 1);
        assert_eq!(get(&wf, "wf-1"), 1);
    }

    #[test]
    fn test_counters_are_per_node() {
        let mut wf = workflow();
        increment(&mut wf, "wf-1");
        increment(&mut wf, "wf-1");
        increment(&mut wf, "wf-2");

        assert_eq!(get(&wf, "wf-1"), 2);
        assert_eq!(get(&wf, "wf-2"), 1);
        assert_eq!(get(&wf, "wf-3"), 0);
    }
}
