//! # Prometheus Metrics Collection
//!
//! In-process counters for the workflow controller, exported in
//! Prometheus text format by the binary's `/metrics` route. Increments
//! are synchronous so the exporter and tests always observe them.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Label used when a restart has no extractable cause.
const OTHER_REASON: &str = "other";

/// Central metrics collector
pub struct MetricsCollector {
    /// Replacement pods scheduled after infrastructure failures, by cause
    failed_pod_restarts_total: RwLock<HashMap<String, u64>>,

    /// Workflow reconciliation counters
    reconcile_total: RwLock<u64>,
    reconcile_errors_total: RwLock<u64>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            failed_pod_restarts_total: RwLock::new(HashMap::new()),
            reconcile_total: RwLock::new(0),
            reconcile_errors_total: RwLock::new(0),
        }
    }

    /// Increment the restart counter for the given cause.
    pub fn increment_failed_pod_restarts(&self, reason: &str) {
        let label = if reason.is_empty() {
            OTHER_REASON
        } else {
            reason
        };
        let mut counters = self
            .failed_pod_restarts_total
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *counters.entry(label.to_string()).or_insert(0) += 1;
    }

    pub fn increment_reconciles(&self) {
        let mut count = self
            .reconcile_total
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *count += 1;
    }

    pub fn increment_reconcile_errors(&self) {
        let mut count = self
            .reconcile_errors_total
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *count += 1;
    }

    /// Current restart count for a cause label.
    pub fn failed_pod_restarts(&self, reason: &str) -> u64 {
        self.failed_pod_restarts_total
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(reason)
            .copied()
            .unwrap_or(0)
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus_metrics(&self) -> String {
        let mut output = String::new();

        output.push_str(
            "# HELP workflow_failed_pod_restarts_total Pods replaced after infrastructure failures\n",
        );
        output.push_str("# TYPE workflow_failed_pod_restarts_total counter\n");
        let restarts = self
            .failed_pod_restarts_total
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut labelled: Vec<_> = restarts.iter().collect();
        labelled.sort_by(|a, b| a.0.cmp(b.0));
        for (reason, count) in labelled {
            output.push_str(&format!(
                "workflow_failed_pod_restarts_total{{reason=\"{reason}\"}} {count}\n"
            ));
        }

        output.push_str("# HELP workflow_reconcile_total Workflow reconciliation passes\n");
        output.push_str("# TYPE workflow_reconcile_total counter\n");
        output.push_str(&format!(
            "workflow_reconcile_total {}\n",
            *self
                .reconcile_total
                .read()
                .unwrap_or_else(PoisonError::into_inner)
        ));

        output.push_str("# HELP workflow_reconcile_errors_total Failed reconciliation passes\n");
        output.push_str("# TYPE workflow_reconcile_errors_total counter\n");
        output.push_str(&format!(
            "workflow_reconcile_errors_total {}\n",
            *self
                .reconcile_errors_total
                .read()
                .unwrap_or_else(PoisonError::into_inner)
        ));

        output
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restart_counter_by_reason() {
        let metrics = MetricsCollector::new();
        metrics.increment_failed_pod_restarts("DiskPressure");
        metrics.increment_failed_pod_restarts("DiskPressure");
        metrics.increment_failed_pod_restarts("Preempted");

        assert_eq!(metrics.failed_pod_restarts("DiskPressure"), 2);
        assert_eq!(metrics.failed_pod_restarts("Preempted"), 1);
        assert_eq!(metrics.failed_pod_restarts("NodeShutdown"), 0);
    }

    #[test]
    fn test_empty_reason_is_labelled_other() {
        let metrics = MetricsCollector::new();
        metrics.increment_failed_pod_restarts("");
        assert_eq!(metrics.failed_pod_restarts("other"), 1);
    }

    #[test]
    fn test_prometheus_export_shape() {
        let metrics = MetricsCollector::new();
        metrics.increment_failed_pod_restarts("DiskPressure");
        metrics.increment_reconciles();

        let exported = metrics.export_prometheus_metrics();
        assert!(exported
            .contains("workflow_failed_pod_restarts_total{reason=\"DiskPressure\"} 1\n"));
        assert!(exported.contains("workflow_reconcile_total 1\n"));
        assert!(exported.contains("# TYPE workflow_failed_pod_restarts_total counter\n"));
    }
}
