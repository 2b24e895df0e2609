//! Restart policy evaluation.
//!
//! Applies the configured budget and backoff to a classification and the
//! node's current restart count. Rules are evaluated strictly in order;
//! in particular a disabled policy short-circuits before the counter is
//! even considered.

use chrono::{DateTime, Utc};

use super::classifier::Classification;
use crate::tasks::config::FailedPodRestart;

/// Reason recorded when the restart feature is off.
pub const REASON_RESTART_DISABLED: &str = "restart disabled";

/// Reason recorded when the node's restart budget is spent.
pub const REASON_MAX_RESTARTS_EXCEEDED: &str = "max restarts exceeded";

/// What the coordinator should do with a failed pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Schedule a replacement pod
    Restart,
    /// Fail the node with the given reason
    Fail(String),
    /// Backoff is still in effect; revisit at the given time
    Defer(DateTime<Utc>),
}

pub fn decide(
    classification: &Classification,
    current_count: i32,
    config: Option<&FailedPodRestart>,
    now: DateTime<Utc>,
    last_attempt_at: Option<DateTime<Utc>>,
) -> Command {
    let Some(config) = config.filter(|config| config.enabled) else {
        return Command::Fail(REASON_RESTART_DISABLED.to_string());
    };

    if !classification.should_restart {
        return Command::Fail(classification.reason.clone());
    }

    if current_count >= config.max_restarts() {
        return Command::Fail(REASON_MAX_RESTARTS_EXCEEDED.to_string());
    }

    if let Some(last_attempt_at) = last_attempt_at {
        let backoff = config.backoff();
        if now - last_attempt_at < backoff {
            return Command::Defer(last_attempt_at + backoff);
        }
    }

    Command::Restart
}
