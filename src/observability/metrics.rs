//! Metrics for permission checks and cache refreshes
//!
//! Metrics are emitted through the `metrics` facade. Without an installed
//! recorder every call is a no-op, so the host application decides whether
//! and where they are exported.
//!
//! # Cardinality Control
//!
//! - Labels carry resource names and outcomes only
//! - Principal ids and permission codes never become labels
//! - Unknown resources are folded into `"other"` past a fixed limit

use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use parking_lot::Mutex;

/// Maximum distinct resource labels before folding into "other"
const MAX_RESOURCE_LABELS: usize = 50;

static RESOURCE_LABELS: OnceLock<ResourceLabels> = OnceLock::new();

/// Outcome of a cache refresh attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Success,
    Failure,
    Skipped,
}

impl RefreshOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshOutcome::Success => "success",
            RefreshOutcome::Failure => "failure",
            RefreshOutcome::Skipped => "skipped",
        }
    }
}

/// Cardinality limiter for resource labels
pub struct ResourceLabels {
    max_labels: usize,
    seen: Mutex<HashSet<String>>,
}

impl ResourceLabels {
    pub fn new(max_labels: usize) -> Self {
        Self {
            max_labels,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Label for `resource`, or `"other"` once the limit is reached
    pub fn label(&self, resource: &str) -> String {
        let mut seen = self.seen.lock();

        if seen.contains(resource) {
            return resource.to_string();
        }
        if seen.len() < self.max_labels {
            seen.insert(resource.to_string());
            return resource.to_string();
        }
        "other".to_string()
    }
}

/// Resource label from the process-wide limiter
pub fn resource_label(resource: &str) -> String {
    RESOURCE_LABELS
        .get_or_init(|| ResourceLabels::new(MAX_RESOURCE_LABELS))
        .label(resource)
}

/// Record a boolean permission check
pub fn record_permission_check(resource: &str, allowed: bool, via_superuser: bool) {
    let result = if allowed { "allowed" } else { "denied" };
    let source = if via_superuser { "superuser" } else { "role" };

    counter!(
        "permission_check_total",
        "resource" => resource_label(resource),
        "result" => result,
        "source" => source
    )
    .increment(1);
}

/// Record a cache refresh attempt and its duration
pub fn record_cache_refresh(outcome: RefreshOutcome, duration: Duration) {
    counter!("permission_cache_refresh_total", "outcome" => outcome.as_str()).increment(1);

    if outcome != RefreshOutcome::Skipped {
        histogram!("permission_cache_refresh_duration_seconds", "outcome" => outcome.as_str())
            .record(duration.as_secs_f64());
    }
}

/// Record the number of cached permission records
pub fn record_cache_size(entries: usize) {
    gauge!("permission_cache_entries").set(entries as f64);
}
