//! Metrics collection.
//!
//! # Metrics
//! - `bridge_invocations_total` (counter): invocations by event source, status
//! - `bridge_invocation_duration_seconds` (histogram): proxy latency by source
//! - `bridge_cold_start_overruns_total` (counter): bootstraps that outlived
//!   the startup budget
//! - `bridge_cold_start_duration_seconds` (histogram): bootstrap time
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; the host installs the exporter
//! - Labels for event source and status code

use std::time::Duration;

use crate::model::event::RequestSource;

/// `status` is `None` when the error was returned unmapped.
pub fn record_invocation(source: RequestSource, status: Option<u16>, elapsed: Duration) {
    let status = status.map_or_else(|| "error".to_string(), |s| s.to_string());
    metrics::counter!(
        "bridge_invocations_total",
        "source" => source.as_str(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!("bridge_invocation_duration_seconds", "source" => source.as_str())
        .record(elapsed.as_secs_f64());
}

pub fn record_cold_start_overrun() {
    metrics::counter!("bridge_cold_start_overruns_total").increment(1);
}

pub fn record_cold_start_duration(elapsed: Duration) {
    metrics::histogram!("bridge_cold_start_duration_seconds").record(elapsed.as_secs_f64());
}
