//! Prometheus-compatible counters for the submission lifecycle.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `submission_commands_total` | Counter | `command`, `outcome` |
//! | `submission_worker_items_total` | Counter | `job` |
//! | `submission_worker_run_seconds` | Histogram | `job` |
//! | `submission_outbox_relay_total` | Counter | `outcome` |
//! | `submission_inbound_events_total` | Counter | `topic`, `outcome` |
//!
//! Values go through the `metrics` facade; the API binary installs the Prometheus recorder.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};

pub mod names {
    pub const COMMANDS_TOTAL: &str = "submission_commands_total";
    pub const WORKER_ITEMS_TOTAL: &str = "submission_worker_items_total";
    pub const WORKER_RUN_SECONDS: &str = "submission_worker_run_seconds";
    pub const OUTBOX_RELAY_TOTAL: &str = "submission_outbox_relay_total";
    pub const INBOUND_EVENTS_TOTAL: &str = "submission_inbound_events_total";
}

pub mod labels {
    pub const COMMAND: &str = "command";
    pub const OUTCOME: &str = "outcome";
    pub const JOB: &str = "job";
    pub const TOPIC: &str = "topic";
}

/// Register help text with whichever recorder is installed.
pub fn describe() {
    describe_counter!(
        names::COMMANDS_TOTAL,
        "Submission commands by command name and outcome code"
    );
    describe_counter!(
        names::WORKER_ITEMS_TOTAL,
        "Submissions transitioned by reconciliation workers"
    );
    describe_histogram!(
        names::WORKER_RUN_SECONDS,
        "Wall time of a single reconciliation worker run"
    );
    describe_counter!(
        names::OUTBOX_RELAY_TOTAL,
        "Outbox rows handled by the relay, by outcome"
    );
    describe_counter!(
        names::INBOUND_EVENTS_TOTAL,
        "Inbound events by topic and dedup outcome"
    );
}

/// `outcome` is `ok`, `replayed`, or the error code.
pub fn record_command(command: &'static str, outcome: &'static str) {
    counter!(
        names::COMMANDS_TOTAL,
        labels::COMMAND => command,
        labels::OUTCOME => outcome,
    )
    .increment(1);
}

pub fn record_worker_items(job: &'static str, count: usize) {
    counter!(names::WORKER_ITEMS_TOTAL, labels::JOB => job).increment(count as u64);
}

pub fn observe_worker_run(job: &'static str, elapsed: Duration) {
    histogram!(names::WORKER_RUN_SECONDS, labels::JOB => job).record(elapsed.as_secs_f64());
}

pub fn record_relay(outcome: &'static str, count: usize) {
    if count == 0 {
        return;
    }
    counter!(names::OUTBOX_RELAY_TOTAL, labels::OUTCOME => outcome).increment(count as u64);
}

pub fn record_inbound(topic: &'static str, outcome: &'static str) {
    counter!(
        names::INBOUND_EVENTS_TOTAL,
        labels::TOPIC => topic,
        labels::OUTCOME => outcome,
    )
    .increment(1);
}
