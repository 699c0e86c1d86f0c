//! Metric names and descriptions
//!
//! Recording goes through the `metrics` facade; without an installed
//! recorder every call is a no-op.

use metrics::{counter, describe_counter, describe_gauge, gauge};

pub const MUTATIONS_TOTAL: &str = "docstore.mutations.total";
pub const VALIDATION_FAILURES: &str = "docstore.validation.failures";
pub const BROKER_EVENTS_PUBLISHED: &str = "docstore.broker.events.published";
pub const BROKER_SUBSCRIBERS: &str = "docstore.broker.subscribers";
pub const BROKER_LAGGED_DISCONNECTS: &str = "docstore.broker.lagged_disconnects";

/// Register descriptions with the installed recorder
pub fn init_metrics() {
    describe_counter!(MUTATIONS_TOTAL, "Successful mutations, labelled by event kind");
    describe_counter!(VALIDATION_FAILURES, "Writes rejected by the validation gate");
    describe_counter!(BROKER_EVENTS_PUBLISHED, "Change events handed to the broker");
    describe_gauge!(BROKER_SUBSCRIBERS, "Currently connected change stream subscribers");
    describe_counter!(
        BROKER_LAGGED_DISCONNECTS,
        "Subscribers disconnected because their queue overflowed"
    );
}

pub(crate) fn record_mutation(kind: &'static str) {
    counter!(MUTATIONS_TOTAL, "kind" => kind).increment(1);
}

pub(crate) fn record_validation_failure() {
    counter!(VALIDATION_FAILURES).increment(1);
}

pub(crate) fn record_published() {
    counter!(BROKER_EVENTS_PUBLISHED).increment(1);
}

pub(crate) fn record_lagged_disconnects(count: usize) {
    counter!(BROKER_LAGGED_DISCONNECTS).increment(count as u64);
}

pub(crate) fn record_subscriber_count(count: usize) {
    gauge!(BROKER_SUBSCRIBERS).set(count as f64);
}
