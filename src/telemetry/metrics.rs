//! Decode metrics recorded through the `metrics` facade.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

const DECODE_CALLS: &str = "nmt_decode_calls_total";
const DECODE_ITEMS: &str = "nmt_decode_items_total";
const DECODE_STEPS: &str = "nmt_decode_steps";
const DECODE_LATENCY: &str = "nmt_decode_latency_seconds";
const NUMERIC_ANOMALIES: &str = "nmt_numeric_anomalies_total";
const SKIPPED_ITEMS: &str = "nmt_skipped_items_total";
const SHARD_ITEMS: &str = "nmt_shard_items";

/// Register descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(DECODE_CALLS, Unit::Count, "Beam decode calls completed");
    describe_counter!(DECODE_ITEMS, Unit::Count, "Batch items submitted to beam decode");
    describe_histogram!(DECODE_STEPS, Unit::Count, "Steps executed per decode call");
    describe_histogram!(DECODE_LATENCY, Unit::Seconds, "Wall time per decode call");
    describe_counter!(NUMERIC_ANOMALIES, Unit::Count, "Non-finite log-probabilities replaced");
    describe_counter!(SKIPPED_ITEMS, Unit::Count, "Empty sources that bypassed decoding");
    describe_histogram!(SHARD_ITEMS, Unit::Count, "Batch items per decode shard");
}

/// Record a completed decode call.
pub fn record_decode(items: usize, steps: usize, latency: Duration) {
    counter!(DECODE_CALLS).increment(1);
    counter!(DECODE_ITEMS).increment(items as u64);
    histogram!(DECODE_STEPS).record(steps as f64);
    histogram!(DECODE_LATENCY).record(latency.as_secs_f64());
}

pub fn record_numeric_anomalies(count: usize) {
    if count > 0 {
        counter!(NUMERIC_ANOMALIES).increment(count as u64);
    }
}

pub fn record_skipped_items(count: usize) {
    if count > 0 {
        counter!(SKIPPED_ITEMS).increment(count as u64);
    }
}

/// Record the size of one shard of a translated batch.
pub fn record_shard(shard: usize, items: usize) {
    histogram!(SHARD_ITEMS, "shard" => shard.to_string()).record(items as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        describe_metrics();
        record_decode(3, 7, Duration::from_millis(5));
        record_numeric_anomalies(2);
        record_skipped_items(0);
        record_shard(1, 4);
    }
}
