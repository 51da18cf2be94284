use crate::transport::Verb;

const NETWORK_FETCHES_METRIC_NAME: &str = "cache_network_fetches";
const DEDUPLICATED_FETCHES_METRIC_NAME: &str = "cache_deduplicated_fetches";
const STALE_RESPONSES_METRIC_NAME: &str = "cache_stale_responses_discarded";
const INVALIDATED_ENTRIES_METRIC_NAME: &str = "cache_entries_invalidated";
const EVICTED_ENTRIES_METRIC_NAME: &str = "cache_entries_evicted";
const MUTATIONS_METRIC_NAME: &str = "mutations_total";

#[inline]
pub fn increment_network_fetches(resource: &'static str) {
    metrics::counter!(NETWORK_FETCHES_METRIC_NAME, "resource" => resource).increment(1);
}

#[inline]
pub fn increment_deduplicated_fetches(resource: &'static str) {
    metrics::counter!(DEDUPLICATED_FETCHES_METRIC_NAME, "resource" => resource).increment(1);
}

#[inline]
pub fn increment_stale_responses(resource: &'static str) {
    metrics::counter!(STALE_RESPONSES_METRIC_NAME, "resource" => resource).increment(1);
}

#[inline]
pub fn increment_invalidated_by(amt: usize) {
    metrics::counter!(INVALIDATED_ENTRIES_METRIC_NAME).increment(amt as u64);
}

#[inline]
pub fn increment_evicted_by(amt: usize) {
    metrics::counter!(EVICTED_ENTRIES_METRIC_NAME).increment(amt as u64);
}

#[inline]
pub fn increment_mutations(verb: Verb, succeeded: bool) {
    let outcome = if succeeded { "success" } else { "failure" };
    metrics::counter!(MUTATIONS_METRIC_NAME, "method" => verb.method(), "outcome" => outcome)
        .increment(1);
}
