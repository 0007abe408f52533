//! Cumulative usage record.

use serde::{Deserialize, Serialize};

/// Additive counters for one model.
///
/// Used both as the per-call delta and as the running total of a store; a
/// total is the [`merge`](Metrics::merge) of its deltas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub attempted_request_count: u64,
    pub successful_response_count: u64,
    pub failed_response_count: u64,
    pub cached_responses: u64,
    pub streaming_responses: u64,
    pub retries: u64,
    pub requests_with_retries: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
    pub compute_duration_seconds: f64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: &Metrics) {
        self.attempted_request_count += other.attempted_request_count;
        self.successful_response_count += other.successful_response_count;
        self.failed_response_count += other.failed_response_count;
        self.cached_responses += other.cached_responses;
        self.streaming_responses += other.streaming_responses;
        self.retries += other.retries;
        self.requests_with_retries += other.requests_with_retries;
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.input_cost += other.input_cost;
        self.output_cost += other.output_cost;
        self.total_cost += other.total_cost;
        self.compute_duration_seconds += other.compute_duration_seconds;
    }

    pub fn is_empty(&self) -> bool {
        *self == Metrics::default()
    }

    fn responses(&self) -> u64 {
        self.successful_response_count + self.failed_response_count
    }

    /// Failed responses over all responses.
    pub fn failure_rate(&self) -> f64 {
        ratio(self.failed_response_count as f64, self.responses())
    }

    /// Cached responses over attempted requests.
    pub fn cache_hit_rate(&self) -> f64 {
        ratio(self.cached_responses as f64, self.attempted_request_count)
    }

    pub fn average_cost_per_response(&self) -> f64 {
        ratio(self.total_cost, self.successful_response_count)
    }

    pub fn average_compute_duration_seconds(&self) -> f64 {
        ratio(self.compute_duration_seconds, self.attempted_request_count)
    }
}

fn ratio(numerator: f64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_is_additive() {
        let mut total = Metrics {
            attempted_request_count: 10,
            total_cost: 0.5,
            ..Default::default()
        };
        total.merge(&Metrics {
            attempted_request_count: 5,
            total_cost: 0.25,
            ..Default::default()
        });
        assert_eq!(total.attempted_request_count, 15);
        assert!((total.total_cost - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_derived_rates() {
        let m = Metrics {
            attempted_request_count: 4,
            successful_response_count: 3,
            failed_response_count: 1,
            cached_responses: 2,
            total_cost: 0.3,
            compute_duration_seconds: 2.0,
            ..Default::default()
        };
        assert!((m.failure_rate() - 0.25).abs() < 1e-12);
        assert!((m.cache_hit_rate() - 0.5).abs() < 1e-12);
        assert!((m.average_cost_per_response() - 0.1).abs() < 1e-12);
        assert!((m.average_compute_duration_seconds() - 0.5).abs() < 1e-12);
        assert_eq!(Metrics::default().failure_rate(), 0.0);
    }
}
