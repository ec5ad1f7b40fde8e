//! Adaptive fetch controller
//!
//! Sizes each round of concurrent fetches from recent latency and error rate.
//! Shrinking is fast (x0.8) and growing is slow (x1.1), and the grow and shrink
//! thresholds are asymmetric, so the batch settles instead of oscillating.
//!
//! The batch size bounds one round's fan-out only. The HTTP layer keeps its own
//! connection cap.

use crate::config::ControllerConfig;
use std::collections::VecDeque;
use std::time::Duration;

/// Direction of the last adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Shrink,
    Grow,
    Hold,
}

/// Per-node batch-size controller
#[derive(Debug, Clone)]
pub struct AdaptiveController {
    config: ControllerConfig,
    batch_size: usize,
    latencies: VecDeque<Duration>,
    successes: u64,
    errors: u64,
}

impl AdaptiveController {
    pub fn new(config: ControllerConfig) -> Self {
        let batch_size = config
            .initial_batch_size
            .clamp(config.min_batch_size, config.max_batch_size);
        Self {
            latencies: VecDeque::with_capacity(config.latency_window),
            config,
            batch_size,
            successes: 0,
            errors: 0,
        }
    }

    /// The size to use for the next round
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Records a healthy response (including "no such record")
    pub fn record_success(&mut self, latency: Duration) {
        self.push_latency(latency);
        self.successes += 1;
        self.maybe_reset_counters();
    }

    /// Records a transient failure
    pub fn record_error(&mut self, latency: Duration) {
        self.push_latency(latency);
        self.errors += 1;
        self.maybe_reset_counters();
    }

    /// Mean latency over the window, if any samples exist
    pub fn average_latency(&self) -> Option<Duration> {
        if self.latencies.is_empty() {
            return None;
        }
        let total: Duration = self.latencies.iter().sum();
        Some(total / self.latencies.len() as u32)
    }

    /// Error rate over the recent counters; 0 until enough samples exist
    pub fn error_rate(&self) -> f64 {
        let total = self.successes + self.errors;
        if total < self.config.min_samples || total == 0 {
            return 0.0;
        }
        self.errors as f64 / total as f64
    }

    /// Re-sizes the batch after a round and returns the new size
    pub fn adjust(&mut self) -> usize {
        match self.decide() {
            Adjustment::Shrink => {
                let next = (self.batch_size * 4 / 5).max(self.config.min_batch_size);
                if next != self.batch_size {
                    tracing::debug!("Shrinking batch {} -> {}", self.batch_size, next);
                }
                self.batch_size = next;
            }
            Adjustment::Grow => {
                let next = ((self.batch_size * 11 + 9) / 10).min(self.config.max_batch_size);
                if next != self.batch_size {
                    tracing::debug!("Growing batch {} -> {}", self.batch_size, next);
                }
                self.batch_size = next;
            }
            Adjustment::Hold => {}
        }
        self.batch_size
    }

    /// Which way the next [`adjust`](Self::adjust) would move
    pub fn decide(&self) -> Adjustment {
        let Some(avg) = self.average_latency() else {
            return Adjustment::Hold;
        };
        let avg_ms = avg.as_millis() as u64;
        let error_rate = self.error_rate();

        if avg_ms > self.config.throttle_latency_ms || error_rate > self.config.error_rate_threshold {
            Adjustment::Shrink
        } else if avg_ms < self.config.comfortable_latency_ms
            && error_rate < self.config.low_error_rate
        {
            Adjustment::Grow
        } else {
            Adjustment::Hold
        }
    }

    fn push_latency(&mut self, latency: Duration) {
        if self.latencies.len() == self.config.latency_window {
            self.latencies.pop_front();
        }
        self.latencies.push_back(latency);
    }

    fn maybe_reset_counters(&mut self) {
        if self.successes + self.errors > self.config.counter_reset {
            self.successes = 0;
            self.errors = 0;
        }
    }
}
