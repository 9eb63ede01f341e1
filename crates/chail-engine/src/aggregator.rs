//! Sample aggregation: reduces one pool run into a [`ProbeResult`]

use std::collections::BTreeMap;
use std::time::Duration;

use hdrhistogram::Histogram;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::executor::RequestSample;

/// Latency distribution of the successful samples of one level, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyPercentiles {
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

/// Statistics of one concurrency level
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    /// Number of concurrent clients of the level
    pub client_count: usize,
    /// Mean time to first byte over successful samples; NaN if there were none
    pub avg_time_to_first_byte_ms: f64,
    /// Mean total time over successful samples; NaN if there were none
    pub avg_time_total_ms: f64,
    /// Unsuccessful share of the expected samples (0..=1)
    pub error_rate: f64,
    /// Every observed sample keyed by response code, including `0`
    pub response_codes: BTreeMap<u16, usize>,
    /// Total-time percentiles; `None` without successful samples
    pub latency: Option<LatencyPercentiles>,
    /// Samples the level was expected to produce (clients × repeats)
    pub expected_samples: usize,
    /// Samples that contributed to the averages
    pub successful_samples: usize,
}

impl ProbeResult {
    /// Samples actually observed
    pub fn total_samples(&self) -> usize {
        self.response_codes.values().sum()
    }

    /// The averages are defined
    pub fn has_timings(&self) -> bool {
        self.successful_samples > 0
    }
}

/// Accumulates the samples of a single pool run
pub struct SampleAggregator {
    client_count: usize,
    expected: usize,
    observed: usize,
    successful: usize,
    ttfb_sum: Duration,
    total_sum: Duration,
    response_codes: BTreeMap<u16, usize>,
    latency_us: Histogram<u64>,
}

impl SampleAggregator {
    pub fn new(client_count: usize, repeats: usize) -> Self {
        Self {
            client_count,
            expected: client_count * repeats,
            observed: 0,
            successful: 0,
            ttfb_sum: Duration::ZERO,
            total_sum: Duration::ZERO,
            response_codes: BTreeMap::new(),
            // 1µs to 60s
            latency_us: Histogram::new_with_bounds(1, 60_000_000, 3)
                .expect("Failed to create latency histogram"),
        }
    }

    /// Account for one sample
    pub fn record(&mut self, sample: &RequestSample) {
        self.observed += 1;
        *self.response_codes.entry(sample.response_code).or_insert(0) += 1;

        if let (true, Some(ttfb), Some(total)) = (
            sample.successful,
            sample.time_to_first_byte,
            sample.time_total,
        ) {
            self.successful += 1;
            self.ttfb_sum += ttfb;
            self.total_sum += total;
            self.latency_us
                .saturating_record((total.as_micros() as u64).max(1));
        }
    }

    /// Drain the pool's queue until it closes, then reduce
    pub async fn drain(mut self, samples: &mut mpsc::UnboundedReceiver<RequestSample>) -> ProbeResult {
        while let Some(sample) = samples.recv().await {
            self.record(&sample);
        }
        self.finish()
    }

    pub fn finish(self) -> ProbeResult {
        if self.observed != self.expected {
            warn!(
                "Level {} produced {} of {} samples",
                self.client_count, self.observed, self.expected
            );
        }

        let error_rate = if self.expected > 0 {
            (self.expected - self.successful.min(self.expected)) as f64 / self.expected as f64
        } else {
            0.0
        };

        let latency = (self.successful > 0).then(|| LatencyPercentiles {
            p50_ms: us_to_ms(self.latency_us.value_at_quantile(0.50)),
            p90_ms: us_to_ms(self.latency_us.value_at_quantile(0.90)),
            p99_ms: us_to_ms(self.latency_us.value_at_quantile(0.99)),
            max_ms: us_to_ms(self.latency_us.max()),
        });

        debug!(
            "Level {} aggregated: {} samples, {} successful",
            self.client_count, self.observed, self.successful
        );

        ProbeResult {
            client_count: self.client_count,
            avg_time_to_first_byte_ms: mean_ms(self.ttfb_sum, self.successful),
            avg_time_total_ms: mean_ms(self.total_sum, self.successful),
            error_rate,
            response_codes: self.response_codes,
            latency,
            expected_samples: self.expected,
            successful_samples: self.successful,
        }
    }
}

fn mean_ms(sum: Duration, count: usize) -> f64 {
    if count == 0 {
        return f64::NAN;
    }
    sum.as_secs_f64() * 1_000.0 / count as f64
}

fn us_to_ms(us: u64) -> f64 {
    us as f64 / 1_000.0
}
