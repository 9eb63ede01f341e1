//! # Probe Sweep Controller
//!
//! Escalates concurrency level by level against one target at a time:
//!
//! ```text
//! level 1 ─► pool(1 × R) ─► aggregate ─► history[1] ─► analyze ─► report
//! level 2 ─► pool(2 × R) ─► aggregate ─► history[2] ─► analyze ─► report
//!  ...
//! level N ─► pool(N × R) ─► aggregate ─► history[N] ─► analyze ─► report
//! ```
//!
//! Levels never overlap. Every level runs even when earlier ones failed
//! completely; the error rate and the response code histogram are the only
//! signals of a failing target.

use std::sync::Arc;

use reqwest::Url;
use tracing::{debug, info};

use crate::aggregator::ProbeResult;
use crate::client::build_client;
use crate::config::SweepConfig;
use crate::error::Result;
use crate::executor::{ExchangeObserver, Executor, HttpExecutor};
use crate::gradient::{Gradient, GradientAnalyzer};
use crate::pool::ClientWorkerPool;
use crate::request::RequestSpec;

/// Distance of the long-range comparison, also the factor its threshold is scaled by
pub const DECADE: usize = 10;

// ============================================================================
// HISTORY
// ============================================================================

/// Results of one target, one entry per level starting at level 1
#[derive(Debug, Clone, Default)]
pub struct SweepHistory {
    results: Vec<ProbeResult>,
}

impl SweepHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: ProbeResult) {
        debug_assert_eq!(result.client_count, self.results.len() + 1);
        self.results.push(result);
    }

    /// Result of the given concurrency level (1-based)
    pub fn level(&self, level: usize) -> Option<&ProbeResult> {
        level.checked_sub(1).and_then(|i| self.results.get(i))
    }

    pub fn latest(&self) -> Option<&ProbeResult> {
        self.results.last()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter()
    }
}

// ============================================================================
// REPORTING
// ============================================================================

/// Everything produced for one level
#[derive(Debug, Clone)]
pub struct LevelReport {
    pub result: ProbeResult,
    /// Comparison with the previous level
    pub step: Option<Gradient>,
    /// Comparison with the level ten steps back
    pub decade: Option<Gradient>,
}

/// Consumer of sweep progress, typically a terminal formatter
pub trait SweepReporter {
    fn on_target(&mut self, _url: &Url) {}

    fn on_level(&mut self, report: &LevelReport);

    fn on_complete(&mut self, _url: &Url, _history: &SweepHistory) {}
}

// ============================================================================
// CONTROLLER
// ============================================================================

/// Drives a sweep from one client up to the configured ceiling
pub struct ProbeSweepController {
    config: SweepConfig,
    pool: ClientWorkerPool,
    analyzer: GradientAnalyzer,
}

impl ProbeSweepController {
    /// Controller over a custom executor; the configuration is validated here
    pub fn new(config: SweepConfig, executor: Arc<dyn Executor>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            analyzer: GradientAnalyzer::new(config.accepted_gradient),
            pool: ClientWorkerPool::new(executor),
            config,
        })
    }

    /// Controller over the shared HTTP client built from `config`
    pub fn from_config(
        config: SweepConfig,
        observer: Option<Arc<dyn ExchangeObserver>>,
    ) -> Result<Self> {
        config.validate()?;
        let client = build_client(&config.client_settings())?;
        let mut executor = HttpExecutor::new(client);
        if let Some(observer) = observer {
            executor = executor.with_observer(observer);
        }
        Self::new(config, Arc::new(executor))
    }

    /// Sweep one target with a fresh history
    pub async fn run<R>(&self, spec: &RequestSpec, reporter: &mut R) -> SweepHistory
    where
        R: SweepReporter + ?Sized,
    {
        let spec = Arc::new(spec.clone());
        let repeats = self.config.repeats;
        let mut history = SweepHistory::new();

        info!(
            "Sweeping {} up to {} clients, {} requests each",
            spec.url(),
            self.config.max_clients,
            repeats
        );
        reporter.on_target(spec.url());

        for level in 1..=self.config.max_clients {
            debug!("Level {}: starting {} clients", level, level);
            let result = self.pool.run(spec.clone(), level, repeats).await;
            let report = self.assess(&history, result);
            history.push(report.result.clone());

            debug!(
                "Level {}: avg={:.2} ms, err={:.3}",
                level, report.result.avg_time_total_ms, report.result.error_rate
            );
            reporter.on_level(&report);
        }

        info!("Sweep of {} complete", spec.url());
        reporter.on_complete(spec.url(), &history);
        history
    }

    /// Sweep several targets one after another
    pub async fn run_targets<R>(&self, specs: &[RequestSpec], reporter: &mut R) -> Vec<SweepHistory>
    where
        R: SweepReporter + ?Sized,
    {
        let mut histories = Vec::with_capacity(specs.len());
        for spec in specs {
            histories.push(self.run(spec, &mut *reporter).await);
        }
        histories
    }

    /// Compare a fresh result against the levels recorded before it
    fn assess(&self, history: &SweepHistory, current: ProbeResult) -> LevelReport {
        let level = current.client_count;
        let step = self.analyzer.analyze(&current, history.latest(), 1.0);
        let decade = if level > DECADE {
            self.analyzer
                .analyze(&current, history.level(level - DECADE), DECADE as f64)
        } else {
            None
        };

        LevelReport {
            result: current,
            step,
            decade,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::executor::RequestSample;
    use crate::gradient::Severity;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// 10ms responses for the first `fast_calls` requests, 200ms afterwards
    struct SlowdownExecutor {
        calls: AtomicUsize,
        fast_calls: usize,
    }

    #[async_trait]
    impl Executor for SlowdownExecutor {
        async fn execute(&self, _spec: &RequestSpec) -> RequestSample {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let latency = if call < self.fast_calls {
                Duration::from_millis(10)
            } else {
                Duration::from_millis(200)
            };
            tokio::time::sleep(latency).await;
            RequestSample::response(200, latency, Some(latency))
        }
    }

    /// Answers every request with the same 5ms latency
    struct ConstantExecutor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Executor for ConstantExecutor {
        async fn execute(&self, _spec: &RequestSpec) -> RequestSample {
            self.calls.fetch_add(1, Ordering::SeqCst);
            RequestSample::response(200, Duration::from_millis(1), Some(Duration::from_millis(5)))
        }
    }

    struct FailingExecutor;

    #[async_trait]
    impl Executor for FailingExecutor {
        async fn execute(&self, _spec: &RequestSpec) -> RequestSample {
            RequestSample::no_response()
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        targets: Vec<String>,
        levels: Vec<LevelReport>,
        completed: usize,
    }

    impl SweepReporter for RecordingReporter {
        fn on_target(&mut self, url: &Url) {
            self.targets.push(url.to_string());
        }

        fn on_level(&mut self, report: &LevelReport) {
            self.levels.push(report.clone());
        }

        fn on_complete(&mut self, _url: &Url, _history: &SweepHistory) {
            self.completed += 1;
        }
    }

    fn config(max_clients: usize, repeats: usize) -> SweepConfig {
        SweepConfig {
            max_clients,
            repeats,
            ..Default::default()
        }
    }

    fn spec() -> RequestSpec {
        RequestSpec::get("http://localhost:8080/").unwrap()
    }

    #[test]
    fn test_rejects_invalid_config_before_running() {
        let result = ProbeSweepController::new(config(0, 1), Arc::new(FailingExecutor));
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_history_is_one_based() {
        let mut history = SweepHistory::new();
        assert!(history.level(0).is_none());
        assert!(history.latest().is_none());

        history.push(ProbeResult {
            client_count: 1,
            avg_time_to_first_byte_ms: 1.0,
            avg_time_total_ms: 2.0,
            error_rate: 0.0,
            response_codes: Default::default(),
            latency: None,
            expected_samples: 1,
            successful_samples: 1,
        });
        assert_eq!(history.level(1).map(|r| r.client_count), Some(1));
        assert!(history.level(2).is_none());
        assert_eq!(history.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slowdown_is_critical() {
        // Levels 1 and 2 with two requests per client make six fast calls.
        let executor = Arc::new(SlowdownExecutor {
            calls: AtomicUsize::new(0),
            fast_calls: 6,
        });
        let controller = ProbeSweepController::new(config(3, 2), executor).unwrap();
        let mut reporter = RecordingReporter::default();

        let history = controller.run(&spec(), &mut reporter).await;

        assert_eq!(history.len(), 3);
        for (i, result) in history.iter().enumerate() {
            assert_eq!(result.client_count, i + 1);
            assert_eq!(result.error_rate, 0.0);
        }

        assert!(reporter.levels[0].step.is_none());
        let step = reporter.levels[2].step.unwrap();
        assert_eq!(step.distance, 1);
        assert!((step.ratio - 20.0).abs() < 1e-9);
        assert_eq!(step.severity, Severity::Critical);
        assert!(reporter.levels.iter().all(|r| r.decade.is_none()));
    }

    #[tokio::test]
    async fn test_decade_comparison_after_ten_levels() {
        let executor = Arc::new(ConstantExecutor {
            calls: AtomicUsize::new(0),
        });
        let controller = ProbeSweepController::new(config(12, 1), executor.clone()).unwrap();
        let mut reporter = RecordingReporter::default();

        controller.run(&spec(), &mut reporter).await;

        assert_eq!(executor.calls.load(Ordering::SeqCst), (1..=12).sum::<usize>());
        assert_eq!(reporter.levels.len(), 12);
        assert!(reporter.levels[..10].iter().all(|r| r.decade.is_none()));

        let decade = reporter.levels[10].decade.unwrap();
        assert_eq!(decade.distance, 10);
        assert_eq!(decade.severity, Severity::Improving);
        assert!(reporter.levels[11].decade.is_some());
        assert!(reporter.levels[1..].iter().all(|r| r.step.is_some()));
    }

    #[tokio::test]
    async fn test_failing_target_runs_every_level() {
        let controller = ProbeSweepController::new(config(4, 3), Arc::new(FailingExecutor)).unwrap();
        let mut reporter = RecordingReporter::default();

        let history = controller.run(&spec(), &mut reporter).await;

        assert_eq!(history.len(), 4);
        for result in history.iter() {
            assert_eq!(result.error_rate, 1.0);
            assert_eq!(result.response_codes.get(&0), Some(&(result.client_count * 3)));
        }
        assert!(reporter.levels.iter().all(|r| r.step.is_none()));
    }

    #[tokio::test]
    async fn test_targets_get_fresh_histories() {
        let controller = ProbeSweepController::new(
            config(2, 1),
            Arc::new(ConstantExecutor {
                calls: AtomicUsize::new(0),
            }),
        )
        .unwrap();
        let mut reporter = RecordingReporter::default();
        let specs = vec![
            spec(),
            RequestSpec::get("http://localhost:9090/other").unwrap(),
        ];

        let histories = controller.run_targets(&specs, &mut reporter).await;

        assert_eq!(histories.len(), 2);
        assert!(histories.iter().all(|h| h.len() == 2));
        assert_eq!(reporter.targets.len(), 2);
        assert_eq!(reporter.completed, 2);
        assert!(reporter.levels[2].step.is_none());
    }
}
