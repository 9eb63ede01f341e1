//! # chail probing engine
//!
//! Escalates the number of concurrent virtual clients against an HTTP target
//! and flags the point where response time grows faster than linearly.
//!
//! ## Components
//!
//! - [`executor`]: one request/response cycle, turned into a [`RequestSample`]
//! - [`pool`]: `C` concurrent clients issuing `R` sequential requests each
//! - [`aggregator`]: reduces the samples of one level into a [`ProbeResult`]
//! - [`sweep`]: runs levels `1..=N` in order and keeps the [`SweepHistory`]
//! - [`gradient`]: classifies the latency ratio between two levels
//!
//! ## Usage
//!
//! ```no_run
//! use chail_engine::{LevelReport, ProbeSweepController, RequestSpec, SweepConfig, SweepReporter};
//!
//! struct Print;
//!
//! impl SweepReporter for Print {
//!     fn on_level(&mut self, report: &LevelReport) {
//!         println!("{}: {:.2} ms", report.result.client_count, report.result.avg_time_total_ms);
//!     }
//! }
//!
//! # async fn sweep() -> chail_engine::Result<()> {
//! let config = SweepConfig { max_clients: 20, repeats: 5, ..Default::default() };
//! let controller = ProbeSweepController::from_config(config, None)?;
//! let spec = RequestSpec::get("http://localhost:8080/health")?;
//! controller.run(&spec, &mut Print).await;
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod gradient;
pub mod pool;
pub mod request;
pub mod sweep;

pub use aggregator::{LatencyPercentiles, ProbeResult, SampleAggregator};
pub use client::build_client;
pub use config::{ClientSettings, SweepConfig, TlsPolicy};
pub use error::{EngineError, Result};
pub use executor::{
    ExchangeObserver, Executor, HttpExecutor, RequestDescriptor, RequestSample,
    ResponseDescriptor, TransportFailure, NO_RESPONSE,
};
pub use gradient::{Gradient, GradientAnalyzer, Severity};
pub use pool::{ClientWorkerPool, PoolRun};
pub use request::RequestSpec;
pub use sweep::{LevelReport, ProbeSweepController, SweepHistory, SweepReporter, DECADE};
