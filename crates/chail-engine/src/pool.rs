//! # Client Worker Pool
//!
//! Runs `C` virtual clients concurrently. Each client issues its `R` requests
//! one after another and pushes every sample into a shared queue as soon as
//! it is taken. The queue closes once the last client has finished, which is
//! the join barrier the aggregator waits on.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::aggregator::{ProbeResult, SampleAggregator};
use crate::executor::{Executor, RequestSample};
use crate::request::RequestSpec;

/// Fixed-size group of concurrent virtual clients
#[derive(Clone)]
pub struct ClientWorkerPool {
    executor: Arc<dyn Executor>,
}

/// Workers of one pool run together with their output queue
pub struct PoolRun {
    /// Receives exactly `clients × repeats` samples, then closes
    pub samples: mpsc::UnboundedReceiver<RequestSample>,
    workers: Vec<JoinHandle<()>>,
}

impl PoolRun {
    /// Wait for every worker and report the ones that panicked
    pub async fn join(self) -> usize {
        let mut failed = 0;
        for (id, outcome) in join_all(self.workers).await.into_iter().enumerate() {
            if let Err(e) = outcome {
                error!("Client {} terminated abnormally: {}", id, e);
                failed += 1;
            }
        }
        failed
    }
}

impl ClientWorkerPool {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    /// Launch `clients` workers issuing `repeats` sequential requests each
    pub fn spawn(&self, spec: Arc<RequestSpec>, clients: usize, repeats: usize) -> PoolRun {
        let (tx, samples) = mpsc::unbounded_channel();

        let workers = (0..clients)
            .map(|id| {
                let executor = self.executor.clone();
                let spec = spec.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    run_client(id, executor, spec, repeats, tx).await;
                })
            })
            .collect();

        // Workers hold the only senders left: the queue closes when the last one returns.
        drop(tx);

        PoolRun { samples, workers }
    }

    /// Run one concurrency level to completion and aggregate its samples
    pub async fn run(&self, spec: Arc<RequestSpec>, clients: usize, repeats: usize) -> ProbeResult {
        let mut run = self.spawn(spec, clients, repeats);
        let result = SampleAggregator::new(clients, repeats)
            .drain(&mut run.samples)
            .await;
        run.join().await;
        result
    }
}

async fn run_client(
    id: usize,
    executor: Arc<dyn Executor>,
    spec: Arc<RequestSpec>,
    repeats: usize,
    samples: mpsc::UnboundedSender<RequestSample>,
) {
    for _ in 0..repeats {
        let sample = executor.execute(&spec).await;
        if samples.send(sample).is_err() {
            debug!("Client {} stopped: sample queue closed", id);
            return;
        }
    }
}
