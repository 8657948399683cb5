//! Single-consumer job queue that serializes store mutations.
//!
//! Every job goes onto one unbounded channel and a single worker task runs
//! them strictly one after another. Each job body runs in its own spawned
//! task, so a panic is caught there and reported to that job's caller as
//! `TransformPanicked`; the worker moves on to the next job. A reply that
//! never arrives means the worker itself went away (runtime shutdown) and is
//! reported as `QueueClosed`.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::{mpsc, oneshot};

use crate::error::{StoreError, StoreResult};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, Clone)]
pub struct MutationQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl MutationQueue {
    /// Start the worker on the current tokio runtime.
    pub fn start() -> StoreResult<Self> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
        let (tx, rx) = mpsc::unbounded_channel();
        handle.spawn(worker(rx));
        Ok(Self { tx })
    }

    /// Enqueue `job` and wait for its output.
    ///
    /// Jobs run in submission order. A job that panics yields
    /// `StoreError::TransformPanicked`; a queue torn down before the job
    /// finished yields `StoreError::QueueClosed`.
    pub async fn run<T, F>(&self, job: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let boxed: Job = Box::pin(async move {
            let outcome = tokio::spawn(job).await.map_err(|e| {
                if e.is_panic() {
                    tracing::warn!(error = %e, "store job panicked; continuing with next job");
                    StoreError::TransformPanicked
                } else {
                    StoreError::QueueClosed
                }
            });
            // The caller may have stopped waiting; the job still ran.
            let _ = reply_tx.send(outcome);
        });
        self.tx.send(boxed).map_err(|_| StoreError::QueueClosed)?;
        reply_rx.await.map_err(|_| StoreError::QueueClosed)?
    }
}

async fn worker(mut rx: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = rx.recv().await {
        job.await;
    }
    tracing::debug!("store queue closed");
}
