//! Single-consumer job queue standing in for a UI-style event loop

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{ConsumerJob, DispatchError};

/// Schedules jobs onto a consumer context
///
/// Contract: each accepted job runs exactly once, asynchronously, in the
/// order it was scheduled relative to other jobs from the same producer.
pub trait Scheduler: Send + Sync {
    /// Queue `job` for execution on the consumer context
    fn schedule(&self, job: ConsumerJob) -> Result<(), DispatchError>;
}

/// Producer side of the consumer context; cheap to clone
#[derive(Clone)]
pub struct ConsumerHandle {
    job_tx: mpsc::UnboundedSender<ConsumerJob>,
}

impl Scheduler for ConsumerHandle {
    fn schedule(&self, job: ConsumerJob) -> Result<(), DispatchError> {
        self.job_tx
            .send(job)
            .map_err(|_| DispatchError::ContextClosed)
    }
}

/// The single-threaded side that executes scheduled jobs
///
/// Dropping it closes the context; later schedules fail with
/// [`DispatchError::ContextClosed`].
pub struct ConsumerContext {
    job_rx: mpsc::UnboundedReceiver<ConsumerJob>,
}

impl ConsumerContext {
    /// Create a connected handle/context pair
    pub fn new() -> (ConsumerHandle, ConsumerContext) {
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        (ConsumerHandle { job_tx }, ConsumerContext { job_rx })
    }

    /// Run jobs until every handle has been dropped
    ///
    /// Borrows the context so that jobs still queued when this future is
    /// dropped can be drained afterwards with [`run_pending`](Self::run_pending).
    pub async fn run(&mut self) {
        info!("consumer context running");
        while let Some(job) = self.job_rx.recv().await {
            job();
        }
        info!("consumer context closed");
    }

    /// Same as [`run`](Self::run), for a dedicated non-async thread
    pub fn run_blocking(mut self) {
        info!("consumer context running on dedicated thread");
        while let Some(job) = self.job_rx.blocking_recv() {
            job();
        }
        info!("consumer context closed");
    }

    /// Run whatever is queued right now and return how many jobs ran
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.job_rx.try_recv() {
            job();
            ran += 1;
        }
        if ran > 0 {
            debug!(ran, "consumer context drained pending jobs");
        }
        ran
    }
}
