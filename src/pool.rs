//! Fixed-size worker pool for long-lived session tasks
//!
//! Every worker is a named OS thread pulling boxed jobs off a shared
//! queue. Submission never blocks. Jobs run until they return on their
//! own; the pool never cancels them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

/// The recognition loop and the resource monitor both hold a worker for
/// their whole lifetime, so fewer than two workers would starve one of them.
pub const MIN_WORKERS: usize = 2;

/// A unit of work for the pool
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Errors that can occur in the worker pool
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("worker pool needs at least 2 workers, got {0}")]
    TooSmall(usize),

    #[error("failed to spawn worker thread: {0}")]
    ThreadSpawn(String),

    #[error("worker pool is closed")]
    Closed,
}

/// Fixed-capacity pool of worker threads
pub struct WorkerPool {
    job_tx: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    submitted: AtomicUsize,
    size: usize,
}

impl WorkerPool {
    /// Spawn `size` worker threads named `{name}-{index}`
    pub fn new(name: &str, size: usize) -> Result<Self, PoolError> {
        if size < MIN_WORKERS {
            return Err(PoolError::TooSmall(size));
        }

        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let job_rx = Arc::clone(&job_rx);
            let handle = thread::Builder::new()
                .name(format!("{name}-{index}"))
                .spawn(move || worker_loop(index, job_rx))
                .map_err(|e| PoolError::ThreadSpawn(e.to_string()))?;
            workers.push(handle);
        }

        info!(size, "worker pool started");

        Ok(Self {
            job_tx: Mutex::new(Some(job_tx)),
            workers: Mutex::new(workers),
            submitted: AtomicUsize::new(0),
            size,
        })
    }

    /// Queue a job; returns immediately
    pub fn submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = self.job_tx.lock().unwrap_or_else(|e| e.into_inner());
        let tx = guard.as_ref().ok_or(PoolError::Closed)?;
        tx.send(Box::new(job)).map_err(|_| PoolError::Closed)?;
        self.submitted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Stop accepting jobs. Workers exit once their current job returns.
    pub fn close(&self) {
        let mut guard = self.job_tx.lock().unwrap_or_else(|e| e.into_inner());
        if guard.take().is_some() {
            debug!("worker pool closed to new jobs");
        }
    }

    /// Close the pool and wait for every worker thread to finish
    ///
    /// Blocks for as long as any running job does.
    pub fn join(&self) {
        self.close();
        let workers = {
            let mut guard = self.workers.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        for handle in workers {
            if handle.join().is_err() {
                warn!("worker thread panicked");
            }
        }
        info!("worker pool stopped");
    }

    /// Total number of jobs accepted so far
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.size
    }
}

fn worker_loop(index: usize, job_rx: Arc<Mutex<Receiver<Job>>>) {
    debug!(worker = index, "worker thread started");
    loop {
        // Hold the lock only while waiting for the next job, not while running it
        let job = {
            let rx = job_rx.lock().unwrap_or_else(|e| e.into_inner());
            rx.recv()
        };
        match job {
            Ok(job) => job(),
            Err(_) => break,
        }
    }
    debug!(worker = index, "worker thread stopped");
}
