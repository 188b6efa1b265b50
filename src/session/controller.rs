//! Speech session controller: the public surface of the core
//!
//! Owns the session and monitor state cells, the worker pool, and the
//! event channel. Every runtime operation is infallible from the caller's
//! point of view; failures inside tasks become log lines and events, and
//! callers observe the outcome through `is_active()` / `is_suppressing()`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dispatch::{ConsumerContext, Dispatcher};
use crate::events::SessionEvent;
use crate::monitor::{CaptureProbe, ResourceMonitor, SleepInterrupt};
use crate::pool::{PoolError, WorkerPool};

use super::recognition::RecognitionSource;
use super::recognition_loop::RecognitionLoop;
use super::state::{LoopPhase, MonitorPhase, MonitorState, SessionState};

/// Errors that can occur while building the controller
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("failed to create worker pool: {0}")]
    Pool(#[from] PoolError),
}

/// Controls the recognition loop, the suppression gate and the resource monitor
pub struct SpeechController {
    session: Arc<SessionState>,
    monitor: Arc<MonitorState>,
    // Swapped for a fresh one on every monitor start
    monitor_interrupt: Mutex<Arc<SleepInterrupt>>,
    source: Arc<dyn RecognitionSource>,
    probe: Arc<dyn CaptureProbe>,
    dispatcher: Dispatcher,
    pool: WorkerPool,
    event_tx: broadcast::Sender<SessionEvent>,
    prune_cache: bool,
    monitor_interval: Duration,
}

impl SpeechController {
    /// Create a controller and spin up its worker pool
    ///
    /// Nothing runs until [`start`](Self::start) or
    /// [`start_resource_monitor`](Self::start_resource_monitor) is called.
    pub fn new(
        config: &Config,
        source: Arc<dyn RecognitionSource>,
        probe: Arc<dyn CaptureProbe>,
        dispatcher: Dispatcher,
    ) -> Result<Self, ControllerError> {
        let pool = WorkerPool::new("speech-worker", config.worker_threads)?;
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));

        Ok(Self {
            session: Arc::new(SessionState::new()),
            monitor: Arc::new(MonitorState::new()),
            monitor_interrupt: Mutex::new(Arc::new(SleepInterrupt::new())),
            source,
            probe,
            dispatcher,
            pool,
            event_tx,
            prune_cache: config.prune_cache,
            monitor_interval: config.monitor_interval,
        })
    }

    /// Start the recognition loop
    ///
    /// A no-op while a loop is active. Otherwise closes the suppression
    /// gate, since the first results after an engine (re)start are usually
    /// warm-up noise, and submits a new loop task.
    pub fn start(&self) {
        let Some(generation) = self.session.try_begin() else {
            info!("speech recognition already running");
            return;
        };

        let task = RecognitionLoop::new(
            Arc::clone(&self.session),
            generation,
            Arc::clone(&self.source),
            self.dispatcher.clone(),
            self.prune_cache,
            self.event_tx.clone(),
        );

        match self.pool.submit(move || task.run()) {
            Ok(()) => info!(
                generation,
                phase = %self.session.phase(),
                "speech recognition starting"
            ),
            Err(e) => {
                warn!(?e, "cannot start speech recognition");
                self.session.abandon(generation);
            }
        }
    }

    /// Request a soft stop of the recognition loop
    ///
    /// Takes effect after the in-flight pull returns; `is_active()` stays
    /// true until then. Only the loop active at the time of the call is
    /// stopped; with no active loop this does nothing.
    pub fn stop(&self) {
        if self.session.request_stop() {
            info!(
                generation = self.session.generation(),
                "speech recognition stop requested"
            );
        }
    }

    /// Discard every result until [`stop_suppressing`](Self::stop_suppressing)
    pub fn suppress(&self) {
        self.session.set_suppress(true);
        info!("ignoring speech recognition results");
    }

    /// Forward results to the decision consumer again
    pub fn stop_suppressing(&self) {
        self.session.set_suppress(false);
        info!("no longer ignoring speech recognition results");
    }

    pub fn is_suppressing(&self) -> bool {
        self.session.is_suppressing()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_active()
    }

    pub fn phase(&self) -> LoopPhase {
        self.session.phase()
    }

    /// Start polling for a capture device; a no-op while already running
    pub fn start_resource_monitor(&self) {
        // Claim and install under the lock so a concurrent stop hits either
        // the previous monitor's interrupt or this one's, never a stale one
        let interrupt = {
            let mut current = self
                .monitor_interrupt
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if !self.monitor.try_begin() {
                info!("resource monitor already running");
                return;
            }
            let interrupt = Arc::new(SleepInterrupt::new());
            *current = Arc::clone(&interrupt);
            interrupt
        };

        let task = ResourceMonitor::new(
            Arc::clone(&self.monitor),
            Arc::clone(&self.probe),
            interrupt,
            self.monitor_interval,
            self.event_tx.clone(),
        );

        if let Err(e) = self.pool.submit(move || task.run()) {
            warn!(?e, "cannot start resource monitor");
            self.monitor.finish();
        }
    }

    /// Interrupt the resource monitor's sleep, making it exit
    pub fn stop_resource_monitor(&self) {
        debug!("interrupting resource monitor");
        self.monitor_interrupt
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .interrupt();
    }

    pub fn is_monitor_running(&self) -> bool {
        self.monitor.is_running()
    }

    pub fn monitor_phase(&self) -> MonitorPhase {
        self.monitor.phase()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Number of tasks handed to the worker pool so far
    pub fn submitted_tasks(&self) -> usize {
        self.pool.submitted()
    }

    /// Stop both tasks and refuse new ones
    ///
    /// The recognition loop still finishes its in-flight pull first.
    pub fn shutdown(&self) {
        info!("speech controller shutting down");
        self.stop();
        self.stop_resource_monitor();
        self.pool.close();
    }

    /// Shut down, then run the decision jobs already queued on `context`
    ///
    /// For callers whose consumer context stopped running before the
    /// controller did. Returns how many jobs ran.
    pub fn shutdown_and_drain(&self, context: &mut ConsumerContext) -> usize {
        self.shutdown();
        let drained = context.run_pending();
        if drained > 0 {
            info!(drained, "ran decision jobs queued before shutdown");
        }
        drained
    }

    /// Shut down and wait for the worker threads to finish
    ///
    /// Blocks for as long as an in-flight pull does.
    pub fn join(self) {
        self.shutdown();
        self.pool.join();
    }
}
