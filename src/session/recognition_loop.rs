//! Recognition loop task body
//!
//! Pull, gate, forward. The gate is sampled only after a pull returns,
//! and a stop request is only seen between pulls; a pull that never
//! returns keeps the loop (and `active`) alive indefinitely.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::dispatch::Dispatcher;
use crate::events::{DiscardReason, ExitReason, SessionEvent};

use super::recognition::RecognitionSource;
use super::state::{Generation, SessionState};

/// Everything one loop instance needs, moved onto its worker
pub struct RecognitionLoop {
    state: Arc<SessionState>,
    generation: Generation,
    source: Arc<dyn RecognitionSource>,
    dispatcher: Dispatcher,
    prune_cache: bool,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl RecognitionLoop {
    pub fn new(
        state: Arc<SessionState>,
        generation: Generation,
        source: Arc<dyn RecognitionSource>,
        dispatcher: Dispatcher,
        prune_cache: bool,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            state,
            generation,
            source,
            dispatcher,
            prune_cache,
            event_tx,
        }
    }

    /// Run until a pull fails or a stop request is observed
    pub fn run(self) {
        info!(generation = self.generation, "recognition loop started");
        let _ = self.event_tx.send(SessionEvent::RecognitionStarted);

        // The engine may already be primed, so a failed start is not fatal
        if let Err(e) = self.source.start_engine(self.prune_cache) {
            warn!(?e, "engine start failed, listening anyway");
            let _ = self.event_tx.send(SessionEvent::EngineStartFailed {
                message: e.to_string(),
            });
        }

        self.state.mark_listening();
        info!(phase = %self.state.phase(), "recognition loop listening");

        let reason = self.pull_loop();

        self.state.finish(self.generation);
        info!(?reason, "recognition loop exited");
        let _ = self
            .event_tx
            .send(SessionEvent::RecognitionExited { reason });
    }

    fn pull_loop(&self) -> ExitReason {
        while self.state.should_continue(self.generation) {
            let result = match self.source.pull_result() {
                Ok(result) => result,
                Err(e) => {
                    error!(?e, "recognition failed, stopping loop");
                    return ExitReason::Failed {
                        message: e.to_string(),
                    };
                }
            };

            if self.state.is_suppressing() {
                debug!("ignoring speech recognition result");
                self.discarded(DiscardReason::Suppressed);
                continue;
            }

            let utterance = match result {
                Some(utterance) if !utterance.is_empty() => utterance,
                _ => {
                    debug!("utterance not understood");
                    self.discarded(DiscardReason::NotUnderstood);
                    continue;
                }
            };

            info!(text = %utterance.text, "utterance recognized");
            let text = utterance.text.clone();
            match self.dispatcher.dispatch(utterance) {
                Ok(()) => {
                    let _ = self
                        .event_tx
                        .send(SessionEvent::UtteranceDispatched { text });
                }
                Err(e) => {
                    let _ = self.event_tx.send(SessionEvent::DispatchFailed {
                        text,
                        message: e.to_string(),
                    });
                }
            }
        }

        debug!("stop requested, leaving pull loop");
        ExitReason::Stopped
    }

    fn discarded(&self, reason: DiscardReason) {
        let _ = self
            .event_tx
            .send(SessionEvent::UtteranceDiscarded { reason });
    }
}
