//! Dispatch boundary onto the single-threaded consumer context
//!
//! Accepted utterances leave the worker threads as jobs pushed into a
//! single-consumer queue. Whoever owns the [`ConsumerContext`] drains that
//! queue on one task (or thread), so every job runs exactly once and in
//! submission order.

mod context;

pub use context::{ConsumerContext, ConsumerHandle, Scheduler};

use std::sync::Arc;

use tracing::{debug, warn};

use crate::session::Utterance;

/// A job scheduled onto the consumer context
pub type ConsumerJob = Box<dyn FnOnce() + Send + 'static>;

/// Errors that can occur when scheduling onto the consumer context
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    #[error("consumer context is closed")]
    ContextClosed,
}

/// The decision-making callback that receives accepted utterances
///
/// Always invoked from inside a job running on the consumer context.
pub trait DecisionConsumer: Send + Sync {
    /// React to one accepted utterance
    fn on_utterance(&self, text: &str);
}

impl<F> DecisionConsumer for F
where
    F: Fn(&str) + Send + Sync,
{
    fn on_utterance(&self, text: &str) {
        self(text)
    }
}

/// Hands accepted utterances to the decision consumer via the scheduler
#[derive(Clone)]
pub struct Dispatcher {
    scheduler: Arc<dyn Scheduler>,
    consumer: Arc<dyn DecisionConsumer>,
}

impl Dispatcher {
    /// Create a new dispatcher
    pub fn new(scheduler: Arc<dyn Scheduler>, consumer: Arc<dyn DecisionConsumer>) -> Self {
        Self {
            scheduler,
            consumer,
        }
    }

    /// Schedule the consumer callback for `utterance`
    ///
    /// On failure the utterance is dropped: it is neither retried nor
    /// re-queued. The error is returned so the caller can report it.
    pub fn dispatch(&self, utterance: Utterance) -> Result<(), DispatchError> {
        let consumer = Arc::clone(&self.consumer);
        let text = utterance.text.clone();

        let result = self.scheduler.schedule(Box::new(move || {
            consumer.on_utterance(&utterance.text);
        }));

        match &result {
            Ok(()) => debug!(%text, "utterance scheduled on consumer context"),
            Err(e) => warn!(?e, %text, "failed to schedule utterance, dropping it"),
        }
        result
    }
}
