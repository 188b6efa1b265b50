//! Events module for session observers
//!
//! Structured events for recognition loop and resource monitor
//! transitions, published on a broadcast channel. Observation only:
//! `is_active()` / `is_suppressing()` stay the authoritative state.

use serde::{Deserialize, Serialize};

/// Why a pulled result was not forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    /// The suppression gate was closed when the pull completed
    Suppressed,
    /// The engine produced no hypothesis, or an empty one
    NotUnderstood,
}

/// Why a recognition loop instance ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExitReason {
    /// A stop was requested and observed between pulls
    Stopped,
    /// The pull call failed
    Failed { message: String },
}

/// Events emitted by the speech controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A recognition loop task began running
    RecognitionStarted,

    /// The engine start signal failed; the loop keeps going
    EngineStartFailed { message: String },

    /// A pulled result was dropped
    UtteranceDiscarded { reason: DiscardReason },

    /// An utterance was handed to the consumer context
    UtteranceDispatched { text: String },

    /// The consumer context refused the utterance; it was dropped
    DispatchFailed { text: String, message: String },

    /// The recognition loop left its pull phase
    RecognitionExited { reason: ExitReason },

    /// The resource monitor task began running
    MonitorStarted,

    /// The resource monitor task was interrupted and exited
    MonitorExited,
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::RecognitionStarted => write!(f, "RECOGNITION_STARTED"),
            SessionEvent::EngineStartFailed { message } => {
                write!(f, "ENGINE_START_FAILED ({})", message)
            }
            SessionEvent::UtteranceDiscarded { reason } => {
                write!(f, "UTTERANCE_DISCARDED ({:?})", reason)
            }
            SessionEvent::UtteranceDispatched { text } => {
                write!(f, "UTTERANCE_DISPATCHED [{}]", text)
            }
            SessionEvent::DispatchFailed { text, .. } => write!(f, "DISPATCH_FAILED [{}]", text),
            SessionEvent::RecognitionExited { reason } => match reason {
                ExitReason::Stopped => write!(f, "RECOGNITION_EXITED (stopped)"),
                ExitReason::Failed { message } => {
                    write!(f, "RECOGNITION_EXITED (failed: {})", message)
                }
            },
            SessionEvent::MonitorStarted => write!(f, "MONITOR_STARTED"),
            SessionEvent::MonitorExited => write!(f, "MONITOR_EXITED"),
        }
    }
}
