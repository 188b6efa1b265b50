//! speech-session: control core for a voice-driven assistant front-end
//!
//! Keeps exactly one recognition loop alive, gates which utterances are
//! delivered, watches capture-device availability on the side, and hands
//! accepted utterances over to a single-threaded consumer context.
//!
//! Components:
//! - [`session`]: the controller, its state cells and the recognition loop
//! - [`monitor`]: the capture-device resource monitor
//! - [`dispatch`]: the boundary onto the consumer context
//! - [`pool`]: the fixed-size worker pool both long-lived tasks run on
//! - [`events`]: structured session events for observers

pub mod config;
pub mod dispatch;
pub mod events;
pub mod lifecycle;
pub mod monitor;
pub mod pool;
pub mod session;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::Config;
pub use dispatch::{ConsumerContext, ConsumerHandle, DecisionConsumer, DispatchError, Dispatcher};
pub use events::{DiscardReason, ExitReason, SessionEvent};
pub use monitor::{AsoundProbe, CaptureProbe, FixedProbe};
pub use pool::{PoolError, WorkerPool};
pub use session::{
    ControllerError, EngineError, LineSource, LoopPhase, MonitorPhase, RecognitionSource,
    SpeechController, Utterance, WordResult,
};
