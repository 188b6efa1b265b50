//! Speech session module
//!
//! The recognition loop runs through these phases:
//! - Idle: never started
//! - Starting: task submitted, engine start pending
//! - Listening / SuppressedListening: pulling results, gate open or closed
//! - Exited: the loop failed or was stopped; only `start()` revives it

mod controller;
mod recognition;
mod recognition_loop;
pub(crate) mod state;

pub use controller::{ControllerError, SpeechController};
pub use recognition::{EngineError, LineSource, RecognitionSource, Utterance, WordResult};
pub use state::{Generation, LoopPhase, MonitorPhase, MonitorState, SessionState};
