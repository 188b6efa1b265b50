//! Recognition source boundary and utterance types
//!
//! A [`RecognitionSource`] wraps the external engine: one start signal,
//! then one blocking pull per utterance. Pulls cannot be interrupted.

use std::io::BufRead;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// All errors that can arise from a recognition source
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The engine could not be initialised or started
    #[error("engine start failed: {0}")]
    Start(String),

    /// The pull call failed
    #[error("recognition failed: {0}")]
    Recognition(String),

    /// The source has no more input
    #[error("recognition source closed")]
    Closed,
}

/// Per-word metadata, passed through untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordResult {
    pub word: String,
    pub start_ms: Option<u64>,
    pub end_ms: Option<u64>,
    pub confidence: Option<f32>,
}

impl WordResult {
    /// A word with no timing or confidence attached
    pub fn bare(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            start_ms: None,
            end_ms: None,
            confidence: None,
        }
    }
}

/// One recognized phrase plus its words
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    pub words: Vec<WordResult>,
}

impl Utterance {
    pub fn new(text: impl Into<String>, words: Vec<WordResult>) -> Self {
        Self {
            text: text.into(),
            words,
        }
    }

    /// Build an utterance whose words are the whitespace-split text
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let words = text.split_whitespace().map(WordResult::bare).collect();
        Self { text, words }
    }

    /// An empty hypothesis counts as "not understood"
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Object-safe, thread-safe interface to a recognition engine
///
/// # Contract
///
/// - `pull_result` blocks until a complete utterance is available.
/// - `Ok(None)` means the engine heard something it could not match.
/// - `Err(_)` from `pull_result` ends the current recognition loop.
pub trait RecognitionSource: Send + Sync {
    /// Signal the engine to start, optionally discarding cached data
    fn start_engine(&self, prune_cache: bool) -> Result<(), EngineError>;

    /// Block for the next result
    fn pull_result(&self) -> Result<Option<Utterance>, EngineError>;
}

// Compile-time assertion: Box<dyn RecognitionSource> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn RecognitionSource>) {}
};

/// Source that treats each input line as one recognized utterance
///
/// A blank line is "not understood"; end of input closes the source.
pub struct LineSource<R> {
    reader: Mutex<R>,
}

impl<R: BufRead + Send> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Mutex::new(reader),
        }
    }
}

impl<R: BufRead + Send> RecognitionSource for LineSource<R> {
    fn start_engine(&self, prune_cache: bool) -> Result<(), EngineError> {
        debug!(prune_cache, "line source ready");
        Ok(())
    }

    fn pull_result(&self) -> Result<Option<Utterance>, EngineError> {
        let mut reader = self.reader.lock().unwrap_or_else(|e| e.into_inner());
        let mut raw = Vec::new();

        let read = reader
            .read_until(b'\n', &mut raw)
            .map_err(|e| EngineError::Recognition(e.to_string()))?;
        if read == 0 {
            return Err(EngineError::Closed);
        }

        // A garbled line is one result that was not understood
        let line = match String::from_utf8(raw) {
            Ok(line) => line,
            Err(e) => {
                debug!(error = %e.utf8_error(), "discarding line that is not valid UTF-8");
                return Ok(None);
            }
        };

        let text = line.trim();
        if text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Utterance::from_text(text)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_from_text_splits_words() {
        let utterance = Utterance::from_text("turn on  lights");
        assert_eq!(utterance.text, "turn on  lights");
        let words: Vec<_> = utterance.words.iter().map(|w| w.word.as_str()).collect();
        assert_eq!(words, vec!["turn", "on", "lights"]);
        assert!(utterance.words.iter().all(|w| w.confidence.is_none()));
    }

    #[test]
    fn test_blank_utterance_is_empty() {
        assert!(Utterance::from_text("   ").is_empty());
        assert!(!Utterance::from_text("hi").is_empty());
    }

    #[test]
    fn test_line_source_sequence() {
        let source = LineSource::new(Cursor::new("turn on lights\n\nturn off lights\n"));
        assert!(source.start_engine(true).is_ok());

        let first = source.pull_result().unwrap().unwrap();
        assert_eq!(first.text, "turn on lights");
        assert!(source.pull_result().unwrap().is_none());
        let third = source.pull_result().unwrap().unwrap();
        assert_eq!(third.text, "turn off lights");
        assert!(matches!(source.pull_result(), Err(EngineError::Closed)));
    }

    #[test]
    fn test_line_source_without_trailing_newline() {
        let source = LineSource::new(Cursor::new("what time is it"));
        let utterance = source.pull_result().unwrap().unwrap();
        assert_eq!(utterance.text, "what time is it");
        assert!(matches!(source.pull_result(), Err(EngineError::Closed)));
    }

    #[test]
    fn test_line_source_skips_invalid_utf8_line() {
        let source = LineSource::new(Cursor::new(b"\xff\xfe\nturn on lights\n".to_vec()));

        assert!(source.pull_result().unwrap().is_none());
        let utterance = source.pull_result().unwrap().unwrap();
        assert_eq!(utterance.text, "turn on lights");
        assert!(matches!(source.pull_result(), Err(EngineError::Closed)));
    }
}
