//! Test doubles shared by the unit test modules

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use crate::config::Config;
use crate::dispatch::DecisionConsumer;
use crate::events::SessionEvent;
use crate::monitor::CaptureProbe;
use crate::session::{EngineError, RecognitionSource, Utterance};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

pub type PullResult = Result<Option<Utterance>, EngineError>;

/// Config with a fast monitor interval
pub fn test_config() -> Config {
    Config {
        monitor_interval: Duration::from_millis(5),
        ..Config::default()
    }
}

/// Poll `condition` until it holds, panicking after a timeout
pub fn wait_until<F: Fn() -> bool>(condition: F) {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        thread::sleep(Duration::from_millis(2));
    }
}

/// Receive events until one matches, panicking after a timeout
pub fn wait_for_event<F>(rx: &mut broadcast::Receiver<SessionEvent>, matches: F) -> SessionEvent
where
    F: Fn(&SessionEvent) -> bool,
{
    let deadline = Instant::now() + WAIT_TIMEOUT;
    loop {
        match rx.try_recv() {
            Ok(event) if matches(&event) => return event,
            Ok(_) => {}
            Err(broadcast::error::TryRecvError::Empty) => {
                assert!(Instant::now() < deadline, "expected event not received");
                thread::sleep(Duration::from_millis(2));
            }
            Err(e) => panic!("event channel error: {e:?}"),
        }
    }
}

/// Source whose pulls block until the test sends a result
///
/// Dropping the sender makes the next pull fail with `Closed`.
pub struct ChannelSource {
    rx: Mutex<mpsc::Receiver<PullResult>>,
    fail_start: bool,
    start_calls: AtomicUsize,
    pull_calls: AtomicUsize,
}

impl ChannelSource {
    pub fn new() -> (Arc<Self>, mpsc::Sender<PullResult>) {
        Self::build(false)
    }

    pub fn failing_start() -> (Arc<Self>, mpsc::Sender<PullResult>) {
        Self::build(true)
    }

    fn build(fail_start: bool) -> (Arc<Self>, mpsc::Sender<PullResult>) {
        let (tx, rx) = mpsc::channel();
        let source = Arc::new(Self {
            rx: Mutex::new(rx),
            fail_start,
            start_calls: AtomicUsize::new(0),
            pull_calls: AtomicUsize::new(0),
        });
        (source, tx)
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn pull_calls(&self) -> usize {
        self.pull_calls.load(Ordering::SeqCst)
    }
}

impl RecognitionSource for ChannelSource {
    fn start_engine(&self, _prune_cache: bool) -> Result<(), EngineError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            Err(EngineError::Start("no microphone line".into()))
        } else {
            Ok(())
        }
    }

    fn pull_result(&self) -> PullResult {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        let rx = self.rx.lock().unwrap();
        rx.recv().unwrap_or(Err(EngineError::Closed))
    }
}

/// Source that replays a fixed script, then reports `Closed`
pub struct ScriptedSource {
    script: Mutex<VecDeque<PullResult>>,
    start_calls: AtomicUsize,
    pull_calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<PullResult>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            start_calls: AtomicUsize::new(0),
            pull_calls: AtomicUsize::new(0),
        })
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn pull_calls(&self) -> usize {
        self.pull_calls.load(Ordering::SeqCst)
    }
}

impl RecognitionSource for ScriptedSource {
    fn start_engine(&self, _prune_cache: bool) -> Result<(), EngineError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn pull_result(&self) -> PullResult {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(EngineError::Closed))
    }
}

/// Consumer that records every utterance it is given
#[derive(Default)]
pub struct RecordingConsumer {
    calls: Mutex<Vec<String>>,
}

impl RecordingConsumer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl DecisionConsumer for RecordingConsumer {
    fn on_utterance(&self, text: &str) {
        self.calls.lock().unwrap().push(text.to_string());
    }
}

/// Probe that counts how often it was asked
pub struct CountingProbe {
    available: bool,
    calls: AtomicUsize,
}

impl CountingProbe {
    pub fn new(available: bool) -> Self {
        Self {
            available,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CaptureProbe for CountingProbe {
    fn is_capture_device_available(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.available
    }
}
