//! Shared state cells for the recognition loop and the resource monitor
//!
//! Each flag has one writer per direction: the start operation moves it
//! false -> true with a compare-and-set, and the owning task moves it
//! true -> false when it exits. The loop's active flag shares one word
//! with its stop request and generation, so a stop always lands on the
//! loop it was aimed at. The suppression flag is advisory and is written
//! with plain stores by anyone.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

/// Phases of the recognition loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    /// Never started
    Idle,
    /// Task submitted, engine start signal not yet issued
    Starting,
    /// Pulling results and forwarding accepted ones
    Listening,
    /// Pulling results but discarding all of them
    SuppressedListening,
    /// The last loop instance has exited
    Exited,
}

impl Default for LoopPhase {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopPhase::Idle => write!(f, "Idle"),
            LoopPhase::Starting => write!(f, "Starting"),
            LoopPhase::Listening => write!(f, "Listening"),
            LoopPhase::SuppressedListening => write!(f, "SuppressedListening"),
            LoopPhase::Exited => write!(f, "Exited"),
        }
    }
}

/// Phases of the resource monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    Idle,
    Running,
    /// Interrupted; there is no clean stop
    Exited,
}

impl Default for MonitorPhase {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for MonitorPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorPhase::Idle => write!(f, "Idle"),
            MonitorPhase::Running => write!(f, "Running"),
            MonitorPhase::Exited => write!(f, "Exited"),
        }
    }
}

// Base phase encoding; SuppressedListening is derived from the gate
const PHASE_IDLE: u8 = 0;
const PHASE_STARTING: u8 = 1;
const PHASE_LISTENING: u8 = 2;
const PHASE_EXITED: u8 = 3;

// Control word layout: loop generation in the high bits, then the stop
// request bit, then the active bit. Start, stop and exit each update the
// whole word at once.
const ACTIVE: u64 = 0b01;
const STOP: u64 = 0b10;
const GENERATION_SHIFT: u32 = 2;

/// Identifies one recognition loop instance
pub type Generation = u64;

/// Control flags of the recognition loop
#[derive(Debug, Default)]
pub struct SessionState {
    control: AtomicU64,
    suppress: AtomicBool,
    phase: AtomicU8,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the loop: inactive -> active, exactly one caller wins
    ///
    /// The winner gets a fresh generation with no stop request, and closes
    /// the suppression gate before the task is submitted.
    pub(crate) fn try_begin(&self) -> Option<Generation> {
        let previous = self
            .control
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |word| {
                if word & ACTIVE != 0 {
                    None
                } else {
                    let generation = (word >> GENERATION_SHIFT) + 1;
                    Some((generation << GENERATION_SHIFT) | ACTIVE)
                }
            })
            .ok()?;

        self.suppress.store(true, Ordering::SeqCst);
        self.phase.store(PHASE_STARTING, Ordering::SeqCst);
        Some((previous >> GENERATION_SHIFT) + 1)
    }

    /// Undo a claim whose task never got submitted
    pub(crate) fn abandon(&self, generation: Generation) {
        self.finish(generation);
    }

    /// Called by the loop task once it enters its pull phase
    pub(crate) fn mark_listening(&self) {
        self.phase.store(PHASE_LISTENING, Ordering::SeqCst);
    }

    /// Called by the loop task on its way out; the only active -> inactive path
    pub(crate) fn finish(&self, generation: Generation) {
        self.phase.store(PHASE_EXITED, Ordering::SeqCst);
        self.control
            .store(generation << GENERATION_SHIFT, Ordering::SeqCst);
    }

    /// Whether loop `generation` should pull again
    pub(crate) fn should_continue(&self, generation: Generation) -> bool {
        self.control.load(Ordering::SeqCst) == (generation << GENERATION_SHIFT) | ACTIVE
    }

    /// Ask the loop that is active right now to stop
    ///
    /// Returns false, and changes nothing, when no loop is active. A stop
    /// can never reach a loop started after this call.
    pub(crate) fn request_stop(&self) -> bool {
        self.control
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |word| {
                (word & ACTIVE != 0).then_some(word | STOP)
            })
            .is_ok()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.control.load(Ordering::SeqCst) & STOP != 0
    }

    /// Generation of the current or most recent loop; 0 before the first start
    pub fn generation(&self) -> Generation {
        self.control.load(Ordering::SeqCst) >> GENERATION_SHIFT
    }

    pub fn set_suppress(&self, suppress: bool) {
        self.suppress.store(suppress, Ordering::SeqCst);
    }

    pub fn is_suppressing(&self) -> bool {
        self.suppress.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.control.load(Ordering::SeqCst) & ACTIVE != 0
    }

    /// Point-in-time phase; may be stale by the time it is read
    pub fn phase(&self) -> LoopPhase {
        match self.phase.load(Ordering::SeqCst) {
            PHASE_IDLE => LoopPhase::Idle,
            PHASE_STARTING => LoopPhase::Starting,
            PHASE_LISTENING if self.is_suppressing() => LoopPhase::SuppressedListening,
            PHASE_LISTENING => LoopPhase::Listening,
            _ => LoopPhase::Exited,
        }
    }
}

/// Control flag of the resource monitor
#[derive(Debug, Default)]
pub struct MonitorState {
    running: AtomicBool,
    exited: AtomicBool,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the monitor: false -> true, exactly one caller wins
    pub(crate) fn try_begin(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Called by the monitor task on its way out
    pub(crate) fn finish(&self) {
        self.exited.store(true, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> MonitorPhase {
        if self.is_running() {
            MonitorPhase::Running
        } else if self.exited.load(Ordering::SeqCst) {
            MonitorPhase::Exited
        } else {
            MonitorPhase::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_initial_state() {
        let state = SessionState::new();
        assert!(!state.is_active());
        assert!(!state.is_suppressing());
        assert_eq!(state.phase(), LoopPhase::Idle);
    }

    #[test]
    fn test_begin_closes_gate() {
        let state = SessionState::new();
        assert_eq!(state.try_begin(), Some(1));
        assert!(state.is_active());
        assert!(state.is_suppressing());
        assert_eq!(state.phase(), LoopPhase::Starting);
    }

    #[test]
    fn test_second_begin_loses() {
        let state = SessionState::new();
        assert!(state.try_begin().is_some());
        state.set_suppress(false);

        assert_eq!(state.try_begin(), None);
        // The losing claim must not touch the gate
        assert!(!state.is_suppressing());
        assert_eq!(state.generation(), 1);
    }

    #[test]
    fn test_listening_phase_follows_gate() {
        let state = SessionState::new();
        let generation = state.try_begin().unwrap();
        state.mark_listening();
        assert_eq!(state.phase(), LoopPhase::SuppressedListening);

        state.set_suppress(false);
        assert_eq!(state.phase(), LoopPhase::Listening);

        state.finish(generation);
        assert!(!state.is_active());
        assert_eq!(state.phase(), LoopPhase::Exited);
    }

    #[test]
    fn test_stop_request_is_soft() {
        let state = SessionState::new();
        let first = state.try_begin().unwrap();
        assert!(state.request_stop());

        assert!(!state.should_continue(first));
        // Still active until the loop itself finishes
        assert!(state.is_active());
        assert!(state.is_stop_requested());

        state.finish(first);
        let second = state.try_begin().unwrap();
        assert_eq!(second, first + 1);
        assert!(!state.is_stop_requested());
        assert!(state.should_continue(second));
    }

    #[test]
    fn test_stop_without_active_loop_is_dropped() {
        let state = SessionState::new();
        assert!(!state.request_stop());

        let first = state.try_begin().unwrap();
        state.finish(first);
        // Lands after the exit: must not be carried over to the next loop
        assert!(!state.request_stop());
        assert!(!state.is_stop_requested());

        let second = state.try_begin().unwrap();
        assert!(state.should_continue(second));
    }

    #[test]
    fn test_stale_loop_sees_no_continue() {
        let state = SessionState::new();
        let first = state.try_begin().unwrap();
        state.finish(first);
        let second = state.try_begin().unwrap();

        assert!(!state.should_continue(first));
        assert!(state.should_continue(second));
    }

    #[test]
    fn test_stop_races_exit_and_restart() {
        // A stop issued around an exit either hits the loop it saw or is
        // dropped; the loop started afterwards always runs
        for _ in 0..200 {
            let state = Arc::new(SessionState::new());
            let first = state.try_begin().unwrap();

            let stopper = {
                let state = Arc::clone(&state);
                thread::spawn(move || state.request_stop())
            };
            state.finish(first);
            let stopped = stopper.join().unwrap();

            let second = state.try_begin().unwrap();
            assert!(
                state.should_continue(second),
                "stop (landed: {stopped}) leaked into the next loop"
            );
        }
    }

    #[test]
    fn test_concurrent_begin_has_one_winner() {
        let state = Arc::new(SessionState::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = Arc::clone(&state);
                thread::spawn(move || state.try_begin())
            })
            .collect();

        let winners: Vec<_> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(winners, vec![1]);
    }

    #[test]
    fn test_monitor_phases() {
        let state = MonitorState::new();
        assert_eq!(state.phase(), MonitorPhase::Idle);

        assert!(state.try_begin());
        assert!(!state.try_begin());
        assert_eq!(state.phase(), MonitorPhase::Running);

        state.finish();
        assert!(!state.is_running());
        assert_eq!(state.phase(), MonitorPhase::Exited);
    }
}
