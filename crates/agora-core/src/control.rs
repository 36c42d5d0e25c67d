//! Shared run control for the tick loop.
//!
//! The engine checks this between ticks; any thread holding a clone of
//! the handle can pause, resume, or stop a run. State changes take
//! effect at the next tick boundary -- a tick in flight always
//! completes.

use std::sync::atomic::{AtomicBool, Ordering};

/// Pause/stop flags shared between the engine and its operators.
#[derive(Debug, Default)]
pub struct EngineControl {
    paused: AtomicBool,
    stop_requested: AtomicBool,
}

impl EngineControl {
    /// Create a control block in the running state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause the run at the next tick boundary.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume a paused run.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    /// Whether the run is currently paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Ask the run to stop at the next tick boundary.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested.
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Clear both flags, making the control reusable for a new run.
    pub fn reset(&self) {
        self.paused.store(false, Ordering::Release);
        self.stop_requested.store(false, Ordering::Release);
    }
}
