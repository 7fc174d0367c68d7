//! Per-run suspension/cancellation flags.
//!
//! This state is owned by the run's execution unit and never shared across
//! tasks; cross-unit signaling happens exclusively through the control bus.

/// Pause/stop flags for one run, mutated only by control-message handling at
/// the suspension point between steps.
#[derive(Debug, Default)]
pub(crate) struct ControlState {
    pub paused: bool,
    pub stop_requested: bool,
}

impl ControlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether stepping may proceed right now.
    pub fn can_step(&self) -> bool {
        !self.paused && !self.stop_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stepping_blocked_by_pause_and_stop() {
        let mut state = ControlState::new();
        assert!(state.can_step());
        state.paused = true;
        assert!(!state.can_step());
        state.paused = false;
        state.stop_requested = true;
        assert!(!state.can_step());
    }
}
