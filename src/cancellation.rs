//! Cancellation framework: CancellationToken + generation counter per lane.
//! Ensures timers and source events from an earlier attempt cannot act on
//! the current one.

use tokio_util::sync::CancellationToken;

/// One lane of cancellable work. Each new attempt advances the generation,
/// cancels all prior tasks, and issues a fresh token.
pub struct TaskGeneration {
    current_token: CancellationToken,
    generation: u64,
}

impl TaskGeneration {
    pub fn new() -> Self {
        Self {
            current_token: CancellationToken::new(),
            generation: 0,
        }
    }

    /// Cancel all current tasks, advance generation, return new child token + generation.
    pub fn cancel_and_advance(&mut self) -> (CancellationToken, u64) {
        self.current_token.cancel();
        self.current_token = CancellationToken::new();
        self.generation += 1;
        (self.current_token.child_token(), self.generation)
    }

    /// Child token for the current generation without cancelling.
    pub fn child_token(&self) -> CancellationToken {
        self.current_token.child_token()
    }

    /// Whether `generation` is still live: current and not cancelled.
    #[inline]
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation && !self.current_token.is_cancelled()
    }

    /// Cancel all current tasks without advancing generation.
    pub fn cancel_all(&self) {
        self.current_token.cancel();
    }
}

impl Default for TaskGeneration {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-session coordinator: the listening window (timeout, source) and the
/// reward sequence (step ticks, advance) are cancelled independently.
#[derive(Default)]
pub struct CancelCoordinator {
    pub listen: TaskGeneration,
    pub reward: TaskGeneration,
}

impl CancelCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel everything. Used on teardown.
    pub fn cancel_all(&self) {
        self.listen.cancel_all();
        self.reward.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_cancels_previous() {
        let mut lane = TaskGeneration::new();
        let (first, g1) = lane.cancel_and_advance();
        assert_eq!(g1, 1);
        assert!(!first.is_cancelled());
        assert!(lane.is_current(1));

        let (second, g2) = lane.cancel_and_advance();
        assert_eq!(g2, 2);
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(!lane.is_current(1));
        assert!(lane.is_current(2));
    }

    #[test]
    fn test_cancel_all_keeps_generation() {
        let mut lane = TaskGeneration::new();
        let (token, g) = lane.cancel_and_advance();
        lane.cancel_all();
        assert!(token.is_cancelled());
        assert!(!lane.is_current(g));
        // the next advance still moves on from g
        let (_, next) = lane.cancel_and_advance();
        assert_eq!(next, g + 1);
    }

    #[test]
    fn test_coordinator_lanes_independent() {
        let mut cancel = CancelCoordinator::new();
        let (listen, _) = cancel.listen.cancel_and_advance();
        let (reward, _) = cancel.reward.cancel_and_advance();
        cancel.listen.cancel_all();
        assert!(listen.is_cancelled());
        assert!(!reward.is_cancelled());
        cancel.cancel_all();
        assert!(reward.is_cancelled());
    }
}
