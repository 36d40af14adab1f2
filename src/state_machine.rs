//! Session state machine: Idle → Listening → {Success | TimedOut}.
//! Soft failures never leave Listening; a fatal source error returns to Idle.
//! Feedback state is derived from the session state, never stored.

use std::fmt;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::TransitionError;

/// Lifecycle of one listening attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SessionState {
    Idle,
    Listening,
    Success,
    TimedOut,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Listening => write!(f, "Listening"),
            SessionState::Success => write!(f, "Success"),
            SessionState::TimedOut => write!(f, "TimedOut"),
        }
    }
}

impl SessionState {
    /// Returns whether transitioning from `self` to `next` is valid.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Idle, SessionState::Listening)
                | (SessionState::Listening, SessionState::Success)
                | (SessionState::Listening, SessionState::TimedOut)
                | (SessionState::Listening, SessionState::Idle) // fatal source error
                // new attempt after a finished one
                | (SessionState::Success, SessionState::Listening)
                | (SessionState::TimedOut, SessionState::Listening)
                | (SessionState::Success, SessionState::Idle)
                | (SessionState::TimedOut, SessionState::Idle)
        )
    }
}

/// Single-owner state machine with a watch channel for UI subscribers.
pub struct StateMachine {
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
}

impl StateMachine {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            state: SessionState::Idle,
            state_tx,
        }
    }

    pub fn current(&self) -> SessionState {
        self.state
    }

    /// Attempt a state transition. Every guarded transition goes through here,
    /// so a second `Listening → Success` can never happen within one attempt.
    pub fn transition(&mut self, next: SessionState) -> Result<SessionState, TransitionError> {
        let current = self.state;
        if !current.can_transition_to(next) {
            warn!(from = %current, to = %next, "invalid_transition");
            return Err(TransitionError {
                from: current,
                to: next,
            });
        }
        self.state = next;
        self.state_tx.send_replace(next);
        info!(from = %current, to = %next, "state_transition");
        Ok(next)
    }

    /// Force Idle from any state (teardown).
    pub fn force_idle(&mut self) {
        let prev = self.state;
        if prev == SessionState::Idle {
            return;
        }
        self.state = SessionState::Idle;
        self.state_tx.send_replace(SessionState::Idle);
        info!(from = %prev, "force_idle");
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// What the presenter should currently show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FeedbackState {
    Idle,
    Recording,
    Failure,
    Success,
    Hopping { step: u8 },
}

impl FeedbackState {
    /// Pure function of the session state, the last soft-failure flag and the
    /// reward step counter.
    pub fn derive(state: SessionState, soft_failed: bool, reward_step: u8) -> Self {
        match state {
            SessionState::Idle => FeedbackState::Idle,
            SessionState::Listening if soft_failed => FeedbackState::Failure,
            SessionState::Listening => FeedbackState::Recording,
            SessionState::Success if reward_step == 0 => FeedbackState::Success,
            SessionState::Success => FeedbackState::Hopping { step: reward_step },
            SessionState::TimedOut => FeedbackState::Failure,
        }
    }

    /// Where the hopping character sits, if it is hopping.
    pub fn hop_offset(self, total_steps: u8) -> Option<HopOffset> {
        match self {
            FeedbackState::Hopping { step } => Some(HopOffset::at(step, total_steps)),
            _ => None,
        }
    }
}

/// Translation of the hopping character, in percent of its own size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HopOffset {
    pub horizontal_pct: f32,
    pub vertical_pct: f32,
}

impl HopOffset {
    const HORIZONTAL_SPAN_PCT: f32 = 50.0;
    const VERTICAL_SPAN_PCT: f32 = -70.0;

    pub fn at(step: u8, total_steps: u8) -> Self {
        let progress = if total_steps == 0 {
            1.0
        } else {
            f32::from(step.min(total_steps)) / f32::from(total_steps)
        };
        Self {
            horizontal_pct: progress * Self::HORIZONTAL_SPAN_PCT,
            vertical_pct: progress * Self::VERTICAL_SPAN_PCT,
        }
    }
}
