//! Feedback presenter and navigator contracts, plus the stock adapters.
//! The core never waits on a presenter: signals are fire-and-forget.

use std::borrow::Cow;

use crossbeam_channel as cb;
use serde::Serialize;
use tracing::info;

/// Feedback signal emitted by the controller on state changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum FeedbackSignal {
    /// Spoken "say <target>" prompt. The presenter reports back with
    /// `SessionHandle::prompt_finished` once it has played.
    Prompt { target: String },
    RecordingStarted,
    RecordingStopped,
    SoftFailure,
    Success,
    RewardStep { step: u8 },
    RewardComplete,
    /// Fatal source error; `message` is shown to the user.
    SourceUnavailable { message: String },
}

impl FeedbackSignal {
    /// Named audio cue the presenter should play, if any.
    pub fn cue(&self) -> Option<Cow<'static, str>> {
        match self {
            FeedbackSignal::Prompt { target } => Some(Cow::Owned(format!("say-{target}"))),
            FeedbackSignal::SoftFailure => Some(Cow::Borrowed("try-again")),
            FeedbackSignal::Success => Some(Cow::Borrowed("good-job")),
            FeedbackSignal::RewardComplete => Some(Cow::Borrowed("token-received")),
            _ => None,
        }
    }
}

/// Plays cues and switches visual state.
pub trait FeedbackPresenter: Send + Sync {
    fn present(&self, signal: FeedbackSignal);
}

/// Receives the single "advance to next stage" signal.
pub trait Navigator: Send + Sync {
    fn advance(&self);
}

/// Everything the UI thread needs to react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    Feedback(FeedbackSignal),
    Advance,
}

/// Forwards signals to a UI thread over an unbounded channel (never blocks
/// the session loop). Serves as both presenter and navigator.
#[derive(Clone)]
pub struct ChannelPresenter {
    tx: cb::Sender<UiEvent>,
}

impl ChannelPresenter {
    pub fn new() -> (Self, cb::Receiver<UiEvent>) {
        let (tx, rx) = cb::unbounded();
        (Self { tx }, rx)
    }
}

impl FeedbackPresenter for ChannelPresenter {
    fn present(&self, signal: FeedbackSignal) {
        let _ = self.tx.send(UiEvent::Feedback(signal));
    }
}

impl Navigator for ChannelPresenter {
    fn advance(&self) {
        let _ = self.tx.send(UiEvent::Advance);
    }
}

/// Presenter that only logs; useful headless.
pub struct LoggingPresenter;

impl FeedbackPresenter for LoggingPresenter {
    fn present(&self, signal: FeedbackSignal) {
        info!(signal = ?signal, cue = ?signal.cue(), "feedback");
    }
}

impl Navigator for LoggingPresenter {
    fn advance(&self) {
        info!("advance");
    }
}
