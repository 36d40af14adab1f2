//! Bunnyhop: utterance detection + feedback state machine for an
//! early-childhood speech practice game.
//! Library root: module wiring, re-exports, tracing setup.

pub mod audio;
pub mod cancellation;
pub mod config;
pub mod controller;
pub mod error;
pub mod matcher;
pub mod metrics;
pub mod presenter;
pub mod session;
pub mod source;
pub mod state_machine;
pub mod target;

pub use config::BunnyConfig;
pub use controller::{Collaborators, ControllerEvent, SessionController};
pub use error::{ConfigError, SessionError, SourceError, TransitionError};
pub use matcher::{MatchOutcome, PatternMatcher, Strategy, StrategyKind};
pub use presenter::{ChannelPresenter, FeedbackPresenter, FeedbackSignal, LoggingPresenter, Navigator, UiEvent};
pub use session::{spawn_session, SessionHandle};
pub use source::{AudioFrame, ScriptedSource, SourceEvent, UnitSink, UtteranceSource, UtteranceUnit};
pub use state_machine::{FeedbackState, HopOffset, SessionState};
pub use target::TargetSound;

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// `bunnyhop=debug` filter. A second call is a no-op.
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bunnyhop=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_ok() {
        tracing::info!(json, "tracing initialised");
    }
}
