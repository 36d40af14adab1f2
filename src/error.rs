//! Error kinds for sources, sessions and configuration.
//! A "no match" is not an error: it is `MatchOutcome::Missed`.

use thiserror::Error;

use crate::state_machine::SessionState;

/// Failure reported by an utterance source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Permission denied or capture/recognition unsupported. Fatal to the attempt.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// Mid-attempt recognizer failure. Absorbed as soft failure.
    #[error("recognition error: {0}")]
    Recognition(String),
}

impl SourceError {
    /// Whether this error ends the attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SourceError::Unavailable(_))
    }

    /// Text shown to the user, without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            SourceError::Unavailable(m) | SourceError::Recognition(m) => m,
        }
    }
}

/// Error returned to the UI when driving a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("an attempt is already active")]
    AttemptActive,

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("session loop closed")]
    Closed,
}

/// Rejected state transition.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: SessionState,
    pub to: SessionState,
}

/// Configuration load / validation failure.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SourceError::Unavailable("permission denied".into());
        assert_eq!(err.to_string(), "source unavailable: permission denied");

        let err = SessionError::from(SourceError::Recognition("network".into()));
        assert_eq!(err.to_string(), "recognition error: network");

        assert_eq!(SessionError::AttemptActive.to_string(), "an attempt is already active");

        let err = SessionError::from(TransitionError {
            from: SessionState::Listening,
            to: SessionState::Listening,
        });
        assert_eq!(err.to_string(), "invalid transition: Listening -> Listening");
    }

    #[test]
    fn test_fatality() {
        assert!(SourceError::Unavailable("x".into()).is_fatal());
        assert!(!SourceError::Recognition("x".into()).is_fatal());
    }
}
