//! Pattern matching: decides whether an utterance unit contains the target sound.
//! Two backends behind one tagged strategy: lexical (transcripts) and
//! signal-shape (byte spectra + waveform frames).

pub mod lexical;
pub mod signal;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::BunnyConfig;
use crate::source::UtteranceUnit;
use crate::target::TargetSound;

pub use lexical::LexicalMatcher;
pub use signal::SignalShapeMatcher;

/// Result of feeding one unit to a matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Target sound detected.
    Matched,
    /// Something was heard but not the target (soft failure).
    Missed,
    /// Not enough evidence either way; no feedback.
    Inconclusive,
}

/// Matcher backend adapter.
pub trait PatternMatcher: Send {
    /// Evaluate one unit. Units of the wrong kind for the backend are `Inconclusive`.
    fn evaluate(&mut self, unit: &UtteranceUnit) -> MatchOutcome;

    /// Clear accumulated state between attempts.
    fn reset(&mut self);
}

/// Which backend a target uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Lexical,
    SignalShape,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Lexical => write!(f, "lexical"),
            StrategyKind::SignalShape => write!(f, "signal_shape"),
        }
    }
}

/// The matcher chosen for a session.
pub enum Strategy {
    Lexical(LexicalMatcher),
    SignalShape(SignalShapeMatcher),
}

impl Strategy {
    /// Pick the backend for `target`: config override first, then the target's default.
    pub fn for_target(target: &TargetSound, config: &BunnyConfig) -> Self {
        // override keys are written by hand, so "P" and " p" name the same target
        let kind = config
            .strategy_overrides
            .iter()
            .find(|(label, _)| target.matches_label(label.trim()))
            .map(|(_, kind)| *kind)
            .unwrap_or_else(|| target.default_strategy());
        match kind {
            StrategyKind::Lexical => Strategy::Lexical(LexicalMatcher::new(target.clone())),
            StrategyKind::SignalShape => {
                Strategy::SignalShape(SignalShapeMatcher::new(config.signal.clone()))
            }
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Lexical(_) => StrategyKind::Lexical,
            Strategy::SignalShape(_) => StrategyKind::SignalShape,
        }
    }
}

impl PatternMatcher for Strategy {
    fn evaluate(&mut self, unit: &UtteranceUnit) -> MatchOutcome {
        match self {
            Strategy::Lexical(m) => m.evaluate(unit),
            Strategy::SignalShape(m) => m.evaluate(unit),
        }
    }

    fn reset(&mut self) {
        match self {
            Strategy::Lexical(m) => m.reset(),
            Strategy::SignalShape(m) => m.reset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_selection() {
        let config = BunnyConfig::default();
        let s = Strategy::for_target(&TargetSound::new("o"), &config);
        assert_eq!(s.kind(), StrategyKind::Lexical);
        let s = Strategy::for_target(&TargetSound::new("p"), &config);
        assert_eq!(s.kind(), StrategyKind::SignalShape);
    }

    #[test]
    fn test_strategy_override() {
        let mut config = BunnyConfig::default();
        config
            .strategy_overrides
            .insert("p".to_string(), StrategyKind::Lexical);
        let s = Strategy::for_target(&TargetSound::new("p"), &config);
        assert_eq!(s.kind(), StrategyKind::Lexical);
    }

    #[test]
    fn test_strategy_override_key_case() {
        let mut config = BunnyConfig::default();
        config
            .strategy_overrides
            .insert("P".to_string(), StrategyKind::Lexical);
        let s = Strategy::for_target(&TargetSound::new("P"), &config);
        assert_eq!(s.kind(), StrategyKind::Lexical);
        let s = Strategy::for_target(&TargetSound::new(" p "), &config);
        assert_eq!(s.kind(), StrategyKind::Lexical);

        config.strategy_overrides.clear();
        config
            .strategy_overrides
            .insert(" O ".to_string(), StrategyKind::SignalShape);
        let s = Strategy::for_target(&TargetSound::new("o"), &config);
        assert_eq!(s.kind(), StrategyKind::SignalShape);
        // unrelated targets keep their default
        let s = Strategy::for_target(&TargetSound::new("a"), &config);
        assert_eq!(s.kind(), StrategyKind::Lexical);
    }

    #[test]
    fn test_strategy_dispatch_ignores_foreign_units() {
        let config = BunnyConfig::default();
        let mut s = Strategy::for_target(&TargetSound::new("o"), &config);
        let frame = UtteranceUnit::frame(vec![0; 64], vec![128; 64]);
        assert_eq!(s.evaluate(&frame), MatchOutcome::Inconclusive);
        assert_eq!(s.evaluate(&UtteranceUnit::transcript("oh")), MatchOutcome::Matched);
    }
}
