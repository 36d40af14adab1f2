//! Target sound of a practice session.

use std::fmt;

use crate::matcher::StrategyKind;

/// Stop consonants: a burst followed by a vowel, which the signal-shape
/// heuristic is tuned for.
const PLOSIVES: &[&str] = &["p", "b", "t", "d", "k", "g"];

/// Identifier of the sound the child is asked to produce ("o", "p").
/// Normalized to lower case; fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetSound(String);

impl TargetSound {
    pub fn new(label: &str) -> Self {
        Self(label.trim().to_lowercase())
    }

    pub fn label(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a detected pattern label.
    pub fn matches_label(&self, label: &str) -> bool {
        self.0.eq_ignore_ascii_case(label)
    }

    pub fn is_plosive(&self) -> bool {
        PLOSIVES.contains(&self.0.as_str())
    }

    /// Strategy used when the configuration has no override for this target.
    pub fn default_strategy(&self) -> StrategyKind {
        if self.is_plosive() {
            StrategyKind::SignalShape
        } else {
            StrategyKind::Lexical
        }
    }
}

impl fmt::Display for TargetSound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_label() {
        let target = TargetSound::new(" O ");
        assert_eq!(target.label(), "o");
        assert!(target.matches_label("O"));
        assert!(!target.matches_label("oh"));
    }

    #[test]
    fn test_default_strategy() {
        assert_eq!(TargetSound::new("o").default_strategy(), StrategyKind::Lexical);
        assert_eq!(TargetSound::new("P").default_strategy(), StrategyKind::SignalShape);
        assert_eq!(TargetSound::new("m").default_strategy(), StrategyKind::Lexical);
    }
}
