//! Lexical matcher: scores recognizer transcripts against a fixed table of
//! early-speech onset patterns.
//!
//! Per token: onset table hits, a leading vowel, and a leading
//! consonant+vowel cluster each contribute a label. Labels are unioned per
//! transcript.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::RegexSet;
use tracing::debug;

use super::{MatchOutcome, PatternMatcher};
use crate::source::UtteranceUnit;
use crate::target::TargetSound;

/// Onset label → pattern. The second alternative is unanchored: it hits the
/// literal cluster anywhere in the token (e.g. "spuh").
const ONSET_TABLE: &[(&str, &str)] = &[
    ("a", r"^ah|aa|eh"),
    ("b", r"^b[aeiou]|buh"),
    ("m", r"^m[aeiou]|mm"),
    ("p", r"^p[aeiou]|puh"),
    ("d", r"^d[aeiou]|duh"),
    ("t", r"^t[aeiou]|tuh"),
    ("w", r"^w[aeiou]|wuh"),
    ("n", r"^n[aeiou]|nn"),
    ("h", r"^h[aeiou]|huh"),
    ("l", r"^l[aeiou]|ll"),
    ("g", r"^g[aeiou]|guh"),
    ("k", r"^k[aeiou]|kuh"),
];

static ONSETS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(ONSET_TABLE.iter().map(|(_, pattern)| *pattern))
        .expect("onset table patterns are valid")
});

const VOWELS: &str = "aeiou";
const CONSONANTS: &str = "bcdfghjklmnpqrstvwxyz";

/// Collect every pattern label found in `transcript`.
pub fn detect_patterns(transcript: &str) -> BTreeSet<String> {
    let lowered = transcript.trim().to_lowercase();
    let mut labels = BTreeSet::new();

    for token in lowered.split_whitespace() {
        for idx in ONSETS.matches(token).iter() {
            labels.insert(ONSET_TABLE[idx].0.to_string());
        }

        let mut chars = token.chars();
        let first = chars.next();
        let second = chars.next();

        if let Some(c) = first.filter(|c| VOWELS.contains(*c)) {
            labels.insert(c.to_string());
        }
        if let (Some(c), Some(v)) = (first, second) {
            if CONSONANTS.contains(c) && VOWELS.contains(v) {
                labels.insert(format!("{c}{v}"));
            }
        }
    }

    labels
}

/// Transcript matcher for one target sound.
pub struct LexicalMatcher {
    target: TargetSound,
}

impl LexicalMatcher {
    pub fn new(target: TargetSound) -> Self {
        Self { target }
    }
}

impl PatternMatcher for LexicalMatcher {
    fn evaluate(&mut self, unit: &UtteranceUnit) -> MatchOutcome {
        let UtteranceUnit::Transcript { text, is_final } = unit else {
            return MatchOutcome::Inconclusive;
        };

        let labels = detect_patterns(text);
        let hit = labels.iter().any(|l| self.target.matches_label(l));
        debug!(
            transcript = %text,
            is_final = *is_final,
            detected = ?labels,
            sound = %self.target,
            hit,
            "transcript_evaluated"
        );

        if hit {
            MatchOutcome::Matched
        } else {
            MatchOutcome::Missed
        }
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(text: &str) -> Vec<String> {
        detect_patterns(text).into_iter().collect()
    }

    #[test]
    fn test_vowel_onset() {
        assert_eq!(labels("oh"), vec!["o"]);
        assert_eq!(labels("  OH  "), vec!["o"]);
    }

    #[test]
    fn test_consonant_vowel_cluster() {
        assert_eq!(labels("buh"), vec!["b", "bu"]);
        assert_eq!(labels("puh"), vec!["p", "pu"]);
        assert_eq!(labels("mm"), vec!["m"]);
    }

    #[test]
    fn test_unanchored_cluster() {
        // "puh" anywhere in the token counts for p, no CV onset for "s" + "p"
        assert_eq!(labels("spuh"), vec!["p"]);
        // vowel "a" pattern also hits on a trailing "eh"
        assert!(labels("meh").contains(&"a".to_string()));
    }

    #[test]
    fn test_multiple_tokens_union() {
        let found = labels("ball oh ball");
        assert_eq!(found, vec!["b", "ba", "l", "o"]);
    }

    #[test]
    fn test_nothing_detected() {
        assert!(detect_patterns("").is_empty());
        assert!(detect_patterns("   ").is_empty());
        assert!(detect_patterns("sh").is_empty());
    }

    #[test]
    fn test_evaluate_target() {
        let mut m = LexicalMatcher::new(TargetSound::new("O"));
        assert_eq!(m.evaluate(&UtteranceUnit::transcript("mm")), MatchOutcome::Missed);
        assert_eq!(m.evaluate(&UtteranceUnit::transcript("oh")), MatchOutcome::Matched);
        assert_eq!(m.evaluate(&UtteranceUnit::transcript("")), MatchOutcome::Missed);
    }

    #[test]
    fn test_evaluate_consonant_target() {
        let mut m = LexicalMatcher::new(TargetSound::new("p"));
        assert_eq!(m.evaluate(&UtteranceUnit::transcript("buh")), MatchOutcome::Missed);
        assert_eq!(m.evaluate(&UtteranceUnit::transcript("go pa")), MatchOutcome::Matched);
    }

    #[test]
    fn test_interim_transcripts_are_scored() {
        let mut m = LexicalMatcher::new(TargetSound::new("o"));
        let interim = UtteranceUnit::Transcript {
            text: "oh".into(),
            is_final: false,
        };
        assert_eq!(m.evaluate(&interim), MatchOutcome::Matched);
    }
}
