//! Runtime configuration: session timing, signal-shape thresholds, analyser
//! parameters and per-target strategy overrides.
//! Loaded from JSON (`BUNNYHOP_CONFIG`), every field falls back to its default.

use std::collections::HashMap;
use std::ops::{Range, RangeInclusive};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::matcher::StrategyKind;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "BUNNYHOP_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BunnyConfig {
    pub session: SessionConfig,
    pub signal: SignalThresholds,
    pub analyser: AnalyserConfig,
    /// Target sound → matcher strategy, keys compared case-insensitively.
    /// Wins over the target's default.
    pub strategy_overrides: HashMap<String, StrategyKind>,
}

/// Listening window and reward schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub listen_timeout_ms: u64,
    pub reward_step_interval_ms: u64,
    pub reward_steps: u8,
    /// Delay between the completion cue and the advance signal.
    pub advance_grace_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            listen_timeout_ms: 3000,
            reward_step_interval_ms: 250,
            reward_steps: 4,
            advance_grace_ms: 800,
        }
    }
}

impl SessionConfig {
    pub fn listen_timeout(&self) -> Duration {
        Duration::from_millis(self.listen_timeout_ms)
    }

    pub fn reward_step_interval(&self) -> Duration {
        Duration::from_millis(self.reward_step_interval_ms)
    }

    pub fn advance_grace(&self) -> Duration {
        Duration::from_millis(self.advance_grace_ms)
    }
}

/// Thresholds of the burst-then-vowel heuristic. Values are on the 0-255 byte scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalThresholds {
    /// Sound buffer capacity (samples).
    pub buffer_capacity: usize,
    /// Samples needed before detection is evaluated.
    pub min_samples: usize,
    /// Peak deviation from the 128 baseline a burst must exceed.
    pub burst_floor: f32,
    pub vowel_band_min: f32,
    pub vowel_band_max: f32,
    /// Frequency bins averaged into vowel energy.
    pub vowel_bins: Range<usize>,
    /// Frequency bins averaged into low-band energy.
    pub low_bins: Range<usize>,
    /// Longest burst → vowel-peak gap.
    pub max_burst_to_vowel_ms: u64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            buffer_capacity: 15,
            min_samples: 8,
            burst_floor: 20.0,
            vowel_band_min: 85.0,
            vowel_band_max: 115.0,
            vowel_bins: 10..30,
            low_bins: 0..10,
            max_burst_to_vowel_ms: 150,
        }
    }
}

impl SignalThresholds {
    pub fn vowel_band(&self) -> RangeInclusive<f32> {
        self.vowel_band_min..=self.vowel_band_max
    }

    pub fn max_burst_to_vowel(&self) -> Duration {
        Duration::from_millis(self.max_burst_to_vowel_ms)
    }
}

/// Parameters of the PCM → byte-spectrum analyser (browser AnalyserNode semantics).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyserConfig {
    pub sample_rate: u32,
    pub fft_size: usize,
    /// Exponential smoothing between successive spectra, 0.0-1.0.
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
    /// Interval between emitted frames.
    pub tick_ms: u64,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            fft_size: 2048,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            tick_ms: 16,
        }
    }
}

impl AnalyserConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl BunnyConfig {
    /// Load from a JSON file and validate.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: BunnyConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `BUNNYHOP_CONFIG` if set; defaults otherwise or on failure.
    pub fn from_env() -> Self {
        let Ok(path) = std::env::var(CONFIG_ENV) else {
            return Self::default();
        };
        match Self::load_from_file(Path::new(&path)) {
            Ok(config) => {
                info!(path = %path, "config_loaded");
                config
            }
            Err(e) => {
                warn!(path = %path, error = %e, "config load failed, using defaults");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.session;
        if s.listen_timeout_ms == 0 {
            return Err(ConfigError::Invalid("listen_timeout_ms must be > 0".into()));
        }
        if s.reward_steps == 0 {
            return Err(ConfigError::Invalid("reward_steps must be > 0".into()));
        }

        let t = &self.signal;
        if t.buffer_capacity == 0 || t.min_samples == 0 || t.min_samples > t.buffer_capacity {
            return Err(ConfigError::Invalid(format!(
                "min_samples ({}) must be within 1..={} (buffer_capacity)",
                t.min_samples, t.buffer_capacity
            )));
        }
        if t.vowel_band_min > t.vowel_band_max {
            return Err(ConfigError::Invalid(format!(
                "vowel band inverted: {}..={}",
                t.vowel_band_min, t.vowel_band_max
            )));
        }
        if t.vowel_bins.is_empty() || t.low_bins.is_empty() {
            return Err(ConfigError::Invalid("frequency bin ranges must be non-empty".into()));
        }

        let a = &self.analyser;
        if !a.fft_size.is_power_of_two() || a.fft_size < 32 {
            return Err(ConfigError::Invalid(format!(
                "fft_size must be a power of two >= 32, got {}",
                a.fft_size
            )));
        }
        if !(0.0..=1.0).contains(&a.smoothing) {
            return Err(ConfigError::Invalid("smoothing must be within 0.0..=1.0".into()));
        }
        if a.min_decibels >= a.max_decibels {
            return Err(ConfigError::Invalid("min_decibels must be below max_decibels".into()));
        }
        if t.vowel_bins.end > a.fft_size / 2 {
            return Err(ConfigError::Invalid(format!(
                "vowel_bins end {} exceeds frequency bin count {}",
                t.vowel_bins.end,
                a.fft_size / 2
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = BunnyConfig::default();
        config.validate().unwrap();
        assert_eq!(config.session.listen_timeout(), Duration::from_millis(3000));
        assert_eq!(config.signal.buffer_capacity, 15);
        assert_eq!(config.signal.min_samples, 8);
        assert!(config.signal.vowel_band().contains(&100.0));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: BunnyConfig = serde_json::from_str(
            r#"{ "signal": { "burst_floor": 30.0 }, "strategy_overrides": { "o": "signal_shape" } }"#,
        )
        .unwrap();
        assert_eq!(config.signal.burst_floor, 30.0);
        assert_eq!(config.signal.vowel_band_min, 85.0);
        assert_eq!(config.session.reward_steps, 4);
        assert_eq!(config.strategy_overrides.get("o"), Some(&StrategyKind::SignalShape));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "session": {{ "listen_timeout_ms": 5000 }} }}"#).unwrap();
        let config = BunnyConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.session.listen_timeout_ms, 5000);
        assert_eq!(config.session.advance_grace_ms, 800);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            BunnyConfig::load_from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_band() {
        let mut config = BunnyConfig::default();
        config.signal.vowel_band_min = 120.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_min_samples_over_capacity() {
        let mut config = BunnyConfig::default();
        config.signal.min_samples = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_bins() {
        let mut config = BunnyConfig::default();
        config.signal.vowel_bins = 10..10;
        assert!(config.validate().is_err());
    }
}
