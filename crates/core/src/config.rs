//! Engine configuration.
//!
//! Configuration is resolved once at process startup and passed into the engine. The engine
//! itself never reads environment variables; the `*_from_env_value` helpers exist so that the
//! host can turn optional env strings into validated values with consistent error messages.

use crate::constants::{
    DEFAULT_BOOST_FACTOR, DEFAULT_MAX_WORDS, DEFAULT_MIN_WORDS, DEFAULT_WORDS_PER_WEIGHT,
};
use crate::{ItemDefError, ItemDefResult};
use std::path::PathBuf;
use std::str::FromStr;

/// How sections are scheduled against the backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GenerationStrategy {
    /// One section at a time, in schema order. Every prompt sees all earlier sections.
    #[default]
    Sequential,
    /// Sections without references run in parallel; the rest follow in schema order.
    Concurrent,
}

impl FromStr for GenerationStrategy {
    type Err = ItemDefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "concurrent" => Ok(Self::Concurrent),
            other => Err(ItemDefError::InvalidInput(format!(
                "unknown generation strategy '{other}' (expected 'sequential' or 'concurrent')"
            ))),
        }
    }
}

/// Engine configuration resolved at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    boost_factor: f64,
    words_per_weight: u32,
    min_words: u32,
    max_words: u32,
    strategy: GenerationStrategy,
}

impl EngineConfig {
    /// Create a new `EngineConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`ItemDefError::InvalidInput`] if `boost_factor` is not a finite number greater
    /// than 1, if `words_per_weight` or `min_words` is zero, or if `max_words < min_words`.
    pub fn new(
        boost_factor: f64,
        words_per_weight: u32,
        min_words: u32,
        max_words: u32,
        strategy: GenerationStrategy,
    ) -> ItemDefResult<Self> {
        if !boost_factor.is_finite() || boost_factor <= 1.0 {
            return Err(ItemDefError::InvalidInput(format!(
                "boost_factor must be greater than 1, got {boost_factor}"
            )));
        }
        if words_per_weight == 0 {
            return Err(ItemDefError::InvalidInput(
                "words_per_weight must be greater than 0".into(),
            ));
        }
        if min_words == 0 {
            return Err(ItemDefError::InvalidInput(
                "min_words must be greater than 0".into(),
            ));
        }
        if max_words < min_words {
            return Err(ItemDefError::InvalidInput(format!(
                "max_words ({max_words}) must not be less than min_words ({min_words})"
            )));
        }

        Ok(Self {
            boost_factor,
            words_per_weight,
            min_words,
            max_words,
            strategy,
        })
    }

    pub fn boost_factor(&self) -> f64 {
        self.boost_factor
    }

    pub fn words_per_weight(&self) -> u32 {
        self.words_per_weight
    }

    pub fn min_words(&self) -> u32 {
        self.min_words
    }

    pub fn max_words(&self) -> u32 {
        self.max_words
    }

    pub fn strategy(&self) -> GenerationStrategy {
        self.strategy
    }

    /// Returns a copy using `strategy`.
    pub fn with_strategy(mut self, strategy: GenerationStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            boost_factor: DEFAULT_BOOST_FACTOR,
            words_per_weight: DEFAULT_WORDS_PER_WEIGHT,
            min_words: DEFAULT_MIN_WORDS,
            max_words: DEFAULT_MAX_WORDS,
            strategy: GenerationStrategy::Sequential,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a boost factor from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_BOOST_FACTOR`].
pub fn boost_factor_from_env_value(value: Option<String>) -> ItemDefResult<f64> {
    non_blank(value)
        .map(|v| {
            v.parse::<f64>().map_err(|_| {
                ItemDefError::InvalidInput(format!("boost factor '{v}' is not a number"))
            })
        })
        .transpose()
        .map(|parsed| parsed.unwrap_or(DEFAULT_BOOST_FACTOR))
}

/// Parse a word count from an optional string value, falling back to `default`.
pub fn word_count_from_env_value(value: Option<String>, default: u32) -> ItemDefResult<u32> {
    non_blank(value)
        .map(|v| {
            v.parse::<u32>().map_err(|_| {
                ItemDefError::InvalidInput(format!("word count '{v}' is not a whole number"))
            })
        })
        .transpose()
        .map(|parsed| parsed.unwrap_or(default))
}

/// Parse a generation strategy from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`GenerationStrategy::Sequential`].
pub fn strategy_from_env_value(value: Option<String>) -> ItemDefResult<GenerationStrategy> {
    non_blank(value)
        .map(|v| v.parse::<GenerationStrategy>())
        .transpose()
        .map(Option::unwrap_or_default)
}

/// Resolve an optional schema file override.
///
/// Returns `None` when no override is set, meaning the built-in schema should be used. An
/// override that does not point at a regular file is rejected up front.
pub fn resolve_schema_path(override_path: Option<PathBuf>) -> ItemDefResult<Option<PathBuf>> {
    match override_path {
        None => Ok(None),
        Some(path) if path.as_os_str().is_empty() => Ok(None),
        Some(path) if path.is_file() => Ok(Some(path)),
        Some(path) => Err(ItemDefError::InvalidInput(format!(
            "schema path {} is not a file",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_constants() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.boost_factor(), DEFAULT_BOOST_FACTOR);
        assert_eq!(cfg.min_words(), DEFAULT_MIN_WORDS);
        assert_eq!(cfg.max_words(), DEFAULT_MAX_WORDS);
        assert_eq!(cfg.strategy(), GenerationStrategy::Sequential);
    }

    #[test]
    fn rejects_boost_factor_not_above_one() {
        for bad in [1.0, 0.5, f64::NAN, f64::INFINITY] {
            let err = EngineConfig::new(bad, 150, 50, 1200, GenerationStrategy::Sequential)
                .expect_err("should reject");
            assert!(matches!(err, ItemDefError::InvalidInput(msg) if msg.contains("boost_factor")));
        }
    }

    #[test]
    fn rejects_inverted_word_bounds() {
        let err = EngineConfig::new(2.0, 150, 500, 100, GenerationStrategy::Sequential)
            .expect_err("should reject");
        assert!(matches!(err, ItemDefError::InvalidInput(msg) if msg.contains("max_words")));
    }

    #[test]
    fn rejects_zero_word_parameters() {
        assert!(EngineConfig::new(2.0, 0, 50, 100, GenerationStrategy::Sequential).is_err());
        assert!(EngineConfig::new(2.0, 150, 0, 100, GenerationStrategy::Sequential).is_err());
    }

    #[test]
    fn env_values_fall_back_to_defaults() {
        assert_eq!(boost_factor_from_env_value(None).unwrap(), DEFAULT_BOOST_FACTOR);
        assert_eq!(
            boost_factor_from_env_value(Some("  ".into())).unwrap(),
            DEFAULT_BOOST_FACTOR
        );
        assert_eq!(word_count_from_env_value(None, 42).unwrap(), 42);
        assert_eq!(
            strategy_from_env_value(None).unwrap(),
            GenerationStrategy::Sequential
        );
    }

    #[test]
    fn env_values_are_parsed() {
        assert_eq!(boost_factor_from_env_value(Some("3.5".into())).unwrap(), 3.5);
        assert_eq!(word_count_from_env_value(Some(" 80 ".into()), 42).unwrap(), 80);
        assert_eq!(
            strategy_from_env_value(Some("Concurrent".into())).unwrap(),
            GenerationStrategy::Concurrent
        );
    }

    #[test]
    fn env_values_reject_garbage() {
        assert!(boost_factor_from_env_value(Some("lots".into())).is_err());
        assert!(word_count_from_env_value(Some("-3".into()), 1).is_err());
        assert!(strategy_from_env_value(Some("parallel".into())).is_err());
    }

    #[test]
    fn schema_path_override_must_be_a_file() {
        assert_eq!(resolve_schema_path(None).unwrap(), None);
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_schema_path(Some(dir.path().to_path_buf())).is_err());

        let file = dir.path().join("schema.yaml");
        std::fs::write(&file, "metadata: {}").unwrap();
        assert_eq!(resolve_schema_path(Some(file.clone())).unwrap(), Some(file));
    }
}
