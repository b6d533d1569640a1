//! Content-generation backend seam.
//!
//! The engine never talks to a language model directly. It hands a rendered prompt and a word
//! budget to a [`ContentBackend`] and receives text back. Retries, rate limiting and timeouts
//! belong to the backend implementation; the engine only maps the outcome.

use std::time::Duration;

/// Failure reported by a content backend.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum BackendError {
    /// The backend could not be reached or is not configured.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend did not answer within its time limit.
    #[error("backend timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// The backend answered with an error.
    #[error("backend failed: {0}")]
    Failed(String),

    /// The backend answered, but with no usable text for a required section.
    #[error("backend returned empty content")]
    EmptyContent,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Generates text for one section.
///
/// Implementations may block. They must be shareable across threads because the concurrent
/// generation strategy calls them from the rayon pool.
pub trait ContentBackend: Send + Sync {
    /// Generate text for `prompt`, aiming for roughly `word_budget` words.
    fn generate(&self, prompt: &str, word_budget: u32) -> BackendResult<String>;
}

/// Backend for hosts that only need template generation or schema introspection.
///
/// Every call fails with [`BackendError::Unavailable`].
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredBackend;

impl ContentBackend for UnconfiguredBackend {
    fn generate(&self, _prompt: &str, _word_budget: u32) -> BackendResult<String> {
        Err(BackendError::Unavailable(
            "no content backend configured".to_string(),
        ))
    }
}
