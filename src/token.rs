//! Token estimation for the context packer.
//!
//! Packing budgets are expressed in model tokens. The real estimator uses
//! the `cl100k_base` BPE vocabulary; the heuristic fallback assumes about
//! four characters per token and rounds up.

use crate::{Error, Result};
use tiktoken_rs::CoreBPE;

/// Estimates how many model tokens a piece of text consumes.
pub trait TokenEstimator: Send + Sync {
    /// Returns the estimated token count for `text`.
    fn estimate(&self, text: &str) -> usize;
}

/// Character-count heuristic: `ceil(chars / 4)`, never below 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4).max(1)
    }
}

/// BPE-backed estimator over the `cl100k_base` vocabulary.
pub struct TiktokenEstimator {
    bpe: CoreBPE,
}

impl TiktokenEstimator {
    /// Builds the estimator, loading the embedded vocabulary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] when the vocabulary cannot be
    /// constructed.
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| Error::OperationFailed {
            operation: "load_tokenizer".to_string(),
            cause: e.to_string(),
        })?;
        Ok(Self { bpe })
    }
}

impl TokenEstimator for TiktokenEstimator {
    fn estimate(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

impl std::fmt::Debug for TiktokenEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenEstimator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_rounds_up() {
        assert_eq!(HeuristicEstimator.estimate(""), 1);
        assert_eq!(HeuristicEstimator.estimate("abc"), 1);
        assert_eq!(HeuristicEstimator.estimate("abcd"), 1);
        assert_eq!(HeuristicEstimator.estimate("abcde"), 2);
        assert_eq!(HeuristicEstimator.estimate(&"x".repeat(400)), 100);
    }

    #[test]
    fn test_heuristic_counts_chars_not_bytes() {
        // Four CJK characters are one heuristic token despite 12 bytes.
        assert_eq!(HeuristicEstimator.estimate("日本語字"), 1);
    }

    #[test]
    fn test_tiktoken_estimator() {
        let estimator = TiktokenEstimator::new().expect("embedded vocabulary loads");
        let tokens = estimator.estimate("The quick brown fox jumps over the lazy dog.");
        assert!(tokens > 0);
        assert!(tokens <= 15);
        assert_eq!(estimator.estimate(""), 0);
    }
}
