//! # Briefing
//!
//! Token-budgeted context reduction pipeline for feed briefings.
//!
//! Briefing takes a snapshot of items gathered from content feeds and
//! reduces it to a de-duplicated, topically organized excerpt set small
//! enough to hand to a language model for summarization.
//!
//! ## Pipeline
//!
//! ```text
//! raw items
//!   -> fingerprint dedup   (simhash + banded LSH)
//!   -> embedding           (external provider, injected)
//!   -> semantic dedup      (pairwise cosine similarity)
//!   -> clustering          (density-based or k-means)
//!   -> per-topic rerank    (none / cross-encoder / MMR / combined)
//!   -> context packing     (sentence-level, token budgeted)
//!   -> packed artifact
//! ```
//!
//! Every stage is a pure function of its inputs: no internal parallelism,
//! no state between runs. Embedding vectors and cross-encoder scores come
//! from injected ports ([`Embedder`], [`RelevanceScorer`]); the crate never
//! loads or runs models itself.
//!
//! ## Example
//!
//! ```rust
//! use briefing::config::ProcessingConfig;
//! use briefing::embedding::HashEmbedder;
//! use briefing::models::Item;
//! use briefing::pipeline::Pipeline;
//! use briefing::token::HeuristicEstimator;
//! use std::sync::Arc;
//!
//! let pipeline = Pipeline::new(
//!     ProcessingConfig::default(),
//!     Arc::new(HashEmbedder::new(64)),
//!     None,
//!     Arc::new(HeuristicEstimator),
//! );
//! let run = pipeline.run(vec![Item::new("Rust 1.88 released.")])?;
//! assert_eq!(run.stats.fetched, 1);
//! # Ok::<(), briefing::Error>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// multiple_crate_versions is inherently crate-level (detects duplicate transitive dependencies).
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod embedding;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod token;

// Re-exports for convenience
pub use config::{BriefingConfig, ProcessingConfig};
pub use embedding::{Embedder, HashEmbedder, RelevanceScorer};
pub use models::{Cluster, Excerpt, Item, PackedArtifact, PackedTopic};
pub use pipeline::{Pipeline, PipelineRun, PipelineStats};
pub use token::{HeuristicEstimator, TokenEstimator};

/// Error type for briefing operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InputMismatch` | Embedding vector count disagrees with item count |
/// | `Config` | Unknown strategy name, missing model id or embeddings, out-of-range setting |
/// | `OperationFailed` | Config file cannot be read/parsed, artifact cannot be written |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Paired sequences disagree in length.
    ///
    /// Raised when the externally supplied embedding vectors do not line up
    /// 1:1 with the items they describe. Fatal to the stage; there is no
    /// partial recovery.
    #[error("input mismatch in '{stage}': expected {expected} vectors, got {actual}")]
    InputMismatch {
        /// The stage that detected the mismatch.
        stage: &'static str,
        /// Expected sequence length (item count).
        expected: usize,
        /// Actual sequence length supplied.
        actual: usize,
    },

    /// Invalid or incompatible configuration.
    ///
    /// Raised when:
    /// - An unknown rerank or clustering strategy name is selected
    /// - The cross-encoder strategy is used without a model identifier
    /// - The MMR strategy is used without candidate embeddings
    /// - A setting is outside its documented range
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An operation failed.
    ///
    /// Raised when file I/O at the crate's edges fails: reading the config
    /// file, reading the items snapshot, or writing the packed artifact.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for briefing operations.
pub type Result<T> = std::result::Result<T, Error>;
