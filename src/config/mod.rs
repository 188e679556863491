//! Configuration management.
//!
//! The configuration surface mirrors the briefing YAML document: a
//! `processing` tree with dedup, clustering, rerank, and packer sections,
//! plus output settings. Every field has a default so a partial document
//! (or none at all) still yields a runnable pipeline. CLI overrides are
//! layered on top via [`ProcessingOverrides`].

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Top-level briefing configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BriefingConfig {
    /// Stable identifier for this briefing definition.
    pub briefing_id: String,
    /// Briefing title, carried into the packed artifact.
    pub briefing_title: String,
    /// Processing pipeline settings.
    pub processing: ProcessingConfig,
    /// Output settings.
    pub output: OutputSettings,
}

impl Default for BriefingConfig {
    fn default() -> Self {
        Self {
            briefing_id: "briefing".to_string(),
            briefing_title: "Daily Engineering Briefing".to_string(),
            processing: ProcessingConfig::default(),
            output: OutputSettings::default(),
        }
    }
}

impl BriefingConfig {
    /// Loads configuration from a YAML file and validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a
    /// setting is out of range.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: e.to_string(),
        })?;

        let config: Self =
            serde_yaml_ng::from_str(&contents).map_err(|e| Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;

        config.processing.validate()?;
        Ok(config)
    }
}

/// Output settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Directory the packed artifact is written to.
    pub dir: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
        }
    }
}

/// Processing pipeline settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Deduplication settings.
    pub dedup: DedupSettings,
    /// Clustering settings.
    pub clustering: ClusteringSettings,
    /// Rerank settings.
    pub rerank: RerankSettings,
    /// Context packer settings.
    pub packer: PackerSettings,
}

impl ProcessingConfig {
    /// Validates setting ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for the first out-of-range setting.
    pub fn validate(&self) -> Result<()> {
        let fp = &self.dedup.fingerprint;
        if !(32..=128).contains(&fp.bits) {
            return Err(Error::Config(format!(
                "fingerprint bits must be in 32..=128, got {}",
                fp.bits
            )));
        }
        if !(1..=16).contains(&fp.bands) {
            return Err(Error::Config(format!(
                "fingerprint bands must be in 1..=16, got {}",
                fp.bands
            )));
        }
        let threshold = self.dedup.semantic.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "semantic threshold must be in 0..=1, got {threshold}"
            )));
        }
        let lambda = self.rerank.mmr_lambda;
        if !(0.0..=1.0).contains(&lambda) {
            return Err(Error::Config(format!(
                "MMR lambda must be in 0..=1, got {lambda}"
            )));
        }
        Ok(())
    }
}

/// Deduplication settings for both stages.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupSettings {
    /// Master switch for both dedup stages.
    pub enabled: bool,
    /// Fingerprint (simhash) stage settings.
    pub fingerprint: FingerprintSettings,
    /// Semantic (embedding) stage settings.
    pub semantic: SemanticSettings,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            fingerprint: FingerprintSettings::default(),
            semantic: SemanticSettings::default(),
        }
    }
}

/// Fingerprint dedup settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FingerprintSettings {
    /// Whether the fingerprint stage runs.
    pub enabled: bool,
    /// Simhash width in bits (32..=128).
    pub bits: u32,
    /// LSH band count (1..=16).
    pub bands: u32,
    /// Maximum Hamming distance within a duplicate family.
    pub ham_thresh: u32,
}

impl Default for FingerprintSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bits: 64,
            bands: 8,
            ham_thresh: 3,
        }
    }
}

/// Semantic dedup settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SemanticSettings {
    /// Whether the semantic stage runs.
    pub enabled: bool,
    /// Inclusive cosine-similarity collapse threshold.
    pub threshold: f32,
}

impl Default for SemanticSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.92,
        }
    }
}

/// Clustering strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum ClusterAlgo {
    /// Density-based clustering with a noise bucket (default).
    #[default]
    Density,
    /// Centroid-based k-means; every point is assigned, no noise concept.
    Kmeans,
}

impl ClusterAlgo {
    /// Parses a strategy name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for unknown names.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "hdbscan" | "density" => Ok(Self::Density),
            "kmeans" | "centroid" => Ok(Self::Kmeans),
            other => Err(Error::Config(format!(
                "unknown clustering algorithm: {other}"
            ))),
        }
    }
}

impl TryFrom<String> for ClusterAlgo {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

/// Clustering settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusteringSettings {
    /// Clustering strategy.
    pub algo: ClusterAlgo,
    /// Minimum neighborhood mass for a dense region.
    pub min_cluster_size: usize,
    /// Cluster count for the centroid strategy (clamped to >= 2).
    pub k: usize,
    /// Whether noise points are attached to their nearest centroid.
    pub attach_noise: bool,
}

impl Default for ClusteringSettings {
    fn default() -> Self {
        Self {
            algo: ClusterAlgo::Density,
            min_cluster_size: 3,
            k: 20,
            attach_noise: true,
        }
    }
}

/// Rerank strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum RerankStrategy {
    /// Identity ordering.
    #[default]
    None,
    /// Cross-encoder relevance ordering (`ce`).
    Relevance,
    /// MMR diversity-aware ordering (`mmr`).
    Diversity,
    /// Cross-encoder ordering refined by MMR (`ce+mmr`).
    Combined,
}

impl RerankStrategy {
    /// Parses a strategy name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for unknown names.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "ce" => Ok(Self::Relevance),
            "mmr" => Ok(Self::Diversity),
            "ce+mmr" => Ok(Self::Combined),
            other => Err(Error::Config(format!("unknown rerank strategy: {other}"))),
        }
    }
}

impl TryFrom<String> for RerankStrategy {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

/// Rerank settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RerankSettings {
    /// Rerank strategy.
    pub strategy: RerankStrategy,
    /// MMR relevance/diversity trade-off in 0..=1.
    #[serde(rename = "lambda")]
    pub mmr_lambda: f32,
    /// Cross-encoder model identifier, required by `ce` and `ce+mmr`.
    pub model: Option<String>,
}

impl Default for RerankSettings {
    fn default() -> Self {
        Self {
            strategy: RerankStrategy::None,
            mmr_lambda: 0.4,
            model: None,
        }
    }
}

/// Context packer settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PackerSettings {
    /// Whether packing runs at all.
    pub enabled: bool,
    /// Global token budget across all topics.
    pub budget: usize,
    /// Per-topic minimum token floor.
    pub per_cluster_min: usize,
    /// Per-topic maximum token cap.
    pub per_cluster_max: usize,
}

impl Default for PackerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            budget: 6000,
            per_cluster_min: 300,
            per_cluster_max: 1200,
        }
    }
}

/// Optional CLI overrides layered onto a loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct ProcessingOverrides {
    /// Master dedup switch.
    pub dedup_enabled: Option<bool>,
    /// Semantic threshold; also enables the semantic stage when set.
    pub dedup_threshold: Option<f32>,
    /// Fingerprint stage switch.
    pub fingerprint_enabled: Option<bool>,
    /// Simhash bits.
    pub fingerprint_bits: Option<u32>,
    /// LSH bands.
    pub fingerprint_bands: Option<u32>,
    /// Hamming threshold.
    pub fingerprint_ham: Option<u32>,
    /// Clustering strategy.
    pub cluster_algo: Option<ClusterAlgo>,
    /// Minimum cluster size.
    pub cluster_min_size: Option<usize>,
    /// K for the centroid strategy.
    pub cluster_k: Option<usize>,
    /// Noise attachment switch.
    pub attach_noise: Option<bool>,
    /// Rerank strategy.
    pub rerank_strategy: Option<RerankStrategy>,
    /// MMR lambda.
    pub rerank_lambda: Option<f32>,
    /// Cross-encoder model identifier.
    pub rerank_model: Option<String>,
    /// Packer switch.
    pub packer_enabled: Option<bool>,
    /// Global token budget.
    pub packer_budget: Option<usize>,
    /// Per-topic minimum tokens.
    pub packer_min: Option<usize>,
    /// Per-topic maximum tokens.
    pub packer_max: Option<usize>,
}

impl ProcessingOverrides {
    /// Applies the overrides to a processing configuration.
    pub fn apply(&self, config: &mut ProcessingConfig) {
        if let Some(enabled) = self.dedup_enabled {
            config.dedup.enabled = enabled;
        }
        if let Some(threshold) = self.dedup_threshold {
            config.dedup.semantic.enabled = true;
            config.dedup.semantic.threshold = threshold;
        }
        if let Some(enabled) = self.fingerprint_enabled {
            config.dedup.fingerprint.enabled = enabled;
        }
        if let Some(bits) = self.fingerprint_bits {
            config.dedup.fingerprint.bits = bits;
        }
        if let Some(bands) = self.fingerprint_bands {
            config.dedup.fingerprint.bands = bands;
        }
        if let Some(ham) = self.fingerprint_ham {
            config.dedup.fingerprint.ham_thresh = ham;
        }
        if let Some(algo) = self.cluster_algo {
            config.clustering.algo = algo;
        }
        if let Some(size) = self.cluster_min_size {
            config.clustering.min_cluster_size = size;
        }
        if let Some(k) = self.cluster_k {
            config.clustering.k = k;
        }
        if let Some(attach) = self.attach_noise {
            config.clustering.attach_noise = attach;
        }
        if let Some(strategy) = self.rerank_strategy {
            config.rerank.strategy = strategy;
        }
        if let Some(lambda) = self.rerank_lambda {
            config.rerank.mmr_lambda = lambda;
        }
        if let Some(model) = &self.rerank_model {
            config.rerank.model = Some(model.clone());
        }
        if let Some(enabled) = self.packer_enabled {
            config.packer.enabled = enabled;
        }
        if let Some(budget) = self.packer_budget {
            config.packer.budget = budget;
        }
        if let Some(min) = self.packer_min {
            config.packer.per_cluster_min = min;
        }
        if let Some(max) = self.packer_max {
            config.packer.per_cluster_max = max;
        }
    }
}
