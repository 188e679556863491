//! Briefing pipeline CLI.
//!
//! Loads a briefing configuration, reads fetched items from a JSON file,
//! runs the reduction pipeline, and writes the packed context artifact.

use anyhow::Context as _;
use briefing::config::{
    BriefingConfig, ClusterAlgo, ProcessingOverrides, RerankStrategy,
};
use briefing::embedding::HashEmbedder;
use briefing::pipeline::Pipeline;
use briefing::token::{HeuristicEstimator, TiktokenEstimator, TokenEstimator};
use briefing::models::Item;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "briefing", about = "Run a briefing reduction task", version)]
struct Cli {
    /// Path to the briefing config YAML file.
    #[arg(long)]
    config: PathBuf,

    /// Path to a JSON file holding the fetched items (array of objects).
    #[arg(long)]
    items: PathBuf,

    /// Enable debug logging (RUST_LOG overrides this).
    #[arg(short, long)]
    verbose: bool,

    /// Enable both dedup stages.
    #[arg(long, conflicts_with = "no_dedup")]
    dedup: bool,
    /// Disable both dedup stages.
    #[arg(long)]
    no_dedup: bool,
    /// Semantic dedup cosine threshold (0-1); implies the stage is on.
    #[arg(long)]
    dedup_threshold: Option<f32>,
    /// Enable the fingerprint dedup stage.
    #[arg(long, conflicts_with = "no_dedup_fp")]
    dedup_fp: bool,
    /// Disable the fingerprint dedup stage.
    #[arg(long)]
    no_dedup_fp: bool,
    /// SimHash bits (32-128).
    #[arg(long)]
    dedup_fp_bits: Option<u32>,
    /// LSH band count (1-16).
    #[arg(long)]
    dedup_fp_bands: Option<u32>,
    /// Hamming threshold within a duplicate family.
    #[arg(long)]
    dedup_fp_ham: Option<u32>,

    /// Clustering algorithm (hdbscan | kmeans).
    #[arg(long, value_parser = ClusterAlgo::parse)]
    cluster_algo: Option<ClusterAlgo>,
    /// Minimum cluster size.
    #[arg(long)]
    cluster_min_size: Option<usize>,
    /// K for kmeans.
    #[arg(long)]
    cluster_k: Option<usize>,
    /// Attach noise points to the nearest cluster.
    #[arg(long, conflicts_with = "no_attach_noise")]
    attach_noise: bool,
    /// Keep -1 noise labels.
    #[arg(long)]
    no_attach_noise: bool,

    /// Rerank strategy (none | ce | mmr | ce+mmr).
    #[arg(long, value_parser = RerankStrategy::parse)]
    rerank_strategy: Option<RerankStrategy>,
    /// MMR lambda (0-1).
    #[arg(long)]
    rerank_lambda: Option<f32>,
    /// Cross-encoder model name.
    #[arg(long)]
    rerank_model: Option<String>,

    /// Enable context packing.
    #[arg(long = "pack", conflicts_with = "no_pack")]
    pack: bool,
    /// Disable context packing.
    #[arg(long = "no-pack")]
    no_pack: bool,
    /// Global token budget.
    #[arg(long)]
    pack_budget: Option<usize>,
    /// Per-topic minimum tokens.
    #[arg(long)]
    pack_min: Option<usize>,
    /// Per-topic maximum tokens.
    #[arg(long)]
    pack_max: Option<usize>,
}

/// Folds a paired enable/disable flag into an optional override.
const fn toggle(on: bool, off: bool) -> Option<bool> {
    if on {
        Some(true)
    } else if off {
        Some(false)
    } else {
        None
    }
}

impl Cli {
    fn overrides(&self) -> ProcessingOverrides {
        ProcessingOverrides {
            dedup_enabled: toggle(self.dedup, self.no_dedup),
            dedup_threshold: self.dedup_threshold,
            fingerprint_enabled: toggle(self.dedup_fp, self.no_dedup_fp),
            fingerprint_bits: self.dedup_fp_bits,
            fingerprint_bands: self.dedup_fp_bands,
            fingerprint_ham: self.dedup_fp_ham,
            cluster_algo: self.cluster_algo,
            cluster_min_size: self.cluster_min_size,
            cluster_k: self.cluster_k,
            attach_noise: toggle(self.attach_noise, self.no_attach_noise),
            rerank_strategy: self.rerank_strategy,
            rerank_lambda: self.rerank_lambda,
            rerank_model: self.rerank_model.clone(),
            packer_enabled: toggle(self.pack, self.no_pack),
            packer_budget: self.pack_budget,
            packer_min: self.pack_min,
            packer_max: self.pack_max,
        }
    }
}

fn load_items(path: &std::path::Path) -> anyhow::Result<Vec<Item>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading items file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("parsing items file {}", path.display()))
}

fn token_estimator() -> Arc<dyn TokenEstimator> {
    match TiktokenEstimator::new() {
        Ok(estimator) => Arc::new(estimator),
        Err(e) => {
            tracing::warn!(error = %e, "tokenizer unavailable, using heuristic estimator");
            Arc::new(HeuristicEstimator)
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    briefing::observability::init_logging(cli.verbose)?;

    let run_id: String = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
    tracing::info!(run_id, "briefing run starting");

    let mut config = BriefingConfig::load_from_file(&cli.config)?;
    cli.overrides().apply(&mut config.processing);
    config.processing.validate()?;
    tracing::info!(
        briefing_id = config.briefing_id,
        title = config.briefing_title,
        "config loaded"
    );

    let items = load_items(&cli.items)?;
    tracing::info!(items = items.len(), "items loaded");

    let pipeline = Pipeline::new(
        config.processing.clone(),
        Arc::new(HashEmbedder::default()),
        None,
        token_estimator(),
    );
    let run = pipeline.run(items)?;
    tracing::info!(summary = %run.stats.summary(), "processing complete");

    if config.processing.packer.enabled {
        let date_iso = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let artifact = pipeline.pack(&run.clusters, &config.briefing_title, &date_iso);

        // Packing output is best-effort; a write failure must not sink the run.
        let path = config.output.dir.join("packed.json");
        let write = std::fs::create_dir_all(&config.output.dir)
            .and_then(|()| {
                let json = serde_json::to_string_pretty(&artifact)?;
                std::fs::write(&path, json)
            });
        match write {
            Ok(()) => tracing::info!(
                path = %path.display(),
                topics = artifact.topics.len(),
                "packed context written"
            ),
            Err(e) => tracing::warn!(error = %e, "context packer output failed"),
        }
    }

    tracing::info!(run_id, "briefing run finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_paired_toggles() {
        let cli = Cli::parse_from([
            "briefing",
            "--config",
            "c.yaml",
            "--items",
            "i.json",
            "--no-dedup",
            "--attach-noise",
        ]);
        let overrides = cli.overrides();
        assert_eq!(overrides.dedup_enabled, Some(false));
        assert_eq!(overrides.attach_noise, Some(true));
        assert_eq!(overrides.packer_enabled, None);
    }

    #[test]
    fn test_cli_rejects_unknown_strategy() {
        let result = Cli::try_parse_from([
            "briefing",
            "--config",
            "c.yaml",
            "--items",
            "i.json",
            "--rerank-strategy",
            "bogus",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parses_strategies() {
        let cli = Cli::parse_from([
            "briefing",
            "--config",
            "c.yaml",
            "--items",
            "i.json",
            "--cluster-algo",
            "kmeans",
            "--rerank-strategy",
            "ce+mmr",
        ]);
        assert_eq!(cli.cluster_algo, Some(ClusterAlgo::Kmeans));
        assert_eq!(cli.rerank_strategy, Some(RerankStrategy::Combined));
    }
}
