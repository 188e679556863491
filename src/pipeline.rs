//! Pipeline orchestration.
//!
//! Wires the stages together in order: fingerprint dedup, embedding,
//! semantic dedup, clustering, and per-topic reranking. Packing is a
//! separate call so a caller can inspect the clusters before spending the
//! token budget.

use crate::config::{ProcessingConfig, RerankStrategy};
use crate::embedding::{Embedder, RelevanceScorer};
use crate::models::{Cluster, Item, PackedArtifact};
use crate::stages::cluster::{cluster_labels, index_groups, topic_id, topic_label};
use crate::stages::{dedup_fingerprint, dedup_semantic, pack, rerank_candidates};
use crate::token::TokenEstimator;
use crate::Result;
use std::sync::Arc;
use std::time::Instant;

/// Per-run stage counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Items handed to the pipeline.
    pub fetched: usize,
    /// Items surviving fingerprint dedup.
    pub after_fingerprint: usize,
    /// Items surviving semantic dedup.
    pub after_semantic: usize,
    /// Topic clusters produced (noise bucket included).
    pub clusters: usize,
}

impl PipelineStats {
    /// One-line human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "fetched={} after_fingerprint={} after_semantic={} clusters={}",
            self.fetched, self.after_fingerprint, self.after_semantic, self.clusters
        )
    }
}

/// Result of a processing run: clusters ready for packing, plus counters.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Topic clusters in emission order.
    pub clusters: Vec<Cluster>,
    /// Stage counters.
    pub stats: PipelineStats,
}

/// The item-reduction pipeline.
///
/// Holds the processing configuration and the injected model backends.
/// Cheap to clone; backends are shared.
#[derive(Clone)]
pub struct Pipeline {
    config: ProcessingConfig,
    embedder: Arc<dyn Embedder>,
    scorer: Option<Arc<dyn RelevanceScorer>>,
    estimator: Arc<dyn TokenEstimator>,
}

impl Pipeline {
    /// Creates a pipeline from a validated configuration and backends.
    ///
    /// `scorer` may be `None` when no cross-encoder strategy is configured.
    #[must_use]
    pub fn new(
        config: ProcessingConfig,
        embedder: Arc<dyn Embedder>,
        scorer: Option<Arc<dyn RelevanceScorer>>,
        estimator: Arc<dyn TokenEstimator>,
    ) -> Self {
        Self {
            config,
            embedder,
            scorer,
            estimator,
        }
    }

    /// Runs dedup, clustering, and reranking over the fetched items.
    ///
    /// # Errors
    ///
    /// Propagates embedding backend failures, stage input mismatches, and
    /// rerank configuration errors.
    #[tracing::instrument(skip_all, fields(items = items.len()))]
    pub fn run(&self, items: Vec<Item>) -> Result<PipelineRun> {
        let started = Instant::now();
        let mut stats = PipelineStats {
            fetched: items.len(),
            ..PipelineStats::default()
        };

        let dedup = &self.config.dedup;
        let items = if dedup.enabled && dedup.fingerprint.enabled {
            dedup_fingerprint(&items, &dedup.fingerprint)
        } else {
            items
        };
        stats.after_fingerprint = items.len();

        let texts: Vec<&str> = items.iter().map(|i| i.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;

        let (embeddings, items) = if dedup.enabled && dedup.semantic.enabled {
            dedup_semantic(&embeddings, &items, dedup.semantic.threshold)?
        } else {
            (embeddings, items)
        };
        stats.after_semantic = items.len();

        let labels = cluster_labels(&embeddings, &items, &self.config.clustering)?;
        let clusters = self.build_clusters(&labels, &items, &embeddings)?;
        stats.clusters = clusters.len();

        metrics::counter!("briefing_items_processed_total").increment(stats.fetched as u64);
        metrics::counter!("briefing_items_retained_total").increment(stats.after_semantic as u64);
        metrics::histogram!("briefing_pipeline_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(summary = %stats.summary(), "pipeline.run");

        Ok(PipelineRun { clusters, stats })
    }

    /// Packs clusters into the budgeted context artifact.
    #[must_use]
    pub fn pack(&self, clusters: &[Cluster], title: &str, date_iso: &str) -> PackedArtifact {
        let packer = &self.config.packer;
        pack(
            clusters,
            packer.budget,
            packer.per_cluster_min,
            packer.per_cluster_max,
            title,
            date_iso,
            self.estimator.as_ref(),
        )
    }

    /// Assembles clusters from labels, reranking members per topic.
    fn build_clusters(
        &self,
        labels: &[i32],
        items: &[Item],
        embeddings: &[Vec<f32>],
    ) -> Result<Vec<Cluster>> {
        let rerank = &self.config.rerank;
        let mut clusters = Vec::new();

        for (label, members) in index_groups(labels) {
            // Label text comes from the first member in input order so
            // reranking never changes a topic's identity.
            let display = members
                .first()
                .map(|&idx| topic_label(&items[idx]))
                .unwrap_or_default();

            let ordered: Vec<usize> = if rerank.strategy == RerankStrategy::None {
                members
            } else {
                let texts: Vec<String> =
                    members.iter().map(|&idx| items[idx].text.clone()).collect();
                let embs: Vec<Vec<f32>> =
                    members.iter().map(|&idx| embeddings[idx].clone()).collect();
                let order = rerank_candidates(
                    self.scorer.as_deref(),
                    &display,
                    &texts,
                    rerank.strategy,
                    rerank.model.as_deref(),
                    Some(&embs),
                    None,
                    rerank.mmr_lambda,
                )?;
                order.into_iter().map(|i| members[i]).collect()
            };

            clusters.push(Cluster {
                topic_id: topic_id(label),
                label: display,
                items: ordered.into_iter().map(|idx| items[idx].clone()).collect(),
            });
        }
        Ok(clusters)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
