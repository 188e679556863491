//! Context packing: turns topic clusters into a budgeted excerpt artifact.
//!
//! Each cluster contributes sentence-level excerpts under a per-topic token
//! window (`min_tokens..=max_tokens`), and the topics share a global token
//! budget that shrinks as earlier topics consume it. A sentence that would
//! push a topic past its cap is never accepted; while the topic is still
//! under its floor the scan continues in case a shorter sentence fits,
//! otherwise packing for that topic stops.

use crate::models::{Cluster, Excerpt, PackedArtifact, PackedTopic};
use crate::token::TokenEstimator;
use std::collections::HashSet;

/// Maximum sentences drawn from a single item.
const MAX_SENTENCES_PER_ITEM: usize = 8;

/// Splits text into sentences at terminator-plus-whitespace boundaries.
///
/// Recognized terminators are `。`, `！`, `？`, `.`, `!`, and `?`; the
/// terminator stays attached to its sentence. Text without any boundary
/// comes back as a single sentence; empty or whitespace-only input yields
/// nothing.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<String> {
    const TERMINATORS: [char; 6] = ['。', '！', '？', '.', '!', '?'];

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut after_terminator = false;
    let mut in_break = false;

    for c in trimmed.chars() {
        if c.is_whitespace() {
            if after_terminator {
                in_break = true;
                continue;
            }
            if in_break {
                continue;
            }
            current.push(c);
            continue;
        }
        if in_break {
            let sentence = current.trim().to_string();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            current = String::new();
            in_break = false;
        }
        current.push(c);
        after_terminator = TERMINATORS.contains(&c);
    }

    let sentence = current.trim().to_string();
    if !sentence.is_empty() {
        sentences.push(sentence);
    }
    sentences
}

/// Packs one cluster's items into excerpts within a token window.
///
/// At most [`MAX_SENTENCES_PER_ITEM`] sentences are considered per item,
/// and a sentence already accepted for this cluster is skipped. Every
/// excerpt carries the source URLs of the item it was drawn from.
#[must_use]
pub fn pack_cluster(
    items: &[crate::models::Item],
    min_tokens: usize,
    max_tokens: usize,
    estimator: &dyn TokenEstimator,
) -> Vec<Excerpt> {
    let mut used: HashSet<String> = HashSet::new();
    let mut total = 0usize;
    let mut out = Vec::new();

    for item in items {
        let urls = item.source_urls();
        for sentence in split_sentences(&item.text)
            .into_iter()
            .take(MAX_SENTENCES_PER_ITEM)
        {
            if used.contains(&sentence) {
                continue;
            }
            let tokens = estimator.estimate(&sentence);
            if total + tokens > max_tokens {
                if total >= min_tokens {
                    return out;
                }
                // Under the floor: skip this sentence and keep scanning
                // for one that fits.
                continue;
            }
            used.insert(sentence.clone());
            out.push(Excerpt {
                text: sentence,
                urls: urls.clone(),
            });
            total += tokens;
        }
    }
    out
}

/// Packs clusters into the final artifact under a global token budget.
///
/// Clusters are processed in order. Each topic's cap is the per-topic
/// maximum clamped to the remaining budget, except that once the remaining
/// budget no longer exceeds the per-topic floor the whole remainder is
/// offered. Tokens a topic consumed are deducted before the next topic;
/// clusters reached after the budget hits zero are omitted entirely.
#[must_use]
pub fn pack(
    clusters: &[Cluster],
    token_budget: usize,
    per_cluster_min: usize,
    per_cluster_max: usize,
    title: &str,
    date_iso: &str,
    estimator: &dyn TokenEstimator,
) -> PackedArtifact {
    let mut remaining = token_budget;
    let mut topics = Vec::new();

    for cluster in clusters {
        let cap = if remaining > per_cluster_min {
            per_cluster_max.min(remaining)
        } else {
            remaining
        };
        let excerpts = pack_cluster(&cluster.items, per_cluster_min, cap, estimator);
        let used: usize = excerpts
            .iter()
            .map(|e| estimator.estimate(&e.text))
            .sum();
        topics.push(PackedTopic {
            topic_id: cluster.topic_id.clone(),
            label: cluster.label.clone(),
            excerpts,
        });
        remaining = remaining.saturating_sub(used);
        if remaining == 0 {
            break;
        }
    }

    tracing::info!(
        topics = topics.len(),
        of = clusters.len(),
        budget = token_budget,
        remaining,
        "packer.pack"
    );

    PackedArtifact {
        title: title.to_string(),
        date: date_iso.to_string(),
        topics,
    }
}
