//! Semantic deduplication over externally supplied embedding vectors.
//!
//! Collapses items whose meaning, not just surface text, is near-duplicate.
//! The full pairwise cosine-similarity matrix is computed, then items are
//! scanned in original index order: each retained item removes every later
//! still-retained item at or above the threshold, recording itself as the
//! representative.
//!
//! This is a greedy "first retained anchor wins" reduction, not transitive
//! clustering: once an item is removed it never acts as a comparison anchor
//! again, so chains of similarity do not merge into equivalence classes.
//! The asymmetry is deliberate and must be preserved.

use crate::models::Item;
use crate::{Error, Result};

/// Cosine similarity between two vectors.
///
/// Returns the raw value in [-1, 1]. Returns 0.0 when the vectors have
/// different dimensions or either has zero magnitude.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Collapses embedding-near-identical items.
///
/// `embeddings` must pair 1:1 positionally with `items`. The threshold
/// comparison is inclusive (`>=`). Returns the boolean-masked embedding and
/// item sequences, order preserved; each survivor's `merged_urls` is reset
/// to its own URL and then extended with the URLs of every item that
/// collapsed onto it.
///
/// # Errors
///
/// Returns [`Error::InputMismatch`] when the sequence lengths disagree.
pub fn dedup_semantic(
    embeddings: &[Vec<f32>],
    items: &[Item],
    threshold: f32,
) -> Result<(Vec<Vec<f32>>, Vec<Item>)> {
    if embeddings.len() != items.len() {
        return Err(Error::InputMismatch {
            stage: "semantic_dedup",
            expected: items.len(),
            actual: embeddings.len(),
        });
    }

    let n = items.len();
    let mut sims = vec![vec![0.0f32; n]; n];
    for i in 0..n {
        sims[i][i] = 1.0;
        for j in (i + 1)..n {
            let sim = cosine_similarity(&embeddings[i], &embeddings[j]);
            sims[i][j] = sim;
            sims[j][i] = sim;
        }
    }

    let mut keep_mask = vec![true; n];
    let mut rep_for: Vec<usize> = (0..n).collect();

    for i in 0..n {
        if !keep_mask[i] {
            continue;
        }
        for j in (i + 1)..n {
            if keep_mask[j] && sims[i][j] >= threshold {
                keep_mask[j] = false;
                rep_for[j] = i;
            }
        }
    }

    let mut filtered_embs = Vec::new();
    let mut filtered_items = Vec::new();
    let mut index_map = vec![usize::MAX; n];
    for (old_idx, &kept) in keep_mask.iter().enumerate() {
        if kept {
            index_map[old_idx] = filtered_items.len();
            let mut item = items[old_idx].clone();
            // Reset provenance to the survivor's own URL; duplicates are
            // unioned back below, representative URL first.
            item.merged_urls = item.url.clone().into_iter().collect();
            filtered_embs.push(embeddings[old_idx].clone());
            filtered_items.push(item);
        }
    }

    for j in 0..n {
        if keep_mask[j] {
            continue;
        }
        let new_idx = index_map[rep_for[j]];
        if let Some(url) = &items[j].url {
            let merged = &mut filtered_items[new_idx].merged_urls;
            if !merged.contains(url) {
                merged.push(url.clone());
            }
        }
    }

    tracing::info!(
        kept = filtered_items.len(),
        from = n,
        threshold,
        "dedup.semantic"
    );
    Ok((filtered_embs, filtered_items))
}
