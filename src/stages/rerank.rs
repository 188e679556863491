//! Within-cluster candidate reranking.
//!
//! Produces a permutation of candidate indices. Four strategies:
//!
//! * `none`: identity ordering.
//! * `ce`: descending cross-encoder relevance to the query.
//! * `mmr`: maximal marginal relevance, trading query relevance against
//!   redundancy with the already-selected prefix.
//! * `ce+mmr`: cross-encoder ordering refined by MMR over the reordered
//!   embeddings; degrades to the plain cross-encoder ordering when no
//!   embeddings are supplied.

use crate::config::RerankStrategy;
use crate::embedding::RelevanceScorer;
use crate::stages::semantic::cosine_similarity;
use crate::{Error, Result};

/// Reranks candidates and returns a permutation of `0..candidate_texts.len()`.
///
/// `cand_embs`, when given, must pair positionally with `candidate_texts`.
/// `query_vec` biases MMR toward the query; without it MMR uses the
/// candidate centroid as a stand-in.
///
/// # Errors
///
/// * [`Error::Config`] when `ce` or `ce+mmr` is requested without a scorer
///   or a model name, or when `mmr` is requested without embeddings.
/// * Any error the scorer itself reports.
#[allow(clippy::too_many_arguments)]
pub fn rerank_candidates(
    scorer: Option<&dyn RelevanceScorer>,
    query_text: &str,
    candidate_texts: &[String],
    strategy: RerankStrategy,
    model: Option<&str>,
    cand_embs: Option<&[Vec<f32>]>,
    query_vec: Option<&[f32]>,
    mmr_lambda: f32,
) -> Result<Vec<usize>> {
    match strategy {
        RerankStrategy::None => Ok((0..candidate_texts.len()).collect()),
        RerankStrategy::Relevance => relevance_order(scorer, model, query_text, candidate_texts),
        RerankStrategy::Diversity => {
            let embs = cand_embs.ok_or_else(|| {
                Error::Config("MMR rerank requires candidate embeddings".to_string())
            })?;
            Ok(mmr_select(embs, query_vec, mmr_lambda))
        }
        RerankStrategy::Combined => {
            let ce_order = relevance_order(scorer, model, query_text, candidate_texts)?;
            let Some(embs) = cand_embs else {
                tracing::debug!("rerank.combined: no embeddings, keeping relevance order");
                return Ok(ce_order);
            };
            let ordered: Vec<Vec<f32>> = ce_order.iter().map(|&i| embs[i].clone()).collect();
            let local = mmr_select(&ordered, query_vec, mmr_lambda);
            Ok(local.into_iter().map(|i| ce_order[i]).collect())
        }
    }
}

/// Cross-encoder ordering: indices sorted by descending score, stable for
/// ties.
fn relevance_order(
    scorer: Option<&dyn RelevanceScorer>,
    model: Option<&str>,
    query_text: &str,
    candidate_texts: &[String],
) -> Result<Vec<usize>> {
    let scorer =
        scorer.ok_or_else(|| Error::Config("CE rerank requires a relevance scorer".to_string()))?;
    let model =
        model.ok_or_else(|| Error::Config("CE rerank requires a model name".to_string()))?;

    let scores = scorer.score(model, query_text, candidate_texts)?;
    if scores.len() != candidate_texts.len() {
        return Err(Error::InputMismatch {
            stage: "rerank_ce",
            expected: candidate_texts.len(),
            actual: scores.len(),
        });
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(order)
}

/// Maximal-marginal-relevance selection over the full candidate set.
///
/// The first pick maximizes query similarity; each later pick maximizes
/// `lambda * sim(query) - (1 - lambda) * max sim(selected)`. Ties keep the
/// lowest candidate index. Always returns a full permutation.
#[must_use]
pub fn mmr_select(cand_embs: &[Vec<f32>], query_vec: Option<&[f32]>, lambda: f32) -> Vec<usize> {
    let n = cand_embs.len();
    if n == 0 {
        return Vec::new();
    }

    let centroid: Vec<f32>;
    let query: &[f32] = match query_vec {
        Some(q) => q,
        None => {
            let dim = cand_embs[0].len();
            let mut sum = vec![0.0f32; dim];
            for emb in cand_embs {
                for (s, v) in sum.iter_mut().zip(emb) {
                    *s += v;
                }
            }
            #[allow(clippy::cast_precision_loss)]
            let count = n as f32;
            for s in &mut sum {
                *s /= count;
            }
            centroid = sum;
            &centroid
        }
    };

    let sim_q: Vec<f32> = cand_embs
        .iter()
        .map(|emb| cosine_similarity(emb, query))
        .collect();
    let mut sim_mat = vec![vec![0.0f32; n]; n];
    for i in 0..n {
        sim_mat[i][i] = 1.0;
        for j in (i + 1)..n {
            let sim = cosine_similarity(&cand_embs[i], &cand_embs[j]);
            sim_mat[i][j] = sim;
            sim_mat[j][i] = sim;
        }
    }

    let mut selected: Vec<usize> = Vec::with_capacity(n);
    let mut remaining: Vec<bool> = vec![true; n];

    let mut first = 0;
    let mut first_sim = f32::NEG_INFINITY;
    for (idx, &sim) in sim_q.iter().enumerate() {
        if sim > first_sim {
            first_sim = sim;
            first = idx;
        }
    }
    selected.push(first);
    remaining[first] = false;

    while selected.len() < n {
        let mut best = None;
        let mut best_score = f32::NEG_INFINITY;
        for idx in 0..n {
            if !remaining[idx] {
                continue;
            }
            let redundancy = selected
                .iter()
                .map(|&s| sim_mat[idx][s])
                .fold(f32::NEG_INFINITY, f32::max);
            let score = lambda * sim_q[idx] - (1.0 - lambda) * redundancy;
            if score > best_score {
                best_score = score;
                best = Some(idx);
            }
        }
        match best {
            Some(idx) => {
                selected.push(idx);
                remaining[idx] = false;
            }
            None => break,
        }
    }

    // Anything untouched (only possible with a truncated selection) is
    // appended in ascending index order.
    for (idx, open) in remaining.into_iter().enumerate() {
        if open {
            selected.push(idx);
        }
    }
    selected
}
