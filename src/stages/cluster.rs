//! Topic clustering over item embeddings.
//!
//! Two strategies are offered. The default density strategy finds dense
//! regions in cosine-similarity space and leaves everything else in a noise
//! bucket (label `-1`), optionally followed by a single attachment pass that
//! assigns noise points to the nearest pre-attachment cluster centroid. The
//! centroid strategy is a deterministic spherical k-means that assigns
//! every point.
//!
//! Labels index into the input positionally; [`assemble_clusters`] turns a
//! label vector back into labeled topic groups.

use crate::config::{ClusterAlgo, ClusteringSettings};
use crate::models::{Cluster, Item};
use crate::stages::semantic::cosine_similarity;
use crate::{Error, Result};

/// Cosine similarity at or above which two points are neighbors for the
/// density strategy.
const NEIGHBOR_SIM: f32 = 0.65;

/// Maximum k-means refinement iterations.
const MAX_KMEANS_ITERS: usize = 100;

/// Noise label for the density strategy.
pub const NOISE: i32 = -1;

/// Assigns a cluster label to every embedding.
///
/// Density labels are `0..` in discovery order with `-1` for noise;
/// centroid labels are `0..k` with no noise concept. Empty input yields an
/// empty label vector.
///
/// # Errors
///
/// Returns [`Error::InputMismatch`] when `embeddings` and `items` disagree
/// in length.
pub fn cluster_labels(
    embeddings: &[Vec<f32>],
    items: &[Item],
    settings: &ClusteringSettings,
) -> Result<Vec<i32>> {
    if embeddings.len() != items.len() {
        return Err(Error::InputMismatch {
            stage: "clustering",
            expected: items.len(),
            actual: embeddings.len(),
        });
    }
    if embeddings.is_empty() {
        return Ok(Vec::new());
    }

    let labels = match settings.algo {
        ClusterAlgo::Kmeans => kmeans_labels(embeddings, settings.k),
        ClusterAlgo::Density => {
            let mut labels = density_labels(embeddings, settings.min_cluster_size);
            if settings.attach_noise {
                labels = attach_noise(embeddings, &labels);
            }
            let clusters = labels.iter().filter(|&&l| l >= 0).collect::<std::collections::HashSet<_>>().len();
            let noise = labels.iter().filter(|&&l| l == NOISE).count();
            tracing::info!(
                clusters,
                noise,
                min_size = settings.min_cluster_size,
                attach_noise = settings.attach_noise,
                "cluster.density"
            );
            labels
        }
    };
    Ok(labels)
}

/// Density-based labeling over cosine distance.
///
/// A point is a core point when its neighborhood (self included) holds at
/// least `min_cluster_size` points. Clusters grow from core points by
/// region expansion; non-core points reachable from a core point join that
/// cluster as border points, everything else stays noise.
fn density_labels(embeddings: &[Vec<f32>], min_cluster_size: usize) -> Vec<i32> {
    let n = embeddings.len();
    let min_pts = min_cluster_size.max(1);

    let neighborhoods: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| cosine_similarity(&embeddings[i], &embeddings[j]) >= NEIGHBOR_SIM)
                .collect()
        })
        .collect();

    let mut labels = vec![NOISE; n];
    let mut visited = vec![false; n];
    let mut next_label = 0i32;

    for start in 0..n {
        if visited[start] || neighborhoods[start].len() < min_pts {
            continue;
        }

        let label = next_label;
        next_label += 1;

        // Region expansion from the seed core point.
        let mut frontier = vec![start];
        visited[start] = true;
        labels[start] = label;
        while let Some(point) = frontier.pop() {
            if neighborhoods[point].len() < min_pts {
                continue;
            }
            for &neighbor in &neighborhoods[point] {
                if labels[neighbor] == NOISE {
                    labels[neighbor] = label;
                }
                if !visited[neighbor] {
                    visited[neighbor] = true;
                    frontier.push(neighbor);
                }
            }
        }
    }

    labels
}

/// Mean embedding per cluster label, in ascending label order.
fn centroids_for(embeddings: &[Vec<f32>], labels: &[i32]) -> Vec<(i32, Vec<f32>)> {
    let mut present: Vec<i32> = labels.iter().copied().filter(|&l| l >= 0).collect();
    present.sort_unstable();
    present.dedup();

    present
        .into_iter()
        .map(|label| {
            let dim = embeddings.first().map_or(0, Vec::len);
            let mut sum = vec![0.0f32; dim];
            let mut count = 0usize;
            for (emb, &l) in embeddings.iter().zip(labels) {
                if l == label {
                    for (s, v) in sum.iter_mut().zip(emb) {
                        *s += v;
                    }
                    count += 1;
                }
            }
            #[allow(clippy::cast_precision_loss)]
            let count = count.max(1) as f32;
            for s in &mut sum {
                *s /= count;
            }
            (label, sum)
        })
        .collect()
}

/// Attaches every noise point to its most-similar cluster centroid.
///
/// Centroids are computed once from the pre-attachment assignment; a
/// wholly-noise labeling is returned unchanged.
fn attach_noise(embeddings: &[Vec<f32>], labels: &[i32]) -> Vec<i32> {
    if !labels.iter().any(|&l| l >= 0) {
        return labels.to_vec();
    }
    let centroids = centroids_for(embeddings, labels);

    let mut attached = labels.to_vec();
    for (idx, label) in attached.iter_mut().enumerate() {
        if *label != NOISE {
            continue;
        }
        let mut best = centroids[0].0;
        let mut best_sim = f32::NEG_INFINITY;
        for (candidate, centroid) in &centroids {
            let sim = cosine_similarity(&embeddings[idx], centroid);
            if sim > best_sim {
                best_sim = sim;
                best = *candidate;
            }
        }
        *label = best;
    }
    attached
}

/// Deterministic spherical k-means.
///
/// `k` is clamped to `2..=n`. Seeding is farthest-first from index 0;
/// assignment maximizes cosine similarity with ties going to the lowest
/// centroid index; a centroid that loses all its points keeps its previous
/// position.
fn kmeans_labels(embeddings: &[Vec<f32>], k: usize) -> Vec<i32> {
    let n = embeddings.len();
    let k = k.max(2).min(n);

    let mut centroids: Vec<Vec<f32>> = vec![embeddings[0].clone()];
    while centroids.len() < k {
        let mut farthest = 0;
        let mut farthest_sim = f32::INFINITY;
        for (idx, emb) in embeddings.iter().enumerate() {
            let closest = centroids
                .iter()
                .map(|c| cosine_similarity(emb, c))
                .fold(f32::NEG_INFINITY, f32::max);
            if closest < farthest_sim {
                farthest_sim = closest;
                farthest = idx;
            }
        }
        centroids.push(embeddings[farthest].clone());
    }

    let mut labels = vec![0i32; n];
    for _ in 0..MAX_KMEANS_ITERS {
        let mut changed = false;
        for (idx, emb) in embeddings.iter().enumerate() {
            let mut best = 0i32;
            let mut best_sim = f32::NEG_INFINITY;
            for (c_idx, centroid) in centroids.iter().enumerate() {
                let sim = cosine_similarity(emb, centroid);
                if sim > best_sim {
                    best_sim = sim;
                    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                    {
                        best = c_idx as i32;
                    }
                }
            }
            if labels[idx] != best {
                labels[idx] = best;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        for (c_idx, centroid) in centroids.iter_mut().enumerate() {
            let dim = centroid.len();
            let mut sum = vec![0.0f32; dim];
            let mut count = 0usize;
            for (emb, &label) in embeddings.iter().zip(&labels) {
                #[allow(clippy::cast_sign_loss)]
                if label >= 0 && label as usize == c_idx {
                    for (s, v) in sum.iter_mut().zip(emb) {
                        *s += v;
                    }
                    count += 1;
                }
            }
            if count == 0 {
                continue;
            }
            let norm: f32 = sum.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > f32::EPSILON {
                for s in &mut sum {
                    *s /= norm;
                }
            }
            *centroid = sum;
        }
    }

    tracing::info!(k, n, "cluster.kmeans");
    labels
}

/// Derives a short human-readable label from an item's leading words.
pub(crate) fn topic_label(item: &Item) -> String {
    item.text
        .split_whitespace()
        .take(8)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stringifies a cluster label as a topic identifier.
pub(crate) fn topic_id(label: i32) -> String {
    if label == NOISE {
        "cluster-noise".to_string()
    } else {
        format!("cluster-{label}")
    }
}

/// Groups item indices by cluster label.
///
/// Groups come back in ascending label order with the noise bucket (if
/// any) last; indices within a group keep input order.
#[must_use]
pub fn index_groups(labels: &[i32]) -> Vec<(i32, Vec<usize>)> {
    let mut present: Vec<i32> = labels.iter().copied().filter(|&l| l >= 0).collect();
    present.sort_unstable();
    present.dedup();
    present.push(NOISE);

    present
        .into_iter()
        .filter_map(|label| {
            let members: Vec<usize> = labels
                .iter()
                .enumerate()
                .filter(|&(_, &l)| l == label)
                .map(|(idx, _)| idx)
                .collect();
            (!members.is_empty()).then_some((label, members))
        })
        .collect()
}

/// Groups labeled items into topic clusters.
///
/// Clusters are emitted in ascending label order, with the noise bucket
/// (if any) last as `cluster-noise`. Each cluster's display label is drawn
/// from its first item's leading words.
#[must_use]
pub fn assemble_clusters(labels: &[i32], items: &[Item]) -> Vec<Cluster> {
    index_groups(labels)
        .into_iter()
        .map(|(label, members)| {
            let members: Vec<Item> = members.into_iter().map(|idx| items[idx].clone()).collect();
            let display = members.first().map(topic_label).unwrap_or_default();
            Cluster {
                topic_id: topic_id(label),
                label: display,
                items: members,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn density_settings(min_cluster_size: usize, attach: bool) -> ClusteringSettings {
        ClusteringSettings {
            algo: ClusterAlgo::Density,
            min_cluster_size,
            k: 20,
            attach_noise: attach,
        }
    }

    /// Two tight groups plus one outlier, all unit vectors in 3D.
    fn two_groups_and_outlier() -> Vec<Vec<f32>> {
        vec![
            vec![1.0, 0.0, 0.0],
            vec![0.99, 0.14, 0.0],
            vec![0.99, 0.0, 0.14],
            vec![0.0, 1.0, 0.0],
            vec![0.14, 0.99, 0.0],
            vec![0.0, 0.99, 0.14],
            vec![0.0, 0.0, 1.0],
        ]
    }

    fn items_for(n: usize) -> Vec<Item> {
        (0..n).map(|i| Item::new(format!("item number {i}"))).collect()
    }

    #[test]
    fn test_empty_input() {
        let labels =
            cluster_labels(&[], &[], &density_settings(3, true)).expect("empty is fine");
        assert!(labels.is_empty());
    }

    #[test]
    fn test_length_mismatch() {
        let err = cluster_labels(&[vec![1.0]], &[], &density_settings(3, true))
            .expect_err("mismatch must fail");
        assert!(matches!(err, Error::InputMismatch { stage: "clustering", .. }));
    }

    #[test]
    fn test_density_finds_two_groups_with_noise() {
        let embs = two_groups_and_outlier();
        let items = items_for(embs.len());
        let labels =
            cluster_labels(&embs, &items, &density_settings(3, false)).expect("valid");

        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[3], labels[5]);
        assert_ne!(labels[0], labels[3]);
        assert_eq!(labels[6], NOISE);
    }

    #[test]
    fn test_noise_attachment_assigns_everything() {
        let embs = two_groups_and_outlier();
        let items = items_for(embs.len());
        let labels =
            cluster_labels(&embs, &items, &density_settings(3, true)).expect("valid");
        assert!(labels.iter().all(|&l| l >= 0));
    }

    #[test]
    fn test_all_noise_survives_attachment() {
        // Mutually orthogonal points with min size 3: no dense region, and
        // the attachment pass has no centroids to attach to.
        let embs = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ];
        let items = items_for(embs.len());
        let labels =
            cluster_labels(&embs, &items, &density_settings(3, true)).expect("valid");
        assert!(labels.iter().all(|&l| l == NOISE));
    }

    #[test]
    fn test_density_is_deterministic() {
        let embs = two_groups_and_outlier();
        let items = items_for(embs.len());
        let a = cluster_labels(&embs, &items, &density_settings(3, true)).expect("valid");
        let b = cluster_labels(&embs, &items, &density_settings(3, true)).expect("valid");
        assert_eq!(a, b);
    }

    #[test]
    fn test_kmeans_separates_two_groups() {
        let embs = two_groups_and_outlier();
        let items = items_for(embs.len());
        let settings = ClusteringSettings {
            algo: ClusterAlgo::Kmeans,
            min_cluster_size: 3,
            k: 2,
            attach_noise: true,
        };
        let labels = cluster_labels(&embs, &items, &settings).expect("valid");

        assert!(labels.iter().all(|&l| l >= 0));
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[3], labels[4]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn test_kmeans_clamps_k_to_population() {
        let embs = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let items = items_for(2);
        let settings = ClusteringSettings {
            algo: ClusterAlgo::Kmeans,
            min_cluster_size: 3,
            k: 20,
            attach_noise: true,
        };
        let labels = cluster_labels(&embs, &items, &settings).expect("valid");
        assert_eq!(labels.len(), 2);
        assert!(labels.iter().all(|&l| l == 0 || l == 1));
    }

    #[test]
    fn test_assemble_clusters_orders_and_names() {
        let items = vec![
            Item::new("first topic item one two three"),
            Item::new("second topic item"),
            Item::new("first topic companion"),
            Item::new("stray outlier"),
        ];
        let labels = vec![1, 0, 1, NOISE];
        let clusters = assemble_clusters(&labels, &items);

        assert_eq!(clusters.len(), 3);
        assert_eq!(clusters[0].topic_id, "cluster-0");
        assert_eq!(clusters[0].items.len(), 1);
        assert_eq!(clusters[1].topic_id, "cluster-1");
        assert_eq!(clusters[1].items.len(), 2);
        assert_eq!(clusters[1].label, "first topic item one two three");
        assert_eq!(clusters[2].topic_id, "cluster-noise");
        assert_eq!(clusters[2].items.len(), 1);
    }

    #[test]
    fn test_assemble_clusters_truncates_label_to_eight_words() {
        let items = vec![Item::new("one two three four five six seven eight nine ten")];
        let clusters = assemble_clusters(&[0], &items);
        assert_eq!(clusters[0].label, "one two three four five six seven eight");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn unit_vec() -> impl Strategy<Value = Vec<f32>> {
            prop::collection::vec(-1.0f32..1.0f32, 4).prop_map(|v| {
                let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm < f32::EPSILON {
                    vec![1.0, 0.0, 0.0, 0.0]
                } else {
                    v.into_iter().map(|x| x / norm).collect()
                }
            })
        }

        proptest! {
            /// Every point gets exactly one label and noise only appears
            /// for the density strategy without attachment.
            #[test]
            fn prop_labels_cover_input(vecs in prop::collection::vec(unit_vec(), 0..15)) {
                let items: Vec<Item> =
                    (0..vecs.len()).map(|i| Item::new(format!("i{i}"))).collect();
                let labels = cluster_labels(&vecs, &items, &ClusteringSettings {
                    algo: ClusterAlgo::Density,
                    min_cluster_size: 2,
                    k: 20,
                    attach_noise: false,
                }).expect("valid");
                prop_assert_eq!(labels.len(), vecs.len());
                prop_assert!(labels.iter().all(|&l| l >= -1));
            }

            /// Assembly partitions the items: sizes sum to the input size.
            #[test]
            fn prop_assembly_partitions(labels in prop::collection::vec(-1i32..4, 0..20)) {
                let items: Vec<Item> =
                    (0..labels.len()).map(|i| Item::new(format!("i{i}"))).collect();
                let clusters = assemble_clusters(&labels, &items);
                let total: usize = clusters.iter().map(|c| c.items.len()).sum();
                prop_assert_eq!(total, items.len());
            }
        }
    }
}
