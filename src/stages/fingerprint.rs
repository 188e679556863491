//! Fingerprint deduplication (simhash + banded LSH).
//!
//! Cheaply collapses near-duplicate items (reposts, lightly edited copies)
//! before the more expensive semantic stage.
//!
//! # Algorithm
//!
//! 1. Compute a weighted-majority simhash per item over its canonicalized,
//!    lower-cased word tokens. Similar token sets yield fingerprints with
//!    small Hamming distance.
//! 2. Bucket candidates with banded LSH: the fingerprint's bit width is
//!    split into `bands` equal windows, and two items sharing an identical
//!    window value for any band land in the same bucket. Any pair within
//!    Hamming distance `bits/bands - 1` on some band collides in at least
//!    one bucket.
//! 3. Within each bucket, form duplicate families greedily: each candidate
//!    joins the first existing family with any member within `ham_thresh`
//!    Hamming distance, else starts a new family. Single-linkage-like and
//!    order-dependent; candidates are scanned by ascending original index.
//! 4. Each family keeps one representative, scored by
//!    `0.7 * tanh(len / 800) + 0.3 * (ts / (ts + 1))`. The representative
//!    accumulates the de-duplicated union of all family members' URLs into
//!    `merged_urls`, its own URL first.
//!
//! Survivors are emitted in ascending original-index order.

use crate::config::FingerprintSettings;
use crate::models::Item;
use crate::stages::canonicalize;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

/// Word-token pattern for simhash input.
static WORD_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\w+").unwrap()
});

/// Length at which the tanh term of the representative score saturates.
const LENGTH_SCALE: f64 = 800.0;

/// Computes a weighted-majority simhash over word tokens.
///
/// Bit *i* of the result is set iff the signed per-bit weight accumulated
/// across all token hashes is >= 0 at position *i*. `bits` is clamped to
/// 1..=128.
#[must_use]
pub fn simhash(text: &str, bits: u32) -> u128 {
    let bits = bits.clamp(1, 128) as usize;
    let mut weights = vec![0i64; bits];

    let lowered = text.to_lowercase();
    for token in WORD_RE.find_iter(&lowered) {
        let digest = Sha256::digest(token.as_str().as_bytes());
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        let hash = u128::from_le_bytes(bytes);
        for (i, weight) in weights.iter_mut().enumerate() {
            if (hash >> i) & 1 == 1 {
                *weight += 1;
            } else {
                *weight -= 1;
            }
        }
    }

    let mut fingerprint = 0u128;
    for (i, weight) in weights.iter().enumerate() {
        if *weight >= 0 {
            fingerprint |= 1 << i;
        }
    }
    fingerprint
}

/// Hamming distance between two fingerprints.
#[must_use]
pub const fn hamming(a: u128, b: u128) -> u32 {
    (a ^ b).count_ones()
}

/// Groups fingerprint indices into LSH band buckets.
///
/// Buckets are returned in first-insertion order (ascending original index,
/// then band index) so that downstream family formation is deterministic.
fn band_buckets(fingerprints: &[u128], bits: u32, bands: u32) -> Vec<Vec<usize>> {
    let bands = bands.max(1);
    let r = (bits / bands).max(1);
    let mask = if r >= 128 { u128::MAX } else { (1u128 << r) - 1 };

    let mut slots: HashMap<(u32, u128), usize> = HashMap::new();
    let mut buckets: Vec<Vec<usize>> = Vec::new();

    for (idx, &fp) in fingerprints.iter().enumerate() {
        for band in 0..bands {
            let shift = (band * r).min(127);
            let key = (band, (fp >> shift) & mask);
            let slot = *slots.entry(key).or_insert_with(|| {
                buckets.push(Vec::new());
                buckets.len() - 1
            });
            buckets[slot].push(idx);
        }
    }
    buckets
}

/// Composite representative score: saturating length plus bounded recency.
fn representative_score(item: &Item) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let length = item.text.trim().chars().count() as f64;
    let ts = item.timestamp.filter(|t| t.is_finite()).unwrap_or(0.0);
    0.7 * (length / LENGTH_SCALE).tanh() + 0.3 * (ts / (ts + 1.0))
}

/// Picks the family member with the highest composite score.
///
/// Ties keep the earliest-scanned member.
fn select_representative(items: &[Item], family: &[usize]) -> usize {
    let mut best = family[0];
    let mut best_score = representative_score(&items[best]);
    for &idx in &family[1..] {
        let score = representative_score(&items[idx]);
        if score > best_score {
            best = idx;
            best_score = score;
        }
    }
    best
}

/// Removes near-duplicate items via simhash + banded LSH.
///
/// Output preserves original relative ordering among retained
/// representatives. Each representative's `merged_urls` is the
/// order-preserving, de-duplicated union of its family's URLs with its own
/// URL first; items without URLs contribute nothing. Empty input yields
/// empty output.
///
/// This is a total function: it never fails on well-formed items.
#[must_use]
pub fn dedup_fingerprint(items: &[Item], settings: &FingerprintSettings) -> Vec<Item> {
    if items.is_empty() {
        return Vec::new();
    }

    let fingerprints: Vec<u128> = items
        .iter()
        .map(|item| simhash(&canonicalize(&item.text), settings.bits))
        .collect();
    let buckets = band_buckets(&fingerprints, settings.bits, settings.bands);

    let mut seen: HashSet<usize> = HashSet::new();
    let mut keep: Vec<usize> = Vec::new();
    let mut merged_sources: HashMap<usize, Vec<String>> = HashMap::new();

    for bucket in &buckets {
        // Greedy first-match family formation within the bucket.
        let mut families: Vec<Vec<usize>> = Vec::new();
        for &idx in bucket {
            let placed = families.iter_mut().find(|family| {
                family
                    .iter()
                    .any(|&member| hamming(fingerprints[idx], fingerprints[member]) <= settings.ham_thresh)
            });
            match placed {
                Some(family) => family.push(idx),
                None => families.push(vec![idx]),
            }
        }

        for family in &families {
            let rep = select_representative(items, family);
            if seen.insert(rep) {
                keep.push(rep);
                merged_sources.insert(rep, Vec::new());
            }
            let urls: Vec<String> = family
                .iter()
                .filter_map(|&idx| items[idx].url.clone())
                .collect();
            if let Some(sources) = merged_sources.get_mut(&rep) {
                sources.extend(urls);
            }
        }
    }

    keep.sort_unstable();
    keep.dedup();

    let mut out = Vec::with_capacity(keep.len());
    for &idx in &keep {
        let mut item = items[idx].clone();
        if let Some(sources) = merged_sources.get(&idx) {
            if !sources.is_empty() {
                let mut merged: Vec<String> = Vec::new();
                if let Some(rep_url) = &item.url {
                    merged.push(rep_url.clone());
                }
                for url in sources {
                    if !merged.contains(url) {
                        merged.push(url.clone());
                    }
                }
                item.merged_urls = merged;
            }
        }
        out.push(item);
    }

    tracing::info!(kept = out.len(), from = items.len(), "dedup.fingerprint");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> FingerprintSettings {
        FingerprintSettings {
            enabled: true,
            bits: 64,
            bands: 8,
            ham_thresh: 3,
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(dedup_fingerprint(&[], &settings()).is_empty());
    }

    #[test]
    fn test_identical_canonical_texts_collapse() {
        // "Hello World!" and "Hello  World!" canonicalize to the same text,
        // so their fingerprints are identical (Hamming distance 0).
        let items = vec![
            Item::new("Hello World!").with_url("https://a"),
            Item::new("Hello  World!").with_url("https://b"),
            Item::new("A completely different piece of content about databases")
                .with_url("https://c"),
        ];
        let out = dedup_fingerprint(&items, &settings());
        assert_eq!(out.len(), 2);

        let survivor = out
            .iter()
            .find(|i| i.text.starts_with("Hello"))
            .expect("hello representative kept");
        assert!(survivor.merged_urls.contains(&"https://a".to_string()));
        assert!(survivor.merged_urls.contains(&"https://b".to_string()));
    }

    #[test]
    fn test_survivors_keep_input_order() {
        let items = vec![
            Item::new("alpha beta gamma delta"),
            Item::new("totally unrelated content about rust lifetimes"),
            Item::new("a third distinct item discussing embedded firmware"),
        ];
        let out = dedup_fingerprint(&items, &settings());
        let positions: Vec<usize> = out
            .iter()
            .map(|o| items.iter().position(|i| i.text == o.text).expect("present"))
            .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn test_representative_prefers_recent_timestamp() {
        // Same text, so same family; the timestamped copy wins.
        let items = vec![
            Item::new("Breaking release announcement").with_url("u-old"),
            Item::new("Breaking release announcement")
                .with_url("u-new")
                .with_timestamp(1_700_000_000.0),
        ];
        let out = dedup_fingerprint(&items, &settings());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].url.as_deref(), Some("u-new"));
        // Representative's own URL first in the union.
        assert_eq!(out[0].merged_urls[0], "u-new");
        assert!(out[0].merged_urls.contains(&"u-old".to_string()));
    }

    #[test]
    fn test_singleton_family_gets_own_url() {
        let items = vec![Item::new("only one item here").with_url("u1")];
        let out = dedup_fingerprint(&items, &settings());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].merged_urls, vec!["u1"]);
    }

    #[test]
    fn test_items_without_urls_merge_nothing() {
        let items = vec![Item::new("no url here"), Item::new("no url here")];
        let out = dedup_fingerprint(&items, &settings());
        assert_eq!(out.len(), 1);
        assert!(out[0].merged_urls.is_empty());
    }

    #[test]
    fn test_simhash_deterministic() {
        let a = simhash("the quick brown fox", 64);
        let b = simhash("the quick brown fox", 64);
        assert_eq!(a, b);
    }

    #[test]
    fn test_simhash_near_duplicates_close() {
        let a = simhash("the quick brown fox jumps over the lazy dog", 64);
        let b = simhash("the quick brown fox jumps over the lazy cat", 64);
        let c = simhash("completely unrelated text about database migrations", 64);
        assert!(hamming(a, b) < hamming(a, c));
    }

    #[test]
    fn test_hamming() {
        assert_eq!(hamming(0b1010, 0b1010), 0);
        assert_eq!(hamming(0b1010, 0b0101), 4);
        assert_eq!(hamming(u128::MAX, 0), 128);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Survivor order is a subsequence of input order by index.
            #[test]
            fn prop_output_is_subsequence(texts in prop::collection::vec("[a-z ]{1,40}", 0..20)) {
                let items: Vec<Item> = texts.iter().map(Item::new).collect();
                let out = dedup_fingerprint(&items, &settings());
                prop_assert!(out.len() <= items.len());

                let mut cursor = 0;
                for survivor in &out {
                    let pos = items[cursor..]
                        .iter()
                        .position(|i| i.text == survivor.text);
                    prop_assert!(pos.is_some(), "survivor not found in input order");
                    cursor += pos.unwrap_or(0) + 1;
                }
            }

            /// Identical texts always collapse to a single representative.
            #[test]
            fn prop_exact_duplicates_collapse(text in "[a-z ]{1,60}", copies in 2usize..6) {
                let items: Vec<Item> = (0..copies).map(|_| Item::new(&text)).collect();
                let out = dedup_fingerprint(&items, &settings());
                prop_assert_eq!(out.len(), 1);
            }
        }
    }
}
