//! Data model for the reduction pipeline.
//!
//! Items flow through the pipeline positionally: identity during a run is
//! the original index, not a persistent key. Dedup stages record provenance
//! by folding duplicate source URLs into the surviving representative's
//! `merged_urls`.

use serde::{Deserialize, Serialize};

/// One ingested piece of content.
///
/// Created by the fetch collaborator; `merged_urls` is populated by the
/// dedup stages to record which duplicate sources were folded into a
/// surviving representative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// The item's text, already language-normalized but not canonicalized.
    #[serde(default)]
    pub text: String,

    /// Primary source URL, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Unix timestamp of publication, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,

    /// Additional source URLs supplied by the fetch collaborator.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,

    /// URLs of duplicate items folded into this one, representative first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged_urls: Vec<String>,
}

impl Item {
    /// Creates an item from text alone.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Sets the primary source URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the publication timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Returns the URLs an excerpt drawn from this item should carry.
    ///
    /// Prefers the merged provenance list, then the fetch-supplied `urls`
    /// list, then the singular `url`.
    #[must_use]
    pub fn source_urls(&self) -> Vec<String> {
        if !self.merged_urls.is_empty() {
            return self.merged_urls.clone();
        }
        if !self.urls.is_empty() {
            return self.urls.clone();
        }
        self.url.clone().into_iter().collect()
    }
}

/// One topical group of items produced by the clusterer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Opaque topic identifier (`cluster-<n>`, or `cluster-noise`).
    pub topic_id: String,
    /// Human-readable topic label.
    pub label: String,
    /// Items assigned to this topic, in pipeline order.
    #[serde(default)]
    pub items: Vec<Item>,
}

/// A single packed sentence-level unit with its provenance URLs.
///
/// Immutable once created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Excerpt {
    /// The excerpt text (one trimmed sentence).
    pub text: String,
    /// Source URLs for the item the sentence was drawn from.
    #[serde(default)]
    pub urls: Vec<String>,
}

/// One cluster's worth of packed output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackedTopic {
    /// Topic identifier, carried over from the cluster.
    pub topic_id: String,
    /// Topic label, carried over from the cluster.
    pub label: String,
    /// Accepted excerpts, in packing order.
    #[serde(default)]
    pub excerpts: Vec<Excerpt>,
}

/// Final output of the reduction pipeline.
///
/// Handed to the rendering/summarization collaborator and typically also
/// persisted verbatim as a JSON document for inspection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackedArtifact {
    /// Briefing title, supplied by the caller.
    pub title: String,
    /// ISO-8601 generation date, supplied by the caller.
    pub date: String,
    /// Packed topics; clusters reached after budget exhaustion are omitted.
    #[serde(default)]
    pub topics: Vec<PackedTopic>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_builder() {
        let item = Item::new("hello").with_url("https://a").with_timestamp(42.0);
        assert_eq!(item.text, "hello");
        assert_eq!(item.url.as_deref(), Some("https://a"));
        assert_eq!(item.timestamp, Some(42.0));
        assert!(item.merged_urls.is_empty());
    }

    #[test]
    fn test_source_urls_prefers_merged() {
        let item = Item {
            text: "x".to_string(),
            url: Some("u1".to_string()),
            urls: vec!["u2".to_string()],
            merged_urls: vec!["u3".to_string(), "u4".to_string()],
            ..Item::default()
        };
        assert_eq!(item.source_urls(), vec!["u3", "u4"]);
    }

    #[test]
    fn test_source_urls_falls_back_to_urls_then_url() {
        let item = Item {
            text: "x".to_string(),
            url: Some("u1".to_string()),
            urls: vec!["u2".to_string()],
            ..Item::default()
        };
        assert_eq!(item.source_urls(), vec!["u2"]);

        let item = Item::new("x").with_url("u1");
        assert_eq!(item.source_urls(), vec!["u1"]);

        let item = Item::new("x");
        assert!(item.source_urls().is_empty());
    }

    #[test]
    fn test_item_deserializes_with_absent_fields() {
        let item: Item = serde_json::from_str(r#"{"text":"hi"}"#).expect("valid item json");
        assert_eq!(item.text, "hi");
        assert!(item.url.is_none());
        assert!(item.timestamp.is_none());
        assert!(item.urls.is_empty());
    }

    #[test]
    fn test_artifact_json_shape() {
        let artifact = PackedArtifact {
            title: "T".to_string(),
            date: "2025-01-01T00:00:00Z".to_string(),
            topics: vec![PackedTopic {
                topic_id: "cluster-0".to_string(),
                label: "Test".to_string(),
                excerpts: vec![Excerpt {
                    text: "Sentence one.".to_string(),
                    urls: vec!["u1".to_string()],
                }],
            }],
        };
        let json = serde_json::to_value(&artifact).expect("serializable artifact");
        assert_eq!(json["topics"][0]["topic_id"], "cluster-0");
        assert_eq!(json["topics"][0]["excerpts"][0]["urls"][0], "u1");
    }
}
