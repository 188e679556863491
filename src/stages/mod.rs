//! Pipeline stages, in execution order: canonicalization, fingerprint
//! dedup, semantic dedup, clustering, reranking, and context packing.

pub mod canonicalize;
pub mod cluster;
pub mod fingerprint;
pub mod packer;
pub mod rerank;
pub mod semantic;

pub use canonicalize::canonicalize;
pub use cluster::{assemble_clusters, cluster_labels};
pub use fingerprint::dedup_fingerprint;
pub use packer::pack;
pub use rerank::rerank_candidates;
pub use semantic::{cosine_similarity, dedup_semantic};
