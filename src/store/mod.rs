
pub mod vector_store;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use vector_store::DocumentStore;

/// A stored document with its embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    pub content: String,
    pub document_type: String,
    /// Open key-value metadata attached at ingestion time
    pub metadata: Map<String, Value>,
    /// Absent when the document was stored without an embedding
    pub vector: Option<Vec<f32>>,
    /// Name of the model that produced the vector, absent without one
    pub embedding_model: Option<String>,
    /// Provenance of the originating file, when the document came from one
    pub file_path: Option<String>,
    pub file_size: Option<u64>,
    pub mime_type: Option<String>,
    /// RFC 3339 timestamp
    pub created_at: String,
    /// RFC 3339 timestamp
    pub updated_at: String,
}

/// Input for storing a document.
///
/// Supplying an `id` makes the write an upsert: any existing record with
/// that id is replaced. Without one a fresh id is assigned.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub id: Option<String>,
    pub title: String,
    pub content: String,
    pub document_type: String,
    pub metadata: Map<String, Value>,
    pub vector: Option<Vec<f32>>,
    pub embedding_model: Option<String>,
    pub file_path: Option<String>,
    pub file_size: Option<u64>,
    pub mime_type: Option<String>,
}

/// Partial update for an existing document.
///
/// `None` fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub document_type: Option<String>,
    pub metadata: Option<Map<String, Value>>,
    pub vector: Option<Vec<f32>>,
    pub embedding_model: Option<String>,
}

/// A document paired with its retrieval score
#[derive(Debug, Clone, Serialize)]
pub struct ScoredDocument {
    pub document: DocumentRecord,
    /// Cosine similarity in [-1, 1], or `None` when the engine returned
    /// the match without a score
    pub score: Option<f32>,
}

/// Summary counters for the document store
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_documents: u64,
    /// Document counts keyed by document type, sorted by type name
    pub by_type: Vec<(String, u64)>,
    /// Embedded document counts keyed by embedding model, sorted by name
    pub by_model: Vec<(String, u64)>,
    pub table_name: String,
    pub embedding_dimension: usize,
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 for vectors of unequal length and when either vector has
/// zero magnitude, so degenerate inputs rank below any real match.
#[inline]
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}
