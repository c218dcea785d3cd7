//! Passage storage and nearest-neighbour retrieval.

pub mod pinecone;

use serde::Serialize;

pub use pinecone::PineconeClient;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("PINECONE_API_KEY not set. Create one at https://app.pinecone.io")]
    ApiKeyNotSet,

    #[error("Pinecone index '{0}' not found")]
    IndexNotFound(String),

    #[error("Pinecone rejected the API key")]
    Unauthorized,

    #[error("Pinecone API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Metadata stored next to each chunk vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassageMetadata {
    pub text: String,
    pub title: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: PassageMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPassage {
    pub id: String,
    pub score: f32,
    pub text: String,
}

/// Named vector collection partitioned by namespace.
/// Implemented by `PineconeClient` for production; mock implementations used in tests.
pub trait VectorStore {
    /// Inserts or overwrites records; returns how many the store accepted.
    async fn upsert(
        &self,
        namespace: &str,
        records: &[VectorRecord],
    ) -> Result<usize, VectorStoreError>;

    /// The `top_k` nearest passages to `vector`, best first.
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredPassage>, VectorStoreError>;
}
