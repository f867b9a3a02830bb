pub mod chunking;
pub mod gemini;
pub mod local;

use crate::config::{Config, ProviderKind};
use crate::{RagError, Result};

/// A source of embedding vectors for documents and queries.
///
/// Implementations compute document embeddings and query embeddings
/// separately so providers that distinguish the two roles (such as
/// Gemini's retrieval task types) can request the right variant.
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the underlying embedding model
    fn model_name(&self) -> &str;

    /// Dimensionality of the vectors this provider produces
    fn dimension(&self) -> usize;

    /// Embed document content, optionally with a title hint
    fn embed_document(&self, text: &str, title: Option<&str>) -> Result<Vec<f32>>;

    /// Embed a search query
    fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}

/// Construct the embedding provider selected by the configuration
#[inline]
pub fn provider_from_config(config: &Config) -> Result<Box<dyn EmbeddingProvider>> {
    match config.embedding.provider {
        ProviderKind::Local => {
            let embedder = local::LocalEmbedder::new(
                &config.embedding.local_model,
                config.embedding.local_dimension as usize,
            )?;
            Ok(Box::new(embedder))
        }
        ProviderKind::Gemini => {
            if config.gemini.api_key.trim().is_empty() {
                return Err(RagError::Config(
                    "gemini provider selected but no API key is configured".to_string(),
                ));
            }
            let client = gemini::GeminiClient::new(&config.gemini)?;
            Ok(Box::new(client))
        }
    }
}
