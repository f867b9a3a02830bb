#[cfg(test)]
mod tests;

use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions as TextInitOptions, TextEmbedding};
use tracing::{debug, info};

use crate::embeddings::EmbeddingProvider;
use crate::{RagError, Result};

/// Embedding provider backed by a locally-run fastembed model.
///
/// `TextEmbedding::embed` requires `&mut self`, so the model sits behind a
/// mutex to keep the provider shareable across threads.
pub struct LocalEmbedder {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl LocalEmbedder {
    /// Load the named model, downloading it on first use
    pub fn new(model_name: &str, dimension: usize) -> Result<Self> {
        let model_id = model_name.parse::<EmbeddingModel>().map_err(|e| {
            RagError::Provider(format!("unknown local embedding model {model_name:?}: {e}"))
        })?;

        info!("Loading local embedding model {}", model_name);
        let model = TextEmbedding::try_new(TextInitOptions::new(model_id))
            .map_err(|e| RagError::Provider(format!("failed to load {model_name}: {e}")))?;

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimension,
        })
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RagError::Provider(
                "cannot embed empty text".to_string(),
            ));
        }

        let mut vectors = {
            let mut model = self
                .model
                .lock()
                .map_err(|_| RagError::Provider("embedding model mutex poisoned".to_string()))?;
            model
                .embed(vec![text], None)
                .map_err(|e| RagError::Provider(format!("local embedding failed: {e}")))?
        };

        let vector = vectors
            .pop()
            .ok_or_else(|| RagError::Provider("model returned no embedding".to_string()))?;

        if vector.len() != self.dimension {
            return Err(RagError::Provider(format!(
                "model {} produced a {}-dimensional vector, expected {}",
                self.model_name,
                vector.len(),
                self.dimension
            )));
        }

        debug!("Embedded {} chars into {} dimensions", text.len(), vector.len());
        Ok(vector)
    }
}

impl EmbeddingProvider for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_document(&self, text: &str, title: Option<&str>) -> Result<Vec<f32>> {
        // Prefix the title so it contributes to the document representation
        match title {
            Some(title) if !title.trim().is_empty() => {
                self.embed_one(&format!("{title}\n\n{text}"))
            }
            _ => self.embed_one(text),
        }
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_one(text)
    }
}
