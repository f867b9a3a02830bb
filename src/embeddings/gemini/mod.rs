#[cfg(test)]
mod tests;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::config::GeminiConfig;
use crate::embeddings::EmbeddingProvider;
use crate::{RagError, Result};

/// Task type sent with document embeddings
pub const TASK_RETRIEVAL_DOCUMENT: &str = "RETRIEVAL_DOCUMENT";
/// Task type sent with query embeddings
pub const TASK_RETRIEVAL_QUERY: &str = "RETRIEVAL_QUERY";

/// Client for the Gemini embedding API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    endpoint: Url,
    api_key: String,
    model: String,
    dimension: usize,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest {
    content: Content,
    #[serde(rename = "taskType")]
    task_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiClient {
    #[inline]
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.embedding_endpoint)
            .map_err(|e| RagError::Config(format!("invalid Gemini embedding endpoint: {e}")))?;

        // Non-2xx responses come back as responses so the error body can be read
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            endpoint,
            api_key: config.api_key.clone(),
            model: config.embedding_model.clone(),
            dimension: config.embedding_dimension as usize,
            agent,
        })
    }

    fn embed(&self, text: &str, task_type: &str, title: Option<&str>) -> Result<Vec<f32>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RagError::Provider("cannot embed empty text".to_string()));
        }

        let request = EmbedContentRequest {
            content: Content {
                parts: vec![Part {
                    text: text.to_string(),
                }],
            },
            task_type: task_type.to_string(),
            title: title
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from),
        };

        let request_json = serde_json::to_string(&request)
            .map_err(|e| RagError::Provider(format!("failed to serialize embed request: {e}")))?;

        debug!(
            "Requesting {} embedding for {} chars from {}",
            task_type,
            text.len(),
            self.endpoint
        );

        let mut response = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .send(&request_json)
            .map_err(|e| RagError::Provider(format!("Gemini embedding request failed: {e}")))?;

        let status = response.status();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| RagError::Provider(format!("failed to read Gemini response: {e}")))?;

        if !status.is_success() {
            error!("Gemini embedding API returned {}: {}", status, body);
            return Err(RagError::Provider(format!(
                "Gemini embedding API returned HTTP {status}"
            )));
        }

        let parsed: EmbedContentResponse = serde_json::from_str(&body).map_err(|e| {
            error!("Unparseable Gemini embedding response: {}", body);
            RagError::Provider(format!("failed to parse Gemini embedding response: {e}"))
        })?;

        let vector = parsed.embedding.values;
        if vector.is_empty() {
            return Err(RagError::Provider(
                "Gemini returned an empty embedding".to_string(),
            ));
        }
        if vector.len() != self.dimension {
            return Err(RagError::Provider(format!(
                "Gemini returned a {}-dimensional vector, expected {}",
                vector.len(),
                self.dimension
            )));
        }

        debug!("Received embedding with {} dimensions", vector.len());
        Ok(vector)
    }
}

impl EmbeddingProvider for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_document(&self, text: &str, title: Option<&str>) -> Result<Vec<f32>> {
        self.embed(text, TASK_RETRIEVAL_DOCUMENT, title)
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text, TASK_RETRIEVAL_QUERY, None)
    }
}
