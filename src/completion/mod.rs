#[cfg(test)]
mod tests;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::config::GeminiConfig;
use crate::{RagError, Result};

/// Sampling parameters sent with every completion request
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    #[inline]
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 4024,
        }
    }
}

/// Per-request overrides merged over the default sampling parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationOverrides {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub max_output_tokens: Option<u32>,
}

impl GenerationOverrides {
    fn apply(self, mut base: GenerationConfig) -> GenerationConfig {
        if let Some(temperature) = self.temperature {
            base.temperature = temperature;
        }
        if let Some(top_p) = self.top_p {
            base.top_p = top_p;
        }
        if let Some(top_k) = self.top_k {
            base.top_k = top_k;
        }
        if let Some(max_output_tokens) = self.max_output_tokens {
            base.max_output_tokens = max_output_tokens;
        }
        base
    }
}

/// Client for the Gemini text generation API
#[derive(Debug, Clone)]
pub struct CompletionClient {
    endpoint: Url,
    api_key: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<ContentMessage>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct ContentMessage {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl CompletionClient {
    #[inline]
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.completion_endpoint)
            .map_err(|e| RagError::Config(format!("invalid Gemini completion endpoint: {e}")))?;

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            endpoint,
            api_key: config.api_key.clone(),
            agent,
        })
    }

    /// Generate an answer to the query, grounding the model with the given
    /// context snippets.
    ///
    /// Each non-empty snippet becomes its own user message ahead of the
    /// query, which always goes last.
    #[inline]
    pub fn complete(
        &self,
        query: &str,
        context: &[String],
        overrides: GenerationOverrides,
    ) -> Result<String> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::Completion("query cannot be empty".to_string()));
        }

        let mut contents: Vec<ContentMessage> = context
            .iter()
            .map(|snippet| snippet.trim())
            .filter(|snippet| !snippet.is_empty())
            .map(|snippet| ContentMessage {
                role: "user".to_string(),
                parts: vec![Part {
                    text: format!("Context:\n{snippet}"),
                }],
            })
            .collect();
        contents.push(ContentMessage {
            role: "user".to_string(),
            parts: vec![Part {
                text: query.to_string(),
            }],
        });

        let request = GenerateContentRequest {
            contents,
            generation_config: overrides.apply(GenerationConfig::default()),
        };

        let request_json = serde_json::to_string(&request).map_err(|e| {
            RagError::Completion(format!("failed to serialize completion request: {e}"))
        })?;

        debug!(
            "Requesting completion with {} context snippets",
            request.contents.len() - 1
        );

        let mut response = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .send(&request_json)
            .map_err(|e| RagError::Completion(format!("completion request failed: {e}")))?;

        let status = response.status();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| RagError::Completion(format!("failed to read completion response: {e}")))?;

        if !status.is_success() {
            error!("Gemini completion API returned {}: {}", status, body);
            return Err(RagError::Completion(format!(
                "Gemini completion API returned HTTP {status}"
            )));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            error!("Unparseable Gemini completion response: {}", body);
            RagError::Completion(format!("failed to parse completion response: {e}"))
        })?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
            .unwrap_or_default();

        if text.trim().is_empty() {
            error!("Gemini completion response had no generated text: {}", body);
            return Err(RagError::Completion(
                "Gemini returned no generated text".to_string(),
            ));
        }

        debug!("Received completion of {} chars", text.len());
        Ok(text)
    }
}
