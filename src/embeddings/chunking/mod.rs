
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for paragraph chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub max_chunk_chars: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_chunk_chars: 1000,
        }
    }
}

/// Split document content into chunks along paragraph boundaries.
///
/// Paragraphs (blocks separated by blank lines) are packed greedily into
/// chunks up to `max_chunk_chars` characters. A single paragraph that
/// exceeds the budget on its own becomes its own chunk, unsplit.
#[inline]
pub fn chunk_paragraphs(content: &str, config: &ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in content.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        // Oversized paragraphs stand alone rather than being split mid-text
        if paragraph.len() > config.max_chunk_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.push(paragraph.to_string());
            continue;
        }

        // Account for the "\n\n" joiner when checking the budget
        let projected = if current.is_empty() {
            paragraph.len()
        } else {
            current.len() + 2 + paragraph.len()
        };

        if projected > config.max_chunk_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    debug!(
        "Chunked {} chars into {} chunks (max {} chars each)",
        content.len(),
        chunks.len(),
        config.max_chunk_chars
    );

    chunks
}
