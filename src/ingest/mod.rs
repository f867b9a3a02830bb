#[cfg(test)]
mod tests;

use std::path::Path;

use serde_json::{Map, Value, json};
use tracing::{debug, error, info, warn};

use crate::embeddings::{
    EmbeddingProvider,
    chunking::{ChunkingConfig, chunk_paragraphs},
};
use crate::store::{DocumentRecord, DocumentStore, DocumentUpdate, NewDocument};
use crate::{RagError, Result};

/// Document type for a feature document stored whole
pub const DOC_TYPE_FEATURE: &str = "feature-doc";
/// Document type for one chunk of a feature document
pub const DOC_TYPE_FEATURE_CHUNK: &str = "feature-doc-chunk";

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "svg"];

/// Whether a feature document is stored as one record or split into chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    Whole,
    Chunked,
}

/// Per-run counters for a directory ingestion.
///
/// Feature counters track whole directories; unit counters track the
/// individual records written (one per feature in whole mode, one per
/// chunk in chunked mode), so a partially embedded feature still reports
/// its failed chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionSummary {
    /// Features stored in this run
    pub stored: usize,
    /// Features skipped because they were already stored
    pub skipped_existing: usize,
    /// Features skipped for having no usable markdown content
    pub skipped_empty: usize,
    /// Features that failed to embed or store
    pub failed: usize,
    /// Records written in this run
    pub units_stored: usize,
    /// Records that failed to embed within otherwise stored features
    pub units_failed: usize,
}

/// Walks a documentation tree and stores one embedded document (or one set
/// of chunks) per feature directory.
pub struct IngestionPipeline<'a> {
    store: &'a DocumentStore,
    provider: &'a dyn EmbeddingProvider,
    chunking: &'a ChunkingConfig,
}

impl<'a> IngestionPipeline<'a> {
    #[inline]
    pub fn new(
        store: &'a DocumentStore,
        provider: &'a dyn EmbeddingProvider,
        chunking: &'a ChunkingConfig,
    ) -> Self {
        Self {
            store,
            provider,
            chunking,
        }
    }

    /// Ingest every feature directory under `root`.
    ///
    /// Each immediate subdirectory is one feature: its first markdown file
    /// becomes the document content and sibling images are recorded in the
    /// metadata. Failures in one feature never stop the run.
    #[inline]
    pub async fn ingest_dir(
        &self,
        root: &Path,
        mode: IngestMode,
        only_feature: Option<&str>,
    ) -> Result<IngestionSummary> {
        let mut feature_dirs = Vec::new();
        for entry in std::fs::read_dir(root)
            .map_err(|e| RagError::Io(std::io::Error::new(e.kind(), format!("{}: {e}", root.display()))))?
        {
            let entry = entry?;
            if entry.path().is_dir() {
                feature_dirs.push(entry.path());
            }
        }
        feature_dirs.sort();

        info!(
            "Ingesting {} feature directories from {}",
            feature_dirs.len(),
            root.display()
        );

        let mut summary = IngestionSummary::default();
        for dir in feature_dirs {
            let Some(feature) = dir.file_name().and_then(|name| name.to_str()) else {
                warn!("Skipping directory with non-UTF-8 name: {:?}", dir);
                continue;
            };
            if only_feature.is_some_and(|wanted| wanted != feature) {
                continue;
            }

            match self.ingest_feature(&dir, feature, mode).await {
                Ok(outcome) => match outcome {
                    FeatureOutcome::Stored {
                        units_stored,
                        units_failed,
                    } => {
                        summary.stored += 1;
                        summary.units_stored += units_stored;
                        summary.units_failed += units_failed;
                    }
                    FeatureOutcome::SkippedExisting => summary.skipped_existing += 1,
                    FeatureOutcome::SkippedEmpty => summary.skipped_empty += 1,
                },
                Err(e) => {
                    error!("Failed to ingest feature {}: {}", feature, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Ingestion finished: {} features stored ({} records, {} failed records), \
             {} already present, {} empty, {} failed",
            summary.stored,
            summary.units_stored,
            summary.units_failed,
            summary.skipped_existing,
            summary.skipped_empty,
            summary.failed
        );
        Ok(summary)
    }

    async fn ingest_feature(
        &self,
        dir: &Path,
        feature: &str,
        mode: IngestMode,
    ) -> Result<FeatureOutcome> {
        let document_type = match mode {
            IngestMode::Whole => DOC_TYPE_FEATURE,
            IngestMode::Chunked => DOC_TYPE_FEATURE_CHUNK,
        };

        if self.store.exists(feature, document_type).await? {
            debug!("Already stored, skipping: {}", feature);
            return Ok(FeatureOutcome::SkippedExisting);
        }

        let Some(markdown_path) = first_markdown_file(dir)? else {
            warn!("No markdown file found in {}", feature);
            return Ok(FeatureOutcome::SkippedEmpty);
        };
        let content = std::fs::read_to_string(&markdown_path)?;
        if content.trim().is_empty() {
            warn!("Markdown file in {} is empty", feature);
            return Ok(FeatureOutcome::SkippedEmpty);
        }

        let markdown_file = markdown_path.display().to_string();
        let file_size = std::fs::metadata(&markdown_path).map(|m| m.len()).ok();

        match mode {
            IngestMode::Whole => {
                let mut metadata = Map::new();
                metadata.insert("feature".to_string(), json!(feature));
                metadata.insert("markdown_file".to_string(), json!(markdown_file));
                metadata.insert("images".to_string(), collect_images(dir)?);

                store_document(
                    self.store,
                    self.provider,
                    feature,
                    &content,
                    DOC_TYPE_FEATURE,
                    metadata,
                    Some(&markdown_path),
                )
                .await?;

                info!("Stored feature document: {}", feature);
                Ok(FeatureOutcome::Stored {
                    units_stored: 1,
                    units_failed: 0,
                })
            }
            IngestMode::Chunked => {
                let chunks = chunk_paragraphs(&content, self.chunking);
                if chunks.is_empty() {
                    return Ok(FeatureOutcome::SkippedEmpty);
                }

                let mut stored = 0usize;
                let mut failed = 0usize;
                for (index, chunk) in chunks.iter().enumerate() {
                    let mut metadata = Map::new();
                    metadata.insert("feature".to_string(), json!(feature));
                    metadata.insert("chunk_index".to_string(), json!(index));
                    metadata.insert("markdown_file".to_string(), json!(markdown_file));

                    let title_hint = format!("{feature} [chunk {index}]");
                    let vector = match self.provider.embed_document(chunk, Some(&title_hint)) {
                        Ok(vector) => Some(vector),
                        Err(e) => {
                            error!("Failed to embed {}: {}", title_hint, e);
                            failed += 1;
                            continue;
                        }
                    };

                    self.store
                        .put(NewDocument {
                            title: feature.to_string(),
                            content: chunk.clone(),
                            document_type: DOC_TYPE_FEATURE_CHUNK.to_string(),
                            metadata,
                            vector,
                            embedding_model: Some(self.provider.model_name().to_string()),
                            file_path: Some(markdown_file.clone()),
                            file_size,
                            mime_type: Some("text/markdown".to_string()),
                            ..NewDocument::default()
                        })
                        .await?;
                    stored += 1;
                }

                if stored == 0 && failed > 0 {
                    return Err(RagError::Provider(format!(
                        "all {failed} chunks of {feature} failed to embed"
                    )));
                }

                info!(
                    "Stored {} chunks for feature: {} ({} failed)",
                    stored, feature, failed
                );
                Ok(FeatureOutcome::Stored {
                    units_stored: stored,
                    units_failed: failed,
                })
            }
        }
    }
}

enum FeatureOutcome {
    Stored {
        units_stored: usize,
        units_failed: usize,
    },
    SkippedExisting,
    SkippedEmpty,
}

/// Embed content and store it as a new document.
///
/// When the content came from a file, `source` records its provenance on
/// the stored record.
#[inline]
pub async fn store_document(
    store: &DocumentStore,
    provider: &dyn EmbeddingProvider,
    title: &str,
    content: &str,
    document_type: &str,
    metadata: Map<String, Value>,
    source: Option<&Path>,
) -> Result<DocumentRecord> {
    let vector = provider.embed_document(content, Some(title))?;

    store
        .put(NewDocument {
            title: title.to_string(),
            content: content.to_string(),
            document_type: document_type.to_string(),
            metadata,
            vector: Some(vector),
            embedding_model: Some(provider.model_name().to_string()),
            file_path: source.map(|path| path.display().to_string()),
            file_size: source.and_then(|path| std::fs::metadata(path).map(|m| m.len()).ok()),
            mime_type: source.and_then(mime_for_path).map(str::to_string),
            ..NewDocument::default()
        })
        .await
}

/// Apply a document update, re-embedding when the content changes.
///
/// An update that only touches the title or metadata keeps the stored
/// vector untouched.
#[inline]
pub async fn update_document(
    store: &DocumentStore,
    provider: &dyn EmbeddingProvider,
    id: &str,
    mut update: DocumentUpdate,
) -> Result<DocumentRecord> {
    if update.vector.is_none() {
        if let Some(new_content) = update.content.as_deref() {
            let existing = store
                .get(id)
                .await?
                .ok_or_else(|| RagError::NotFound(format!("document {id}")))?;

            if new_content != existing.content {
                let title = update.title.as_deref().unwrap_or(&existing.title);
                debug!("Content changed for {}, re-embedding", id);
                update.vector = Some(provider.embed_document(new_content, Some(title))?);
                update.embedding_model = Some(provider.model_name().to_string());
            }
        }
    }

    store.update(id, update).await
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "md" | "markdown" => Some("text/markdown"),
        "txt" => Some("text/plain"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

fn first_markdown_file(dir: &Path) -> Result<Option<std::path::PathBuf>> {
    let mut markdown_files: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
        })
        .collect();
    markdown_files.sort();
    Ok(markdown_files.into_iter().next())
}

fn collect_images(dir: &Path) -> Result<Value> {
    let mut image_paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        IMAGE_EXTENSIONS
                            .iter()
                            .any(|known| known.eq_ignore_ascii_case(ext))
                    })
        })
        .collect();
    image_paths.sort();

    let images: Vec<Value> = image_paths
        .iter()
        .map(|path| {
            json!({
                "filename": path.file_name().and_then(|name| name.to_str()).unwrap_or_default(),
                "path": path.display().to_string(),
            })
        })
        .collect();

    Ok(Value::Array(images))
}
