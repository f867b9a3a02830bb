use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Value};
use tracing::info;

use crate::completion::{CompletionClient, GenerationOverrides};
use crate::config::{Config, ProviderKind, SearchMode, get_config_dir};
use crate::embeddings::provider_from_config;
use crate::ingest::{IngestMode, IngestionPipeline, store_document, update_document};
use crate::retrieval::RetrievalService;
use crate::store::{DocumentStore, DocumentUpdate};

fn load_config() -> Result<Config> {
    let config_dir = get_config_dir().context("Failed to resolve config directory")?;
    Config::load(config_dir)
}

fn parse_metadata(metadata: Option<&str>) -> Result<Map<String, Value>> {
    match metadata {
        Some(raw) => {
            serde_json::from_str(raw).context("Metadata must be a JSON object")
        }
        None => Ok(Map::new()),
    }
}

/// Ingest a documentation tree, one feature per subdirectory
#[inline]
pub async fn ingest_docs(dir: PathBuf, chunked: bool, feature: Option<String>) -> Result<()> {
    let config = load_config()?;
    let provider = provider_from_config(&config)?;
    let store = DocumentStore::new(&config).await?;

    let mode = if chunked {
        IngestMode::Chunked
    } else {
        IngestMode::Whole
    };

    let spinner = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner} {msg}").context("Invalid progress template")?,
    );
    spinner.set_message(format!("Ingesting {}", dir.display()));
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let pipeline = IngestionPipeline::new(&store, provider.as_ref(), &config.chunking);
    let summary = pipeline
        .ingest_dir(&dir, mode, feature.as_deref())
        .await
        .context("Ingestion failed")?;

    spinner.finish_and_clear();

    println!("Ingestion complete:");
    println!(
        "  Stored: {} features ({} records)",
        summary.stored, summary.units_stored
    );
    println!("  Already present: {}", summary.skipped_existing);
    println!("  Empty or missing markdown: {}", summary.skipped_empty);
    if summary.units_failed > 0 {
        println!(
            "  {}",
            style(format!("Failed records: {}", summary.units_failed)).red()
        );
    }
    if summary.failed > 0 {
        println!(
            "  {}",
            style(format!("Failed features: {}", summary.failed)).red()
        );
    }

    Ok(())
}

/// Embed and store a single document from a file
#[inline]
pub async fn add_document(
    title: String,
    file: PathBuf,
    document_type: String,
    metadata: Option<String>,
) -> Result<()> {
    let config = load_config()?;
    let provider = provider_from_config(&config)?;
    let store = DocumentStore::new(&config).await?;

    let content = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    if content.trim().is_empty() {
        bail!("{} is empty", file.display());
    }

    let metadata = parse_metadata(metadata.as_deref())?;

    let record = store_document(
        &store,
        provider.as_ref(),
        &title,
        &content,
        &document_type,
        metadata,
        Some(&file),
    )
    .await
    .context("Failed to store document")?;

    println!("Stored document: {} (ID: {})", record.title, record.id);
    println!("  Type: {}", record.document_type);
    println!(
        "  Embedded with {} ({} dimensions)",
        provider.model_name(),
        provider.dimension()
    );

    Ok(())
}

/// Show a stored document
#[inline]
pub async fn get_document(id: String, show_content: bool) -> Result<()> {
    let config = load_config()?;
    let store = DocumentStore::new(&config).await?;

    let Some(record) = store.get(&id).await? else {
        bail!("No document found with ID {id}");
    };

    println!("📄 {} (ID: {})", style(&record.title).bold(), record.id);
    println!("   Type: {}", record.document_type);
    println!(
        "   Vector: {}",
        record
            .vector
            .as_ref()
            .map_or_else(|| "none".to_string(), |v| format!("{} dimensions", v.len()))
    );
    println!("   Created: {}", record.created_at);
    println!("   Updated: {}", record.updated_at);
    if !record.metadata.is_empty() {
        println!(
            "   Metadata: {}",
            serde_json::to_string_pretty(&record.metadata)?
        );
    }
    if show_content {
        println!();
        println!("{}", record.content);
    }

    Ok(())
}

/// Update a stored document, re-embedding if the content changes
#[inline]
pub async fn update_stored_document(
    id: String,
    title: Option<String>,
    file: Option<PathBuf>,
    document_type: Option<String>,
    metadata: Option<String>,
) -> Result<()> {
    let config = load_config()?;
    let provider = provider_from_config(&config)?;
    let store = DocumentStore::new(&config).await?;

    let content = match file {
        Some(path) => Some(
            std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
        ),
        None => None,
    };
    let metadata = match metadata.as_deref() {
        Some(raw) => Some(parse_metadata(Some(raw))?),
        None => None,
    };

    let update = DocumentUpdate {
        title,
        content,
        document_type,
        metadata,
        vector: None,
        embedding_model: None,
    };

    let record = update_document(&store, provider.as_ref(), &id, update)
        .await
        .context("Failed to update document")?;

    println!("Updated document: {} (ID: {})", record.title, record.id);

    Ok(())
}

/// Delete a stored document
#[inline]
pub async fn delete_document(id: String) -> Result<()> {
    let config = load_config()?;
    let store = DocumentStore::new(&config).await?;

    if store.delete(&id).await? {
        println!("Deleted document {id}");
    } else {
        println!("No document found with ID {id}");
    }

    Ok(())
}

/// List stored documents, newest first
#[inline]
pub async fn list_documents(
    document_type: Option<String>,
    limit: usize,
    offset: usize,
) -> Result<()> {
    let config = load_config()?;
    let store = DocumentStore::new(&config).await?;

    let documents = store.list(document_type.as_deref(), limit, offset).await?;
    if documents.is_empty() {
        println!("No documents stored yet.");
        println!("Use 'ragdocs ingest <dir>' or 'ragdocs add' to store documents.");
        return Ok(());
    }

    println!("Documents ({} shown):", documents.len());
    println!();
    for document in &documents {
        println!("📄 {} (ID: {})", style(&document.title).bold(), document.id);
        println!("   Type: {}", document.document_type);
        println!("   Created: {}", document.created_at);
        println!();
    }

    Ok(())
}

/// Search stored documents by semantic similarity
#[inline]
pub async fn search_documents(
    query: String,
    limit: usize,
    threshold: f32,
    mode: Option<String>,
) -> Result<()> {
    let mut config = load_config()?;
    if let Some(mode) = mode {
        config.search.mode = match mode.as_str() {
            "scan" => SearchMode::Scan,
            "native" => SearchMode::Native,
            other => bail!("Unknown search mode '{other}' (expected 'scan' or 'native')"),
        };
    }

    let provider = provider_from_config(&config)?;
    let store = DocumentStore::new(&config).await?;
    let service = RetrievalService::new(store, provider, &config.search);

    let results = service.retrieve(&query, limit, threshold).await?;
    if results.is_empty() {
        println!("No documents matched the query.");
        return Ok(());
    }

    println!("Found {} matching documents:", results.len());
    println!();
    for (rank, result) in results.iter().enumerate() {
        let score = result
            .score
            .map_or_else(|| "unscored".to_string(), |s| format!("{s:.4}"));
        println!(
            "{}. {} ({})",
            rank + 1,
            style(&result.document.title).bold(),
            style(score).cyan()
        );
        println!("   ID: {}", result.document.id);
        println!("   {}", snippet(&result.document.content, 160));
        println!();
    }

    Ok(())
}

/// Answer a question with retrieved documents as context
#[inline]
pub async fn chat(
    query: String,
    limit: usize,
    threshold: f32,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
) -> Result<()> {
    let config = load_config()?;
    if config.gemini.api_key.trim().is_empty() {
        bail!("Chat requires a Gemini API key (set GEMINI_API_KEY or run 'ragdocs config')");
    }

    let provider = provider_from_config(&config)?;
    let store = DocumentStore::new(&config).await?;
    let service = RetrievalService::new(store, provider, &config.search);

    let results = service.retrieve(&query, limit, threshold).await?;
    info!("Using {} documents as context", results.len());

    let context: Vec<String> = results
        .iter()
        .map(|result| result.document.content.clone())
        .collect();

    let client = CompletionClient::new(&config.gemini)?;
    let overrides = GenerationOverrides {
        temperature,
        max_output_tokens,
        ..GenerationOverrides::default()
    };

    let spinner = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner} {msg}").context("Invalid progress template")?,
    );
    spinner.set_message("Generating answer...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let answer = client.complete(&query, &context, overrides)?;
    spinner.finish_and_clear();

    if !results.is_empty() {
        println!("{}", style(format!("Context: {} documents", results.len())).dim());
        println!();
    }
    println!("{answer}");

    Ok(())
}

/// Embed a piece of text and print the vector
#[inline]
pub async fn embed_text(text: String) -> Result<()> {
    let config = load_config()?;
    let provider = provider_from_config(&config)?;

    let vector = provider.embed_query(&text)?;

    println!(
        "Embedded with {} ({} dimensions):",
        provider.model_name(),
        vector.len()
    );
    println!("{}", serde_json::to_string(&vector)?);

    Ok(())
}

/// Show document store statistics
#[inline]
pub async fn show_stats() -> Result<()> {
    let config = load_config()?;
    let store = DocumentStore::new(&config).await?;

    let stats = store.stats().await?;

    println!("{}", style("📊 Document Store").bold().cyan());
    println!("  Table: {}", stats.table_name);
    println!("  Embedding dimension: {}", stats.embedding_dimension);
    let provider = match config.embedding.provider {
        ProviderKind::Local => "local",
        ProviderKind::Gemini => "gemini",
    };
    println!("  Provider: {provider}");
    println!("  Total documents: {}", stats.total_documents);
    if !stats.by_type.is_empty() {
        println!("  By type:");
        for (document_type, count) in &stats.by_type {
            println!("    {document_type}: {count}");
        }
    }
    if !stats.by_model.is_empty() {
        println!("  By embedding model:");
        for (model, count) in &stats.by_model {
            println!("    {model}: {count}");
        }
    }

    Ok(())
}

/// Build the native vector index
#[inline]
pub async fn build_index() -> Result<()> {
    let config = load_config()?;
    let store = DocumentStore::new(&config).await?;

    let count = store.count().await?;
    if count == 0 {
        bail!("Cannot build an index on an empty store");
    }

    store.create_vector_index().await?;
    println!("Vector index created over {count} documents.");

    Ok(())
}

fn snippet(content: &str, max_chars: usize) -> String {
    let flattened = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= max_chars {
        flattened
    } else {
        let truncated: String = flattened.chars().take(max_chars).collect();
        format!("{truncated}…")
    }
}
