use super::*;
use crate::config::{Config, EmbeddingConfig};
use crate::store::DocumentStore;
use std::path::PathBuf;
use tempfile::TempDir;

/// Deterministic provider deriving a tiny vector from the text length
struct StubEmbedder;

fn stub_vector(text: &str) -> Vec<f32> {
    let len = text.len() as f32;
    vec![1.0, len, len * 0.5, 0.0]
}

impl EmbeddingProvider for StubEmbedder {
    fn model_name(&self) -> &str {
        "stub"
    }

    fn dimension(&self) -> usize {
        4
    }

    fn embed_document(&self, text: &str, _title: Option<&str>) -> crate::Result<Vec<f32>> {
        Ok(stub_vector(text))
    }

    fn embed_query(&self, text: &str) -> crate::Result<Vec<f32>> {
        Ok(stub_vector(text))
    }
}

/// Provider that fails on every call
struct BrokenEmbedder;

impl EmbeddingProvider for BrokenEmbedder {
    fn model_name(&self) -> &str {
        "broken"
    }

    fn dimension(&self) -> usize {
        4
    }

    fn embed_document(&self, _text: &str, _title: Option<&str>) -> crate::Result<Vec<f32>> {
        Err(RagError::Provider("model unavailable".to_string()))
    }

    fn embed_query(&self, _text: &str) -> crate::Result<Vec<f32>> {
        Err(RagError::Provider("model unavailable".to_string()))
    }
}

/// Provider that fails only on texts containing a marker word
struct FlakyEmbedder {
    poison: &'static str,
}

impl EmbeddingProvider for FlakyEmbedder {
    fn model_name(&self) -> &str {
        "flaky"
    }

    fn dimension(&self) -> usize {
        4
    }

    fn embed_document(&self, text: &str, _title: Option<&str>) -> crate::Result<Vec<f32>> {
        if text.contains(self.poison) {
            return Err(RagError::Provider("model unavailable".to_string()));
        }
        Ok(stub_vector(text))
    }

    fn embed_query(&self, text: &str) -> crate::Result<Vec<f32>> {
        Ok(stub_vector(text))
    }
}

fn create_test_config() -> (Config, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        embedding: EmbeddingConfig {
            local_dimension: 4,
            ..EmbeddingConfig::default()
        },
        ..Config::default()
    };
    (config, temp_dir)
}

fn write_feature(root: &std::path::Path, feature: &str, markdown: &str) -> PathBuf {
    let dir = root.join(feature);
    std::fs::create_dir_all(&dir).expect("should create feature dir");
    std::fs::write(dir.join("README.md"), markdown).expect("should write markdown");
    dir
}

#[tokio::test]
async fn whole_mode_stores_one_document_per_feature() {
    let (config, _temp_dir) = create_test_config();
    let store = DocumentStore::new(&config).await.expect("should create store");
    let docs_dir = TempDir::new().expect("should create docs dir");

    let feature_dir = write_feature(docs_dir.path(), "billing", "How billing works.");
    std::fs::write(feature_dir.join("diagram.png"), [0u8; 4]).expect("should write image");
    write_feature(docs_dir.path(), "auth", "How authentication works.");

    let pipeline = IngestionPipeline::new(&store, &StubEmbedder, &config.chunking);
    let summary = pipeline
        .ingest_dir(docs_dir.path(), IngestMode::Whole, None)
        .await
        .expect("ingestion should succeed");

    assert_eq!(summary.stored, 2);
    assert_eq!(summary.units_stored, 2);
    assert_eq!(summary.failed, 0);

    let billing = store
        .list(None, 10, 0)
        .await
        .expect("should list")
        .into_iter()
        .find(|doc| doc.title == "billing")
        .expect("billing should be stored");

    assert_eq!(billing.document_type, DOC_TYPE_FEATURE);
    assert_eq!(billing.content, "How billing works.");
    assert!(billing.vector.is_some());
    assert_eq!(billing.metadata["feature"], "billing");
    assert!(
        billing.metadata["markdown_file"]
            .as_str()
            .expect("markdown_file should be a string")
            .ends_with("README.md")
    );
    let images = billing.metadata["images"].as_array().expect("images array");
    assert_eq!(images.len(), 1);
    assert_eq!(images[0]["filename"], "diagram.png");

    assert_eq!(billing.embedding_model, Some("stub".to_string()));
    assert_eq!(billing.mime_type, Some("text/markdown".to_string()));
    assert!(
        billing
            .file_path
            .as_deref()
            .expect("file_path should be recorded")
            .ends_with("README.md")
    );
    assert_eq!(billing.file_size, Some("How billing works.".len() as u64));
}

#[tokio::test]
async fn already_stored_features_are_skipped() {
    let (config, _temp_dir) = create_test_config();
    let store = DocumentStore::new(&config).await.expect("should create store");
    let docs_dir = TempDir::new().expect("should create docs dir");
    write_feature(docs_dir.path(), "billing", "How billing works.");

    let pipeline = IngestionPipeline::new(&store, &StubEmbedder, &config.chunking);
    let first = pipeline
        .ingest_dir(docs_dir.path(), IngestMode::Whole, None)
        .await
        .expect("ingestion should succeed");
    let second = pipeline
        .ingest_dir(docs_dir.path(), IngestMode::Whole, None)
        .await
        .expect("ingestion should succeed");

    assert_eq!(first.stored, 1);
    assert_eq!(second.stored, 0);
    assert_eq!(second.skipped_existing, 1);
    assert_eq!(store.count().await.expect("should count"), 1);
}

#[tokio::test]
async fn features_without_markdown_are_skipped_as_empty() {
    let (config, _temp_dir) = create_test_config();
    let store = DocumentStore::new(&config).await.expect("should create store");
    let docs_dir = TempDir::new().expect("should create docs dir");

    std::fs::create_dir_all(docs_dir.path().join("no-docs")).expect("should create dir");
    write_feature(docs_dir.path(), "blank", "   \n\n  ");

    let pipeline = IngestionPipeline::new(&store, &StubEmbedder, &config.chunking);
    let summary = pipeline
        .ingest_dir(docs_dir.path(), IngestMode::Whole, None)
        .await
        .expect("ingestion should succeed");

    assert_eq!(summary.stored, 0);
    assert_eq!(summary.skipped_empty, 2);
}

#[tokio::test]
async fn chunked_mode_stores_indexed_chunks() {
    let (mut config, _temp_dir) = create_test_config();
    config.chunking.max_chunk_chars = 40;
    let store = DocumentStore::new(&config).await.expect("should create store");
    let docs_dir = TempDir::new().expect("should create docs dir");

    write_feature(
        docs_dir.path(),
        "search",
        "First paragraph about search.\n\nSecond paragraph about ranking.\n\nThird paragraph about filters.",
    );

    let pipeline = IngestionPipeline::new(&store, &StubEmbedder, &config.chunking);
    let summary = pipeline
        .ingest_dir(docs_dir.path(), IngestMode::Chunked, None)
        .await
        .expect("ingestion should succeed");

    assert_eq!(summary.stored, 1);
    assert_eq!(summary.units_stored, 3);
    assert_eq!(summary.units_failed, 0);

    let mut chunks = store.list(None, 10, 0).await.expect("should list");
    chunks.sort_by_key(|doc| doc.metadata["chunk_index"].as_u64());

    assert_eq!(chunks.len(), 3);
    for (index, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.title, "search");
        assert_eq!(chunk.document_type, DOC_TYPE_FEATURE_CHUNK);
        assert_eq!(chunk.metadata["chunk_index"], index);
        assert_eq!(chunk.metadata["feature"], "search");
        assert!(chunk.vector.is_some());
    }
}

#[tokio::test]
async fn failed_chunk_is_counted_without_losing_the_rest() {
    let (mut config, _temp_dir) = create_test_config();
    config.chunking.max_chunk_chars = 40;
    let store = DocumentStore::new(&config).await.expect("should create store");
    let docs_dir = TempDir::new().expect("should create docs dir");

    write_feature(
        docs_dir.path(),
        "search",
        "First paragraph about search.\n\nSecond paragraph about ranking.\n\nThird paragraph about filters.",
    );

    let provider = FlakyEmbedder { poison: "ranking" };
    let pipeline = IngestionPipeline::new(&store, &provider, &config.chunking);
    let summary = pipeline
        .ingest_dir(docs_dir.path(), IngestMode::Chunked, None)
        .await
        .expect("ingestion should succeed");

    assert_eq!(summary.stored, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.units_stored, 2);
    assert_eq!(summary.units_failed, 1);

    let chunks = store.list(None, 10, 0).await.expect("should list");
    assert_eq!(chunks.len(), 2);
    assert!(chunks.iter().all(|doc| !doc.content.contains("ranking")));
}

#[tokio::test]
async fn one_broken_feature_does_not_stop_the_run() {
    let (config, _temp_dir) = create_test_config();
    let store = DocumentStore::new(&config).await.expect("should create store");
    let docs_dir = TempDir::new().expect("should create docs dir");
    write_feature(docs_dir.path(), "billing", "How billing works.");
    write_feature(docs_dir.path(), "auth", "How authentication works.");

    let pipeline = IngestionPipeline::new(&store, &BrokenEmbedder, &config.chunking);
    let summary = pipeline
        .ingest_dir(docs_dir.path(), IngestMode::Whole, None)
        .await
        .expect("the run itself should not fail");

    assert_eq!(summary.stored, 0);
    assert_eq!(summary.failed, 2);
}

#[tokio::test]
async fn feature_filter_ingests_a_single_feature() {
    let (config, _temp_dir) = create_test_config();
    let store = DocumentStore::new(&config).await.expect("should create store");
    let docs_dir = TempDir::new().expect("should create docs dir");
    write_feature(docs_dir.path(), "billing", "How billing works.");
    write_feature(docs_dir.path(), "auth", "How authentication works.");

    let pipeline = IngestionPipeline::new(&store, &StubEmbedder, &config.chunking);
    let summary = pipeline
        .ingest_dir(docs_dir.path(), IngestMode::Whole, Some("auth"))
        .await
        .expect("ingestion should succeed");

    assert_eq!(summary.stored, 1);
    let docs = store.list(None, 10, 0).await.expect("should list");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].title, "auth");
}

#[tokio::test]
async fn store_document_embeds_the_content() {
    let (config, _temp_dir) = create_test_config();
    let store = DocumentStore::new(&config).await.expect("should create store");

    let record = store_document(
        &store,
        &StubEmbedder,
        "Manual Note",
        "Some note content.",
        "note",
        Map::new(),
        None,
    )
    .await
    .expect("should store document");

    assert_eq!(record.vector, Some(stub_vector("Some note content.")));
}

#[tokio::test]
async fn update_with_new_content_re_embeds() {
    let (config, _temp_dir) = create_test_config();
    let store = DocumentStore::new(&config).await.expect("should create store");

    let record = store_document(
        &store,
        &StubEmbedder,
        "Note",
        "Original content.",
        "note",
        Map::new(),
        None,
    )
    .await
    .expect("should store document");

    let updated = update_document(
        &store,
        &StubEmbedder,
        &record.id,
        DocumentUpdate {
            content: Some("Completely different content now.".to_string()),
            ..DocumentUpdate::default()
        },
    )
    .await
    .expect("should update document");

    assert_eq!(
        updated.vector,
        Some(stub_vector("Completely different content now."))
    );
    assert_ne!(updated.vector, record.vector);
}

#[tokio::test]
async fn update_without_content_change_keeps_the_vector() {
    let (config, _temp_dir) = create_test_config();
    let store = DocumentStore::new(&config).await.expect("should create store");

    let record = store_document(
        &store,
        &StubEmbedder,
        "Note",
        "Original content.",
        "note",
        Map::new(),
        None,
    )
    .await
    .expect("should store document");

    // Title-only update, and a content update repeating the same text
    let renamed = update_document(
        &store,
        &BrokenEmbedder,
        &record.id,
        DocumentUpdate {
            title: Some("Renamed Note".to_string()),
            content: Some("Original content.".to_string()),
            ..DocumentUpdate::default()
        },
    )
    .await
    .expect("should update without re-embedding");

    assert_eq!(renamed.title, "Renamed Note");
    assert_eq!(renamed.vector, record.vector);
}
