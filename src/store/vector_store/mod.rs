
use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatchIterator, StringArray,
};
use arrow::buffer::NullBuffer;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::{
    Connection, Table,
    query::{ExecutableQuery, QueryBase},
};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    DocumentRecord, DocumentUpdate, NewDocument, ScoredDocument, StoreStats, cosine_similarity,
};
use crate::config::Config;
use crate::{RagError, Result};

/// Document store backed by a LanceDB table.
///
/// One table holds the documents of one embedding family, so vectors in a
/// table always share a dimension.
pub struct DocumentStore {
    connection: Connection,
    table_name: String,
    dimension: usize,
}

impl DocumentStore {
    /// Open the store for the configured provider, creating the table on
    /// first use
    #[inline]
    pub async fn new(config: &Config) -> Result<Self> {
        let db_path = config.vector_database_path();
        debug!("Initializing LanceDB at path: {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RagError::Store(format!("failed to create vector database directory: {e}"))
            })?;
        }

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("failed to connect to LanceDB: {e}")))?;

        let store = Self {
            connection,
            table_name: config.table_name().to_string(),
            dimension: config.embedding_dimension(),
        };

        store.initialize_table().await?;

        info!(
            "Document store ready (table {}, {} dimensions)",
            store.table_name, store.dimension
        );
        Ok(store)
    }

    async fn initialize_table(&self) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("failed to list tables: {e}")))?;

        if table_names.contains(&self.table_name) {
            debug!("Table {} already exists", self.table_name);
            return Ok(());
        }

        info!(
            "Creating table {} with {} dimensions",
            self.table_name, self.dimension
        );
        self.connection
            .create_empty_table(&self.table_name, self.schema())
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("failed to create table: {e}")))?;

        Ok(())
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension as i32,
                ),
                true,
            ),
            Field::new("title", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("document_type", DataType::Utf8, false),
            Field::new("metadata", DataType::Utf8, false),
            Field::new("embedding_model", DataType::Utf8, true),
            Field::new("file_path", DataType::Utf8, true),
            Field::new("file_size", DataType::Int64, true),
            Field::new("mime_type", DataType::Utf8, true),
            Field::new("created_at", DataType::Utf8, false),
            Field::new("updated_at", DataType::Utf8, false),
        ]))
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("failed to open table: {e}")))
    }

    /// Store a document and return the stored record.
    ///
    /// When the input carries an id this is an upsert: an existing record
    /// with that id is replaced, last writer wins.
    #[inline]
    pub async fn put(&self, document: NewDocument) -> Result<DocumentRecord> {
        self.check_dimension(document.vector.as_deref())?;
        if document.vector.is_some() && document.content.trim().is_empty() {
            return Err(RagError::Validation(
                "embedded documents must have non-empty content".to_string(),
            ));
        }

        let now = Utc::now().to_rfc3339();
        let record = DocumentRecord {
            id: document
                .id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            title: document.title,
            content: document.content,
            document_type: document.document_type,
            metadata: document.metadata,
            vector: document.vector,
            embedding_model: document.embedding_model,
            file_path: document.file_path,
            file_size: document.file_size,
            mime_type: document.mime_type,
            created_at: now.clone(),
            updated_at: now,
        };

        let table = self.open_table().await?;
        table
            .delete(&format!("id = '{}'", escape_literal(&record.id)))
            .await
            .map_err(|e| RagError::Store(format!("failed to replace document: {e}")))?;
        self.insert_records(std::slice::from_ref(&record)).await?;

        debug!("Stored document {} ({})", record.id, record.title);
        Ok(record)
    }

    /// Fetch a document by id
    #[inline]
    pub async fn get(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let table = self.open_table().await?;

        let results = table
            .query()
            .only_if(format!("id = '{}'", escape_literal(id)))
            .limit(1)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("failed to query document: {e}")))?;

        let mut records = self.collect_records(results).await?;
        Ok(records.pop())
    }

    /// Apply a partial update, returning the updated record.
    ///
    /// The caller is responsible for refreshing the vector when the update
    /// changes the content.
    #[inline]
    pub async fn update(&self, id: &str, update: DocumentUpdate) -> Result<DocumentRecord> {
        self.check_dimension(update.vector.as_deref())?;

        let mut record = self
            .get(id)
            .await?
            .ok_or_else(|| RagError::NotFound(format!("document {id}")))?;

        if let Some(title) = update.title {
            record.title = title;
        }
        if let Some(content) = update.content {
            record.content = content;
        }
        if let Some(document_type) = update.document_type {
            record.document_type = document_type;
        }
        if let Some(metadata) = update.metadata {
            record.metadata = metadata;
        }
        if let Some(vector) = update.vector {
            record.vector = Some(vector);
        }
        if let Some(embedding_model) = update.embedding_model {
            record.embedding_model = Some(embedding_model);
        }
        record.updated_at = Utc::now().to_rfc3339();

        // LanceDB has no in-place row update, so replace the row
        let table = self.open_table().await?;
        table
            .delete(&format!("id = '{}'", escape_literal(id)))
            .await
            .map_err(|e| RagError::Store(format!("failed to replace document: {e}")))?;
        self.insert_records(std::slice::from_ref(&record)).await?;

        debug!("Updated document {}", record.id);
        Ok(record)
    }

    /// Delete a document by id, reporting whether it existed
    #[inline]
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let table = self.open_table().await?;
        let predicate = format!("id = '{}'", escape_literal(id));

        let matched = table
            .count_rows(Some(predicate.clone()))
            .await
            .map_err(|e| RagError::Store(format!("failed to count documents: {e}")))?;
        if matched == 0 {
            return Ok(false);
        }

        table
            .delete(&predicate)
            .await
            .map_err(|e| RagError::Store(format!("failed to delete document: {e}")))?;

        info!("Deleted document {}", id);
        Ok(true)
    }

    /// List documents newest-first with offset pagination, optionally
    /// restricted to one document type
    #[inline]
    pub async fn list(
        &self,
        document_type: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DocumentRecord>> {
        let mut records = self.scan_all().await?;

        if let Some(document_type) = document_type {
            records.retain(|record| record.document_type == document_type);
        }

        // RFC 3339 timestamps in UTC sort lexicographically
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(records.into_iter().skip(offset).take(limit).collect())
    }

    /// Score every stored document against the query vector in-process.
    ///
    /// Documents without a vector never match. Results at or above the
    /// threshold come back ordered by descending similarity.
    #[inline]
    pub async fn scan_and_score(
        &self,
        query_vector: &[f32],
        document_type: Option<&str>,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredDocument>> {
        let records = self.scan_all().await?;
        debug!("Scoring {} documents against query vector", records.len());

        let mut scored: Vec<ScoredDocument> = records
            .into_iter()
            .filter_map(|document| {
                if let Some(wanted) = document_type {
                    if document.document_type != wanted {
                        return None;
                    }
                }
                let vector = document.vector.as_deref()?;
                let score = cosine_similarity(query_vector, vector);
                (score >= threshold).then_some(ScoredDocument {
                    document,
                    score: Some(score),
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .unwrap_or(f32::MIN)
                .total_cmp(&a.score.unwrap_or(f32::MIN))
        });
        scored.truncate(limit);

        Ok(scored)
    }

    /// Search with the engine's native vector index.
    ///
    /// Fetches `candidate_pool` nearest candidates, converts distances to
    /// similarities, drops scored candidates below the threshold (matches
    /// the engine returned without a distance pass unscored), and keeps
    /// the top `limit`.
    #[inline]
    pub async fn native_vector_search(
        &self,
        query_vector: &[f32],
        limit: usize,
        threshold: f32,
        candidate_pool: usize,
    ) -> Result<Vec<ScoredDocument>> {
        debug!(
            "Native vector search: limit {}, threshold {}, pool {}",
            limit, threshold, candidate_pool
        );

        let table = self.open_table().await?;
        let results = table
            .vector_search(query_vector)
            .map_err(|e| RagError::Store(format!("failed to create vector search: {e}")))?
            .column("vector")
            .limit(candidate_pool.max(limit))
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("failed to execute vector search: {e}")))?;

        let mut scored = self.collect_scored(results).await?;
        scored.retain(|entry| entry.score.is_none_or(|score| score >= threshold));
        scored.truncate(limit);

        Ok(scored)
    }

    /// Whether a document with this title and type is already stored
    #[inline]
    pub async fn exists(&self, title: &str, document_type: &str) -> Result<bool> {
        let table = self.open_table().await?;
        let predicate = format!(
            "title = '{}' AND document_type = '{}'",
            escape_literal(title),
            escape_literal(document_type)
        );

        let matched = table
            .count_rows(Some(predicate))
            .await
            .map_err(|e| RagError::Store(format!("failed to count documents: {e}")))?;

        Ok(matched > 0)
    }

    /// Summary counters for the store
    #[inline]
    pub async fn stats(&self) -> Result<StoreStats> {
        let records = self.scan_all().await?;

        let mut by_type: BTreeMap<String, u64> = BTreeMap::new();
        let mut by_model: BTreeMap<String, u64> = BTreeMap::new();
        for record in &records {
            *by_type.entry(record.document_type.clone()).or_insert(0) += 1;
            if let Some(model) = &record.embedding_model {
                *by_model.entry(model.clone()).or_insert(0) += 1;
            }
        }

        Ok(StoreStats {
            total_documents: records.len() as u64,
            by_type: by_type.into_iter().collect(),
            by_model: by_model.into_iter().collect(),
            table_name: self.table_name.clone(),
            embedding_dimension: self.dimension,
        })
    }

    /// Total number of stored documents
    #[inline]
    pub async fn count(&self) -> Result<u64> {
        let table = self.open_table().await?;
        let count = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Store(format!("failed to count rows: {e}")))?;
        Ok(count as u64)
    }

    /// Build the vector index used by native search
    #[inline]
    pub async fn create_vector_index(&self) -> Result<()> {
        debug!("Creating vector index on table {}", self.table_name);

        let table = self.open_table().await?;
        table
            .create_index(&["vector"], lancedb::index::Index::Auto)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("failed to create vector index: {e}")))?;

        info!("Vector index created on table {}", self.table_name);
        Ok(())
    }

    fn check_dimension(&self, vector: Option<&[f32]>) -> Result<()> {
        if let Some(vector) = vector {
            if vector.len() != self.dimension {
                return Err(RagError::Store(format!(
                    "vector has {} dimensions, table {} expects {}",
                    vector.len(),
                    self.table_name,
                    self.dimension
                )));
            }
        }
        Ok(())
    }

    async fn insert_records(&self, records: &[DocumentRecord]) -> Result<()> {
        let batch = self.create_record_batch(records)?;
        let schema = batch.schema();

        let table = self.open_table().await?;
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("failed to insert documents: {e}")))?;

        Ok(())
    }

    async fn scan_all(&self) -> Result<Vec<DocumentRecord>> {
        let table = self.open_table().await?;
        let results = table
            .query()
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("failed to scan table: {e}")))?;
        self.collect_records(results).await
    }

    fn create_record_batch(&self, records: &[DocumentRecord]) -> Result<RecordBatch> {
        let len = records.len();
        let dim = self.dimension;

        let mut ids = Vec::with_capacity(len);
        let mut titles = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut document_types = Vec::with_capacity(len);
        let mut metadatas = Vec::with_capacity(len);
        let mut embedding_models = Vec::with_capacity(len);
        let mut file_paths = Vec::with_capacity(len);
        let mut file_sizes = Vec::with_capacity(len);
        let mut mime_types = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);
        let mut updated_ats = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * dim);
        let mut validity = Vec::with_capacity(len);

        for record in records {
            ids.push(record.id.as_str());
            titles.push(record.title.as_str());
            contents.push(record.content.as_str());
            document_types.push(record.document_type.as_str());
            metadatas.push(
                serde_json::to_string(&record.metadata)
                    .map_err(|e| RagError::Store(format!("failed to serialize metadata: {e}")))?,
            );
            embedding_models.push(record.embedding_model.as_deref());
            file_paths.push(record.file_path.as_deref());
            file_sizes.push(record.file_size.map(|size| size as i64));
            mime_types.push(record.mime_type.as_deref());
            created_ats.push(record.created_at.as_str());
            updated_ats.push(record.updated_at.as_str());

            match &record.vector {
                Some(vector) => {
                    flat_values.extend_from_slice(vector);
                    validity.push(true);
                }
                None => {
                    // Null rows still occupy dim slots in the flat buffer
                    flat_values.extend(std::iter::repeat_n(0.0, dim));
                    validity.push(false);
                }
            }
        }

        let values_array = Float32Array::from(flat_values);
        let item_field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array = FixedSizeListArray::try_new(
            item_field,
            dim as i32,
            Arc::new(values_array),
            Some(NullBuffer::from(validity)),
        )
        .map_err(|e| RagError::Store(format!("failed to create vector array: {e}")))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(titles)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(document_types)),
            Arc::new(StringArray::from(metadatas)),
            Arc::new(StringArray::from(embedding_models)),
            Arc::new(StringArray::from(file_paths)),
            Arc::new(Int64Array::from(file_sizes)),
            Arc::new(StringArray::from(mime_types)),
            Arc::new(StringArray::from(created_ats)),
            Arc::new(StringArray::from(updated_ats)),
        ];

        RecordBatch::try_new(self.schema(), arrays)
            .map_err(|e| RagError::Store(format!("failed to create record batch: {e}")))
    }

    async fn collect_records(
        &self,
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<DocumentRecord>> {
        let mut records = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::Store(format!("failed to read result stream: {e}")))?
        {
            for row in 0..batch.num_rows() {
                records.push(parse_record(&batch, row)?);
            }
        }

        Ok(records)
    }

    async fn collect_scored(
        &self,
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<ScoredDocument>> {
        let mut scored = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::Store(format!("failed to read result stream: {e}")))?
        {
            let distances = batch
                .column_by_name("_distance")
                .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

            for row in 0..batch.num_rows() {
                let document = parse_record(&batch, row)?;
                let score = distances.and_then(|d| {
                    (!d.is_null(row)).then(|| 1.0 - d.value(row))
                });
                scored.push(ScoredDocument { document, score });
            }
        }

        Ok(scored)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Store(format!("missing {name} column")))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Store(format!("invalid {name} column type")))
}

fn optional_string(batch: &RecordBatch, name: &str, row: usize) -> Result<Option<String>> {
    let column = string_column(batch, name)?;
    if column.is_null(row) {
        Ok(None)
    } else {
        Ok(Some(column.value(row).to_string()))
    }
}

fn parse_record(batch: &RecordBatch, row: usize) -> Result<DocumentRecord> {
    let ids = string_column(batch, "id")?;
    let titles = string_column(batch, "title")?;
    let contents = string_column(batch, "content")?;
    let document_types = string_column(batch, "document_type")?;
    let metadatas = string_column(batch, "metadata")?;
    let created_ats = string_column(batch, "created_at")?;
    let updated_ats = string_column(batch, "updated_at")?;

    let file_sizes = batch
        .column_by_name("file_size")
        .ok_or_else(|| RagError::Store("missing file_size column".to_string()))?
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| RagError::Store("invalid file_size column type".to_string()))?;
    let file_size = if file_sizes.is_null(row) {
        None
    } else {
        Some(file_sizes.value(row) as u64)
    };

    let vectors = batch
        .column_by_name("vector")
        .ok_or_else(|| RagError::Store("missing vector column".to_string()))?
        .as_any()
        .downcast_ref::<FixedSizeListArray>()
        .ok_or_else(|| RagError::Store("invalid vector column type".to_string()))?;

    let vector = if vectors.is_null(row) {
        None
    } else {
        let values = vectors.value(row);
        let floats = values
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| RagError::Store("invalid vector item type".to_string()))?;
        Some(floats.values().to_vec())
    };

    let metadata = serde_json::from_str(metadatas.value(row))
        .map_err(|e| RagError::Store(format!("failed to parse metadata: {e}")))?;

    Ok(DocumentRecord {
        id: ids.value(row).to_string(),
        title: titles.value(row).to_string(),
        content: contents.value(row).to_string(),
        document_type: document_types.value(row).to_string(),
        metadata,
        vector,
        embedding_model: optional_string(batch, "embedding_model", row)?,
        file_path: optional_string(batch, "file_path", row)?,
        file_size,
        mime_type: optional_string(batch, "mime_type", row)?,
        created_at: created_ats.value(row).to_string(),
        updated_at: updated_ats.value(row).to_string(),
    })
}

/// Escape a string for use inside a single-quoted SQL literal
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}
