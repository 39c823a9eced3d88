//! LanceDB-backed record store
//!
//! One table holds every record. Timestamps are stored as RFC 3339 text so
//! rows written by other tools (or with missing values) still load; values
//! that fail to parse read back as absent.

use std::path::Path;
use std::sync::Arc;

use arrow_array::types::Float32Type;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use futures::TryStreamExt;
use lancedb::Table;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, StateLockError};
use crate::memory::tags::StoredTags;
use crate::storage::{Neighbor, RecordFilter, RecordStore, StoredRecord};

/// Default table name
pub const DEFAULT_TABLE: &str = "memory_blocks";

const DISTANCE_COLUMN: &str = "_distance";

/// Default page size for full-table scans
const DEFAULT_SCAN_BATCH: usize = 1024;

pub struct LanceStore {
    connection: Connection,
    table: Table,
    table_name: String,
    dimension: i32,
    scan_batch: usize,
    /// Serializes puts so same-id writes resolve last-write-wins
    write_lock: Mutex<()>,
}

impl LanceStore {
    /// Open `table_name` under `path`, creating the directory and table on
    /// first use. An existing table must match `dimension`.
    pub async fn open_or_create(path: &Path, table_name: &str, dimension: usize) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let uri = path
            .to_str()
            .ok_or_else(|| StateLockError::Storage("Invalid path encoding".to_string()))?;

        let dimension = i32::try_from(dimension).map_err(|_| {
            StateLockError::Config(format!("Embedding dimension {dimension} is too large"))
        })?;

        let connection = lancedb::connect(uri)
            .execute()
            .await
            .map_err(|e| StateLockError::Storage(format!("Failed to connect to LanceDB: {e}")))?;

        let table = if Self::table_exists(&connection, table_name).await? {
            let table = connection
                .open_table(table_name)
                .execute()
                .await
                .map_err(|e| {
                    StateLockError::Storage(format!("Failed to open table {table_name}: {e}"))
                })?;
            Self::check_dimension(&table, table_name, dimension).await?;
            debug!(table = table_name, "Opened existing LanceDB table");
            table
        } else {
            let schema = Self::schema(dimension);
            let batch = RecordBatch::new_empty(schema.clone());
            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            let table = connection
                .create_table(table_name, Box::new(batches))
                .execute()
                .await
                .map_err(|e| {
                    StateLockError::Storage(format!("Failed to create table {table_name}: {e}"))
                })?;
            info!(table = table_name, dimension, "Created LanceDB table");
            table
        };

        Ok(Self {
            connection,
            table,
            table_name: table_name.to_string(),
            dimension,
            scan_batch: DEFAULT_SCAN_BATCH,
            write_lock: Mutex::new(()),
        })
    }

    /// Rows fetched per page by `list_all`
    pub fn with_scan_batch(mut self, scan_batch: usize) -> Self {
        self.scan_batch = scan_batch.max(1);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn dimension(&self) -> usize {
        self.dimension as usize
    }

    /// Names of every table in the backing database
    pub async fn table_names(&self) -> Result<Vec<String>> {
        self.connection
            .table_names()
            .execute()
            .await
            .map_err(|e| StateLockError::Storage(format!("Failed to list tables: {e}")))
    }

    async fn table_exists(connection: &Connection, name: &str) -> Result<bool> {
        let names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| StateLockError::Storage(format!("Failed to list tables: {e}")))?;

        Ok(names.iter().any(|n| n == name))
    }

    async fn check_dimension(table: &Table, table_name: &str, expected: i32) -> Result<()> {
        let schema = table
            .schema()
            .await
            .map_err(|e| StateLockError::Storage(format!("Failed to read table schema: {e}")))?;

        let field = schema.field_with_name("embedding").map_err(|_| {
            StateLockError::Config(format!("Table {table_name} has no embedding column"))
        })?;

        match field.data_type() {
            DataType::FixedSizeList(_, size) if *size == expected => Ok(()),
            DataType::FixedSizeList(_, size) => Err(StateLockError::Config(format!(
                "Table {table_name} stores {size}-dimensional embeddings but the embedding \
                 provider produces {expected}"
            ))),
            other => Err(StateLockError::Config(format!(
                "Table {table_name} has unexpected embedding type {other}"
            ))),
        }
    }

    fn schema(dimension: i32) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension,
                ),
                false,
            ),
            Field::new("name", DataType::Utf8, false),
            Field::new("session_id", DataType::Utf8, false),
            Field::new("external_id", DataType::Utf8, true),
            Field::new("tags_json", DataType::Utf8, true),
            Field::new("tags", DataType::Utf8, true),
            Field::new("created_at", DataType::Utf8, true),
            Field::new("updated_at", DataType::Utf8, true),
        ]))
    }

    fn records_to_batch(&self, records: &[StoredRecord]) -> Result<RecordBatch> {
        for record in records {
            if record.embedding.len() != self.dimension as usize {
                return Err(StateLockError::Storage(format!(
                    "Record {} has a {}-dimensional embedding, table expects {}",
                    record.id,
                    record.embedding.len(),
                    self.dimension
                )));
            }
        }

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let contents: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();

        let embeddings: Vec<Option<Vec<Option<f32>>>> = records
            .iter()
            .map(|r| Some(r.embedding.iter().copied().map(Some).collect()))
            .collect();

        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        let sessions: Vec<&str> = records.iter().map(|r| r.session_id.as_str()).collect();
        let external_ids: Vec<Option<&str>> =
            records.iter().map(|r| r.external_id.as_deref()).collect();

        // Comma-joined tags keep their legacy column; everything else is
        // written as a JSON array
        let (tags_json, legacy_tags): (Vec<Option<String>>, Vec<Option<String>>) = records
            .iter()
            .map(|r| match &r.tags {
                StoredTags::List(tags) => (Some(StoredTags::encode(tags)), None),
                StoredTags::Json(raw) => (Some(raw.clone()), None),
                StoredTags::Joined(raw) => (None, Some(raw.clone())),
            })
            .unzip();

        let created_at: Vec<Option<String>> =
            records.iter().map(|r| r.created_at.map(format_timestamp)).collect();
        let updated_at: Vec<Option<String>> =
            records.iter().map(|r| r.updated_at.map(format_timestamp)).collect();

        RecordBatch::try_new(
            Self::schema(self.dimension),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(contents)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
                    embeddings,
                    self.dimension,
                )),
                Arc::new(StringArray::from(names)),
                Arc::new(StringArray::from(sessions)),
                Arc::new(StringArray::from(external_ids)),
                Arc::new(StringArray::from(tags_json)),
                Arc::new(StringArray::from(legacy_tags)),
                Arc::new(StringArray::from(created_at)),
                Arc::new(StringArray::from(updated_at)),
            ],
        )
        .map_err(|e| StateLockError::Storage(format!("Failed to create RecordBatch: {e}")))
    }

    /// Convert every row of a batch back to records, pairing each with the
    /// `_distance` value when the batch came from a vector search
    fn batch_to_records(batch: &RecordBatch) -> Result<Vec<(StoredRecord, Option<f32>)>> {
        let ids = required_strings(batch, "id")?;
        let contents = required_strings(batch, "content")?;
        let names = optional_strings(batch, "name");
        let sessions = required_strings(batch, "session_id")?;
        let external_ids = optional_strings(batch, "external_id");
        let tags_json = optional_strings(batch, "tags_json");
        let legacy_tags = optional_strings(batch, "tags");
        let created = optional_strings(batch, "created_at");
        let updated = optional_strings(batch, "updated_at");

        let embeddings = batch
            .column_by_name("embedding")
            .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
            .ok_or_else(|| StateLockError::Storage("Failed to get embedding column".to_string()))?;

        let distances = batch
            .column_by_name(DISTANCE_COLUMN)
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

        let mut out = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let embedding_list = embeddings.value(row);
            let embedding = embedding_list
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| {
                    StateLockError::Storage("Failed to get embedding values".to_string())
                })?
                .values()
                .to_vec();

            let record = StoredRecord {
                id: ids.value(row).to_string(),
                content: contents.value(row).to_string(),
                embedding,
                name: StoredRecord::stored_name(string_at(names, row).as_deref()),
                session_id: sessions.value(row).to_string(),
                external_id: string_at(external_ids, row).filter(|s| !s.is_empty()),
                tags: StoredTags::from_columns(
                    string_at(tags_json, row).as_deref(),
                    string_at(legacy_tags, row).as_deref(),
                ),
                created_at: string_at(created, row).and_then(|raw| parse_timestamp(&raw)),
                updated_at: string_at(updated, row).and_then(|raw| parse_timestamp(&raw)),
            };

            let distance = distances.and_then(|d| (!d.is_null(row)).then(|| d.value(row)));
            out.push((record, distance));
        }

        Ok(out)
    }

    async fn collect(
        stream: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<(StoredRecord, Option<f32>)>> {
        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| StateLockError::Storage(format!("Failed to collect query results: {e}")))?;

        let mut rows = Vec::new();
        for batch in &batches {
            rows.extend(Self::batch_to_records(batch)?);
        }
        Ok(rows)
    }

    async fn scan(
        &self,
        filter: &RecordFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StoredRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut query = self.table.query().limit(limit);
        if offset > 0 {
            query = query.offset(offset);
        }
        if let Some(sql_filter) = filter.to_sql_clause() {
            query = query.only_if(sql_filter);
        }

        let stream = query
            .execute()
            .await
            .map_err(|e| StateLockError::Storage(format!("Failed to query records: {e}")))?;

        Ok(Self::collect(stream)
            .await?
            .into_iter()
            .map(|(record, _)| record)
            .collect())
    }
}

#[async_trait]
impl RecordStore for LanceStore {
    async fn put(&self, record: StoredRecord) -> Result<()> {
        let batch = self.records_to_batch(std::slice::from_ref(&record))?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        let _guard = self.write_lock.lock().await;

        // Single commit: the old row is only replaced if the new one lands
        let mut merge = self.table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(batches))
            .await
            .map_err(|e| StateLockError::Storage(format!("Failed to upsert record: {e}")))?;

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<StoredRecord>> {
        let filter = RecordFilter::new().with_ids([id]);
        Ok(self.scan(&filter, 1, 0).await?.into_iter().next())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.delete_where(&RecordFilter::new().with_ids(ids.iter().cloned()))
            .await
    }

    async fn delete_where(&self, filter: &RecordFilter) -> Result<()> {
        let predicate = filter
            .to_sql_clause()
            .unwrap_or_else(|| "id IS NOT NULL".to_string());

        self.table
            .delete(&predicate)
            .await
            .map_err(|e| StateLockError::Storage(format!("Failed to delete records: {e}")))?;

        Ok(())
    }

    async fn count(&self, filter: &RecordFilter) -> Result<usize> {
        self.table
            .count_rows(filter.to_sql_clause())
            .await
            .map_err(|e| StateLockError::Storage(format!("Failed to count rows: {e}")))
    }

    async fn list(
        &self,
        filter: &RecordFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StoredRecord>> {
        self.scan(filter, limit, offset).await
    }

    async fn list_all(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>> {
        // Plain queries are capped by a default limit, so page until a
        // short batch
        let mut records = Vec::new();
        loop {
            let page = self.scan(filter, self.scan_batch, records.len()).await?;
            let done = page.len() < self.scan_batch;
            records.extend(page);
            if done {
                return Ok(records);
            }
        }
    }

    async fn nearest_neighbors(
        &self,
        vector: &[f32],
        k: usize,
        filter: &RecordFilter,
    ) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut query = self
            .table
            .query()
            .nearest_to(vector)
            .map_err(|e| StateLockError::Storage(format!("Failed to create vector query: {e}")))?
            .limit(k);

        if let Some(sql_filter) = filter.to_sql_clause() {
            query = query.only_if(sql_filter);
        }

        let stream = query
            .execute()
            .await
            .map_err(|e| StateLockError::Storage(format!("Failed to execute search: {e}")))?;

        Ok(Self::collect(stream)
            .await?
            .into_iter()
            .map(|(record, distance)| Neighbor { record, distance })
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        self.delete_where(&RecordFilter::new()).await
    }

    fn name(&self) -> &'static str {
        "lancedb"
    }
}

fn required_strings<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    optional_strings(batch, name)
        .ok_or_else(|| StateLockError::Storage(format!("Failed to get {name} column")))
}

fn optional_strings<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
}

fn string_at(array: Option<&StringArray>, row: usize) -> Option<String> {
    array.and_then(|a| (!a.is_null(row)).then(|| a.value(row).to_string()))
}

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Lenient timestamp parse: RFC 3339, or a naive ISO 8601 value taken as UTC
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    warn!(raw, "Unparseable timestamp, treating as absent");
    None
}
