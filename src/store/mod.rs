pub mod keys;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Largest key set a single `batch_get` accepts, matching common managed
/// key-value services.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Logical record sets. Each one is an independent keyspace of
/// `(partition, sort)` keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Users,
    Usernames,
    Emails,
    Articles,
    Slugs,
    Timeline,
    ArticlesByAuthor,
    ArticlesByTag,
    Tags,
    Comments,
    CommentsByArticle,
    Follows,
    Followers,
    Favorites,
    FavoritesByUser,
    Feed,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Usernames => "usernames",
            Table::Emails => "emails",
            Table::Articles => "articles",
            Table::Slugs => "slugs",
            Table::Timeline => "timeline",
            Table::ArticlesByAuthor => "articles_by_author",
            Table::ArticlesByTag => "articles_by_tag",
            Table::Tags => "tags",
            Table::Comments => "comments",
            Table::CommentsByArticle => "comments_by_article",
            Table::Follows => "follows",
            Table::Followers => "followers",
            Table::Favorites => "favorites",
            Table::FavoritesByUser => "favorites_by_user",
            Table::Feed => "feed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    pub table: Table,
    pub partition: String,
    pub sort: String,
}

impl Key {
    pub fn new(table: Table, partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            table,
            partition: partition.into(),
            sort: sort.into(),
        }
    }

    /// Key for tables addressed by partition alone.
    pub fn single(table: Table, partition: impl Into<String>) -> Self {
        Self::new(table, partition, "")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: Key,
    pub body: serde_json::Value,
}

impl Record {
    pub fn encode<T: Serialize>(key: Key, value: &T) -> Result<Self, StoreError> {
        Ok(Self {
            key,
            body: serde_json::to_value(value)?,
        })
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(T::deserialize(&self.body)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Exists,
    NotExists,
}

impl Condition {
    pub fn holds(self, exists: bool) -> bool {
        match self {
            Condition::Exists => exists,
            Condition::NotExists => !exists,
        }
    }
}

/// Ordered scan over one partition. `start_after` is exclusive and relative
/// to the scan direction.
#[derive(Debug, Clone)]
pub struct RangeQuery {
    pub table: Table,
    pub partition: String,
    pub start_after: Option<String>,
    pub limit: usize,
    pub descending: bool,
}

impl RangeQuery {
    pub fn new(table: Table, partition: impl Into<String>, limit: usize) -> Self {
        Self {
            table,
            partition: partition.into(),
            start_after: None,
            limit,
            descending: false,
        }
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    pub fn start_after(mut self, sort: Option<String>) -> Self {
        self.start_after = sort;
        self
    }

    pub(crate) fn admits(&self, sort: &str) -> bool {
        match &self.start_after {
            None => true,
            Some(after) if self.descending => sort < after.as_str(),
            Some(after) => sort > after.as_str(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RangePage {
    pub records: Vec<Record>,
    /// At least one more record follows the last one returned.
    pub has_more: bool,
}

#[derive(Debug, Clone)]
pub enum WriteOp {
    Put {
        record: Record,
        condition: Option<Condition>,
    },
    Delete {
        key: Key,
        condition: Option<Condition>,
    },
    /// Adds `delta` to a numeric field of an existing record. Fails when the
    /// record is missing or the result would drop below zero.
    Increment {
        key: Key,
        field: String,
        delta: i64,
    },
    /// Overwrites the given top-level fields of an existing record, leaving
    /// the rest untouched. Fails when the record is missing.
    Merge {
        key: Key,
        fields: serde_json::Map<String, serde_json::Value>,
    },
}

impl WriteOp {
    pub fn put(record: Record) -> Self {
        WriteOp::Put {
            record,
            condition: None,
        }
    }

    pub fn put_if(record: Record, condition: Condition) -> Self {
        WriteOp::Put {
            record,
            condition: Some(condition),
        }
    }

    pub fn delete(key: Key) -> Self {
        WriteOp::Delete {
            key,
            condition: None,
        }
    }

    pub fn delete_if(key: Key, condition: Condition) -> Self {
        WriteOp::Delete {
            key,
            condition: Some(condition),
        }
    }

    pub fn key(&self) -> &Key {
        match self {
            WriteOp::Put { record, .. } => &record.key,
            WriteOp::Delete { key, .. } => key,
            WriteOp::Increment { key, .. } => key,
            WriteOp::Merge { key, .. } => key,
        }
    }
}

/// Applies an increment to a JSON body in place. Returns `false` if the
/// field is not an integer or the result would be negative.
pub(crate) fn apply_increment(body: &mut serde_json::Value, field: &str, delta: i64) -> bool {
    let Some(slot) = body.get_mut(field) else {
        return false;
    };
    let Some(current) = slot.as_i64() else {
        return false;
    };
    match current.checked_add(delta) {
        Some(next) if next >= 0 => {
            *slot = serde_json::Value::from(next);
            true
        }
        _ => false,
    }
}

/// Copies `fields` over a JSON object body. Returns `false` if the body is
/// not an object.
pub(crate) fn apply_merge(
    body: &mut serde_json::Value,
    fields: serde_json::Map<String, serde_json::Value>,
) -> bool {
    let Some(object) = body.as_object_mut() else {
        return false;
    };
    object.extend(fields);
    true
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Conditional check failed")]
    ConditionFailed,

    #[error("Transaction canceled at operation {index}")]
    TransactionCanceled { index: usize },

    #[error("Batch of {size} keys exceeds limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Lock poisoned: {0}")]
    Poisoned(String),
}

/// Generic key-value store with per-item atomicity plus an all-or-nothing
/// multi-item write.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &Key) -> Result<Option<Record>, StoreError>;

    /// Fails with `ConditionFailed` if `condition` does not hold.
    async fn put(&self, record: Record, condition: Option<Condition>) -> Result<(), StoreError> {
        self.transact(vec![WriteOp::Put { record, condition }])
            .await
            .map_err(single_op_error)
    }

    /// Fails with `ConditionFailed` if `condition` does not hold.
    async fn delete(&self, key: &Key, condition: Option<Condition>) -> Result<(), StoreError> {
        self.transact(vec![WriteOp::Delete {
            key: key.clone(),
            condition,
        }])
        .await
        .map_err(single_op_error)
    }

    async fn query_range(&self, query: &RangeQuery) -> Result<RangePage, StoreError>;

    /// Missing keys are silently absent from the result. Rejects key sets
    /// larger than `max_batch_size`.
    async fn batch_get(&self, keys: &[Key]) -> Result<Vec<Record>, StoreError>;

    /// Applies every op or none. The first op whose condition fails is
    /// reported as `TransactionCanceled { index }`.
    async fn transact(&self, ops: Vec<WriteOp>) -> Result<(), StoreError>;

    fn max_batch_size(&self) -> usize {
        DEFAULT_BATCH_SIZE
    }
}

fn single_op_error(err: StoreError) -> StoreError {
    match err {
        StoreError::TransactionCanceled { .. } => StoreError::ConditionFailed,
        other => other,
    }
}

/// `batch_get` over an arbitrarily large key set, split into chunks the
/// store accepts.
pub async fn batch_get_chunked(
    store: &dyn KvStore,
    keys: &[Key],
) -> Result<Vec<Record>, StoreError> {
    let mut records = Vec::with_capacity(keys.len());
    for chunk in keys.chunks(store.max_batch_size().max(1)) {
        records.extend(store.batch_get(chunk).await?);
    }
    Ok(records)
}

/// Reads a whole partition in ascending order, one page at a time.
pub async fn collect_partition(
    store: &dyn KvStore,
    table: Table,
    partition: &str,
    page_size: usize,
) -> Result<Vec<Record>, StoreError> {
    let mut records = Vec::new();
    let mut after = None;
    loop {
        let query = RangeQuery::new(table, partition, page_size.max(1)).start_after(after);
        let page = store.query_range(&query).await?;
        after = page.records.last().map(|r| r.key.sort.clone());
        records.extend(page.records);
        if !page.has_more {
            return Ok(records);
        }
    }
}
