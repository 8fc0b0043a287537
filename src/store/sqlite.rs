use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use rusqlite_migration::{Migrations, M};

use crate::store::{
    apply_increment, apply_merge, Key, KvStore, RangePage, RangeQuery, Record, StoreError, Table,
    WriteOp, DEFAULT_BATCH_SIZE,
};

/// Key-value store backed by a single SQLite table of JSON bodies.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    batch_size: usize,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn, DEFAULT_BATCH_SIZE)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, DEFAULT_BATCH_SIZE)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn from_connection(conn: Connection, batch_size: usize) -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(conn),
            batch_size,
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<(), StoreError> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.lock()?;
        migrations
            .to_latest(&mut conn)
            .map_err(|_| StoreError::Database(rusqlite::Error::InvalidQuery))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn read_body(conn: &Connection, key: &Key) -> Result<Option<serde_json::Value>, StoreError> {
        let body = conn
            .query_row(
                "SELECT body FROM items WHERE tbl = ?1 AND pk = ?2 AND sk = ?3",
                params![key.table.name(), key.partition, key.sort],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match body {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn write_body(
        tx: &Transaction<'_>,
        key: &Key,
        body: &serde_json::Value,
    ) -> Result<(), StoreError> {
        tx.execute(
            "INSERT OR REPLACE INTO items (tbl, pk, sk, body) VALUES (?1, ?2, ?3, ?4)",
            params![
                key.table.name(),
                key.partition,
                key.sort,
                serde_json::to_string(body)?
            ],
        )?;
        Ok(())
    }

    fn remove(tx: &Transaction<'_>, key: &Key) -> Result<(), StoreError> {
        tx.execute(
            "DELETE FROM items WHERE tbl = ?1 AND pk = ?2 AND sk = ?3",
            params![key.table.name(), key.partition, key.sort],
        )?;
        Ok(())
    }

    fn row_to_record(
        table: Table,
        partition: &str,
        sort: String,
        body: String,
    ) -> Result<Record, StoreError> {
        Ok(Record {
            key: Key::new(table, partition, sort),
            body: serde_json::from_str(&body)?,
        })
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, key: &Key) -> Result<Option<Record>, StoreError> {
        let conn = self.lock()?;
        Ok(Self::read_body(&conn, key)?.map(|body| Record {
            key: key.clone(),
            body,
        }))
    }

    async fn query_range(&self, query: &RangeQuery) -> Result<RangePage, StoreError> {
        let conn = self.lock()?;

        let sql = match (query.descending, query.start_after.is_some()) {
            (true, true) => {
                "SELECT sk, body FROM items WHERE tbl = ?1 AND pk = ?2 AND sk < ?3
                 ORDER BY sk DESC LIMIT ?4"
            }
            (true, false) => {
                "SELECT sk, body FROM items WHERE tbl = ?1 AND pk = ?2 AND ?3 IS NULL
                 ORDER BY sk DESC LIMIT ?4"
            }
            (false, true) => {
                "SELECT sk, body FROM items WHERE tbl = ?1 AND pk = ?2 AND sk > ?3
                 ORDER BY sk ASC LIMIT ?4"
            }
            (false, false) => {
                "SELECT sk, body FROM items WHERE tbl = ?1 AND pk = ?2 AND ?3 IS NULL
                 ORDER BY sk ASC LIMIT ?4"
            }
        };

        // One extra row tells us whether another page exists.
        let fetch = (query.limit as i64).saturating_add(1);
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(
                params![
                    query.table.name(),
                    query.partition,
                    query.start_after,
                    fetch
                ],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let has_more = rows.len() > query.limit;
        let records = rows
            .into_iter()
            .take(query.limit)
            .map(|(sk, body)| Self::row_to_record(query.table, &query.partition, sk, body))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RangePage { records, has_more })
    }

    async fn batch_get(&self, keys: &[Key]) -> Result<Vec<Record>, StoreError> {
        if keys.len() > self.batch_size {
            return Err(StoreError::BatchTooLarge {
                size: keys.len(),
                limit: self.batch_size,
            });
        }

        let conn = self.lock()?;
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(body) = Self::read_body(&conn, key)? {
                records.push(Record {
                    key: key.clone(),
                    body,
                });
            }
        }
        Ok(records)
    }

    async fn transact(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        // Returning early drops `tx`, which rolls everything back.
        for (index, op) in ops.into_iter().enumerate() {
            let current = Self::read_body(&tx, op.key())?;
            match op {
                WriteOp::Put { record, condition } => {
                    if condition.is_some_and(|c| !c.holds(current.is_some())) {
                        return Err(StoreError::TransactionCanceled { index });
                    }
                    Self::write_body(&tx, &record.key, &record.body)?;
                }
                WriteOp::Delete { key, condition } => {
                    if condition.is_some_and(|c| !c.holds(current.is_some())) {
                        return Err(StoreError::TransactionCanceled { index });
                    }
                    Self::remove(&tx, &key)?;
                }
                WriteOp::Increment { key, field, delta } => {
                    let Some(mut body) = current else {
                        return Err(StoreError::TransactionCanceled { index });
                    };
                    if !apply_increment(&mut body, &field, delta) {
                        return Err(StoreError::TransactionCanceled { index });
                    }
                    Self::write_body(&tx, &key, &body)?;
                }
                WriteOp::Merge { key, fields } => {
                    let Some(mut body) = current else {
                        return Err(StoreError::TransactionCanceled { index });
                    };
                    if !apply_merge(&mut body, fields) {
                        return Err(StoreError::TransactionCanceled { index });
                    }
                    Self::write_body(&tx, &key, &body)?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn max_batch_size(&self) -> usize {
        self.batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Condition;
    use serde_json::json;

    fn record(table: Table, pk: &str, sk: &str, body: serde_json::Value) -> Record {
        Record {
            key: Key::new(table, pk, sk),
            body,
        }
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = SqliteStore::in_memory().unwrap();
        let key = Key::single(Table::Users, "u1");
        store
            .put(record(Table::Users, "u1", "", json!({"username": "jake"})), None)
            .await
            .unwrap();

        let got = store.get(&key).await.unwrap().unwrap();
        assert_eq!(got.body["username"], "jake");

        store.delete(&key, Some(Condition::Exists)).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());

        let err = store.delete(&key, Some(Condition::Exists)).await.unwrap_err();
        assert!(matches!(err, StoreError::ConditionFailed));
    }

    #[tokio::test]
    async fn test_query_range_pages() {
        let store = SqliteStore::in_memory().unwrap();
        for sk in ["01", "02", "03", "04"] {
            store
                .put(record(Table::Timeline, "all", sk, json!({ "sk": sk })), None)
                .await
                .unwrap();
        }

        let page = store
            .query_range(&RangeQuery::new(Table::Timeline, "all", 3).descending())
            .await
            .unwrap();
        let sorts: Vec<_> = page.records.iter().map(|r| r.key.sort.clone()).collect();
        assert_eq!(sorts, vec!["04", "03", "02"]);
        assert!(page.has_more);

        let page = store
            .query_range(
                &RangeQuery::new(Table::Timeline, "all", 3)
                    .descending()
                    .start_after(Some("02".into())),
            )
            .await
            .unwrap();
        assert_eq!(page.records.len(), 1);
        assert!(!page.has_more);

        let asc = store
            .query_range(&RangeQuery::new(Table::Timeline, "all", 10))
            .await
            .unwrap();
        assert_eq!(asc.records.first().unwrap().key.sort, "01");
        assert!(!asc.has_more);
    }

    #[tokio::test]
    async fn test_transact_rolls_back_on_failed_condition() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .put(
                record(Table::Articles, "a1", "", json!({ "favoritesCount": 0 })),
                None,
            )
            .await
            .unwrap();
        store
            .put(record(Table::Favorites, "a1", "u1", json!({})), None)
            .await
            .unwrap();

        let ops = vec![
            WriteOp::put_if(
                record(Table::Favorites, "a1", "u1", json!({})),
                Condition::NotExists,
            ),
            WriteOp::Increment {
                key: Key::single(Table::Articles, "a1"),
                field: "favoritesCount".into(),
                delta: 1,
            },
        ];
        let err = store.transact(ops).await.unwrap_err();
        assert!(matches!(err, StoreError::TransactionCanceled { index: 0 }));

        let article = store
            .get(&Key::single(Table::Articles, "a1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(article.body["favoritesCount"], 0);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conduit.db");

        {
            let store = SqliteStore::new(&path).unwrap();
            store
                .put(record(Table::Tags, "all", "rust", json!({})), None)
                .await
                .unwrap();
        }

        let store = SqliteStore::new(&path).unwrap();
        assert!(store
            .get(&Key::new(Table::Tags, "all", "rust"))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_batch_get_skips_missing() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .put(record(Table::Users, "u1", "", json!({})), None)
            .await
            .unwrap();

        let found = store
            .batch_get(&[
                Key::single(Table::Users, "u1"),
                Key::single(Table::Users, "missing"),
            ])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
