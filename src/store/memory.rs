use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::store::{
    apply_increment, apply_merge, Key, KvStore, RangePage, RangeQuery, Record, StoreError, WriteOp,
    DEFAULT_BATCH_SIZE,
};

/// Ordered in-process store. Keys sort by `(table, partition, sort)`, so a
/// partition scan is a contiguous range of the map.
pub struct MemoryStore {
    items: Mutex<BTreeMap<Key, serde_json::Value>>,
    batch_size: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_batch_size(DEFAULT_BATCH_SIZE)
    }

    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            items: Mutex::new(BTreeMap::new()),
            batch_size: batch_size.max(1),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<Key, serde_json::Value>>, StoreError> {
        self.items
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &Key) -> Result<Option<Record>, StoreError> {
        let items = self.lock()?;
        Ok(items.get(key).map(|body| Record {
            key: key.clone(),
            body: body.clone(),
        }))
    }

    async fn query_range(&self, query: &RangeQuery) -> Result<RangePage, StoreError> {
        let items = self.lock()?;
        let lower = Key::new(query.table, query.partition.clone(), "");

        let mut matching: Vec<(&Key, &serde_json::Value)> = items
            .range(lower..)
            .take_while(|(k, _)| k.table == query.table && k.partition == query.partition)
            .filter(|(k, _)| query.admits(&k.sort))
            .collect();

        if query.descending {
            matching.reverse();
        }

        let has_more = matching.len() > query.limit;
        let records = matching
            .into_iter()
            .take(query.limit)
            .map(|(k, body)| Record {
                key: k.clone(),
                body: body.clone(),
            })
            .collect();

        Ok(RangePage { records, has_more })
    }

    async fn batch_get(&self, keys: &[Key]) -> Result<Vec<Record>, StoreError> {
        if keys.len() > self.batch_size {
            return Err(StoreError::BatchTooLarge {
                size: keys.len(),
                limit: self.batch_size,
            });
        }
        let items = self.lock()?;
        Ok(keys
            .iter()
            .filter_map(|key| {
                items.get(key).map(|body| Record {
                    key: key.clone(),
                    body: body.clone(),
                })
            })
            .collect())
    }

    async fn transact(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut items = self.lock()?;

        // Stage against a scratch copy of the touched keys so a late failure
        // leaves the map untouched.
        let mut staged: BTreeMap<Key, Option<serde_json::Value>> = BTreeMap::new();
        for (index, op) in ops.into_iter().enumerate() {
            let key = op.key().clone();
            let current = match staged.get(&key) {
                Some(value) => value.clone(),
                None => items.get(&key).cloned(),
            };

            let next = match op {
                WriteOp::Put { record, condition } => {
                    if condition.is_some_and(|c| !c.holds(current.is_some())) {
                        return Err(StoreError::TransactionCanceled { index });
                    }
                    Some(record.body)
                }
                WriteOp::Delete { condition, .. } => {
                    if condition.is_some_and(|c| !c.holds(current.is_some())) {
                        return Err(StoreError::TransactionCanceled { index });
                    }
                    None
                }
                WriteOp::Increment { field, delta, .. } => {
                    let Some(mut body) = current else {
                        return Err(StoreError::TransactionCanceled { index });
                    };
                    if !apply_increment(&mut body, &field, delta) {
                        return Err(StoreError::TransactionCanceled { index });
                    }
                    Some(body)
                }
                WriteOp::Merge { fields, .. } => {
                    let Some(mut body) = current else {
                        return Err(StoreError::TransactionCanceled { index });
                    };
                    if !apply_merge(&mut body, fields) {
                        return Err(StoreError::TransactionCanceled { index });
                    }
                    Some(body)
                }
            };
            staged.insert(key, next);
        }

        for (key, value) in staged {
            match value {
                Some(body) => {
                    items.insert(key, body);
                }
                None => {
                    items.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn max_batch_size(&self) -> usize {
        self.batch_size
    }
}
