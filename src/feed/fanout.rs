use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, warn};

use crate::store::{KvStore, WriteOp};

/// Fan-out width when `[feed] fanout_concurrency` is not set.
pub const DEFAULT_WORKERS: usize = 10;

/// Applies independent single-item writes with bounded concurrency. Writes
/// are not atomic with each other; a failed write is logged and counted out.
pub struct FanOut {
    store: Arc<dyn KvStore>,
    semaphore: Arc<Semaphore>,
}

impl FanOut {
    pub fn with_workers(store: Arc<dyn KvStore>, workers: usize) -> Self {
        Self {
            store,
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Returns how many writes succeeded.
    pub async fn apply(&self, ops: Vec<WriteOp>) -> usize {
        let mut handles = Vec::with_capacity(ops.len());

        for op in ops {
            let store = self.store.clone();
            let semaphore = self.semaphore.clone();

            let handle = tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return false;
                };

                let key = op.key().clone();
                match store.transact(vec![op]).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(
                            "Feed write to {}/{} failed: {}",
                            key.table.name(),
                            key.partition,
                            e
                        );
                        false
                    }
                }
            });

            handles.push(handle);
        }

        let mut applied = 0;
        for handle in handles {
            match handle.await {
                Ok(true) => applied += 1,
                Ok(false) => {}
                Err(e) => error!("Task join error: {}", e),
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Key, MemoryStore, Record, Table};
    use serde_json::json;

    #[tokio::test]
    async fn test_apply_counts_successes() {
        let store = Arc::new(MemoryStore::new());
        let fanout = FanOut::with_workers(store.clone(), 2);

        let ops: Vec<_> = (0..6)
            .map(|i| {
                WriteOp::put(Record {
                    key: Key::new(Table::Feed, "viewer", format!("{:02}", i)),
                    body: json!({ "n": i }),
                })
            })
            .collect();
        assert_eq!(fanout.apply(ops).await, 6);
        assert_eq!(store.len(), 6);

        // Deleting a missing key with an existence condition fails alone.
        let ops = vec![
            WriteOp::delete(Key::new(Table::Feed, "viewer", "00")),
            WriteOp::delete_if(
                Key::new(Table::Feed, "viewer", "zz"),
                crate::store::Condition::Exists,
            ),
        ];
        assert_eq!(fanout.apply(ops).await, 1);
        assert_eq!(store.len(), 5);
    }
}
