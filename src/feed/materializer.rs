use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ArticleRef, FanOut, FeedEvent, FeedHandle};
use crate::config::FeedConfig;
use crate::domain::{Comment, Favorite, FeedEntry};
use crate::store::{
    collect_partition, keys, KvStore, RangeQuery, Record, StoreError, Table, WriteOp,
};

const SCAN_PAGE: usize = 100;

/// Background worker that keeps the `feed` table in step with article and
/// follow events. Events are applied one at a time in arrival order.
pub struct FeedMaterializer {
    store: Arc<dyn KvStore>,
    fanout: FanOut,
    rx: mpsc::Receiver<FeedEvent>,
}

impl FeedMaterializer {
    /// Create a new materializer and return a handle to communicate with it
    pub fn new(store: Arc<dyn KvStore>, config: &FeedConfig) -> (Self, FeedHandle) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let fanout = FanOut::with_workers(store.clone(), config.fanout_concurrency);
        let materializer = Self { store, fanout, rx };
        (materializer, FeedHandle::new(tx))
    }

    pub async fn run(mut self) {
        info!("Feed materializer started");

        while let Some(event) = self.rx.recv().await {
            match event {
                FeedEvent::ArticlePublished(article) => {
                    if let Err(e) = self.publish(article).await {
                        warn!("Fan-out for article {} failed: {}", article.id, e);
                    }
                }
                FeedEvent::ArticleDeleted(article) => {
                    if let Err(e) = self.purge_article(article).await {
                        warn!("Cleanup for deleted article {} failed: {}", article.id, e);
                    }
                }
                FeedEvent::Unfollowed { viewer, author } => {
                    if let Err(e) = self.purge_author(viewer, author).await {
                        warn!("Feed purge for {} after unfollow failed: {}", viewer, e);
                    }
                }
                FeedEvent::Flush(done) => {
                    let _ = done.send(());
                }
                FeedEvent::Shutdown => {
                    info!("Feed materializer shutting down");
                    break;
                }
            }
        }
    }

    /// Writes one entry per current follower, a page of followers at a time.
    async fn publish(&self, article: ArticleRef) -> Result<usize, StoreError> {
        let sort_key = article.sort_key();
        let mut written = 0;
        let mut after = None;

        loop {
            let query = RangeQuery::new(Table::Followers, article.author_id.to_string(), SCAN_PAGE)
                .start_after(after);
            let page = self.store.query_range(&query).await?;
            after = page.records.last().map(|r| r.key.sort.clone());

            let mut ops = Vec::with_capacity(page.records.len());
            for record in &page.records {
                let Ok(viewer) = Uuid::parse_str(&record.key.sort) else {
                    continue;
                };
                let entry = FeedEntry {
                    viewer_id: viewer,
                    article_id: article.id,
                    author_id: article.author_id,
                    created_at: article.created_at,
                };
                ops.push(WriteOp::put(Record::encode(keys::feed(viewer, &sort_key), &entry)?));
            }
            written += self.fanout.apply(ops).await;

            if !page.has_more {
                break;
            }
        }

        info!("Fanned out article {} to {} feeds", article.id, written);
        Ok(written)
    }

    /// Removes what hangs off a deleted article: comments, favorite edges
    /// (both directions) and the feed entries of current followers.
    async fn purge_article(&self, article: ArticleRef) -> Result<(), StoreError> {
        let sort_key = article.sort_key();
        let article_partition = article.id.to_string();
        let mut ops = Vec::new();

        let comments = collect_partition(
            self.store.as_ref(),
            Table::CommentsByArticle,
            &article_partition,
            SCAN_PAGE,
        )
        .await?;
        for record in comments {
            let comment: Comment = record.decode()?;
            ops.push(WriteOp::delete(keys::comment(comment.id)));
            ops.push(WriteOp::delete(record.key));
        }

        for record in
            collect_partition(self.store.as_ref(), Table::Favorites, &article_partition, SCAN_PAGE)
                .await?
        {
            let edge: Favorite = record.decode()?;
            ops.push(WriteOp::delete(keys::favorite_by_user(edge.user_id, &sort_key)));
            ops.push(WriteOp::delete(record.key));
        }

        for record in collect_partition(
            self.store.as_ref(),
            Table::Followers,
            &article.author_id.to_string(),
            SCAN_PAGE,
        )
        .await?
        {
            if let Ok(viewer) = Uuid::parse_str(&record.key.sort) {
                ops.push(WriteOp::delete(keys::feed(viewer, &sort_key)));
            }
        }

        let total = ops.len();
        let applied = self.fanout.apply(ops).await;
        debug!(
            "Purged {}/{} records for deleted article {}",
            applied, total, article.id
        );
        Ok(())
    }

    async fn purge_author(&self, viewer: Uuid, author: Uuid) -> Result<(), StoreError> {
        let mut ops = Vec::new();
        let entries =
            collect_partition(self.store.as_ref(), Table::Feed, &viewer.to_string(), SCAN_PAGE)
                .await?;
        for record in entries {
            let entry: FeedEntry = record.decode()?;
            if entry.author_id == author {
                ops.push(WriteOp::delete(record.key));
            }
        }

        let removed = self.fanout.apply(ops).await;
        debug!("Removed {} feed entries of {} for {}", removed, author, viewer);
        Ok(())
    }
}

/// Spawn the feed materializer as a tokio task
pub fn spawn_feed_materializer(store: Arc<dyn KvStore>, config: &FeedConfig) -> FeedHandle {
    let (materializer, handle) = FeedMaterializer::new(store, config);

    tokio::spawn(async move {
        materializer.run().await;
    });

    handle
}
