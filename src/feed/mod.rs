//! Per-viewer home feed materialization.
//!
//! Article creation, deletion and (under the purge policy) unfollows are
//! turned into [`FeedEvent`]s and applied by a background worker. Callers
//! never wait for fan-out; tests call [`FeedHandle::flush`] to observe the
//! settled state.

pub mod fanout;
pub mod materializer;

pub use fanout::{FanOut, DEFAULT_WORKERS};
pub use materializer::{spawn_feed_materializer, FeedMaterializer};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;
use uuid::Uuid;

use crate::domain::{Article, SortKey};

/// The fields of an article the materializer needs after the article
/// record itself may already be gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArticleRef {
    pub id: Uuid,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl ArticleRef {
    pub fn sort_key(&self) -> SortKey {
        SortKey::new(self.created_at, self.id)
    }
}

impl From<&Article> for ArticleRef {
    fn from(article: &Article) -> Self {
        Self {
            id: article.id,
            author_id: article.author_id,
            created_at: article.created_at,
        }
    }
}

#[derive(Debug)]
pub enum FeedEvent {
    /// Write a feed entry for every current follower of the author.
    ArticlePublished(ArticleRef),
    /// Remove the article's comments, favorite edges and feed entries.
    ArticleDeleted(ArticleRef),
    /// Remove the viewer's entries for the author.
    Unfollowed { viewer: Uuid, author: Uuid },
    /// Answered once every earlier event has been applied.
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Cloneable sender side of the materializer.
#[derive(Clone)]
pub struct FeedHandle {
    tx: mpsc::Sender<FeedEvent>,
}

impl FeedHandle {
    pub(crate) fn new(tx: mpsc::Sender<FeedEvent>) -> Self {
        Self { tx }
    }

    pub async fn article_published(&self, article: ArticleRef) {
        self.send(FeedEvent::ArticlePublished(article)).await;
    }

    pub async fn article_deleted(&self, article: ArticleRef) {
        self.send(FeedEvent::ArticleDeleted(article)).await;
    }

    pub async fn unfollowed(&self, viewer: Uuid, author: Uuid) {
        self.send(FeedEvent::Unfollowed { viewer, author }).await;
    }

    /// Waits until every event queued before this call has been applied.
    /// Returns immediately if the worker has stopped.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(FeedEvent::Flush(tx)).await.is_err() {
            return;
        }
        let _ = rx.await;
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(FeedEvent::Shutdown).await;
    }

    async fn send(&self, event: FeedEvent) {
        if let Err(e) = self.tx.send(event).await {
            warn!("Feed materializer is not running, dropped {:?}", e.0);
        }
    }
}
