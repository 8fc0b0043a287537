use std::sync::Arc;

use tracing::info;

use crate::app::error::Result;
use crate::articles::{ArticleService, CommentService};
use crate::config::{Config, StoreBackend};
use crate::feed::{spawn_feed_materializer, FeedHandle};
use crate::listing::{Hydrator, ListingEngine};
use crate::relationship::{FavoriteCounter, FollowService, RelationshipOracle};
use crate::store::{KvStore, MemoryStore, SqliteStore};
use crate::users::{ProfileService, UserService};

/// Every service, built once per process over one shared store. Must be
/// created inside a tokio runtime: the feed materializer is spawned here.
pub struct AppContext {
    pub store: Arc<dyn KvStore>,
    pub users: UserService,
    pub profiles: ProfileService,
    pub oracle: RelationshipOracle,
    pub follows: FollowService,
    pub articles: ArticleService,
    pub comments: CommentService,
    pub listing: ListingEngine,
    pub feed: FeedHandle,
}

impl AppContext {
    pub fn new(config: &Config) -> Result<Self> {
        let batch_size = config.store.batch_size;
        let store: Arc<dyn KvStore> = match config.store.backend {
            StoreBackend::Memory => Arc::new(MemoryStore::with_batch_size(batch_size)),
            StoreBackend::Sqlite => {
                let path = config.store.database_path()?;
                info!("Opening store at {}", path.display());
                Arc::new(SqliteStore::new(&path)?.with_batch_size(batch_size))
            }
        };
        Ok(Self::with_store(store, config))
    }

    /// In-memory store with default settings.
    pub fn in_memory() -> Self {
        Self::in_memory_with_config(&Config::default())
    }

    pub fn in_memory_with_config(config: &Config) -> Self {
        let store = Arc::new(MemoryStore::with_batch_size(config.store.batch_size));
        Self::with_store(store, config)
    }

    pub fn with_store(store: Arc<dyn KvStore>, config: &Config) -> Self {
        let feed = spawn_feed_materializer(store.clone(), &config.feed);

        let users = UserService::new(store.clone());
        let oracle = RelationshipOracle::new(store.clone());
        let profiles = ProfileService::new(users.clone(), oracle.clone());
        let follows = FollowService::new(
            store.clone(),
            users.clone(),
            feed.clone(),
            config.feed.unfollow_policy,
        );
        let hydrator = Hydrator::new(store.clone(), users.clone(), oracle.clone());
        let articles = ArticleService::new(
            store.clone(),
            users.clone(),
            hydrator.clone(),
            FavoriteCounter::new(store.clone()),
            feed.clone(),
        );
        let comments = CommentService::new(
            store.clone(),
            articles.clone(),
            users.clone(),
            oracle.clone(),
        );
        let listing = ListingEngine::new(
            store.clone(),
            users.clone(),
            hydrator,
            config.pagination.clone(),
            config.feed.unfollow_policy,
        );

        Self {
            store,
            users,
            profiles,
            oracle,
            follows,
            articles,
            comments,
            listing,
            feed,
        }
    }

    /// Waits for queued feed work, then stops the materializer.
    pub async fn shutdown(&self) {
        self.feed.flush().await;
        self.feed.shutdown().await;
    }
}
