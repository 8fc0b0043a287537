use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::app::{ConduitError, Result};
use crate::config::UnfollowPolicy;
use crate::domain::{
    now_millis, Article, ArticlePointer, Favorite, Follow, ProfileView, FAVORITES_COUNT_FIELD,
};
use crate::feed::FeedHandle;
use crate::store::{keys, Condition, KvStore, Record, StoreError, WriteOp};
use crate::users::UserService;

/// Follow/unfollow. Edges are written unconditionally in both directions,
/// so repeating either call converges on the same state.
#[derive(Clone)]
pub struct FollowService {
    store: Arc<dyn KvStore>,
    users: UserService,
    feed: FeedHandle,
    unfollow_policy: UnfollowPolicy,
}

impl FollowService {
    pub fn new(
        store: Arc<dyn KvStore>,
        users: UserService,
        feed: FeedHandle,
        unfollow_policy: UnfollowPolicy,
    ) -> Self {
        Self {
            store,
            users,
            feed,
            unfollow_policy,
        }
    }

    pub async fn follow(&self, follower: Uuid, followee_username: &str) -> Result<ProfileView> {
        let followee = self.users.get_by_username(followee_username).await?;
        if followee.id == follower {
            return Err(ConduitError::CannotFollowSelf);
        }

        let edge = Follow {
            follower_id: follower,
            followee_id: followee.id,
            created_at: now_millis(),
        };
        self.store
            .transact(vec![
                WriteOp::put(Record::encode(keys::follow(follower, followee.id), &edge)?),
                WriteOp::put(Record::encode(keys::follower(followee.id, follower), &edge)?),
            ])
            .await?;

        debug!("{} follows {}", follower, followee.username);
        Ok(ProfileView::new(&followee, true))
    }

    pub async fn unfollow(&self, follower: Uuid, followee_username: &str) -> Result<ProfileView> {
        let followee = self.users.get_by_username(followee_username).await?;
        if followee.id == follower {
            return Err(ConduitError::CannotUnfollowSelf);
        }

        self.store
            .transact(vec![
                WriteOp::delete(keys::follow(follower, followee.id)),
                WriteOp::delete(keys::follower(followee.id, follower)),
            ])
            .await?;

        if self.unfollow_policy == UnfollowPolicy::Purge {
            self.feed.unfollowed(follower, followee.id).await;
        }

        debug!("{} unfollowed {}", follower, followee.username);
        Ok(ProfileView::new(&followee, false))
    }
}

/// Favorite edges and the denormalized count on the article record, always
/// changed together in one store transaction.
#[derive(Clone)]
pub struct FavoriteCounter {
    store: Arc<dyn KvStore>,
}

impl FavoriteCounter {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Fails with `AlreadyFavorited` if the edge exists. A losing race with
    /// a concurrent favorite surfaces the same way.
    pub async fn favorite(&self, viewer: Uuid, article: &Article) -> Result<()> {
        let edge = Favorite {
            user_id: viewer,
            article_id: article.id,
            created_at: now_millis(),
        };
        let pointer = ArticlePointer {
            article_id: article.id,
            author_id: article.author_id,
        };
        let ops = vec![
            WriteOp::put_if(
                Record::encode(keys::favorite(article.id, viewer), &edge)?,
                Condition::NotExists,
            ),
            WriteOp::put(Record::encode(
                keys::favorite_by_user(viewer, &article.sort_key()),
                &pointer,
            )?),
            WriteOp::Increment {
                key: keys::article(article.id),
                field: FAVORITES_COUNT_FIELD.to_string(),
                delta: 1,
            },
        ];

        match self.store.transact(ops).await {
            Ok(()) => Ok(()),
            Err(StoreError::TransactionCanceled { index: 0 }) => {
                Err(ConduitError::AlreadyFavorited)
            }
            Err(StoreError::TransactionCanceled { .. }) => {
                Err(ConduitError::ArticleNotFound(article.slug.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fails with `AlreadyUnfavorited` if there is no edge. The count never
    /// drops below zero: the increment op refuses and cancels the whole
    /// transaction.
    pub async fn unfavorite(&self, viewer: Uuid, article: &Article) -> Result<()> {
        let ops = vec![
            WriteOp::delete_if(keys::favorite(article.id, viewer), Condition::Exists),
            WriteOp::delete(keys::favorite_by_user(viewer, &article.sort_key())),
            WriteOp::Increment {
                key: keys::article(article.id),
                field: FAVORITES_COUNT_FIELD.to_string(),
                delta: -1,
            },
        ];

        match self.store.transact(ops).await {
            Ok(()) => Ok(()),
            Err(StoreError::TransactionCanceled { index: 0 }) => {
                Err(ConduitError::AlreadyUnfavorited)
            }
            Err(StoreError::TransactionCanceled { .. }) => {
                Err(ConduitError::ArticleNotFound(article.slug.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedConfig;
    use crate::domain::NewArticle;
    use crate::feed::spawn_feed_materializer;
    use crate::relationship::RelationshipOracle;
    use crate::store::MemoryStore;

    struct Fixture {
        store: Arc<dyn KvStore>,
        users: UserService,
        follows: FollowService,
        oracle: RelationshipOracle,
    }

    fn fixture(policy: UnfollowPolicy) -> Fixture {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let users = UserService::new(store.clone());
        let feed = spawn_feed_materializer(store.clone(), &FeedConfig::default());
        Fixture {
            follows: FollowService::new(store.clone(), users.clone(), feed, policy),
            oracle: RelationshipOracle::new(store.clone()),
            users,
            store,
        }
    }

    async fn stored_article(store: &Arc<dyn KvStore>, author: Uuid) -> Article {
        let article = Article::new(
            author,
            NewArticle {
                title: "Dragons".into(),
                ..Default::default()
            },
        );
        store
            .put(Record::encode(keys::article(article.id), &article).unwrap(), None)
            .await
            .unwrap();
        article
    }

    async fn count(store: &Arc<dyn KvStore>, article: &Article) -> i64 {
        let record = store.get(&keys::article(article.id)).await.unwrap().unwrap();
        record.decode::<Article>().unwrap().favorites_count
    }

    #[tokio::test]
    async fn test_follow_is_idempotent() {
        let fx = fixture(UnfollowPolicy::default());
        let jake = fx.users.create_user("jake", "jake@x.y", None, None).await.unwrap();
        let jane = fx.users.create_user("jane", "jane@x.y", None, None).await.unwrap();

        for _ in 0..2 {
            let profile = fx.follows.follow(jake.id, "jane").await.unwrap();
            assert!(profile.following);
        }
        assert!(fx.oracle.is_following(jake.id, jane.id).await.unwrap());
        assert!(!fx.oracle.is_following(jane.id, jake.id).await.unwrap());

        for _ in 0..2 {
            let profile = fx.follows.unfollow(jake.id, "jane").await.unwrap();
            assert!(!profile.following);
        }
        assert!(!fx.oracle.is_following(jake.id, jane.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_self_follow_rejected() {
        let fx = fixture(UnfollowPolicy::default());
        let jake = fx.users.create_user("jake", "jake@x.y", None, None).await.unwrap();

        let err = fx.follows.follow(jake.id, "jake").await.unwrap_err();
        assert!(matches!(err, ConduitError::CannotFollowSelf));
        let err = fx.follows.unfollow(jake.id, "jake").await.unwrap_err();
        assert!(matches!(err, ConduitError::CannotUnfollowSelf));

        let err = fx.follows.follow(jake.id, "ghost").await.unwrap_err();
        assert!(matches!(err, ConduitError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn test_favorite_conflicts_and_count() {
        let fx = fixture(UnfollowPolicy::default());
        let counter = FavoriteCounter::new(fx.store.clone());
        let viewer = Uuid::new_v4();
        let article = stored_article(&fx.store, Uuid::new_v4()).await;

        counter.favorite(viewer, &article).await.unwrap();
        assert_eq!(count(&fx.store, &article).await, 1);

        let err = counter.favorite(viewer, &article).await.unwrap_err();
        assert!(matches!(err, ConduitError::AlreadyFavorited));
        assert_eq!(count(&fx.store, &article).await, 1);

        counter.unfavorite(viewer, &article).await.unwrap();
        assert_eq!(count(&fx.store, &article).await, 0);

        let err = counter.unfavorite(viewer, &article).await.unwrap_err();
        assert!(matches!(err, ConduitError::AlreadyUnfavorited));
        assert_eq!(count(&fx.store, &article).await, 0);

        counter.favorite(viewer, &article).await.unwrap();
        assert_eq!(count(&fx.store, &article).await, 1);
        assert!(fx.oracle.is_favorited(article.id, viewer).await.unwrap());
    }

    #[tokio::test]
    async fn test_favorite_missing_article_leaves_no_edge() {
        let fx = fixture(UnfollowPolicy::default());
        let counter = FavoriteCounter::new(fx.store.clone());
        let viewer = Uuid::new_v4();
        let ghost = Article::new(Uuid::new_v4(), NewArticle::default());

        let err = counter.favorite(viewer, &ghost).await.unwrap_err();
        assert!(matches!(err, ConduitError::ArticleNotFound(_)));
        assert!(!fx.oracle.is_favorited(ghost.id, viewer).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_favorites_count_once_each() {
        let fx = fixture(UnfollowPolicy::default());
        let counter = FavoriteCounter::new(fx.store.clone());
        let article = stored_article(&fx.store, Uuid::new_v4()).await;
        let viewer = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let counter = counter.clone();
            let article = article.clone();
            handles.push(tokio::spawn(async move {
                counter.favorite(viewer, &article).await.is_ok()
            }));
        }
        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }

        assert_eq!(wins, 1);
        assert_eq!(count(&fx.store, &article).await, 1);
    }
}
