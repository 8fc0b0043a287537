use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::app::Result;
use crate::domain::{Favorite, Follow};
use crate::store::{batch_get_chunked, keys, KvStore};

/// Authors a viewer follows, out of the set that was asked about. Anything
/// not in the set is "not following".
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FollowSet(HashSet<Uuid>);

impl FollowSet {
    pub fn contains(&self, author: &Uuid) -> bool {
        self.0.contains(author)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Articles a viewer has favorited, out of the set that was asked about.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FavoriteSet(HashSet<Uuid>);

impl FavoriteSet {
    pub fn contains(&self, article: &Uuid) -> bool {
        self.0.contains(article)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Answers follow and favorite membership questions against the edge
/// tables. Bulk variants issue one batch lookup per store batch limit.
#[derive(Clone)]
pub struct RelationshipOracle {
    store: Arc<dyn KvStore>,
}

impl RelationshipOracle {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn is_following(&self, viewer: Uuid, author: Uuid) -> Result<bool> {
        Ok(self.store.get(&keys::follow(viewer, author)).await?.is_some())
    }

    pub async fn is_following_bulk(&self, viewer: Uuid, authors: &[Uuid]) -> Result<FollowSet> {
        let keys: Vec<_> = distinct(authors)
            .map(|author| keys::follow(viewer, author))
            .collect();
        if keys.is_empty() {
            return Ok(FollowSet::default());
        }

        let mut followed = HashSet::new();
        for record in batch_get_chunked(self.store.as_ref(), &keys).await? {
            let edge: Follow = record.decode()?;
            followed.insert(edge.followee_id);
        }
        Ok(FollowSet(followed))
    }

    pub async fn is_favorited(&self, article: Uuid, viewer: Uuid) -> Result<bool> {
        Ok(self.store.get(&keys::favorite(article, viewer)).await?.is_some())
    }

    pub async fn is_favorited_bulk(&self, viewer: Uuid, articles: &[Uuid]) -> Result<FavoriteSet> {
        let keys: Vec<_> = distinct(articles)
            .map(|article| keys::favorite(article, viewer))
            .collect();
        if keys.is_empty() {
            return Ok(FavoriteSet::default());
        }

        let mut favorited = HashSet::new();
        for record in batch_get_chunked(self.store.as_ref(), &keys).await? {
            let edge: Favorite = record.decode()?;
            favorited.insert(edge.article_id);
        }
        Ok(FavoriteSet(favorited))
    }
}

fn distinct(ids: &[Uuid]) -> impl Iterator<Item = Uuid> {
    ids.iter().copied().collect::<HashSet<_>>().into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::now_millis;
    use crate::store::{MemoryStore, Record};

    async fn follow(store: &MemoryStore, follower: Uuid, followee: Uuid) {
        let edge = Follow {
            follower_id: follower,
            followee_id: followee,
            created_at: now_millis(),
        };
        store
            .put(Record::encode(keys::follow(follower, followee), &edge).unwrap(), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_bulk_matches_single_lookups() {
        let store = Arc::new(MemoryStore::with_batch_size(2));
        let viewer = Uuid::new_v4();
        let authors: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        follow(&store, viewer, authors[1]).await;
        follow(&store, viewer, authors[4]).await;
        // Someone else's edge must not leak into the viewer's answer.
        follow(&store, Uuid::new_v4(), authors[0]).await;

        let oracle = RelationshipOracle::new(store);
        let bulk = oracle.is_following_bulk(viewer, &authors).await.unwrap();
        assert_eq!(bulk.len(), 2);
        for author in &authors {
            assert_eq!(
                bulk.contains(author),
                oracle.is_following(viewer, *author).await.unwrap()
            );
        }
    }

    #[tokio::test]
    async fn test_empty_input_is_empty_result() {
        let oracle = RelationshipOracle::new(Arc::new(MemoryStore::new()));
        let viewer = Uuid::new_v4();
        assert!(oracle.is_following_bulk(viewer, &[]).await.unwrap().is_empty());
        assert!(oracle.is_favorited_bulk(viewer, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_favorite_membership() {
        let store = Arc::new(MemoryStore::new());
        let viewer = Uuid::new_v4();
        let liked = Uuid::new_v4();
        let other = Uuid::new_v4();
        let edge = Favorite {
            user_id: viewer,
            article_id: liked,
            created_at: now_millis(),
        };
        store
            .put(Record::encode(keys::favorite(liked, viewer), &edge).unwrap(), None)
            .await
            .unwrap();

        let oracle = RelationshipOracle::new(store);
        assert!(oracle.is_favorited(liked, viewer).await.unwrap());
        assert!(!oracle.is_favorited(other, viewer).await.unwrap());
        assert!(!oracle.is_favorited(liked, Uuid::new_v4()).await.unwrap());

        let set = oracle.is_favorited_bulk(viewer, &[liked, other, liked]).await.unwrap();
        assert!(set.contains(&liked));
        assert!(!set.contains(&other));
    }
}
