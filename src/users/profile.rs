use uuid::Uuid;

use super::UserService;
use crate::app::Result;
use crate::domain::ProfileView;
use crate::relationship::RelationshipOracle;

#[derive(Clone)]
pub struct ProfileService {
    users: UserService,
    oracle: RelationshipOracle,
}

impl ProfileService {
    pub fn new(users: UserService, oracle: RelationshipOracle) -> Self {
        Self { users, oracle }
    }

    /// Anonymous viewers always see `following = false`.
    pub async fn get_profile(&self, viewer: Option<Uuid>, username: &str) -> Result<ProfileView> {
        let user = self.users.get_by_username(username).await?;
        let following = match viewer {
            Some(viewer) => self.oracle.is_following(viewer, user.id).await?,
            None => false,
        };
        Ok(ProfileView::new(&user, following))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ConduitError;
    use crate::config::{FeedConfig, UnfollowPolicy};
    use crate::feed::spawn_feed_materializer;
    use crate::relationship::FollowService;
    use crate::store::{KvStore, MemoryStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_profile_following_is_viewer_relative() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let users = UserService::new(store.clone());
        let profiles = ProfileService::new(users.clone(), RelationshipOracle::new(store.clone()));
        let feed = spawn_feed_materializer(store.clone(), &FeedConfig::default());
        let follows = FollowService::new(store, users.clone(), feed, UnfollowPolicy::default());

        let jake = users.create_user("jake", "jake@x.y", None, None).await.unwrap();
        let jane = users.create_user("jane", "jane@x.y", None, None).await.unwrap();
        follows.follow(jake.id, "jane").await.unwrap();

        assert!(profiles.get_profile(Some(jake.id), "jane").await.unwrap().following);
        assert!(!profiles.get_profile(Some(jane.id), "jane").await.unwrap().following);
        assert!(!profiles.get_profile(None, "jane").await.unwrap().following);

        let err = profiles.get_profile(None, "ghost").await.unwrap_err();
        assert!(matches!(err, ConduitError::UserNotFound(_)));
    }
}
