use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Directed follow relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Follow {
    pub follower_id: Uuid,
    pub followee_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub user_id: Uuid,
    pub article_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Body of every article index entry (timeline, by author, by tag, by
/// favoriting user). Only points at the article; the article record stays
/// the single owner of mutable fields like the favorite count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePointer {
    pub article_id: Uuid,
    pub author_id: Uuid,
}

/// Materialized pointer in a viewer's home feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub viewer_id: Uuid,
    pub article_id: Uuid,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}
