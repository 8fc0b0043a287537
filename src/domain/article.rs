use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{now_millis, truncate_millis, SortKey};

/// Name of the denormalized counter inside a stored article body.
pub const FAVORITES_COUNT_FIELD: &str = "favoritesCount";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: Uuid,
    pub slug: String,
    pub author_id: Uuid,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub favorites_count: i64,
}

#[derive(Debug, Clone, Default)]
pub struct NewArticle {
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ArticleUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
}

impl Article {
    pub fn new(author_id: Uuid, new: NewArticle) -> Self {
        Self::created_at(author_id, new, now_millis())
    }

    pub fn created_at(author_id: Uuid, new: NewArticle, at: DateTime<Utc>) -> Self {
        let id = Uuid::new_v4();
        let now = truncate_millis(at);
        Self {
            id,
            slug: Self::slug_for(&new.title, id),
            author_id,
            title: new.title,
            description: new.description,
            body: new.body,
            tag_list: Self::normalize_tags(new.tag_list),
            created_at: now,
            updated_at: now,
            favorites_count: 0,
        }
    }

    pub fn sort_key(&self) -> SortKey {
        SortKey::new(self.created_at, self.id)
    }

    /// Human readable slug with a short id suffix so equal titles map to
    /// distinct slugs.
    pub fn slug_for(title: &str, id: Uuid) -> String {
        let simple = id.simple().to_string();
        Self::join_slug(title, &simple[..8])
    }

    /// Used when the short form is already taken.
    pub fn fallback_slug_for(title: &str, id: Uuid) -> String {
        Self::join_slug(title, &id.simple().to_string())
    }

    fn join_slug(title: &str, suffix: &str) -> String {
        let base = slug::slugify(title);
        if base.is_empty() {
            suffix.to_string()
        } else {
            format!("{}-{}", base, suffix)
        }
    }

    /// Trims, drops empties and duplicates, keeps first-submitted order.
    fn normalize_tags(tags: Vec<String>) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(tags.len());
        for tag in tags {
            let tag = tag.trim();
            if !tag.is_empty() && !out.iter().any(|t| t == tag) {
                out.push(tag.to_string());
            }
        }
        out
    }
}
