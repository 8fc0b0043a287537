use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{now_millis, SortKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub article_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(article_id: Uuid, author_id: Uuid, body: String) -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4(),
            article_id,
            author_id,
            body,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn sort_key(&self) -> SortKey {
        SortKey::new(self.created_at, self.id)
    }
}
