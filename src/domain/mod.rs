pub mod article;
pub mod comment;
pub mod edge;
pub mod sort_key;
pub mod user;
pub mod view;

pub use article::{Article, ArticleUpdate, NewArticle, FAVORITES_COUNT_FIELD};
pub use comment::Comment;
pub use edge::{ArticlePointer, Favorite, FeedEntry, Follow};
pub use sort_key::SortKey;
pub use user::{User, UserUpdate};
pub use view::{ArticleAggregateView, CommentView, MultipleArticlesView, ProfileView};

use chrono::{DateTime, Utc};

/// Current time truncated to millisecond precision, the resolution every
/// stored timestamp and sort key uses.
pub fn now_millis() -> DateTime<Utc> {
    truncate_millis(Utc::now())
}

pub fn truncate_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or(at)
}
