//! Key layout for every logical table.

use uuid::Uuid;

use super::{Key, Table};
use crate::domain::SortKey;

/// Partition shared by store-wide indexes (global timeline, tag catalogue).
pub const ALL: &str = "all";

pub fn user(id: Uuid) -> Key {
    Key::single(Table::Users, id.to_string())
}

pub fn username(name: &str) -> Key {
    Key::single(Table::Usernames, name)
}

/// `email` must already be normalized with `User::email_key`.
pub fn email(email: &str) -> Key {
    Key::single(Table::Emails, email)
}

pub fn article(id: Uuid) -> Key {
    Key::single(Table::Articles, id.to_string())
}

pub fn slug(slug: &str) -> Key {
    Key::single(Table::Slugs, slug)
}

pub fn timeline(sort: &SortKey) -> Key {
    Key::new(Table::Timeline, ALL, sort.encode())
}

pub fn by_author(author: Uuid, sort: &SortKey) -> Key {
    Key::new(Table::ArticlesByAuthor, author.to_string(), sort.encode())
}

pub fn by_tag(tag: &str, sort: &SortKey) -> Key {
    Key::new(Table::ArticlesByTag, tag, sort.encode())
}

pub fn tag(tag: &str) -> Key {
    Key::new(Table::Tags, ALL, tag)
}

pub fn comment(id: Uuid) -> Key {
    Key::single(Table::Comments, id.to_string())
}

pub fn article_comment(article: Uuid, sort: &SortKey) -> Key {
    Key::new(Table::CommentsByArticle, article.to_string(), sort.encode())
}

pub fn follow(follower: Uuid, followee: Uuid) -> Key {
    Key::new(Table::Follows, follower.to_string(), followee.to_string())
}

pub fn follower(followee: Uuid, follower: Uuid) -> Key {
    Key::new(Table::Followers, followee.to_string(), follower.to_string())
}

/// Favorite edges are partitioned by article so a deleted article's edges
/// can be scanned and removed.
pub fn favorite(article: Uuid, user: Uuid) -> Key {
    Key::new(Table::Favorites, article.to_string(), user.to_string())
}

/// Keyed by the favorited article's sort key, so a user's favorites list
/// in article recency order.
pub fn favorite_by_user(user: Uuid, article: &SortKey) -> Key {
    Key::new(Table::FavoritesByUser, user.to_string(), article.encode())
}

pub fn feed(viewer: Uuid, article: &SortKey) -> Key {
    Key::new(Table::Feed, viewer.to_string(), article.encode())
}
