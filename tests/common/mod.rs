#![allow(dead_code)]

use std::time::Duration;

use chrono::{DateTime, Utc};

use conduit::app::AppContext;
use conduit::config::{Config, UnfollowPolicy};
use conduit::domain::{ArticleAggregateView, NewArticle, SortKey, User};

pub fn context() -> AppContext {
    AppContext::in_memory()
}

pub fn context_with_policy(policy: UnfollowPolicy) -> AppContext {
    let mut config = Config::default();
    config.feed.unfollow_policy = policy;
    AppContext::in_memory_with_config(&config)
}

pub async fn user(ctx: &AppContext, name: &str) -> User {
    ctx.users
        .create_user(name, &format!("{}@conduit.test", name), None, None)
        .await
        .unwrap()
}

/// Publishes an article and waits a tick so the next one gets a later
/// timestamp.
pub async fn publish(
    ctx: &AppContext,
    author: &User,
    title: &str,
    tags: &[&str],
) -> ArticleAggregateView {
    let view = ctx
        .articles
        .create_article(
            author.id,
            NewArticle {
                title: title.to_string(),
                description: format!("about {}", title),
                body: "body".to_string(),
                tag_list: tags.iter().map(|t| t.to_string()).collect(),
            },
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    view
}

/// Publishes an article with a fixed creation time.
pub async fn publish_at(
    ctx: &AppContext,
    author: &User,
    title: &str,
    created_at: DateTime<Utc>,
) -> ArticleAggregateView {
    ctx.articles
        .create_article_at(
            author.id,
            NewArticle {
                title: title.to_string(),
                description: format!("about {}", title),
                body: "body".to_string(),
                tag_list: Vec::new(),
            },
            created_at,
        )
        .await
        .unwrap()
}

pub fn slugs(views: &[ArticleAggregateView]) -> Vec<&str> {
    views.iter().map(|v| v.slug()).collect()
}

pub fn assert_newest_first(views: &[ArticleAggregateView]) {
    let keys: Vec<SortKey> = views.iter().map(|v| v.article.sort_key()).collect();
    for pair in keys.windows(2) {
        assert!(pair[0] > pair[1], "out of order: {:?}", pair);
    }
}
