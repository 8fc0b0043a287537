mod common;

use common::{context, publish, slugs, user};
use conduit::app::{AppContext, ConduitError, ErrorKind};
use conduit::config::{Config, StoreBackend};
use conduit::domain::{ArticleUpdate, NewArticle, UserUpdate};
use conduit::listing::ListingDimension;
use uuid::Uuid;

#[tokio::test]
async fn test_same_title_gets_distinct_slugs() {
    let ctx = context();
    let jake = user(&ctx, "jake").await;
    let first = publish(&ctx, &jake, "How to train your dragon", &[]).await;
    let second = publish(&ctx, &jake, "How to train your dragon", &[]).await;

    assert_ne!(first.slug(), second.slug());
    let fetched = ctx.articles.get_article(second.slug(), None).await.unwrap();
    assert_eq!(fetched.article.id, second.article.id);
    assert_eq!(fetched.author.username, "jake");
}

#[tokio::test]
async fn test_blank_title_rejected() {
    let ctx = context();
    let jake = user(&ctx, "jake").await;
    let err = ctx
        .articles
        .create_article(jake.id, NewArticle::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}

#[tokio::test]
async fn test_retitle_moves_slug_and_keeps_count() {
    let ctx = context();
    let jake = user(&ctx, "jake").await;
    let jane = user(&ctx, "jane").await;
    let article = publish(&ctx, &jake, "Dragons", &[]).await;
    ctx.articles.favorite_article(jane.id, article.slug()).await.unwrap();

    let updated = ctx
        .articles
        .update_article(
            jake.id,
            article.slug(),
            ArticleUpdate {
                title: Some("Wyverns".into()),
                body: Some("new body".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(updated.slug().starts_with("wyverns-"));
    assert_eq!(updated.article.body, "new body");
    assert_eq!(updated.article.description, article.article.description);
    assert_eq!(updated.favorites_count(), 1);

    let err = ctx.articles.get_article(article.slug(), None).await.unwrap_err();
    assert!(matches!(err, ConduitError::ArticleNotFound(_)));
    assert!(ctx.articles.get_article(updated.slug(), None).await.is_ok());
}

#[tokio::test]
async fn test_only_author_edits_or_deletes() {
    let ctx = context();
    let jake = user(&ctx, "jake").await;
    let jane = user(&ctx, "jane").await;
    let article = publish(&ctx, &jake, "Mine", &[]).await;

    let err = ctx
        .articles
        .update_article(jane.id, article.slug(), ArticleUpdate::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = ctx
        .articles
        .delete_article(jane.id, article.slug())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    ctx.articles.delete_article(jake.id, article.slug()).await.unwrap();
    let err = ctx
        .articles
        .delete_article(jake.id, article.slug())
        .await
        .unwrap_err();
    assert!(matches!(err, ConduitError::ArticleNotFound(_)));
}

#[tokio::test]
async fn test_tags_listed_sorted_and_deduplicated() {
    let ctx = context();
    let jake = user(&ctx, "jake").await;
    publish(&ctx, &jake, "One", &["rust", "dragons"]).await;
    publish(&ctx, &jake, "Two", &["dragons", "async", "rust"]).await;

    assert_eq!(
        ctx.articles.list_tags().await.unwrap(),
        vec!["async", "dragons", "rust"]
    );
}

#[tokio::test]
async fn test_author_rename_keeps_listing() {
    let ctx = context();
    let jake = user(&ctx, "jake").await;
    let article = publish(&ctx, &jake, "Renamed", &[]).await;

    ctx.users
        .update_user(
            jake.id,
            UserUpdate {
                username: Some("jacob".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let page = ctx
        .listing
        .list(&ListingDimension::ByAuthor("jacob".into()), None, None, None)
        .await
        .unwrap();
    assert_eq!(slugs(&page.articles), vec![article.slug()]);
    assert_eq!(page.articles[0].author.username, "jacob");
}

#[tokio::test]
async fn test_comments_listed_oldest_first() {
    let ctx = context();
    let jake = user(&ctx, "jake").await;
    let jane = user(&ctx, "jane").await;
    let article = publish(&ctx, &jake, "Discuss", &[]).await;
    ctx.follows.follow(jane.id, "jake").await.unwrap();

    ctx.comments.add_comment(jake.id, article.slug(), "first").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    ctx.comments.add_comment(jane.id, article.slug(), "second").await.unwrap();

    let comments = ctx
        .comments
        .get_article_comments(article.slug(), Some(jane.id))
        .await
        .unwrap();
    let bodies: Vec<_> = comments.iter().map(|c| c.body.as_str()).collect();
    assert_eq!(bodies, vec!["first", "second"]);
    assert!(comments[0].author.following);
    assert!(!comments[1].author.following);

    let anonymous = ctx
        .comments
        .get_article_comments(article.slug(), None)
        .await
        .unwrap();
    assert!(anonymous.iter().all(|c| !c.author.following));
}

#[tokio::test]
async fn test_comment_deletion_rules() {
    let ctx = context();
    let jake = user(&ctx, "jake").await;
    let jane = user(&ctx, "jane").await;
    let bob = user(&ctx, "bob").await;
    let article = publish(&ctx, &jake, "Article", &[]).await;
    let other = publish(&ctx, &jake, "Other", &[]).await;
    let by_jane = ctx
        .comments
        .add_comment(jane.id, article.slug(), "hello")
        .await
        .unwrap();
    let by_bob = ctx
        .comments
        .add_comment(bob.id, article.slug(), "hi")
        .await
        .unwrap();

    let missing = Uuid::new_v4();
    let err = ctx
        .comments
        .delete_comment(jane.id, article.slug(), missing)
        .await
        .unwrap_err();
    assert!(matches!(err, ConduitError::CommentNotFound(id) if id == missing));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = ctx
        .comments
        .delete_comment(jane.id, other.slug(), by_jane.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ConduitError::CommentNotOnArticle(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = ctx
        .comments
        .delete_comment(bob.id, article.slug(), by_jane.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    // Comment author, then article author.
    ctx.comments
        .delete_comment(jane.id, article.slug(), by_jane.id)
        .await
        .unwrap();
    ctx.comments
        .delete_comment(jake.id, article.slug(), by_bob.id)
        .await
        .unwrap();
    assert!(ctx
        .comments
        .get_article_comments(article.slug(), None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_sqlite_backend_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.store.backend = StoreBackend::Sqlite;
    config.store.path = Some(dir.path().join("conduit.db"));

    let ctx = AppContext::new(&config).unwrap();
    let jake = user(&ctx, "jake").await;
    let jane = user(&ctx, "jane").await;
    ctx.follows.follow(jane.id, "jake").await.unwrap();
    let article = publish(&ctx, &jake, "Persisted", &["sqlite"]).await;
    ctx.articles.favorite_article(jane.id, article.slug()).await.unwrap();
    ctx.shutdown().await;

    let reopened = AppContext::new(&config).unwrap();
    let feed = reopened
        .listing
        .fetch_user_feed(jane.id, None, None)
        .await
        .unwrap();
    assert_eq!(slugs(&feed.articles), vec![article.slug()]);
    assert!(feed.articles[0].favorited);
    assert_eq!(feed.articles[0].favorites_count(), 1);
    assert_eq!(reopened.articles.list_tags().await.unwrap(), vec!["sqlite"]);
}
