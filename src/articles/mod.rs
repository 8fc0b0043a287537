//! Article lifecycle: creation with all index pointers, edits, deletion,
//! favorites and the tag catalogue.

pub mod comments;

pub use comments::CommentService;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::app::{ConduitError, Result};
use crate::domain::{
    now_millis, Article, ArticleAggregateView, ArticlePointer, ArticleUpdate, NewArticle,
};
use crate::feed::{ArticleRef, FeedHandle};
use crate::listing::Hydrator;
use crate::relationship::FavoriteCounter;
use crate::store::{collect_partition, keys, Condition, KvStore, Record, StoreError, Table, WriteOp};
use crate::users::UserService;

const TAG_PAGE: usize = 100;

#[derive(Clone)]
pub struct ArticleService {
    store: Arc<dyn KvStore>,
    users: UserService,
    hydrator: Hydrator,
    counter: FavoriteCounter,
    feed: FeedHandle,
}

impl ArticleService {
    pub fn new(
        store: Arc<dyn KvStore>,
        users: UserService,
        hydrator: Hydrator,
        counter: FavoriteCounter,
        feed: FeedHandle,
    ) -> Self {
        Self {
            store,
            users,
            hydrator,
            counter,
            feed,
        }
    }

    /// Writes the article, its slug reservation and every index pointer in
    /// one transaction, then queues the feed fan-out.
    pub async fn create_article(
        &self,
        author_id: Uuid,
        new: NewArticle,
    ) -> Result<ArticleAggregateView> {
        self.create_article_at(author_id, new, now_millis()).await
    }

    /// Like `create_article`, with the creation time supplied by the caller
    /// (imports, replays). Sub-millisecond precision is dropped.
    pub async fn create_article_at(
        &self,
        author_id: Uuid,
        new: NewArticle,
        created_at: DateTime<Utc>,
    ) -> Result<ArticleAggregateView> {
        if new.title.trim().is_empty() {
            return Err(ConduitError::InvalidInput("title can't be blank".into()));
        }
        let author = self.users.get_by_id(author_id).await?;
        let mut article = Article::created_at(author_id, new, created_at);

        match self.store.transact(self.create_ops(&article)?).await {
            Ok(()) => {}
            Err(StoreError::TransactionCanceled { index: 0 }) => {
                debug!("Slug {} taken, using long form", article.slug);
                article.slug = Article::fallback_slug_for(&article.title, article.id);
                self.store.transact(self.create_ops(&article)?).await?;
            }
            Err(e) => return Err(e.into()),
        }

        info!("Created article {} by {}", article.slug, author.username);
        self.feed.article_published(ArticleRef::from(&article)).await;

        Ok(ArticleAggregateView {
            article,
            author,
            favorited: false,
            following: false,
        })
    }

    pub async fn get_article(
        &self,
        slug: &str,
        viewer: Option<Uuid>,
    ) -> Result<ArticleAggregateView> {
        let article = self.find_by_slug(slug).await?;
        self.view(viewer, article, slug).await
    }

    /// Author only. A title change moves the article to a new slug.
    pub async fn update_article(
        &self,
        user: Uuid,
        slug: &str,
        update: ArticleUpdate,
    ) -> Result<ArticleAggregateView> {
        let mut article = self.find_by_slug(slug).await?;
        if article.author_id != user {
            return Err(ConduitError::Forbidden("only the author can edit an article".into()));
        }

        if let Some(description) = update.description {
            article.description = description;
        }
        if let Some(body) = update.body {
            article.body = body;
        }
        let old_slug = article.slug.clone();
        if let Some(title) = update.title.filter(|t| !t.trim().is_empty()) {
            article.slug = Article::slug_for(&title, article.id);
            article.title = title;
        }
        article.updated_at = now_millis();

        match self.store.transact(self.update_ops(&article, &old_slug)?).await {
            Ok(()) => {}
            Err(StoreError::TransactionCanceled { index: 0 }) if article.slug != old_slug => {
                article.slug = Article::fallback_slug_for(&article.title, article.id);
                self.store
                    .transact(self.update_ops(&article, &old_slug)?)
                    .await
                    .map_err(|e| not_found_if_canceled(e, slug))?;
            }
            Err(e) => return Err(not_found_if_canceled(e, slug)),
        }

        let article = self.reload(&article).await?;
        let new_slug = article.slug.clone();
        self.view(Some(user), article, &new_slug).await
    }

    /// Author only. The article and its index pointers go now; comments,
    /// favorite edges and feed entries are removed in the background.
    pub async fn delete_article(&self, user: Uuid, slug: &str) -> Result<()> {
        let article = self.find_by_slug(slug).await?;
        if article.author_id != user {
            return Err(ConduitError::Forbidden("only the author can delete an article".into()));
        }

        let sort_key = article.sort_key();
        let mut ops = vec![
            WriteOp::delete_if(keys::article(article.id), Condition::Exists),
            WriteOp::delete(keys::slug(&article.slug)),
            WriteOp::delete(keys::timeline(&sort_key)),
            WriteOp::delete(keys::by_author(article.author_id, &sort_key)),
        ];
        for tag in &article.tag_list {
            ops.push(WriteOp::delete(keys::by_tag(tag, &sort_key)));
        }
        self.store
            .transact(ops)
            .await
            .map_err(|e| not_found_if_canceled(e, slug))?;

        info!("Deleted article {}", article.slug);
        self.feed.article_deleted(ArticleRef::from(&article)).await;
        Ok(())
    }

    pub async fn favorite_article(&self, viewer: Uuid, slug: &str) -> Result<ArticleAggregateView> {
        let article = self.find_by_slug(slug).await?;
        self.counter.favorite(viewer, &article).await?;
        let article = self.reload(&article).await?;
        self.view(Some(viewer), article, slug).await
    }

    pub async fn unfavorite_article(
        &self,
        viewer: Uuid,
        slug: &str,
    ) -> Result<ArticleAggregateView> {
        let article = self.find_by_slug(slug).await?;
        self.counter.unfavorite(viewer, &article).await?;
        let article = self.reload(&article).await?;
        self.view(Some(viewer), article, slug).await
    }

    /// Every tag ever used, sorted.
    pub async fn list_tags(&self) -> Result<Vec<String>> {
        let records =
            collect_partition(self.store.as_ref(), Table::Tags, keys::ALL, TAG_PAGE).await?;
        Ok(records.into_iter().map(|r| r.key.sort).collect())
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Article> {
        let not_found = || ConduitError::ArticleNotFound(slug.to_string());
        let pointer: ArticlePointer = self
            .store
            .get(&keys::slug(slug))
            .await?
            .ok_or_else(not_found)?
            .decode()?;
        let article: Article = self
            .store
            .get(&keys::article(pointer.article_id))
            .await?
            .ok_or_else(not_found)?
            .decode()?;
        Ok(article)
    }

    async fn reload(&self, article: &Article) -> Result<Article> {
        self.store
            .get(&keys::article(article.id))
            .await?
            .ok_or_else(|| ConduitError::ArticleNotFound(article.slug.clone()))?
            .decode()
            .map_err(Into::into)
    }

    async fn view(
        &self,
        viewer: Option<Uuid>,
        article: Article,
        slug: &str,
    ) -> Result<ArticleAggregateView> {
        self.hydrator
            .hydrate(viewer, vec![article])
            .await?
            .pop()
            .ok_or_else(|| ConduitError::ArticleNotFound(slug.to_string()))
    }

    fn create_ops(&self, article: &Article) -> Result<Vec<WriteOp>> {
        let sort_key = article.sort_key();
        let pointer = ArticlePointer {
            article_id: article.id,
            author_id: article.author_id,
        };

        let mut ops = vec![
            WriteOp::put_if(
                Record::encode(keys::slug(&article.slug), &pointer)?,
                Condition::NotExists,
            ),
            WriteOp::put_if(
                Record::encode(keys::article(article.id), article)?,
                Condition::NotExists,
            ),
            WriteOp::put(Record::encode(keys::timeline(&sort_key), &pointer)?),
            WriteOp::put(Record::encode(
                keys::by_author(article.author_id, &sort_key),
                &pointer,
            )?),
        ];
        for tag in &article.tag_list {
            ops.push(WriteOp::put(Record::encode(keys::by_tag(tag, &sort_key), &pointer)?));
            ops.push(WriteOp::put(Record::encode(
                keys::tag(tag),
                &json!({ "tag": tag }),
            )?));
        }
        Ok(ops)
    }

    /// The slug reservation, when it moves, is always op 0.
    fn update_ops(&self, article: &Article, old_slug: &str) -> Result<Vec<WriteOp>> {
        let mut ops = Vec::new();
        if article.slug != old_slug {
            let pointer = ArticlePointer {
                article_id: article.id,
                author_id: article.author_id,
            };
            ops.push(WriteOp::put_if(
                Record::encode(keys::slug(&article.slug), &pointer)?,
                Condition::NotExists,
            ));
            ops.push(WriteOp::delete(keys::slug(old_slug)));
        }
        // Merge only the editable fields so a concurrent favorite is not lost.
        let mut fields = serde_json::Map::new();
        fields.insert("slug".into(), json!(article.slug));
        fields.insert("title".into(), json!(article.title));
        fields.insert("description".into(), json!(article.description));
        fields.insert("body".into(), json!(article.body));
        fields.insert(
            "updatedAt".into(),
            serde_json::to_value(article.updated_at).map_err(StoreError::from)?,
        );
        ops.push(WriteOp::Merge {
            key: keys::article(article.id),
            fields,
        });
        Ok(ops)
    }
}

fn not_found_if_canceled(err: StoreError, slug: &str) -> ConduitError {
    match err {
        StoreError::TransactionCanceled { .. } => ConduitError::ArticleNotFound(slug.to_string()),
        other => other.into(),
    }
}
