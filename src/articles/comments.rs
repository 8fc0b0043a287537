use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::ArticleService;
use crate::app::{ConduitError, Result};
use crate::domain::{Comment, CommentView};
use crate::relationship::{FollowSet, RelationshipOracle};
use crate::store::{collect_partition, keys, Condition, KvStore, Record, StoreError, Table, WriteOp};
use crate::users::UserService;

const COMMENT_PAGE: usize = 100;

#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn KvStore>,
    articles: ArticleService,
    users: UserService,
    oracle: RelationshipOracle,
}

impl CommentService {
    pub fn new(
        store: Arc<dyn KvStore>,
        articles: ArticleService,
        users: UserService,
        oracle: RelationshipOracle,
    ) -> Self {
        Self {
            store,
            articles,
            users,
            oracle,
        }
    }

    pub async fn add_comment(&self, user: Uuid, slug: &str, body: &str) -> Result<CommentView> {
        let body = body.trim();
        if body.is_empty() {
            return Err(ConduitError::InvalidInput("body can't be blank".into()));
        }
        let article = self.articles.find_by_slug(slug).await?;
        let author = self.users.get_by_id(user).await?;

        let comment = Comment::new(article.id, user, body.to_string());
        self.store
            .transact(vec![
                WriteOp::put_if(
                    Record::encode(keys::comment(comment.id), &comment)?,
                    Condition::NotExists,
                ),
                WriteOp::put(Record::encode(
                    keys::article_comment(article.id, &comment.sort_key()),
                    &comment,
                )?),
            ])
            .await?;

        debug!("Comment {} added to {}", comment.id, article.slug);
        Ok(CommentView::new(comment, &author, false))
    }

    /// Oldest first. Comments whose author record is missing are skipped.
    pub async fn get_article_comments(
        &self,
        slug: &str,
        viewer: Option<Uuid>,
    ) -> Result<Vec<CommentView>> {
        let article = self.articles.find_by_slug(slug).await?;
        let records = collect_partition(
            self.store.as_ref(),
            Table::CommentsByArticle,
            &article.id.to_string(),
            COMMENT_PAGE,
        )
        .await?;

        let comments = records
            .iter()
            .map(Record::decode::<Comment>)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let author_ids: Vec<Uuid> = comments.iter().map(|c| c.author_id).collect();
        let authors = self.users.resolve(author_ids.iter().copied()).await?;
        let following = match viewer {
            Some(viewer) => self.oracle.is_following_bulk(viewer, &author_ids).await?,
            None => FollowSet::default(),
        };

        Ok(comments
            .into_iter()
            .filter_map(|comment| {
                let author = authors.get(&comment.author_id)?;
                let follows = following.contains(&comment.author_id);
                Some(CommentView::new(comment, author, follows))
            })
            .collect())
    }

    /// The comment must exist and belong to the article named by `slug`;
    /// only its author or the article's author may delete it.
    pub async fn delete_comment(&self, user: Uuid, slug: &str, comment_id: Uuid) -> Result<()> {
        let article = self.articles.find_by_slug(slug).await?;
        let comment: Comment = self
            .store
            .get(&keys::comment(comment_id))
            .await?
            .ok_or(ConduitError::CommentNotFound(comment_id))?
            .decode()?;

        if comment.article_id != article.id {
            return Err(ConduitError::CommentNotOnArticle(comment_id));
        }
        if user != comment.author_id && user != article.author_id {
            return Err(ConduitError::Forbidden(
                "only the comment or article author can delete a comment".into(),
            ));
        }

        let result = self
            .store
            .transact(vec![
                WriteOp::delete_if(keys::comment(comment_id), Condition::Exists),
                WriteOp::delete(keys::article_comment(article.id, &comment.sort_key())),
            ])
            .await;
        match result {
            Ok(()) => Ok(()),
            Err(StoreError::TransactionCanceled { .. }) => {
                Err(ConduitError::CommentNotFound(comment_id))
            }
            Err(e) => Err(e.into()),
        }
    }
}
