use std::collections::HashMap;
use std::sync::Arc;

use futures::try_join;
use uuid::Uuid;

use crate::app::Result;
use crate::domain::{Article, ArticleAggregateView, ArticlePointer};
use crate::relationship::{FavoriteSet, FollowSet, RelationshipOracle};
use crate::store::{batch_get_chunked, keys, KvStore, Record};
use crate::users::UserService;

/// Joins articles with their authors and the viewer's flags using one batch
/// lookup per concern, whatever the page size.
#[derive(Clone)]
pub struct Hydrator {
    store: Arc<dyn KvStore>,
    users: UserService,
    oracle: RelationshipOracle,
}

impl Hydrator {
    pub fn new(store: Arc<dyn KvStore>, users: UserService, oracle: RelationshipOracle) -> Self {
        Self {
            store,
            users,
            oracle,
        }
    }

    /// Loads the articles behind index entries, in entry order. Entries
    /// whose article is gone are dropped.
    pub async fn load_articles(&self, entries: &[Record]) -> Result<Vec<Article>> {
        let mut ids = Vec::with_capacity(entries.len());
        for record in entries {
            let pointer: ArticlePointer = record.decode()?;
            ids.push(pointer.article_id);
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<_> = ids.iter().map(|id| keys::article(*id)).collect();
        let mut by_id = HashMap::with_capacity(ids.len());
        for record in batch_get_chunked(self.store.as_ref(), &keys).await? {
            let article: Article = record.decode()?;
            by_id.insert(article.id, article);
        }

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Builds views in input order. Articles whose author record is missing
    /// are skipped. Without a viewer both flags are false and no
    /// relationship lookups are made.
    pub async fn hydrate(
        &self,
        viewer: Option<Uuid>,
        articles: Vec<Article>,
    ) -> Result<Vec<ArticleAggregateView>> {
        if articles.is_empty() {
            return Ok(Vec::new());
        }

        let author_ids: Vec<Uuid> = articles.iter().map(|a| a.author_id).collect();
        let article_ids: Vec<Uuid> = articles.iter().map(|a| a.id).collect();
        let flags = async {
            match viewer {
                Some(viewer) => try_join!(
                    self.oracle.is_following_bulk(viewer, &author_ids),
                    self.oracle.is_favorited_bulk(viewer, &article_ids),
                ),
                None => Ok((FollowSet::default(), FavoriteSet::default())),
            }
        };
        let (authors, (following, favorited)) =
            try_join!(self.users.resolve(author_ids.iter().copied()), flags)?;

        let views = articles
            .into_iter()
            .filter_map(|article| {
                let author = authors.get(&article.author_id)?.clone();
                Some(ArticleAggregateView {
                    favorited: favorited.contains(&article.id),
                    following: following.contains(&article.author_id),
                    article,
                    author,
                })
            })
            .collect();
        Ok(views)
    }
}
