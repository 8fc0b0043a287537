//! Paginated article listings.
//!
//! Every listing reads one recency index newest first, hydrates the page
//! in bulk and hands back an opaque token for the next page.

pub mod cursor;
pub mod dimension;
pub mod hydrate;

pub use cursor::PageTokenCodec;
pub use dimension::{ListingDimension, PageLimit};
pub use hydrate::Hydrator;

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::app::Result;
use crate::config::{PaginationConfig, UnfollowPolicy};
use crate::domain::MultipleArticlesView;
use crate::store::{keys, KvStore, RangeQuery, Table};
use crate::users::UserService;

#[derive(Clone)]
pub struct ListingEngine {
    store: Arc<dyn KvStore>,
    users: UserService,
    hydrator: Hydrator,
    codec: PageTokenCodec,
    pagination: PaginationConfig,
    unfollow_policy: UnfollowPolicy,
}

impl ListingEngine {
    pub fn new(
        store: Arc<dyn KvStore>,
        users: UserService,
        hydrator: Hydrator,
        pagination: PaginationConfig,
        unfollow_policy: UnfollowPolicy,
    ) -> Self {
        Self {
            store,
            users,
            hydrator,
            codec: PageTokenCodec::new(pagination.token_secret.clone()),
            pagination,
            unfollow_policy,
        }
    }

    /// Lists articles newest first, ties broken by id, resuming after
    /// `page_token` when given. A filter that matches nothing (unknown
    /// author, unused tag) is an empty page, not an error.
    pub async fn list(
        &self,
        dimension: &ListingDimension,
        viewer: Option<Uuid>,
        limit: Option<i64>,
        page_token: Option<&str>,
    ) -> Result<MultipleArticlesView> {
        let limit = PageLimit::resolve(limit, &self.pagination)?.get();
        let mut after = match page_token {
            Some(token) => Some(self.codec.decode(token)?.encode()),
            None => None,
        };

        let Some((table, partition)) = self.source(dimension).await? else {
            return Ok(MultipleArticlesView::empty());
        };
        let viewer = match dimension {
            ListingDimension::FollowFeed(owner) => Some(*owner),
            _ => viewer,
        };
        let hide_unfollowed = matches!(dimension, ListingDimension::FollowFeed(_))
            && self.unfollow_policy == UnfollowPolicy::FilterOnRead;

        let mut views = Vec::with_capacity(limit);
        let mut chunk = limit;
        let more = loop {
            let query = RangeQuery::new(table, partition.clone(), chunk)
                .descending()
                .start_after(after.clone());
            let page = self.store.query_range(&query).await?;
            if let Some(last) = page.records.last() {
                after = Some(last.key.sort.clone());
            }

            let articles = self.hydrator.load_articles(&page.records).await?;
            let mut batch = self.hydrator.hydrate(viewer, articles).await?;
            if hide_unfollowed {
                batch.retain(|view| view.following);
            }
            views.extend(batch);

            if views.len() > limit {
                views.truncate(limit);
                break true;
            }
            if views.len() == limit || !page.has_more {
                break page.has_more;
            }
            // Skipped entries left the page short; refill in wider scans.
            chunk = limit.max(self.pagination.max_limit);
        };

        // Index sort keys are article sort keys, so the last returned view is
        // the resume position even when the scan read past it.
        let next_page_token = match views.last() {
            Some(last) if more && views.len() == limit => {
                Some(self.codec.encode(&last.article.sort_key())?)
            }
            _ => None,
        };

        debug!(
            "Listed {} articles for {:?} (more: {})",
            views.len(),
            dimension,
            next_page_token.is_some()
        );
        Ok(MultipleArticlesView::new(views, next_page_token))
    }

    pub async fn fetch_user_feed(
        &self,
        viewer: Uuid,
        limit: Option<i64>,
        page_token: Option<&str>,
    ) -> Result<MultipleArticlesView> {
        self.list(
            &ListingDimension::FollowFeed(viewer),
            Some(viewer),
            limit,
            page_token,
        )
        .await
    }

    /// Index table and partition backing a dimension, or `None` when the
    /// named user does not exist.
    async fn source(&self, dimension: &ListingDimension) -> Result<Option<(Table, String)>> {
        Ok(match dimension {
            ListingDimension::Global => Some((Table::Timeline, keys::ALL.to_string())),
            ListingDimension::ByAuthor(username) => self
                .users
                .find_by_username(username)
                .await?
                .map(|user| (Table::ArticlesByAuthor, user.id.to_string())),
            ListingDimension::ByFavoritedBy(username) => self
                .users
                .find_by_username(username)
                .await?
                .map(|user| (Table::FavoritesByUser, user.id.to_string())),
            ListingDimension::ByTag(tag) => Some((Table::ArticlesByTag, tag.clone())),
            ListingDimension::FollowFeed(viewer) => Some((Table::Feed, viewer.to_string())),
        })
    }
}
