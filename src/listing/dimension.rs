use uuid::Uuid;

use crate::app::{ConduitError, Result};
use crate::config::PaginationConfig;

/// Which ordered index a listing reads. Exactly one filter per listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingDimension {
    Global,
    ByAuthor(String),
    ByFavoritedBy(String),
    ByTag(String),
    /// The home feed of this viewer.
    FollowFeed(Uuid),
}

/// A page size already checked against the configured bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimit(usize);

impl PageLimit {
    /// `None` picks the default. Out-of-range values are rejected, never
    /// clamped.
    pub fn resolve(requested: Option<i64>, config: &PaginationConfig) -> Result<Self> {
        let Some(value) = requested else {
            return Ok(Self(config.default_limit));
        };
        let invalid = || ConduitError::InvalidLimit {
            value,
            min: config.min_limit,
            max: config.max_limit,
        };
        let size = usize::try_from(value).map_err(|_| invalid())?;
        if size < config.min_limit || size > config.max_limit {
            return Err(invalid());
        }
        Ok(Self(size))
    }

    pub fn get(self) -> usize {
        self.0
    }
}
