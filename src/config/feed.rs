use serde::Deserialize;

use crate::feed::DEFAULT_WORKERS;

/// What an unfollow does to feed entries already materialized for the
/// unfollowed author.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnfollowPolicy {
    /// Entries stay and remain visible.
    Retain,
    /// Entries stay but the feed listing hides authors no longer followed.
    #[default]
    FilterOnRead,
    /// Entries are deleted in the background.
    Purge,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Concurrent feed-entry writes during one fan-out (default: 10)
    pub fanout_concurrency: usize,

    /// Capacity of the materializer's event queue (default: 1024)
    pub queue_capacity: usize,

    pub unfollow_policy: UnfollowPolicy,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            fanout_concurrency: DEFAULT_WORKERS,
            queue_capacity: 1024,
            unfollow_policy: UnfollowPolicy::default(),
        }
    }
}
