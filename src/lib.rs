//! # Conduit
//!
//! Article aggregation and feed engine for a social blogging backend, built
//! on a generic key-value store with no joins.
//!
//! ## Architecture
//!
//! Every read rebuilds its view from independent records:
//!
//! ```text
//! index scan → article batch → author batch → follow/favorite bulk checks → view
//! ```
//!
//! Writes that must agree (favorite edge + count, slug + article + indexes)
//! go through one store transaction. Feed fan-out runs in a background
//! worker.
//!
//! ## Quick Start
//!
//! ```bash
//! conduit user add jake jake@example.com
//! conduit --as jake article create --title "How to train your dragon" --tag dragons
//! conduit article list --tag dragons --limit 5
//! conduit --as jane follow jake
//! conduit --as jane feed
//! ```
//!
//! ## Modules
//!
//! - [`app`]: Service wiring and error types
//! - [`articles`]: Article and comment lifecycle
//! - [`cli`]: Command-line interface definitions
//! - [`config`]: TOML configuration
//! - [`domain`]: Stored records and read views
//! - [`feed`]: Home feed materialization
//! - [`listing`]: Paginated listings and page tokens
//! - [`relationship`]: Follow/favorite edges and the favorite counter
//! - [`store`]: Key-value store trait and backends
//! - [`users`]: Users and the batch profile resolver

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires every service over one
/// shared store.
pub mod app;

/// Article creation, edits, deletion, favorites and comments.
pub mod articles;

/// Command-line interface using clap.
pub mod cli;

/// Configuration management.
///
/// Loads from `~/.config/conduit/config.toml`, supporting:
/// - Store backend and batch limit
/// - Pagination bounds and token secret
/// - Feed fan-out concurrency and unfollow policy
pub mod config;

/// Core domain models.
///
/// - [`User`](domain::User), [`Article`](domain::Article), [`Comment`](domain::Comment)
/// - Edge records: [`Follow`](domain::Follow), [`Favorite`](domain::Favorite),
///   [`FeedEntry`](domain::FeedEntry)
/// - [`ArticleAggregateView`](domain::ArticleAggregateView): article joined
///   with author and viewer flags
pub mod domain;

/// Per-viewer home feed kept in sync by a background worker.
pub mod feed;

/// Listing engine over the recency indexes.
///
/// - [`ListingEngine`](listing::ListingEngine): paginated, hydrated listings
/// - [`PageTokenCodec`](listing::PageTokenCodec): opaque, tamper-evident tokens
pub mod listing;

/// Follow and favorite edges.
pub mod relationship;

/// Key-value persistence layer.
///
/// - [`KvStore`](store::KvStore): Async trait defining storage operations
/// - [`MemoryStore`](store::MemoryStore): ordered in-process maps
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;

/// User records, profiles and batch resolution.
pub mod users;
