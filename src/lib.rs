//! Feed aggregation daemon.
//!
//! Periodically aggregates episodic content from many independently-formatted
//! feeds, normalizes heterogeneous documents into uniform post records,
//! deduplicates against persisted history, tags posts via best-effort
//! matching against a curated media catalog, persists results, and signals
//! a downstream search index to refresh.
//!
//! # Architecture
//!
//! One [`round`](crate::round) runs per timer tick:
//!
//! 1. [`storage`] reads the active source registry.
//! 2. [`feed`] fans out one bounded-timeout fetch+parse task per source and
//!    fans results back in.
//! 3. [`matcher`] fans out one catalog-matching task per not-yet-persisted
//!    post and merges media associations back by round key.
//! 4. The round's persistence writer stores sources, posts, tags, and media
//!    links sequentially, insert-or-skip by link.
//! 5. [`index`] signals the downstream index to refresh.

pub mod config;
pub mod feed;
pub mod index;
pub mod matcher;
pub mod round;
pub mod storage;
