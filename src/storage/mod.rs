//! Persisted store: sources registry, posts, tags, and the media catalog.
//!
//! The [`Database`] handle is consumed as an opaque connection to a SQLite
//! store. Schema bootstrap is idempotent and runs at open. Post links are
//! deduplicated by a pre-insert existence check ([`Database::post_is_new`]),
//! not a uniqueness constraint.

mod media;
mod posts;
mod schema;
mod sources;
mod types;

pub use schema::Database;
pub use types::{
    utc_now_string, Dialect, KeyGen, MediaTitle, Post, PostKey, PostRow, Source, StoreError,
};
