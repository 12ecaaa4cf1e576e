use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Storage-layer errors with user-friendly messages
#[derive(Debug, Error)]
pub enum StoreError {
    /// Generic database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A sources row carries a dialect tag we don't recognize
    #[error("Unknown feed dialect tag: {0}")]
    UnknownDialect(String),
}

// ============================================================================
// Dialect
// ============================================================================

/// Feed document schema family, resolved once per source.
///
/// Governs which document shape the parser expects and which
/// normalization rules apply (date formats, title-length filter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// RSS-style channel/item documents
    Syndication,
    /// Atom-style video-platform feed/entry documents
    VideoPlatform,
}

impl Dialect {
    /// Stable textual tag persisted in the sources table
    pub fn as_tag(&self) -> &'static str {
        match self {
            Dialect::Syndication => "syndication",
            Dialect::VideoPlatform => "video",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, StoreError> {
        match tag {
            "syndication" => Ok(Dialect::Syndication),
            "video" => Ok(Dialect::VideoPlatform),
            other => Err(StoreError::UnknownDialect(other.to_string())),
        }
    }
}

// ============================================================================
// Round Correlation Keys
// ============================================================================

/// Opaque identifier correlating a transient post across pipeline stages.
///
/// Assigned when the post record is created during parsing and used as the
/// join key when match results are merged back, so nothing relies on array
/// positions staying aligned between the fetch and matching stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostKey(u64);

/// Round-scoped key generator.
///
/// Owned by the round's execution context and passed to spawned fetch tasks,
/// so keys never leak across rounds.
#[derive(Debug, Default)]
pub struct KeyGen(AtomicU64);

impl KeyGen {
    pub fn next_key(&self) -> PostKey {
        PostKey(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A feed source as read from the registry at round start.
///
/// Owned by the store across rounds; `posts` is populated transiently by the
/// parser during a round and never read back from the database.
#[derive(Debug, Clone)]
pub struct Source {
    pub id: i64,
    pub feed_name: String,
    pub feed_url: String,
    pub dialect: Dialect,
    pub active: bool,
    pub alt_name: Option<String>,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub last_checked: Option<String>,
    pub days_since_last_post: i64,
    /// Posts produced this round, in document order
    pub posts: Vec<Post>,
}

/// A normalized post, created fresh each round from a parsed document.
///
/// Becomes persisted only if its link (the dedup key) is not already present.
#[derive(Debug, Clone)]
pub struct Post {
    pub key: PostKey,
    pub title: String,
    /// Always UTC in `YYYY-MM-DD HH:MM:SS` form
    pub pub_date: String,
    pub link: String,
    pub description: String,
    pub content: String,
    pub categories: Vec<String>,
    /// Media catalog ids associated by the matching stage
    pub media_ids: Vec<i64>,
}

/// One catalog entry used as a match pattern. Read-only within a round.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MediaTitle {
    pub media_id: i64,
    pub title: String,
}

/// A post row as persisted, used by tests and downstream readers
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub id: i64,
    pub source_id: i64,
    pub title: String,
    pub pub_date: String,
    pub link: String,
    pub description: Option<String>,
    pub content: Option<String>,
}

// ============================================================================
// Time helpers
// ============================================================================

/// Current time as the store's canonical UTC timestamp string
pub fn utc_now_string() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
