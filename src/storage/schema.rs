use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use super::types::StoreError;

// ============================================================================
// Database
// ============================================================================

/// Opaque handle to the persisted store.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and bootstrap the schema
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let url = format!("sqlite:{}?mode=rwc", path);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;
        let db = Self { pool };
        db.bootstrap().await?;
        Ok(db)
    }

    /// Create tables if they don't exist.
    ///
    /// All statements use `IF NOT EXISTS`, so re-running against an existing
    /// database is a no-op. Post links are deliberately NOT declared UNIQUE:
    /// deduplication is enforced by a pre-insert existence check so that a
    /// failed check degrades to a skipped insert, never a constraint error.
    async fn bootstrap(&self) -> Result<(), StoreError> {
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                id INTEGER PRIMARY KEY,
                feed_name TEXT NOT NULL DEFAULT '',
                feed_url TEXT UNIQUE NOT NULL,
                dialect TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                alt_name TEXT,
                created TEXT,
                modified TEXT,
                last_checked TEXT,
                days_since_last_post INTEGER NOT NULL DEFAULT 0
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY,
                source_id INTEGER NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                pub_date TEXT NOT NULL,
                link TEXT NOT NULL,
                description TEXT,
                content TEXT
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY,
                tag TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS post_tags (
                post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS media (
                id INTEGER PRIMARY KEY,
                auto_index INTEGER NOT NULL DEFAULT 0
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS media_titles (
                media_id INTEGER NOT NULL REFERENCES media(id) ON DELETE CASCADE,
                title TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS post_media (
                post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                media_id INTEGER NOT NULL REFERENCES media(id) ON DELETE CASCADE
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        // Dedup checks and per-source stat queries hit these constantly
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_link ON posts(link)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_posts_source_date ON posts(source_id, pub_date DESC)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tags_tag ON tags(tag)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
