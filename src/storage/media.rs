use super::schema::Database;
use super::types::{MediaTitle, StoreError};

impl Database {
    // ========================================================================
    // Media Catalog Operations
    // ========================================================================

    /// Load the catalog snapshot used for matching: every title belonging to
    /// a media row flagged for automatic indexing, ordered by title.
    ///
    /// The ordering is cosmetic; matching checks every item regardless.
    pub async fn media_catalog(&self) -> Result<Vec<MediaTitle>, StoreError> {
        let titles = sqlx::query_as::<_, MediaTitle>(
            r#"
            SELECT mt.media_id, mt.title
            FROM media_titles mt
            JOIN media m ON m.id = mt.media_id
            WHERE m.auto_index = 1
            ORDER BY mt.title ASC
        "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(titles)
    }

    /// Insert a media row, returning its id. Used by seeding/admin tooling.
    pub async fn insert_media(&self, auto_index: bool) -> Result<i64, StoreError> {
        let result = sqlx::query("INSERT INTO media (auto_index) VALUES (?)")
            .bind(auto_index as i64)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Attach a match-pattern title to a media row
    pub async fn add_media_title(&self, media_id: i64, title: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO media_titles (media_id, title) VALUES (?, ?)")
            .bind(media_id)
            .bind(title)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
