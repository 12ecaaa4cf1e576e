use chrono::NaiveDateTime;

use super::schema::Database;
use super::types::{utc_now_string, Dialect, Source, StoreError};

/// Row shape for the sources table
type SourceRow = (
    i64,
    String,
    String,
    String,
    i64,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    i64,
);

impl Database {
    // ========================================================================
    // Source Registry Operations
    // ========================================================================

    /// Read the active set of feed sources for a round.
    ///
    /// Rows carrying an unrecognized dialect tag are skipped with a warning
    /// rather than failing the whole registry read.
    pub async fn active_sources(&self) -> Result<Vec<Source>, StoreError> {
        let rows: Vec<SourceRow> = sqlx::query_as(
            r#"
                SELECT id, feed_name, feed_url, dialect, active, alt_name,
                       created, modified, last_checked, days_since_last_post
                FROM sources
                WHERE active = 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut sources = Vec::with_capacity(rows.len());
        for (
            id,
            feed_name,
            feed_url,
            dialect,
            active,
            alt_name,
            created,
            modified,
            last_checked,
            days_since_last_post,
        ) in rows
        {
            let dialect = match Dialect::from_tag(&dialect) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(source_id = id, url = %feed_url, error = %e, "Skipping source");
                    continue;
                }
            };
            sources.push(Source {
                id,
                feed_name,
                feed_url,
                dialect,
                active: active != 0,
                alt_name,
                created,
                modified,
                last_checked,
                days_since_last_post,
                posts: Vec::new(),
            });
        }

        Ok(sources)
    }

    /// Insert a source into the registry, returning its id.
    ///
    /// Used by seeding/admin tooling; the round itself only reads sources.
    pub async fn insert_source(
        &self,
        feed_url: &str,
        dialect: Dialect,
        alt_name: Option<&str>,
    ) -> Result<i64, StoreError> {
        let now = utc_now_string();
        let result = sqlx::query(
            r#"
            INSERT INTO sources (feed_name, feed_url, dialect, active, alt_name, created, modified)
            VALUES ('', ?, ?, 1, ?, ?, ?)
        "#,
        )
        .bind(feed_url)
        .bind(dialect.as_tag())
        .bind(alt_name)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Update a source's feed name and last-checked timestamp (now, UTC).
    ///
    /// Reports success only if exactly one row was affected.
    pub async fn update_source_checked(
        &self,
        source_id: i64,
        feed_name: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE sources SET feed_name = ?, last_checked = ? WHERE id = ?")
            .bind(feed_name)
            .bind(utc_now_string())
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Recompute the days-since-last-post statistic from the most recently
    /// persisted post's date.
    ///
    /// If no persisted posts exist for the source, or the stored date is
    /// unparseable, the statistic is left unchanged and `Ok(false)` is
    /// returned; this stat is derived, not authoritative.
    pub async fn refresh_days_since_stat(&self, source_id: i64) -> Result<bool, StoreError> {
        let latest: Option<(String,)> = sqlx::query_as(
            "SELECT pub_date FROM posts WHERE source_id = ? ORDER BY pub_date DESC LIMIT 1",
        )
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((latest,)) = latest else {
            tracing::debug!(source_id, "No persisted posts, leaving stat unchanged");
            return Ok(false);
        };

        let latest_date = match NaiveDateTime::parse_from_str(&latest, "%Y-%m-%d %H:%M:%S") {
            Ok(dt) => dt.and_utc(),
            Err(e) => {
                tracing::warn!(source_id, date = %latest, error = %e, "Unparseable stored date");
                return Ok(false);
            }
        };

        let seconds_since = chrono::Utc::now().timestamp() - latest_date.timestamp();
        let days_since = (seconds_since as f64 / 86_400.0).round() as i64;

        sqlx::query("UPDATE sources SET days_since_last_post = ? WHERE id = ?")
            .bind(days_since)
            .bind(source_id)
            .execute(&self.pool)
            .await?;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, Dialect, Post};
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn test_post(link: &str, pub_date: &str) -> Post {
        Post {
            key: Default::default(),
            title: "Test".into(),
            pub_date: pub_date.into(),
            link: link.into(),
            description: String::new(),
            content: String::new(),
            categories: Vec::new(),
            media_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_active_sources_excludes_inactive() {
        let db = test_db().await;
        let id = db
            .insert_source("http://a.example/feed", Dialect::Syndication, None)
            .await
            .unwrap();
        db.insert_source("http://b.example/feed", Dialect::VideoPlatform, None)
            .await
            .unwrap();
        sqlx::query("UPDATE sources SET active = 0 WHERE feed_url = 'http://b.example/feed'")
            .execute(&db.pool)
            .await
            .unwrap();

        let sources = db.active_sources().await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].id, id);
        assert_eq!(sources[0].dialect, Dialect::Syndication);
    }

    #[tokio::test]
    async fn test_active_sources_skips_unknown_dialect() {
        let db = test_db().await;
        db.insert_source("http://a.example/feed", Dialect::Syndication, None)
            .await
            .unwrap();
        sqlx::query("INSERT INTO sources (feed_url, dialect) VALUES ('http://odd.example', 'gopher')")
            .execute(&db.pool)
            .await
            .unwrap();

        let sources = db.active_sources().await.unwrap();
        assert_eq!(sources.len(), 1);
    }

    #[tokio::test]
    async fn test_update_source_checked_affects_one_row() {
        let db = test_db().await;
        let id = db
            .insert_source("http://a.example/feed", Dialect::Syndication, None)
            .await
            .unwrap();

        assert!(db.update_source_checked(id, "A Feed").await.unwrap());
        // Unknown id affects zero rows
        assert!(!db.update_source_checked(id + 99, "A Feed").await.unwrap());

        let sources = db.active_sources().await.unwrap();
        assert_eq!(sources[0].feed_name, "A Feed");
        assert!(sources[0].last_checked.is_some());
    }

    #[tokio::test]
    async fn test_refresh_days_since_stat_no_posts_unchanged() {
        let db = test_db().await;
        let id = db
            .insert_source("http://a.example/feed", Dialect::Syndication, None)
            .await
            .unwrap();

        assert!(!db.refresh_days_since_stat(id).await.unwrap());
        let sources = db.active_sources().await.unwrap();
        assert_eq!(sources[0].days_since_last_post, 0);
    }

    #[tokio::test]
    async fn test_refresh_days_since_stat_from_latest_post() {
        let db = test_db().await;
        let id = db
            .insert_source("http://a.example/feed", Dialect::Syndication, None)
            .await
            .unwrap();
        db.insert_post(id, &test_post("http://a.example/1", "2006-01-02 15:04:05"))
            .await
            .unwrap();

        assert!(db.refresh_days_since_stat(id).await.unwrap());
        let sources = db.active_sources().await.unwrap();
        // The 2006 fixture is thousands of days in the past
        assert!(sources[0].days_since_last_post > 5000);
    }

    #[tokio::test]
    async fn test_refresh_days_since_stat_unparseable_date() {
        let db = test_db().await;
        let id = db
            .insert_source("http://a.example/feed", Dialect::Syndication, None)
            .await
            .unwrap();
        db.insert_post(id, &test_post("http://a.example/1", "not a date"))
            .await
            .unwrap();

        assert!(!db.refresh_days_since_stat(id).await.unwrap());
    }
}
