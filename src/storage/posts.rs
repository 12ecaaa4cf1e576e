use super::schema::Database;
use super::types::{Post, PostRow, StoreError};

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Count persisted posts carrying this link (the dedup key)
    pub async fn count_posts_with_link(&self, link: &str) -> Result<i64, StoreError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE link = ?")
            .bind(link)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Decide whether a post is new (not yet persisted).
    ///
    /// A query failure is treated conservatively as "already present" so a
    /// store error can never cause a duplicate insert. Both the matching
    /// stage and the persistence writer call this, keeping the criterion
    /// stable across the round.
    pub async fn post_is_new(&self, link: &str) -> bool {
        match self.count_posts_with_link(link).await {
            Ok(count) => count == 0,
            Err(e) => {
                tracing::warn!(link, error = %e, "Dedup check failed, treating post as already stored");
                false
            }
        }
    }

    /// Insert a post row, returning its id.
    ///
    /// Callers are expected to have applied [`Database::post_is_new`] first;
    /// this method does not check.
    pub async fn insert_post(&self, source_id: i64, post: &Post) -> Result<i64, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO posts (source_id, title, pub_date, link, description, content)
            VALUES (?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(source_id)
        .bind(&post.title)
        .bind(&post.pub_date)
        .bind(&post.link)
        .bind(&post.description)
        .bind(&post.content)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    // ========================================================================
    // Tag Operations
    // ========================================================================

    /// Link a post to its category tags, creating tag rows as needed.
    ///
    /// Tags are normalized to lowercase trimmed text before lookup, so
    /// "Comedy" and " comedy " resolve to the same row. Lookup-or-create is
    /// not guarded against concurrent duplicate creation; rounds run one at
    /// a time. Returns the number of links written.
    pub async fn link_tags(&self, post_id: i64, categories: &[String]) -> Result<usize, StoreError> {
        let mut linked = 0;
        for category in categories {
            let tag = category.trim().to_lowercase();
            if tag.is_empty() {
                continue;
            }

            let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM tags WHERE tag = ?")
                .bind(&tag)
                .fetch_optional(&self.pool)
                .await?;

            let tag_id = match existing {
                Some((id,)) => id,
                None => sqlx::query("INSERT INTO tags (tag) VALUES (?)")
                    .bind(&tag)
                    .execute(&self.pool)
                    .await?
                    .last_insert_rowid(),
            };

            sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES (?, ?)")
                .bind(post_id)
                .bind(tag_id)
                .execute(&self.pool)
                .await?;
            linked += 1;
        }
        Ok(linked)
    }

    // ========================================================================
    // Media Association Operations
    // ========================================================================

    /// Write post-to-media rows for every associated media id.
    ///
    /// Returns the number of links written.
    pub async fn link_media(&self, post_id: i64, media_ids: &[i64]) -> Result<usize, StoreError> {
        for media_id in media_ids {
            sqlx::query("INSERT INTO post_media (post_id, media_id) VALUES (?, ?)")
                .bind(post_id)
                .bind(media_id)
                .execute(&self.pool)
                .await?;
        }
        Ok(media_ids.len())
    }

    // ========================================================================
    // Read-back helpers (tests and downstream readers)
    // ========================================================================

    /// All persisted posts for a source, newest first
    pub async fn posts_for_source(&self, source_id: i64) -> Result<Vec<PostRow>, StoreError> {
        let posts = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, source_id, title, pub_date, link, description, content
            FROM posts
            WHERE source_id = ?
            ORDER BY pub_date DESC, id DESC
        "#,
        )
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    /// Normalized tag texts linked to a post, sorted
    pub async fn tags_for_post(&self, post_id: i64) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT t.tag FROM tags t
            JOIN post_tags pt ON pt.tag_id = t.id
            WHERE pt.post_id = ?
            ORDER BY t.tag
        "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(tag,)| tag).collect())
    }

    /// Media ids associated with a post, sorted
    pub async fn media_ids_for_post(&self, post_id: i64) -> Result<Vec<i64>, StoreError> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT media_id FROM post_media WHERE post_id = ? ORDER BY media_id",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
