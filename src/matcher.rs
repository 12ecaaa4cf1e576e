//! Media catalog matching: best-effort tagging of new posts against the
//! curated media catalog.
//!
//! Runs as the round's second fan-out/fan-in stage, one task per
//! not-yet-persisted post. Matching itself is a pure function of the catalog
//! snapshot and the post's text, so results are independent of task
//! scheduling order.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::feed::SourceFetch;
use crate::storage::{Database, MediaTitle, Post, PostKey};

/// Matches found for one post, keyed by media id.
///
/// The map is idempotent by construction: a catalog title hitting several
/// searchable strings still records one entry.
#[derive(Debug)]
struct MatchOutcome {
    key: PostKey,
    media: BTreeMap<i64, String>,
}

/// Test every catalog item against a post's searchable text.
///
/// Searchable strings are the title, the description, and every category.
/// Containment is case-sensitive substring matching, checked exhaustively
/// with no early termination.
pub fn match_post(catalog: &[MediaTitle], post: &Post) -> BTreeMap<i64, String> {
    let mut searchable: Vec<&str> = vec![post.title.as_str(), post.description.as_str()];
    searchable.extend(post.categories.iter().map(String::as_str));

    let mut media = BTreeMap::new();
    for item in catalog {
        for text in &searchable {
            if text.contains(item.title.as_str()) {
                tracing::debug!(title = %item.title, link = %post.link, "Found catalog match");
                media.insert(item.media_id, item.title.clone());
            }
        }
    }
    media
}

/// Annotate new posts with media associations from the catalog.
///
/// Loads the catalog snapshot (skipping the whole stage when it's empty),
/// selects posts from content-bearing sources that are not yet persisted,
/// fans out one matching task per post over an exactly-sized channel, and
/// merges results back into the corresponding posts by round key.
pub async fn associate_media(db: &Database, fetches: &mut [SourceFetch]) {
    let catalog = match db.media_catalog().await {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::warn!(error = %e, "Could not load media catalog, skipping matching");
            return;
        }
    };
    if catalog.is_empty() {
        return;
    }
    let catalog = Arc::new(catalog);

    // Only posts that will actually be inserted are worth matching. The same
    // dedup criterion runs again inside the persistence writer.
    let mut candidates: Vec<Post> = Vec::new();
    for fetch in fetches.iter() {
        if !fetch.content {
            continue;
        }
        for post in &fetch.source.posts {
            if db.post_is_new(&post.link).await {
                candidates.push(post.clone());
            }
        }
    }

    let total = candidates.len();
    if total == 0 {
        return;
    }
    tracing::info!(posts = total, catalog = catalog.len(), "Matching new posts against catalog");

    let (tx, mut rx) = mpsc::channel::<MatchOutcome>(total);
    for post in candidates {
        let catalog = Arc::clone(&catalog);
        let tx = tx.clone();
        tokio::spawn(async move {
            let media = match_post(&catalog, &post);
            let _ = tx
                .send(MatchOutcome {
                    key: post.key,
                    media,
                })
                .await;
        });
    }
    drop(tx);

    let mut matched: HashMap<PostKey, BTreeMap<i64, String>> = HashMap::new();
    while let Some(outcome) = rx.recv().await {
        if !outcome.media.is_empty() {
            matched.insert(outcome.key, outcome.media);
        }
    }

    for fetch in fetches.iter_mut() {
        for post in fetch.source.posts.iter_mut() {
            if let Some(media) = matched.remove(&post.key) {
                post.media_ids.extend(media.keys().copied());
            }
        }
    }
}
