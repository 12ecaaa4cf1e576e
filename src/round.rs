//! Round orchestration: one complete fetch→normalize→match→persist→notify
//! cycle.
//!
//! The two parallel stages (fetch, match) each own their channels and
//! barriers for the round; all cross-task merging happens single-threaded
//! after the relevant barrier. Persistence is fully sequential by design,
//! trading latency for simpler per-source failure reasoning.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::feed::{self, SourceFetch};
use crate::index;
use crate::matcher;
use crate::storage::{Database, KeyGen};

/// Per-round outcome aggregation.
///
/// Every operation reports into the round's report instead of being
/// fire-and-forget, so callers and tests can assert on outcomes without
/// inspecting logs.
#[derive(Debug, Default)]
pub struct RoundReport {
    /// Active sources read from the registry
    pub sources_total: usize,
    /// Sources whose fetch produced content
    pub sources_fetched: usize,
    /// Sources whose metadata row was updated (exactly one row affected)
    pub sources_updated: usize,
    /// Posts seen across all content-bearing sources
    pub posts_seen: usize,
    /// New posts inserted this round
    pub posts_inserted: usize,
    /// Post-to-tag links written
    pub tags_linked: usize,
    /// Post-to-media links written
    pub media_links: usize,
    /// Outcome of the index refresh signal; None when no index is configured
    pub index_notified: Option<bool>,
}

/// Run one round against the store.
///
/// A registry read failure is the only error that aborts the round; every
/// later failure is contained to its source or post and recorded in the
/// report. The caller's scheduler keeps ticking regardless.
pub async fn run_round(
    db: &Database,
    client: &reqwest::Client,
    index_url: Option<&str>,
) -> Result<RoundReport> {
    let sources = db
        .active_sources()
        .await
        .context("Could not read source registry")?;

    let mut report = RoundReport {
        sources_total: sources.len(),
        ..Default::default()
    };
    if sources.is_empty() {
        return Ok(report);
    }

    // Stage 1: parallel fetch+parse, gated by its own completion barrier
    let keys = Arc::new(KeyGen::default());
    let mut fetches = feed::fetch_all(client, sources, keys).await;
    report.sources_fetched = fetches.iter().filter(|f| f.content).count();

    // Stage 2: parallel catalog matching over not-yet-persisted posts.
    // Starts only after stage 1 fully drains; no streaming overlap.
    matcher::associate_media(db, &mut fetches).await;

    // Stage 3: sequential, insert-or-skip persistence per source
    for fetch in &fetches {
        if !fetch.content {
            continue;
        }
        persist_source(db, fetch, &mut report).await;
    }

    // Signal the downstream index once all sources are processed
    if let Some(base_url) = index_url {
        match index::refresh_index(client, base_url).await {
            Ok(()) => report.index_notified = Some(true),
            Err(e) => {
                tracing::warn!(error = %e, "Index refresh failed");
                report.index_notified = Some(false);
            }
        }
    }

    Ok(report)
}

/// Persist one source's round output: metadata update, new posts with their
/// tags and media links, then the staleness statistic.
///
/// Failures are logged and contained; a failure partway through a post
/// leaves it persisted with incomplete tag/media links, which the next
/// round does not revisit (the link is no longer new).
async fn persist_source(db: &Database, fetch: &SourceFetch, report: &mut RoundReport) {
    let source = &fetch.source;

    match db.update_source_checked(source.id, &source.feed_name).await {
        Ok(true) => {
            report.sources_updated += 1;
            tracing::info!(
                feed = %source.feed_name,
                alt = source.alt_name.as_deref().unwrap_or_default(),
                "Updated source"
            );
        }
        Ok(false) => {
            tracing::warn!(source_id = source.id, url = %source.feed_url, "Source metadata update affected no row")
        }
        Err(e) => {
            tracing::warn!(source_id = source.id, url = %source.feed_url, error = %e, "Source metadata update failed")
        }
    }

    for post in &source.posts {
        report.posts_seen += 1;

        // Same criterion as the matching stage's eligibility check
        if !db.post_is_new(&post.link).await {
            continue;
        }

        let post_id = match db.insert_post(source.id, post).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(link = %post.link, error = %e, "Post insert failed");
                continue;
            }
        };
        report.posts_inserted += 1;
        tracing::info!(feed = %source.feed_name, title = %post.title, "Added post");

        match db.link_tags(post_id, &post.categories).await {
            Ok(linked) => report.tags_linked += linked,
            Err(e) => tracing::warn!(post_id, error = %e, "Tag linking failed"),
        }
        match db.link_media(post_id, &post.media_ids).await {
            Ok(linked) => report.media_links += linked,
            Err(e) => tracing::warn!(post_id, error = %e, "Media linking failed"),
        }
    }

    if let Err(e) = db.refresh_days_since_stat(source.id).await {
        tracing::warn!(source_id = source.id, error = %e, "Staleness stat refresh failed");
    }
}
