use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

use crate::feed::parser::{parse_document, ParsedFeed};
use crate::storage::{KeyGen, Source};

/// Every outbound fetch is bounded by this deadline, independently per source
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity announced to well-behaved feed hosts
pub const NAMED_IDENTITY: &str = concat!("feed-harvester/", env!("CARGO_PKG_VERSION"));

/// This host rejects ordinary feed-reader identities, so we announce a
/// crawler identity it whitelists instead
const BLOCKLISTED_DOMAIN: &str = "tumblr.com";
const BLOCKLISTED_SUFFIX: &str = ".tumblr.com";
const SPOOFED_IDENTITY: &str = "Baiduspider";

/// Errors that can occur while fetching one feed document.
///
/// None of these abort a round: a failed source simply yields a
/// content-absent result.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, body read)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-success status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the 10-second deadline
    #[error("Request timed out")]
    Timeout,
}

/// Result of fetching and parsing one source's feed.
///
/// `content` is false when the fetch failed or the document was malformed;
/// such sources are skipped by the persistence writer so their stored
/// metadata stays untouched.
#[derive(Debug)]
pub struct SourceFetch {
    pub source: Source,
    pub content: bool,
}

/// Select the User-Agent for a destination host
fn identity_for(feed_url: &str) -> &'static str {
    let url = Url::parse(feed_url).ok();
    match url.as_ref().and_then(Url::host_str) {
        Some(host) if host == BLOCKLISTED_DOMAIN || host.ends_with(BLOCKLISTED_SUFFIX) => {
            SPOOFED_IDENTITY
        }
        _ => NAMED_IDENTITY,
    }
}

/// Issue one GET for a source's feed document, bounded by [`FETCH_TIMEOUT`]
async fn fetch_document(client: &reqwest::Client, source: &Source) -> Result<String, FetchError> {
    let response = tokio::time::timeout(
        FETCH_TIMEOUT,
        client
            .get(&source.feed_url)
            .header(reqwest::header::USER_AGENT, identity_for(&source.feed_url))
            .send(),
    )
    .await
    .map_err(|_| FetchError::Timeout)??;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let body = tokio::time::timeout(FETCH_TIMEOUT, response.text())
        .await
        .map_err(|_| FetchError::Timeout)??;

    Ok(body)
}

/// Fetch and parse one source.
///
/// Never fails outward: fetch and parse errors are logged and produce a
/// content-absent (or post-less) result so the round continues. On a parse
/// failure the previously stored feed name is kept rather than overwritten
/// with an empty title.
async fn fetch_source(client: &reqwest::Client, mut source: Source, keys: &KeyGen) -> SourceFetch {
    let body = match fetch_document(client, &source).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(url = %source.feed_url, error = %e, "Feed fetch failed");
            return SourceFetch {
                source,
                content: false,
            };
        }
    };

    match parse_document(source.dialect, &body, keys) {
        Ok(ParsedFeed { feed_name, posts }) => {
            tracing::info!(url = %source.feed_url, posts = posts.len(), "Retrieved feed");
            source.feed_name = feed_name;
            source.posts = posts;
            SourceFetch {
                source,
                content: true,
            }
        }
        Err(e) => {
            tracing::warn!(url = %source.feed_url, error = %e, "Feed parse failed");
            SourceFetch {
                source,
                content: true,
            }
        }
    }
}

/// Fan out one fetch+parse task per source, fan in after all complete.
///
/// One task per source with no pool cap; each deposits its result on a
/// channel sized to the exact source count, so sends never block. Receiving
/// all results is the completion barrier. The drained order reflects
/// completion, not submission; correlation downstream goes through each
/// post's round key, never its position.
pub async fn fetch_all(
    client: &reqwest::Client,
    sources: Vec<Source>,
    keys: Arc<KeyGen>,
) -> Vec<SourceFetch> {
    let total = sources.len();
    if total == 0 {
        return Vec::new();
    }

    let (tx, mut rx) = mpsc::channel::<SourceFetch>(total);
    for source in sources {
        let client = client.clone();
        let keys = Arc::clone(&keys);
        let tx = tx.clone();
        tokio::spawn(async move {
            let fetch = fetch_source(&client, source, &keys).await;
            let _ = tx.send(fetch).await;
        });
    }
    drop(tx);

    let mut results = Vec::with_capacity(total);
    while let Some(fetch) = rx.recv().await {
        results.push(fetch);
    }
    results
}
