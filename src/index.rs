//! Downstream search index notifier.
//!
//! One best-effort GET per round once all sources are processed; failures
//! are logged by the caller and never retried within the round.

use crate::feed::{FetchError, FETCH_TIMEOUT, NAMED_IDENTITY};

/// Fixed refresh path appended to the configured index base URL
pub const REFRESH_PATH: &str = "/dataimport?command=delta-import";

/// Signal the downstream index to pick up newly persisted posts
pub async fn refresh_index(client: &reqwest::Client, base_url: &str) -> Result<(), FetchError> {
    let refresh_url = format!("{}{}", base_url.trim_end_matches('/'), REFRESH_PATH);

    let response = tokio::time::timeout(
        FETCH_TIMEOUT,
        client
            .get(&refresh_url)
            .header(reqwest::header::USER_AGENT, NAMED_IDENTITY)
            .send(),
    )
    .await
    .map_err(|_| FetchError::Timeout)??;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    tracing::info!(url = %refresh_url, "Index refresh triggered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_refresh_hits_delta_import() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dataimport"))
            .and(query_param("command", "delta-import"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        refresh_index(&client, &server.uri()).await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_trailing_slash_base() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dataimport"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let base = format!("{}/", server.uri());
        refresh_index(&client, &base).await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_error_status_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let err = refresh_index(&client, &server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus(503)));
    }
}
