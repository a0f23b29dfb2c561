//! Authenticated JSON requests with bounded retries.

use crate::config::ApiConfig;
use crate::error::RequestError;
use eyre::Context;
use http::header::{AUTHORIZATION, RETRY_AFTER};
use http::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry2::strategy::{ExponentialBackoff, jitter};
use tokio_retry2::{Retry, RetryError};
use tracing::instrument;

/// HTTP client shared by the Discord and YouTube clients.
///
/// Owns the connection pool and the [`ApiConfig`] for the run. Every request goes through
/// [`ApiClient::request`], which retries transient failures with exponential backoff and
/// turns everything else into a [`RequestError`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    config: Arc<ApiConfig>,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> eyre::Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .timeout(config.request_timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Sends `method {base_url}{path}` and decodes the JSON response body as `T`.
    ///
    /// `authorization` is sent verbatim as the `Authorization` header of every attempt.
    /// For idempotent methods, statuses 408, 429 and 5xx (except 501) are retried, as are
    /// timeouts and connection failures, until [`ApiConfig::max_attempts`] is reached. A
    /// `Retry-After` header takes precedence over the computed backoff.
    ///
    /// Other methods (`POST` inserts) get a single attempt, since a request that timed out
    /// or failed with a 5xx may still have been applied.
    #[instrument(skip(self, authorization, body), level = tracing::Level::DEBUG)]
    pub async fn request<T, B>(
        &self,
        method: Method,
        base_url: &str,
        path: &str,
        params: &[(&str, &str)],
        authorization: &str,
        body: Option<&B>,
    ) -> Result<T, RequestError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{base_url}{path}");
        let retries = if method.is_idempotent() {
            self.config.max_attempts.saturating_sub(1)
        } else {
            0
        };
        let strategy = ExponentialBackoff::from_millis(self.config.backoff_base_ms)
            .factor(self.config.backoff_factor_ms)
            .max_delay(self.config.max_backoff)
            .map(jitter)
            .take(retries);

        let response = Retry::spawn(strategy, || async {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header(AUTHORIZATION, authorization)
                .query(params);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) if e.is_timeout() || e.is_connect() => {
                    tracing::warn!(%url, error = %e, "transport failure");
                    return Err(RetryError::Transient {
                        err: RequestError::Transport {
                            method: method.clone(),
                            url: url.clone(),
                            source: e,
                        },
                        retry_after: None,
                    });
                }
                Err(e) => {
                    return Err(RetryError::Permanent(RequestError::Transport {
                        method: method.clone(),
                        url: url.clone(),
                        source: e,
                    }));
                }
            };

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let retry_after = retry_after(&response);
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            let err = RequestError::Status {
                method: method.clone(),
                url: url.clone(),
                status,
                reason: self.config.status_reason(status.as_u16()),
                body,
            };

            if is_retryable(status) {
                tracing::warn!(%url, %status, ?retry_after, "transient API error");
                Err(RetryError::Transient { err, retry_after })
            } else {
                tracing::debug!(%url, %status, "API error is not retryable");
                Err(RetryError::Permanent(err))
            }
        })
        .await?;

        response
            .json()
            .await
            .map_err(|source| RequestError::Decode { url, source })
    }
}

/// Whether a request that failed with `status` may succeed if we just try again.
fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Parses a `Retry-After` header given in (possibly fractional) seconds.
fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    let value = response.headers().get(RETRY_AFTER)?.to_str().ok()?;
    let secs: f64 = value.trim().parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::test_support::{MockResponse, MockServer};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Configuration that points both APIs at `server` and keeps backoff delays tiny.
    pub(crate) fn test_config(server: &MockServer) -> ApiConfig {
        ApiConfig {
            discord_api_base: server.url(),
            youtube_api_base: server.url(),
            backoff_base_ms: 1,
            backoff_factor_ms: 1,
            max_backoff: Duration::from_millis(5),
            insert_delay: Duration::ZERO,
            ..ApiConfig::default()
        }
    }

    async fn get(client: &ApiClient, server: &MockServer) -> Result<serde_json::Value, RequestError> {
        client
            .request::<serde_json::Value, ()>(
                Method::GET,
                &server.url(),
                "/thing",
                &[("limit", "100")],
                "Bot secret",
                None,
            )
            .await
    }

    #[tokio::test]
    async fn success_returns_decoded_body() {
        let server = MockServer::start(|_| MockResponse::json(200, json!({"id": "42"}))).await;
        let client = ApiClient::new(test_config(&server)).unwrap();

        let body = get(&client, &server).await.unwrap();
        assert_eq!(body, json!({"id": "42"}));

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, "/thing");
        assert_eq!(requests[0].query_param("limit").as_deref(), Some("100"));
        assert_eq!(requests[0].header("authorization").as_deref(), Some("Bot secret"));
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let calls = AtomicUsize::new(0);
        let server = MockServer::start(move |_| {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                MockResponse::json(503, json!({"message": "busy"}))
            } else {
                MockResponse::json(200, json!([]))
            }
        })
        .await;
        let client = ApiClient::new(test_config(&server)).unwrap();

        let body = get(&client, &server).await.unwrap();
        assert_eq!(body, json!([]));
        assert_eq!(server.requests().len(), 3);
    }

    #[tokio::test]
    async fn retries_stop_at_the_attempt_bound() {
        let server = MockServer::start(|_| MockResponse::json(500, json!({}))).await;
        let client = ApiClient::new(test_config(&server)).unwrap();

        let err = get(&client, &server).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(err.to_string().ends_with("[500] Internal Server Error"), "{err}");
        assert_eq!(server.requests().len(), 5);
    }

    #[tokio::test]
    async fn posts_are_sent_once() {
        let server = MockServer::start(|_| MockResponse::json(503, json!({}))).await;
        let client = ApiClient::new(test_config(&server)).unwrap();

        let err = client
            .request::<serde_json::Value, _>(
                Method::POST,
                &server.url(),
                "/thing",
                &[],
                "Bot secret",
                Some(&json!({"id": "42"})),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn retry_after_is_honoured() {
        let calls = AtomicUsize::new(0);
        let server = MockServer::start(move |_| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                MockResponse::json(429, json!({"retry_after": 0.01})).with_header("retry-after", "0.01")
            } else {
                MockResponse::json(200, json!({}))
            }
        })
        .await;
        let client = ApiClient::new(test_config(&server)).unwrap();

        get(&client, &server).await.unwrap();
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let server = MockServer::start(|_| MockResponse::json(404, json!({"message": "Unknown Channel"}))).await;
        let client = ApiClient::new(test_config(&server)).unwrap();

        let err = get(&client, &server).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert!(err.to_string().ends_with("[404] Not Found"), "{err}");
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn unknown_status_reports_raw_code() {
        let server = MockServer::start(|_| MockResponse::json(418, json!({}))).await;
        let client = ApiClient::new(test_config(&server)).unwrap();

        let err = get(&client, &server).await.unwrap_err();
        assert!(err.to_string().ends_with("status code 418"), "{err}");
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let server = MockServer::start(|_| MockResponse::text(200, "not json")).await;
        let client = ApiClient::new(test_config(&server)).unwrap();

        let err = get(&client, &server).await.unwrap_err();
        assert!(matches!(err, RequestError::Decode { .. }), "{err:?}");
    }

    #[test]
    fn retryable_statuses() {
        for code in [408, 429, 500, 502, 503, 504] {
            assert!(is_retryable(StatusCode::from_u16(code).unwrap()), "{code}");
        }
        for code in [400, 401, 403, 404, 405, 418, 501] {
            assert!(!is_retryable(StatusCode::from_u16(code).unwrap()), "{code}");
        }
    }
}
