use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Statuses worth another attempt before giving up.
const RETRY_STATUSES: [u16; 5] = [408, 429, 502, 503, 504];

/// Joins URL segments so exactly one `/` separates each of them. Empty
/// segments are skipped.
pub fn urljoin(base: &str, parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .fold(base.to_string(), |acc, part| {
            format!("{}/{}", acc.trim_end_matches('/'), part.trim_start_matches('/'))
        })
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_factor: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_factor: Duration::from_secs(1),
            max_backoff: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(31);
        self.backoff_factor
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff)
    }

    /// Delay before retry number `retry`, stretched to a server-requested
    /// wait when one is given. Never exceeds `max_backoff`.
    pub fn delay(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.backoff(retry);
        match retry_after {
            Some(wait) => wait.max(backoff).min(self.max_backoff),
            None => backoff,
        }
    }
}

/// Wait requested by a `Retry-After` header, given either as seconds or as
/// an HTTP date. Only 429 and 503 responses carry a meaningful one.
fn retry_after(status: StatusCode, headers: &HeaderMap) -> Option<Duration> {
    if status != StatusCode::TOO_MANY_REQUESTS && status != StatusCode::SERVICE_UNAVAILABLE {
        return None;
    }

    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    Some((at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
}

pub fn is_retryable(status: StatusCode) -> bool {
    RETRY_STATUSES.contains(&status.as_u16())
}

/// Maps a terminal non-success status to its error.
pub fn classify_failure(status: StatusCode, body: String) -> AppError {
    match status.as_u16() {
        400 => AppError::MalformedRequest(body),
        401 => AppError::Authentication(body),
        403 => AppError::AccessBlocked,
        495 => AppError::Transport("SSL certificate error".to_string()),
        504 => AppError::GatewayTimeout,
        code => AppError::Http { status: code, body },
    }
}

/// GET client that authenticates with an API key header and retries
/// transient failures.
#[derive(Clone)]
pub struct RetryingClient {
    client: Client,
    api_key: String,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_policy(api_key, RetryPolicy::default())
    }

    pub fn with_policy(api_key: &str, policy: RetryPolicy) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            policy,
        }
    }

    /// Builds `url` with the non-empty `params` appended as a query string.
    pub fn build_url(url: &str, params: &[(&str, Option<String>)]) -> AppResult<Url> {
        let mut url = Url::parse(url)
            .map_err(|e| AppError::InvalidArgument(format!("invalid url {}: {}", url, e)))?;

        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                    query.append_pair(key, value);
                }
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        Ok(url)
    }

    pub async fn get_json(&self, url: &str, params: &[(&str, Option<String>)]) -> AppResult<Value> {
        let url = Self::build_url(url, params)?;
        let mut retries = 0u32;

        loop {
            let result = self
                .client
                .get(url.clone())
                .header("X-API-KEY", &self.api_key)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let value: Value = response.json().await?;
                        return Ok(value);
                    }

                    if is_retryable(status) && retries < self.policy.max_retries {
                        retries += 1;
                        let hint = retry_after(status, response.headers());
                        let delay = self.policy.delay(retries, hint);
                        tracing::warn!(
                            status = status.as_u16(),
                            attempt = retries,
                            backoff_ms = delay.as_millis() as u64,
                            retry_after = ?hint,
                            "Retrying {}",
                            url.path()
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    let body = response.text().await.unwrap_or_default();
                    return Err(classify_failure(status, body));
                }
                Err(err) if (err.is_connect() || err.is_timeout()) && retries < self.policy.max_retries => {
                    retries += 1;
                    let delay = self.policy.backoff(retries);
                    tracing::warn!(
                        error = %err,
                        attempt = retries,
                        backoff_ms = delay.as_millis() as u64,
                        "Retrying {} after transport error",
                        url.path()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) if err.is_connect() || err.is_timeout() => {
                    return Err(AppError::Transport(err.to_string()));
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use axum::{extract::State, http::StatusCode as AxumStatus, routing::get, Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Script {
        hits: Arc<AtomicUsize>,
        statuses: Arc<Mutex<Vec<u16>>>,
        api_key: Arc<Mutex<Option<String>>>,
    }

    async fn scripted(
        State(script): State<Script>,
        headers: axum::http::HeaderMap,
    ) -> (AxumStatus, Json<Value>) {
        script.hits.fetch_add(1, Ordering::SeqCst);
        *script.api_key.lock().unwrap() = headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let status = {
            let mut statuses = script.statuses.lock().unwrap();
            if statuses.is_empty() { 200 } else { statuses.remove(0) }
        };
        let status = AxumStatus::from_u16(status).unwrap();
        (status, Json(json!({ "status": status.as_u16() })))
    }

    async fn serve(statuses: Vec<u16>) -> (String, Script) {
        let script = Script {
            statuses: Arc::new(Mutex::new(statuses)),
            ..Script::default()
        };
        let app = Router::new()
            .route("/v1/events", get(scripted))
            .with_state(script.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/v1/events", addr), script)
    }

    fn fast_client() -> RetryingClient {
        RetryingClient::with_policy(
            "test-key",
            RetryPolicy {
                max_retries: 5,
                backoff_factor: Duration::from_millis(1),
                max_backoff: Duration::from_millis(5),
            },
        )
    }

    #[test]
    fn urljoin_normalizes_separators() {
        assert_eq!(
            urljoin("https://api.example.com/", &["v2", "/events"]),
            "https://api.example.com/v2/events"
        );
        assert_eq!(
            urljoin("https://api.example.com", &["/v2/", "", "events"]),
            "https://api.example.com/v2/events"
        );
    }

    #[test]
    fn build_url_omits_empty_params() {
        let url = RetryingClient::build_url(
            "https://api.example.com/v2/events",
            &[
                ("limit", Some("300".to_string())),
                ("cursor", None),
                ("event_type", Some(String::new())),
            ],
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v2/events?limit=300");

        let bare = RetryingClient::build_url("https://api.example.com/v2/events", &[("cursor", None)]).unwrap();
        assert_eq!(bare.as_str(), "https://api.example.com/v2/events");
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(10), Duration::from_secs(120));
    }

    #[test]
    fn server_wait_stretches_backoff_up_to_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1, None), Duration::from_secs(1));
        assert_eq!(policy.delay(1, Some(Duration::from_secs(30))), Duration::from_secs(30));
        assert_eq!(policy.delay(4, Some(Duration::from_secs(2))), Duration::from_secs(8));
        assert_eq!(policy.delay(1, Some(Duration::from_secs(900))), Duration::from_secs(120));
    }

    #[test]
    fn reads_retry_after_header() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, "7".parse().unwrap());
        assert_eq!(
            retry_after(StatusCode::TOO_MANY_REQUESTS, &headers),
            Some(Duration::from_secs(7))
        );
        assert_eq!(
            retry_after(StatusCode::SERVICE_UNAVAILABLE, &headers),
            Some(Duration::from_secs(7))
        );
        assert_eq!(retry_after(StatusCode::BAD_GATEWAY, &headers), None);

        headers.insert(RETRY_AFTER, "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap());
        assert_eq!(
            retry_after(StatusCode::TOO_MANY_REQUESTS, &headers),
            Some(Duration::ZERO)
        );

        headers.insert(RETRY_AFTER, "soon".parse().unwrap());
        assert_eq!(retry_after(StatusCode::TOO_MANY_REQUESTS, &headers), None);
    }

    #[test]
    fn classifies_terminal_statuses() {
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, "bad cursor".into()),
            AppError::MalformedRequest(body) if body == "bad cursor"
        ));
        assert!(matches!(
            classify_failure(StatusCode::UNAUTHORIZED, String::new()),
            AppError::Authentication(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::FORBIDDEN, String::new()),
            AppError::AccessBlocked
        ));
        assert!(matches!(
            classify_failure(StatusCode::from_u16(495).unwrap(), String::new()),
            AppError::Transport(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::GATEWAY_TIMEOUT, String::new()),
            AppError::GatewayTimeout
        ));
        assert!(!is_retryable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
    }

    #[tokio::test]
    async fn forbidden_raises_access_blocked() {
        let (url, script) = serve(vec![403]).await;
        let err = fast_client().get_json(&url, &[]).await.unwrap_err();

        assert!(matches!(err, AppError::AccessBlocked));
        assert_eq!(script.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn server_error_is_not_retried() {
        let (url, script) = serve(vec![500]).await;
        let err = fast_client().get_json(&url, &[]).await.unwrap_err();

        assert!(matches!(err, AppError::Http { status: 500, .. }));
        assert_eq!(script.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_statuses_are_retried_then_succeed() {
        let (url, script) = serve(vec![503, 429]).await;
        let value = fast_client()
            .get_json(&url, &[("limit", Some("10".to_string()))])
            .await
            .unwrap();

        assert_eq!(value["status"], 200);
        assert_eq!(script.hits.load(Ordering::SeqCst), 3);
        assert_eq!(script.api_key.lock().unwrap().as_deref(), Some("test-key"));
    }

    #[tokio::test]
    async fn gateway_timeout_after_retries_exhausted() {
        let (url, script) = serve(vec![504; 10]).await;
        let err = fast_client().get_json(&url, &[]).await.unwrap_err();

        assert!(matches!(err, AppError::GatewayTimeout));
        assert_eq!(script.hits.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn rate_limited_response_waits_for_retry_after() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/v1/events",
            get(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        (
                            AxumStatus::TOO_MANY_REQUESTS,
                            [(axum::http::header::RETRY_AFTER, "1")],
                            Json(json!({})),
                        )
                            .into_response()
                    } else {
                        Json(json!({ "status": 200 })).into_response()
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = RetryingClient::with_policy(
            "test-key",
            RetryPolicy {
                max_retries: 5,
                backoff_factor: Duration::from_millis(1),
                max_backoff: Duration::from_secs(5),
            },
        );
        let begin = std::time::Instant::now();
        let value = client
            .get_json(&format!("http://{}/v1/events", addr), &[])
            .await
            .unwrap();

        assert_eq!(value["status"], 200);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(begin.elapsed() >= Duration::from_secs(1));
    }
}
