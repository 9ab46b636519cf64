use async_trait::async_trait;
use serde_json::Value;

use crate::config::OpenSeaConfig;
use crate::datasource::http::{urljoin, RetryingClient};
use crate::datasource::{CatalogSource, EventPage, EventQuery, EventSource};
use crate::error::{AppError, AppResult};

const EVENTS_ENDPOINT: &str = "events";

#[derive(Clone)]
pub struct OpenSeaClient {
    client: RetryingClient,
    base_url: String,
    version: String,
}

impl OpenSeaClient {
    pub fn new(config: &OpenSeaConfig) -> Self {
        Self::with_client(config, RetryingClient::new(&config.api_key))
    }

    pub fn with_client(config: &OpenSeaConfig, client: RetryingClient) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            version: config.version.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        urljoin(&self.base_url, &[&self.version, path])
    }
}

/// Rejects identifiers that would escape their path segment.
fn path_segment<'a>(kind: &str, value: &'a str) -> AppResult<&'a str> {
    let value = value.trim();
    if value.is_empty() || value.contains(['/', '?', '#', '%', '.']) {
        return Err(AppError::InvalidArgument(format!("invalid {}: {:?}", kind, value)));
    }
    Ok(value)
}

#[async_trait]
impl EventSource for OpenSeaClient {
    async fn fetch_events(&self, query: &EventQuery) -> AppResult<EventPage> {
        let url = self.endpoint(EVENTS_ENDPOINT);
        let value = self.client.get_json(&url, &query.params()).await?;
        let page: EventPage = serde_json::from_value(value)?;
        Ok(page)
    }
}

#[async_trait]
impl CatalogSource for OpenSeaClient {
    async fn contract(&self, address: &str) -> AppResult<Value> {
        let address = path_segment("contract address", address)?;
        let url = self.endpoint(&format!("asset_contract/{}", address));
        self.client.get_json(&url, &[]).await
    }

    async fn collection(&self, slug: &str) -> AppResult<Value> {
        let slug = path_segment("collection slug", slug)?;
        let url = self.endpoint(&format!("collection/{}", slug));
        self.client.get_json(&url, &[]).await
    }

    async fn collection_stats(&self, slug: &str) -> AppResult<Value> {
        let slug = path_segment("collection slug", slug)?;
        let url = self.endpoint(&format!("collection/{}/stats", slug));
        self.client.get_json(&url, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::http::RetryPolicy;
    use crate::datasource::Direction;
    use axum::extract::{Path, RawQuery};
    use axum::{routing::get, Json, Router};
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    async fn client_for(app: Router) -> OpenSeaClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = OpenSeaConfig {
            base_url: format!("http://{}/api/", addr),
            version: "/v1/".to_string(),
            api_key: "key".to_string(),
        };
        OpenSeaClient::with_client(
            &config,
            RetryingClient::with_policy(
                &config.api_key,
                RetryPolicy {
                    max_retries: 0,
                    backoff_factor: Duration::from_millis(1),
                    max_backoff: Duration::from_millis(1),
                },
            ),
        )
    }

    #[tokio::test]
    async fn requests_versioned_events_endpoint() {
        let seen: Arc<Mutex<Option<String>>> = Arc::default();
        let recorder = seen.clone();
        let app = Router::new().route(
            "/api/v1/events",
            get(move |RawQuery(query): RawQuery| {
                let recorder = recorder.clone();
                async move {
                    *recorder.lock().unwrap() = query;
                    Json::<Value>(json!({
                        "next": "cursor-2",
                        "asset_events": [{ "id": 1 }, { "id": 2 }]
                    }))
                }
            }),
        );
        let client = client_for(app).await;

        let mut query = EventQuery::builder(Direction::Backward)
            .start(Utc.with_ymd_and_hms(2021, 10, 5, 3, 25, 0).unwrap())
            .build()
            .unwrap();
        query.cursor = Some("cursor-1".to_string());

        let page = client.fetch_events(&query).await.unwrap();
        assert_eq!(page.next.as_deref(), Some("cursor-2"));
        assert_eq!(page.asset_events.len(), 2);

        let raw_query = seen.lock().unwrap().clone().unwrap();
        assert!(raw_query.contains("occurred_before=1633404300"));
        assert!(raw_query.contains("cursor=cursor-1"));
        assert!(raw_query.contains("limit=300"));
        assert!(!raw_query.contains("occurred_after"));
        assert!(!raw_query.contains("collection_slug"));
    }

    #[tokio::test]
    async fn looks_up_contract_and_collection_stats() {
        let app = Router::new()
            .route(
                "/api/v1/asset_contract/{address}",
                get(|Path(address): Path<String>| async move {
                    Json(json!({ "address": address, "name": "Meebits" }))
                }),
            )
            .route(
                "/api/v1/collection/{slug}/stats",
                get(|Path(slug): Path<String>| async move {
                    Json(json!({ "slug": slug, "stats": { "floor_price": 1.5 } }))
                }),
            );
        let client = client_for(app).await;

        let contract = client
            .contract("0x7bd29408f11d2bfc23c34f18275bbf23bb716bc7")
            .await
            .unwrap();
        assert_eq!(contract["name"], "Meebits");
        assert_eq!(contract["address"], "0x7bd29408f11d2bfc23c34f18275bbf23bb716bc7");

        let stats = client.collection_stats("meebits").await.unwrap();
        assert_eq!(stats["slug"], "meebits");
        assert_eq!(stats["stats"]["floor_price"], 1.5);
    }

    #[tokio::test]
    async fn unknown_collection_surfaces_http_error() {
        let client = client_for(Router::new()).await;
        let err = client.collection("missing").await.unwrap_err();
        assert!(matches!(err, AppError::Http { status: 404, .. }));
    }

    #[tokio::test]
    async fn rejects_identifiers_that_leave_their_segment() {
        let client = client_for(Router::new()).await;
        assert!(matches!(
            client.collection("../events").await,
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            client.contract("").await,
            Err(AppError::InvalidArgument(_))
        ));
    }
}
