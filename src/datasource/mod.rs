pub mod etherscan;
pub mod http;
pub mod opensea;
pub mod paginator;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};

/// Page size ceiling of the events endpoint.
pub const MAX_EVENT_ITEMS: u32 = 300;

/// One decoded response of the events endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPage {
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub asset_events: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Events that occurred after the boundary (live mode).
    Forward,
    /// Events that occurred before the boundary (backfill).
    Backward,
}

/// Optional filters understood by the events endpoint.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub asset_contract_address: Option<String>,
    pub collection_slug: Option<String>,
    pub token_id: Option<String>,
    pub account_address: Option<String>,
    pub event_type: Option<String>,
    pub auction_type: Option<String>,
    pub collection_editor: Option<String>,
    pub only_opensea: bool,
}

#[derive(Debug, Clone)]
pub struct EventQuery {
    pub boundary: DateTime<Utc>,
    pub direction: Direction,
    pub filter: EventFilter,
    pub limit: u32,
    pub cursor: Option<String>,
}

impl EventQuery {
    pub fn builder(direction: Direction) -> EventQueryBuilder {
        EventQueryBuilder {
            direction,
            start: None,
            filter: EventFilter::default(),
            limit: MAX_EVENT_ITEMS,
        }
    }

    /// Query string pairs; `None` values are dropped by the HTTP client.
    pub fn params(&self) -> Vec<(&'static str, Option<String>)> {
        let boundary = Some(self.boundary.timestamp().to_string());
        let (after, before) = match self.direction {
            Direction::Forward => (boundary, None),
            Direction::Backward => (None, boundary),
        };

        vec![
            ("asset_contract_address", self.filter.asset_contract_address.clone()),
            ("collection_slug", self.filter.collection_slug.clone()),
            ("token_id", self.filter.token_id.clone()),
            ("account_address", self.filter.account_address.clone()),
            ("event_type", self.filter.event_type.clone()),
            ("only_opensea", Some(self.filter.only_opensea.to_string())),
            ("auction_type", self.filter.auction_type.clone()),
            ("limit", Some(self.limit.to_string())),
            ("occurred_after", after),
            ("occurred_before", before),
            ("collection_editor", self.filter.collection_editor.clone()),
            ("cursor", self.cursor.clone()),
        ]
    }
}

pub struct EventQueryBuilder {
    direction: Direction,
    start: Option<DateTime<Utc>>,
    filter: EventFilter,
    limit: u32,
}

impl EventQueryBuilder {
    pub fn start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn filter(mut self, filter: EventFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn build(self) -> AppResult<EventQuery> {
        let boundary = self.start.ok_or_else(|| {
            AppError::InvalidArgument("`start` must be set to a point in time".to_string())
        })?;
        if self.limit == 0 || self.limit > MAX_EVENT_ITEMS {
            return Err(AppError::InvalidArgument(format!(
                "limit must be within 1..={}",
                MAX_EVENT_ITEMS
            )));
        }

        Ok(EventQuery {
            boundary,
            direction: self.direction,
            filter: self.filter,
            limit: self.limit,
            cursor: None,
        })
    }
}

/// Source of paginated marketplace events.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch_events(&self, query: &EventQuery) -> AppResult<EventPage>;
}

/// Single-object lookups on the marketplace API, returned as raw JSON.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn contract(&self, address: &str) -> AppResult<Value>;
    async fn collection(&self, slug: &str) -> AppResult<Value>;
    async fn collection_stats(&self, slug: &str) -> AppResult<Value>;
}

/// Result of a single gas oracle call.
#[derive(Debug)]
pub enum OracleResponse {
    Success(Value),
    Failed(StatusCode),
}

/// Single-shot gas price feed; no retries.
#[async_trait]
pub trait GasOracle: Send + Sync {
    async fn fetch_gas_oracle(&self) -> AppResult<OracleResponse>;
}
