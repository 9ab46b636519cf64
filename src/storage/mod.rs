pub mod mongo;
pub mod postgres;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::AppResult;
use crate::models::{Event, EventTable, GasPrice};

/// Relational sink for normalized rows. Every call commits on its own.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Inserts one gas sample and returns its row id.
    async fn insert_gas_price(&self, price: &GasPrice) -> AppResult<i64>;

    /// Inserts one event row; a duplicate event id is an error.
    async fn insert_event(&self, table: &EventTable, event: &Event) -> AppResult<i64>;

    /// Timestamp of the newest stored event, if any.
    async fn latest_event_timestamp(&self, table: &EventTable) -> AppResult<Option<DateTime<Utc>>>;
}

/// Schemaless sink for raw API documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, collection: &str, document: &Value) -> AppResult<()>;
}
