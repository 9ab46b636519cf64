//! In-memory stores for job tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::error::{AppError, AppResult};
use crate::models::{Event, EventTable, GasPrice};
use crate::storage::{DocumentStore, RelationalStore};

#[derive(Default)]
pub struct MemoryStore {
    pub gas_prices: Mutex<Vec<GasPrice>>,
    pub events: Mutex<Vec<(String, Event)>>,
    pub documents: Mutex<Vec<(String, Value)>>,
    pub latest: Mutex<Option<DateTime<Utc>>>,
    /// Event ids whose relational insert fails as a conflict.
    pub conflicting_ids: Mutex<HashSet<i64>>,
}

impl MemoryStore {
    pub fn event_ids(&self) -> Vec<i64> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, e)| e.event_id)
            .collect()
    }
}

#[async_trait]
impl RelationalStore for MemoryStore {
    async fn insert_gas_price(&self, price: &GasPrice) -> AppResult<i64> {
        let mut rows = self.gas_prices.lock().unwrap();
        rows.push(price.clone());
        Ok(rows.len() as i64)
    }

    async fn insert_event(&self, table: &EventTable, event: &Event) -> AppResult<i64> {
        if self.conflicting_ids.lock().unwrap().contains(&event.event_id) {
            return Err(AppError::Persistence(format!(
                "duplicate key value violates unique constraint on event_id {}",
                event.event_id
            )));
        }
        let mut rows = self.events.lock().unwrap();
        rows.push((table.as_str().to_string(), event.clone()));
        Ok(rows.len() as i64)
    }

    async fn latest_event_timestamp(&self, _table: &EventTable) -> AppResult<Option<DateTime<Utc>>> {
        Ok(*self.latest.lock().unwrap())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, document: &Value) -> AppResult<()> {
        self.documents
            .lock()
            .unwrap()
            .push((collection.to_string(), document.clone()));
        Ok(())
    }
}
