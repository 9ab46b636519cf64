use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;

use crate::datasource::paginator::{PageEvent, Paginator, DEFAULT_RATE_LIMIT};
use crate::datasource::{
    Direction, EventFilter, EventPage, EventQuery, EventSource, MAX_EVENT_ITEMS,
};
use crate::error::AppResult;
use crate::models::{Event, EventTable};
use crate::scheduler::Job;
use crate::storage::{DocumentStore, RelationalStore};

/// Outcome of one traversal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestionReport {
    pub pages: usize,
    pub stored: usize,
    pub skipped: usize,
    pub exhausted: bool,
}

/// Follows one contract's events into both stores.
///
/// With an empty table the job backfills backwards from now; otherwise it
/// walks forward from the newest stored event.
pub struct EventIngestJob {
    source: Arc<dyn EventSource>,
    documents: Arc<dyn DocumentStore>,
    relational: Arc<dyn RelationalStore>,
    table: EventTable,
    rate_limit: Duration,
}

impl EventIngestJob {
    pub fn new(
        source: Arc<dyn EventSource>,
        documents: Arc<dyn DocumentStore>,
        relational: Arc<dyn RelationalStore>,
        table: EventTable,
    ) -> Self {
        Self {
            source,
            documents,
            relational,
            table,
            rate_limit: DEFAULT_RATE_LIMIT,
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: Duration) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Runs one full traversal and stores every record it yields.
    pub async fn ingest(&self) -> AppResult<IngestionReport> {
        let latest = self.relational.latest_event_timestamp(&self.table).await?;
        let (direction, start) = match latest {
            Some(ts) => (Direction::Forward, ts),
            None => (Direction::Backward, Utc::now()),
        };

        tracing::info!(
            "Ingesting events for {} ({:?} from {})",
            self.table.contract_address(),
            direction,
            start
        );

        let query = EventQuery::builder(direction)
            .start(start)
            .filter(EventFilter {
                asset_contract_address: Some(self.table.contract_address().to_string()),
                ..EventFilter::default()
            })
            .limit(MAX_EVENT_ITEMS)
            .build()?;

        let pages = Paginator::new(self.source.clone(), query)
            .with_rate_limit(self.rate_limit)
            .into_stream();
        futures_util::pin_mut!(pages);

        let mut report = IngestionReport::default();
        while let Some(item) = pages.next().await {
            match item? {
                PageEvent::Page(page) => {
                    report.pages += 1;
                    self.store_page(page, &mut report).await;
                }
                PageEvent::End => report.exhausted = true,
            }
        }

        tracing::info!(
            "Stored {} events from {} pages ({} skipped)",
            report.stored,
            report.pages,
            report.skipped
        );
        Ok(report)
    }

    async fn store_page(&self, page: EventPage, report: &mut IngestionReport) {
        for raw in page.asset_events {
            match self.store_record(raw).await {
                Ok(()) => report.stored += 1,
                Err(e) => {
                    report.skipped += 1;
                    tracing::warn!(error = %e, "Skipping event");
                }
            }
        }
    }

    async fn store_record(&self, raw: serde_json::Value) -> AppResult<()> {
        let event = Event::from_value(raw)?;
        // The document is written only once the unique relational row is accepted.
        let row = self.relational.insert_event(&self.table, &event).await?;
        self.documents.insert(self.table.as_str(), event.raw()).await?;
        tracing::debug!("Event {} stored as row {}", event.event_id, row);
        Ok(())
    }
}

#[async_trait]
impl Job for EventIngestJob {
    async fn execute(&self) -> AppResult<()> {
        self.ingest().await.map(|_| ())
    }
}
