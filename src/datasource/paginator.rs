use futures_util::stream::{self, Stream};
use std::sync::Arc;
use std::time::Duration;

use crate::datasource::{Direction, EventPage, EventQuery, EventSource};
use crate::error::AppResult;

pub const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(300);

/// Item yielded by a traversal. `End` is emitted once the API hands back a
/// null cursor, so a consumer can tell exhaustion apart from stopping early.
#[derive(Debug)]
pub enum PageEvent {
    Page(EventPage),
    End,
}

/// Where the traversal stands between two fetches.
#[derive(Debug, Clone)]
enum Phase {
    First,
    Next(String),
    Exhausted,
    Done,
}

#[derive(Debug, Clone)]
pub struct PaginationState {
    phase: Phase,
    direction: Direction,
    pages_seen: usize,
}

impl PaginationState {
    pub fn cursor(&self) -> Option<&str> {
        match &self.phase {
            Phase::Next(cursor) => Some(cursor.as_str()),
            _ => None,
        }
    }

    pub fn pages_seen(&self) -> usize {
        self.pages_seen
    }
}

/// Lazy cursor traversal over an [`EventSource`].
///
/// The first page is requested without a cursor. Each following request waits
/// `rate_limit` and then follows the cursor of the previous page. A traversal
/// is single-use; an error ends it.
pub struct Paginator {
    source: Arc<dyn EventSource>,
    query: EventQuery,
    rate_limit: Duration,
    state: PaginationState,
}

impl Paginator {
    pub fn new(source: Arc<dyn EventSource>, query: EventQuery) -> Self {
        let direction = query.direction;
        Self {
            source,
            query,
            rate_limit: DEFAULT_RATE_LIMIT,
            state: PaginationState {
                phase: Phase::First,
                direction,
                pages_seen: 0,
            },
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: Duration) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Fetches the next page. Returns `None` once `End` or an error has been
    /// yielded.
    pub async fn next(&mut self) -> Option<AppResult<PageEvent>> {
        match std::mem::replace(&mut self.state.phase, Phase::Done) {
            Phase::Done => None,
            Phase::Exhausted => Some(Ok(PageEvent::End)),
            Phase::First => {
                self.query.cursor = None;
                Some(self.fetch().await)
            }
            Phase::Next(cursor) => {
                tokio::time::sleep(self.rate_limit).await;
                self.query.cursor = Some(cursor);
                Some(self.fetch().await)
            }
        }
    }

    /// The same traversal as a stream; it ends where [`next`](Self::next)
    /// would return `None`.
    pub fn into_stream(self) -> impl Stream<Item = AppResult<PageEvent>> + Send {
        stream::unfold(self, |mut paginator| async move {
            paginator.next().await.map(|item| (item, paginator))
        })
    }

    async fn fetch(&mut self) -> AppResult<PageEvent> {
        // Phase stays `Done` if the fetch fails.
        let page = self.source.fetch_events(&self.query).await?;
        self.state.pages_seen += 1;
        self.state.phase = match &page.next {
            Some(cursor) => Phase::Next(cursor.clone()),
            None => Phase::Exhausted,
        };

        tracing::debug!(
            page = self.state.pages_seen,
            direction = ?self.state.direction,
            next_cursor = ?self.state.cursor(),
            events = page.asset_events.len(),
            has_next = page.next.is_some(),
            "Fetched events page"
        );
        Ok(PageEvent::Page(page))
    }
}
