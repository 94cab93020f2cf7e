//! Restartable page sequence over the call listing.
//!
//! Pulls one page per `next_page` call so the consumer decides whether to
//! continue — the inter-page delay and partial-save policy live in the sync
//! engine, not here. A hard page ceiling guards against a provider whose
//! cursor never terminates.

use super::client::{CallPage, CallSource, ListCallsRequest};
use super::GongApiError;

pub struct CallPager<'a> {
    source: &'a dyn CallSource,
    from_date_time: String,
    to_date_time: String,
    cursor: Option<String>,
    pages_fetched: u32,
    max_pages: u32,
    done: bool,
}

impl<'a> CallPager<'a> {
    pub fn new(
        source: &'a dyn CallSource,
        from_date_time: impl Into<String>,
        to_date_time: impl Into<String>,
        max_pages: u32,
    ) -> Self {
        Self {
            source,
            from_date_time: from_date_time.into(),
            to_date_time: to_date_time.into(),
            cursor: None,
            pages_fetched: 0,
            max_pages: max_pages.max(1),
            done: false,
        }
    }

    /// How many pages have been fetched so far.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Fetch the next page, or `None` when the provider reports no further
    /// cursor. Exceeding the page ceiling while a cursor is still pending is
    /// an internal error, not a normal end of iteration.
    pub async fn next_page(&mut self) -> Result<Option<CallPage>, GongApiError> {
        if self.done {
            return Ok(None);
        }
        if self.pages_fetched >= self.max_pages {
            return Err(GongApiError::PaginationRunaway {
                pages: self.pages_fetched,
            });
        }

        let request = ListCallsRequest {
            from_date_time: self.from_date_time.clone(),
            to_date_time: self.to_date_time.clone(),
            cursor: self.cursor.clone(),
        };

        let page = self.source.list_calls(&request).await?;
        self.pages_fetched += 1;
        self.cursor = page.next_cursor.clone();
        if self.cursor.is_none() {
            self.done = true;
        }

        Ok(Some(page))
    }
}
