//! Backfill and incremental sync engines.
//!
//! Pages are pulled strictly sequentially with a blocking delay between
//! requests — the provider rate limit is the constraint, not throughput.
//! Each page is normalized, enriched, merged, and saved before the next
//! request: on a mid-run failure everything fetched so far is already on
//! disk and a retry only has to cover the remaining window. `last_sync_at`
//! advances only when the whole window completed, so incremental sync never
//! skips the unfinished remainder.
//!
//! There is no cancellation primitive for a running sync; terminate the
//! process to abort.

use std::time::Duration;

use chrono::{DateTime, Months, Utc};

use crate::config::GongConfig;

use super::cache::{normalize_call, SyncResult};
use super::client::CallSource;
use super::pager::CallPager;
use super::store::{CacheError, CacheStore};
use super::GongApiError;

/// Overlap subtracted from `last_sync_at` on incremental sync, so calls
/// landing while the previous run was finishing are not missed.
const SYNC_OVERLAP_MINUTES: i64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Provider(#[from] GongApiError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

#[derive(Debug, Clone, Default)]
pub struct BackfillOptions {
    /// Historical window in months; falls back to the configured default.
    pub months: Option<u32>,
    /// Inter-page delay in milliseconds; falls back to the configured default.
    pub delay_ms: Option<u64>,
}

pub struct SyncEngine<'a> {
    source: &'a dyn CallSource,
    store: &'a CacheStore,
    config: &'a GongConfig,
}

impl<'a> SyncEngine<'a> {
    pub fn new(source: &'a dyn CallSource, store: &'a CacheStore, config: &'a GongConfig) -> Self {
        Self {
            source,
            store,
            config,
        }
    }

    /// Bulk historical sync: pull the last N months into the cache.
    ///
    /// Safe to re-run with overlapping windows; merge is keyed by call id.
    pub async fn backfill(&self, options: &BackfillOptions) -> Result<SyncResult, SyncError> {
        let months = options.months.unwrap_or(self.config.backfill_months);
        let delay = Duration::from_millis(options.delay_ms.unwrap_or(self.config.delay_ms));

        let to = Utc::now();
        let from = to.checked_sub_months(Months::new(months)).unwrap_or(to);

        log::info!("Backfilling {} months of calls", months);
        self.pull_window(from, to, delay).await
    }

    /// Incremental sync: pull everything since the last successful run,
    /// with a small overlap.
    pub async fn sync(&self) -> Result<SyncResult, SyncError> {
        let index = self.store.load();
        let last = super::cache::parse_timestamp(&index.last_sync_at)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        let to = Utc::now();
        let from = last - chrono::Duration::minutes(SYNC_OVERLAP_MINUTES);

        log::info!("Syncing calls since {}", from.to_rfc3339());
        self.pull_window(from, to, Duration::from_millis(self.config.delay_ms))
            .await
    }

    async fn pull_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        delay: Duration,
    ) -> Result<SyncResult, SyncError> {
        let mut index = self.store.load();
        let mut pager = CallPager::new(
            self.source,
            from.to_rfc3339(),
            to.to_rfc3339(),
            self.config.max_pages,
        );

        let mut new_calls = 0;
        let mut updated_calls = 0;

        loop {
            if pager.pages_fetched() > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let page = match pager.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(e) => {
                    // Everything fetched before this page is already saved.
                    log::warn!(
                        "Sync aborted after {} pages: {}",
                        pager.pages_fetched(),
                        e
                    );
                    return Err(e.into());
                }
            };

            let now = Utc::now();
            let fetched = page.calls.len();
            let mut records = Vec::with_capacity(fetched);
            for raw in page.calls {
                match normalize_call(raw, &self.config.seller_aliases, now) {
                    Some(record) => records.push(record),
                    None => log::warn!("Dropping call without an id from provider page"),
                }
            }

            let counts = index.upsert(records);
            new_calls += counts.new_count;
            updated_calls += counts.updated_count;
            self.store.save(&mut index)?;

            log::info!(
                "Page {}: {} calls ({} new, {} updated so far)",
                pager.pages_fetched(),
                fetched,
                new_calls,
                updated_calls
            );
        }

        index.last_sync_at = to.to_rfc3339();
        self.store.save(&mut index)?;

        let result = SyncResult {
            new_calls,
            updated_calls,
            total_calls: index.total_calls,
            synced_at: index.last_sync_at.clone(),
        };
        log::info!(
            "Sync complete: {} new, {} updated, {} total",
            result.new_calls,
            result.updated_calls,
            result.total_calls
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gong::client::{CallPage, CallTranscript, ListCallsRequest, RawCall};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted provider. `None` entries inject a provider failure.
    struct ScriptedSource {
        script: Mutex<Vec<Option<CallPage>>>,
        requests: Mutex<Vec<ListCallsRequest>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Option<CallPage>>) -> Self {
            let mut script = script;
            script.reverse();
            Self {
                script: Mutex::new(script),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CallSource for ScriptedSource {
        async fn list_calls(&self, request: &ListCallsRequest) -> Result<CallPage, GongApiError> {
            self.requests.lock().unwrap().push(request.clone());
            match self.script.lock().unwrap().pop() {
                Some(Some(page)) => Ok(page),
                Some(None) => Err(GongApiError::Api {
                    status: 503,
                    message: "upstream unavailable".to_string(),
                }),
                None => Ok(CallPage::default()),
            }
        }

        async fn fetch_transcripts(
            &self,
            _call_ids: &[String],
        ) -> Result<Vec<CallTranscript>, GongApiError> {
            Ok(Vec::new())
        }
    }

    fn raw_call(id: &str, title: &str, scheduled: &str) -> RawCall {
        RawCall {
            id: Some(id.to_string()),
            title: Some(title.to_string()),
            scheduled: Some(scheduled.to_string()),
            ..Default::default()
        }
    }

    fn page(calls: Vec<RawCall>, next_cursor: Option<&str>) -> Option<CallPage> {
        Some(CallPage {
            calls,
            next_cursor: next_cursor.map(String::from),
            total_records: None,
        })
    }

    fn test_config() -> GongConfig {
        GongConfig {
            delay_ms: 0,
            seller_aliases: vec!["initech".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_backfill_merges_across_pages() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let config = test_config();
        let source = ScriptedSource::new(vec![
            page(
                vec![
                    raw_call("a", "Acme <> Initech", "2026-01-10T10:00:00Z"),
                    raw_call("b", "Globex x Initech", "2026-01-12T15:00:00Z"),
                ],
                Some("cur-1"),
            ),
            page(vec![raw_call("c", "Tesla / Initech", "2026-01-20T09:00:00Z")], None),
        ]);

        let engine = SyncEngine::new(&source, &store, &config);
        let result = engine
            .backfill(&BackfillOptions {
                months: Some(3),
                delay_ms: Some(0),
            })
            .await
            .unwrap();

        assert_eq!(result.new_calls, 3);
        assert_eq!(result.updated_calls, 0);
        assert_eq!(result.total_calls, 3);

        let index = store.load();
        assert_eq!(index.total_calls, 3);
        assert_eq!(index.last_sync_at, result.synced_at);
        let acme = index.calls.iter().find(|c| c.id == "a").unwrap();
        assert!(acme.company_names.contains("acme"));
    }

    #[tokio::test]
    async fn test_second_run_reports_zero_new() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let config = test_config();
        let calls = || {
            vec![
                raw_call("a", "Acme <> Initech", "2026-01-10T10:00:00Z"),
                raw_call("b", "Globex x Initech", "2026-01-12T15:00:00Z"),
            ]
        };

        let first = ScriptedSource::new(vec![page(calls(), None)]);
        SyncEngine::new(&first, &store, &config)
            .backfill(&BackfillOptions::default())
            .await
            .unwrap();

        // Overlapping (subset) window returning the same calls.
        let second = ScriptedSource::new(vec![page(calls(), None)]);
        let result = SyncEngine::new(&second, &store, &config)
            .backfill(&BackfillOptions {
                months: Some(1),
                delay_ms: None,
            })
            .await
            .unwrap();

        assert_eq!(result.new_calls, 0);
        assert_eq!(result.updated_calls, 2);
        assert_eq!(result.total_calls, 2);
        assert_eq!(store.load().total_calls, 2);
    }

    #[tokio::test]
    async fn test_page_failure_keeps_partial_progress() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let config = test_config();
        let source = ScriptedSource::new(vec![
            page(vec![raw_call("a", "Acme <> Initech", "2026-01-10T10:00:00Z")], Some("cur-1")),
            None, // provider fails on page 2
        ]);

        let engine = SyncEngine::new(&source, &store, &config);
        let err = engine.backfill(&BackfillOptions::default()).await;
        assert!(matches!(err, Err(SyncError::Provider(_))));

        // Page 1 survived; the window is not marked complete.
        let index = store.load();
        assert_eq!(index.total_calls, 1);
        assert_eq!(index.last_sync_at, "1970-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn test_runaway_cursor_aborts_with_partial_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let mut config = test_config();
        config.max_pages = 2;
        let source = ScriptedSource::new(vec![
            page(vec![raw_call("a", "Acme <> Initech", "2026-01-10T10:00:00Z")], Some("cur")),
            page(vec![raw_call("b", "Globex x Initech", "2026-01-11T10:00:00Z")], Some("cur")),
            page(vec![raw_call("c", "Hooli <> Initech", "2026-01-12T10:00:00Z")], Some("cur")),
        ]);

        let engine = SyncEngine::new(&source, &store, &config);
        let err = engine.backfill(&BackfillOptions::default()).await;
        assert!(matches!(
            err,
            Err(SyncError::Provider(GongApiError::PaginationRunaway { pages: 2 }))
        ));
        assert_eq!(store.load().total_calls, 2);
    }

    #[tokio::test]
    async fn test_calls_without_id_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let config = test_config();
        let source = ScriptedSource::new(vec![page(
            vec![
                raw_call("a", "Acme <> Initech", "2026-01-10T10:00:00Z"),
                RawCall {
                    title: Some("orphan".to_string()),
                    ..Default::default()
                },
            ],
            None,
        )]);

        let engine = SyncEngine::new(&source, &store, &config);
        let result = engine.backfill(&BackfillOptions::default()).await.unwrap();
        assert_eq!(result.new_calls, 1);
        assert_eq!(result.total_calls, 1);
    }

    #[tokio::test]
    async fn test_incremental_sync_window_overlaps_last_sync() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let config = test_config();

        let mut index = crate::gong::cache::CacheIndex::default();
        index.last_sync_at = "2026-02-01T12:00:00Z".to_string();
        store.save(&mut index).unwrap();

        let source = ScriptedSource::new(vec![page(Vec::new(), None)]);
        SyncEngine::new(&source, &store, &config).sync().await.unwrap();

        let requests = source.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        // 5-minute overlap before the recorded last_sync_at.
        assert_eq!(requests[0].from_date_time, "2026-02-01T11:55:00+00:00");
        assert!(requests[0].cursor.is_none());
    }

    #[tokio::test]
    async fn test_sync_on_fresh_cache_starts_at_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let config = test_config();

        let source = ScriptedSource::new(vec![page(Vec::new(), None)]);
        SyncEngine::new(&source, &store, &config).sync().await.unwrap();

        let requests = source.requests.lock().unwrap();
        assert!(requests[0].from_date_time.starts_with("1969-12-31T23:55:00"));
    }
}
