//! Call cache data model.
//!
//! A `CacheIndex` is the persisted document: every call the provider has
//! ever returned, merged by id, plus sync bookkeeping. Raw provider payloads
//! are normalized into `CallRecord`s exactly once, at ingestion — every
//! "maybe this field exists" decision lives in [`normalize_call`], and
//! consumers downstream see a fixed shape.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::client::RawCall;
use super::enrichment::extract_company_names;

/// Current schema version of the persisted index.
pub const SCHEMA_VERSION: u32 = 1;

/// One call as known to the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    /// Stable provider identifier; the merge key.
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Scheduled start (ISO-8601); the primary ordering key.
    #[serde(default)]
    pub scheduled: String,
    /// Actual start, when the provider reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<String>,
    #[serde(default)]
    pub duration_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    /// Conferencing system ("Zoom", "Teams", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// "External", "Internal".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Account names extracted from the title, lower-cased.
    #[serde(default)]
    pub company_names: BTreeSet<String>,
    /// Participant emails, lower-cased. `None` when the provider returned no
    /// participant data for this record (distinct from an empty list).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_emails: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_enriched_at: Option<String>,
}

/// The persisted cache document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheIndex {
    #[serde(default)]
    pub calls: Vec<CallRecord>,
    #[serde(default = "epoch_timestamp")]
    pub last_sync_at: String,
    /// Derived from `calls.len()`; recomputed on every save.
    #[serde(default)]
    pub total_calls: u64,
    #[serde(default = "current_version")]
    pub version: u32,
}

fn current_version() -> u32 {
    SCHEMA_VERSION
}

fn epoch_timestamp() -> String {
    "1970-01-01T00:00:00Z".to_string()
}

impl Default for CacheIndex {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            last_sync_at: epoch_timestamp(),
            total_calls: 0,
            version: SCHEMA_VERSION,
        }
    }
}

/// Outcome of one merge pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub new_count: usize,
    pub updated_count: usize,
}

impl CacheIndex {
    /// Merge records by id: unknown ids append, known ids replace in place.
    ///
    /// Pure in-memory operation; callers persist afterward. Positions of
    /// existing records are preserved — consumers must not rely on order and
    /// sort by `scheduled` when order matters.
    pub fn upsert(&mut self, records: Vec<CallRecord>) -> UpsertCounts {
        let mut positions: HashMap<String, usize> = self
            .calls
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();

        let mut counts = UpsertCounts::default();

        for record in records {
            match positions.get(&record.id) {
                Some(&i) => {
                    self.calls[i] = record;
                    counts.updated_count += 1;
                }
                None => {
                    positions.insert(record.id.clone(), self.calls.len());
                    self.calls.push(record);
                    counts.new_count += 1;
                }
            }
        }

        self.total_calls = self.calls.len() as u64;
        counts
    }
}

/// Summary of one sync run. Returned and logged, never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub new_calls: usize,
    pub updated_calls: usize,
    pub total_calls: u64,
    pub synced_at: String,
}

/// Normalize one raw provider call into a cache record, enriching as we go.
///
/// Returns `None` when the payload has no usable id — such records cannot be
/// merged and are dropped (callers log the skip). All other missing fields
/// degrade to absent/empty.
pub fn normalize_call(
    raw: RawCall,
    seller_aliases: &[String],
    now: DateTime<Utc>,
) -> Option<CallRecord> {
    let id = raw.id.filter(|id| !id.trim().is_empty())?;

    let title = raw.title.unwrap_or_default();
    let scheduled = raw
        .scheduled
        .clone()
        .or_else(|| raw.started.clone())
        .unwrap_or_else(|| now.to_rfc3339());

    let participant_emails = raw.parties.map(|parties| {
        parties
            .into_iter()
            .filter_map(|p| p.email_address)
            .filter(|e| !e.trim().is_empty())
            .map(|e| e.trim().to_lowercase())
            .collect::<BTreeSet<String>>()
    });

    Some(CallRecord {
        company_names: extract_company_names(&title, seller_aliases),
        id,
        title,
        scheduled,
        started: raw.started,
        duration_seconds: raw.duration.unwrap_or(0),
        direction: raw.direction,
        system: raw.system,
        scope: raw.scope,
        language: raw.language,
        url: raw.url,
        participant_emails,
        last_enriched_at: Some(now.to_rfc3339()),
    })
}

/// Parse an ISO timestamp, tolerating a bare `Z` suffix.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(&s.replace('Z', "+00:00"))
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
