//! Account-scoped lookup over the cached index.
//!
//! Queries are pure reads of a loaded index — the provider is never
//! contacted here. Results come back most-recent-first; downstream
//! consumers (brief builders, deal reviews) rely on that ordering.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Serialize;

use super::cache::{parse_timestamp, CacheIndex, CallRecord};
use super::enrichment::extract_participant_domains;

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Truncate after sorting; `None` returns all matches.
    pub max_results: Option<usize>,
    /// Also match calls whose participants include an email at this domain.
    pub domain: Option<String>,
}

/// Find cached calls for an account, most recent first.
///
/// A record matches when the lower-cased query is a substring of any
/// extracted company name, or — when `domain` is given — any participant
/// email ends with `@domain`. No match is an empty list, not an error.
pub fn calls_for_account<'a>(
    index: &'a CacheIndex,
    name_or_query: &str,
    options: &QueryOptions,
) -> Vec<&'a CallRecord> {
    let query = name_or_query.trim().to_lowercase();
    let domain_suffix = options
        .domain
        .as_ref()
        .map(|d| format!("@{}", d.trim().trim_start_matches('@').to_lowercase()));

    let mut matches: Vec<&CallRecord> = index
        .calls
        .iter()
        .filter(|call| {
            let name_match =
                !query.is_empty() && call.company_names.iter().any(|name| name.contains(&query));
            let domain_match = match (&domain_suffix, &call.participant_emails) {
                (Some(suffix), Some(emails)) => emails.iter().any(|e| e.ends_with(suffix)),
                _ => false,
            };
            name_match || domain_match
        })
        .collect();

    matches.sort_by(|a, b| compare_scheduled_desc(a, b));

    if let Some(max) = options.max_results {
        matches.truncate(max);
    }
    matches
}

/// Most-recent-first ordering on `scheduled`. Unparsable timestamps fall
/// back to reverse-lexicographic comparison so the sort stays total.
fn compare_scheduled_desc(a: &CallRecord, b: &CallRecord) -> Ordering {
    match (parse_timestamp(&a.scheduled), parse_timestamp(&b.scheduled)) {
        (Some(ta), Some(tb)) => tb.cmp(&ta),
        _ => b.scheduled.cmp(&a.scheduled),
    }
}

/// Cache-wide summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_calls: u64,
    pub unique_companies: usize,
    /// Distinct external participant domains across all cached calls.
    pub unique_domains: usize,
    pub last_sync_at: String,
    /// `None` when the cache is empty.
    pub oldest_call: Option<String>,
    /// `None` when the cache is empty.
    pub newest_call: Option<String>,
}

pub fn stats(index: &CacheIndex, internal_domains: &[String]) -> CacheStats {
    let mut companies: BTreeSet<&str> = BTreeSet::new();
    let mut all_emails: Vec<String> = Vec::new();
    for call in &index.calls {
        companies.extend(call.company_names.iter().map(String::as_str));
        if let Some(emails) = &call.participant_emails {
            all_emails.extend(emails.iter().cloned());
        }
    }
    let domains = extract_participant_domains(&all_emails, internal_domains);

    let mut ordered: Vec<&CallRecord> = index.calls.iter().collect();
    ordered.sort_by(|a, b| compare_scheduled_desc(a, b));

    CacheStats {
        total_calls: index.total_calls,
        unique_companies: companies.len(),
        unique_domains: domains.len(),
        last_sync_at: index.last_sync_at.clone(),
        oldest_call: ordered.last().map(|c| c.scheduled.clone()),
        newest_call: ordered.first().map(|c| c.scheduled.clone()),
    }
}
