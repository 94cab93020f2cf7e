//! Gong integration: local call cache over the Gong REST API.
//!
//! Direct HTTP via reqwest with Basic auth from an access key/secret pair.
//! The cache is a single JSON document on disk; sync pulls paginated call
//! listings, enriches them with extracted company names, and merges by call
//! id. Queries never touch the network.
//!
//! Modules:
//! - client: HTTP provider client + wire types
//! - pager: restartable page sequence with a hard ceiling
//! - cache: call records, index document, merge-by-id upsert
//! - store: load/save of the index with whole-file replace
//! - enrichment: company-name and participant-domain extraction
//! - sync: backfill and incremental sync engines
//! - query: account-scoped lookup and cache stats
//! - transcripts: per-call transcript fetch with content-hash cache

pub mod cache;
pub mod client;
pub mod enrichment;
pub mod pager;
pub mod query;
pub mod store;
pub mod sync;
pub mod transcripts;

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum GongApiError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Gong API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Gong credentials not found at {0}")]
    CredentialsNotFound(PathBuf),
    #[error("Invalid Gong credentials: {0}")]
    InvalidCredentials(String),
    #[error("Pagination did not terminate after {pages} pages")]
    PaginationRunaway { pages: u32 },
    #[error("Request exhausted retries")]
    RetriesExhausted,
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Retry
// ============================================================================

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retryable,
    NonRetryable,
}

fn retry_decision_for_status(status: reqwest::StatusCode) -> RetryDecision {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        RetryDecision::Retryable
    } else {
        RetryDecision::NonRetryable
    }
}

fn retry_delay(
    attempt: u32,
    policy: &RetryPolicy,
    retry_after: Option<&reqwest::header::HeaderValue>,
) -> Duration {
    if let Some(value) = retry_after.and_then(|v| v.to_str().ok()) {
        if let Ok(secs) = value.parse::<u64>() {
            return Duration::from_secs(secs.min(30));
        }
    }

    let exponent = 2u64.saturating_pow(attempt.saturating_sub(1));
    let base = policy
        .initial_backoff_ms
        .saturating_mul(exponent)
        .min(policy.max_backoff_ms);
    let jitter = (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0))
        % 150;
    Duration::from_millis(base.saturating_add(jitter))
}

/// Send a request, retrying transient failures with capped backoff.
///
/// Retryable: transport timeouts/connect errors, HTTP 408/429/5xx. A
/// Retry-After header on the response takes precedence over the computed
/// backoff (capped at 30s).
pub async fn send_with_retry(
    request: reqwest::RequestBuilder,
    policy: &RetryPolicy,
) -> Result<reqwest::Response, GongApiError> {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        let Some(cloned) = request.try_clone() else {
            return request.send().await.map_err(GongApiError::Http);
        };

        match cloned.send().await {
            Ok(response) => {
                let status = response.status();
                let decision = retry_decision_for_status(status);
                if decision == RetryDecision::Retryable && attempt < attempts {
                    let delay = retry_delay(
                        attempt,
                        policy,
                        response.headers().get(reqwest::header::RETRY_AFTER),
                    );
                    log::warn!(
                        "gong retry {}/{} after status {} (sleep {:?})",
                        attempt,
                        attempts,
                        status,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Ok(response);
            }
            Err(err) => {
                let retryable_transport = err.is_timeout() || err.is_connect();
                if retryable_transport && attempt < attempts {
                    let delay = retry_delay(attempt, policy, None);
                    log::warn!(
                        "gong retry {}/{} after transport error: {} (sleep {:?})",
                        attempt,
                        attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(GongApiError::Http(err));
            }
        }
    }

    Err(GongApiError::RetriesExhausted)
}

// ============================================================================
// Credentials
// ============================================================================

/// Gong API access key/secret pair.
///
/// Read from `~/.dealdesk/gong/credentials.json`; the `GONG_ACCESS_KEY` /
/// `GONG_ACCESS_SECRET` env vars override the file when both are set.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GongCredentials {
    pub access_key: String,
    pub access_secret: String,
}

/// Canonical path to the Gong credentials file.
pub fn credentials_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".dealdesk")
        .join("gong")
        .join("credentials.json")
}

/// Load credentials from env or the credentials file.
pub fn load_credentials() -> Result<GongCredentials, GongApiError> {
    if let (Ok(key), Ok(secret)) = (
        std::env::var("GONG_ACCESS_KEY"),
        std::env::var("GONG_ACCESS_SECRET"),
    ) {
        if !key.is_empty() && !secret.is_empty() {
            return Ok(GongCredentials {
                access_key: key,
                access_secret: secret,
            });
        }
    }

    let path = credentials_path();
    if !path.exists() {
        return Err(GongApiError::CredentialsNotFound(path));
    }
    let content = std::fs::read_to_string(&path)?;
    serde_json::from_str(&content)
        .map_err(|e| GongApiError::InvalidCredentials(format!("{}: {}", path.display(), e)))
}
