//! HTTP client for the Gong REST API.
//!
//! Uses reqwest with Basic auth (access key/secret). Wire types are fully
//! optional-field — provider payloads vary by endpoint and plan tier — and
//! normalization into cache records happens once, in the cache module.

use async_trait::async_trait;
use serde::Deserialize;

use super::{send_with_retry, GongApiError, GongCredentials, RetryPolicy};

// ============================================================================
// Wire types
// ============================================================================

/// One page request against the call listing.
#[derive(Debug, Clone)]
pub struct ListCallsRequest {
    /// Window start, ISO-8601.
    pub from_date_time: String,
    /// Window end, ISO-8601.
    pub to_date_time: String,
    /// Opaque pagination token from the previous page; `None` for the first.
    pub cursor: Option<String>,
}

/// A raw call as returned by the provider, before normalization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCall {
    pub id: Option<String>,
    #[serde(default, alias = "subject")]
    pub title: Option<String>,
    pub scheduled: Option<String>,
    #[serde(default, alias = "startTime")]
    pub started: Option<String>,
    /// Seconds.
    pub duration: Option<u64>,
    pub direction: Option<String>,
    pub system: Option<String>,
    pub scope: Option<String>,
    pub language: Option<String>,
    pub url: Option<String>,
    /// Absent entirely on the basic listing endpoint.
    pub parties: Option<Vec<RawParty>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawParty {
    pub email_address: Option<String>,
    pub name: Option<String>,
    pub affiliation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListCallsResponse {
    #[serde(default)]
    calls: Vec<RawCall>,
    records: Option<RecordsEnvelope>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordsEnvelope {
    cursor: Option<String>,
    total_records: Option<u64>,
}

/// One page of the call listing.
#[derive(Debug, Clone, Default)]
pub struct CallPage {
    pub calls: Vec<RawCall>,
    /// Token for the next page; `None` means the listing is exhausted.
    pub next_cursor: Option<String>,
    pub total_records: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptsResponse {
    #[serde(default, alias = "callTranscripts")]
    transcripts: Vec<RawTranscript>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTranscript {
    call_id: Option<String>,
    #[serde(default)]
    transcript: Vec<RawUtterance>,
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUtterance {
    speaker: Option<String>,
    text: Option<String>,
}

/// A normalized call transcript.
#[derive(Debug, Clone, PartialEq, serde::Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallTranscript {
    pub call_id: String,
    /// Speaker-prefixed lines, one utterance per line.
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

// ============================================================================
// Provider abstraction
// ============================================================================

/// The provider surface the sync engine consumes.
///
/// Listing must be safe to call repeatedly with the same cursor; the engine
/// retries pages on transient failure.
#[async_trait]
pub trait CallSource: Send + Sync {
    async fn list_calls(&self, request: &ListCallsRequest) -> Result<CallPage, GongApiError>;

    async fn fetch_transcripts(
        &self,
        call_ids: &[String],
    ) -> Result<Vec<CallTranscript>, GongApiError>;
}

// ============================================================================
// HTTP client
// ============================================================================

pub struct GongClient {
    http: reqwest::Client,
    base_url: String,
    credentials: GongCredentials,
    retry: RetryPolicy,
}

impl GongClient {
    pub fn new(credentials: GongCredentials, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            retry: RetryPolicy::default(),
        }
    }
}

#[async_trait]
impl CallSource for GongClient {
    async fn list_calls(&self, request: &ListCallsRequest) -> Result<CallPage, GongApiError> {
        let mut req = self
            .http
            .get(format!("{}/v2/calls", self.base_url))
            .basic_auth(
                &self.credentials.access_key,
                Some(&self.credentials.access_secret),
            )
            .query(&[
                ("fromDateTime", request.from_date_time.as_str()),
                ("toDateTime", request.to_date_time.as_str()),
            ]);
        if let Some(ref cursor) = request.cursor {
            req = req.query(&[("cursor", cursor.as_str())]);
        }

        let resp = send_with_retry(req, &self.retry).await?;
        let status = resp.status();

        // Gong answers 404 for a window containing no calls.
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(CallPage::default());
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GongApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ListCallsResponse = resp.json().await?;
        let (next_cursor, total_records) = match body.records {
            Some(records) => (records.cursor, records.total_records),
            None => (None, None),
        };

        Ok(CallPage {
            calls: body.calls,
            next_cursor,
            total_records,
        })
    }

    async fn fetch_transcripts(
        &self,
        call_ids: &[String],
    ) -> Result<Vec<CallTranscript>, GongApiError> {
        let body = serde_json::json!({ "filter": { "callIds": call_ids } });
        let req = self
            .http
            .post(format!("{}/v2/calls/transcript", self.base_url))
            .basic_auth(
                &self.credentials.access_key,
                Some(&self.credentials.access_secret),
            )
            .json(&body);

        let resp = send_with_retry(req, &self.retry).await?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GongApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: TranscriptsResponse = resp.json().await?;
        Ok(parsed
            .transcripts
            .into_iter()
            .filter_map(normalize_transcript)
            .collect())
    }
}

fn normalize_transcript(raw: RawTranscript) -> Option<CallTranscript> {
    let call_id = raw.call_id.filter(|id| !id.trim().is_empty())?;
    let text = raw
        .transcript
        .iter()
        .filter_map(|u| {
            let line = u.text.as_deref()?.trim();
            if line.is_empty() {
                return None;
            }
            Some(format!("{}: {}", u.speaker.as_deref().unwrap_or("Speaker"), line))
        })
        .collect::<Vec<_>>()
        .join("\n");

    Some(CallTranscript {
        call_id,
        text,
        summary: raw.summary,
    })
}
