//! Per-call transcript fetch with a local file cache.
//!
//! Transcripts are large and immutable once a call has been processed by
//! the provider, so each one is cached as its own JSON file keyed by call
//! id. A sha256 content hash travels with the cached copy; a forced
//! re-fetch that produces the same hash leaves the file untouched.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::client::{CallSource, CallTranscript};
use super::store::{write_json_atomic, CacheError};
use super::GongApiError;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedTranscript {
    hash: String,
    fetched_at: String,
    transcript: CallTranscript,
}

pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

fn transcript_path(transcripts_dir: &Path, call_id: &str) -> PathBuf {
    // Call ids are opaque; keep the filename safe regardless of what the
    // provider puts in them.
    let safe: String = call_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    transcripts_dir.join(format!("{}.json", safe))
}

/// Fetch one call's transcript, serving from the file cache when present.
///
/// `force` bypasses the cached copy and asks the provider again; the cache
/// file is only rewritten when the content hash changed. Returns `Ok(None)`
/// when the provider has no transcript for the call.
pub async fn fetch_transcript_cached(
    source: &dyn CallSource,
    call_id: &str,
    transcripts_dir: &Path,
    force: bool,
) -> Result<Option<CallTranscript>, GongApiError> {
    let path = transcript_path(transcripts_dir, call_id);

    let cached: Option<CachedTranscript> = match std::fs::read_to_string(&path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(cached) => Some(cached),
            Err(e) => {
                log::warn!("Corrupt transcript cache {}: {}", path.display(), e);
                None
            }
        },
        Err(_) => None,
    };

    if !force {
        if let Some(cached) = &cached {
            log::debug!("Using cached transcript for call {}", call_id);
            return Ok(Some(cached.transcript.clone()));
        }
    }

    let fetched = source
        .fetch_transcripts(&[call_id.to_string()])
        .await?
        .into_iter()
        .find(|t| t.call_id == call_id);

    let Some(transcript) = fetched else {
        return Ok(cached.map(|c| c.transcript));
    };

    let hash = content_hash(&transcript.text);
    let unchanged = cached.as_ref().is_some_and(|c| c.hash == hash);
    if !unchanged {
        let entry = CachedTranscript {
            hash,
            fetched_at: Utc::now().to_rfc3339(),
            transcript: transcript.clone(),
        };
        write_json_atomic(&path, &entry).map_err(|e| match e {
            CacheError::Io(io) => GongApiError::Io(io),
            CacheError::Json(json) => GongApiError::Json(json),
        })?;
    }

    Ok(Some(transcript))
}
