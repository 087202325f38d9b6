//! In-memory store for uploaded payloads.
//!
//! Items only carry a `locator`; the bytes behind it live here, keyed by
//! content hash and served by the static retrieval endpoint. Nothing is ever
//! written to disk; like the board itself, uploads vanish with the process.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sha2::{Digest, Sha256};

/// Path prefix every locator starts with; the key follows.
pub const LOCATOR_PREFIX: &str = "/api/files/";

const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// One stored upload.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    /// Original filename, echoed in the content-disposition header.
    pub name: String,
    pub media_type: String,
    pub bytes: Bytes,
    pub created_at: DateTime<Utc>,
}

struct Slot {
    blob: StoredBlob,
    /// Identical payloads share one slot; the slot lives until every
    /// referencing item has been deleted.
    refs: usize,
}

/// Content-addressed upload store.
#[derive(Default)]
pub struct BlobStore {
    entries: DashMap<String, Slot>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a payload and returns its locator. Re-uploading identical
    /// bytes reuses the existing entry.
    pub fn put(&self, name: impl Into<String>, media_type: Option<String>, bytes: Bytes) -> String {
        let key = hex::encode(Sha256::digest(&bytes));
        let media_type = media_type
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| FALLBACK_MEDIA_TYPE.to_string());

        self.entries
            .entry(key.clone())
            .and_modify(|slot| slot.refs += 1)
            .or_insert_with(|| Slot {
                blob: StoredBlob {
                    name: name.into(),
                    media_type,
                    bytes,
                    created_at: Utc::now(),
                },
                refs: 1,
            });

        format!("{LOCATOR_PREFIX}{key}")
    }

    pub fn get(&self, key: &str) -> Option<StoredBlob> {
        self.entries.get(key).map(|entry| entry.blob.clone())
    }

    /// Drops one reference to the upload behind `locator`, removing the
    /// bytes once nothing points at them. Best-effort: an unknown or
    /// malformed locator just logs and reports `false`.
    pub fn discard(&self, locator: &str) -> bool {
        let Some(key) = locator_key(locator) else {
            tracing::warn!(%locator, "discard for unrecognized locator");
            return false;
        };

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().refs -= 1;
                if occupied.get().refs == 0 {
                    occupied.remove();
                    tracing::debug!(%key, "upload discarded");
                }
                true
            }
            Entry::Vacant(_) => {
                tracing::warn!(%key, "discard for unknown upload");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Extracts the store key from a locator, tolerating absolute URLs
/// (`http://host:port/api/files/<key>`) alongside bare paths.
pub fn locator_key(locator: &str) -> Option<&str> {
    let start = locator.rfind(LOCATOR_PREFIX)? + LOCATOR_PREFIX.len();
    let key = &locator[start..];
    (!key.is_empty()).then_some(key)
}

/// Guess a media type from a filename, for uploads that arrive without one.
pub fn guess_media_type(name: &str) -> String {
    let lower = name.to_lowercase();

    let guessed = if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else if lower.ends_with(".svg") {
        "image/svg+xml"
    } else if lower.ends_with(".pdf") {
        "application/pdf"
    } else if lower.ends_with(".txt") {
        "text/plain"
    } else if lower.ends_with(".md") {
        "text/markdown"
    } else if lower.ends_with(".json") {
        "application/json"
    } else if lower.ends_with(".html") {
        "text/html"
    } else if lower.ends_with(".zip") {
        "application/zip"
    } else if lower.ends_with(".mp3") {
        "audio/mpeg"
    } else if lower.ends_with(".mp4") {
        "video/mp4"
    } else {
        FALLBACK_MEDIA_TYPE
    };

    guessed.to_string()
}
