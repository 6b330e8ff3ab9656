//! File-backed history storage.
//!
//! ## Storage layout
//!
//! Entries are stored as one JSON file per entry under a per-user directory:
//!
//! ```text
//! <history_data_dir>/
//!   users/
//!     <user_id>/
//!       <created_at_millis>-<seq>-<entry_id>.json
//! ```
//!
//! The `UserId` character set guarantees the directory name is a safe single
//! path component. Every append writes a fresh, uniquely named file, so
//! concurrent appends for the same user never collide and never overwrite
//! one another.
//!
//! ## Legacy entries
//!
//! Before the schema was pinned, this project stored history in two other
//! shapes: a flat `{type, original, simplified, timestamp}` record where
//! `simplified` was sometimes an object and sometimes a JSON-encoded string,
//! and a `{type, data: {...}}` nesting. Files without a `schemaVersion` tag
//! are decoded from those shapes on read and their result payload is run
//! through the normalizer, so callers only ever see the canonical shape.
//! Files that match no known shape are logged and skipped, never fatal.

use crate::config::CoreConfig;
use crate::entry::{KindStats, NewEntry, QueryKind, StoredEntry, SCHEMA_VERSION};
use crate::error::{HistoryError, HistoryResult};
use crate::normalize::normalize;
use crate::store::{compute_stats, sort_canonical, HistoryStore};
use chrono::{DateTime, Utc};
use medilingua_types::{NonEmptyText, UserId};
use serde::Deserialize;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs;

/// Durable history store writing one JSON file per entry.
pub struct FileHistoryStore {
    cfg: Arc<CoreConfig>,
    /// In-process insertion counter; breaks `created_at` ties between
    /// appends that land within the same millisecond.
    seq: AtomicU64,
}

impl FileHistoryStore {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self {
            cfg,
            seq: AtomicU64::new(0),
        }
    }

    fn user_dir(&self, user_id: &UserId) -> PathBuf {
        self.cfg.users_dir().join(user_id.as_str())
    }

    /// Zero-padded millis first so lexicographic file listings roughly match
    /// chronological order; the id suffix guarantees uniqueness.
    fn entry_file_name(entry: &StoredEntry) -> String {
        format!(
            "{:013}-{:010}-{}.json",
            entry.created_at.timestamp_millis(),
            entry.seq,
            entry.id
        )
    }

    /// Read and decode every entry in a user's directory.
    ///
    /// Returns the file path alongside each entry so delete can remove the
    /// backing file. A missing directory means the user simply has no
    /// history yet.
    async fn read_user_entries(
        &self,
        user_id: &UserId,
    ) -> HistoryResult<Vec<(PathBuf, StoredEntry)>> {
        let dir = self.user_dir(user_id);
        let mut reader = match fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(dirent) = reader.next_entry().await? {
            let path = dirent.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let bytes = match fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!("failed to read history file {}: {}", path.display(), e);
                    continue;
                }
            };

            let fallback_created_at = file_modified_time(&path).await;
            match decode_entry(user_id, &path, &bytes, fallback_created_at) {
                Some(entry) => entries.push((path, entry)),
                None => {
                    tracing::warn!(
                        "skipping undecodable history file {} for user {}",
                        path.display(),
                        user_id
                    );
                }
            }
        }

        Ok(entries)
    }
}

#[async_trait::async_trait]
impl HistoryStore for FileHistoryStore {
    async fn append(&self, entry: NewEntry) -> HistoryResult<StoredEntry> {
        let dir = self.user_dir(&entry.user_id);
        fs::create_dir_all(&dir).await?;

        let stored = StoredEntry {
            id: uuid::Uuid::new_v4().simple().to_string(),
            user_id: entry.user_id,
            kind: entry.kind,
            original_input: entry.original_input,
            result: entry.result,
            status: entry.status,
            created_at: Utc::now(),
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
            schema_version: SCHEMA_VERSION,
        };

        let bytes = serde_json::to_vec_pretty(&stored)
            .map_err(|e| HistoryError::StorageUnavailable(e.to_string()))?;
        let path = dir.join(Self::entry_file_name(&stored));
        fs::write(&path, bytes).await?;

        tracing::info!(
            "history entry appended: user={} kind={} id={}",
            stored.user_id,
            stored.kind.as_str(),
            stored.id
        );
        Ok(stored)
    }

    async fn list_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        kind: Option<QueryKind>,
    ) -> HistoryResult<Vec<StoredEntry>> {
        let mut entries: Vec<StoredEntry> = self
            .read_user_entries(user_id)
            .await?
            .into_iter()
            .map(|(_, entry)| entry)
            .filter(|entry| kind.map_or(true, |k| entry.kind == k))
            .collect();

        sort_canonical(&mut entries);
        entries.truncate(limit);
        Ok(entries)
    }

    async fn get_by_id(&self, user_id: &UserId, id: &str) -> HistoryResult<Option<StoredEntry>> {
        let entries = self.read_user_entries(user_id).await?;
        Ok(entries
            .into_iter()
            .map(|(_, entry)| entry)
            .find(|entry| entry.id == id))
    }

    async fn delete_by_id(&self, user_id: &UserId, id: &str) -> HistoryResult<bool> {
        let entries = self.read_user_entries(user_id).await?;
        let Some((path, _)) = entries.into_iter().find(|(_, entry)| entry.id == id) else {
            return Ok(false);
        };

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            // Already gone: deleting a deleted entry is not an error storm.
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear_for_user(&self, user_id: &UserId) -> HistoryResult<usize> {
        let dir = self.user_dir(user_id);
        let mut reader = match fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut deleted = 0usize;
        while let Some(dirent) = reader.next_entry().await? {
            let path = dirent.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => deleted += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!("history cleared: user={} entries_deleted={}", user_id, deleted);
        Ok(deleted)
    }

    async fn stats_for_user(&self, user_id: &UserId) -> HistoryResult<Vec<KindStats>> {
        let entries: Vec<StoredEntry> = self
            .read_user_entries(user_id)
            .await?
            .into_iter()
            .map(|(_, entry)| entry)
            .collect();
        Ok(compute_stats(&entries))
    }
}

async fn file_modified_time(path: &std::path::Path) -> DateTime<Utc> {
    match fs::metadata(path).await.and_then(|m| m.modified()) {
        Ok(modified) => modified.into(),
        Err(_) => Utc::now(),
    }
}

/// Flat legacy shape: `{type, original, simplified, timestamp}` where
/// `simplified` is an object for terms and often a JSON-encoded string for
/// reports.
#[derive(Deserialize)]
struct LegacyFlatEntry {
    #[serde(rename = "type")]
    kind: QueryKind,
    original: String,
    simplified: Value,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default, rename = "_id")]
    id: Option<String>,
}

/// Nested legacy shape: `{type, data: {...}}` with the original text and
/// result payload under varying keys inside `data`.
#[derive(Deserialize)]
struct LegacyNestedEntry {
    #[serde(rename = "type")]
    kind: QueryKind,
    data: serde_json::Map<String, Value>,
    #[serde(default, rename = "_id")]
    id: Option<String>,
}

/// Decode one entry file, adapting legacy shapes to the canonical one.
fn decode_entry(
    user_id: &UserId,
    path: &std::path::Path,
    bytes: &[u8],
    fallback_created_at: DateTime<Utc>,
) -> Option<StoredEntry> {
    // Canonical shape first. The required `schemaVersion` field means legacy
    // files fall through rather than half-decoding.
    if let Ok(entry) = serde_json::from_slice::<StoredEntry>(bytes) {
        if entry.user_id != *user_id {
            // An entry in this user's directory claiming another owner is
            // corrupt; skipping keeps the ownership invariant intact.
            return None;
        }
        return Some(entry);
    }

    let file_stem_id = || {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("legacy")
            .to_owned()
    };

    if let Ok(legacy) = serde_json::from_slice::<LegacyFlatEntry>(bytes) {
        let original_input = NonEmptyText::new(&legacy.original).ok()?;
        let (result, status) = normalize(legacy.kind, &legacy.simplified);
        return Some(StoredEntry {
            id: legacy.id.unwrap_or_else(file_stem_id),
            user_id: user_id.clone(),
            kind: legacy.kind,
            original_input,
            result,
            status,
            created_at: legacy.timestamp.unwrap_or(fallback_created_at),
            seq: 0,
            schema_version: SCHEMA_VERSION,
        });
    }

    if let Ok(legacy) = serde_json::from_slice::<LegacyNestedEntry>(bytes) {
        let original = [
            "originalTerm",
            "originalText",
            "originalReport",
            "original",
            "term",
            "reportText",
        ]
            .iter()
            .find_map(|key| legacy.data.get(*key).and_then(Value::as_str))?;
        let original_input = NonEmptyText::new(original).ok()?;

        let raw = ["result", "analysis", "simplified"]
            .iter()
            .find_map(|key| legacy.data.get(*key))
            .cloned()
            .unwrap_or(Value::Null);
        let (result, status) = normalize(legacy.kind, &raw);

        let created_at = ["searchTimestamp", "analysisTimestamp", "timestamp"]
            .iter()
            .find_map(|key| legacy.data.get(*key).and_then(Value::as_str))
            .and_then(|s| s.parse::<DateTime<Utc>>().ok())
            .unwrap_or(fallback_created_at);

        return Some(StoredEntry {
            id: legacy.id.unwrap_or_else(file_stem_id),
            user_id: user_id.clone(),
            kind: legacy.kind,
            original_input,
            result,
            status,
            created_at,
            seq: 0,
            schema_version: SCHEMA_VERSION,
        });
    }

    None
}
