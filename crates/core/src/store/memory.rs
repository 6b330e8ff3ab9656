//! In-memory history storage for tests and local development.

use crate::entry::{KindStats, NewEntry, QueryKind, StoredEntry, SCHEMA_VERSION};
use crate::error::{HistoryError, HistoryResult};
use crate::store::{compute_stats, sort_canonical, HistoryStore};
use chrono::Utc;
use medilingua_types::UserId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Non-durable store keeping all entries in a single mutex-guarded vector.
///
/// Mirrors the ordering and ownership semantics of [`super::FileHistoryStore`]
/// exactly, so service-level tests can substitute it freely.
#[derive(Default)]
pub struct MemoryHistoryStore {
    entries: Mutex<Vec<StoredEntry>>,
    seq: AtomicU64,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> HistoryResult<std::sync::MutexGuard<'_, Vec<StoredEntry>>> {
        self.entries
            .lock()
            .map_err(|_| HistoryError::StorageUnavailable("history store mutex poisoned".into()))
    }
}

#[async_trait::async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, entry: NewEntry) -> HistoryResult<StoredEntry> {
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
        self.lock()?.push(stored.clone());
        Ok(stored)
    }

    async fn list_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        kind: Option<QueryKind>,
    ) -> HistoryResult<Vec<StoredEntry>> {
        let mut entries: Vec<StoredEntry> = self
            .lock()?
            .iter()
            .filter(|e| e.user_id == *user_id && kind.map_or(true, |k| e.kind == k))
            .cloned()
            .collect();
        sort_canonical(&mut entries);
        entries.truncate(limit);
        Ok(entries)
    }

    async fn get_by_id(&self, user_id: &UserId, id: &str) -> HistoryResult<Option<StoredEntry>> {
        Ok(self
            .lock()?
            .iter()
            .find(|e| e.user_id == *user_id && e.id == id)
            .cloned())
    }

    async fn delete_by_id(&self, user_id: &UserId, id: &str) -> HistoryResult<bool> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|e| !(e.user_id == *user_id && e.id == id));
        Ok(entries.len() < before)
    }

    async fn clear_for_user(&self, user_id: &UserId) -> HistoryResult<usize> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|e| e.user_id != *user_id);
        Ok(before - entries.len())
    }

    async fn stats_for_user(&self, user_id: &UserId) -> HistoryResult<Vec<KindStats>> {
        let entries: Vec<StoredEntry> = self
            .lock()?
            .iter()
            .filter(|e| e.user_id == *user_id)
            .cloned()
            .collect();
        Ok(compute_stats(&entries))
    }
}
