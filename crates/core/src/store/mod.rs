//! History storage.
//!
//! The per-user history collection is the only shared mutable resource in
//! the system and it is owned exclusively by a [`HistoryStore`]
//! implementation; no other component touches it directly. The trait is
//! async so callers can bound every operation with a timeout.
//!
//! Implementations:
//! - [`FileHistoryStore`] — durable, one JSON file per entry under a
//!   per-user directory.
//! - [`MemoryHistoryStore`] — in-process, for tests and local development.

pub mod file;
pub mod memory;

pub use file::FileHistoryStore;
pub use memory::MemoryHistoryStore;

use crate::entry::{KindStats, NewEntry, QueryKind, StoredEntry};
use crate::error::HistoryResult;
use medilingua_types::UserId;
use std::cmp::Reverse;

/// Durable, per-user, append-only storage of history entries.
///
/// Ownership is checked on every read and delete: an id owned by a different
/// user behaves exactly like a missing id.
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    /// Persist a new entry, assigning `id`, `created_at`, and `seq`.
    ///
    /// Safe to call concurrently for the same user: two simultaneous appends
    /// produce two independent entries, never a lost update.
    async fn append(&self, entry: NewEntry) -> HistoryResult<StoredEntry>;

    /// Entries for `user_id`, newest first (ties in insertion order), capped
    /// at `limit`, optionally filtered by kind.
    async fn list_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        kind: Option<QueryKind>,
    ) -> HistoryResult<Vec<StoredEntry>>;

    /// Look up one entry; `None` for a missing id or an id owned by another
    /// user.
    async fn get_by_id(&self, user_id: &UserId, id: &str) -> HistoryResult<Option<StoredEntry>>;

    /// Delete one entry; `false` for a missing or not-owned id.
    async fn delete_by_id(&self, user_id: &UserId, id: &str) -> HistoryResult<bool>;

    /// Delete all entries for a user, returning how many were removed.
    async fn clear_for_user(&self, user_id: &UserId) -> HistoryResult<usize>;

    /// Per-kind entry count and most recent use for a user.
    async fn stats_for_user(&self, user_id: &UserId) -> HistoryResult<Vec<KindStats>>;
}

/// Sort entries into the canonical retrieval order: `created_at` descending,
/// ties broken by insertion order (`seq` ascending, then id for entries
/// adapted from legacy files that share a seq of zero).
pub(crate) fn sort_canonical(entries: &mut [StoredEntry]) {
    entries.sort_by(|a, b| {
        (Reverse(a.created_at), a.seq, a.id.as_str())
            .cmp(&(Reverse(b.created_at), b.seq, b.id.as_str()))
    });
}

/// Fold a user's entries into per-kind statistics.
pub(crate) fn compute_stats(entries: &[StoredEntry]) -> Vec<KindStats> {
    let mut stats = Vec::new();
    for kind in [QueryKind::Term, QueryKind::Report] {
        let mut count = 0;
        let mut last_used = None;
        for entry in entries.iter().filter(|e| e.kind == kind) {
            count += 1;
            if last_used.map_or(true, |t| entry.created_at > t) {
                last_used = Some(entry.created_at);
            }
        }
        stats.push(KindStats {
            kind,
            count,
            last_used,
        });
    }
    stats
}
