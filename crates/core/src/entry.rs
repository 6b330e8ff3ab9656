//! History entry types.
//!
//! A history entry is one stored record of a user's term or report query and
//! its normalized result. Entries are append-only: corrections are new
//! entries, and the only mutations are whole-entry deletion and
//! clear-for-user.

use crate::normalize::{NormalizeStatus, NormalizedResult};
use chrono::{DateTime, Utc};
use medilingua_types::{NonEmptyText, UserId};
use serde::{Deserialize, Serialize};

/// Current on-disk schema version.
///
/// Version 1 covers the two historical shapes this project stored before the
/// schema was pinned (a flat `{type, original, simplified, timestamp}` record
/// and a `{type, data: {...}}` nesting). Entries without a version tag are
/// treated as version 1 and adapted on read; see `store::file`.
pub const SCHEMA_VERSION: u32 = 2;

/// Discriminator between a term-simplification query and a report-analysis
/// query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Term,
    Report,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Term => "term",
            QueryKind::Report => "report",
        }
    }
}

impl std::str::FromStr for QueryKind {
    type Err = crate::HistoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "term" => Ok(QueryKind::Term),
            "report" => Ok(QueryKind::Report),
            other => Err(crate::HistoryError::InvalidInput(format!(
                "unknown query kind '{other}' (expected 'term' or 'report')"
            ))),
        }
    }
}

/// The fields the service supplies when appending; the store assigns the
/// rest (`id`, `created_at`, `seq`).
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub user_id: UserId,
    pub kind: QueryKind,
    pub original_input: NonEmptyText,
    pub result: NormalizedResult,
    pub status: NormalizeStatus,
}

/// A durably stored history entry in its canonical (version 2) shape.
///
/// Immutable after creation. `seq` is a store-assigned insertion counter
/// used only to break `created_at` ties with insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntry {
    pub id: String,
    pub user_id: UserId,
    pub kind: QueryKind,
    pub original_input: NonEmptyText,
    pub result: NormalizedResult,
    pub status: NormalizeStatus,
    pub created_at: DateTime<Utc>,
    pub seq: u64,
    pub schema_version: u32,
}

/// Per-kind usage statistics for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KindStats {
    pub kind: QueryKind,
    pub count: usize,
    pub last_used: Option<DateTime<Utc>>,
}
