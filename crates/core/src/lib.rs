//! # MediLingua Core
//!
//! History persistence and response normalization for the MediLingua
//! medical-text simplification service.
//!
//! This crate contains pure data operations and per-user history storage:
//! - Normalization of raw LLM output into fixed result schemas
//!   ([`normalize`])
//! - Durable, append-only, per-user history storage ([`store`])
//! - Orchestration combining identity, normalization, and storage
//!   ([`service`])
//!
//! **No API concerns**: HTTP servers, request/response DTOs, and OpenAPI
//! documentation belong in `api-rest` and `api-shared`.

pub mod config;
pub mod entry;
pub mod error;
pub mod normalize;
pub mod service;
pub mod store;
pub mod user;

pub use config::CoreConfig;
pub use entry::{KindStats, NewEntry, QueryKind, StoredEntry, SCHEMA_VERSION};
pub use error::{HistoryError, HistoryResult};
pub use normalize::{
    normalize, MedicalTermEntry, NormalizeStatus, NormalizedResult, ReportResult, TermResult,
    FAILURE_MARKER,
};
pub use service::{GroupedHistory, HistoryService, RecordOutcome, PERSIST_WARNING};
pub use store::{FileHistoryStore, HistoryStore, MemoryHistoryStore};
pub use user::{SharedSecretUserContext, UserContext};
