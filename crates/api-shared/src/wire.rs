//! Wire DTOs for the REST API.
//!
//! Raw LLM results arrive as arbitrary JSON (`serde_json::Value`); the
//! normalized result leaves as a plain JSON object whose shape depends on
//! the entry kind. Both are declared as free-form objects in the OpenAPI
//! schema.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Generic error body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

/// Record a simplified term into history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordTermReq {
    /// The original term the user searched for.
    pub term: String,
    /// The raw LLM completion for that term, in whatever shape it arrived.
    #[schema(value_type = Object)]
    pub result: Value,
}

/// Record an analyzed report into history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordReportReq {
    /// The original report text the user submitted.
    pub report_text: String,
    /// The raw LLM analysis, in whatever shape it arrived.
    #[schema(value_type = Object)]
    pub result: Value,
}

/// One stored history entry, in its canonical shape.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntryDto {
    pub id: String,
    /// `"term"` or `"report"`.
    pub kind: String,
    pub original_input: String,
    /// Normalized result object; shape depends on `kind`.
    #[schema(value_type = Object)]
    pub result: Value,
    /// `"ok"`, `"partialFailure"`, or `"unparseable"`.
    pub status: String,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

/// Response to a record request.
///
/// `entry` is absent exactly when `warning` is present: the simplification
/// succeeded but history persistence was skipped.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordRes {
    #[schema(value_type = Object)]
    pub result: Value,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntryDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// A user's history grouped by kind, each group ordered newest-first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListHistoryRes {
    pub terms: Vec<EntryDto>,
    pub reports: Vec<EntryDto>,
}

/// Response to deleting a single entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteRes {
    pub deleted: bool,
}

/// Response to clearing a user's history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClearRes {
    pub deleted_count: usize,
}

/// Per-kind usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KindStatsDto {
    pub kind: String,
    pub count: usize,
    /// RFC 3339 timestamp of the most recent entry of this kind, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<String>,
}

/// Response to a stats request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryStatsRes {
    pub stats: Vec<KindStatsDto>,
}
