//! # API REST
//!
//! REST API implementation for MediLingua's history subsystem.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, bearer credentials,
//!   error-to-status mapping)
//!
//! Uses `api-shared` for the wire types and `medilingua-core` for all
//! behaviour. The raw LLM result arrives in the request body because the LLM
//! call itself happens upstream and is out of scope here.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api_shared::{
    ClearRes, DeleteRes, EntryDto, ErrorRes, HealthRes, HealthService, HistoryStatsRes,
    KindStatsDto, ListHistoryRes, RecordReportReq, RecordRes, RecordTermReq,
};
use medilingua_core::{HistoryError, HistoryService, KindStats, QueryKind, StoredEntry};

/// Application state shared across REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<HistoryService>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        record_term,
        record_report,
        list_history,
        history_stats,
        get_entry,
        delete_entry,
        clear_history,
    ),
    components(schemas(
        HealthRes,
        ErrorRes,
        RecordTermReq,
        RecordReportReq,
        RecordRes,
        EntryDto,
        ListHistoryRes,
        HistoryStatsRes,
        KindStatsDto,
        DeleteRes,
        ClearRes,
    ))
)]
pub struct ApiDoc;

/// Build the REST router around a configured history service.
pub fn build_router(service: Arc<HistoryService>) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/health", get(health))
        .route("/history", get(list_history))
        .route("/history", delete(clear_history))
        .route("/history/terms", post(record_term))
        .route("/history/reports", post(record_report))
        .route("/history/stats", get(history_stats))
        .route("/history/:id", get(get_entry))
        .route("/history/:id", delete(delete_entry))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// REST-facing error wrapper mapping the core taxonomy onto HTTP statuses.
struct ApiError(HistoryError);

impl From<HistoryError> for ApiError {
    fn from(e: HistoryError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            HistoryError::Unauthenticated(_) => {
                (StatusCode::UNAUTHORIZED, "Authentication required".to_owned())
            }
            HistoryError::InvalidInput(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
            HistoryError::NotFound => {
                (StatusCode::NOT_FOUND, "History entry not found".to_owned())
            }
            HistoryError::StorageUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "History storage unavailable".to_owned(),
            ),
        };

        if status.is_server_error() {
            tracing::error!("request failed: {:?}", self.0);
        }
        (status, Json(ErrorRes { error: message })).into_response()
    }
}

/// Pull the bearer credential out of the `Authorization` header.
fn bearer_credential(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            ApiError(HistoryError::Unauthenticated(
                "missing bearer credential".into(),
            ))
        })
}

fn entry_dto(entry: StoredEntry) -> EntryDto {
    EntryDto {
        id: entry.id,
        kind: entry.kind.as_str().to_owned(),
        original_input: entry.original_input.as_str().to_owned(),
        result: serde_json::to_value(&entry.result).unwrap_or(serde_json::Value::Null),
        status: entry.status.as_str().to_owned(),
        created_at: entry.created_at.to_rfc3339(),
    }
}

fn stats_dto(stats: Vec<KindStats>) -> HistoryStatsRes {
    HistoryStatsRes {
        stats: stats
            .into_iter()
            .map(|s| KindStatsDto {
                kind: s.kind.as_str().to_owned(),
                count: s.count,
                last_used: s.last_used.map(|t| t.to_rfc3339()),
            })
            .collect(),
    }
}

async fn record(
    state: &AppState,
    headers: &HeaderMap,
    kind: QueryKind,
    original_input: &str,
    raw_result: &serde_json::Value,
) -> Result<(StatusCode, Json<RecordRes>), ApiError> {
    let credential = bearer_credential(headers)?;
    let outcome = state
        .service
        .record(credential, kind, original_input, raw_result)
        .await?;

    // 201 when the entry landed in history; 200 with a warning when
    // persistence was skipped but the primary result survived.
    let status = if outcome.entry.is_some() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let body = RecordRes {
        result: serde_json::to_value(&outcome.result).unwrap_or(serde_json::Value::Null),
        status: outcome.status.as_str().to_owned(),
        entry: outcome.entry.map(entry_dto),
        warning: outcome.warning,
    };
    Ok((status, Json(body)))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
#[axum::debug_handler]
async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/history/terms",
    request_body = RecordTermReq,
    responses(
        (status = 201, description = "Term recorded to history", body = RecordRes),
        (status = 200, description = "Term simplified but history persistence skipped", body = RecordRes),
        (status = 400, description = "Empty term", body = ErrorRes),
        (status = 401, description = "Missing or invalid credential", body = ErrorRes)
    )
)]
/// Record a simplified term into the caller's history.
///
/// The raw LLM result is normalized before storage; even an unparseable
/// result is stored, tagged, so the original search is never lost.
#[axum::debug_handler]
async fn record_term(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RecordTermReq>,
) -> Result<(StatusCode, Json<RecordRes>), ApiError> {
    record(&state, &headers, QueryKind::Term, &req.term, &req.result).await
}

#[utoipa::path(
    post,
    path = "/history/reports",
    request_body = RecordReportReq,
    responses(
        (status = 201, description = "Report analysis recorded to history", body = RecordRes),
        (status = 200, description = "Report analyzed but history persistence skipped", body = RecordRes),
        (status = 400, description = "Empty report text", body = ErrorRes),
        (status = 401, description = "Missing or invalid credential", body = ErrorRes)
    )
)]
/// Record an analyzed report into the caller's history.
#[axum::debug_handler]
async fn record_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RecordReportReq>,
) -> Result<(StatusCode, Json<RecordRes>), ApiError> {
    record(
        &state,
        &headers,
        QueryKind::Report,
        &req.report_text,
        &req.result,
    )
    .await
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
struct ListParams {
    /// Restrict the listing to one kind: `term` or `report`.
    kind: Option<String>,
}

#[utoipa::path(
    get,
    path = "/history",
    params(ListParams),
    responses(
        (status = 200, description = "The caller's history, grouped by kind", body = ListHistoryRes),
        (status = 400, description = "Unknown kind filter", body = ErrorRes),
        (status = 401, description = "Missing or invalid credential", body = ErrorRes),
        (status = 503, description = "History storage unavailable", body = ErrorRes)
    )
)]
/// List the caller's history, newest first within each group.
#[axum::debug_handler]
async fn list_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<ListHistoryRes>, ApiError> {
    let credential = bearer_credential(&headers)?;
    let kind_filter = params
        .kind
        .as_deref()
        .map(str::parse::<QueryKind>)
        .transpose()?;

    let grouped = state.service.list(credential, kind_filter).await?;
    Ok(Json(ListHistoryRes {
        terms: grouped.terms.into_iter().map(entry_dto).collect(),
        reports: grouped.reports.into_iter().map(entry_dto).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/history/stats",
    responses(
        (status = 200, description = "Per-kind usage statistics", body = HistoryStatsRes),
        (status = 401, description = "Missing or invalid credential", body = ErrorRes),
        (status = 503, description = "History storage unavailable", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn history_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<HistoryStatsRes>, ApiError> {
    let credential = bearer_credential(&headers)?;
    let stats = state.service.stats(credential).await?;
    Ok(Json(stats_dto(stats)))
}

#[utoipa::path(
    get,
    path = "/history/{id}",
    responses(
        (status = 200, description = "The requested entry", body = EntryDto),
        (status = 401, description = "Missing or invalid credential", body = ErrorRes),
        (status = 404, description = "Unknown or not-owned entry id", body = ErrorRes)
    )
)]
/// Fetch one history entry. Ids owned by other users look identical to
/// missing ids.
#[axum::debug_handler]
async fn get_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<EntryDto>, ApiError> {
    let credential = bearer_credential(&headers)?;
    let entry = state.service.get(credential, &id).await?;
    Ok(Json(entry_dto(entry)))
}

#[utoipa::path(
    delete,
    path = "/history/{id}",
    responses(
        (status = 200, description = "Entry deleted", body = DeleteRes),
        (status = 401, description = "Missing or invalid credential", body = ErrorRes),
        (status = 404, description = "Unknown or not-owned entry id", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn delete_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<DeleteRes>, ApiError> {
    let credential = bearer_credential(&headers)?;
    state.service.remove(credential, &id).await?;
    Ok(Json(DeleteRes { deleted: true }))
}

#[utoipa::path(
    delete,
    path = "/history",
    responses(
        (status = 200, description = "History cleared", body = ClearRes),
        (status = 401, description = "Missing or invalid credential", body = ErrorRes),
        (status = 503, description = "History storage unavailable", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn clear_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ClearRes>, ApiError> {
    let credential = bearer_credential(&headers)?;
    let deleted_count = state.service.clear(credential).await?;
    Ok(Json(ClearRes { deleted_count }))
}
