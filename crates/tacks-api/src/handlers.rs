//! HTTP handlers: decode requests, drive the repository, encode responses.
//!
//! SQLite work is synchronous, so every repository call hops onto the
//! blocking pool via [`with_repo`]; dropping the request future (client
//! disconnect, pipeline timeout) abandons the result.

use crate::router::AppState;
use crate::validate::{self, ValidationErrors};
use anyhow::{anyhow, Context as _};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Deserializer};
use serde_json::json;
use tacks_core::db::repository::{IssueFilter, IssueUpdate, Repository};
use tacks_core::model::{Issue, Label, User};
use tracing::{error, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateIssueRequest {
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub assignee_id: Option<String>,
    pub label_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateIssueRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    /// Outer `None` = field absent; `Some(None)` = explicit null, which
    /// clears the assignee.
    #[serde(deserialize_with = "double_option")]
    pub assignee_id: Option<Option<String>>,
    pub order_index: Option<f64>,
    /// Replace semantics when present, untouched when absent.
    pub label_ids: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MoveRequest {
    pub status: Option<String>,
    pub order_index: Option<f64>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// Error envelope
// ---------------------------------------------------------------------------

/// Handler-level failures mapped onto the `{"error", "details"}` envelope.
///
/// Store failures stay opaque on the wire; the full chain is logged under
/// the request span. The repository's "issue not found" on update/delete
/// deliberately lands in `Internal` (only reads get a 404).
pub enum ApiError {
    Validation(ValidationErrors),
    InvalidBody(String),
    NotFound(&'static str),
    Internal {
        context: &'static str,
        source: anyhow::Error,
    },
}

impl ApiError {
    fn internal(context: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::Internal { context, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Validation failed",
                    "details": { "errors": errors.to_string() },
                })),
            )
                .into_response(),
            Self::InvalidBody(detail) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Invalid request body",
                    "details": { "error": detail },
                })),
            )
                .into_response(),
            Self::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            Self::Internal { context, source } => {
                error!(error = %format!("{source:#}"), "{context}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

/// Run a repository operation on the blocking pool.
async fn with_repo<T, F>(state: &AppState, op: F) -> anyhow::Result<T>
where
    F: FnOnce(&Repository) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let repo = state.repo.clone();
    tokio::task::spawn_blocking(move || op(&repo))
        .await
        .context("repository task panicked")?
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

pub async fn health(State(state): State<AppState>) -> Response {
    match with_repo(&state, |repo| repo.ping()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "database": "healthy" })),
        )
            .into_response(),
        Err(error) => {
            warn!(error = %format!("{error:#}"), "health probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "error", "database": "unhealthy" })),
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

pub async fn list_issues(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Issue>>, ApiError> {
    let filter = list_filter_from_pairs(pairs);
    let issues = with_repo(&state, move |repo| repo.get_issues(&filter))
        .await
        .map_err(ApiError::internal("list issues"))?;
    Ok(Json(issues))
}

/// Assemble the listing filter from raw query pairs. Repeated keys
/// accumulate for the multi-valued filters; for single-valued ones the first
/// occurrence wins. Unparseable `page`/`page_size` fall back to defaults.
fn list_filter_from_pairs(pairs: Vec<(String, String)>) -> IssueFilter {
    let mut filter = IssueFilter {
        page: 1,
        page_size: 0,
        ..IssueFilter::default()
    };
    let mut raw_page = None;
    let mut raw_page_size = None;

    for (key, value) in pairs {
        match key.as_str() {
            "status" => filter.status.push(value),
            "priority" => filter.priority.push(value),
            "labels" => filter.labels.push(value),
            "assignee" => {
                if filter.assignee.is_none() && !value.is_empty() {
                    filter.assignee = Some(value);
                }
            }
            "page" => {
                raw_page.get_or_insert(value);
            }
            "page_size" => {
                raw_page_size.get_or_insert(value);
            }
            _ => {}
        }
    }

    if let Some(page) = raw_page.and_then(|v| v.parse::<i64>().ok()).filter(|p| *p > 0) {
        filter.page = page;
    }
    if let Some(size) = raw_page_size
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|s| *s > 0)
    {
        filter.page_size = size;
    }
    filter
}

pub async fn create_issue(
    State(state): State<AppState>,
    payload: Result<Json<CreateIssueRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Issue>), ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::InvalidBody(e.body_text()))?;
    let (status, priority) = validate::create_issue(&req).map_err(ApiError::Validation)?;

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    let created = with_repo(&state, move |repo| {
        // New issues land at the top of their column: one less than the
        // current minimum, or 0 for an empty column.
        let order_index = repo
            .min_order_index(status.as_str())?
            .map_or(0.0, |min| min - 1.0);

        let issue = Issue {
            id: id.clone(),
            title: req.title,
            description: req.description,
            status,
            priority,
            assignee_id: req.assignee_id,
            assignee: None,
            labels: Vec::new(),
            created_at: now,
            updated_at: now,
            order_index,
        };
        repo.create_issue(&issue)?;
        if !req.label_ids.is_empty() {
            repo.update_issue_labels(&id, &req.label_ids)?;
        }
        repo.get_issue(&id)
    })
    .await
    .map_err(ApiError::internal("create issue"))?;

    match created {
        Some(issue) => Ok((StatusCode::CREATED, Json(issue))),
        None => Err(ApiError::Internal {
            context: "re-fetch created issue",
            source: anyhow!("issue row missing after insert"),
        }),
    }
}

pub async fn get_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Issue>, ApiError> {
    let issue = with_repo(&state, move |repo| repo.get_issue(&id))
        .await
        .map_err(ApiError::internal("fetch issue"))?;
    issue.map(Json).ok_or(ApiError::NotFound("Issue not found"))
}

pub async fn update_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateIssueRequest>, JsonRejection>,
) -> Result<Json<Issue>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::InvalidBody(e.body_text()))?;
    validate::update_issue(&req).map_err(ApiError::Validation)?;

    let mut updates = Vec::new();
    if let Some(title) = req.title {
        updates.push(IssueUpdate::Title(title));
    }
    if let Some(description) = req.description {
        updates.push(IssueUpdate::Description(description));
    }
    if let Some(status) = req.status {
        updates.push(IssueUpdate::Status(status));
    }
    if let Some(priority) = req.priority {
        updates.push(IssueUpdate::Priority(priority));
    }
    if let Some(assignee) = req.assignee_id {
        updates.push(IssueUpdate::Assignee(assignee));
    }
    if let Some(order_index) = req.order_index {
        updates.push(IssueUpdate::OrderIndex(order_index));
    }
    updates.push(IssueUpdate::UpdatedAt(Utc::now()));

    let updated = with_repo(&state, move |repo| {
        repo.update_issue(&id, &updates)?;
        if let Some(ref label_ids) = req.label_ids {
            repo.update_issue_labels(&id, label_ids)?;
        }
        repo.get_issue(&id)
    })
    .await
    .map_err(ApiError::internal("update issue"))?;

    match updated {
        Some(issue) => Ok(Json(issue)),
        None => Err(ApiError::Internal {
            context: "re-fetch updated issue",
            source: anyhow!("issue row missing after update"),
        }),
    }
}

/// The drag-and-drop hot path. The client computes the target
/// `order_index`; the server stores it verbatim. Status is intentionally not
/// domain-validated here; the store CHECK constraint is the backstop.
pub async fn move_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<MoveRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::InvalidBody(e.body_text()))?;

    let mut updates = vec![IssueUpdate::UpdatedAt(Utc::now())];
    if let Some(status) = req.status {
        updates.push(IssueUpdate::Status(status));
    }
    if let Some(order_index) = req.order_index {
        updates.push(IssueUpdate::OrderIndex(order_index));
    }

    with_repo(&state, move |repo| repo.update_issue(&id, &updates))
        .await
        .map_err(ApiError::internal("move issue"))?;
    Ok(StatusCode::OK)
}

pub async fn delete_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    with_repo(&state, move |repo| repo.delete_issue(&id))
        .await
        .map_err(ApiError::internal("delete issue"))?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Users & labels
// ---------------------------------------------------------------------------

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    let users = with_repo(&state, |repo| repo.get_users())
        .await
        .map_err(ApiError::internal("list users"))?;
    Ok(Json(users))
}

pub async fn list_labels(State(state): State<AppState>) -> Result<Json<Vec<Label>>, ApiError> {
    let labels = with_repo(&state, |repo| repo.get_labels())
        .await
        .map_err(ApiError::internal("list labels"))?;
    Ok(Json(labels))
}

/// JSON 404 for unmatched paths under `/api`; sits behind the auth layer so
/// unknown paths still demand a key.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not found")
}
