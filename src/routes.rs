//! HTTP surface.
//!
//! Handlers are thin: they decode the request, call one service, and encode
//! the result. Every failure is an `AppError`, rendered as an `ApiError`
//! body with the matching status.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{ApiError, AppError};
use crate::records::derive::refresh_total_man_months;
use crate::records::{
    apply_receipt_date, export_file_name, to_delimited_text, validate_required, Category, Record,
    RecordField, RecordInput, RecordQuery, RecordSubmission, DEFAULT_EXPORT_COLUMNS,
};
use crate::scheduler::{
    self, create_from_template, daily_monitoring_template, dashboard_check_template, presets,
    run_reminder,
};
use crate::services::files::MAX_FILE_MB;
use crate::state::AppState;
use crate::types::{FieldError, NewReminder};

/// Multipart overhead allowed on top of the largest accepted file.
const UPLOAD_BODY_LIMIT: usize = (MAX_FILE_MB as usize + 1) * 1024 * 1024;

type SharedState = Arc<AppState>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            log::warn!("Request failed: {}", self);
        }
        (status, Json(ApiError::from(&self))).into_response()
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/records", get(list_records).post(create_record))
        .route(
            "/api/records/next-task-number",
            get(next_task_number),
        )
        .route("/api/records/derive", post(derive_preview))
        .route("/api/records/export", get(export_records))
        .route("/api/records/:id", put(update_record).delete(delete_record))
        .route("/api/files/list", get(list_files))
        .route(
            "/api/files/upload",
            post(upload_file).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/files/download/:file_id", get(download_file))
        .route("/api/files/delete", axum::routing::delete(delete_file))
        .route("/api/scheduler", get(scheduler_status).post(trigger_template))
        .route("/api/scheduler/daily", get(run_daily).post(run_daily))
        .route(
            "/api/scheduler/dashboard",
            get(run_dashboard).post(run_dashboard),
        )
        .route("/api/reminders", get(list_reminders).post(add_reminder))
        .route(
            "/api/reminders/:id",
            axum::routing::patch(set_reminder_active).delete(delete_reminder),
        )
        .route("/api/reminders/:id/run", post(run_reminder_now))
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

async fn list_records(
    State(state): State<SharedState>,
    Query(query): Query<RecordQuery>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.records.query(&query).await?))
}

async fn create_record(
    State(state): State<SharedState>,
    Json(submission): Json<RecordSubmission>,
) -> Result<impl IntoResponse, AppError> {
    let record = state.records.create(submission).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn update_record(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(submission): Json<RecordSubmission>,
) -> Result<Json<Record>, AppError> {
    Ok(Json(state.records.update(&id, submission).await?))
}

async fn delete_record(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.records.delete(&id).await?;
    Ok(Json(json!({ "success": true, "id": id })))
}

#[derive(Debug, Deserialize)]
struct CategoryParam {
    #[serde(default)]
    category: String,
}

async fn next_task_number(
    State(state): State<SharedState>,
    Query(param): Query<CategoryParam>,
) -> Result<Json<serde_json::Value>, AppError> {
    let category = match param.category.trim() {
        "" => Category::FALLBACK.as_str().to_string(),
        label => Category::resolve(label, None),
    };
    let task_no = state.records.next_task_number(&category).await?;
    Ok(Json(json!({ "category": category, "taskNo": task_no.to_string() })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeriveRequest {
    #[serde(flatten)]
    submission: RecordSubmission,
    /// Field the form just edited. Receipt-date edits re-derive the dates.
    #[serde(default)]
    changed: Option<RecordField>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DerivePreview {
    input: RecordInput,
    errors: Vec<FieldError>,
}

/// What the form should show after an edit, without storing anything.
async fn derive_preview(Json(request): Json<DeriveRequest>) -> Json<DerivePreview> {
    let RecordSubmission {
        mut input,
        custom_category,
    } = request.submission;
    input.category = Category::resolve(&input.category, custom_category.as_deref());
    if matches!(request.changed, None | Some(RecordField::ReceiptDate)) {
        apply_receipt_date(&mut input);
    }
    refresh_total_man_months(&mut input);
    let errors = validate_required(&input);
    Json(DerivePreview { input, errors })
}

async fn export_records(
    State(state): State<SharedState>,
    Query(query): Query<RecordQuery>,
) -> Result<Response, AppError> {
    let list = state.records.query(&query).await?;
    let bytes = to_delimited_text(&list.records, &DEFAULT_EXPORT_COLUMNS)?;
    let today = scheduler::parse_timezone(&state.config.timezone)
        .map(|tz| Utc::now().with_timezone(&tz).date_naive())
        .unwrap_or_else(|_| Utc::now().date_naive());
    let disposition = format!("attachment; filename=\"{}\"", export_file_name(today));
    log::info!("Exported {} records", list.records.len());
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

async fn list_files(
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let files = state.files.list().await?;
    Ok(Json(json!({ "success": true, "files": files })))
}

async fn upload_file(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("malformed upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let mime_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(format!("malformed upload: {}", e)))?;
        let file = state
            .files
            .upload(&file_name, &mime_type, bytes.to_vec())
            .await?;
        return Ok(Json(json!({ "success": true, "file": file })));
    }
    Err(AppError::InvalidInput("no file was provided".to_string()))
}

/// `Content-Disposition` value safe for any file name.
fn attachment_disposition(file_name: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(file_name.as_bytes()).collect();
    format!(
        "attachment; filename*=UTF-8''{}",
        encoded.replace('+', "%20")
    )
}

async fn download_file(
    State(state): State<SharedState>,
    Path(file_id): Path<String>,
) -> Result<Response, AppError> {
    let download = state.files.download(&file_id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, download.mime_type),
            (
                header::CONTENT_DISPOSITION,
                attachment_disposition(&download.file_name),
            ),
        ],
        download.bytes,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteFileRequest {
    #[serde(default)]
    file_id: String,
}

async fn delete_file(
    State(state): State<SharedState>,
    Json(request): Json<DeleteFileRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.files.delete(&request.file_id).await?;
    Ok(Json(json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// Scheduler triggers
// ---------------------------------------------------------------------------

async fn scheduler_status(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let now = Utc::now();
    let reminders = state.reminders.list(now);
    let active = reminders.iter().filter(|r| r.is_active).count();
    Json(json!({
        "success": true,
        "timestamp": now,
        "timezone": state.config.timezone,
        "reminders": reminders.len(),
        "activeReminders": active,
        "presets": presets(),
        "endpoints": {
            "manualTrigger": "POST /api/scheduler {taskName, template}",
            "daily": "GET|POST /api/scheduler/daily",
            "dashboard": "GET|POST /api/scheduler/dashboard",
        },
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerRequest {
    #[serde(default)]
    task_name: String,
    #[serde(default)]
    template: RecordInput,
}

fn filed(task_name: &str, record: Record) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "message": format!("'{}' filed", task_name),
        "recordId": record.id,
        "taskNo": record.input.task_no,
        "createdAt": record.created_at,
        "record": record,
    }))
}

async fn trigger_template(
    State(state): State<SharedState>,
    Json(request): Json<TriggerRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let task_name = request.task_name.trim();
    if task_name.is_empty() {
        return Err(AppError::InvalidInput("taskName is required".to_string()));
    }
    let record = create_from_template(
        &state.records,
        &request.template,
        task_name,
        &state.config.timezone,
    )
    .await?;
    Ok(filed(task_name, record))
}

async fn run_daily(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, AppError> {
    let name = "Daily monitoring";
    let record = create_from_template(
        &state.records,
        &daily_monitoring_template(),
        name,
        &state.config.timezone,
    )
    .await?;
    Ok(filed(name, record))
}

async fn run_dashboard(
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let name = "Dashboard morning check";
    let record = create_from_template(
        &state.records,
        &dashboard_check_template(),
        name,
        &state.config.timezone,
    )
    .await?;
    Ok(filed(name, record))
}

// ---------------------------------------------------------------------------
// Reminders
// ---------------------------------------------------------------------------

async fn list_reminders(State(state): State<SharedState>) -> Json<serde_json::Value> {
    Json(json!({
        "reminders": state.reminders.list(Utc::now()),
        "presets": presets(),
    }))
}

async fn add_reminder(
    State(state): State<SharedState>,
    Json(new): Json<NewReminder>,
) -> Result<impl IntoResponse, AppError> {
    let reminder = state.reminders.add(new, Utc::now())?;
    Ok((StatusCode::CREATED, Json(reminder)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveRequest {
    is_active: bool,
}

async fn set_reminder_active(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(request): Json<ActiveRequest>,
) -> Result<impl IntoResponse, AppError> {
    let reminder = state
        .reminders
        .set_active(&id, request.is_active, Utc::now())?;
    Ok(Json(reminder))
}

async fn delete_reminder(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.reminders.delete(&id)?;
    Ok(Json(json!({ "success": true, "id": id })))
}

async fn run_reminder_now(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (reminder, record) = run_reminder(&state.reminders, &state.records, &id).await?;
    Ok(Json(json!({ "reminder": reminder, "record": record })))
}
