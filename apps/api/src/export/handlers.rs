use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::audit::{ActionType, AuditEvent};
use crate::content::ContentType;
use crate::errors::AppError;
use crate::export::{run_export, Destination, SnapshotFailure};
use crate::models::snapshot::UserExportRow;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ExportRequest {
    pub user_id: Uuid,
    pub content_type: String,
    pub destination: Destination,
}

#[derive(Serialize)]
pub struct ExportResponse {
    pub success: bool,
    pub backup_id: Uuid,
    pub record_count: usize,
    pub snapshot_failures: Vec<SnapshotFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv: Option<String>,
}

/// POST /api/v1/export
pub async fn handle_export(
    State(state): State<AppState>,
    Json(req): Json<ExportRequest>,
) -> Result<Json<ExportResponse>, AppError> {
    let content_type = ContentType::parse(&req.content_type)
        .ok_or_else(|| AppError::Validation(format!("Unknown content type: {}", req.content_type)))?;

    let outcome = run_export(
        &state.db,
        state.hubspot.as_ref(),
        state.sheets.as_ref(),
        req.user_id,
        content_type,
        &req.destination,
    )
    .await?;

    state.audit.record(AuditEvent {
        user_id: req.user_id,
        action_type: ActionType::Export,
        resource_type: content_type.as_slug().to_string(),
        resource_id: Some(outcome.backup_id.to_string()),
        details: json!({
            "destination": req.destination,
            "record_count": outcome.record_count,
            "snapshot_failures": outcome.snapshot_failures.len(),
        }),
    });

    Ok(Json(ExportResponse {
        success: true,
        backup_id: outcome.backup_id,
        record_count: outcome.record_count,
        snapshot_failures: outcome.snapshot_failures,
        csv: outcome.csv,
    }))
}

#[derive(Deserialize)]
pub struct ExportHistoryQuery {
    pub user_id: Uuid,
}

/// GET /api/v1/exports — past exports for the history view.
pub async fn handle_export_history(
    State(state): State<AppState>,
    Query(params): Query<ExportHistoryQuery>,
) -> Result<Json<Vec<UserExportRow>>, AppError> {
    let exports = sqlx::query_as::<_, UserExportRow>(
        "SELECT * FROM user_exports WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(params.user_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(exports))
}
