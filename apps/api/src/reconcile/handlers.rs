use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::audit::{ActionType, AuditEvent};
use crate::content::ContentType;
use crate::errors::AppError;
use crate::headers::config_sync;
use crate::reconcile::{
    baseline_records, diff_records, load_baseline, sheet_rows_to_records, DetectOutcome, PollGate,
};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct DetectRequest {
    pub user_id: Uuid,
    pub sheet_id: String,
    pub tab_name: String,
    pub content_type: String,
}

/// POST /api/v1/changes/detect — diffs the current sheet contents against
/// the stored snapshot baseline.
pub async fn handle_detect(
    State(state): State<AppState>,
    Json(req): Json<DetectRequest>,
) -> Result<Json<DetectOutcome>, AppError> {
    let content_type = ContentType::parse(&req.content_type)
        .ok_or_else(|| AppError::Validation(format!("Unknown content type: {}", req.content_type)))?;

    let snapshots = load_baseline(
        &state.db,
        req.user_id,
        Some(&req.sheet_id),
        Some(&req.tab_name),
    )
    .await?;
    if snapshots.is_empty() {
        return Ok(Json(DetectOutcome::no_baseline()));
    }

    let rows = state
        .sheets
        .get_values(&req.sheet_id, &req.tab_name)
        .await?;
    let after = sheet_rows_to_records(&rows);
    let before = baseline_records(&snapshots);
    let editable = config_sync::editable_fields(&state.db, content_type).await?;

    let report = diff_records(&before, &after, &editable);

    state.audit.record(AuditEvent {
        user_id: req.user_id,
        action_type: ActionType::Compare,
        resource_type: content_type.as_slug().to_string(),
        resource_id: Some(req.sheet_id.clone()),
        details: json!({
            "tab_name": req.tab_name,
            "total_items": report.summary.total_items,
            "items_with_changes": report.summary.items_with_changes,
            "total_changes": report.summary.total_changes,
        }),
    });

    Ok(Json(DetectOutcome::Diff(report)))
}

#[derive(Deserialize)]
pub struct PollRequest {
    pub user_id: Uuid,
    pub sheet_id: String,
    pub tab_name: String,
    pub content_type: String,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum PollResponse {
    Unchanged { unchanged: bool },
    Outcome(DetectOutcome),
}

/// POST /api/v1/changes/poll — same diff, but short-circuits on an
/// unchanged content hash from the previous poll.
pub async fn handle_poll(
    State(state): State<AppState>,
    Json(req): Json<PollRequest>,
) -> Result<Json<PollResponse>, AppError> {
    let content_type = ContentType::parse(&req.content_type)
        .ok_or_else(|| AppError::Validation(format!("Unknown content type: {}", req.content_type)))?;

    let rows = state
        .sheets
        .get_values(&req.sheet_id, &req.tab_name)
        .await?;
    let after = sheet_rows_to_records(&rows);

    let hash_key = format!("poll:{}:{}:{}", req.user_id, req.sheet_id, req.tab_name);
    let gate = PollGate::new(&state.cache, hash_key.clone(), &after);
    if gate.unchanged() {
        debug!("Poll hash unchanged for {hash_key}; skipping diff");
        return Ok(Json(PollResponse::Unchanged { unchanged: true }));
    }

    let snapshots = load_baseline(
        &state.db,
        req.user_id,
        Some(&req.sheet_id),
        Some(&req.tab_name),
    )
    .await?;
    if snapshots.is_empty() {
        return Ok(Json(PollResponse::Outcome(DetectOutcome::no_baseline())));
    }

    let before = baseline_records(&snapshots);
    let editable = config_sync::editable_fields(&state.db, content_type).await?;
    let report = diff_records(&before, &after, &editable);
    // A no-baseline response above never arms the short-circuit.
    gate.mark_diffed();
    Ok(Json(PollResponse::Outcome(DetectOutcome::Diff(report))))
}
