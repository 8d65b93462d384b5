use std::collections::HashMap;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::audit::{ActionType, AuditEvent};
use crate::content::ContentType;
use crate::errors::AppError;
use crate::headers::config_sync;
use crate::models::snapshot::PageSnapshotRow;
use crate::state::AppState;
use crate::syncback::{
    api_field_name, is_archived, restrict_changes, run_sync, ChangeSet, SyncFailure, SyncSuccess,
    SyncTarget,
};

#[derive(Deserialize)]
pub struct SyncRequest {
    pub user_id: Uuid,
    pub changes: Vec<ChangeSet>,
}

#[derive(Serialize)]
pub struct SyncResponse {
    pub success: bool,
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
    pub succeeded: Vec<SyncSuccess>,
    /// Same entries under the name the dashboard's error panel expects.
    pub errors: Vec<SyncFailure>,
}

/// POST /api/v1/sync/to-hubspot
pub async fn handle_sync(
    State(state): State<AppState>,
    Json(req): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, AppError> {
    if req.changes.is_empty() {
        return Err(AppError::Validation("No changes to sync".to_string()));
    }

    let page_ids: Vec<String> = req.changes.iter().map(|c| c.page_id.clone()).collect();
    let targets = resolve_targets(&state.db, req.user_id, &page_ids).await?;

    // Fields the configuration store marks read-only are stripped here;
    // callers cannot write around the store by hand-crafting a change set.
    let mut editable = HashMap::new();
    for target in targets.values() {
        if !editable.contains_key(&target.content_type) {
            let set = config_sync::editable_fields(&state.db, target.content_type).await?;
            editable.insert(target.content_type, set);
        }
    }
    let changes = restrict_changes(req.changes, &targets, &editable);

    let report = run_sync(state.hubspot.as_ref(), &targets, &changes).await;

    // Mirror synced values into the snapshot so the next diff baselines on
    // what HubSpot now holds. Best-effort per record.
    for success in &report.succeeded {
        if let Some(change) = changes.iter().find(|c| c.page_id == success.page_id) {
            if let Err(e) = mirror_success(&state.db, req.user_id, change).await {
                warn!("Snapshot mirror failed for {}: {e}", success.page_id);
            }
        }
    }

    state.audit.record(AuditEvent {
        user_id: req.user_id,
        action_type: ActionType::Sync,
        resource_type: "hubspot".to_string(),
        resource_id: None,
        details: json!({
            "attempted": report.attempted,
            "synced": report.synced,
            "failed": report.failed,
            "errors": &report.failures,
        }),
    });

    Ok(Json(SyncResponse {
        success: report.failed == 0,
        attempted: report.attempted,
        synced: report.synced,
        failed: report.failed,
        succeeded: report.succeeded,
        errors: report.failures,
    }))
}

/// Resolves each page id to its content type and archived flag using the
/// most recent snapshot row. Ids without a snapshot are simply absent from
/// the map; the engine reports them as unresolvable.
async fn resolve_targets(
    pool: &PgPool,
    user_id: Uuid,
    page_ids: &[String],
) -> Result<HashMap<String, SyncTarget>, AppError> {
    let rows = sqlx::query_as::<_, PageSnapshotRow>(
        r#"
        SELECT DISTINCT ON (hubspot_page_id) *
        FROM page_snapshots
        WHERE user_id = $1 AND hubspot_page_id = ANY($2)
        ORDER BY hubspot_page_id, version_number DESC, created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(page_ids)
    .fetch_all(pool)
    .await?;

    let mut targets = HashMap::new();
    for row in rows {
        let Some(content_type) = ContentType::parse(&row.content_type) else {
            warn!(
                "Snapshot for {} has unparseable content type '{}'",
                row.hubspot_page_id, row.content_type
            );
            continue;
        };
        let archived = row
            .data
            .get("archivedAt")
            .map(is_archived)
            .unwrap_or(false);
        targets.insert(
            row.hubspot_page_id,
            SyncTarget {
                content_type,
                archived,
            },
        );
    }
    Ok(targets)
}

/// Merges the synced field values into the latest snapshot row's data blob.
async fn mirror_success(pool: &PgPool, user_id: Uuid, change: &ChangeSet) -> anyhow::Result<()> {
    let mut patch = Map::new();
    for (db_name, edit) in &change.fields {
        patch.insert(api_field_name(db_name).to_string(), edit.new.clone());
    }

    sqlx::query(
        r#"
        UPDATE page_snapshots SET data = data || $3::jsonb
        WHERE id = (
            SELECT id FROM page_snapshots
            WHERE user_id = $1 AND hubspot_page_id = $2
            ORDER BY version_number DESC, created_at DESC
            LIMIT 1
        )
        "#,
    )
    .bind(user_id)
    .bind(&change.page_id)
    .bind(Value::Object(patch))
    .execute(pool)
    .await?;
    Ok(())
}
