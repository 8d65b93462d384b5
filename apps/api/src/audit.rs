//! Audit trail as an explicit side-effect boundary: handlers emit events
//! onto a channel and a background task writes the rows, so the engines
//! stay pure and a lost audit insert never fails an operation.

use anyhow::Result;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tracing::{error, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::audit::AuditLogRow;
use crate::state::AppState;

#[derive(Debug, Clone, Copy)]
pub enum ActionType {
    Export,
    Compare,
    BulkEdit,
    Sync,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Export => "export",
            ActionType::Compare => "compare",
            ActionType::BulkEdit => "bulk-edit",
            ActionType::Sync => "sync",
        }
    }
}

#[derive(Debug)]
pub struct AuditEvent {
    pub user_id: Uuid,
    pub action_type: ActionType,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: Value,
}

/// Cloneable handle for emitting audit events. Dropping all handles stops
/// the writer task after it drains the channel.
#[derive(Clone)]
pub struct AuditLogger {
    tx: mpsc::UnboundedSender<AuditEvent>,
}

impl AuditLogger {
    /// Spawns the background writer and returns the emit handle.
    pub fn spawn(pool: PgPool) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AuditEvent>();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = insert_entry(&pool, &event).await {
                    error!("Failed to write audit entry: {e}");
                }
            }
        });
        Self { tx }
    }

    /// Emits an event. Best-effort: a closed channel is logged, never
    /// surfaced to the caller.
    pub fn record(&self, event: AuditEvent) {
        if self.tx.send(event).is_err() {
            warn!("Audit channel closed; entry dropped");
        }
    }
}

async fn insert_entry(pool: &PgPool, event: &AuditEvent) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action_type, resource_type, resource_id, details)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(event.user_id)
    .bind(event.action_type.as_str())
    .bind(&event.resource_type)
    .bind(&event.resource_id)
    .bind(&event.details)
    .execute(pool)
    .await?;
    Ok(())
}

/// Most recent audit entries for a user, for the history view.
pub async fn recent_entries(pool: &PgPool, user_id: Uuid, limit: i64) -> Result<Vec<AuditLogRow>> {
    Ok(sqlx::query_as::<_, AuditLogRow>(
        "SELECT * FROM audit_logs WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

#[derive(Deserialize)]
pub struct AuditQuery {
    pub user_id: Uuid,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// GET /api/v1/audit
pub async fn handle_audit(
    State(state): State<AppState>,
    Query(params): Query<AuditQuery>,
) -> Result<Json<Vec<AuditLogRow>>, AppError> {
    let entries = recent_entries(&state.db, params.user_id, params.limit).await?;
    Ok(Json(entries))
}
