use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Append-only audit trail row. Display/history only; never consulted by
/// control flow.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLogRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action_type: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}
