use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// An immutable point-in-time copy of one exported record: the "before"
/// state every later diff baselines against. Append-only; the highest
/// `version_number` per (user, page, sheet, tab) is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PageSnapshotRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub backup_id: Uuid,
    pub sheet_id: Option<String>,
    pub tab_name: Option<String>,
    pub hubspot_page_id: String,
    pub content_type: String,
    /// Full field map as returned by the vendor API at export time.
    pub data: Value,
    pub version_number: i32,
    pub created_at: DateTime<Utc>,
}

/// One export operation, for history display.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserExportRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub backup_id: Uuid,
    pub content_type: String,
    pub destination: String,
    pub sheet_id: Option<String>,
    pub tab_name: Option<String>,
    pub record_count: i32,
    pub created_at: DateTime<Utc>,
}
