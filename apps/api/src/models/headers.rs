use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One known field, created when first observed. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HeaderDefinitionRow {
    pub id: Uuid,
    /// camelCase API name, globally unique.
    pub api_name: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Settings for one (header, content type) pair. Existence of a row means
/// the field is present for that content type; absence means it is not.
/// At most one row per (header_id, content_type_id) — upserts replace in
/// place.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HeaderConfigurationRow {
    pub id: Uuid,
    pub header_id: Uuid,
    pub content_type_id: Uuid,
    pub data_type: String,
    pub category: String,
    pub filters: bool,
    pub read_only: bool,
    pub in_app_edit: bool,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContentTypeRow {
    pub id: Uuid,
    pub slug: String,
}
