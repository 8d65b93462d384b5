use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{ActionType, AuditEvent};
use crate::errors::AppError;
use crate::headers::config_sync::{
    self, ConfigDiff, ConfigSetting, ConfigSource, MissingHeader,
};
use crate::headers::discovery::{self, DiscoveryReport};
use crate::models::headers::{ContentTypeRow, HeaderConfigurationRow, HeaderDefinitionRow};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HeaderConfigList {
    pub content_types: Vec<ContentTypeRow>,
    pub definitions: Vec<HeaderDefinitionRow>,
    pub configurations: Vec<HeaderConfigurationRow>,
}

/// GET /api/v1/headers/config — the full stored header configuration, for
/// the dashboard settings view.
pub async fn handle_list_config(
    State(state): State<AppState>,
) -> Result<Json<HeaderConfigList>, AppError> {
    let content_types =
        sqlx::query_as::<_, ContentTypeRow>("SELECT * FROM content_types ORDER BY slug")
            .fetch_all(&state.db)
            .await?;
    let definitions = sqlx::query_as::<_, HeaderDefinitionRow>(
        "SELECT * FROM header_definitions ORDER BY api_name",
    )
    .fetch_all(&state.db)
    .await?;
    let configurations = sqlx::query_as::<_, HeaderConfigurationRow>(
        "SELECT * FROM header_configurations",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(Json(HeaderConfigList {
        content_types,
        definitions,
        configurations,
    }))
}

/// GET /api/v1/headers/discover
pub async fn handle_discover(
    State(state): State<AppState>,
) -> Result<Json<DiscoveryReport>, AppError> {
    let report = discovery::discover(Arc::clone(&state.hubspot), &state.cache).await?;
    Ok(Json(report))
}

/// GET /api/v1/headers/missing
pub async fn handle_missing(
    State(state): State<AppState>,
) -> Result<Json<Vec<MissingHeader>>, AppError> {
    let report = discovery::discover(Arc::clone(&state.hubspot), &state.cache).await?;
    let missing = config_sync::find_missing_headers(&state.db, &report).await?;
    Ok(Json(missing))
}

#[derive(Deserialize)]
pub struct ApplyMissingRequest {
    pub user_id: Uuid,
    pub headers: Vec<MissingHeader>,
}

#[derive(Serialize)]
pub struct ApplyResponse {
    pub success: bool,
    pub applied: usize,
}

/// POST /api/v1/headers/missing/apply
pub async fn handle_apply_missing(
    State(state): State<AppState>,
    Json(req): Json<ApplyMissingRequest>,
) -> Result<Json<ApplyResponse>, AppError> {
    if req.headers.is_empty() {
        return Err(AppError::Validation("No headers to apply".to_string()));
    }
    let applied =
        config_sync::apply_missing_headers(&state.db, req.user_id, &req.headers).await?;
    Ok(Json(ApplyResponse {
        success: true,
        applied,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case", tag = "source")]
pub enum CompareRequest {
    /// Compare against the registry defaults.
    Default {},
    /// Compare against settings edited in a sheet tab.
    Sheet { sheet_id: String, tab_name: String },
}

/// POST /api/v1/headers/compare
pub async fn handle_compare(
    State(state): State<AppState>,
    Json(req): Json<CompareRequest>,
) -> Result<Json<Vec<ConfigDiff>>, AppError> {
    let source = match req {
        CompareRequest::Default {} => ConfigSource::Registry,
        CompareRequest::Sheet { sheet_id, tab_name } => {
            let rows = state.sheets.get_values(&sheet_id, &tab_name).await?;
            ConfigSource::Sheet(config_sync::parse_sheet_settings(&rows))
        }
    };
    let diffs = config_sync::compare_configurations(&state.db, source).await?;
    Ok(Json(diffs))
}

#[derive(Deserialize)]
pub struct ApplyConfigRequest {
    pub user_id: Uuid,
    pub settings: Vec<ConfigSetting>,
}

/// POST /api/v1/headers/apply
pub async fn handle_apply(
    State(state): State<AppState>,
    Json(req): Json<ApplyConfigRequest>,
) -> Result<Json<ApplyResponse>, AppError> {
    if req.settings.is_empty() {
        return Err(AppError::Validation("No settings to apply".to_string()));
    }
    let applied = config_sync::apply_configurations(&state.db, req.user_id, &req.settings).await?;
    // Applied settings change the editable-field picture; force a refetch
    // on the next dashboard load.
    state.cache.invalidate(discovery::CACHE_KEY);
    state.audit.record(AuditEvent {
        user_id: req.user_id,
        action_type: ActionType::BulkEdit,
        resource_type: "header-configurations".to_string(),
        resource_id: None,
        details: serde_json::json!({
            "requested": req.settings.len(),
            "applied": applied,
        }),
    });
    Ok(Json(ApplyResponse {
        success: true,
        applied,
    }))
}
