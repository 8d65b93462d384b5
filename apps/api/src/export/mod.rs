//! Export engine: pulls paginated content from HubSpot, normalizes names
//! and values into sheet-shaped rows, writes a CSV blob or a Google Sheet
//! tab, and persists per-record snapshots as the baseline for later diffs.

pub mod csv;
pub mod handlers;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::content::ContentType;
use crate::hubspot::{ContentApi, JsonMap};
use crate::sheets::SheetsApi;
use crate::value::{record_id, to_cell, to_title_case};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Destination {
    Csv,
    Sheet { sheet_id: String, tab_name: String },
}

impl Destination {
    fn as_str(&self) -> &'static str {
        match self {
            Destination::Csv => "csv",
            Destination::Sheet { .. } => "sheet",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExportOutcome {
    pub backup_id: Uuid,
    pub record_count: usize,
    pub snapshot_failures: Vec<SnapshotFailure>,
    /// Present only for CSV exports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotFailure {
    pub page_id: String,
    pub error: String,
}

/// Column layout for an export: registry fields known for the content type,
/// extended with any extra fields the live records carry.
pub fn export_columns(content_type: ContentType, records: &[JsonMap]) -> Vec<String> {
    let mut columns: Vec<String> = crate::headers::registry::fields_for(content_type)
        .into_iter()
        .map(|spec| spec.api_name.to_string())
        .collect();
    for record in records {
        for field in record.keys() {
            if !columns.iter().any(|c| c == field) {
                columns.push(field.clone());
            }
        }
    }
    columns
}

/// Flattens records into Title Case headers plus cell rows, in column order.
pub fn build_rows(columns: &[String], records: &[JsonMap]) -> (Vec<String>, Vec<Vec<String>>) {
    let headers = columns.iter().map(|c| to_title_case(c)).collect();
    let rows = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|column| record.get(column).map(to_cell).unwrap_or_default())
                .collect()
        })
        .collect();
    (headers, rows)
}

/// Runs a full export. Per-record snapshot failures are collected, never
/// fatal; only a failed fetch or a failed destination write aborts.
pub async fn run_export(
    pool: &PgPool,
    api: &dyn ContentApi,
    sheets: &dyn SheetsApi,
    user_id: Uuid,
    content_type: ContentType,
    destination: &Destination,
) -> Result<ExportOutcome, crate::errors::AppError> {
    let records = api.fetch_all(content_type).await?;
    let backup_id = Uuid::new_v4();

    let columns = export_columns(content_type, &records);
    let (headers, rows) = build_rows(&columns, &records);

    let (sheet_id, tab_name) = match destination {
        Destination::Sheet { sheet_id, tab_name } => {
            (Some(sheet_id.as_str()), Some(tab_name.as_str()))
        }
        Destination::Csv => (None, None),
    };

    let mut snapshot_failures = Vec::new();
    for record in &records {
        let Some(page_id) = record_id(record) else {
            warn!("Export record without identifier; snapshot skipped");
            continue;
        };
        if let Err(e) = insert_snapshot(
            pool,
            user_id,
            backup_id,
            sheet_id,
            tab_name,
            &page_id,
            content_type,
            record,
        )
        .await
        {
            snapshot_failures.push(SnapshotFailure {
                page_id,
                error: e.to_string(),
            });
        }
    }

    let csv = match destination {
        Destination::Csv => Some(csv::write_csv(&headers, &rows)),
        Destination::Sheet { sheet_id, tab_name } => {
            sheets.ensure_tab(sheet_id, tab_name).await?;
            sheets.clear_values(sheet_id, tab_name).await?;
            let mut all_rows = Vec::with_capacity(rows.len() + 1);
            all_rows.push(headers.clone());
            all_rows.extend(rows.iter().cloned());
            sheets.update_values(sheet_id, tab_name, &all_rows).await?;
            None
        }
    };

    sqlx::query(
        r#"
        INSERT INTO user_exports
            (id, user_id, backup_id, content_type, destination, sheet_id, tab_name, record_count)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(backup_id)
    .bind(content_type.as_slug())
    .bind(destination.as_str())
    .bind(sheet_id)
    .bind(tab_name)
    .bind(records.len() as i32)
    .execute(pool)
    .await
    .map_err(crate::errors::AppError::Database)?;

    info!(
        "Exported {} {} records to {} ({} snapshot failures)",
        records.len(),
        content_type,
        destination.as_str(),
        snapshot_failures.len()
    );

    Ok(ExportOutcome {
        backup_id,
        record_count: records.len(),
        snapshot_failures,
        csv,
    })
}

#[allow(clippy::too_many_arguments)]
async fn insert_snapshot(
    pool: &PgPool,
    user_id: Uuid,
    backup_id: Uuid,
    sheet_id: Option<&str>,
    tab_name: Option<&str>,
    page_id: &str,
    content_type: ContentType,
    record: &JsonMap,
) -> Result<()> {
    // Next version for this record within the same sheet/tab scope.
    let current_max: Option<i32> = sqlx::query_scalar(
        r#"
        SELECT MAX(version_number) FROM page_snapshots
        WHERE user_id = $1 AND hubspot_page_id = $2
          AND sheet_id IS NOT DISTINCT FROM $3
          AND tab_name IS NOT DISTINCT FROM $4
        "#,
    )
    .bind(user_id)
    .bind(page_id)
    .bind(sheet_id)
    .bind(tab_name)
    .fetch_one(pool)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO page_snapshots
            (id, user_id, backup_id, sheet_id, tab_name, hubspot_page_id,
             content_type, data, version_number)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(backup_id)
    .bind(sheet_id)
    .bind(tab_name)
    .bind(page_id)
    .bind(content_type.as_slug())
    .bind(Value::Object(record.clone()))
    .bind(current_max.unwrap_or(0) + 1)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> JsonMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_export_columns_extends_registry() {
        let records = vec![record(&[("id", json!("1")), ("customField", json!("x"))])];
        let columns = export_columns(ContentType::SitePages, &records);
        assert!(columns.contains(&"name".to_string()));
        assert!(columns.contains(&"customField".to_string()));
        // Registry columns come before discovered extras
        let name_pos = columns.iter().position(|c| c == "name").unwrap();
        let custom_pos = columns.iter().position(|c| c == "customField").unwrap();
        assert!(name_pos < custom_pos);
    }

    #[test]
    fn test_build_rows_cell_rendering() {
        let columns = vec![
            "id".to_string(),
            "htmlTitle".to_string(),
            "isTrailingSlashOptional".to_string(),
            "tagIds".to_string(),
        ];
        let records = vec![record(&[
            ("id", json!("1")),
            ("htmlTitle", Value::Null),
            ("isTrailingSlashOptional", json!(true)),
            ("tagIds", json!([1, 2])),
        ])];
        let (headers, rows) = build_rows(&columns, &records);
        assert_eq!(headers[1], "Html Title");
        assert_eq!(rows[0], vec!["1", "", "TRUE", "[1,2]"]);
    }
}
