//! Configuration store sync: reconciles the static registry and discovered
//! headers against the `header_definitions` / `header_configurations`
//! tables. Supports missing-header insertion and comparison against either
//! the registry defaults or a Google Sheet holding edited settings, with
//! bulk apply via in-place upserts.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::content::ContentType;
use crate::headers::discovery::DiscoveryReport;
use crate::headers::registry::{self, Category};
use crate::value::canonical_field;

/// One (header, content type) settings tuple, the unit of comparison and
/// apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSetting {
    pub api_name: String,
    pub content_type: ContentType,
    pub data_type: String,
    pub category: String,
    pub filters: bool,
    pub read_only: bool,
    pub in_app_edit: bool,
}

/// A discovered field with no `header_definitions` row yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingHeader {
    pub api_name: String,
    pub display_name: String,
    pub data_type: String,
    pub present_in: Vec<ContentType>,
}

/// A settings difference between the stored configuration and a proposed
/// source (registry defaults or sheet truth).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDiff {
    pub api_name: String,
    pub content_type: ContentType,
    pub setting: String,
    pub current: String,
    pub proposed: String,
}

#[derive(sqlx::FromRow)]
struct StoredConfig {
    api_name: String,
    slug: String,
    data_type: String,
    category: String,
    filters: bool,
    read_only: bool,
    in_app_edit: bool,
}

async fn load_stored(pool: &PgPool) -> Result<Vec<StoredConfig>> {
    Ok(sqlx::query_as::<_, StoredConfig>(
        r#"
        SELECT hd.api_name, ct.slug, hc.data_type, hc.category,
               hc.filters, hc.read_only, hc.in_app_edit
        FROM header_configurations hc
        JOIN header_definitions hd ON hd.id = hc.header_id
        JOIN content_types ct ON ct.id = hc.content_type_id
        "#,
    )
    .fetch_all(pool)
    .await?)
}

async fn content_type_ids(pool: &PgPool) -> Result<HashMap<String, Uuid>> {
    let rows: Vec<(Uuid, String)> = sqlx::query_as("SELECT id, slug FROM content_types")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(id, slug)| (slug, id)).collect())
}

/// Effective editable field set for a content type: registry defaults
/// overlaid with the stored configuration rows. A stored row wins both
/// ways: `read_only = true` withdraws a registry-editable field, and an
/// editable row admits a discovered field the registry never listed.
pub async fn editable_fields(
    pool: &PgPool,
    content_type: ContentType,
) -> Result<HashSet<String>> {
    let rows: Vec<(String, bool)> = sqlx::query_as(
        r#"
        SELECT hd.api_name, hc.read_only
        FROM header_configurations hc
        JOIN header_definitions hd ON hd.id = hc.header_id
        JOIN content_types ct ON ct.id = hc.content_type_id
        WHERE ct.slug = $1
        "#,
    )
    .bind(content_type.as_slug())
    .fetch_all(pool)
    .await?;

    Ok(overlay_editable(registry::editable_fields(content_type), rows))
}

/// `id` is the record's address, never writable, whatever the store says.
fn overlay_editable(
    mut editable: HashSet<String>,
    rows: Vec<(String, bool)>,
) -> HashSet<String> {
    for (api_name, read_only) in rows {
        if read_only {
            editable.remove(&api_name);
        } else if api_name != "id" {
            editable.insert(api_name);
        }
    }
    editable
}

/// Discovered/registry fields that have no header definition row yet.
pub async fn find_missing_headers(
    pool: &PgPool,
    report: &DiscoveryReport,
) -> Result<Vec<MissingHeader>> {
    let known: Vec<String> = sqlx::query_scalar("SELECT api_name FROM header_definitions")
        .fetch_all(pool)
        .await?;

    Ok(report
        .fields
        .iter()
        .filter(|field| !known.contains(&field.api_name))
        .map(|field| MissingHeader {
            api_name: field.api_name.clone(),
            display_name: field.display_name.clone(),
            data_type: field.data_type.as_str().to_string(),
            present_in: field.present_in.clone(),
        })
        .collect())
}

/// Inserts definitions and per-content-type configuration rows for missing
/// headers. Registry defaults apply where the field is known; discovered
/// fields land as Additional/editable.
pub async fn apply_missing_headers(
    pool: &PgPool,
    user_id: Uuid,
    missing: &[MissingHeader],
) -> Result<usize> {
    let ct_ids = content_type_ids(pool).await?;
    let mut inserted = 0;

    for header in missing {
        let header_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO header_definitions (id, api_name, display_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (api_name) DO UPDATE SET display_name = header_definitions.display_name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&header.api_name)
        .bind(&header.display_name)
        .fetch_one(pool)
        .await?;

        let spec = registry::lookup(&header.api_name);
        for ct in &header.present_in {
            let Some(ct_id) = ct_ids.get(ct.as_slug()) else {
                continue;
            };
            sqlx::query(
                r#"
                INSERT INTO header_configurations
                    (id, header_id, content_type_id, data_type, category,
                     filters, read_only, in_app_edit, updated_at, updated_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now(), $9)
                ON CONFLICT (header_id, content_type_id) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(header_id)
            .bind(ct_id)
            .bind(spec.map(|s| s.data_type.as_str()).unwrap_or(&header.data_type))
            .bind(spec.map(|s| s.category.as_str()).unwrap_or(Category::Additional.as_str()))
            .bind(spec.map(|s| s.filters).unwrap_or(false))
            .bind(spec.map(|s| s.read_only).unwrap_or(false))
            .bind(spec.map(|s| s.in_app_edit).unwrap_or(false))
            .bind(user_id)
            .execute(pool)
            .await?;
            inserted += 1;
        }
    }

    info!("Inserted {inserted} header configuration rows for {} headers", missing.len());
    Ok(inserted)
}

/// The configuration source to compare the stored rows against.
pub enum ConfigSource {
    /// Registry defaults ("default" truth).
    Registry,
    /// Settings edited in a Google Sheet tab ("sheet" truth).
    Sheet(Vec<ConfigSetting>),
}

/// Compares stored configuration rows against a source, producing one diff
/// per differing setting. Pairs absent from the source are left alone.
pub async fn compare_configurations(
    pool: &PgPool,
    source: ConfigSource,
) -> Result<Vec<ConfigDiff>> {
    let stored = load_stored(pool).await?;
    let mut current: HashMap<(String, ContentType), ConfigSetting> = HashMap::new();
    for row in stored {
        let Some(ct) = ContentType::parse(&row.slug) else {
            continue;
        };
        current.insert(
            (row.api_name.clone(), ct),
            ConfigSetting {
                api_name: row.api_name,
                content_type: ct,
                data_type: row.data_type,
                category: row.category,
                filters: row.filters,
                read_only: row.read_only,
                in_app_edit: row.in_app_edit,
            },
        );
    }

    let proposed: Vec<ConfigSetting> = match source {
        ConfigSource::Registry => registry_settings(),
        ConfigSource::Sheet(settings) => settings,
    };

    let mut diffs = Vec::new();
    for setting in proposed {
        let Some(existing) = current.get(&(setting.api_name.clone(), setting.content_type)) else {
            diffs.push(ConfigDiff {
                api_name: setting.api_name.clone(),
                content_type: setting.content_type,
                setting: "presence".to_string(),
                current: "absent".to_string(),
                proposed: "present".to_string(),
            });
            continue;
        };
        push_diff(&mut diffs, &setting, "data_type", &existing.data_type, &setting.data_type);
        push_diff(&mut diffs, &setting, "category", &existing.category, &setting.category);
        push_bool_diff(&mut diffs, &setting, "filters", existing.filters, setting.filters);
        push_bool_diff(&mut diffs, &setting, "read_only", existing.read_only, setting.read_only);
        push_bool_diff(&mut diffs, &setting, "in_app_edit", existing.in_app_edit, setting.in_app_edit);
    }
    Ok(diffs)
}

fn push_diff(
    diffs: &mut Vec<ConfigDiff>,
    setting: &ConfigSetting,
    name: &str,
    current: &str,
    proposed: &str,
) {
    if current != proposed {
        diffs.push(ConfigDiff {
            api_name: setting.api_name.clone(),
            content_type: setting.content_type,
            setting: name.to_string(),
            current: current.to_string(),
            proposed: proposed.to_string(),
        });
    }
}

fn push_bool_diff(
    diffs: &mut Vec<ConfigDiff>,
    setting: &ConfigSetting,
    name: &str,
    current: bool,
    proposed: bool,
) {
    if current != proposed {
        diffs.push(ConfigDiff {
            api_name: setting.api_name.clone(),
            content_type: setting.content_type,
            setting: name.to_string(),
            current: current.to_string(),
            proposed: proposed.to_string(),
        });
    }
}

/// Flattens the static registry into per-(field, content type) settings.
pub fn registry_settings() -> Vec<ConfigSetting> {
    let mut settings = Vec::new();
    for spec in registry::REGISTRY {
        for ct in spec.present_in {
            settings.push(ConfigSetting {
                api_name: spec.api_name.to_string(),
                content_type: *ct,
                data_type: spec.data_type.as_str().to_string(),
                category: spec.category.as_str().to_string(),
                filters: spec.filters,
                read_only: spec.read_only,
                in_app_edit: spec.in_app_edit,
            });
        }
    }
    settings
}

/// Parses a settings sheet into configuration tuples. Expected columns:
/// Header, Content Type, Data Type, Category, Filters, Read Only, In App
/// Edit. Rows with an unknown content type or blank header are skipped.
pub fn parse_sheet_settings(rows: &[Vec<String>]) -> Vec<ConfigSetting> {
    let Some((header_row, data_rows)) = rows.split_first() else {
        return Vec::new();
    };
    let index: HashMap<String, usize> = header_row
        .iter()
        .enumerate()
        .map(|(i, h)| (canonical_field(h), i))
        .collect();
    let cell = |row: &[String], key: &str| -> String {
        index
            .get(key)
            .and_then(|&i| row.get(i))
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };
    let flag = |row: &[String], key: &str| cell(row, key).eq_ignore_ascii_case("true");

    let mut settings = Vec::new();
    for row in data_rows {
        let api_name = canonical_field(&cell(row, "header"));
        let Some(content_type) = ContentType::parse(&cell(row, "contentType")) else {
            continue;
        };
        if api_name.is_empty() {
            continue;
        }
        settings.push(ConfigSetting {
            api_name,
            content_type,
            data_type: cell(row, "dataType"),
            category: cell(row, "category"),
            filters: flag(row, "filters"),
            read_only: flag(row, "readOnly"),
            in_app_edit: flag(row, "inAppEdit"),
        });
    }
    settings
}

/// Bulk-applies settings as in-place upserts. `updated_at`/`updated_by`
/// change only when a value actually changes; no-op rows are left untouched.
pub async fn apply_configurations(
    pool: &PgPool,
    user_id: Uuid,
    settings: &[ConfigSetting],
) -> Result<usize> {
    let ct_ids = content_type_ids(pool).await?;
    let mut applied = 0;

    for setting in settings {
        let Some(ct_id) = ct_ids.get(setting.content_type.as_slug()) else {
            continue;
        };
        let header_id: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM header_definitions WHERE api_name = $1")
                .bind(&setting.api_name)
                .fetch_optional(pool)
                .await?;
        let Some(header_id) = header_id else {
            continue;
        };

        let result = sqlx::query(
            r#"
            INSERT INTO header_configurations
                (id, header_id, content_type_id, data_type, category,
                 filters, read_only, in_app_edit, updated_at, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now(), $9)
            ON CONFLICT (header_id, content_type_id) DO UPDATE SET
                data_type = EXCLUDED.data_type,
                category = EXCLUDED.category,
                filters = EXCLUDED.filters,
                read_only = EXCLUDED.read_only,
                in_app_edit = EXCLUDED.in_app_edit,
                updated_at = now(),
                updated_by = EXCLUDED.updated_by
            WHERE (header_configurations.data_type,
                   header_configurations.category,
                   header_configurations.filters,
                   header_configurations.read_only,
                   header_configurations.in_app_edit)
               IS DISTINCT FROM
                  (EXCLUDED.data_type, EXCLUDED.category, EXCLUDED.filters,
                   EXCLUDED.read_only, EXCLUDED.in_app_edit)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(header_id)
        .bind(ct_id)
        .bind(&setting.data_type)
        .bind(&setting.category)
        .bind(setting.filters)
        .bind(setting.read_only)
        .bind(setting.in_app_edit)
        .bind(user_id)
        .execute(pool)
        .await?;
        applied += result.rows_affected() as usize;
    }

    info!("Applied {applied} of {} configuration settings", settings.len());
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_settings_cover_all_pairs() {
        let settings = registry_settings();
        let pair_count: usize = registry::REGISTRY.iter().map(|s| s.present_in.len()).sum();
        assert_eq!(settings.len(), pair_count);
    }

    #[test]
    fn test_parse_sheet_settings() {
        let rows = vec![
            vec![
                "Header".into(),
                "Content Type".into(),
                "Data Type".into(),
                "Category".into(),
                "Filters".into(),
                "Read Only".into(),
                "In App Edit".into(),
            ],
            vec![
                "Html Title".into(),
                "site-pages".into(),
                "string".into(),
                "Required".into(),
                "TRUE".into(),
                "FALSE".into(),
                "TRUE".into(),
            ],
            vec!["Bad Row".into(), "not-a-type".into()],
        ];
        let settings = parse_sheet_settings(&rows);
        assert_eq!(settings.len(), 1);
        assert_eq!(settings[0].api_name, "htmlTitle");
        assert_eq!(settings[0].content_type, ContentType::SitePages);
        assert!(settings[0].filters);
        assert!(!settings[0].read_only);
        assert!(settings[0].in_app_edit);
    }

    #[test]
    fn test_parse_sheet_settings_empty() {
        assert!(parse_sheet_settings(&[]).is_empty());
    }

    #[test]
    fn test_overlay_removes_configured_read_only_fields() {
        let base = registry::editable_fields(ContentType::SitePages);
        assert!(base.contains("htmlTitle"));

        let overlaid = overlay_editable(base, vec![("htmlTitle".to_string(), true)]);
        assert!(!overlaid.contains("htmlTitle"));
        // Untouched registry defaults survive
        assert!(overlaid.contains("name"));
    }

    #[test]
    fn test_overlay_admits_discovered_editable_fields() {
        let base = registry::editable_fields(ContentType::SitePages);
        assert!(!base.contains("customField"));

        let overlaid = overlay_editable(
            base,
            vec![
                ("customField".to_string(), false),
                ("id".to_string(), false),
            ],
        );
        assert!(overlaid.contains("customField"));
        // id stays out even when a row claims it is editable
        assert!(!overlaid.contains("id"));
    }
}
