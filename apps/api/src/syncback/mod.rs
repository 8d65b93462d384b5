//! Sync-back engine: pushes only the changed, editable fields of each record
//! to the matching HubSpot endpoint. One record's failure never aborts the
//! batch; the report always carries both `succeeded` and `failed` arrays.

pub mod handlers;

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::content::ContentType;
use crate::hubspot::{ContentApi, PublishAction};
use crate::value::snake_to_camel;

/// Old/new pair for one edited field, keyed by its database column name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldEdit {
    #[serde(default)]
    pub old: Value,
    pub new: Value,
}

/// All edits for one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSet {
    pub page_id: String,
    pub fields: BTreeMap<String, FieldEdit>,
}

/// Resolution of a page id against the stored snapshots: its content type
/// and whether the record was archived at export time.
#[derive(Debug, Clone, Copy)]
pub struct SyncTarget {
    pub content_type: ContentType,
    pub archived: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSuccess {
    pub page_id: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncFailure {
    pub page_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
    pub succeeded: Vec<SyncSuccess>,
    #[serde(rename = "failed_records")]
    pub failures: Vec<SyncFailure>,
}

/// db column -> HubSpot API field name. Names absent here pass through
/// unchanged.
const FIELD_NAME_MAP: &[(&str, &str)] = &[
    ("html_title", "htmlTitle"),
    ("meta_description", "metaDescription"),
    ("publish_date", "publishDate"),
    ("post_body", "postBody"),
    ("post_summary", "postSummary"),
    ("author_name", "authorName"),
    ("blog_author_id", "blogAuthorId"),
    ("tag_ids", "tagIds"),
    ("route_prefix", "routePrefix"),
    ("redirect_style", "redirectStyle"),
    ("is_trailing_slash_optional", "isTrailingSlashOptional"),
    ("full_name", "fullName"),
];

pub fn api_field_name(db_name: &str) -> &str {
    FIELD_NAME_MAP
        .iter()
        .find(|(db, _)| *db == db_name)
        .map(|(_, api)| *api)
        .unwrap_or(db_name)
}

/// The 1970 epoch is HubSpot's "never archived" sentinel; only a real,
/// non-epoch timestamp means the record is actually archived.
pub fn is_archived(archived_at: &Value) -> bool {
    let Some(raw) = archived_at.as_str() else {
        return false;
    };
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts.with_timezone(&Utc).timestamp() > 0,
        Err(_) => false,
    }
}

/// Drops fields outside the editable set for each record's content type,
/// so caller-supplied payloads can never write what the configuration
/// store marks read-only. Records without a resolved target pass through
/// untouched; the engine reports those as unresolvable.
pub fn restrict_changes(
    changes: Vec<ChangeSet>,
    targets: &HashMap<String, SyncTarget>,
    editable: &HashMap<ContentType, HashSet<String>>,
) -> Vec<ChangeSet> {
    changes
        .into_iter()
        .map(|mut change| {
            let allowed = targets
                .get(&change.page_id)
                .and_then(|t| editable.get(&t.content_type));
            if let Some(allowed) = allowed {
                change
                    .fields
                    .retain(|db_name, _| allowed.contains(&snake_to_camel(db_name)));
            }
            change
        })
        .collect()
}

/// Pushes a batch of change sets to HubSpot.
///
/// `targets` resolves each page id to its content type and archived flag
/// (built from the snapshot table). Every failure mode degrades to one
/// `SyncFailure` entry and the loop continues; the function itself never
/// errors once at least one record has been attempted.
pub async fn run_sync(
    api: &dyn ContentApi,
    targets: &HashMap<String, SyncTarget>,
    changes: &[ChangeSet],
) -> SyncReport {
    let mut succeeded = Vec::new();
    let mut failures = Vec::new();

    for change in changes {
        let Some(target) = targets.get(&change.page_id) else {
            failures.push(SyncFailure {
                page_id: change.page_id.clone(),
                error: "Page type not found in database backup".to_string(),
            });
            continue;
        };

        if target.archived {
            failures.push(SyncFailure {
                page_id: change.page_id.clone(),
                error: "Cannot update archived page".to_string(),
            });
            continue;
        }

        match sync_one(api, *target, change).await {
            Ok(fields) => succeeded.push(SyncSuccess {
                page_id: change.page_id.clone(),
                fields,
            }),
            Err(error) => {
                warn!("Sync failed for {}: {error}", change.page_id);
                failures.push(SyncFailure {
                    page_id: change.page_id.clone(),
                    error,
                });
            }
        }
    }

    SyncReport {
        attempted: changes.len(),
        synced: succeeded.len(),
        failed: failures.len(),
        succeeded,
        failures,
    }
}

/// Pushes one record's edits: state changes through the publish-action
/// endpoint, everything else in a single minimal PATCH. Returns the API
/// field names that were written.
async fn sync_one(
    api: &dyn ContentApi,
    target: SyncTarget,
    change: &ChangeSet,
) -> Result<Vec<String>, String> {
    let caps = target.content_type.capabilities();
    let mut written = Vec::new();
    let mut body = Map::new();

    for (db_name, edit) in &change.fields {
        let api_name = api_field_name(db_name);
        // id is the address of the record, never part of the payload.
        if api_name == "id" {
            continue;
        }
        if api_name == "state" {
            if !caps.supports_publish {
                // No publish concept for this type; state edits are dropped.
                debug!(
                    "Skipping state change for {} ({})",
                    change.page_id, target.content_type
                );
                continue;
            }
            let action = match edit.new.as_str() {
                Some("PUBLISHED_OR_SCHEDULED") => PublishAction::PushLive,
                Some("DRAFT") => PublishAction::Unpublish,
                other => {
                    return Err(format!(
                        "Unknown state value: {}",
                        other.unwrap_or("(not a string)")
                    ))
                }
            };
            api.publish_action(target.content_type, &change.page_id, action)
                .await
                .map_err(|e| e.vendor_message())?;
            written.push("state".to_string());
            continue;
        }
        body.insert(api_name.to_string(), edit.new.clone());
    }

    if !body.is_empty() {
        if !caps.supports_patch {
            return Err(format!(
                "Content type {} does not support field updates",
                target.content_type
            ));
        }
        let field_names: Vec<String> = body.keys().cloned().collect();
        api.patch_record(target.content_type, &change.page_id, &Value::Object(body))
            .await
            .map_err(|e| e.vendor_message())?;
        written.extend(field_names);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    use crate::hubspot::{HubSpotError, JsonMap};

    #[derive(Default)]
    struct MockApi {
        patches: Mutex<Vec<(ContentType, String, Value)>>,
        publishes: Mutex<Vec<(ContentType, String, PublishAction)>>,
        /// Page ids whose PATCH should fail with a vendor error.
        fail_ids: Vec<String>,
    }

    #[async_trait]
    impl ContentApi for MockApi {
        async fn fetch_all(&self, _ct: ContentType) -> Result<Vec<JsonMap>, HubSpotError> {
            Ok(Vec::new())
        }

        async fn fetch_sample(&self, _ct: ContentType) -> Result<Option<JsonMap>, HubSpotError> {
            Ok(None)
        }

        async fn patch_record(
            &self,
            ct: ContentType,
            id: &str,
            body: &Value,
        ) -> Result<(), HubSpotError> {
            if self.fail_ids.iter().any(|f| f == id) {
                return Err(HubSpotError::Api {
                    status: 400,
                    message: "Invalid slug".to_string(),
                });
            }
            self.patches
                .lock()
                .unwrap()
                .push((ct, id.to_string(), body.clone()));
            Ok(())
        }

        async fn publish_action(
            &self,
            ct: ContentType,
            id: &str,
            action: PublishAction,
        ) -> Result<(), HubSpotError> {
            self.publishes
                .lock()
                .unwrap()
                .push((ct, id.to_string(), action));
            Ok(())
        }
    }

    fn change(page_id: &str, fields: &[(&str, Value)]) -> ChangeSet {
        ChangeSet {
            page_id: page_id.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| {
                    (
                        k.to_string(),
                        FieldEdit {
                            old: Value::Null,
                            new: v.clone(),
                        },
                    )
                })
                .collect(),
        }
    }

    fn target(ct: ContentType) -> SyncTarget {
        SyncTarget {
            content_type: ct,
            archived: false,
        }
    }

    #[tokio::test]
    async fn test_minimal_patch_body_with_mapped_name() {
        let api = MockApi::default();
        let targets = HashMap::from([("42".to_string(), target(ContentType::SitePages))]);
        let changes = vec![change("42", &[("html_title", json!("Hi"))])];

        let report = run_sync(&api, &targets, &changes).await;
        assert_eq!(report.synced, 1);
        assert_eq!(report.failed, 0);

        let patches = api.patches.lock().unwrap();
        assert_eq!(patches.len(), 1);
        let (ct, id, body) = &patches[0];
        assert_eq!(*ct, ContentType::SitePages);
        assert_eq!(id, "42");
        assert_eq!(*body, json!({"htmlTitle": "Hi"}));
        assert!(body.get("id").is_none());
    }

    #[tokio::test]
    async fn test_partial_failure_never_short_circuits() {
        let api = MockApi {
            fail_ids: vec!["2".to_string()],
            ..Default::default()
        };
        let targets = HashMap::from([
            ("1".to_string(), target(ContentType::SitePages)),
            // "2" present but its PATCH fails; "3" unresolvable
            ("2".to_string(), target(ContentType::SitePages)),
            ("4".to_string(), target(ContentType::SitePages)),
        ]);
        let changes = vec![
            change("1", &[("name", json!("A"))]),
            change("2", &[("name", json!("B"))]),
            change("3", &[("name", json!("C"))]),
            change("4", &[("name", json!("D"))]),
        ];

        let report = run_sync(&api, &targets, &changes).await;
        assert_eq!(report.attempted, 4);
        assert_eq!(report.synced, 2);
        assert_eq!(report.failed, 2);

        let errors: Vec<&str> = report.failures.iter().map(|f| f.error.as_str()).collect();
        assert!(errors.contains(&"Invalid slug"));
        assert!(errors.contains(&"Page type not found in database backup"));

        // Records after the failures were still attempted
        let patches = api.patches.lock().unwrap();
        assert!(patches.iter().any(|(_, id, _)| id == "4"));
    }

    #[tokio::test]
    async fn test_archived_record_is_rejected_before_write() {
        let api = MockApi::default();
        let targets = HashMap::from([(
            "5".to_string(),
            SyncTarget {
                content_type: ContentType::SitePages,
                archived: true,
            },
        )]);
        let changes = vec![change("5", &[("name", json!("X"))])];

        let report = run_sync(&api, &targets, &changes).await;
        assert_eq!(report.failed, 1);
        assert!(report.failures[0].error.contains("archived"));
        assert!(api.patches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_state_change_uses_publish_action() {
        let api = MockApi::default();
        let targets = HashMap::from([("7".to_string(), target(ContentType::BlogPosts))]);
        let changes = vec![change(
            "7",
            &[
                ("state", json!("PUBLISHED_OR_SCHEDULED")),
                ("name", json!("Renamed")),
            ],
        )];

        let report = run_sync(&api, &targets, &changes).await;
        assert_eq!(report.synced, 1);

        let publishes = api.publishes.lock().unwrap();
        assert_eq!(publishes.len(), 1);
        assert_eq!(publishes[0].2, PublishAction::PushLive);
        // The ordinary field still went out as a PATCH without state
        let patches = api.patches.lock().unwrap();
        assert_eq!(patches[0].2, json!({"name": "Renamed"}));
    }

    #[tokio::test]
    async fn test_state_change_skipped_for_blogs() {
        let api = MockApi::default();
        let targets = HashMap::from([("9".to_string(), target(ContentType::Blogs))]);
        let changes = vec![change("9", &[("state", json!("DRAFT"))])];

        let report = run_sync(&api, &targets, &changes).await;
        // Skipped, not failed
        assert_eq!(report.failed, 0);
        assert_eq!(report.synced, 1);
        assert!(api.publishes.lock().unwrap().is_empty());
        assert!(api.patches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restricted_fields_never_reach_the_api() {
        let api = MockApi::default();
        let targets = HashMap::from([("11".to_string(), target(ContentType::SitePages))]);
        let editable = HashMap::from([(
            ContentType::SitePages,
            HashSet::from(["name".to_string(), "htmlTitle".to_string()]),
        )]);
        let changes = restrict_changes(
            vec![change(
                "11",
                &[
                    ("url", json!("https://example.com/moved")),
                    ("html_title", json!("Kept")),
                    ("created_at", json!("2020-01-01T00:00:00Z")),
                ],
            )],
            &targets,
            &editable,
        );

        let report = run_sync(&api, &targets, &changes).await;
        assert_eq!(report.synced, 1);

        let patches = api.patches.lock().unwrap();
        assert_eq!(patches[0].2, json!({"htmlTitle": "Kept"}));
    }

    #[test]
    fn test_api_field_name_mapping() {
        assert_eq!(api_field_name("html_title"), "htmlTitle");
        assert_eq!(api_field_name("name"), "name");
        // Unknown names pass through unchanged
        assert_eq!(api_field_name("custom_thing"), "custom_thing");
    }

    #[test]
    fn test_is_archived_epoch_sentinel() {
        assert!(!is_archived(&json!("1970-01-01T00:00:00Z")));
        assert!(is_archived(&json!("2024-05-01T12:00:00Z")));
        assert!(!is_archived(&Value::Null));
        assert!(!is_archived(&json!("not a date")));
    }
}
