//! Change-detection engine: compares a stored snapshot ("before") against a
//! later view of the same records ("after" — re-fetched sheet rows or a
//! fresh API poll), field by field, restricted to editable fields, with
//! value normalization so formatting differences never register as changes.

pub mod handlers;

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::cache::TtlCache;
use crate::hubspot::JsonMap;
use crate::models::snapshot::PageSnapshotRow;
use crate::value::{camel_to_snake, canonical_field, record_id, to_title_case, values_equal};

/// One changed field on one record. Carries the original (non-normalized)
/// values for display; the equality decision already happened on the
/// normalized forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldChange {
    pub page_id: String,
    /// Canonical camelCase field name.
    pub field: String,
    /// Title Case form, as it appears in sheet headers.
    pub header: String,
    /// snake_case database column form.
    pub db_column: String,
    pub previous_value: Value,
    pub new_value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDiff {
    pub page_id: String,
    pub has_changes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffSummary {
    pub total_items: usize,
    pub items_with_changes: usize,
    pub total_changes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffReport {
    pub changes: Vec<FieldChange>,
    pub records: Vec<RecordDiff>,
    pub summary: DiffSummary,
}

/// "No baseline" is a distinct outcome, never an empty diff: without a
/// snapshot there is nothing to compare against and the user must export
/// first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DetectOutcome {
    NoBaseline { message: String },
    Diff(DiffReport),
}

impl DetectOutcome {
    pub fn no_baseline() -> Self {
        DetectOutcome::NoBaseline {
            message: "No changes detected, please export first".to_string(),
        }
    }
}

/// Diffs `after` records against their `before` counterparts.
///
/// Records without an identifier or without a baseline counterpart are
/// skipped silently. Only fields both listed in `editable_fields` (canonical
/// camelCase) and present as keys on the `after` record are compared —
/// absent keys are never treated as cleared, so partial payloads cannot
/// cause accidental data loss.
pub fn diff_records(
    before: &[JsonMap],
    after: &[JsonMap],
    editable_fields: &HashSet<String>,
) -> DiffReport {
    let mut baseline: HashMap<String, &JsonMap> = HashMap::new();
    for record in before {
        if let Some(id) = record_id(record) {
            baseline.insert(id, record);
        } else {
            debug!("Skipping baseline record without identifier");
        }
    }

    let mut changes = Vec::new();
    let mut records = Vec::new();

    for record in after {
        let Some(id) = record_id(record) else {
            debug!("Skipping record without identifier");
            continue;
        };
        let Some(before_record) = baseline.get(&id) else {
            // No baseline to diff against; nothing to compare.
            continue;
        };

        let mut record_changed = false;
        for (raw_field, after_value) in record.iter() {
            let field = canonical_field(raw_field);
            if !editable_fields.contains(&field) {
                continue;
            }
            let previous = lookup_field(before_record, &field);
            let previous_value = previous.cloned().unwrap_or(Value::Null);
            if values_equal(&previous_value, after_value) {
                continue;
            }
            record_changed = true;
            changes.push(FieldChange {
                page_id: id.clone(),
                header: to_title_case(&field),
                db_column: camel_to_snake(&field),
                field,
                previous_value,
                new_value: after_value.clone(),
            });
        }
        records.push(RecordDiff {
            page_id: id,
            has_changes: record_changed,
        });
    }

    let items_with_changes = records.iter().filter(|r| r.has_changes).count();
    DiffReport {
        summary: DiffSummary {
            total_items: records.len(),
            items_with_changes,
            total_changes: changes.len(),
        },
        changes,
        records,
    }
}

/// Finds a field on the before record, whichever casing convention it was
/// stored under.
fn lookup_field<'a>(record: &'a JsonMap, canonical: &str) -> Option<&'a Value> {
    if let Some(v) = record.get(canonical) {
        return Some(v);
    }
    let snake = camel_to_snake(canonical);
    if let Some(v) = record.get(&snake) {
        return Some(v);
    }
    record
        .iter()
        .find(|(k, _)| canonical_field(k) == canonical)
        .map(|(_, v)| v)
}

/// Cheap short-circuit hash over an "after" view: record count plus a
/// serialized sample of the first three records, truncated. Matching hashes
/// skip the full diff on the polling path. This is an optimization only;
/// hash ties across different data are an accepted, bounded risk.
pub fn content_hash(records: &[JsonMap]) -> String {
    const SAMPLE_RECORDS: usize = 3;
    const SAMPLE_BYTES: usize = 2048;

    let mut sample = String::new();
    for record in records.iter().take(SAMPLE_RECORDS) {
        sample.push_str(&serde_json::to_string(record).unwrap_or_default());
        if sample.len() >= SAMPLE_BYTES {
            sample.truncate(SAMPLE_BYTES);
            break;
        }
    }

    let mut hasher = Sha256::new();
    hasher.update(records.len().to_string());
    hasher.update(":");
    hasher.update(&sample);
    format!("{:x}", hasher.finalize())
}

/// Poll short-circuit over the content hash cache. The hash enters the
/// cache only through [`PollGate::mark_diffed`], so a poll that answered
/// no-baseline can never arm the short-circuit for a later one.
pub struct PollGate<'a> {
    cache: &'a TtlCache,
    key: String,
    hash: String,
}

impl<'a> PollGate<'a> {
    pub fn new(cache: &'a TtlCache, key: String, records: &[JsonMap]) -> Self {
        Self {
            cache,
            key,
            hash: content_hash(records),
        }
    }

    /// True when the previous successful diff saw the same contents.
    pub fn unchanged(&self) -> bool {
        match self.cache.get(&self.key) {
            Some(previous) => previous.as_str() == Some(self.hash.as_str()),
            None => false,
        }
    }

    /// Records the hash. Call only once a diff has been produced.
    pub fn mark_diffed(&self) {
        self.cache.put(&self.key, Value::String(self.hash.clone()));
    }
}

/// Loads the authoritative baseline for a (user, sheet, tab): the single
/// most recent snapshot per record, by version then created_at. Returns an
/// empty vec when no snapshot exists at all — callers must map that to
/// [`DetectOutcome::no_baseline`], not an empty diff.
pub async fn load_baseline(
    pool: &PgPool,
    user_id: Uuid,
    sheet_id: Option<&str>,
    tab_name: Option<&str>,
) -> Result<Vec<PageSnapshotRow>> {
    Ok(sqlx::query_as::<_, PageSnapshotRow>(
        r#"
        SELECT DISTINCT ON (hubspot_page_id) *
        FROM page_snapshots
        WHERE user_id = $1
          AND ($2::text IS NULL OR sheet_id = $2)
          AND ($3::text IS NULL OR tab_name = $3)
        ORDER BY hubspot_page_id, version_number DESC, created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(sheet_id)
    .bind(tab_name)
    .fetch_all(pool)
    .await?)
}

/// Converts snapshot rows into diffable records: the stored field map plus
/// the page id under the key the identifier lookup expects.
pub fn baseline_records(snapshots: &[PageSnapshotRow]) -> Vec<JsonMap> {
    snapshots
        .iter()
        .map(|snapshot| {
            let mut record = snapshot
                .data
                .as_object()
                .cloned()
                .unwrap_or_default();
            record.insert(
                "id".to_string(),
                Value::String(snapshot.hubspot_page_id.clone()),
            );
            record
        })
        .collect()
}

/// Converts sheet rows (header row first, Title Case headers) into records.
pub fn sheet_rows_to_records(rows: &[Vec<String>]) -> Vec<JsonMap> {
    let Some((header_row, data_rows)) = rows.split_first() else {
        return Vec::new();
    };
    data_rows
        .iter()
        .map(|row| {
            let mut record = JsonMap::new();
            for (i, header) in header_row.iter().enumerate() {
                let cell = row.get(i).cloned().unwrap_or_default();
                record.insert(header.clone(), Value::String(cell));
            }
            record
        })
        .collect()
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

    fn editable(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sample_scenario_one_field_changed() {
        let before = vec![record(&[
            ("id", json!("1")),
            ("name", json!("Old Title")),
            ("state", json!("DRAFT")),
        ])];
        let after = vec![record(&[
            ("Id", json!("1")),
            ("Name", json!("New Title")),
            ("State", json!("DRAFT")),
        ])];
        let report = diff_records(&before, &after, &editable(&["name", "state"]));
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].field, "name");
        assert_eq!(report.changes[0].previous_value, json!("Old Title"));
        assert_eq!(report.changes[0].new_value, json!("New Title"));
        assert_eq!(report.summary.items_with_changes, 1);
        assert_eq!(report.summary.total_changes, 1);
    }

    #[test]
    fn test_round_trip_reserialization_yields_no_changes() {
        let before = vec![record(&[
            ("id", json!("1")),
            ("isTrailingSlashOptional", json!(true)),
            ("tagIds", json!([1, 2])),
            ("metaDescription", Value::Null),
        ])];
        // Sheet round-trip: booleans become "TRUE", arrays become JSON
        // strings, nulls become empty cells.
        let after = vec![record(&[
            ("Id", json!("1")),
            ("Is Trailing Slash Optional", json!("TRUE")),
            ("Tag Ids", json!("[1,2]")),
            ("Meta Description", json!("")),
        ])];
        let report = diff_records(
            &before,
            &after,
            &editable(&["isTrailingSlashOptional", "tagIds", "metaDescription"]),
        );
        assert_eq!(report.summary.total_changes, 0);
        assert_eq!(report.summary.items_with_changes, 0);
        assert_eq!(report.summary.total_items, 1);
    }

    #[test]
    fn test_read_only_fields_never_diff() {
        let before = vec![record(&[("id", json!("1")), ("url", json!("/old"))])];
        let after = vec![record(&[("Id", json!("1")), ("Url", json!("/new"))])];
        let report = diff_records(&before, &after, &editable(&["name"]));
        assert!(report.changes.is_empty());
    }

    #[test]
    fn test_record_without_baseline_is_skipped() {
        let before = vec![record(&[("id", json!("1")), ("name", json!("A"))])];
        let after = vec![
            record(&[("id", json!("1")), ("name", json!("B"))]),
            record(&[("id", json!("99")), ("name", json!("Z"))]),
        ];
        let report = diff_records(&before, &after, &editable(&["name"]));
        assert_eq!(report.summary.total_items, 1);
        assert_eq!(report.changes.len(), 1);
    }

    #[test]
    fn test_record_without_identifier_is_skipped() {
        let before = vec![record(&[("id", json!("1")), ("name", json!("A"))])];
        let after = vec![record(&[("name", json!("B"))])];
        let report = diff_records(&before, &after, &editable(&["name"]));
        assert_eq!(report.summary.total_items, 0);
        assert!(report.changes.is_empty());
    }

    #[test]
    fn test_absent_key_is_not_a_clear() {
        let before = vec![record(&[("id", json!("1")), ("name", json!("Kept"))])];
        // Partial payload: name missing entirely
        let after = vec![record(&[("id", json!("1")), ("state", json!("DRAFT"))])];
        let report = diff_records(&before, &after, &editable(&["name", "state"]));
        assert!(report.changes.iter().all(|c| c.field != "name"));
    }

    #[test]
    fn test_change_carries_original_values_and_name_forms() {
        let before = vec![record(&[("id", json!("1")), ("htmlTitle", json!("Old"))])];
        let after = vec![record(&[("Id", json!("1")), ("Html Title", json!("  New  "))])];
        let report = diff_records(&before, &after, &editable(&["htmlTitle"]));
        assert_eq!(report.changes.len(), 1);
        let change = &report.changes[0];
        assert_eq!(change.field, "htmlTitle");
        assert_eq!(change.header, "Html Title");
        assert_eq!(change.db_column, "html_title");
        // Original, non-normalized value preserved for display
        assert_eq!(change.new_value, json!("  New  "));
    }

    #[test]
    fn test_no_baseline_outcome_is_distinct() {
        let outcome = DetectOutcome::no_baseline();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "no_baseline");
        assert!(json["message"].as_str().unwrap().contains("export first"));

        let empty = DetectOutcome::Diff(diff_records(&[], &[], &HashSet::new()));
        let json = serde_json::to_value(&empty).unwrap();
        assert_eq!(json["status"], "diff");
    }

    #[test]
    fn test_content_hash_stable_and_sensitive() {
        let a = vec![record(&[("id", json!("1")), ("name", json!("A"))])];
        let b = vec![record(&[("id", json!("1")), ("name", json!("B"))])];
        assert_eq!(content_hash(&a), content_hash(&a));
        assert_ne!(content_hash(&a), content_hash(&b));
        assert_ne!(content_hash(&a), content_hash(&[]));
    }

    #[test]
    fn test_poll_gate_arms_only_after_a_diff() {
        let cache = TtlCache::new(std::time::Duration::from_secs(60));
        let rows = vec![record(&[("id", json!("1")), ("name", json!("A"))])];

        let gate = PollGate::new(&cache, "poll:k".to_string(), &rows);
        assert!(!gate.unchanged());
        // A no-baseline poll records nothing, so identical contents still
        // get a full diff next time.
        let gate = PollGate::new(&cache, "poll:k".to_string(), &rows);
        assert!(!gate.unchanged());

        gate.mark_diffed();
        let gate = PollGate::new(&cache, "poll:k".to_string(), &rows);
        assert!(gate.unchanged());
    }

    #[test]
    fn test_sheet_rows_to_records() {
        let rows = vec![
            vec!["Id".to_string(), "Name".to_string()],
            vec!["1".to_string(), "Hello".to_string()],
            vec!["2".to_string()],
        ];
        let records = sheet_rows_to_records(&rows);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["Name"], json!("Hello"));
        // Short rows pad with empty cells
        assert_eq!(records[1]["Name"], json!(""));
    }
}
