//! Header discovery: sample one live record per content type, infer each
//! field's runtime type, and build a field x content-type presence matrix.
//! Results are TTL-cached so repeated dashboard loads do not hammer the
//! vendor API.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::content::{ContentType, ALL_CONTENT_TYPES};
use crate::headers::registry::{self, DataType};
use crate::hubspot::ContentApi;

pub const CACHE_KEY: &str = "header-discovery";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredField {
    pub api_name: String,
    pub display_name: String,
    pub data_type: DataType,
    pub present_in: Vec<ContentType>,
    /// True when the field is not in the static registry.
    pub unregistered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub fields: Vec<DiscoveredField>,
    /// Content types whose sample fetch failed or returned no records.
    pub unsampled: Vec<ContentType>,
}

/// Classifies a runtime value into the header data-type vocabulary.
/// ISO-8601 strings classify as date-time; null defaults to string since a
/// single sample gives no better evidence.
pub fn infer_data_type(value: &Value) -> DataType {
    match value {
        Value::Null => DataType::String,
        Value::Bool(_) => DataType::Boolean,
        Value::Number(_) => DataType::Number,
        Value::Array(_) => DataType::Array,
        Value::Object(_) => DataType::Object,
        Value::String(s) => {
            if chrono::DateTime::parse_from_rfc3339(s).is_ok() {
                DataType::DateTime
            } else {
                DataType::String
            }
        }
    }
}

/// Runs discovery across all content types, fanning the sample fetches out
/// in parallel. Each fetch is an independent read; a failed sample leaves
/// its content type in `unsampled` rather than failing the whole report.
pub async fn discover(api: Arc<dyn ContentApi>, cache: &TtlCache) -> Result<DiscoveryReport> {
    if let Some(cached) = cache.get(CACHE_KEY) {
        if let Ok(report) = serde_json::from_value::<DiscoveryReport>(cached) {
            debug!("Header discovery served from cache");
            return Ok(report);
        }
    }

    let mut handles = Vec::with_capacity(ALL_CONTENT_TYPES.len());
    for ct in ALL_CONTENT_TYPES {
        let api = Arc::clone(&api);
        handles.push((ct, tokio::spawn(async move { api.fetch_sample(ct).await })));
    }

    // field -> (data type, content types it appeared in)
    let mut matrix: BTreeMap<String, (DataType, Vec<ContentType>)> = BTreeMap::new();
    let mut unsampled = Vec::new();

    for (ct, handle) in handles {
        let sample = match handle.await {
            Ok(Ok(Some(record))) => record,
            Ok(Ok(None)) => {
                unsampled.push(ct);
                continue;
            }
            Ok(Err(e)) => {
                warn!("Sample fetch for {ct} failed: {e}");
                unsampled.push(ct);
                continue;
            }
            Err(e) => {
                warn!("Sample task for {ct} panicked: {e}");
                unsampled.push(ct);
                continue;
            }
        };

        for (field, value) in &sample {
            let inferred = infer_data_type(value);
            let entry = matrix
                .entry(field.clone())
                .or_insert_with(|| (inferred, Vec::new()));
            // First non-null observation wins over the null default.
            if entry.0 == DataType::String && inferred != DataType::String {
                entry.0 = inferred;
            }
            if !entry.1.contains(&ct) {
                entry.1.push(ct);
            }
        }
    }

    let fields = matrix
        .into_iter()
        .map(|(api_name, (data_type, present_in))| {
            let spec = registry::lookup(&api_name);
            DiscoveredField {
                display_name: registry::display_name(&api_name),
                // Registry knowledge beats a one-record sample.
                data_type: spec.map(|s| s.data_type).unwrap_or(data_type),
                unregistered: spec.is_none(),
                api_name,
                present_in,
            }
        })
        .collect();

    let report = DiscoveryReport { fields, unsampled };
    if let Ok(value) = serde_json::to_value(&report) {
        cache.put(CACHE_KEY, value);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_infer_scalar_types() {
        assert_eq!(infer_data_type(&json!("hello")), DataType::String);
        assert_eq!(infer_data_type(&json!(3.5)), DataType::Number);
        assert_eq!(infer_data_type(&json!(true)), DataType::Boolean);
        assert_eq!(infer_data_type(&json!([1])), DataType::Array);
        assert_eq!(infer_data_type(&json!({"a": 1})), DataType::Object);
        assert_eq!(infer_data_type(&Value::Null), DataType::String);
    }

    #[test]
    fn test_infer_date_time() {
        assert_eq!(
            infer_data_type(&json!("2024-03-01T09:30:00Z")),
            DataType::DateTime
        );
        assert_eq!(
            infer_data_type(&json!("2024-03-01T09:30:00+02:00")),
            DataType::DateTime
        );
        // Bare dates are not full timestamps
        assert_eq!(infer_data_type(&json!("2024-03-01")), DataType::String);
    }
}
