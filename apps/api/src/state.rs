use std::sync::Arc;

use sqlx::PgPool;

use crate::audit::AuditLogger;
use crate::cache::TtlCache;
use crate::hubspot::ContentApi;
use crate::sheets::SheetsApi;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// HubSpot access behind the trait seam so engines test against a mock.
    pub hubspot: Arc<dyn ContentApi>,
    pub sheets: Arc<dyn SheetsApi>,
    /// Process-wide TTL cache for discovery results and poll hashes.
    pub cache: Arc<TtlCache>,
    pub audit: AuditLogger,
}
