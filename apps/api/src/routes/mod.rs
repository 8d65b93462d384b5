pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::{audit, export, headers, reconcile, syncback};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Header registry / discovery / configuration
        .route(
            "/api/v1/headers/discover",
            get(headers::handlers::handle_discover),
        )
        .route(
            "/api/v1/headers/missing",
            get(headers::handlers::handle_missing),
        )
        .route(
            "/api/v1/headers/missing/apply",
            post(headers::handlers::handle_apply_missing),
        )
        .route(
            "/api/v1/headers/compare",
            post(headers::handlers::handle_compare),
        )
        .route(
            "/api/v1/headers/apply",
            post(headers::handlers::handle_apply),
        )
        .route(
            "/api/v1/headers/config",
            get(headers::handlers::handle_list_config),
        )
        // Export
        .route("/api/v1/export", post(export::handlers::handle_export))
        .route(
            "/api/v1/exports",
            get(export::handlers::handle_export_history),
        )
        // Change detection
        .route(
            "/api/v1/changes/detect",
            post(reconcile::handlers::handle_detect),
        )
        .route(
            "/api/v1/changes/poll",
            post(reconcile::handlers::handle_poll),
        )
        // Sync back to HubSpot
        .route(
            "/api/v1/sync/to-hubspot",
            post(syncback::handlers::handle_sync),
        )
        // Audit history
        .route("/api/v1/audit", get(audit::handle_audit))
        .with_state(state)
}
