//! HTTP route handlers and router configuration

mod admin;
mod entities;
mod imports;
mod workspaces;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the main application router.
///
/// Workspace-scoped paths carry the workspace id in the URL
/// (`/w/:wid/...`); nothing else identifies the tenant.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors_enabled = state.config.cors_enabled;

    let mut router = Router::new()
        .route("/health", get(admin::health))
        .route(
            "/workspaces",
            get(workspaces::list).post(workspaces::create),
        )
        .route("/w/:wid/schema", get(workspaces::schema))
        .route(
            "/w/:wid/imports",
            post(imports::create).get(imports::list),
        )
        .route("/w/:wid/imports/:import_run_id", get(imports::get))
        .route("/w/:wid/imports/:import_run_id/diff", get(imports::diff))
        .route("/w/:wid/entities/search", get(entities::search))
        .route("/w/:wid/entities/:entity_id", get(entities::detail))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors_enabled {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}
