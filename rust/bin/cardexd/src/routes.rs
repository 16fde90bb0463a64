//! Route registration: module routes plus system endpoints.

use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use cardex_core::Module;

/// Build the complete router. Module routes are merged at the root.
pub fn build_router(modules: &[&dyn Module]) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/version", get(version));

    for module in modules {
        tracing::debug!(module = module.name(), "mounting routes");
        app = app.merge(module.routes());
    }
    app
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
    }))
}

async fn version() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "cardexd",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
