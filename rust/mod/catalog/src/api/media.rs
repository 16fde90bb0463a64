use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use cardex_core::ServiceError;

use super::ServiceState;
use crate::service::CatalogService;

pub fn router(service: Arc<CatalogService>) -> Router {
    Router::new()
        .route("/media/{*key}", get(get_media))
        .with_state(service)
}

// ---------------------------------------------------------------------------
// GET /media/{*key}
// ---------------------------------------------------------------------------

async fn get_media(
    State(service): State<ServiceState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let bytes = service.media(&key)?;
    Ok(([(header::CONTENT_TYPE, content_type(&key))], bytes))
}

fn content_type(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
