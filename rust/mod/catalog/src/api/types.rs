use std::sync::Arc;

use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use cardex_core::{Page, PageParams, ServiceError};

use super::{ServiceState, page_url, parse_id, slashed};
use crate::query::{TypeParams, TypeQuery};
use crate::service::CatalogService;
use crate::view::TypeView;

pub fn router(service: Arc<CatalogService>) -> Router {
    let mut r = Router::new();
    r = slashed(r, "/types", get(list_types).post(create_type));
    r = slashed(
        r,
        "/types/{id}",
        get(get_type)
            .put(replace_type)
            .patch(patch_type)
            .delete(delete_type),
    );
    r = slashed(r, "/types/name/{name}", get(list_by_name));
    r.with_state(service)
}

// ---------------------------------------------------------------------------
// GET/POST /types
// ---------------------------------------------------------------------------

async fn list_types(
    State(service): State<ServiceState>,
    Query(page): Query<PageParams>,
    Query(params): Query<TypeParams>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Page<TypeView>>, ServiceError> {
    let query = TypeQuery::from_params(&params);
    let result = service.list_types(&query, &page, &page_url(&headers, &uri))?;
    Ok(Json(result))
}

async fn create_type(
    State(service): State<ServiceState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<TypeView>), ServiceError> {
    let ty = service.create_type(&body)?;
    Ok((StatusCode::CREATED, Json(ty)))
}

// ---------------------------------------------------------------------------
// GET/PUT/PATCH/DELETE /types/{id}
// ---------------------------------------------------------------------------

async fn get_type(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<TypeView>, ServiceError> {
    let id = parse_id(&id, "pokemon type")?;
    Ok(Json(service.get_type(id)?))
}

async fn replace_type(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<TypeView>, ServiceError> {
    let id = parse_id(&id, "pokemon type")?;
    Ok(Json(service.update_type(id, &body, false)?))
}

async fn patch_type(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<TypeView>, ServiceError> {
    let id = parse_id(&id, "pokemon type")?;
    Ok(Json(service.update_type(id, &body, true)?))
}

async fn delete_type(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    let id = parse_id(&id, "pokemon type")?;
    service.delete_type(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// GET /types/name/{name}
// ---------------------------------------------------------------------------

async fn list_by_name(
    State(service): State<ServiceState>,
    Path(name): Path<String>,
    Query(page): Query<PageParams>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Page<TypeView>>, ServiceError> {
    let query = TypeQuery::by_name(&name);
    Ok(Json(service.list_types(&query, &page, &page_url(&headers, &uri))?))
}
