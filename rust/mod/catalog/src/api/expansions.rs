use std::sync::Arc;

use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use cardex_core::{Page, PageParams, ServiceError};

use super::{ServiceState, page_url, parse_id, slashed};
use crate::query::{ExpansionParams, ExpansionQuery};
use crate::service::CatalogService;
use crate::view::ExpansionView;

pub fn router(service: Arc<CatalogService>) -> Router {
    let mut r = Router::new();
    r = slashed(r, "/expansions", get(list_expansions).post(create_expansion));
    r = slashed(
        r,
        "/expansions/{id}",
        get(get_expansion)
            .put(replace_expansion)
            .patch(patch_expansion)
            .delete(delete_expansion),
    );
    r = slashed(r, "/expansions/series/{series}", get(list_by_series));
    r.with_state(service)
}

// ---------------------------------------------------------------------------
// GET/POST /expansions
// ---------------------------------------------------------------------------

async fn list_expansions(
    State(service): State<ServiceState>,
    Query(page): Query<PageParams>,
    Query(params): Query<ExpansionParams>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Page<ExpansionView>>, ServiceError> {
    let query = ExpansionQuery::from_params(&params)?;
    let result = service.list_expansions(&query, &page, &page_url(&headers, &uri))?;
    Ok(Json(result))
}

async fn create_expansion(
    State(service): State<ServiceState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<ExpansionView>), ServiceError> {
    let expansion = service.create_expansion(&body)?;
    Ok((StatusCode::CREATED, Json(expansion)))
}

// ---------------------------------------------------------------------------
// GET/PUT/PATCH/DELETE /expansions/{id}
// ---------------------------------------------------------------------------

async fn get_expansion(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<ExpansionView>, ServiceError> {
    let id = parse_id(&id, "expansion")?;
    Ok(Json(service.get_expansion(id)?))
}

async fn replace_expansion(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<ExpansionView>, ServiceError> {
    let id = parse_id(&id, "expansion")?;
    Ok(Json(service.update_expansion(id, &body, false)?))
}

async fn patch_expansion(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<ExpansionView>, ServiceError> {
    let id = parse_id(&id, "expansion")?;
    Ok(Json(service.update_expansion(id, &body, true)?))
}

async fn delete_expansion(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    let id = parse_id(&id, "expansion")?;
    service.delete_expansion(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// GET /expansions/series/{series}
// ---------------------------------------------------------------------------

async fn list_by_series(
    State(service): State<ServiceState>,
    Path(series): Path<String>,
    Query(page): Query<PageParams>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Page<ExpansionView>>, ServiceError> {
    let query = ExpansionQuery::by_series(&series);
    Ok(Json(service.list_expansions(&query, &page, &page_url(&headers, &uri))?))
}
