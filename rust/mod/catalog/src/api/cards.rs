use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use cardex_core::{Page, PageParams, ServiceError};

use super::{ServiceState, page_url, parse_id, slashed};
use crate::query::{CardParams, CardQuery, CardScope};
use crate::service::CatalogService;
use crate::view::CardView;

pub fn router(service: Arc<CatalogService>) -> Router {
    let mut r = Router::new();
    r = slashed(r, "/cards", get(list_cards).post(create_card));
    r = slashed(
        r,
        "/cards/{id}",
        get(get_card)
            .put(replace_card)
            .patch(patch_card)
            .delete(delete_card),
    );
    r = slashed(r, "/cards/{id}/image", put(upload_image));
    r = slashed(r, "/cards/expansion/{id}", get(list_by_expansion));
    r = slashed(r, "/cards/type/{id}", get(list_by_type));
    r = slashed(r, "/cards/rarity/{rarity}", get(list_by_rarity));
    r.with_state(service)
}

// ---------------------------------------------------------------------------
// GET /cards
// ---------------------------------------------------------------------------

async fn list_cards(
    State(service): State<ServiceState>,
    Query(page): Query<PageParams>,
    Query(params): Query<CardParams>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Page<CardView>>, ServiceError> {
    let query = CardQuery::from_params(&params)?;
    let result = service.list_cards(&query, &page, &page_url(&headers, &uri))?;
    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// POST /cards
// ---------------------------------------------------------------------------

async fn create_card(
    State(service): State<ServiceState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<CardView>), ServiceError> {
    let card = service.create_card(&body)?;
    Ok((StatusCode::CREATED, Json(card)))
}

// ---------------------------------------------------------------------------
// GET/PUT/PATCH/DELETE /cards/{id}
// ---------------------------------------------------------------------------

async fn get_card(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<CardView>, ServiceError> {
    let id = parse_id(&id, "card")?;
    Ok(Json(service.get_card(id)?))
}

async fn replace_card(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<CardView>, ServiceError> {
    let id = parse_id(&id, "card")?;
    Ok(Json(service.update_card(id, &body, false)?))
}

async fn patch_card(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<CardView>, ServiceError> {
    let id = parse_id(&id, "card")?;
    Ok(Json(service.update_card(id, &body, true)?))
}

async fn delete_card(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    let id = parse_id(&id, "card")?;
    service.delete_card(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// PUT /cards/{id}/image?filename=
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ImageParams {
    filename: Option<String>,
}

async fn upload_image(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
    Query(params): Query<ImageParams>,
    body: Bytes,
) -> Result<Json<CardView>, ServiceError> {
    let id = parse_id(&id, "card")?;
    let filename = params
        .filename
        .ok_or_else(|| ServiceError::invalid("image", "No file was submitted."))?;
    Ok(Json(service.set_card_image(id, &filename, &body)?))
}

// ---------------------------------------------------------------------------
// Scoped listings
// ---------------------------------------------------------------------------

async fn list_by_expansion(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
    Query(page): Query<PageParams>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Page<CardView>>, ServiceError> {
    let id = parse_id(&id, "expansion")?;
    let query = CardQuery::scoped(CardScope::Expansion(id));
    Ok(Json(service.list_cards(&query, &page, &page_url(&headers, &uri))?))
}

async fn list_by_type(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
    Query(page): Query<PageParams>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Page<CardView>>, ServiceError> {
    let id = parse_id(&id, "pokemon type")?;
    let query = CardQuery::scoped(CardScope::Type(id));
    Ok(Json(service.list_cards(&query, &page, &page_url(&headers, &uri))?))
}

async fn list_by_rarity(
    State(service): State<ServiceState>,
    Path(rarity): Path<String>,
    Query(page): Query<PageParams>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Page<CardView>>, ServiceError> {
    let query = CardQuery::by_rarity(&rarity)?;
    Ok(Json(service.list_cards(&query, &page, &page_url(&headers, &uri))?))
}
