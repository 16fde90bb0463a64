mod cards;
mod expansions;
mod media;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderMap, Uri, header};
use axum::routing::MethodRouter;

use cardex_core::{PageUrl, ServiceError};

use crate::service::CatalogService;

type ServiceState = Arc<CatalogService>;

/// Build the complete catalogue router.
///
/// Routes (each also answers with a trailing slash):
/// - `GET/POST              /cards`
/// - `GET/PUT/PATCH/DELETE  /cards/{id}`
/// - `PUT                   /cards/{id}/image?filename=`
/// - `GET                   /cards/expansion/{id}`, `/cards/type/{id}`, `/cards/rarity/{value}`
/// - `GET/POST              /expansions`
/// - `GET/PUT/PATCH/DELETE  /expansions/{id}`
/// - `GET                   /expansions/series/{name}`
/// - `GET/POST              /types`
/// - `GET/PUT/PATCH/DELETE  /types/{id}`
/// - `GET                   /types/name/{name}`
/// - `GET                   /media/{*key}`
pub fn router(service: Arc<CatalogService>) -> Router {
    Router::new()
        .merge(cards::router(Arc::clone(&service)))
        .merge(expansions::router(Arc::clone(&service)))
        .merge(types::router(Arc::clone(&service)))
        .merge(media::router(service))
}

/// Register `handler` at `path` and at `path/`.
fn slashed(
    router: Router<ServiceState>,
    path: &str,
    handler: MethodRouter<ServiceState>,
) -> Router<ServiceState> {
    router
        .route(path, handler.clone())
        .route(&format!("{path}/"), handler)
}

/// Identifiers in paths are digits only; anything else is an unknown resource.
fn parse_id(raw: &str, kind: &str) -> Result<i64, ServiceError> {
    raw.parse::<i64>()
        .ok()
        .filter(|_| raw.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| ServiceError::NotFound(format!("{kind} {raw} not found")))
}

/// Link base for paginated responses: absolute when the request names a host.
fn page_url(headers: &HeaderMap, uri: &Uri) -> PageUrl {
    let host = headers.get(header::HOST).and_then(|h| h.to_str().ok());
    PageUrl::new(host, uri.path(), uri.query())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use cardex_blob::{BlobStore, FileStore};
    use cardex_sql::{SQLStore, SqliteStore};

    fn app() -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db: Arc<dyn SQLStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let blob: Arc<dyn BlobStore> = Arc::new(FileStore::open(dir.path()).unwrap());
        let service = Arc::new(CatalogService::new(db, blob, "/media/").unwrap());
        (router(service), dir)
    }

    async fn api(
        router: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let body = match body {
            Some(v) => Body::from(serde_json::to_string(&v).unwrap()),
            None => Body::empty(),
        };
        let resp = router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    #[tokio::test]
    async fn empty_listing_envelope() {
        let (r, _dir) = app();
        for uri in ["/cards", "/cards/", "/expansions", "/types/"] {
            let (status, body) = api(&r, "GET", uri, None).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert_eq!(
                body,
                json!({"count": 0, "next": null, "previous": null, "results": []})
            );
        }
    }

    #[tokio::test]
    async fn twenty_types_paginate_by_ten() {
        let (r, _dir) = app();
        for i in 0..20 {
            let (status, _) = api(&r, "POST", "/types", Some(json!({"name": format!("Type {i}")}))).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = api(&r, "GET", "/types", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 20);
        assert_eq!(body["results"].as_array().unwrap().len(), 10);
        assert_eq!(body["next"], "/types?page=2");
        assert!(body["previous"].is_null());
        assert_eq!(body["results"][0]["name"], "Type 0");

        let (_, body) = api(&r, "GET", "/types?page=2", None).await;
        assert!(body["next"].is_null());
        assert_eq!(body["previous"], "/types");

        let (_, body) = api(&r, "GET", "/types?page_size=500", None).await;
        assert_eq!(body["results"].as_array().unwrap().len(), 20);

        let (status, body) = api(&r, "GET", "/types?page=3", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Invalid page.");
    }

    #[tokio::test]
    async fn absolute_links_with_host() {
        let (r, _dir) = app();
        for i in 0..3 {
            api(&r, "POST", "/types", Some(json!({"name": format!("T{i}")}))).await;
        }
        let req = Request::builder()
            .uri("/types?page_size=2&search=t")
            .header("host", "testserver")
            .body(Body::empty())
            .unwrap();
        let resp = r.clone().oneshot(req).await.unwrap();
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body["next"],
            "http://testserver/types?page=2&page_size=2&search=t"
        );
    }

    #[tokio::test]
    async fn hp_and_rarity_validation() {
        let (r, _dir) = app();
        let (status, body) = api(&r, "POST", "/cards", Some(json!({"name": "Pikachu", "hp": 99}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["hp"][0], "HP must be a multiple of 10.");

        let (status, body) = api(
            &r,
            "POST",
            "/cards",
            Some(json!({"name": "Pikachu", "hp": 100, "rarity": "Common"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["rarity"], "common");
        assert_eq!(body["hp"], 100);

        let (status, body) = api(
            &r,
            "POST",
            "/cards",
            Some(json!({"name": "Raichu", "rarity": "invalid"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["rarity"][0], "invalid is not a valid rarity.");

        let (status, body) = api(&r, "POST", "/cards", Some(json!({"name": "PIKACHU"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["name"][0], "card with this name already exists.");
    }

    #[tokio::test]
    async fn card_round_trip_nested() {
        let (r, _dir) = app();
        let (_, expansion) = api(
            &r,
            "POST",
            "/expansions",
            Some(json!({"name": "Base Set", "series": "Original", "release_date": "1999-01-09"})),
        )
        .await;
        let (_, fire) = api(&r, "POST", "/types", Some(json!({"name": "Fire"}))).await;
        let (_, water) = api(
            &r,
            "POST",
            "/types",
            Some(json!({"name": "Water", "strong_vs": [fire["id"]]})),
        )
        .await;

        let (status, created) = api(
            &r,
            "POST",
            "/cards",
            Some(json!({
                "name": "Charmander",
                "expansion": expansion["id"],
                "type1": fire["id"],
                "type2": water["id"],
                "price": "12.5",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let uri = format!("/cards/{}", created["id"]);
        let (status, card) = api(&r, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(card["expansion"], expansion);
        assert_eq!(card["type1"], fire);
        assert_eq!(card["type2"], water);
        assert_eq!(card["type2"]["strong_vs"], json!(["Fire"]));
        assert_eq!(card["price"], "12.50");
        for field in ["hp", "rarity", "card_number", "first_edition", "image"] {
            assert!(card[field].is_null(), "{field}");
        }
        let keys: Vec<&String> = card.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 12);
    }

    #[tokio::test]
    async fn update_and_delete_status_codes() {
        let (r, _dir) = app();
        let (_, card) = api(&r, "POST", "/cards", Some(json!({"name": "Eevee", "hp": 50}))).await;
        let uri = format!("/cards/{}/", card["id"]);

        let (status, body) = api(&r, "PATCH", &uri, Some(json!({"hp": 60}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hp"], 60);
        assert_eq!(body["created"], card["created"]);

        let (status, body) = api(&r, "PUT", &uri, Some(json!({"hp": 70}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["name"][0], "This field is required.");

        let (status, body) = api(&r, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_null());

        let (status, body) = api(&r, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        let (status, _) = api(&r, "GET", "/cards/abc", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn referenced_type_delete_is_blocked() {
        let (r, _dir) = app();
        let (_, fire) = api(&r, "POST", "/types", Some(json!({"name": "Fire"}))).await;
        api(&r, "POST", "/cards", Some(json!({"name": "Charmander", "type1": fire["id"]}))).await;

        let uri = format!("/types/{}", fire["id"]);
        let (status, body) = api(&r, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "REFERENCED");

        let (status, _) = api(&r, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn filter_endpoints() {
        let (r, _dir) = app();
        let (_, fire) = api(&r, "POST", "/types", Some(json!({"name": "Fire"}))).await;
        let (_, water) = api(&r, "POST", "/types", Some(json!({"name": "Water"}))).await;
        let (_, base) = api(
            &r,
            "POST",
            "/expansions",
            Some(json!({"name": "Base Set", "series": "Original Series"})),
        )
        .await;
        for body in [
            json!({"name": "Both", "type1": fire["id"], "type2": fire["id"], "rarity": "rare"}),
            json!({"name": "Second", "type1": water["id"], "type2": fire["id"], "expansion": base["id"]}),
            json!({"name": "Other", "type1": water["id"], "rarity": "common"}),
        ] {
            let (status, _) = api(&r, "POST", "/cards", Some(body)).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, body) = api(&r, "GET", &format!("/cards/type/{}", fire["id"]), None).await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["results"][0]["name"], "Both");
        assert_eq!(body["results"][1]["name"], "Second");

        let (_, body) = api(&r, "GET", &format!("/cards/expansion/{}", base["id"]), None).await;
        assert_eq!(body["count"], 1);
        let (status, body) = api(&r, "GET", "/cards/expansion/999", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);

        let (_, body) = api(&r, "GET", "/cards/rarity/RARE/", None).await;
        assert_eq!(body["count"], 1);
        let (status, _) = api(&r, "GET", "/cards/rarity/mythic", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = api(&r, "GET", "/cards?search=COMMON", None).await;
        assert_eq!(body["count"], 1);
        let (status, body) = api(&r, "GET", "/cards?created__year=soon", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["created__year"][0], "Enter a number.");

        let (_, body) = api(&r, "GET", "/expansions/series/original%20SERIES", None).await;
        assert_eq!(body["count"], 1);
        let (_, body) = api(&r, "GET", "/types/name/WATER", None).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["results"][0]["id"], water["id"]);
        let (_, body) = api(&r, "GET", "/types/name/Ice", None).await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn date_part_and_search_filters() {
        use chrono::Datelike;

        let (r, _dir) = app();
        for body in [
            json!({"name": "Base Set", "series": "Original", "release_date": "1999-01-09"}),
            json!({"name": "Jungle", "series": "Original", "release_date": "1999-06-16"}),
            json!({"name": "Ruby & Sapphire", "series": "EX", "release_date": "2003-06-18"}),
        ] {
            let (status, _) = api(&r, "POST", "/expansions", Some(body)).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, body) = api(&r, "GET", "/expansions?release_date__year=1999", None).await;
        assert_eq!(body["count"], 2);
        let (_, body) = api(
            &r,
            "GET",
            "/expansions?release_date__month=6&release_date__day=18",
            None,
        )
        .await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["results"][0]["name"], "Ruby & Sapphire");
        let (_, body) = api(&r, "GET", "/expansions?search=original+jung", None).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["results"][0]["name"], "Jungle");
        let (_, body) = api(&r, "GET", "/expansions?search=ex", None).await;
        assert_eq!(body["count"], 1);

        api(&r, "POST", "/cards", Some(json!({"name": "Évoli"}))).await;
        let (_, body) = api(&r, "GET", "/cards?search=%C3%89VOLI", None).await;
        assert_eq!(body["count"], 1);

        let year = cardex_core::today().year();
        let (_, body) = api(&r, "GET", &format!("/cards?created__year={year}"), None).await;
        assert_eq!(body["count"], 1);
        let (_, body) = api(&r, "GET", &format!("/cards?created__year={}", year - 1), None).await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn image_upload_and_media() {
        let (r, _dir) = app();
        let (_, card) = api(&r, "POST", "/cards", Some(json!({"name": "Mew"}))).await;

        let req = Request::builder()
            .method("PUT")
            .uri(format!("/cards/{}/image?filename=mew.png", card["id"]))
            .body(Body::from(&b"\x89PNG"[..]))
            .unwrap();
        let resp = r.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["image"], "/media/img/mew.png");

        let req = Request::builder()
            .uri("/media/img/mew.png")
            .body(Body::empty())
            .unwrap();
        let resp = r.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "image/png");
        let bytes = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        assert_eq!(&bytes[..], b"\x89PNG");

        let (status, _) = api(&r, "GET", "/media/img/missing.png", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
