pub mod api;
pub mod model;
pub mod query;
pub mod seed;
pub mod service;
pub mod store;
pub mod validate;
pub mod view;

use std::sync::Arc;

use axum::Router;
use cardex_blob::BlobStore;
use cardex_core::{Module, ServiceError};
use cardex_sql::SQLStore;

use service::CatalogService;

/// The trading-card catalogue: cards, expansions and Pokémon types.
///
/// Owns the schema in the shared SQL store and card images in the blob store.
pub struct CatalogModule {
    service: Arc<CatalogService>,
}

impl CatalogModule {
    /// Create the module and initialise its tables.
    pub fn new(
        db: Arc<dyn SQLStore>,
        blob: Arc<dyn BlobStore>,
        media_url: impl Into<String>,
    ) -> Result<Self, ServiceError> {
        let service = CatalogService::new(db, blob, media_url)?;
        Ok(Self {
            service: Arc::new(service),
        })
    }

    /// Direct access for population and other in-process callers.
    pub fn service(&self) -> &Arc<CatalogService> {
        &self.service
    }
}

impl Module for CatalogModule {
    fn name(&self) -> &str {
        "catalog"
    }

    fn routes(&self) -> Router {
        api::router(Arc::clone(&self.service))
    }
}
