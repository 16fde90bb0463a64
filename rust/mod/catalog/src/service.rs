use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use cardex_blob::{BlobError, BlobStore};
use cardex_core::{Page, PageParams, PageUrl, ServiceError, today};
use cardex_sql::SQLStore;

use crate::model::{Card, CardData, ExpansionData, TypeData};
use crate::query::{CardQuery, ExpansionQuery, TypeQuery};
use crate::store::CatalogStore;
use crate::validate::{
    self, CARD_UNIQUE, CardPatch, Context, EXPANSION_UNIQUE, ExpansionPatch, Mode, TYPE_UNIQUE,
    TypePatch, unique_write,
};
use crate::view::{
    CardRefs, CardView, ExpansionView, TypeView, card_view, expansion_view, type_view,
};

/// Blob key prefix for card images.
const IMAGE_PREFIX: &str = "img/";

/// Catalogue service: validation, storage and representation for expansions,
/// types and cards.
///
/// Every operation takes untrusted input, validates it completely, performs
/// one store write and returns the fresh representation.
pub struct CatalogService {
    store: CatalogStore,
    blob: Arc<dyn BlobStore>,
    media_url: String,
}

impl CatalogService {
    pub fn new(
        db: Arc<dyn SQLStore>,
        blob: Arc<dyn BlobStore>,
        media_url: impl Into<String>,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            store: CatalogStore::new(db)?,
            blob,
            media_url: media_url.into(),
        })
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    fn context(&self) -> Context<'_> {
        Context {
            today: today(),
            refs: &self.store,
        }
    }

    fn update_mode(partial: bool) -> Mode {
        if partial { Mode::Partial } else { Mode::Replace }
    }

    // -----------------------------------------------------------------------
    // Expansions
    // -----------------------------------------------------------------------

    pub fn create_expansion(&self, payload: &Value) -> Result<ExpansionView, ServiceError> {
        let patch = ExpansionPatch::parse(payload, Mode::Create, &self.context())?;
        let data = patch.apply(ExpansionData::default());
        let id = unique_write(&EXPANSION_UNIQUE, || self.store.insert_expansion(&data))?;
        info!(id, name = %data.name, "expansion created");
        self.get_expansion(id)
    }

    pub fn get_expansion(&self, id: i64) -> Result<ExpansionView, ServiceError> {
        let expansion = self
            .store
            .get_expansion(id)?
            .ok_or_else(|| ServiceError::NotFound(format!("expansion {id} not found")))?;
        Ok(expansion_view(&expansion))
    }

    pub fn update_expansion(
        &self,
        id: i64,
        payload: &Value,
        partial: bool,
    ) -> Result<ExpansionView, ServiceError> {
        let stored = self
            .store
            .get_expansion(id)?
            .ok_or_else(|| ServiceError::NotFound(format!("expansion {id} not found")))?;
        let patch = ExpansionPatch::parse(payload, Self::update_mode(partial), &self.context())?;
        let data = patch.apply(stored.data);
        unique_write(&EXPANSION_UNIQUE, || self.store.update_expansion(id, &data))?;
        info!(id, partial, "expansion updated");
        self.get_expansion(id)
    }

    pub fn delete_expansion(&self, id: i64) -> Result<(), ServiceError> {
        self.store.delete_expansion(id)?;
        info!(id, "expansion deleted");
        Ok(())
    }

    pub fn list_expansions(
        &self,
        query: &ExpansionQuery,
        params: &PageParams,
        url: &PageUrl,
    ) -> Result<Page<ExpansionView>, ServiceError> {
        let filter = query.filter();
        let count = self.store.count_expansions(&filter)?;
        let window = params.resolve(count)?;
        let rows = self.store.list_expansions(&filter, &window)?;
        debug!(count, page = window.number, "expansions listed");
        Ok(Page::new(count, &window, url, rows.iter().map(expansion_view).collect()))
    }

    // -----------------------------------------------------------------------
    // Pokémon types
    // -----------------------------------------------------------------------

    pub fn create_type(&self, payload: &Value) -> Result<TypeView, ServiceError> {
        let patch = TypePatch::parse(payload, Mode::Create, &self.context())?;
        let data = patch.apply(TypeData::default());
        let id = unique_write(&TYPE_UNIQUE, || self.store.insert_type(&data))?;
        info!(id, name = %data.name, "pokemon type created");
        self.get_type(id)
    }

    pub fn get_type(&self, id: i64) -> Result<TypeView, ServiceError> {
        let ty = self
            .store
            .get_type(id)?
            .ok_or_else(|| ServiceError::NotFound(format!("pokemon type {id} not found")))?;
        Ok(type_view(&ty, self.store.relation_names(id)?))
    }

    pub fn update_type(
        &self,
        id: i64,
        payload: &Value,
        partial: bool,
    ) -> Result<TypeView, ServiceError> {
        let stored = self
            .store
            .get_type(id)?
            .ok_or_else(|| ServiceError::NotFound(format!("pokemon type {id} not found")))?;
        let patch = TypePatch::parse(payload, Self::update_mode(partial), &self.context())?;
        let data = patch.apply(TypeData {
            name: stored.name,
            relations: self.store.relations(id)?,
        });
        unique_write(&TYPE_UNIQUE, || self.store.update_type(id, &data))?;
        info!(id, partial, "pokemon type updated");
        self.get_type(id)
    }

    pub fn delete_type(&self, id: i64) -> Result<(), ServiceError> {
        self.store.delete_type(id)?;
        info!(id, "pokemon type deleted");
        Ok(())
    }

    pub fn list_types(
        &self,
        query: &TypeQuery,
        params: &PageParams,
        url: &PageUrl,
    ) -> Result<Page<TypeView>, ServiceError> {
        let filter = query.filter();
        let count = self.store.count_types(&filter)?;
        let window = params.resolve(count)?;
        let mut views = Vec::new();
        for ty in self.store.list_types(&filter, &window)? {
            let names = self.store.relation_names(ty.id)?;
            views.push(type_view(&ty, names));
        }
        debug!(count, page = window.number, "pokemon types listed");
        Ok(Page::new(count, &window, url, views))
    }

    // -----------------------------------------------------------------------
    // Cards
    // -----------------------------------------------------------------------

    pub fn create_card(&self, payload: &Value) -> Result<CardView, ServiceError> {
        let patch = CardPatch::parse(payload, Mode::Create, &self.context())?;
        let data = patch.apply(CardData::default());
        let id = unique_write(&CARD_UNIQUE, || self.store.insert_card(&data, today()))?;
        info!(id, name = %data.name, "card created");
        self.get_card(id)
    }

    pub fn get_card(&self, id: i64) -> Result<CardView, ServiceError> {
        let card = self.load_card(id)?;
        Refs::new(self).view(&card)
    }

    pub fn update_card(
        &self,
        id: i64,
        payload: &Value,
        partial: bool,
    ) -> Result<CardView, ServiceError> {
        let stored = self.load_card(id)?;
        let previous = stored.data.image.clone();
        let patch = CardPatch::parse(payload, Self::update_mode(partial), &self.context())?;
        let data = patch.apply(stored.data);
        unique_write(&CARD_UNIQUE, || self.store.update_card(id, &data))?;
        info!(id, partial, "card updated");
        if previous != data.image {
            self.release_image(previous);
        }
        self.get_card(id)
    }

    pub fn delete_card(&self, id: i64) -> Result<(), ServiceError> {
        let card = self.load_card(id)?;
        self.store.delete_card(id)?;
        info!(id, "card deleted");
        self.release_image(card.data.image);
        Ok(())
    }

    pub fn list_cards(
        &self,
        query: &CardQuery,
        params: &PageParams,
        url: &PageUrl,
    ) -> Result<Page<CardView>, ServiceError> {
        let filter = query.filter();
        let count = self.store.count_cards(&filter)?;
        let window = params.resolve(count)?;
        let mut refs = Refs::new(self);
        let mut views = Vec::new();
        for card in self.store.list_cards(&filter, &window)? {
            views.push(refs.view(&card)?);
        }
        debug!(count, page = window.number, "cards listed");
        Ok(Page::new(count, &window, url, views))
    }

    fn load_card(&self, id: i64) -> Result<Card, ServiceError> {
        self.store
            .get_card(id)?
            .ok_or_else(|| ServiceError::NotFound(format!("card {id} not found")))
    }

    // -----------------------------------------------------------------------
    // Images
    // -----------------------------------------------------------------------

    /// Store `bytes` as the image of card `id` under `img/<filename>`.
    pub fn set_card_image(
        &self,
        id: i64,
        filename: &str,
        bytes: &[u8],
    ) -> Result<CardView, ServiceError> {
        let mut card = self.load_card(id)?;
        let filename = filename.trim();
        if filename.is_empty() || filename.contains('/') {
            return Err(ServiceError::invalid(
                "image",
                "The submitted data was not a file. Check the encoding type on the form.",
            ));
        }
        validate::check_image_name(filename)?;
        if bytes.is_empty() {
            return Err(ServiceError::invalid("image", "The submitted file is empty."));
        }

        let key = format!("{IMAGE_PREFIX}{filename}");
        self.blob.put(&key, bytes).map_err(blob_err)?;
        let previous = card.data.image.replace(key.clone());
        self.store.update_card(id, &card.data)?;
        info!(id, size = bytes.len(), "card image stored");
        if previous.as_deref() != Some(key.as_str()) {
            self.release_image(previous);
        }
        self.get_card(id)
    }

    /// Drop the blob behind `key` once no card refers to it. Failures are
    /// logged; the card write has already happened.
    fn release_image(&self, key: Option<String>) {
        let Some(key) = key else { return };
        match self.store.image_in_use(&key) {
            Ok(true) => {}
            Ok(false) => match self.blob.delete(&key) {
                Ok(()) => debug!(key = %key, "card image released"),
                Err(e) => warn!(key = %key, error = %e, "failed to delete card image"),
            },
            Err(e) => warn!(key = %key, error = %e, "failed to check image references"),
        }
    }

    /// Raw bytes of a stored media object.
    pub fn media(&self, key: &str) -> Result<Vec<u8>, ServiceError> {
        self.blob
            .get(key)
            .map_err(blob_err)?
            .ok_or_else(|| ServiceError::NotFound(format!("media {key} not found")))
    }
}

fn blob_err(e: BlobError) -> ServiceError {
    match e {
        BlobError::InvalidKey(key) => ServiceError::NotFound(format!("media {key} not found")),
        BlobError::Io(msg) => ServiceError::Storage(msg),
    }
}

/// Resolves card references into views, reusing lookups within one request.
struct Refs<'a> {
    service: &'a CatalogService,
    expansions: HashMap<i64, ExpansionView>,
    types: HashMap<i64, TypeView>,
}

impl<'a> Refs<'a> {
    fn new(service: &'a CatalogService) -> Self {
        Self {
            service,
            expansions: HashMap::new(),
            types: HashMap::new(),
        }
    }

    fn view(&mut self, card: &Card) -> Result<CardView, ServiceError> {
        let refs = CardRefs {
            expansion: card.data.expansion.map(|id| self.expansion(id)).transpose()?,
            type1: card.data.type1.map(|id| self.pokemon_type(id)).transpose()?,
            type2: card.data.type2.map(|id| self.pokemon_type(id)).transpose()?,
        };
        Ok(card_view(card, refs, &self.service.media_url))
    }

    fn expansion(&mut self, id: i64) -> Result<ExpansionView, ServiceError> {
        if let Some(view) = self.expansions.get(&id) {
            return Ok(view.clone());
        }
        let view = self.service.get_expansion(id)?;
        self.expansions.insert(id, view.clone());
        Ok(view)
    }

    fn pokemon_type(&mut self, id: i64) -> Result<TypeView, ServiceError> {
        if let Some(view) = self.types.get(&id) {
            return Ok(view.clone());
        }
        let view = self.service.get_type(id)?;
        self.types.insert(id, view.clone());
        Ok(view)
    }
}
