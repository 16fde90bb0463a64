//! Bulk population from the bundled reference data.
//!
//! Rows go through the same create path as API requests. A row that fails
//! validation, collides with an existing row or names something that cannot
//! be resolved is logged and skipped; only storage failures abort the run.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use cardex_core::{PageWindow, ServiceError};
use cardex_sql::Value as SqlValue;

use crate::model::RelationKind;
use crate::query::{Filter, TypeQuery};
use crate::service::CatalogService;

const EXPANSIONS: &str = include_str!("../data/expansions.json");
const TYPES: &str = include_str!("../data/types.json");
const CARDS: &str = include_str!("../data/cards.json");

/// Created and skipped rows for one entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub created: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PopulateSummary {
    pub expansions: Tally,
    pub types: Tally,
    pub cards: Tally,
}

impl fmt::Display for PopulateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expansions {}/{} created, types {}/{} created, cards {}/{} created",
            self.expansions.created,
            self.expansions.created + self.expansions.skipped,
            self.types.created,
            self.types.created + self.types.skipped,
            self.cards.created,
            self.cards.created + self.cards.skipped,
        )
    }
}

#[derive(Debug, Deserialize)]
struct TypeRow {
    name: String,
    #[serde(default)]
    strong_vs: Vec<String>,
    #[serde(default)]
    weak_vs: Vec<String>,
    #[serde(default)]
    resistant_to: Vec<String>,
    #[serde(default)]
    vulnerable_to: Vec<String>,
}

impl TypeRow {
    fn targets(&self, kind: RelationKind) -> &[String] {
        match kind {
            RelationKind::StrongVs => &self.strong_vs,
            RelationKind::WeakVs => &self.weak_vs,
            RelationKind::ResistantTo => &self.resistant_to,
            RelationKind::VulnerableTo => &self.vulnerable_to,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CardRow {
    name: String,
    first_edition: Option<bool>,
    rarity: Option<String>,
    expansion: Option<String>,
    type1: Option<String>,
    type2: Option<String>,
    hp: Option<i64>,
    card_number: Option<i64>,
    price: Option<String>,
    image: Option<String>,
}

/// Populate expansions, types and cards from the bundled data, in that order.
pub fn populate(service: &CatalogService) -> Result<PopulateSummary, ServiceError> {
    let summary = PopulateSummary {
        expansions: populate_expansions(service, EXPANSIONS)?,
        types: populate_types(service, TYPES)?,
        cards: populate_cards(service, CARDS)?,
    };
    info!(%summary, "population finished");
    Ok(summary)
}

/// Errors that only affect the row being loaded.
fn skippable(e: &ServiceError) -> bool {
    matches!(
        e,
        ServiceError::Validation(_)
            | ServiceError::Conflict(_)
            | ServiceError::Protected(_)
            | ServiceError::NotFound(_)
    )
}

fn parse_rows<T: for<'de> Deserialize<'de>>(raw: &str, what: &str) -> Result<Vec<T>, ServiceError> {
    serde_json::from_str(raw)
        .map_err(|e| ServiceError::Internal(format!("bad {what} data: {e}")))
}

pub fn populate_expansions(service: &CatalogService, raw: &str) -> Result<Tally, ServiceError> {
    let rows: Vec<Value> = parse_rows(raw, "expansion")?;
    let mut tally = Tally::default();
    for row in &rows {
        match service.create_expansion(row) {
            Ok(_) => tally.created += 1,
            Err(e) if skippable(&e) => {
                warn!(row = %row, error = %e, "expansion skipped");
                tally.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(tally)
}

/// Create every type by name first, then link the relation sets, so that
/// rows may refer to types defined later in the data.
pub fn populate_types(service: &CatalogService, raw: &str) -> Result<Tally, ServiceError> {
    let rows: Vec<TypeRow> = parse_rows(raw, "type")?;
    let mut tally = Tally::default();
    for row in &rows {
        match service.create_type(&json!({ "name": row.name })) {
            Ok(_) => tally.created += 1,
            Err(e) if skippable(&e) => {
                warn!(name = %row.name, error = %e, "pokemon type skipped");
                tally.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    for row in &rows {
        let Some(source) = type_id(service, &row.name)? else {
            continue;
        };
        for kind in RelationKind::ALL {
            let mut targets = Vec::new();
            for name in row.targets(kind) {
                match type_id(service, name)? {
                    Some(id) => targets.push(id),
                    None => warn!(
                        source = %row.name,
                        target = %name,
                        kind = kind.as_str(),
                        "unknown type in relation"
                    ),
                }
            }
            service.store().add_relations(kind, source, &targets)?;
        }
    }
    Ok(tally)
}

/// Cards name their expansion and types; those are resolved to identifiers
/// before the row is created.
pub fn populate_cards(service: &CatalogService, raw: &str) -> Result<Tally, ServiceError> {
    let rows: Vec<CardRow> = parse_rows(raw, "card")?;
    let mut tally = Tally::default();
    for row in &rows {
        match load_card(service, row) {
            Ok(id) => {
                info!(id, name = %row.name, "card populated");
                tally.created += 1;
            }
            Err(e) if skippable(&e) => {
                warn!(name = %row.name, error = %e, "card skipped");
                tally.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(tally)
}

fn load_card(service: &CatalogService, row: &CardRow) -> Result<i64, ServiceError> {
    let expansion = match &row.expansion {
        Some(name) => Some(
            expansion_id(service, name)?
                .ok_or_else(|| ServiceError::NotFound(format!("expansion {name:?} not found")))?,
        ),
        None => None,
    };
    let mut types = [None, None];
    for (slot, name) in types.iter_mut().zip([&row.type1, &row.type2]) {
        if let Some(name) = name {
            *slot = Some(
                type_id(service, name)?
                    .ok_or_else(|| ServiceError::NotFound(format!("pokemon type {name:?} not found")))?,
            );
        }
    }

    let view = service.create_card(&json!({
        "name": row.name,
        "first_edition": row.first_edition,
        "rarity": row.rarity,
        "expansion": expansion,
        "type1": types[0],
        "type2": types[1],
        "hp": row.hp,
        "card_number": row.card_number,
        "price": row.price,
    }))?;

    if let Some(key) = &row.image {
        let store = service.store();
        if let Some(mut card) = store.get_card(view.id)? {
            card.data.image = Some(key.clone());
            store.update_card(view.id, &card.data)?;
        }
    }
    Ok(view.id)
}

fn first_match() -> PageWindow {
    PageWindow {
        number: 1,
        size: 1,
        num_pages: 1,
    }
}

fn type_id(service: &CatalogService, name: &str) -> Result<Option<i64>, ServiceError> {
    let filter = TypeQuery::by_name(name).filter();
    let found = service.store().list_types(&filter, &first_match())?;
    Ok(found.first().map(|t| t.id))
}

/// Expansions are unique per series; the first one carrying `name` wins.
fn expansion_id(service: &CatalogService, name: &str) -> Result<Option<i64>, ServiceError> {
    let mut filter = Filter::new();
    filter.push("casefold(name) = casefold(?)", [SqlValue::Text(name.to_string())]);
    let found = service.store().list_expansions(&filter, &first_match())?;
    Ok(found.first().map(|e| e.id))
}
