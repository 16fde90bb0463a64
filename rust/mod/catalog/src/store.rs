use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use cardex_core::{PageWindow, ServiceError};
use cardex_sql::{Row, SQLError, SQLExec, SQLStore, Value};

use crate::model::{
    Card, CardData, Expansion, ExpansionData, PokemonType, Rarity, RelationKind, RelationNames,
    Relations, TypeData,
};
use crate::query::Filter;

/// SQL schema for the catalogue.
///
/// Uniqueness is enforced on `casefold`ed names. Card references use the
/// default NO ACTION, so a referenced expansion or type cannot be deleted,
/// while type edges CASCADE with either endpoint.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS expansions (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    series          TEXT NOT NULL,
    cards           INTEGER,
    release_date    TEXT,
    promotional_set INTEGER
);
CREATE UNIQUE INDEX IF NOT EXISTS uq_expansion_name_series
    ON expansions(casefold(name), casefold(series));

CREATE TABLE IF NOT EXISTS pokemon_types (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS uq_type_name ON pokemon_types(casefold(name));

CREATE TABLE IF NOT EXISTS type_relations (
    kind      TEXT NOT NULL,
    source_id INTEGER NOT NULL REFERENCES pokemon_types(id) ON DELETE CASCADE,
    target_id INTEGER NOT NULL REFERENCES pokemon_types(id) ON DELETE CASCADE,
    PRIMARY KEY (kind, source_id, target_id)
);
CREATE INDEX IF NOT EXISTS idx_type_relations_target ON type_relations(target_id);

CREATE TABLE IF NOT EXISTS cards (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT NOT NULL,
    first_edition INTEGER,
    rarity        TEXT,
    expansion_id  INTEGER REFERENCES expansions(id),
    type1_id      INTEGER REFERENCES pokemon_types(id),
    type2_id      INTEGER REFERENCES pokemon_types(id),
    hp            INTEGER,
    card_number   INTEGER,
    price         TEXT,
    image         TEXT,
    created       TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS uq_card_name ON cards(casefold(name));
CREATE INDEX IF NOT EXISTS idx_card_expansion ON cards(expansion_id);
CREATE INDEX IF NOT EXISTS idx_card_type1 ON cards(type1_id);
CREATE INDEX IF NOT EXISTS idx_card_type2 ON cards(type2_id);
";

/// Tables that other rows can reference by identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefTable {
    Expansion,
    PokemonType,
}

impl RefTable {
    fn table(self) -> &'static str {
        match self {
            Self::Expansion => "expansions",
            Self::PokemonType => "pokemon_types",
        }
    }
}

/// Relational storage for expansions, types and cards, backed by SQLStore.
///
/// Every mutating call is one transaction. Uniqueness failures surface as
/// `ServiceError::Conflict`, restricted deletes as `ServiceError::Protected`.
pub struct CatalogStore {
    db: Arc<dyn SQLStore>,
}

impl CatalogStore {
    /// Create a new CatalogStore and initialise the schema.
    pub fn new(db: Arc<dyn SQLStore>) -> Result<Self, ServiceError> {
        db.exec_batch(SCHEMA)
            .map_err(|e| ServiceError::Storage(format!("catalog schema init: {e}")))?;
        Ok(Self { db })
    }

    /// Whether a row with `id` exists in `table`.
    pub fn exists(&self, table: RefTable, id: i64) -> Result<bool, ServiceError> {
        let rows = self
            .db
            .query(
                &format!("SELECT 1 AS hit FROM {} WHERE id = ?1", table.table()),
                &[Value::Integer(id)],
            )
            .map_err(read_err)?;
        Ok(!rows.is_empty())
    }

    // -----------------------------------------------------------------------
    // Expansions
    // -----------------------------------------------------------------------

    pub fn insert_expansion(&self, data: &ExpansionData) -> Result<i64, ServiceError> {
        self.db
            .insert(
                "INSERT INTO expansions (name, series, cards, release_date, promotional_set) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                &expansion_params(data),
            )
            .map_err(write_err)
    }

    pub fn get_expansion(&self, id: i64) -> Result<Option<Expansion>, ServiceError> {
        let rows = self
            .db
            .query("SELECT * FROM expansions WHERE id = ?1", &[Value::Integer(id)])
            .map_err(read_err)?;
        rows.first().map(row_to_expansion).transpose()
    }

    pub fn update_expansion(&self, id: i64, data: &ExpansionData) -> Result<(), ServiceError> {
        let mut params = expansion_params(data);
        params.push(Value::Integer(id));
        let affected = self
            .db
            .exec(
                "UPDATE expansions SET name = ?1, series = ?2, cards = ?3, \
                 release_date = ?4, promotional_set = ?5 WHERE id = ?6",
                &params,
            )
            .map_err(write_err)?;
        found(affected, "expansion", id)
    }

    pub fn delete_expansion(&self, id: i64) -> Result<(), ServiceError> {
        let affected = self
            .db
            .exec("DELETE FROM expansions WHERE id = ?1", &[Value::Integer(id)])
            .map_err(|e| delete_err(e, "expansion", id))?;
        found(affected, "expansion", id)
    }

    pub fn count_expansions(&self, filter: &Filter) -> Result<usize, ServiceError> {
        count(self.db.as_ref(), "expansions", filter)
    }

    pub fn list_expansions(
        &self,
        filter: &Filter,
        window: &PageWindow,
    ) -> Result<Vec<Expansion>, ServiceError> {
        page(self.db.as_ref(), "expansions", filter, window)?
            .iter()
            .map(row_to_expansion)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Pokémon types
    // -----------------------------------------------------------------------

    /// Insert a type together with its four edge sets.
    pub fn insert_type(&self, data: &TypeData) -> Result<i64, ServiceError> {
        let tx = self.db.begin().map_err(write_err)?;
        let id = tx
            .insert(
                "INSERT INTO pokemon_types (name) VALUES (?1)",
                &[Value::Text(data.name.clone())],
            )
            .map_err(write_err)?;
        for kind in RelationKind::ALL {
            write_edges(&*tx, kind, id, data.relations.get(kind))?;
        }
        tx.commit().map_err(write_err)?;
        Ok(id)
    }

    pub fn get_type(&self, id: i64) -> Result<Option<PokemonType>, ServiceError> {
        let rows = self
            .db
            .query("SELECT * FROM pokemon_types WHERE id = ?1", &[Value::Integer(id)])
            .map_err(read_err)?;
        rows.first().map(row_to_type).transpose()
    }

    /// Rename a type and replace all four of its edge sets.
    pub fn update_type(&self, id: i64, data: &TypeData) -> Result<(), ServiceError> {
        let tx = self.db.begin().map_err(write_err)?;
        let affected = tx
            .exec(
                "UPDATE pokemon_types SET name = ?1 WHERE id = ?2",
                &[Value::Text(data.name.clone()), Value::Integer(id)],
            )
            .map_err(write_err)?;
        found(affected, "pokemon type", id)?;
        for kind in RelationKind::ALL {
            clear_edges(&*tx, kind, id)?;
            write_edges(&*tx, kind, id, data.relations.get(kind))?;
        }
        tx.commit().map_err(write_err)
    }

    /// Delete a type. Its edges in every set go with it; cards referencing
    /// it block the delete.
    pub fn delete_type(&self, id: i64) -> Result<(), ServiceError> {
        let affected = self
            .db
            .exec("DELETE FROM pokemon_types WHERE id = ?1", &[Value::Integer(id)])
            .map_err(|e| delete_err(e, "pokemon type", id))?;
        found(affected, "pokemon type", id)
    }

    pub fn count_types(&self, filter: &Filter) -> Result<usize, ServiceError> {
        count(self.db.as_ref(), "pokemon_types", filter)
    }

    pub fn list_types(
        &self,
        filter: &Filter,
        window: &PageWindow,
    ) -> Result<Vec<PokemonType>, ServiceError> {
        page(self.db.as_ref(), "pokemon_types", filter, window)?
            .iter()
            .map(row_to_type)
            .collect()
    }

    /// Add `targets` to one edge set of `source`. Existing edges are kept.
    pub fn add_relations(
        &self,
        kind: RelationKind,
        source: i64,
        targets: &[i64],
    ) -> Result<(), ServiceError> {
        let tx = self.db.begin().map_err(write_err)?;
        write_edges(&*tx, kind, source, targets)?;
        tx.commit().map_err(write_err)
    }

    /// Remove `targets` from one edge set of `source`. Missing edges are ignored.
    pub fn remove_relations(
        &self,
        kind: RelationKind,
        source: i64,
        targets: &[i64],
    ) -> Result<(), ServiceError> {
        let tx = self.db.begin().map_err(write_err)?;
        for target in targets {
            tx.exec(
                "DELETE FROM type_relations WHERE kind = ?1 AND source_id = ?2 AND target_id = ?3",
                &[
                    Value::Text(kind.as_str().into()),
                    Value::Integer(source),
                    Value::Integer(*target),
                ],
            )
            .map_err(write_err)?;
        }
        tx.commit().map_err(write_err)
    }

    /// Make one edge set of `source` exactly `targets`.
    pub fn replace_relations(
        &self,
        kind: RelationKind,
        source: i64,
        targets: &[i64],
    ) -> Result<(), ServiceError> {
        let tx = self.db.begin().map_err(write_err)?;
        clear_edges(&*tx, kind, source)?;
        write_edges(&*tx, kind, source, targets)?;
        tx.commit().map_err(write_err)
    }

    /// Target identifiers of each edge set, ascending.
    pub fn relations(&self, source: i64) -> Result<Relations, ServiceError> {
        let rows = self
            .db
            .query(
                "SELECT kind, target_id FROM type_relations WHERE source_id = ?1 \
                 ORDER BY target_id ASC",
                &[Value::Integer(source)],
            )
            .map_err(read_err)?;
        let mut relations = Relations::default();
        for kind in RelationKind::ALL {
            let ids = rows
                .iter()
                .filter(|r| r.get_str("kind") == Some(kind.as_str()))
                .filter_map(|r| r.get_i64("target_id"))
                .collect();
            relations.set(kind, ids);
        }
        Ok(relations)
    }

    /// Target names of each edge set, ordered by target identifier.
    pub fn relation_names(&self, source: i64) -> Result<RelationNames, ServiceError> {
        let rows = self
            .db
            .query(
                "SELECT r.kind AS kind, t.name AS name FROM type_relations r \
                 JOIN pokemon_types t ON t.id = r.target_id \
                 WHERE r.source_id = ?1 ORDER BY t.id ASC",
                &[Value::Integer(source)],
            )
            .map_err(read_err)?;
        let mut names = RelationNames::default();
        for kind in RelationKind::ALL {
            let list = rows
                .iter()
                .filter(|r| r.get_str("kind") == Some(kind.as_str()))
                .filter_map(|r| r.get_str("name").map(String::from))
                .collect();
            names.set(kind, list);
        }
        Ok(names)
    }

    // -----------------------------------------------------------------------
    // Cards
    // -----------------------------------------------------------------------

    /// Insert a card stamped with `created`.
    pub fn insert_card(&self, data: &CardData, created: NaiveDate) -> Result<i64, ServiceError> {
        let mut params = card_params(data);
        params.push(Value::Text(created.to_string()));
        self.db
            .insert(
                "INSERT INTO cards (name, first_edition, rarity, expansion_id, type1_id, \
                 type2_id, hp, card_number, price, image, created) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                &params,
            )
            .map_err(write_err)
    }

    pub fn get_card(&self, id: i64) -> Result<Option<Card>, ServiceError> {
        let rows = self
            .db
            .query("SELECT * FROM cards WHERE id = ?1", &[Value::Integer(id)])
            .map_err(read_err)?;
        rows.first().map(row_to_card).transpose()
    }

    /// Overwrite a card's writable columns; `created` is left untouched.
    pub fn update_card(&self, id: i64, data: &CardData) -> Result<(), ServiceError> {
        let mut params = card_params(data);
        params.push(Value::Integer(id));
        let affected = self
            .db
            .exec(
                "UPDATE cards SET name = ?1, first_edition = ?2, rarity = ?3, \
                 expansion_id = ?4, type1_id = ?5, type2_id = ?6, hp = ?7, \
                 card_number = ?8, price = ?9, image = ?10 WHERE id = ?11",
                &params,
            )
            .map_err(write_err)?;
        found(affected, "card", id)
    }

    pub fn delete_card(&self, id: i64) -> Result<(), ServiceError> {
        let affected = self
            .db
            .exec("DELETE FROM cards WHERE id = ?1", &[Value::Integer(id)])
            .map_err(|e| delete_err(e, "card", id))?;
        found(affected, "card", id)
    }

    /// Whether any card still points at the stored image `key`.
    pub fn image_in_use(&self, key: &str) -> Result<bool, ServiceError> {
        let rows = self
            .db
            .query(
                "SELECT 1 AS hit FROM cards WHERE image = ?1 LIMIT 1",
                &[Value::Text(key.to_string())],
            )
            .map_err(read_err)?;
        Ok(!rows.is_empty())
    }

    pub fn count_cards(&self, filter: &Filter) -> Result<usize, ServiceError> {
        count(self.db.as_ref(), "cards", filter)
    }

    pub fn list_cards(&self, filter: &Filter, window: &PageWindow) -> Result<Vec<Card>, ServiceError> {
        page(self.db.as_ref(), "cards", filter, window)?
            .iter()
            .map(row_to_card)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Statement helpers
// ---------------------------------------------------------------------------

fn write_edges<E: SQLExec + ?Sized>(
    db: &E,
    kind: RelationKind,
    source: i64,
    targets: &[i64],
) -> Result<(), ServiceError> {
    for target in targets {
        db.exec(
            "INSERT OR IGNORE INTO type_relations (kind, source_id, target_id) VALUES (?1, ?2, ?3)",
            &[
                Value::Text(kind.as_str().into()),
                Value::Integer(source),
                Value::Integer(*target),
            ],
        )
        .map_err(write_err)?;
    }
    Ok(())
}

fn clear_edges<E: SQLExec + ?Sized>(
    db: &E,
    kind: RelationKind,
    source: i64,
) -> Result<(), ServiceError> {
    db.exec(
        "DELETE FROM type_relations WHERE kind = ?1 AND source_id = ?2",
        &[Value::Text(kind.as_str().into()), Value::Integer(source)],
    )
    .map_err(write_err)?;
    Ok(())
}

fn count<E: SQLExec + ?Sized>(db: &E, table: &str, filter: &Filter) -> Result<usize, ServiceError> {
    let sql = format!("SELECT COUNT(*) AS cnt FROM {table}{}", filter.where_sql());
    let rows = db.query(&sql, filter.params()).map_err(read_err)?;
    Ok(rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0) as usize)
}

fn page<E: SQLExec + ?Sized>(
    db: &E,
    table: &str,
    filter: &Filter,
    window: &PageWindow,
) -> Result<Vec<Row>, ServiceError> {
    let sql = format!(
        "SELECT * FROM {table}{} ORDER BY id ASC LIMIT ? OFFSET ?",
        filter.where_sql()
    );
    let mut params = filter.params().to_vec();
    params.push(Value::Integer(window.limit() as i64));
    params.push(Value::Integer(window.offset() as i64));
    db.query(&sql, &params).map_err(read_err)
}

fn found(affected: u64, kind: &str, id: i64) -> Result<(), ServiceError> {
    if affected == 0 {
        Err(ServiceError::NotFound(format!("{kind} {id} not found")))
    } else {
        Ok(())
    }
}

fn read_err(e: SQLError) -> ServiceError {
    ServiceError::Storage(e.to_string())
}

fn write_err(e: SQLError) -> ServiceError {
    match e {
        SQLError::Constraint(msg) => ServiceError::Conflict(msg),
        SQLError::ForeignKey(msg) => ServiceError::Protected(msg),
        other => ServiceError::Storage(other.to_string()),
    }
}

fn delete_err(e: SQLError, kind: &str, id: i64) -> ServiceError {
    match e {
        SQLError::ForeignKey(_) => ServiceError::Protected(format!(
            "{kind} {id} cannot be deleted because cards still reference it"
        )),
        other => write_err(other),
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn expansion_params(data: &ExpansionData) -> Vec<Value> {
    vec![
        Value::Text(data.name.clone()),
        Value::Text(data.series.clone()),
        Value::opt_int(data.cards),
        Value::opt_text(data.release_date.map(|d| d.to_string()).as_deref()),
        Value::opt_bool(data.promotional_set),
    ]
}

fn card_params(data: &CardData) -> Vec<Value> {
    vec![
        Value::Text(data.name.clone()),
        Value::opt_bool(data.first_edition),
        Value::opt_text(data.rarity.map(|r| r.as_str())),
        Value::opt_int(data.expansion),
        Value::opt_int(data.type1),
        Value::opt_int(data.type2),
        Value::opt_int(data.hp),
        Value::opt_int(data.card_number),
        Value::opt_text(data.price.map(|p| p.to_string()).as_deref()),
        Value::opt_text(data.image.as_deref()),
    ]
}

fn row_to_expansion(row: &Row) -> Result<Expansion, ServiceError> {
    Ok(Expansion {
        id: required_id(row)?,
        data: ExpansionData {
            name: required_text(row, "name")?,
            series: required_text(row, "series")?,
            cards: row.get_i64("cards"),
            release_date: row.get_str("release_date").map(parse_date).transpose()?,
            promotional_set: row.get_bool("promotional_set"),
        },
    })
}

fn row_to_type(row: &Row) -> Result<PokemonType, ServiceError> {
    Ok(PokemonType {
        id: required_id(row)?,
        name: required_text(row, "name")?,
    })
}

fn row_to_card(row: &Row) -> Result<Card, ServiceError> {
    let rarity = match row.get_str("rarity") {
        Some(s) => Some(
            Rarity::parse(s)
                .ok_or_else(|| ServiceError::Internal(format!("stored rarity {s:?}")))?,
        ),
        None => None,
    };
    let price = match row.get_str("price") {
        Some(s) => Some(
            Decimal::from_str(s)
                .map_err(|e| ServiceError::Internal(format!("stored price {s:?}: {e}")))?,
        ),
        None => None,
    };
    let created = row
        .get_str("created")
        .ok_or_else(|| ServiceError::Internal("missing created column".into()))
        .and_then(parse_date)?;

    Ok(Card {
        id: required_id(row)?,
        created,
        data: CardData {
            name: required_text(row, "name")?,
            first_edition: row.get_bool("first_edition"),
            rarity,
            expansion: row.get_i64("expansion_id"),
            type1: row.get_i64("type1_id"),
            type2: row.get_i64("type2_id"),
            hp: row.get_i64("hp"),
            card_number: row.get_i64("card_number"),
            price,
            image: row.get_str("image").map(String::from),
        },
    })
}

fn required_id(row: &Row) -> Result<i64, ServiceError> {
    row.get_i64("id")
        .ok_or_else(|| ServiceError::Internal("missing id column".into()))
}

fn required_text(row: &Row, column: &str) -> Result<String, ServiceError> {
    row.get_str(column)
        .map(String::from)
        .ok_or_else(|| ServiceError::Internal(format!("missing {column} column")))
}

fn parse_date(s: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| ServiceError::Internal(format!("stored date {s:?}: {e}")))
}
