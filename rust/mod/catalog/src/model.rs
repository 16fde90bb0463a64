use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Rarity
// ---------------------------------------------------------------------------

/// How rare a card is. Stored and rendered in lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
}

impl Rarity {
    pub const ALL: [Rarity; 3] = [Rarity::Common, Rarity::Uncommon, Rarity::Rare];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Uncommon => "uncommon",
            Self::Rare => "rare",
        }
    }

    /// Case-insensitive lookup: "Common", "COMMON" and "common" all match.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for Rarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RelationKind
// ---------------------------------------------------------------------------

/// The four directed edge sets between Pokémon types.
///
/// Each kind is independent: an edge A→B in one set says nothing about B→A
/// or about any other set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelationKind {
    StrongVs,
    WeakVs,
    ResistantTo,
    VulnerableTo,
}

impl RelationKind {
    pub const ALL: [RelationKind; 4] = [
        RelationKind::StrongVs,
        RelationKind::WeakVs,
        RelationKind::ResistantTo,
        RelationKind::VulnerableTo,
    ];

    /// Field name in payloads and representations; also the stored kind tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StrongVs => "strong_vs",
            Self::WeakVs => "weak_vs",
            Self::ResistantTo => "resistant_to",
            Self::VulnerableTo => "vulnerable_to",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::StrongVs => 0,
            Self::WeakVs => 1,
            Self::ResistantTo => 2,
            Self::VulnerableTo => 3,
        }
    }
}

/// One value per relation kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerRelation<T>([T; 4]);

impl<T> PerRelation<T> {
    pub fn get(&self, kind: RelationKind) -> &T {
        &self.0[kind.index()]
    }

    pub fn set(&mut self, kind: RelationKind, value: T) {
        self.0[kind.index()] = value;
    }

    pub fn take(&mut self, kind: RelationKind) -> T
    where
        T: Default,
    {
        std::mem::take(&mut self.0[kind.index()])
    }
}

/// Target type identifiers per relation kind.
pub type Relations = PerRelation<Vec<i64>>;

/// Target type names per relation kind, ordered by target identifier.
pub type RelationNames = PerRelation<Vec<String>>;

// ---------------------------------------------------------------------------
// Expansion
// ---------------------------------------------------------------------------

/// Writable attributes of an expansion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpansionData {
    pub name: String,
    pub series: String,
    pub cards: Option<i64>,
    pub release_date: Option<NaiveDate>,
    pub promotional_set: Option<bool>,
}

/// A released card set. `(name, series)` is unique ignoring case.
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    pub id: i64,
    pub data: ExpansionData,
}

// ---------------------------------------------------------------------------
// PokemonType
// ---------------------------------------------------------------------------

/// Writable attributes of a type, including its outgoing edge sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeData {
    pub name: String,
    pub relations: Relations,
}

/// An elemental type. The name is unique ignoring case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PokemonType {
    pub id: i64,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Card
// ---------------------------------------------------------------------------

/// Writable attributes of a card.
///
/// `expansion`, `type1` and `type2` hold identifiers; `type1` and `type2`
/// may name the same type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardData {
    pub name: String,
    pub first_edition: Option<bool>,
    pub rarity: Option<Rarity>,
    pub expansion: Option<i64>,
    pub type1: Option<i64>,
    pub type2: Option<i64>,
    pub hp: Option<i64>,
    pub card_number: Option<i64>,
    /// Always held at two decimal places.
    pub price: Option<Decimal>,
    /// Blob key of the card image, e.g. `img/pikachu.jpg`.
    pub image: Option<String>,
}

/// A single collectible card. `created` is set on insert and never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub id: i64,
    pub created: NaiveDate,
    pub data: CardData,
}
