//! Validation pipeline for untrusted payloads.
//!
//! A payload is read field by field into a typed patch. Each field first goes
//! through the generic checks for its kind (required, null, blank, length,
//! integer range, decimal digits, reference existence) and then through the
//! entity's rule table. All messages are collected before anything is
//! written; a patch is only produced when the payload is clean.
//!
//! Uniqueness is left to the store. [`unique_write`] is the one place where a
//! storage conflict is turned back into field errors.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use cardex_core::{FieldErrors, NON_FIELD_ERRORS, ServiceError};

use crate::model::{CardData, ExpansionData, Rarity, RelationKind, TypeData};
use crate::store::{CatalogStore, RefTable};

const MAX_TEXT_LEN: usize = 100;
const MAX_INTEGER: i64 = 2_147_483_647;

const PRICE_MAX_DIGITS: u32 = 8;
const PRICE_DECIMAL_PLACES: u32 = 2;

const REQUIRED: &str = "This field is required.";
const NOT_NULL: &str = "This field may not be null.";
const NOT_BLANK: &str = "This field may not be blank.";

/// Allowed image file extensions, lowercase.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// How much of the entity a payload must describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    /// Full update: required fields must be present.
    Replace,
    /// Partial update: only supplied fields are validated.
    Partial,
}

impl Mode {
    fn requires_all(self) -> bool {
        !matches!(self, Mode::Partial)
    }
}

/// Existence lookups for reference fields.
pub trait ReferenceCheck {
    fn exists(&self, table: RefTable, id: i64) -> Result<bool, ServiceError>;
}

impl ReferenceCheck for CatalogStore {
    fn exists(&self, table: RefTable, id: i64) -> Result<bool, ServiceError> {
        CatalogStore::exists(self, table, id)
    }
}

/// Everything a rule may consult besides the value itself.
pub struct Context<'a> {
    pub today: NaiveDate,
    pub refs: &'a dyn ReferenceCheck,
}

/// One entry of a rule table: while validating `field`, the value must
/// satisfy `holds`, otherwise `message` is reported.
pub struct Rule<T: ?Sized> {
    pub field: &'static str,
    pub holds: fn(&T, &Context<'_>) -> bool,
    pub message: fn(&T) -> String,
}

/// Whether `s` reads as a float literal, digit-group underscores included.
fn is_numeric(s: &str) -> bool {
    strip_digit_separators(s.trim()).is_some_and(|s| s.parse::<f64>().is_ok())
}

/// Remove `_` separators, each of which must sit between two ASCII digits.
fn strip_digit_separators(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    for (i, c) in s.char_indices() {
        if c != '_' {
            out.push(c);
            continue;
        }
        let before = i.checked_sub(1).map(|j| bytes[j]);
        let after = bytes.get(i + 1).copied();
        if !before.is_some_and(|b| b.is_ascii_digit()) || !after.is_some_and(|b| b.is_ascii_digit())
        {
            return None;
        }
    }
    Some(out)
}

const EXPANSION_TEXT_RULES: &[Rule<str>] = &[
    Rule {
        field: "name",
        holds: |v, _| !is_numeric(v),
        message: |_| "Name must not be a number.".into(),
    },
    Rule {
        field: "series",
        holds: |v, _| !is_numeric(v),
        message: |_| "Series must not be a number.".into(),
    },
];

const EXPANSION_DATE_RULES: &[Rule<NaiveDate>] = &[Rule {
    field: "release_date",
    holds: |d, ctx| *d <= ctx.today,
    message: |_| "Release date cannot be in the future.".into(),
}];

const TYPE_TEXT_RULES: &[Rule<str>] = &[Rule {
    field: "name",
    holds: |v, _| !is_numeric(v),
    message: |_| "Name must not be a number.".into(),
}];

const CARD_TEXT_RULES: &[Rule<str>] = &[
    Rule {
        field: "name",
        holds: |v, _| !is_numeric(v),
        message: |_| "Name must not be a number.".into(),
    },
    Rule {
        field: "rarity",
        holds: |v, _| Rarity::parse(v).is_some(),
        message: |v| format!("{v} is not a valid rarity."),
    },
];

const CARD_INTEGER_RULES: &[Rule<i64>] = &[Rule {
    field: "hp",
    holds: |hp, _| hp % 10 == 0,
    message: |_| "HP must be a multiple of 10.".into(),
}];

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Reads typed fields out of a JSON object, collecting errors as it goes.
///
/// Accessors return `None` when the field is absent or invalid (the stored
/// value is kept), `Some(None)` for an explicit null and `Some(Some(v))` for
/// a value.
struct Reader<'a> {
    obj: &'a Map<String, Value>,
    mode: Mode,
    ctx: &'a Context<'a>,
    errors: FieldErrors,
    fault: Option<ServiceError>,
}

impl<'a> Reader<'a> {
    fn new(payload: &'a Value, mode: Mode, ctx: &'a Context<'a>) -> Result<Self, ServiceError> {
        let obj = payload.as_object().ok_or_else(|| {
            ServiceError::invalid(
                NON_FIELD_ERRORS,
                format!(
                    "Invalid data. Expected a dictionary, but got {}.",
                    type_name(payload)
                ),
            )
        })?;
        Ok(Self {
            obj,
            mode,
            ctx,
            errors: FieldErrors::new(),
            fault: None,
        })
    }

    fn finish(self) -> Result<(), ServiceError> {
        if let Some(fault) = self.fault {
            return Err(fault);
        }
        self.errors.into_result()
    }

    /// The raw value of `field`, with the required/null checks applied.
    fn present(&mut self, field: &str, required: bool) -> Option<Option<&'a Value>> {
        match self.obj.get(field) {
            None => {
                if required && self.mode.requires_all() {
                    self.errors.add(field, REQUIRED);
                }
                None
            }
            Some(Value::Null) if required => {
                self.errors.add(field, NOT_NULL);
                None
            }
            Some(Value::Null) => Some(None),
            Some(v) => Some(Some(v)),
        }
    }

    fn check<T: ?Sized>(&mut self, rules: &[Rule<T>], field: &str, value: &T) -> bool {
        for rule in rules.iter().filter(|r| r.field == field) {
            if !(rule.holds)(value, self.ctx) {
                self.errors.add(field, (rule.message)(value));
                return false;
            }
        }
        true
    }

    fn text(&mut self, field: &str, required: bool, rules: &[Rule<str>]) -> Option<Option<String>> {
        let value = match self.present(field, required)? {
            Some(v) => v,
            None => return Some(None),
        };
        let text = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => {
                self.errors.add(field, "Not a valid string.");
                return None;
            }
        };
        if text.is_empty() {
            self.errors.add(field, NOT_BLANK);
            return None;
        }
        if text.chars().count() > MAX_TEXT_LEN {
            self.errors.add(
                field,
                format!("Ensure this field has no more than {MAX_TEXT_LEN} characters."),
            );
            return None;
        }
        self.check(rules, field, text.as_str())
            .then_some(Some(text))
    }

    fn integer(&mut self, field: &str, rules: &[Rule<i64>]) -> Option<Option<i64>> {
        let value = match self.present(field, false)? {
            Some(v) => v,
            None => return Some(None),
        };
        let Some(n) = parse_integer(value) else {
            self.errors.add(field, "A valid integer is required.");
            return None;
        };
        if n < 0 {
            self.errors
                .add(field, "Ensure this value is greater than or equal to 0.");
            return None;
        }
        if n > MAX_INTEGER {
            self.errors.add(
                field,
                format!("Ensure this value is less than or equal to {MAX_INTEGER}."),
            );
            return None;
        }
        self.check(rules, field, &n).then_some(Some(n))
    }

    fn boolean(&mut self, field: &str) -> Option<Option<bool>> {
        match self.present(field, false)? {
            None => Some(None),
            Some(Value::Bool(b)) => Some(Some(*b)),
            Some(_) => {
                self.errors.add(field, "Must be a valid boolean.");
                None
            }
        }
    }

    fn date(&mut self, field: &str, rules: &[Rule<NaiveDate>]) -> Option<Option<NaiveDate>> {
        let value = match self.present(field, false)? {
            Some(v) => v,
            None => return Some(None),
        };
        let parsed = value
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok());
        let Some(date) = parsed else {
            self.errors.add(
                field,
                "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.",
            );
            return None;
        };
        self.check(rules, field, &date).then_some(Some(date))
    }

    fn price(&mut self, field: &str) -> Option<Option<Decimal>> {
        let value = match self.present(field, false)? {
            Some(v) => v,
            None => return Some(None),
        };
        let parsed = match value {
            Value::Number(n) => parse_decimal(&n.to_string()),
            Value::String(s) => parse_decimal(s.trim()),
            _ => None,
        };
        let Some(mut price) = parsed else {
            self.errors.add(field, "A valid number is required.");
            return None;
        };
        if let Err(message) = check_digits(&price, PRICE_MAX_DIGITS, PRICE_DECIMAL_PLACES) {
            self.errors.add(field, message);
            return None;
        }
        price.rescale(PRICE_DECIMAL_PLACES);
        Some(Some(price))
    }

    /// A single primary-key reference into `table`.
    fn reference(&mut self, field: &str, table: RefTable) -> Option<Option<i64>> {
        let value = match self.present(field, false)? {
            Some(v) => v,
            None => return Some(None),
        };
        self.resolve_pk(field, table, value).map(Some)
    }

    /// A list of primary-key references into `table`.
    fn references(&mut self, field: &str, table: RefTable) -> Option<Vec<i64>> {
        let value = self.present(field, true)??;
        let Value::Array(items) = value else {
            self.errors.add(
                field,
                format!(
                    "Expected a list of items but got type \"{}\".",
                    type_name(value)
                ),
            );
            return None;
        };
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            ids.push(self.resolve_pk(field, table, item)?);
        }
        Some(ids)
    }

    fn resolve_pk(&mut self, field: &str, table: RefTable, value: &Value) -> Option<i64> {
        let id = match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        let Some(id) = id else {
            self.errors.add(
                field,
                format!(
                    "Incorrect type. Expected pk value, received {}.",
                    type_name(value)
                ),
            );
            return None;
        };
        match self.ctx.refs.exists(table, id) {
            Ok(true) => Some(id),
            Ok(false) => {
                self.errors
                    .add(field, format!("Invalid pk \"{id}\" - object does not exist."));
                None
            }
            Err(e) => {
                if self.fault.is_none() {
                    self.fault = Some(e);
                }
                None
            }
        }
    }
}

/// Integers as JSON numbers or strings; `12.0` counts as 12, `12.5` does not.
fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 1e15)
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            let s = s.split_once('.').map_or(s, |(whole, frac)| {
                if frac.chars().all(|c| c == '0') { whole } else { s }
            });
            s.parse::<i64>().ok()
        }
        _ => None,
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Digit limits of a fixed-point column, counting digits the way they were
/// written (trailing zeros included).
fn check_digits(value: &Decimal, max_digits: u32, decimal_places: u32) -> Result<(), String> {
    let digits = value.mantissa().unsigned_abs().to_string().len() as u32;
    let scale = value.scale();
    let (total, decimals) = if digits > scale {
        (digits, scale)
    } else {
        (scale, scale)
    };
    let whole = total - decimals;
    let max_whole = max_digits - decimal_places;

    if total > max_digits {
        Err(format!(
            "Ensure that there are no more than {max_digits} digits in total."
        ))
    } else if decimals > decimal_places {
        Err(format!(
            "Ensure that there are no more than {decimal_places} decimal places."
        ))
    } else if whole > max_whole {
        Err(format!(
            "Ensure that there are no more than {max_whole} digits before the decimal point."
        ))
    } else {
        Ok(())
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

// ---------------------------------------------------------------------------
// Patches
// ---------------------------------------------------------------------------

/// Validated expansion fields. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpansionPatch {
    pub name: Option<String>,
    pub series: Option<String>,
    pub cards: Option<Option<i64>>,
    pub release_date: Option<Option<NaiveDate>>,
    pub promotional_set: Option<Option<bool>>,
}

impl ExpansionPatch {
    pub fn parse(payload: &Value, mode: Mode, ctx: &Context<'_>) -> Result<Self, ServiceError> {
        let mut r = Reader::new(payload, mode, ctx)?;
        let patch = Self {
            name: r.text("name", true, EXPANSION_TEXT_RULES).flatten(),
            series: r.text("series", true, EXPANSION_TEXT_RULES).flatten(),
            cards: r.integer("cards", &[]),
            release_date: r.date("release_date", EXPANSION_DATE_RULES),
            promotional_set: r.boolean("promotional_set"),
        };
        r.finish()?;
        Ok(patch)
    }

    pub fn apply(self, mut data: ExpansionData) -> ExpansionData {
        if let Some(v) = self.name {
            data.name = v;
        }
        if let Some(v) = self.series {
            data.series = v;
        }
        if let Some(v) = self.cards {
            data.cards = v;
        }
        if let Some(v) = self.release_date {
            data.release_date = v;
        }
        if let Some(v) = self.promotional_set {
            data.promotional_set = v;
        }
        data
    }
}

/// Validated type fields. A supplied relation list replaces the whole set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypePatch {
    pub name: Option<String>,
    pub relations: [Option<Vec<i64>>; 4],
}

impl TypePatch {
    pub fn parse(payload: &Value, mode: Mode, ctx: &Context<'_>) -> Result<Self, ServiceError> {
        let mut r = Reader::new(payload, mode, ctx)?;
        let name = r.text("name", true, TYPE_TEXT_RULES).flatten();
        let relations = RelationKind::ALL.map(|kind| {
            // Relation sets are optional on create and replace alike.
            if r.obj.contains_key(kind.as_str()) {
                r.references(kind.as_str(), RefTable::PokemonType)
            } else {
                None
            }
        });
        r.finish()?;
        Ok(Self { name, relations })
    }

    pub fn apply(self, mut data: TypeData) -> TypeData {
        if let Some(v) = self.name {
            data.name = v;
        }
        for (kind, ids) in RelationKind::ALL.into_iter().zip(self.relations) {
            if let Some(ids) = ids {
                data.relations.set(kind, ids);
            }
        }
        data
    }
}

/// Validated card fields. `created` and `image` are not writable here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardPatch {
    pub name: Option<String>,
    pub first_edition: Option<Option<bool>>,
    pub rarity: Option<Option<Rarity>>,
    pub expansion: Option<Option<i64>>,
    pub type1: Option<Option<i64>>,
    pub type2: Option<Option<i64>>,
    pub hp: Option<Option<i64>>,
    pub card_number: Option<Option<i64>>,
    pub price: Option<Option<Decimal>>,
    /// Only an explicit null is accepted, clearing the image.
    pub clear_image: bool,
}

impl CardPatch {
    pub fn parse(payload: &Value, mode: Mode, ctx: &Context<'_>) -> Result<Self, ServiceError> {
        let mut r = Reader::new(payload, mode, ctx)?;
        let clear_image = match r.obj.get("image") {
            None => false,
            Some(Value::Null) => true,
            Some(_) => {
                r.errors.add(
                    "image",
                    "The submitted data was not a file. Check the encoding type on the form.",
                );
                false
            }
        };
        let patch = Self {
            name: r.text("name", true, CARD_TEXT_RULES).flatten(),
            rarity: r
                .text("rarity", false, CARD_TEXT_RULES)
                .map(|v| v.and_then(|s| Rarity::parse(&s))),
            hp: r.integer("hp", CARD_INTEGER_RULES),
            type1: r.reference("type1", RefTable::PokemonType),
            type2: r.reference("type2", RefTable::PokemonType),
            expansion: r.reference("expansion", RefTable::Expansion),
            card_number: r.integer("card_number", CARD_INTEGER_RULES),
            first_edition: r.boolean("first_edition"),
            price: r.price("price"),
            clear_image,
        };
        r.finish()?;
        Ok(patch)
    }

    pub fn apply(self, mut data: CardData) -> CardData {
        if let Some(v) = self.name {
            data.name = v;
        }
        if let Some(v) = self.first_edition {
            data.first_edition = v;
        }
        if let Some(v) = self.rarity {
            data.rarity = v;
        }
        if let Some(v) = self.expansion {
            data.expansion = v;
        }
        if let Some(v) = self.type1 {
            data.type1 = v;
        }
        if let Some(v) = self.type2 {
            data.type2 = v;
        }
        if let Some(v) = self.hp {
            data.hp = v;
        }
        if let Some(v) = self.card_number {
            data.card_number = v;
        }
        if let Some(v) = self.price {
            data.price = v;
        }
        if self.clear_image {
            data.image = None;
        }
        data
    }
}

/// Reject image file names whose extension is not an allowed image type.
pub fn check_image_name(filename: &str) -> Result<(), ServiceError> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(ServiceError::invalid(
            "image",
            format!(
                "File extension \u{201c}{ext}\u{201d} is not allowed. Allowed extensions are: {}.",
                IMAGE_EXTENSIONS.join(", ")
            ),
        ))
    }
}

// ---------------------------------------------------------------------------
// Uniqueness
// ---------------------------------------------------------------------------

/// A case-insensitive uniqueness constraint as the client sees it.
pub struct Unique {
    pub fields: &'static [&'static str],
    pub message: &'static str,
}

pub const EXPANSION_UNIQUE: Unique = Unique {
    fields: &["name", "series"],
    message: "Expansion with this name and series already exists.",
};

pub const TYPE_UNIQUE: Unique = Unique {
    fields: &["name"],
    message: "pokemon type with this name already exists.",
};

pub const CARD_UNIQUE: Unique = Unique {
    fields: &["name"],
    message: "card with this name already exists.",
};

/// Run a store write, recasting a uniqueness conflict into field errors on
/// `unique.fields`. A reference that vanished between validation and the
/// write is reported as a non-field error.
pub fn unique_write<T>(
    unique: &Unique,
    write: impl FnOnce() -> Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    match write() {
        Err(ServiceError::Conflict(_)) => {
            let mut errors = FieldErrors::new();
            for field in unique.fields {
                errors.add(field, unique.message);
            }
            Err(ServiceError::Validation(errors))
        }
        Err(ServiceError::Protected(_)) => Err(ServiceError::invalid(
            NON_FIELD_ERRORS,
            "A referenced object no longer exists.",
        )),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Reference lookups against a fixed set of identifiers.
    struct Known {
        expansions: Vec<i64>,
        types: Vec<i64>,
    }

    impl ReferenceCheck for Known {
        fn exists(&self, table: RefTable, id: i64) -> Result<bool, ServiceError> {
            Ok(match table {
                RefTable::Expansion => self.expansions.contains(&id),
                RefTable::PokemonType => self.types.contains(&id),
            })
        }
    }

    const KNOWN: Known = Known {
        expansions: Vec::new(),
        types: Vec::new(),
    };

    fn ctx(refs: &dyn ReferenceCheck) -> Context<'_> {
        Context {
            today: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            refs,
        }
    }

    fn errors(result: Result<impl std::fmt::Debug, ServiceError>) -> FieldErrors {
        match result {
            Err(ServiceError::Validation(e)) => e,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn numeric_names_are_rejected() {
        let refs = KNOWN;
        let c = ctx(&refs);
        let e = errors(ExpansionPatch::parse(
            &json!({"name": " 12 ", "series": "3.5"}),
            Mode::Create,
            &c,
        ));
        assert_eq!(e.get("name"), ["Name must not be a number."]);
        assert_eq!(e.get("series"), ["Series must not be a number."]);

        let e = errors(CardPatch::parse(&json!({"name": 151}), Mode::Create, &c));
        assert_eq!(e.get("name"), ["Name must not be a number."]);

        assert!(TypePatch::parse(&json!({"name": "Fire 2"}), Mode::Create, &c).is_ok());
    }

    #[test]
    fn digit_group_underscores_count_as_numbers() {
        let refs = KNOWN;
        let c = ctx(&refs);
        for name in ["1_000", "3.141_5", "1_0e1_0"] {
            let e = errors(CardPatch::parse(&json!({"name": name}), Mode::Create, &c));
            assert_eq!(e.get("name"), ["Name must not be a number."], "{name}");
        }
        for name in ["1__000", "_1", "1_", "1_.5", "Mr_1"] {
            assert!(
                CardPatch::parse(&json!({"name": name}), Mode::Create, &c).is_ok(),
                "{name} rejected"
            );
        }
    }

    #[test]
    fn required_fields_depend_on_mode() {
        let refs = KNOWN;
        let c = ctx(&refs);
        let e = errors(ExpansionPatch::parse(&json!({}), Mode::Create, &c));
        assert_eq!(e.get("name"), [REQUIRED]);
        assert_eq!(e.get("series"), [REQUIRED]);

        let e = errors(CardPatch::parse(&json!({"hp": 30}), Mode::Replace, &c));
        assert_eq!(e.get("name"), [REQUIRED]);

        let patch = CardPatch::parse(&json!({"hp": 30}), Mode::Partial, &c).unwrap();
        assert_eq!(patch.hp, Some(Some(30)));
        assert_eq!(patch.name, None);
    }

    #[test]
    fn text_is_trimmed_and_bounded() {
        let refs = KNOWN;
        let c = ctx(&refs);
        let patch = TypePatch::parse(&json!({"name": "  Fire "}), Mode::Create, &c).unwrap();
        assert_eq!(patch.name.as_deref(), Some("Fire"));

        let e = errors(TypePatch::parse(&json!({"name": "   "}), Mode::Create, &c));
        assert_eq!(e.get("name"), [NOT_BLANK]);

        let e = errors(TypePatch::parse(&json!({"name": null}), Mode::Create, &c));
        assert_eq!(e.get("name"), [NOT_NULL]);

        let long = "x".repeat(101);
        let e = errors(TypePatch::parse(&json!({"name": long}), Mode::Create, &c));
        assert_eq!(
            e.get("name"),
            ["Ensure this field has no more than 100 characters."]
        );
    }

    #[test]
    fn hp_must_be_multiple_of_ten() {
        let refs = KNOWN;
        let c = ctx(&refs);
        let e = errors(CardPatch::parse(
            &json!({"name": "Pikachu", "hp": 99}),
            Mode::Create,
            &c,
        ));
        assert_eq!(e.get("hp"), ["HP must be a multiple of 10."]);

        let patch =
            CardPatch::parse(&json!({"name": "Pikachu", "hp": 100}), Mode::Create, &c).unwrap();
        assert_eq!(patch.hp, Some(Some(100)));

        let e = errors(CardPatch::parse(&json!({"hp": -10}), Mode::Partial, &c));
        assert_eq!(e.get("hp"), ["Ensure this value is greater than or equal to 0."]);

        let e = errors(CardPatch::parse(&json!({"hp": "ten"}), Mode::Partial, &c));
        assert_eq!(e.get("hp"), ["A valid integer is required."]);
    }

    #[test]
    fn rarity_is_normalized() {
        let refs = KNOWN;
        let c = ctx(&refs);
        let patch = CardPatch::parse(&json!({"rarity": "Common"}), Mode::Partial, &c).unwrap();
        assert_eq!(patch.rarity, Some(Some(Rarity::Common)));

        let patch = CardPatch::parse(&json!({"rarity": null}), Mode::Partial, &c).unwrap();
        assert_eq!(patch.rarity, Some(None));

        let e = errors(CardPatch::parse(&json!({"rarity": "invalid"}), Mode::Partial, &c));
        assert_eq!(e.get("rarity"), ["invalid is not a valid rarity."]);
    }

    #[test]
    fn release_date_not_in_future() {
        let refs = KNOWN;
        let c = ctx(&refs);
        let body = json!({"name": "Base", "series": "Original", "release_date": "2024-05-02"});
        let e = errors(ExpansionPatch::parse(&body, Mode::Create, &c));
        assert_eq!(e.get("release_date"), ["Release date cannot be in the future."]);

        let body = json!({"release_date": "2024-05-01"});
        let patch = ExpansionPatch::parse(&body, Mode::Partial, &c).unwrap();
        assert_eq!(patch.release_date, Some(NaiveDate::from_ymd_opt(2024, 5, 1)));

        let e = errors(ExpansionPatch::parse(
            &json!({"release_date": "01/05/2024"}),
            Mode::Partial,
            &c,
        ));
        assert!(e.get("release_date")[0].starts_with("Date has wrong format."));
    }

    #[test]
    fn price_digit_limits() {
        let refs = KNOWN;
        let c = ctx(&refs);
        let price = |v: Value| CardPatch::parse(&json!({ "price": v }), Mode::Partial, &c);

        let patch = price(json!(69.9)).unwrap();
        assert_eq!(patch.price.unwrap().unwrap().to_string(), "69.90");
        let patch = price(json!("1500")).unwrap();
        assert_eq!(patch.price.unwrap().unwrap().to_string(), "1500.00");

        let e = errors(price(json!("1.234")));
        assert_eq!(e.get("price"), ["Ensure that there are no more than 2 decimal places."]);
        let e = errors(price(json!("1234567.89")));
        assert_eq!(e.get("price"), ["Ensure that there are no more than 8 digits in total."]);
        let e = errors(price(json!("1234567")));
        assert_eq!(
            e.get("price"),
            ["Ensure that there are no more than 6 digits before the decimal point."]
        );
        let e = errors(price(json!("cheap")));
        assert_eq!(e.get("price"), ["A valid number is required."]);
    }

    #[test]
    fn references_must_exist() {
        let refs = Known {
            expansions: vec![1],
            types: vec![1, 2],
        };
        let c = ctx(&refs);
        let patch = CardPatch::parse(
            &json!({"name": "Pikachu", "expansion": 1, "type1": 2, "type2": 2}),
            Mode::Create,
            &c,
        )
        .unwrap();
        assert_eq!(patch.type1, patch.type2);

        let e = errors(CardPatch::parse(&json!({"expansion": 9}), Mode::Partial, &c));
        assert_eq!(e.get("expansion"), ["Invalid pk \"9\" - object does not exist."]);

        let e = errors(CardPatch::parse(&json!({"type1": true}), Mode::Partial, &c));
        assert_eq!(
            e.get("type1"),
            ["Incorrect type. Expected pk value, received bool."]
        );

        let patch = TypePatch::parse(&json!({"weak_vs": [2, 1]}), Mode::Partial, &c).unwrap();
        assert_eq!(patch.relations[1], Some(vec![2, 1]));
        assert_eq!(patch.relations[0], None);

        let e = errors(TypePatch::parse(&json!({"strong_vs": "Fire"}), Mode::Partial, &c));
        assert_eq!(
            e.get("strong_vs"),
            ["Expected a list of items but got type \"str\"."]
        );
    }

    #[test]
    fn non_object_payload() {
        let refs = KNOWN;
        let c = ctx(&refs);
        let e = errors(TypePatch::parse(&json!(["Fire"]), Mode::Create, &c));
        assert_eq!(
            e.get(NON_FIELD_ERRORS),
            ["Invalid data. Expected a dictionary, but got list."]
        );
    }

    #[test]
    fn apply_keeps_absent_fields() {
        let refs = KNOWN;
        let c = ctx(&refs);
        let stored = CardData {
            name: "Pikachu".into(),
            hp: Some(60),
            rarity: Some(Rarity::Common),
            image: Some("img/pikachu.jpg".into()),
            ..Default::default()
        };
        let patch =
            CardPatch::parse(&json!({"hp": 70, "rarity": null}), Mode::Partial, &c).unwrap();
        let data = patch.apply(stored);
        assert_eq!(data.name, "Pikachu");
        assert_eq!(data.hp, Some(70));
        assert_eq!(data.rarity, None);
        assert_eq!(data.image.as_deref(), Some("img/pikachu.jpg"));
    }

    #[test]
    fn conflicts_become_field_errors() {
        let e = errors(unique_write(&EXPANSION_UNIQUE, || -> Result<(), _> {
            Err(ServiceError::Conflict("UNIQUE constraint failed".into()))
        }));
        assert_eq!(e.get("name"), [EXPANSION_UNIQUE.message]);
        assert_eq!(e.get("series"), [EXPANSION_UNIQUE.message]);

        let ok = unique_write(&CARD_UNIQUE, || Ok::<_, ServiceError>(7)).unwrap();
        assert_eq!(ok, 7);

        let err = unique_write(&CARD_UNIQUE, || -> Result<(), _> {
            Err(ServiceError::Storage("disk".into()))
        })
        .unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));
    }

    #[test]
    fn image_extensions() {
        assert!(check_image_name("pikachu.JPG").is_ok());
        assert!(check_image_name("a.b.webp").is_ok());
        let e = errors(check_image_name("notes.txt"));
        assert!(e.get("image")[0].contains("txt"));
        assert!(check_image_name("noext").is_err());
    }
}
