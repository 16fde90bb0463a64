//! Client-facing representations, built from stored entities after every read.
//!
//! Field order in each struct is the order clients see in JSON.

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{Card, Expansion, PokemonType, Rarity, RelationKind, RelationNames};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpansionView {
    pub id: i64,
    pub name: String,
    pub series: String,
    pub cards: Option<i64>,
    pub release_date: Option<NaiveDate>,
    pub promotional_set: Option<bool>,
}

/// A type with each relation set rendered as target names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeView {
    pub id: i64,
    pub name: String,
    pub strong_vs: Vec<String>,
    pub weak_vs: Vec<String>,
    pub resistant_to: Vec<String>,
    pub vulnerable_to: Vec<String>,
}

/// A card with its expansion and types inlined. Missing references are
/// serialized as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardView {
    pub id: i64,
    pub name: String,
    pub rarity: Option<Rarity>,
    pub hp: Option<i64>,
    pub type1: Option<TypeView>,
    pub type2: Option<TypeView>,
    pub expansion: Option<ExpansionView>,
    pub card_number: Option<i64>,
    pub first_edition: Option<bool>,
    pub price: Option<String>,
    pub image: Option<String>,
    pub created: NaiveDate,
}

pub fn expansion_view(expansion: &Expansion) -> ExpansionView {
    let data = &expansion.data;
    ExpansionView {
        id: expansion.id,
        name: data.name.clone(),
        series: data.series.clone(),
        cards: data.cards,
        release_date: data.release_date,
        promotional_set: data.promotional_set,
    }
}

pub fn type_view(ty: &PokemonType, mut names: RelationNames) -> TypeView {
    TypeView {
        id: ty.id,
        name: ty.name.clone(),
        strong_vs: names.take(RelationKind::StrongVs),
        weak_vs: names.take(RelationKind::WeakVs),
        resistant_to: names.take(RelationKind::ResistantTo),
        vulnerable_to: names.take(RelationKind::VulnerableTo),
    }
}

/// Resolved references of one card.
#[derive(Debug, Clone, Default)]
pub struct CardRefs {
    pub expansion: Option<ExpansionView>,
    pub type1: Option<TypeView>,
    pub type2: Option<TypeView>,
}

pub fn card_view(card: &Card, refs: CardRefs, media_url: &str) -> CardView {
    let data = &card.data;
    CardView {
        id: card.id,
        name: data.name.clone(),
        rarity: data.rarity,
        hp: data.hp,
        type1: refs.type1,
        type2: refs.type2,
        expansion: refs.expansion,
        card_number: data.card_number,
        first_edition: data.first_edition,
        price: data.price.map(|p| format!("{p:.2}")),
        image: data.image.as_deref().map(|key| media_link(media_url, key)),
        created: card.created,
    }
}

/// Public location of a stored blob.
pub fn media_link(media_url: &str, key: &str) -> String {
    if media_url.ends_with('/') {
        format!("{media_url}{key}")
    } else {
        format!("{media_url}/{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CardData, ExpansionData};
    use rust_decimal::Decimal;
    use serde_json::json;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn card_keys_in_order_with_nulls() {
        let card = Card {
            id: 3,
            created: day(),
            data: CardData {
                name: "Pikachu".into(),
                ..Default::default()
            },
        };
        let value = serde_json::to_value(card_view(&card, CardRefs::default(), "/media/")).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 3, "name": "Pikachu", "rarity": null, "hp": null,
                "type1": null, "type2": null, "expansion": null,
                "card_number": null, "first_edition": null, "price": null,
                "image": null, "created": "2024-05-01",
            })
        );

        let text = serde_json::to_string(&card_view(&card, CardRefs::default(), "/media/")).unwrap();
        let keys: Vec<usize> = ["\"id\"", "\"rarity\"", "\"type1\"", "\"expansion\"", "\"created\""]
            .iter()
            .map(|k| text.find(k).unwrap())
            .collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn card_inlines_references() {
        let expansion = Expansion {
            id: 1,
            data: ExpansionData {
                name: "Base Set".into(),
                series: "Original".into(),
                cards: Some(102),
                release_date: NaiveDate::from_ymd_opt(1999, 1, 9),
                promotional_set: Some(false),
            },
        };
        let mut names = RelationNames::default();
        names.set(RelationKind::WeakVs, vec!["Ground".into()]);
        let electric = type_view(
            &PokemonType {
                id: 4,
                name: "Electric".into(),
            },
            names,
        );
        let card = Card {
            id: 9,
            created: day(),
            data: CardData {
                name: "Pikachu".into(),
                rarity: Some(Rarity::Common),
                price: Some(Decimal::new(15, 0)),
                image: Some("img/pikachu.jpg".into()),
                ..Default::default()
            },
        };
        let refs = CardRefs {
            expansion: Some(expansion_view(&expansion)),
            type1: Some(electric),
            type2: None,
        };
        let value = serde_json::to_value(card_view(&card, refs, "http://cdn/media")).unwrap();

        assert_eq!(value["rarity"], "common");
        assert_eq!(value["price"], "15.00");
        assert_eq!(value["image"], "http://cdn/media/img/pikachu.jpg");
        assert_eq!(value["expansion"]["release_date"], "1999-01-09");
        assert_eq!(value["type1"]["weak_vs"], json!(["Ground"]));
        assert_eq!(value["type1"]["strong_vs"], json!([]));
        assert!(value["type2"].is_null());
    }
}
