//! Query/filter layer: turns endpoint parameters into SQL WHERE clauses.
//!
//! Every listing is ordered by ascending identifier; paging is applied by the
//! store on top of the filter built here.

use serde::Deserialize;

use cardex_core::{FieldErrors, ServiceError};
use cardex_sql::Value;

use crate::model::Rarity;

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// A WHERE clause under construction. Clauses are AND-ed; placeholders are
/// anonymous `?` bound in push order.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, clause: impl Into<String>, params: impl IntoIterator<Item = Value>) {
        self.clauses.push(clause.into());
        self.params.extend(params);
    }

    /// `" WHERE a AND b"`, or an empty string when unfiltered.
    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Every term must match at least one of `columns` as a case-insensitive
    /// substring.
    fn push_search(&mut self, terms: &[String], columns: &[&str]) {
        for term in terms {
            let any: Vec<String> = columns
                .iter()
                .map(|c| format!("instr(casefold({c}), ?) > 0"))
                .collect();
            self.push(
                format!("({})", any.join(" OR ")),
                columns.iter().map(|_| Value::Text(term.clone())),
            );
        }
    }
}

/// Split a search string into lowercase terms on whitespace and commas.
pub fn search_terms(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .replace('\0', "")
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

// ---------------------------------------------------------------------------
// Date parts
// ---------------------------------------------------------------------------

/// Exact year / month / day constraints on a date column, each optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateParts {
    pub year: Option<i64>,
    pub month: Option<i64>,
    pub day: Option<i64>,
}

impl DateParts {
    /// Parse `{prefix}__year` style parameters. Empty values are ignored;
    /// anything else that is not an integer is reported under its parameter.
    pub fn parse(
        prefix: &str,
        year: Option<&str>,
        month: Option<&str>,
        day: Option<&str>,
    ) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();
        let mut part = |name: &str, raw: Option<&str>| -> Option<i64> {
            let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
            match raw.parse::<i64>() {
                Ok(n) => Some(n),
                Err(_) => {
                    errors.add(&format!("{prefix}__{name}"), "Enter a number.");
                    None
                }
            }
        };
        let parts = Self {
            year: part("year", year),
            month: part("month", month),
            day: part("day", day),
        };
        if errors.is_empty() { Ok(parts) } else { Err(errors) }
    }

    fn push(&self, filter: &mut Filter, column: &str) {
        for (fmt, value) in [("%Y", self.year), ("%m", self.month), ("%d", self.day)] {
            if let Some(v) = value {
                filter.push(
                    format!("CAST(strftime('{fmt}', {column}) AS INTEGER) = ?"),
                    [Value::Integer(v)],
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// Query-string parameters of `GET /cards`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardParams {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default, rename = "created__year")]
    pub created_year: Option<String>,
    #[serde(default, rename = "created__month")]
    pub created_month: Option<String>,
    #[serde(default, rename = "created__day")]
    pub created_day: Option<String>,
}

/// Which subset of cards a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardScope {
    All,
    Expansion(i64),
    /// Cards having the type in either slot.
    Type(i64),
    Rarity(Rarity),
}

#[derive(Debug, Clone)]
pub struct CardQuery {
    pub scope: CardScope,
    pub search: Vec<String>,
    pub created: DateParts,
}

impl CardQuery {
    pub fn scoped(scope: CardScope) -> Self {
        Self {
            scope,
            search: Vec::new(),
            created: DateParts::default(),
        }
    }

    pub fn from_params(params: &CardParams) -> Result<Self, ServiceError> {
        let created = DateParts::parse(
            "created",
            params.created_year.as_deref(),
            params.created_month.as_deref(),
            params.created_day.as_deref(),
        )
        .map_err(ServiceError::Validation)?;
        Ok(Self {
            scope: CardScope::All,
            search: search_terms(params.search.as_deref()),
            created,
        })
    }

    /// Rarity from a path segment. Unlike the other scoped listings an
    /// unknown value is an error rather than an empty result.
    pub fn by_rarity(raw: &str) -> Result<Self, ServiceError> {
        let rarity = Rarity::parse(raw.trim())
            .ok_or_else(|| ServiceError::invalid("rarity", "Invalid rarity value"))?;
        Ok(Self::scoped(CardScope::Rarity(rarity)))
    }

    pub fn filter(&self) -> Filter {
        let mut f = Filter::new();
        match self.scope {
            CardScope::All => {}
            CardScope::Expansion(id) => f.push("expansion_id = ?", [Value::Integer(id)]),
            CardScope::Type(id) => f.push(
                "(type1_id = ? OR type2_id = ?)",
                [Value::Integer(id), Value::Integer(id)],
            ),
            CardScope::Rarity(r) => f.push("rarity = ?", [Value::Text(r.as_str().into())]),
        }
        f.push_search(&self.search, &["name", "rarity"]);
        self.created.push(&mut f, "created");
        f
    }
}

// ---------------------------------------------------------------------------
// Expansions
// ---------------------------------------------------------------------------

/// Query-string parameters of `GET /expansions`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpansionParams {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default, rename = "release_date__year")]
    pub release_year: Option<String>,
    #[serde(default, rename = "release_date__month")]
    pub release_month: Option<String>,
    #[serde(default, rename = "release_date__day")]
    pub release_day: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ExpansionQuery {
    /// Exact series, ignoring case.
    pub series: Option<String>,
    pub search: Vec<String>,
    pub released: DateParts,
}

impl ExpansionQuery {
    pub fn by_series(series: &str) -> Self {
        Self {
            series: Some(series.to_string()),
            ..Default::default()
        }
    }

    pub fn from_params(params: &ExpansionParams) -> Result<Self, ServiceError> {
        let released = DateParts::parse(
            "release_date",
            params.release_year.as_deref(),
            params.release_month.as_deref(),
            params.release_day.as_deref(),
        )
        .map_err(ServiceError::Validation)?;
        Ok(Self {
            series: None,
            search: search_terms(params.search.as_deref()),
            released,
        })
    }

    pub fn filter(&self) -> Filter {
        let mut f = Filter::new();
        if let Some(series) = &self.series {
            f.push("casefold(series) = casefold(?)", [Value::Text(series.clone())]);
        }
        f.push_search(&self.search, &["name", "series"]);
        self.released.push(&mut f, "release_date");
        f
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Query-string parameters of `GET /types`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TypeParams {
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TypeQuery {
    /// Exact name, ignoring case.
    pub name: Option<String>,
    pub search: Vec<String>,
}

impl TypeQuery {
    pub fn by_name(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            search: Vec::new(),
        }
    }

    pub fn from_params(params: &TypeParams) -> Self {
        Self {
            name: None,
            search: search_terms(params.search.as_deref()),
        }
    }

    pub fn filter(&self) -> Filter {
        let mut f = Filter::new();
        if let Some(name) = &self.name {
            f.push("casefold(name) = casefold(?)", [Value::Text(name.clone())]);
        }
        f.push_search(&self.search, &["name"]);
        f
    }
}
