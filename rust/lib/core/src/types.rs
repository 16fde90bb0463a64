use serde::{Deserialize, Serialize};

use crate::ServiceError;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Upper bound for a caller-supplied `page_size`.
pub const MAX_PAGE_SIZE: usize = 100;

/// Pagination parameters accepted by every list endpoint.
///
/// Both values stay raw strings so that malformed input can fall back to
/// defaults (`page_size`) or be reported as an invalid page (`page`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    /// 1-based page number, or `last`.
    #[serde(default)]
    pub page: Option<String>,

    /// Requested page size, clamped to [`MAX_PAGE_SIZE`].
    #[serde(default)]
    pub page_size: Option<String>,
}

impl PageParams {
    /// Effective page size: positive integers are clamped to the maximum,
    /// anything else falls back to the default.
    pub fn page_size(&self) -> usize {
        self.page_size
            .as_deref()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .map(|n| n.min(MAX_PAGE_SIZE))
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Resolve the requested page against a total row count.
    ///
    /// An empty result set still has one (empty) page. Page numbers outside
    /// `1..=num_pages` are reported as `NotFound("Invalid page.")`.
    pub fn resolve(&self, count: usize) -> Result<PageWindow, ServiceError> {
        let size = self.page_size();
        let num_pages = count.div_ceil(size).max(1);

        let number = match self.page.as_deref().map(str::trim) {
            None | Some("") => 1,
            Some("last") => num_pages,
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| ServiceError::NotFound("Invalid page.".into()))?,
        };
        if number == 0 || number > num_pages {
            return Err(ServiceError::NotFound("Invalid page.".into()));
        }

        Ok(PageWindow {
            number,
            size,
            num_pages,
        })
    }
}

/// A resolved page: which slice of the result set to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: usize,
    pub size: usize,
    pub num_pages: usize,
}

impl PageWindow {
    pub fn offset(&self) -> usize {
        (self.number - 1) * self.size
    }

    pub fn limit(&self) -> usize {
        self.size
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }
}

/// The URL a list request was made against, used to build `next`/`previous`.
#[derive(Debug, Clone)]
pub struct PageUrl {
    /// `http://host/path` when a host is known, otherwise just the path.
    base: String,
    /// Decoded query pairs, minus `page`, sorted by key.
    pairs: Vec<(String, String)>,
}

impl PageUrl {
    /// Build from the request host (if any), path and raw query string.
    pub fn new(host: Option<&str>, path: &str, query: Option<&str>) -> Self {
        let base = match host {
            Some(h) if !h.is_empty() => format!("http://{h}{path}"),
            _ => path.to_string(),
        };
        // An undecodable query string yields links without extra parameters.
        let mut pairs: Vec<(String, String)> =
            serde_urlencoded::from_str(query.unwrap_or_default()).unwrap_or_default();
        pairs.retain(|(k, _)| k != "page");
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        Self { base, pairs }
    }

    /// Link to `page`; page 1 is rendered without a `page` parameter.
    pub fn link(&self, page: usize) -> String {
        let mut pairs = self.pairs.clone();
        if page > 1 {
            pairs.push(("page".to_string(), page.to_string()));
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
        }
        match serde_urlencoded::to_string(&pairs) {
            Ok(query) if !query.is_empty() => format!("{}?{}", self.base, query),
            _ => self.base.clone(),
        }
    }
}

/// Paginated response envelope shared by every list endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T: Serialize> {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T: Serialize> Page<T> {
    /// Assemble the envelope for one resolved window.
    pub fn new(count: usize, window: &PageWindow, url: &PageUrl, results: Vec<T>) -> Self {
        Self {
            count,
            next: window.has_next().then(|| url.link(window.number + 1)),
            previous: window.has_previous().then(|| url.link(window.number - 1)),
            results,
        }
    }
}

/// Today's date in UTC, the reference for creation dates and release checks.
pub fn today() -> chrono::NaiveDate {
    chrono::Utc::now().date_naive()
}
