//! Record and paging wire types

use serde::{Deserialize, Deserializer, Serialize};

/// Default page size when a request does not name one.
pub const DEFAULT_LIMIT: u32 = 100;

/// A single business record.
///
/// Records are created once by the bulk import and never mutated.
/// Numeric fields that failed to parse are kept as not-a-number
/// (`NaN` rating, `None` counts) and serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default = "nan", deserialize_with = "nan_if_null")]
    pub rating: f64,
    #[serde(default)]
    pub total_review: Option<u64>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub building: Option<u64>,
}

fn nan() -> f64 {
    f64::NAN
}

fn nan_if_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

impl Record {
    /// True when every numeric field parsed.
    pub fn is_complete(&self) -> bool {
        self.rating.is_finite() && self.total_review.is_some() && self.building.is_some()
    }

    /// Case-insensitive substring match on the organization name.
    ///
    /// `needle` must already be lowercased.
    pub fn matches(&self, needle: &str) -> bool {
        needle.is_empty() || self.organization.to_lowercase().contains(needle)
    }

    /// Street address line: building, street, city, state, country.
    pub fn address(&self) -> String {
        let building = self.building.map(|b| b.to_string());
        [
            building.as_deref(),
            Some(self.street.as_str()),
            Some(self.city.as_str()),
            Some(self.state.as_str()),
            Some(self.country.as_str()),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// A request for one page of matching records.
///
/// Always satisfies `page >= 1` and `limit > 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    query: String,
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Build a request, normalizing `page == 0` to 1 and `limit == 0`
    /// to [`DEFAULT_LIMIT`].
    pub fn new(query: impl Into<String>, page: u32, limit: u32) -> Self {
        Self {
            query: query.into(),
            page: page.max(1),
            limit: if limit == 0 { DEFAULT_LIMIT } else { limit },
        }
    }

    /// First page of `query`.
    pub fn first(query: impl Into<String>, limit: u32) -> Self {
        Self::new(query, 1, limit)
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Index of the first record on this page.
    pub fn offset(&self) -> usize {
        (self.page as usize - 1).saturating_mul(self.limit as usize)
    }

    /// Index one past the last record on this page.
    pub fn end(&self) -> usize {
        (self.page as usize).saturating_mul(self.limit as usize)
    }

    /// The request for the following page of the same query.
    pub fn next_page(&self) -> Self {
        Self {
            query: self.query.clone(),
            page: self.page.saturating_add(1),
            limit: self.limit,
        }
    }

    /// Same request with `limit` capped at `max`.
    pub fn capped(mut self, max: u32) -> Self {
        self.limit = self.limit.min(max.max(1));
        self
    }

    /// True when a response replaces the list rather than extending it.
    pub fn is_reset(&self) -> bool {
        self.page == 1
    }
}

/// One page of matching records.
///
/// `has_more == (page * limit < total)` for the request that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse {
    pub items: Vec<Record>,
    pub total: usize,
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageResponse {
    /// One page of `items` out of `total` matches for `request`.
    pub fn new(items: Vec<Record>, total: usize, request: &PageRequest) -> Self {
        Self {
            items,
            total,
            has_more: request.end() < total,
            error: None,
        }
    }

    /// Empty result carrying an error message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            has_more: false,
            error: Some(message.into()),
        }
    }
}
