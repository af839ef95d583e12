//! Accumulated client-side view of a paged query
//!
//! Items are replaced when a first page arrives and extended when a later
//! page arrives. Only the fetch controller mutates a `ListState`; everyone
//! else reads it.

use tracing::warn;

use crate::record::{PageRequest, PageResponse, Record};

/// Records loaded so far for the current query, plus fetch status.
///
/// `len() <= total()` always holds.
#[derive(Debug, Clone, Default)]
pub struct ListState {
    items: Vec<Record>,
    total: usize,
    query: String,
    page: u32,
    has_more: bool,
    loading: bool,
    error: Option<String>,
    epoch: u64,
    /// Request whose page is the tail of `items`.
    cursor: Option<PageRequest>,
}

impl ListState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State seeded with an already-fetched first page.
    ///
    /// `request` is what produced `initial`; its limit decides where the
    /// next page starts.
    pub fn with_initial(request: PageRequest, initial: PageResponse) -> Self {
        let mut state = Self {
            query: request.query().to_string(),
            ..Self::default()
        };
        state.apply(&request, initial);
        state
    }

    pub fn items(&self) -> &[Record] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total matches reported by the source for this query.
    pub fn total(&self) -> usize {
        self.total
    }

    /// The query as last typed, which may not have been fetched yet.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Page of the most recently issued fetch.
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Most recent user-visible error, if the last fetch failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Incremented every time the items are replaced by a new first page.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Request that loaded the last page, if any page is loaded.
    pub fn cursor(&self) -> Option<&PageRequest> {
        self.cursor.as_ref()
    }

    pub(crate) fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub(crate) fn begin_fetch(&mut self, page: u32) {
        self.page = page;
        self.loading = true;
        self.error = None;
    }

    /// Apply a successful response: replace on page 1, append otherwise.
    pub(crate) fn apply(&mut self, request: &PageRequest, response: PageResponse) {
        if request.is_reset() {
            self.items = response.items;
            self.epoch += 1;
        } else {
            self.items.extend(response.items);
        }

        if response.total < self.items.len() {
            warn!(
                total = response.total,
                loaded = self.items.len(),
                "source total below loaded count"
            );
        }
        self.total = response.total.max(self.items.len());
        self.has_more = response.has_more;
        self.page = request.page();
        self.cursor = Some(request.clone());
        self.loading = false;
        self.error = None;
    }

    /// The in-flight fetch ended without an outcome. Items and error stay.
    pub(crate) fn end_fetch(&mut self) {
        self.loading = false;
        if let Some(cursor) = &self.cursor {
            self.page = cursor.page();
        }
    }

    /// Record a failed fetch. Loaded items are kept.
    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.loading = false;
        self.error = Some(message.into());
    }
}
