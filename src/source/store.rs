//! Immutable in-memory record collection

use crate::record::{PageRequest, PageResponse, Record};

/// All imported records, in import order.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<Record>,
}

impl RecordStore {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Filter by organization name and slice out the requested page.
    ///
    /// An empty query matches everything. Order is import order, so
    /// repeated calls page through the same sequence.
    pub fn search(&self, request: &PageRequest) -> PageResponse {
        let needle = request.query().to_lowercase();
        let page = request.offset()..request.end();

        let mut total = 0;
        let mut items = Vec::new();
        for record in self.records.iter().filter(|r| r.matches(&needle)) {
            if page.contains(&total) {
                items.push(record.clone());
            }
            total += 1;
        }
        PageResponse::new(items, total, request)
    }
}
