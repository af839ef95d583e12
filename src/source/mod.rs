//! Record sources: the backing dataset the list queries page by page
//!
//! [`RecordSource`] is the seam between the fetch controller and wherever
//! records live. [`LocalSource`] searches an in-process [`RecordCache`],
//! [`HttpSource`] calls the search endpoint over HTTP.

mod cache;
mod http;
mod store;

pub use cache::{LocalSource, RecordCache, LOAD_FAILED};
pub use http::HttpSource;
pub use store::RecordStore;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::record::{PageRequest, PageResponse};

/// Anything that can answer a page request.
///
/// Implementations must be stable: identical requests against unchanged
/// data return identical pages. Dropping the returned future is how a
/// fetch is cancelled, so implementations must not detach work that
/// outlives it.
#[async_trait]
pub trait RecordSource: Send + Sync + 'static {
    async fn fetch(&self, request: &PageRequest) -> Result<PageResponse, FetchError>;
}
