//! Remote record source speaking the search endpoint's JSON protocol

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, instrument};

use super::RecordSource;
use crate::error::FetchError;
use crate::record::{PageRequest, PageResponse};

/// Queries `GET <endpoint>?query=..&page=..&limit=..`.
///
/// Cancellation is cooperative: dropping the fetch future drops the
/// in-flight reqwest request, which aborts the connection.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    endpoint: Url,
}

impl HttpSource {
    /// Source for the search endpoint at `endpoint`
    /// (e.g. `http://127.0.0.1:3000/api/search`).
    pub fn new(endpoint: &str) -> Result<Self, FetchError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| FetchError::Transport(format!("invalid endpoint {endpoint}: {e}")))?;
        Ok(Self {
            client: Client::new(),
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request_url(&self, request: &PageRequest) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("query", request.query())
            .append_pair("page", &request.page().to_string())
            .append_pair("limit", &request.limit().to_string());
        url
    }
}

#[async_trait]
impl RecordSource for HttpSource {
    #[instrument(skip_all, fields(query = %request.query(), page = request.page()))]
    async fn fetch(&self, request: &PageRequest) -> Result<PageResponse, FetchError> {
        let url = self.request_url(request);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let page: PageResponse = response.json().await?;
        if let Some(error) = page.error {
            return Err(FetchError::Upstream(error));
        }

        debug!(items = page.items.len(), total = page.total, "page received");
        Ok(page)
    }
}
