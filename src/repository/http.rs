//! HTTP client for a remote novel query service.
//!
//! Wire format: `POST {base_url}/v1/novels:query` with a JSON body of
//! `{filter, sort, limit}`, answered by `{"novels": [...]}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::NovelRepository;
use crate::types::{NovelFilter, NovelSort, NovelSummary};
use crate::{DiscoveryError, Result};

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the novel query service.
#[derive(Clone)]
pub struct HttpNovelRepository {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpNovelRepository {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DiscoveryError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        })
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check response status and map to appropriate error.
    fn handle_response_errors(&self, response: &reqwest::Response) -> Result<()> {
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        match status.as_u16() {
            401 | 403 => Err(DiscoveryError::RepositoryApi {
                status: status.as_u16(),
                message: "not authorised to query novels".to_string(),
            }),
            404 => Err(DiscoveryError::RepositoryApi {
                status: 404,
                message: format!("query endpoint not found under {}", self.base_url),
            }),
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(DiscoveryError::RateLimited { retry_after })
            }
            code => Err(DiscoveryError::RepositoryApi {
                status: code,
                message: format!("novel query failed: {status}"),
            }),
        }
    }
}

#[async_trait]
impl NovelRepository for HttpNovelRepository {
    fn name(&self) -> &str {
        "http"
    }

    async fn query(
        &self,
        filter: &NovelFilter,
        sort: NovelSort,
        limit: usize,
    ) -> Result<Vec<NovelSummary>> {
        let url = format!("{}/v1/novels:query", self.base_url);
        debug!(url = %url, sort = sort.as_str(), limit, "querying novels");

        let mut request = self.http.post(&url).json(&QueryRequest {
            filter,
            sort,
            limit,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DiscoveryError::Repository(e.to_string()))?;

        self.handle_response_errors(&response)?;

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| DiscoveryError::Repository(format!("malformed query response: {e}")))?;

        Ok(body.novels)
    }
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    filter: &'a NovelFilter,
    sort: NovelSort,
    limit: usize,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    novels: Vec<NovelSummary>,
}
