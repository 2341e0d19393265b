use std::time::Duration;

use reqwest::RequestBuilder;
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use async_trait::async_trait;
use lineage_core::{
    Direction, LineageConfig, LineageDataSource, LineageError, LineageResponse, Result,
};

/// Client for an OpenMetadata-style lineage REST API.
///
/// Only fetches; the engine merges. Collapse is a purely local operation
/// and never reaches this client at all.
pub struct MetadataClient {
    http: reqwest::Client,
    config: LineageConfig,
}

impl MetadataClient {
    pub fn new(config: LineageConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LineageError::Fetch(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn lineage_url(
        base_url: &str,
        entity_type: &str,
        fqn: &str,
        upstream_depth: u32,
        downstream_depth: u32,
    ) -> String {
        format!(
            "{}/api/v1/lineage/{}/name/{}?upstreamDepth={}&downstreamDepth={}",
            base_url.trim_end_matches('/'),
            entity_type,
            fqn,
            upstream_depth,
            downstream_depth
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.auth_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn fetch(&self, url: String, fqn: &str) -> Result<LineageResponse> {
        let response = self
            .authorized(self.http.get(&url))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LineageError::Timeout(fqn.to_string())
                } else {
                    LineageError::Fetch(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LineageError::Fetch(format!(
                "HTTP {} fetching lineage for {}",
                status, fqn
            )));
        }

        response
            .json::<LineageResponse>()
            .await
            .map_err(|e| LineageError::Fetch(e.to_string()))
    }

    /// Probe the service. Any transport or HTTP failure reads as "not
    /// connected" rather than an error.
    pub async fn test_connection(&self) -> bool {
        let url = format!(
            "{}/api/v1/system/version",
            self.config.base_url.trim_end_matches('/')
        );
        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, "metadata service connection test failed");
                false
            }
        }
    }
}

#[async_trait]
impl LineageDataSource for MetadataClient {
    async fn get_lineage(&self, fqn: &str, entity_type: &str) -> Result<LineageResponse> {
        let depth = self.config.initial_depth;
        let url = Self::lineage_url(&self.config.base_url, entity_type, fqn, depth, depth);
        debug!(%fqn, %entity_type, depth, "fetching initial lineage");
        self.fetch(url, fqn).await
    }

    async fn expand_lineage(
        &self,
        center_fqn: &str,
        node_id: &str,
        direction: Direction,
        entity_type: &str,
    ) -> Result<LineageResponse> {
        let depth = self.config.expand_depth;
        let (upstream_depth, downstream_depth) = match direction {
            Direction::Upstream => (depth, 0),
            Direction::Downstream => (0, depth),
        };
        let url = Self::lineage_url(
            &self.config.base_url,
            entity_type,
            node_id,
            upstream_depth,
            downstream_depth,
        );
        debug!(center = %center_fqn, node = %node_id, %direction, "expanding lineage");
        self.fetch(url, node_id).await
    }
}
