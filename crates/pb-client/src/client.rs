//! Async HTTP client for the agent-status, ideas and CoS/PM services.
//!
//! Each fetch is one unauthenticated GET. The body is parsed as JSON and
//! handed to the normalizer; a body of the wrong shape normalizes to an
//! empty result, but a body that is not JSON at all is an error.

use std::time::Duration;

use pb_api_types::IdeaQueryParams;
use pb_core::config::{Config, EndpointsConfig};
use pb_core::normalize::{normalize_agent_statuses, normalize_cos_pm, normalize_ideas};
use pb_core::types::{AgentStatusBatch, CosPmStatus, IdeaBatch};
use serde_json::Value;
use tracing::debug;

use crate::error::{FetchError, Result};

/// Reusable client + endpoint URLs.
#[derive(Debug, Clone)]
pub struct DashboardClient {
    http: reqwest::Client,
    endpoints: EndpointsConfig,
}

impl DashboardClient {
    pub fn new(endpoints: EndpointsConfig, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pulseboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::Transport)?;
        Ok(Self { http, endpoints })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.endpoints.clone(),
            Duration::from_secs(config.refresh.request_timeout_secs),
        )
    }

    pub fn endpoints(&self) -> &EndpointsConfig {
        &self.endpoints
    }

    async fn get_json(&self, url: &str, query: Option<&IdeaQueryParams>) -> Result<Value> {
        let mut req = self.http.get(url).header("Accept", "application/json");
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            req = req.query(q);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let bytes = resp.bytes().await?;
        debug!(url, bytes = bytes.len(), "fetched");
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
    }

    pub async fn fetch_ideas(&self, query: &IdeaQueryParams) -> Result<IdeaBatch> {
        let body = self.get_json(&self.endpoints.ideas_url, Some(query)).await?;
        Ok(normalize_ideas(&body))
    }

    pub async fn fetch_agent_statuses(&self) -> Result<AgentStatusBatch> {
        let body = self.get_json(&self.endpoints.agents_url, None).await?;
        Ok(normalize_agent_statuses(&body))
    }

    pub async fn fetch_cos_pm_status(&self) -> Result<CosPmStatus> {
        let body = self.get_json(&self.endpoints.cos_pm_url, None).await?;
        Ok(normalize_cos_pm(&body))
    }
}
