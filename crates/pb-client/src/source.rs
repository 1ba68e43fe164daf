use async_trait::async_trait;
use pb_api_types::IdeaQueryParams;
use pb_core::types::{AgentStatusBatch, CosPmStatus, IdeaBatch};

use crate::client::DashboardClient;
use crate::error::Result;

/// Where the refresh scheduler gets its data. Implemented by
/// [`DashboardClient`]; tests substitute in-memory sources.
#[async_trait]
pub trait DashboardSource: Send + Sync + 'static {
    async fn agent_statuses(&self) -> Result<AgentStatusBatch>;
    async fn ideas(&self, query: &IdeaQueryParams) -> Result<IdeaBatch>;
    async fn cos_pm_status(&self) -> Result<CosPmStatus>;
}

#[async_trait]
impl DashboardSource for DashboardClient {
    async fn agent_statuses(&self) -> Result<AgentStatusBatch> {
        self.fetch_agent_statuses().await
    }

    async fn ideas(&self, query: &IdeaQueryParams) -> Result<IdeaBatch> {
        self.fetch_ideas(query).await
    }

    async fn cos_pm_status(&self) -> Result<CosPmStatus> {
        self.fetch_cos_pm_status().await
    }
}
