//! OpenMHz API client.
//!
//! Endpoints used:
//! - `GET /systems`
//! - `GET /{shortName}/calls`

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::flaresolverr::FlareSolverrClient;
use super::CallSource;
use crate::domain::{Call, CallsResponse, System, SystemsResponse};

pub const DEFAULT_API_BASE: &str = "https://api.openmhz.com";

/// OpenMHz client that routes every request through FlareSolverr
pub struct OpenMhzClient {
    api_base: String,
    proxy: FlareSolverrClient,
}

impl OpenMhzClient {
    pub fn new(api_base: impl Into<String>, proxy: FlareSolverrClient) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            proxy,
        }
    }

    pub fn systems_url(&self) -> String {
        format!("{}/systems", self.api_base)
    }

    pub fn calls_url(&self, short_name: &str) -> String {
        format!("{}/{}/calls", self.api_base, short_name)
    }
}

#[async_trait]
impl CallSource for OpenMhzClient {
    fn name(&self) -> &str {
        "openmhz"
    }

    async fn list_systems(&self) -> Result<Vec<System>> {
        let response: SystemsResponse = self
            .proxy
            .fetch_json(&self.systems_url())
            .await
            .context("Failed to fetch systems")?;

        if !response.success {
            anyhow::bail!("API response indicates failure");
        }

        Ok(response.systems)
    }

    async fn list_calls(&self, short_name: &str) -> Result<Vec<Call>> {
        let url = self.calls_url(short_name);
        let response: CallsResponse = self
            .proxy
            .fetch_json(&url)
            .await
            .with_context(|| format!("Failed to fetch calls for '{}'", short_name))?;

        debug!(count = response.calls.len(), "Parsed calls");
        Ok(response.calls)
    }

    async fn health_check(&self) -> Result<()> {
        if !self.proxy.is_running().await {
            anyhow::bail!(
                "FlareSolverr is not running at {}. Please start it before running this application.",
                self.proxy.root_url()
            );
        }
        Ok(())
    }
}
