use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cli::config::ReportingSettings;
use crate::error::AgentError;
use crate::report::{AgentReport, ResultReporter};
use crate::storage::settings::{SettingsStore, KEY_SERVER_URL};

/// Posts agent results to the ingestion backend
pub struct HttpReporter {
    client: Client,
    settings: Arc<dyn SettingsStore>,
    fallback_url: String,
}

/// The agent-result endpoint lives next to the activity endpoint
pub fn agent_result_endpoint(server_url: &str) -> String {
    server_url.replace("/activity", "/agent-result")
}

impl HttpReporter {
    pub fn new(config: &ReportingSettings, settings: Arc<dyn SettingsStore>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            settings,
            fallback_url: config.server_url.clone(),
        })
    }

    /// Server URL as currently configured in the settings store
    async fn server_url(&self) -> String {
        match self.settings.get(&[KEY_SERVER_URL]).await {
            Ok(values) => values
                .get(KEY_SERVER_URL)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| self.fallback_url.clone()),
            Err(e) => {
                warn!("Failed to read server URL from settings: {}", e);
                self.fallback_url.clone()
            }
        }
    }
}

#[async_trait]
impl ResultReporter for HttpReporter {
    async fn report(&self, report: &AgentReport) -> Result<(), AgentError> {
        let endpoint = agent_result_endpoint(&self.server_url().await);
        debug!("Reporting task {} to {}", report.task_id, endpoint);

        let response = self
            .client
            .post(&endpoint)
            .json(report)
            .send()
            .await
            .map_err(|e| AgentError::Reporting { message: e.to_string() })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Reporting {
                message: format!("{} returned {}: {}", endpoint, status, body),
            });
        }

        Ok(())
    }
}
