use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::agent::policy::ErrorPolicy;
use crate::browser::behavior::BehaviorSimulator;
use crate::browser::extract::{ContentExtractor, ExtractedContent, PageSnapshot};
use crate::browser::host::{HostError, TabHost, TabId, TabStatus};
use crate::browser::script;
use crate::browser::tab_pool::{TabPool, TabSlot};
use crate::cli::config::AgentSettings;
use crate::error::AgentError;

/// Load and extraction failures end the visit
const STAGE_POLICY: ErrorPolicy = ErrorPolicy::Fatal;

/// Drives one tab through open, load, scroll, extract and close
pub struct PageDriver {
    pool: Arc<TabPool>,
    behavior: BehaviorSimulator,
    extractor: ContentExtractor,
    load_timeout: Duration,
    poll_interval: Duration,
}

impl PageDriver {
    pub fn new(pool: Arc<TabPool>, settings: &AgentSettings) -> Result<Self> {
        Ok(Self {
            pool,
            behavior: BehaviorSimulator::new(settings),
            extractor: ContentExtractor::new()?,
            load_timeout: Duration::from_millis(settings.page_load_timeout_ms),
            poll_interval: Duration::from_millis(settings.load_poll_interval_ms),
        })
    }

    pub fn pool(&self) -> &Arc<TabPool> {
        &self.pool
    }

    /// Visit `url` on behalf of `task_id`. The tab is closed whatever the outcome.
    pub async fn visit(&self, slot: TabSlot, url: &str, task_id: &str) -> Result<ExtractedContent, AgentError> {
        let tab = self.pool.open_tab(slot, url, task_id).await?;

        let outcome = self.drive(tab).await;
        self.pool.close_tab(tab).await;

        outcome
    }

    async fn drive(&self, tab: TabId) -> Result<ExtractedContent, AgentError> {
        let host = self.pool.host().as_ref();

        STAGE_POLICY.run("page load", || self.wait_for_load(host, tab)).await?;
        self.behavior.scroll(host, tab).await;
        let content = STAGE_POLICY.run("extraction", || self.extract(host, tab)).await?;

        content.ok_or_else(|| AgentError::Extraction {
            message: "no content".to_string(),
        })
    }

    /// Poll the tab until it reports complete
    pub async fn wait_for_load(&self, host: &dyn TabHost, tab: TabId) -> Result<(), AgentError> {
        let start = Instant::now();

        loop {
            match host.status(tab).await {
                Ok(TabStatus::Complete) => {
                    debug!("Tab {} loaded in {} ms", tab, start.elapsed().as_millis());
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => {
                    return Err(AgentError::TabClosed {
                        tab,
                        reason: e.to_string(),
                    })
                }
            }

            if start.elapsed() > self.load_timeout {
                info!("Tab {} did not finish loading within {:?}", tab, self.load_timeout);
                return Err(AgentError::PageLoadTimeout {
                    timeout: self.load_timeout,
                });
            }

            sleep(self.poll_interval).await;
        }
    }

    /// Snapshot the page and extract its content
    pub async fn extract(&self, host: &dyn TabHost, tab: TabId) -> Result<ExtractedContent, AgentError> {
        let value = host.run(tab, &script::snapshot()).await.map_err(|e| match e {
            HostError::TabGone(_) => AgentError::Extraction {
                message: format!("tab {} is gone", tab),
            },
            HostError::Failed(message) => AgentError::Extraction { message },
        })?;

        let snapshot = PageSnapshot::from_value(value).map_err(|e| AgentError::Extraction {
            message: e.to_string(),
        })?;

        Ok(self.extractor.extract(&snapshot))
    }
}
