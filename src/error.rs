//! Errors raised while driving a task through the page pipeline.

use std::time::Duration;

use thiserror::Error;

use crate::browser::host::TabId;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The host refused to open a tab.
    #[error("failed to open tab: {message}")]
    TabOpen { message: String },

    /// The page did not report completion in time.
    #[error("page load timed out after {timeout:?}")]
    PageLoadTimeout { timeout: Duration },

    /// The tab disappeared while we were waiting on it.
    #[error("tab {tab} closed unexpectedly: {reason}")]
    TabClosed { tab: TabId, reason: String },

    /// The page produced no usable snapshot.
    #[error("extraction failed: {message}")]
    Extraction { message: String },

    /// The result could not be delivered. Never affects task status.
    #[error("failed to report result: {message}")]
    Reporting { message: String },
}

impl AgentError {
    /// Stable label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::TabOpen { .. } => "tab_open",
            AgentError::PageLoadTimeout { .. } => "page_load_timeout",
            AgentError::TabClosed { .. } => "tab_closed",
            AgentError::Extraction { .. } => "extraction",
            AgentError::Reporting { .. } => "reporting",
        }
    }
}
