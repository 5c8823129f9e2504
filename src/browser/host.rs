//! Capabilities the agent needs from whatever actually drives the browser.
//!
//! The agent never talks to a browser API directly. Everything goes through
//! [`TabHost`], which exposes four operations: open a tab, poll its load
//! status, close it, and run a script inside the page.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Opaque handle to a host tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Navigation state reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabStatus {
    Loading,
    Complete,
    Error,
}

/// A script evaluated in the page's own context.
///
/// `source` is the body of a function; `arguments[n]` refers to `args[n]`
/// and its `return` value must be JSON-serializable.
#[derive(Debug, Clone, PartialEq)]
pub struct PageScript {
    pub name: &'static str,
    pub source: &'static str,
    pub args: Vec<Value>,
}

#[derive(Debug, Error)]
pub enum HostError {
    /// The tab no longer exists (closed by the user, crashed, ...)
    #[error("tab {0} no longer exists")]
    TabGone(TabId),

    /// Any other host-level failure
    #[error("{0}")]
    Failed(String),
}

/// Tab control and page-context execution provided by the host browser
#[async_trait]
pub trait TabHost: Send + Sync {
    /// Open a tab at `url`. With `background` the tab must not take focus.
    async fn open(&self, url: &str, background: bool) -> Result<TabId, HostError>;

    /// Current navigation status of a tab
    async fn status(&self, tab: TabId) -> Result<TabStatus, HostError>;

    /// Close a tab
    async fn close(&self, tab: TabId) -> Result<(), HostError>;

    /// Run a script in the tab's page context and return its result
    async fn run(&self, tab: TabId, script: &PageScript) -> Result<Value, HostError>;
}
