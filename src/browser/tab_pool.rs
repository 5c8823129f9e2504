use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::agent::policy::ErrorPolicy;
use crate::browser::host::{TabHost, TabId};
use crate::error::AgentError;

/// Closing is best-effort: the registration is already gone by the time
/// the host is asked.
const CLOSE_POLICY: ErrorPolicy = ErrorPolicy::LogAndContinue;

#[derive(Debug, Default)]
struct PoolState {
    /// Open tab -> owning task id
    tabs: HashMap<TabId, String>,

    /// Slots promised to callers that have not opened their tab yet
    reserved: usize,
}

/// Caps the number of automation tabs open at once
pub struct TabPool {
    host: Arc<dyn TabHost>,
    max_concurrent: usize,
    state: Arc<Mutex<PoolState>>,
}

/// A claim on one unit of pool capacity.
///
/// Dropping it without opening a tab gives the capacity back.
#[derive(Debug)]
pub struct TabSlot {
    state: Arc<Mutex<PoolState>>,
    released: bool,
}

impl TabSlot {
    /// Hand the reserved capacity over to a registration
    fn into_registration(mut self, tab: TabId, task_id: &str) {
        let mut state = lock(&self.state);
        state.reserved = state.reserved.saturating_sub(1);
        state.tabs.insert(tab, task_id.to_string());
        self.released = true;
    }
}

impl Drop for TabSlot {
    fn drop(&mut self) {
        if !self.released {
            let mut state = lock(&self.state);
            state.reserved = state.reserved.saturating_sub(1);
        }
    }
}

/// State updates never panic mid-way, so a poisoned lock still holds
/// consistent data.
fn lock(state: &Mutex<PoolState>) -> MutexGuard<'_, PoolState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TabPool {
    pub fn new(host: Arc<dyn TabHost>, max_concurrent: usize) -> Self {
        Self {
            host,
            max_concurrent,
            state: Arc::new(Mutex::new(PoolState::default())),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Whether another tab could be opened right now
    pub fn can_open_new(&self) -> bool {
        let state = lock(&self.state);
        state.tabs.len() + state.reserved < self.max_concurrent
    }

    /// Reserve capacity for one tab, if any is left
    pub fn try_reserve(&self) -> Option<TabSlot> {
        let mut state = lock(&self.state);
        if state.tabs.len() + state.reserved >= self.max_concurrent {
            return None;
        }
        state.reserved += 1;
        Some(TabSlot {
            state: self.state.clone(),
            released: false,
        })
    }

    /// Open a background tab for `task_id` using a reserved slot
    pub async fn open_tab(&self, slot: TabSlot, url: &str, task_id: &str) -> Result<TabId, AgentError> {
        let tab = self
            .host
            .open(url, true)
            .await
            .map_err(|e| AgentError::TabOpen { message: e.to_string() })?;

        slot.into_registration(tab, task_id);
        info!("Opened tab {} for task {}", tab, task_id);
        Ok(tab)
    }

    /// Release a tab's capacity and ask the host to close it
    pub async fn close_tab(&self, tab: TabId) {
        let owner = lock(&self.state).tabs.remove(&tab);
        if owner.is_none() {
            debug!("Tab {} was not registered", tab);
        }

        let closed = CLOSE_POLICY
            .run("close tab", || self.host.close(tab))
            .await;
        if let Ok(Some(())) = closed {
            debug!("Closed tab {}", tab);
        }
    }

    /// Number of registered open tabs
    pub fn active_count(&self) -> usize {
        lock(&self.state).tabs.len()
    }

    /// Task that owns a tab
    pub fn owner(&self, tab: TabId) -> Option<String> {
        lock(&self.state).tabs.get(&tab).cloned()
    }

    pub(crate) fn host(&self) -> &Arc<dyn TabHost> {
        &self.host
    }
}

impl Drop for TabPool {
    fn drop(&mut self) {
        let state = lock(&self.state);
        if !state.tabs.is_empty() {
            warn!("Tab pool dropped with {} tab(s) still registered", state.tabs.len());
        }
    }
}
