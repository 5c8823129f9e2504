use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Display;
use thirtyfour::prelude::*;
use thirtyfour::{CapabilitiesHelper, PageLoadStrategy, WindowHandle};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::browser::host::{HostError, PageScript, TabHost, TabId, TabStatus};
use crate::browser::script;
use crate::cli::config::WebDriverSettings;

/// Tab ids handed out for browser windows
#[derive(Debug)]
struct WindowRegistry<H> {
    windows: HashMap<TabId, H>,
    next_id: u64,
}

impl<H: Clone> WindowRegistry<H> {
    fn new() -> Self {
        Self {
            windows: HashMap::new(),
            next_id: 0,
        }
    }

    fn register(&mut self, handle: H) -> TabId {
        self.next_id += 1;
        let tab = TabId(self.next_id);
        self.windows.insert(tab, handle);
        tab
    }

    fn get(&self, tab: TabId) -> Result<H, HostError> {
        self.windows.get(&tab).cloned().ok_or(HostError::TabGone(tab))
    }

    /// Forget the tab; it is gone from the registry whatever happens next
    fn take(&mut self, tab: TabId) -> Result<H, HostError> {
        self.windows.remove(&tab).ok_or(HostError::TabGone(tab))
    }

    fn clear(&mut self) {
        self.windows.clear();
    }
}

/// Map the readiness check's result to a load status. A tab still on
/// `about:blank` has not committed its navigation yet.
fn load_status(state: &Value) -> TabStatus {
    let href = state.get("href").and_then(Value::as_str).unwrap_or_default();
    let ready = state.get("readyState").and_then(Value::as_str);

    match ready {
        Some("complete") if href != "about:blank" && !href.is_empty() => TabStatus::Complete,
        _ => TabStatus::Loading,
    }
}

struct Session {
    driver: Option<WebDriver>,
    windows: WindowRegistry<WindowHandle>,
}

/// [`TabHost`] backed by a WebDriver session.
///
/// A WebDriver session has a single focused window, so every operation
/// switches to the tab's window while holding the session lock.
pub struct WebDriverHost {
    session: Mutex<Session>,
}

fn host_err(e: impl Display) -> HostError {
    HostError::Failed(e.to_string())
}

impl WebDriverHost {
    /// Connect to the WebDriver server named in the settings
    pub async fn connect(settings: &WebDriverSettings) -> Result<Self> {
        let mut caps = DesiredCapabilities::chrome();

        // Commands must not block on navigation; load progress is polled
        caps.add("pageLoadStrategy", PageLoadStrategy::None)?;

        if settings.headless {
            caps.set_headless()?;
        }
        caps.add_chrome_arg("--disable-blink-features=AutomationControlled")?;
        caps.add_chrome_arg("--disable-dev-shm-usage")?;

        let driver = WebDriver::new(&settings.url, caps)
            .await
            .context(format!("Failed to connect to WebDriver at {}", settings.url))?;

        info!("Connected to WebDriver at {}", settings.url);

        Ok(Self {
            session: Mutex::new(Session {
                driver: Some(driver),
                windows: WindowRegistry::new(),
            }),
        })
    }

    /// End the WebDriver session
    pub async fn shutdown(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        session.windows.clear();
        if let Some(driver) = session.driver.take() {
            driver.quit().await.context("Failed to quit WebDriver session")?;
            debug!("WebDriver session closed");
        }
        Ok(())
    }
}

impl Session {
    fn driver(&self) -> Result<&WebDriver, HostError> {
        self.driver
            .as_ref()
            .ok_or_else(|| HostError::Failed("WebDriver session is closed".to_string()))
    }

    /// Focus the tab's window
    async fn focus(&self, tab: TabId) -> Result<&WebDriver, HostError> {
        let driver = self.driver()?;
        let handle = self.windows.get(tab)?;
        driver
            .switch_to_window(handle)
            .await
            .map_err(|_| HostError::TabGone(tab))?;
        Ok(driver)
    }
}

#[async_trait]
impl TabHost for WebDriverHost {
    async fn open(&self, url: &str, background: bool) -> Result<TabId, HostError> {
        let mut session = self.session.lock().await;
        let driver = session.driver()?;

        let previous = driver.window().await.ok();
        let handle = driver.new_tab().await.map_err(host_err)?;
        driver.switch_to_window(handle.clone()).await.map_err(host_err)?;

        let navigate = script::navigate(url);
        driver
            .execute(navigate.source, navigate.args)
            .await
            .map_err(host_err)?;

        if background {
            if let Some(previous) = previous {
                if let Err(e) = driver.switch_to_window(previous).await {
                    warn!("Could not refocus previous window: {}", e);
                }
            }
        }

        Ok(session.windows.register(handle))
    }

    async fn status(&self, tab: TabId) -> Result<TabStatus, HostError> {
        let session = self.session.lock().await;
        let driver = session.focus(tab).await?;

        let check = script::ready_state();
        let ret = driver.execute(check.source, check.args).await.map_err(host_err)?;
        Ok(load_status(ret.json()))
    }

    async fn close(&self, tab: TabId) -> Result<(), HostError> {
        let mut session = self.session.lock().await;
        let handle = session.windows.take(tab)?;

        let driver = session.driver()?;
        driver
            .switch_to_window(handle)
            .await
            .map_err(|_| HostError::TabGone(tab))?;
        driver.close_window().await.map_err(host_err)?;

        // Leave the session focused on a window that still exists
        let remaining = driver.windows().await.map_err(host_err)?;
        if let Some(handle) = remaining.into_iter().next() {
            driver.switch_to_window(handle).await.map_err(host_err)?;
        }
        Ok(())
    }

    async fn run(&self, tab: TabId, script: &PageScript) -> Result<Value, HostError> {
        let session = self.session.lock().await;
        let driver = session.focus(tab).await?;

        let ret = driver
            .execute(script.source, script.args.clone())
            .await
            .map_err(host_err)?;
        Ok(ret.json().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_tab_is_still_loading() {
        let blank = json!({ "href": "about:blank", "readyState": "complete" });
        assert_eq!(load_status(&blank), TabStatus::Loading);
    }

    #[test]
    fn test_load_status_follows_ready_state() {
        let page = |state: &str| json!({ "href": "https://example.com/", "readyState": state });

        assert_eq!(load_status(&page("loading")), TabStatus::Loading);
        assert_eq!(load_status(&page("interactive")), TabStatus::Loading);
        assert_eq!(load_status(&page("complete")), TabStatus::Complete);
        assert_eq!(load_status(&Value::Null), TabStatus::Loading);
    }

    #[test]
    fn test_closed_window_is_forgotten() {
        let mut windows = WindowRegistry::new();
        let tab = windows.register("window-1".to_string());
        let other = windows.register("window-2".to_string());
        assert_ne!(tab, other);

        // Even if focusing the window fails afterwards, the entry is gone
        assert_eq!(windows.take(tab).unwrap(), "window-1");
        assert!(matches!(windows.take(tab), Err(HostError::TabGone(t)) if t == tab));
        assert!(matches!(windows.get(tab), Err(HostError::TabGone(_))));
        assert_eq!(windows.get(other).unwrap(), "window-2");
    }
}
