use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::agent::policy::ErrorPolicy;
use crate::browser::host::{TabHost, TabId};
use crate::browser::script;
use crate::cli::config::AgentSettings;

/// A scroll that fails (tab navigated away, frame detached) never aborts the visit
const SCROLL_POLICY: ErrorPolicy = ErrorPolicy::LogAndContinue;

/// What a scroll pass managed to do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollSummary {
    /// Downward steps that succeeded
    pub steps: u32,

    /// Whether the page was returned to the top
    pub back_at_top: bool,
}

/// Human-like reading behavior inside an automation tab
pub struct BehaviorSimulator {
    /// Number of downward scroll steps
    max_scrolls: u32,

    /// Pause before each step
    scroll_interval: Duration,

    /// Share of the viewport height covered per step
    scroll_fraction: f64,
}

impl BehaviorSimulator {
    pub fn new(settings: &AgentSettings) -> Self {
        Self {
            max_scrolls: settings.max_scrolls,
            scroll_interval: Duration::from_millis(settings.scroll_interval_ms),
            scroll_fraction: settings.scroll_fraction,
        }
    }

    /// Scroll down the page step by step, then jump back to the top
    pub async fn scroll(&self, host: &dyn TabHost, tab: TabId) -> ScrollSummary {
        let step = script::scroll_by_viewport(self.scroll_fraction);
        let mut summary = ScrollSummary::default();

        for _ in 0..self.max_scrolls {
            sleep(self.scroll_interval).await;

            if let Ok(Some(_)) = SCROLL_POLICY.run("scroll", || host.run(tab, &step)).await {
                summary.steps += 1;
            }
        }

        let top = script::scroll_to_top();
        match SCROLL_POLICY.run("scroll to top", || host.run(tab, &top)).await {
            Ok(Some(_)) => summary.back_at_top = true,
            _ => debug!("Tab {} left scrolled down", tab),
        }

        debug!("Scrolled tab {} in {}/{} steps", tab, summary.steps, self.max_scrolls);
        summary
    }
}
