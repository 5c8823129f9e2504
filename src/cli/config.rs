use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

/// Longest accepted task retention (ten years)
pub const MAX_TASK_RETENTION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AgentConfig {
    pub agent: AgentSettings,
    pub reporting: ReportingSettings,
    pub quality: QualitySettings,
    pub webdriver: WebDriverSettings,
}

/// Orchestrator, tab pool, rate limiter and page driver settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AgentSettings {
    pub max_concurrent_tabs: usize,
    pub min_delay_ms: u64, // Lower bound of the randomized spacing between tab opens
    pub max_delay_ms: u64,
    pub page_load_timeout_ms: u64,
    pub load_poll_interval_ms: u64,
    pub max_scrolls: u32,
    pub scroll_interval_ms: u64,
    pub scroll_fraction: f64, // Share of one viewport height per scroll step
    pub tick_interval_ms: u64,
    pub task_retention_secs: u64, // How long finished tasks are kept
}

/// Outbound result reporting settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ReportingSettings {
    /// Used when the settings store has no `serverUrl`
    pub server_url: String,
    pub summary_chars: usize,
    pub attempts: u32,
    pub retry_backoff_ms: u64,
    pub timeout_secs: u64,
}

/// Page quality heuristics
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct QualitySettings {
    pub search_patterns: Vec<String>, // Regexes, matched case-insensitively
    pub error_markers: Vec<String>,
    pub paywall_markers: Vec<String>,
}

/// WebDriver host settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct WebDriverSettings {
    pub url: String,
    pub headless: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_concurrent_tabs: 2,
            min_delay_ms: 3000,
            max_delay_ms: 8000,
            page_load_timeout_ms: 30_000,
            load_poll_interval_ms: 500,
            max_scrolls: 10,
            scroll_interval_ms: 500,
            scroll_fraction: 0.8,
            tick_interval_ms: 5000,
            task_retention_secs: 3600,
        }
    }
}

impl AgentSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Retention window, clamped to [`MAX_TASK_RETENTION_SECS`]
    pub fn task_retention(&self) -> chrono::Duration {
        let secs = self.task_retention_secs.min(MAX_TASK_RETENTION_SECS);
        chrono::Duration::seconds(secs as i64)
    }
}

impl Default for ReportingSettings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8091/api/ingest/activity".to_string(),
            summary_chars: 5000,
            attempts: 1,
            retry_backoff_ms: 1000,
            timeout_secs: 30,
        }
    }
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            search_patterns: vec![
                r"google\.\w+/search".to_string(),
                r"bing\.com/search".to_string(),
                r"baidu\.com/s".to_string(),
                r"duckduckgo\.com".to_string(),
            ],
            error_markers: ["404", "not found", "page not found", "找不到页面", "页面不存在"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            paywall_markers: ["subscribe", "paywall", "premium", "login required", "订阅", "付费"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for WebDriverSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:4444".to_string(),
            headless: false,
        }
    }
}

impl AgentConfig {
    /// Get the path to the config directory
    pub fn config_dir() -> PathBuf {
        let path = if let Some(proj_dirs) = directories::ProjectDirs::from("com", "tab-agent", "tab-agent") {
            proj_dirs.config_dir().to_path_buf()
        } else {
            PathBuf::from("./config")
        };

        if !path.exists() {
            if let Err(e) = fs::create_dir_all(&path) {
                error!("Failed to create config directory: {}", e);
            }
        }

        path
    }

    /// Path of the default configuration file
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("default.yaml")
    }

    /// Load the default configuration, writing it out if it does not exist yet
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_path();

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            info!("Default configuration not found. Creating...");
            let config = Self::default();
            config.save_to_file(&config_path)?;
            Ok(config)
        }
    }

    /// Load an explicit file, or the default configuration
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::load_default(),
        }
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read configuration file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&contents)
            .context(format!("Failed to parse configuration file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the agent cannot run with
    pub fn validate(&self) -> Result<()> {
        let agent = &self.agent;
        if agent.max_concurrent_tabs == 0 {
            anyhow::bail!("agent.max_concurrent_tabs must be at least 1");
        }
        if agent.min_delay_ms > agent.max_delay_ms {
            anyhow::bail!(
                "agent.min_delay_ms ({}) is greater than agent.max_delay_ms ({})",
                agent.min_delay_ms,
                agent.max_delay_ms
            );
        }
        if agent.tick_interval_ms == 0 || agent.load_poll_interval_ms == 0 {
            anyhow::bail!("agent tick and poll intervals must be non-zero");
        }
        if agent.task_retention_secs > MAX_TASK_RETENTION_SECS {
            anyhow::bail!(
                "agent.task_retention_secs ({}) exceeds the maximum of {}",
                agent.task_retention_secs,
                MAX_TASK_RETENTION_SECS
            );
        }
        Ok(())
    }

    /// Save the configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        debug!("Saving configuration to: {}", path.display());

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .context(format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let contents = serde_yaml::to_string(self)
            .context("Failed to serialize configuration")?;

        fs::write(path, contents)
            .context(format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }
}
