use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{debug, info, warn};

use crate::agent::control;
use crate::agent::orchestrator::BrowserAgent;
use crate::agent::task::{NewTask, TaskKind};
use crate::browser::extract::ContentExtractor;
use crate::browser::quality::QualityValidator;
use crate::browser::webdriver::WebDriverHost;
use crate::cli::config::AgentConfig;
use crate::report::HttpReporter;
use crate::storage::settings::{agent_enabled, initialize_defaults, FileSettingsStore, SettingsStore};

/// How often `--exit-when-idle` checks the queue
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Options for the `run` command
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub urls: Vec<String>,
    pub kind: TaskKind,
    pub priority: i32,
    pub stdin: bool,
    pub exit_when_idle: bool,
    pub force: bool,
}

/// Where persisted user settings live
pub fn settings_path() -> PathBuf {
    AgentConfig::config_dir().join("settings.json")
}

async fn open_settings() -> Result<FileSettingsStore> {
    let store = FileSettingsStore::new(settings_path());
    initialize_defaults(&store).await?;
    Ok(store)
}

/// Run the agent until interrupted or, with `--exit-when-idle`, until the queue drains
pub async fn run(config_path: Option<&Path>, options: RunOptions) -> Result<()> {
    let config = AgentConfig::load(config_path)?;
    let settings: Arc<dyn SettingsStore> = Arc::new(open_settings().await?);

    let host = Arc::new(WebDriverHost::connect(&config.webdriver).await?);
    let reporter = Arc::new(HttpReporter::new(&config.reporting, settings.clone())?);
    let agent = Arc::new(BrowserAgent::new(&config, host.clone(), reporter)?);

    for url in &options.urls {
        let task = NewTask::new(url.clone(), options.kind).with_priority(options.priority);
        agent.add_task(task).await;
    }

    if options.force || agent_enabled(settings.as_ref()).await? {
        agent.start();
    } else {
        warn!("Agent is disabled in settings; pass --force or set agentEnabled to true");
    }

    let result = serve(&agent, &options).await;

    agent.stop();
    let drain = Duration::from_millis(config.agent.page_load_timeout_ms) * 2;
    if tokio::time::timeout(drain, wait_for_in_flight(&agent)).await.is_err() {
        warn!("Gave up waiting for in-flight tasks after {:?}", drain);
    }

    let metrics = agent.metrics().await;
    info!(
        "Agent finished: {} completed, {} failed, {} report failure(s)",
        metrics.tasks_completed, metrics.tasks_failed, metrics.reports_failed
    );

    host.shutdown().await?;
    result
}

/// Pump stdin control messages until something ends the run
async fn serve(agent: &Arc<BrowserAgent>, options: &RunOptions) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = options.stdin;
    let mut idle_check = tokio::time::interval(IDLE_CHECK_INTERVAL);

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                return Ok(());
            }
            line = lines.next_line(), if stdin_open => {
                match line.context("Failed to read control message")? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => {
                        let response = control::handle_line(agent, &line).await;
                        println!("{}", serde_json::to_string(&response)?);
                    }
                    None => {
                        debug!("stdin closed");
                        stdin_open = false;
                    }
                }
            }
            _ = idle_check.tick(), if options.exit_when_idle => {
                let stats = agent.queue_stats().await;
                if stats.pending == 0 && stats.processing == 0 {
                    info!("Queue drained ({} complete, {} failed)", stats.complete, stats.failed);
                    return Ok(());
                }
            }
        }
    }
}

async fn wait_for_in_flight(agent: &BrowserAgent) {
    while agent.queue_stats().await.processing > 0 {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

/// Extract and score a saved page, printing the result as JSON
pub async fn inspect(config_path: Option<&Path>, file: &Path, url: &str) -> Result<()> {
    let config = AgentConfig::load(config_path)?;
    let html = tokio::fs::read_to_string(file)
        .await
        .context(format!("Failed to read HTML file: {}", file.display()))?;

    let extractor = ContentExtractor::new()?;
    let snapshot = extractor.snapshot_from_html(url, html);
    let mut content = extractor.extract(&snapshot);
    content.quality = Some(QualityValidator::new(&config.quality).validate(&content));

    println!("{}", serde_json::to_string_pretty(&content)?);
    Ok(())
}

/// Show the current configuration
pub async fn show_config(config_path: Option<&Path>, init: bool) -> Result<()> {
    if init {
        let path = AgentConfig::default_path();
        if path.exists() {
            println!("Configuration already exists: {}", path.display());
        } else {
            AgentConfig::default().save_to_file(&path)?;
            println!("Wrote default configuration: {}", path.display());
        }
        return Ok(());
    }

    let config = AgentConfig::load(config_path)?;
    println!("Current configuration:");
    print!("{}", serde_yaml::to_string(&config)?);

    Ok(())
}

/// Print persisted settings
pub async fn settings_get(keys: &[String]) -> Result<()> {
    let store = open_settings().await?;
    let values = if keys.is_empty() {
        store.get_all().await?
    } else {
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        store.get(&keys).await?
    };

    println!("{}", serde_json::to_string_pretty(&values)?);
    Ok(())
}

/// Persist `key=value` pairs
pub async fn settings_set(pairs: &[String]) -> Result<()> {
    let values = parse_setting_pairs(pairs)?;
    let store = open_settings().await?;
    for (key, value) in &values {
        info!("Setting {} = {}", key, value);
    }
    store.set(values).await?;
    Ok(())
}

fn parse_setting_pairs(pairs: &[String]) -> Result<Map<String, Value>> {
    pairs
        .iter()
        .map(|pair| -> Result<(String, Value)> {
            let (key, value) = pair
                .split_once('=')
                .filter(|(key, _)| !key.trim().is_empty())
                .with_context(|| format!("Expected key=value, got '{}'", pair))?;
            Ok((key.trim().to_string(), parse_setting_value(value)))
        })
        .collect()
}

/// JSON literals keep their type; anything else is stored as a string
fn parse_setting_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
