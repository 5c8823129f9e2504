use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Backend endpoint that receives activity; results go to its sibling endpoint
pub const KEY_SERVER_URL: &str = "serverUrl";

/// Whether the agent should run at all
pub const KEY_AGENT_ENABLED: &str = "agentEnabled";

/// Values written for keys that have never been set
pub fn default_settings() -> Map<String, Value> {
    let mut defaults = Map::new();
    defaults.insert(
        KEY_SERVER_URL.to_string(),
        Value::from("http://localhost:8091/api/ingest/activity"),
    );
    defaults.insert(KEY_AGENT_ENABLED.to_string(), Value::from(true));
    defaults
}

/// Asynchronous key-value persistence for user settings
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Values for `keys`; missing keys are absent from the result
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>>;

    /// Every stored value
    async fn get_all(&self) -> Result<Map<String, Value>>;

    /// Merge `values` into the store
    async fn set(&self, values: Map<String, Value>) -> Result<()>;
}

/// Fill in defaults for keys the user has never set, leaving the rest untouched
pub async fn initialize_defaults(store: &dyn SettingsStore) -> Result<()> {
    let stored = store.get_all().await?;
    let missing: Map<String, Value> = default_settings()
        .into_iter()
        .filter(|(key, _)| !stored.contains_key(key))
        .collect();

    if !missing.is_empty() {
        info!("Initialized {} missing setting(s) with defaults", missing.len());
        store.set(missing).await?;
    }
    Ok(())
}

/// `agentEnabled` unless explicitly set to `false`
pub async fn agent_enabled(store: &dyn SettingsStore) -> Result<bool> {
    let values = store.get(&[KEY_AGENT_ENABLED]).await?;
    Ok(values.get(KEY_AGENT_ENABLED).and_then(Value::as_bool) != Some(false))
}

fn pick(all: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|key| all.get(*key).map(|v| (key.to_string(), v.clone())))
        .collect()
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: RwLock<Map<String, Value>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
        Ok(pick(&*self.values.read().await, keys))
    }

    async fn get_all(&self) -> Result<Map<String, Value>> {
        Ok(self.values.read().await.clone())
    }

    async fn set(&self, values: Map<String, Value>) -> Result<()> {
        self.values.write().await.extend(values);
        Ok(())
    }
}

/// Store persisted as a JSON object in a single file
pub struct FileSettingsStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Map<String, Value>> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(Map::new());
        }

        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .context(format!("Failed to read settings file: {}", self.path.display()))?;

        if contents.trim().is_empty() {
            return Ok(Map::new());
        }

        serde_json::from_str(&contents)
            .context(format!("Failed to parse settings file: {}", self.path.display()))
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
        let _guard = self.lock.read().await;
        Ok(pick(&self.read().await?, keys))
    }

    async fn get_all(&self) -> Result<Map<String, Value>> {
        let _guard = self.lock.read().await;
        self.read().await
    }

    async fn set(&self, values: Map<String, Value>) -> Result<()> {
        let _guard = self.lock.write().await;
        let mut stored = self.read().await?;
        stored.extend(values);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context(format!("Failed to create directory: {}", parent.display()))?;
        }

        let contents = serde_json::to_string_pretty(&stored)
            .context("Failed to serialize settings")?;
        tokio::fs::write(&self.path, contents)
            .await
            .context(format!("Failed to write settings file: {}", self.path.display()))?;

        debug!("Saved settings to {}", self.path.display());
        Ok(())
    }
}
