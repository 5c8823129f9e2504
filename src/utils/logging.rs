use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` wins; otherwise this crate logs at info (debug when verbose)
/// and everything else at warn.
fn env_filter(verbose: bool) -> Result<EnvFilter> {
    let level = if verbose { "debug" } else { "info" };
    Ok(EnvFilter::from_default_env()
        .add_directive("warn".parse()?)
        .add_directive(format!("tab_agent={}", level).parse()?))
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .context(format!("Failed to create log directory: {}", parent.display()))?;
    }
    File::options()
        .create(true)
        .append(true)
        .open(path)
        .context(format!("Failed to open log file: {}", path.display()))
}

/// Install the global subscriber. Logs go to stderr, since stdout carries
/// control responses, and are appended to `log_file` when one is given.
pub fn init_logging(verbose: bool, log_file: Option<PathBuf>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(open_log_file(&path)?),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter(verbose)?)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("Logging was already initialized")?;

    Ok(())
}

/// Default log file under the platform data directory
pub fn default_log_file() -> PathBuf {
    directories::ProjectDirs::from("com", "tab-agent", "tab-agent")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./logs"))
        .join("agent.log")
}
