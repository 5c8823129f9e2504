pub mod commands;
pub mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use crate::agent::task::TaskKind;
use crate::utils::default_log_file;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Configuration file (defaults to the per-user config)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent, reading JSON control messages from stdin
    Run {
        /// URLs to queue before the agent starts
        #[arg(short, long)]
        url: Vec<String>,

        /// Task type for URLs given on the command line
        #[arg(short, long, default_value = "manual")]
        kind: TaskKind,

        /// Priority for URLs given on the command line
        #[arg(short, long, default_value_t = 0)]
        priority: i32,

        /// Accept control messages on stdin, one JSON object per line
        #[arg(long)]
        stdin: bool,

        /// Exit once every queued task has finished
        #[arg(long)]
        exit_when_idle: bool,

        /// Start even when the agent is disabled in the settings
        #[arg(long)]
        force: bool,
    },

    /// Extract and score a saved HTML page without a browser
    Inspect {
        /// HTML file to read
        #[arg(required = true)]
        file: PathBuf,

        /// URL the page was saved from
        #[arg(short, long, default_value = "about:blank")]
        url: String,
    },

    /// Show the current configuration
    Config {
        /// Write the default configuration file if it is missing
        #[arg(long)]
        init: bool,
    },

    /// Read or change persisted user settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print settings (all of them when no key is given)
    Get {
        keys: Vec<String>,
    },

    /// Set settings given as key=value; values are parsed as JSON, falling back to strings
    Set {
        #[arg(required = true)]
        pairs: Vec<String>,
    },
}

impl Cli {
    /// Log file to write: the explicit one, or the default for `run`
    pub fn log_file(&self) -> Option<PathBuf> {
        match (&self.log_file, &self.command) {
            (Some(path), _) => Some(path.clone()),
            (None, Commands::Run { .. }) => Some(default_log_file()),
            (None, _) => None,
        }
    }
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Process the command
pub async fn process_command(cli: Cli) -> Result<()> {
    let config = cli.config;
    match cli.command {
        Commands::Run { url, kind, priority, stdin, exit_when_idle, force } => {
            info!("Starting agent with {} initial URL(s)", url.len());
            let options = commands::RunOptions {
                urls: url,
                kind,
                priority,
                stdin,
                exit_when_idle,
                force,
            };
            commands::run(config.as_deref(), options).await
        }
        Commands::Inspect { file, url } => {
            info!("Inspecting {}", file.display());
            commands::inspect(config.as_deref(), &file, &url).await
        }
        Commands::Config { init } => commands::show_config(config.as_deref(), init).await,
        Commands::Settings { action } => match action {
            SettingsAction::Get { keys } => commands::settings_get(&keys).await,
            SettingsAction::Set { pairs } => commands::settings_set(&pairs).await,
        },
    }
}
