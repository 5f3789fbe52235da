//! Incident Timeline command-line interface.
//!
//! The binary (`incident-timeline`) is a thin wrapper around [`run`]. Command
//! handlers live in [`commands`] and render through [`output::OutputWriter`].

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;

use std::path::Path;

use tracing::debug;

use incident_timeline_core::config::{DEFAULT_CONFIG_FILE, GeneralConfig, TimelineConfig};
use incident_timeline_core::error::TimelineError;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

/// Configuration resolved for this invocation, together with where it came from.
///
/// Loading failures are kept rather than raised so `config validate` can report them.
#[derive(Debug)]
pub struct LoadedConfig {
    /// File path, or `"defaults"` when no file was used.
    pub source: String,
    /// The effective configuration or the reason it could not be built.
    pub config: Result<TimelineConfig, TimelineError>,
}

impl LoadedConfig {
    /// The configuration, or a configuration error for commands that need it.
    pub fn require(&self) -> Result<&TimelineConfig, CliError> {
        self.config
            .as_ref()
            .map_err(|e| CliError::Config(format!("{} ({})", e, self.source)))
    }
}

/// Resolve the configuration: explicit file, else `incident-timeline.toml` if present,
/// else defaults. Environment overrides apply in every case, then `--log-level`.
pub async fn load_config(path: Option<&Path>, log_level: Option<&str>) -> LoadedConfig {
    let (source, config) = match path {
        Some(path) => (path.display().to_string(), TimelineConfig::load(path).await),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if tokio::fs::try_exists(default_path).await.unwrap_or(false) {
                (
                    DEFAULT_CONFIG_FILE.to_owned(),
                    TimelineConfig::load(default_path).await,
                )
            } else {
                ("defaults".to_owned(), TimelineConfig::from_env())
            }
        }
    };

    let config = config.and_then(|mut config| {
        if let Some(level) = log_level {
            config.general.log_level = level.to_owned();
            config.validate()?;
        }
        Ok(config)
    });

    LoadedConfig { source, config }
}

/// Run one CLI invocation.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);
    let loaded = load_config(cli.config.as_deref(), cli.log_level.as_deref()).await;

    let general = match &loaded.config {
        Ok(config) => config.general.clone(),
        Err(_) => GeneralConfig::default(),
    };
    logging::init_tracing(&general)?;
    debug!(source = %loaded.source, "configuration resolved");

    match cli.command {
        Commands::Build(args) => commands::build::execute(args, loaded.require()?, &writer).await,
        Commands::Summarize(args) => {
            commands::summarize::execute(args, loaded.require()?, &writer).await
        }
        Commands::Load(args) => commands::load::execute(args, loaded.require()?, &writer).await,
        Commands::Rules(args) => commands::rules::execute(args, loaded.require()?, &writer).await,
        Commands::Config(args) => commands::config::execute(args, &loaded, &writer),
    }
}
