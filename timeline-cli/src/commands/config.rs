//! `incident-timeline config` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use crate::LoadedConfig;
use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Section names accepted by `config show --section`.
const SECTIONS: [&str; 3] = ["general", "ingest", "rules"];

/// Execute the `config` command.
pub fn execute(
    args: ConfigArgs,
    loaded: &LoadedConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(loaded, writer),
        ConfigAction::Show { section } => execute_show(loaded, section, writer),
    }
}

/// Report whether the resolved configuration is valid.
///
/// Returns `CliError::Config` (exit code 2) after rendering if it is not.
fn execute_validate(loaded: &LoadedConfig, writer: &OutputWriter) -> Result<(), CliError> {
    info!(source = %loaded.source, "validating configuration");

    let report = validation_report(loaded);
    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }

    Ok(())
}

/// Build the validation report for a resolved configuration.
pub fn validation_report(loaded: &LoadedConfig) -> ConfigValidationReport {
    match &loaded.config {
        Ok(_) => ConfigValidationReport {
            source: loaded.source.clone(),
            valid: true,
            errors: Vec::new(),
        },
        Err(e) => ConfigValidationReport {
            source: loaded.source.clone(),
            valid: false,
            errors: vec![e.to_string()],
        },
    }
}

/// Show the effective configuration (file + env overrides + defaults).
fn execute_show(
    loaded: &LoadedConfig,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let report = show_report(loaded, section)?;
    writer.render(&report)?;
    Ok(())
}

/// Build the `config show` report, optionally restricted to one section.
pub fn show_report(
    loaded: &LoadedConfig,
    section: Option<String>,
) -> Result<ConfigReport, CliError> {
    let config = loaded.require()?;

    let config_toml = match section.as_deref() {
        None => toml::to_string_pretty(config),
        Some("general") => toml::to_string_pretty(&config.general),
        Some("ingest") => toml::to_string_pretty(&config.ingest),
        Some("rules") => toml::to_string_pretty(&config.rules),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {other} (expected: {})",
                SECTIONS.join(", ")
            )));
        }
    }
    .map_err(|e| CliError::Command(format!("failed to serialize configuration: {e}")))?;

    Ok(ConfigReport {
        source: loaded.source.clone(),
        section,
        config_toml,
    })
}

/// Configuration display report.
///
/// The `config_toml` field is skipped during JSON serialization (only used for text rendering).
#[derive(Serialize)]
pub struct ConfigReport {
    /// Configuration source (file path or "defaults")
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Serialized TOML configuration
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{section}]");
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;

        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    /// Configuration source
    pub source: String,
    /// Whether the configuration is valid
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }

        Ok(())
    }
}
