//! `incident-timeline rules` command handler

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use incident_timeline_core::config::TimelineConfig;
use incident_timeline_engine::RuleLoader;
use incident_timeline_engine::RuleSet;
use incident_timeline_engine::rule::RuleInfo;

use crate::cli::{RulesAction, RulesArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `rules` command.
pub async fn execute(
    args: RulesArgs,
    config: &TimelineConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        RulesAction::List => execute_list(config, writer).await,
        RulesAction::Validate { path } => {
            let path = resolve_rules_dir(path, config)?;
            execute_validate(&path, writer).await
        }
    }
}

async fn execute_list(config: &TimelineConfig, writer: &OutputWriter) -> Result<(), CliError> {
    info!(
        builtin = config.rules.builtin,
        rules_dir = %config.rules.rules_dir,
        "loading rule set"
    );

    let rules = RuleSet::from_config(&config.rules).await?;
    let report = RuleListReport {
        total: rules.len(),
        rules: rules.describe(),
    };

    writer.render(&report)?;

    Ok(())
}

/// Validate every rule file in `path`, reporting each failure.
///
/// Returns `CliError::Rule` (exit code 1) if any file is invalid.
pub async fn execute_validate(path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %path.display(), "validating detection rules");

    let validation = RuleLoader::validate_directory(path).await?;

    let report = RuleValidationReport {
        path: path.display().to_string(),
        total_files: validation.valid.len() + validation.invalid.len(),
        valid: validation.valid.len(),
        invalid: validation.invalid.len(),
        errors: validation
            .invalid
            .into_iter()
            .map(|(file, error)| RuleFileError {
                file: file.display().to_string(),
                error,
            })
            .collect(),
    };

    writer.render(&report)?;

    if report.invalid > 0 {
        return Err(CliError::Rule(format!("{} invalid rule file(s)", report.invalid)));
    }

    Ok(())
}

fn resolve_rules_dir(path: Option<PathBuf>, config: &TimelineConfig) -> Result<PathBuf, CliError> {
    match path {
        Some(path) => Ok(path),
        None if !config.rules.rules_dir.is_empty() => Ok(PathBuf::from(&config.rules.rules_dir)),
        None => Err(CliError::Command(
            "no rules directory given and rules.rules_dir is not set".to_owned(),
        )),
    }
}

#[derive(Serialize)]
pub struct RuleListReport {
    pub total: usize,
    pub rules: Vec<RuleInfo>,
}

impl Render for RuleListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Detection Rules ({} total)",
            self.total.to_string().bold()
        )?;
        writeln!(w)?;
        writeln!(w, "{:<16} {:<32} Description", "ID", "Name")?;
        writeln!(w, "{}", "-".repeat(90))?;

        for rule in &self.rules {
            writeln!(
                w,
                "{:<16} {:<32} {}",
                rule.id, rule.name, rule.description
            )?;
        }

        Ok(())
    }
}

#[derive(Serialize)]
pub struct RuleValidationReport {
    pub path: String,
    pub total_files: usize,
    pub valid: usize,
    pub invalid: usize,
    pub errors: Vec<RuleFileError>,
}

#[derive(Serialize)]
pub struct RuleFileError {
    pub file: String,
    pub error: String,
}

impl Render for RuleValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Rule Validation: {}", self.path.bold())?;
        writeln!(
            w,
            "  Files: {} total, {} valid, {} invalid",
            self.total_files,
            self.valid.to_string().green(),
            if self.invalid > 0 {
                self.invalid.to_string().red()
            } else {
                self.invalid.to_string().normal()
            }
        )?;

        if !self.errors.is_empty() {
            writeln!(w)?;
            writeln!(w, "Errors:")?;
            for e in &self.errors {
                writeln!(w, "  {}: {}", e.file.red(), e.error)?;
            }
        }

        Ok(())
    }
}
