//! Command handlers -- one module per subcommand

pub mod build;
pub mod config;
pub mod load;
pub mod rules;
pub mod summarize;

use std::sync::Arc;

use tracing::info;

use incident_timeline_core::config::TimelineConfig;
use incident_timeline_engine::{AssemblerConfig, RuleSet, TimelineAssembler};

use crate::error::CliError;

/// Build an assembler from the effective configuration.
///
/// Loads built-in rules and the rules directory once; the resulting set is shared
/// by every build started from the returned assembler.
pub async fn assembler_from_config(config: &TimelineConfig) -> Result<TimelineAssembler, CliError> {
    let assembler_config = AssemblerConfig::from_core(config);
    assembler_config.validate()?;

    let rules = RuleSet::from_config(&config.rules).await?;
    info!(rules = rules.len(), "rule set ready");

    Ok(TimelineAssembler::new(assembler_config, Arc::new(rules)))
}
