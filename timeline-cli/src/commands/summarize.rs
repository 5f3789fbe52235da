//! `incident-timeline summarize` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use incident_timeline_core::config::TimelineConfig;
use incident_timeline_engine::IncidentReport;

use crate::cli::InputArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `summarize` command.
///
/// Text output is the markdown report; JSON output is the structured report.
pub async fn execute(
    args: InputArgs,
    config: &TimelineConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let assembler = super::assembler_from_config(config).await?;

    info!(path = %args.path.display(), "summarizing incident");
    let timeline = assembler.build_async(args.path).await?;
    let report = IncidentReport::from_timeline(&timeline);

    writer.render(&SummaryReport(report))?;

    Ok(())
}

/// Incident summary output payload.
#[derive(Serialize)]
#[serde(transparent)]
pub struct SummaryReport(pub IncidentReport);

impl Render for SummaryReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "{}", self.0.render_markdown())
    }
}
