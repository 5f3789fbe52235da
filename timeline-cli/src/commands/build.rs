//! `incident-timeline build` command handler

use std::io::Write;

use colored::Colorize;
use serde::Serialize;
use tracing::info;

use incident_timeline_core::config::TimelineConfig;
use incident_timeline_core::types::{CRITICAL_TAG, Level, Timeline, TimelineEvent, timestamp};

use crate::cli::BuildArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `build` command.
///
/// Renders the timeline, then fails with exit code 4 when `--fail-on-findings`
/// is set and any rule fired.
pub async fn execute(
    args: BuildArgs,
    config: &TimelineConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let assembler = super::assembler_from_config(config).await?;

    info!(path = %args.path.display(), "building timeline");
    let timeline = assembler.build_async(args.path).await?;

    writer.render(&TimelineReport(&timeline))?;

    if args.fail_on_findings && timeline.has_findings() {
        return Err(CliError::FindingsDetected(timeline.findings.len()));
    }

    Ok(())
}

/// Timeline output payload. JSON output is the timeline itself.
#[derive(Serialize)]
#[serde(transparent)]
pub struct TimelineReport<'a>(pub &'a Timeline);

impl Render for TimelineReport<'_> {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let timeline = self.0;

        writeln!(w, "{}", timeline.title.bold())?;
        writeln!(w, "  ID: {}", timeline.id)?;

        if timeline.is_empty() {
            writeln!(w, "  No events.")?;
            return Ok(());
        }

        writeln!(w, "  Span: {} to {}", timeline.start_time, timeline.end_time)?;
        writeln!(
            w,
            "  Events: {}, Clusters: {}",
            timeline.events.len(),
            timeline.cluster_count()
        )?;
        writeln!(w)?;
        writeln!(
            w,
            "{:<22} {:<9} {:<8} {:<12} Message",
            "Timestamp", "Level", "Cluster", "Source"
        )?;
        writeln!(w, "{}", "-".repeat(90))?;

        for entry in &timeline.events {
            render_event(w, entry)?;
        }

        if let Some(summary) = &timeline.summary {
            writeln!(w)?;
            writeln!(w, "Summary: {summary}")?;
        }

        if timeline.has_findings() {
            writeln!(w)?;
            writeln!(w, "{}", "Findings:".red().bold())?;
            for finding in &timeline.findings {
                writeln!(w, "  - {}", finding.red())?;
            }
        }

        Ok(())
    }
}

fn render_event(w: &mut dyn Write, entry: &TimelineEvent) -> std::io::Result<()> {
    let event = &entry.event;
    let level = format!("{:<9}", event.level.as_str());
    let level = if entry.has_tag(CRITICAL_TAG) {
        level.red().bold()
    } else if event.level == Level::Warn {
        level.yellow()
    } else {
        level.normal()
    };
    let cluster = entry
        .cluster()
        .map_or_else(|| "-".to_owned(), |c| c.to_string());

    write!(
        w,
        "{:<22} {} {:<8} {:<12} {}",
        timestamp::format(&event.timestamp),
        level,
        cluster,
        event.source,
        event.message
    )?;
    if !entry.related_events.is_empty() {
        write!(w, " ({} related)", entry.related_events.len())?;
    }
    writeln!(w)
}
