//! `incident-timeline load` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use incident_timeline_core::config::TimelineConfig;
use incident_timeline_core::types::{Event, timestamp};

use crate::cli::InputArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `load` command: normalize only, no correlation or rules.
pub async fn execute(
    args: InputArgs,
    config: &TimelineConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let assembler = super::assembler_from_config(config).await?;

    info!(path = %args.path.display(), "loading events");
    let path = args.path.display().to_string();
    let events = assembler.load_async(args.path).await?;

    writer.render(&EventListReport {
        path,
        total: events.len(),
        events,
    })?;

    Ok(())
}

/// Normalized event listing.
#[derive(Serialize)]
pub struct EventListReport {
    pub path: String,
    pub total: usize,
    pub events: Vec<Event>,
}

impl Render for EventListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Events: {} ({} total)",
            self.path.bold(),
            self.total.to_string().bold()
        )?;
        writeln!(w)?;
        writeln!(
            w,
            "{:<22} {:<9} {:<12} {:<30} Message",
            "Timestamp", "Level", "Source", "Metadata"
        )?;
        writeln!(w, "{}", "-".repeat(100))?;

        for event in &self.events {
            let metadata: Vec<String> = event
                .metadata
                .watched()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            writeln!(
                w,
                "{:<22} {:<9} {:<12} {:<30} {}",
                timestamp::format(&event.timestamp),
                event.level.as_str(),
                event.source,
                metadata.join(","),
                event.message
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use incident_timeline_core::types::{EventMetadata, Level, WatchedKey};

    #[test]
    fn test_event_list_render_text() {
        colored::control::set_override(false);
        let event = Event::new(
            "1",
            Utc.with_ymd_and_hms(2023, 1, 1, 10, 0, 0).unwrap(),
            Level::Warn,
            "auth",
            "failed login",
        )
        .with_metadata(EventMetadata::default().with(WatchedKey::Ip, "1.2.3.4"));
        let report = EventListReport {
            path: "auth.json".to_owned(),
            total: 1,
            events: vec![event],
        };

        let mut buffer = Vec::new();
        report
            .render_text(&mut buffer)
            .expect("text rendering should succeed");
        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("Events: auth.json (1 total)"));
        assert!(output.contains("ip=1.2.3.4"));
        assert!(output.contains("WARN"));
    }
}
