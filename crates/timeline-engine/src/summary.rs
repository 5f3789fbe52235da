//! 사고 요약 -- 타임라인에서 사람이 읽는 보고서를 생성합니다.
//!
//! [`IncidentReport`]는 JSON 출력용으로 직렬화되며,
//! [`IncidentReport::render_markdown`]으로 마크다운 보고서를 만듭니다.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use incident_timeline_core::types::{CRITICAL_TAG, Timeline, WatchedKey, timestamp};
use serde::Serialize;

/// 위험 징후가 있을 때의 권고
pub const INVESTIGATE_RECOMMENDATION: &str =
    "Investigate source IPs for potential brute force or unauthorized access.";

/// 위험 징후가 없을 때의 권고
pub const CLEAN_RECOMMENDATION: &str = "No critical events detected.";

/// 사고 요약 보고서
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentReport {
    /// 타임라인 제목
    pub title: String,
    /// 시작 시각 (RFC 3339, 빈 타임라인이면 빈 문자열)
    pub start_time: String,
    /// 종료 시각
    pub end_time: String,
    /// 전체 이벤트 수
    pub total_events: usize,
    /// `CRITICAL` 태그가 붙은 이벤트 수
    pub critical_events: usize,
    /// 관련된 고유 IP 수
    pub unique_ips: usize,
    /// 클러스터 수
    pub clusters: usize,
    /// 주요 발견 사항 (치명 이벤트 줄 다음에 규칙 finding)
    pub key_findings: Vec<String>,
    /// 규칙 finding
    pub findings: Vec<String>,
    /// 권고 사항
    pub recommendations: Vec<String>,
}

impl IncidentReport {
    /// 타임라인에서 보고서를 생성합니다.
    pub fn from_timeline(timeline: &Timeline) -> Self {
        let critical: Vec<_> = timeline
            .events
            .iter()
            .filter(|e| e.has_tag(CRITICAL_TAG))
            .collect();

        let unique_ips = timeline
            .events
            .iter()
            .filter_map(|e| e.event.metadata.get(WatchedKey::Ip))
            .collect::<BTreeSet<_>>()
            .len();

        let mut key_findings: Vec<String> = critical
            .iter()
            .map(|e| {
                format!(
                    "[{}] {} (Source: {})",
                    timestamp::format(&e.event.timestamp),
                    e.event.message,
                    e.event.source
                )
            })
            .collect();
        key_findings.extend(timeline.findings.iter().cloned());

        let recommendation = if critical.is_empty() && timeline.findings.is_empty() {
            CLEAN_RECOMMENDATION
        } else {
            INVESTIGATE_RECOMMENDATION
        };

        Self {
            title: timeline.title.clone(),
            start_time: timeline.start_time.clone(),
            end_time: timeline.end_time.clone(),
            total_events: timeline.events.len(),
            critical_events: critical.len(),
            unique_ips,
            clusters: timeline.cluster_count(),
            key_findings,
            findings: timeline.findings.clone(),
            recommendations: vec![recommendation.to_owned()],
        }
    }

    /// 위험 징후(치명 이벤트 또는 finding)가 있으면 true
    pub fn is_alarming(&self) -> bool {
        self.critical_events > 0 || !self.findings.is_empty()
    }

    /// 마크다운 보고서를 렌더링합니다.
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        // String에 대한 write!는 실패하지 않음
        let _ = writeln!(out, "# Incident Summary: {}", self.title);
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "**Duration:** {} to {}",
            self.start_time, self.end_time
        );
        let _ = writeln!(out, "**Total Events:** {}", self.total_events);
        let _ = writeln!(out, "**Critical Events:** {}", self.critical_events);
        let _ = writeln!(out, "**Unique IPs Involved:** {}", self.unique_ips);
        let _ = writeln!(out, "**Clusters:** {}", self.clusters);
        let _ = writeln!(out);
        let _ = writeln!(out, "## Key Findings");
        if self.key_findings.is_empty() {
            let _ = writeln!(out, "- None.");
        }
        for line in &self.key_findings {
            let _ = writeln!(out, "- {line}");
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "## Recommendations");
        for line in &self.recommendations {
            let _ = writeln!(out, "- {line}");
        }
        out.truncate(out.trim_end().len());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use incident_timeline_core::types::{Event, EventMetadata, Level, TimelineEvent};

    fn entry(id: &str, level: Level, ip: Option<&str>, cluster: usize) -> TimelineEvent {
        let mut metadata = EventMetadata::default();
        if let Some(ip) = ip {
            metadata.set(WatchedKey::Ip, ip);
        }
        let event = Event::new(
            id,
            Utc.with_ymd_and_hms(2023, 1, 1, 10, 0, 0).unwrap(),
            level,
            "auth",
            format!("message {id}"),
        )
        .with_metadata(metadata);
        let mut tags = vec![format!("Cluster:{cluster}")];
        if level.is_critical() {
            tags.push(CRITICAL_TAG.to_owned());
        }
        TimelineEvent {
            event,
            related_events: Vec::new(),
            tags,
        }
    }

    fn timeline(events: Vec<TimelineEvent>, findings: Vec<String>) -> Timeline {
        Timeline {
            id: "t".to_owned(),
            title: "Incident Timeline - auth.log".to_owned(),
            start_time: "2023-01-01T10:00:00Z".to_owned(),
            end_time: "2023-01-01T10:00:00Z".to_owned(),
            events,
            summary: None,
            findings,
        }
    }

    #[test]
    fn counts_critical_events_ips_and_clusters() {
        let report = IncidentReport::from_timeline(&timeline(
            vec![
                entry("1", Level::Error, Some("1.1.1.1"), 0),
                entry("2", Level::Info, Some("1.1.1.1"), 0),
                entry("3", Level::Fatal, Some("2.2.2.2"), 1),
                entry("4", Level::Warn, None, 2),
            ],
            Vec::new(),
        ));
        assert_eq!(report.total_events, 4);
        assert_eq!(report.critical_events, 2);
        assert_eq!(report.unique_ips, 2);
        assert_eq!(report.clusters, 3);
        assert!(report.is_alarming());
        assert_eq!(report.recommendations, vec![INVESTIGATE_RECOMMENDATION]);
        assert_eq!(
            report.key_findings[0],
            "[2023-01-01T10:00:00Z] message 1 (Source: auth)"
        );
    }

    #[test]
    fn findings_alone_trigger_investigation() {
        let report = IncidentReport::from_timeline(&timeline(
            vec![entry("1", Level::Info, Some("1.1.1.1"), 0)],
            vec!["Rule Triggered: X - y".to_owned()],
        ));
        assert_eq!(report.critical_events, 0);
        assert_eq!(report.key_findings, vec!["Rule Triggered: X - y"]);
        assert_eq!(report.recommendations, vec![INVESTIGATE_RECOMMENDATION]);
    }

    #[test]
    fn quiet_timeline_recommends_nothing() {
        let report = IncidentReport::from_timeline(&timeline(
            vec![entry("1", Level::Info, None, 0)],
            Vec::new(),
        ));
        assert!(!report.is_alarming());
        assert_eq!(report.recommendations, vec![CLEAN_RECOMMENDATION]);
    }

    #[test]
    fn markdown_layout() {
        let report = IncidentReport::from_timeline(&timeline(
            vec![entry("1", Level::Critical, Some("1.1.1.1"), 0)],
            Vec::new(),
        ));
        let expected = "\
# Incident Summary: Incident Timeline - auth.log

**Duration:** 2023-01-01T10:00:00Z to 2023-01-01T10:00:00Z
**Total Events:** 1
**Critical Events:** 1
**Unique IPs Involved:** 1
**Clusters:** 1

## Key Findings
- [2023-01-01T10:00:00Z] message 1 (Source: auth)

## Recommendations
- Investigate source IPs for potential brute force or unauthorized access.";
        assert_eq!(report.render_markdown(), expected);
    }

    #[test]
    fn empty_timeline_report() {
        let report = IncidentReport::from_timeline(&Timeline::empty("x"));
        assert_eq!(report.total_events, 0);
        assert!(report.render_markdown().contains("- None."));
        assert!(report.render_markdown().ends_with("- No critical events detected."));
    }

    #[test]
    fn report_serializes_camel_case() {
        let report = IncidentReport::from_timeline(&Timeline::empty("x"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["totalEvents"], 0);
        assert_eq!(json["uniqueIps"], 0);
        assert!(json["keyFindings"].as_array().unwrap().is_empty());
    }
}
