//! 타임라인 조립기 -- 정규화 → 상관 분석 + 규칙 평가 → 타임라인
//!
//! [`TimelineAssembler`]는 하나의 로그 파일에서 포렌식 타임라인을 만듭니다.
//!
//! # 처리 흐름
//! ```text
//! path ──> Normalizer ──> Vec<Event> ──┬──> Correlator ──> Vec<TimelineEvent> ──┐
//!           (한도/제한 시간)            └──> RuleSet ─────> Vec<Finding> ────────┴──> Timeline
//! ```
//!
//! 조립기는 불변 상태(`Arc<RuleSet>`, 설정)만 공유하므로
//! 여러 빌드를 동시에 실행할 수 있습니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use incident_timeline_core::pipeline::Correlator;
use incident_timeline_core::types::{Event, FINDINGS_MARKER, Finding, Timeline, timestamp};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AssemblerConfig;
use crate::correlator::GraphCorrelator;
use crate::error::EngineError;
use crate::normalizer::Normalizer;
use crate::rule::RuleSet;

/// 타임라인 조립기
#[derive(Clone)]
pub struct TimelineAssembler {
    config: AssemblerConfig,
    normalizer: Normalizer,
    correlator: Arc<dyn Correlator>,
    rules: Arc<RuleSet>,
}

impl TimelineAssembler {
    /// 설정과 규칙 집합으로 조립기를 생성합니다.
    ///
    /// 상관 분석기는 [`GraphCorrelator`]를 사용합니다.
    pub fn new(config: AssemblerConfig, rules: Arc<RuleSet>) -> Self {
        Self {
            normalizer: Normalizer::from_config(&config),
            config,
            correlator: Arc::new(GraphCorrelator::new()),
            rules,
        }
    }

    /// 상관 분석기를 교체합니다.
    pub fn with_correlator(mut self, correlator: Arc<dyn Correlator>) -> Self {
        self.correlator = correlator;
        self
    }

    /// 조립 설정
    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// 규칙 집합
    pub fn rules(&self) -> &Arc<RuleSet> {
        &self.rules
    }

    /// 파일을 정규화하여 전체 이벤트 목록을 반환합니다.
    ///
    /// `max_events`를 넘으면 `TooManyEvents`, 읽기가 `read_timeout`을 넘기면
    /// `ReadTimeout`을 반환합니다. 에러 시 부분 결과는 버려집니다.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Vec<Event>, EngineError> {
        let path = path.as_ref();
        // 표현할 수 없을 만큼 먼 제한 시간은 제한 없음으로 취급
        let deadline = Instant::now().checked_add(self.config.read_timeout());
        let mut events = Vec::new();

        for item in self.normalizer.open(path)? {
            let event = item?;

            if events.len() >= self.config.max_events {
                return Err(EngineError::TooManyEvents {
                    path: path.display().to_string(),
                    max: self.config.max_events,
                });
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(EngineError::ReadTimeout {
                    path: path.display().to_string(),
                    secs: self.config.read_timeout_secs,
                });
            }

            events.push(event);
        }

        debug!(path = %path.display(), events = events.len(), "log input drained");
        Ok(events)
    }

    /// 파일에서 타임라인을 생성합니다. (블로킹)
    pub fn build(&self, path: impl AsRef<Path>) -> Result<Timeline, EngineError> {
        let path = path.as_ref();
        let events = self.load(path)?;
        Ok(self.assemble(&path.display().to_string(), events))
    }

    /// 블로킹 스레드에서 `build`를 실행하고 `read_timeout`으로 전체 시간을 제한합니다.
    ///
    /// 제한 시간이 지나면 `ReadTimeout`을 반환합니다. 이미 시작된 블로킹 읽기는
    /// 백그라운드에서 끝까지 진행되지만 결과는 버려집니다.
    pub async fn build_async(&self, path: impl Into<PathBuf>) -> Result<Timeline, EngineError> {
        self.run_blocking(path.into(), |assembler, path| assembler.build(path))
            .await
    }

    /// 블로킹 스레드에서 `load`를 실행합니다. 제한 시간은 `build_async`와 같습니다.
    pub async fn load_async(&self, path: impl Into<PathBuf>) -> Result<Vec<Event>, EngineError> {
        self.run_blocking(path.into(), |assembler, path| assembler.load(path))
            .await
    }

    async fn run_blocking<T, F>(&self, path: PathBuf, job: F) -> Result<T, EngineError>
    where
        T: Send + 'static,
        F: FnOnce(&Self, &Path) -> Result<T, EngineError> + Send + 'static,
    {
        let label = path.display().to_string();
        let assembler = self.clone();

        let task = tokio::task::spawn_blocking(move || job(&assembler, path.as_path()));

        match tokio::time::timeout(self.config.read_timeout(), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(EngineError::Io(std::io::Error::other(format!(
                "timeline task failed: {join_error}"
            )))),
            Err(_) => Err(EngineError::ReadTimeout {
                path: label,
                secs: self.config.read_timeout_secs,
            }),
        }
    }

    /// 메모리상의 이벤트 목록에서 타임라인을 조립합니다.
    ///
    /// `source`는 제목에 표시되는 입력 이름입니다. 이벤트가 없으면 빈 타임라인 센티넬을 반환합니다.
    pub fn assemble(&self, source: &str, events: Vec<Event>) -> Timeline {
        let id = Uuid::new_v4().to_string();

        if events.is_empty() {
            info!(path = source, "no events, returning empty timeline");
            return Timeline::empty(id);
        }

        let findings: Vec<String> = self
            .rules
            .evaluate(&events)
            .iter()
            .map(Finding::message)
            .collect();
        let correlated = self.correlator.correlate(&events);

        let start_time = correlated
            .first()
            .map(|e| timestamp::format(&e.event.timestamp))
            .unwrap_or_default();
        let end_time = correlated
            .last()
            .map(|e| timestamp::format(&e.event.timestamp))
            .unwrap_or_default();

        let mut timeline = Timeline {
            id,
            title: format!("Incident Timeline - {source}"),
            start_time,
            end_time,
            events: correlated,
            summary: None,
            findings,
        };

        let clusters = timeline.cluster_count();
        timeline.summary = Some(render_summary(
            timeline.events.len(),
            clusters,
            &timeline.findings,
        ));

        info!(
            path = source,
            correlator = self.correlator.name(),
            events = timeline.events.len(),
            clusters,
            findings = timeline.findings.len(),
            "timeline built"
        );

        timeline
    }
}

impl std::fmt::Debug for TimelineAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineAssembler")
            .field("config", &self.config)
            .field("correlator", &self.correlator.name())
            .field("rules", &self.rules.len())
            .finish()
    }
}

/// 요약 문자열을 생성합니다. finding이 없으면 마커를 생략합니다.
fn render_summary(events: usize, clusters: usize, findings: &[String]) -> String {
    let mut summary = format!("Analyzed {events} events across {clusters} clusters.");
    if !findings.is_empty() {
        summary.push(' ');
        summary.push_str(FINDINGS_MARKER);
        summary.push_str(&findings.join("; "));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use incident_timeline_core::types::{EventMetadata, Level, TimelineEvent, WatchedKey};
    use std::io::Write;

    fn assembler() -> TimelineAssembler {
        TimelineAssembler::new(AssemblerConfig::default(), Arc::new(RuleSet::with_builtins()))
    }

    fn login_events(n: usize) -> Vec<Event> {
        let base = Utc.with_ymd_and_hms(2023, 1, 1, 10, 0, 0).unwrap();
        (1..=n)
            .map(|i| {
                Event::new(
                    i.to_string(),
                    base + Duration::seconds(i as i64),
                    Level::Warn,
                    "auth",
                    "failed login for admin",
                )
                .with_metadata(EventMetadata::default().with(WatchedKey::Ip, "1.2.3.4"))
            })
            .collect()
    }

    #[test]
    fn empty_input_yields_sentinel() {
        let timeline = assembler().assemble("x.json", Vec::new());
        assert!(timeline.is_empty());
        assert_eq!(timeline.title, "Empty Timeline");
        assert_eq!(timeline.start_time, "");
        assert_eq!(timeline.end_time, "");
        assert!(timeline.summary.is_none());
        assert!(!timeline.id.is_empty());
    }

    #[test]
    fn brute_force_scenario_reports_findings() {
        let timeline = assembler().assemble("auth.json", login_events(4));
        let summary = timeline.summary.as_deref().unwrap();
        assert!(summary.starts_with("Analyzed 4 events across 1 clusters."));
        assert!(summary.contains("Findings: Rule Triggered: Potential Brute Force"));
        assert_eq!(timeline.findings.len(), 1);
        assert_eq!(timeline.title, "Incident Timeline - auth.json");
        assert_eq!(timeline.start_time, "2023-01-01T10:00:01Z");
        assert_eq!(timeline.end_time, "2023-01-01T10:00:04Z");
    }

    #[test]
    fn clean_run_omits_findings_marker() {
        let timeline = assembler().assemble("auth.json", login_events(3));
        let summary = timeline.summary.unwrap();
        assert_eq!(summary, "Analyzed 3 events across 1 clusters.");
        assert!(!summary.contains("Findings: "));
        assert!(timeline.findings.is_empty());
    }

    #[test]
    fn timeline_ids_are_fresh() {
        let a = assembler().assemble("a", login_events(1));
        let b = assembler().assemble("a", login_events(1));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn findings_are_joined_with_semicolons() {
        assert_eq!(
            render_summary(2, 1, &["A".to_owned(), "B".to_owned()]),
            "Analyzed 2 events across 1 clusters. Findings: A; B"
        );
    }

    #[test]
    fn custom_correlator_is_used() {
        struct Passthrough;
        impl Correlator for Passthrough {
            fn name(&self) -> &str {
                "passthrough"
            }
            fn correlate(&self, events: &[Event]) -> Vec<TimelineEvent> {
                events
                    .iter()
                    .map(|event| TimelineEvent {
                        event: event.clone(),
                        related_events: Vec::new(),
                        tags: Vec::new(),
                    })
                    .collect()
            }
        }

        let timeline = assembler()
            .with_correlator(Arc::new(Passthrough))
            .assemble("a", login_events(2));
        assert!(timeline.events.iter().all(|e| e.related_events.is_empty()));
        assert_eq!(timeline.cluster_count(), 0);
    }

    #[test]
    fn load_enforces_max_events() {
        let mut file = tempfile::Builder::new().suffix(".log").tempfile().unwrap();
        for i in 0..5 {
            writeln!(file, "2023-01-01T10:00:0{i}Z INFO line {i}").unwrap();
        }
        let config = AssemblerConfig {
            max_events: 4,
            ..AssemblerConfig::default()
        };
        let assembler = TimelineAssembler::new(config, Arc::new(RuleSet::empty()));
        let err = assembler.load(file.path()).unwrap_err();
        assert!(matches!(err, EngineError::TooManyEvents { max: 4, .. }));
    }

    #[test]
    fn unrepresentable_timeout_means_no_deadline() {
        let mut file = tempfile::Builder::new().suffix(".log").tempfile().unwrap();
        writeln!(file, "2023-01-01T10:00:00Z INFO single line").unwrap();
        let config = AssemblerConfig {
            read_timeout_secs: u64::MAX,
            ..AssemblerConfig::default()
        };
        let assembler = TimelineAssembler::new(config, Arc::new(RuleSet::empty()));

        let timeline = assembler.build(file.path()).unwrap();
        assert_eq!(timeline.events.len(), 1);
    }

    #[test]
    fn build_missing_file_is_input_not_found() {
        let err = assembler().build("/nonexistent/input.json").unwrap_err();
        assert!(matches!(err, EngineError::InputNotFound { .. }));
    }

    #[tokio::test]
    async fn build_async_matches_build() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        let json = serde_json::to_string(&login_events(4)).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let timeline = assembler().build_async(file.path()).await.unwrap();
        assert_eq!(timeline.events.len(), 4);
        assert!(timeline.has_findings());

        let events = assembler().load_async(file.path()).await.unwrap();
        assert_eq!(events.len(), 4);
    }
}
