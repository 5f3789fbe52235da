//! 규칙 파일 로더 -- YAML 규칙 파일을 디스크에서 로드합니다.
//!
//! 규칙 디렉토리 내의 `.yml`/`.yaml` 파일을 스캔하고 파싱합니다.
//! 개별 파일 파싱 실패는 경고 로그를 남기고 건너뜁니다.
//! 파일은 경로 순으로 로드되므로 규칙 등록 순서는 결정적입니다.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::EngineError;

use super::types::DetectionRule;

/// 규칙 파일 로더 설정
const MAX_RULE_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB
const MAX_RULES_COUNT: usize = 10_000;

/// 디렉토리 검증 결과
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// 유효한 규칙
    pub valid: Vec<(PathBuf, DetectionRule)>,
    /// 실패한 파일과 사유
    pub invalid: Vec<(PathBuf, String)>,
}

/// 규칙 파일 로더
pub struct RuleLoader;

impl RuleLoader {
    /// 디렉토리에서 모든 YAML 규칙 파일을 로드합니다.
    ///
    /// `.yml` 또는 `.yaml` 확장자를 가진 파일만 처리합니다.
    /// 개별 파일 로딩 실패와 중복 ID는 경고 로그를 남기고 건너뜁니다.
    ///
    /// # Errors
    /// - 디렉토리를 읽을 수 없는 경우
    /// - 규칙 수가 `MAX_RULES_COUNT`를 초과하는 경우
    pub async fn load_directory(
        dir: impl AsRef<Path>,
    ) -> Result<Vec<DetectionRule>, EngineError> {
        let dir = dir.as_ref();
        let mut rules = Vec::new();
        let mut seen_ids = HashSet::new();

        for path in Self::yaml_files(dir).await? {
            match Self::load_file(&path).await {
                Ok(rule) => {
                    if !seen_ids.insert(rule.id.clone()) {
                        tracing::warn!(
                            rule_id = %rule.id,
                            path = %path.display(),
                            "duplicate rule id, skipping"
                        );
                        continue;
                    }
                    rules.push(rule);
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to load rule file, skipping"
                    );
                }
            }

            if rules.len() > MAX_RULES_COUNT {
                return Err(EngineError::RuleLoad {
                    path: dir.display().to_string(),
                    reason: format!("too many rules: max {MAX_RULES_COUNT}"),
                });
            }
        }

        tracing::info!(
            dir = %dir.display(),
            count = rules.len(),
            "loaded detection rules"
        );

        Ok(rules)
    }

    /// 디렉토리의 모든 규칙 파일을 검증하고 파일별 결과를 반환합니다.
    ///
    /// `load_directory`와 달리 실패한 파일도 결과에 포함하며, 중복 ID도 실패로 보고합니다.
    pub async fn validate_directory(
        dir: impl AsRef<Path>,
    ) -> Result<ValidationReport, EngineError> {
        let mut report = ValidationReport::default();
        let mut seen_ids = HashSet::new();

        for path in Self::yaml_files(dir.as_ref()).await? {
            match Self::load_file(&path).await {
                Ok(rule) if !seen_ids.insert(rule.id.clone()) => {
                    report
                        .invalid
                        .push((path, format!("duplicate rule id '{}'", rule.id)));
                }
                Ok(rule) => report.valid.push((path, rule)),
                Err(e) => report.invalid.push((path, e.to_string())),
            }
        }

        Ok(report)
    }

    /// 디렉토리의 `.yml`/`.yaml` 파일을 경로 순으로 나열합니다.
    async fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| EngineError::RuleLoad {
                path: dir.display().to_string(),
                reason: format!("failed to read directory: {e}"),
            })?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| EngineError::RuleLoad {
                path: dir.display().to_string(),
                reason: format!("failed to read directory entry: {e}"),
            })?
        {
            let path = entry.path();
            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml");
            if is_yaml {
                paths.push(path);
            }
        }

        paths.sort();
        Ok(paths)
    }

    /// 단일 YAML 파일에서 규칙을 로드합니다.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<DetectionRule, EngineError> {
        let path = path.as_ref();

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| EngineError::RuleLoad {
                path: path.display().to_string(),
                reason: format!("failed to read file metadata: {e}"),
            })?;

        if metadata.len() > MAX_RULE_FILE_SIZE {
            return Err(EngineError::RuleLoad {
                path: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_RULE_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| EngineError::RuleLoad {
                path: path.display().to_string(),
                reason: format!("failed to read file: {e}"),
            })?;

        Self::parse_yaml(&content, &path.display().to_string())
    }

    /// YAML 문자열을 파싱하여 규칙을 생성합니다.
    ///
    /// 정규식 조건은 여기서 컴파일 검증까지 수행합니다.
    pub fn parse_yaml(yaml_str: &str, source: &str) -> Result<DetectionRule, EngineError> {
        let rule: DetectionRule =
            serde_yaml::from_str(yaml_str).map_err(|e| EngineError::RuleLoad {
                path: source.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;

        rule.validate()?;
        super::matcher::RuleMatcher::compile(&rule)?;

        Ok(rule)
    }
}
