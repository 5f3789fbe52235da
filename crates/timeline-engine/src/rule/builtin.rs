//! 내장 탐지 규칙

use std::collections::HashMap;

use incident_timeline_core::error::TimelineError;
use incident_timeline_core::pipeline::Rule;
use incident_timeline_core::types::{Event, WatchedKey};

/// 브루트포스 규칙 ID
pub const BRUTE_FORCE_RULE_ID: &str = "R-001";

/// 기본 임계값 -- 같은 IP에서 이 값을 초과하면 발동
pub const DEFAULT_BRUTE_FORCE_THRESHOLD: usize = 3;

/// 잠재적 브루트포스 탐지 규칙 (R-001)
///
/// 메시지에 `"failed login"`(대소문자 무시)이 포함되고 `ip` 메타데이터가 있는
/// 이벤트를 IP별로 세어, 어느 IP든 임계값을 **초과**하면 발동합니다.
#[derive(Debug, Clone)]
pub struct BruteForceRule {
    threshold: usize,
    description: String,
}

impl BruteForceRule {
    /// 임계값을 지정하여 규칙을 생성합니다.
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            description: format!("More than {threshold} failed logins from the same IP"),
        }
    }

    /// 임계값
    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

impl Default for BruteForceRule {
    fn default() -> Self {
        Self::new(DEFAULT_BRUTE_FORCE_THRESHOLD)
    }
}

impl Rule for BruteForceRule {
    fn id(&self) -> &str {
        BRUTE_FORCE_RULE_ID
    }

    fn name(&self) -> &str {
        "Potential Brute Force"
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn evaluate(&self, events: &[Event]) -> Result<bool, TimelineError> {
        let mut per_ip: HashMap<&str, usize> = HashMap::new();
        for event in events {
            let Some(ip) = event.metadata.get(WatchedKey::Ip) else {
                continue;
            };
            if event.message.to_lowercase().contains("failed login") {
                *per_ip.entry(ip).or_insert(0) += 1;
            }
        }
        Ok(per_ip.values().any(|&count| count > self.threshold))
    }
}
