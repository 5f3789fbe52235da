//! 파이프라인 trait -- 모듈 확장 포인트 정의

use crate::error::TimelineError;
use crate::types::{Event, TimelineEvent};

/// 이벤트 상관 분석 trait
///
/// 전체 이벤트 집합을 받아 관련 이벤트가 연결된 `TimelineEvent` 목록을 반환합니다.
/// 결과는 타임스탬프 오름차순이어야 하며, 입력 이벤트 수와 출력 수가 같아야 합니다.
pub trait Correlator: Send + Sync {
    /// 상관 분석기 이름
    fn name(&self) -> &str;

    /// 이벤트 집합을 상관 분석
    fn correlate(&self, events: &[Event]) -> Vec<TimelineEvent>;
}

/// 탐지 규칙 trait
///
/// 새로운 탐지 규칙을 추가하려면 이 trait을 구현합니다.
/// `evaluate`는 순수 함수여야 합니다. 외부 상태를 읽거나 쓰지 않고,
/// 이벤트 순서에 따라 결과가 달라지지 않아야 합니다.
pub trait Rule: Send + Sync {
    /// 규칙 고유 ID
    fn id(&self) -> &str;

    /// 규칙 이름 (finding 문자열에 표시)
    fn name(&self) -> &str;

    /// 규칙 설명
    fn description(&self) -> &str;

    /// 전체 이벤트 집합에 대해 규칙 발동 여부를 판단
    fn evaluate(&self, events: &[Event]) -> Result<bool, TimelineError>;
}
