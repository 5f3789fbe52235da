#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`normalizer`]: 파일 확장자로 방언(JSON/텍스트)을 선택하고 이벤트를 지연 생성
//! - [`correlator`]: 이벤트-엔티티 이분 그래프와 BFS 연결 요소
//! - [`rule`]: 불변 규칙 집합, 내장 규칙, YAML 규칙 로더/매처
//! - [`assembler`]: 정규화 → 상관 분석 + 규칙 평가 → 타임라인
//! - [`summary`]: 타임라인 기반 사고 요약
//! - [`config`]: 엔진 설정 (core 설정에서 파생)
//! - [`error`]: 도메인 에러 타입

pub mod assembler;
pub mod config;
pub mod correlator;
pub mod error;
pub mod normalizer;
pub mod rule;
pub mod summary;

// --- 주요 타입 re-export ---

// 조립기
pub use assembler::TimelineAssembler;

// 설정
pub use config::AssemblerConfig;

// 에러
pub use error::EngineError;

// 정규화
pub use normalizer::{Dialect, EventStream, Normalizer};

// 상관 분석
pub use correlator::{Component, EntityGraph, GraphCorrelator};

// 규칙
pub use rule::{BruteForceRule, DetectionRule, RuleLoader, RuleSet, RuleSetBuilder};

// 요약
pub use summary::IncidentReport;
