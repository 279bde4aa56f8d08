//! emsight 공통 크레이트 -- 타입, 이벤트 버스, trait, 에러, 설정
//!
//! 파이프라인의 모든 단계(수집, 파싱, 정규화, 상관 분석, 이상 탐지)가
//! 공유하는 데이터 구조와 모듈 간 통신 수단을 정의합니다.
//!
//! # 모듈 구성
//!
//! - [`bus`]: 토픽 기반 동기 publish/subscribe 라우터
//! - [`event`]: 버스 토픽과 메시지(원시 로그, 정규화 이벤트, 인시던트, 이상 이벤트)
//! - [`types`]: 도메인 타입 (심각도, 서브시스템, 자산, 윈도우 피처 등)
//! - [`pipeline`]: 생명주기 trait과 이상 점수 계산기(Scorer) trait
//! - [`config`]: `emsight.toml` 파싱 및 런타임 설정
//! - [`error`]: 에러 타입
//! - [`metrics`]: 메트릭 이름 상수

pub mod bus;
pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, EmsightError, PipelineError, ScorerError};

// 설정
pub use config::EmsightConfig;

// 이벤트 버스
pub use bus::{DeliveryReport, EventBus, HandlerResult, SubscriptionId};

// 이벤트
pub use event::{AnomalyEvent, BusMessage, CanonicalEvent, Incident, RawLog, Topic};

// 파이프라인 trait
pub use pipeline::{Classification, HealthStatus, Pipeline, PipelineState, ScoreOutcome, Scorer};

// 도메인 타입
pub use types::{
    Asset, AssetKind, FieldValue, Fields, GenericRecord, IncidentSeverity, Severity, Subsystem,
    WindowFeatures,
};
