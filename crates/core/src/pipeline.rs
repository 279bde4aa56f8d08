//! 파이프라인 trait -- 생명주기와 확장 포인트 정의
//!
//! - [`Pipeline`]: 시작/정지/상태 확인 생명주기
//! - [`Scorer`]: 외부에서 학습된 이상 점수 계산기를 주입하기 위한 trait
//!
//! # 생명주기
//! ```text
//! Created → start() → Running → stop() → Stopped
//! ```

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::{EmsightError, ScorerError};
use crate::types::WindowFeatures;

/// 파이프라인 생명주기 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    /// 생성됨 (start 전)
    Created,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// 컴포넌트 건강 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 일부 기능 제한 (예: 점수 계산기 비활성화)
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 여부
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 여부
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 시작/정지 가능한 파이프라인
///
/// # 구현 예시
/// ```ignore
/// impl Pipeline for MyPipeline {
///     async fn start(&mut self) -> Result<(), EmsightError> { Ok(()) }
///     async fn stop(&mut self) -> Result<(), EmsightError> { Ok(()) }
///     async fn health_check(&self) -> HealthStatus { HealthStatus::Healthy }
/// }
/// ```
pub trait Pipeline: Send {
    /// 파이프라인을 시작합니다.
    ///
    /// 이미 실행 중이면 `PipelineError::AlreadyRunning`을 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), EmsightError>> + Send;

    /// 파이프라인을 정지합니다.
    ///
    /// 수집 태스크에 정지 신호를 보내고 유예 시간 내 종료를 기다립니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), EmsightError>> + Send;

    /// 건강 상태를 확인합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// 점수 계산기의 이진 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Normal,
    Anomalous,
}

/// 점수 계산 결과
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    /// 연속 이상 점수 (낮을수록 이상)
    pub score: f64,
    /// 분류
    pub classification: Classification,
}

impl ScoreOutcome {
    /// 이상으로 분류되었는지 여부
    pub fn is_anomalous(&self) -> bool {
        self.classification == Classification::Anomalous
    }
}

/// 이상 점수 계산기
///
/// 오프라인에서 학습된 모델을 읽기 전용으로 감쌉니다. 파이프라인은 모델의 내부 표현에
/// 의존하지 않으며, 닫힌 윈도우 하나당 한 번 `score`를 호출합니다.
pub trait Scorer: Send + Sync {
    /// 계산기 이름 (로깅용)
    fn name(&self) -> &str;

    /// 피처 행 하나의 점수를 계산합니다.
    fn score(&self, features: &WindowFeatures) -> Result<ScoreOutcome, ScorerError>;
}
