//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 파서, 정규화기, 토폴로지 저장소, 상관 분석/이상 탐지 단계가 공유하는
//! 데이터 구조를 정의합니다.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 정규화된 심각도
///
/// 벤더 심각도 어휘(EMERGENCY, ALERT, NOTICE 등)를 세 단계로 축약합니다.
/// `Ord` 구현으로 비교가 가능합니다 (`Info < Warn < Error`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// 정보성 이벤트
    #[default]
    Info,
    /// 경고
    Warn,
    /// 오류 -- 대응 필요
    Error,
}

impl Severity {
    /// 벤더 심각도 문자열을 정규화합니다.
    ///
    /// 대소문자를 구분하지 않으며, 알 수 없는 값은 `Info`로 취급합니다.
    pub fn from_vendor(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "EMERGENCY" | "ALERT" | "CRITICAL" | "ERROR" => Self::Error,
            "WARNING" | "WARN" => Self::Warn,
            _ => Self::Info,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// 이벤트가 속한 서브시스템
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subsystem {
    Storage,
    Network,
    System,
    Security,
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage => write!(f, "storage"),
            Self::Network => write!(f, "network"),
            Self::System => write!(f, "system"),
            Self::Security => write!(f, "security"),
        }
    }
}

/// 토폴로지 자산 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// 클러스터 노드
    Node,
    /// 애그리게이트 (RAID 그룹 집합)
    Aggregate,
    /// 볼륨
    Volume,
    /// 물리 디스크
    Disk,
    /// 논리 네트워크 인터페이스 (LIF)
    LogicalInterface,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node => write!(f, "node"),
            Self::Aggregate => write!(f, "aggr"),
            Self::Volume => write!(f, "volume"),
            Self::Disk => write!(f, "disk"),
            Self::LogicalInterface => write!(f, "lif"),
        }
    }
}

/// 기본 건강 점수
pub const DEFAULT_HEALTH_SCORE: f64 = 100.0;
/// 기본 상태 문자열
pub const DEFAULT_ASSET_STATUS: &str = "ok";

/// 발견된 토폴로지 자산
///
/// 토폴로지 저장소가 단독으로 소유하며, 외부에는 복제본만 전달됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// 고유 ID
    pub id: String,
    /// 자산 유형
    pub kind: AssetKind,
    /// 부모 자산 ID
    pub parent_id: Option<String>,
    /// 건강 점수 (0–100)
    pub health_score: f64,
    /// 상태 문자열
    pub status: String,
}

impl Asset {
    /// 기본 건강 점수/상태로 새 자산을 생성합니다.
    pub fn new(id: impl Into<String>, kind: AssetKind, parent_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            parent_id,
            health_score: DEFAULT_HEALTH_SCORE,
            status: DEFAULT_ASSET_STATUS.to_owned(),
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent_id {
            Some(parent) => write!(
                f,
                "{}:{} (parent={parent}, health={:.1}, status={})",
                self.kind, self.id, self.health_score, self.status
            ),
            None => write!(
                f,
                "{}:{} (health={:.1}, status={})",
                self.kind, self.id, self.health_score, self.status
            ),
        }
    }
}

/// 메시지에서 추출한 필드 값
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Text(String),
}

impl FieldValue {
    /// 정수 값이면 반환합니다.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    /// 문자열 값이면 반환합니다.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            Self::Int(_) => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

/// 이벤트별 추출 필드 (키 순서 고정)
pub type Fields = BTreeMap<String, FieldValue>;

/// 라인 파서의 출력 -- 한 번의 파이프라인 처리 동안만 유지됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericRecord {
    /// syslog PRI 값
    pub priority: u32,
    /// 연도를 추론하여 파싱한 타임스탬프
    pub timestamp: NaiveDateTime,
    /// 원본 타임스탬프 텍스트 (`Jan 22 10:54:47`)
    pub timestamp_text: String,
    /// 노드 식별자
    pub node: String,
    /// 이벤트 이름 (`disk.outOfService` 등)
    pub event_name: String,
    /// 벤더 심각도 원문
    pub severity: String,
    /// 메시지 본문
    pub message: String,
}

impl GenericRecord {
    /// 와이어 형식으로 다시 렌더링합니다.
    ///
    /// `<priority>TIMESTAMP [node:event:severity]: message`
    pub fn to_wire(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GenericRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}>{} [{}:{}:{}]: {}",
            self.priority,
            self.timestamp_text,
            self.node,
            self.event_name,
            self.severity,
            self.message
        )
    }
}

/// 인시던트 심각도
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum IncidentSeverity {
    Minor,
    Major,
    Critical,
}

impl fmt::Display for IncidentSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minor => write!(f, "MINOR"),
            Self::Major => write!(f, "MAJOR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// 피처 이름 (점수 계산기 입력 순서)
pub const FEATURE_NAMES: [&str; 6] = [
    "log_count",
    "error_count",
    "warning_count",
    "vol_full_events",
    "avg_latency",
    "unique_nodes",
];

/// 닫힌 시간 버킷 하나의 집계 피처
///
/// 모든 카운트는 0 이상이며, 지연시간 이벤트가 없으면 `avg_latency`는 0입니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowFeatures {
    /// 전체 이벤트 수
    pub log_count: u64,
    /// ERROR 이벤트 수
    pub error_count: u64,
    /// WARN 이벤트 수
    pub warning_count: u64,
    /// 고가치 이벤트 수 (기본: 볼륨 용량 이벤트)
    pub vol_full_events: u64,
    /// 평균 지연시간 (ms)
    pub avg_latency: f64,
    /// 관측된 고유 노드 수
    pub unique_nodes: u64,
}

impl WindowFeatures {
    /// [`FEATURE_NAMES`] 순서의 수치 벡터를 반환합니다.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_vector(&self) -> [f64; 6] {
        [
            self.log_count as f64,
            self.error_count as f64,
            self.warning_count as f64,
            self.vol_full_events as f64,
            self.avg_latency,
            self.unique_nodes as f64,
        ]
    }
}

impl fmt::Display for WindowFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "logs={} errors={} warnings={} vol_full={} avg_latency={:.1}ms nodes={}",
            self.log_count,
            self.error_count,
            self.warning_count,
            self.vol_full_events,
            self.avg_latency,
            self.unique_nodes
        )
    }
}
