//! 이벤트 시스템 -- 버스 토픽과 토픽별 메시지 타입
//!
//! 모든 단계 간 통신은 [`EventBus`](crate::bus::EventBus)를 통한 메시지 전달로 수행됩니다.
//! 토픽은 닫힌 열거형 [`Topic`]이며, 메시지 타입 [`BusMessage`]의 변형(variant)이
//! 곧 토픽을 결정하므로 토픽과 페이로드 형태가 어긋날 수 없습니다.
//!
//! ```text
//! log.raw -> event.canonical -> { event.incident, event.anomaly }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    FieldValue, Fields, GenericRecord, IncidentSeverity, Severity, Subsystem, WindowFeatures,
};

/// 최대 영향도
pub const MAX_IMPACT_LEVEL: u8 = 10;

/// 버스 토픽
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    /// 원시 로그 라인
    RawLog,
    /// 정규화된 이벤트
    CanonicalEvent,
    /// 상관 분석 인시던트
    Incident,
    /// 이상 탐지 결과
    Anomaly,
}

impl Topic {
    /// 토픽 이름 (로깅 및 메트릭 레이블에 사용)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RawLog => "log.raw",
            Self::CanonicalEvent => "event.canonical",
            Self::Incident => "event.incident",
            Self::Anomaly => "event.anomaly",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 수집된 원시 로그 라인
///
/// 로그 소스가 생성하고, 라인 파서가 소비합니다.
#[derive(Debug, Clone)]
pub struct RawLog {
    /// 앞뒤 공백이 제거된 라인
    pub line: String,
    /// 수집 소스 식별자 (예: "file:/var/log/ems.log", "inject")
    pub source: String,
    /// 수집 시각
    pub received_at: SystemTime,
}

impl RawLog {
    /// 새 RawLog를 생성합니다.
    pub fn new(line: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            source: source.into(),
            received_at: SystemTime::now(),
        }
    }
}

/// 정규화된 이벤트 -- 생성 후 불변
///
/// 파싱에 성공한 원시 라인마다 정확히 하나 생성되며, 상관 분석기와
/// 이상 탐지기가 `Arc`로 공유하여 읽기 전용으로 소비합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    /// 이벤트 시각 (이벤트 타임 윈도우의 기준)
    pub timestamp: NaiveDateTime,
    /// 원본 타임스탬프 텍스트
    pub timestamp_text: String,
    /// 노드 식별자
    pub node: String,
    /// 서브시스템
    pub subsystem: Subsystem,
    /// 이벤트 이름
    pub event_name: String,
    /// 정규화된 심각도
    pub severity: Severity,
    /// 영향도 (0–10, 10 = 서비스 중단)
    pub impact_level: u8,
    /// 원본 메시지
    pub raw_message: String,
    /// 주로 영향받는 자산 ID
    pub asset_id: Option<String>,
    /// 추출 필드
    pub fields: Fields,
}

impl CanonicalEvent {
    /// 레코드의 공통 필드를 가져와 이벤트를 생성합니다.
    ///
    /// 영향도는 [`MAX_IMPACT_LEVEL`]로 제한됩니다.
    pub fn from_record(
        record: &GenericRecord,
        subsystem: Subsystem,
        severity: Severity,
        impact_level: u8,
    ) -> Self {
        Self {
            timestamp: record.timestamp,
            timestamp_text: record.timestamp_text.clone(),
            node: record.node.clone(),
            subsystem,
            event_name: record.event_name.clone(),
            severity,
            impact_level: impact_level.min(MAX_IMPACT_LEVEL),
            raw_message: record.message.clone(),
            asset_id: None,
            fields: Fields::new(),
        }
    }

    /// 인식되지 않은 이벤트를 위한 일반 이벤트를 생성합니다.
    ///
    /// 서브시스템 `system`, 영향도 0, 빈 필드 맵.
    pub fn generic(record: &GenericRecord) -> Self {
        Self::from_record(
            record,
            Subsystem::System,
            Severity::from_vendor(&record.severity),
            0,
        )
    }

    /// 주 자산 ID를 설정합니다.
    pub fn with_asset(mut self, asset_id: impl Into<String>) -> Self {
        self.asset_id = Some(asset_id.into());
        self
    }

    /// 추출 필드를 추가합니다.
    pub fn with_field(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.to_owned(), value.into());
        self
    }

    /// 정수 필드를 조회합니다.
    pub fn field_i64(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(FieldValue::as_i64)
    }
}

impl fmt::Display for CanonicalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CanonicalEvent[{}] {} {} {} impact={} asset={}",
            self.timestamp_text,
            self.node,
            self.subsystem,
            self.event_name,
            self.impact_level,
            self.asset_id.as_deref().unwrap_or("-"),
        )
    }
}

/// 상관 분석 인시던트 -- 패턴 매칭마다 하나 생성, 이후 불변
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// 인시던트 ID
    pub id: String,
    /// 매칭된 패턴 이름
    pub pattern: String,
    /// 사람이 읽을 수 있는 설명
    pub description: String,
    /// 심각도
    pub severity: IncidentSeverity,
    /// 근본 원인 이벤트
    pub root_cause: CanonicalEvent,
    /// 관련(증상) 이벤트
    pub related: Vec<CanonicalEvent>,
    /// 탐지 시각
    pub detected_at: DateTime<Utc>,
}

impl Incident {
    /// 새 ID와 현재 시각으로 인시던트를 생성합니다.
    pub fn new(
        pattern: impl Into<String>,
        description: impl Into<String>,
        severity: IncidentSeverity,
        root_cause: CanonicalEvent,
        related: Vec<CanonicalEvent>,
    ) -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        Self {
            id: format!("INC-{}", &uuid[..12]),
            pattern: pattern.into(),
            description: description.into(),
            severity,
            root_cause,
            related,
            detected_at: Utc::now(),
        }
    }
}

impl fmt::Display for Incident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Incident[{}] pattern={} severity={} {}",
            self.id, self.pattern, self.severity, self.description
        )
    }
}

/// 이상 탐지 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEvent {
    /// 연속 이상 점수 (낮을수록 이상)
    pub score: f64,
    /// 생성된 설명
    pub explanation: String,
    /// 윈도우가 닫힌 시각
    pub timestamp: DateTime<Utc>,
    /// 피처 스냅샷
    pub features: WindowFeatures,
}

impl fmt::Display for AnomalyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Anomaly score={:.3} [{}] {}",
            self.score, self.explanation, self.features
        )
    }
}

/// 버스 메시지 -- 변형이 토픽을 결정합니다.
///
/// 페이로드는 `Arc`로 공유되어 여러 구독자가 복사 없이 읽을 수 있습니다.
#[derive(Debug, Clone)]
pub enum BusMessage {
    RawLog(Arc<RawLog>),
    Canonical(Arc<CanonicalEvent>),
    Incident(Arc<Incident>),
    Anomaly(Arc<AnomalyEvent>),
}

impl BusMessage {
    /// 메시지가 속한 토픽
    pub fn topic(&self) -> Topic {
        match self {
            Self::RawLog(_) => Topic::RawLog,
            Self::Canonical(_) => Topic::CanonicalEvent,
            Self::Incident(_) => Topic::Incident,
            Self::Anomaly(_) => Topic::Anomaly,
        }
    }
}

impl From<RawLog> for BusMessage {
    fn from(raw: RawLog) -> Self {
        Self::RawLog(Arc::new(raw))
    }
}

impl From<CanonicalEvent> for BusMessage {
    fn from(event: CanonicalEvent) -> Self {
        Self::Canonical(Arc::new(event))
    }
}

impl From<Incident> for BusMessage {
    fn from(incident: Incident) -> Self {
        Self::Incident(Arc::new(incident))
    }
}

impl From<AnomalyEvent> for BusMessage {
    fn from(anomaly: AnomalyEvent) -> Self {
        Self::Anomaly(Arc::new(anomaly))
    }
}
