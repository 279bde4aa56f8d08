//! 상관 분석 엔진 -- 시간 윈도우 내 캐스케이드 패턴 탐지
//!
//! # 동작
//! 1. 새 이벤트를 버퍼에 추가
//! 2. 워터마크(지금까지 본 최대 이벤트 시각) 기준으로 `watermark - window`보다
//!    오래된 이벤트를 제거
//! 3. 새 이벤트가 트리거인 패턴마다 버퍼에서 근본 원인 후보를 찾아 인시던트 생성
//!
//! 윈도우는 벽시계가 아닌 이벤트 시각 기준입니다. 과거 로그를 리플레이해도
//! 원래 시간 간격대로 상관 분석됩니다.
//!
//! 트리거 하나당 인시던트는 최대 하나이며, 후보가 여럿이면 가장 나중에
//! 버퍼링된 후보를 근본 원인으로 선택합니다. 이벤트 시각은 선택에 쓰지 않습니다.

pub mod pattern;

pub use pattern::{CascadePattern, MatchScope};

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use parking_lot::RwLock;
use tracing::{debug, info};

use emsight_core::event::{CanonicalEvent, Incident};
use emsight_core::metrics as m;

use crate::topology::TopologyStore;

#[derive(Debug, Default)]
struct WindowBuffer {
    events: VecDeque<Arc<CanonicalEvent>>,
    watermark: Option<NaiveDateTime>,
}

/// 캐스케이드 상관 분석 엔진
pub struct CorrelationEngine {
    window: chrono::Duration,
    patterns: Vec<CascadePattern>,
    topology: Arc<TopologyStore>,
    buffer: RwLock<WindowBuffer>,
}

impl CorrelationEngine {
    /// 기본 패턴으로 엔진을 생성합니다.
    pub fn new(window: Duration, topology: Arc<TopologyStore>) -> Self {
        Self::with_patterns(window, topology, CascadePattern::defaults())
    }

    /// 지정한 패턴으로 엔진을 생성합니다.
    pub fn with_patterns(
        window: Duration,
        topology: Arc<TopologyStore>,
        patterns: Vec<CascadePattern>,
    ) -> Self {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        debug!(
            window_secs = window.num_seconds(),
            patterns = patterns.len(),
            "correlation engine created"
        );
        Self {
            window,
            patterns,
            topology,
            buffer: RwLock::new(WindowBuffer::default()),
        }
    }

    /// 이벤트를 처리하고 탐지된 인시던트를 반환합니다.
    ///
    /// 가지치기 후 패턴을 평가합니다. 새 이벤트 자체가 윈도우 밖이면
    /// (워터마크보다 window 이상 과거) 버퍼에 남지 않고 매칭도 하지 않습니다.
    pub fn process(&self, event: Arc<CanonicalEvent>) -> Vec<Incident> {
        let mut buffer = self.buffer.write();

        buffer.events.push_back(Arc::clone(&event));
        let watermark = buffer
            .watermark
            .map_or(event.timestamp, |w| w.max(event.timestamp));
        buffer.watermark = Some(watermark);

        let cutoff = watermark
            .checked_sub_signed(self.window)
            .unwrap_or(NaiveDateTime::MIN);
        let before = buffer.events.len();
        buffer.events.retain(|e| e.timestamp >= cutoff);
        let pruned = before - buffer.events.len();
        metrics::gauge!(m::CORRELATION_BUFFER_SIZE).set(buffer.events.len() as f64);

        if pruned > 0 {
            debug!(pruned, buffered = buffer.events.len(), "pruned correlation window");
        }
        if event.timestamp < cutoff {
            debug!(
                event_name = %event.event_name,
                timestamp = %event.timestamp,
                "event older than correlation window, skipping match"
            );
            return Vec::new();
        }

        let mut incidents = Vec::new();
        for pattern in self.patterns.iter().filter(|p| p.is_trigger(&event)) {
            let root = buffer
                .events
                .iter()
                .rev()
                .find(|c| {
                    !Arc::ptr_eq(c, &event) && pattern.is_candidate(&event, c, &self.topology)
                });

            let Some(root) = root else { continue };

            let incident = Incident::new(
                pattern.name.clone(),
                pattern.describe(&event, root),
                pattern.severity,
                CanonicalEvent::clone(root),
                vec![CanonicalEvent::clone(&event)],
            );
            metrics::counter!(
                m::CORRELATION_INCIDENTS_TOTAL,
                m::LABEL_PATTERN => pattern.name.clone()
            )
            .increment(1);
            info!(
                incident_id = %incident.id,
                pattern = %incident.pattern,
                severity = %incident.severity,
                node = %event.node,
                root_cause = %root.event_name,
                "incident detected: {}",
                incident.description
            );
            incidents.push(incident);
        }
        incidents
    }

    /// 현재 버퍼 스냅샷 (버퍼링 순서)
    pub fn buffered(&self) -> Vec<Arc<CanonicalEvent>> {
        self.buffer.read().events.iter().cloned().collect()
    }

    /// 버퍼된 이벤트 수
    pub fn len(&self) -> usize {
        self.buffer.read().events.len()
    }

    /// 버퍼가 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.buffer.read().events.is_empty()
    }

    /// 현재 워터마크
    pub fn watermark(&self) -> Option<NaiveDateTime> {
        self.buffer.read().watermark
    }

    /// 등록된 패턴
    pub fn patterns(&self) -> &[CascadePattern] {
        &self.patterns
    }
}
