//! 윈도우 특징 집계

use std::collections::HashSet;
use std::sync::Arc;

use emsight_core::event::CanonicalEvent;
use emsight_core::types::{Severity, WindowFeatures};

/// 지연시간 필드 이름 (정규화기가 `latency`로 추출)
pub const LATENCY_FIELD: &str = "latency";

/// 닫힌 윈도우의 이벤트를 특징 행 하나로 집계합니다.
///
/// 평균 지연시간은 `latency` 필드를 가진 이벤트만으로 계산하며,
/// 그런 이벤트가 없으면 0입니다.
pub fn aggregate(events: &[Arc<CanonicalEvent>], high_value_event: &str) -> WindowFeatures {
    let mut features = WindowFeatures {
        log_count: events.len() as u64,
        ..WindowFeatures::default()
    };

    let mut latency_sum = 0.0;
    let mut latency_samples = 0u64;
    let mut nodes = HashSet::new();

    for event in events {
        match event.severity {
            Severity::Error => features.error_count += 1,
            Severity::Warn => features.warning_count += 1,
            Severity::Info => {}
        }
        if event.event_name == high_value_event {
            features.vol_full_events += 1;
        }
        if let Some(latency) = event.field_i64(LATENCY_FIELD) {
            latency_sum += latency as f64;
            latency_samples += 1;
        }
        nodes.insert(event.node.as_str());
    }

    if latency_samples > 0 {
        features.avg_latency = latency_sum / latency_samples as f64;
    }
    features.unique_nodes = nodes.len() as u64;
    features
}
