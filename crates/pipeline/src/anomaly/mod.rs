//! 이상 탐지 -- 시간 윈도우 집계와 점수 계산
//!
//! [`AnomalyDetector`]는 정규화된 이벤트를 누적하다가 윈도우 폭(기본 10초)이
//! 지나면 버퍼를 [`WindowFeatures`] 한 행으로 집계하고 점수 계산기에 넘깁니다.
//! 이상으로 분류되면 설명과 함께 [`AnomalyEvent`]를 반환합니다.
//!
//! # 윈도우 시계
//! 벽시계 기준이며 이벤트 도착 시점에 평가합니다. 윈도우는 첫 이벤트 도착 시 열리고,
//! 닫힐 때마다 닫힌 시각에서 다음 윈도우가 시작되므로 겹치지 않습니다.
//!
//! # 점수 계산기 부재/장애
//! 점수 계산기가 없으면 이 단계 전체가 비활성화됩니다. 실행 중 점수 계산이
//! 실패하면 에러를 남기고 남은 실행 동안 비활성화합니다.

pub mod features;
pub mod scorer;

pub use features::aggregate;
pub use scorer::{BaselineScorer, FeatureBaseline, load_scorer};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info};

use emsight_core::config::AnomalyConfig;
use emsight_core::event::{AnomalyEvent, CanonicalEvent};
use emsight_core::metrics as m;
use emsight_core::pipeline::Scorer;
use emsight_core::types::WindowFeatures;

/// 임계값 검사에 걸리지 않았을 때의 설명
pub const UNKNOWN_DEVIATION: &str = "Unknown deviation from baseline";

#[derive(Default)]
struct WindowState {
    buffer: Vec<Arc<CanonicalEvent>>,
    window_started: Option<DateTime<Utc>>,
}

/// 윈도우 집계 + 이상 점수 계산 단계
pub struct AnomalyDetector {
    width: chrono::Duration,
    high_value_event: String,
    high_value_label: String,
    error_threshold: u64,
    latency_threshold_ms: f64,
    scorer: RwLock<Option<Arc<dyn Scorer>>>,
    state: Mutex<WindowState>,
}

impl AnomalyDetector {
    /// 설정과 점수 계산기로 생성합니다.
    ///
    /// `config.enabled`가 false이면 점수 계산기가 있어도 비활성 상태로 시작합니다.
    pub fn new(config: &AnomalyConfig, scorer: Option<Arc<dyn Scorer>>) -> Self {
        let scorer = scorer.filter(|_| config.enabled);
        if scorer.is_none() {
            info!("anomaly detection disabled (no scorer)");
        }
        Self {
            width: to_chrono(config.window()),
            high_value_event: config.high_value_event.clone(),
            high_value_label: config.high_value_label.clone(),
            error_threshold: config.error_threshold,
            latency_threshold_ms: config.latency_threshold_ms,
            scorer: RwLock::new(scorer),
            state: Mutex::new(WindowState::default()),
        }
    }

    /// 점수 계산기가 활성 상태인지 여부
    pub fn is_enabled(&self) -> bool {
        self.scorer.read().is_some()
    }

    /// 윈도우 폭
    pub fn window(&self) -> Duration {
        self.width.to_std().unwrap_or_default()
    }

    /// 현재 윈도우에 누적된 이벤트 수
    pub fn pending(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// 현재 시각으로 이벤트를 관측합니다.
    pub fn observe_now(&self, event: Arc<CanonicalEvent>) -> Option<AnomalyEvent> {
        self.observe(event, Utc::now())
    }

    /// 이벤트를 누적하고, 윈도우가 닫히면 점수를 계산합니다.
    pub fn observe(&self, event: Arc<CanonicalEvent>, now: DateTime<Utc>) -> Option<AnomalyEvent> {
        let scorer = self.scorer.read().clone()?;

        let closed = {
            let mut state = self.state.lock();
            state.buffer.push(event);
            let started = *state.window_started.get_or_insert(now);
            if now - started < self.width {
                return None;
            }
            state.window_started = Some(now);
            std::mem::take(&mut state.buffer)
        };

        self.close_window(scorer.as_ref(), &closed, now)
    }

    /// 폭에 도달하지 않았더라도 현재 윈도우를 닫습니다 (리플레이 종료 시).
    pub fn flush(&self, now: DateTime<Utc>) -> Option<AnomalyEvent> {
        let scorer = self.scorer.read().clone()?;
        let closed = {
            let mut state = self.state.lock();
            state.window_started = Some(now);
            std::mem::take(&mut state.buffer)
        };
        self.close_window(scorer.as_ref(), &closed, now)
    }

    fn close_window(
        &self,
        scorer: &dyn Scorer,
        events: &[Arc<CanonicalEvent>],
        now: DateTime<Utc>,
    ) -> Option<AnomalyEvent> {
        if events.is_empty() {
            return None;
        }

        let features = aggregate(events, &self.high_value_event);
        metrics::counter!(m::ANOMALY_WINDOWS_CLOSED_TOTAL).increment(1);

        let outcome = match scorer.score(&features) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    scorer = scorer.name(),
                    error = %e,
                    features = %features,
                    "scorer failed, disabling anomaly detection"
                );
                self.scorer.write().take();
                return None;
            }
        };

        debug!(
            score = outcome.score,
            classification = ?outcome.classification,
            features = %features,
            "window scored"
        );

        if !outcome.is_anomalous() {
            return None;
        }

        let explanation = self.explain(&features);
        metrics::counter!(m::ANOMALY_EVENTS_TOTAL).increment(1);
        info!(score = outcome.score, explanation = %explanation, "anomaly detected");

        Some(AnomalyEvent {
            score: outcome.score,
            explanation,
            timestamp: now,
            features,
        })
    }

    /// 피처 행에 임계값 검사를 적용해 설명을 만듭니다.
    pub fn explain(&self, features: &WindowFeatures) -> String {
        let mut reasons = Vec::new();
        if features.error_count > self.error_threshold {
            reasons.push(format!("High Error Rate ({})", features.error_count));
        }
        if features.avg_latency > self.latency_threshold_ms {
            reasons.push(format!("High Latency ({:.1}ms)", features.avg_latency));
        }
        if features.vol_full_events > 0 {
            reasons.push(format!(
                "{} ({})",
                self.high_value_label, features.vol_full_events
            ));
        }

        if reasons.is_empty() {
            UNKNOWN_DEVIATION.to_owned()
        } else {
            reasons.join(", ")
        }
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use emsight_core::error::ScorerError;
    use emsight_core::pipeline::{Classification, ScoreOutcome};
    use emsight_core::types::{GenericRecord, Severity, Subsystem};

    struct FixedScorer(Classification);

    impl Scorer for FixedScorer {
        fn name(&self) -> &str {
            "fixed"
        }

        fn score(&self, _features: &WindowFeatures) -> Result<ScoreOutcome, ScorerError> {
            Ok(ScoreOutcome {
                score: -0.25,
                classification: self.0,
            })
        }
    }

    struct FailingScorer;

    impl Scorer for FailingScorer {
        fn name(&self) -> &str {
            "failing"
        }

        fn score(&self, _features: &WindowFeatures) -> Result<ScoreOutcome, ScorerError> {
            Err(ScorerError::ScoringFailed("model exploded".to_owned()))
        }
    }

    fn event(name: &str, severity: Severity) -> Arc<CanonicalEvent> {
        let record = GenericRecord {
            priority: 131,
            timestamp: NaiveDate::from_ymd_opt(2026, 1, 22)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            timestamp_text: "Jan 22 12:00:00".to_owned(),
            node: "n1".to_owned(),
            event_name: name.to_owned(),
            severity: severity.to_string(),
            message: String::new(),
        };
        Arc::new(CanonicalEvent::from_record(
            &record,
            Subsystem::Storage,
            severity,
            1,
        ))
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    fn detector(scorer: Option<Arc<dyn Scorer>>) -> AnomalyDetector {
        AnomalyDetector::new(&AnomalyConfig::default(), scorer)
    }

    #[test]
    fn no_scorer_disables_stage() {
        let detector = detector(None);
        assert!(!detector.is_enabled());
        assert!(detector.observe(event("x", Severity::Error), t0()).is_none());
        assert!(detector
            .observe(event("x", Severity::Error), t0() + secs(20))
            .is_none());
        assert_eq!(detector.pending(), 0);
    }

    #[test]
    fn disabled_in_config_ignores_scorer() {
        let config = AnomalyConfig {
            enabled: false,
            ..AnomalyConfig::default()
        };
        let detector = AnomalyDetector::new(
            &config,
            Some(Arc::new(FixedScorer(Classification::Anomalous))),
        );
        assert!(!detector.is_enabled());
    }

    #[test]
    fn window_closes_after_width() {
        let detector = detector(Some(Arc::new(FixedScorer(Classification::Anomalous))));
        assert!(detector.observe(event("a", Severity::Error), t0()).is_none());
        assert!(detector
            .observe(event("b", Severity::Error), t0() + secs(5))
            .is_none());
        assert_eq!(detector.pending(), 2);

        let anomaly = detector
            .observe(event("c", Severity::Error), t0() + secs(10))
            .unwrap();
        assert_eq!(anomaly.features.log_count, 3);
        assert_eq!(anomaly.features.error_count, 3);
        assert_eq!(anomaly.score, -0.25);
        assert_eq!(anomaly.timestamp, t0() + secs(10));
        assert_eq!(detector.pending(), 0);
    }

    #[test]
    fn windows_do_not_overlap() {
        let detector = detector(Some(Arc::new(FixedScorer(Classification::Anomalous))));
        detector.observe(event("a", Severity::Info), t0());
        assert!(detector
            .observe(event("b", Severity::Info), t0() + secs(10))
            .is_some());
        // 새 윈도우는 t0+10에서 시작
        assert!(detector
            .observe(event("c", Severity::Info), t0() + secs(15))
            .is_none());
        let anomaly = detector
            .observe(event("d", Severity::Info), t0() + secs(20))
            .unwrap();
        assert_eq!(anomaly.features.log_count, 2);
    }

    #[test]
    fn normal_window_emits_nothing() {
        let detector = detector(Some(Arc::new(FixedScorer(Classification::Normal))));
        detector.observe(event("a", Severity::Info), t0());
        assert!(detector
            .observe(event("b", Severity::Info), t0() + secs(10))
            .is_none());
        assert_eq!(detector.pending(), 0);
        assert!(detector.is_enabled());
    }

    #[test]
    fn scorer_failure_disables_for_rest_of_run() {
        let detector = detector(Some(Arc::new(FailingScorer)));
        detector.observe(event("a", Severity::Info), t0());
        assert!(detector
            .observe(event("b", Severity::Info), t0() + secs(10))
            .is_none());
        assert!(!detector.is_enabled());
        assert!(detector
            .observe(event("c", Severity::Info), t0() + secs(30))
            .is_none());
    }

    #[test]
    fn flush_closes_partial_window() {
        let detector = detector(Some(Arc::new(FixedScorer(Classification::Anomalous))));
        detector.observe(event("a", Severity::Warn), t0());
        let anomaly = detector.flush(t0() + secs(1)).unwrap();
        assert_eq!(anomaly.features.warning_count, 1);
        assert!(detector.flush(t0() + secs(2)).is_none());
    }

    #[test]
    fn explanation_lists_threshold_breaches() {
        let detector = detector(None);
        let features = WindowFeatures {
            log_count: 10,
            error_count: 3,
            avg_latency: 72.5,
            vol_full_events: 2,
            ..WindowFeatures::default()
        };
        assert_eq!(
            detector.explain(&features),
            "High Error Rate (3), High Latency (72.5ms), Volume Capacity Events (2)"
        );
    }

    #[test]
    fn explanation_thresholds_are_strict() {
        let detector = detector(None);
        let features = WindowFeatures {
            error_count: 2,
            avg_latency: 50.0,
            ..WindowFeatures::default()
        };
        assert_eq!(detector.explain(&features), UNKNOWN_DEVIATION);
    }
}
