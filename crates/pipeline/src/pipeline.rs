//! 파이프라인 조립 -- 버스, 토폴로지, 정규화기, 상관 분석, 이상 탐지를 연결합니다.
//!
//! [`IntelligencePipeline`]은 core의 [`Pipeline`] trait을 구현하여
//! `emsight-daemon`에서 start/stop/health_check 생명주기로 관리됩니다.
//!
//! # 내부 흐름
//! ```text
//! LogSource -> log.raw -> LineParser -> NormalizerChain -> event.canonical
//!                                                              |
//!                               +------------------------------+
//!                               |                              |
//!                      CorrelationEngine                AnomalyDetector
//!                               |                              |
//!                        event.incident                  event.anomaly
//! ```
//!
//! 모든 구독자는 발행 호출 스택 위에서 동기적으로 실행됩니다. 구독자는 버스를
//! `Weak`로만 잡으므로 버스와 구독자 사이에 순환 참조가 생기지 않습니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use emsight_core::bus::{EventBus, HandlerResult, SubscriptionId};
use emsight_core::config::EmsightConfig;
use emsight_core::error::{EmsightError, PipelineError};
use emsight_core::event::{AnomalyEvent, BusMessage, RawLog, Topic};
use emsight_core::pipeline::{HealthStatus, Pipeline, PipelineState, Scorer};

use crate::anomaly::AnomalyDetector;
use crate::correlation::{CascadePattern, CorrelationEngine};
use crate::normalize::NormalizerChain;
use crate::parser::LineParser;
use crate::source::{LogSource, SourceHandle};
use crate::topology::TopologyStore;

/// 이 영향도를 넘는 정규화 이벤트는 info 레벨로 기록합니다.
const NOTABLE_IMPACT: u8 = 5;

/// 주입/원시 라인의 소스 식별자
const INJECT_SOURCE: &str = "inject";

#[derive(Debug, Default)]
struct Counters {
    lines_received: AtomicU64,
    lines_dropped: AtomicU64,
    events_normalized: AtomicU64,
    incidents: AtomicU64,
    anomalies: AtomicU64,
}

/// 파이프라인 처리 통계 스냅샷
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// 수신한 원시 라인 수
    pub lines_received: u64,
    /// 형식 불일치로 버린 라인 수
    pub lines_dropped: u64,
    /// 정규화된 이벤트 수
    pub events_normalized: u64,
    /// 발행된 인시던트 수
    pub incidents: u64,
    /// 발행된 이상 이벤트 수
    pub anomalies: u64,
}

/// 스트리밍 인텔리전스 파이프라인
///
/// # 사용 예시
/// ```ignore
/// let mut pipeline = IntelligencePipelineBuilder::new()
///     .config(config)
///     .scorer(load_scorer(Some(path)).await)
///     .build()?;
///
/// pipeline.bus().subscribe(Topic::Incident, "alerting", |msg| { ... });
/// pipeline.start().await?;
/// ```
pub struct IntelligencePipeline {
    config: EmsightConfig,
    state: PipelineState,
    bus: Arc<EventBus>,
    topology: Arc<TopologyStore>,
    correlation: Arc<CorrelationEngine>,
    anomaly: Arc<AnomalyDetector>,
    counters: Arc<Counters>,
    subscriptions: Vec<SubscriptionId>,
    scorer_configured: bool,
    cancel: CancellationToken,
    source: Option<SourceHandle>,
}

impl IntelligencePipeline {
    /// 이벤트 버스
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// 토폴로지 저장소 (대시보드 등 외부 관찰자용)
    pub fn topology(&self) -> &Arc<TopologyStore> {
        &self.topology
    }

    /// 상관 분석 엔진
    pub fn correlation(&self) -> &Arc<CorrelationEngine> {
        &self.correlation
    }

    /// 이상 탐지 단계
    pub fn anomaly(&self) -> &Arc<AnomalyDetector> {
        &self.anomaly
    }

    /// 파이프라인 설정
    pub fn config(&self) -> &EmsightConfig {
        &self.config
    }

    /// 현재 상태
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// 처리 통계
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            lines_received: self.counters.lines_received.load(Ordering::Relaxed),
            lines_dropped: self.counters.lines_dropped.load(Ordering::Relaxed),
            events_normalized: self.counters.events_normalized.load(Ordering::Relaxed),
            incidents: self.counters.incidents.load(Ordering::Relaxed),
            anomalies: self.counters.anomalies.load(Ordering::Relaxed),
        }
    }

    /// 원시 라인 하나를 `log.raw` 토픽으로 직접 발행합니다.
    ///
    /// 하위 처리는 이 호출이 반환되기 전에 모두 끝납니다.
    pub fn inject(&self, line: &str) {
        self.bus.publish(RawLog::new(line, INJECT_SOURCE));
    }

    /// 현재 이상 탐지 윈도우를 즉시 닫고, 이상이면 `event.anomaly`로 발행합니다.
    pub fn flush_anomaly_window(&self) -> Option<Arc<AnomalyEvent>> {
        let anomaly = Arc::new(self.anomaly.flush(Utc::now())?);
        self.counters.anomalies.fetch_add(1, Ordering::Relaxed);
        self.bus.publish(BusMessage::Anomaly(Arc::clone(&anomaly)));
        Some(anomaly)
    }

    /// 로그 소스 태스크가 스스로 끝날 때까지 기다립니다 (replay 모드).
    ///
    /// 소스가 실행 중이 아니면 0을 반환합니다.
    pub async fn wait_source(&mut self) -> Result<u64, EmsightError> {
        match self.source.take() {
            Some(handle) => Ok(handle.wait().await?),
            None => Ok(0),
        }
    }

    /// 로그 소스 태스크가 끝났는지 여부
    pub fn source_finished(&self) -> bool {
        self.source.as_ref().is_none_or(SourceHandle::is_finished)
    }
}

impl Pipeline for IntelligencePipeline {
    async fn start(&mut self) -> Result<(), EmsightError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        info!(
            source = %self.config.ingestion.source_file,
            mode = %self.config.ingestion.mode,
            "starting intelligence pipeline"
        );

        self.cancel = CancellationToken::new();
        let source = LogSource::new(&self.config.ingestion);
        self.source = Some(source.spawn(Arc::clone(&self.bus), self.cancel.clone()));

        self.state = PipelineState::Running;
        info!("intelligence pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), EmsightError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping intelligence pipeline");

        if let Some(handle) = self.source.take() {
            match handle.stop(self.config.ingestion.stop_grace()).await {
                Ok(lines) => info!(lines, "log source stopped"),
                Err(e) => warn!(error = %e, "log source stopped with error"),
            }
        } else {
            self.cancel.cancel();
        }

        self.state = PipelineState::Stopped;
        let stats = self.stats();
        info!(
            lines = stats.lines_received,
            dropped = stats.lines_dropped,
            incidents = stats.incidents,
            anomalies = stats.anomalies,
            "intelligence pipeline stopped"
        );
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if self.scorer_configured && !self.anomaly.is_enabled() {
                    HealthStatus::Degraded("anomaly scorer disabled after failure".to_owned())
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Created => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

impl Drop for IntelligencePipeline {
    fn drop(&mut self) {
        self.cancel.cancel();
        for id in self.subscriptions.drain(..) {
            self.bus.unsubscribe(id);
        }
    }
}

/// 파이프라인 빌더
///
/// 구성 요소를 만들고 버스 구독을 연결합니다. 빌드 직후부터
/// [`IntelligencePipeline::inject`]로 라인을 처리할 수 있습니다.
pub struct IntelligencePipelineBuilder {
    config: EmsightConfig,
    scorer: Option<Arc<dyn Scorer>>,
    normalizers: Option<NormalizerChain>,
    patterns: Option<Vec<CascadePattern>>,
    bus: Option<Arc<EventBus>>,
}

impl IntelligencePipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: EmsightConfig::default(),
            scorer: None,
            normalizers: None,
            patterns: None,
            bus: None,
        }
    }

    /// 설정을 지정합니다.
    pub fn config(mut self, config: EmsightConfig) -> Self {
        self.config = config;
        self
    }

    /// 이상 점수 계산기를 지정합니다. `None`이면 이상 탐지가 비활성화됩니다.
    pub fn scorer(mut self, scorer: Option<Arc<dyn Scorer>>) -> Self {
        self.scorer = scorer;
        self
    }

    /// 정규화기 체인을 교체합니다 (기본: storage, network, hardware, security).
    pub fn normalizers(mut self, chain: NormalizerChain) -> Self {
        self.normalizers = Some(chain);
        self
    }

    /// 캐스케이드 패턴 목록을 교체합니다.
    pub fn patterns(mut self, patterns: Vec<CascadePattern>) -> Self {
        self.patterns = Some(patterns);
        self
    }

    /// 외부에서 만든 버스를 사용합니다.
    pub fn bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// 파이프라인을 빌드하고 구독을 연결합니다.
    pub fn build(self) -> Result<IntelligencePipeline, EmsightError> {
        self.config.validate()?;

        let bus = self.bus.unwrap_or_default();
        let topology = Arc::new(TopologyStore::new());
        let correlation = Arc::new(match self.patterns {
            Some(patterns) => CorrelationEngine::with_patterns(
                self.config.correlation.window(),
                Arc::clone(&topology),
                patterns,
            ),
            None => CorrelationEngine::new(self.config.correlation.window(), Arc::clone(&topology)),
        });
        let scorer_configured = self.scorer.is_some() && self.config.anomaly.enabled;
        let anomaly = Arc::new(AnomalyDetector::new(&self.config.anomaly, self.scorer));
        let normalizers = Arc::new(self.normalizers.unwrap_or_default());
        let counters = Arc::new(Counters::default());

        let subscriptions = vec![
            subscribe_normalizer(&bus, normalizers, Arc::clone(&topology), Arc::clone(&counters)),
            subscribe_correlation(&bus, Arc::clone(&correlation), Arc::clone(&counters)),
            subscribe_anomaly(&bus, Arc::clone(&anomaly), Arc::clone(&counters)),
        ];

        info!(
            correlation_window_secs = self.config.correlation.window_secs,
            patterns = correlation.patterns().len(),
            anomaly_enabled = anomaly.is_enabled(),
            "intelligence pipeline built"
        );

        Ok(IntelligencePipeline {
            config: self.config,
            state: PipelineState::Created,
            bus,
            topology,
            correlation,
            anomaly,
            counters,
            subscriptions,
            scorer_configured,
            cancel: CancellationToken::new(),
            source: None,
        })
    }
}

impl Default for IntelligencePipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `log.raw` -> 파싱 -> 정규화 -> `event.canonical`
fn subscribe_normalizer(
    bus: &Arc<EventBus>,
    chain: Arc<NormalizerChain>,
    topology: Arc<TopologyStore>,
    counters: Arc<Counters>,
) -> SubscriptionId {
    let weak: Weak<EventBus> = Arc::downgrade(bus);
    let parser = LineParser::new();

    bus.subscribe(Topic::RawLog, "normalizer", move |msg| -> HandlerResult {
        let BusMessage::RawLog(raw) = msg else {
            return Ok(());
        };
        counters.lines_received.fetch_add(1, Ordering::Relaxed);

        let Some(record) = parser.parse(&raw.line) else {
            counters.lines_dropped.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        };

        let event = chain.normalize(&record, &topology);
        counters.events_normalized.fetch_add(1, Ordering::Relaxed);
        if event.impact_level > NOTABLE_IMPACT {
            info!(
                node = %event.node,
                event_name = %event.event_name,
                impact = event.impact_level,
                asset = event.asset_id.as_deref().unwrap_or("-"),
                "high impact event"
            );
        }

        if let Some(bus) = weak.upgrade() {
            bus.publish(event);
        }
        Ok(())
    })
}

/// `event.canonical` -> 상관 분석 -> `event.incident`
fn subscribe_correlation(
    bus: &Arc<EventBus>,
    engine: Arc<CorrelationEngine>,
    counters: Arc<Counters>,
) -> SubscriptionId {
    let weak = Arc::downgrade(bus);

    bus.subscribe(Topic::CanonicalEvent, "correlation", move |msg| -> HandlerResult {
        let BusMessage::Canonical(event) = msg else {
            return Ok(());
        };
        let incidents = engine.process(Arc::clone(event));
        if incidents.is_empty() {
            return Ok(());
        }
        let Some(bus) = weak.upgrade() else {
            return Ok(());
        };
        for incident in incidents {
            counters.incidents.fetch_add(1, Ordering::Relaxed);
            bus.publish(incident);
        }
        Ok(())
    })
}

/// `event.canonical` -> 윈도우 집계/점수 -> `event.anomaly`
fn subscribe_anomaly(
    bus: &Arc<EventBus>,
    detector: Arc<AnomalyDetector>,
    counters: Arc<Counters>,
) -> SubscriptionId {
    let weak = Arc::downgrade(bus);

    bus.subscribe(Topic::CanonicalEvent, "anomaly", move |msg| -> HandlerResult {
        let BusMessage::Canonical(event) = msg else {
            return Ok(());
        };
        let Some(anomaly) = detector.observe_now(Arc::clone(event)) else {
            return Ok(());
        };
        counters.anomalies.fetch_add(1, Ordering::Relaxed);
        if let Some(bus) = weak.upgrade() {
            bus.publish(anomaly);
        }
        Ok(())
    })
}
