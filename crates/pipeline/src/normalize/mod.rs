//! 도메인 정규화 -- GenericRecord를 CanonicalEvent로 변환
//!
//! 각 [`Normalizer`]는 자신이 인식하는 이벤트 이름 집합을 선언하고, 메시지 본문에서
//! 정규식으로 타입 필드를 추출합니다. 부수 효과로 발견한 자산과 부모 관계를
//! [`TopologyStore`]에 선언합니다.
//!
//! # 디스패치
//! [`NormalizerChain`]은 고정된 우선순위(storage → network → hardware → security)로
//! 정규화기를 시도하며, 이벤트 이름을 인식하는 첫 정규화기가 단독으로 처리합니다.
//! 아무도 인식하지 못하면 일반 이벤트(`system`, 영향도 0, 빈 필드)를 만듭니다.
//! 이 단계에서는 어떤 레코드도 버려지지 않습니다.
//!
//! # 추출 실패
//! 정규식이 맞지 않으면 해당 필드만 [`UNKNOWN`] 또는 0으로 대체합니다.
//! [`UNKNOWN`] 자산 ID는 토폴로지에 선언하지 않습니다.

pub mod hardware;
pub mod network;
pub mod security;
pub mod storage;

pub use hardware::HardwareNormalizer;
pub use network::NetworkNormalizer;
pub use security::SecurityNormalizer;
pub use storage::StorageNormalizer;

use regex::{Captures, Regex};
use tracing::trace;

use emsight_core::event::CanonicalEvent;
use emsight_core::metrics as m;
use emsight_core::types::{AssetKind, GenericRecord};

use crate::topology::TopologyStore;

/// 추출 실패 시 사용하는 문자열 자리표시자
pub const UNKNOWN: &str = "unknown";

/// 이벤트 이름 기반 정규화기
pub trait Normalizer: Send + Sync {
    /// 정규화기 이름 (로깅 및 메트릭 레이블)
    fn name(&self) -> &str;

    /// 인식하는 이벤트 이름 목록
    fn event_names(&self) -> &[&'static str];

    /// 이벤트 이름을 인식하는지 여부
    fn recognizes(&self, event_name: &str) -> bool {
        self.event_names().contains(&event_name)
    }

    /// 레코드를 정규화합니다.
    ///
    /// `recognizes`가 `true`인 레코드에 대해서만 호출됩니다.
    fn normalize(&self, record: &GenericRecord, topology: &TopologyStore) -> CanonicalEvent;
}

/// 우선순위 순서의 정규화기 체인
pub struct NormalizerChain {
    normalizers: Vec<Box<dyn Normalizer>>,
}

impl NormalizerChain {
    /// 빈 체인을 생성합니다. 모든 레코드가 일반 이벤트가 됩니다.
    pub fn empty() -> Self {
        Self {
            normalizers: Vec::new(),
        }
    }

    /// 기본 정규화기(storage, network, hardware, security)로 체인을 생성합니다.
    pub fn with_defaults() -> Self {
        let mut chain = Self::empty();
        chain.register(Box::new(StorageNormalizer));
        chain.register(Box::new(NetworkNormalizer));
        chain.register(Box::new(HardwareNormalizer));
        chain.register(Box::new(SecurityNormalizer));
        chain
    }

    /// 가장 낮은 우선순위로 정규화기를 추가합니다.
    pub fn register(&mut self, normalizer: Box<dyn Normalizer>) {
        self.normalizers.push(normalizer);
    }

    /// 등록된 정규화기 이름 (우선순위 순)
    pub fn names(&self) -> Vec<&str> {
        self.normalizers.iter().map(|n| n.name()).collect()
    }

    /// 레코드를 정규화합니다. 인식하는 정규화기가 없으면 일반 이벤트를 반환합니다.
    pub fn normalize(&self, record: &GenericRecord, topology: &TopologyStore) -> CanonicalEvent {
        match self
            .normalizers
            .iter()
            .find(|n| n.recognizes(&record.event_name))
        {
            Some(normalizer) => {
                let event = normalizer.normalize(record, topology);
                metrics::counter!(
                    m::EVENTS_NORMALIZED_TOTAL,
                    m::LABEL_NORMALIZER => normalizer.name().to_owned()
                )
                .increment(1);
                event
            }
            None => {
                trace!(event_name = %record.event_name, "no normalizer, using generic event");
                metrics::counter!(m::NORMALIZER_FALLBACK_TOTAL).increment(1);
                CanonicalEvent::generic(record)
            }
        }
    }
}

impl Default for NormalizerChain {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// --- 정규화기 공용 헬퍼 ---

/// 캡처 그룹 문자열, 없으면 [`UNKNOWN`]
pub(crate) fn text_or_unknown(caps: Option<&Captures<'_>>, group: usize) -> String {
    caps.and_then(|c| c.get(group))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN)
        .to_owned()
}

/// 캡처 그룹 정수, 없거나 파싱 실패 시 0
pub(crate) fn int_or_zero(caps: Option<&Captures<'_>>, group: usize) -> i64 {
    caps.and_then(|c| c.get(group))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// 메시지에서 첫 캡처 그룹을 찾습니다.
pub(crate) fn find<'t>(re: &Regex, message: &'t str) -> Option<Captures<'t>> {
    re.captures(message)
}

/// 자리표시자가 아닌 실제 ID인지 여부
pub(crate) fn is_known(id: &str) -> bool {
    !id.is_empty() && id != UNKNOWN
}

/// 자산과 부모 관계를 선언합니다 (부모 보정 허용).
pub(crate) fn declare(topology: &TopologyStore, id: &str, kind: AssetKind, parent: &str) {
    if is_known(id) {
        topology.add_or_update_asset(id, kind, Some(parent).filter(|p| is_known(p)));
    }
}

/// 자산이 없을 때만 선언합니다 (기존 부모 유지).
pub(crate) fn declare_if_new(topology: &TopologyStore, id: &str, kind: AssetKind, parent: &str) {
    if is_known(id) {
        topology.ensure_asset(id, kind, Some(parent).filter(|p| is_known(p)));
    }
}

/// 노드 자산을 선언합니다.
pub(crate) fn declare_node(topology: &TopologyStore, node: &str) {
    if is_known(node) {
        topology.ensure_asset(node, AssetKind::Node, None);
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::record;
    use super::*;
    use emsight_core::types::{Severity, Subsystem};

    struct CatchAll;

    impl Normalizer for CatchAll {
        fn name(&self) -> &str {
            "catch-all"
        }

        fn event_names(&self) -> &[&'static str] {
            &["disk.outOfService", "kern.uptime.info"]
        }

        fn normalize(&self, record: &GenericRecord, _topology: &TopologyStore) -> CanonicalEvent {
            CanonicalEvent::generic(record).with_field("by", "catch-all")
        }
    }

    #[test]
    fn default_chain_priority_order() {
        let chain = NormalizerChain::with_defaults();
        assert_eq!(chain.names(), vec!["storage", "network", "hardware", "security"]);
    }

    #[test]
    fn first_matching_normalizer_wins() {
        let mut chain = NormalizerChain::with_defaults();
        chain.register(Box::new(CatchAll));
        let topology = TopologyStore::new();

        // storage가 먼저 인식
        let disk = record("n1", "disk.outOfService", "ERROR", "Disk 1.2 on shelf 1 failed.");
        let event = chain.normalize(&disk, &topology);
        assert_eq!(event.subsystem, Subsystem::Storage);
        assert!(!event.fields.contains_key("by"));

        // 기본 정규화기가 모르는 이벤트는 등록된 정규화기가 처리
        let uptime = record("n1", "kern.uptime.info", "INFORMATIONAL", "up");
        let event = chain.normalize(&uptime, &topology);
        assert_eq!(event.fields["by"].as_str(), Some("catch-all"));
    }

    #[test]
    fn unrecognized_event_falls_back_to_generic() {
        let chain = NormalizerChain::with_defaults();
        let topology = TopologyStore::new();
        let rec = record(
            "n2",
            "callhome.snmp.trap.sent",
            "INFORMATIONAL",
            "An SNMP trap for event 'linkUp' was sent to '192.168.1.10'.",
        );
        let event = chain.normalize(&rec, &topology);
        assert_eq!(event.subsystem, Subsystem::System);
        assert_eq!(event.impact_level, 0);
        assert!(event.fields.is_empty());
        assert_eq!(event.severity, Severity::Info);
        assert_eq!(event.raw_message, rec.message);
        assert!(topology.is_empty());
    }

    #[test]
    fn empty_chain_never_drops() {
        let chain = NormalizerChain::empty();
        let topology = TopologyStore::new();
        let rec = record("n1", "disk.outOfService", "ERROR", "garbage");
        let event = chain.normalize(&rec, &topology);
        assert_eq!(event.subsystem, Subsystem::System);
        assert_eq!(event.event_name, "disk.outOfService");
    }

    #[test]
    fn placeholder_ids_are_not_declared() {
        let topology = TopologyStore::new();
        declare(&topology, UNKNOWN, AssetKind::Disk, "n1");
        declare(&topology, "d1", AssetKind::Disk, UNKNOWN);
        assert!(topology.get_asset(UNKNOWN).is_none());
        assert!(topology.get_asset("d1").unwrap().parent_id.is_none());
    }

    #[test]
    fn capture_helpers_default_on_miss() {
        let re = Regex::new(r"latency is (\d+)ms").unwrap();
        assert_eq!(int_or_zero(find(&re, "latency is 45ms").as_ref(), 1), 45);
        assert_eq!(int_or_zero(find(&re, "no latency").as_ref(), 1), 0);
        assert_eq!(text_or_unknown(find(&re, "nothing").as_ref(), 1), UNKNOWN);
    }
}
