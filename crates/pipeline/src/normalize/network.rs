//! 네트워크 정규화기 -- LIF, QoS 지연시간

use std::sync::LazyLock;

use regex::Regex;

use emsight_core::event::CanonicalEvent;
use emsight_core::types::{AssetKind, GenericRecord, Severity, Subsystem};

use super::{Normalizer, declare, declare_node, find, int_or_zero, text_or_unknown};
use crate::topology::TopologyStore;

pub const LIF_DOWN: &str = "vifMgr.lif.down";
pub const QOS_LATENCY_HIGH: &str = "qos.latency.high";

static LIF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"LIF (.*?) \(port (.*?)\) on Vserver (.*?) has").expect("valid regex")
});
static LATENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"latency is (\d+)ms").expect("valid regex"));
static WORKLOAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Workload (.*?) latency").expect("valid regex"));
static THRESHOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Threshold: (\d+)ms").expect("valid regex"));

/// 네트워크 서브시스템 정규화기
#[derive(Debug, Default, Clone, Copy)]
pub struct NetworkNormalizer;

impl Normalizer for NetworkNormalizer {
    fn name(&self) -> &str {
        "network"
    }

    fn event_names(&self) -> &[&'static str] {
        &[LIF_DOWN, QOS_LATENCY_HIGH]
    }

    fn normalize(&self, record: &GenericRecord, topology: &TopologyStore) -> CanonicalEvent {
        match record.event_name.as_str() {
            LIF_DOWN => lif_down(record, topology),
            QOS_LATENCY_HIGH => qos_latency_high(record),
            _ => CanonicalEvent::generic(record),
        }
    }
}

/// `LIF lif_data_101 (port e0a) on Vserver svm1 has gone down.`
fn lif_down(record: &GenericRecord, topology: &TopologyStore) -> CanonicalEvent {
    let caps = find(&LIF, &record.message);
    let lif = text_or_unknown(caps.as_ref(), 1);
    let port = text_or_unknown(caps.as_ref(), 2);
    let vserver = text_or_unknown(caps.as_ref(), 3);

    declare_node(topology, &record.node);
    declare(topology, &lif, AssetKind::LogicalInterface, &record.node);
    topology.set_health(&lif, 0.0, "down");

    CanonicalEvent::from_record(record, Subsystem::Network, Severity::Error, 9)
        .with_asset(lif.clone())
        .with_field("lif", lif)
        .with_field("port", port)
        .with_field("vserver", vserver)
}

/// `Workload policy_group_1 latency is 45ms (Threshold: 20ms).`
///
/// QoS 워크로드는 토폴로지 자산이 아닙니다.
fn qos_latency_high(record: &GenericRecord) -> CanonicalEvent {
    let latency = int_or_zero(find(&LATENCY, &record.message).as_ref(), 1);
    let workload = text_or_unknown(find(&WORKLOAD, &record.message).as_ref(), 1);
    let threshold = int_or_zero(find(&THRESHOLD, &record.message).as_ref(), 1);

    CanonicalEvent::from_record(record, Subsystem::Network, Severity::Warn, 4)
        .with_asset(workload.clone())
        .with_field("latency", latency)
        .with_field("workload", workload)
        .with_field("threshold", threshold)
}
