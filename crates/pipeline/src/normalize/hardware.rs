//! 하드웨어 정규화기 -- 섀시 팬, NVRAM 배터리
//!
//! 하드웨어 이벤트는 노드 자체를 영향 자산으로 보고 서브시스템은 `system`입니다.

use std::sync::LazyLock;

use regex::Regex;

use emsight_core::event::CanonicalEvent;
use emsight_core::types::{GenericRecord, Severity, Subsystem};

use super::{Normalizer, declare_node, find, text_or_unknown};
use crate::topology::TopologyStore;

pub const FAN_FAILURE: &str = "chassis.fan.failure";
pub const NVRAM_BATTERY_LOW: &str = "nvram.battery.low";

static FAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Fan module (\S+) has failed").expect("valid regex"));

#[derive(Debug, Default, Clone, Copy)]
pub struct HardwareNormalizer;

impl Normalizer for HardwareNormalizer {
    fn name(&self) -> &str {
        "hardware"
    }

    fn event_names(&self) -> &[&'static str] {
        &[FAN_FAILURE, NVRAM_BATTERY_LOW]
    }

    fn normalize(&self, record: &GenericRecord, topology: &TopologyStore) -> CanonicalEvent {
        declare_node(topology, &record.node);

        match record.event_name.as_str() {
            FAN_FAILURE => {
                let fan_id = text_or_unknown(find(&FAN, &record.message).as_ref(), 1);
                topology.set_health(&record.node, 70.0, "fan-failure");
                CanonicalEvent::from_record(record, Subsystem::System, Severity::Error, 7)
                    .with_asset(record.node.clone())
                    .with_field("fan_id", fan_id)
            }
            NVRAM_BATTERY_LOW => {
                topology.set_health(&record.node, 40.0, "nvram-battery-low");
                CanonicalEvent::from_record(record, Subsystem::System, Severity::Error, 8)
                    .with_asset(record.node.clone())
                    .with_field("component", "nvram_battery")
            }
            _ => CanonicalEvent::generic(record),
        }
    }
}
