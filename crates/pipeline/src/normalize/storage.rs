//! 스토리지 정규화기 -- 디스크, RAID, WAFL, 볼륨 용량, SnapMirror

use std::sync::LazyLock;

use regex::Regex;

use emsight_core::event::CanonicalEvent;
use emsight_core::types::{AssetKind, GenericRecord, Severity, Subsystem};

use super::{
    Normalizer, declare, declare_if_new, declare_node, find, int_or_zero, is_known,
    text_or_unknown,
};
use crate::topology::TopologyStore;

pub const VOLUME_NEARLY_FULL: &str = "monitor.volume.nearlyFull";
pub const DISK_OUT_OF_SERVICE: &str = "disk.outOfService";
pub const AGGREGATE_DEGRADED: &str = "raid.aggr.degraded";
pub const WAFL_SCAN_START: &str = "wafl.scan.start";
pub const SNAPMIRROR_UPDATE_FAILED: &str = "snapmirror.dst.updateFailed";

/// 볼륨 용량 경고 임계값 (%)
pub const VOLUME_USAGE_LIMIT: i64 = 95;

static VOLUME_FULL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Volume (.*?) on aggregate (.*?) is (\d+)% full").expect("valid regex")
});
static DISK_FAILED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Disk (.*?) on shelf(?: (\w+))?").expect("valid regex"));
static AGGR_DEGRADED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Aggregate (.*?) is degraded").expect("valid regex"));
static RAID_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\S+) is missing a disk").expect("valid regex"));
static WAFL_SCAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"WAFL scan '(.*?)' started on volume ([^\s.]+)").expect("valid regex")
});
static SNAPMIRROR_FAILED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"destination volume (\S+) failed\.(?: Reason: (.*?)\.?$)?").expect("valid regex")
});

/// 스토리지 서브시스템 정규화기
#[derive(Debug, Default, Clone, Copy)]
pub struct StorageNormalizer;

impl Normalizer for StorageNormalizer {
    fn name(&self) -> &str {
        "storage"
    }

    fn event_names(&self) -> &[&'static str] {
        &[
            VOLUME_NEARLY_FULL,
            DISK_OUT_OF_SERVICE,
            AGGREGATE_DEGRADED,
            WAFL_SCAN_START,
            SNAPMIRROR_UPDATE_FAILED,
        ]
    }

    fn normalize(&self, record: &GenericRecord, topology: &TopologyStore) -> CanonicalEvent {
        match record.event_name.as_str() {
            VOLUME_NEARLY_FULL => volume_nearly_full(record, topology),
            DISK_OUT_OF_SERVICE => disk_out_of_service(record, topology),
            AGGREGATE_DEGRADED => aggregate_degraded(record, topology),
            WAFL_SCAN_START => wafl_scan_start(record, topology),
            SNAPMIRROR_UPDATE_FAILED => snapmirror_update_failed(record, topology),
            _ => CanonicalEvent::generic(record),
        }
    }
}

/// `Volume vol_X on aggregate aggr_Y is 99% full.`
///
/// 볼륨 → 애그리거트 → 노드 관계를 선언합니다.
fn volume_nearly_full(record: &GenericRecord, topology: &TopologyStore) -> CanonicalEvent {
    let caps = find(&VOLUME_FULL, &record.message);
    let volume = text_or_unknown(caps.as_ref(), 1);
    let aggregate = text_or_unknown(caps.as_ref(), 2);
    let usage = int_or_zero(caps.as_ref(), 3);

    declare_node(topology, &record.node);
    declare(topology, &aggregate, AssetKind::Aggregate, &record.node);
    if is_known(&aggregate) {
        declare(topology, &volume, AssetKind::Volume, &aggregate);
    } else {
        declare_if_new(topology, &volume, AssetKind::Volume, &record.node);
    }

    CanonicalEvent::from_record(
        record,
        Subsystem::Storage,
        Severity::from_vendor(&record.severity),
        5,
    )
    .with_asset(volume.clone())
    .with_field("usage", usage)
    .with_field("limit", VOLUME_USAGE_LIMIT)
    .with_field("volume", volume)
    .with_field("aggregate", aggregate)
}

/// `Disk 1.2 on shelf 1 has failed and is being taken offline.`
fn disk_out_of_service(record: &GenericRecord, topology: &TopologyStore) -> CanonicalEvent {
    let caps = find(&DISK_FAILED, &record.message);
    let disk_id = text_or_unknown(caps.as_ref(), 1);
    let shelf = text_or_unknown(caps.as_ref(), 2);

    declare_node(topology, &record.node);
    declare(topology, &disk_id, AssetKind::Disk, &record.node);
    topology.set_health(&disk_id, 0.0, "failed");

    CanonicalEvent::from_record(record, Subsystem::Storage, Severity::Error, 8)
        .with_asset(disk_id.clone())
        .with_field("disk_id", disk_id)
        .with_field("shelf", shelf)
}

/// `Aggregate aggr1 is degraded. rg3 is missing a disk.`
fn aggregate_degraded(record: &GenericRecord, topology: &TopologyStore) -> CanonicalEvent {
    let caps = find(&AGGR_DEGRADED, &record.message);
    let aggregate = text_or_unknown(caps.as_ref(), 1);

    declare_node(topology, &record.node);
    declare(topology, &aggregate, AssetKind::Aggregate, &record.node);
    topology.set_health(&aggregate, 50.0, "degraded");

    let mut event = CanonicalEvent::from_record(record, Subsystem::Storage, Severity::Error, 9)
        .with_asset(aggregate.clone())
        .with_field("aggr", aggregate);
    if let Some(rg) = RAID_GROUP.captures(&record.message).and_then(|c| c.get(1)) {
        event = event.with_field("raid_group", rg.as_str());
    }
    event
}

/// `WAFL scan 'active_fcp' started on volume vol_X.`
///
/// 애그리거트를 알 수 없으므로 새 볼륨일 때만 노드에 연결합니다.
fn wafl_scan_start(record: &GenericRecord, topology: &TopologyStore) -> CanonicalEvent {
    let caps = find(&WAFL_SCAN, &record.message);
    let scan = text_or_unknown(caps.as_ref(), 1);
    let volume = text_or_unknown(caps.as_ref(), 2);

    declare_node(topology, &record.node);
    declare_if_new(topology, &volume, AssetKind::Volume, &record.node);

    CanonicalEvent::from_record(record, Subsystem::Storage, Severity::Info, 1)
        .with_asset(volume.clone())
        .with_field("scan", scan)
        .with_field("volume", volume)
}

/// `Update of destination volume dp_vol_7 failed. Reason: Network timeout.`
fn snapmirror_update_failed(record: &GenericRecord, topology: &TopologyStore) -> CanonicalEvent {
    let caps = find(&SNAPMIRROR_FAILED, &record.message);
    let volume = text_or_unknown(caps.as_ref(), 1);
    let reason = text_or_unknown(caps.as_ref(), 2);

    declare_node(topology, &record.node);
    declare_if_new(topology, &volume, AssetKind::Volume, &record.node);

    CanonicalEvent::from_record(record, Subsystem::Storage, Severity::Error, 6)
        .with_asset(volume.clone())
        .with_field("dest_volume", volume)
        .with_field("reason", reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::UNKNOWN;
    use crate::normalize::test_support::record;

    fn run(event: &str, severity: &str, message: &str) -> (CanonicalEvent, TopologyStore) {
        let topology = TopologyStore::new();
        let event = StorageNormalizer.normalize(&record("n1", event, severity, message), &topology);
        (event, topology)
    }

    #[test]
    fn volume_full_builds_lineage() {
        let (event, topology) = run(
            VOLUME_NEARLY_FULL,
            "WARNING",
            "Volume vol_finance_1 on aggregate aggr1_ssd is 97% full.",
        );
        assert_eq!(event.subsystem, Subsystem::Storage);
        assert_eq!(event.severity, Severity::Warn);
        assert_eq!(event.impact_level, 5);
        assert_eq!(event.asset_id.as_deref(), Some("vol_finance_1"));
        assert_eq!(event.field_i64("usage"), Some(97));
        assert_eq!(event.field_i64("limit"), Some(95));

        assert_eq!(
            topology.get_asset("vol_finance_1").unwrap().parent_id.as_deref(),
            Some("aggr1_ssd")
        );
        assert_eq!(
            topology.get_asset("aggr1_ssd").unwrap().parent_id.as_deref(),
            Some("n1")
        );
        assert_eq!(topology.get_children("n1"), vec!["aggr1_ssd"]);
        assert_eq!(topology.get_asset("n1").unwrap().kind, AssetKind::Node);
    }

    #[test]
    fn volume_full_miss_degrades_fields() {
        let (event, topology) = run(VOLUME_NEARLY_FULL, "WARNING", "Volume is full");
        assert_eq!(event.field_i64("usage"), Some(0));
        assert_eq!(event.fields["volume"].as_str(), Some(UNKNOWN));
        assert_eq!(event.asset_id.as_deref(), Some(UNKNOWN));
        assert!(topology.get_asset(UNKNOWN).is_none());
        assert_eq!(topology.len(), 1);
    }

    #[test]
    fn disk_failure_marks_disk_failed() {
        let (event, topology) = run(
            DISK_OUT_OF_SERVICE,
            "ERROR",
            "Disk 1.2 on shelf 1 has failed and is being taken offline.",
        );
        assert_eq!(event.severity, Severity::Error);
        assert_eq!(event.impact_level, 8);
        assert_eq!(event.fields["disk_id"].as_str(), Some("1.2"));
        assert_eq!(event.fields["shelf"].as_str(), Some("1"));

        let disk = topology.get_asset("1.2").unwrap();
        assert_eq!(disk.kind, AssetKind::Disk);
        assert_eq!(disk.parent_id.as_deref(), Some("n1"));
        assert_eq!(disk.status, "failed");
        assert_eq!(disk.health_score, 0.0);
    }

    #[test]
    fn short_disk_message_still_extracts_id() {
        let (event, _) = run(DISK_OUT_OF_SERVICE, "ERROR", "Disk 1.2 on shelf 1 failed.");
        assert_eq!(event.asset_id.as_deref(), Some("1.2"));
        assert_eq!(event.fields["shelf"].as_str(), Some("1"));
    }

    #[test]
    fn aggregate_degraded_extracts_raid_group() {
        let (event, topology) = run(
            AGGREGATE_DEGRADED,
            "ALERT",
            "Aggregate aggr2_sata is degraded. rg3 is missing a disk.",
        );
        assert_eq!(event.severity, Severity::Error);
        assert_eq!(event.impact_level, 9);
        assert_eq!(event.fields["aggr"].as_str(), Some("aggr2_sata"));
        assert_eq!(event.fields["raid_group"].as_str(), Some("rg3"));
        assert_eq!(topology.get_asset("aggr2_sata").unwrap().status, "degraded");
    }

    #[test]
    fn aggregate_degraded_without_raid_group() {
        let (event, _) = run(AGGREGATE_DEGRADED, "ALERT", "Aggregate aggr1 is degraded.");
        assert_eq!(event.asset_id.as_deref(), Some("aggr1"));
        assert!(!event.fields.contains_key("raid_group"));
    }

    #[test]
    fn wafl_scan_extracts_scan_name_and_keeps_aggregate_parent() {
        let topology = TopologyStore::new();
        StorageNormalizer.normalize(
            &record(
                "n1",
                VOLUME_NEARLY_FULL,
                "WARNING",
                "Volume vol_hr_3 on aggregate aggr1 is 96% full.",
            ),
            &topology,
        );
        let event = StorageNormalizer.normalize(
            &record(
                "n1",
                WAFL_SCAN_START,
                "NOTICE",
                "WAFL scan 'deswizzler' started on volume vol_hr_3.",
            ),
            &topology,
        );

        assert_eq!(event.severity, Severity::Info);
        assert_eq!(event.impact_level, 1);
        assert_eq!(event.fields["scan"].as_str(), Some("deswizzler"));
        assert_eq!(event.fields["volume"].as_str(), Some("vol_hr_3"));
        assert_eq!(
            topology.get_asset("vol_hr_3").unwrap().parent_id.as_deref(),
            Some("aggr1")
        );
    }

    #[test]
    fn wafl_scan_on_new_volume_links_to_node() {
        let (_, topology) = run(
            WAFL_SCAN_START,
            "NOTICE",
            "WAFL scan 'active_fcp' started on volume vol_eng_9.",
        );
        assert_eq!(
            topology.get_asset("vol_eng_9").unwrap().parent_id.as_deref(),
            Some("n1")
        );
    }

    #[test]
    fn snapmirror_failure_extracts_reason() {
        let (event, _) = run(
            SNAPMIRROR_UPDATE_FAILED,
            "ERROR",
            "Update of destination volume dp_vol_7 failed. Reason: Transfer stalled.",
        );
        assert_eq!(event.impact_level, 6);
        assert_eq!(event.fields["dest_volume"].as_str(), Some("dp_vol_7"));
        assert_eq!(event.fields["reason"].as_str(), Some("Transfer stalled"));
    }
}
