//! 캐스케이드 패턴 정의
//!
//! 패턴 하나는 다음으로 구성됩니다.
//! - 트리거 이벤트 이름 (새로 들어온 증상 이벤트)
//! - 근본 원인 이벤트 이름 (버퍼에서 찾을 과거 이벤트)
//! - 조회 범위 ([`MatchScope`]): 같은 노드 또는 같은 자산 계통
//! - 인시던트 심각도와 설명 템플릿

use serde::{Deserialize, Serialize};

use emsight_core::event::CanonicalEvent;
use emsight_core::types::IncidentSeverity;

use crate::normalize::network::{LIF_DOWN, QOS_LATENCY_HIGH};
use crate::normalize::storage::{AGGREGATE_DEGRADED, DISK_OUT_OF_SERVICE, VOLUME_NEARLY_FULL};
use crate::topology::TopologyStore;

/// 근본 원인 후보 조회 범위
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchScope {
    /// 트리거와 같은 노드
    SameNode,
    /// 트리거 자산과 후보 자산이 토폴로지상 한 계통 (조상/자손)
    SameLineage,
}

impl MatchScope {
    /// 후보가 트리거와 같은 범위에 있는지 확인합니다.
    pub fn matches(
        self,
        trigger: &CanonicalEvent,
        candidate: &CanonicalEvent,
        topology: &TopologyStore,
    ) -> bool {
        match self {
            Self::SameNode => trigger.node == candidate.node,
            Self::SameLineage => match (&trigger.asset_id, &candidate.asset_id) {
                (Some(a), Some(b)) => topology.is_related(a, b),
                _ => false,
            },
        }
    }
}

/// 캐스케이드 패턴
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadePattern {
    /// 패턴 이름 (인시던트에 기록)
    pub name: String,
    /// 트리거(증상) 이벤트 이름
    pub trigger: String,
    /// 근본 원인 이벤트 이름
    pub root_cause: String,
    /// 조회 범위
    pub scope: MatchScope,
    /// 인시던트 심각도
    pub severity: IncidentSeverity,
    /// 설명 템플릿: `{trigger_asset}`, `{root_asset}`, `{node}` 치환
    pub description: String,
}

impl CascadePattern {
    /// 디스크 장애 → 애그리거트 성능 저하
    pub fn raid_degradation() -> Self {
        Self {
            name: "raid_degradation_cascade".to_owned(),
            trigger: AGGREGATE_DEGRADED.to_owned(),
            root_cause: DISK_OUT_OF_SERVICE.to_owned(),
            scope: MatchScope::SameNode,
            severity: IncidentSeverity::Critical,
            description: "Aggregate {trigger_asset} degraded due to Disk Failure {root_asset}"
                .to_owned(),
        }
    }

    /// LIF 다운 → QoS 지연시간 증가
    pub fn network_path_loss() -> Self {
        Self {
            name: "network_path_loss".to_owned(),
            trigger: QOS_LATENCY_HIGH.to_owned(),
            root_cause: LIF_DOWN.to_owned(),
            scope: MatchScope::SameNode,
            severity: IncidentSeverity::Major,
            description: concat!(
                "Workload {trigger_asset} latency elevated after ",
                "LIF {root_asset} went down on {node}"
            )
            .to_owned(),
        }
    }

    /// 성능 저하된 애그리거트 위 볼륨 용량 부족
    pub fn capacity_on_degraded_aggregate() -> Self {
        Self {
            name: "capacity_on_degraded_aggregate".to_owned(),
            trigger: VOLUME_NEARLY_FULL.to_owned(),
            root_cause: AGGREGATE_DEGRADED.to_owned(),
            scope: MatchScope::SameLineage,
            severity: IncidentSeverity::Major,
            description: "Volume {trigger_asset} nearly full on degraded aggregate {root_asset}"
                .to_owned(),
        }
    }

    /// 기본 패턴 목록
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::raid_degradation(),
            Self::network_path_loss(),
            Self::capacity_on_degraded_aggregate(),
        ]
    }

    /// 트리거 이벤트 여부
    pub fn is_trigger(&self, event: &CanonicalEvent) -> bool {
        event.event_name == self.trigger
    }

    /// 근본 원인 후보 여부
    pub fn is_candidate(
        &self,
        trigger: &CanonicalEvent,
        candidate: &CanonicalEvent,
        topology: &TopologyStore,
    ) -> bool {
        candidate.event_name == self.root_cause && self.scope.matches(trigger, candidate, topology)
    }

    /// 설명 템플릿을 채웁니다.
    pub fn describe(&self, trigger: &CanonicalEvent, root: &CanonicalEvent) -> String {
        let asset = |e: &CanonicalEvent| e.asset_id.clone().unwrap_or_else(|| e.event_name.clone());
        self.description
            .replace("{trigger_asset}", &asset(trigger))
            .replace("{root_asset}", &asset(root))
            .replace("{node}", &trigger.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use emsight_core::types::{AssetKind, GenericRecord, Severity, Subsystem};

    fn event(node: &str, name: &str, asset: &str) -> CanonicalEvent {
        let record = GenericRecord {
            priority: 131,
            timestamp: NaiveDate::from_ymd_opt(2026, 1, 22)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            timestamp_text: "Jan 22 12:00:00".to_owned(),
            node: node.to_owned(),
            event_name: name.to_owned(),
            severity: "ERROR".to_owned(),
            message: String::new(),
        };
        CanonicalEvent::from_record(&record, Subsystem::Storage, Severity::Error, 5)
            .with_asset(asset)
    }

    #[test]
    fn raid_description_uses_assets() {
        let pattern = CascadePattern::raid_degradation();
        let trigger = event("n1", AGGREGATE_DEGRADED, "aggr1");
        let root = event("n1", DISK_OUT_OF_SERVICE, "1.2");
        assert_eq!(
            pattern.describe(&trigger, &root),
            "Aggregate aggr1 degraded due to Disk Failure 1.2"
        );
    }

    #[test]
    fn same_node_scope() {
        let topology = TopologyStore::new();
        let pattern = CascadePattern::raid_degradation();
        let trigger = event("n1", AGGREGATE_DEGRADED, "aggr1");
        assert!(pattern.is_candidate(&trigger, &event("n1", DISK_OUT_OF_SERVICE, "d"), &topology));
        assert!(!pattern.is_candidate(&trigger, &event("n2", DISK_OUT_OF_SERVICE, "d"), &topology));
        assert!(!pattern.is_candidate(&trigger, &event("n1", LIF_DOWN, "d"), &topology));
    }

    #[test]
    fn same_lineage_scope_uses_topology() {
        let topology = TopologyStore::new();
        topology.add_or_update_asset("aggr1", AssetKind::Aggregate, Some("n1"));
        topology.add_or_update_asset("vol1", AssetKind::Volume, Some("aggr1"));
        topology.add_or_update_asset("vol2", AssetKind::Volume, Some("aggr2"));

        let pattern = CascadePattern::capacity_on_degraded_aggregate();
        let degraded = event("n1", AGGREGATE_DEGRADED, "aggr1");
        let vol1 = event("n1", VOLUME_NEARLY_FULL, "vol1");
        let vol2 = event("n1", VOLUME_NEARLY_FULL, "vol2");
        assert!(pattern.is_candidate(&vol1, &degraded, &topology));
        assert!(!pattern.is_candidate(&vol2, &degraded, &topology));
    }

    #[test]
    fn defaults_have_unique_names() {
        let patterns = CascadePattern::defaults();
        let mut names: Vec<_> = patterns.iter().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), patterns.len());
    }
}
