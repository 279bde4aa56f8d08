//! 토폴로지 저장소 -- 발견된 자산과 부모/자식 관계
//!
//! 정규화기가 메시지에서 자산(노드, 애그리거트, 볼륨, 디스크, LIF)을 발견할 때마다
//! 이 저장소에 선언합니다. 자산은 삭제되지 않으며, 부모 링크는 나중에 보정될 수
//! 있습니다 (last-writer-wins).
//!
//! # 불변식
//! - 자산 ID는 유일합니다.
//! - 부모 관계는 양방향으로 저장됩니다: 자식의 `parent_id`와 부모의 자식 집합.
//!   모든 변경 후 두 방향이 일치합니다.
//!
//! 쓰기는 정규화 호출 체인에서만 일어나지만, 대시보드 등 외부 관찰자가 다른
//! 스레드에서 읽을 수 있으므로 내부 상태는 `RwLock`으로 보호됩니다.

use std::collections::{BTreeSet, HashMap, HashSet};

use parking_lot::RwLock;
use tracing::{debug, trace};

use emsight_core::metrics as m;
use emsight_core::types::{Asset, AssetKind};

#[derive(Debug, Default)]
struct TopologyInner {
    assets: HashMap<String, Asset>,
    children: HashMap<String, BTreeSet<String>>,
}

impl TopologyInner {
    fn link(&mut self, parent: &str, child: &str) {
        self.children
            .entry(parent.to_owned())
            .or_default()
            .insert(child.to_owned());
    }

    fn unlink(&mut self, parent: &str, child: &str) {
        if let Some(set) = self.children.get_mut(parent) {
            set.remove(child);
            if set.is_empty() {
                self.children.remove(parent);
            }
        }
    }
}

/// 자산 토폴로지 저장소
#[derive(Debug, Default)]
pub struct TopologyStore {
    inner: RwLock<TopologyInner>,
}

impl TopologyStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 자산을 생성하거나 부모 링크를 갱신합니다.
    ///
    /// - 처음 보는 ID: 주어진 유형과 부모로 생성
    /// - 이미 있는 ID: 비어 있지 않고 기존과 다른 부모가 주어지면 부모를 교체
    ///
    /// 유형은 최초 관측 값을 유지합니다. 자기 자신을 부모로 지정하면 무시합니다.
    pub fn add_or_update_asset(&self, id: &str, kind: AssetKind, parent: Option<&str>) {
        let parent = parent.filter(|p| !p.is_empty() && *p != id);
        let mut inner = self.inner.write();

        match inner.assets.get_mut(id) {
            None => {
                let asset = Asset::new(id, kind, parent.map(str::to_owned));
                inner.assets.insert(id.to_owned(), asset);
                if let Some(parent) = parent {
                    inner.link(parent, id);
                }
                debug!(asset = id, kind = %kind, parent = ?parent, "discovered asset");
                metrics::gauge!(m::TOPOLOGY_ASSETS).set(inner.assets.len() as f64);
            }
            Some(asset) => {
                let Some(parent) = parent else { return };
                if asset.parent_id.as_deref() == Some(parent) {
                    return;
                }
                let previous = asset.parent_id.replace(parent.to_owned());
                if let Some(previous) = previous.as_deref() {
                    inner.unlink(previous, id);
                }
                inner.link(parent, id);
                debug!(asset = id, from = ?previous, to = parent, "re-parented asset");
            }
        }
    }

    /// 자산이 없을 때만 생성합니다.
    ///
    /// 메시지가 자산의 존재는 드러내지만 실제 부모는 알 수 없을 때 사용합니다.
    /// 이미 있는 자산의 부모 링크는 건드리지 않습니다.
    pub fn ensure_asset(&self, id: &str, kind: AssetKind, parent: Option<&str>) {
        if self.inner.read().assets.contains_key(id) {
            trace!(asset = id, "asset already known");
            return;
        }
        self.add_or_update_asset(id, kind, parent);
    }

    /// 자산을 조회합니다.
    pub fn get_asset(&self, id: &str) -> Option<Asset> {
        self.inner.read().assets.get(id).cloned()
    }

    /// 직계 자식 ID 목록을 정렬된 순서로 반환합니다.
    pub fn get_children(&self, parent_id: &str) -> Vec<String> {
        self.inner
            .read()
            .children
            .get(parent_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 건강 점수와 상태를 갱신합니다. 모르는 ID면 아무 일도 하지 않습니다.
    ///
    /// 점수는 0–100 범위로 제한됩니다.
    pub fn set_health(&self, id: &str, score: f64, status: &str) -> bool {
        let mut inner = self.inner.write();
        let Some(asset) = inner.assets.get_mut(id) else {
            return false;
        };
        asset.health_score = if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 100.0)
        };
        status.clone_into(&mut asset.status);
        true
    }

    /// 모든 자산을 ID 순으로 반환합니다.
    pub fn assets(&self) -> Vec<Asset> {
        let mut assets: Vec<Asset> = self.inner.read().assets.values().cloned().collect();
        assets.sort_by(|a, b| a.id.cmp(&b.id));
        assets
    }

    /// 등록된 자산 수
    pub fn len(&self) -> usize {
        self.inner.read().assets.len()
    }

    /// 자산이 하나도 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.inner.read().assets.is_empty()
    }

    /// 자기 자신부터 루트까지의 조상 체인을 반환합니다.
    ///
    /// 등록되지 않은 부모 ID도 체인에 포함됩니다. 순환이 있으면 반복 직전에 멈춥니다.
    pub fn lineage(&self, id: &str) -> Vec<String> {
        let inner = self.inner.read();
        let mut chain = vec![id.to_owned()];
        let mut seen: HashSet<&str> = HashSet::from([id]);
        let mut current = id;

        while let Some(parent) = inner
            .assets
            .get(current)
            .and_then(|a| a.parent_id.as_deref())
        {
            if !seen.insert(parent) {
                break;
            }
            chain.push(parent.to_owned());
            current = parent;
        }
        chain
    }

    /// 두 자산이 같은 계통(한쪽이 다른 쪽의 조상)에 있는지 여부
    pub fn is_related(&self, a: &str, b: &str) -> bool {
        a == b || self.lineage(a).iter().any(|x| x == b) || self.lineage(b).iter().any(|x| x == a)
    }
}
