//! 기준선 점수 계산기 -- 오프라인 학습 아티팩트(JSON) 로더
//!
//! 아티팩트 형식:
//! ```json
//! {
//!   "threshold": 3.0,
//!   "features": {
//!     "log_count":   { "mean": 12.0, "std_dev": 4.0 },
//!     "error_count": { "mean": 0.5,  "std_dev": 0.7 }
//!   }
//! }
//! ```
//!
//! 점수는 `threshold - max_i |x_i - mean_i| / std_dev_i` 입니다.
//! 낮을수록 이상하며, 음수면 이상으로 분류합니다. 아티팩트에 없는 피처는 무시합니다.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use emsight_core::error::ScorerError;
use emsight_core::pipeline::{Classification, ScoreOutcome, Scorer};
use emsight_core::types::{FEATURE_NAMES, WindowFeatures};

/// 아티팩트 최대 크기
const MAX_ARTIFACT_SIZE: u64 = 1024 * 1024; // 1MB

/// 표준편차 하한 (0 나누기 방지)
const MIN_STD_DEV: f64 = 1e-9;

/// 피처별 기준 통계
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FeatureBaseline {
    pub mean: f64,
    pub std_dev: f64,
}

#[derive(Debug, Deserialize)]
struct Artifact {
    threshold: f64,
    #[serde(default)]
    features: BTreeMap<String, FeatureBaseline>,
}

/// 피처별 z-점수 기반 점수 계산기
#[derive(Debug, Clone)]
pub struct BaselineScorer {
    threshold: f64,
    /// [`FEATURE_NAMES`] 순서, 기준이 없는 피처는 `None`
    baselines: [Option<FeatureBaseline>; 6],
}

impl BaselineScorer {
    /// 임계값과 피처 기준으로 생성합니다.
    pub fn new(
        threshold: f64,
        features: impl IntoIterator<Item = (String, FeatureBaseline)>,
    ) -> Result<Self, ScorerError> {
        Self::build(threshold, features, "<inline>")
    }

    /// JSON 문자열에서 생성합니다. `origin`은 에러 메시지용입니다.
    pub fn from_json(json: &str, origin: &str) -> Result<Self, ScorerError> {
        let artifact: Artifact =
            serde_json::from_str(json).map_err(|e| ScorerError::InvalidArtifact {
                path: origin.to_owned(),
                reason: e.to_string(),
            })?;
        Self::build(artifact.threshold, artifact.features, origin)
    }

    /// 아티팩트 파일에서 로드합니다.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ScorerError> {
        let path = path.as_ref();
        let origin = path.display().to_string();

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| ScorerError::ArtifactNotFound {
                path: origin.clone(),
            })?;
        if metadata.len() > MAX_ARTIFACT_SIZE {
            return Err(ScorerError::InvalidArtifact {
                path: origin,
                reason: format!(
                    "file too large: {} bytes (max {MAX_ARTIFACT_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ScorerError::InvalidArtifact {
                    path: origin.clone(),
                    reason: e.to_string(),
                })?;
        Self::from_json(&content, &origin)
    }

    fn build(
        threshold: f64,
        features: impl IntoIterator<Item = (String, FeatureBaseline)>,
        origin: &str,
    ) -> Result<Self, ScorerError> {
        let invalid = |reason: String| ScorerError::InvalidArtifact {
            path: origin.to_owned(),
            reason,
        };

        if !threshold.is_finite() {
            return Err(invalid(format!("threshold must be finite, got {threshold}")));
        }

        let mut baselines = [None; 6];
        for (name, baseline) in features {
            let Some(index) = FEATURE_NAMES.iter().position(|n| *n == name) else {
                return Err(invalid(format!("unknown feature '{name}'")));
            };
            if !baseline.mean.is_finite() || !baseline.std_dev.is_finite() {
                return Err(invalid(format!("feature '{name}' has non-finite statistics")));
            }
            if baseline.std_dev < 0.0 {
                return Err(invalid(format!("feature '{name}' has negative std_dev")));
            }
            baselines[index] = Some(baseline);
        }

        if baselines.iter().all(Option::is_none) {
            return Err(invalid("no feature baselines".to_owned()));
        }

        Ok(Self {
            threshold,
            baselines,
        })
    }

    /// 분류 임계값
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Scorer for BaselineScorer {
    fn name(&self) -> &str {
        "baseline"
    }

    fn score(&self, features: &WindowFeatures) -> Result<ScoreOutcome, ScorerError> {
        let values = features.as_vector();
        let mut deviation = 0.0_f64;

        for (value, baseline) in values.iter().zip(&self.baselines) {
            let Some(baseline) = baseline else { continue };
            let z = (value - baseline.mean).abs() / baseline.std_dev.max(MIN_STD_DEV);
            if !z.is_finite() {
                return Err(ScorerError::ScoringFailed(format!(
                    "non-finite deviation for features [{features}]"
                )));
            }
            deviation = deviation.max(z);
        }

        let score = self.threshold - deviation;
        let classification = if score < 0.0 {
            Classification::Anomalous
        } else {
            Classification::Normal
        };
        Ok(ScoreOutcome {
            score,
            classification,
        })
    }
}

/// 설정된 경로에서 점수 계산기를 로드합니다.
///
/// 파일이 없으면 경고, 형식이 잘못되었으면 에러를 남기고 `None`을 반환합니다.
/// 어떤 경우에도 파이프라인 시작을 막지 않습니다.
pub async fn load_scorer(path: Option<&Path>) -> Option<Arc<dyn Scorer>> {
    let path = path?;
    match BaselineScorer::from_file(path).await {
        Ok(scorer) => {
            tracing::info!(
                path = %path.display(),
                threshold = scorer.threshold(),
                "loaded anomaly scorer"
            );
            Some(Arc::new(scorer))
        }
        Err(e @ ScorerError::ArtifactNotFound { .. }) => {
            tracing::warn!(error = %e, "anomaly scorer not available, anomaly detection disabled");
            None
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                "failed to load anomaly scorer, anomaly detection disabled"
            );
            None
        }
    }
}
