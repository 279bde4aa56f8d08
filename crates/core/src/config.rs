//! 설정 관리 -- emsight.toml 파싱 및 런타임 설정
//!
//! [`EmsightConfig`]는 모든 단계의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선, 데몬에서 적용)
//! 2. 환경변수 (`EMSIGHT_INGESTION_MODE=replay` 형식)
//! 3. 설정 파일 (`emsight.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), emsight_core::error::EmsightError> {
//! use emsight_core::config::EmsightConfig;
//!
//! let config = EmsightConfig::load("emsight.toml").await?;
//! let config = EmsightConfig::parse("[correlation]\nwindow_secs = 30")?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, EmsightError};

/// emsight 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmsightConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 수집 설정
    #[serde(default)]
    pub ingestion: IngestionConfig,
    /// 상관 분석 설정
    #[serde(default)]
    pub correlation: CorrelationConfig,
    /// 이상 탐지 설정
    #[serde(default)]
    pub anomaly: AnomalyConfig,
}

impl EmsightConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서: 파일 파싱 → 환경변수 오버라이드 → 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, EmsightError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, EmsightError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EmsightError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                EmsightError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, EmsightError> {
        toml::from_str(toml_str).map_err(|e| {
            EmsightError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 네이밍 규칙: `EMSIGHT_{SECTION}_{FIELD}`. 파싱할 수 없는 값은 경고 후 무시합니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "EMSIGHT_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "EMSIGHT_GENERAL_LOG_FORMAT");

        // Ingestion
        override_string(
            &mut self.ingestion.source_file,
            "EMSIGHT_INGESTION_SOURCE_FILE",
        );
        override_parsed(&mut self.ingestion.mode, "EMSIGHT_INGESTION_MODE");
        override_parsed(
            &mut self.ingestion.poll_interval_ms,
            "EMSIGHT_INGESTION_POLL_INTERVAL_MS",
        );
        override_parsed(
            &mut self.ingestion.wait_interval_ms,
            "EMSIGHT_INGESTION_WAIT_INTERVAL_MS",
        );
        override_parsed(
            &mut self.ingestion.stop_grace_ms,
            "EMSIGHT_INGESTION_STOP_GRACE_MS",
        );

        // Correlation
        override_parsed(
            &mut self.correlation.window_secs,
            "EMSIGHT_CORRELATION_WINDOW_SECS",
        );

        // Anomaly
        override_parsed(&mut self.anomaly.enabled, "EMSIGHT_ANOMALY_ENABLED");
        override_parsed(&mut self.anomaly.window_secs, "EMSIGHT_ANOMALY_WINDOW_SECS");
        override_string(&mut self.anomaly.scorer_path, "EMSIGHT_ANOMALY_SCORER_PATH");
        override_string(
            &mut self.anomaly.high_value_event,
            "EMSIGHT_ANOMALY_HIGH_VALUE_EVENT",
        );
        override_string(
            &mut self.anomaly.high_value_label,
            "EMSIGHT_ANOMALY_HIGH_VALUE_LABEL",
        );
        override_parsed(
            &mut self.anomaly.error_threshold,
            "EMSIGHT_ANOMALY_ERROR_THRESHOLD",
        );
        override_parsed(
            &mut self.anomaly.latency_threshold_ms,
            "EMSIGHT_ANOMALY_LATENCY_THRESHOLD_MS",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), EmsightError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.ingestion.source_file.trim().is_empty() {
            return Err(invalid("ingestion.source_file", "must not be empty"));
        }

        let intervals = [
            ("ingestion.poll_interval_ms", self.ingestion.poll_interval_ms),
            ("ingestion.wait_interval_ms", self.ingestion.wait_interval_ms),
            ("ingestion.stop_grace_ms", self.ingestion.stop_grace_ms),
            ("correlation.window_secs", self.correlation.window_secs),
            ("anomaly.window_secs", self.anomaly.window_secs),
        ];
        for (field, value) in intervals {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }

        let latency = self.anomaly.latency_threshold_ms;
        if !latency.is_finite() || latency < 0.0 {
            return Err(invalid(
                "anomaly.latency_threshold_ms",
                "must be a finite, non-negative number",
            ));
        }

        if self.anomaly.enabled && self.anomaly.high_value_event.trim().is_empty() {
            return Err(invalid(
                "anomaly.high_value_event",
                "must not be empty when anomaly detection is enabled",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> EmsightError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 로그 소스 동작 모드
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// 파일 끝에서부터 새로 추가되는 라인을 계속 따라감
    #[default]
    Follow,
    /// 파일 처음부터 끝까지 한 번 읽고 종료
    Replay,
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Follow => write!(f, "follow"),
            Self::Replay => write!(f, "replay"),
        }
    }
}

impl FromStr for SourceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "follow" => Ok(Self::Follow),
            "replay" => Ok(Self::Replay),
            other => Err(format!("unknown source mode '{other}' (expected follow|replay)")),
        }
    }
}

/// 수집 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// 대상 로그 파일 경로
    pub source_file: String,
    /// 동작 모드
    pub mode: SourceMode,
    /// 새 데이터가 없을 때 대기 간격 (ms)
    pub poll_interval_ms: u64,
    /// 파일이 생길 때까지 확인 간격 (ms)
    pub wait_interval_ms: u64,
    /// 정지 시 종료 대기 유예 시간 (ms)
    pub stop_grace_ms: u64,
}

impl IngestionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn wait_interval(&self) -> Duration {
        Duration::from_millis(self.wait_interval_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            source_file: "logs/ontap_ems.log".to_owned(),
            mode: SourceMode::Follow,
            poll_interval_ms: 500,
            wait_interval_ms: 1000,
            stop_grace_ms: 2000,
        }
    }
}

/// 상관 분석 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// 슬라이딩 윈도우 크기 (초, 이벤트 시각 기준)
    pub window_secs: u64,
}

impl CorrelationConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self { window_secs: 60 }
    }
}

/// 이상 탐지 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// 활성화 여부 (점수 계산기가 없으면 활성화와 무관하게 비활성)
    pub enabled: bool,
    /// 윈도우 폭 (초, 벽시계 기준)
    pub window_secs: u64,
    /// 점수 계산기 아티팩트 경로
    pub scorer_path: String,
    /// 별도로 집계할 고가치 이벤트 이름
    pub high_value_event: String,
    /// 설명문에 쓰이는 고가치 이벤트 레이블
    pub high_value_label: String,
    /// 설명문 생성 시 에러 수 임계값 (초과 시 언급)
    pub error_threshold: u64,
    /// 설명문 생성 시 평균 지연시간 임계값 (ms, 초과 시 언급)
    pub latency_threshold_ms: f64,
}

impl AnomalyConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 10,
            scorer_path: "models/baseline.json".to_owned(),
            high_value_event: "monitor.volume.nearlyFull".to_owned(),
            high_value_label: "Volume Capacity Events".to_owned(),
            error_threshold: 2,
            latency_threshold_ms: 50.0,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T>(target: &mut T, env_key: &str)
where
    T: FromStr,
    T::Err: fmt::Display,
{
    if let Ok(val) = std::env::var(env_key) {
        match val.trim().parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(e) => warn!(
                env_key,
                value = val.as_str(),
                error = %e,
                "failed to parse env var override, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = EmsightConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.ingestion.mode, SourceMode::Follow);
        assert_eq!(config.ingestion.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.correlation.window(), Duration::from_secs(60));
        assert_eq!(config.anomaly.window(), Duration::from_secs(10));
        assert_eq!(config.anomaly.error_threshold, 2);
    }

    #[test]
    fn default_config_passes_validation() {
        EmsightConfig::default().validate().unwrap();
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = EmsightConfig::parse("").unwrap();
        assert_eq!(config.ingestion.source_file, "logs/ontap_ems.log");
        assert!(config.anomaly.enabled);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = EmsightConfig::parse(
            r#"
[ingestion]
mode = "replay"
source_file = "/tmp/ems.log"
"#,
        )
        .unwrap();
        assert_eq!(config.ingestion.mode, SourceMode::Replay);
        assert_eq!(config.ingestion.source_file, "/tmp/ems.log");
        assert_eq!(config.ingestion.poll_interval_ms, 500);
    }

    #[test]
    fn unknown_mode_fails_to_parse() {
        let err = EmsightConfig::parse("[ingestion]\nmode = \"tail\"").unwrap_err();
        assert!(matches!(
            err,
            EmsightError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut config = EmsightConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("general.log_level"));
    }

    #[test]
    fn zero_window_is_rejected() {
        let mut config = EmsightConfig::default();
        config.correlation.window_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("correlation.window_secs"));
    }

    #[test]
    fn nan_latency_threshold_is_rejected() {
        let mut config = EmsightConfig::default();
        config.anomaly.latency_threshold_ms = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_source_file_is_rejected() {
        let mut config = EmsightConfig::default();
        config.ingestion.source_file = "  ".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn source_mode_from_str() {
        assert_eq!("Replay".parse::<SourceMode>().unwrap(), SourceMode::Replay);
        assert_eq!(" follow ".parse::<SourceMode>().unwrap(), SourceMode::Follow);
        assert!("tail".parse::<SourceMode>().is_err());
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let config = EmsightConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed = EmsightConfig::parse(&text).unwrap();
        assert_eq!(parsed.anomaly.high_value_label, config.anomaly.high_value_label);
        assert_eq!(parsed.ingestion.mode, config.ingestion.mode);
    }

    #[tokio::test]
    async fn from_file_missing_returns_file_not_found() {
        let err = EmsightConfig::from_file("/nonexistent/emsight.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EmsightError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
