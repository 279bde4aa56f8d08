//! 에러 타입 -- 도메인별 에러 정의

/// emsight 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum EmsightError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 이상 점수 계산기 에러
    #[error("scorer error: {0}")]
    Scorer(#[from] ScorerError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 리플레이 소스 파일 없음 (치명적)
    #[error("source file not found: {path}")]
    SourceNotFound { path: String },

    /// 수집 태스크 실패
    #[error("source task failed: {0}")]
    SourceFailed(String),
}

/// 이상 점수 계산기(Scorer) 에러
///
/// 어떤 경우에도 파이프라인을 중단시키지 않으며, 이상 탐지 단계만 비활성화합니다.
#[derive(Debug, thiserror::Error)]
pub enum ScorerError {
    /// 아티팩트 파일 없음
    #[error("scorer artifact not found: {path}")]
    ArtifactNotFound { path: String },

    /// 아티팩트 형식 오류
    #[error("invalid scorer artifact {path}: {reason}")]
    InvalidArtifact { path: String, reason: String },

    /// 점수 계산 실패
    #[error("scoring failed: {0}")]
    ScoringFailed(String),
}
