//! 파이프라인 에러 타입
//!
//! [`EmsightPipelineError`]는 파이프라인 내부에서 발생하는 에러를 표현합니다.
//! `From<EmsightPipelineError> for EmsightError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.
//!
//! 파싱 실패는 에러가 아닙니다. 형식이 맞지 않는 라인은 조용히 버려지고,
//! 필드 추출 실패는 기본값으로 대체됩니다.

use emsight_core::error::{EmsightError, PipelineError};

/// 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum EmsightPipelineError {
    /// 리플레이 소스 파일 없음
    #[error("source file not found: {path}")]
    SourceNotFound {
        /// 파일 경로
        path: String,
    },

    /// 소스 읽기 실패
    #[error("source error: {path}: {reason}")]
    Source {
        /// 파일 경로
        path: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<EmsightPipelineError> for EmsightError {
    fn from(err: EmsightPipelineError) -> Self {
        match err {
            EmsightPipelineError::SourceNotFound { path } => {
                EmsightError::Pipeline(PipelineError::SourceNotFound { path })
            }
            source @ EmsightPipelineError::Source { .. } => {
                EmsightError::Pipeline(PipelineError::SourceFailed(source.to_string()))
            }
        }
    }
}
