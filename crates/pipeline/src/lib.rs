//! emsight 파이프라인 -- ONTAP EMS 로그 스트리밍 인텔리전스
//!
//! 원시 EMS 라인을 읽어 정규화된 이벤트로 바꾸고, 자산 토폴로지를 유지하며,
//! 장애 캐스케이드(인시던트)와 통계적 이상 윈도우를 탐지합니다.
//!
//! # 모듈 구성
//!
//! - [`source`]: 파일 follow/replay 로그 소스
//! - [`parser`]: 와이어 형식 라인 파서
//! - [`topology`]: 자산 토폴로지 저장소
//! - [`normalize`]: 이벤트 이름 기반 도메인 정규화기
//! - [`correlation`]: 시간 윈도우 캐스케이드 상관 분석
//! - [`anomaly`]: 윈도우 피처 집계와 이상 점수 계산
//! - [`pipeline`]: 전체 조립 (Pipeline trait 구현)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! LogSource -> [log.raw] -> LineParser -> NormalizerChain -> [event.canonical]
//!                                              |                   |        |
//!                                        TopologyStore    Correlation   Anomaly
//!                                                              |            |
//!                                                     [event.incident] [event.anomaly]
//! ```

pub mod anomaly;
pub mod correlation;
pub mod error;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod source;
pub mod topology;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{IntelligencePipeline, IntelligencePipelineBuilder, PipelineStats};

// 에러
pub use error::EmsightPipelineError;

// 수집/파싱
pub use parser::LineParser;
pub use source::{LogSource, SourceHandle};

// 토폴로지
pub use topology::TopologyStore;

// 정규화
pub use normalize::{Normalizer, NormalizerChain};

// 상관 분석
pub use correlation::{CascadePattern, CorrelationEngine, MatchScope};

// 이상 탐지
pub use anomaly::{AnomalyDetector, BaselineScorer, load_scorer};
