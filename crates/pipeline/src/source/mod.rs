//! 로그 소스 -- 파일에서 원시 라인을 읽어 버스의 `log.raw` 토픽으로 발행합니다.
//!
//! # 모드
//! - [`SourceMode::Follow`]: 파일이 생길 때까지 대기한 뒤 끝에서부터 새 라인을 따라감
//! - [`SourceMode::Replay`]: 처음부터 끝까지 한 번 읽고 종료
//!
//! 소스는 별도의 tokio 태스크 하나에서 실행되며, 하위 단계(파싱, 정규화, 상관 분석,
//! 윈도우 집계)는 모두 이 태스크의 발행 호출 스택 위에서 동기적으로 실행됩니다.
//! 정지는 [`CancellationToken`]으로 요청하고, 유예 시간 내에 끝나지 않으면 강제 종료합니다.

mod file;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use emsight_core::bus::EventBus;
use emsight_core::config::{IngestionConfig, SourceMode};
use emsight_core::event::RawLog;
use emsight_core::metrics as m;

use crate::error::EmsightPipelineError;

/// 파일 기반 로그 소스
#[derive(Debug, Clone)]
pub struct LogSource {
    path: PathBuf,
    mode: SourceMode,
    poll_interval: Duration,
    wait_interval: Duration,
}

impl LogSource {
    /// 수집 설정으로 생성합니다.
    pub fn new(config: &IngestionConfig) -> Self {
        Self {
            path: PathBuf::from(&config.source_file),
            mode: config.mode,
            poll_interval: config.poll_interval(),
            wait_interval: config.wait_interval(),
        }
    }

    /// 경로와 모드로 생성합니다 (기본 간격 사용).
    pub fn with_path(path: impl Into<PathBuf>, mode: SourceMode) -> Self {
        let config = IngestionConfig::default();
        Self {
            path: path.into(),
            mode,
            poll_interval: config.poll_interval(),
            wait_interval: config.wait_interval(),
        }
    }

    /// 폴링 간격을 지정합니다.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// 파일 대기 간격을 지정합니다.
    pub fn wait_interval(mut self, interval: Duration) -> Self {
        self.wait_interval = interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> SourceMode {
        self.mode
    }

    /// 원시 로그의 소스 식별자 (`file:<path>`)
    pub fn label(&self) -> String {
        format!("file:{}", self.path.display())
    }

    /// 취소될 때까지(replay는 파일 끝까지) 라인을 읽어 버스에 발행합니다.
    ///
    /// 발행한 라인 수를 반환합니다.
    pub async fn run(
        &self,
        bus: &EventBus,
        cancel: &CancellationToken,
    ) -> Result<u64, EmsightPipelineError> {
        let label = self.label();
        let publish = |line: &str| {
            metrics::counter!(m::SOURCE_LINES_READ_TOTAL).increment(1);
            bus.publish(RawLog::new(line, label.as_str()));
        };

        match self.mode {
            SourceMode::Replay => file::replay(&self.path, cancel, publish).await,
            SourceMode::Follow => {
                file::follow(
                    &self.path,
                    self.poll_interval,
                    self.wait_interval,
                    cancel,
                    publish,
                )
                .await
            }
        }
    }

    /// 소스를 백그라운드 태스크로 시작합니다.
    pub fn spawn(self, bus: Arc<EventBus>, cancel: CancellationToken) -> SourceHandle {
        info!(path = %self.path.display(), mode = %self.mode, "starting log source");
        let path = self.path.display().to_string();
        let task_cancel = cancel.clone();
        let join = tokio::spawn(async move { self.run(&bus, &task_cancel).await });
        SourceHandle { path, cancel, join }
    }
}

/// 실행 중인 로그 소스 태스크 핸들
#[derive(Debug)]
pub struct SourceHandle {
    path: String,
    cancel: CancellationToken,
    join: JoinHandle<Result<u64, EmsightPipelineError>>,
}

impl SourceHandle {
    /// 정지를 요청합니다 (다음 폴링/반복 경계에서 멈춤).
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 태스크가 끝났는지 여부
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// 태스크가 스스로 끝날 때까지 기다립니다 (replay 완료 등).
    pub async fn wait(self) -> Result<u64, EmsightPipelineError> {
        let path = self.path;
        self.join.await.map_err(|e| EmsightPipelineError::Source {
            path,
            reason: format!("source task failed: {e}"),
        })?
    }

    /// 정지를 요청하고 최대 `grace` 동안 기다린 뒤, 그래도 끝나지 않으면 강제 종료합니다.
    pub async fn stop(mut self, grace: Duration) -> Result<u64, EmsightPipelineError> {
        self.cancel.cancel();
        match tokio::time::timeout(grace, &mut self.join).await {
            Ok(joined) => joined.map_err(|e| EmsightPipelineError::Source {
                path: self.path.clone(),
                reason: format!("source task failed: {e}"),
            })?,
            Err(_) => {
                warn!(
                    path = %self.path,
                    grace_ms = grace.as_millis() as u64,
                    "log source did not stop within grace period, aborting"
                );
                self.join.abort();
                Err(EmsightPipelineError::Source {
                    path: self.path,
                    reason: format!("forced termination after {grace:?}"),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_uses_file_prefix() {
        let source = LogSource::with_path("/var/log/ems.log", SourceMode::Replay);
        assert_eq!(source.label(), "file:/var/log/ems.log");
        assert_eq!(source.mode(), SourceMode::Replay);
    }

    #[test]
    fn new_reads_ingestion_config() {
        let config = IngestionConfig {
            source_file: "a.log".to_owned(),
            mode: SourceMode::Replay,
            poll_interval_ms: 7,
            wait_interval_ms: 9,
            stop_grace_ms: 1,
        };
        let source = LogSource::new(&config);
        assert_eq!(source.path(), Path::new("a.log"));
        assert_eq!(source.poll_interval, Duration::from_millis(7));
        assert_eq!(source.wait_interval, Duration::from_millis(9));
    }
}
