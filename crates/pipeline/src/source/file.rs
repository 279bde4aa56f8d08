//! 파일 읽기 루프 -- follow(tail -f) / replay
//!
//! 두 루프 모두 읽은 라인을 앞뒤 공백을 제거한 뒤 콜백으로 넘기며,
//! 빈 라인은 건너뜁니다. 잘못된 UTF-8 바이트는 대체 문자로 치환합니다.

use std::io::{ErrorKind, SeekFrom};
use std::path::Path;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::EmsightPipelineError;

fn source_error(path: &Path, err: impl std::fmt::Display) -> EmsightPipelineError {
    EmsightPipelineError::Source {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

/// 완성된 라인 하나를 정리해 콜백으로 넘깁니다. 넘겼으면 `true`.
fn emit_line(buf: &[u8], emit: &mut impl FnMut(&str)) -> bool {
    let text = String::from_utf8_lossy(buf);
    let line = text.trim();
    if line.is_empty() {
        return false;
    }
    emit(line);
    true
}

/// 파일을 처음부터 끝까지 한 번 읽습니다.
///
/// 파일이 없으면 에러 로그를 남기고 [`EmsightPipelineError::SourceNotFound`]를 반환합니다.
/// 취소 신호는 라인마다 확인합니다.
pub(crate) async fn replay(
    path: &Path,
    cancel: &CancellationToken,
    mut emit: impl FnMut(&str),
) -> Result<u64, EmsightPipelineError> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            error!(path = %path.display(), "replay source file not found");
            return Err(EmsightPipelineError::SourceNotFound {
                path: path.display().to_string(),
            });
        }
        Err(e) => return Err(source_error(path, e)),
    };

    info!(path = %path.display(), "replaying log file");

    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut emitted = 0u64;

    loop {
        if cancel.is_cancelled() {
            info!(path = %path.display(), emitted, "replay cancelled");
            return Ok(emitted);
        }
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| source_error(path, e))?;
        if n == 0 {
            break;
        }
        if emit_line(&buf, &mut emit) {
            emitted += 1;
        }
    }

    info!(path = %path.display(), emitted, "replay complete");
    Ok(emitted)
}

/// 파일 끝에서부터 새로 추가되는 라인을 따라갑니다.
///
/// - 파일이 없으면 경고를 한 번 남기고 `wait_interval`마다 다시 확인합니다.
/// - 새 데이터가 없으면 `poll_interval`만큼 대기합니다.
/// - 개행 없이 끝난 부분 라인은 나머지가 기록될 때까지 보류합니다.
/// - 파일 크기가 읽은 위치보다 작아지면(truncation) 처음부터 다시 읽습니다.
pub(crate) async fn follow(
    path: &Path,
    poll_interval: Duration,
    wait_interval: Duration,
    cancel: &CancellationToken,
    mut emit: impl FnMut(&str),
) -> Result<u64, EmsightPipelineError> {
    let mut warned = false;
    let file = loop {
        match File::open(path).await {
            Ok(file) => break file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if !warned {
                    warn!(
                        path = %path.display(),
                        wait_ms = wait_interval.as_millis() as u64,
                        "log file not found, waiting for it to appear"
                    );
                    warned = true;
                }
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(0),
                    _ = tokio::time::sleep(wait_interval) => {}
                }
            }
            Err(e) => return Err(source_error(path, e)),
        }
    };

    let mut reader = BufReader::new(file);
    let mut offset = reader
        .seek(SeekFrom::End(0))
        .await
        .map_err(|e| source_error(path, e))?;
    info!(path = %path.display(), offset, "following log file");

    let mut pending = Vec::new();
    let mut emitted = 0u64;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let n = reader
            .read_until(b'\n', &mut pending)
            .await
            .map_err(|e| source_error(path, e))?;

        if n == 0 {
            if let Ok(meta) = tokio::fs::metadata(path).await
                && meta.len() < offset
            {
                info!(path = %path.display(), "log file truncated, reading from start");
                offset = reader
                    .seek(SeekFrom::Start(0))
                    .await
                    .map_err(|e| source_error(path, e))?;
                pending.clear();
                continue;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(poll_interval) => continue,
            }
        }

        offset += n as u64;
        if pending.last() != Some(&b'\n') {
            debug!(bytes = pending.len(), "partial line, waiting for newline");
            continue;
        }
        if emit_line(&pending, &mut emit) {
            emitted += 1;
        }
        pending.clear();
    }

    info!(path = %path.display(), emitted, "stopped following log file");
    Ok(emitted)
}
