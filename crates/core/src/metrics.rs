//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않으면 모든 호출은 no-op입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `emsight_`
//! - 단계명: `bus_`, `source_`, `parser_`, `normalizer_`, `correlation_`, `anomaly_`, `topology_`, `daemon_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(emsight_core::metrics::PARSER_LINES_DROPPED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 토픽 레이블 키 (log.raw, event.canonical, ...)
pub const LABEL_TOPIC: &str = "topic";

/// 구독자 이름 레이블 키
pub const LABEL_SUBSCRIBER: &str = "subscriber";

/// 정규화기 이름 레이블 키
pub const LABEL_NORMALIZER: &str = "normalizer";

/// 패턴 이름 레이블 키
pub const LABEL_PATTERN: &str = "pattern";

// ─── Event Bus 메트릭 ──────────────────────────────────────────────

/// Bus: 발행된 메시지 수 (counter, label: topic)
pub const BUS_MESSAGES_PUBLISHED_TOTAL: &str = "emsight_bus_messages_published_total";

/// Bus: 실패한 핸들러 호출 수 (counter, labels: topic, subscriber)
pub const BUS_HANDLER_FAILURES_TOTAL: &str = "emsight_bus_handler_failures_total";

// ─── Ingestion 메트릭 ──────────────────────────────────────────────

/// Source: 읽어 발행한 라인 수 (counter)
pub const SOURCE_LINES_READ_TOTAL: &str = "emsight_source_lines_read_total";

/// Parser: 형식 불일치로 버려진 라인 수 (counter)
pub const PARSER_LINES_DROPPED_TOTAL: &str = "emsight_parser_lines_dropped_total";

// ─── Normalization 메트릭 ──────────────────────────────────────────

/// Normalizer: 정규화된 이벤트 수 (counter, label: normalizer)
pub const EVENTS_NORMALIZED_TOTAL: &str = "emsight_normalizer_events_total";

/// Normalizer: 일반 이벤트로 대체된 수 (counter)
pub const NORMALIZER_FALLBACK_TOTAL: &str = "emsight_normalizer_fallback_total";

/// Topology: 등록된 자산 수 (gauge)
pub const TOPOLOGY_ASSETS: &str = "emsight_topology_assets";

// ─── Correlation 메트릭 ────────────────────────────────────────────

/// Correlation: 생성된 인시던트 수 (counter, label: pattern)
pub const CORRELATION_INCIDENTS_TOTAL: &str = "emsight_correlation_incidents_total";

/// Correlation: 윈도우 버퍼 크기 (gauge)
pub const CORRELATION_BUFFER_SIZE: &str = "emsight_correlation_buffer_size";

// ─── Anomaly 메트릭 ────────────────────────────────────────────────

/// Anomaly: 닫힌 윈도우 수 (counter)
pub const ANOMALY_WINDOWS_CLOSED_TOTAL: &str = "emsight_anomaly_windows_closed_total";

/// Anomaly: 발행된 이상 이벤트 수 (counter)
pub const ANOMALY_EVENTS_TOTAL: &str = "emsight_anomaly_events_total";

// ─── Daemon 메트릭 ─────────────────────────────────────────────────

/// Daemon: 빌드 정보 (gauge, 항상 1, labels: version, mode)
pub const DAEMON_BUILD_INFO: &str = "emsight_daemon_build_info";

/// 모든 메트릭 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다. 레코더가 없으면 아무 일도 하지 않습니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Event Bus
    describe_counter!(
        BUS_MESSAGES_PUBLISHED_TOTAL,
        "Total number of messages published on the event bus"
    );
    describe_counter!(
        BUS_HANDLER_FAILURES_TOTAL,
        "Total number of subscriber handlers that returned an error or panicked"
    );

    // Ingestion
    describe_counter!(
        SOURCE_LINES_READ_TOTAL,
        "Total number of non-empty lines read from the log source"
    );
    describe_counter!(
        PARSER_LINES_DROPPED_TOTAL,
        "Total number of lines dropped because they did not match the EMS format"
    );

    // Normalization
    describe_counter!(
        EVENTS_NORMALIZED_TOTAL,
        "Total number of canonical events produced per normalizer"
    );
    describe_counter!(
        NORMALIZER_FALLBACK_TOTAL,
        "Total number of records normalized to a generic event"
    );
    describe_gauge!(TOPOLOGY_ASSETS, "Number of assets in the topology store");

    // Correlation
    describe_counter!(
        CORRELATION_INCIDENTS_TOTAL,
        "Total number of incidents emitted per cascade pattern"
    );
    describe_gauge!(
        CORRELATION_BUFFER_SIZE,
        "Current number of events retained in the correlation window"
    );

    // Anomaly
    describe_counter!(
        ANOMALY_WINDOWS_CLOSED_TOTAL,
        "Total number of non-empty anomaly windows closed and scored"
    );
    describe_counter!(
        ANOMALY_EVENTS_TOTAL,
        "Total number of anomaly events published"
    );

    // Daemon
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Daemon build information (always 1, labelled with version and source mode)"
    );
}
