//! EMS 라인 파서
//!
//! syslog 스타일의 ONTAP EMS 라인을 [`GenericRecord`]로 분해합니다.
//!
//! # 와이어 형식
//! ```text
//! <PRI>MMM DD HH:MM:SS [node:event-name:severity]: message text
//! ```
//!
//! 형식이 맞지 않거나 공백뿐인 라인은 `None`을 반환합니다 (에러가 아님).
//!
//! # 연도 추론
//! 타임스탬프에는 연도가 없으므로 현재 연도를 가정합니다. 결과가 현재 시각보다
//! 2일 넘게 미래이면 전년도로 재해석합니다 (12월 → 1월 로그 처리).

use std::sync::LazyLock;

use chrono::{Datelike, Duration, Local, NaiveDateTime};
use regex::Regex;
use tracing::debug;

use emsight_core::metrics as m;
use emsight_core::types::GenericRecord;

static LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^<(\d+)>([A-Z][a-z]{2}\s+\d+\s\d{2}:\d{2}:\d{2})\s\[(.*?):(.*?):(.*?)\]: (.*)$",
    )
    .expect("line pattern is a valid regex")
});

/// 미래 타임스탬프 허용 범위
const FUTURE_TOLERANCE_DAYS: i64 = 2;

/// EMS 라인 파서
///
/// 상태가 없으므로 여러 스레드에서 공유할 수 있습니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineParser;

impl LineParser {
    /// 새 파서를 생성합니다.
    pub fn new() -> Self {
        Self
    }

    /// 현재 로컬 시각을 기준으로 라인을 파싱합니다.
    pub fn parse(&self, line: &str) -> Option<GenericRecord> {
        self.parse_at(line, Local::now().naive_local())
    }

    /// 주어진 기준 시각으로 라인을 파싱합니다.
    ///
    /// `now`는 연도 추론에만 사용됩니다.
    pub fn parse_at(&self, line: &str, now: NaiveDateTime) -> Option<GenericRecord> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let Some(caps) = LINE_PATTERN.captures(line) else {
            return drop_line(line, "wire format mismatch");
        };

        let Ok(priority) = caps[1].parse::<u32>() else {
            return drop_line(line, "priority out of range");
        };
        let timestamp_text = &caps[2];
        let Some(timestamp) = infer_timestamp(timestamp_text, now) else {
            return drop_line(line, "timestamp does not exist in inferred year");
        };

        Some(GenericRecord {
            priority,
            timestamp,
            timestamp_text: timestamp_text.to_owned(),
            node: caps[3].to_owned(),
            event_name: caps[4].to_owned(),
            severity: caps[5].to_owned(),
            message: caps[6].to_owned(),
        })
    }
}

fn drop_line(line: &str, reason: &'static str) -> Option<GenericRecord> {
    metrics::counter!(m::PARSER_LINES_DROPPED_TOTAL).increment(1);
    debug!(line, reason, "dropping unparseable line");
    None
}

/// 연도 없는 syslog 타임스탬프에 연도를 붙여 파싱합니다.
///
/// 해당 연도에 존재하지 않는 날짜(2월 29일)는 전년도로 재시도합니다.
fn infer_timestamp(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    // "Jan  2" 처럼 공백이 여러 개인 경우 정규화
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let year = now.year();

    let at_year = |y: i32| {
        NaiveDateTime::parse_from_str(&format!("{y} {normalized}"), "%Y %b %d %H:%M:%S").ok()
    };

    match at_year(year) {
        Some(ts) if ts > now + Duration::days(FUTURE_TOLERANCE_DAYS) => at_year(year - 1),
        Some(ts) => Some(ts),
        None => at_year(year - 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    const DISK_LINE: &str =
        "<131>Jan 22 12:05:00 [n1:disk.outOfService:ERROR]: Disk 1.2 on shelf 1 failed.";

    #[test]
    fn parses_valid_line() {
        let record = LineParser::new()
            .parse_at(DISK_LINE, at(2026, 3, 1, 0, 0, 0))
            .unwrap();
        assert_eq!(record.priority, 131);
        assert_eq!(record.timestamp, at(2026, 1, 22, 12, 5, 0));
        assert_eq!(record.timestamp_text, "Jan 22 12:05:00");
        assert_eq!(record.node, "n1");
        assert_eq!(record.event_name, "disk.outOfService");
        assert_eq!(record.severity, "ERROR");
        assert_eq!(record.message, "Disk 1.2 on shelf 1 failed.");
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let line = format!("  {DISK_LINE}\r\n");
        assert!(LineParser::new().parse_at(&line, at(2026, 3, 1, 0, 0, 0)).is_some());
    }

    #[test]
    fn malformed_lines_yield_none() {
        let parser = LineParser::new();
        let now = at(2026, 3, 1, 0, 0, 0);
        for line in [
            "",
            "   ",
            "Jan 22 12:05:00 [n1:disk.outOfService:ERROR]: no priority",
            "<131>Jan 22 12:05:00 n1 disk.outOfService ERROR: no brackets",
            "<131>2026-01-22T12:05:00 [n1:e:ERROR]: iso timestamp",
            "<abc>Jan 22 12:05:00 [n1:e:ERROR]: bad priority",
            "<99999999999>Jan 22 12:05:00 [n1:e:ERROR]: priority overflow",
            "<131>Jan 22 12:05:00 [n1:e:ERROR] missing colon",
        ] {
            assert!(parser.parse_at(line, now).is_none(), "should drop: {line:?}");
        }
    }

    #[test]
    fn large_priority_is_kept() {
        let line = "<99999>Jan 22 12:05:00 [n1:e:ERROR]: vendor priority";
        let record = LineParser::new()
            .parse_at(line, at(2026, 3, 1, 0, 0, 0))
            .unwrap();
        assert_eq!(record.priority, 99_999);
    }

    #[test]
    fn single_digit_day_with_double_space() {
        let line = "<6>Feb  3 01:02:03 [node-01:kern.uptime.info:INFORMATIONAL]: up";
        let record = LineParser::new()
            .parse_at(line, at(2026, 3, 1, 0, 0, 0))
            .unwrap();
        assert_eq!(record.timestamp, at(2026, 2, 3, 1, 2, 3));
        assert_eq!(record.timestamp_text, "Feb  3 01:02:03");
    }

    #[test]
    fn december_log_read_in_january_is_previous_year() {
        let line = "<131>Dec 31 23:59:59 [n1:e:ERROR]: end of year";
        let record = LineParser::new()
            .parse_at(line, at(2026, 1, 1, 0, 10, 0))
            .unwrap();
        assert_eq!(record.timestamp, at(2025, 12, 31, 23, 59, 59));
    }

    #[test]
    fn near_future_within_tolerance_keeps_current_year() {
        let line = "<131>Mar 02 12:00:00 [n1:e:ERROR]: clock skew";
        let record = LineParser::new()
            .parse_at(line, at(2026, 3, 1, 0, 0, 0))
            .unwrap();
        assert_eq!(record.timestamp.year(), 2026);
    }

    #[test]
    fn feb_29_falls_back_to_previous_leap_year_only() {
        let line = "<131>Feb 29 10:00:00 [n1:e:ERROR]: leap";
        // 2025년에는 2월 29일이 없고 2024년에는 있음
        let record = LineParser::new()
            .parse_at(line, at(2025, 3, 1, 0, 0, 0))
            .unwrap();
        assert_eq!(record.timestamp, at(2024, 2, 29, 10, 0, 0));

        // 2026년과 2025년 모두 없음
        assert!(LineParser::new().parse_at(line, at(2026, 3, 1, 0, 0, 0)).is_none());
    }

    #[test]
    fn message_may_contain_colons_and_brackets() {
        let line =
            "<131>Jan 22 12:05:00 [n1:audit.cmd.create:INFORMATIONAL]: User 'admin' executed command 'vol show [-x]: y'.";
        let record = LineParser::new()
            .parse_at(line, at(2026, 3, 1, 0, 0, 0))
            .unwrap();
        assert_eq!(record.event_name, "audit.cmd.create");
        assert_eq!(
            record.message,
            "User 'admin' executed command 'vol show [-x]: y'."
        );
    }

    proptest! {
        #[test]
        fn wire_format_roundtrip(
            priority in 0u32..=191,
            month in 0usize..12,
            day in 1u32..=28,
            hour in 0u32..24,
            minute in 0u32..60,
            second in 0u32..60,
            node in "[a-z][a-z0-9-]{0,11}",
            event in "[a-z][a-zA-Z]{1,8}(\\.[a-zA-Z]{1,8}){1,3}",
            severity in "(EMERGENCY|ALERT|ERROR|WARNING|NOTICE|INFORMATIONAL)",
            message in "[A-Za-z0-9.,'%()_-][A-Za-z0-9 .,'%()_-]{0,59}",
        ) {
            const MONTHS: [&str; 12] = [
                "Jan", "Feb", "Mar", "Apr", "May", "Jun",
                "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
            ];
            let message = message.trim().to_owned();
            let line = format!(
                "<{priority}>{} {day:02} {hour:02}:{minute:02}:{second:02} [{node}:{event}:{severity}]: {message}",
                MONTHS[month]
            );

            let parser = LineParser::new();
            let now = at(2026, 12, 31, 23, 0, 0);
            let record = parser.parse_at(&line, now).expect("valid line must parse");
            let reparsed = parser
                .parse_at(&record.to_wire(), now)
                .expect("formatted record must parse");

            prop_assert_eq!(record.priority, priority);
            prop_assert_eq!(&record.node, &node);
            prop_assert_eq!(&record.event_name, &event);
            prop_assert_eq!(&record.severity, &severity);
            prop_assert_eq!(&record.message, &message);
            prop_assert_eq!(reparsed, record);
        }

        #[test]
        fn arbitrary_input_never_panics(line in "\\PC{0,200}") {
            let _ = LineParser::new().parse_at(&line, at(2026, 6, 1, 0, 0, 0));
        }
    }
}
