//! 보안 정규화기 -- 관리 명령 감사 로그

use std::sync::LazyLock;

use regex::Regex;

use emsight_core::event::CanonicalEvent;
use emsight_core::types::{GenericRecord, Severity, Subsystem};

use super::{Normalizer, find, text_or_unknown};
use crate::topology::TopologyStore;

pub const AUDIT_COMMAND: &str = "audit.cmd.create";

static AUDIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"User '(.*?)' executed command '(.*)'").expect("valid regex"));

#[derive(Debug, Default, Clone, Copy)]
pub struct SecurityNormalizer;

impl Normalizer for SecurityNormalizer {
    fn name(&self) -> &str {
        "security"
    }

    fn event_names(&self) -> &[&'static str] {
        &[AUDIT_COMMAND]
    }

    fn normalize(&self, record: &GenericRecord, _topology: &TopologyStore) -> CanonicalEvent {
        let caps = find(&AUDIT, &record.message);
        CanonicalEvent::from_record(
            record,
            Subsystem::Security,
            Severity::from_vendor(&record.severity),
            1,
        )
        .with_field("user", text_or_unknown(caps.as_ref(), 1))
        .with_field("command", text_or_unknown(caps.as_ref(), 2))
    }
}
