//! Deterministic identity derivation. Re-ingesting an identical document
//! must converge on the same UUIDs, so absent source ids are derived as
//! UUIDv5 over fixed namespaces and a stable content key.
//!
//! The namespace constants are published alongside the schema (see the
//! migration that creates the entity tables) and must never change;
//! changing them reissues every derived id.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use miette::Diagnostic;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::{Uuid, uuid};

use crate::validate::ValidatedRecord;

pub const NS_MEETING: Uuid = uuid!("5d26b5ab-7a0e-4a39-95f6-4a1e2cbb9d3e");
pub const NS_AGENDA: Uuid = uuid!("8f7c2d14-9be1-4c55-8a30-6f1d7c4f5b21");
pub const NS_ACTION: Uuid = uuid!("1b42a9c7-0e5f-4d88-b3a1-9c6e2f7d8a54");
pub const NS_DECISION: Uuid = uuid!("6a9d4e21-3c7b-4f02-92e8-5b1f8c3a7d69");
pub const NS_DISCUSSION: Uuid = uuid!("0c3f8b56-2d9a-47e1-a6c4-7e5b1d9f2a83");

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.fZ",
];

const OFFSET_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"];

const FALLBACK_DATE_FORMATS: [&str; 3] = ["%m/%d/%Y", "%d-%m-%Y", "%d/%m/%Y"];

/// Parses a date string, trying ISO 8601 variants first and the legacy
/// formats last. The first matching format wins.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(datetime);
        }
    }

    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(datetime) = DateTime::parse_from_str(raw, format) {
            return Some(datetime.naive_utc());
        }
    }

    for format in FALLBACK_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }

    None
}

#[derive(Debug, Error, Diagnostic)]
pub enum IdentityError {
    #[error("unparseable meeting date: {0}")]
    UnparseableDate(String),
}

/// Resolves a record's meeting id and calendar date. A syntactically valid
/// in-source UUID always wins; otherwise the id is derived from content.
pub fn meeting_identity(record: &ValidatedRecord) -> Result<(Uuid, NaiveDate), IdentityError> {
    let date = parse_date(&record.date_raw)
        .ok_or_else(|| IdentityError::UnparseableDate(record.date_raw.clone()))?
        .date();

    let id = record.source_id.unwrap_or_else(|| {
        derive_meeting_id(
            record.workgroup_id,
            date,
            record.host.as_deref(),
            record.purpose.as_deref(),
            record.agenda_items.len(),
        )
    });

    Ok((id, date))
}

/// Content key: workgroup, date, and a 16-hex-char digest over the fields
/// that distinguish two meetings of the same workgroup on the same day.
pub fn derive_meeting_id(
    workgroup_id: Uuid,
    date: NaiveDate,
    host: Option<&str>,
    purpose: Option<&str>,
    agenda_count: usize,
) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{workgroup_id}:{date}:{}:{}:{agenda_count}",
        host.unwrap_or(""),
        purpose.unwrap_or(""),
    ));
    let digest = hasher.finalize();
    let hash16: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();

    let key = format!("{workgroup_id}:{date}:{hash16}");
    Uuid::new_v5(&NS_MEETING, key.as_bytes())
}

pub fn agenda_item_id(source_id: Option<Uuid>, meeting_id: Uuid, order_index: usize) -> Uuid {
    source_id.unwrap_or_else(|| {
        let key = format!("{meeting_id}:agenda:{order_index}");
        Uuid::new_v5(&NS_AGENDA, key.as_bytes())
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    Action,
    Decision,
    Discussion,
}

impl ChildKind {
    fn namespace(self) -> &'static Uuid {
        match self {
            ChildKind::Action => &NS_ACTION,
            ChildKind::Decision => &NS_DECISION,
            ChildKind::Discussion => &NS_DISCUSSION,
        }
    }

    fn key_name(self) -> &'static str {
        match self {
            ChildKind::Action => "action",
            ChildKind::Decision => "decision",
            ChildKind::Discussion => "discussion",
        }
    }
}

pub fn child_id(
    kind: ChildKind,
    source_id: Option<Uuid>,
    agenda_item_id: Uuid,
    child_index: usize,
) -> Uuid {
    source_id.unwrap_or_else(|| {
        let key = format!("{agenda_item_id}:{}:{child_index}", kind.key_name());
        Uuid::new_v5(kind.namespace(), key.as_bytes())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const WG: Uuid = uuid!("11111111-1111-1111-1111-111111111111");

    fn june_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = derive_meeting_id(WG, june_first(), Some("H"), Some("P"), 3);
        let b = derive_meeting_id(WG, june_first(), Some("H"), Some("P"), 3);
        assert_eq!(a, b);
    }

    #[test]
    fn each_content_component_changes_the_id() {
        let base = derive_meeting_id(WG, june_first(), Some("A"), Some("P"), 1);
        assert_ne!(
            base,
            derive_meeting_id(WG, june_first(), Some("B"), Some("P"), 1)
        );
        assert_ne!(
            base,
            derive_meeting_id(WG, june_first(), Some("A"), Some("Q"), 1)
        );
        assert_ne!(
            base,
            derive_meeting_id(WG, june_first(), Some("A"), Some("P"), 2)
        );
        let other_day = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        assert_ne!(
            base,
            derive_meeting_id(WG, other_day, Some("A"), Some("P"), 1)
        );
    }

    #[test]
    fn child_kinds_never_collide() {
        let agenda = agenda_item_id(None, derive_meeting_id(WG, june_first(), None, None, 0), 0);
        let action = child_id(ChildKind::Action, None, agenda, 0);
        let decision = child_id(ChildKind::Decision, None, agenda, 0);
        let discussion = child_id(ChildKind::Discussion, None, agenda, 0);
        assert_ne!(action, decision);
        assert_ne!(action, discussion);
        assert_ne!(decision, discussion);
    }

    #[test]
    fn source_id_wins_over_derivation() {
        let source = uuid!("22222222-2222-2222-2222-222222222222");
        assert_eq!(agenda_item_id(Some(source), WG, 7), source);
        assert_eq!(child_id(ChildKind::Action, Some(source), WG, 7), source);
    }

    #[test]
    fn parses_the_supported_formats() {
        for raw in [
            "2024-06-01",
            "2024-06-01T09:30:00",
            "2024-06-01T09:30:00Z",
            "2024-06-01T09:30:00+02:00",
            "2024-06-01T09:30:00.250",
            "2024-06-01T09:30:00.250Z",
            "06/01/2024",
            "01-06-2024",
        ] {
            assert!(parse_date(raw).is_some(), "failed to parse {raw}");
        }
        assert!(parse_date("next tuesday").is_none());
        assert!(parse_date("2024-13-40").is_none());
    }

    #[test]
    fn day_first_fallback_applies_when_month_slot_overflows() {
        let parsed = parse_date("13/02/2024").unwrap();
        assert_eq!(parsed.date(), NaiveDate::from_ymd_opt(2024, 2, 13).unwrap());
    }

    proptest! {
        #[test]
        fn derivation_depends_only_on_content(
            host in proptest::option::of("[a-zA-Z ]{0,12}"),
            purpose in proptest::option::of("[a-zA-Z ]{0,12}"),
            agenda_count in 0usize..20,
        ) {
            let a = derive_meeting_id(WG, june_first(), host.as_deref(), purpose.as_deref(), agenda_count);
            let b = derive_meeting_id(WG, june_first(), host.as_deref(), purpose.as_deref(), agenda_count);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn parsed_dates_round_trip_through_iso(y in 1990i32..2100, m in 1u32..13, d in 1u32..29) {
            let date = NaiveDate::from_ymd_opt(y, m, d).unwrap();
            let reparsed = parse_date(&date.format("%Y-%m-%d").to_string()).unwrap();
            prop_assert_eq!(reparsed.date(), date);

            let datetime = date.and_hms_opt(12, 34, 56).unwrap();
            let iso = datetime.format("%Y-%m-%dT%H:%M:%S").to_string();
            prop_assert_eq!(parse_date(&iso).unwrap(), datetime);
        }
    }
}
