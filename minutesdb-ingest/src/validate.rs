//! Two-phase input validation: a cheap structure gate over the document,
//! then a per-record gate that parses into the strict internal model.
//!
//! The schema is open: fields not named here are preserved in the raw
//! fragments and ignored by normalization.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::identity;

const REQUIRED_TOP_LEVEL_FIELDS: [&str; 6] = [
    "workgroup",
    "workgroup_id",
    "meetingInfo",
    "agendaItems",
    "tags",
    "type",
];

const CHILD_COLLECTIONS: [&str; 3] = ["actionItems", "decisionItems", "discussionPoints"];

// Only the first few agenda items are probed; the gate is a compatibility
// check, not a full scan.
const STRUCTURE_GATE_AGENDA_SAMPLE: usize = 5;

/// Checks the first record of the document for structural compatibility.
/// An empty document passes. Failure aborts the whole source.
pub fn check_structure(records: &[Value]) -> Result<(), Vec<String>> {
    let Some(sample) = records.first() else {
        return Ok(());
    };

    let mut errors = Vec::new();

    let Some(sample) = sample.as_object() else {
        return Err(vec!["Record must be an object".to_string()]);
    };

    for field in REQUIRED_TOP_LEVEL_FIELDS {
        if !sample.contains_key(field) {
            errors.push(format!("Missing required field: {field}"));
        }
    }

    if let Some(info) = sample.get("meetingInfo") {
        match info.as_object() {
            None => errors.push("meetingInfo must be an object".to_string()),
            Some(info) => {
                if !info.contains_key("date") {
                    errors.push("Missing required field: meetingInfo.date".to_string());
                }
            }
        }
    }

    if let Some(items) = sample.get("agendaItems") {
        match items.as_array() {
            None => errors.push("agendaItems must be an array".to_string()),
            Some(items) => {
                for (idx, item) in items.iter().take(STRUCTURE_GATE_AGENDA_SAMPLE).enumerate() {
                    let Some(item) = item.as_object() else {
                        continue;
                    };
                    for key in CHILD_COLLECTIONS {
                        if item.get(key).is_some_and(|v| !v.is_array()) {
                            errors.push(format!("agendaItems[{idx}].{key} must be an array"));
                        }
                    }
                }
            }
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// A record-gate failure, carrying the path of the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordError {
    pub field_path: String,
    pub message: String,
}

impl RecordError {
    fn new(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field_path: field_path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field '{}': {}", self.field_path, self.message)
    }
}

impl std::error::Error for RecordError {}

/// One record parsed into the strict internal model. Raw fragments are kept
/// alongside the normalized attributes so the writer can persist provenance
/// without re-serializing.
#[derive(Debug)]
pub struct ValidatedRecord {
    pub source_id: Option<Uuid>,
    pub workgroup: String,
    pub workgroup_id: Uuid,
    pub date_raw: String,
    pub meeting_type: Option<String>,
    pub host: Option<String>,
    pub documenter: Option<String>,
    pub attendees: Vec<String>,
    pub purpose: Option<String>,
    pub video_links: Vec<String>,
    pub working_docs: Option<Value>,
    pub timestamped_video: Option<Value>,
    pub tags: Option<Value>,
    pub agenda_items: Vec<ValidatedAgendaItem>,
    pub raw: Value,
    /// Normalization losses: textless action items dropped, unparseable due
    /// dates nulled, empty attendee/video entries removed.
    pub warnings: i32,
}

#[derive(Debug)]
pub struct ValidatedAgendaItem {
    pub source_id: Option<Uuid>,
    pub status: Option<String>,
    pub action_items: Vec<ValidatedActionItem>,
    pub decision_items: Vec<ValidatedDecisionItem>,
    pub discussion_points: Vec<ValidatedDiscussionPoint>,
    pub raw: Value,
}

#[derive(Debug)]
pub struct ValidatedActionItem {
    pub source_id: Option<Uuid>,
    pub text: String,
    pub assignee: Option<String>,
    pub due_date: Option<chrono::NaiveDate>,
    pub status: Option<String>,
    pub raw: Value,
}

#[derive(Debug)]
pub struct ValidatedDecisionItem {
    pub source_id: Option<Uuid>,
    pub decision_text: String,
    pub rationale: Option<String>,
    pub effect_scope: Option<String>,
    pub raw: Value,
}

#[derive(Debug)]
pub struct ValidatedDiscussionPoint {
    pub source_id: Option<Uuid>,
    pub point_text: String,
    pub raw: Value,
}

#[derive(Deserialize)]
struct RawRecord {
    workgroup: String,
    workgroup_id: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "meetingInfo")]
    meeting_info: RawMeetingInfo,
    #[serde(rename = "agendaItems", default)]
    agenda_items: Option<Vec<Value>>,
    #[serde(default)]
    tags: Option<Value>,
    #[serde(rename = "type", default)]
    meeting_type: Option<String>,
}

#[derive(Deserialize)]
struct RawMeetingInfo {
    date: String,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    documenter: Option<String>,
    #[serde(default)]
    attendees: Option<Vec<String>>,
    #[serde(default)]
    purpose: Option<String>,
    #[serde(rename = "videoLinks", default)]
    video_links: Option<Vec<String>>,
    #[serde(rename = "workingDocs", default)]
    working_docs: Option<Value>,
    #[serde(rename = "timestampedVideo", default)]
    timestamped_video: Option<Value>,
}

#[derive(Deserialize)]
struct RawAgendaItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(rename = "actionItems", default)]
    action_items: Option<Vec<Value>>,
    #[serde(rename = "decisionItems", default)]
    decision_items: Option<Vec<Value>>,
    #[serde(rename = "discussionPoints", default)]
    discussion_points: Option<Vec<Value>>,
}

#[derive(Deserialize)]
struct RawActionItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    assignee: Option<String>,
    #[serde(rename = "dueDate", default)]
    due_date: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize)]
struct RawDecisionItem {
    #[serde(default)]
    id: Option<String>,
    decision: String,
    #[serde(default)]
    rationale: Option<String>,
    #[serde(rename = "effectScope", default)]
    effect_scope: Option<String>,
}

/// The shapes a discussion point arrives in: a bare string, an object with
/// a `point` key, or a single-key object whose value becomes the text.
#[derive(Deserialize)]
#[serde(untagged)]
enum DiscussionPointInput {
    Text(String),
    Keyed(KeyedDiscussionPoint),
    Object(serde_json::Map<String, Value>),
}

#[derive(Deserialize)]
struct KeyedDiscussionPoint {
    #[serde(default)]
    id: Option<String>,
    point: String,
}

fn deserialize_at<T: serde::de::DeserializeOwned>(
    value: &Value,
    prefix: &str,
) -> Result<T, RecordError> {
    serde_path_to_error::deserialize(value.clone()).map_err(|err| {
        let suffix = err.path().to_string();
        let path = match (prefix.is_empty(), suffix.as_str()) {
            (true, _) => suffix.clone(),
            (false, ".") => prefix.to_string(),
            (false, _) => format!("{prefix}.{suffix}"),
        };
        RecordError::new(path, err.inner().to_string())
    })
}

fn parse_optional_uuid(raw: Option<&str>, path: &str) -> Result<Option<Uuid>, RecordError> {
    match raw {
        None => Ok(None),
        Some(raw) => Uuid::parse_str(raw.trim())
            .map(Some)
            .map_err(|_| RecordError::new(path, format!("invalid UUID: {raw}"))),
    }
}

fn required_text(raw: &str, path: &str) -> Result<String, RecordError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(RecordError::new(path, "must not be empty"))
    } else {
        Ok(trimmed.to_string())
    }
}

fn optional_text(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

// Keeps elements as given, dropping those that are empty after trimming.
fn filter_string_array(raw: Option<Vec<String>>, warnings: &mut i32) -> Vec<String> {
    let raw = raw.unwrap_or_default();
    let kept: Vec<String> = raw
        .iter()
        .filter(|item| !item.trim().is_empty())
        .cloned()
        .collect();
    *warnings += (raw.len() - kept.len()) as i32;
    kept
}

/// Parses one record into the strict internal model. Failure skips the
/// record; the document continues.
pub fn validate_record(value: &Value) -> Result<ValidatedRecord, RecordError> {
    let raw: RawRecord = deserialize_at(value, "")?;

    let workgroup = required_text(&raw.workgroup, "workgroup")?;
    let workgroup_id = Uuid::parse_str(raw.workgroup_id.trim())
        .map_err(|_| RecordError::new("workgroup_id", format!("invalid UUID: {}", raw.workgroup_id)))?;
    let source_id = parse_optional_uuid(raw.id.as_deref(), "id")?;

    let date_raw = raw.meeting_info.date.trim().to_string();
    if date_raw.is_empty() {
        return Err(RecordError::new("meetingInfo.date", "must not be empty"));
    }

    let mut warnings = 0;
    let attendees = filter_string_array(raw.meeting_info.attendees, &mut warnings);
    let video_links = filter_string_array(raw.meeting_info.video_links, &mut warnings);

    let agenda_values = raw.agenda_items.unwrap_or_default();
    let mut agenda_items = Vec::with_capacity(agenda_values.len());
    for (idx, item_value) in agenda_values.iter().enumerate() {
        agenda_items.push(validate_agenda_item(item_value, idx, &mut warnings)?);
    }

    Ok(ValidatedRecord {
        source_id,
        workgroup,
        workgroup_id,
        date_raw,
        meeting_type: optional_text(raw.meeting_type),
        host: optional_text(raw.meeting_info.host),
        documenter: optional_text(raw.meeting_info.documenter),
        attendees,
        purpose: optional_text(raw.meeting_info.purpose),
        video_links,
        working_docs: raw.meeting_info.working_docs,
        timestamped_video: raw.meeting_info.timestamped_video,
        tags: raw.tags,
        agenda_items,
        raw: value.clone(),
        warnings,
    })
}

fn validate_agenda_item(
    value: &Value,
    index: usize,
    warnings: &mut i32,
) -> Result<ValidatedAgendaItem, RecordError> {
    let prefix = format!("agendaItems[{index}]");
    let raw: RawAgendaItem = deserialize_at(value, &prefix)?;

    let source_id = parse_optional_uuid(raw.id.as_deref(), &format!("{prefix}.id"))?;

    let mut action_items = Vec::new();
    for (idx, item) in raw.action_items.unwrap_or_default().iter().enumerate() {
        let path = format!("{prefix}.actionItems[{idx}]");
        // Elements with no text at all are silently filtered; this is the
        // only validator-level loss, and it is counted.
        if item.get("text").is_none() {
            *warnings += 1;
            continue;
        }
        let parsed: RawActionItem = deserialize_at(item, &path)?;
        let text = required_text(parsed.text.as_deref().unwrap_or(""), &format!("{path}.text"))?;
        let due_date = match parsed.due_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(due) => match identity::parse_date(due) {
                Some(parsed) => Some(parsed.date()),
                None => {
                    *warnings += 1;
                    None
                }
            },
        };
        action_items.push(ValidatedActionItem {
            source_id: parse_optional_uuid(parsed.id.as_deref(), &format!("{path}.id"))?,
            text,
            assignee: optional_text(parsed.assignee),
            due_date,
            status: optional_text(parsed.status),
            raw: item.clone(),
        });
    }

    let mut decision_items = Vec::new();
    for (idx, item) in raw.decision_items.unwrap_or_default().iter().enumerate() {
        let path = format!("{prefix}.decisionItems[{idx}]");
        let parsed: RawDecisionItem = deserialize_at(item, &path)?;
        decision_items.push(ValidatedDecisionItem {
            source_id: parse_optional_uuid(parsed.id.as_deref(), &format!("{path}.id"))?,
            decision_text: required_text(&parsed.decision, &format!("{path}.decision"))?,
            rationale: optional_text(parsed.rationale),
            effect_scope: optional_text(parsed.effect_scope),
            raw: item.clone(),
        });
    }

    let mut discussion_points = Vec::new();
    for (idx, item) in raw.discussion_points.unwrap_or_default().iter().enumerate() {
        let path = format!("{prefix}.discussionPoints[{idx}]");
        discussion_points.push(validate_discussion_point(item, &path)?);
    }

    Ok(ValidatedAgendaItem {
        source_id,
        status: optional_text(raw.status),
        action_items,
        decision_items,
        discussion_points,
        raw: value.clone(),
    })
}

fn validate_discussion_point(
    value: &Value,
    path: &str,
) -> Result<ValidatedDiscussionPoint, RecordError> {
    let input: DiscussionPointInput = deserialize_at(value, path)?;

    let (source_id, point_text) = match input {
        DiscussionPointInput::Text(text) => (None, text),
        DiscussionPointInput::Keyed(keyed) => (
            parse_optional_uuid(keyed.id.as_deref(), &format!("{path}.id"))?,
            keyed.point,
        ),
        DiscussionPointInput::Object(map) => {
            // Single-key object: the value becomes the point text, coerced
            // to a string as a last resort.
            if map.len() != 1 {
                return Err(RecordError::new(
                    path,
                    "discussion point object must have a 'point' key or a single key",
                ));
            }
            let value = map.values().next().map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
            (None, value.unwrap_or_default())
        }
    };

    Ok(ValidatedDiscussionPoint {
        source_id,
        point_text: required_text(&point_text, &format!("{path}.point"))?,
        raw: value.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_record() -> Value {
        json!({
            "workgroup": "Archives WG",
            "workgroup_id": "11111111-1111-1111-1111-111111111111",
            "meetingInfo": { "date": "2024-06-01", "host": "H" },
            "agendaItems": [ { "actionItems": [ { "text": "do x" } ] } ],
            "tags": {},
            "type": "regular"
        })
    }

    #[test]
    fn structure_gate_accepts_empty_document() {
        assert!(check_structure(&[]).is_ok());
    }

    #[test]
    fn structure_gate_accepts_minimal_record() {
        assert!(check_structure(&[minimal_record()]).is_ok());
    }

    #[test]
    fn structure_gate_rejects_missing_top_level_fields() {
        let errors = check_structure(&[json!({ "workgroup": "W" })]).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("workgroup_id")));
        assert!(errors.iter().any(|e| e.contains("meetingInfo")));
        assert!(errors.iter().any(|e| e.contains("tags")));
    }

    #[test]
    fn structure_gate_rejects_non_array_child_collections() {
        let mut record = minimal_record();
        record["agendaItems"][0]["decisionItems"] = json!("not an array");
        let errors = check_structure(&[record]).unwrap_err();
        assert_eq!(errors, ["agendaItems[0].decisionItems must be an array"]);
    }

    #[test]
    fn structure_gate_ignores_additional_fields() {
        let mut record = minimal_record();
        record["futureField"] = json!({"deeply": {"nested": true}});
        assert!(check_structure(&[record]).is_ok());
    }

    #[test]
    fn record_gate_parses_minimal_record() {
        let record = validate_record(&minimal_record()).unwrap();
        assert_eq!(record.workgroup, "Archives WG");
        assert_eq!(record.date_raw, "2024-06-01");
        assert_eq!(record.agenda_items.len(), 1);
        assert_eq!(record.agenda_items[0].action_items[0].text, "do x");
        assert_eq!(record.warnings, 0);
    }

    #[test]
    fn record_gate_rejects_invalid_workgroup_uuid() {
        let mut record = minimal_record();
        record["workgroup_id"] = json!("not-a-uuid");
        let err = validate_record(&record).unwrap_err();
        assert_eq!(err.field_path, "workgroup_id");
    }

    #[test]
    fn record_gate_rejects_blank_workgroup_name() {
        let mut record = minimal_record();
        record["workgroup"] = json!("   ");
        let err = validate_record(&record).unwrap_err();
        assert_eq!(err.field_path, "workgroup");
    }

    #[test]
    fn record_gate_reports_nested_field_paths() {
        let mut record = minimal_record();
        record["agendaItems"][0]["decisionItems"] = json!([{ "rationale": "no decision text" }]);
        let err = validate_record(&record).unwrap_err();
        assert!(err.field_path.starts_with("agendaItems[0].decisionItems[0]"));
    }

    #[test]
    fn record_gate_rejects_invalid_nested_id() {
        let mut record = minimal_record();
        record["agendaItems"][0]["id"] = json!("999");
        let err = validate_record(&record).unwrap_err();
        assert_eq!(err.field_path, "agendaItems[0].id");
    }

    #[test]
    fn null_collections_normalize_to_empty() {
        let mut record = minimal_record();
        record["agendaItems"] = json!([{
            "actionItems": null,
            "decisionItems": null,
            "discussionPoints": null
        }]);
        let record = validate_record(&record).unwrap();
        assert!(record.agenda_items[0].action_items.is_empty());
        assert!(record.agenda_items[0].decision_items.is_empty());
        assert!(record.agenda_items[0].discussion_points.is_empty());
    }

    #[test]
    fn textless_action_items_are_dropped_and_counted() {
        let mut record = minimal_record();
        record["agendaItems"][0]["actionItems"] = json!([
            { "text": "keep me" },
            { "assignee": "nobody" },
            { "text": "also keep" }
        ]);
        let record = validate_record(&record).unwrap();
        let texts: Vec<_> = record.agenda_items[0]
            .action_items
            .iter()
            .map(|a| a.text.as_str())
            .collect();
        assert_eq!(texts, ["keep me", "also keep"]);
        assert_eq!(record.warnings, 1);
    }

    #[test]
    fn unparseable_due_date_degrades_to_none_with_a_warning() {
        let mut record = minimal_record();
        record["agendaItems"][0]["actionItems"] = json!([
            { "text": "do x", "dueDate": "sometime next week" }
        ]);
        let record = validate_record(&record).unwrap();
        assert!(record.agenda_items[0].action_items[0].due_date.is_none());
        assert_eq!(record.warnings, 1);
    }

    #[test]
    fn discussion_points_accept_all_three_shapes() {
        let mut record = minimal_record();
        record["agendaItems"][0]["discussionPoints"] = json!([
            "hello",
            { "point": "world" },
            { "note": "!" }
        ]);
        let record = validate_record(&record).unwrap();
        let texts: Vec<_> = record.agenda_items[0]
            .discussion_points
            .iter()
            .map(|p| p.point_text.as_str())
            .collect();
        assert_eq!(texts, ["hello", "world", "!"]);
    }

    #[test]
    fn empty_discussion_point_is_a_record_failure() {
        let mut record = minimal_record();
        record["agendaItems"][0]["discussionPoints"] = json!(["  "]);
        let err = validate_record(&record).unwrap_err();
        assert_eq!(err.field_path, "agendaItems[0].discussionPoints[0].point");
    }

    #[test]
    fn attendees_drop_empty_entries_preserving_order() {
        let mut record = minimal_record();
        record["meetingInfo"]["attendees"] = json!(["Ann", "  ", "Ben", ""]);
        let record = validate_record(&record).unwrap();
        assert_eq!(record.attendees, ["Ann", "Ben"]);
        assert_eq!(record.warnings, 2);
    }

    #[test]
    fn additional_fields_do_not_change_normalization() {
        let mut record = minimal_record();
        record["customField"] = json!(42);
        record["meetingInfo"]["extra"] = json!(["anything"]);
        record["agendaItems"][0]["narrative"] = json!("free text");
        let parsed = validate_record(&record).unwrap();
        assert_eq!(parsed.workgroup, "Archives WG");
        assert_eq!(parsed.agenda_items[0].action_items.len(), 1);
        assert_eq!(parsed.warnings, 0);
        // The unknown fields survive in the raw fragment.
        assert_eq!(parsed.raw["customField"], 42);
    }
}
