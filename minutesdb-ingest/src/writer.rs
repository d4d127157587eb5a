//! Transactional materialization of one validated meeting record. All
//! upserts for a meeting and its nested entities happen in a single
//! transaction; any failure rolls the whole meeting back.

use chrono::{DateTime, Utc};
use log::debug;
use miette::Diagnostic;
use minutesdb_db::models::{
    NewActionItem, NewAgendaItem, NewDecisionItem, NewDiscussionPoint, NewMeeting,
};
use minutesdb_db::{Connection, PgConnection, QueryError, db};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

use crate::identity::{self, ChildKind, IdentityError};
use crate::validate::ValidatedRecord;

const MAX_NESTING_DEPTH: usize = 10;

#[derive(Debug, Error, Diagnostic)]
pub enum WriteError {
    #[error("record nests deeper than {MAX_NESTING_DEPTH} levels or references itself")]
    CircularReference,

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Db(#[from] QueryError),
}

pub struct WriteOutcome {
    pub meeting_id: Uuid,
    /// The meeting id already existed, either from a previous run or from an
    /// earlier record in this document; the later record won.
    pub duplicate: bool,
}

pub fn write_meeting(
    conn: &mut PgConnection,
    record: &ValidatedRecord,
    run_id: Uuid,
    source_url: &str,
    now: DateTime<Utc>,
) -> Result<WriteOutcome, WriteError> {
    conn.transaction(|conn| {
        let (meeting_id, meeting_date) = identity::meeting_identity(record)?;

        if exceeds_nesting_limits(&record.raw) {
            return Err(WriteError::CircularReference);
        }

        let duplicate = db::meeting_exists(conn, meeting_id)?;

        db::upsert_meeting(
            conn,
            &NewMeeting {
                id: meeting_id,
                workgroup_id: record.workgroup_id,
                meeting_date,
                meeting_type: record.meeting_type.as_deref(),
                host: record.host.as_deref(),
                documenter: record.documenter.as_deref(),
                attendees: &record.attendees,
                purpose: record.purpose.as_deref(),
                video_links: &record.video_links,
                working_docs: record.working_docs.as_ref(),
                timestamped_video: record.timestamped_video.as_ref(),
                tags: record.tags.as_ref(),
                raw_json: &record.raw,
                source_url: Some(source_url),
                ingestion_run_id: Some(run_id),
                validation_warnings_count: record.warnings,
                updated_at: now,
            },
        )?;

        for (order_index, item) in record.agenda_items.iter().enumerate() {
            let agenda_id = identity::agenda_item_id(item.source_id, meeting_id, order_index);

            db::upsert_agenda_item(
                conn,
                &NewAgendaItem {
                    id: agenda_id,
                    meeting_id,
                    status: item.status.as_deref(),
                    order_index: order_index as i32,
                    raw_json: &item.raw,
                    updated_at: now,
                },
            )?;

            for (idx, action) in item.action_items.iter().enumerate() {
                db::upsert_action_item(
                    conn,
                    &NewActionItem {
                        id: identity::child_id(ChildKind::Action, action.source_id, agenda_id, idx),
                        agenda_item_id: agenda_id,
                        text: &action.text,
                        assignee: action.assignee.as_deref(),
                        due_date: action.due_date,
                        status: action.status.as_deref(),
                        raw_json: &action.raw,
                        updated_at: now,
                    },
                )?;
            }

            for (idx, decision) in item.decision_items.iter().enumerate() {
                db::upsert_decision_item(
                    conn,
                    &NewDecisionItem {
                        id: identity::child_id(
                            ChildKind::Decision,
                            decision.source_id,
                            agenda_id,
                            idx,
                        ),
                        agenda_item_id: agenda_id,
                        decision_text: &decision.decision_text,
                        rationale: decision.rationale.as_deref(),
                        effect_scope: decision.effect_scope.as_deref(),
                        raw_json: &decision.raw,
                        updated_at: now,
                    },
                )?;
            }

            for (idx, point) in item.discussion_points.iter().enumerate() {
                db::upsert_discussion_point(
                    conn,
                    &NewDiscussionPoint {
                        id: identity::child_id(
                            ChildKind::Discussion,
                            point.source_id,
                            agenda_id,
                            idx,
                        ),
                        agenda_item_id: agenda_id,
                        point_text: &point.point_text,
                        order_index: idx as i32,
                        raw_json: &point.raw,
                        updated_at: now,
                    },
                )?;
            }
        }

        debug!(
            "Wrote meeting {meeting_id} with {} agenda items",
            record.agenda_items.len()
        );

        Ok(WriteOutcome {
            meeting_id,
            duplicate,
        })
    })
}

enum Walk<'a> {
    Enter(&'a Value, usize),
    Leave(usize),
}

/// Iterative guard over the raw fragment: rejects trees nested deeper than
/// `MAX_NESTING_DEPTH` and self-referencing values, tracked by an in-flight
/// set of object identities.
pub fn exceeds_nesting_limits(root: &Value) -> bool {
    let mut stack = vec![Walk::Enter(root, 0)];
    let mut in_flight: HashSet<usize> = HashSet::new();

    while let Some(step) = stack.pop() {
        match step {
            Walk::Enter(value, depth) => {
                if depth >= MAX_NESTING_DEPTH {
                    return true;
                }

                let children: Box<dyn Iterator<Item = &Value>> = match value {
                    Value::Array(items) => Box::new(items.iter()),
                    Value::Object(map) => Box::new(map.values()),
                    _ => continue,
                };

                let address = value as *const Value as usize;
                if !in_flight.insert(address) {
                    return true;
                }
                stack.push(Walk::Leave(address));

                for child in children {
                    stack.push(Walk::Enter(child, depth + 1));
                }
            }
            Walk::Leave(address) => {
                in_flight.remove(&address);
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nested_to_depth(depth: usize) -> Value {
        let mut value = json!("leaf");
        for _ in 0..depth {
            value = json!({ "child": value });
        }
        value
    }

    #[test]
    fn typical_records_pass_the_nesting_guard() {
        let record = json!({
            "workgroup": "W",
            "meetingInfo": { "date": "2024-06-01" },
            "agendaItems": [
                { "actionItems": [ { "text": "do x" } ] }
            ]
        });
        assert!(!exceeds_nesting_limits(&record));
    }

    #[test]
    fn depth_twelve_trips_the_guard() {
        assert!(exceeds_nesting_limits(&nested_to_depth(12)));
    }

    #[test]
    fn depth_under_the_bound_passes() {
        assert!(!exceeds_nesting_limits(&nested_to_depth(9)));
    }

    #[test]
    fn wide_but_shallow_documents_pass() {
        let items: Vec<Value> = (0..500).map(|i| json!({ "point": i.to_string() })).collect();
        assert!(!exceeds_nesting_limits(&json!({ "discussionPoints": items })));
    }

    // Requires a migrated database; run with
    //   DATABASE_URL=... cargo test -- --ignored
    #[test]
    #[ignore]
    fn reingesting_an_identical_record_converges_on_the_same_meeting() {
        use minutesdb_db::models::NewWorkgroup;

        let url = minutesdb_db::database_url_from_environment()
            .expect("DATABASE_URL must be set for this test");
        let mut conn = minutesdb_db::PgConnection::establish(&url).unwrap();

        let value = json!({
            "workgroup": "W",
            "workgroup_id": "11111111-1111-1111-1111-111111111111",
            "meetingInfo": { "date": "2024-06-01", "host": "H" },
            "agendaItems": [ { "actionItems": [ { "text": "do x" } ] } ],
            "tags": {},
            "type": "regular"
        });
        let record = crate::validate::validate_record(&value).unwrap();

        db::upsert_workgroup(
            &mut conn,
            &NewWorkgroup {
                id: record.workgroup_id,
                name: &record.workgroup,
                raw_json: &record.raw,
                updated_at: Utc::now(),
            },
        )
        .unwrap();

        let run_id = Uuid::new_v4();
        let first =
            write_meeting(&mut conn, &record, run_id, "test://idempotence", Utc::now()).unwrap();
        let second =
            write_meeting(&mut conn, &record, run_id, "test://idempotence", Utc::now()).unwrap();

        assert_eq!(first.meeting_id, second.meeting_id);
        assert!(second.duplicate);
    }
}
