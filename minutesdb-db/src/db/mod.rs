// Query layer. Every function takes an open connection; transaction scope is
// owned by the caller (the writer holds one transaction per meeting, the
// read API never shares one across requests).

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use uuid::Uuid;

use crate::QueryError;
use crate::models::{
    DbAlertAcknowledgment, DbErrorLogEntry, DbIngestionRun, DbKpis, DbMeetingSummary,
    DbMonthlyAggregate, ErrorType, NewActionItem, NewAgendaItem, NewAlertAcknowledgment,
    NewDecisionItem, NewDiscussionPoint, NewErrorLogEntry, NewIngestionRun, NewMeeting,
    NewWorkgroup, RunStatus,
};

// Upsert primitives. All attributes except created_at are overwritten on
// conflict of the primary key; updated_at carries the transaction timestamp
// supplied by the caller.

pub fn upsert_workgroup(conn: &mut PgConnection, row: &NewWorkgroup) -> QueryResult<usize> {
    use crate::data_schema::data::workgroups::dsl;

    diesel::insert_into(dsl::workgroups)
        .values(row)
        .on_conflict(dsl::id)
        .do_update()
        .set(row)
        .execute(conn)
}

pub fn upsert_meeting(conn: &mut PgConnection, row: &NewMeeting) -> QueryResult<usize> {
    use crate::data_schema::data::meetings::dsl;

    diesel::insert_into(dsl::meetings)
        .values(row)
        .on_conflict(dsl::id)
        .do_update()
        .set(row)
        .execute(conn)
}

pub fn upsert_agenda_item(conn: &mut PgConnection, row: &NewAgendaItem) -> QueryResult<usize> {
    use crate::data_schema::data::agenda_items::dsl;

    diesel::insert_into(dsl::agenda_items)
        .values(row)
        .on_conflict(dsl::id)
        .do_update()
        .set(row)
        .execute(conn)
}

pub fn upsert_action_item(conn: &mut PgConnection, row: &NewActionItem) -> QueryResult<usize> {
    use crate::data_schema::data::action_items::dsl;

    diesel::insert_into(dsl::action_items)
        .values(row)
        .on_conflict(dsl::id)
        .do_update()
        .set(row)
        .execute(conn)
}

pub fn upsert_decision_item(conn: &mut PgConnection, row: &NewDecisionItem) -> QueryResult<usize> {
    use crate::data_schema::data::decision_items::dsl;

    diesel::insert_into(dsl::decision_items)
        .values(row)
        .on_conflict(dsl::id)
        .do_update()
        .set(row)
        .execute(conn)
}

pub fn upsert_discussion_point(
    conn: &mut PgConnection,
    row: &NewDiscussionPoint,
) -> QueryResult<usize> {
    use crate::data_schema::data::discussion_points::dsl;

    diesel::insert_into(dsl::discussion_points)
        .values(row)
        .on_conflict(dsl::id)
        .do_update()
        .set(row)
        .execute(conn)
}

pub fn meeting_exists(conn: &mut PgConnection, meeting_id: Uuid) -> QueryResult<bool> {
    use crate::data_schema::data::meetings::dsl;

    diesel::select(diesel::dsl::exists(
        dsl::meetings.filter(dsl::id.eq(meeting_id)),
    ))
    .get_result(conn)
}

// Run accounting.

pub fn start_run(
    conn: &mut PgConnection,
    run_id: Uuid,
    source_url: &str,
    at: DateTime<Utc>,
) -> QueryResult<usize> {
    use crate::info_schema::info::ingestion_runs::dsl;

    NewIngestionRun {
        id: run_id,
        source_url: Some(source_url),
        started_at: at,
        status: "running",
    }
    .insert_into(dsl::ingestion_runs)
    .execute(conn)
}

pub fn finish_run(
    conn: &mut PgConnection,
    run_id: Uuid,
    status: RunStatus,
    records_processed: i32,
    records_failed: i32,
    duplicates_avoided: i32,
    at: DateTime<Utc>,
) -> QueryResult<usize> {
    use crate::info_schema::info::ingestion_runs::dsl;

    diesel::update(dsl::ingestion_runs.filter(dsl::id.eq(run_id)))
        .set((
            dsl::finished_at.eq(at),
            dsl::status.eq(status.to_string()),
            dsl::records_processed.eq(records_processed),
            dsl::records_failed.eq(records_failed),
            dsl::duplicates_avoided.eq(duplicates_avoided),
        ))
        .execute(conn)
}

pub fn insert_error_log(conn: &mut PgConnection, entry: &NewErrorLogEntry) -> QueryResult<usize> {
    use crate::info_schema::info::error_log::dsl;

    entry.insert_into(dsl::error_log).execute(conn)
}

// Read side. The dashboard queries views and materialized views only.

pub fn ingestion_kpis(conn: &mut PgConnection) -> QueryResult<Option<DbKpis>> {
    use crate::info_schema::info::mv_ingestion_kpis::dsl;

    dsl::mv_ingestion_kpis
        .select(DbKpis::as_select())
        .first(conn)
        .optional()
}

#[derive(Debug, Default, Clone)]
pub struct MeetingFilter {
    pub workgroup: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
}

type SummaryBoxed<'a> =
    crate::data_schema::data::meeting_summary_view::BoxedQuery<'a, diesel::pg::Pg>;

fn filtered_summaries(filter: &MeetingFilter) -> SummaryBoxed<'static> {
    use crate::data_schema::data::meeting_summary_view::dsl;

    let mut query = dsl::meeting_summary_view.into_boxed();

    if let Some(workgroup) = &filter.workgroup {
        query = query.filter(dsl::workgroup.ilike(format!("%{workgroup}%")));
    }
    if let Some(date_from) = filter.date_from {
        query = query.filter(dsl::meeting_date.ge(date_from));
    }
    if let Some(date_to) = filter.date_to {
        query = query.filter(dsl::meeting_date.le(date_to));
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{search}%");
        query = query.filter(
            dsl::workgroup
                .nullable()
                .ilike(pattern.clone())
                .or(dsl::title.ilike(pattern)),
        );
    }

    query
}

pub fn count_meetings(conn: &mut PgConnection, filter: &MeetingFilter) -> QueryResult<i64> {
    filtered_summaries(filter).count().get_result(conn)
}

pub fn list_meetings(
    conn: &mut PgConnection,
    filter: &MeetingFilter,
    limit: i64,
    offset: i64,
) -> QueryResult<Vec<DbMeetingSummary>> {
    use crate::data_schema::data::meeting_summary_view::dsl;

    filtered_summaries(filter)
        .order((dsl::ingested_at.desc(), dsl::meeting_date.desc()))
        .limit(limit)
        .offset(offset)
        .select(DbMeetingSummary::as_select())
        .load(conn)
}

/// All rows matching the filter in listing order, for exports. The caller
/// enforces the row cap via `count_meetings` before asking for this.
pub fn export_meetings(
    conn: &mut PgConnection,
    filter: &MeetingFilter,
) -> QueryResult<Vec<DbMeetingSummary>> {
    use crate::data_schema::data::meeting_summary_view::dsl;

    filtered_summaries(filter)
        .order((dsl::ingested_at.desc(), dsl::meeting_date.desc()))
        .select(DbMeetingSummary::as_select())
        .load(conn)
}

pub fn meeting_detail(
    conn: &mut PgConnection,
    meeting_id: Uuid,
) -> QueryResult<Option<(DbMeetingSummary, serde_json::Value)>> {
    use crate::data_schema::data::meeting_summary_view::dsl as view_dsl;
    use crate::data_schema::data::meetings::dsl as meetings_dsl;

    let summary = view_dsl::meeting_summary_view
        .filter(view_dsl::id.eq(meeting_id))
        .select(DbMeetingSummary::as_select())
        .first(conn)
        .optional()?;

    let Some(summary) = summary else {
        return Ok(None);
    };

    let raw_json = meetings_dsl::meetings
        .filter(meetings_dsl::id.eq(meeting_id))
        .select(meetings_dsl::raw_json)
        .first(conn)?;

    Ok(Some((summary, raw_json)))
}

pub fn latest_runs(conn: &mut PgConnection, limit: i64) -> QueryResult<Vec<DbIngestionRun>> {
    use crate::info_schema::info::ingestion_run_view::dsl;

    dsl::ingestion_run_view
        .order(dsl::started_at.desc())
        .limit(limit)
        .select(DbIngestionRun::as_select())
        .load(conn)
}

pub fn monthly_aggregates(
    conn: &mut PgConnection,
    months: i64,
) -> QueryResult<Vec<DbMonthlyAggregate>> {
    use crate::info_schema::info::mv_ingestion_monthly::dsl;

    dsl::mv_ingestion_monthly
        .order(dsl::month.desc())
        .limit(months)
        .select(DbMonthlyAggregate::as_select())
        .load(conn)
}

pub fn recent_error_log(
    conn: &mut PgConnection,
    since: DateTime<Utc>,
    error_type: Option<&str>,
) -> QueryResult<Vec<DbErrorLogEntry>> {
    use crate::info_schema::info::error_log_view::dsl;

    let mut query = dsl::error_log_view
        .into_boxed()
        .filter(dsl::timestamp.ge(since));

    if let Some(error_type) = error_type {
        query = query.filter(dsl::error_type.eq(error_type.to_string()));
    }

    query
        .order(dsl::timestamp.desc())
        .select(DbErrorLogEntry::as_select())
        .load(conn)
}

pub fn acknowledgments_for(
    conn: &mut PgConnection,
    alert_ids: &[String],
) -> QueryResult<Vec<DbAlertAcknowledgment>> {
    use crate::info_schema::info::alert_acknowledgments::dsl;

    dsl::alert_acknowledgments
        .filter(dsl::alert_id.eq_any(alert_ids))
        .select(DbAlertAcknowledgment::as_select())
        .load(conn)
}

pub fn error_log_entry_exists(conn: &mut PgConnection, alert_id: Uuid) -> QueryResult<bool> {
    use crate::info_schema::info::error_log_view::dsl;

    diesel::select(diesel::dsl::exists(
        dsl::error_log_view.filter(dsl::id.eq(alert_id)),
    ))
    .get_result(conn)
}

pub fn upsert_alert_acknowledgment(
    conn: &mut PgConnection,
    row: &NewAlertAcknowledgment,
) -> QueryResult<usize> {
    use crate::info_schema::info::alert_acknowledgments::dsl;

    diesel::insert_into(dsl::alert_acknowledgments)
        .values(row)
        .on_conflict(dsl::alert_id)
        .do_update()
        .set(row)
        .execute(conn)
}

/// Maps a store failure onto the persisted error taxonomy. Unique violations
/// and syntax errors should not occur under correct upsert usage, but they
/// are classified so they surface rather than disappearing into
/// `unknown_error`.
pub fn classify_query_error(err: &QueryError) -> ErrorType {
    match err {
        QueryError::DatabaseError(kind, info) => match kind {
            DatabaseErrorKind::UniqueViolation => ErrorType::UniqueViolation,
            DatabaseErrorKind::ClosedConnection | DatabaseErrorKind::UnableToSendCommand => {
                ErrorType::DatabaseConnectionError
            }
            _ => {
                if info.message().contains("syntax") {
                    ErrorType::SqlSyntaxError
                } else {
                    ErrorType::UnknownError
                }
            }
        },
        _ => ErrorType::UnknownError,
    }
}
