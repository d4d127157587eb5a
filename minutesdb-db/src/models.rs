use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

/// Lifecycle of one per-source ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Partial,
    Failed,
}

/// Persisted error classification. Fetch-layer and structure-gate entries
/// are source-fatal; the rest are record-level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    HttpError,
    Timeout,
    TransportError,
    JsonParseError,
    ShapeError,
    ValidationError,
    RecordValidationError,
    CircularReference,
    DatabaseConnectionError,
    SqlSyntaxError,
    UniqueViolation,
    UnknownError,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::data_schema::data::workgroups)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewWorkgroup<'a> {
    pub id: Uuid,
    pub name: &'a str,
    pub raw_json: &'a serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::data_schema::data::meetings)]
#[diesel(treat_none_as_default_value = false)]
#[diesel(treat_none_as_null = true)]
pub struct NewMeeting<'a> {
    pub id: Uuid,
    pub workgroup_id: Uuid,
    pub meeting_date: NaiveDate,
    pub meeting_type: Option<&'a str>,
    pub host: Option<&'a str>,
    pub documenter: Option<&'a str>,
    pub attendees: &'a [String],
    pub purpose: Option<&'a str>,
    pub video_links: &'a [String],
    pub working_docs: Option<&'a serde_json::Value>,
    pub timestamped_video: Option<&'a serde_json::Value>,
    pub tags: Option<&'a serde_json::Value>,
    pub raw_json: &'a serde_json::Value,
    pub source_url: Option<&'a str>,
    pub ingestion_run_id: Option<Uuid>,
    pub validation_warnings_count: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::data_schema::data::agenda_items)]
#[diesel(treat_none_as_default_value = false)]
#[diesel(treat_none_as_null = true)]
pub struct NewAgendaItem<'a> {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub status: Option<&'a str>,
    pub order_index: i32,
    pub raw_json: &'a serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::data_schema::data::action_items)]
#[diesel(treat_none_as_default_value = false)]
#[diesel(treat_none_as_null = true)]
pub struct NewActionItem<'a> {
    pub id: Uuid,
    pub agenda_item_id: Uuid,
    pub text: &'a str,
    pub assignee: Option<&'a str>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<&'a str>,
    pub raw_json: &'a serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::data_schema::data::decision_items)]
#[diesel(treat_none_as_default_value = false)]
#[diesel(treat_none_as_null = true)]
pub struct NewDecisionItem<'a> {
    pub id: Uuid,
    pub agenda_item_id: Uuid,
    pub decision_text: &'a str,
    pub rationale: Option<&'a str>,
    pub effect_scope: Option<&'a str>,
    pub raw_json: &'a serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::data_schema::data::discussion_points)]
#[diesel(treat_none_as_default_value = false)]
#[diesel(treat_none_as_null = true)]
pub struct NewDiscussionPoint<'a> {
    pub id: Uuid,
    pub agenda_item_id: Uuid,
    pub point_text: &'a str,
    pub order_index: i32,
    pub raw_json: &'a serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::info_schema::info::ingestion_runs)]
pub struct NewIngestionRun<'a> {
    pub id: Uuid,
    pub source_url: Option<&'a str>,
    pub started_at: DateTime<Utc>,
    pub status: &'a str,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = crate::info_schema::info::ingestion_run_view)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbIngestionRun {
    pub id: Uuid,
    pub source_url: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: String,
    pub records_processed: i32,
    pub records_failed: i32,
    pub duplicates_avoided: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::info_schema::info::error_log)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewErrorLogEntry<'a> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source_url: Option<&'a str>,
    pub error_type: &'a str,
    pub message: &'a str,
    pub record_index: Option<i32>,
    pub ingestion_run_id: Option<Uuid>,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = crate::info_schema::info::error_log_view)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbErrorLogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source_url: Option<String>,
    pub error_type: String,
    pub message: String,
    pub record_index: Option<i32>,
    pub ingestion_run_id: Option<Uuid>,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::info_schema::info::alert_acknowledgments)]
pub struct NewAlertAcknowledgment<'a> {
    pub alert_id: &'a str,
    pub acknowledged_at: DateTime<Utc>,
    pub acknowledged_by: &'a str,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = crate::info_schema::info::alert_acknowledgments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbAlertAcknowledgment {
    pub alert_id: String,
    pub acknowledged_at: DateTime<Utc>,
    pub acknowledged_by: String,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = crate::data_schema::data::meeting_summary_view)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbMeetingSummary {
    pub id: Uuid,
    pub source_name: Option<String>,
    pub workgroup: String,
    pub meeting_date: NaiveDate,
    pub ingested_at: DateTime<Utc>,
    pub title: Option<String>,
    pub validation_warnings_count: i32,
    pub missing_fields: serde_json::Value,
    pub normalized_fields: serde_json::Value,
    pub provenance: serde_json::Value,
    pub raw_json_reference: String,
}

impl DbMeetingSummary {
    pub fn has_missing_fields(&self) -> bool {
        self.missing_fields
            .as_array()
            .is_some_and(|fields| !fields.is_empty())
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = crate::info_schema::info::mv_ingestion_kpis)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbKpis {
    pub total_ingested: i64,
    pub sources_count: i64,
    pub success_rate: f64,
    pub duplicates_avoided: i64,
    pub last_run_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = crate::info_schema::info::mv_ingestion_monthly)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbMonthlyAggregate {
    pub month: NaiveDate,
    pub records_ingested: i64,
    pub records_with_warnings: i64,
}
