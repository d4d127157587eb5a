use chrono::{DateTime, NaiveDate, Utc};
use minutesdb_db::db::MeetingFilter;
use minutesdb_db::models::DbMeetingSummary;
use rocket::get;
use rocket::serde::json::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::Db;
use crate::api::auth::Caller;
use crate::api::error::ApiError;

const MAX_PAGE_SIZE: i64 = 100;
const DEFAULT_PAGE_SIZE: i64 = 50;

#[derive(Serialize)]
pub struct ApiMeetingSummary {
    pub id: String,
    pub source_name: Option<String>,
    pub workgroup: String,
    pub meeting_date: NaiveDate,
    pub ingested_at: DateTime<Utc>,
    pub title: Option<String>,
    pub validation_warnings_count: i32,
    pub has_missing_fields: bool,
}

impl From<DbMeetingSummary> for ApiMeetingSummary {
    fn from(row: DbMeetingSummary) -> Self {
        let has_missing_fields = row.has_missing_fields();
        Self {
            id: row.id.to_string(),
            source_name: row.source_name,
            workgroup: row.workgroup,
            meeting_date: row.meeting_date,
            ingested_at: row.ingested_at,
            title: row.title,
            validation_warnings_count: row.validation_warnings_count,
            has_missing_fields,
        }
    }
}

#[derive(Serialize)]
pub struct PaginatedMeetings {
    pub items: Vec<ApiMeetingSummary>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

#[derive(Serialize)]
pub struct ApiMeetingDetail {
    #[serde(flatten)]
    pub summary: ApiMeetingSummary,
    pub normalized_fields: serde_json::Value,
    pub missing_fields: serde_json::Value,
    pub provenance: serde_json::Value,
    pub raw_json_reference: String,
    pub raw_json: serde_json::Value,
}

pub(super) fn parse_date_param(raw: &str, name: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        ApiError::UnprocessableEntity(format!("{name} must be a YYYY-MM-DD date, got '{raw}'"))
    })
}

pub(super) fn build_filter(
    workgroup: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    search: Option<String>,
) -> Result<MeetingFilter, ApiError> {
    Ok(MeetingFilter {
        workgroup,
        date_from: date_from
            .as_deref()
            .map(|raw| parse_date_param(raw, "date_from"))
            .transpose()?,
        date_to: date_to
            .as_deref()
            .map(|raw| parse_date_param(raw, "date_to"))
            .transpose()?,
        search,
    })
}

#[get("/meetings?<page>&<page_size>&<workgroup>&<date_from>&<date_to>&<search>")]
pub async fn list_meetings(
    page: Option<i64>,
    page_size: Option<i64>,
    workgroup: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    search: Option<String>,
    db: Option<Db>,
    _caller: Caller,
) -> Result<Json<PaginatedMeetings>, ApiError> {
    let page = page.unwrap_or(1);
    if page < 1 {
        return Err(ApiError::UnprocessableEntity(format!(
            "page must be >= 1, got {page}"
        )));
    }

    let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(ApiError::UnprocessableEntity(format!(
            "page_size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
        )));
    }

    let filter = build_filter(workgroup, date_from, date_to, search)?;

    let Some(db) = db else {
        return Ok(Json(PaginatedMeetings {
            items: Vec::new(),
            total: 0,
            page,
            page_size,
            total_pages: 0,
        }));
    };

    let (total, rows) = db
        .run(move |conn| -> minutesdb_db::QueryResult<_> {
            let total = minutesdb_db::db::count_meetings(conn, &filter)?;
            let rows = minutesdb_db::db::list_meetings(
                conn,
                &filter,
                page_size,
                (page - 1) * page_size,
            )?;
            Ok((total, rows))
        })
        .await?;

    let total_pages = if total > 0 {
        (total + page_size - 1) / page_size
    } else {
        0
    };

    Ok(Json(PaginatedMeetings {
        items: rows.into_iter().map(ApiMeetingSummary::from).collect(),
        total,
        page,
        page_size,
        total_pages,
    }))
}

#[get("/meetings/<meeting_id>")]
pub async fn meeting_detail(
    meeting_id: String,
    db: Option<Db>,
    _caller: Caller,
) -> Result<Json<ApiMeetingDetail>, ApiError> {
    let db = db.ok_or(ApiError::Unavailable)?;

    let not_found = || ApiError::NotFound(format!("Meeting {meeting_id} not found"));
    let id = Uuid::parse_str(&meeting_id).map_err(|_| not_found())?;

    let detail = db.run(move |conn| minutesdb_db::db::meeting_detail(conn, id)).await?;
    let Some((summary, raw_json)) = detail else {
        return Err(not_found());
    };

    let normalized_fields = summary.normalized_fields.clone();
    let missing_fields = summary.missing_fields.clone();
    let provenance = summary.provenance.clone();
    let raw_json_reference = summary.raw_json_reference.clone();

    Ok(Json(ApiMeetingDetail {
        summary: ApiMeetingSummary::from(summary),
        normalized_fields,
        missing_fields,
        provenance,
        raw_json_reference,
        raw_json,
    }))
}
