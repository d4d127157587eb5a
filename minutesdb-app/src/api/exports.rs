use minutesdb_db::models::DbMeetingSummary;
use rocket::http::ContentType;
use rocket::post;
use rocket::response::Responder;
use rocket::serde::json::Json;
use rocket::{Request, Response};
use serde::{Deserialize, Serialize};

use crate::Db;
use crate::api::auth::Caller;
use crate::api::error::ApiError;
use crate::api::meetings::build_filter;

const MAX_EXPORT_ROWS: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

#[derive(Deserialize)]
pub struct ExportRequest {
    pub format: ExportFormat,
    #[serde(default)]
    pub workgroup: Option<String>,
    #[serde(default)]
    pub date_from: Option<String>,
    #[serde(default)]
    pub date_to: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

// Field order here is the contract's fixed column order, for both formats.
#[derive(Serialize)]
struct ExportRow {
    id: String,
    source_name: Option<String>,
    workgroup: String,
    meeting_date: String,
    ingested_at: String,
    title: Option<String>,
    validation_warnings_count: i32,
    has_missing_fields: bool,
}

impl From<DbMeetingSummary> for ExportRow {
    fn from(row: DbMeetingSummary) -> Self {
        let has_missing_fields = row.has_missing_fields();
        Self {
            id: row.id.to_string(),
            source_name: row.source_name,
            workgroup: row.workgroup,
            meeting_date: row.meeting_date.to_string(),
            ingested_at: row.ingested_at.to_rfc3339(),
            title: row.title,
            validation_warnings_count: row.validation_warnings_count,
            has_missing_fields,
        }
    }
}

pub struct ExportFile {
    content: Vec<u8>,
    format: ExportFormat,
}

impl<'r> Responder<'r, 'static> for ExportFile {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'static> {
        let (content_type, filename) = match self.format {
            ExportFormat::Csv => (ContentType::CSV, "meetings_export.csv"),
            ExportFormat::Json => (ContentType::JSON, "meetings_export.json"),
        };

        Response::build()
            .header(content_type)
            .raw_header(
                "Content-Disposition",
                format!("attachment; filename={filename}"),
            )
            .sized_body(self.content.len(), std::io::Cursor::new(self.content))
            .ok()
    }
}

/// Synchronous export of the filtered meeting listing. Exports above the
/// row cap are refused; callers are expected to narrow their filters.
#[post("/exports", data = "<request>")]
pub async fn export_meetings(
    request: Result<Json<ExportRequest>, rocket::serde::json::Error<'_>>,
    db: Option<Db>,
    _caller: Caller,
) -> Result<ExportFile, ApiError> {
    let request = request
        .map_err(|err| ApiError::UnprocessableEntity(format!("invalid export request: {err}")))?
        .into_inner();

    let filter = build_filter(
        request.workgroup,
        request.date_from,
        request.date_to,
        request.search,
    )?;

    let db = db.ok_or(ApiError::Unavailable)?;

    let count_filter = filter.clone();
    let total = db
        .run(move |conn| minutesdb_db::db::count_meetings(conn, &count_filter))
        .await?;
    if total > MAX_EXPORT_ROWS {
        return Err(ApiError::PayloadTooLarge(format!(
            "Export too large ({total} rows). Maximum {MAX_EXPORT_ROWS} rows supported; \
            please apply additional filters."
        )));
    }

    let rows = db
        .run(move |conn| minutesdb_db::db::export_meetings(conn, &filter))
        .await?;
    let rows: Vec<ExportRow> = rows.into_iter().map(ExportRow::from).collect();

    let content = match request.format {
        ExportFormat::Json => serde_json::to_vec(&rows)?,
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            for row in &rows {
                writer.serialize(row)?;
            }
            writer
                .into_inner()
                .map_err(|err| ApiError::IoError(err.into_error()))?
        }
    };

    Ok(ExportFile {
        content,
        format: request.format,
    })
}
