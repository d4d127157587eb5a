use chrono::{DateTime, Utc};
use rocket::get;
use rocket::serde::json::Json;
use serde::Serialize;

use crate::Db;
use crate::api::auth::Caller;
use crate::api::error::ApiError;

const MAX_RUNS: i64 = 1000;
const DEFAULT_RUNS: i64 = 100;
const MAX_MONTHS: i64 = 60;
const DEFAULT_MONTHS: i64 = 12;

#[derive(Serialize)]
pub struct ApiIngestionRun {
    pub id: String,
    pub source_url: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: String,
    pub records_processed: i32,
    pub records_failed: i32,
    pub duplicates_avoided: i32,
}

#[derive(Serialize)]
pub struct ApiMonthlyAggregate {
    pub month: String,
    pub records_ingested: i64,
    pub records_with_warnings: i64,
}

#[get("/runs?<limit>")]
pub async fn list_runs(
    limit: Option<i64>,
    db: Option<Db>,
    _caller: Caller,
) -> Result<Json<Vec<ApiIngestionRun>>, ApiError> {
    let limit = limit.unwrap_or(DEFAULT_RUNS);
    if !(1..=MAX_RUNS).contains(&limit) {
        return Err(ApiError::UnprocessableEntity(format!(
            "limit must be between 1 and {MAX_RUNS}, got {limit}"
        )));
    }

    let Some(db) = db else {
        return Ok(Json(Vec::new()));
    };

    let runs = db
        .run(move |conn| minutesdb_db::db::latest_runs(conn, limit))
        .await?;

    Ok(Json(
        runs.into_iter()
            .map(|run| ApiIngestionRun {
                id: run.id.to_string(),
                source_url: run.source_url,
                started_at: run.started_at,
                finished_at: run.finished_at,
                status: run.status,
                records_processed: run.records_processed,
                records_failed: run.records_failed,
                duplicates_avoided: run.duplicates_avoided,
            })
            .collect(),
    ))
}

#[get("/runs/monthly?<months>")]
pub async fn monthly_aggregates(
    months: Option<i64>,
    db: Option<Db>,
    _caller: Caller,
) -> Result<Json<Vec<ApiMonthlyAggregate>>, ApiError> {
    let months = months.unwrap_or(DEFAULT_MONTHS);
    if !(1..=MAX_MONTHS).contains(&months) {
        return Err(ApiError::UnprocessableEntity(format!(
            "months must be between 1 and {MAX_MONTHS}, got {months}"
        )));
    }

    let Some(db) = db else {
        return Ok(Json(Vec::new()));
    };

    let aggregates = db
        .run(move |conn| minutesdb_db::db::monthly_aggregates(conn, months))
        .await?;

    Ok(Json(
        aggregates
            .into_iter()
            .map(|row| ApiMonthlyAggregate {
                month: row.month.to_string(),
                records_ingested: row.records_ingested,
                records_with_warnings: row.records_with_warnings,
            })
            .collect(),
    ))
}
