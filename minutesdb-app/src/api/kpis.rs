use chrono::{DateTime, Utc};
use rocket::get;
use rocket::serde::json::Json;
use serde::Serialize;

use crate::Db;
use crate::api::auth::Caller;
use crate::api::error::ApiError;

#[derive(Serialize)]
pub struct ApiKpis {
    pub total_ingested: i64,
    pub sources_count: i64,
    pub success_rate: f64,
    pub duplicates_avoided: i64,
    pub last_run_timestamp: Option<DateTime<Utc>>,
}

impl Default for ApiKpis {
    fn default() -> Self {
        Self {
            total_ingested: 0,
            sources_count: 0,
            success_rate: 100.0,
            duplicates_avoided: 0,
            last_run_timestamp: None,
        }
    }
}

#[get("/kpis")]
pub async fn kpis(db: Option<Db>, _caller: Caller) -> Result<Json<ApiKpis>, ApiError> {
    let Some(db) = db else {
        return Ok(Json(ApiKpis::default()));
    };

    let kpis = db.run(minutesdb_db::db::ingestion_kpis).await?;

    Ok(Json(
        kpis.map(|row| ApiKpis {
            total_ingested: row.total_ingested,
            sources_count: row.sources_count,
            success_rate: row.success_rate,
            duplicates_avoided: row.duplicates_avoided,
            last_run_timestamp: row.last_run_timestamp,
        })
        .unwrap_or_default(),
    ))
}
