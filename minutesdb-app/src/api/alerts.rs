use chrono::{DateTime, Duration, Utc};
use minutesdb_db::models::NewAlertAcknowledgment;
use rocket::serde::json::Json;
use rocket::{get, post};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::Db;
use crate::api::auth::Caller;
use crate::api::error::ApiError;

const MAX_HOURS: i64 = 168;
const DEFAULT_HOURS: i64 = 24;
const MAX_ALERTS: usize = 100;

#[derive(Serialize)]
pub struct ApiAlert {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub source_url: Option<String>,
    pub error_type: String,
    pub message: String,
    pub record_index: Option<i32>,
    pub ingestion_run_id: Option<String>,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
}

#[derive(Serialize)]
pub struct AckResponse {
    pub message: String,
    pub acknowledged_by: String,
}

/// Recent failures joined against acknowledgments. Read-only callers see
/// only unacknowledged alerts unless they filter explicitly.
#[get("/alerts?<hours>&<error_type>&<acknowledged>")]
pub async fn list_alerts(
    hours: Option<i64>,
    error_type: Option<String>,
    acknowledged: Option<bool>,
    db: Option<Db>,
    caller: Caller,
) -> Result<Json<Vec<ApiAlert>>, ApiError> {
    let hours = hours.unwrap_or(DEFAULT_HOURS);
    if !(1..=MAX_HOURS).contains(&hours) {
        return Err(ApiError::UnprocessableEntity(format!(
            "hours must be between 1 and {MAX_HOURS}, got {hours}"
        )));
    }

    let Some(db) = db else {
        return Ok(Json(Vec::new()));
    };

    let since = Utc::now() - Duration::hours(hours);
    let (entries, acks) = db
        .run(move |conn| -> minutesdb_db::QueryResult<_> {
            let entries =
                minutesdb_db::db::recent_error_log(conn, since, error_type.as_deref())?;
            let ids: Vec<String> = entries.iter().map(|e| e.id.to_string()).collect();
            let acks = minutesdb_db::db::acknowledgments_for(conn, &ids)?;
            Ok((entries, acks))
        })
        .await?;

    let acks_by_id: HashMap<String, _> = acks
        .into_iter()
        .map(|ack| (ack.alert_id.clone(), ack))
        .collect();

    let effective_filter = if caller.is_admin() {
        acknowledged
    } else {
        acknowledged.or(Some(false))
    };

    let alerts: Vec<ApiAlert> = entries
        .into_iter()
        .filter_map(|entry| {
            let ack = acks_by_id.get(&entry.id.to_string());
            let is_acknowledged = ack.is_some();
            if effective_filter.is_some_and(|wanted| wanted != is_acknowledged) {
                return None;
            }
            Some(ApiAlert {
                id: entry.id.to_string(),
                timestamp: entry.timestamp,
                source_url: entry.source_url,
                error_type: entry.error_type,
                message: entry.message,
                record_index: entry.record_index,
                ingestion_run_id: entry.ingestion_run_id.map(|id| id.to_string()),
                acknowledged: is_acknowledged,
                acknowledged_at: ack.map(|a| a.acknowledged_at),
                acknowledged_by: ack.map(|a| a.acknowledged_by.clone()),
            })
        })
        .take(MAX_ALERTS)
        .collect();

    Ok(Json(alerts))
}

#[post("/alerts/<alert_id>/acknowledge")]
pub async fn acknowledge_alert(
    alert_id: String,
    db: Option<Db>,
    caller: Caller,
) -> Result<Json<AckResponse>, ApiError> {
    if !caller.is_admin() {
        return Err(ApiError::Forbidden("acknowledging alerts requires admin"));
    }

    let db = db.ok_or(ApiError::Unavailable)?;

    let not_found = || ApiError::NotFound(format!("Alert {alert_id} not found"));
    let id = Uuid::parse_str(&alert_id).map_err(|_| not_found())?;

    let exists = db
        .run(move |conn| minutesdb_db::db::error_log_entry_exists(conn, id))
        .await?;
    if !exists {
        return Err(not_found());
    }

    let user_id = caller.user_id.clone();
    let ack_id = alert_id.clone();
    db.run(move |conn| {
        minutesdb_db::db::upsert_alert_acknowledgment(
            conn,
            &NewAlertAcknowledgment {
                alert_id: &ack_id,
                acknowledged_at: Utc::now(),
                acknowledged_by: &user_id,
            },
        )
    })
    .await?;

    Ok(Json(AckResponse {
        message: format!("Alert {alert_id} acknowledged"),
        acknowledged_by: caller.user_id,
    }))
}
