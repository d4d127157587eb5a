mod alerts;
mod auth;
mod error;
mod exports;
mod kpis;
mod meetings;
mod runs;

pub use auth::{Caller, Role};
pub use error::ApiError;

pub fn routes() -> Vec<rocket::Route> {
    rocket::routes![
        kpis::kpis,
        meetings::list_meetings,
        meetings::meeting_detail,
        runs::list_runs,
        runs::monthly_aggregates,
        alerts::list_alerts,
        alerts::acknowledge_alert,
        exports::export_meetings,
    ]
}
