mod api;

use log::info;
use rocket::fairing::AdHoc;
use rocket::figment::map;
use rocket::serde::json::Json;
use rocket::{Build, Rocket, get, launch, routes};
use rocket_sync_db_pools::database as sync_database;
use rocket_sync_db_pools::diesel::PgConnection;
use serde::Serialize;

#[sync_database("minutesdb")]
pub struct Db(PgConnection);

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[get("/healthz")]
fn healthz() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn run_migrations(rocket: Rocket<Build>) -> Rocket<Build> {
    let config: rocket_sync_db_pools::Config = rocket
        .figment()
        .extract_inner("databases.minutesdb")
        .expect("minutesdb database connection information was not found in the figment");

    tokio::task::spawn_blocking(move || {
        minutesdb_db::migrations::run_migrations(&config.url)
            .expect("Failed to apply migrations");
    })
    .await
    .expect("Error joining migrations task");

    rocket
}

fn figment_with_database(url: &str) -> rocket::figment::Figment {
    rocket::Config::figment()
        .merge(("databases", map!["minutesdb" => map!["url" => url]]))
        .merge(("databases.minutesdb.pool_size", 10))
}

#[launch]
fn rocket() -> _ {
    // Without DATABASE_URL the API still serves, degraded to empty
    // responses; the Db fairing simply isn't attached and the Option<Db>
    // request guard yields None.
    let database_url = minutesdb_db::database_url_from_environment();

    let figment = match &database_url {
        Some(url) => figment_with_database(url),
        None => rocket::Config::figment(),
    };

    let mut rocket = rocket::custom(figment)
        .mount("/", routes![healthz])
        .mount("/api", api::routes());

    if database_url.is_some() {
        rocket = rocket
            .attach(Db::fairing())
            .attach(AdHoc::on_ignite("Migrations", run_migrations));
    } else {
        info!("DATABASE_URL is not configured; serving empty responses");
    }

    rocket
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::http::Status;
    use rocket::local::asynchronous::Client;

    async fn degraded_client() -> Client {
        let config = rocket::Config::figment()
            .merge(("port", openport::pick_random_unused_port()))
            .merge(("log_level", "off"));

        let rocket = rocket::custom(config)
            .mount("/", routes![healthz])
            .mount("/api", api::routes());

        Client::tracked(rocket)
            .await
            .expect("Rocket failed to ignite")
    }

    #[tokio::test]
    async fn healthz_responds_ok() {
        let client = degraded_client().await;
        let response = client.get("/healthz").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert!(response.into_string().await.unwrap().contains("ok"));
    }

    #[tokio::test]
    async fn kpis_degrade_to_defaults_without_a_database() {
        let client = degraded_client().await;
        let response = client.get("/api/kpis").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body = response.into_string().await.unwrap();
        assert!(body.contains("\"total_ingested\":0"));
        assert!(body.contains("\"success_rate\":100.0"));
    }

    #[tokio::test]
    async fn meetings_listing_degrades_to_an_empty_page() {
        let client = degraded_client().await;
        let response = client.get("/api/meetings").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body = response.into_string().await.unwrap();
        assert!(body.contains("\"items\":[]"));
        assert!(body.contains("\"total\":0"));
    }

    #[tokio::test]
    async fn out_of_range_page_size_is_unprocessable() {
        let client = degraded_client().await;
        let response = client.get("/api/meetings?page_size=500").dispatch().await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
    }

    #[tokio::test]
    async fn meeting_detail_requires_the_store() {
        let client = degraded_client().await;
        let response = client
            .get("/api/meetings/11111111-1111-1111-1111-111111111111")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::InternalServerError);
    }

    #[tokio::test]
    async fn acknowledge_is_admin_gated() {
        let client = degraded_client().await;
        let response = client
            .post("/api/alerts/some-alert/acknowledge")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }
}
