mod config;
mod identity;
mod ingest;
mod validate;
mod writer;

use feed::FeedClient;
use log::{info, warn};
use miette::{IntoDiagnostic, miette};
use std::io::Write;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::IngestConfig;
use crate::ingest::Ingestor;

#[tokio::main]
async fn main() -> miette::Result<()> {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let dry_run_flag = args.iter().any(|arg| arg == "--dry-run");
    let urls: Vec<String> = args
        .iter()
        .filter(|arg| !arg.starts_with("--"))
        .cloned()
        .collect();

    let mut config = IngestConfig::config().into_diagnostic()?;
    if dry_run_flag {
        config.dry_run = true;
    }
    if !urls.is_empty() {
        config.sources = urls;
    }

    info!(
        "Starting meeting summaries ingestion over {} source(s){}",
        config.sources.len(),
        if config.dry_run { " (dry run)" } else { "" },
    );

    let pool = if config.dry_run {
        None
    } else {
        let url = minutesdb_db::database_url_from_environment()
            .ok_or_else(|| miette!("DATABASE_URL is not configured; ingestion is disabled"))?;
        Some(minutesdb_db::pool::get_ingest_pool(&url).into_diagnostic()?)
    };

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, closing the current run as partial");
                cancel.cancel();
            }
        }
    });

    let client = FeedClient::new(Duration::from_secs(config.fetch_timeout_seconds))
        .into_diagnostic()?;
    let ingestor = Ingestor::new(client, pool, config, cancel);

    let totals = ingestor
        .ingest_all(&mut |event| {
            info!(
                "Processing record {}/{} from {}",
                event.records_processed, event.total_records, event.source_url,
            );
        })
        .await?;

    info!(
        "Done: {} source(s) processed, {} failed",
        totals.sources_processed, totals.sources_failed,
    );

    Ok(())
}

// LOG_LEVEL feeds the filter, LOG_FORMAT selects json or text lines.
fn init_logging() {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&level);

    let json_format = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json_format {
        builder.format(|buf, record| {
            let line = serde_json::json!({
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "level": record.level().to_string(),
                "target": record.target(),
                "message": record.args().to_string(),
            });
            writeln!(buf, "{line}")
        });
    }

    builder.init();
}
