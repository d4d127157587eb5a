//! Ingestion coordinator. Sources are processed strictly in order, each
//! under its own run row; a failing record never aborts its source, and a
//! failing source never aborts the run.

use chrono::Utc;
use feed::{FeedClient, FeedError};
use log::{debug, error, info, warn};
use miette::Diagnostic;
use minutesdb_db::models::{ErrorType, NewErrorLogEntry, NewWorkgroup, RunStatus};
use minutesdb_db::{Connection, ConnectionPool, PoolError, PooledConnection, QueryError, db};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::IngestConfig;
use crate::validate;
use crate::writer::{self, WriteError};

#[derive(Debug, Error, Diagnostic)]
pub enum IngestFatalError {
    #[error("couldn't get a database connection")]
    DbPool(#[from] PoolError),

    #[error("error recording run accounting")]
    RunAccounting(#[source] QueryError),
}

/// Progress side-channel, decoupled from any particular logging backend.
pub struct ProgressEvent<'a> {
    pub source_url: &'a str,
    pub records_processed: usize,
    pub total_records: usize,
}

pub struct SourceOutcome {
    pub status: RunStatus,
    pub records_processed: i32,
    pub records_failed: i32,
    pub duplicates_avoided: i32,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct IngestTotals {
    pub sources_processed: usize,
    pub sources_failed: usize,
    pub records_ingested: usize,
    pub records_skipped: usize,
}

pub struct Ingestor {
    client: FeedClient,
    pool: Option<ConnectionPool>,
    config: IngestConfig,
    cancel: CancellationToken,
}

impl Ingestor {
    pub fn new(
        client: FeedClient,
        pool: Option<ConnectionPool>,
        config: IngestConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            pool,
            config,
            cancel,
        }
    }

    pub async fn ingest_all(
        &self,
        progress: &mut dyn FnMut(ProgressEvent<'_>),
    ) -> Result<IngestTotals, IngestFatalError> {
        let mut totals = IngestTotals::default();

        for url in &self.config.sources {
            if self.cancel.is_cancelled() {
                warn!("Ingestion cancelled, skipping remaining sources");
                break;
            }

            info!("Processing source: {url}");
            let outcome = match (&self.pool, self.config.dry_run) {
                (Some(pool), false) => self.ingest_source(pool, url, progress).await?,
                _ => self.dry_run_source(url, progress).await,
            };

            if outcome.status == RunStatus::Failed {
                totals.sources_failed += 1;
            } else {
                totals.sources_processed += 1;
            }
            totals.records_ingested +=
                (outcome.records_processed - outcome.records_failed).max(0) as usize;
            totals.records_skipped += outcome.records_failed as usize;
        }

        info!(
            "Ingestion completed: {} source(s) processed, {} failed, {} records ingested, {} skipped",
            totals.sources_processed,
            totals.sources_failed,
            totals.records_ingested,
            totals.records_skipped,
        );

        Ok(totals)
    }

    async fn ingest_source(
        &self,
        pool: &ConnectionPool,
        url: &str,
        progress: &mut dyn FnMut(ProgressEvent<'_>),
    ) -> Result<SourceOutcome, IngestFatalError> {
        let mut conn = pool.get()?;
        let run_id = Uuid::new_v4();
        db::start_run(&mut conn, run_id, url, Utc::now())
            .map_err(IngestFatalError::RunAccounting)?;

        let records = match self.client.fetch_array(url).await {
            Ok(records) => records,
            Err(err) => {
                error!("Failed to fetch {url}: {err}");
                self.log_error(
                    &mut conn,
                    run_id,
                    url,
                    fetch_error_type(&err),
                    &err.to_string(),
                    None,
                )?;
                return self.close_failed(&mut conn, run_id);
            }
        };

        if let Err(errors) = validate::check_structure(&records) {
            error!("Structure validation failed for {url}: {}", errors.join("; "));
            self.log_error(
                &mut conn,
                run_id,
                url,
                ErrorType::ValidationError,
                &errors.join("; "),
                None,
            )?;
            return self.close_failed(&mut conn, run_id);
        }

        // Workgroups are materialized before any meeting that references
        // them, all in one transaction.
        let seeds = extract_workgroups(&records);
        let seeded = conn.transaction(|conn| {
            for seed in &seeds {
                db::upsert_workgroup(
                    conn,
                    &NewWorkgroup {
                        id: seed.id,
                        name: seed.name,
                        raw_json: seed.raw,
                        updated_at: Utc::now(),
                    },
                )?;
            }
            minutesdb_db::QueryResult::Ok(())
        });
        if let Err(err) = seeded {
            error!("Failed to upsert workgroups for {url}: {err}");
            self.log_error(
                &mut conn,
                run_id,
                url,
                db::classify_query_error(&err),
                &err.to_string(),
                None,
            )?;
            return self.close_failed(&mut conn, run_id);
        }
        info!("Upserted {} unique workgroups from {url}", seeds.len());

        let mut processed = 0;
        let mut failed = 0;
        let mut duplicates = 0;

        // Record gate over the whole document; invalid records are logged
        // and skipped, valid ones are queued for the writer.
        let mut queued = Vec::new();
        for (index, value) in records.iter().enumerate() {
            match validate::validate_record(value) {
                Ok(record) => queued.push((index, record)),
                Err(record_err) => {
                    processed += 1;
                    failed += 1;
                    warn!("Record {index} from {url} failed validation: {record_err}");
                    self.log_error(
                        &mut conn,
                        run_id,
                        url,
                        ErrorType::RecordValidationError,
                        &record_err.to_string(),
                        Some(index as i32),
                    )?;
                }
            }
        }

        let total = queued.len();
        let interval = self.config.progress_interval.max(1);
        let mut cancelled = false;

        for (position, (index, record)) in queued.iter().enumerate() {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            processed += 1;
            match writer::write_meeting(&mut conn, record, run_id, url, Utc::now()) {
                Ok(outcome) => {
                    if outcome.duplicate {
                        duplicates += 1;
                        info!(
                            "Meeting {} already existed, latest record wins",
                            outcome.meeting_id
                        );
                    }
                }
                Err(err) => {
                    failed += 1;
                    let error_type = write_error_type(&err);
                    error!("Failed to persist record {index} from {url}: {err}");
                    self.log_error(
                        &mut conn,
                        run_id,
                        url,
                        error_type,
                        &err.to_string(),
                        Some(*index as i32),
                    )?;
                    if error_type == ErrorType::DatabaseConnectionError {
                        // The next record gets a fresh connection.
                        conn = pool.get()?;
                    }
                }
            }

            let done = position + 1;
            if done % interval == 0 || done == total {
                progress(ProgressEvent {
                    source_url: url,
                    records_processed: done,
                    total_records: total,
                });
            }
        }

        let status = if cancelled || failed > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Succeeded
        };
        db::finish_run(
            &mut conn,
            run_id,
            status,
            processed,
            failed,
            duplicates,
            Utc::now(),
        )
        .map_err(IngestFatalError::RunAccounting)?;

        Ok(SourceOutcome {
            status,
            records_processed: processed,
            records_failed: failed,
            duplicates_avoided: duplicates,
        })
    }

    /// Validation and identity derivation only; no store calls at all.
    async fn dry_run_source(
        &self,
        url: &str,
        progress: &mut dyn FnMut(ProgressEvent<'_>),
    ) -> SourceOutcome {
        let failed_outcome = SourceOutcome {
            status: RunStatus::Failed,
            records_processed: 0,
            records_failed: 0,
            duplicates_avoided: 0,
        };

        let records = match self.client.fetch_array(url).await {
            Ok(records) => records,
            Err(err) => {
                error!("Failed to fetch {url}: {err}");
                return failed_outcome;
            }
        };

        if let Err(errors) = validate::check_structure(&records) {
            error!("Structure validation failed for {url}: {}", errors.join("; "));
            return failed_outcome;
        }

        let total = records.len();
        let interval = self.config.progress_interval.max(1);
        let mut valid = 0;
        let mut invalid = 0;

        for (index, value) in records.iter().enumerate() {
            match validate::validate_record(value) {
                Ok(record) => {
                    valid += 1;
                    match crate::identity::meeting_identity(&record) {
                        Ok((meeting_id, _)) => {
                            debug!("Record {index} from {url} resolves to meeting {meeting_id}");
                        }
                        Err(err) => warn!("Record {index} from {url}: {err}"),
                    }
                }
                Err(record_err) => {
                    invalid += 1;
                    warn!("Record {index} from {url} failed validation: {record_err}");
                }
            }

            let done = index + 1;
            if done % interval == 0 || done == total {
                progress(ProgressEvent {
                    source_url: url,
                    records_processed: done,
                    total_records: total,
                });
            }
        }

        SourceOutcome {
            status: if invalid == 0 {
                RunStatus::Succeeded
            } else {
                RunStatus::Partial
            },
            records_processed: valid,
            records_failed: invalid,
            duplicates_avoided: 0,
        }
    }

    fn log_error(
        &self,
        conn: &mut PooledConnection,
        run_id: Uuid,
        url: &str,
        error_type: ErrorType,
        message: &str,
        record_index: Option<i32>,
    ) -> Result<(), IngestFatalError> {
        db::insert_error_log(
            conn,
            &NewErrorLogEntry {
                id: Uuid::new_v4(),
                timestamp: Utc::now(),
                source_url: Some(url),
                error_type: &error_type.to_string(),
                message,
                record_index,
                ingestion_run_id: Some(run_id),
            },
        )
        .map_err(IngestFatalError::RunAccounting)?;
        Ok(())
    }

    fn close_failed(
        &self,
        conn: &mut PooledConnection,
        run_id: Uuid,
    ) -> Result<SourceOutcome, IngestFatalError> {
        db::finish_run(conn, run_id, RunStatus::Failed, 0, 0, 0, Utc::now())
            .map_err(IngestFatalError::RunAccounting)?;
        Ok(SourceOutcome {
            status: RunStatus::Failed,
            records_processed: 0,
            records_failed: 0,
            duplicates_avoided: 0,
        })
    }
}

fn fetch_error_type(err: &FeedError) -> ErrorType {
    err.kind().parse().unwrap_or(ErrorType::UnknownError)
}

fn write_error_type(err: &WriteError) -> ErrorType {
    match err {
        WriteError::CircularReference => ErrorType::CircularReference,
        WriteError::Identity(_) => ErrorType::RecordValidationError,
        WriteError::Db(query_err) => db::classify_query_error(query_err),
    }
}

struct WorkgroupSeed<'a> {
    id: Uuid,
    name: &'a str,
    raw: &'a Value,
}

// Unique workgroups in document order; the first record's fragment is kept
// as the workgroup's provenance. Records that would fail the record gate on
// these fields are simply not seeded here; they are reported record by
// record later.
fn extract_workgroups(records: &[Value]) -> Vec<WorkgroupSeed<'_>> {
    let mut seen = HashSet::new();
    let mut seeds = Vec::new();

    for record in records {
        let Some(id) = record
            .get("workgroup_id")
            .and_then(Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        else {
            continue;
        };
        let Some(name) = record
            .get("workgroup")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
        else {
            continue;
        };

        if seen.insert(id) {
            seeds.push(WorkgroupSeed {
                id,
                name,
                raw: record,
            });
        }
    }

    seeds
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn workgroup_extraction_is_unique_and_order_preserving() {
        let records = vec![
            json!({ "workgroup": "B", "workgroup_id": "22222222-2222-2222-2222-222222222222" }),
            json!({ "workgroup": "A", "workgroup_id": "11111111-1111-1111-1111-111111111111" }),
            json!({ "workgroup": "B renamed", "workgroup_id": "22222222-2222-2222-2222-222222222222" }),
        ];

        let seeds = extract_workgroups(&records);
        let names: Vec<_> = seeds.iter().map(|s| s.name).collect();
        assert_eq!(names, ["B", "A"]);
    }

    #[test]
    fn invalid_workgroup_records_are_not_seeded() {
        let records = vec![
            json!({ "workgroup": "W", "workgroup_id": "not-a-uuid" }),
            json!({ "workgroup": "  ", "workgroup_id": "11111111-1111-1111-1111-111111111111" }),
            json!({ "workgroup_id": "11111111-1111-1111-1111-111111111111" }),
        ];

        assert!(extract_workgroups(&records).is_empty());
    }
}
