use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection as R2d2Conn};
use diesel::{PgConnection, RunQueryDsl, sql_query};
use log::info;
use std::time::Duration;

pub use diesel::r2d2::PoolError;

pub type ConnectionPool = Pool<ConnectionManager<PgConnection>>;
pub type PooledConnection = R2d2Conn<ConnectionManager<PgConnection>>;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Applied to every checked-out connection: the command timeout, and custom
/// plans when a transaction-level pooler sits in front of the database
/// (server-side prepared-statement caches cannot be trusted there).
#[derive(Debug)]
struct SessionSetup {
    command_timeout: Duration,
    behind_pooler: bool,
}

impl CustomizeConnection<PgConnection, diesel::r2d2::Error> for SessionSetup {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), diesel::r2d2::Error> {
        sql_query(format!(
            "set statement_timeout = '{}ms'",
            self.command_timeout.as_millis()
        ))
        .execute(conn)
        .map_err(diesel::r2d2::Error::QueryError)?;

        if self.behind_pooler {
            sql_query("set plan_cache_mode = 'force_custom_plan'")
                .execute(conn)
                .map_err(diesel::r2d2::Error::QueryError)?;
        }

        Ok(())
    }
}

pub fn get_pool(
    url: &str,
    min_size: u32,
    max_size: u32,
    command_timeout: Duration,
) -> Result<ConnectionPool, PoolError> {
    let behind_pooler = crate::is_transaction_pooler(url);
    if behind_pooler {
        info!("Transaction-level pooler detected, forcing custom plans");
    }

    let manager = ConnectionManager::new(url);

    Pool::builder()
        .min_idle(Some(min_size))
        .max_size(max_size)
        .connection_customizer(Box::new(SessionSetup {
            command_timeout,
            behind_pooler,
        }))
        .build(manager)
}

/// Pool sized for the sequential ingestion path.
pub fn get_ingest_pool(url: &str) -> Result<ConnectionPool, PoolError> {
    get_pool(url, 1, 5, DEFAULT_COMMAND_TIMEOUT)
}
