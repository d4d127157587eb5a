mod url;
mod schema;
pub mod db;
pub mod migrations;
pub mod models;
pub mod pool;

pub(crate) use schema::*;

pub use pool::{ConnectionPool, PoolError, PooledConnection};
pub use url::*;

pub type QueryError = diesel::result::Error;
pub type QueryResult<T> = diesel::result::QueryResult<T>;

pub use diesel::{Connection, ConnectionError, PgConnection};
