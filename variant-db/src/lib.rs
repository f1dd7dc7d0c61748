mod url;
mod pool;
mod schema;
pub mod migrations;
pub mod models;
pub mod db;

pub use diesel::{Connection, PgConnection};
pub use pool::{get_pool, ConnectionPool, PoolError};
pub use url::postgres_url_from_environment;

/// Diesel's result type, reused everywhere a store operation can fail.
/// The teacher's workspace grew a dedicated `QueryError` wrapper; this
/// store has exactly one failure mode worth distinguishing (a database
/// error), so the diesel type is used directly rather than wrapped.
pub type QueryError = diesel::result::Error;
pub type QueryResult<T> = Result<T, QueryError>;
