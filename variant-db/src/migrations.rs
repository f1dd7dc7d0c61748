use diesel::sql_types::BigInt;
use diesel::{Connection, ConnectionError, PgConnection, RunQueryDsl};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::{info, warn};
use miette::Diagnostic;
use std::error::Error;
use thiserror::Error;

use crate::QueryError;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

// Arbitrary fixed id for the advisory lock. Picked once, never reused for
// anything else in this schema.
const MIGRATION_LOCK_ID: i64 = 83172;

#[derive(Debug, Error, Diagnostic)]
pub enum MigrationError {
    #[error("couldn't connect to database")]
    FailedToConnectToDatabase(#[source] ConnectionError),

    #[error("error acquiring migrations lock")]
    FailedToAcquireMigrationsLock(#[source] QueryError),

    #[error("error running migrations")]
    FailedToRunMigrations(#[source] Box<dyn Error + Send + Sync>),
}

/// Idempotently brings the schema up to date. Safe to call from every
/// process that starts up: the advisory lock serializes concurrent
/// callers so two instances booting at once don't race on `CREATE TABLE`.
pub fn run_migrations(url: &str) -> Result<(), MigrationError> {
    let mut conn =
        PgConnection::establish(url).map_err(MigrationError::FailedToConnectToDatabase)?;

    info!("Acquiring migrations lock");
    diesel::sql_query("select pg_advisory_lock($1);")
        .bind::<BigInt, _>(MIGRATION_LOCK_ID)
        .execute(&mut conn)
        .map_err(MigrationError::FailedToAcquireMigrationsLock)?;

    info!("Running any pending migrations");
    let migration_result = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(MigrationError::FailedToRunMigrations);

    let unlock_result = diesel::sql_query("select pg_advisory_unlock($1);")
        .bind::<BigInt, _>(MIGRATION_LOCK_ID)
        .execute(&mut conn);

    if let Err(e) = unlock_result {
        warn!(
            "Failed to unlock migrations lock. It will be unlocked when the connection is \
            dropped, but this may still be indicative of an application issue. Error: {:?}",
            e,
        );
    }

    migration_result?;
    info!("Migrations finished");
    Ok(())
}
