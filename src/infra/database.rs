//! For interacting with the database.

use super::config::DatabaseConfig;
use sqlx::{
    migrate::MigrateError,
    pool::PoolOptions,
    postgres::{PgConnectOptions, PgSslMode},
    ConnectOptions, PgPool,
};
use std::time::Duration;
use tracing::log::LevelFilter;

/// A common database pool type.
pub type DbPool = PgPool;

/// Connects to the database based on some configuration.
/// The connection is lazy, so nothing is established until first use.
pub fn init_db(config: &DatabaseConfig) -> PgPool {
    let db_options = PgConnectOptions::default()
        .username(&config.username)
        .password(&config.password)
        .host(&config.host)
        .port(config.port)
        .database(&config.database_name)
        .ssl_mode(PgSslMode::Prefer)
        .log_statements(LevelFilter::Debug);
    let db: PgPool = PoolOptions::default()
        .acquire_timeout(Duration::from_secs(5))
        .min_connections(1)
        .max_connections(100)
        .connect_lazy_with(db_options);
    db
}

/// Runs the embedded migrations from `migrations/`.
pub async fn run_migrations(db: &DbPool) -> Result<(), MigrateError> {
    sqlx::migrate!().run(db).await
}
