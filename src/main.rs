//! A todo service with axum.

use axum_todo::app::run_app;
use axum_todo::infra::{config, database, logging};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;
    let _guard = logging::init_logging();

    let config = config::load_config()?;
    let db = database::init_db(&config.database);
    database::run_migrations(&db).await?;

    let listener = TcpListener::bind(format!(
        "{}:{}",
        config.server.http_address, config.server.http_port
    ))
    .await?;
    run_app(listener, db, config).await?;

    Ok(())
}
