use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use crate::config::Config;
use crate::error::AppResult;

/// Open the connection pool. Query logging goes through sqlx at debug,
/// so the tracing filter decides whether statements reach the log.
pub async fn connect(config: &Config) -> AppResult<DatabaseConnection> {
    let mut options = ConnectOptions::new(&config.database_url);
    options.sqlx_logging(true);

    let conn = Database::connect(options).await?;
    tracing::info!("database connection established");
    Ok(conn)
}
