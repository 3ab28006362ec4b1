use std::{str::FromStr, sync::Arc};

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use roomrelay::{db, router, summary::SqliteDirectory, AppState, Config};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,roomrelay=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("failed to load configuration")?;

    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .context("DATABASE_URL is not a valid sqlite url")?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(connect_options)
        .await
        .context("failed to connect to database")?;
    db::init_schema(&db_pool).await.context("failed to create schema")?;
    tracing::info!(database_url = %config.database_url, "database ready");

    let cors = match &config.cors_origin {
        Some(origin) => CorsLayer::new().allow_origin(AllowOrigin::exact(
            HeaderValue::from_str(origin).context("CORS_ORIGIN is not a valid header value")?,
        )),
        None => CorsLayer::permissive(),
    };

    let app_state = AppState::new(db_pool.clone(), Arc::new(SqliteDirectory::new(db_pool)));
    let app = router()
        .with_state(app_state)
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
