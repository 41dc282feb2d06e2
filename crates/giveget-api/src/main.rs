//! Give&Get API server entry point.

use std::error::Error;
use std::sync::Arc;

use axum::Router;
use giveget_api::auth::JwtIdentityResolver;
use giveget_api::config::AppConfig;
use giveget_api::routes;
use giveget_api::state::AppState;
use giveget_core::clock::SystemClock;
use giveget_store::pg_chat_sink::PgChatSink;
use giveget_store::pg_listing_directory::PgListingDirectory;
use giveget_store::pg_negotiation_repository::PgNegotiationRepository;
use giveget_store::schema;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

/// Capacity of the in-process push channel.
const PUSH_CHANNEL_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Give&Get API server");

    let config = AppConfig::from_env()?;
    tracing::info!(?config, "loaded configuration");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    if config.run_migrations {
        schema::run_migrations(&pool).await?;
        tracing::info!("database migrations applied");
    }

    let app_state = AppState::new(
        Arc::new(PgNegotiationRepository::new(pool.clone())),
        Arc::new(PgListingDirectory::new(pool.clone())),
        Arc::new(PgChatSink::new(pool, PUSH_CHANNEL_CAPACITY)),
        Arc::new(JwtIdentityResolver::new(&config.jwt_secret)),
        Arc::new(SystemClock),
    );

    // TODO: Replace CorsLayer::permissive() with the marketplace web origins.
    let app = Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/offers", routes::negotiation::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr = config.bind_addr()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
