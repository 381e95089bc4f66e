use shop_api::{
    AppState,
    auth::TokenCodec,
    config::{AppConfig, Env},
    create_router,
    policy::{AccessGate, PolicyRegistry},
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Asynchronous entry point: configuration, logging, database pool, policy
/// registry and token codec, then the HTTP server. Everything fallible here
/// fails fast before the listener binds.
#[tokio::main]
async fn main() {
    // Configuration and environment loading (fail-fast). The signing secret
    // and database URL are mandatory; AppConfig::load panics without them.
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // Log filter: RUST_LOG wins, with sensible local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shop_api=debug,tower_http=info,axum=trace".into());

    // Structured logging format selected by environment.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON output for ingestion by centralized log aggregators.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // Database pool.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // Access pipeline: the policy registry is built once from the endpoint
    // declarations, and the codec takes the secret exactly once. Both are
    // read-only from here on.
    let codec = TokenCodec::new(&config.jwt_secret, config.token_ttl_hours);
    let gate = Arc::new(AccessGate::new(PolicyRegistry::new(), codec));

    let app_state = AppState {
        repo,
        gate,
        config: config.clone(),
    };

    let app = create_router(app_state);

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("FATAL: failed to bind listener");

    tracing::info!("Listening on 0.0.0.0:{}", config.port);

    axum::serve(listener, app)
        .await
        .expect("server terminated unexpectedly");
}
