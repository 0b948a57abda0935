use anyhow::Result;
use axum::{routing::get, Router};
use dotenvy::dotenv;
use migration::MigratorTrait;
use sea_orm::Database;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use beat_digest::{
    clock::SystemClock,
    config::Config,
    handlers, jobs,
    services::{mailer, SpotifyService, SvgChartRenderer},
    state::AppState,
    tasks,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    init_tracing();

    tracing::info!("Starting Beat Digest...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Connect to database
    let db = Database::connect(&config.database_url).await?;
    tracing::info!("Connected to database");

    // Run migrations
    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database migrations completed");

    let spotify = SpotifyService::from_config(&config)?;
    let charts = Arc::new(SvgChartRenderer::new(&config.charts_dir));
    let mailer = mailer::from_config(&config, spotify.http_client());
    if config.mail_relay_url.is_none() {
        tracing::warn!(
            "MAIL_RELAY_URL not set, newsletters go to {}",
            config.mail_outbox_dir
        );
    }

    // Initialize job queue and executor
    let (job_queue, job_receiver) = jobs::JobQueue::new();
    tracing::info!("Job queue initialized");

    let state = AppState::new(
        db,
        config.clone(),
        Arc::new(SystemClock),
        spotify,
        charts,
        mailer,
        job_queue,
    );

    // Start job executor
    let executor = jobs::JobExecutor::new(state.clone(), job_receiver);
    tokio::spawn(async move {
        executor.start().await;
    });

    // Start scheduled cycles
    let _scheduler = tasks::start_scheduler(state.clone()).await?;
    tracing::info!("Background task scheduler started");

    let app = create_router(state);

    let host: std::net::IpAddr = config.server_host.parse()?;
    let addr = SocketAddr::from((host, config.server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "beat_digest=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))

        // API routes (JSON)
        .nest("/api", handlers::api_routes())

        // Middleware
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
