//! LeafSense Backend Server
//!
//! Medicinal plant identification API for the LeafSense mobile app and
//! admin dashboard.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      LEAFSENSE API                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌──────────────┐  ┌──────────────────────┐  │
//! │  │  API      │  │  Classifier  │  │  Meet scheduler      │  │
//! │  │  (Axum)   │  │  ONNX or     │  │  (Google Calendar)   │  │
//! │  │           │  │  fallback    │  │                      │  │
//! │  └─────┬─────┘  └──────────────┘  └──────────────────────┘  │
//! │        ▼                                                    │
//! │  ┌──────────────────────┐   ┌─────────────────────────┐     │
//! │  │ SQLite / PostgreSQL  │   │ uploads/ (static files) │     │
//! │  └──────────────────────┘   └─────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod classifier;
mod config;
mod db;
mod error;
mod handlers;
mod meet;
mod middleware;
mod models;
mod uploads;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, patch, post},
    Router,
};
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::AnyPool;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::classifier::Classifier;
use crate::config::Config;
use crate::handlers::{appointments, feedback, health, plants, predict, predictions, profiles, stats};
use crate::meet::MeetScheduler;

pub use error::{AppError, AppResult};

/// LeafSense medicinal plant API
#[derive(Parser, Debug)]
#[command(name = "leafsense-api")]
#[command(version)]
#[command(about = "Medicinal plant identification API and database tools")]
struct Cli {
    /// Port to listen on (overrides PORT)
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Host to bind to (overrides HOST)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Database URL (overrides DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create tables and seed plant information
    InitDb,
    /// Print every table as JSON
    Dump,
    /// Delete all rows of one table
    Clear {
        #[arg(value_enum)]
        table: ClearTable,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ClearTable {
    Feedback,
    Predictions,
    Appointments,
    UserProfiles,
}

impl ClearTable {
    fn table_name(self) -> &'static str {
        match self {
            ClearTable::Feedback => "feedback",
            ClearTable::Predictions => "predictions",
            ClearTable::Appointments => "appointments",
            ClearTable::UserProfiles => "user_profiles",
        }
    }
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(url) = &self.database_url {
            config.database_url = url.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let mut config = Config::from_env();
    cli.apply(&mut config);

    init_tracing(config.json_logs);

    let backend = db::Backend::from_url(&config.database_url)
        .context("DATABASE_URL must start with sqlite: or postgres:")?;

    tracing::info!("Database: {}", config.redacted_database_url());

    let pool = db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to create database pool")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, pool, backend).await,
        Command::InitDb => {
            db::run_migrations(&pool, backend).await.context("Failed to run migrations")?;
            let seeded = db::seed_plant_info(&pool).await.context("Failed to seed plant info")?;
            tracing::info!("Database initialised ({} plant records added)", seeded);
            Ok(())
        }
        Command::Dump => {
            db::run_migrations(&pool, backend).await.context("Failed to run migrations")?;
            let mut dump = serde_json::Map::new();
            for table in db::USER_TABLES.iter().chain(std::iter::once(&"plant_info")) {
                let rows = db::dump_table(&pool, table).await?;
                dump.insert(table.to_string(), serde_json::Value::Array(rows));
            }
            println!("{}", serde_json::to_string_pretty(&dump)?);
            Ok(())
        }
        Command::Clear { table } => {
            let deleted = db::clear_table(&pool, table.table_name()).await?;
            tracing::info!("Deleted {} rows from {}", deleted, table.table_name());
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "leafsense_api=debug,tower_http=debug".into());

    let (text_layer, json_layer) = if json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .init();
}

async fn serve(config: Config, pool: AnyPool, backend: db::Backend) -> anyhow::Result<()> {
    tracing::info!("LeafSense API v{} starting...", env!("CARGO_PKG_VERSION"));

    check_admin_token(&config)?;

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool, backend).await.context("Failed to run migrations")?;
    db::seed_plant_info(&pool).await.context("Failed to seed plant info")?;

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.upload_dir.display()))?;

    let state = AppState::new(pool, config.clone());
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    tracing::info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Moderation may run open in development, never in production
fn check_admin_token(config: &Config) -> anyhow::Result<()> {
    if config.admin_token.is_none() {
        if config.is_production() {
            anyhow::bail!("ADMIN_TOKEN must be set in production");
        }
        tracing::warn!("ADMIN_TOKEN not set, appointment moderation endpoints are open");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: AnyPool,
    pub config: Config,
    pub classifier: Arc<Classifier>,
    pub meet: Arc<MeetScheduler>,
}

impl AppState {
    pub fn new(pool: AnyPool, config: Config) -> Self {
        let classifier = Arc::new(Classifier::load(&config));
        let meet = Arc::new(MeetScheduler::from_config(&config));
        Self { pool, config, classifier, meet }
    }
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    let admin = || axum_middleware::from_fn_with_state(state.clone(), middleware::admin::require_admin);

    // Model and prediction routes
    let prediction_routes = Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::check))
        .route("/model/info", get(health::model_info))
        .route("/plants", get(health::class_names))
        .route("/predict", post(predict::predict))
        .route("/api/predict", post(predict::predict_for_user))
        .route("/api/predictions", get(predictions::list))
        .route("/api/predictions/user/:user_id", get(predictions::list_by_user));

    // Plant knowledge base, feedback, profiles and stats
    let app_routes = Router::new()
        .route("/api/plants", get(plants::list))
        .route("/api/plant/:name", get(plants::get))
        .route("/api/feedback", post(feedback::create).get(feedback::list))
        .route("/api/feedback/", post(feedback::create).get(feedback::list))
        .route("/api/feedback/user/:user_id", get(feedback::list_by_user))
        .route("/api/profile", post(profiles::create))
        .route("/api/profile/", post(profiles::create))
        .route("/api/profile/:user_id", get(profiles::get).put(profiles::update))
        .route("/api/profile/:user_id/image", post(profiles::upload_image))
        .route("/api/profiles", get(profiles::list))
        .route("/api/stats", get(stats::get));

    // Appointments; status changes and removal need the admin token
    let appointment_routes = Router::new()
        .route("/api/appointments", post(appointments::create).get(appointments::list))
        .route("/api/appointments/", post(appointments::create).get(appointments::list))
        .route("/api/appointments/pending", get(appointments::list_pending))
        .route("/api/appointments/user/:user_id", get(appointments::list_by_user))
        .route(
            "/api/appointments/:id",
            get(appointments::get).merge(patch(appointments::update_status).route_layer(admin())),
        )
        .route("/api/appointments/:id/hide", post(appointments::hide));

    let admin_routes = Router::new()
        .route("/cancel_appointment/:id", post(appointments::cancel))
        .route("/admin/appointments/:id", delete(appointments::delete))
        .route_layer(admin());

    // Combine all routes
    Router::new()
        .merge(prediction_routes)
        .merge(app_routes)
        .merge(appointment_routes)
        .merge(admin_routes)
        .nest_service(uploads::UPLOADS_ROUTE, ServeDir::new(&state.config.upload_dir))
        .layer(DefaultBodyLimit::max(state.config.body_limit_bytes))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
