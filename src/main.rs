use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod config;
mod db;
mod models;
mod services;
mod store;

use crate::auth::jwt::JwtManager;
use crate::config::AppConfig;
use crate::db::Database;
use crate::services::identity::IdentityService;
use crate::services::ledger::LedgerService;
use crate::store::{MemoryUserStore, PgUserStore, UserStore};

pub struct AppState {
    pub config: AppConfig,
    pub identity: IdentityService,
    pub ledger: LedgerService,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "refearn_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    tracing::info!("Starting Refearn Backend v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.environment);

    // Select the user store
    let store: Arc<dyn UserStore> = match config.database_url.as_deref() {
        Some(url) => {
            let db = Database::connect(url).await?;
            db.migrate().await?;
            anyhow::ensure!(db.health_check().await, "database health check failed");
            tracing::info!("Database connected");
            Arc::new(PgUserStore::new(db.pool.clone()))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store (state is not persisted)");
            Arc::new(MemoryUserStore::new())
        }
    };

    // Build application state
    let jwt = JwtManager::new(&config.jwt_secret, config.jwt_expiry_seconds);
    let state = Arc::new(AppState {
        identity: IdentityService::new(store.clone(), jwt),
        ledger: LedgerService::new(store),
        config: config.clone(),
    });

    let app = api::routes::app_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
