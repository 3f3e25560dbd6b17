use anyhow::Result;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

mod error;
mod models;
mod password;
mod rate_limiter;
mod repositories;
mod routes;
mod validation;

use common::database::{self, DatabaseConfig};
use common::token::{TokenConfig, TokenService};

use crate::rate_limiter::RateLimiter;
use crate::repositories::UserRepository;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub user_repository: UserRepository,
    pub token_service: TokenService,
    pub register_limiter: RateLimiter,
    pub login_limiter: RateLimiter,
    pub refresh_limiter: RateLimiter,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    info!("Starting identity service");

    // Initialize the user store, degrading to in-memory when the database
    // is unreachable so the service stays available (not durable).
    let db_config = DatabaseConfig::from_env()?;
    let user_repository = match database::init_pool(&db_config).await {
        Ok(pool) => match database::health_check(&pool).await {
            Ok(_) => {
                info!("Database connection successful");
                UserRepository::postgres(pool)
            }
            Err(e) => {
                warn!("Database health check failed, using in-memory user store: {}", e);
                UserRepository::in_memory()
            }
        },
        Err(e) => {
            warn!("Failed to connect to database, using in-memory user store: {}", e);
            UserRepository::in_memory()
        }
    };

    let token_service = TokenService::new(TokenConfig::from_env());

    // Per-endpoint sliding windows: 5 registrations and 10 logins per five
    // minutes, 5 refreshes per minute, keyed by client address.
    let app_state = AppState {
        user_repository,
        token_service,
        register_limiter: RateLimiter::new(5, Duration::from_secs(300)),
        login_limiter: RateLimiter::new(10, Duration::from_secs(300)),
        refresh_limiter: RateLimiter::new(5, Duration::from_secs(60)),
    };

    let app = routes::create_router(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5001);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Identity service listening on 0.0.0.0:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
