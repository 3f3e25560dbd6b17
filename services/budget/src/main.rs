use anyhow::Result;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

mod analytics;
mod auth_client;
mod error;
mod models;
mod repositories;
mod routes;
mod session;
mod state;
mod trust;

use common::database::{self, DatabaseConfig};
use common::token::{TokenConfig, TokenService};

use crate::auth_client::{AuthClient, AuthClientConfig};
use crate::repositories::{BudgetRepository, ExpenseRepository};
use crate::session::SessionStore;
use crate::state::AppState;
use crate::trust::{TrustConfig, TrustPolicy};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    info!("Starting budget service");

    // Initialize the stores, degrading to in-memory when the database is
    // unreachable so the service stays available (not durable).
    let db_config = DatabaseConfig::from_env()?;
    let (budget_repository, expense_repository) = match database::init_pool(&db_config).await {
        Ok(pool) => match database::health_check(&pool).await {
            Ok(_) => {
                info!("Database connection successful");
                (
                    BudgetRepository::postgres(pool.clone()),
                    ExpenseRepository::postgres(pool),
                )
            }
            Err(e) => {
                warn!("Database health check failed, using in-memory stores: {}", e);
                (BudgetRepository::in_memory(), ExpenseRepository::in_memory())
            }
        },
        Err(e) => {
            warn!("Failed to connect to database, using in-memory stores: {}", e);
            (BudgetRepository::in_memory(), ExpenseRepository::in_memory())
        }
    };

    let trust_config = TrustConfig::from_env();
    if trust_config.debug_accept_all || trust_config.accept_legacy_hash || trust_config.fail_open {
        warn!("Trust policy fallbacks enabled: {:?}", trust_config);
    }

    let app_state = AppState {
        budget_repository,
        expense_repository,
        session_store: SessionStore::new(),
        trust_policy: TrustPolicy::new(trust_config, TokenService::new(TokenConfig::from_env())),
        auth_client: AuthClient::new(&AuthClientConfig::from_env())?,
    };

    let app = routes::create_router(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5000);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Budget service listening on 0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
