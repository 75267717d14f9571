use axum_helpers::{JwtVerifier, create_production_app, create_router, health_router};
use core_config::tracing::{init_tracing, install_color_eyre};
use database::common::RetryConfig;
use std::time::Duration;
use tracing::{info, warn};

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    info!(database = %config.mongodb.database, "Connecting to MongoDB");
    let mongo_client =
        database::mongodb::connect_from_config_with_retry(&config.mongodb, &RetryConfig::default())
            .await?;
    let db = mongo_client.database(&config.mongodb.database);

    api::users::init_indexes(&db).await?;

    let nats = match &config.notifications.url {
        Some(url) => {
            info!("Connecting to NATS at {}", url);
            Some(async_nats::connect(url.as_str()).await?)
        }
        None => None,
    };

    let jwt = config.jwt.as_ref().map(JwtVerifier::new);

    let state = AppState {
        config,
        mongo_client,
        db,
        nats,
        jwt,
    };

    let api_routes = api::routes(&state);
    let router =
        create_router::<openapi::ApiDoc>(api_routes, state.config.server.request_timeout)?;
    let app = router
        .merge(health_router(state.config.app.clone()))
        .merge(api::health::router(state.clone()));

    info!(
        "Starting {} v{}",
        state.config.app.name, state.config.app.version
    );

    let server_config = state.config.server.clone();
    create_production_app(app, &server_config, SHUTDOWN_TIMEOUT, async move {
        if let Some(nats) = state.nats {
            info!("Flushing pending NATS messages");
            if let Err(e) = nats.flush().await {
                warn!("Failed to flush NATS: {}", e);
            }
        }
        database::mongodb::close(state.mongo_client).await;
    })
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Users API shutdown complete");
    Ok(())
}
