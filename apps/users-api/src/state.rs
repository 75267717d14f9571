//! Shared application state, built once at startup and handed to the routers.

use axum_helpers::JwtVerifier;
use mongodb::{Client, Database};

#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::Config,
    /// Kept for readiness checks and the explicit close at shutdown
    pub mongo_client: Client,
    pub db: Database,
    /// `None` disables email notifications
    pub nats: Option<async_nats::Client>,
    /// `None` disables identity extraction
    pub jwt: Option<JwtVerifier>,
}
