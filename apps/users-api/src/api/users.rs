//! Users API routes

use axum::{Router, middleware::from_fn_with_state};
use axum_helpers::identity_middleware;
use database::repository::{MongoRepository, RepositoryResult};
use database::mongodb::Database;
use domain_users::{NatsNotifier, Token, User, UserService, handlers};
use std::sync::Arc;
use tracing::{info, warn};

use crate::state::AppState;

/// Unique indexes on user emails and tokens, plus the token TTL index.
pub async fn init_indexes(db: &Database) -> RepositoryResult<()> {
    MongoRepository::<User>::new(db).ensure_indexes().await?;
    MongoRepository::<Token>::new(db).ensure_indexes().await?;
    Ok(())
}

pub fn router(state: &AppState) -> Router {
    let mut service = UserService::new(
        MongoRepository::<User>::new(&state.db),
        MongoRepository::<Token>::new(&state.db),
    );

    let notifications = &state.config.notifications;
    match &state.nats {
        Some(client) => {
            info!(subject = %notifications.subject, "Email notifications enabled");
            let notifier = NatsNotifier::new(client.clone(), notifications.subject.clone());
            service = service.with_notifier(Arc::new(notifier), notifications.timeout);
        }
        None => info!("NATS_URL not set, email notifications disabled"),
    }

    let router = handlers::router(service);
    match &state.jwt {
        Some(verifier) => router.layer(from_fn_with_state(verifier.clone(), identity_middleware)),
        None => {
            warn!("JWT_SECRET not set, /users/me and user listing are unavailable");
            router
        }
    }
}
