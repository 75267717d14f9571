use axum_helpers::JwtConfig;
use core_config::{
    AppInfo, ConfigError, FromEnv, app_info, env_or_default, env_parse_or, server::ServerConfig,
};
use database::mongodb::MongoConfig;
use domain_users::notifications::DEFAULT_SUBJECT;
use std::time::Duration;

pub use core_config::Environment;

/// Email notification publishing over NATS.
#[derive(Clone, Debug)]
pub struct NotificationConfig {
    /// `NATS_URL`; notifications are off when unset
    pub url: Option<String>,
    /// `NOTIFICATION_SUBJECT`
    pub subject: String,
    /// `NOTIFICATION_TIMEOUT_MS`, bound on a single publish
    pub timeout: Duration,
}

impl FromEnv for NotificationConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: std::env::var("NATS_URL").ok().filter(|url| !url.is_empty()),
            subject: env_or_default("NOTIFICATION_SUBJECT", DEFAULT_SUBJECT),
            timeout: Duration::from_millis(env_parse_or("NOTIFICATION_TIMEOUT_MS", 2000u64)?),
        })
    }
}

/// Application-specific configuration
/// Composes shared config components from the `config` library
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub environment: Environment,
    pub server: ServerConfig,
    pub mongodb: MongoConfig,
    pub jwt: Option<JwtConfig>,
    pub notifications: NotificationConfig,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let app = app_info!();
        let mut mongodb = MongoConfig::from_env()?;
        if mongodb.app_name.is_none() {
            mongodb = mongodb.with_app_name(app.name);
        }

        Ok(Self {
            app,
            environment: Environment::from_env(),
            server: ServerConfig::from_env()?,
            mongodb,
            jwt: JwtConfig::from_env_optional()?,
            notifications: NotificationConfig::from_env()?,
        })
    }
}
