use core_config::{ConfigError, FromEnv, env_required};
use std::env;

const MIN_SECRET_LEN: usize = 32;

/// JWT verification settings.
///
/// Loaded from `JWT_SECRET`, which must be at least 32 characters.
#[derive(Clone, Debug)]
pub struct JwtConfig {
    /// HMAC signing secret
    pub secret: String,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>) -> Result<Self, ConfigError> {
        let secret = secret.into();
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::ParseError {
                key: "JWT_SECRET".to_string(),
                details: format!(
                    "must be at least {MIN_SECRET_LEN} characters for security (got {})",
                    secret.len()
                ),
            });
        }
        Ok(Self { secret })
    }

    /// Like [`FromEnv::from_env`] but treats an unset `JWT_SECRET` as "identity disabled".
    pub fn from_env_optional() -> Result<Option<Self>, ConfigError> {
        match env::var("JWT_SECRET") {
            Ok(secret) => Self::new(secret).map(Some),
            Err(_) => Ok(None),
        }
    }
}

impl FromEnv for JwtConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Self::new(env_required("JWT_SECRET")?)
    }
}
