use chrono::{DateTime, Utc};
use database::repository::{Page, Record, SortDirection};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

pub const DEFAULT_ROLE: &str = "user";

/// Token retention enforced by the store.
pub const TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Forgot-password grant embedded on the user record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgotPasswordToken {
    pub token: String,
    /// Minutes since epoch; 0 once consumed
    pub expiry: i64,
}

/// Stored user record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    /// Argon2 hash, absent for externally authenticated accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(default)]
    pub namespaces: Vec<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forgot_password: Option<ForgotPasswordToken>,
    pub created_at: DateTime<Utc>,
}

impl Record for User {
    const COLLECTION: &'static str = "users";
    const UNIQUE_FIELDS: &'static [&'static str] = &["email"];
}

/// Outstanding verification token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub email: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

impl Record for Token {
    const COLLECTION: &'static str = "tokens";
    const UNIQUE_FIELDS: &'static [&'static str] = &["token"];
    const EXPIRES_AFTER: Option<Duration> = Some(TOKEN_TTL);
}

/// User response DTO (never carries the password hash)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub roles: Vec<String>,
    pub organizations: Vec<String>,
    pub namespaces: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            external_id: user.external_id,
            roles: user.roles,
            organizations: user.organizations,
            namespaces: user.namespaces,
            active: user.active,
            created_at: user.created_at,
        }
    }
}

/// DTO for registering a user. One of `password` or `external_id` is required.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(email, length(max = 255))]
    pub email: String,
    #[validate(length(min = 6, max = 30))]
    pub password: Option<String>,
    pub external_id: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(default)]
    pub namespaces: Vec<String>,
    /// Caller-supplied verification token
    pub token: Option<String>,
}

/// DTO for a partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateUser {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email, length(max = 255))]
    pub email: Option<String>,
    /// Empty keeps the current password
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_new_password"))]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

fn validate_new_password(password: &str) -> Result<(), ValidationError> {
    match password.chars().count() {
        0 | 6..=30 => Ok(()),
        _ => Err(ValidationError::new("length")),
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct Credentials {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct EmailRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordUpdate {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(min = 6, max = 30))]
    pub password: String,
}

/// Freshly issued verification token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResetTokenResponse {
    pub id: String,
    pub email: String,
    pub token: String,
}

impl From<Token> for ResetTokenResponse {
    fn from(token: Token) -> Self {
        Self {
            id: token.id,
            email: token.email,
            token: token.token,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VerifyQuery {
    /// Verification token issued at registration
    pub token: Option<String>,
}

/// Listing parameters for active users
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Field to order by
    pub order: Option<String>,
    /// `asc` or `desc`
    pub sorting: Option<String>,
    /// Page size, 0 or absent for no limit
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl ListQuery {
    /// Unknown sort directions fall back to ascending.
    pub fn to_page(&self) -> Page {
        Page {
            order: self.order.clone().filter(|o| !o.is_empty()),
            sort: self
                .sorting
                .as_deref()
                .and_then(|s| s.parse::<SortDirection>().ok())
                .unwrap_or_default(),
            limit: self.limit.unwrap_or(0),
            offset: self.offset.unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListUsersResponse {
    pub data: Vec<UserResponse>,
    pub limit: u64,
    pub offset: u64,
}
