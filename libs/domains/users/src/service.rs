use axum_helpers::Identity;
use database::repository::{
    Document, Filter, Page, Repository, RepositoryError, from_document, to_document,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::credentials::{
    EXPIRED, TOKEN_BYTES, generate_expiry, generate_token, hash_password, is_expired,
    tokens_match, verify_password_or_dummy,
};
use crate::error::{UserError, UserResult};
use crate::models::{
    CreateUser, Credentials, DEFAULT_ROLE, ForgotPasswordToken, ForgotPasswordUpdate, ListQuery,
    ListUsersResponse, ResetTokenResponse, Token, UpdateUser, User, UserResponse,
};
use crate::notifications::{EmailNotification, Notifier, Template};

pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(2);

/// Name used in notifications; the user record carries no display name.
const NOTIFICATION_NAME: &str = "User";

fn by_email(email: &str) -> Filter {
    Filter::new().matching("email", email)
}

fn by_token(token: &str) -> Filter {
    Filter::new().matching("token", token)
}

/// Drops `null` members so optional fields stay absent in the store.
fn compact(mut doc: Document) -> Document {
    doc.retain(|_, value| !value.is_null());
    doc
}

/// User lifecycle: registration, lookups, verification and password reset.
pub struct UserService<U, T> {
    users: Arc<U>,
    tokens: Arc<T>,
    notifier: Option<Arc<dyn Notifier>>,
    notify_timeout: Duration,
}

impl<U, T> Clone for UserService<U, T> {
    fn clone(&self) -> Self {
        Self {
            users: Arc::clone(&self.users),
            tokens: Arc::clone(&self.tokens),
            notifier: self.notifier.clone(),
            notify_timeout: self.notify_timeout,
        }
    }
}

impl<U, T> UserService<U, T>
where
    U: Repository<User>,
    T: Repository<Token>,
{
    pub fn new(users: U, tokens: T) -> Self {
        Self {
            users: Arc::new(users),
            tokens: Arc::new(tokens),
            notifier: None,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }

    /// Publish email notifications; each publish is bounded by `timeout`.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        self.notifier = Some(notifier);
        self.notify_timeout = timeout;
        self
    }

    /// Register a user and issue its verification token.
    ///
    /// The user and token writes are not transactional: a failed token write
    /// leaves an inactive user that can request a new token.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create(&self, input: CreateUser) -> UserResult<UserResponse> {
        if input.password.is_none() && input.external_id.is_none() {
            return Err(UserError::InvalidInput(
                "password or external_id must be specified".to_string(),
            ));
        }

        let roles = if input.roles.is_empty() {
            vec![DEFAULT_ROLE.to_string()]
        } else {
            input.roles
        };
        let password = input.password.as_deref().map(hash_password).transpose()?;

        let doc = compact(to_document(&json!({
            "email": input.email,
            "password": password,
            "external_id": input.external_id,
            "roles": roles,
            "organizations": input.organizations,
            "namespaces": input.namespaces,
            "active": false,
        }))?);
        let user: User = from_document(self.users.save(doc, None).await?)?;
        info!(user_id = %user.id, "User created");

        let token = input
            .token
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| generate_token(TOKEN_BYTES));
        let token = self.issue_token(&user.email, token).await?;

        self.notify(EmailNotification {
            id: user.id.clone(),
            name: NOTIFICATION_NAME.to_string(),
            email: user.email.clone(),
            token: token.token,
            template: Template::Verification,
        })
        .await;

        Ok(user.into())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> UserResult<UserResponse> {
        let user = self.users.get_one(&Filter::by_id(id)).await?;
        Ok(user.into())
    }

    /// The caller's own record. A missing identity means the auth layer is not wired.
    pub async fn get_me(&self, identity: Option<&Identity>) -> UserResult<UserResponse> {
        let identity = identity.ok_or(UserError::MissingIdentity)?;
        self.get(&identity.user_id).await
    }

    /// Active users, one page at a time.
    #[instrument(skip(self, identity))]
    pub async fn get_all(
        &self,
        identity: Option<&Identity>,
        query: ListQuery,
    ) -> UserResult<ListUsersResponse> {
        identity.ok_or(UserError::MissingIdentity)?;

        let page = query.to_page();
        let users = self
            .users
            .get_all(&Filter::new().matching("active", true), &page)
            .await?;

        Ok(ListUsersResponse {
            data: users.into_iter().map(UserResponse::from).collect(),
            limit: page.limit,
            offset: page.offset,
        })
    }

    /// Merge the provided fields into the user. `active` never goes back to false.
    ///
    /// An email change moves outstanding verification tokens to the new address.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: &str, input: UpdateUser) -> UserResult<UserResponse> {
        let filter = Filter::by_id(id);
        let current = self.users.get_one(&filter).await?;

        let mut patch = to_document(&input)?;
        patch.remove("password");
        if let Some(password) = input.password.as_deref().filter(|p| !p.is_empty()) {
            patch.insert("password".into(), Value::String(hash_password(password)?));
        }
        if current.active && input.active == Some(false) {
            debug!("Ignoring deactivation of an active user");
            patch.remove("active");
        }

        let user: User = from_document(self.users.save(patch, Some(&filter)).await?)?;
        info!(user_id = %user.id, "User updated");

        if user.email != current.email {
            self.move_tokens(&current.email, &user.email).await;
        }
        Ok(user.into())
    }

    /// `None` when the email is unknown, the account has no password, or the
    /// password does not match. The three cases are indistinguishable.
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn find_by_credentials(
        &self,
        credentials: Credentials,
    ) -> UserResult<Option<UserResponse>> {
        let user = match self.users.get_one(&by_email(&credentials.email)).await {
            Ok(user) => Some(user),
            Err(RepositoryError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };

        let hash = user.as_ref().and_then(|user| user.password.as_deref());
        let matches = verify_password_or_dummy(hash, &credentials.password);
        Ok(user.filter(|_| matches).map(UserResponse::from))
    }

    #[instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> UserResult<UserResponse> {
        let user = self.users.get_one(&by_email(email)).await?;
        Ok(user.into())
    }

    /// Activate the user a verification token was issued for, then consume the token.
    ///
    /// If the token delete fails after activation the token stays valid; using it
    /// again only re-activates an active user.
    #[instrument(skip(self, token))]
    pub async fn verify(&self, token: &str) -> UserResult<()> {
        let record = self.tokens.get_one(&by_token(token)).await?;

        let activate = to_document(&json!({ "active": true }))?;
        self.users
            .save(activate, Some(&by_email(&record.email)))
            .await?;

        match self.tokens.delete_one(&by_token(token)).await {
            Ok(()) | Err(RepositoryError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        info!(email = %record.email, "User verified");
        Ok(())
    }

    /// Replace every outstanding verification token of an inactive user.
    #[instrument(skip(self))]
    pub async fn reset_verification_token(&self, email: &str) -> UserResult<ResetTokenResponse> {
        let user = self.users.get_one(&by_email(email)).await?;
        if user.active {
            return Err(UserError::BadRequest("user is already active".to_string()));
        }

        match self.tokens.delete_all(&by_email(&user.email)).await {
            Ok(removed) => debug!(removed, "Removed outstanding tokens"),
            Err(e) => warn!(error = %e, "Failed to remove outstanding tokens"),
        }

        let token = self
            .issue_token(&user.email, generate_token(TOKEN_BYTES))
            .await?;
        Ok(token.into())
    }

    /// Embed a fresh forgot-password token on the user. Unknown emails succeed silently.
    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> UserResult<()> {
        let user = match self.users.get_one(&by_email(email)).await {
            Ok(user) => user,
            Err(RepositoryError::NotFound(_)) => {
                debug!("Forgot password for unknown email");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let grant = ForgotPasswordToken {
            token: generate_token(TOKEN_BYTES),
            expiry: generate_expiry(),
        };
        let patch = to_document(&json!({ "forgot_password": &grant }))?;
        self.users.save(patch, Some(&Filter::by_id(&user.id))).await?;
        debug!(token = %grant.token, "Forgot password token issued");

        self.notify(EmailNotification {
            id: user.id,
            name: NOTIFICATION_NAME.to_string(),
            email: user.email,
            token: grant.token,
            template: Template::ForgotPassword,
        })
        .await;
        Ok(())
    }

    /// Set a new password with a forgot-password token. The token is spent on success.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn forgot_password_update(&self, input: ForgotPasswordUpdate) -> UserResult<()> {
        let user = self.users.get_one(&by_email(&input.email)).await?;

        let grant = user
            .forgot_password
            .filter(|grant| tokens_match(&grant.token, &input.token))
            .ok_or_else(|| UserError::BadRequest("invalid password reset token".to_string()))?;
        if is_expired(grant.expiry) {
            return Err(UserError::BadRequest(
                "password reset token has expired".to_string(),
            ));
        }

        let spent = ForgotPasswordToken {
            token: grant.token,
            expiry: EXPIRED,
        };
        let patch = to_document(&json!({
            "password": hash_password(&input.password)?,
            "forgot_password": &spent,
        }))?;
        self.users.save(patch, Some(&Filter::by_id(&user.id))).await?;
        info!(user_id = %user.id, "Password reset");
        Ok(())
    }

    async fn issue_token(&self, email: &str, token: String) -> UserResult<Token> {
        let doc = to_document(&json!({ "email": email, "token": token }))?;
        let token: Token = from_document(self.tokens.save(doc, None).await?)?;
        debug!(token = %token.token, "Verification token issued");
        Ok(token)
    }

    /// Re-point every token issued for `old` to `new`. Failures are logged; the
    /// user can still request a fresh token.
    async fn move_tokens(&self, old: &str, new: &str) {
        let outstanding = match self.tokens.get_all(&by_email(old), &Page::default()).await {
            Ok(tokens) => tokens,
            Err(RepositoryError::NotFound(_)) => return,
            Err(e) => {
                warn!(error = %e, "Failed to look up outstanding tokens");
                return;
            }
        };

        let patch = match to_document(&json!({ "email": new })) {
            Ok(patch) => patch,
            Err(e) => {
                warn!(error = %e, "Failed to build token patch");
                return;
            }
        };
        for token in outstanding {
            let moved = self
                .tokens
                .save(patch.clone(), Some(&by_token(&token.token)))
                .await;
            if let Err(e) = moved {
                warn!(error = %e, "Failed to move verification token");
            }
        }
        debug!("Moved outstanding tokens to the new email");
    }

    /// Best effort: failures and timeouts are logged and swallowed.
    async fn notify(&self, notification: EmailNotification) {
        let Some(notifier) = &self.notifier else {
            return;
        };

        match tokio::time::timeout(self.notify_timeout, notifier.notify(&notification)).await {
            Ok(Ok(())) => debug!(template = %notification.template, "Notification sent"),
            Ok(Err(e)) => warn!(
                error = %e,
                template = %notification.template,
                "Failed to send notification"
            ),
            Err(_) => warn!(
                template = %notification.template,
                timeout_ms = self.notify_timeout.as_millis() as u64,
                "Notification timed out"
            ),
        }
    }
}
