use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use axum_helpers::{
    Identity, ValidatedJson,
    errors::responses::{
        BadRequestResponse, BadRequestValidationResponse, InternalServerErrorResponse,
        NotFoundResponse,
    },
};
use database::repository::Repository;
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::{UserError, UserResult};
use crate::models::{
    CreateUser, Credentials, EmailRequest, ForgotPasswordUpdate, ListQuery, ListUsersResponse,
    ResetTokenResponse, Token, UpdateUser, User, UserResponse, VerifyQuery,
};
use crate::service::UserService;

/// OpenAPI documentation for the Users API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_users,
        create_user,
        get_me,
        get_user,
        update_user,
        find_by_credentials,
        find_by_email,
        verify,
        reset_verification_token,
        forgot_password,
        forgot_password_update,
    ),
    components(
        schemas(
            UserResponse,
            CreateUser,
            UpdateUser,
            Credentials,
            EmailRequest,
            ForgotPasswordUpdate,
            ResetTokenResponse,
            ListUsersResponse
        ),
        responses(
            NotFoundResponse,
            BadRequestResponse,
            BadRequestValidationResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = "Users", description = "User accounts, verification and password reset")
    )
)]
pub struct ApiDoc;

type SharedService<U, T> = State<Arc<UserService<U, T>>>;

/// Create the users router with all HTTP endpoints
pub fn router<U, T>(service: UserService<U, T>) -> Router
where
    U: Repository<User> + 'static,
    T: Repository<Token> + 'static,
{
    let shared_service = Arc::new(service);

    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/me", get(get_me))
        .route("/{id}", get(get_user).put(update_user))
        .route("/find", post(find_by_credentials))
        .route("/find/email", post(find_by_email))
        .route("/verify", get(verify))
        .route("/verification/reset", post(reset_verification_token))
        .route(
            "/password/forgot",
            post(forgot_password).put(forgot_password_update),
        )
        .with_state(shared_service)
}

/// List active users
#[utoipa::path(
    get,
    path = "",
    tag = "Users",
    params(ListQuery),
    responses(
        (status = 200, description = "Page of active users", body = ListUsersResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_users<U: Repository<User>, T: Repository<Token>>(
    State(service): SharedService<U, T>,
    identity: Option<Extension<Identity>>,
    Query(query): Query<ListQuery>,
) -> UserResult<Json<ListUsersResponse>> {
    let identity = identity.map(|Extension(identity)| identity);
    let page = service.get_all(identity.as_ref(), query).await?;
    Ok(Json(page))
}

/// Register a user
#[utoipa::path(
    post,
    path = "",
    tag = "Users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_user<U: Repository<User>, T: Repository<Token>>(
    State(service): SharedService<U, T>,
    ValidatedJson(input): ValidatedJson<CreateUser>,
) -> UserResult<impl IntoResponse> {
    let user = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Get the authenticated user
#[utoipa::path(
    get,
    path = "/me",
    tag = "Users",
    responses(
        (status = 200, description = "Authenticated user", body = UserResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_me<U: Repository<User>, T: Repository<Token>>(
    State(service): SharedService<U, T>,
    identity: Option<Extension<Identity>>,
) -> UserResult<Json<UserResponse>> {
    let identity = identity.map(|Extension(identity)| identity);
    let user = service.get_me(identity.as_ref()).await?;
    Ok(Json(user))
}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Users",
    params(
        ("id" = String, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 400, response = BadRequestResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_user<U: Repository<User>, T: Repository<Token>>(
    State(service): SharedService<U, T>,
    Path(id): Path<String>,
) -> UserResult<Json<UserResponse>> {
    let user = service.get(&id).await?;
    Ok(Json(user))
}

/// Update the given fields of a user
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Users",
    params(
        ("id" = String, Path, description = "User ID")
    ),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_user<U: Repository<User>, T: Repository<Token>>(
    State(service): SharedService<U, T>,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<UpdateUser>,
) -> UserResult<Json<UserResponse>> {
    let user = service.update(&id, input).await?;
    Ok(Json(user))
}

/// Look up a user by email and password
#[utoipa::path(
    post,
    path = "/find",
    tag = "Users",
    request_body = Credentials,
    responses(
        (status = 200, description = "Credentials match", body = UserResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn find_by_credentials<U: Repository<User>, T: Repository<Token>>(
    State(service): SharedService<U, T>,
    ValidatedJson(credentials): ValidatedJson<Credentials>,
) -> UserResult<Json<UserResponse>> {
    service
        .find_by_credentials(credentials)
        .await?
        .map(Json)
        .ok_or_else(|| UserError::NotFound("user".to_string()))
}

/// Look up a user by email
#[utoipa::path(
    post,
    path = "/find/email",
    tag = "Users",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn find_by_email<U: Repository<User>, T: Repository<Token>>(
    State(service): SharedService<U, T>,
    ValidatedJson(input): ValidatedJson<EmailRequest>,
) -> UserResult<Json<UserResponse>> {
    let user = service.find_by_email(&input.email).await?;
    Ok(Json(user))
}

/// Consume a verification token and activate its user
#[utoipa::path(
    get,
    path = "/verify",
    tag = "Users",
    params(VerifyQuery),
    responses(
        (status = 200, description = "User activated"),
        (status = 400, response = BadRequestResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn verify<U: Repository<User>, T: Repository<Token>>(
    State(service): SharedService<U, T>,
    Query(query): Query<VerifyQuery>,
) -> UserResult<StatusCode> {
    let token = query
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| UserError::BadRequest("token is missing".to_string()))?;
    service.verify(&token).await?;
    Ok(StatusCode::OK)
}

/// Issue a new verification token for an inactive user
#[utoipa::path(
    post,
    path = "/verification/reset",
    tag = "Users",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "New verification token", body = ResetTokenResponse),
        (status = 400, response = BadRequestResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn reset_verification_token<U: Repository<User>, T: Repository<Token>>(
    State(service): SharedService<U, T>,
    ValidatedJson(input): ValidatedJson<EmailRequest>,
) -> UserResult<Json<ResetTokenResponse>> {
    let token = service.reset_verification_token(&input.email).await?;
    Ok(Json(token))
}

/// Start a password reset. Answers 200 whether or not the email is known.
#[utoipa::path(
    post,
    path = "/password/forgot",
    tag = "Users",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Reset requested"),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn forgot_password<U: Repository<User>, T: Repository<Token>>(
    State(service): SharedService<U, T>,
    ValidatedJson(input): ValidatedJson<EmailRequest>,
) -> UserResult<StatusCode> {
    service.forgot_password(&input.email).await?;
    Ok(StatusCode::OK)
}

/// Set a new password with a forgot-password token
#[utoipa::path(
    put,
    path = "/password/forgot",
    tag = "Users",
    request_body = ForgotPasswordUpdate,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, response = BadRequestResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn forgot_password_update<U: Repository<User>, T: Repository<Token>>(
    State(service): SharedService<U, T>,
    ValidatedJson(input): ValidatedJson<ForgotPasswordUpdate>,
) -> UserResult<StatusCode> {
    service.forgot_password_update(input).await?;
    Ok(StatusCode::OK)
}
