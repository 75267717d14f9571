//! OpenAPI documentation configuration

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Users API",
        version = "0.1.0",
        description = "User accounts: registration, verification, credential lookup and password reset",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    nest(
        (path = "/api/users", api = domain_users::handlers::ApiDoc)
    ),
    tags(
        (name = "Users", description = "User accounts, verification and password reset")
    )
)]
pub struct ApiDoc;
