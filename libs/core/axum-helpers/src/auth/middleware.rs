use super::jwt::{Identity, JwtVerifier};
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

/// Extract JWT from Authorization header or cookie
fn extract_token_from_request(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer ").map(|s| s.to_string()))
        .or_else(|| {
            headers
                .get("cookie")
                .and_then(|v| v.to_str().ok())
                .and_then(|cookies| {
                    cookies.split(';').find_map(|cookie| {
                        cookie
                            .trim()
                            .split_once('=')
                            .filter(|(name, _)| *name == "access_token")
                            .map(|(_, value)| value.to_string())
                    })
                })
        })
}

/// Attaches an [`Identity`] to the request when a valid token is present.
///
/// Never rejects: routes that need a caller decide what a missing identity means.
pub async fn identity_middleware(
    State(verifier): State<JwtVerifier>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_token_from_request(&headers) {
        match verifier.verify_token(&token) {
            Ok(claims) => {
                request.extensions_mut().insert(Identity::from(claims));
            }
            Err(e) => tracing::debug!("JWT verification failed: {}", e),
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtConfig;
    use axum::{Extension, Router, body::Body, http::StatusCode, routing::get};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(verifier: JwtVerifier) -> Router {
        Router::new()
            .route(
                "/whoami",
                get(|identity: Option<Extension<Identity>>| async move {
                    identity
                        .map(|Extension(id)| id.user_id)
                        .unwrap_or_else(|| "anonymous".to_string())
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                verifier,
                identity_middleware,
            ))
    }

    async fn whoami(verifier: JwtVerifier, header: Option<(&str, String)>) -> String {
        let mut builder = Request::builder().uri("/whoami");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        let response = app(verifier)
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn verifier() -> JwtVerifier {
        JwtVerifier::new(&JwtConfig::new("this-is-a-valid-secret-with-32-chars!").unwrap())
    }

    #[tokio::test]
    async fn test_bearer_token_sets_identity() {
        let jwt = verifier();
        let token = jwt.issue_token("user-1", 60).unwrap();
        let who = whoami(jwt, Some(("authorization", format!("Bearer {token}")))).await;
        assert_eq!(who, "user-1");
    }

    #[tokio::test]
    async fn test_cookie_token_sets_identity() {
        let jwt = verifier();
        let token = jwt.issue_token("user-2", 60).unwrap();
        let who = whoami(jwt, Some(("cookie", format!("theme=dark; access_token={token}")))).await;
        assert_eq!(who, "user-2");
    }

    #[tokio::test]
    async fn test_invalid_token_is_anonymous() {
        let who = whoami(verifier(), Some(("authorization", "Bearer garbage".to_string()))).await;
        assert_eq!(who, "anonymous");
    }
}
