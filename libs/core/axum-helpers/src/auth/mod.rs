//! Identity extraction.
//!
//! Tokens are issued elsewhere; this module only verifies them and exposes the
//! caller as an [`Identity`] request extension.
//!
//! ```ignore
//! let verifier = JwtVerifier::new(&JwtConfig::from_env()?);
//! let routes = Router::new()
//!     .route("/me", get(handler))
//!     .layer(axum::middleware::from_fn_with_state(verifier, identity_middleware));
//! ```

pub mod config;
pub mod jwt;
pub mod middleware;

pub use config::JwtConfig;
pub use jwt::{Identity, JwtClaims, JwtVerifier};
pub use middleware::identity_middleware;
