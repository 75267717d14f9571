//! Users Domain
//!
//! User accounts for the platform: registration, credential lookup, email
//! verification and password reset.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐     ┌───────────────┐
//! │   Service   │ ──► │   Notifier    │  ← optional, NATS
//! └──────┬──────┘     └───────────────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← `database::repository` (users + tokens)
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use database::repository::MemoryRepository;
//! use domain_users::{handlers, service::UserService};
//!
//! let service = UserService::new(MemoryRepository::new(), MemoryRepository::new());
//! let router = handlers::router(service);
//! ```

pub mod credentials;
pub mod error;
pub mod handlers;
pub mod models;
pub mod notifications;
pub mod service;

pub use error::{UserError, UserResult};
pub use models::{CreateUser, Token, UpdateUser, User, UserResponse};
pub use notifications::{NatsNotifier, Notifier};
pub use service::UserService;
