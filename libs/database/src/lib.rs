//! Storage layer: MongoDB connection management and a filter-based repository
//! abstraction with in-memory and MongoDB backends.
//!
//! # Features
//!
//! - `mongodb` (default) - MongoDB connector and `MongoRepository`
//! - `config` - `core_config::FromEnv` for `MongoConfig`
//!
//! ```ignore
//! use database::mongodb::{MongoConfig, connect_from_config_with_retry};
//! use database::repository::{Filter, MongoRepository, Repository};
//!
//! let client = connect_from_config_with_retry(&config, &RetryConfig::default()).await?;
//! let users = MongoRepository::<User>::new(&client.database(&config.database));
//! users.ensure_indexes().await?;
//! let user = users.get_one(&Filter::new().matching("email", "a@b.com")).await?;
//! ```

pub mod common;
pub mod repository;

#[cfg(feature = "mongodb")]
pub mod mongodb;

pub use common::{DatabaseError, DatabaseResult};
pub use repository::{Document, Filter, Page, Record, Repository, RepositoryError, RepositoryResult};
