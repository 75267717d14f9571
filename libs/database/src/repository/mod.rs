//! Storage-agnostic, filter-based repository.
//!
//! Records travel as JSON documents ([`Document`]); typed access goes through
//! the [`Record`] trait. Two backends implement [`Repository`]:
//! [`MemoryRepository`] and, with the `mongodb` feature, `MongoRepository`.
//!
//! Conventions shared by every backend:
//! - `id` is a UUID string, generated (v7) on insert when absent and never changed by updates
//! - `created_at` is stamped on insert (RFC 3339) and drives [`Record::EXPIRES_AFTER`]
//! - `save(doc, None)` inserts, `save(patch, Some(filter))` merges `patch` into the first match

mod filter;
mod memory;
#[cfg(feature = "mongodb")]
mod mongo;

pub use filter::Filter;
pub use memory::MemoryRepository;
#[cfg(feature = "mongodb")]
pub use mongo::MongoRepository;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::time::Duration;
use strum::{Display, EnumString};
use thiserror::Error;
use uuid::Uuid;

pub const ID_FIELD: &str = "id";
pub const CREATED_AT_FIELD: &str = "created_at";

/// Generic record payload.
pub type Document = serde_json::Map<String, Value>;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// A typed record stored in its own collection.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: &'static str;
    /// Fields backed by a unique index. Missing values do not collide.
    const UNIQUE_FIELDS: &'static [&'static str] = &[];
    /// Retention measured from `created_at`.
    const EXPIRES_AFTER: Option<Duration> = None;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Ordering and window for [`Repository::get_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// Field to order by; insertion order when `None`
    pub order: Option<String>,
    pub sort: SortDirection,
    /// 0 means unbounded
    pub limit: u64,
    pub offset: u64,
}

#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    /// First record matching `filter`.
    async fn get_one(&self, filter: &Filter) -> RepositoryResult<T>;

    /// Matching records in `page` order. An empty page is `NotFound`.
    async fn get_all(&self, filter: &Filter, page: &Page) -> RepositoryResult<Vec<T>>;

    /// Insert (`filter == None`) or merge into the first match. Returns the stored document.
    async fn save(&self, doc: Document, filter: Option<&Filter>) -> RepositoryResult<Document>;

    /// Remove the first match; `NotFound` when nothing matched.
    async fn delete_one(&self, filter: &Filter) -> RepositoryResult<()>;

    /// Remove every match and return how many were removed.
    async fn delete_all(&self, filter: &Filter) -> RepositoryResult<u64>;
}

/// Serialize a value that must encode as a JSON object.
pub fn to_document<S: Serialize>(value: &S) -> RepositoryResult<Document> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(RepositoryError::InvalidInput(format!(
            "expected an object, got {other}"
        ))),
        Err(e) => Err(RepositoryError::InvalidInput(e.to_string())),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> RepositoryResult<T> {
    serde_json::from_value(Value::Object(doc))
        .map_err(|e| RepositoryError::Backend(format!("undecodable record: {e}")))
}

/// Fills `id` and `created_at` on a document about to be inserted.
pub(crate) fn prepare_insert(mut doc: Document) -> RepositoryResult<Document> {
    match doc.get(ID_FIELD) {
        None | Some(Value::Null) => {
            doc.insert(ID_FIELD.into(), Value::String(Uuid::now_v7().to_string()));
        }
        Some(Value::String(id)) if Uuid::parse_str(id).is_ok() => {}
        Some(other) => {
            return Err(RepositoryError::InvalidInput(format!("invalid id: {other}")));
        }
    }
    if !doc.contains_key(CREATED_AT_FIELD) {
        doc.insert(
            CREATED_AT_FIELD.into(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
    }
    Ok(doc)
}

/// Strips the fields an update may never touch.
pub(crate) fn prepare_patch(mut doc: Document) -> Document {
    doc.remove(ID_FIELD);
    doc.remove(CREATED_AT_FIELD);
    doc
}

pub(crate) fn created_at(doc: &Document) -> Option<DateTime<Utc>> {
    doc.get(CREATED_AT_FIELD)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prepare_insert_generates_id_and_timestamp() {
        let doc = prepare_insert(to_document(&json!({"email": "a@b.com"})).unwrap()).unwrap();
        let id = doc[ID_FIELD].as_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
        assert!(created_at(&doc).is_some());
    }

    #[test]
    fn test_prepare_insert_rejects_malformed_id() {
        let doc = to_document(&json!({"id": "nope"})).unwrap();
        assert!(matches!(
            prepare_insert(doc),
            Err(RepositoryError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_prepare_patch_keeps_identity() {
        let patch = prepare_patch(
            to_document(&json!({"id": "x", "created_at": "y", "active": true})).unwrap(),
        );
        assert_eq!(patch.len(), 1);
        assert_eq!(patch["active"], json!(true));
    }

    #[test]
    fn test_to_document_requires_object() {
        assert!(to_document(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_sort_direction_parsing() {
        assert_eq!("DESC".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        assert_eq!(SortDirection::default().to_string(), "asc");
        assert!("sideways".parse::<SortDirection>().is_err());
    }
}
