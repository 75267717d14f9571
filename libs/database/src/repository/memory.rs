//! In-process backend.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::cmp::Ordering;
use std::marker::PhantomData;
use tokio::sync::RwLock;
use tracing::instrument;

use super::{
    Document, Filter, Page, Record, Repository, RepositoryError, RepositoryResult, SortDirection,
    created_at, from_document, prepare_insert, prepare_patch,
};

/// Vector-backed repository honoring unique fields and retention like the
/// Mongo backend does. Used by tests and local runs without a database.
pub struct MemoryRepository<T> {
    docs: RwLock<Vec<Document>>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> MemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(Vec::new()),
            _record: PhantomData,
        }
    }

    fn is_live(doc: &Document) -> bool {
        match (T::EXPIRES_AFTER, created_at(doc)) {
            (Some(ttl), Some(created)) => match chrono::Duration::from_std(ttl) {
                Ok(ttl) => created + ttl > Utc::now(),
                Err(_) => true,
            },
            _ => true,
        }
    }

    fn purge_expired(docs: &mut Vec<Document>) {
        docs.retain(Self::is_live);
    }

    fn find_index(docs: &[Document], filter: &Filter) -> Option<usize> {
        docs.iter().position(|doc| filter.matches(doc))
    }

    /// `AlreadyExists` when `candidate` shares a unique value with any record other than `skip`.
    fn check_unique(
        docs: &[Document],
        candidate: &Document,
        skip: Option<usize>,
    ) -> RepositoryResult<()> {
        for field in T::UNIQUE_FIELDS {
            let Some(value) = candidate.get(*field).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = docs
                .iter()
                .enumerate()
                .any(|(i, doc)| Some(i) != skip && doc.get(*field) == Some(value));
            if clash {
                return Err(RepositoryError::AlreadyExists(format!(
                    "{} with this {} already exists",
                    T::COLLECTION,
                    field
                )));
            }
        }
        Ok(())
    }
}

impl<T: Record> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Total order over JSON values: null < bool < number < string < array < object.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[async_trait]
impl<T: Record> Repository<T> for MemoryRepository<T> {
    #[instrument(skip(self), fields(collection = T::COLLECTION))]
    async fn get_one(&self, filter: &Filter) -> RepositoryResult<T> {
        filter.validate()?;
        let docs = self.docs.read().await;
        let doc = docs
            .iter()
            .filter(|doc| Self::is_live(doc))
            .find(|doc| filter.matches(doc))
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(T::COLLECTION.to_string()))?;
        from_document(doc)
    }

    #[instrument(skip(self), fields(collection = T::COLLECTION))]
    async fn get_all(&self, filter: &Filter, page: &Page) -> RepositoryResult<Vec<T>> {
        filter.validate()?;
        let mut matched: Vec<Document> = {
            let docs = self.docs.read().await;
            docs.iter()
                .filter(|doc| Self::is_live(doc) && filter.matches(doc))
                .cloned()
                .collect()
        };

        if let Some(field) = page.order.as_deref() {
            matched.sort_by(|a, b| {
                let ord = compare_values(
                    a.get(field).unwrap_or(&Value::Null),
                    b.get(field).unwrap_or(&Value::Null),
                );
                match page.sort {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        let limit = if page.limit == 0 {
            usize::MAX
        } else {
            page.limit as usize
        };
        let window: Vec<Document> = matched
            .into_iter()
            .skip(page.offset as usize)
            .take(limit)
            .collect();

        if window.is_empty() {
            return Err(RepositoryError::NotFound(T::COLLECTION.to_string()));
        }
        window.into_iter().map(from_document).collect()
    }

    #[instrument(skip(self, doc), fields(collection = T::COLLECTION))]
    async fn save(&self, doc: Document, filter: Option<&Filter>) -> RepositoryResult<Document> {
        let mut docs = self.docs.write().await;
        Self::purge_expired(&mut docs);

        match filter {
            None => {
                let doc = prepare_insert(doc)?;
                Self::check_unique(&docs, &doc, None)?;
                docs.push(doc.clone());
                Ok(doc)
            }
            Some(filter) => {
                filter.validate()?;
                let index = Self::find_index(&docs, filter)
                    .ok_or_else(|| RepositoryError::NotFound(T::COLLECTION.to_string()))?;

                let mut merged = docs[index].clone();
                merged.extend(prepare_patch(doc));
                Self::check_unique(&docs, &merged, Some(index))?;
                docs[index] = merged.clone();
                Ok(merged)
            }
        }
    }

    #[instrument(skip(self), fields(collection = T::COLLECTION))]
    async fn delete_one(&self, filter: &Filter) -> RepositoryResult<()> {
        filter.validate()?;
        let mut docs = self.docs.write().await;
        Self::purge_expired(&mut docs);

        let index = Self::find_index(&docs, filter)
            .ok_or_else(|| RepositoryError::NotFound(T::COLLECTION.to_string()))?;
        docs.remove(index);
        Ok(())
    }

    #[instrument(skip(self), fields(collection = T::COLLECTION))]
    async fn delete_all(&self, filter: &Filter) -> RepositoryResult<u64> {
        filter.validate()?;
        let mut docs = self.docs.write().await;
        Self::purge_expired(&mut docs);

        let before = docs.len();
        docs.retain(|doc| !filter.matches(doc));
        Ok((before - docs.len()) as u64)
    }
}
