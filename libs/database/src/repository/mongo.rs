//! MongoDB backend.
//!
//! Documents keep their `id` in `_id` and `created_at` as a BSON date so the
//! TTL index can act on it. Both are translated back on the way out.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    Collection, Database, IndexModel,
    bson::{self, Bson, doc},
    error::{ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
};
use serde_json::Value;
use std::marker::PhantomData;
use tracing::{info, instrument};

use super::{
    CREATED_AT_FIELD, Document, Filter, ID_FIELD, Page, Record, Repository, RepositoryError,
    RepositoryResult, SortDirection, from_document, prepare_insert, prepare_patch,
};

const MONGO_ID: &str = "_id";
const DUPLICATE_KEY: i32 = 11000;

impl From<mongodb::error::Error> for RepositoryError {
    fn from(err: mongodb::error::Error) -> Self {
        let duplicate = match err.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
            ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
            _ => false,
        };
        if duplicate {
            RepositoryError::AlreadyExists(err.to_string())
        } else {
            RepositoryError::Backend(err.to_string())
        }
    }
}

fn field_name(field: &str) -> &str {
    if field == ID_FIELD { MONGO_ID } else { field }
}

fn to_bson_value(value: &Value) -> RepositoryResult<Bson> {
    bson::to_bson(value).map_err(|e| RepositoryError::InvalidInput(e.to_string()))
}

fn to_bson_document(doc: &Document) -> RepositoryResult<bson::Document> {
    let mut out = bson::Document::new();
    for (key, value) in doc {
        let encoded = match (key.as_str(), value) {
            (CREATED_AT_FIELD, Value::String(s)) => bson::DateTime::parse_rfc3339_str(s)
                .map(Bson::DateTime)
                .map_err(|e| RepositoryError::InvalidInput(e.to_string()))?,
            _ => to_bson_value(value)?,
        };
        out.insert(field_name(key), encoded);
    }
    Ok(out)
}

fn from_bson_document(doc: bson::Document) -> RepositoryResult<Document> {
    let mut out = Document::new();
    for (key, value) in doc {
        let key = if key == MONGO_ID { ID_FIELD.to_string() } else { key };
        let decoded = match value {
            Bson::DateTime(dt) => Value::String(
                dt.try_to_rfc3339_string()
                    .map_err(|e| RepositoryError::Backend(e.to_string()))?,
            ),
            other => other.into_relaxed_extjson(),
        };
        out.insert(key, decoded);
    }
    Ok(out)
}

fn to_query(filter: &Filter) -> RepositoryResult<bson::Document> {
    filter.validate()?;
    let mut query = bson::Document::new();
    for (field, value) in filter.predicates() {
        query.insert(field_name(field), to_bson_value(value)?);
    }
    Ok(query)
}

/// Repository over the `T::COLLECTION` collection.
pub struct MongoRepository<T> {
    collection: Collection<bson::Document>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> MongoRepository<T> {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(T::COLLECTION),
            _record: PhantomData,
        }
    }

    /// Unique sparse indexes for `T::UNIQUE_FIELDS` plus the retention TTL index.
    #[instrument(skip(self), fields(collection = T::COLLECTION))]
    pub async fn ensure_indexes(&self) -> RepositoryResult<()> {
        let mut models: Vec<IndexModel> = T::UNIQUE_FIELDS
            .iter()
            .map(|field| {
                IndexModel::builder()
                    .keys(doc! { field_name(field): 1 })
                    .options(IndexOptions::builder().unique(true).sparse(true).build())
                    .build()
            })
            .collect();

        if let Some(ttl) = T::EXPIRES_AFTER {
            models.push(
                IndexModel::builder()
                    .keys(doc! { CREATED_AT_FIELD: 1 })
                    .options(IndexOptions::builder().expire_after(ttl).build())
                    .build(),
            );
        }

        if !models.is_empty() {
            self.collection.create_indexes(models).await?;
            info!("Indexes ensured");
        }
        Ok(())
    }

    fn decode(doc: bson::Document) -> RepositoryResult<T> {
        from_document(from_bson_document(doc)?)
    }
}

#[async_trait]
impl<T: Record> Repository<T> for MongoRepository<T> {
    #[instrument(skip(self), fields(collection = T::COLLECTION))]
    async fn get_one(&self, filter: &Filter) -> RepositoryResult<T> {
        let query = to_query(filter)?;
        let doc = self
            .collection
            .find_one(query)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(T::COLLECTION.to_string()))?;
        Self::decode(doc)
    }

    #[instrument(skip(self), fields(collection = T::COLLECTION))]
    async fn get_all(&self, filter: &Filter, page: &Page) -> RepositoryResult<Vec<T>> {
        let query = to_query(filter)?;
        let mut find = self.collection.find(query).skip(page.offset);
        if let Some(field) = page.order.as_deref() {
            let direction = match page.sort {
                SortDirection::Asc => 1,
                SortDirection::Desc => -1,
            };
            find = find.sort(doc! { field_name(field): direction });
        }
        if page.limit > 0 {
            find = find.limit(page.limit as i64);
        }

        let docs: Vec<bson::Document> = find.await?.try_collect().await?;
        if docs.is_empty() {
            return Err(RepositoryError::NotFound(T::COLLECTION.to_string()));
        }
        docs.into_iter().map(Self::decode).collect()
    }

    #[instrument(skip(self, doc), fields(collection = T::COLLECTION))]
    async fn save(&self, doc: Document, filter: Option<&Filter>) -> RepositoryResult<Document> {
        match filter {
            None => {
                let doc = prepare_insert(doc)?;
                self.collection.insert_one(to_bson_document(&doc)?).await?;
                Ok(doc)
            }
            Some(filter) => {
                let query = to_query(filter)?;
                let patch = to_bson_document(&prepare_patch(doc))?;
                let updated = if patch.is_empty() {
                    self.collection.find_one(query).await?
                } else {
                    self.collection
                        .find_one_and_update(query, doc! { "$set": patch })
                        .return_document(ReturnDocument::After)
                        .await?
                };
                let updated =
                    updated.ok_or_else(|| RepositoryError::NotFound(T::COLLECTION.to_string()))?;
                from_bson_document(updated)
            }
        }
    }

    #[instrument(skip(self), fields(collection = T::COLLECTION))]
    async fn delete_one(&self, filter: &Filter) -> RepositoryResult<()> {
        let result = self.collection.delete_one(to_query(filter)?).await?;
        if result.deleted_count == 0 {
            return Err(RepositoryError::NotFound(T::COLLECTION.to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(collection = T::COLLECTION))]
    async fn delete_all(&self, filter: &Filter) -> RepositoryResult<u64> {
        let result = self.collection.delete_many(to_query(filter)?).await?;
        Ok(result.deleted_count)
    }
}
