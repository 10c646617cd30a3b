use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::filter::Filter;

/// A stored document. Every document carries `_id`, `createdAt` and
/// `updatedAt`, maintained by the store.
pub type Document = Map<String, Value>;

pub const ID_FIELD: &str = "_id";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Errors from a storage backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Document must be a JSON object")]
    NotAnObject,

    #[error("Document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Concurrent modification of {0}")]
    Conflict(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Schools,
    Classrooms,
    Students,
    Users,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Schools => "schools",
            Collection::Classrooms => "classrooms",
            Collection::Students => "students",
            Collection::Users => "users",
        }
    }
}

/// Child collection and the field in it that points at a parent `_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub collection: Collection,
    pub field: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionalDelete {
    Deleted(Document),
    Referenced(u64),
    NotFound,
}

/// Outcome of [`DocumentStore::update_child`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChildUpdate<T = Document> {
    Updated(T),
    NotFound,
    ParentMissing,
}

/// Storage collaborator. Single-document operations keyed by opaque ids.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_by_id(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    /// Matching documents, newest first.
    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError>;

    /// Assigns `_id` and timestamps, returns the stored document.
    async fn insert(&self, collection: Collection, data: Document) -> Result<Document, StoreError>;

    /// Insert only while `parent_id` exists in `parent`. The parent cannot
    /// be removed by `delete_unreferenced` while this runs. `None` if the
    /// parent is gone.
    async fn insert_child(
        &self,
        collection: Collection,
        data: Document,
        parent: Collection,
        parent_id: &str,
    ) -> Result<Option<Document>, StoreError>;

    /// Shallow-merges `changes` into the document. `None` if absent.
    async fn update_one(
        &self,
        collection: Collection,
        id: &str,
        changes: Document,
    ) -> Result<Option<Document>, StoreError>;

    /// Like `update_one`, but only while `parent_id` exists in `parent`,
    /// with the same guarantee against `delete_unreferenced` as
    /// `insert_child`.
    async fn update_child(
        &self,
        collection: Collection,
        id: &str,
        changes: Document,
        parent: Collection,
        parent_id: &str,
    ) -> Result<ChildUpdate, StoreError>;

    /// Insert only while `collection` is empty. `None` if anything is
    /// already there.
    async fn insert_first(&self, collection: Collection, data: Document) -> Result<Option<Document>, StoreError>;

    async fn delete_one(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    /// Delete `id` only if no document in `reference.collection` points at
    /// it, as one atomic step.
    async fn delete_unreferenced(
        &self,
        collection: Collection,
        id: &str,
        reference: Reference,
    ) -> Result<ConditionalDelete, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Serialize a value into a document body.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::NotAnObject),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

/// Stamp a new document with a fresh id and creation timestamps.
pub(crate) fn stamp_new(mut data: Document) -> (String, Document) {
    let id = Uuid::new_v4().to_string();
    let now = Value::String(Utc::now().to_rfc3339());
    data.insert(ID_FIELD.to_string(), Value::String(id.clone()));
    data.insert(CREATED_AT_FIELD.to_string(), now.clone());
    data.insert(UPDATED_AT_FIELD.to_string(), now);
    (id, data)
}

/// Merge changes into an existing document. Identity and creation time
/// are never overwritten.
pub(crate) fn merge_changes(doc: &mut Document, changes: Document) {
    for (key, value) in changes {
        if key == ID_FIELD || key == CREATED_AT_FIELD {
            continue;
        }
        doc.insert(key, value);
    }
    doc.insert(
        UPDATED_AT_FIELD.to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );
}
