use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;

use super::store::{from_document, to_document, ChildUpdate, Collection, DocumentStore, StoreError};
use crate::filter::Filter;
use crate::models::Model;

/// Typed view over one collection of a [`DocumentStore`].
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    _phantom: PhantomData<T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _phantom: PhantomData,
        }
    }
}

impl<T: Model> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub async fn select_id(&self, id: &str) -> Result<Option<T>, StoreError> {
        self.store
            .find_by_id(T::COLLECTION, id)
            .await?
            .map(from_document)
            .transpose()
    }

    pub async fn select_any(&self, filter: &Filter) -> Result<Vec<T>, StoreError> {
        self.store
            .find(T::COLLECTION, filter)
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    pub async fn select_one(&self, filter: &Filter) -> Result<Option<T>, StoreError> {
        Ok(self.select_any(filter).await?.into_iter().next())
    }

    pub async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        self.store.count(T::COLLECTION, filter).await
    }

    pub async fn exists(&self, filter: &Filter) -> Result<bool, StoreError> {
        Ok(self.count(filter).await? > 0)
    }

    pub async fn create<N: Serialize + Sync>(&self, new: &N) -> Result<T, StoreError> {
        let doc = self.store.insert(T::COLLECTION, to_document(new)?).await?;
        from_document(doc)
    }

    /// Create a record under `parent_id`, atomically with the parent still
    /// existing. `None` when the parent is gone.
    pub async fn create_under<N: Serialize + Sync>(
        &self,
        new: &N,
        parent: Collection,
        parent_id: &str,
    ) -> Result<Option<T>, StoreError> {
        self.store
            .insert_child(T::COLLECTION, to_document(new)?, parent, parent_id)
            .await?
            .map(from_document)
            .transpose()
    }

    pub async fn update<C: Serialize + Sync>(&self, id: &str, changes: &C) -> Result<Option<T>, StoreError> {
        self.store
            .update_one(T::COLLECTION, id, to_document(changes)?)
            .await?
            .map(from_document)
            .transpose()
    }

    /// Update a record while `parent_id` still exists.
    pub async fn update_under<C: Serialize + Sync>(
        &self,
        id: &str,
        changes: &C,
        parent: Collection,
        parent_id: &str,
    ) -> Result<ChildUpdate<T>, StoreError> {
        let outcome = self
            .store
            .update_child(T::COLLECTION, id, to_document(changes)?, parent, parent_id)
            .await?;
        Ok(match outcome {
            ChildUpdate::Updated(doc) => ChildUpdate::Updated(from_document(doc)?),
            ChildUpdate::NotFound => ChildUpdate::NotFound,
            ChildUpdate::ParentMissing => ChildUpdate::ParentMissing,
        })
    }

    /// Create the first record of the collection. `None` if one exists.
    pub async fn create_first<N: Serialize + Sync>(&self, new: &N) -> Result<Option<T>, StoreError> {
        self.store
            .insert_first(T::COLLECTION, to_document(new)?)
            .await?
            .map(from_document)
            .transpose()
    }

    pub async fn delete(&self, id: &str) -> Result<Option<T>, StoreError> {
        self.store
            .delete_one(T::COLLECTION, id)
            .await?
            .map(from_document)
            .transpose()
    }
}
