use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::{
    merge_changes, stamp_new, ChildUpdate, Collection, ConditionalDelete, Document, DocumentStore, Reference,
    StoreError,
};
use crate::filter::Filter;

#[derive(Default)]
struct Inner {
    next_seq: u64,
    // collection -> id -> (insertion sequence, document)
    collections: HashMap<Collection, HashMap<String, (u64, Document)>>,
}

impl Inner {
    fn collection(&self, collection: Collection) -> impl Iterator<Item = &(u64, Document)> {
        self.collections
            .get(&collection)
            .into_iter()
            .flat_map(|docs| docs.values())
    }

    fn contains(&self, collection: Collection, id: &str) -> bool {
        self.collections
            .get(&collection)
            .is_some_and(|docs| docs.contains_key(id))
    }

    fn insert(&mut self, collection: Collection, data: Document) -> Document {
        let (id, doc) = stamp_new(data);
        self.next_seq += 1;
        let seq = self.next_seq;
        self.collections
            .entry(collection)
            .or_default()
            .insert(id, (seq, doc.clone()));
        doc
    }

    fn update(&mut self, collection: Collection, id: &str, changes: Document) -> Option<Document> {
        let (_, doc) = self.collections.get_mut(&collection)?.get_mut(id)?;
        merge_changes(doc, changes);
        Some(doc.clone())
    }

    fn count(&self, collection: Collection, filter: &Filter) -> u64 {
        self.collection(collection)
            .filter(|(_, doc)| filter.matches(doc))
            .count() as u64
    }
}

/// In-process store. All state lives behind one lock, so the conditional
/// delete is atomic with respect to concurrent inserts.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_by_id(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .collections
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .map(|(_, doc)| doc.clone()))
    }

    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let inner = self.inner.read().await;
        let mut hits: Vec<&(u64, Document)> = inner
            .collection(collection)
            .filter(|(_, doc)| filter.matches(doc))
            .collect();
        hits.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(hits.into_iter().map(|(_, doc)| doc.clone()).collect())
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        Ok(self.inner.read().await.count(collection, filter))
    }

    async fn insert(&self, collection: Collection, data: Document) -> Result<Document, StoreError> {
        Ok(self.inner.write().await.insert(collection, data))
    }

    async fn insert_child(
        &self,
        collection: Collection,
        data: Document,
        parent: Collection,
        parent_id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.contains(parent, parent_id) {
            return Ok(None);
        }
        Ok(Some(inner.insert(collection, data)))
    }

    async fn update_one(
        &self,
        collection: Collection,
        id: &str,
        changes: Document,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self.inner.write().await.update(collection, id, changes))
    }

    async fn update_child(
        &self,
        collection: Collection,
        id: &str,
        changes: Document,
        parent: Collection,
        parent_id: &str,
    ) -> Result<ChildUpdate, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.contains(parent, parent_id) {
            return Ok(ChildUpdate::ParentMissing);
        }
        Ok(match inner.update(collection, id, changes) {
            Some(doc) => ChildUpdate::Updated(doc),
            None => ChildUpdate::NotFound,
        })
    }

    async fn insert_first(&self, collection: Collection, data: Document) -> Result<Option<Document>, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.collection(collection).next().is_some() {
            return Ok(None);
        }
        Ok(Some(inner.insert(collection, data)))
    }

    async fn delete_one(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .collections
            .get_mut(&collection)
            .and_then(|docs| docs.remove(id))
            .map(|(_, doc)| doc))
    }

    async fn delete_unreferenced(
        &self,
        collection: Collection,
        id: &str,
        reference: Reference,
    ) -> Result<ConditionalDelete, StoreError> {
        let mut inner = self.inner.write().await;

        if !inner.contains(collection, id) {
            return Ok(ConditionalDelete::NotFound);
        }

        let dependents = inner.count(reference.collection, &Filter::all().eq(reference.field, id));
        if dependents > 0 {
            return Ok(ConditionalDelete::Referenced(dependents));
        }

        match inner
            .collections
            .get_mut(&collection)
            .and_then(|docs| docs.remove(id))
        {
            Some((_, doc)) => Ok(ConditionalDelete::Deleted(doc)),
            None => Ok(ConditionalDelete::NotFound),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
