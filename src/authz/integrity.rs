use std::sync::Arc;

use tracing::{info, warn};

use super::DeleteStrategy;
use crate::database::{Collection, ConditionalDelete, DocumentStore, Reference, StoreError};
use crate::filter::Filter;

/// Parents whose deletion is blocked by children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentKind {
    School,
    Classroom,
}

impl ParentKind {
    pub fn collection(&self) -> Collection {
        match self {
            ParentKind::School => Collection::Schools,
            ParentKind::Classroom => Collection::Classrooms,
        }
    }

    /// The child collection and field that point at this parent.
    pub fn reference(&self) -> Reference {
        match self {
            ParentKind::School => Reference { collection: Collection::Classrooms, field: "schoolId" },
            ParentKind::Classroom => Reference { collection: Collection::Students, field: "classroomId" },
        }
    }

    pub fn dependents_label(&self) -> &'static str {
        match self {
            ParentKind::School => "classrooms",
            ParentKind::Classroom => "students",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependents {
    None,
    Present(u64),
}

/// Referential integrity for parent deletes. Storage enforces no foreign
/// keys, so this is the only thing standing between a delete and orphans.
#[derive(Clone)]
pub struct IntegrityGuard {
    store: Arc<dyn DocumentStore>,
    strategy: DeleteStrategy,
}

impl IntegrityGuard {
    pub fn new(store: Arc<dyn DocumentStore>, strategy: DeleteStrategy) -> Self {
        Self { store, strategy }
    }

    pub fn strategy(&self) -> DeleteStrategy {
        self.strategy
    }

    pub async fn check_no_dependents(&self, parent: ParentKind, id: &str) -> Result<Dependents, StoreError> {
        let reference = parent.reference();
        let count = self
            .store
            .count(reference.collection, &Filter::all().eq(reference.field, id))
            .await?;
        Ok(if count == 0 { Dependents::None } else { Dependents::Present(count) })
    }

    /// Delete a parent that has no children.
    ///
    /// With [`DeleteStrategy::CheckThenDelete`] the count and the delete are
    /// two separate store calls, and a child inserted between them is
    /// orphaned. [`DeleteStrategy::Conditional`] hands both to the store as
    /// one atomic operation.
    pub async fn delete(&self, parent: ParentKind, id: &str) -> Result<ConditionalDelete, StoreError> {
        let outcome = match self.strategy {
            DeleteStrategy::CheckThenDelete => match self.check_no_dependents(parent, id).await? {
                Dependents::Present(count) => ConditionalDelete::Referenced(count),
                Dependents::None => match self.store.delete_one(parent.collection(), id).await? {
                    Some(doc) => ConditionalDelete::Deleted(doc),
                    None => ConditionalDelete::NotFound,
                },
            },
            DeleteStrategy::Conditional => {
                self.store
                    .delete_unreferenced(parent.collection(), id, parent.reference())
                    .await?
            }
        };

        match &outcome {
            ConditionalDelete::Deleted(_) => info!("Deleted {} {}", parent.collection().name(), id),
            ConditionalDelete::Referenced(count) => warn!(
                "Refused to delete {} {}: {} dependent {}",
                parent.collection().name(),
                id,
                count,
                parent.dependents_label()
            ),
            ConditionalDelete::NotFound => {}
        }
        Ok(outcome)
    }
}
