pub mod memory;
pub mod postgres;
pub mod repository;
pub mod store;

use std::sync::Arc;

use tracing::info;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use repository::Repository;
pub use store::{
    from_document, to_document, ChildUpdate, Collection, ConditionalDelete, Document, DocumentStore, Reference,
    StoreError, ID_FIELD,
};

use crate::config::{StoreBackend, StoreConfig};

/// Open the configured store backend.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory document store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let store = PgStore::connect(config).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
    }
}
