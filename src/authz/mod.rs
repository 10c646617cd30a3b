//! Authorization engine: scope table, tenant isolation and referential
//! integrity. Entity services call these in a fixed order (scope, then
//! tenant, then the data operation) and never compare roles themselves.

pub mod integrity;
pub mod scope;
pub mod tenant;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use integrity::{Dependents, IntegrityGuard, ParentKind};
pub use scope::{ScopeTable, ScopeTableError};
pub use tenant::{missing, Target, TenantGuard};

use crate::auth::Identity;
use crate::database::DocumentStore;
use crate::error::ApiError;
use crate::types::{Entity, Operation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Forbidden,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    pub fn require(self) -> Result<(), ApiError> {
        if self.is_allowed() {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

/// How parent deletes guard against children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStrategy {
    /// Count children, then delete. Racy under concurrent child inserts.
    CheckThenDelete,
    /// Let the store delete only when no child references the parent.
    Conditional,
}

/// Everything an entity service needs to decide whether a call may proceed.
#[derive(Clone)]
pub struct Authorizer {
    scopes: Arc<ScopeTable>,
    pub tenant: TenantGuard,
    pub integrity: IntegrityGuard,
}

impl Authorizer {
    pub fn new(scopes: Arc<ScopeTable>, store: Arc<dyn DocumentStore>, strategy: DeleteStrategy) -> Self {
        Self {
            scopes,
            tenant: TenantGuard::new(store.clone()),
            integrity: IntegrityGuard::new(store, strategy),
        }
    }

    /// Role check for an operation. Runs before any record is touched.
    pub fn authorize(&self, identity: &Identity, entity: Entity, operation: Operation) -> Result<(), ApiError> {
        self.scopes.authorize(entity, operation, identity.role()).require()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    #[test]
    fn scope_denial_is_forbidden() {
        let authz = Authorizer::new(
            Arc::new(ScopeTable::builtin().unwrap()),
            Arc::new(MemoryStore::new()),
            DeleteStrategy::Conditional,
        );
        let admin = Identity::Admin { user_id: "a".into(), school_id: "s".into() };

        assert!(authz.authorize(&admin, Entity::Classroom, Operation::Create).is_ok());
        assert!(matches!(
            authz.authorize(&admin, Entity::School, Operation::Delete),
            Err(ApiError::Forbidden)
        ));
    }

    #[test]
    fn delete_strategy_names() {
        let parsed: DeleteStrategy = serde_json::from_str("\"check_then_delete\"").unwrap();
        assert_eq!(parsed, DeleteStrategy::CheckThenDelete);
    }
}
