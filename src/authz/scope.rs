use std::collections::HashMap;

use thiserror::Error;
use tracing::warn;

use super::Decision;
use crate::types::{Entity, Operation, Role};

const DEFAULT_SCOPES: &str = include_str!("scopes.yaml");

#[derive(Debug, Error)]
pub enum ScopeTableError {
    #[error("invalid scope declaration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Static (entity, operation) -> permitted roles mapping. Built once at
/// startup and only read afterwards.
#[derive(Debug, Clone)]
pub struct ScopeTable {
    entries: HashMap<(Entity, Operation), Vec<Role>>,
}

impl ScopeTable {
    /// The table compiled into the binary.
    pub fn builtin() -> Result<Self, ScopeTableError> {
        Self::from_yaml(DEFAULT_SCOPES)
    }

    pub fn from_yaml(source: &str) -> Result<Self, ScopeTableError> {
        let declared: HashMap<Entity, HashMap<Operation, Vec<Role>>> = serde_yaml::from_str(source)?;

        let entries = declared
            .into_iter()
            .flat_map(|(entity, ops)| {
                ops.into_iter()
                    .map(move |(operation, roles)| ((entity, operation), roles))
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn has_scope(&self, entity: Entity, operation: Operation, role: Role) -> bool {
        self.roles(entity, operation).contains(&role)
    }

    pub fn authorize(&self, entity: Entity, operation: Operation, role: Role) -> Decision {
        if self.has_scope(entity, operation, role) {
            Decision::Allowed
        } else {
            warn!("Scope denied: {} may not {} {}", role, operation, entity);
            Decision::Forbidden
        }
    }

    /// Roles permitted for an operation, in declaration order.
    pub fn roles(&self, entity: Entity, operation: Operation) -> &[Role] {
        self.entries
            .get(&(entity, operation))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
