use std::sync::Arc;

use tracing::info;

use super::guarded_delete;
use crate::auth::Identity;
use crate::authz::{Authorizer, ParentKind};
use crate::database::{DocumentStore, Repository};
use crate::error::ApiError;
use crate::filter::Filter;
use crate::models::{School, SchoolRequest};
use crate::types::{Entity, Operation};
use crate::validation;

#[derive(Clone)]
pub struct SchoolService {
    schools: Repository<School>,
    authz: Authorizer,
}

impl SchoolService {
    pub fn new(store: Arc<dyn DocumentStore>, authz: Authorizer) -> Self {
        Self {
            schools: Repository::new(store),
            authz,
        }
    }

    pub async fn create(&self, identity: &Identity, req: SchoolRequest) -> Result<School, ApiError> {
        self.authz.authorize(identity, Entity::School, Operation::Create)?;
        let new = validation::new_school(&req)?;

        if self.schools.exists(&Filter::all().eq("name", new.name.as_str())).await? {
            return Err(ApiError::conflict("school name already exists"));
        }
        let school = self.schools.create(&new).await?;
        info!("School {} created by {}", school.id, identity.user_id());
        Ok(school)
    }

    pub async fn list(&self, identity: &Identity) -> Result<Vec<School>, ApiError> {
        self.authz.authorize(identity, Entity::School, Operation::List)?;
        Ok(self.schools.select_any(&Filter::all()).await?)
    }

    pub async fn get(&self, identity: &Identity, id: &str) -> Result<School, ApiError> {
        self.authz.authorize(identity, Entity::School, Operation::Get)?;
        self.authz.tenant.school(identity, id).await
    }

    pub async fn update(&self, identity: &Identity, id: &str, req: SchoolRequest) -> Result<School, ApiError> {
        self.authz.authorize(identity, Entity::School, Operation::Update)?;
        let changes = validation::school_changes(&req)?;
        self.authz.tenant.school(identity, id).await?;

        if let Some(name) = changes.name.as_deref() {
            let taken = self.schools.select_one(&Filter::all().eq("name", name)).await?;
            if taken.is_some_and(|other| other.id != id) {
                return Err(ApiError::conflict("school name already exists"));
            }
        }

        self.schools
            .update(id, &changes)
            .await?
            .ok_or_else(|| ApiError::not_found("School not found"))
    }

    /// Refused with a conflict while any classroom still belongs to the school.
    pub async fn delete(&self, identity: &Identity, id: &str) -> Result<School, ApiError> {
        self.authz.authorize(identity, Entity::School, Operation::Delete)?;
        self.authz.tenant.school(identity, id).await?;

        let outcome = self.authz.integrity.delete(ParentKind::School, id).await?;
        guarded_delete(ParentKind::School, outcome)
    }
}
