use std::sync::Arc;

use tracing::info;

use super::guarded_delete;
use crate::auth::Identity;
use crate::authz::{missing, Authorizer, ParentKind, Target};
use crate::database::{Collection, DocumentStore, Repository};
use crate::error::ApiError;
use crate::filter::Filter;
use crate::models::{Classroom, ClassroomChanges, CreateClassroomRequest, Student};
use crate::types::{Entity, Operation};
use crate::validation;

#[derive(Clone)]
pub struct ClassroomService {
    classrooms: Repository<Classroom>,
    students: Repository<Student>,
    authz: Authorizer,
}

impl ClassroomService {
    pub fn new(store: Arc<dyn DocumentStore>, authz: Authorizer) -> Self {
        Self {
            classrooms: Repository::new(store.clone()),
            students: Repository::new(store),
            authz,
        }
    }

    pub async fn create(&self, identity: &Identity, req: CreateClassroomRequest) -> Result<Classroom, ApiError> {
        self.authz.authorize(identity, Entity::Classroom, Operation::Create)?;
        let new = validation::new_classroom(&req)?;
        let school = self.authz.tenant.school_for_create(identity, &new.school_id).await?;

        let duplicate = Filter::all()
            .eq("schoolId", school.id.as_str())
            .eq("name", new.name.as_str());
        if self.classrooms.exists(&duplicate).await? {
            return Err(ApiError::conflict("classroom name already exists in this school"));
        }

        let classroom = self
            .classrooms
            .create_under(&new, Collection::Schools, &school.id)
            .await?
            .ok_or_else(|| missing(identity, Target::School(&school.id)))?;
        info!("Classroom {} created in school {} by {}", classroom.id, school.id, identity.user_id());
        Ok(classroom)
    }

    pub async fn list(&self, identity: &Identity) -> Result<Vec<Classroom>, ApiError> {
        self.authz.authorize(identity, Entity::Classroom, Operation::List)?;
        let scope = self.authz.tenant.classroom_scope(identity)?;
        Ok(self.classrooms.select_any(&scope).await?)
    }

    pub async fn get(&self, identity: &Identity, id: &str) -> Result<Classroom, ApiError> {
        self.authz.authorize(identity, Entity::Classroom, Operation::Get)?;
        self.authz.tenant.classroom(identity, id).await
    }

    pub async fn students(&self, identity: &Identity, id: &str) -> Result<Vec<Student>, ApiError> {
        self.authz.authorize(identity, Entity::Classroom, Operation::Get)?;
        let classroom = self.authz.tenant.classroom(identity, id).await?;
        Ok(self
            .students
            .select_any(&Filter::all().eq("classroomId", classroom.id.as_str()))
            .await?)
    }

    /// Renames a classroom. The owning school never changes.
    pub async fn update(&self, identity: &Identity, id: &str, req: ClassroomChanges) -> Result<Classroom, ApiError> {
        self.authz.authorize(identity, Entity::Classroom, Operation::Update)?;
        let changes = validation::classroom_changes(&req)?;
        let classroom = self.authz.tenant.classroom(identity, id).await?;

        if let Some(name) = changes.name.as_deref() {
            let duplicate = Filter::all()
                .eq("schoolId", classroom.school_id.as_str())
                .eq("name", name);
            let taken = self.classrooms.select_one(&duplicate).await?;
            if taken.is_some_and(|other| other.id != classroom.id) {
                return Err(ApiError::conflict("classroom name already exists in this school"));
            }
        }

        self.classrooms
            .update(id, &changes)
            .await?
            .ok_or_else(|| missing(identity, Target::Classroom(id)))
    }

    /// Refused with a conflict while any student is still enrolled.
    pub async fn delete(&self, identity: &Identity, id: &str) -> Result<Classroom, ApiError> {
        self.authz.authorize(identity, Entity::Classroom, Operation::Delete)?;
        self.authz.tenant.classroom(identity, id).await?;

        let outcome = self.authz.integrity.delete(ParentKind::Classroom, id).await?;
        guarded_delete(ParentKind::Classroom, outcome)
    }
}
