use std::sync::Arc;

use tracing::info;

use crate::auth::Identity;
use crate::authz::{missing, Authorizer, Target};
use crate::database::{ChildUpdate, Collection, DocumentStore, Repository};
use crate::error::ApiError;
use crate::models::{CreateStudentRequest, Student, UpdateStudentRequest};
use crate::types::{Entity, Operation};
use crate::validation;

#[derive(Clone)]
pub struct StudentService {
    students: Repository<Student>,
    authz: Authorizer,
}

impl StudentService {
    pub fn new(store: Arc<dyn DocumentStore>, authz: Authorizer) -> Self {
        Self {
            students: Repository::new(store),
            authz,
        }
    }

    pub async fn create(&self, identity: &Identity, req: CreateStudentRequest) -> Result<Student, ApiError> {
        self.authz.authorize(identity, Entity::Student, Operation::Create)?;
        let new = validation::new_student(&req)?;
        let classroom = self.authz.tenant.classroom_for_create(identity, &new.classroom_id).await?;

        let student = self
            .students
            .create_under(&new, Collection::Classrooms, &classroom.id)
            .await?
            .ok_or_else(|| missing(identity, Target::Classroom(&classroom.id)))?;
        info!("Student {} enrolled in classroom {} by {}", student.id, classroom.id, identity.user_id());
        Ok(student)
    }

    /// Students visible to the caller, optionally limited to one classroom.
    pub async fn list(&self, identity: &Identity, classroom_id: Option<&str>) -> Result<Vec<Student>, ApiError> {
        self.authz.authorize(identity, Entity::Student, Operation::List)?;
        let scope = self.authz.tenant.student_scope(identity, classroom_id).await?;
        Ok(self.students.select_any(&scope).await?)
    }

    pub async fn get(&self, identity: &Identity, id: &str) -> Result<Student, ApiError> {
        self.authz.authorize(identity, Entity::Student, Operation::Get)?;
        self.authz.tenant.student(identity, id).await
    }

    /// A move to another classroom is checked against the caller's tenant
    /// and written only while the target classroom still exists.
    pub async fn update(&self, identity: &Identity, id: &str, req: UpdateStudentRequest) -> Result<Student, ApiError> {
        self.authz.authorize(identity, Entity::Student, Operation::Update)?;
        let changes = validation::student_changes(&req)?;
        let student = self.authz.tenant.student(identity, id).await?;

        let target = changes
            .classroom_id
            .as_deref()
            .filter(|classroom_id| *classroom_id != student.classroom_id);
        let Some(classroom_id) = target else {
            return self
                .students
                .update(id, &changes)
                .await?
                .ok_or_else(|| missing(identity, Target::Student(id)));
        };

        self.authz
            .tenant
            .authorize_target(identity, Target::Classroom(classroom_id))
            .await?
            .require()?;

        match self
            .students
            .update_under(id, &changes, Collection::Classrooms, classroom_id)
            .await?
        {
            ChildUpdate::Updated(moved) => {
                info!("Student {} moved to classroom {} by {}", id, classroom_id, identity.user_id());
                Ok(moved)
            }
            ChildUpdate::ParentMissing => Err(missing(identity, Target::Classroom(classroom_id))),
            ChildUpdate::NotFound => Err(missing(identity, Target::Student(id))),
        }
    }

    pub async fn delete(&self, identity: &Identity, id: &str) -> Result<Student, ApiError> {
        self.authz.authorize(identity, Entity::Student, Operation::Delete)?;
        self.authz.tenant.student(identity, id).await?;

        self.students
            .delete(id)
            .await?
            .ok_or_else(|| missing(identity, Target::Student(id)))
    }
}
