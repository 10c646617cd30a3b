use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use super::Decision;
use crate::auth::Identity;
use crate::database::{DocumentStore, Repository, StoreError};
use crate::error::ApiError;
use crate::filter::Filter;
use crate::models::{Classroom, School, Student};

/// A record whose owning school decides access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    School(&'a str),
    Classroom(&'a str),
    Student(&'a str),
}

impl Target<'_> {
    fn label(&self) -> &'static str {
        match self {
            Target::School(_) => "School",
            Target::Classroom(_) => "Classroom",
            Target::Student(_) => "Student",
        }
    }
}

/// Tenant isolation. `super_admin` is unscoped; every other role may only
/// reach records whose ownership chain ends at its own school.
#[derive(Clone)]
pub struct TenantGuard {
    schools: Repository<School>,
    classrooms: Repository<Classroom>,
    students: Repository<Student>,
}

impl TenantGuard {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            schools: Repository::new(store.clone()),
            classrooms: Repository::new(store.clone()),
            students: Repository::new(store),
        }
    }

    /// Pure tenant comparison against an already resolved school id.
    pub fn authorize_tenant(identity: &Identity, school_id: &str) -> Decision {
        if identity.role().is_global() {
            return Decision::Allowed;
        }
        match identity.school_id() {
            Some(own) if own == school_id => Decision::Allowed,
            Some(own) => {
                warn!(
                    "Tenant denied: user {} of school {} targeted school {}",
                    identity.user_id(),
                    own,
                    school_id
                );
                Decision::Forbidden
            }
            None => {
                warn!("Tenant denied: user {} has no school", identity.user_id());
                Decision::Forbidden
            }
        }
    }

    /// Owning school of a target, following Student -> Classroom -> School.
    /// `None` when any link of the chain is missing.
    pub async fn resolve_school(&self, target: Target<'_>) -> Result<Option<String>, StoreError> {
        let classroom_id = match target {
            Target::School(id) => {
                return Ok(self.schools.select_id(id).await?.map(|school| school.id));
            }
            Target::Classroom(id) => id.to_string(),
            Target::Student(id) => match self.students.select_id(id).await? {
                Some(student) => student.classroom_id,
                None => return Ok(None),
            },
        };
        Ok(self
            .classrooms
            .select_id(&classroom_id)
            .await?
            .map(|classroom| classroom.school_id))
    }

    /// Tenant decision for a stored record. A target that cannot be resolved
    /// is forbidden for scoped callers.
    pub async fn authorize_target(&self, identity: &Identity, target: Target<'_>) -> Result<Decision, StoreError> {
        if identity.role().is_global() {
            return Ok(Decision::Allowed);
        }
        Ok(match self.resolve_school(target).await? {
            Some(school_id) => Self::authorize_tenant(identity, &school_id),
            None => Decision::Forbidden,
        })
    }

    pub async fn school(&self, identity: &Identity, id: &str) -> Result<School, ApiError> {
        let school = self
            .schools
            .select_id(id)
            .await?
            .ok_or_else(|| missing(identity, Target::School(id)))?;
        Self::authorize_tenant(identity, &school.id).require()?;
        Ok(school)
    }

    pub async fn classroom(&self, identity: &Identity, id: &str) -> Result<Classroom, ApiError> {
        let classroom = self
            .classrooms
            .select_id(id)
            .await?
            .ok_or_else(|| missing(identity, Target::Classroom(id)))?;
        Self::authorize_tenant(identity, &classroom.school_id).require()?;
        Ok(classroom)
    }

    /// Load a student after walking its chain to the owning school. A
    /// student whose classroom is gone is unreachable for scoped callers.
    pub async fn student(&self, identity: &Identity, id: &str) -> Result<Student, ApiError> {
        let student = self
            .students
            .select_id(id)
            .await?
            .ok_or_else(|| missing(identity, Target::Student(id)))?;
        if identity.role().is_global() {
            return Ok(student);
        }

        let classroom = self.classrooms.select_id(&student.classroom_id).await?;
        match classroom {
            Some(classroom) => Self::authorize_tenant(identity, &classroom.school_id).require()?,
            None => {
                warn!("Student {} references missing classroom {}", student.id, student.classroom_id);
                return Err(ApiError::Forbidden);
            }
        }
        Ok(student)
    }

    /// Intended tenant of a new classroom. The tenant comparison happens
    /// before the school is looked up, so a foreign school id is refused
    /// without revealing whether it exists.
    pub async fn school_for_create(&self, identity: &Identity, school_id: &str) -> Result<School, ApiError> {
        Self::authorize_tenant(identity, school_id).require()?;
        self.school(identity, school_id).await
    }

    /// Intended parent of a new or moved student.
    pub async fn classroom_for_create(&self, identity: &Identity, classroom_id: &str) -> Result<Classroom, ApiError> {
        self.classroom(identity, classroom_id).await
    }

    /// Query narrowing for classroom listings.
    pub fn classroom_scope(&self, identity: &Identity) -> Result<Filter, ApiError> {
        if identity.role().is_global() {
            return Ok(Filter::all());
        }
        let school_id = identity.school_id().ok_or(ApiError::Forbidden)?;
        Ok(Filter::all().eq("schoolId", school_id))
    }

    /// Query narrowing for student listings. Scoped callers are limited to
    /// students of their school's classrooms; an explicit classroom filter is
    /// intersected with that set.
    pub async fn student_scope(&self, identity: &Identity, classroom_id: Option<&str>) -> Result<Filter, ApiError> {
        if identity.role().is_global() {
            return Ok(match classroom_id {
                Some(id) => Filter::all().eq("classroomId", id),
                None => Filter::all(),
            });
        }

        let scope = self.classroom_scope(identity)?;
        let owned: HashSet<String> = self
            .classrooms
            .select_any(&scope)
            .await?
            .into_iter()
            .map(|classroom| classroom.id)
            .collect();
        debug!("Student scope for {}: {} classrooms", identity.user_id(), owned.len());

        let ids: Vec<String> = match classroom_id {
            Some(id) if owned.contains(id) => vec![id.to_string()],
            Some(_) => Vec::new(),
            None => owned.into_iter().collect(),
        };
        Ok(Filter::all().any_of("classroomId", ids))
    }
}

/// Missing records are only reported to callers whose scope already covers
/// every tenant.
pub fn missing(identity: &Identity, target: Target<'_>) -> ApiError {
    if identity.role().is_global() {
        ApiError::not_found(format!("{} not found", target.label()))
    } else {
        ApiError::Forbidden
    }
}
