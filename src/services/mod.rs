//! Entity managers. Every operation runs the same sequence: scope check,
//! field validation, tenant check, then the data operation.

pub mod classroom_service;
pub mod school_service;
pub mod student_service;
pub mod user_service;

pub use classroom_service::ClassroomService;
pub use school_service::SchoolService;
pub use student_service::StudentService;
pub use user_service::UserService;

use crate::authz::ParentKind;
use crate::database::{from_document, ConditionalDelete};
use crate::error::ApiError;
use crate::models::Model;

/// Map the outcome of a guarded parent delete to the deleted record.
pub(crate) fn guarded_delete<T: Model>(parent: ParentKind, outcome: ConditionalDelete) -> Result<T, ApiError> {
    match outcome {
        ConditionalDelete::Deleted(doc) => Ok(from_document(doc)?),
        ConditionalDelete::Referenced(_) => Err(ApiError::conflict(format!(
            "dependent {} exist",
            parent.dependents_label()
        ))),
        ConditionalDelete::NotFound => Err(ApiError::not_found(match parent {
            ParentKind::School => "School not found",
            ParentKind::Classroom => "Classroom not found",
        })),
    }
}
