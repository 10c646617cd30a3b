pub mod classroom;
pub mod school;
pub mod student;
pub mod user;

pub use classroom::{Classroom, ClassroomChanges, CreateClassroomRequest, NewClassroom};
pub use school::{NewSchool, School, SchoolChanges, SchoolRequest};
pub use student::{CreateStudentRequest, NewStudent, Student, StudentChanges, UpdateStudentRequest};
pub use user::{CreateUserRequest, LoginRequest, NewUser, User, UserView};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::database::Collection;

/// A record type persisted in one collection.
pub trait Model: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
}
