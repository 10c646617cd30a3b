//! Field-shape checks for request bodies. Each failing field gets one
//! message; the first failure per field wins.

use std::collections::HashMap;

use crate::error::ApiError;
use crate::models::{
    ClassroomChanges, CreateClassroomRequest, CreateStudentRequest, CreateUserRequest, NewClassroom,
    NewSchool, NewStudent, SchoolChanges, SchoolRequest, StudentChanges, UpdateStudentRequest,
};
use crate::types::Role;

const NAME_LEN: (usize, usize) = (3, 50);
const ADDRESS_LEN: (usize, usize) = (3, 100);
const STUDENT_AGE: (i64, i64) = (3, 100);
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Default)]
pub struct FieldErrors {
    errors: HashMap<String, String>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation_error("Validation failed", Some(self.errors)))
        }
    }

    /// Fails with the collected errors, or yields the built value.
    fn finish<T>(self, value: Option<T>) -> Result<T, ApiError> {
        self.into_result()?;
        value.ok_or_else(|| ApiError::validation_error("Validation failed", None))
    }

    /// Checks a required string's trimmed length. Returns the trimmed value.
    fn required_len(&mut self, field: &str, value: Option<&str>, (min, max): (usize, usize)) -> Option<String> {
        match value.map(str::trim) {
            None | Some("") => {
                self.add(field, format!("{} is required", field));
                None
            }
            Some(v) => self.len(field, v, (min, max)).then(|| v.to_string()),
        }
    }

    fn optional_len(&mut self, field: &str, value: Option<&str>, bounds: (usize, usize)) -> Option<String> {
        let v = value?.trim();
        self.len(field, v, bounds).then(|| v.to_string())
    }

    fn len(&mut self, field: &str, value: &str, (min, max): (usize, usize)) -> bool {
        let n = value.chars().count();
        if n < min || n > max {
            self.add(field, format!("{} must be between {} and {} characters", field, min, max));
            return false;
        }
        true
    }

    fn required_id(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        match value.map(str::trim) {
            None | Some("") => {
                self.add(field, format!("{} is required", field));
                None
            }
            Some(v) => Some(v.to_string()),
        }
    }

    fn age(&mut self, value: i64) -> bool {
        let (min, max) = STUDENT_AGE;
        if value < min || value > max {
            self.add("age", format!("age must be between {} and {}", min, max));
            return false;
        }
        true
    }
}

pub fn new_school(req: &SchoolRequest) -> Result<NewSchool, ApiError> {
    let mut errors = FieldErrors::new();
    let name = errors.required_len("name", req.name.as_deref(), NAME_LEN);
    let address = errors.required_len("address", req.address.as_deref(), ADDRESS_LEN);
    errors.finish(name.zip(address).map(|(name, address)| NewSchool { name, address }))
}

pub fn school_changes(req: &SchoolRequest) -> Result<SchoolChanges, ApiError> {
    let mut errors = FieldErrors::new();
    let changes = SchoolChanges {
        name: errors.optional_len("name", req.name.as_deref(), NAME_LEN),
        address: errors.optional_len("address", req.address.as_deref(), ADDRESS_LEN),
    };
    if errors.is_empty() && changes.name.is_none() && changes.address.is_none() {
        errors.add("name", "nothing to update");
    }
    errors.into_result().map(|_| changes)
}

pub fn new_classroom(req: &CreateClassroomRequest) -> Result<NewClassroom, ApiError> {
    let mut errors = FieldErrors::new();
    let name = errors.required_len("name", req.name.as_deref(), NAME_LEN);
    let school_id = errors.required_id("schoolID", req.school_id.as_deref());
    errors.finish(name.zip(school_id).map(|(name, school_id)| NewClassroom { name, school_id }))
}

pub fn classroom_changes(req: &ClassroomChanges) -> Result<ClassroomChanges, ApiError> {
    let mut errors = FieldErrors::new();
    let name = errors.required_len("name", req.name.as_deref(), NAME_LEN);
    errors.into_result().map(|_| ClassroomChanges { name })
}

pub fn new_student(req: &CreateStudentRequest) -> Result<NewStudent, ApiError> {
    let mut errors = FieldErrors::new();
    let name = errors.required_len("name", req.name.as_deref(), NAME_LEN);
    let age = match req.age {
        Some(age) => errors.age(age).then_some(age),
        None => {
            errors.add("age", "age is required");
            None
        }
    };
    let classroom_id = errors.required_id("classroomID", req.classroom_id.as_deref());
    let student = match (name, age, classroom_id) {
        (Some(name), Some(age), Some(classroom_id)) => Some(NewStudent { name, age, classroom_id }),
        _ => None,
    };
    errors.finish(student)
}

pub fn student_changes(req: &UpdateStudentRequest) -> Result<StudentChanges, ApiError> {
    let mut errors = FieldErrors::new();
    let changes = StudentChanges {
        name: errors.optional_len("name", req.name.as_deref(), NAME_LEN),
        age: req.age.filter(|age| errors.age(*age)),
        classroom_id: match req.classroom_id.as_deref().map(str::trim) {
            Some("") => {
                errors.add("classroomID", "classroomID cannot be empty");
                None
            }
            other => other.map(str::to_string),
        },
    };
    if errors.is_empty() && changes.name.is_none() && changes.age.is_none() && changes.classroom_id.is_none() {
        errors.add("name", "nothing to update");
    }
    errors.into_result().map(|_| changes)
}

/// Validated `user/createUser` input, before hashing.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidUser {
    pub email: String,
    pub password: String,
    pub role: Role,
    pub school_id: Option<String>,
}

/// `bootstrap` skips the role field: the first user is always a super admin.
pub fn new_user(req: &CreateUserRequest, bootstrap: bool) -> Result<ValidUser, ApiError> {
    let mut errors = FieldErrors::new();

    let email = match req.email.as_deref().map(str::trim) {
        Some(email) if is_email(email) => Some(email.to_lowercase()),
        Some(_) => {
            errors.add("email", "email must look like name@domain.tld");
            None
        }
        None => {
            errors.add("email", "email is required");
            None
        }
    };

    let password = match req.password.as_deref() {
        Some(p) if is_strong_password(p) => Some(p.to_string()),
        Some(_) => {
            errors.add(
                "password",
                format!(
                    "password must be at least {} characters with an uppercase letter and a digit",
                    MIN_PASSWORD_LEN
                ),
            );
            None
        }
        None => {
            errors.add("password", "password is required");
            None
        }
    };

    let role = if bootstrap {
        Some(Role::SuperAdmin)
    } else {
        match req.role.as_deref().map(Role::parse) {
            Some(Some(role)) => Some(role),
            Some(None) => {
                errors.add("role", "role must be one of: super_admin, admin, teacher, student");
                None
            }
            None => {
                errors.add("role", "role is required");
                None
            }
        }
    };

    let school_id = req
        .school_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    match role {
        Some(Role::Admin) if school_id.is_none() => errors.add("schoolID", "admin users require a schoolID"),
        Some(Role::SuperAdmin) if school_id.is_some() => {
            errors.add("schoolID", "super_admin users cannot belong to a school")
        }
        _ => {}
    }

    let user = match (email, password, role) {
        (Some(email), Some(password), Some(role)) => Some(ValidUser { email, password, role, school_id }),
        _ => None,
    };
    errors.finish(user)
}

pub fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    let clean = |s: &str| !s.is_empty() && !s.chars().any(|c| c.is_whitespace() || c == '@');
    clean(local) && clean(host) && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}

pub fn is_strong_password(value: &str) -> bool {
    value.chars().count() >= MIN_PASSWORD_LEN
        && value.chars().any(|c| c.is_ascii_uppercase())
        && value.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_errors(err: ApiError) -> HashMap<String, String> {
        match err {
            ApiError::ValidationError { field_errors: Some(f), .. } => f,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn school_name_and_address_lengths() {
        let err = new_school(&SchoolRequest { name: Some("AB".into()), address: None }).unwrap_err();
        let fields = field_errors(err);
        assert!(fields["name"].contains("between 3 and 50"));
        assert_eq!(fields["address"], "address is required");

        let ok = new_school(&SchoolRequest {
            name: Some("  Northside  ".into()),
            address: Some("1 Main St".into()),
        })
        .unwrap();
        assert_eq!(ok.name, "Northside");
    }

    #[test]
    fn empty_school_update_is_rejected() {
        assert!(school_changes(&SchoolRequest::default()).is_err());
        let changes = school_changes(&SchoolRequest { name: Some("Eastside".into()), address: None }).unwrap();
        assert_eq!(changes.name.as_deref(), Some("Eastside"));
    }

    #[test]
    fn student_age_bounds() {
        let req = |age| CreateStudentRequest {
            name: Some("Ada".into()),
            age: Some(age),
            classroom_id: Some("c1".into()),
        };
        assert!(new_student(&req(2)).is_err());
        assert!(new_student(&req(101)).is_err());
        assert_eq!(new_student(&req(10)).unwrap().age, 10);
    }

    #[test]
    fn classroom_requires_school() {
        let err = new_classroom(&CreateClassroomRequest { name: Some("1A-math".into()), school_id: None }).unwrap_err();
        assert!(field_errors(err).contains_key("schoolID"));
    }

    #[test]
    fn email_shapes() {
        assert!(is_email("ada@school.edu"));
        assert!(!is_email("ada@school"));
        assert!(!is_email("@school.edu"));
        assert!(!is_email("ada school@x.io"));
        assert!(!is_email("ada@school.e1"));
    }

    #[test]
    fn password_strength() {
        assert!(is_strong_password("Secret123"));
        assert!(!is_strong_password("secret123"));
        assert!(!is_strong_password("SecretABC"));
        assert!(!is_strong_password("Se1"));
    }

    #[test]
    fn admin_user_needs_school_and_bootstrap_forces_super_admin() {
        let req = CreateUserRequest {
            email: Some("Ada@School.edu".into()),
            password: Some("Secret123".into()),
            role: Some("admin".into()),
            school_id: None,
        };
        assert!(field_errors(new_user(&req, false).unwrap_err()).contains_key("schoolID"));

        let first = new_user(&req, true).unwrap();
        assert_eq!(first.role, Role::SuperAdmin);
        assert_eq!(first.email, "ada@school.edu");
    }
}
