use serde::Serialize;
use thiserror::Error;

use crate::types::Role;

/// Decoded caller identity. Each variant carries only the fields valid for
/// its role, so a global caller has no tenant to forget about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Identity {
    SuperAdmin {
        #[serde(rename = "userId")]
        user_id: String,
    },
    Admin {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "schoolId")]
        school_id: String,
    },
    Teacher {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "schoolId", skip_serializing_if = "Option::is_none")]
        school_id: Option<String>,
    },
    Student {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "schoolId", skip_serializing_if = "Option::is_none")]
        school_id: Option<String>,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("user id is empty")]
    EmptyUserId,

    #[error("role {0} requires a school id")]
    MissingSchool(Role),

    #[error("role {0} cannot carry a school id")]
    UnexpectedSchool(Role),
}

impl Identity {
    /// Build an identity from loose parts (token payload, user document).
    pub fn from_parts(
        role: Role,
        user_id: impl Into<String>,
        school_id: Option<String>,
    ) -> Result<Self, IdentityError> {
        let user_id = user_id.into();
        if user_id.is_empty() {
            return Err(IdentityError::EmptyUserId);
        }
        let school_id = school_id.filter(|s| !s.is_empty());

        match role {
            Role::SuperAdmin => match school_id {
                None => Ok(Identity::SuperAdmin { user_id }),
                Some(_) => Err(IdentityError::UnexpectedSchool(role)),
            },
            Role::Admin => match school_id {
                Some(school_id) => Ok(Identity::Admin { user_id, school_id }),
                None => Err(IdentityError::MissingSchool(role)),
            },
            Role::Teacher => Ok(Identity::Teacher { user_id, school_id }),
            Role::Student => Ok(Identity::Student { user_id, school_id }),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Identity::SuperAdmin { .. } => Role::SuperAdmin,
            Identity::Admin { .. } => Role::Admin,
            Identity::Teacher { .. } => Role::Teacher,
            Identity::Student { .. } => Role::Student,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Identity::SuperAdmin { user_id }
            | Identity::Admin { user_id, .. }
            | Identity::Teacher { user_id, .. }
            | Identity::Student { user_id, .. } => user_id,
        }
    }

    /// Tenant the caller is bound to, if any.
    pub fn school_id(&self) -> Option<&str> {
        match self {
            Identity::SuperAdmin { .. } => None,
            Identity::Admin { school_id, .. } => Some(school_id),
            Identity::Teacher { school_id, .. } | Identity::Student { school_id, .. } => {
                school_id.as_deref()
            }
        }
    }
}
