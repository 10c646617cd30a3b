/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of caller roles carried in identity tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[serde(alias = "super-admin")]
    SuperAdmin,
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    /// Global roles are never bound to a single school.
    pub fn is_global(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "super_admin" | "super-admin" => Some(Role::SuperAdmin),
            "admin" => Some(Role::Admin),
            "teacher" => Some(Role::Teacher),
            "student" => Some(Role::Student),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entities managed by the API. Each maps to one document collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    School,
    Classroom,
    Student,
    User,
    Token,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::School => "school",
            Entity::Classroom => "classroom",
            Entity::Student => "student",
            Entity::User => "user",
            Entity::Token => "token",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations an entity manager exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Get,
    List,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Get => "get",
            Operation::List => "list",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_accepts_legacy_hyphenated_super_admin() {
        let role: Role = serde_json::from_str("\"super-admin\"").unwrap();
        assert_eq!(role, Role::SuperAdmin);
        assert_eq!(serde_json::to_string(&role).unwrap(), "\"super_admin\"");
    }

    #[test]
    fn only_super_admin_is_global() {
        assert!(Role::SuperAdmin.is_global());
        assert!(!Role::Admin.is_global());
        assert!(!Role::Teacher.is_global());
        assert!(!Role::Student.is_global());
    }
}
