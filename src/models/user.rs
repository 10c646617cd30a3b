use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Model;
use crate::database::Collection;
use crate::types::Role;

/// Stored user. Never serialized to clients; see [`UserView`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model for User {
    const COLLECTION: Collection = Collection::Users;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Client-facing user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            school_id: user.school_id,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    #[serde(rename = "schoolID", alias = "schoolId")]
    pub school_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn view_drops_password_hash() {
        let user: User = serde_json::from_value(json!({
            "_id": "u1",
            "email": "a@b.co",
            "passwordHash": "$argon2id$...",
            "role": "admin",
            "schoolId": "s1",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        let view = serde_json::to_value(UserView::from(user)).unwrap();
        assert!(view.get("passwordHash").is_none());
        assert_eq!(view["schoolId"], json!("s1"));
        assert_eq!(view["role"], json!("admin"));
    }

    #[test]
    fn create_request_accepts_both_school_spellings() {
        let a: CreateUserRequest = serde_json::from_value(json!({"schoolID": "s1"})).unwrap();
        let b: CreateUserRequest = serde_json::from_value(json!({"schoolId": "s1"})).unwrap();
        assert_eq!(a.school_id.as_deref(), Some("s1"));
        assert_eq!(b.school_id.as_deref(), Some("s1"));
    }
}
