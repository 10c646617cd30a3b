use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Model;
use crate::database::Collection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classroom {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    /// Owning school. Fixed at creation.
    pub school_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model for Classroom {
    const COLLECTION: Collection = Collection::Classrooms;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateClassroomRequest {
    pub name: Option<String>,
    #[serde(rename = "schoolID", alias = "schoolId")]
    pub school_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClassroom {
    pub name: String,
    pub school_id: String,
}

/// Only the name is mutable; a `schoolId` in an update body is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassroomChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
