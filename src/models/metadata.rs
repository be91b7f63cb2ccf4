use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PortfolioMetadata {
    pub student_id: String,
    pub family_id: String,
    pub has_archived_items: bool,
    pub starter_course_deleted: bool,
    pub last_modified: i64,
}

impl PortfolioMetadata {
    pub fn empty(student_id: &str) -> Self {
        Self {
            student_id: student_id.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataPatch {
    pub has_archived_items: Option<bool>,
    pub starter_course_deleted: Option<bool>,
}
