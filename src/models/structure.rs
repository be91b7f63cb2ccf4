use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use crate::models::{CourseInfo, PortfolioKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureType {
    Portfolio,
    Collection,
    Entry,
}

impl StructureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StructureType::Portfolio => "portfolio",
            StructureType::Collection => "collection",
            StructureType::Entry => "entry",
        }
    }
}

impl fmt::Display for StructureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StructureType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "portfolio" => Ok(StructureType::Portfolio),
            "collection" => Ok(StructureType::Collection),
            "entry" => Ok(StructureType::Entry),
            other => Err(format!("unknown structure type: {}", other)),
        }
    }
}

/// A node in a student's portfolio hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureRecord {
    pub id: String,
    pub family_id: String,
    pub student_id: String,
    pub school_year: Option<String>,
    #[serde(rename = "type")]
    pub record_type: StructureType,
    pub parent_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub order: i64,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub is_archived: bool,
    pub archived_at: Option<String>,
    pub archived_by: Option<String>,
    pub archived_reason: Option<String>,
    pub is_alberta_course: bool,
    pub alberta_course_id: Option<String>,
    pub course_code: Option<String>,
    pub is_starter_course: bool,
    pub created_at: String,
    pub created_by: String,
    pub restored_at: Option<String>,
    pub restored_by: Option<String>,
    pub updated_at: String,
}

impl StructureRecord {
    fn blank(
        family_id: &str,
        student_id: &str,
        record_type: StructureType,
        title: String,
        actor: &str,
        now: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            family_id: family_id.to_string(),
            student_id: student_id.to_string(),
            school_year: None,
            record_type,
            parent_id: None,
            title,
            description: None,
            order: 0,
            icon: None,
            color: None,
            is_archived: false,
            archived_at: None,
            archived_by: None,
            archived_reason: None,
            is_alberta_course: false,
            alberta_course_id: None,
            course_code: None,
            is_starter_course: false,
            created_at: now.to_string(),
            created_by: actor.to_string(),
            restored_at: None,
            restored_by: None,
            updated_at: now.to_string(),
        }
    }

    /// Live curriculum-derived portfolio mirroring one catalog course.
    pub fn new_curriculum(
        key: &PortfolioKey,
        course_id: &str,
        course: &CourseInfo,
        order: i64,
        actor: &str,
        now: &str,
    ) -> Self {
        let mut record = Self::blank(
            &key.family_id,
            &key.student_id,
            StructureType::Portfolio,
            course.name.clone(),
            actor,
            now,
        );
        record.school_year = Some(key.school_year.clone());
        record.description = course.description.clone();
        record.order = order;
        record.is_alberta_course = true;
        record.alberta_course_id = Some(course_id.to_string());
        record.course_code = course.code.clone();
        record
    }

    pub fn new_starter(family_id: &str, student_id: &str, actor: &str, now: &str) -> Self {
        let mut record = Self::blank(
            family_id,
            student_id,
            StructureType::Portfolio,
            STARTER_TITLE.to_string(),
            actor,
            now,
        );
        record.is_starter_course = true;
        record
    }

    pub fn from_request(req: NewStructureRequest, actor: &str, now: &str) -> Self {
        let mut record = Self::blank(
            &req.family_id,
            &req.student_id,
            req.record_type,
            req.title,
            actor,
            now,
        );
        record.parent_id = req.parent_id;
        record.description = req.description;
        record.order = req.order.unwrap_or(0);
        record.icon = req.icon;
        record.color = req.color;
        record
    }

    pub fn is_live(&self) -> bool {
        !self.is_archived
    }
}

pub const STARTER_TITLE: &str = "My First Portfolio";

impl<'r> FromRow<'r, SqliteRow> for StructureRecord {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let record_type: String = row.try_get("record_type")?;
        let record_type = record_type
            .parse::<StructureType>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "record_type".to_string(),
                source: e.into(),
            })?;

        Ok(Self {
            id: row.try_get("id")?,
            family_id: row.try_get("family_id")?,
            student_id: row.try_get("student_id")?,
            school_year: row.try_get("school_year")?,
            record_type,
            parent_id: row.try_get("parent_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            order: row.try_get("sort_order")?,
            icon: row.try_get("icon")?,
            color: row.try_get("color")?,
            is_archived: row.try_get("is_archived")?,
            archived_at: row.try_get("archived_at")?,
            archived_by: row.try_get("archived_by")?,
            archived_reason: row.try_get("archived_reason")?,
            is_alberta_course: row.try_get("is_alberta_course")?,
            alberta_course_id: row.try_get("alberta_course_id")?,
            course_code: row.try_get("course_code")?,
            is_starter_course: row.try_get("is_starter_course")?,
            created_at: row.try_get("created_at")?,
            created_by: row.try_get("created_by")?,
            restored_at: row.try_get("restored_at")?,
            restored_by: row.try_get("restored_by")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStructureRequest {
    pub family_id: String,
    pub student_id: String,
    #[serde(rename = "type")]
    pub record_type: StructureType,
    pub parent_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub order: Option<i64>,
    pub icon: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateStructureRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub order: Option<i64>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub parent_id: Option<String>,
}
