use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::curriculum::CourseCatalog;
use crate::error::AppError;
use crate::models::CourseInfo;

/// Course catalog loaded once from a JSON object of `course id -> {name, description, code}`.
#[derive(Debug, Clone, Default)]
pub struct StaticCourseCatalog {
    courses: HashMap<String, CourseInfo>,
}

impl StaticCourseCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(raw: &str) -> Result<Self, AppError> {
        let courses: HashMap<String, CourseInfo> = serde_json::from_str(raw)
            .map_err(|e| AppError::Config(format!("invalid course catalog: {}", e)))?;
        Ok(Self { courses })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("cannot read course catalog {}: {}", path.display(), e))
        })?;
        let catalog = Self::from_json_str(&raw)?;
        info!("Loaded {} courses from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn with_course(mut self, course_id: &str, name: &str, code: Option<&str>) -> Self {
        self.courses.insert(
            course_id.to_string(),
            CourseInfo {
                name: name.to_string(),
                description: None,
                code: code.map(str::to_string),
            },
        );
        self
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}

#[async_trait]
impl CourseCatalog for StaticCourseCatalog {
    async fn lookup(&self, course_id: &str) -> Result<Option<CourseInfo>, AppError> {
        Ok(self.courses.get(course_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_catalog_json() {
        let catalog = StaticCourseCatalog::from_json_str(
            r#"{
                "MAT1010": {"name": "Mathematics 10C", "code": "MATH10C"},
                "ELA1105": {"name": "English 10-1", "description": "Language arts"}
            }"#,
        )
        .unwrap();

        assert_eq!(catalog.len(), 2);
        let math = catalog.lookup("MAT1010").await.unwrap().unwrap();
        assert_eq!(math.name, "Mathematics 10C");
        assert_eq!(math.code.as_deref(), Some("MATH10C"));
        assert!(catalog.lookup("NOPE").await.unwrap().is_none());
    }

    #[test]
    fn rejects_malformed_catalog() {
        let err = StaticCourseCatalog::from_json_str("[1, 2]").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
