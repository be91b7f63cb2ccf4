use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Identifies one reconciliation scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortfolioKey {
    pub family_id: String,
    pub student_id: String,
    pub school_year: String,
}

impl PortfolioKey {
    pub fn new(
        family_id: impl Into<String>,
        student_id: impl Into<String>,
        school_year: impl Into<String>,
    ) -> Self {
        Self {
            family_id: family_id.into(),
            student_id: student_id.into(),
            school_year: school_year.into(),
        }
    }
}

impl fmt::Display for PortfolioKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.family_id, self.student_id, self.school_year)
    }
}

/// Course ids selected for a student, grouped by subject label.
///
/// The realtime store writes `null` for a subject that was emptied, so missing
/// and null lists both decode as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseSelection {
    #[serde(deserialize_with = "subjects_or_empty")]
    pub subjects: BTreeMap<String, Vec<String>>,
}

fn subjects_or_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<Vec<String>>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(subject, ids)| (subject, ids.unwrap_or_default()))
        .collect())
}

impl CourseSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subject(mut self, subject: &str, course_ids: &[&str]) -> Self {
        self.subjects.insert(
            subject.to_string(),
            course_ids.iter().map(|id| id.to_string()).collect(),
        );
        self
    }

    /// Unique course ids in subject order, keeping the first occurrence of each.
    pub fn flatten(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.subjects
            .values()
            .flatten()
            .filter(|id| !id.is_empty() && seen.insert(id.as_str()))
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.values().all(|ids| ids.is_empty())
    }
}

/// Descriptive catalog metadata for one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_dedupes_across_subjects() {
        let selection = CourseSelection::new()
            .with_subject("math", &["MAT1010", "MAT2010"])
            .with_subject("science", &["SCI1010", "MAT1010"]);

        assert_eq!(selection.flatten(), vec!["MAT1010", "MAT2010", "SCI1010"]);
    }

    #[test]
    fn decodes_null_subjects_as_empty() {
        let selection: CourseSelection =
            serde_json::from_str(r#"{"math": ["MAT1010"], "art": null}"#).unwrap();
        assert_eq!(selection.flatten(), vec!["MAT1010"]);

        let empty: CourseSelection = serde_json::from_str("null").unwrap();
        assert!(empty.is_empty());
    }
}
