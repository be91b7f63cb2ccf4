use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A learning artifact. Only the fields structure backfill reads are modelled.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Entry {
    pub id: String,
    pub family_id: String,
    pub student_id: String,
    pub title: String,
    pub structure_id: Option<String>,
    pub legacy_portfolio: Option<String>,
    pub legacy_collection: Option<String>,
    pub created_at: String,
}
