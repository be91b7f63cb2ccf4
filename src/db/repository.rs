use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::{
    Entry, MetadataPatch, PortfolioKey, PortfolioMetadata, StructureRecord,
    UpdateStructureRequest,
};

const STRUCTURE_COLUMNS: &str = "id, family_id, student_id, school_year, record_type, parent_id, \
    title, description, sort_order, icon, color, is_archived, archived_at, archived_by, \
    archived_reason, is_alberta_course, alberta_course_id, course_code, is_starter_course, \
    created_at, created_by, restored_at, restored_by, updated_at";

pub async fn fetch_live_structures(
    db: &SqlitePool,
    student_id: &str,
) -> Result<Vec<StructureRecord>, sqlx::Error> {
    let sql = format!(
        "SELECT {STRUCTURE_COLUMNS} FROM structures
        WHERE student_id = ? AND is_archived = 0
        ORDER BY sort_order ASC, created_at ASC"
    );
    sqlx::query_as::<_, StructureRecord>(&sql)
        .bind(student_id)
        .fetch_all(db)
        .await
}

pub async fn fetch_archived_structures(
    db: &SqlitePool,
    student_id: &str,
) -> Result<Vec<StructureRecord>, sqlx::Error> {
    let sql = format!(
        "SELECT {STRUCTURE_COLUMNS} FROM structures
        WHERE student_id = ? AND is_archived = 1
        ORDER BY archived_at DESC"
    );
    sqlx::query_as::<_, StructureRecord>(&sql)
        .bind(student_id)
        .fetch_all(db)
        .await
}

pub async fn fetch_curriculum_structures(
    db: &SqlitePool,
    key: &PortfolioKey,
) -> Result<Vec<StructureRecord>, sqlx::Error> {
    let sql = format!(
        "SELECT {STRUCTURE_COLUMNS} FROM structures
        WHERE family_id = ? AND student_id = ? AND school_year = ? AND is_alberta_course = 1
        ORDER BY sort_order ASC"
    );
    sqlx::query_as::<_, StructureRecord>(&sql)
        .bind(&key.family_id)
        .bind(&key.student_id)
        .bind(&key.school_year)
        .fetch_all(db)
        .await
}

pub async fn find_structure_by_id(
    db: &SqlitePool,
    id: &str,
) -> Result<Option<StructureRecord>, sqlx::Error> {
    let sql = format!("SELECT {STRUCTURE_COLUMNS} FROM structures WHERE id = ?");
    sqlx::query_as::<_, StructureRecord>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn count_structures(
    db: &SqlitePool,
    student_id: &str,
    archived: bool,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM structures WHERE student_id = ? AND is_archived = ?",
    )
    .bind(student_id)
    .bind(archived)
    .fetch_one(db)
    .await
}

pub(crate) fn insert_structure_query(
    record: &StructureRecord,
) -> sqlx::query::Query<'_, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
    sqlx::query(
        r#"
        INSERT INTO structures
            (id, family_id, student_id, school_year, record_type, parent_id, title, description,
            sort_order, icon, color, is_archived, archived_at, archived_by, archived_reason,
            is_alberta_course, alberta_course_id, course_code, is_starter_course,
            created_at, created_by, restored_at, restored_by, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.id)
    .bind(&record.family_id)
    .bind(&record.student_id)
    .bind(&record.school_year)
    .bind(record.record_type.as_str())
    .bind(&record.parent_id)
    .bind(&record.title)
    .bind(&record.description)
    .bind(record.order)
    .bind(&record.icon)
    .bind(&record.color)
    .bind(record.is_archived)
    .bind(&record.archived_at)
    .bind(&record.archived_by)
    .bind(&record.archived_reason)
    .bind(record.is_alberta_course)
    .bind(&record.alberta_course_id)
    .bind(&record.course_code)
    .bind(record.is_starter_course)
    .bind(&record.created_at)
    .bind(&record.created_by)
    .bind(&record.restored_at)
    .bind(&record.restored_by)
    .bind(&record.updated_at)
}

pub(crate) fn archive_structure_query<'q>(
    id: &'q str,
    reason: &'q str,
    actor: &'q str,
    at: &'q str,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    sqlx::query(
        r#"
        UPDATE structures
        SET is_archived = 1,
            archived_at = ?2,
            archived_by = ?3,
            archived_reason = ?4,
            updated_at = ?2
        WHERE id = ?1 AND is_archived = 0
        "#,
    )
    .bind(id)
    .bind(at)
    .bind(actor)
    .bind(reason)
}

pub(crate) fn restore_structure_query<'q>(
    id: &'q str,
    actor: &'q str,
    at: &'q str,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    sqlx::query(
        r#"
        UPDATE structures
        SET is_archived = 0,
            archived_at = NULL,
            archived_by = NULL,
            archived_reason = NULL,
            restored_at = ?2,
            restored_by = ?3,
            updated_at = ?2
        WHERE id = ?1 AND is_archived = 1
        "#,
    )
    .bind(id)
    .bind(at)
    .bind(actor)
}

pub(crate) fn assign_entry_query<'q>(
    entry_id: &'q str,
    structure_id: &'q str,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    sqlx::query("UPDATE entries SET structure_id = ?2 WHERE id = ?1 AND structure_id IS NULL")
        .bind(entry_id)
        .bind(structure_id)
}

pub async fn insert_structure(db: &SqlitePool, record: &StructureRecord) -> Result<(), sqlx::Error> {
    insert_structure_query(record).execute(db).await?;
    Ok(())
}

pub async fn update_structure(
    db: &SqlitePool,
    id: &str,
    req: &UpdateStructureRequest,
) -> Result<Option<StructureRecord>, sqlx::Error> {
    let mut current = match find_structure_by_id(db, id).await? {
        Some(r) => r,
        None => return Ok(None),
    };

    if let Some(title) = &req.title {
        current.title = title.clone();
    }
    if let Some(description) = &req.description {
        current.description = Some(description.clone());
    }
    if let Some(order) = req.order {
        current.order = order;
    }
    if let Some(icon) = &req.icon {
        current.icon = Some(icon.clone());
    }
    if let Some(color) = &req.color {
        current.color = Some(color.clone());
    }
    if let Some(parent_id) = &req.parent_id {
        current.parent_id = Some(parent_id.clone());
    }
    current.updated_at = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE structures
        SET title = ?1,
            description = ?2,
            sort_order = ?3,
            icon = ?4,
            color = ?5,
            parent_id = ?6,
            updated_at = ?7
        WHERE id = ?8
        "#,
    )
    .bind(&current.title)
    .bind(&current.description)
    .bind(current.order)
    .bind(&current.icon)
    .bind(&current.color)
    .bind(&current.parent_id)
    .bind(&current.updated_at)
    .bind(id)
    .execute(db)
    .await?;

    Ok(Some(current))
}

pub async fn archive_structure(
    db: &SqlitePool,
    id: &str,
    reason: &str,
    actor: &str,
) -> Result<bool, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let result = archive_structure_query(id, reason, actor, &now)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

pub async fn restore_structure(db: &SqlitePool, id: &str, actor: &str) -> Result<bool, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let result = restore_structure_query(id, actor, &now)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

pub async fn fetch_orphan_entries(
    db: &SqlitePool,
    student_id: &str,
) -> Result<Vec<Entry>, sqlx::Error> {
    sqlx::query_as::<_, Entry>(
        "SELECT id, family_id, student_id, title, structure_id, legacy_portfolio, legacy_collection, created_at
        FROM entries
        WHERE student_id = ? AND structure_id IS NULL
        ORDER BY created_at ASC",
    )
    .bind(student_id)
    .fetch_all(db)
    .await
}

pub async fn find_entry_by_id(db: &SqlitePool, id: &str) -> Result<Option<Entry>, sqlx::Error> {
    sqlx::query_as::<_, Entry>(
        "SELECT id, family_id, student_id, title, structure_id, legacy_portfolio, legacy_collection, created_at
        FROM entries WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn insert_entry(db: &SqlitePool, entry: &Entry) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO entries
            (id, family_id, student_id, title, structure_id, legacy_portfolio, legacy_collection, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.family_id)
    .bind(&entry.student_id)
    .bind(&entry.title)
    .bind(&entry.structure_id)
    .bind(&entry.legacy_portfolio)
    .bind(&entry.legacy_collection)
    .bind(&entry.created_at)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn fetch_metadata(
    db: &SqlitePool,
    student_id: &str,
) -> Result<Option<PortfolioMetadata>, sqlx::Error> {
    sqlx::query_as::<_, PortfolioMetadata>(
        "SELECT student_id, family_id, has_archived_items, starter_course_deleted, last_modified
        FROM portfolio_metadata WHERE student_id = ?",
    )
    .bind(student_id)
    .fetch_optional(db)
    .await
}

pub async fn upsert_metadata(
    db: &SqlitePool,
    student_id: &str,
    family_id: &str,
    patch: &MetadataPatch,
) -> Result<PortfolioMetadata, sqlx::Error> {
    let now = Utc::now().timestamp_millis();

    sqlx::query(
        r#"
        INSERT INTO portfolio_metadata
            (student_id, family_id, has_archived_items, starter_course_deleted, last_modified)
        VALUES (?1, ?2, COALESCE(?3, 0), COALESCE(?4, 0), ?5)
        ON CONFLICT(student_id) DO UPDATE SET
            has_archived_items = COALESCE(?3, has_archived_items),
            starter_course_deleted = COALESCE(?4, starter_course_deleted),
            last_modified = MAX(last_modified + 1, ?5)
        "#,
    )
    .bind(student_id)
    .bind(family_id)
    .bind(patch.has_archived_items)
    .bind(patch.starter_course_deleted)
    .bind(now)
    .execute(db)
    .await?;

    fetch_metadata(db, student_id)
        .await?
        .ok_or_else(|| sqlx::Error::RowNotFound)
}
