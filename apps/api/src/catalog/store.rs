//! PostgreSQL access for the rubric catalog. Every query is scoped by owner,
//! except `item_placements`, which reads only ids.

use std::collections::HashMap;

use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::catalog::cascade::{plan_block_deletion, plan_subject_deletion, DeletionPlan};
use crate::models::catalog::{Block, Comment, Gradient, Subject, Term};
use crate::models::student::{Course, Gender, Student};

// ────────────────────────────────────────────────────────────────────────────
// Students
// ────────────────────────────────────────────────────────────────────────────

pub async fn list_students(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Student>> {
    Ok(sqlx::query_as::<_, Student>(
        "SELECT * FROM students WHERE owner_id = $1 ORDER BY course, name",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?)
}

pub async fn get_student(pool: &PgPool, owner_id: Uuid, id: Uuid) -> Result<Option<Student>> {
    Ok(
        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn create_student(
    pool: &PgPool,
    owner_id: Uuid,
    name: &str,
    gender: Gender,
    course: Course,
) -> Result<Student> {
    let student = sqlx::query_as::<_, Student>(
        r#"
        INSERT INTO students (id, owner_id, name, gender, course)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner_id)
    .bind(name)
    .bind(gender)
    .bind(course)
    .fetch_one(pool)
    .await?;

    info!("Created student {} for owner {owner_id}", student.id);
    Ok(student)
}

pub async fn update_student(
    pool: &PgPool,
    owner_id: Uuid,
    id: Uuid,
    name: &str,
    gender: Gender,
    course: Course,
) -> Result<Option<Student>> {
    Ok(sqlx::query_as::<_, Student>(
        r#"
        UPDATE students SET name = $3, gender = $4, course = $5
        WHERE id = $1 AND owner_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(owner_id)
    .bind(name)
    .bind(gender)
    .bind(course)
    .fetch_optional(pool)
    .await?)
}

/// Students own nothing, so deletion is a single statement.
pub async fn delete_student(pool: &PgPool, owner_id: Uuid, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM students WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ────────────────────────────────────────────────────────────────────────────
// Subjects
// ────────────────────────────────────────────────────────────────────────────

pub async fn list_subjects(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Subject>> {
    Ok(
        sqlx::query_as::<_, Subject>("SELECT * FROM subjects WHERE owner_id = $1 ORDER BY name")
            .bind(owner_id)
            .fetch_all(pool)
            .await?,
    )
}

pub async fn get_subject(pool: &PgPool, owner_id: Uuid, id: Uuid) -> Result<Option<Subject>> {
    Ok(
        sqlx::query_as::<_, Subject>("SELECT * FROM subjects WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn create_subject(pool: &PgPool, owner_id: Uuid, name: &str) -> Result<Subject> {
    Ok(sqlx::query_as::<_, Subject>(
        "INSERT INTO subjects (id, owner_id, name) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(owner_id)
    .bind(name)
    .fetch_one(pool)
    .await?)
}

pub async fn rename_subject(
    pool: &PgPool,
    owner_id: Uuid,
    id: Uuid,
    name: &str,
) -> Result<Option<Subject>> {
    Ok(sqlx::query_as::<_, Subject>(
        "UPDATE subjects SET name = $3 WHERE id = $1 AND owner_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(owner_id)
    .bind(name)
    .fetch_optional(pool)
    .await?)
}

/// Deletes a subject with all its blocks, gradients and comments in one
/// transaction. Returns `None` if the subject does not exist for this owner.
pub async fn delete_subject(
    pool: &PgPool,
    owner_id: Uuid,
    id: Uuid,
) -> Result<Option<DeletionPlan>> {
    let mut tx = pool.begin().await?;

    let exists: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM subjects WHERE id = $1 AND owner_id = $2 FOR UPDATE")
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&mut *tx)
            .await?;
    if exists.is_none() {
        return Ok(None);
    }

    let blocks = sqlx::query_as::<_, Block>(
        "SELECT * FROM blocks WHERE subject_id = $1 AND owner_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(owner_id)
    .fetch_all(&mut *tx)
    .await?;
    let block_ids: Vec<Uuid> = blocks.iter().map(|b| b.id).collect();

    let gradients = items_for_blocks::<Gradient>(&mut tx, &block_ids).await?;
    let comments = items_for_blocks::<Comment>(&mut tx, &block_ids).await?;

    let plan = plan_subject_deletion(id, &blocks, &gradients, &comments);
    execute_plan(&mut tx, &plan).await?;
    tx.commit().await?;

    info!(
        "Deleted subject {id} ({} rows): {} blocks, {} gradients, {} comments",
        plan.total(),
        plan.block_ids.len(),
        plan.gradient_ids.len(),
        plan.comment_ids.len()
    );
    Ok(Some(plan))
}

// ────────────────────────────────────────────────────────────────────────────
// Blocks
// ────────────────────────────────────────────────────────────────────────────

/// Blocks of a subject, optionally only those evaluated in `term`.
pub async fn list_blocks(
    pool: &PgPool,
    owner_id: Uuid,
    subject_id: Uuid,
    term: Option<Term>,
) -> Result<Vec<Block>> {
    Ok(sqlx::query_as::<_, Block>(
        r#"
        SELECT * FROM blocks
        WHERE subject_id = $1 AND owner_id = $2
          AND ($3::smallint IS NULL OR $3 = ANY(trimesters))
        ORDER BY created_at, name
        "#,
    )
    .bind(subject_id)
    .bind(owner_id)
    .bind(term.map(|t| t.number() as i16))
    .fetch_all(pool)
    .await?)
}

pub async fn get_block(pool: &PgPool, owner_id: Uuid, id: Uuid) -> Result<Option<Block>> {
    Ok(
        sqlx::query_as::<_, Block>("SELECT * FROM blocks WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await?,
    )
}

/// Creates a block under a subject the owner holds. `None` if the subject is unknown.
pub async fn create_block(
    pool: &PgPool,
    owner_id: Uuid,
    subject_id: Uuid,
    name: &str,
    trimesters: &[i16],
) -> Result<Option<Block>> {
    Ok(sqlx::query_as::<_, Block>(
        r#"
        INSERT INTO blocks (id, owner_id, subject_id, name, trimesters)
        SELECT $1, owner_id, id, $4, $5
        FROM subjects
        WHERE id = $3 AND owner_id = $2
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner_id)
    .bind(subject_id)
    .bind(name)
    .bind(trimesters)
    .fetch_optional(pool)
    .await?)
}

pub async fn update_block(
    pool: &PgPool,
    owner_id: Uuid,
    id: Uuid,
    name: &str,
    trimesters: &[i16],
) -> Result<Option<Block>> {
    Ok(sqlx::query_as::<_, Block>(
        r#"
        UPDATE blocks SET name = $3, trimesters = $4
        WHERE id = $1 AND owner_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(owner_id)
    .bind(name)
    .bind(trimesters)
    .fetch_optional(pool)
    .await?)
}

/// Deletes a block with its gradients and comments in one transaction.
pub async fn delete_block(
    pool: &PgPool,
    owner_id: Uuid,
    id: Uuid,
) -> Result<Option<DeletionPlan>> {
    let mut tx = pool.begin().await?;

    let exists: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM blocks WHERE id = $1 AND owner_id = $2 FOR UPDATE")
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&mut *tx)
            .await?;
    if exists.is_none() {
        return Ok(None);
    }

    let gradients = items_for_blocks::<Gradient>(&mut tx, &[id]).await?;
    let comments = items_for_blocks::<Comment>(&mut tx, &[id]).await?;

    let plan = plan_block_deletion(id, &gradients, &comments);
    execute_plan(&mut tx, &plan).await?;
    tx.commit().await?;

    info!(
        "Deleted block {id}: {} gradients, {} comments",
        plan.gradient_ids.len(),
        plan.comment_ids.len()
    );
    Ok(Some(plan))
}

// ────────────────────────────────────────────────────────────────────────────
// Gradients and comments
// ────────────────────────────────────────────────────────────────────────────

/// Gradients and comments share a shape: `(id, owner_id, block_id, tag, text)`.
pub trait RubricItem: for<'r> FromRow<'r, PgRow> + Send + Unpin {
    const TABLE: &'static str;
}

impl RubricItem for Gradient {
    const TABLE: &'static str = "gradients";
}

impl RubricItem for Comment {
    const TABLE: &'static str = "comments";
}

/// Items owned by any of `block_ids`, in creation order.
pub async fn list_items<T: RubricItem>(
    pool: &PgPool,
    owner_id: Uuid,
    block_ids: &[Uuid],
) -> Result<Vec<T>> {
    let sql = format!(
        "SELECT * FROM {} WHERE block_id = ANY($1) AND owner_id = $2 ORDER BY created_at, tag",
        T::TABLE
    );
    Ok(sqlx::query_as::<_, T>(&sql)
        .bind(block_ids)
        .bind(owner_id)
        .fetch_all(pool)
        .await?)
}

pub async fn get_item<T: RubricItem>(
    pool: &PgPool,
    owner_id: Uuid,
    id: Uuid,
) -> Result<Option<T>> {
    let sql = format!("SELECT * FROM {} WHERE id = $1 AND owner_id = $2", T::TABLE);
    Ok(sqlx::query_as::<_, T>(&sql)
        .bind(id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await?)
}

/// Maps each existing id in `ids` to the block it lives under, whoever owns it.
/// Ids with no row are absent from the result.
pub async fn item_placements<T: RubricItem>(
    pool: &PgPool,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, Uuid>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let sql = format!("SELECT id, block_id FROM {} WHERE id = ANY($1)", T::TABLE);
    let rows: Vec<(Uuid, Uuid)> = sqlx::query_as(&sql).bind(ids).fetch_all(pool).await?;
    Ok(rows.into_iter().collect())
}

/// Creates an item under a block the owner holds. `None` if the block is unknown.
pub async fn create_item<T: RubricItem>(
    pool: &PgPool,
    owner_id: Uuid,
    block_id: Uuid,
    tag: &str,
    text: &str,
) -> Result<Option<T>> {
    let sql = format!(
        r#"
        INSERT INTO {} (id, owner_id, block_id, tag, text)
        SELECT $1, owner_id, id, $4, $5
        FROM blocks
        WHERE id = $3 AND owner_id = $2
        RETURNING *
        "#,
        T::TABLE
    );
    Ok(sqlx::query_as::<_, T>(&sql)
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(block_id)
        .bind(tag)
        .bind(text)
        .fetch_optional(pool)
        .await?)
}

pub async fn update_item<T: RubricItem>(
    pool: &PgPool,
    owner_id: Uuid,
    id: Uuid,
    tag: &str,
    text: &str,
) -> Result<Option<T>> {
    let sql = format!(
        "UPDATE {} SET tag = $3, text = $4 WHERE id = $1 AND owner_id = $2 RETURNING *",
        T::TABLE
    );
    Ok(sqlx::query_as::<_, T>(&sql)
        .bind(id)
        .bind(owner_id)
        .bind(tag)
        .bind(text)
        .fetch_optional(pool)
        .await?)
}

pub async fn delete_item<T: RubricItem>(pool: &PgPool, owner_id: Uuid, id: Uuid) -> Result<bool> {
    let sql = format!("DELETE FROM {} WHERE id = $1 AND owner_id = $2", T::TABLE);
    let result = sqlx::query(&sql)
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ────────────────────────────────────────────────────────────────────────────
// Cascade execution
// ────────────────────────────────────────────────────────────────────────────

async fn items_for_blocks<T: RubricItem>(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    block_ids: &[Uuid],
) -> Result<Vec<T>> {
    let sql = format!(
        "SELECT * FROM {} WHERE block_id = ANY($1) FOR UPDATE",
        T::TABLE
    );
    Ok(sqlx::query_as::<_, T>(&sql)
        .bind(block_ids)
        .fetch_all(&mut **tx)
        .await?)
}

/// Deletes leaves first so no statement ever leaves a dangling owner reference.
async fn execute_plan(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    plan: &DeletionPlan,
) -> Result<()> {
    sqlx::query("DELETE FROM comments WHERE id = ANY($1)")
        .bind(&plan.comment_ids)
        .execute(&mut **tx)
        .await?;
    sqlx::query("DELETE FROM gradients WHERE id = ANY($1)")
        .bind(&plan.gradient_ids)
        .execute(&mut **tx)
        .await?;
    sqlx::query("DELETE FROM blocks WHERE id = ANY($1)")
        .bind(&plan.block_ids)
        .execute(&mut **tx)
        .await?;
    if let Some(subject_id) = plan.subject_id {
        sqlx::query("DELETE FROM subjects WHERE id = $1")
            .bind(subject_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}
