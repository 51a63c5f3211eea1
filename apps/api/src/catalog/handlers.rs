//! Axum route handlers for the rubric catalog (CRUD glue around `catalog::store`).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::cascade::DeletionPlan;
use crate::catalog::store::{self, RubricItem};
use crate::errors::AppError;
use crate::models::catalog::{Block, Subject, Term};
use crate::models::student::{Course, Gender, Student};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct BlockListQuery {
    pub user_id: Uuid,
    pub term: Option<Term>,
}

#[derive(Deserialize)]
pub struct StudentRequest {
    pub user_id: Uuid,
    pub name: String,
    pub gender: Gender,
    /// Defaults to the teacher's current course.
    pub course: Option<Course>,
}

#[derive(Deserialize)]
pub struct SubjectRequest {
    pub user_id: Uuid,
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreateBlockRequest {
    pub user_id: Uuid,
    pub subject_id: Uuid,
    pub name: String,
    pub trimesters: Vec<i16>,
}

#[derive(Deserialize)]
pub struct UpdateBlockRequest {
    pub user_id: Uuid,
    pub name: String,
    pub trimesters: Vec<i16>,
}

#[derive(Deserialize)]
pub struct CreateItemRequest {
    pub user_id: Uuid,
    pub block_id: Uuid,
    pub tag: String,
    pub text: String,
}

#[derive(Deserialize)]
pub struct UpdateItemRequest {
    pub user_id: Uuid,
    pub tag: String,
    pub text: String,
}

fn require_text<'a>(field: &str, value: &'a str) -> Result<&'a str, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(value)
}

// ────────────────────────────────────────────────────────────────────────────
// Students
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/students
pub async fn handle_list_students(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<Student>>, AppError> {
    Ok(Json(store::list_students(&state.db, params.user_id).await?))
}

/// POST /api/v1/students
pub async fn handle_create_student(
    State(state): State<AppState>,
    Json(req): Json<StudentRequest>,
) -> Result<(StatusCode, Json<Student>), AppError> {
    let name = require_text("name", &req.name)?;
    let course = match req.course {
        Some(course) => course,
        None => {
            state
                .profiles
                .get_or_load(req.user_id, state.profile_store.as_ref())
                .await?
                .current_course
        }
    };

    let student = store::create_student(&state.db, req.user_id, name, req.gender, course).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

/// PUT /api/v1/students/:id
pub async fn handle_update_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StudentRequest>,
) -> Result<Json<Student>, AppError> {
    let name = require_text("name", &req.name)?;
    let existing = store::get_student(&state.db, req.user_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Student {id} not found")))?;
    let course = req.course.unwrap_or(existing.course);

    store::update_student(&state.db, req.user_id, id, name, req.gender, course)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Student {id} not found")))
}

/// DELETE /api/v1/students/:id
pub async fn handle_delete_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    if !store::delete_student(&state.db, params.user_id, id).await? {
        return Err(AppError::NotFound(format!("Student {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ────────────────────────────────────────────────────────────────────────────
// Subjects
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/subjects
pub async fn handle_list_subjects(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<Subject>>, AppError> {
    Ok(Json(store::list_subjects(&state.db, params.user_id).await?))
}

/// POST /api/v1/subjects
pub async fn handle_create_subject(
    State(state): State<AppState>,
    Json(req): Json<SubjectRequest>,
) -> Result<(StatusCode, Json<Subject>), AppError> {
    let name = require_text("name", &req.name)?;
    let subject = store::create_subject(&state.db, req.user_id, name).await?;
    Ok((StatusCode::CREATED, Json(subject)))
}

/// PUT /api/v1/subjects/:id
pub async fn handle_update_subject(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubjectRequest>,
) -> Result<Json<Subject>, AppError> {
    let name = require_text("name", &req.name)?;
    store::rename_subject(&state.db, req.user_id, id, name)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Subject {id} not found")))
}

/// DELETE /api/v1/subjects/:id
///
/// Cascades to the subject's blocks and their gradients and comments.
pub async fn handle_delete_subject(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<DeletionPlan>, AppError> {
    store::delete_subject(&state.db, params.user_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Subject {id} not found")))
}

// ────────────────────────────────────────────────────────────────────────────
// Blocks
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/subjects/:id/blocks
pub async fn handle_list_blocks(
    State(state): State<AppState>,
    Path(subject_id): Path<Uuid>,
    Query(params): Query<BlockListQuery>,
) -> Result<Json<Vec<Block>>, AppError> {
    let blocks = store::list_blocks(&state.db, params.user_id, subject_id, params.term).await?;
    Ok(Json(blocks))
}

/// POST /api/v1/blocks
pub async fn handle_create_block(
    State(state): State<AppState>,
    Json(req): Json<CreateBlockRequest>,
) -> Result<(StatusCode, Json<Block>), AppError> {
    let name = require_text("name", &req.name)?;
    let trimesters = Term::normalize_set(&req.trimesters)?;

    let block = store::create_block(&state.db, req.user_id, req.subject_id, name, &trimesters)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Subject {} not found", req.subject_id)))?;
    Ok((StatusCode::CREATED, Json(block)))
}

/// PUT /api/v1/blocks/:id
pub async fn handle_update_block(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBlockRequest>,
) -> Result<Json<Block>, AppError> {
    let name = require_text("name", &req.name)?;
    let trimesters = Term::normalize_set(&req.trimesters)?;

    store::update_block(&state.db, req.user_id, id, name, &trimesters)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Block {id} not found")))
}

/// DELETE /api/v1/blocks/:id
///
/// Cascades to the block's gradients and comments.
pub async fn handle_delete_block(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<DeletionPlan>, AppError> {
    store::delete_block(&state.db, params.user_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Block {id} not found")))
}

// ────────────────────────────────────────────────────────────────────────────
// Gradients and comments (shared handlers, instantiated per item type)
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/blocks/:id/gradients, GET /api/v1/blocks/:id/comments
pub async fn handle_list_items<T: RubricItem + Serialize>(
    State(state): State<AppState>,
    Path(block_id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<T>>, AppError> {
    Ok(Json(
        store::list_items::<T>(&state.db, params.user_id, &[block_id]).await?,
    ))
}

/// POST /api/v1/gradients, POST /api/v1/comments
pub async fn handle_create_item<T: RubricItem + Serialize>(
    State(state): State<AppState>,
    Json(req): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<T>), AppError> {
    let tag = require_text("tag", &req.tag)?;
    let text = require_text("text", &req.text)?;

    let item = store::create_item::<T>(&state.db, req.user_id, req.block_id, tag, text)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Block {} not found", req.block_id)))?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PUT /api/v1/gradients/:id, PUT /api/v1/comments/:id
pub async fn handle_update_item<T: RubricItem + Serialize>(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<T>, AppError> {
    let tag = require_text("tag", &req.tag)?;
    let text = require_text("text", &req.text)?;

    store::update_item::<T>(&state.db, req.user_id, id, tag, text)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("{} {id} not found", T::TABLE)))
}

/// DELETE /api/v1/gradients/:id, DELETE /api/v1/comments/:id
pub async fn handle_delete_item<T: RubricItem>(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    if !store::delete_item::<T>(&state.db, params.user_id, id).await? {
        return Err(AppError::NotFound(format!("{} {id} not found", T::TABLE)));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text_trims() {
        assert_eq!(require_text("name", "  Anna ").unwrap(), "Anna");
    }

    #[test]
    fn test_require_text_rejects_blank() {
        let err = require_text("tag", "   ").unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg == "tag cannot be empty"));
    }

    #[test]
    fn test_student_request_course_is_optional() {
        let req: StudentRequest = serde_json::from_value(serde_json::json!({
            "user_id": Uuid::new_v4(),
            "name": "Pol",
            "gender": "male"
        }))
        .unwrap();
        assert!(req.course.is_none());
        assert_eq!(req.gender, Gender::Male);
    }

    #[test]
    fn test_block_request_rejects_invalid_term_filter() {
        let result: Result<BlockListQuery, _> = serde_json::from_value(serde_json::json!({
            "user_id": Uuid::new_v4(),
            "term": 4
        }));
        assert!(result.is_err());
    }
}
