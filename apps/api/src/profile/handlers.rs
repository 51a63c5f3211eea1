use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::{NewProfile, ProfileUpdate, TeacherProfile};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct CreateProfileRequest {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub profile: NewProfile,
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub update: ProfileUpdate,
}

/// GET /api/v1/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<TeacherProfile>, AppError> {
    let profile = state
        .profiles
        .get_or_load(params.user_id, state.profile_store.as_ref())
        .await?;
    Ok(Json(profile))
}

/// POST /api/v1/profile
pub async fn handle_create_profile(
    State(state): State<AppState>,
    Json(req): Json<CreateProfileRequest>,
) -> Result<(StatusCode, Json<TeacherProfile>), AppError> {
    if req.profile.display_name.trim().is_empty() {
        return Err(AppError::Validation(
            "display_name cannot be empty".to_string(),
        ));
    }
    let profile = state
        .profile_store
        .create_profile(req.user_id, &req.profile)
        .await?;
    state.profiles.put(profile.clone()).await;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// PATCH /api/v1/profile
///
/// Partial update of name, course, gender, premium flag and credential override.
pub async fn handle_update_profile(
    State(state): State<AppState>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<TeacherProfile>, AppError> {
    if req
        .update
        .display_name
        .as_deref()
        .is_some_and(|n| n.trim().is_empty())
    {
        return Err(AppError::Validation(
            "display_name cannot be empty".to_string(),
        ));
    }

    let mut profile = state
        .profiles
        .get_or_load(req.user_id, state.profile_store.as_ref())
        .await?;

    state
        .profile_store
        .update_profile(req.user_id, &req.update)
        .await?;

    profile.apply(&req.update);
    state.profiles.put(profile.clone()).await;
    Ok(Json(profile))
}

/// DELETE /api/v1/profile/session
///
/// Called by the client when the signed-in account changes or signs out.
pub async fn handle_end_session(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> StatusCode {
    state.profiles.evict(params.user_id).await;
    state.selections.discard(params.user_id).await;
    StatusCode::NO_CONTENT
}
