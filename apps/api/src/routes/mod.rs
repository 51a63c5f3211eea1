pub mod health;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::catalog::handlers as catalog;
use crate::evaluation::handlers as reports;
use crate::models::catalog::{Comment, Gradient};
use crate::profile::handlers as profile;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Profile
        .route(
            "/api/v1/profile",
            get(profile::handle_get_profile)
                .post(profile::handle_create_profile)
                .patch(profile::handle_update_profile),
        )
        .route("/api/v1/profile/session", delete(profile::handle_end_session))
        // Reports
        .route("/api/v1/reports/generate", post(reports::handle_generate))
        .route("/api/v1/reports/quota", get(reports::handle_quota))
        // Open evaluation selection
        .route("/api/v1/selection", get(reports::handle_open_selection))
        .route("/api/v1/selection/gradient", put(reports::handle_select_gradient))
        .route(
            "/api/v1/selection/comments/toggle",
            post(reports::handle_toggle_comment),
        )
        // Students
        .route(
            "/api/v1/students",
            get(catalog::handle_list_students).post(catalog::handle_create_student),
        )
        .route(
            "/api/v1/students/:id",
            put(catalog::handle_update_student).delete(catalog::handle_delete_student),
        )
        // Subjects and blocks
        .route(
            "/api/v1/subjects",
            get(catalog::handle_list_subjects).post(catalog::handle_create_subject),
        )
        .route(
            "/api/v1/subjects/:id",
            put(catalog::handle_update_subject).delete(catalog::handle_delete_subject),
        )
        .route("/api/v1/subjects/:id/blocks", get(catalog::handle_list_blocks))
        .route("/api/v1/blocks", post(catalog::handle_create_block))
        .route(
            "/api/v1/blocks/:id",
            put(catalog::handle_update_block).delete(catalog::handle_delete_block),
        )
        // Gradients
        .route(
            "/api/v1/blocks/:id/gradients",
            get(catalog::handle_list_items::<Gradient>),
        )
        .route("/api/v1/gradients", post(catalog::handle_create_item::<Gradient>))
        .route(
            "/api/v1/gradients/:id",
            put(catalog::handle_update_item::<Gradient>)
                .delete(catalog::handle_delete_item::<Gradient>),
        )
        // Comments
        .route(
            "/api/v1/blocks/:id/comments",
            get(catalog::handle_list_items::<Comment>),
        )
        .route("/api/v1/comments", post(catalog::handle_create_item::<Comment>))
        .route(
            "/api/v1/comments/:id",
            put(catalog::handle_update_item::<Comment>)
                .delete(catalog::handle_delete_item::<Comment>),
        )
        .with_state(state)
}
