//! Axum route handlers for report generation and the open evaluation selection.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::catalog::store;
use crate::errors::AppError;
use crate::evaluation::orchestrator::{generate_report, ReportRequest};
use crate::evaluation::quota::{check_admission, quota_status, QuotaStatus, DAILY_LIMIT};
use crate::evaluation::selection::{
    referenced_ids, EvaluationSelection, ItemPlacements, SelectionEntry, SelectionError,
    SelectionScope,
};
use crate::models::catalog::{Block, Comment, Gradient, Term};
use crate::models::profile::DailyUsage;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateReportRequest {
    pub user_id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub term: Term,
    /// Omitted: use the account's open selection for this scope.
    #[serde(default)]
    pub selections: Option<Vec<SelectionEntry>>,
}

#[derive(Debug, Serialize)]
pub struct GenerateReportResponse {
    pub report: String,
    pub prompt: String,
    pub daily_usage: Option<DailyUsage>,
    pub usage_persisted: bool,
}

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct OpenSelectionQuery {
    pub user_id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub term: Term,
}

#[derive(Debug, Deserialize)]
pub struct SelectGradientRequest {
    pub user_id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub term: Term,
    pub block_id: Uuid,
    /// `null` clears the block's gradient.
    pub gradient_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleCommentRequest {
    pub user_id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub term: Term,
    pub block_id: Uuid,
    pub comment_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SelectionResponse {
    pub scope: SelectionScope,
    pub selections: Vec<SelectionEntry>,
    /// True when opening on a new scope dropped earlier choices.
    pub discarded: bool,
}

#[derive(Debug, Serialize)]
pub struct ToggleCommentResponse {
    pub selected: bool,
    #[serde(flatten)]
    pub selection: SelectionResponse,
}

impl SelectionResponse {
    fn new(selection: &EvaluationSelection, discarded: bool) -> Self {
        Self {
            scope: selection.scope(),
            selections: selection.entries(),
            discarded,
        }
    }
}

/// Calendar day used for the quota. Local time, matching the school's day.
fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Blocks of a subject that are evaluated in `term`, in their stored order.
fn blocks_in_term(blocks: Vec<Block>, term: Term) -> Vec<Block> {
    blocks.into_iter().filter(|b| b.is_active_in(term)).collect()
}

/// Loads a block and checks it is part of the selection's subject and term.
async fn block_in_scope(
    state: &AppState,
    owner: Uuid,
    scope: SelectionScope,
    block_id: Uuid,
) -> Result<Block, AppError> {
    let block = store::get_block(&state.db, owner, block_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Block {block_id} not found")))?;
    if block.subject_id != scope.subject_id || !block.is_active_in(scope.term) {
        return Err(SelectionError::UnknownBlock(block_id).into());
    }
    Ok(block)
}

/// Where every gradient and comment referenced by `entries` lives, so ids
/// filed under the wrong block can be told apart from deleted ones.
async fn load_placements(
    state: &AppState,
    entries: &[SelectionEntry],
) -> Result<ItemPlacements, AppError> {
    let (gradient_ids, comment_ids) = referenced_ids(entries);
    Ok(ItemPlacements {
        gradients: store::item_placements::<Gradient>(&state.db, &gradient_ids).await?,
        comments: store::item_placements::<Comment>(&state.db, &comment_ids).await?,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/reports/quota
pub async fn handle_quota(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<QuotaStatus>, AppError> {
    let profile = state
        .profiles
        .get_or_load(params.user_id, state.profile_store.as_ref())
        .await?;
    Ok(Json(quota_status(&profile, today())))
}

/// POST /api/v1/reports/generate
///
/// Loads the rubric for (student, subject, term), validates the selection,
/// and runs the orchestrator: quota check → prompt → LLM → usage advance.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateReportRequest>,
) -> Result<Json<GenerateReportResponse>, AppError> {
    let owner = request.user_id;
    let today = today();

    let profile = state
        .profiles
        .get_or_load(owner, state.profile_store.as_ref())
        .await?;

    // Refused before any catalog reads or selection checks.
    if !check_admission(&profile, today) {
        return Err(AppError::QuotaExceeded { limit: DAILY_LIMIT });
    }

    let student = store::get_student(&state.db, owner, request.student_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Student {} not found", request.student_id)))?;
    let subject = store::get_subject(&state.db, owner, request.subject_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Subject {} not found", request.subject_id)))?;

    let scope = SelectionScope {
        student_id: student.id,
        subject_id: subject.id,
        term: request.term,
    };
    let entries = match request.selections {
        Some(entries) => entries,
        None => state
            .selections
            .current(owner)
            .await
            .filter(|s| s.scope() == scope)
            .map(|s| s.entries())
            .unwrap_or_default(),
    };

    let blocks = blocks_in_term(
        store::list_blocks(&state.db, owner, subject.id, None).await?,
        request.term,
    );
    let block_ids: Vec<Uuid> = blocks.iter().map(|b| b.id).collect();
    let gradients = store::list_items::<Gradient>(&state.db, owner, &block_ids).await?;
    let comments = store::list_items::<Comment>(&state.db, owner, &block_ids).await?;
    let placements = load_placements(&state, &entries).await?;

    let selection = EvaluationSelection::from_entries(
        scope,
        &entries,
        &blocks,
        &gradients,
        &comments,
        &placements,
    )?;

    info!(
        "Generating term {} report for student {} in subject {}",
        request.term.number(),
        student.id,
        subject.id
    );

    let result = generate_report(
        state.llm.as_ref(),
        state.profile_store.as_ref(),
        &ReportRequest {
            student: &student,
            subject: &subject,
            term: request.term,
            blocks: &blocks,
            gradients: &gradients,
            comments: &comments,
            selection: &selection,
        },
        &profile,
        today,
    )
    .await?;

    let daily_usage = result.profile.daily_usage;
    if daily_usage != profile.daily_usage {
        state.profiles.set_usage(owner, daily_usage).await;
    }

    Ok(Json(GenerateReportResponse {
        report: result.report,
        prompt: result.prompt,
        daily_usage,
        usage_persisted: result.usage_persisted,
    }))
}

/// GET /api/v1/selection
///
/// Opens (or reopens) the account's selection for a student, subject and term.
pub async fn handle_open_selection(
    State(state): State<AppState>,
    Query(params): Query<OpenSelectionQuery>,
) -> Result<Json<SelectionResponse>, AppError> {
    let owner = params.user_id;
    if store::get_student(&state.db, owner, params.student_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Student {} not found", params.student_id)));
    }
    if store::get_subject(&state.db, owner, params.subject_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Subject {} not found", params.subject_id)));
    }

    let scope = SelectionScope {
        student_id: params.student_id,
        subject_id: params.subject_id,
        term: params.term,
    };
    let (selection, discarded) = state.selections.open(owner, scope).await;
    Ok(Json(SelectionResponse::new(&selection, discarded)))
}

/// PUT /api/v1/selection/gradient
pub async fn handle_select_gradient(
    State(state): State<AppState>,
    Json(req): Json<SelectGradientRequest>,
) -> Result<Json<SelectionResponse>, AppError> {
    let owner = req.user_id;
    let scope = SelectionScope {
        student_id: req.student_id,
        subject_id: req.subject_id,
        term: req.term,
    };
    let block = block_in_scope(&state, owner, scope, req.block_id).await?;

    let ((), selection) = match req.gradient_id {
        Some(gradient_id) => {
            let gradient = store::get_item::<Gradient>(&state.db, owner, gradient_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Gradient {gradient_id} not found")))?;
            state
                .selections
                .edit(owner, scope, |s| s.select_gradient(&block, &gradient))
                .await?
        }
        None => {
            state
                .selections
                .edit(owner, scope, |s| {
                    s.clear_gradient(block.id);
                    Ok(())
                })
                .await?
        }
    };
    Ok(Json(SelectionResponse::new(&selection, false)))
}

/// POST /api/v1/selection/comments/toggle
///
/// Selects the comment if absent, deselects it if present. A fourth comment
/// on one block is refused with 400.
pub async fn handle_toggle_comment(
    State(state): State<AppState>,
    Json(req): Json<ToggleCommentRequest>,
) -> Result<Json<ToggleCommentResponse>, AppError> {
    let owner = req.user_id;
    let scope = SelectionScope {
        student_id: req.student_id,
        subject_id: req.subject_id,
        term: req.term,
    };
    let block = block_in_scope(&state, owner, scope, req.block_id).await?;
    let comment = store::get_item::<Comment>(&state.db, owner, req.comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", req.comment_id)))?;

    let (selected, selection) = state
        .selections
        .edit(owner, scope, |s| s.toggle_comment(&block, &comment))
        .await?;
    Ok(Json(ToggleCommentResponse {
        selected,
        selection: SelectionResponse::new(&selection, false),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use chrono::Utc;

    fn block(trimesters: Vec<i16>) -> Block {
        Block {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            subject_id: Uuid::new_v4(),
            name: "Reading".to_string(),
            trimesters,
            created_at: Utc::now(),
        }
    }

    fn gradient(block_id: Uuid) -> Gradient {
        Gradient {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            block_id,
            tag: "B".to_string(),
            text: "Reads with growing fluency".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_generate_request_deserialization() {
        let json = serde_json::json!({
            "user_id": Uuid::new_v4(),
            "student_id": Uuid::new_v4(),
            "subject_id": Uuid::new_v4(),
            "term": 2,
            "selections": [
                {"block_id": Uuid::new_v4(), "gradient_id": Uuid::new_v4(), "comment_ids": []},
                {"block_id": Uuid::new_v4(), "gradient_id": null}
            ]
        });
        let request: GenerateReportRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.term, Term::Second);
        let selections = request.selections.unwrap();
        assert_eq!(selections.len(), 2);
        assert!(selections[1].gradient_id.is_none());
        assert!(selections[1].comment_ids.is_empty());
    }

    #[test]
    fn test_generate_request_without_selections_uses_open_selection() {
        let json = serde_json::json!({
            "user_id": Uuid::new_v4(),
            "student_id": Uuid::new_v4(),
            "subject_id": Uuid::new_v4(),
            "term": 1
        });
        let request: GenerateReportRequest = serde_json::from_value(json).unwrap();
        assert!(request.selections.is_none());
    }

    #[test]
    fn test_generate_request_rejects_bad_term() {
        let json = serde_json::json!({
            "user_id": Uuid::new_v4(),
            "student_id": Uuid::new_v4(),
            "subject_id": Uuid::new_v4(),
            "term": 0
        });
        assert!(serde_json::from_value::<GenerateReportRequest>(json).is_err());
    }

    #[test]
    fn test_blocks_in_term_keeps_order_and_drops_inactive() {
        let first_only = block(vec![1]);
        let all_year = block(vec![1, 2, 3]);
        let later = block(vec![2, 3]);
        let kept = blocks_in_term(
            vec![first_only.clone(), all_year.clone(), later.clone()],
            Term::Second,
        );
        let ids: Vec<Uuid> = kept.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![all_year.id, later.id]);
    }

    #[test]
    fn test_gradient_of_block_outside_term_is_rejected() {
        // Only the in-term block and its rubric are loaded; the chosen gradient
        // exists but belongs to a block evaluated in another term.
        let reading = block(vec![1]);
        let writing = block(vec![3]);
        let loaded = blocks_in_term(vec![reading.clone(), writing.clone()], Term::First);
        let foreign = gradient(writing.id);

        let entries = vec![SelectionEntry {
            block_id: reading.id,
            gradient_id: Some(foreign.id),
            comment_ids: vec![],
        }];
        let (gradient_ids, _) = referenced_ids(&entries);
        let stored: HashMap<Uuid, Uuid> = [(foreign.id, foreign.block_id)].into_iter().collect();
        let placements = ItemPlacements {
            gradients: gradient_ids
                .iter()
                .filter_map(|id| stored.get(id).map(|block_id| (*id, *block_id)))
                .collect(),
            comments: HashMap::new(),
        };

        let scope = SelectionScope {
            student_id: Uuid::new_v4(),
            subject_id: reading.subject_id,
            term: Term::First,
        };
        let result =
            EvaluationSelection::from_entries(scope, &entries, &loaded, &[], &[], &placements);
        assert!(matches!(
            result,
            Err(SelectionError::ForeignReference { kind: "gradient", .. })
        ));

        let err: AppError = result.unwrap_err().into();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_toggle_response_flattens_selection() {
        let selection = EvaluationSelection::new(SelectionScope {
            student_id: Uuid::nil(),
            subject_id: Uuid::nil(),
            term: Term::Third,
        });
        let body = serde_json::to_value(ToggleCommentResponse {
            selected: true,
            selection: SelectionResponse::new(&selection, false),
        })
        .unwrap();
        assert_eq!(body["selected"], true);
        assert_eq!(body["scope"]["term"], 3);
        assert!(body["selections"].as_array().unwrap().is_empty());
    }
}
