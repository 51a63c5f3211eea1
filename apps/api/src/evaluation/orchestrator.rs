//! Report orchestration — the only path from a rubric selection to a paid
//! generation call.
//!
//! Order for one request: admission check → compile prompt → generate →
//! record usage → persist usage. Usage is counted only after the generator
//! returned a usable report; a dropped (cancelled) future never reaches the
//! recording step.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::evaluation::prompts::{compile_prompt, PromptInput};
use crate::evaluation::quota::{check_admission, record_usage, DAILY_LIMIT};
use crate::evaluation::selection::EvaluationSelection;
use crate::llm_client::{LlmError, TextGenerator};
use crate::models::catalog::{Block, Comment, Gradient, Subject, Term};
use crate::models::profile::{ProfileUpdate, TeacherProfile};
use crate::models::student::Student;
use crate::profile::store::ProfileStore;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Daily limit of {limit} reports reached")]
    QuotaExceeded { limit: u32 },

    /// The prompt is kept so the caller can inspect it or retry.
    #[error("Report generation failed: {message}")]
    GenerationFailed { message: String, prompt: String },
}

/// Entities and choices for one (student, subject, term) report.
pub struct ReportRequest<'a> {
    pub student: &'a Student,
    pub subject: &'a Subject,
    pub term: Term,
    /// Blocks of `subject` active in `term`, in display order.
    pub blocks: &'a [Block],
    pub gradients: &'a [Gradient],
    pub comments: &'a [Comment],
    pub selection: &'a EvaluationSelection,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedReport {
    pub report: String,
    pub prompt: String,
    /// Profile after the usage advance, whether or not it was persisted.
    pub profile: TeacherProfile,
    /// False when the usage advance could not be written back.
    pub usage_persisted: bool,
}

pub async fn generate_report(
    generator: &dyn TextGenerator,
    profiles: &dyn ProfileStore,
    request: &ReportRequest<'_>,
    profile: &TeacherProfile,
    today: NaiveDate,
) -> Result<GeneratedReport, ReportError> {
    // Step 1: admission
    if !check_admission(profile, today) {
        info!("Quota exhausted for account {} on {today}", profile.id);
        return Err(ReportError::QuotaExceeded { limit: DAILY_LIMIT });
    }

    // Step 2: prompt
    let prompt = compile_prompt(&PromptInput {
        student: request.student,
        subject: request.subject,
        term: request.term,
        blocks: request.blocks,
        gradients: request.gradients,
        comments: request.comments,
        selection: request.selection,
        teacher_gender: profile.gender,
    });

    // Step 3: generation
    let report = match generator
        .generate(&prompt, profile.llm_api_key.as_deref())
        .await
    {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => return Err(generation_failed(LlmError::EmptyContent, prompt)),
        Err(e) => return Err(generation_failed(e, prompt)),
    };

    // Step 4: usage, only after a confirmed report
    let updated = record_usage(profile.clone(), today);
    let usage_persisted = match updated.daily_usage {
        Some(usage) if updated != *profile => {
            match profiles
                .update_profile(updated.id, &ProfileUpdate::usage(usage))
                .await
            {
                Ok(()) => true,
                Err(e) => {
                    error!(
                        "Report generated for account {} but usage could not be persisted: {e}",
                        updated.id
                    );
                    false
                }
            }
        }
        _ => true,
    };

    info!(
        "Generated report for student {} ({} blocks) on account {}",
        request.student.id,
        request.blocks.len(),
        updated.id
    );

    Ok(GeneratedReport {
        report,
        prompt,
        profile: updated,
        usage_persisted,
    })
}

fn generation_failed(e: LlmError, prompt: String) -> ReportError {
    warn!("Report generation failed: {e}");
    ReportError::GenerationFailed {
        message: e.to_string(),
        prompt,
    }
}
