//! Profile persistence — the `ProfileStore` seam used by the report orchestrator.
//!
//! `PgProfileStore` is the production backend; tests supply their own.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::{NewProfile, ProfileRow, ProfileUpdate, TeacherProfile};

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load_profile(&self, id: Uuid) -> Result<Option<TeacherProfile>, AppError>;

    async fn create_profile(&self, id: Uuid, profile: &NewProfile)
        -> Result<TeacherProfile, AppError>;

    /// Partial update; `None` fields are left as stored.
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<(), AppError>;
}

pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn load_profile(&self, id: Uuid) -> Result<Option<TeacherProfile>, AppError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT id, email, display_name, current_course, gender, is_premium,
                   usage_date, usage_count, llm_api_key
            FROM teacher_profiles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(TeacherProfile::from))
    }

    async fn create_profile(
        &self,
        id: Uuid,
        profile: &NewProfile,
    ) -> Result<TeacherProfile, AppError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            INSERT INTO teacher_profiles (id, email, display_name, current_course, gender)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            RETURNING id, email, display_name, current_course, gender, is_premium,
                      usage_date, usage_count, llm_api_key
            "#,
        )
        .bind(id)
        .bind(&profile.email)
        .bind(&profile.display_name)
        .bind(profile.current_course)
        .bind(profile.gender)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::Validation(format!("Profile {id} already exists")))?;

        info!("Created profile for account {id}");
        Ok(TeacherProfile::from(row))
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<(), AppError> {
        if update.is_empty() {
            return Ok(());
        }

        let llm_api_key = update.llm_api_key.as_deref().map(str::trim);

        let result = sqlx::query(
            r#"
            UPDATE teacher_profiles SET
                display_name   = COALESCE($2, display_name),
                current_course = COALESCE($3, current_course),
                gender         = COALESCE($4, gender),
                is_premium     = COALESCE($5, is_premium),
                llm_api_key    = CASE WHEN $6::text IS NULL THEN llm_api_key
                                      ELSE NULLIF($6, '') END,
                usage_date     = COALESCE($7, usage_date),
                usage_count    = COALESCE($8, usage_count)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.display_name.as_deref())
        .bind(update.current_course)
        .bind(update.gender)
        .bind(update.is_premium)
        .bind(llm_api_key)
        .bind(update.daily_usage.map(|u| u.date))
        .bind(update.daily_usage.map(|u| u.count as i32))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Profile {id} not found")));
        }
        Ok(())
    }
}
