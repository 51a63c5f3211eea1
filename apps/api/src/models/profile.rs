use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::student::{Course, Gender};

/// Report generations used on a given calendar day.
/// Only meaningful while `date` is today; a stale date counts as zero.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeacherProfile {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    /// Default course for new students.
    pub current_course: Course,
    pub gender: Gender,
    pub is_premium: bool,
    pub daily_usage: Option<DailyUsage>,
    /// Per-account override of the generation credential. Never echoed back.
    #[serde(skip_serializing, default)]
    pub llm_api_key: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProfileRow {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub current_course: Course,
    pub gender: Gender,
    pub is_premium: bool,
    pub usage_date: Option<NaiveDate>,
    pub usage_count: i32,
    pub llm_api_key: Option<String>,
}

impl From<ProfileRow> for TeacherProfile {
    fn from(row: ProfileRow) -> Self {
        let daily_usage = row.usage_date.map(|date| DailyUsage {
            date,
            count: row.usage_count.max(0) as u32,
        });
        TeacherProfile {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            current_course: row.current_course,
            gender: row.gender,
            is_premium: row.is_premium,
            daily_usage,
            llm_api_key: row.llm_api_key.filter(|k| !k.trim().is_empty()),
        }
    }
}

/// Fields supplied when an account first creates its profile.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProfile {
    pub email: String,
    pub display_name: String,
    pub current_course: Course,
    pub gender: Gender,
}

/// Partial profile update. `None` fields are left untouched.
///
/// `daily_usage` cannot be set from a request body: it is advanced only by
/// the report orchestrator after a successful generation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub current_course: Option<Course>,
    pub gender: Option<Gender>,
    pub is_premium: Option<bool>,
    /// An empty string clears the override.
    pub llm_api_key: Option<String>,
    #[serde(skip)]
    pub daily_usage: Option<DailyUsage>,
}

impl ProfileUpdate {
    pub fn usage(usage: DailyUsage) -> Self {
        ProfileUpdate {
            daily_usage: Some(usage),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.current_course.is_none()
            && self.gender.is_none()
            && self.is_premium.is_none()
            && self.llm_api_key.is_none()
            && self.daily_usage.is_none()
    }
}

impl TeacherProfile {
    /// Applies a partial update in memory, mirroring what the store persists.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(name) = &update.display_name {
            self.display_name = name.clone();
        }
        if let Some(course) = update.current_course {
            self.current_course = course;
        }
        if let Some(gender) = update.gender {
            self.gender = gender;
        }
        if let Some(premium) = update.is_premium {
            self.is_premium = premium;
        }
        if let Some(key) = &update.llm_api_key {
            self.llm_api_key = Some(key.trim().to_string()).filter(|k| !k.is_empty());
        }
        if let Some(usage) = update.daily_usage {
            self.daily_usage = Some(usage);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> TeacherProfile {
        TeacherProfile {
            id: Uuid::new_v4(),
            email: "mestra@escola.cat".to_string(),
            display_name: "Marta".to_string(),
            current_course: Course::Third,
            gender: Gender::Female,
            is_premium: false,
            daily_usage: None,
            llm_api_key: Some("sk-secret".to_string()),
        }
    }

    #[test]
    fn test_api_key_is_never_serialized() {
        let json = serde_json::to_value(profile()).unwrap();
        assert!(json.get("llm_api_key").is_none());
        assert_eq!(json["current_course"], "3r");
    }

    #[test]
    fn test_request_body_cannot_set_daily_usage() {
        let update: ProfileUpdate = serde_json::from_value(serde_json::json!({
            "display_name": "Marta P.",
            "daily_usage": {"date": "2024-01-01", "count": 0}
        }))
        .unwrap();
        assert!(update.daily_usage.is_none());
        assert_eq!(update.display_name.as_deref(), Some("Marta P."));
    }

    #[test]
    fn test_apply_leaves_unset_fields_untouched() {
        let mut p = profile();
        p.apply(&ProfileUpdate {
            is_premium: Some(true),
            ..Default::default()
        });
        assert!(p.is_premium);
        assert_eq!(p.display_name, "Marta");
        assert_eq!(p.llm_api_key.as_deref(), Some("sk-secret"));
    }

    #[test]
    fn test_apply_empty_key_clears_override() {
        let mut p = profile();
        p.apply(&ProfileUpdate {
            llm_api_key: Some("  ".to_string()),
            ..Default::default()
        });
        assert!(p.llm_api_key.is_none());
    }

    #[test]
    fn test_row_without_usage_date_has_no_usage() {
        let row = ProfileRow {
            id: Uuid::new_v4(),
            email: "a@b.c".to_string(),
            display_name: "A".to_string(),
            current_course: Course::First,
            gender: Gender::Male,
            is_premium: false,
            usage_date: None,
            usage_count: 3,
            llm_api_key: Some(String::new()),
        };
        let p = TeacherProfile::from(row);
        assert!(p.daily_usage.is_none());
        assert!(p.llm_api_key.is_none());
    }
}
