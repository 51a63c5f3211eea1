use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Grammatical gender. Drives agreement in the compiled prompt for both the
/// student and the teacher.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "gender", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

/// Primary-school grade level, ordered from first to sixth.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, sqlx::Type,
)]
#[sqlx(type_name = "course")]
pub enum Course {
    #[serde(rename = "1r")]
    #[sqlx(rename = "1r")]
    First,
    #[serde(rename = "2n")]
    #[sqlx(rename = "2n")]
    Second,
    #[serde(rename = "3r")]
    #[sqlx(rename = "3r")]
    Third,
    #[serde(rename = "4t")]
    #[sqlx(rename = "4t")]
    Fourth,
    #[serde(rename = "5e")]
    #[sqlx(rename = "5e")]
    Fifth,
    #[serde(rename = "6e")]
    #[sqlx(rename = "6e")]
    Sixth,
}

impl Course {
    pub fn label(&self) -> &'static str {
        match self {
            Course::First => "1r",
            Course::Second => "2n",
            Course::Third => "3r",
            Course::Fourth => "4t",
            Course::Fifth => "5e",
            Course::Sixth => "6e",
        }
    }
}

impl std::fmt::Display for Course {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub gender: Gender,
    pub course: Course,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_course_serializes_as_ordinal_label() {
        let json = serde_json::to_string(&Course::Third).unwrap();
        assert_eq!(json, "\"3r\"");
        let back: Course = serde_json::from_str("\"6e\"").unwrap();
        assert_eq!(back, Course::Sixth);
    }

    #[test]
    fn test_courses_are_ordered() {
        assert!(Course::First < Course::Second);
        assert!(Course::Fifth < Course::Sixth);
    }

    #[test]
    fn test_gender_rejects_unknown_value() {
        let result: Result<Gender, _> = serde_json::from_str("\"other\"");
        assert!(result.is_err());
    }
}
