use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

/// One of the three school trimesters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub enum Term {
    First,
    Second,
    Third,
}

#[derive(Debug, Error, PartialEq)]
pub enum TermError {
    #[error("term must be 1, 2 or 3 (got {0})")]
    OutOfRange(i64),

    #[error("a block must be evaluated in at least one term")]
    EmptySet,
}

impl Term {
    pub fn number(self) -> u8 {
        match self {
            Term::First => 1,
            Term::Second => 2,
            Term::Third => 3,
        }
    }

    /// Catalan ordinal used in the prompt header ("1r", "2n", "3r").
    pub fn ordinal(self) -> &'static str {
        match self {
            Term::First => "1r",
            Term::Second => "2n",
            Term::Third => "3r",
        }
    }

    /// Validates a trimester set for storage: non-empty, in range, sorted and deduplicated.
    pub fn normalize_set(raw: &[i16]) -> Result<Vec<i16>, TermError> {
        let mut terms = raw
            .iter()
            .map(|&t| Term::try_from(t as i64).map(|t| t.number() as i16))
            .collect::<Result<Vec<_>, _>>()?;
        if terms.is_empty() {
            return Err(TermError::EmptySet);
        }
        terms.sort_unstable();
        terms.dedup();
        Ok(terms)
    }
}

impl TryFrom<i64> for Term {
    type Error = TermError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Term::First),
            2 => Ok(Term::Second),
            3 => Ok(Term::Third),
            other => Err(TermError::OutOfRange(other)),
        }
    }
}

impl TryFrom<u8> for Term {
    type Error = TermError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Term::try_from(value as i64)
    }
}

impl From<Term> for u8 {
    fn from(term: Term) -> u8 {
        term.number()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subject {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A gradeable unit of a subject. Exclusively owned by its subject.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Block {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub subject_id: Uuid,
    pub name: String,
    /// Term numbers (1..=3) this block is evaluated in. Never empty.
    pub trimesters: Vec<i16>,
    pub created_at: DateTime<Utc>,
}

impl Block {
    pub fn is_active_in(&self, term: Term) -> bool {
        self.trimesters.contains(&(term.number() as i16))
    }
}

/// One rung of a block's achievement rubric.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Gradient {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub block_id: Uuid,
    pub tag: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub block_id: Uuid,
    pub tag: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_deserializes_from_number() {
        let term: Term = serde_json::from_str("2").unwrap();
        assert_eq!(term, Term::Second);
        assert_eq!(serde_json::to_string(&Term::Third).unwrap(), "3");
    }

    #[test]
    fn test_term_rejects_out_of_range() {
        assert!(serde_json::from_str::<Term>("0").is_err());
        assert!(serde_json::from_str::<Term>("4").is_err());
    }

    #[test]
    fn test_normalize_set_sorts_and_dedups() {
        assert_eq!(Term::normalize_set(&[3, 1, 3]).unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_normalize_set_rejects_empty() {
        assert_eq!(Term::normalize_set(&[]), Err(TermError::EmptySet));
    }

    #[test]
    fn test_normalize_set_rejects_out_of_range() {
        assert_eq!(Term::normalize_set(&[1, 5]), Err(TermError::OutOfRange(5)));
    }

    #[test]
    fn test_block_active_in_term() {
        let block = Block {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            subject_id: Uuid::new_v4(),
            name: "Numeracy".to_string(),
            trimesters: vec![1, 3],
            created_at: Utc::now(),
        };
        assert!(block.is_active_in(Term::First));
        assert!(!block.is_active_in(Term::Second));
        assert!(block.is_active_in(Term::Third));
    }
}
