//! Open evaluation selections, one per account, held in memory while the
//! teacher picks gradients and comments. Never persisted.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::evaluation::selection::{EvaluationSelection, SelectionError, SelectionScope};

#[derive(Clone, Default)]
pub struct SelectionDrafts {
    drafts: Arc<RwLock<HashMap<Uuid, EvaluationSelection>>>,
}

impl SelectionDrafts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the account's selection on `scope`. Earlier choices survive only
    /// if the scope is unchanged; the flag reports whether they were dropped.
    pub async fn open(
        &self,
        account_id: Uuid,
        scope: SelectionScope,
    ) -> (EvaluationSelection, bool) {
        let mut drafts = self.drafts.write().await;
        let selection = drafts
            .entry(account_id)
            .or_insert_with(|| EvaluationSelection::new(scope));
        let discarded = selection.rescope(scope);
        if discarded {
            debug!("Discarded selection of account {account_id} on scope change");
        }
        (selection.clone(), discarded)
    }

    pub async fn current(&self, account_id: Uuid) -> Option<EvaluationSelection> {
        self.drafts.read().await.get(&account_id).cloned()
    }

    /// Applies `edit` to the account's open selection, provided it is still on
    /// `scope`. A failed edit leaves the selection untouched.
    pub async fn edit<R>(
        &self,
        account_id: Uuid,
        scope: SelectionScope,
        edit: impl FnOnce(&mut EvaluationSelection) -> Result<R, SelectionError>,
    ) -> Result<(R, EvaluationSelection), AppError> {
        let mut drafts = self.drafts.write().await;
        let selection = drafts
            .get_mut(&account_id)
            .filter(|s| s.scope() == scope)
            .ok_or_else(|| AppError::NotFound("No open selection for this scope".to_string()))?;

        let mut edited = selection.clone();
        let outcome = edit(&mut edited)?;
        *selection = edited.clone();
        Ok((outcome, edited))
    }

    pub async fn discard(&self, account_id: Uuid) {
        self.drafts.write().await.remove(&account_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::evaluation::selection::MAX_COMMENTS_PER_BLOCK;
    use crate::models::catalog::{Block, Comment, Term};

    fn scope(term: Term) -> SelectionScope {
        SelectionScope {
            student_id: Uuid::nil(),
            subject_id: Uuid::nil(),
            term,
        }
    }

    fn block() -> Block {
        Block {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            subject_id: Uuid::nil(),
            name: "Reading".to_string(),
            trimesters: vec![1, 2],
            created_at: Utc::now(),
        }
    }

    fn comment(block_id: Uuid) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            block_id,
            tag: "c".to_string(),
            text: "Reads fluently".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_reopening_same_scope_keeps_choices() {
        let drafts = SelectionDrafts::new();
        let account = Uuid::new_v4();
        let b = block();
        let c = comment(b.id);

        drafts.open(account, scope(Term::First)).await;
        drafts
            .edit(account, scope(Term::First), |s| s.toggle_comment(&b, &c))
            .await
            .unwrap();

        let (selection, discarded) = drafts.open(account, scope(Term::First)).await;
        assert!(!discarded);
        assert_eq!(selection.get(b.id).unwrap().comment_ids, vec![c.id]);
    }

    #[tokio::test]
    async fn test_scope_change_discards_choices() {
        let drafts = SelectionDrafts::new();
        let account = Uuid::new_v4();
        let b = block();
        let c = comment(b.id);

        drafts.open(account, scope(Term::First)).await;
        drafts
            .edit(account, scope(Term::First), |s| s.add_comment(&b, &c))
            .await
            .unwrap();

        let (selection, discarded) = drafts.open(account, scope(Term::Second)).await;
        assert!(discarded);
        assert!(selection.get(b.id).is_none());
    }

    #[tokio::test]
    async fn test_edit_on_stale_scope_is_refused() {
        let drafts = SelectionDrafts::new();
        let account = Uuid::new_v4();
        let b = block();

        drafts.open(account, scope(Term::Second)).await;
        let result = drafts
            .edit(account, scope(Term::First), |s| {
                s.clear_gradient(b.id);
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejected_edit_leaves_selection_unchanged() {
        let drafts = SelectionDrafts::new();
        let account = Uuid::new_v4();
        let b = block();
        let comments: Vec<_> = (0..=MAX_COMMENTS_PER_BLOCK).map(|_| comment(b.id)).collect();

        drafts.open(account, scope(Term::First)).await;
        for c in &comments[..MAX_COMMENTS_PER_BLOCK] {
            drafts
                .edit(account, scope(Term::First), |s| s.add_comment(&b, c))
                .await
                .unwrap();
        }
        let result = drafts
            .edit(account, scope(Term::First), |s| {
                s.remove_comment(b.id, comments[0].id);
                s.add_comment(&b, &comments[MAX_COMMENTS_PER_BLOCK])?;
                s.add_comment(&b, &comments[0])
            })
            .await;
        assert!(result.is_err());

        let current = drafts.current(account).await.unwrap();
        assert_eq!(
            current.get(b.id).unwrap().comment_ids,
            comments[..MAX_COMMENTS_PER_BLOCK]
                .iter()
                .map(|c| c.id)
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_discard_closes_selection() {
        let drafts = SelectionDrafts::new();
        let account = Uuid::new_v4();
        drafts.open(account, scope(Term::Third)).await;
        drafts.discard(account).await;
        assert!(drafts.current(account).await.is_none());
    }
}
