//! Cascade planning for Subject → Block → {Gradient, Comment}.
//!
//! Pure: given the rows currently owned, computes every id a delete must remove.
//! The store executes the plan inside one transaction.

use serde::Serialize;
use uuid::Uuid;

use crate::models::catalog::{Block, Comment, Gradient};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeletionPlan {
    pub subject_id: Option<Uuid>,
    pub block_ids: Vec<Uuid>,
    pub gradient_ids: Vec<Uuid>,
    pub comment_ids: Vec<Uuid>,
}

impl DeletionPlan {
    pub fn total(&self) -> usize {
        self.subject_id.iter().count()
            + self.block_ids.len()
            + self.gradient_ids.len()
            + self.comment_ids.len()
    }
}

/// Plans deletion of a subject with every block it owns, and their rubric items.
pub fn plan_subject_deletion(
    subject_id: Uuid,
    blocks: &[Block],
    gradients: &[Gradient],
    comments: &[Comment],
) -> DeletionPlan {
    let block_ids: Vec<Uuid> = blocks
        .iter()
        .filter(|b| b.subject_id == subject_id)
        .map(|b| b.id)
        .collect();

    DeletionPlan {
        subject_id: Some(subject_id),
        ..items_of(block_ids, gradients, comments)
    }
}

/// Plans deletion of a single block and its rubric items.
pub fn plan_block_deletion(
    block_id: Uuid,
    gradients: &[Gradient],
    comments: &[Comment],
) -> DeletionPlan {
    items_of(vec![block_id], gradients, comments)
}

fn items_of(block_ids: Vec<Uuid>, gradients: &[Gradient], comments: &[Comment]) -> DeletionPlan {
    let gradient_ids = gradients
        .iter()
        .filter(|g| block_ids.contains(&g.block_id))
        .map(|g| g.id)
        .collect();
    let comment_ids = comments
        .iter()
        .filter(|c| block_ids.contains(&c.block_id))
        .map(|c| c.id)
        .collect();

    DeletionPlan {
        subject_id: None,
        block_ids,
        gradient_ids,
        comment_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn block(subject_id: Uuid) -> Block {
        Block {
            id: Uuid::new_v4(),
            owner_id: Uuid::nil(),
            subject_id,
            name: "block".to_string(),
            trimesters: vec![1, 2, 3],
            created_at: Utc::now(),
        }
    }

    fn gradient(block_id: Uuid) -> Gradient {
        Gradient {
            id: Uuid::new_v4(),
            owner_id: Uuid::nil(),
            block_id,
            tag: "A".to_string(),
            text: "text".to_string(),
            created_at: Utc::now(),
        }
    }

    fn comment(block_id: Uuid) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            owner_id: Uuid::nil(),
            block_id,
            tag: "c".to_string(),
            text: "text".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_subject_plan_covers_every_owned_descendant() {
        let subject = Uuid::new_v4();
        let other_subject = Uuid::new_v4();

        let owned: Vec<Block> = (0..4).map(|_| block(subject)).collect();
        let foreign = block(other_subject);

        let mut gradients = vec![gradient(foreign.id)];
        let mut comments = vec![comment(foreign.id)];
        for b in &owned {
            gradients.extend([gradient(b.id), gradient(b.id)]);
            comments.push(comment(b.id));
        }
        let mut blocks = owned.clone();
        blocks.push(foreign.clone());

        let plan = plan_subject_deletion(subject, &blocks, &gradients, &comments);

        assert_eq!(plan.subject_id, Some(subject));
        assert_eq!(plan.block_ids, owned.iter().map(|b| b.id).collect::<Vec<_>>());
        assert_eq!(plan.gradient_ids.len(), 8);
        assert_eq!(plan.comment_ids.len(), 4);
        assert!(!plan.block_ids.contains(&foreign.id));
        assert!(!plan.gradient_ids.contains(&gradients[0].id));
        assert!(!plan.comment_ids.contains(&comments[0].id));
        assert_eq!(plan.total(), 1 + 4 + 8 + 4);
    }

    #[test]
    fn test_no_orphans_remain_after_subject_plan() {
        let subject = Uuid::new_v4();
        let blocks: Vec<Block> = (0..3).map(|_| block(subject)).collect();
        let gradients: Vec<Gradient> = blocks.iter().map(|b| gradient(b.id)).collect();
        let comments: Vec<Comment> = blocks.iter().map(|b| comment(b.id)).collect();

        let plan = plan_subject_deletion(subject, &blocks, &gradients, &comments);

        let remaining_blocks: Vec<_> = blocks
            .iter()
            .filter(|b| !plan.block_ids.contains(&b.id))
            .collect();
        let orphan_gradients = gradients
            .iter()
            .filter(|g| !plan.gradient_ids.contains(&g.id))
            .filter(|g| !remaining_blocks.iter().any(|b| b.id == g.block_id))
            .count();
        let orphan_comments = comments
            .iter()
            .filter(|c| !plan.comment_ids.contains(&c.id))
            .filter(|c| !remaining_blocks.iter().any(|b| b.id == c.block_id))
            .count();

        assert!(remaining_blocks.is_empty());
        assert_eq!(orphan_gradients, 0);
        assert_eq!(orphan_comments, 0);
    }

    #[test]
    fn test_subject_without_blocks_plans_only_subject() {
        let subject = Uuid::new_v4();
        let plan = plan_subject_deletion(subject, &[], &[], &[]);
        assert_eq!(plan.total(), 1);
    }

    #[test]
    fn test_block_plan_keeps_sibling_items() {
        let subject = Uuid::new_v4();
        let target = block(subject);
        let sibling = block(subject);
        let gradients = vec![gradient(target.id), gradient(sibling.id)];
        let comments = vec![comment(target.id), comment(sibling.id)];

        let plan = plan_block_deletion(target.id, &gradients, &comments);

        assert_eq!(plan.subject_id, None);
        assert_eq!(plan.block_ids, vec![target.id]);
        assert_eq!(plan.gradient_ids, vec![gradients[0].id]);
        assert_eq!(plan.comment_ids, vec![comments[0].id]);
    }
}
