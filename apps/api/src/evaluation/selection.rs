//! Evaluation Selection — the teacher's in-progress choices for one
//! (student, subject, term): one gradient and up to three comments per block.
//!
//! Ephemeral: never persisted, discarded as soon as the scope changes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::models::catalog::{Block, Comment, Gradient, Term};

/// Hard cap on comments chosen for a single block.
pub const MAX_COMMENTS_PER_BLOCK: usize = 3;

#[derive(Debug, Error, PartialEq)]
pub enum SelectionError {
    #[error("block {block_id} already has {} comments selected", MAX_COMMENTS_PER_BLOCK)]
    TooManyComments { block_id: Uuid },

    #[error("{kind} {item_id} does not belong to block {block_id}")]
    ForeignReference {
        kind: &'static str,
        item_id: Uuid,
        block_id: Uuid,
    },

    #[error("block {0} is not evaluated for this subject and term")]
    UnknownBlock(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionScope {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub term: Term,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockSelection {
    pub gradient_id: Option<Uuid>,
    /// Selection order is preserved into the compiled prompt.
    pub comment_ids: Vec<Uuid>,
}

/// One block's choices as sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionEntry {
    pub block_id: Uuid,
    pub gradient_id: Option<Uuid>,
    #[serde(default)]
    pub comment_ids: Vec<Uuid>,
}

/// Which block each referenced rubric item actually lives under, looked up by
/// id across every block. Ids absent here no longer exist.
#[derive(Debug, Clone, Default)]
pub struct ItemPlacements {
    pub gradients: HashMap<Uuid, Uuid>,
    pub comments: HashMap<Uuid, Uuid>,
}

/// Gradient and comment ids referenced by `entries`, in that order.
pub fn referenced_ids(entries: &[SelectionEntry]) -> (Vec<Uuid>, Vec<Uuid>) {
    let gradient_ids = entries.iter().filter_map(|e| e.gradient_id).collect();
    let comment_ids = entries
        .iter()
        .flat_map(|e| e.comment_ids.iter().copied())
        .collect();
    (gradient_ids, comment_ids)
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationSelection {
    scope: SelectionScope,
    blocks: HashMap<Uuid, BlockSelection>,
}

impl EvaluationSelection {
    pub fn new(scope: SelectionScope) -> Self {
        Self {
            scope,
            blocks: HashMap::new(),
        }
    }

    pub fn scope(&self) -> SelectionScope {
        self.scope
    }

    /// Switches to a new (student, subject, term). Returns true if the
    /// previous choices were discarded.
    pub fn rescope(&mut self, scope: SelectionScope) -> bool {
        if self.scope == scope {
            return false;
        }
        self.scope = scope;
        self.blocks.clear();
        true
    }

    pub fn get(&self, block_id: Uuid) -> Option<&BlockSelection> {
        self.blocks.get(&block_id)
    }

    pub fn select_gradient(
        &mut self,
        block: &Block,
        gradient: &Gradient,
    ) -> Result<(), SelectionError> {
        if gradient.block_id != block.id {
            return Err(SelectionError::ForeignReference {
                kind: "gradient",
                item_id: gradient.id,
                block_id: block.id,
            });
        }
        self.blocks.entry(block.id).or_default().gradient_id = Some(gradient.id);
        Ok(())
    }

    pub fn clear_gradient(&mut self, block_id: Uuid) {
        if let Some(selection) = self.blocks.get_mut(&block_id) {
            selection.gradient_id = None;
        }
    }

    /// Adds a comment to a block. Re-adding a selected comment is a no-op;
    /// a fourth distinct comment is refused and leaves the state unchanged.
    pub fn add_comment(&mut self, block: &Block, comment: &Comment) -> Result<(), SelectionError> {
        if comment.block_id != block.id {
            return Err(SelectionError::ForeignReference {
                kind: "comment",
                item_id: comment.id,
                block_id: block.id,
            });
        }
        self.push_comment_id(block.id, comment.id)
    }

    pub fn remove_comment(&mut self, block_id: Uuid, comment_id: Uuid) {
        if let Some(selection) = self.blocks.get_mut(&block_id) {
            selection.comment_ids.retain(|id| *id != comment_id);
        }
    }

    /// Selects the comment if absent, deselects it if present.
    /// Returns whether the comment is selected afterwards.
    pub fn toggle_comment(
        &mut self,
        block: &Block,
        comment: &Comment,
    ) -> Result<bool, SelectionError> {
        let selected = self
            .get(block.id)
            .is_some_and(|s| s.comment_ids.contains(&comment.id));
        if selected {
            self.remove_comment(block.id, comment.id);
            return Ok(false);
        }
        self.add_comment(block, comment)?;
        Ok(true)
    }

    /// Choices as client entries, ordered by block id.
    pub fn entries(&self) -> Vec<SelectionEntry> {
        let mut entries: Vec<SelectionEntry> = self
            .blocks
            .iter()
            .map(|(block_id, chosen)| SelectionEntry {
                block_id: *block_id,
                gradient_id: chosen.gradient_id,
                comment_ids: chosen.comment_ids.clone(),
            })
            .collect();
        entries.sort_by_key(|e| e.block_id);
        entries
    }

    /// Builds a selection from client entries against the blocks evaluated in
    /// this scope and their rubric items.
    ///
    /// Ids that exist under another block (per `placements`) are rejected. Ids
    /// that no longer exist at all are kept: the prompt compiler degrades them
    /// to placeholder text.
    pub fn from_entries(
        scope: SelectionScope,
        entries: &[SelectionEntry],
        blocks: &[Block],
        gradients: &[Gradient],
        comments: &[Comment],
        placements: &ItemPlacements,
    ) -> Result<Self, SelectionError> {
        let mut selection = Self::new(scope);

        for entry in entries {
            let block = blocks
                .iter()
                .find(|b| b.id == entry.block_id)
                .ok_or(SelectionError::UnknownBlock(entry.block_id))?;

            if let Some(gradient_id) = entry.gradient_id {
                match gradients.iter().find(|g| g.id == gradient_id) {
                    Some(gradient) => selection.select_gradient(block, gradient)?,
                    None => {
                        check_placement("gradient", gradient_id, block.id, &placements.gradients)?;
                        debug!("Keeping dangling gradient {gradient_id} for block {}", block.id);
                        selection.blocks.entry(block.id).or_default().gradient_id =
                            Some(gradient_id);
                    }
                }
            }

            for &comment_id in &entry.comment_ids {
                match comments.iter().find(|c| c.id == comment_id) {
                    Some(comment) => selection.add_comment(block, comment)?,
                    None => {
                        check_placement("comment", comment_id, block.id, &placements.comments)?;
                        debug!("Keeping dangling comment {comment_id} for block {}", block.id);
                        selection.push_comment_id(block.id, comment_id)?;
                    }
                }
            }
        }

        Ok(selection)
    }

    fn push_comment_id(&mut self, block_id: Uuid, comment_id: Uuid) -> Result<(), SelectionError> {
        let selection = self.blocks.entry(block_id).or_default();
        if selection.comment_ids.contains(&comment_id) {
            return Ok(());
        }
        if selection.comment_ids.len() >= MAX_COMMENTS_PER_BLOCK {
            return Err(SelectionError::TooManyComments { block_id });
        }
        selection.comment_ids.push(comment_id);
        Ok(())
    }
}

fn check_placement(
    kind: &'static str,
    item_id: Uuid,
    block_id: Uuid,
    placements: &HashMap<Uuid, Uuid>,
) -> Result<(), SelectionError> {
    match placements.get(&item_id) {
        Some(owner_block) if *owner_block != block_id => Err(SelectionError::ForeignReference {
            kind,
            item_id,
            block_id,
        }),
        _ => Ok(()),
    }
}
