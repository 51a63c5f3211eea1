// Rubric catalog: students, subjects, blocks, gradients and comments owned by
// one teacher account. Deleting a subject or block cascades explicitly through
// a DeletionPlan rather than relying on database triggers.

pub mod cascade;
pub mod handlers;
pub mod store;
