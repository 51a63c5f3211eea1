use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::evaluation::drafts::SelectionDrafts;
use crate::llm_client::TextGenerator;
use crate::profile::cache::ProfileCache;
use crate::profile::store::ProfileStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Text generator behind the report orchestrator. Default: `LlmClient`.
    pub llm: Arc<dyn TextGenerator>,
    pub profile_store: Arc<dyn ProfileStore>,
    /// Profiles keyed by account id; refetched only for an unseen id.
    pub profiles: ProfileCache,
    /// Open evaluation selections keyed by account id.
    pub selections: SelectionDrafts,
    pub config: Config,
}
