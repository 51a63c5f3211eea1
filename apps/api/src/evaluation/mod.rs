// Report generation core: evaluation selection, prompt compilation, usage quota,
// and the orchestrator that ties them to the text generator.
// All generation calls go through llm_client::TextGenerator.

pub mod drafts;
pub mod handlers;
pub mod orchestrator;
pub mod prompts;
pub mod quota;
pub mod selection;
