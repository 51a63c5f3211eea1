// Teacher profile: persistence, per-account cache, and HTTP handlers.
// Authentication itself is delegated to the hosting identity provider.

pub mod cache;
pub mod handlers;
pub mod store;
