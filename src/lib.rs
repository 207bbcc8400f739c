pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod directory;
pub mod engine;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod policy;
pub mod store;
pub mod validate;

use std::sync::Arc;

use directory::MemberDirectory;
use engine::ApprovalEngine;
use notify::Notifier;
use store::Store;

/// Shared per-process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub engine: ApprovalEngine,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, site_url: impl Into<String>) -> Self {
        AppState {
            engine: ApprovalEngine::new(store.clone(), notifier, site_url),
            store,
        }
    }

    pub fn directory(&self) -> &MemberDirectory {
        self.engine.directory()
    }
}
