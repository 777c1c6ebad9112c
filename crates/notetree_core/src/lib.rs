//! Core engine for notetree: an ordered folder/document hierarchy kept in
//! sync with a flat document store.
//! This crate is the single source of truth for tree invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;
pub mod tree;
pub mod view;

pub use config::{load_config, ConfigError, EngineConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::node::{NodeId, NodeKind, NodeRecord, ValidationError, DEFAULT_FOLDER_COLOR};
pub use model::postit::PostIt;
pub use service::{
    DocumentPatch, FolderPatch, NewDocument, NewFolder, PostItError, PostItService,
    ScratchpadError, ScratchpadService, SessionError, SyncSession, SyncState,
};
pub use store::{DocumentStore, MemoryStore, SqliteStore, StoreError, StoreResult};
pub use tree::{build_forest, Forest, MoveRejection, Node, OrphanReason, RecoveredOrphan};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
