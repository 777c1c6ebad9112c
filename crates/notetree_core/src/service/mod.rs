//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into use-case level APIs.
//! - Keep front ends decoupled from storage details.

pub mod postit_service;
pub mod scratchpad_service;
pub mod session;

pub use postit_service::{PostItError, PostItService};
pub use scratchpad_service::{ScratchpadError, ScratchpadService};
pub use session::{
    DocumentPatch, FolderPatch, NewDocument, NewFolder, SessionError, SyncSession, SyncState,
};
