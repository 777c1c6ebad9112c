//! Tree synchronization and ordering engine.
//!
//! # Responsibility
//! - Rebuild an ordered forest from flat folder/document records.
//! - Compute minimal order patches for structural changes.
//! - Validate move/insert destinations against the current forest.
//!
//! # Invariants
//! - Everything here is pure: no store access, no shared state.

pub mod builder;
pub mod forest;
pub mod order;
pub mod validate;

pub use builder::build_forest;
pub use forest::{Forest, Node, OrphanReason, RecoveredOrphan};
pub use order::{compact, reorder, OrderPatch, SiblingEntry};
pub use validate::{available_destinations, validate_move, validate_parent, MoveRejection};
