//! Domain records for the workspace hierarchy and free-floating notes.
//!
//! # Responsibility
//! - Define the flat records decoded from store collections.
//! - Keep field names and validation rules in one place.
//!
//! # Invariants
//! - Records are plain data; hierarchy is derived by `tree`, never stored.

pub mod node;
pub mod postit;
