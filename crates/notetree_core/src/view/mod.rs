//! Presentation helpers over a published forest.
//!
//! # Responsibility
//! - Persist per-folder expansion flags.
//! - Project a forest into display rows with depth levels.
//!
//! # Invariants
//! - The engine never depends on this module.

pub mod display;
pub mod expansion;

pub use display::{project_forest, visible_rows, DisplayNode};
pub use expansion::ExpansionState;

use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ViewResult<T> = Result<T, ViewError>;

#[derive(Debug)]
pub enum ViewError {
    Io(std::io::Error),
    Serialize(serde_json::Error),
}

impl Display for ViewError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "expansion state I/O failed: {err}"),
            Self::Serialize(err) => write!(f, "expansion state encoding failed: {err}"),
        }
    }
}

impl Error for ViewError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Serialize(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for ViewError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialize(value)
    }
}
