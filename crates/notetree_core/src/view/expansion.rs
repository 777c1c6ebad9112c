//! Persisted folder expansion state.
//!
//! # Invariants
//! - Unknown ids are collapsed.
//! - A missing, unreadable or corrupt state file loads as empty state.

use super::{ViewError, ViewResult};
use crate::tree::Forest;
use log::{info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// `folder id -> expanded` map, optionally backed by a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionState {
    path: Option<PathBuf>,
    entries: BTreeMap<String, bool>,
}

impl ExpansionState {
    /// State that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads state from `path`; falls back to empty state on any read or
    /// parse failure. Later `save` calls write back to `path`.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<BTreeMap<String, bool>>(&text) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!("event=expansion_load module=view status=corrupt error={err}");
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                warn!("event=expansion_load module=view status=unreadable error={err}");
                BTreeMap::new()
            }
        };
        info!(
            "event=expansion_load module=view status=ok entries={}",
            entries.len()
        );
        Self {
            path: Some(path),
            entries,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.entries.get(id).copied().unwrap_or(false)
    }

    pub fn set_expanded(&mut self, id: &str, expanded: bool) {
        self.entries.insert(id.to_string(), expanded);
    }

    /// Flips `id` and returns the new value.
    pub fn toggle(&mut self, id: &str) -> bool {
        let expanded = !self.is_expanded(id);
        self.set_expanded(id, expanded);
        expanded
    }

    /// Drops entries for folders no longer present in `forest`.
    pub fn retain_known(&mut self, forest: &Forest) {
        self.entries
            .retain(|id, _| forest.find(id).is_some_and(|node| node.is_folder()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the state file. A no-op for in-memory state.
    pub fn save(&self) -> ViewResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ViewError::Io)?;
        }
        let text = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(path, text).map_err(ViewError::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ExpansionState;

    #[test]
    fn toggle_flips_from_collapsed() {
        let mut state = ExpansionState::in_memory();
        assert!(!state.is_expanded("f"));
        assert!(state.toggle("f"));
        assert!(state.is_expanded("f"));
        assert!(!state.toggle("f"));
        assert!(state.save().is_ok());
    }
}
