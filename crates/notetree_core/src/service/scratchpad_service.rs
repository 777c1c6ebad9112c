//! Single auto-saved scratchpad buffer.
//!
//! The buffer lives in `editorContent/current`. Saves merge so that fields
//! written by other clients survive.

use crate::store::{now_epoch_ms, DocumentStore, Fields, StoreError, EDITOR_CONTENT};
use log::{debug, error};
use serde_json::json;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub const SCRATCHPAD_ID: &str = "current";
const CONTENT_FIELD: &str = "content";
const UPDATED_AT_FIELD: &str = "updatedAt";

#[derive(Debug)]
pub enum ScratchpadError {
    Storage(StoreError),
}

impl Display for ScratchpadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "scratchpad storage failed: {err}"),
        }
    }
}

impl Error for ScratchpadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<StoreError> for ScratchpadError {
    fn from(value: StoreError) -> Self {
        Self::Storage(value)
    }
}

pub struct ScratchpadService<S: DocumentStore> {
    store: Arc<S>,
}

impl<S: DocumentStore> ScratchpadService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Stores `content` verbatim and stamps `updatedAt`.
    pub fn save(&self, content: &str) -> Result<(), ScratchpadError> {
        let mut fields = Fields::new();
        fields.insert(CONTENT_FIELD.to_string(), json!(content));
        fields.insert(UPDATED_AT_FIELD.to_string(), json!(now_epoch_ms()));

        if let Err(err) = self.store.set(EDITOR_CONTENT, SCRATCHPAD_ID, fields, true) {
            error!("event=scratchpad_save module=scratchpad status=error error={err}");
            return Err(err.into());
        }
        debug!(
            "event=scratchpad_save module=scratchpad status=ok chars={}",
            content.chars().count()
        );
        Ok(())
    }

    /// Returns the stored content, or an empty string when nothing was saved.
    pub fn load(&self) -> Result<String, ScratchpadError> {
        let content = self
            .store
            .get(EDITOR_CONTENT, SCRATCHPAD_ID)?
            .and_then(|record| record.str_field(CONTENT_FIELD).map(str::to_string))
            .unwrap_or_default();
        Ok(content)
    }

    /// Epoch ms of the last save, if any.
    pub fn updated_at(&self) -> Result<Option<i64>, ScratchpadError> {
        Ok(self
            .store
            .get(EDITOR_CONTENT, SCRATCHPAD_ID)?
            .and_then(|record| record.i64_field(UPDATED_AT_FIELD)))
    }
}
