//! Post-it use-case service.
//!
//! # Responsibility
//! - Provide create/update/delete/list APIs for the `postits` collection.
//! - Filter listings by a case-insensitive needle over title and text.
//!
//! # Invariants
//! - Title and text are trimmed and must not be blank.
//! - Listings follow creation time, oldest first.

use crate::model::node::ValidationError;
use crate::model::postit::{PostIt, TEXT_FIELD, TITLE_FIELD};
use crate::store::{DocumentStore, Fields, Patch, StoreError, POSTITS};
use log::{error, info};
use serde_json::json;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Service error for post-it use-cases.
#[derive(Debug)]
pub enum PostItError {
    /// Title or text is blank.
    Validation(ValidationError),
    /// Target post-it does not exist.
    NotFound(String),
    /// Store call failed.
    Storage(StoreError),
    /// Write succeeded but read-back did not find the record.
    InconsistentState(&'static str),
}

impl Display for PostItError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "post-it not found: {id}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent post-it state: {details}"),
        }
    }
}

impl Error for PostItError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for PostItError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for PostItError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound { id, .. } => Self::NotFound(id),
            other => Self::Storage(other),
        }
    }
}

/// Post-it service facade over a document store.
pub struct PostItService<S: DocumentStore> {
    store: Arc<S>,
}

impl<S: DocumentStore> PostItService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Creates one post-it and returns it as stored.
    pub fn add(&self, title: &str, text: &str) -> Result<PostIt, PostItError> {
        let title = required(TITLE_FIELD, title)?;
        let text = required(TEXT_FIELD, text)?;

        let mut fields = Fields::new();
        fields.insert(TITLE_FIELD.to_string(), json!(title));
        fields.insert(TEXT_FIELD.to_string(), json!(text));
        let id = self.store.create(POSTITS, fields).map_err(|err| {
            error!("event=postit_add module=postit status=error error={err}");
            err
        })?;
        info!("event=postit_add module=postit status=ok");

        self.get(&id)?
            .ok_or(PostItError::InconsistentState("created post-it not found in read-back"))
    }

    /// Replaces title and text of an existing post-it.
    pub fn update(&self, id: &str, title: &str, text: &str) -> Result<PostIt, PostItError> {
        let title = required(TITLE_FIELD, title)?;
        let text = required(TEXT_FIELD, text)?;
        if self.get(id)?.is_none() {
            return Err(PostItError::NotFound(id.to_string()));
        }

        let patch = Patch::new().set(TITLE_FIELD, title).set(TEXT_FIELD, text);
        self.store.patch(POSTITS, id, &patch).map_err(|err| {
            error!("event=postit_update module=postit status=error error={err}");
            err
        })?;
        info!("event=postit_update module=postit status=ok");

        self.get(id)?
            .ok_or(PostItError::InconsistentState("updated post-it not found in read-back"))
    }

    pub fn delete(&self, id: &str) -> Result<(), PostItError> {
        self.store.delete(POSTITS, id)?;
        info!("event=postit_delete module=postit status=ok");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<PostIt>, PostItError> {
        Ok(self
            .store
            .get(POSTITS, id)?
            .map(|record| PostIt::from_record(&record)))
    }

    /// Lists every post-it in creation order.
    pub fn list(&self) -> Result<Vec<PostIt>, PostItError> {
        let mut items: Vec<PostIt> = self
            .store
            .list(POSTITS)?
            .iter()
            .map(PostIt::from_record)
            .collect();
        items.sort_by_key(|item| item.created_at);
        Ok(items)
    }

    /// Lists post-its whose title or text contains `needle`, ignoring case.
    /// A blank needle returns everything.
    pub fn filter(&self, needle: &str) -> Result<Vec<PostIt>, PostItError> {
        let mut items = self.list()?;
        items.retain(|item| item.matches(needle));
        Ok(items)
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    Ok(trimmed.to_string())
}
