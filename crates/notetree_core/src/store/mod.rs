//! Document store contracts shared by every storage adapter.
//!
//! # Responsibility
//! - Define the flat record shape and the get/list/create/set/patch/delete
//!   primitives the engine consumes.
//! - Define the change stream: a live feed of full-collection snapshots.
//!
//! # Invariants
//! - Listings and snapshots are ordered by creation time, then insertion.
//! - `patch` only touches the fields it names; explicit `null` writes are
//!   rejected, field removal is an explicit `FieldChange::Remove`.
//! - Every successful write publishes a fresh snapshot of its collection.

use crate::db::DbError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Collection holding folder records.
pub const FOLDERS: &str = "folders";
/// Collection holding document records.
pub const DOCUMENTS: &str = "documents";
/// Collection holding free-floating post-it notes.
pub const POSTITS: &str = "postits";
/// Collection holding the scratchpad editor buffer.
pub const EDITOR_CONTENT: &str = "editorContent";

/// Field stamped by adapters on create.
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Opaque record identifier generated by the store.
pub type RecordId = String;

/// Named field bag of one record.
pub type Fields = Map<String, Value>;

pub type StoreResult<T> = Result<T, StoreError>;

/// Receiver side of one collection's change stream.
pub type ChangeStream = watch::Receiver<CollectionSnapshot>;

/// Errors from document store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target record does not exist.
    NotFound {
        collection: String,
        id: RecordId,
    },
    /// Write carried an explicit `null` value for the named field.
    NullField(String),
    /// Persisted data cannot be decoded.
    InvalidData(String),
    /// Store refused or failed the call (network, permission, quota).
    Unavailable(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { collection, id } => {
                write!(f, "record not found: {collection}/{id}")
            }
            Self::NullField(field) => write!(f, "explicit null written to field `{field}`"),
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidData(value.to_string())
    }
}

/// One stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    /// Epoch ms creation timestamp assigned by the store.
    pub created_at: i64,
    pub fields: Fields,
}

impl Record {
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn i64_field(&self, name: &str) -> Option<i64> {
        self.fields.get(name).and_then(Value::as_i64)
    }
}

/// Full-collection snapshot emitted on every write.
#[derive(Debug, Clone)]
pub struct CollectionSnapshot {
    pub collection: String,
    /// Monotonic per-collection write counter; 0 for the initial state.
    pub version: u64,
    pub records: Arc<Vec<Record>>,
}

impl CollectionSnapshot {
    pub fn empty(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            version: 0,
            records: Arc::new(Vec::new()),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|record| record.id == id)
    }
}

/// Change applied to one field by `patch`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldChange {
    Set(Value),
    Remove,
}

/// Partial update for one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    changes: BTreeMap<String, FieldChange>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.changes
            .insert(field.to_string(), FieldChange::Set(value.into()));
        self
    }

    /// Sets the field only when a value is present; absent values are stripped.
    pub fn set_opt<V: Into<Value>>(self, field: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.set(field, value),
            None => self,
        }
    }

    pub fn remove(mut self, field: &str) -> Self {
        self.changes.insert(field.to_string(), FieldChange::Remove);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn changes(&self) -> impl Iterator<Item = (&str, &FieldChange)> {
        self.changes
            .iter()
            .map(|(field, change)| (field.as_str(), change))
    }

    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.changes.get(field)
    }

    /// Applies this patch to a field bag.
    pub fn apply_to(&self, fields: &mut Fields) -> StoreResult<()> {
        self.ensure_no_null()?;
        for (field, change) in &self.changes {
            match change {
                FieldChange::Set(value) => {
                    fields.insert(field.clone(), value.clone());
                }
                FieldChange::Remove => {
                    fields.remove(field);
                }
            }
        }
        Ok(())
    }

    fn ensure_no_null(&self) -> StoreResult<()> {
        for (field, change) in &self.changes {
            if matches!(change, FieldChange::Set(Value::Null)) {
                return Err(StoreError::NullField(field.clone()));
            }
        }
        Ok(())
    }
}

/// Storage primitives consumed by the engine and the note services.
pub trait DocumentStore: Send + Sync + 'static {
    /// Lists one collection ordered by creation time.
    fn list(&self, collection: &str) -> StoreResult<Vec<Record>>;
    /// Subscribes to full-collection snapshots; the receiver starts at the
    /// current state.
    fn subscribe(&self, collection: &str) -> StoreResult<ChangeStream>;
    /// Loads one record.
    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Record>>;
    /// Creates one record and returns its generated id.
    fn create(&self, collection: &str, fields: Fields) -> StoreResult<RecordId>;
    /// Writes one record under a caller-chosen id. With `merge`, fields not
    /// named are kept; without it the record is replaced.
    fn set(&self, collection: &str, id: &str, fields: Fields, merge: bool) -> StoreResult<()>;
    /// Applies a partial update to an existing record.
    fn patch(&self, collection: &str, id: &str, patch: &Patch) -> StoreResult<()>;
    /// Deletes one record. Deleting a missing record is not an error.
    fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;
}

/// Rejects explicit `null` values in a full field bag.
pub(crate) fn ensure_no_null_fields(fields: &Fields) -> StoreResult<()> {
    for (field, value) in fields {
        if value.is_null() {
            return Err(StoreError::NullField(field.clone()));
        }
    }
    Ok(())
}

pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

pub(crate) fn generate_id() -> RecordId {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::{FieldChange, Fields, Patch, StoreError};
    use serde_json::{json, Value};

    #[test]
    fn patch_sets_and_removes_named_fields_only() {
        let mut fields = Fields::new();
        fields.insert("label".to_string(), json!("Old"));
        fields.insert("parentId".to_string(), json!("p1"));
        fields.insert("color".to_string(), json!("#fff"));

        Patch::new()
            .set("label", "New")
            .remove("parentId")
            .apply_to(&mut fields)
            .unwrap();

        assert_eq!(fields.get("label"), Some(&json!("New")));
        assert!(!fields.contains_key("parentId"));
        assert_eq!(fields.get("color"), Some(&json!("#fff")));
    }

    #[test]
    fn patch_rejects_explicit_null() {
        let mut fields = Fields::new();
        let err = Patch::new()
            .set("label", Value::Null)
            .apply_to(&mut fields)
            .unwrap_err();
        assert!(matches!(err, StoreError::NullField(field) if field == "label"));
    }

    #[test]
    fn set_opt_strips_absent_values() {
        let patch = Patch::new()
            .set_opt::<String>("label", None)
            .set_opt("order", Some(2));
        assert!(patch.get("label").is_none());
        assert_eq!(patch.get("order"), Some(&FieldChange::Set(json!(2))));
    }
}
