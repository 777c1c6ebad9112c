//! In-process document store.
//!
//! # Responsibility
//! - Provide a `DocumentStore` with the same observable behavior as the
//!   SQLite adapter, without I/O.
//! - Expose write counting and failure injection for engine tests.
//!
//! # Invariants
//! - Records keep insertion order; a merge `set` keeps the original slot.
//! - Injected failures reject the write before any state changes.

use super::{
    ensure_no_null_fields, generate_id, now_epoch_ms, ChangeStream, CollectionSnapshot,
    DocumentStore, Fields, Patch, Record, RecordId, StoreError, StoreResult,
};
use indexmap::IndexMap;
use log::debug;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

struct CollectionState {
    records: IndexMap<RecordId, Record>,
    version: u64,
    sender: watch::Sender<CollectionSnapshot>,
}

impl CollectionState {
    fn new(collection: &str) -> Self {
        let (sender, _) = watch::channel(CollectionSnapshot::empty(collection));
        Self {
            records: IndexMap::new(),
            version: 0,
            sender,
        }
    }

    fn snapshot(&self, collection: &str) -> CollectionSnapshot {
        CollectionSnapshot {
            collection: collection.to_string(),
            version: self.version,
            records: Arc::new(self.records.values().cloned().collect()),
        }
    }

    fn publish(&mut self, collection: &str) {
        self.version += 1;
        let snapshot = self.snapshot(collection);
        self.sender.send_replace(snapshot);
    }
}

/// Failure injection switches for `MemoryStore`.
#[derive(Debug, Default)]
struct FailurePlan {
    all_writes: bool,
    record_ids: HashSet<RecordId>,
}

/// `DocumentStore` kept entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, CollectionState>>,
    failures: Mutex<FailurePlan>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record under a fixed id and creation time, bypassing
    /// validation and write counting. Used to seed fixtures.
    pub fn seed(&self, collection: &str, id: &str, created_at: i64, fields: Fields) {
        let mut collections = self.collections.lock();
        let state = collections
            .entry(collection.to_string())
            .or_insert_with(|| CollectionState::new(collection));
        state.records.insert(
            id.to_string(),
            Record {
                id: id.to_string(),
                created_at,
                fields,
            },
        );
        state.publish(collection);
    }

    /// Number of successful and attempted create/set/patch/delete calls.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes every following write fail with `StoreError::Unavailable`.
    pub fn fail_all_writes(&self, enabled: bool) {
        self.failures.lock().all_writes = enabled;
    }

    /// Makes writes targeting `id` fail with `StoreError::Unavailable`.
    pub fn fail_writes_to(&self, id: &str) {
        self.failures.lock().record_ids.insert(id.to_string());
    }

    pub fn clear_failures(&self) {
        *self.failures.lock() = FailurePlan::default();
    }

    fn begin_write(&self, collection: &str, id: Option<&str>) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let failures = self.failures.lock();
        let targeted = id.is_some_and(|id| failures.record_ids.contains(id));
        if failures.all_writes || targeted {
            debug!(
                "event=store_write module=store status=injected_failure collection={collection}"
            );
            return Err(StoreError::Unavailable(format!(
                "injected write failure on {collection}"
            )));
        }
        Ok(())
    }

    fn with_collection<T>(
        &self,
        collection: &str,
        f: impl FnOnce(&mut CollectionState) -> T,
    ) -> T {
        let mut collections = self.collections.lock();
        let state = collections
            .entry(collection.to_string())
            .or_insert_with(|| CollectionState::new(collection));
        f(state)
    }
}

impl DocumentStore for MemoryStore {
    fn list(&self, collection: &str) -> StoreResult<Vec<Record>> {
        Ok(self.with_collection(collection, |state| {
            state.records.values().cloned().collect()
        }))
    }

    fn subscribe(&self, collection: &str) -> StoreResult<ChangeStream> {
        Ok(self.with_collection(collection, |state| state.sender.subscribe()))
    }

    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Record>> {
        Ok(self.with_collection(collection, |state| state.records.get(id).cloned()))
    }

    fn create(&self, collection: &str, mut fields: Fields) -> StoreResult<RecordId> {
        self.begin_write(collection, None)?;
        ensure_no_null_fields(&fields)?;

        let id = generate_id();
        let created_at = now_epoch_ms();
        fields.insert(super::CREATED_AT_FIELD.to_string(), created_at.into());
        self.with_collection(collection, |state| {
            state.records.insert(
                id.clone(),
                Record {
                    id: id.clone(),
                    created_at,
                    fields,
                },
            );
            state.publish(collection);
        });
        Ok(id)
    }

    fn set(&self, collection: &str, id: &str, fields: Fields, merge: bool) -> StoreResult<()> {
        self.begin_write(collection, Some(id))?;
        ensure_no_null_fields(&fields)?;

        self.with_collection(collection, |state| {
            match state.records.get_mut(id) {
                Some(existing) if merge => existing.fields.extend(fields),
                Some(existing) => existing.fields = fields,
                None => {
                    state.records.insert(
                        id.to_string(),
                        Record {
                            id: id.to_string(),
                            created_at: now_epoch_ms(),
                            fields,
                        },
                    );
                }
            }
            state.publish(collection);
        });
        Ok(())
    }

    fn patch(&self, collection: &str, id: &str, patch: &Patch) -> StoreResult<()> {
        self.begin_write(collection, Some(id))?;

        self.with_collection(collection, |state| {
            let record = state
                .records
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })?;
            patch.apply_to(&mut record.fields)?;
            state.publish(collection);
            Ok(())
        })
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.begin_write(collection, Some(id))?;

        self.with_collection(collection, |state| {
            if state.records.shift_remove(id).is_some() {
                state.publish(collection);
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::store::{DocumentStore, Fields, Patch, StoreError};
    use serde_json::json;

    fn fields(label: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("label".to_string(), json!(label));
        fields
    }

    #[test]
    fn create_publishes_snapshot_to_subscribers() {
        let store = MemoryStore::new();
        let mut stream = store.subscribe("folders").unwrap();
        assert_eq!(stream.borrow_and_update().records.len(), 0);

        let id = store.create("folders", fields("A")).unwrap();

        assert!(stream.has_changed().unwrap());
        let snapshot = stream.borrow_and_update().clone();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.records[0].id, id);
        assert!(snapshot.records[0].fields.contains_key("createdAt"));
    }

    #[test]
    fn patch_missing_record_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .patch("folders", "missing", &Patch::new().set("label", "x"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn injected_failures_do_not_mutate_state() {
        let store = MemoryStore::new();
        let id = store.create("folders", fields("A")).unwrap();
        store.fail_writes_to(&id);

        assert!(store
            .patch("folders", &id, &Patch::new().set("label", "B"))
            .is_err());
        let record = store.get("folders", &id).unwrap().unwrap();
        assert_eq!(record.str_field("label"), Some("A"));
        assert_eq!(store.write_count(), 2);

        store.clear_failures();
        store.delete("folders", &id).unwrap();
        assert!(store.get("folders", &id).unwrap().is_none());
    }

    #[test]
    fn merge_set_keeps_unnamed_fields() {
        let store = MemoryStore::new();
        let mut first = fields("A");
        first.insert("color".to_string(), json!("#fff"));
        store.set("folders", "f1", first, false).unwrap();
        store.set("folders", "f1", fields("B"), true).unwrap();

        let record = store.get("folders", "f1").unwrap().unwrap();
        assert_eq!(record.str_field("label"), Some("B"));
        assert_eq!(record.str_field("color"), Some("#fff"));
    }
}
