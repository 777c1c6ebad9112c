//! SQLite-backed document store.
//!
//! # Responsibility
//! - Persist flat records as JSON field bags keyed by `(collection, id)`.
//! - Publish collection snapshots to subscribers after every write.
//!
//! # Invariants
//! - Listing is deterministic: `created_at ASC, seq ASC`.
//! - Patch is a read-modify-write inside one immediate transaction.
//! - Snapshots are only re-queried for collections that have subscribers.

use super::{
    ensure_no_null_fields, generate_id, now_epoch_ms, ChangeStream, CollectionSnapshot,
    DocumentStore, Fields, Patch, Record, RecordId, StoreError, StoreResult, CREATED_AT_FIELD,
};
use crate::db::migrations::latest_version;
use crate::db::{open_db, open_db_in_memory};
use log::{debug, error};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

const REQUIRED_COLUMNS: &[&str] = &["seq", "collection", "id", "created_at", "fields"];

/// `DocumentStore` persisted in one SQLite database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    streams: Mutex<HashMap<String, watch::Sender<CollectionSnapshot>>>,
}

impl SqliteStore {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        ensure_store_connection_ready(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            streams: Mutex::new(HashMap::new()),
        })
    }

    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::try_new(open_db(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }

    fn publish(&self, conn: &Connection, collection: &str) {
        let streams = self.streams.lock();
        let Some(sender) = streams.get(collection) else {
            return;
        };

        match list_records(conn, collection) {
            Ok(records) => {
                let version = sender.borrow().version + 1;
                sender.send_replace(CollectionSnapshot {
                    collection: collection.to_string(),
                    version,
                    records: Arc::new(records),
                });
            }
            Err(err) => {
                // The write itself succeeded; subscribers catch up on the next one.
                error!(
                    "event=store_publish module=store status=error collection={collection} error={err}"
                );
            }
        }
    }
}

impl DocumentStore for SqliteStore {
    fn list(&self, collection: &str) -> StoreResult<Vec<Record>> {
        let conn = self.conn.lock();
        list_records(&conn, collection)
    }

    fn subscribe(&self, collection: &str) -> StoreResult<ChangeStream> {
        let conn = self.conn.lock();
        let mut streams = self.streams.lock();
        if let Some(sender) = streams.get(collection) {
            return Ok(sender.subscribe());
        }

        let records = list_records(&conn, collection)?;
        let (sender, receiver) = watch::channel(CollectionSnapshot {
            collection: collection.to_string(),
            version: 0,
            records: Arc::new(records),
        });
        streams.insert(collection.to_string(), sender);
        Ok(receiver)
    }

    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Record>> {
        let conn = self.conn.lock();
        load_record(&conn, collection, id)
    }

    fn create(&self, collection: &str, mut fields: Fields) -> StoreResult<RecordId> {
        ensure_no_null_fields(&fields)?;
        let id = generate_id();
        let created_at = now_epoch_ms();
        fields.insert(CREATED_AT_FIELD.to_string(), created_at.into());

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO records (collection, id, created_at, fields)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                collection,
                id,
                created_at,
                serde_json::to_string(&fields)?
            ],
        )?;
        debug!("event=store_create module=store status=ok collection={collection}");
        self.publish(&conn, collection);
        Ok(id)
    }

    fn set(&self, collection: &str, id: &str, fields: Fields, merge: bool) -> StoreResult<()> {
        ensure_no_null_fields(&fields)?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let merged = match load_record(&tx, collection, id)? {
            Some(mut existing) if merge => {
                existing.fields.extend(fields);
                existing.fields
            }
            _ => fields,
        };
        tx.execute(
            "INSERT INTO records (collection, id, created_at, fields)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (collection, id) DO UPDATE SET fields = excluded.fields;",
            params![
                collection,
                id,
                now_epoch_ms(),
                serde_json::to_string(&merged)?
            ],
        )?;
        tx.commit()?;
        self.publish(&conn, collection);
        Ok(())
    }

    fn patch(&self, collection: &str, id: &str, patch: &Patch) -> StoreResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut record =
            load_record(&tx, collection, id)?.ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        patch.apply_to(&mut record.fields)?;
        tx.execute(
            "UPDATE records SET fields = ?3 WHERE collection = ?1 AND id = ?2;",
            params![collection, id, serde_json::to_string(&record.fields)?],
        )?;
        tx.commit()?;
        self.publish(&conn, collection);
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2;",
            params![collection, id],
        )?;
        if changed > 0 {
            self.publish(&conn, collection);
        }
        Ok(())
    }
}

fn list_records(conn: &Connection, collection: &str) -> StoreResult<Vec<Record>> {
    let mut stmt = conn.prepare(
        "SELECT id, created_at, fields
         FROM records
         WHERE collection = ?1
         ORDER BY created_at ASC, seq ASC;",
    )?;
    let mut rows = stmt.query([collection])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let fields_text: String = row.get(2)?;
        records.push(Record {
            id: row.get(0)?,
            created_at: row.get(1)?,
            fields: parse_fields(&fields_text)?,
        });
    }
    Ok(records)
}

fn load_record(conn: &Connection, collection: &str, id: &str) -> StoreResult<Option<Record>> {
    let row: Option<(String, i64, String)> = conn
        .query_row(
            "SELECT id, created_at, fields
             FROM records
             WHERE collection = ?1 AND id = ?2;",
            params![collection, id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    row.map(|(id, created_at, fields_text)| -> StoreResult<Record> {
        Ok(Record {
            id,
            created_at,
            fields: parse_fields(&fields_text)?,
        })
    })
    .transpose()
}

fn parse_fields(text: &str) -> StoreResult<Fields> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::InvalidData(format!(
            "records.fields must be a JSON object, got `{other}`"
        ))),
    }
}

fn ensure_store_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::InvalidData(format!(
            "record store requires schema version {expected_version}, got {actual_version}"
        )));
    }

    let mut stmt = conn.prepare("PRAGMA table_info(records);")?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get::<_, String>(1)?);
    }
    for column in REQUIRED_COLUMNS {
        if !columns.iter().any(|current| current == column) {
            return Err(StoreError::InvalidData(format!(
                "record store requires column `{column}` in table `records`"
            )));
        }
    }
    Ok(())
}
