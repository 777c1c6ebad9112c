//! Synchronization session over the folder/document collections.
//!
//! # Responsibility
//! - Subscribe to both node collections and republish a rebuilt forest on
//!   every change event.
//! - Mediate add/edit/delete/move requests through validation, the move
//!   validator and the order maintainer before writing to the store.
//! - Track issued writes until a snapshot shows their effect.
//!
//! # Invariants
//! - The published forest is replaced, never mutated.
//! - Validation and structural errors are returned before any write.
//! - Sibling order writes are independent: a failure is logged and reported
//!   but earlier writes stay in place.
//! - No forest is published after `unsubscribe` returns.

use crate::model::node::{
    decode_nodes, normalize_color, normalize_label, normalize_tags, NodeId, NodeKind, NodeRecord,
    ValidationError, COLOR_FIELD, CONTENT_FIELD, LABEL_FIELD, ORDER_FIELD, PARENT_ID_FIELD,
    TAGS_FIELD,
};
use crate::store::{
    ChangeStream, CollectionSnapshot, DocumentStore, FieldChange, Patch, Record, StoreError,
    DOCUMENTS, FOLDERS,
};
use crate::tree::order::{clamp_index, order_from_display, sibling_entries};
use crate::tree::validate::Destination;
use crate::tree::{
    available_destinations, build_forest, compact, reorder, validate_move, validate_parent,
    Forest, MoveRejection, Node, OrderPatch, SiblingEntry,
};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Errors surfaced by session mutations.
#[derive(Debug)]
pub enum SessionError {
    /// Malformed or missing request field.
    Validation(ValidationError),
    /// Target node is not in the current forest.
    NodeNotFound(NodeId),
    /// Target node exists but has the other kind.
    WrongKind { id: NodeId, expected: NodeKind },
    /// Delete requested on a folder that still has children.
    HasChildren(NodeId),
    /// Destination is missing, not a folder, or would create a cycle.
    InvalidDestination(MoveRejection),
    /// Store call failed; no retry was attempted.
    Storage(StoreError),
    /// `start` was called outside a tokio runtime.
    NoRuntime,
    /// Session was unsubscribed while waiting.
    Closed,
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::WrongKind { id, expected } => {
                write!(f, "node {id} is not a {}", expected.as_str())
            }
            Self::HasChildren(id) => write!(f, "folder still has children: {id}"),
            Self::InvalidDestination(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::NoRuntime => write!(f, "sync session requires a tokio runtime"),
            Self::Closed => write!(f, "sync session is closed"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::InvalidDestination(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for SessionError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<MoveRejection> for SessionError {
    fn from(value: MoveRejection) -> Self {
        match value {
            MoveRejection::NodeNotFound(id) => Self::NodeNotFound(id),
            other => Self::InvalidDestination(other),
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(value: StoreError) -> Self {
        Self::Storage(value)
    }
}

/// Request for `SyncSession::add_folder`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFolder {
    pub label: String,
    pub color: String,
    pub parent_id: Option<NodeId>,
}

/// Request for `SyncSession::add_document`. Documents are created inside a
/// folder; they may be moved to the root afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub label: String,
    pub content: String,
    pub tags: Vec<String>,
    pub parent_id: NodeId,
}

/// Field changes for `SyncSession::edit_folder`. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderPatch {
    pub label: Option<String>,
    pub color: Option<String>,
    /// One-based position among siblings.
    pub position: Option<u32>,
}

/// Field changes for `SyncSession::edit_document`. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentPatch {
    pub label: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    /// One-based position among siblings.
    pub position: Option<u32>,
}

/// Freshness of the published forest relative to this session's writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Not backed by a live subscription (not started yet, or unsubscribed).
    Stale,
    /// At least one issued write has not been observed in a snapshot yet.
    WriteIssued,
    /// Every issued write has been observed.
    Settled,
}

#[derive(Debug, Clone)]
enum Expectation {
    /// Record exists and each named field holds the value (`None`: absent).
    Present(BTreeMap<String, Option<Value>>),
    Absent,
}

impl Expectation {
    fn from_patch(patch: &Patch) -> Self {
        let fields = patch
            .changes()
            .map(|(field, change)| {
                let expected = match change {
                    FieldChange::Set(value) => Some(value.clone()),
                    FieldChange::Remove => None,
                };
                (field.to_string(), expected)
            })
            .collect();
        Self::Present(fields)
    }

    fn merge(self, newer: Self) -> Self {
        match (self, newer) {
            (Self::Present(mut older), Self::Present(newer)) => {
                older.extend(newer);
                Self::Present(older)
            }
            (_, newer) => newer,
        }
    }

    fn is_met(&self, record: Option<&Record>) -> bool {
        match (self, record) {
            (Self::Absent, None) => true,
            (Self::Absent, Some(_)) | (Self::Present(_), None) => false,
            (Self::Present(fields), Some(record)) => fields
                .iter()
                .all(|(name, expected)| record.fields.get(name) == expected.as_ref()),
        }
    }
}

type WriteKey = (NodeKind, NodeId);

#[derive(Default)]
struct TrackerState {
    live: bool,
    folders: Arc<Vec<Record>>,
    documents: Arc<Vec<Record>>,
    pending: HashMap<WriteKey, Expectation>,
}

impl TrackerState {
    fn sync_state(&self) -> SyncState {
        if !self.live {
            SyncState::Stale
        } else if self.pending.is_empty() {
            SyncState::Settled
        } else {
            SyncState::WriteIssued
        }
    }
}

fn find_record<'a>(
    folders: &'a [Record],
    documents: &'a [Record],
    kind: NodeKind,
    id: &str,
) -> Option<&'a Record> {
    let records = match kind {
        NodeKind::Folder => folders,
        NodeKind::Document => documents,
    };
    records.iter().find(|record| record.id == id)
}

/// Matches issued writes against incoming snapshots.
struct WriteTracker {
    state: Mutex<TrackerState>,
    state_tx: watch::Sender<SyncState>,
}

impl WriteTracker {
    fn new() -> Self {
        let (state_tx, _) = watch::channel(SyncState::Stale);
        Self {
            state: Mutex::new(TrackerState::default()),
            state_tx,
        }
    }

    fn observe(&self, folders: Arc<Vec<Record>>, documents: Arc<Vec<Record>>) {
        let mut state = self.state.lock();
        state.live = true;
        state.folders = folders;
        state.documents = documents;

        let TrackerState {
            folders,
            documents,
            pending,
            ..
        } = &mut *state;
        pending.retain(|(kind, id), expectation| {
            !expectation.is_met(find_record(folders.as_slice(), documents.as_slice(), *kind, id))
        });
        self.publish(&state);
    }

    fn track(&self, kind: NodeKind, id: &str, expectation: Expectation) {
        let mut state = self.state.lock();
        let key = (kind, id.to_string());
        let merged = match state.pending.remove(&key) {
            Some(existing) => existing.merge(expectation),
            None => expectation,
        };

        // The echo may already have been processed before the write returned.
        let already_seen = state.live
            && merged.is_met(find_record(
                state.folders.as_slice(),
                state.documents.as_slice(),
                kind,
                id,
            ));
        if !already_seen {
            state.pending.insert(key, merged);
        }
        self.publish(&state);
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.live = false;
        self.publish(&state);
    }

    fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    fn publish(&self, state: &TrackerState) {
        let next = state.sync_state();
        self.state_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

/// Long-lived session owning the forest subscription of one store.
pub struct SyncSession<S: DocumentStore> {
    store: Arc<S>,
    forest_rx: watch::Receiver<Arc<Forest>>,
    tracker: Arc<WriteTracker>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<S: DocumentStore> SyncSession<S> {
    /// Subscribes to both node collections, builds the first forest and
    /// spawns the refresh task on the current tokio runtime.
    pub fn start(store: Arc<S>) -> Result<Self, SessionError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SessionError::NoRuntime)?;

        let mut folders = store.subscribe(FOLDERS)?;
        let mut documents = store.subscribe(DOCUMENTS)?;
        let folder_snapshot = folders.borrow_and_update().clone();
        let document_snapshot = documents.borrow_and_update().clone();

        let tracker = Arc::new(WriteTracker::new());
        let forest = rebuild(&folder_snapshot, &document_snapshot);
        tracker.observe(
            Arc::clone(&folder_snapshot.records),
            Arc::clone(&document_snapshot.records),
        );
        info!(
            "event=session_start module=session status=ok nodes={} orphans={}",
            forest.len(),
            forest.orphans.len()
        );

        let (forest_tx, forest_rx) = watch::channel(Arc::new(forest));
        let task = runtime.spawn(run_refresh(
            folders,
            documents,
            forest_tx,
            Arc::clone(&tracker),
        ));

        Ok(Self {
            store,
            forest_rx,
            tracker,
            task: Mutex::new(Some(task)),
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Latest published forest.
    pub fn forest(&self) -> Arc<Forest> {
        self.forest_rx.borrow().clone()
    }

    /// Receiver of every forest published from now on.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Forest>> {
        self.forest_rx.clone()
    }

    pub fn sync_state(&self) -> SyncState {
        *self.tracker.state_tx.borrow()
    }

    /// Number of issued writes not yet observed in a snapshot.
    pub fn pending_writes(&self) -> usize {
        self.tracker.pending_len()
    }

    /// Waits until every issued write has been observed.
    ///
    /// # Errors
    /// - `SessionError::Closed` when the session is unsubscribed first.
    pub async fn settled(&self) -> Result<(), SessionError> {
        let mut state_rx = self.tracker.state_tx.subscribe();
        let state = state_rx
            .wait_for(|state| *state != SyncState::WriteIssued)
            .await
            .map_err(|_| SessionError::Closed)?;
        match *state {
            SyncState::Settled => Ok(()),
            _ => Err(SessionError::Closed),
        }
    }

    /// Move-picker entries for `node_id` against the current forest.
    pub fn destinations_for(&self, node_id: &str) -> Vec<Destination> {
        available_destinations(&self.forest(), node_id)
    }

    /// Stops the refresh task. No forest is published after this returns;
    /// writes already issued are not cancelled.
    pub async fn unsubscribe(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            task.abort();
            if let Err(err) = task.await {
                if !err.is_cancelled() {
                    warn!("event=session_stop module=session status=error error={err}");
                }
            }
            self.tracker.close();
            info!("event=session_stop module=session status=ok");
        }
    }

    /// Creates a folder appended after its current siblings.
    pub fn add_folder(&self, request: NewFolder) -> Result<NodeId, SessionError> {
        let label = normalize_label(&request.label)?;
        let color = normalize_color(&request.color)?;

        let forest = self.forest();
        let parent_id = request.parent_id.as_deref();
        validate_parent(&forest, parent_id)?;
        let order = sibling_count(&forest, parent_id);

        let mut record = NodeRecord::folder(String::new(), label).with_order(order);
        record.color = Some(color);
        record.parent_id = request.parent_id;
        self.create_node(record)
    }

    /// Creates a document appended after the folder's current children.
    pub fn add_document(&self, request: NewDocument) -> Result<NodeId, SessionError> {
        let label = normalize_label(&request.label)?;
        let tags = normalize_tags(&request.tags);

        let forest = self.forest();
        validate_parent(&forest, Some(request.parent_id.as_str()))?;
        let order = sibling_count(&forest, Some(request.parent_id.as_str()));

        let mut record = NodeRecord::document(String::new(), label)
            .with_parent(request.parent_id)
            .with_order(order);
        record.content = Some(request.content);
        record.tags = tags;
        self.create_node(record)
    }

    /// Patches folder fields and, with a position, reorders its siblings.
    pub fn edit_folder(&self, id: &str, changes: FolderPatch) -> Result<(), SessionError> {
        let label = changes.label.as_deref().map(normalize_label).transpose()?;
        let color = changes.color.as_deref().map(normalize_color).transpose()?;
        let patch = Patch::new()
            .set_opt(LABEL_FIELD, label)
            .set_opt(COLOR_FIELD, color);
        self.edit_node(id, NodeKind::Folder, patch, changes.position)
    }

    /// Patches document fields and, with a position, reorders its siblings.
    pub fn edit_document(&self, id: &str, changes: DocumentPatch) -> Result<(), SessionError> {
        let label = changes.label.as_deref().map(normalize_label).transpose()?;
        let tags = changes.tags.as_deref().map(normalize_tags);
        let patch = Patch::new()
            .set_opt(LABEL_FIELD, label)
            .set_opt(CONTENT_FIELD, changes.content)
            .set_opt(TAGS_FIELD, tags);
        self.edit_node(id, NodeKind::Document, patch, changes.position)
    }

    /// Deletes a document or a childless folder and closes the order gap.
    pub fn delete_node(&self, id: &str) -> Result<(), SessionError> {
        let forest = self.forest();
        let node = find_node(&forest, id)?;
        if node.is_folder() && node.has_children() {
            info!("event=node_delete module=session status=rejected reason=has_children");
            return Err(SessionError::HasChildren(id.to_string()));
        }

        let kind = node.kind();
        let remaining = sibling_entries(forest.siblings_of(id).unwrap_or_default(), Some(id));

        if let Err(err) = self.store.delete(kind.collection(), id) {
            error!(
                "event=node_delete module=session status=error kind={} error={err}",
                kind.as_str()
            );
            return Err(err.into());
        }
        self.tracker.track(kind, id, Expectation::Absent);
        info!("event=node_delete module=session status=ok kind={}", kind.as_str());

        self.dispatch_order_patches(&compact(&remaining))
    }

    /// Moves a node under `destination` (root for `None`) at the zero-based
    /// `index`, clamped to the destination's sibling count.
    pub fn move_node(
        &self,
        id: &str,
        destination: Option<&str>,
        index: i64,
    ) -> Result<(), SessionError> {
        let forest = self.forest();
        if let Err(rejection) = validate_move(&forest, id, destination) {
            info!("event=node_move module=session status=rejected reason={rejection}");
            return Err(rejection.into());
        }
        let node = find_node(&forest, id)?;
        let kind = node.kind();
        let moving = SiblingEntry::from(node);

        let destination_siblings =
            sibling_entries(forest.children_of(destination).unwrap_or_default(), Some(id));
        let target = clamp_index(index, destination_siblings.len()) as i64;

        let current_parent = forest
            .parent_of(id)
            .flatten()
            .map(|parent| parent.id().to_string());
        let parent_changed = current_parent.as_deref() != destination;

        let mut order_patches = excluding(reorder(&destination_siblings, &moving, target), &moving);
        if parent_changed {
            let source_siblings =
                sibling_entries(forest.siblings_of(id).unwrap_or_default(), Some(id));
            order_patches.extend(compact(&source_siblings));
        }

        let patch = match destination {
            Some(parent_id) => Patch::new().set(PARENT_ID_FIELD, parent_id),
            None => Patch::new().remove(PARENT_ID_FIELD),
        }
        .set(ORDER_FIELD, target);

        self.write_patch(kind, id, &patch)?;
        info!(
            "event=node_move module=session status=ok kind={} to_root={} order={} sibling_patches={}",
            kind.as_str(),
            destination.is_none(),
            target,
            order_patches.len()
        );
        self.dispatch_order_patches(&order_patches)
    }

    fn create_node(&self, record: NodeRecord) -> Result<NodeId, SessionError> {
        let kind = record.kind;
        let id = match self.store.create(kind.collection(), record.to_fields()) {
            Ok(id) => id,
            Err(err) => {
                error!(
                    "event=node_add module=session status=error kind={} error={err}",
                    kind.as_str()
                );
                return Err(err.into());
            }
        };
        self.tracker
            .track(kind, &id, Expectation::Present(BTreeMap::new()));
        info!(
            "event=node_add module=session status=ok kind={} order={} nested={}",
            kind.as_str(),
            record.order,
            record.parent_id.is_some()
        );
        Ok(id)
    }

    fn edit_node(
        &self,
        id: &str,
        kind: NodeKind,
        mut patch: Patch,
        position: Option<u32>,
    ) -> Result<(), SessionError> {
        let target_order = position.map(order_from_display).transpose()?;

        let forest = self.forest();
        let node = find_node(&forest, id)?;
        if node.kind() != kind {
            return Err(SessionError::WrongKind {
                id: id.to_string(),
                expected: kind,
            });
        }

        let mut order_patches = Vec::new();
        if let Some(target_order) = target_order {
            let moving = SiblingEntry::from(node);
            let siblings = sibling_entries(forest.siblings_of(id).unwrap_or_default(), Some(id));
            let target = clamp_index(target_order, siblings.len()) as i64;
            patch = patch.set(ORDER_FIELD, target);
            order_patches = excluding(reorder(&siblings, &moving, target), &moving);
        }

        if patch.is_empty() {
            debug!("event=node_edit module=session status=noop kind={}", kind.as_str());
            return Ok(());
        }

        self.write_patch(kind, id, &patch)?;
        info!(
            "event=node_edit module=session status=ok kind={} reordered={} sibling_patches={}",
            kind.as_str(),
            position.is_some(),
            order_patches.len()
        );
        self.dispatch_order_patches(&order_patches)
    }

    fn write_patch(&self, kind: NodeKind, id: &str, patch: &Patch) -> Result<(), SessionError> {
        if let Err(err) = self.store.patch(kind.collection(), id, patch) {
            error!(
                "event=node_patch module=session status=error kind={} error={err}",
                kind.as_str()
            );
            return Err(err.into());
        }
        self.tracker.track(kind, id, Expectation::from_patch(patch));
        Ok(())
    }

    /// Issues each order patch as an independent write and reports the first
    /// failure after attempting all of them.
    fn dispatch_order_patches(&self, patches: &[OrderPatch]) -> Result<(), SessionError> {
        let mut first_error = None;
        for order_patch in patches {
            let patch = order_patch.to_patch();
            match self
                .store
                .patch(order_patch.kind.collection(), &order_patch.id, &patch)
            {
                Ok(()) => {
                    self.tracker
                        .track(order_patch.kind, &order_patch.id, Expectation::from_patch(&patch));
                }
                Err(err) => {
                    error!(
                        "event=order_patch module=session status=error kind={} new_order={} error={err}",
                        order_patch.kind.as_str(),
                        order_patch.new_order
                    );
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(SessionError::Storage(err)),
            None => Ok(()),
        }
    }
}

impl<S: DocumentStore> Drop for SyncSession<S> {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

async fn run_refresh(
    mut folders: ChangeStream,
    mut documents: ChangeStream,
    forest_tx: watch::Sender<Arc<Forest>>,
    tracker: Arc<WriteTracker>,
) {
    loop {
        let changed = tokio::select! {
            changed = folders.changed() => changed,
            changed = documents.changed() => changed,
        };
        if changed.is_err() {
            warn!("event=session_refresh module=session status=stream_closed");
            tracker.close();
            return;
        }

        let folder_snapshot = folders.borrow_and_update().clone();
        let document_snapshot = documents.borrow_and_update().clone();
        let forest = rebuild(&folder_snapshot, &document_snapshot);
        debug!(
            "event=session_refresh module=session status=ok folders_version={} documents_version={} nodes={} orphans={}",
            folder_snapshot.version,
            document_snapshot.version,
            forest.len(),
            forest.orphans.len()
        );

        forest_tx.send_replace(Arc::new(forest));
        tracker.observe(folder_snapshot.records, document_snapshot.records);
    }
}

fn rebuild(folders: &CollectionSnapshot, documents: &CollectionSnapshot) -> Forest {
    build_forest(
        &decode_nodes(NodeKind::Folder, &folders.records),
        &decode_nodes(NodeKind::Document, &documents.records),
    )
}

fn find_node<'a>(forest: &'a Forest, id: &str) -> Result<&'a Node, SessionError> {
    forest
        .find(id)
        .ok_or_else(|| SessionError::NodeNotFound(id.to_string()))
}

fn sibling_count(forest: &Forest, parent_id: Option<&str>) -> i64 {
    forest.children_of(parent_id).map_or(0, <[Node]>::len) as i64
}

fn excluding(patches: Vec<OrderPatch>, moving: &SiblingEntry) -> Vec<OrderPatch> {
    patches
        .into_iter()
        .filter(|patch| patch.id != moving.id || patch.kind != moving.kind)
        .collect()
}
