//! Order maintainer: minimal order patches for one sibling list.
//!
//! # Responsibility
//! - Splice a moving node into a sibling list at a clamped index.
//! - Densify a sibling list after a removal.
//! - Convert between zero-based stored order and one-based display position.
//!
//! # Invariants
//! - After applying the returned patches, orders are exactly `0..len`.
//! - Entries whose stored order already matches their position are omitted.

use super::forest::Node;
use crate::model::node::{NodeId, NodeKind, NodeRecord, ValidationError, ORDER_FIELD};
use crate::store::Patch;

/// Order-relevant view of one sibling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiblingEntry {
    pub id: NodeId,
    pub kind: NodeKind,
    pub order: i64,
}

impl From<&Node> for SiblingEntry {
    fn from(node: &Node) -> Self {
        Self::from(&node.record)
    }
}

impl From<&NodeRecord> for SiblingEntry {
    fn from(record: &NodeRecord) -> Self {
        Self {
            id: record.id.clone(),
            kind: record.kind,
            order: record.order,
        }
    }
}

/// One order write to issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPatch {
    pub id: NodeId,
    pub kind: NodeKind,
    pub new_order: i64,
}

impl OrderPatch {
    pub fn to_patch(&self) -> Patch {
        Patch::new().set(ORDER_FIELD, self.new_order)
    }
}

/// Collects sibling entries from forest nodes, skipping `exclude_id`.
pub fn sibling_entries(nodes: &[Node], exclude_id: Option<&str>) -> Vec<SiblingEntry> {
    nodes
        .iter()
        .filter(|node| Some(node.id()) != exclude_id)
        .map(SiblingEntry::from)
        .collect()
}

/// Clamps a requested index into `[0, len]`.
pub fn clamp_index(target_index: i64, len: usize) -> usize {
    target_index.clamp(0, len as i64) as usize
}

/// Computes the order patches placing `moving` at `target_index`.
///
/// `siblings` must be ordered; an entry for `moving` is ignored if present.
pub fn reorder(siblings: &[SiblingEntry], moving: &SiblingEntry, target_index: i64) -> Vec<OrderPatch> {
    let mut sequence: Vec<&SiblingEntry> = siblings
        .iter()
        .filter(|entry| entry.id != moving.id || entry.kind != moving.kind)
        .collect();
    let index = clamp_index(target_index, sequence.len());
    sequence.insert(index, moving);
    diff_positions(sequence)
}

/// Computes the order patches making `siblings` dense and zero-based.
pub fn compact(siblings: &[SiblingEntry]) -> Vec<OrderPatch> {
    diff_positions(siblings.iter().collect())
}

fn diff_positions(sequence: Vec<&SiblingEntry>) -> Vec<OrderPatch> {
    sequence
        .into_iter()
        .enumerate()
        .filter(|(position, entry)| entry.order != *position as i64)
        .map(|(position, entry)| OrderPatch {
            id: entry.id.clone(),
            kind: entry.kind,
            new_order: position as i64,
        })
        .collect()
}

/// Applies patches to an entry list and re-sorts it by `(order, id)`.
///
/// Patches naming unknown entries are ignored.
pub fn apply_patches(siblings: &mut [SiblingEntry], patches: &[OrderPatch]) {
    for patch in patches {
        if let Some(entry) = siblings
            .iter_mut()
            .find(|entry| entry.id == patch.id && entry.kind == patch.kind)
        {
            entry.order = patch.new_order;
        }
    }
    siblings.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
}

/// One-based display position for a stored order.
pub fn display_position(order: i64) -> u32 {
    (order.max(0) as u32).saturating_add(1)
}

/// Zero-based order for a one-based display position.
pub fn order_from_display(position: u32) -> Result<i64, ValidationError> {
    if position == 0 {
        return Err(ValidationError::InvalidPosition(position));
    }
    Ok(i64::from(position) - 1)
}
