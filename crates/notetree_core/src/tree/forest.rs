//! Materialized forest read model.
//!
//! # Invariants
//! - A forest is an immutable snapshot; it is rebuilt, never edited.
//! - Only folder nodes have children.
//! - Sibling vectors are sorted by `(order, id, kind)`.

use crate::model::node::{NodeId, NodeKind, NodeRecord};
use std::collections::HashSet;

/// One node of the forest with its derived children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub record: NodeRecord,
    pub children: Vec<Node>,
}

impl Node {
    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn kind(&self) -> NodeKind {
        self.record.kind
    }

    pub fn is_folder(&self) -> bool {
        self.record.is_folder()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Returns whether `id` names this node or one of its descendants.
    pub fn contains(&self, id: &str) -> bool {
        self.iter().any(|node| node.id() == id)
    }

    /// Depth-first pre-order walk of this subtree, self included.
    pub fn iter(&self) -> NodeIter<'_> {
        NodeIter { stack: vec![self] }
    }
}

/// Why a node was placed at root level despite declaring a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrphanReason {
    /// Declared parent id is not in the snapshot.
    MissingParent,
    /// Declared parent is a document.
    ParentNotFolder,
    /// Node lies on a parent cycle (a folder naming itself included).
    ParentCycle,
}

impl OrphanReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingParent => "missing_parent",
            Self::ParentNotFolder => "parent_not_folder",
            Self::ParentCycle => "parent_cycle",
        }
    }
}

/// One orphan-recovery decision taken while building a forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredOrphan {
    pub node_id: NodeId,
    pub declared_parent_id: NodeId,
    pub reason: OrphanReason,
}

/// Ordered sequence of root nodes plus orphan-recovery diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Forest {
    pub roots: Vec<Node>,
    pub orphans: Vec<RecoveredOrphan>,
}

impl Forest {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Total node count across all levels.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Depth-first pre-order walk over every node.
    pub fn iter(&self) -> NodeIter<'_> {
        NodeIter {
            stack: self.roots.iter().rev().collect(),
        }
    }

    pub fn find(&self, id: &str) -> Option<&Node> {
        self.iter().find(|node| node.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Ordered children of `parent_id`, or the root sequence for `None`.
    ///
    /// Returns `None` when the parent is unknown or not a folder.
    pub fn children_of(&self, parent_id: Option<&str>) -> Option<&[Node]> {
        match parent_id {
            None => Some(self.roots.as_slice()),
            Some(id) => self
                .find(id)
                .filter(|node| node.is_folder())
                .map(|node| node.children.as_slice()),
        }
    }

    /// Effective parent of `id` in this forest (after orphan recovery).
    ///
    /// Returns `None` when `id` is unknown, `Some(None)` for root nodes.
    pub fn parent_of(&self, id: &str) -> Option<Option<&Node>> {
        if self.roots.iter().any(|node| node.id() == id) {
            return Some(None);
        }
        self.iter()
            .find(|node| node.children.iter().any(|child| child.id() == id))
            .map(Some)
    }

    /// Ordered siblings sharing the effective parent of `id`, `id` included.
    pub fn siblings_of(&self, id: &str) -> Option<&[Node]> {
        match self.parent_of(id)? {
            None => Some(self.roots.as_slice()),
            Some(parent) => Some(parent.children.as_slice()),
        }
    }

    /// Identifiers in depth-first pre-order.
    pub fn ids(&self) -> Vec<&str> {
        self.iter().map(Node::id).collect()
    }

    /// Returns whether any identifier occurs more than once.
    pub fn has_duplicates(&self) -> bool {
        let mut seen = HashSet::new();
        self.iter()
            .any(|node| !seen.insert((node.id().to_string(), node.kind())))
    }
}

/// Depth-first pre-order iterator over nodes.
pub struct NodeIter<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for NodeIter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
