//! Tree builder: two flat collections in, one ordered forest out.
//!
//! # Responsibility
//! - Merge folder and document records into one arena and attach every
//!   record under its declared parent when that parent is a folder.
//! - Recover orphans (missing parent, document parent, parent cycle) by
//!   placing them at root level.
//!
//! # Invariants
//! - Every input record appears exactly once in the output.
//! - Sibling order is `(order, id, kind)`; the output is deterministic.
//! - Linear in node count after the initial sort.

use super::forest::{Forest, Node, OrphanReason, RecoveredOrphan};
use crate::model::node::NodeRecord;
use log::debug;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

/// Builds the forest for one snapshot of both collections.
pub fn build_forest(folders: &[NodeRecord], documents: &[NodeRecord]) -> Forest {
    let mut arena: Vec<&NodeRecord> = folders.iter().chain(documents.iter()).collect();
    arena.sort_by(|a, b| {
        a.order
            .cmp(&b.order)
            .then_with(|| a.id.cmp(&b.id))
            .then_with(|| a.kind.cmp(&b.kind))
    });

    let mut index: HashMap<&str, usize> = HashMap::with_capacity(arena.len());
    for (slot, record) in arena.iter().enumerate() {
        match index.entry(record.id.as_str()) {
            Entry::Vacant(entry) => {
                entry.insert(slot);
            }
            // Folders win id collisions across collections so children keep a
            // valid parent.
            Entry::Occupied(mut entry) => {
                if record.is_folder() && !arena[*entry.get()].is_folder() {
                    entry.insert(slot);
                }
            }
        }
    }

    let mut parent_slots: Vec<Option<usize>> = vec![None; arena.len()];
    let mut orphans = Vec::new();
    for (slot, record) in arena.iter().enumerate() {
        let Some(parent_id) = record.parent_id.as_deref() else {
            continue;
        };
        match index.get(parent_id) {
            None => orphans.push(orphan(record, OrphanReason::MissingParent)),
            Some(&parent) if !arena[parent].is_folder() => {
                orphans.push(orphan(record, OrphanReason::ParentNotFolder));
            }
            Some(&parent) => parent_slots[slot] = Some(parent),
        }
    }

    for slot in cycle_members(&parent_slots) {
        parent_slots[slot] = None;
        orphans.push(orphan(arena[slot], OrphanReason::ParentCycle));
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); arena.len()];
    let mut root_slots = Vec::new();
    for (slot, parent) in parent_slots.iter().enumerate() {
        match parent {
            Some(parent) => children[*parent].push(slot),
            None => root_slots.push(slot),
        }
    }

    // Breadth-first order puts parents before children; materializing in
    // reverse lets every parent take its already-built children.
    let mut visit_order = Vec::with_capacity(arena.len());
    let mut queue: VecDeque<usize> = root_slots.iter().copied().collect();
    while let Some(slot) = queue.pop_front() {
        visit_order.push(slot);
        queue.extend(children[slot].iter().copied());
    }

    let mut built: Vec<Option<Node>> = vec![None; arena.len()];
    for &slot in visit_order.iter().rev() {
        let node_children = children[slot]
            .iter()
            .filter_map(|child| built[*child].take())
            .collect();
        built[slot] = Some(Node {
            record: arena[slot].clone(),
            children: node_children,
        });
    }

    let roots: Vec<Node> = root_slots
        .iter()
        .filter_map(|slot| built[*slot].take())
        .collect();

    if !orphans.is_empty() {
        debug!(
            "event=tree_build module=tree status=orphans_recovered nodes={} orphans={}",
            arena.len(),
            orphans.len()
        );
        for recovered in &orphans {
            debug!(
                "event=orphan_recovered module=tree node_id={} reason={}",
                recovered.node_id,
                recovered.reason.as_str()
            );
        }
    }

    Forest { roots, orphans }
}

fn orphan(record: &NodeRecord, reason: OrphanReason) -> RecoveredOrphan {
    RecoveredOrphan {
        node_id: record.id.clone(),
        declared_parent_id: record.parent_id.clone().unwrap_or_default(),
        reason,
    }
}

/// Returns the slots lying on a parent cycle, in discovery order.
fn cycle_members(parent_slots: &[Option<usize>]) -> Vec<usize> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Unvisited,
        OnPath,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; parent_slots.len()];
    let mut members = Vec::new();
    let mut path = Vec::new();

    for start in 0..parent_slots.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }

        path.clear();
        let mut cursor = Some(start);
        while let Some(slot) = cursor {
            match marks[slot] {
                Mark::Unvisited => {
                    marks[slot] = Mark::OnPath;
                    path.push(slot);
                    cursor = parent_slots[slot];
                }
                Mark::OnPath => {
                    if let Some(position) = path.iter().position(|known| *known == slot) {
                        members.extend_from_slice(&path[position..]);
                    }
                    cursor = None;
                }
                Mark::Done => cursor = None,
            }
        }

        for slot in &path {
            marks[*slot] = Mark::Done;
        }
    }

    members
}

#[cfg(test)]
mod tests {
    use super::build_forest;
    use crate::model::node::NodeRecord;
    use crate::tree::forest::OrphanReason;

    #[test]
    fn nests_children_under_folders_in_order() {
        let folders = vec![
            NodeRecord::folder("b", "B").with_order(1),
            NodeRecord::folder("a", "A").with_order(0),
        ];
        let documents = vec![
            NodeRecord::document("d2", "D2").with_parent("a").with_order(1),
            NodeRecord::document("d1", "D1").with_parent("a").with_order(0),
        ];

        let forest = build_forest(&folders, &documents);

        assert_eq!(forest.ids(), vec!["a", "d1", "d2", "b"]);
        assert!(forest.orphans.is_empty());
    }

    #[test]
    fn equal_orders_break_ties_by_id() {
        let folders = vec![
            NodeRecord::folder("z", "Z"),
            NodeRecord::folder("m", "M"),
            NodeRecord::folder("a", "A"),
        ];
        let forest = build_forest(&folders, &[]);
        assert_eq!(forest.ids(), vec!["a", "m", "z"]);
    }

    #[test]
    fn orphans_are_recovered_at_root() {
        let folders = vec![NodeRecord::folder("f", "F").with_order(0)];
        let documents = vec![
            NodeRecord::document("doc", "Doc").with_parent("f").with_order(0),
            NodeRecord::document("lost", "Lost")
                .with_parent("gone")
                .with_order(1),
            NodeRecord::document("under_doc", "UnderDoc")
                .with_parent("doc")
                .with_order(2),
        ];

        let forest = build_forest(&folders, &documents);

        let roots: Vec<&str> = forest.roots.iter().map(|node| node.id()).collect();
        assert_eq!(roots, vec!["f", "lost", "under_doc"]);
        assert_eq!(forest.len(), 4);
        let reasons: Vec<OrphanReason> = forest.orphans.iter().map(|o| o.reason).collect();
        assert_eq!(
            reasons,
            vec![OrphanReason::MissingParent, OrphanReason::ParentNotFolder]
        );
    }

    #[test]
    fn parent_cycles_are_broken_without_losing_nodes() {
        let folders = vec![
            NodeRecord::folder("a", "A").with_parent("b"),
            NodeRecord::folder("b", "B").with_parent("a"),
            NodeRecord::folder("self", "Self").with_parent("self"),
            NodeRecord::folder("c", "C").with_parent("a"),
        ];

        let forest = build_forest(&folders, &[]);

        assert_eq!(forest.len(), 4);
        assert!(!forest.has_duplicates());
        let a = forest.find("a").unwrap();
        assert_eq!(a.children.len(), 1);
        assert_eq!(a.children[0].id(), "c");
        assert_eq!(
            forest
                .orphans
                .iter()
                .filter(|o| o.reason == OrphanReason::ParentCycle)
                .count(),
            3
        );
    }

    #[test]
    fn duplicate_ids_across_collections_prefer_folder_parent() {
        let folders = vec![NodeRecord::folder("x", "Folder X")];
        let documents = vec![
            NodeRecord::document("x", "Doc X").with_order(1),
            NodeRecord::document("child", "Child").with_parent("x"),
        ];

        let forest = build_forest(&folders, &documents);

        assert_eq!(forest.len(), 3);
        let folder = forest.roots.iter().find(|node| node.is_folder()).unwrap();
        assert_eq!(folder.children[0].id(), "child");
    }
}
