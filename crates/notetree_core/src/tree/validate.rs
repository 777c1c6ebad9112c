//! Move validator for structural invariants.
//!
//! # Responsibility
//! - Accept a destination only when it is the root or an existing folder.
//! - Reject moves that would place a folder inside itself or its subtree.
//!
//! # Invariants
//! - Checks read the given forest only; they never write.
//! - The descendant check walks downward from the moving node.

use super::forest::{Forest, Node};
use crate::model::node::NodeId;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Reasons a move or insert destination is refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveRejection {
    /// Moving node is not in the current forest.
    NodeNotFound(NodeId),
    /// Destination id is not in the current forest.
    DestinationNotFound(NodeId),
    /// Destination exists but is a document.
    DestinationNotFolder(NodeId),
    /// Destination is the moving folder or one of its descendants.
    Cycle {
        node_id: NodeId,
        destination_id: NodeId,
    },
}

impl Display for MoveRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::DestinationNotFound(id) => write!(f, "destination folder not found: {id}"),
            Self::DestinationNotFolder(id) => write!(f, "destination must be a folder: {id}"),
            Self::Cycle {
                node_id,
                destination_id,
            } => write!(
                f,
                "move would create cycle: node {node_id} under {destination_id}"
            ),
        }
    }
}

impl Error for MoveRejection {}

/// Checks that `parent_id` is the root or an existing folder.
pub fn validate_parent(forest: &Forest, parent_id: Option<&str>) -> Result<(), MoveRejection> {
    let Some(parent_id) = parent_id else {
        return Ok(());
    };
    destination_folder(forest, parent_id).map(|_| ())
}

/// Checks whether `node_id` may move under `destination`.
pub fn validate_move(
    forest: &Forest,
    node_id: &str,
    destination: Option<&str>,
) -> Result<(), MoveRejection> {
    let node = forest
        .find(node_id)
        .ok_or_else(|| MoveRejection::NodeNotFound(node_id.to_string()))?;

    let Some(destination_id) = destination else {
        return Ok(());
    };
    destination_folder(forest, destination_id)?;

    if node.is_folder() && node.contains(destination_id) {
        return Err(MoveRejection::Cycle {
            node_id: node_id.to_string(),
            destination_id: destination_id.to_string(),
        });
    }
    Ok(())
}

fn destination_folder<'a>(forest: &'a Forest, id: &str) -> Result<&'a Node, MoveRejection> {
    let destination = forest
        .find(id)
        .ok_or_else(|| MoveRejection::DestinationNotFound(id.to_string()))?;
    if !destination.is_folder() {
        return Err(MoveRejection::DestinationNotFolder(id.to_string()));
    }
    Ok(destination)
}

/// One entry of a move-destination picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// `None` is the root.
    pub id: Option<NodeId>,
    pub label: String,
    /// Folder depth; root entry and root-level folders are 0.
    pub depth: usize,
}

/// Lists every destination `node_id` may move to: the root first, then
/// folders in pre-order, excluding the node itself and its subtree.
pub fn available_destinations(forest: &Forest, node_id: &str) -> Vec<Destination> {
    let mut destinations = vec![Destination {
        id: None,
        label: String::new(),
        depth: 0,
    }];

    let mut stack: Vec<(&Node, usize)> = forest.roots.iter().rev().map(|node| (node, 0)).collect();
    while let Some((node, depth)) = stack.pop() {
        if !node.is_folder() || node.id() == node_id {
            continue;
        }
        destinations.push(Destination {
            id: Some(node.id().to_string()),
            label: node.record.label.clone(),
            depth,
        });
        stack.extend(node.children.iter().rev().map(|child| (child, depth + 1)));
    }
    destinations
}

#[cfg(test)]
mod tests {
    use super::{available_destinations, validate_move, validate_parent, MoveRejection};
    use crate::model::node::NodeRecord;
    use crate::tree::builder::build_forest;
    use crate::tree::forest::Forest;

    fn fixture() -> Forest {
        let folders = vec![
            NodeRecord::folder("a", "A").with_order(0),
            NodeRecord::folder("b", "B").with_parent("a"),
            NodeRecord::folder("c", "C").with_parent("b"),
            NodeRecord::folder("z", "Z").with_order(1),
        ];
        let documents = vec![NodeRecord::document("d", "D").with_parent("c")];
        build_forest(&folders, &documents)
    }

    #[test]
    fn rejects_self_and_descendants() {
        let forest = fixture();
        for destination in ["a", "b", "c"] {
            assert!(matches!(
                validate_move(&forest, "a", Some(destination)),
                Err(MoveRejection::Cycle { .. })
            ));
        }
        assert_eq!(validate_move(&forest, "c", Some("a")), Ok(()));
    }

    #[test]
    fn rejects_document_and_missing_destinations() {
        let forest = fixture();
        assert_eq!(
            validate_move(&forest, "z", Some("d")),
            Err(MoveRejection::DestinationNotFolder("d".to_string()))
        );
        assert_eq!(
            validate_move(&forest, "z", Some("nope")),
            Err(MoveRejection::DestinationNotFound("nope".to_string()))
        );
        assert_eq!(
            validate_move(&forest, "nope", None),
            Err(MoveRejection::NodeNotFound("nope".to_string()))
        );
        assert_eq!(validate_parent(&forest, None), Ok(()));
    }

    #[test]
    fn documents_may_move_anywhere_a_folder_exists() {
        let forest = fixture();
        assert_eq!(validate_move(&forest, "d", None), Ok(()));
        assert_eq!(validate_move(&forest, "d", Some("z")), Ok(()));
    }

    #[test]
    fn destinations_exclude_subtree() {
        let forest = fixture();
        let destinations = available_destinations(&forest, "b");
        let ids: Vec<Option<&str>> = destinations.iter().map(|d| d.id.as_deref()).collect();
        assert_eq!(ids, vec![None, Some("a"), Some("z")]);
    }
}
