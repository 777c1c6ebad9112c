//! Display projection of a forest.

use super::expansion::ExpansionState;
use crate::model::node::NodeRecord;
use crate::tree::order::display_position;
use crate::tree::{Forest, Node};

/// One forest node decorated for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayNode {
    pub record: NodeRecord,
    /// Depth; root nodes are 0.
    pub level: usize,
    /// Always `false` for documents.
    pub expanded: bool,
    pub children: Vec<DisplayNode>,
}

impl DisplayNode {
    /// One-based position among siblings, as shown to users.
    pub fn position(&self) -> u32 {
        display_position(self.record.order)
    }
}

/// Projects `forest` with levels and expansion flags.
pub fn project_forest(forest: &Forest, expansion: &ExpansionState) -> Vec<DisplayNode> {
    project_level(&forest.roots, 0, expansion)
}

fn project_level(nodes: &[Node], level: usize, expansion: &ExpansionState) -> Vec<DisplayNode> {
    nodes
        .iter()
        .map(|node| DisplayNode {
            record: node.record.clone(),
            level,
            expanded: node.is_folder() && expansion.is_expanded(node.id()),
            children: project_level(&node.children, level + 1, expansion),
        })
        .collect()
}

/// Pre-order rows a tree widget would show: children of collapsed folders
/// are skipped.
pub fn visible_rows(display: &[DisplayNode]) -> Vec<&DisplayNode> {
    let mut rows = Vec::new();
    let mut stack: Vec<&DisplayNode> = display.iter().rev().collect();
    while let Some(node) = stack.pop() {
        rows.push(node);
        if node.expanded {
            stack.extend(node.children.iter().rev());
        }
    }
    rows
}
