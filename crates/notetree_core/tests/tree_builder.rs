use notetree_core::model::node::{NodeKind, NodeRecord};
use notetree_core::tree::{build_forest, Forest, Node, OrphanReason};
use proptest::prelude::*;
use std::collections::HashSet;

/// Random flat snapshot: folder and document ids are unique within their
/// collection; parents point at folders, documents, nothing or a ghost id.
fn snapshot() -> impl Strategy<Value = (Vec<NodeRecord>, Vec<NodeRecord>)> {
    (0usize..10, 0usize..10).prop_flat_map(|(folders, documents)| {
        let total = folders + documents;
        proptest::collection::vec((0..total + 2, 0i64..4), total).prop_map(move |slots| {
            let parent_for = |choice: usize| -> Option<String> {
                if choice < folders {
                    Some(format!("f{choice}"))
                } else if choice < total {
                    Some(format!("d{}", choice - folders))
                } else if choice == total {
                    None
                } else {
                    Some("ghost".to_string())
                }
            };

            let mut folder_records = Vec::new();
            let mut document_records = Vec::new();
            for (index, (parent, order)) in slots.into_iter().enumerate() {
                let mut record = if index < folders {
                    NodeRecord::folder(format!("f{index}"), "F")
                } else {
                    NodeRecord::document(format!("d{}", index - folders), "D")
                };
                record.parent_id = parent_for(parent);
                record.order = order;
                if record.is_folder() {
                    folder_records.push(record);
                } else {
                    document_records.push(record);
                }
            }
            (folder_records, document_records)
        })
    })
}

fn assert_siblings_sorted(nodes: &[Node]) {
    for pair in nodes.windows(2) {
        let left = (pair[0].record.order, pair[0].id(), pair[0].kind());
        let right = (pair[1].record.order, pair[1].id(), pair[1].kind());
        assert!(left < right, "siblings out of order: {left:?} before {right:?}");
    }
    for node in nodes {
        if !node.is_folder() {
            assert!(node.children.is_empty(), "document {} has children", node.id());
        }
        for child in &node.children {
            assert_eq!(child.record.parent_id.as_deref(), Some(node.id()));
        }
        assert_siblings_sorted(&node.children);
    }
}

fn membership(forest: &Forest) -> HashSet<(String, NodeKind)> {
    forest
        .iter()
        .map(|node| (node.id().to_string(), node.kind()))
        .collect()
}

proptest! {
    #[test]
    fn building_twice_yields_identical_forests((folders, documents) in snapshot()) {
        let first = build_forest(&folders, &documents);
        let second = build_forest(&folders, &documents);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn every_record_appears_exactly_once((folders, documents) in snapshot()) {
        let forest = build_forest(&folders, &documents);

        prop_assert_eq!(forest.len(), folders.len() + documents.len());
        prop_assert!(!forest.has_duplicates());
        let expected: HashSet<(String, NodeKind)> = folders
            .iter()
            .chain(documents.iter())
            .map(|record| (record.id.clone(), record.kind))
            .collect();
        prop_assert_eq!(membership(&forest), expected);
    }

    #[test]
    fn nesting_follows_declared_folder_parents((folders, documents) in snapshot()) {
        let forest = build_forest(&folders, &documents);
        assert_siblings_sorted(&forest.roots);

        let recovered: HashSet<&str> = forest
            .orphans
            .iter()
            .map(|orphan| orphan.node_id.as_str())
            .collect();
        for root in &forest.roots {
            if root.record.parent_id.is_some() {
                prop_assert!(recovered.contains(root.id()));
            }
        }
    }

    #[test]
    fn input_order_does_not_matter((folders, documents) in snapshot()) {
        let mut reversed_folders = folders.clone();
        let mut reversed_documents = documents.clone();
        reversed_folders.reverse();
        reversed_documents.reverse();

        prop_assert_eq!(
            build_forest(&folders, &documents),
            build_forest(&reversed_folders, &reversed_documents)
        );
    }
}

#[test]
fn self_parented_folder_and_document_parent_are_recovered() {
    let folders = vec![NodeRecord::folder("loop", "Loop").with_parent("loop")];
    let documents = vec![
        NodeRecord::document("note", "Note").with_order(1),
        NodeRecord::document("inner", "Inner")
            .with_parent("note")
            .with_order(2),
    ];

    let forest = build_forest(&folders, &documents);

    assert_eq!(forest.ids(), vec!["loop", "note", "inner"]);
    let reasons: Vec<(&str, OrphanReason)> = forest
        .orphans
        .iter()
        .map(|orphan| (orphan.node_id.as_str(), orphan.reason))
        .collect();
    assert!(reasons.contains(&("loop", OrphanReason::ParentCycle)));
    assert!(reasons.contains(&("inner", OrphanReason::ParentNotFolder)));
}

#[test]
fn empty_snapshot_builds_empty_forest() {
    let forest = build_forest(&[], &[]);
    assert!(forest.is_empty());
    assert!(forest.orphans.is_empty());
}
