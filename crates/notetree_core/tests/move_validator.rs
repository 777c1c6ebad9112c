use notetree_core::model::node::NodeRecord;
use notetree_core::tree::validate::{available_destinations, validate_move, validate_parent};
use notetree_core::tree::{build_forest, Forest, MoveRejection};
use proptest::prelude::*;

/// Random acyclic folder hierarchy: folder `i` hangs under the root or an
/// earlier folder, so chains of any depth up to the folder count appear.
fn folder_forest() -> impl Strategy<Value = Forest> {
    proptest::collection::vec(any::<prop::sample::Index>(), 1..16).prop_map(|parents| {
        let folders: Vec<NodeRecord> = parents
            .iter()
            .enumerate()
            .map(|(index, parent)| {
                let record = NodeRecord::folder(format!("f{index}"), "F").with_order(index as i64);
                // Slot `index` means root; anything below names an earlier folder.
                match parent.index(index + 1) {
                    slot if slot == index => record,
                    slot => record.with_parent(format!("f{slot}")),
                }
            })
            .collect();
        build_forest(&folders, &[])
    })
}

proptest! {
    #[test]
    fn folder_moves_into_own_subtree_are_rejected(forest in folder_forest()) {
        let ids: Vec<String> = forest.iter().map(|node| node.id().to_string()).collect();
        for id in &ids {
            let node = forest.find(id).unwrap();
            for destination in &ids {
                let result = validate_move(&forest, id, Some(destination.as_str()));
                if node.contains(destination) {
                    let is_cycle = matches!(result, Err(MoveRejection::Cycle { .. }));
                    prop_assert!(is_cycle);
                } else {
                    prop_assert_eq!(result, Ok(()));
                }
            }
            prop_assert_eq!(validate_move(&forest, id, None), Ok(()));
        }
    }

    #[test]
    fn destinations_match_validator(forest in folder_forest()) {
        for node in forest.iter() {
            let destinations = available_destinations(&forest, node.id());
            prop_assert_eq!(destinations[0].id.as_deref(), None);
            for destination in forest.iter() {
                let listed = destinations
                    .iter()
                    .any(|entry| entry.id.as_deref() == Some(destination.id()));
                let allowed = validate_move(&forest, node.id(), Some(destination.id())).is_ok();
                prop_assert_eq!(listed, allowed);
            }
        }
    }
}

#[test]
fn deep_chain_rejects_every_descendant() {
    let mut folders = vec![NodeRecord::folder("f0", "Top")];
    for depth in 1..64 {
        folders.push(
            NodeRecord::folder(format!("f{depth}"), "Nested").with_parent(format!("f{}", depth - 1)),
        );
    }
    let forest = build_forest(&folders, &[]);

    for depth in 0..64 {
        assert!(matches!(
            validate_move(&forest, "f0", Some(format!("f{depth}").as_str())),
            Err(MoveRejection::Cycle { .. })
        ));
    }
    assert_eq!(validate_move(&forest, "f63", Some("f0")), Ok(()));
}

#[test]
fn parent_must_be_existing_folder() {
    let folders = vec![NodeRecord::folder("f", "F")];
    let documents = vec![NodeRecord::document("d", "D").with_parent("f")];
    let forest = build_forest(&folders, &documents);

    assert_eq!(validate_parent(&forest, Some("f")), Ok(()));
    assert_eq!(
        validate_parent(&forest, Some("d")),
        Err(MoveRejection::DestinationNotFolder("d".to_string()))
    );
    assert_eq!(
        validate_parent(&forest, Some("missing")),
        Err(MoveRejection::DestinationNotFound("missing".to_string()))
    );
}
