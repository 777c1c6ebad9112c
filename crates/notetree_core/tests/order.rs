use notetree_core::model::node::NodeKind;
use notetree_core::tree::order::{
    apply_patches, clamp_index, compact, display_position, order_from_display, reorder,
    SiblingEntry,
};
use proptest::prelude::*;

fn entry(id: String, order: i64) -> SiblingEntry {
    SiblingEntry {
        id,
        kind: NodeKind::Document,
        order,
    }
}

/// Sibling list sorted the way the builder sorts it, with arbitrary (possibly
/// sparse or duplicated) stored orders.
fn siblings() -> impl Strategy<Value = Vec<SiblingEntry>> {
    proptest::collection::vec(0i64..20, 0..12).prop_map(|orders| {
        let mut entries: Vec<SiblingEntry> = orders
            .into_iter()
            .enumerate()
            .map(|(index, order)| entry(format!("s{index:02}"), order))
            .collect();
        entries.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        entries
    })
}

proptest! {
    #[test]
    fn reorder_yields_dense_orders_with_mover_at_clamped_index(
        siblings in siblings(),
        moving_order in -5i64..30,
        target in -5i64..20,
    ) {
        let moving = entry("moving".to_string(), moving_order);
        let patches = reorder(&siblings, &moving, target);

        let mut applied = siblings.clone();
        applied.push(moving.clone());
        apply_patches(&mut applied, &patches);

        let orders: Vec<i64> = applied.iter().map(|e| e.order).collect();
        let expected: Vec<i64> = (0..applied.len() as i64).collect();
        prop_assert_eq!(orders, expected);

        let position = applied.iter().position(|e| e.id == "moving").unwrap();
        prop_assert_eq!(position, clamp_index(target, siblings.len()));

        let others: Vec<&str> = applied
            .iter()
            .filter(|e| e.id != "moving")
            .map(|e| e.id.as_str())
            .collect();
        let original: Vec<&str> = siblings.iter().map(|e| e.id.as_str()).collect();
        prop_assert_eq!(others, original);
    }

    #[test]
    fn reorder_patches_only_entries_that_change(
        siblings in siblings(),
        target in 0i64..12,
    ) {
        let moving = entry("moving".to_string(), 99);
        let patches = reorder(&siblings, &moving, target);
        for patch in &patches {
            let before = siblings
                .iter()
                .find(|e| e.id == patch.id)
                .map_or(moving.order, |e| e.order);
            prop_assert_ne!(before, patch.new_order);
        }
    }

    #[test]
    fn compact_yields_dense_orders_and_keeps_sequence(siblings in siblings()) {
        let mut applied = siblings.clone();
        apply_patches(&mut applied, &compact(&siblings));

        let orders: Vec<i64> = applied.iter().map(|e| e.order).collect();
        let expected: Vec<i64> = (0..siblings.len() as i64).collect();
        prop_assert_eq!(orders, expected);
        let ids: Vec<&str> = applied.iter().map(|e| e.id.as_str()).collect();
        let original: Vec<&str> = siblings.iter().map(|e| e.id.as_str()).collect();
        prop_assert_eq!(ids, original);
    }

    #[test]
    fn display_position_round_trips(order in 0i64..10_000) {
        prop_assert_eq!(order_from_display(display_position(order)), Ok(order));
    }
}

#[test]
fn moving_within_same_list_keeps_length() {
    let siblings = vec![
        entry("a".to_string(), 0),
        entry("b".to_string(), 1),
        entry("c".to_string(), 2),
    ];
    let moving = siblings[2].clone();
    let mut applied = siblings.clone();
    apply_patches(&mut applied, &reorder(&siblings, &moving, 0));

    let ids: Vec<&str> = applied.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "a", "b"]);
}
