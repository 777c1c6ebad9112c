use notetree_core::store::{MemoryStore, SqliteStore};
use notetree_core::{PostItError, PostItService, ValidationError};
use std::sync::Arc;

#[test]
fn add_list_update_delete_round() {
    let service = PostItService::new(Arc::new(SqliteStore::open_in_memory().unwrap()));

    let first = service.add(" Groceries ", "milk, eggs").unwrap();
    let second = service.add("Call", "dentist at 9").unwrap();
    assert_eq!(first.title, "Groceries");

    let titles: Vec<String> = service
        .list()
        .unwrap()
        .into_iter()
        .map(|item| item.title)
        .collect();
    assert_eq!(titles, vec!["Groceries".to_string(), "Call".to_string()]);

    let updated = service.update(&second.id, "Call", "dentist at 10").unwrap();
    assert_eq!(updated.text, "dentist at 10");
    assert_eq!(updated.created_at, second.created_at);

    service.delete(&first.id).unwrap();
    let remaining = service.list().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, second.id);
}

#[test]
fn filter_is_case_insensitive_over_title_and_text() {
    let service = PostItService::new(Arc::new(MemoryStore::new()));
    service.add("Groceries", "Milk and EGGS").unwrap();
    service.add("Ideas", "rust workspace layout").unwrap();

    let eggs: Vec<String> = service
        .filter("eggs")
        .unwrap()
        .into_iter()
        .map(|item| item.title)
        .collect();
    assert_eq!(eggs, vec!["Groceries".to_string()]);

    assert_eq!(service.filter("IDEA").unwrap().len(), 1);
    assert_eq!(service.filter("  ").unwrap().len(), 2);
    assert!(service.filter("absent").unwrap().is_empty());
}

#[test]
fn blank_fields_and_missing_targets_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    let service = PostItService::new(Arc::clone(&store));

    assert!(matches!(
        service.add("  ", "text"),
        Err(PostItError::Validation(ValidationError::BlankField("title")))
    ));
    assert!(matches!(
        service.add("title", ""),
        Err(PostItError::Validation(ValidationError::BlankField("text")))
    ));
    assert!(matches!(
        service.update("missing", "t", "x"),
        Err(PostItError::NotFound(_))
    ));
    assert_eq!(store.write_count(), 0);
}
