use notetree_core::store::{DocumentStore, MemoryStore, StoreError, EDITOR_CONTENT};
use notetree_core::{ScratchpadError, ScratchpadService};
use serde_json::json;
use std::sync::Arc;

#[test]
fn load_without_save_is_empty() {
    let service = ScratchpadService::new(Arc::new(MemoryStore::new()));
    assert_eq!(service.load().unwrap(), "");
    assert_eq!(service.updated_at().unwrap(), None);
}

#[test]
fn save_overwrites_content_and_keeps_foreign_fields() {
    let store = Arc::new(MemoryStore::new());
    let mut foreign = serde_json::Map::new();
    foreign.insert("theme".to_string(), json!("dark"));
    store.seed(EDITOR_CONTENT, "current", 0, foreign);
    let service = ScratchpadService::new(Arc::clone(&store));

    service.save("first draft").unwrap();
    service.save("second draft\n").unwrap();

    assert_eq!(service.load().unwrap(), "second draft\n");
    assert!(service.updated_at().unwrap().is_some());
    let record = store.get(EDITOR_CONTENT, "current").unwrap().unwrap();
    assert_eq!(record.str_field("theme"), Some("dark"));
}

#[test]
fn storage_failures_surface_as_errors() {
    let store = Arc::new(MemoryStore::new());
    store.fail_all_writes(true);
    let service = ScratchpadService::new(store);

    assert!(matches!(
        service.save("lost"),
        Err(ScratchpadError::Storage(StoreError::Unavailable(_)))
    ));
}
