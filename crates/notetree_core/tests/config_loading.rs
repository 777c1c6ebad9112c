use notetree_core::{default_log_level, load_config, ConfigError, EngineConfig};

#[test]
fn loads_file_and_resolves_relative_paths_next_to_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notetree.json");
    let log_dir = dir.path().join("logs");
    std::fs::write(
        &path,
        format!(
            r#"{{
                "log_level": "debug",
                "log_dir": {},
                "database_path": "data/tree.db",
                "expansion_state_path": "expansion.json"
            }}"#,
            serde_json::to_string(&log_dir).unwrap()
        ),
    )
    .unwrap();

    let config = load_config(&path).unwrap();

    assert_eq!(config.log_level, "debug");
    assert_eq!(config.log_dir, Some(log_dir));
    assert_eq!(config.database_path, Some(dir.path().join("data/tree.db")));
    assert_eq!(
        config.expansion_state_path,
        Some(dir.path().join("expansion.json"))
    );
}

#[test]
fn missing_file_and_bad_json_are_reported() {
    let dir = tempfile::tempdir().unwrap();

    let missing = load_config(&dir.path().join("absent.json"));
    assert!(matches!(missing, Err(ConfigError::Io { .. })));

    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ log_level: ").unwrap();
    assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
}

#[test]
fn default_config_follows_build_mode() {
    let config = EngineConfig::default();
    assert_eq!(config.log_level, default_log_level());
    assert!(config.database_path.is_none());
}
