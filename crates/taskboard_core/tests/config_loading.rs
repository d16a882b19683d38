use taskboard_core::{BoardConfig, ConfigError};

#[test]
fn missing_settings_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = BoardConfig::load(dir.path().join("taskboard.json")).unwrap();

    assert_eq!(config, BoardConfig::default());
    assert_eq!(config.retention_ms(), 24 * 60 * 60 * 1000);
    assert_eq!(config.sweep_interval_ms(), 60 * 60 * 1000);
}

#[test]
fn saved_settings_load_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskboard.json");
    let config = BoardConfig {
        retention_hours: 12,
        sweep_interval_minutes: 15,
        task_end_offset_px: 32.0,
        log_level: Some("warn".to_string()),
        log_dir: Some(dir.path().join("logs")),
        database_path: Some(dir.path().join("board.sqlite3")),
    };

    config.save(&path).unwrap();
    let loaded = BoardConfig::load(&path).unwrap();

    assert_eq!(loaded, config);
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"retentionHours\": 12"));
}

#[test]
fn malformed_settings_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskboard.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(BoardConfig::load(&path), Err(ConfigError::Parse(_))));
}

#[test]
fn relative_log_dir_is_rejected() {
    let err = BoardConfig::from_json(r#"{ "logDir": "logs" }"#).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { field: "logDir", .. }));
}

#[test]
fn negative_end_offset_is_rejected() {
    let err = BoardConfig::from_json(r#"{ "taskEndOffsetPx": -4.0 }"#).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidValue {
            field: "taskEndOffsetPx",
            ..
        }
    ));
}
