use std::io::Write;

use graphload::{GraphLoadError, NumericLiteralMode, ReloadConfig, SqliteConfig};

#[test]
fn test_defaults() {
    let config = ReloadConfig::default();
    assert_eq!(config.batch_size, 100);
    assert_eq!(config.numeric_literals, NumericLiteralMode::Native);
    assert!(config.index_natural_keys);
    assert_eq!(SqliteConfig::default().delete_batch_size, 10_000);
    assert!(SqliteConfig::default().path.is_none());
}

#[test]
fn test_partial_json_keeps_defaults() {
    let config = ReloadConfig::from_json_str(r#"{"numeric_literals": "quoted_floats"}"#).unwrap();
    assert_eq!(config.numeric_literals, NumericLiteralMode::QuotedFloats);
    assert_eq!(config.batch_size, 100);
}

#[test]
fn test_zero_batch_size_rejected() {
    let err = ReloadConfig::from_json_str(r#"{"batch_size": 0}"#).unwrap_err();
    assert!(matches!(err, GraphLoadError::Config(_)));
}

#[test]
fn test_malformed_json_is_config_error() {
    let err = ReloadConfig::from_json_str("{batch_size: ").unwrap_err();
    assert!(matches!(err, GraphLoadError::Config(_)));
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"batch_size": 25, "index_natural_keys": false}}"#).unwrap();
    let config = ReloadConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.batch_size, 25);
    assert!(!config.index_natural_keys);
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ReloadConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, GraphLoadError::Config(_)));
}

#[test]
fn test_sqlite_config_validation() {
    let config = SqliteConfig {
        delete_batch_size: 0,
        ..SqliteConfig::default()
    };
    assert!(config.validate().is_err());

    let mut config = SqliteConfig::file("graph.db");
    config
        .pragma_settings
        .insert("journal_mode".into(), "WAL".into());
    assert!(config.validate().is_ok());
    config.pragma_settings.insert("bad name".into(), "1".into());
    assert!(matches!(config.validate(), Err(GraphLoadError::Config(_))));
}
