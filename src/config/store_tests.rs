//! Tests for the file-backed config store.

use super::*;

fn store_in(dir: &tempfile::TempDir) -> FileConfig {
    FileConfig::open(dir.path().join("store.toml")).unwrap()
}

#[test]
fn test_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    assert!(store.is_empty());
    assert!(!store.is_dirty());
}

#[test]
fn test_write_read_typed() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir);
    store.write("/Hotkeys/FrontEnd/Trigger", ConfigValue::String("Control+space".into())).unwrap();
    store.write("/Panel/Gtk/FontSize", ConfigValue::Int(12)).unwrap();

    assert_eq!(store.read_string("/Hotkeys/FrontEnd/Trigger").as_deref(), Some("Control+space"));
    assert_eq!(store.read_kind("/Panel/Gtk/FontSize", ConfigKind::Int), Some(ConfigValue::Int(12)));
    // Wrong type reads as absent.
    assert_eq!(store.read_kind("/Panel/Gtk/FontSize", ConfigKind::String), None);
    assert_eq!(store.read_kind("/Missing", ConfigKind::Int), None);
}

#[test]
fn test_invalid_keys_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir);
    for key in ["", "/", "relative", "/trailing/", "/a//b"] {
        assert!(matches!(store.write(key, ConfigValue::Bool(true)), Err(StoreError::InvalidKey(_))));
    }
    assert!(store.is_empty());
}

#[test]
fn test_flush_and_reopen_preserves_types() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir);
    store.write("/A/String", ConfigValue::String("x".into())).unwrap();
    store.write("/A/Int", ConfigValue::Int(-3)).unwrap();
    store.write("/A/Bool", ConfigValue::Bool(true)).unwrap();
    store.write("/A/Double", ConfigValue::Double(1.5)).unwrap();
    store.write("/A/Strings", ConfigValue::VectorString(vec!["a".into(), "b".into()])).unwrap();
    store.write("/A/Ints", ConfigValue::VectorInt(vec![1, 2, 3])).unwrap();
    assert!(store.is_dirty());
    store.flush().unwrap();
    assert!(!store.is_dirty());

    let reopened = store_in(&dir);
    assert_eq!(reopened.len(), 6);
    assert_eq!(reopened.read("/A/Int"), Some(&ConfigValue::Int(-3)));
    assert_eq!(reopened.read("/A/Bool"), Some(&ConfigValue::Bool(true)));
    assert_eq!(reopened.read("/A/Double"), Some(&ConfigValue::Double(1.5)));
    assert_eq!(reopened.read("/A/Ints"), Some(&ConfigValue::VectorInt(vec![1, 2, 3])));
    assert_eq!(
        reopened.read("/A/Strings"),
        Some(&ConfigValue::VectorString(vec!["a".into(), "b".into()]))
    );
}

#[test]
fn test_flush_and_reopen_keeps_empty_vector_types() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir);
    store.write("/Panel/Gtk/Colors", ConfigValue::VectorInt(Vec::new())).unwrap();
    store.write("/Panel/Gtk/Fonts", ConfigValue::VectorString(Vec::new())).unwrap();
    store.flush().unwrap();

    let reopened = store_in(&dir);
    assert_eq!(reopened.read("/Panel/Gtk/Colors"), Some(&ConfigValue::VectorInt(Vec::new())));
    assert_eq!(
        reopened.read_kind("/Panel/Gtk/Colors", ConfigKind::VectorInt),
        Some(ConfigValue::VectorInt(Vec::new()))
    );
    assert_eq!(reopened.read_kind("/Panel/Gtk/Fonts", ConfigKind::VectorString), Some(ConfigValue::VectorString(Vec::new())));
}

#[test]
fn test_file_layout_is_one_table_per_type() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.toml");
    std::fs::write(&path, "[int]\n\"/Panel/Gtk/FontSize\" = 12\n\n[vector-int]\n\"/Panel/Gtk/Colors\" = []\n").unwrap();
    let store = FileConfig::open(&path).unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(store.read("/Panel/Gtk/FontSize"), Some(&ConfigValue::Int(12)));
    assert_eq!(store.read("/Panel/Gtk/Colors"), Some(&ConfigValue::VectorInt(Vec::new())));

    // A value outside any type table is rejected rather than guessed.
    std::fs::write(&path, "\"/Panel/Gtk/FontSize\" = 12\n").unwrap();
    assert!(matches!(FileConfig::open(&path), Err(StoreError::Parse { .. })));
}

#[test]
fn test_reload_drops_unflushed_changes() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir);
    store.write("/Kept", ConfigValue::Int(1)).unwrap();
    store.flush().unwrap();

    store.write("/Lost", ConfigValue::Int(2)).unwrap();
    assert!(store.erase("/Kept"));
    store.reload().unwrap();
    assert_eq!(store.read("/Kept"), Some(&ConfigValue::Int(1)));
    assert_eq!(store.read("/Lost"), None);
    assert!(!store.erase("/Lost"));
}

#[test]
fn test_unchanged_write_is_not_dirty() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir);
    store.write("/Same", ConfigValue::Bool(false)).unwrap();
    store.flush().unwrap();
    store.write("/Same", ConfigValue::Bool(false)).unwrap();
    assert!(!store.is_dirty());
}

#[test]
fn test_corrupt_file_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.toml");
    std::fs::write(&path, "not = [valid").unwrap();
    assert!(matches!(FileConfig::open(&path), Err(StoreError::Parse { .. })));
}
