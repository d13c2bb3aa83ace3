// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use vext_core::HandlerStatusKind;

fn temp_paths(dir: &tempfile::TempDir) -> HandlerPaths {
    HandlerPaths::new(dir.path(), dir.path().join("log"), "Foo", "1.0.0")
}

#[test]
fn missing_state_file_reads_as_not_installed() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(get_handler_state(&temp_paths(&dir)), HandlerState::NotInstalled);
}

#[test]
fn state_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let paths = temp_paths(&dir);
    set_handler_state(&paths, HandlerState::Enabled);
    assert_eq!(get_handler_state(&paths), HandlerState::Enabled);

    set_handler_state(&paths, HandlerState::Installed);
    assert_eq!(get_handler_state(&paths), HandlerState::Installed);
}

#[test]
fn set_state_creates_config_dir_with_private_mode() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let paths = temp_paths(&dir);
    set_handler_state(&paths, HandlerState::NotInstalled);

    let meta = fs::metadata(paths.conf_dir()).unwrap();
    assert_eq!(meta.permissions().mode() & 0o777, 0o700);
}

#[test]
fn status_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let paths = temp_paths(&dir);
    assert!(get_handler_status(&paths).is_none());

    let mut status = HandlerStatus::new("Foo", "1.0.0");
    status.status = HandlerStatusKind::Ready;
    status.message = "Plugin enabled".to_string();
    set_handler_status(&paths, &status);

    assert_eq!(get_handler_status(&paths), Some(status));
}

#[test]
fn malformed_status_record_reads_as_none() {
    let dir = tempfile::tempdir().unwrap();
    let paths = temp_paths(&dir);
    fs::create_dir_all(paths.conf_dir()).unwrap();
    fs::write(paths.status_record_file(), "{not json").unwrap();
    assert!(get_handler_status(&paths).is_none());
}

#[test]
fn migration_moves_legacy_files() {
    let dir = tempfile::tempdir().unwrap();
    let lib = dir.path();
    let paths = temp_paths(&dir);
    fs::create_dir_all(paths.conf_dir()).unwrap();

    let legacy = lib.join("handler_state/Foo-1.0.0");
    fs::create_dir_all(&legacy).unwrap();
    fs::write(legacy.join("state"), "Enabled").unwrap();
    fs::write(legacy.join("status"), r#"{"name":"Foo","version":"1.0.0","status":"Ready"}"#)
        .unwrap();

    migrate_handler_state(lib);

    assert_eq!(get_handler_state(&paths), HandlerState::Enabled);
    assert!(paths.status_record_file().is_file());
    assert!(!lib.join("handler_state").exists());
}

#[test]
fn migration_keeps_existing_destination_files() {
    let dir = tempfile::tempdir().unwrap();
    let lib = dir.path();
    let paths = temp_paths(&dir);
    set_handler_state(&paths, HandlerState::Installed);

    let legacy = lib.join("handler_state/Foo-1.0.0");
    fs::create_dir_all(&legacy).unwrap();
    fs::write(legacy.join("state"), "Enabled").unwrap();

    migrate_handler_state(lib);

    // Existing HandlerState wins over the legacy copy.
    assert_eq!(get_handler_state(&paths), HandlerState::Installed);
    assert!(!lib.join("handler_state").exists());
}

#[test]
fn migration_skips_handlers_without_config_dir() {
    let dir = tempfile::tempdir().unwrap();
    let lib = dir.path();

    let legacy = lib.join("handler_state/Gone-0.9");
    fs::create_dir_all(&legacy).unwrap();
    fs::write(legacy.join("state"), "Enabled").unwrap();

    migrate_handler_state(lib);

    assert!(!lib.join("Gone-0.9").exists());
    assert!(!lib.join("handler_state").exists());
}

#[test]
fn migration_without_legacy_dir_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    migrate_handler_state(dir.path());
}
