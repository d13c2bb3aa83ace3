// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn temp_paths(dir: &tempfile::TempDir) -> HandlerPaths {
    HandlerPaths::new(dir.path(), dir.path().join("log"), "Foo", "1.0.0")
}

fn ext(seq: i64) -> Extension {
    Extension {
        name: "ext".to_string(),
        sequence_number: Some(seq),
        public_settings: Some(serde_json::json!({"key": "value"})),
        protected_settings: Some("encrypted".to_string()),
        certificate_thumbprint: Some("ABC".to_string()),
    }
}

#[test]
fn writes_one_settings_file_per_extension() {
    let dir = tempfile::tempdir().unwrap();
    let paths = temp_paths(&dir);
    update_settings(&paths, &[ext(0), ext(1)]).unwrap();

    assert!(paths.settings_file(0).is_file());
    assert!(paths.settings_file(1).is_file());

    let doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(paths.settings_file(0)).unwrap()).unwrap();
    let handler_settings = &doc["runtimeSettings"][0]["handlerSettings"];
    assert_eq!(handler_settings["publicSettings"]["key"], "value");
    assert_eq!(handler_settings["protectedSettings"], "encrypted");
    assert_eq!(handler_settings["protectedSettingsCertThumbprint"], "ABC");
}

#[test]
fn no_extensions_writes_empty_zero_settings() {
    let dir = tempfile::tempdir().unwrap();
    let paths = temp_paths(&dir);
    update_settings(&paths, &[]).unwrap();

    let contents = fs::read_to_string(paths.settings_file(0)).unwrap();
    assert!(contents.is_empty());
}

#[test]
fn null_settings_serialize_as_null() {
    let dir = tempfile::tempdir().unwrap();
    let paths = temp_paths(&dir);
    let bare = Extension { sequence_number: Some(2), ..Extension::default() };
    update_settings(&paths, &[bare]).unwrap();

    let doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(paths.settings_file(2)).unwrap()).unwrap();
    assert!(doc["runtimeSettings"][0]["handlerSettings"]["publicSettings"].is_null());
}

#[test]
fn largest_seq_no_scans_settings_files() {
    let dir = tempfile::tempdir().unwrap();
    let paths = temp_paths(&dir);
    assert_eq!(largest_seq_no(&paths), -1);

    fs::create_dir_all(paths.conf_dir()).unwrap();
    fs::write(paths.settings_file(0), "").unwrap();
    fs::write(paths.settings_file(7), "").unwrap();
    fs::write(paths.settings_file(3), "").unwrap();
    fs::write(paths.conf_dir().join("HandlerState"), "Enabled").unwrap();
    fs::write(paths.conf_dir().join("junk.settings.bak"), "").unwrap();

    assert_eq!(largest_seq_no(&paths), 7);
}

#[test]
fn copy_status_files_moves_mrseq_and_statuses() {
    let dir = tempfile::tempdir().unwrap();
    let old = temp_paths(&dir);
    let new = old.sibling("1.1.0");
    fs::create_dir_all(old.status_dir()).unwrap();
    fs::create_dir_all(new.status_dir()).unwrap();
    fs::write(old.mrseq_file(), "4").unwrap();
    fs::write(old.status_file(3), "[]").unwrap();
    fs::write(old.status_file(4), "[]").unwrap();

    copy_status_files(&old, &new).unwrap();

    assert_eq!(fs::read_to_string(new.mrseq_file()).unwrap(), "4");
    assert!(new.status_file(3).is_file());
    assert!(new.status_file(4).is_file());
    // Originals stay in place; the old tree is removed separately.
    assert!(old.status_file(3).is_file());
}

#[test]
fn copy_status_files_without_old_artifacts_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let old = temp_paths(&dir);
    let new = old.sibling("1.1.0");
    copy_status_files(&old, &new).unwrap();
}
