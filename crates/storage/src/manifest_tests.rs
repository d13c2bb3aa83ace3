// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

use vext_core::codes;

const MANIFEST: &str = r#"[{
    "name": "ExampleHandlerLinux",
    "version": 1.0,
    "handlerManifest": {
        "installCommand": "scripts/install.sh",
        "uninstallCommand": "scripts/uninstall.sh",
        "updateCommand": "scripts/update.sh",
        "enableCommand": "scripts/enable.sh",
        "disableCommand": "scripts/disable.sh",
        "reportHeartbeat": true
    }
}]"#;

fn temp_paths(dir: &tempfile::TempDir) -> HandlerPaths {
    let paths = HandlerPaths::new(dir.path(), dir.path().join("log"), "Foo", "1.0.0");
    fs::create_dir_all(paths.base_dir()).unwrap();
    paths
}

#[test]
fn load_manifest_reads_first_entry() {
    let dir = tempfile::tempdir().unwrap();
    let paths = temp_paths(&dir);
    fs::write(paths.manifest_file(), MANIFEST).unwrap();

    let man = load_manifest(&paths).unwrap();
    assert_eq!(man.install_command, "scripts/install.sh");
    assert_eq!(man.enable_command, "scripts/enable.sh");
    assert!(man.report_heartbeat);
    assert!(!man.continue_on_update_failure);
}

#[test]
fn load_manifest_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_manifest(&temp_paths(&dir)).unwrap_err();
    assert_eq!(err.code(), codes::PLUGIN_HANDLER_MANIFEST_NOT_FOUND);
}

#[yare::parameterized(
    not_json       = { "{not json" },
    not_an_array   = { r#"{"handlerManifest": {}}"# },
    empty_array    = { "[]" },
    missing_fields = { r#"[{"handlerManifest": {"installCommand": "i"}}]"# },
)]
fn load_manifest_malformed(contents: &str) {
    let dir = tempfile::tempdir().unwrap();
    let paths = temp_paths(&dir);
    fs::write(paths.manifest_file(), contents).unwrap();
    let err = load_manifest(&paths).unwrap_err();
    assert_eq!(err.code(), codes::PLUGIN_HANDLER_MANIFEST_DESERIALIZATION_ERROR);
}

#[yare::parameterized(
    absent             = { None, true },
    update_with_install = { Some("UpdateWithInstall"), true },
    case_insensitive   = { Some("updateWITHinstall"), true },
    update_without     = { Some("UpdateWithoutInstall"), false },
)]
fn update_with_install_flag(mode: Option<&str>, expected: bool) {
    let man = HandlerManifest {
        install_command: String::new(),
        uninstall_command: String::new(),
        update_command: String::new(),
        enable_command: String::new(),
        disable_command: String::new(),
        report_heartbeat: false,
        update_mode: mode.map(str::to_string),
        continue_on_update_failure: false,
    };
    assert_eq!(man.is_update_with_install(), expected);
}

#[test]
fn handler_env_names_the_four_locations() {
    let dir = tempfile::tempdir().unwrap();
    let paths = temp_paths(&dir);
    write_handler_env(&paths).unwrap();

    let text = fs::read_to_string(paths.env_file()).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    let entry = &doc.as_array().unwrap()[0];
    assert_eq!(entry["name"], "Foo");
    assert_eq!(entry["version"], 1.0);
    let env = &entry["handlerEnvironment"];
    assert_eq!(env["logFolder"], paths.log_dir().display().to_string());
    assert_eq!(env["configFolder"], paths.conf_dir().display().to_string());
    assert_eq!(env["statusFolder"], paths.status_dir().display().to_string());
    assert_eq!(env["heartbeatFile"], paths.heartbeat_file().display().to_string());
}
