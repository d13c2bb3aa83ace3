// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn paths() -> HandlerPaths {
    HandlerPaths::new("/var/lib/vext", "/var/log/vext", "Foo", "1.0.0")
}

#[test]
fn base_layout() {
    let p = paths();
    assert_eq!(p.full_name(), "Foo-1.0.0");
    assert_eq!(p.base_dir(), Path::new("/var/lib/vext/Foo-1.0.0"));
    assert_eq!(p.conf_dir(), Path::new("/var/lib/vext/Foo-1.0.0/config"));
    assert_eq!(p.status_dir(), Path::new("/var/lib/vext/Foo-1.0.0/status"));
    assert_eq!(p.heartbeat_file(), Path::new("/var/lib/vext/Foo-1.0.0/heartbeat.log"));
    assert_eq!(p.manifest_file(), Path::new("/var/lib/vext/Foo-1.0.0/HandlerManifest.json"));
    assert_eq!(p.env_file(), Path::new("/var/lib/vext/Foo-1.0.0/HandlerEnvironment.json"));
    assert_eq!(p.mrseq_file(), Path::new("/var/lib/vext/Foo-1.0.0/mrseq"));
}

#[test]
fn config_and_status_files() {
    let p = paths();
    assert_eq!(p.state_file(), Path::new("/var/lib/vext/Foo-1.0.0/config/HandlerState"));
    assert_eq!(p.status_record_file(), Path::new("/var/lib/vext/Foo-1.0.0/config/HandlerStatus"));
    assert_eq!(p.settings_file(3), Path::new("/var/lib/vext/Foo-1.0.0/config/3.settings"));
    assert_eq!(p.status_file(3), Path::new("/var/lib/vext/Foo-1.0.0/status/3.status"));
}

#[test]
fn log_dir_is_shared_across_versions() {
    let p = paths();
    assert_eq!(p.log_dir(), Path::new("/var/log/vext/Foo"));
    assert_eq!(p.sibling("2.0.0").log_dir(), p.log_dir());
}

#[test]
fn pkg_file_sits_under_lib_root() {
    assert_eq!(paths().pkg_file(), Path::new("/var/lib/vext/Foo-1.0.0.zip"));
}

#[test]
fn sibling_changes_only_the_version() {
    let p = paths().sibling("1.1.0");
    assert_eq!(p.full_name(), "Foo-1.1.0");
    assert_eq!(p.base_dir(), Path::new("/var/lib/vext/Foo-1.1.0"));
    assert_eq!(p.name(), "Foo");
    assert_eq!(p.version(), "1.1.0");
}
