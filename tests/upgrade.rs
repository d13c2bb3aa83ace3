// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upgrade choreography between an installed version and a new one.

use vext_adapters::manifest_json;
use vext_core::{HandlerState, HandlerStatusKind};
use vext_storage::{get_handler_state, get_handler_status};

use crate::helpers::{commands_for, handler, World};

const DISABLE_FAILED_VAR: &str = "AZURE_GUEST_AGENT_DISABLE_FAILED";
const UNINSTALL_FAILED_VAR: &str = "AZURE_GUEST_AGENT_UNINSTALL_FAILED";

fn seed_upgrade_world(world: &World, continue_on_update_failure: bool) {
    let old = world.install_on_disk("Foo", "1.0.0", HandlerState::Enabled);
    std::fs::write(old.mrseq_file(), "3").unwrap();
    std::fs::write(old.status_file(3), r#"[{"status": {"status": "success"}}]"#).unwrap();

    world.seed_package("Foo", "1.0.0", "http://mirror-a/Foo__1.0.0");
    world.seed_package_with_manifest(
        "Foo",
        "1.1.0",
        "http://mirror-a/Foo__1.1.0",
        &manifest_json(continue_on_update_failure),
    );
    world.set_goal(vec![handler("Foo", "1.1.0", "enabled")], "etag-1");
}

#[tokio::test]
async fn clean_upgrade_runs_the_full_sequence() {
    let world = World::new();
    seed_upgrade_world(&world, false);

    world.orchestrator().run().await;

    let commands = world.exec.commands();
    let old_base = world.paths("Foo", "1.0.0").base_dir().display().to_string();
    let new_base = world.paths("Foo", "1.1.0").base_dir().display().to_string();
    let expected = [
        (old_base.clone(), "bin/disable.sh"),
        (new_base.clone(), "bin/update.sh"),
        (old_base.clone(), "bin/uninstall.sh"),
        (new_base.clone(), "bin/install.sh"),
        (new_base.clone(), "bin/enable.sh"),
    ];
    assert_eq!(commands.len(), expected.len());
    for (command, (base, script)) in commands.iter().zip(expected.iter()) {
        assert!(command.starts_with(base.as_str()), "{command} should start with {base}");
        assert!(command.ends_with(script), "{command} should end with {script}");
    }

    // Update ran against the new version, cleanly.
    let update_call = &world.exec.calls()[1];
    assert_eq!(update_call.env_var("VERSION"), Some("1.1.0"));
    assert_eq!(update_call.env_var(DISABLE_FAILED_VAR), None);

    // mrseq and status files carried over before the update ran.
    let new_paths = world.paths("Foo", "1.1.0");
    assert_eq!(std::fs::read_to_string(new_paths.mrseq_file()).unwrap(), "3");
    assert!(new_paths.status_file(3).is_file());

    // The old tree is gone, the new one is enabled.
    assert!(!world.paths("Foo", "1.0.0").base_dir().exists());
    assert_eq!(get_handler_state(&new_paths), HandlerState::Enabled);
}

#[tokio::test]
async fn failed_disable_with_continue_on_update_failure() {
    let world = World::new();
    seed_upgrade_world(&world, true);
    world.exec.fail_matching("Foo-1.0.0/bin/disable.sh", 1);

    world.orchestrator().run().await;

    // The sequence still completes, with the failure surfaced in the
    // update environment.
    let update_call = world
        .exec
        .calls()
        .into_iter()
        .find(|c| c.command.ends_with("bin/update.sh"))
        .unwrap();
    assert_eq!(update_call.env_var(DISABLE_FAILED_VAR), Some("1"));
    assert_eq!(update_call.env_var("VERSION"), Some("1.1.0"));

    // Status files still copied despite the failed disable.
    assert!(world.paths("Foo", "1.1.0").status_file(3).is_file());

    // uninstall succeeded, so install and enable run without the flag.
    let enable_call = world
        .exec
        .calls()
        .into_iter()
        .find(|c| c.command.ends_with("bin/enable.sh"))
        .unwrap();
    assert_eq!(enable_call.env_var(UNINSTALL_FAILED_VAR), None);

    assert!(!world.paths("Foo", "1.0.0").base_dir().exists());
    assert_eq!(get_handler_state(&world.paths("Foo", "1.1.0")), HandlerState::Enabled);

    // The old version reported the disable failure.
    let failures: Vec<_> =
        world.telemetry.events().into_iter().filter(|e| !e.is_success).collect();
    assert!(failures.iter().any(|e| e.version == "1.0.0" && e.message.contains("ContinueOnUpdate: true")));
}

#[tokio::test]
async fn failed_disable_without_continue_on_update_failure_is_fatal() {
    let world = World::new();
    seed_upgrade_world(&world, false);
    world.exec.fail_matching("Foo-1.0.0/bin/disable.sh", 1);

    world.orchestrator().run().await;

    // Nothing ran on the new version.
    assert!(commands_for(&world.exec, "Foo-1.1.0").is_empty());

    // The new version's status carries the update error.
    let status = get_handler_status(&world.paths("Foo", "1.1.0")).unwrap();
    assert_eq!(status.status, HandlerStatusKind::NotReady);
    assert!(status.message.contains("ContinueOnUpdate: false"));

    // Only the old version reported the event; the new one stays quiet.
    let failures: Vec<_> =
        world.telemetry.events().into_iter().filter(|e| !e.is_success && e.name == "Foo").collect();
    assert!(failures.iter().all(|e| e.version == "1.0.0"));

    // The old tree survives for the next attempt.
    assert!(world.paths("Foo", "1.0.0").base_dir().is_dir());
}

#[tokio::test]
async fn failed_uninstall_is_surfaced_to_install_and_enable() {
    let world = World::new();
    seed_upgrade_world(&world, true);
    world.exec.fail_matching("Foo-1.0.0/bin/uninstall.sh", 1);

    world.orchestrator().run().await;

    let install_call = world
        .exec
        .calls()
        .into_iter()
        .find(|c| c.command.ends_with("bin/install.sh"))
        .unwrap();
    assert_eq!(install_call.env_var(UNINSTALL_FAILED_VAR), Some("1"));

    let enable_call = world
        .exec
        .calls()
        .into_iter()
        .find(|c| c.command.ends_with("bin/enable.sh"))
        .unwrap();
    assert_eq!(enable_call.env_var(UNINSTALL_FAILED_VAR), Some("1"));

    assert_eq!(get_handler_state(&world.paths("Foo", "1.1.0")), HandlerState::Enabled);
}

#[tokio::test]
async fn downgrade_runs_update_in_the_old_directory() {
    let world = World::new();
    world.install_on_disk("Foo", "1.2.0", HandlerState::Enabled);
    world.seed_package("Foo", "1.1.0", "http://mirror-a/Foo__1.1.0");
    world.seed_package("Foo", "1.2.0", "http://mirror-a/Foo__1.2.0");
    world.set_goal(vec![handler("Foo", "1.1.*", "enabled")], "etag-1");

    world.orchestrator().run().await;

    let update_call = world
        .exec
        .calls()
        .into_iter()
        .find(|c| c.command.ends_with("bin/update.sh"))
        .unwrap();
    // The OLD (1.2.0) directory runs update, with the NEW version string.
    let old_base = world.paths("Foo", "1.2.0").base_dir().display().to_string();
    assert!(update_call.command.starts_with(&old_base));
    assert_eq!(update_call.env_var("VERSION"), Some("1.1.0"));

    assert!(!world.paths("Foo", "1.2.0").base_dir().exists());
    assert_eq!(get_handler_state(&world.paths("Foo", "1.1.0")), HandlerState::Enabled);
}

#[tokio::test]
async fn failed_update_pins_failed_state_and_stops() {
    let world = World::new();
    seed_upgrade_world(&world, false);
    world.exec.fail_matching("Foo-1.1.0/bin/update.sh", 1);

    world.orchestrator().run().await;

    // update failed on the new version: Failed state prevents retries.
    assert_eq!(get_handler_state(&world.paths("Foo", "1.1.0")), HandlerState::Failed);
    let status = get_handler_status(&world.paths("Foo", "1.1.0")).unwrap();
    assert!(!status.message.is_empty());

    // Neither install nor enable ran on the new version.
    let new_commands = commands_for(&world.exec, "Foo-1.1.0");
    assert_eq!(new_commands.len(), 1);
    assert!(new_commands[0].ends_with("bin/update.sh"));
}
