// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Download retry behavior and the download error gate.

use std::time::Duration;

use vext_adapters::TelemetryOp;
use vext_core::{codes, FakeClock, HandlerState};
use vext_engine::{DownloadPolicy, Orchestrator, OrchestratorOptions};
use vext_storage::get_handler_status;

use crate::helpers::{handler, World};

#[tokio::test]
async fn retry_exhaustion_over_shuffled_mirrors() {
    let world = World::new();
    world.dead_package("Foo", "1.0.0", &["http://mirror-a/pkg", "http://mirror-b/pkg"]);
    world.set_goal(vec![handler("Foo", "1.0.0", "enabled")], "etag-1");

    world.orchestrator().run().await;

    // 5 rounds over both mirrors, every attempt failing.
    let attempts = world.protocol.download_attempts();
    assert_eq!(attempts.len(), 10);
    assert_eq!(attempts.iter().filter(|u| u.contains("mirror-a")).count(), 5);
    assert_eq!(attempts.iter().filter(|u| u.contains("mirror-b")).count(), 5);

    // The handler status carries the download failure.
    let status = get_handler_status(&world.paths("Foo", "1.0.0")).unwrap();
    assert_eq!(status.code, codes::PLUGIN_MANIFEST_DOWNLOAD_ERROR);
    assert!(status.message.contains("Failed to download extension"));

    // No lifecycle command ever ran.
    assert!(world.exec.commands().is_empty());

    // The pass still reported VM status.
    assert_eq!(world.protocol.vm_reports().len(), 1);
}

#[tokio::test]
async fn persistent_fetch_failures_trigger_the_artifact_gate() {
    let world = World::new();
    world.protocol.set_fetch_error("endpoint unreachable");

    let clock = FakeClock::new();
    let opts = OrchestratorOptions::default()
        .poll_interval(Duration::from_millis(5))
        .download(DownloadPolicy { rounds: 1, retry_delay: Duration::from_millis(1) });
    let mut orchestrator = Orchestrator::with_clock(world.ctx.clone(), clock.clone(), opts);

    // Transient failures stay quiet; the aggregated event fires once the
    // incident persists past the gate window.
    orchestrator.run().await;
    assert!(world.telemetry.events_for_op(TelemetryOp::GetArtifactExtended).is_empty());

    for _ in 0..2 {
        clock.advance(Duration::from_secs(6 * 60));
        orchestrator.run().await;
    }

    let extended = world.telemetry.events_for_op(TelemetryOp::GetArtifactExtended);
    assert_eq!(extended.len(), 1);
    assert!(extended[0].message.contains("Failed to get extension artifact for over"));

    // The gate reset with the event; the next failure starts a new window.
    orchestrator.run().await;
    assert_eq!(world.telemetry.events_for_op(TelemetryOp::GetArtifactExtended).len(), 1);
}

#[tokio::test]
async fn download_recovers_on_a_later_pass() {
    let world = World::new();
    world.dead_package("Foo", "1.0.0", &["http://mirror-a/Foo__1.0.0"]);
    world.set_goal(vec![handler("Foo", "1.0.0", "enabled")], "etag-1");

    let mut orchestrator = world.orchestrator();
    orchestrator.run().await;
    assert!(world.exec.commands().is_empty());

    // The mirror comes back with real bytes; a new incarnation retries.
    let zip = vext_adapters::make_package_zip(&[(
        "HandlerManifest.json",
        &vext_adapters::manifest_json(false),
    )]);
    world.protocol.add_download("http://mirror-a/Foo__1.0.0", zip);
    world.set_goal(vec![handler("Foo", "1.0.0", "enabled")], "etag-2");
    orchestrator.run().await;

    assert_eq!(
        vext_storage::get_handler_state(&world.paths("Foo", "1.0.0")),
        HandlerState::Enabled
    );
}
