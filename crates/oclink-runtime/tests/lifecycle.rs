// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host-side reference counting against the simulated driver.

mod common;

use common::Rig;
use oclink_core::error::OclinkError;
use oclink_core::types::{BufferRegion, MemFlags, QueueProperties, RawHandle, VersionTier};
use oclink_native::EntryPoint;
use oclink_runtime::{Handle, Lifecycle, MemHandle, Partition, ReleaseOutcome, UserToken};

fn assert_invalid_handle<T: std::fmt::Debug>(result: oclink_core::error::Result<T>) {
    match result {
        Err(OclinkError::InvalidHandle { .. }) => {}
        other => panic!("expected InvalidHandle, got {other:?}"),
    }
}

#[test]
fn buffer_refcount_walkthrough() {
    let rig = Rig::new(VersionTier::V1_2);
    let (_, context) = rig.context();
    let buffer = rig
        .facade
        .create_buffer(context, MemFlags::READ_WRITE, 256)
        .expect("buffer");
    assert_eq!(rig.facade.ledger().host_refcount(buffer.raw()), Some(1));

    rig.facade.retain(buffer).expect("retain");
    assert_eq!(rig.facade.ledger().host_refcount(buffer.raw()), Some(2));
    assert_eq!(rig.sim.native_refcount(buffer.raw()), Some(2));

    assert_eq!(rig.facade.release(buffer).expect("first release"), ReleaseOutcome::Alive(1));
    assert_eq!(rig.facade.lifecycle(buffer), Some(Lifecycle::Live(1)));

    assert_eq!(rig.facade.release(buffer).expect("second release"), ReleaseOutcome::Released);
    assert!(!rig.sim.is_alive(buffer.raw()));

    let native_releases = rig.sim.call_count(EntryPoint::ReleaseMemObject);
    assert_invalid_handle(rig.facade.release(buffer));
    assert_eq!(rig.sim.call_count(EntryPoint::ReleaseMemObject), native_releases);
}

#[test]
fn released_handles_are_unusable() {
    let rig = Rig::new(VersionTier::V1_2);
    let (device, context) = rig.context();
    let queue = rig
        .facade
        .create_command_queue(context, device, QueueProperties::empty())
        .expect("queue");
    rig.facade.release(queue).expect("release");

    assert_invalid_handle(rig.facade.finish(queue));
    assert_invalid_handle(rig.facade.release(queue));
    assert_invalid_handle(rig.facade.retain(queue));
}

#[test]
fn null_and_unknown_handles_never_reach_the_driver() {
    let rig = Rig::new(VersionTier::V1_2);
    let before = rig.sim.call_count(EntryPoint::ReleaseMemObject);
    assert_invalid_handle(MemHandle::new(RawHandle::NULL, "test"));
    let stray: MemHandle = Handle::new(RawHandle(0xdead_0000), "test").expect("non-null");
    assert_invalid_handle(rig.facade.release(stray));
    assert_eq!(rig.sim.call_count(EntryPoint::ReleaseMemObject), before);
}

#[test]
fn failed_native_release_keeps_the_reference() {
    let rig = Rig::new(VersionTier::V1_2);
    let (_, context) = rig.context();
    let buffer = rig.facade.create_buffer(context, MemFlags::READ_WRITE, 64).expect("buffer");
    rig.sim.fail_next(EntryPoint::ReleaseMemObject, -5);
    assert!(rig.facade.release(buffer).is_err());
    assert_eq!(rig.facade.lifecycle(buffer), Some(Lifecycle::Live(1)));
    assert_eq!(rig.facade.release(buffer).expect("retry"), ReleaseOutcome::Released);
}

#[test]
fn platforms_and_root_devices_are_not_counted() {
    let rig = Rig::new(VersionTier::V1_2);
    let platform = rig.facade.platforms().expect("platforms")[0];
    let device = rig.gpu();
    rig.facade.retain(platform).expect("retain platform");
    assert_eq!(rig.facade.release(platform).expect("release platform"), ReleaseOutcome::Untracked);
    assert_eq!(rig.facade.release(device).expect("release root device"), ReleaseOutcome::Untracked);
    assert_eq!(rig.facade.release(device).expect("again"), ReleaseOutcome::Untracked);
    assert_eq!(rig.sim.call_count(EntryPoint::ReleaseDevice), 0);
    assert!(rig.facade.lifecycle(device).is_none());
}

#[test]
fn parent_outlives_host_release_while_children_live() {
    let rig = Rig::new(VersionTier::V1_2);
    let (_, context) = rig.context();
    let parent = rig.facade.create_buffer(context, MemFlags::READ_WRITE, 1024).expect("buffer");
    let child = rig
        .facade
        .create_sub_buffer(parent, MemFlags::empty(), BufferRegion { origin: 256, size: 256 })
        .expect("sub-buffer");

    assert_eq!(
        rig.facade.release(parent).expect("release parent"),
        ReleaseOutcome::Detached { children: 1 }
    );
    assert!(!rig.facade.is_reclaimable(parent));
    assert!(rig.sim.is_alive(parent.raw()));
    assert_invalid_handle(rig.facade.create_sub_buffer(
        parent,
        MemFlags::empty(),
        BufferRegion { origin: 0, size: 16 },
    ));

    assert_eq!(rig.facade.release(child).expect("release child"), ReleaseOutcome::Released);
    assert!(rig.facade.is_reclaimable(parent));
    assert_eq!(rig.facade.lifecycle(parent), Some(Lifecycle::Released));
    assert!(!rig.sim.is_alive(parent.raw()));
}

#[test]
fn kernels_keep_their_program() {
    let rig = Rig::new(VersionTier::V1_2);
    let (device, context) = rig.context();
    let program = rig
        .facade
        .create_program_with_source(context, &[common::VECTOR_ADD])
        .expect("program");
    rig.facade
        .build_program(program, &[device], "", None, UserToken::default())
        .expect("build");
    let kernel = rig.facade.create_kernel(program, "vadd").expect("kernel");

    assert_eq!(
        rig.facade.release(program).expect("release program"),
        ReleaseOutcome::Detached { children: 1 }
    );
    assert!(rig.sim.is_alive(program.raw()));
    rig.facade.release(kernel).expect("release kernel");
    assert!(rig.facade.is_reclaimable(program));
}

#[test]
fn reissued_handle_value_replaces_the_tombstone() {
    let rig = Rig::new(VersionTier::V1_2);
    rig.sim.recycle_handles(true);
    let (_, context) = rig.context();
    let first = rig.facade.create_buffer(context, MemFlags::READ_WRITE, 32).expect("first");
    rig.facade.release(first).expect("release");
    assert_eq!(rig.facade.lifecycle(first), Some(Lifecycle::Released));

    let second = rig.facade.create_buffer(context, MemFlags::READ_WRITE, 32).expect("second");
    assert_eq!(first.raw(), second.raw());
    assert_eq!(rig.facade.lifecycle(second), Some(Lifecycle::Live(1)));
    assert_eq!(rig.facade.release(second).expect("release reissued"), ReleaseOutcome::Released);
}

#[test]
fn sub_devices_are_tracked() {
    let rig = Rig::new(VersionTier::V1_2);
    let device = rig.gpu();
    let subs = rig
        .facade
        .create_sub_devices(device, &Partition::ByCounts(vec![2, 2]))
        .expect("partition");
    assert_eq!(subs.len(), 2);
    for sub in &subs {
        assert_eq!(rig.facade.lifecycle(*sub), Some(Lifecycle::Live(1)));
    }
    let nested = rig
        .facade
        .create_sub_devices(subs[0], &Partition::Equally(1))
        .expect("nested partition");
    assert_eq!(
        rig.facade.release(subs[0]).expect("release"),
        ReleaseOutcome::Detached { children: nested.len() }
    );
    for sub in nested {
        rig.facade.release(sub).expect("release nested");
    }
    assert!(rig.facade.is_reclaimable(subs[0]));
    assert!(!rig.sim.is_alive(subs[0].raw()));
    assert_eq!(rig.facade.release(subs[1]).expect("release"), ReleaseOutcome::Released);
}

#[test]
fn sub_devices_need_1_2() {
    let rig = Rig::new(VersionTier::V1_1);
    let device = rig.gpu();
    match rig.facade.create_sub_devices(device, &Partition::Equally(1)) {
        Err(OclinkError::EntryPointNotAvailable { required, .. }) => assert_eq!(required, VersionTier::V1_2),
        other => panic!("expected EntryPointNotAvailable, got {other:?}"),
    }
}
