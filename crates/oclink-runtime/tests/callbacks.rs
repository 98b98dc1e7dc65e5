// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Callback delivery through the bridge, driven by the simulated driver.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use common::Rig;
use oclink_core::error::OclinkError;
use oclink_core::status::StatusCode;
use oclink_core::types::{ExecutionStatus, MemFlags, QueueProperties, RawHandle, VersionTier};
use oclink_runtime::{ContextErrorReport, ReleaseOutcome, UserToken};

#[test]
fn event_callback_fires_after_host_release() {
    let rig = Rig::new(VersionTier::V1_2);
    let (_, context, queue) = rig.queue();
    let buffer = rig.facade.create_buffer(context, MemFlags::READ_WRITE, 8).expect("buffer");
    let data = [7u8; 8];
    // SAFETY: `data` outlives the command, which completes below.
    let event = unsafe { rig.facade.write_buffer_async(queue, buffer, 0, &data, &[]) }.expect("enqueue");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let id = rig
        .facade
        .set_event_callback(
            event,
            ExecutionStatus::Complete,
            Arc::new(move |raw: RawHandle, status: ExecutionStatus, token: UserToken| {
                sink.lock().expect("lock").push((raw, status, token));
            }),
            UserToken(42),
        )
        .expect("callback");

    assert_eq!(rig.facade.release(event).expect("release"), ReleaseOutcome::Released);
    assert!(rig.sim.is_alive(event.raw()), "driver still holds the queued event");
    assert!(seen.lock().expect("lock").is_empty());

    rig.sim.complete_pending();
    rig.sim.complete_pending();
    let seen = seen.lock().expect("lock");
    assert_eq!(seen.as_slice(), [(event.raw(), ExecutionStatus::Complete, UserToken(42))]);
    assert!(!rig.facade.bridge().is_registered(id));

    let mut back = [0u8; 8];
    rig.facade.read_buffer(queue, buffer, 0, &mut back, &[]).expect("read");
    assert_eq!(back, data);
}

#[test]
fn callback_on_a_finished_event_fires_immediately() {
    let rig = Rig::new(VersionTier::V1_1);
    let (_, context) = rig.context();
    let event = rig.facade.create_user_event(context).expect("user event");
    rig.facade
        .set_user_event_status(event, ExecutionStatus::Complete)
        .expect("complete");
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    rig.facade
        .set_event_callback(
            event,
            ExecutionStatus::Complete,
            Arc::new(move |_: RawHandle, _: ExecutionStatus, _: UserToken| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            UserToken::default(),
        )
        .expect("callback");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn context_error_callback_lives_as_long_as_the_native_context() {
    let rig = Rig::new(VersionTier::V1_2);
    let device = rig.gpu();
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let context = rig
        .facade
        .create_context(
            &[device],
            Some(Arc::new(move |report: &ContextErrorReport, token: UserToken| {
                sink.lock().expect("lock").push((report.message.clone(), token));
            })),
            UserToken(9),
        )
        .expect("context");
    // the queue keeps the context alive natively after the host lets go
    let queue = rig
        .facade
        .create_command_queue(context, device, QueueProperties::empty())
        .expect("queue");

    assert!(rig.sim.raise_context_error(context.raw(), "out of memory"));
    assert!(rig.sim.raise_context_error(context.raw(), "lost device"));
    assert_eq!(
        reports.lock().expect("lock").as_slice(),
        [("out of memory".to_string(), UserToken(9)), ("lost device".to_string(), UserToken(9))]
    );
    assert_eq!(rig.facade.bridge().registrations_for(context.raw()), 1);

    assert_eq!(
        rig.facade.release(context).expect("release"),
        ReleaseOutcome::Detached { children: 1 }
    );
    assert!(rig.sim.is_alive(context.raw()));
    assert_eq!(rig.facade.bridge().registrations_for(context.raw()), 1);

    assert!(rig.sim.raise_context_error(context.raw(), "late"));
    assert_eq!(reports.lock().expect("lock").last(), Some(&("late".to_string(), UserToken(9))));

    // the last child takes the context with it
    assert_eq!(rig.facade.release(queue).expect("release queue"), ReleaseOutcome::Released);
    assert!(rig.facade.is_reclaimable(context));
    assert!(!rig.sim.is_alive(context.raw()));
    assert_eq!(rig.facade.bridge().registrations_for(context.raw()), 0);
    assert!(!rig.sim.raise_context_error(context.raw(), "after teardown"));
    assert_eq!(reports.lock().expect("lock").len(), 3);
}

#[test]
fn context_without_children_unregisters_on_host_release() {
    let rig = Rig::new(VersionTier::V1_2);
    let device = rig.gpu();
    let context = rig
        .facade
        .create_context(
            &[device],
            Some(Arc::new(|_: &ContextErrorReport, _: UserToken| {})),
            UserToken::default(),
        )
        .expect("context");
    assert_eq!(rig.facade.bridge().registrations_for(context.raw()), 1);
    assert_eq!(rig.facade.release(context).expect("release"), ReleaseOutcome::Released);
    assert_eq!(rig.facade.bridge().registrations_for(context.raw()), 0);
}

#[test]
fn failed_context_creation_cancels_the_reservation() {
    let rig = Rig::new(VersionTier::V1_2);
    let device = rig.gpu();
    rig.sim.fail_next(oclink_native::EntryPoint::CreateContext, -6);
    let err = rig
        .facade
        .create_context(
            &[device],
            Some(Arc::new(|_: &ContextErrorReport, _: UserToken| {})),
            UserToken::default(),
        )
        .expect_err("injected failure");
    assert!(matches!(
        err,
        OclinkError::NativeCall {
            status: StatusCode::OutOfHostMemory,
            ..
        }
    ));

    let context = rig
        .facade
        .create_context(
            &[device],
            Some(Arc::new(|_: &ContextErrorReport, _: UserToken| {})),
            UserToken::default(),
        )
        .expect("context");
    assert_eq!(rig.facade.bridge().registrations_for(context.raw()), 1);
}

#[test]
fn build_callback_fires_once() {
    let rig = Rig::new(VersionTier::V1_2);
    let (device, context) = rig.context();
    let program = rig
        .facade
        .create_program_with_source(context, &[common::VECTOR_ADD])
        .expect("program");
    let fired = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&fired);
    let id = rig
        .facade
        .build_program(
            program,
            &[device],
            "-cl-fast-relaxed-math",
            Some(Arc::new(move |raw: RawHandle, token: UserToken| {
                sink.lock().expect("lock").push((raw, token));
            })),
            UserToken(5),
        )
        .expect("build")
        .expect("registration id");

    assert!(fired.lock().expect("lock").is_empty());
    rig.sim.complete_pending();
    rig.sim.complete_pending();
    assert_eq!(fired.lock().expect("lock").as_slice(), [(program.raw(), UserToken(5))]);
    assert!(!rig.facade.bridge().is_registered(id));
}

#[test]
fn failed_build_call_keeps_its_registration_for_a_late_notify() {
    let rig = Rig::new(VersionTier::V1_2);
    rig.sim.fail_notified_builds(true);
    let (device, context) = rig.context();
    let program = rig
        .facade
        .create_program_with_source(context, &["#error missing header\n"])
        .expect("program");
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let err = rig
        .facade
        .build_program(
            program,
            &[device],
            "",
            Some(Arc::new(move |_: RawHandle, _: UserToken| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
            UserToken(3),
        )
        .expect_err("build fails");
    assert!(matches!(
        err,
        OclinkError::NativeCall {
            status: StatusCode::BuildProgramFailure,
            ..
        }
    ));
    assert_eq!(rig.facade.bridge().registrations_for(program.raw()), 1);

    rig.sim.complete_pending();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(rig.facade.bridge().registrations_for(program.raw()), 0);
}

#[test]
fn unfired_build_registration_goes_with_the_program() {
    let rig = Rig::new(VersionTier::V1_2);
    let (device, context) = rig.context();
    let program = rig
        .facade
        .create_program_with_source(context, &[common::VECTOR_ADD])
        .expect("program");
    let id = rig
        .facade
        .build_program(
            program,
            &[device],
            "",
            Some(Arc::new(|_: RawHandle, _: UserToken| {})),
            UserToken::default(),
        )
        .expect("build")
        .expect("registration id");
    assert!(rig.facade.bridge().is_registered(id));
    assert_eq!(rig.facade.release(program).expect("release"), ReleaseOutcome::Released);
    assert!(!rig.facade.bridge().is_registered(id));
}

#[test]
fn link_callback_is_bound_to_the_linked_program() {
    let rig = Rig::new(VersionTier::V1_2);
    let (device, context) = rig.context();
    let unit = rig
        .facade
        .create_program_with_source(context, &[common::VECTOR_ADD])
        .expect("program");
    rig.facade
        .compile_program(unit, &[device], "", &[], None, UserToken::default())
        .expect("compile");

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let (linked, id) = rig
        .facade
        .link_program(
            context,
            &[device],
            "",
            &[unit],
            Some(Arc::new(move |_: RawHandle, _: UserToken| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
            UserToken::default(),
        )
        .expect("link");
    assert!(id.is_some());
    assert_eq!(rig.facade.bridge().registrations_for(linked.raw()), 1);
    rig.sim.complete_pending();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(rig.facade.create_kernel(linked, "vadd").is_ok());
}

#[test]
fn destructor_callbacks_run_in_reverse_order() {
    let rig = Rig::new(VersionTier::V1_1);
    let (_, context) = rig.context();
    let buffer = rig.facade.create_buffer(context, MemFlags::READ_ONLY, 16).expect("buffer");
    let order = Arc::new(Mutex::new(Vec::new()));
    for token in [1, 2] {
        let sink = Arc::clone(&order);
        rig.facade
            .set_destructor_callback(
                buffer,
                Arc::new(move |_: RawHandle, token: UserToken| sink.lock().expect("lock").push(token.0)),
                UserToken(token),
            )
            .expect("destructor callback");
    }
    assert!(order.lock().expect("lock").is_empty());
    rig.facade.release(buffer).expect("release");
    assert_eq!(order.lock().expect("lock").as_slice(), [2, 1]);
    assert_eq!(rig.facade.bridge().registrations_for(buffer.raw()), 0);
}

#[test]
fn panicking_callback_is_contained() {
    let rig = Rig::new(VersionTier::V1_1);
    let (_, context) = rig.context();
    let event = rig.facade.create_user_event(context).expect("user event");
    rig.facade
        .set_event_callback(
            event,
            ExecutionStatus::Complete,
            Arc::new(|_: RawHandle, _: ExecutionStatus, _: UserToken| panic!("host bug")),
            UserToken::default(),
        )
        .expect("callback");
    let dropped = rig.facade.bridge().dropped();
    rig.facade
        .set_user_event_status(event, ExecutionStatus::Complete)
        .expect("driver call still succeeds");
    assert!(rig.facade.bridge().dropped() > dropped);
}
