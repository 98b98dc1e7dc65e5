// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Facade operations end to end: tier gating, queries, kernels, transfers,
// events and SVM.

mod common;

use std::ffi::c_void;

use common::{Rig, VECTOR_ADD};
use oclink_core::error::OclinkError;
use oclink_core::info;
use oclink_core::status::StatusCode;
use oclink_core::types::{
    AddressingMode, ExecutionStatus, FilterMode, ImageFormat, MapFlags, MemFlags, QueueProperties,
    RectRegion, VersionTier,
};
use oclink_native::EntryPoint;
use oclink_native::api::{InfoTarget, NativeDiscovery};
use oclink_runtime::{UserToken, build_status};

const RGBA_UNORM8: ImageFormat = ImageFormat {
    channel_order: 0x10B5,
    channel_data_type: 0x10D2,
};

fn assert_native<T: std::fmt::Debug>(result: oclink_core::error::Result<T>, expected: StatusCode) {
    match result {
        Err(OclinkError::NativeCall { status, code, .. }) => {
            assert_eq!(status, expected);
            assert_eq!(code, expected.code());
        }
        other => panic!("expected {expected:?}, got {other:?}"),
    }
}

fn assert_unavailable<T: std::fmt::Debug>(
    result: oclink_core::error::Result<T>,
    required: VersionTier,
    installed: VersionTier,
) {
    match result {
        Err(OclinkError::EntryPointNotAvailable {
            required: r,
            installed: i,
            ..
        }) => {
            assert_eq!(r, required);
            assert_eq!(i, Some(installed));
        }
        other => panic!("expected EntryPointNotAvailable, got {other:?}"),
    }
}

// -- Tier gating --

#[test]
fn entries_above_the_installed_tier_are_refused_before_the_driver() {
    let rig = Rig::new(VersionTier::V1_2);
    let (_, context) = rig.context();

    assert_unavailable(
        rig.facade.create_pipe(context, MemFlags::READ_WRITE, 4, 16),
        VersionTier::V2_0,
        VersionTier::V1_2,
    );
    assert_unavailable(
        rig.facade.svm_alloc(context, MemFlags::READ_WRITE, 64, 0),
        VersionTier::V2_0,
        VersionTier::V1_2,
    );
    assert_eq!(rig.sim.call_count(EntryPoint::CreatePipe), 0);
    assert_eq!(rig.sim.call_count(EntryPoint::SvmAlloc), 0);
}

#[test]
fn kernel_arg_names_need_1_2() {
    let rig = Rig::new(VersionTier::V1_1);
    let (device, context) = rig.context();
    let program = rig
        .facade
        .create_program_with_source(context, &[VECTOR_ADD])
        .expect("program");
    rig.facade
        .build_program(program, &[device], "", None, UserToken::default())
        .expect("build");
    let kernel = rig.facade.create_kernel(program, "vadd").expect("kernel");

    assert_eq!(rig.facade.kernel_num_args(kernel).expect("num args"), 3);
    assert_unavailable(
        rig.facade.kernel_arg_name(kernel, 0),
        VersionTier::V1_2,
        VersionTier::V1_1,
    );
}

#[test]
fn deprecated_entries_still_dispatch_at_2_0() {
    let rig = Rig::new(VersionTier::V2_0);
    let (_, context, queue) = rig.queue();
    assert_eq!(rig.sim.call_count(EntryPoint::CreateCommandQueue), 1);

    let sampler = rig
        .facade
        .create_sampler(context, true, AddressingMode::ClampToEdge, FilterMode::Nearest)
        .expect("1.0 sampler");
    let modern = rig
        .facade
        .create_sampler_with_properties(context, false, AddressingMode::Repeat, FilterMode::Linear)
        .expect("2.0 sampler");
    assert_eq!(
        rig.facade
            .query_u32(InfoTarget::Sampler(modern.raw()), info::sampler::FILTER_MODE)
            .expect("filter"),
        FilterMode::Linear.to_raw()
    );
    assert_eq!(
        rig.facade
            .query_u32(InfoTarget::Sampler(sampler.raw()), info::sampler::NORMALIZED_COORDS)
            .expect("normalized"),
        1
    );

    let program = rig
        .facade
        .create_program_with_source(context, &["__kernel void tick(void) {}"])
        .expect("program");
    rig.facade
        .build_program(program, &[], "", None, UserToken::default())
        .expect("build");
    let kernel = rig.facade.create_kernel(program, "tick").expect("kernel");
    let done = rig.facade.enqueue_task(queue, kernel, &[]).expect("task");
    rig.facade.finish(queue).expect("finish");
    assert_eq!(rig.facade.event_status(done).expect("status"), ExecutionStatus::Complete);
}

#[test]
fn queue_properties_toggle_in_place_at_1_0() {
    let rig = Rig::new(VersionTier::V1_0);
    let (_, _, queue) = rig.queue();
    let before = rig
        .facade
        .set_command_queue_property(queue, QueueProperties::PROFILING_ENABLE, false)
        .expect("toggle");
    assert_eq!(before, QueueProperties::PROFILING_ENABLE);
    let props = rig
        .facade
        .query_u64(InfoTarget::CommandQueue(queue.raw()), info::queue::PROPERTIES)
        .expect("properties");
    assert_eq!(props, 0);
}

// -- Queries --

#[test]
fn queries_use_two_native_calls_and_agree_on_size() {
    let rig = Rig::new(VersionTier::V2_0);
    let (device, context, queue) = rig.queue();
    let platform = rig.facade.platforms().expect("platforms")[0];
    let buffer = rig.facade.create_buffer(context, MemFlags::READ_WRITE, 128).expect("buffer");
    let program = rig
        .facade
        .create_program_with_source(context, &[VECTOR_ADD])
        .expect("program");
    rig.facade
        .build_program(program, &[device], "-cl-fast-relaxed-math", None, UserToken::default())
        .expect("build");
    let kernel = rig.facade.create_kernel(program, "vadd").expect("kernel");

    let before = rig.sim.call_count(EntryPoint::GetDeviceInfo);
    let name = rig
        .facade
        .query_string(InfoTarget::Device(device.raw()), info::device::NAME)
        .expect("device name");
    assert!(!name.is_empty());
    assert_eq!(rig.sim.call_count(EntryPoint::GetDeviceInfo), before + 2);

    let selectors = [
        (InfoTarget::Platform(platform.raw()), info::platform::PROFILE),
        (InfoTarget::Platform(platform.raw()), info::platform::VERSION),
        (InfoTarget::Platform(platform.raw()), info::platform::NAME),
        (InfoTarget::Device(device.raw()), info::device::TYPE),
        (InfoTarget::Device(device.raw()), info::device::MAX_WORK_GROUP_SIZE),
        (InfoTarget::Device(device.raw()), info::device::VERSION),
        (InfoTarget::Context(context.raw()), info::context::DEVICES),
        (InfoTarget::CommandQueue(queue.raw()), info::queue::CONTEXT),
        (InfoTarget::Memory(buffer.raw()), info::memory::SIZE),
        (InfoTarget::Program(program.raw()), info::program::SOURCE),
        (InfoTarget::Program(program.raw()), info::program::KERNEL_NAMES),
        (
            InfoTarget::ProgramBuild {
                program: program.raw(),
                device: device.raw(),
            },
            info::build::OPTIONS,
        ),
        (InfoTarget::Kernel(kernel.raw()), info::kernel::FUNCTION_NAME),
        (
            InfoTarget::KernelWorkGroup {
                kernel: kernel.raw(),
                device: device.raw(),
            },
            info::work_group::COMPILE_WORK_GROUP_SIZE,
        ),
        (
            InfoTarget::KernelArg {
                kernel: kernel.raw(),
                index: 1,
            },
            info::kernel_arg::NAME,
        ),
    ];
    for (target, param) in selectors {
        let mut size = 0;
        assert_eq!(rig.sim.get_info(target, param, None, &mut size), 0, "{target:?} {param:#x}");
        let bytes = rig.facade.query(target, param).expect("query");
        assert_eq!(bytes.len(), size, "{target:?} {param:#x}");
    }

    assert_eq!(
        rig.facade
            .query_string(InfoTarget::ProgramBuild { program: program.raw(), device: device.raw() }, info::build::OPTIONS)
            .expect("options"),
        "-cl-fast-relaxed-math"
    );
    assert_eq!(rig.facade.kernel_arg_name(kernel, 2).expect("arg name"), "out");
    assert_eq!(
        rig.facade
            .query_handles(InfoTarget::Context(context.raw()), info::context::DEVICES)
            .expect("devices"),
        vec![device.raw()]
    );
    assert_eq!(
        rig.facade
            .query_usizes(
                InfoTarget::KernelWorkGroup { kernel: kernel.raw(), device: device.raw() },
                info::work_group::COMPILE_WORK_GROUP_SIZE
            )
            .expect("compile size"),
        vec![0, 0, 0]
    );
}

#[test]
fn platform_version_is_parsed_from_the_version_string() {
    for tier in VersionTier::ALL {
        let rig = Rig::new(tier);
        let platform = rig.facade.platforms().expect("platforms")[0];
        assert_eq!(rig.facade.platform_version(platform).expect("version"), tier);
    }
}

#[test]
fn gpu_reports_its_compute_units() {
    let rig = Rig::new(VersionTier::V1_2);
    let device = rig.gpu();
    assert_eq!(
        rig.facade
            .query_u32(InfoTarget::Device(device.raw()), info::device::MAX_COMPUTE_UNITS)
            .expect("compute units"),
        8
    );
}

#[test]
fn unknown_selectors_surface_the_driver_status() {
    let rig = Rig::new(VersionTier::V1_2);
    let (_, context) = rig.context();
    assert_native(
        rig.facade.query(InfoTarget::Context(context.raw()), 0x7777),
        StatusCode::InvalidValue,
    );
}

// -- Programs and kernels --

#[test]
fn vector_add_runs_to_completion() {
    let rig = Rig::new(VersionTier::V1_2);
    let (device, context, queue) = rig.queue();
    let a = rig
        .facade
        .create_buffer_with_data(context, MemFlags::READ_ONLY, &[1u8; 16])
        .expect("a");
    let b = rig
        .facade
        .create_buffer_with_data(context, MemFlags::READ_ONLY, &[2u8; 16])
        .expect("b");
    let out = rig.facade.create_buffer(context, MemFlags::WRITE_ONLY, 16).expect("out");

    let program = rig
        .facade
        .create_program_with_source(context, &[VECTOR_ADD])
        .expect("program");
    assert_eq!(rig.facade.build_status(program, device).expect("status"), build_status::NONE);
    assert!(
        rig.facade
            .build_program(program, &[device], "", None, UserToken::default())
            .expect("build")
            .is_none()
    );
    assert_eq!(rig.facade.build_status(program, device).expect("status"), build_status::SUCCESS);

    let kernel = rig.facade.create_kernel(program, "vadd").expect("kernel");
    assert_native(
        rig.facade.enqueue_nd_range(queue, kernel, None, &[4], None, &[]),
        StatusCode::InvalidKernelArgs,
    );

    rig.facade.set_kernel_arg_mem(kernel, 0, a).expect("arg 0");
    rig.facade.set_kernel_arg_mem(kernel, 1, b).expect("arg 1");
    rig.facade.set_kernel_arg_mem(kernel, 2, out).expect("arg 2");
    let done = rig
        .facade
        .enqueue_nd_range(queue, kernel, None, &[4], Some(&[2]), &[])
        .expect("dispatch");
    rig.facade.finish(queue).expect("finish");
    assert_eq!(rig.facade.event_status(done).expect("status"), ExecutionStatus::Complete);

    rig.facade.release(done).expect("release event");
    rig.facade.release(kernel).expect("release kernel");
    rig.facade.release(program).expect("release program");
}

#[test]
fn work_geometry_is_checked_on_the_host() {
    let rig = Rig::new(VersionTier::V1_2);
    let (_, context, queue) = rig.queue();
    let program = rig
        .facade
        .create_program_with_source(context, &["__kernel void tick(void) {}"])
        .expect("program");
    rig.facade
        .build_program(program, &[], "", None, UserToken::default())
        .expect("build");
    let kernel = rig.facade.create_kernel(program, "tick").expect("kernel");

    let calls = rig.sim.call_count(EntryPoint::EnqueueNdRangeKernel);
    let result = rig.facade.enqueue_nd_range(queue, kernel, None, &[1, 1, 1, 1], None, &[]);
    assert!(matches!(result, Err(OclinkError::InvalidArgument { .. })));
    assert_eq!(rig.sim.call_count(EntryPoint::EnqueueNdRangeKernel), calls);
}

#[test]
fn failed_build_keeps_a_log() {
    let rig = Rig::new(VersionTier::V1_2);
    let (device, context) = rig.context();
    let program = rig
        .facade
        .create_program_with_source(context, &["#error missing header\n", "__kernel void k(void) {}"])
        .expect("program");
    assert_native(
        rig.facade.build_program(program, &[device], "", None, UserToken::default()),
        StatusCode::BuildProgramFailure,
    );
    assert_eq!(rig.facade.build_status(program, device).expect("status"), build_status::ERROR);
    let log = rig.facade.build_log(program, device).expect("log");
    assert!(log.contains("missing header"), "log: {log}");
    assert!(rig.facade.create_kernels_in_program(program).is_err());
}

#[test]
fn compile_then_link_yields_kernels() {
    let rig = Rig::new(VersionTier::V1_2);
    let (device, context) = rig.context();
    let object = rig
        .facade
        .create_program_with_source(context, &[VECTOR_ADD])
        .expect("program");
    rig.facade
        .compile_program(object, &[device], "", &[], None, UserToken::default())
        .expect("compile");
    let (linked, registration) = rig
        .facade
        .link_program(context, &[device], "", &[object], None, UserToken::default())
        .expect("link");
    assert!(registration.is_none());
    let kernels = rig.facade.create_kernels_in_program(linked).expect("kernels");
    assert_eq!(kernels.len(), 1);
}

#[test]
fn sources_with_interior_nul_are_rejected() {
    let rig = Rig::new(VersionTier::V1_2);
    let (_, context) = rig.context();
    let calls = rig.sim.call_count(EntryPoint::CreateProgramWithSource);
    let result = rig
        .facade
        .create_program_with_source(context, &[VECTOR_ADD, "kernel\0void"]);
    assert!(matches!(result, Err(OclinkError::InvalidArgument { .. })));
    assert_eq!(rig.sim.call_count(EntryPoint::CreateProgramWithSource), calls);
}

// -- Transfers --

#[test]
fn buffer_copy_and_fill() {
    let rig = Rig::new(VersionTier::V1_2);
    let (_, context, queue) = rig.queue();
    let src = rig
        .facade
        .create_buffer_with_data(context, MemFlags::READ_WRITE, &[7u8; 16])
        .expect("src");
    let dst = rig.facade.create_buffer(context, MemFlags::READ_WRITE, 16).expect("dst");

    rig.facade.copy_buffer(queue, src, dst, 0, 0, 16, &[]).expect("copy");
    rig.facade
        .fill_buffer(queue, dst, &[0xAB, 0xCD], 4, 8, &[])
        .expect("fill");

    let mut host = [0u8; 16];
    rig.facade.read_buffer(queue, dst, 0, &mut host, &[]).expect("read");
    assert_eq!(&host[..4], &[7; 4]);
    assert_eq!(&host[4..12], &[0xAB, 0xCD, 0xAB, 0xCD, 0xAB, 0xCD, 0xAB, 0xCD]);
    assert_eq!(&host[12..], &[7; 4]);

    let bad = rig.facade.fill_buffer(queue, dst, &[1, 2, 3], 0, 6, &[]);
    assert!(matches!(bad, Err(OclinkError::InvalidArgument { .. })));
}

#[test]
fn rect_write_lands_in_the_right_rows() {
    let rig = Rig::new(VersionTier::V1_1);
    let (_, context, queue) = rig.queue();
    let buffer = rig
        .facade
        .create_buffer_with_data(context, MemFlags::READ_WRITE, &[0u8; 16])
        .expect("buffer");
    let rect = RectRegion {
        buffer_origin: [1, 1, 0],
        region: [2, 2, 1],
        buffer_row_pitch: 4,
        host_row_pitch: 2,
        ..RectRegion::default()
    };
    rig.facade
        .write_buffer_rect(queue, buffer, &rect, &[1, 2, 3, 4], &[])
        .expect("rect write");

    let mut host = [0u8; 16];
    rig.facade.read_buffer(queue, buffer, 0, &mut host, &[]).expect("read");
    assert_eq!(host, [0, 0, 0, 0, 0, 1, 2, 0, 0, 3, 4, 0, 0, 0, 0, 0]);

    let mut back = [0u8; 4];
    rig.facade
        .read_buffer_rect(queue, buffer, &rect, &mut back, &[])
        .expect("rect read");
    assert_eq!(back, [1, 2, 3, 4]);

    let mut short = [0u8; 3];
    let result = rig.facade.read_buffer_rect(queue, buffer, &rect, &mut short, &[]);
    assert!(matches!(result, Err(OclinkError::InvalidArgument { .. })));
}

#[test]
fn image_round_trip() {
    let rig = Rig::new(VersionTier::V1_1);
    let (_, context, queue) = rig.queue();
    // SAFETY: no host pointer is handed over.
    let image = unsafe {
        rig.facade
            .create_image_2d(context, MemFlags::READ_WRITE, RGBA_UNORM8, 4, 2, 0, std::ptr::null_mut())
    }
    .expect("image");
    assert_eq!(
        rig.facade
            .query_usize(InfoTarget::Image(image.raw()), info::image::ELEMENT_SIZE)
            .expect("element size"),
        4
    );

    let pixels: Vec<u8> = (0..32).collect();
    rig.facade
        .write_image(queue, image, [0, 0, 0], [4, 2, 1], &pixels, &[])
        .expect("write");
    let mut back = vec![0u8; 32];
    rig.facade
        .read_image(queue, image, [0, 0, 0], [4, 2, 1], &mut back, &[])
        .expect("read");
    assert_eq!(back, pixels);
}

#[test]
fn mapped_writes_land_after_unmap() {
    let rig = Rig::new(VersionTier::V1_2);
    let (_, context, queue) = rig.queue();
    let buffer = rig
        .facade
        .create_buffer_with_data(context, MemFlags::READ_WRITE, &[0u8; 8])
        .expect("buffer");

    let mut region = rig
        .facade
        .map_buffer(queue, buffer, MapFlags::WRITE, 0, 8, &[])
        .expect("map");
    assert_eq!(region.len(), 8);
    assert_eq!(region.buffer(), buffer);
    // SAFETY: the mapping is live until `unmap` consumes it.
    unsafe { region.as_mut_slice() }.copy_from_slice(&[9; 8]);
    let unmapped = rig.facade.unmap(queue, region, &[]).expect("unmap");
    rig.facade.finish(queue).expect("finish");
    assert_eq!(rig.facade.event_status(unmapped).expect("status"), ExecutionStatus::Complete);

    let mut host = [0u8; 8];
    rig.facade.read_buffer(queue, buffer, 0, &mut host, &[]).expect("read");
    assert_eq!(host, [9; 8]);
}

#[test]
fn map_unmap_cycle_leaves_no_live_events() {
    let rig = Rig::new(VersionTier::V1_2);
    let (_, context, queue) = rig.queue();
    let buffer = rig
        .facade
        .create_buffer_with_data(context, MemFlags::READ_WRITE, &[0u8; 8])
        .expect("buffer");
    let live = rig.facade.ledger().live_count();
    let native = rig.sim.live_objects();

    for _ in 0..3 {
        let region = rig
            .facade
            .map_buffer(queue, buffer, MapFlags::READ, 0, 8, &[])
            .expect("map");
        assert_eq!(rig.facade.ledger().live_count(), live);
        let unmapped = rig.facade.unmap(queue, region, &[]).expect("unmap");
        rig.facade.release(unmapped).expect("release unmap event");
        rig.facade.finish(queue).expect("finish");
    }
    assert_eq!(rig.facade.ledger().live_count(), live);
    assert_eq!(rig.sim.live_objects(), native);
}

#[test]
fn non_blocking_reads_fill_once_the_queue_drains() {
    let rig = Rig::new(VersionTier::V1_2);
    let (_, context, queue) = rig.queue();
    let buffer = rig
        .facade
        .create_buffer_with_data(context, MemFlags::READ_ONLY, &[5u8; 8])
        .expect("buffer");
    let mut host = [0u8; 8];
    // SAFETY: `host` is not touched until the queue has finished.
    let event = unsafe { rig.facade.read_buffer_async(queue, buffer, 0, &mut host, &[]) }.expect("read");
    assert_eq!(rig.sim.pending_commands(), 1);
    rig.facade.finish(queue).expect("finish");
    assert_eq!(rig.facade.event_status(event).expect("status"), ExecutionStatus::Complete);
    assert_eq!(host, [5; 8]);
}

// -- Events --

#[test]
fn failed_user_event_fails_the_wait() {
    let rig = Rig::new(VersionTier::V1_1);
    let (_, context) = rig.context();
    let gate = rig.facade.create_user_event(context).expect("user event");
    assert_eq!(rig.facade.event_status(gate).expect("status"), ExecutionStatus::Submitted);

    let refused = rig.facade.set_user_event_status(gate, ExecutionStatus::Running);
    assert!(matches!(refused, Err(OclinkError::InvalidArgument { .. })));

    rig.facade
        .set_user_event_status(gate, ExecutionStatus::Error(-5))
        .expect("fail the gate");
    assert_native(
        rig.facade.wait_for_events(&[gate]),
        StatusCode::ExecStatusErrorForEventsInWaitList,
    );
    assert!(matches!(
        rig.facade.wait_for_events(&[]),
        Err(OclinkError::InvalidArgument { .. })
    ));
}

#[test]
fn completed_commands_report_profiling() {
    let rig = Rig::new(VersionTier::V1_2);
    let (_, context, queue) = rig.queue();
    let buffer = rig.facade.create_buffer(context, MemFlags::READ_WRITE, 64).expect("buffer");
    let fill = rig
        .facade
        .fill_buffer(queue, buffer, &[0u8; 4], 0, 64, &[])
        .expect("fill");

    assert_native(rig.facade.profiling_info(fill), StatusCode::ProfilingInfoNotAvailable);
    rig.facade.finish(queue).expect("finish");

    let times = rig.facade.profiling_info(fill).expect("profiling");
    assert!(times.queued <= times.submit);
    assert!(times.submit <= times.start);
    assert!(times.start < times.end);
    assert_eq!(times.duration(), 1);
}

#[test]
fn markers_and_barriers_order_the_queue() {
    let rig = Rig::new(VersionTier::V1_2);
    let (_, context, queue) = rig.queue();
    let buffer = rig.facade.create_buffer(context, MemFlags::READ_WRITE, 8).expect("buffer");
    let fill = rig
        .facade
        .fill_buffer(queue, buffer, &[1], 0, 8, &[])
        .expect("fill");
    let barrier = rig
        .facade
        .enqueue_barrier_with_wait_list(queue, &[fill])
        .expect("barrier");
    let marker = rig.facade.enqueue_marker_with_wait_list(queue, &[]).expect("marker");
    rig.facade.enqueue_marker(queue).expect("legacy marker");
    rig.facade.enqueue_barrier(queue).expect("legacy barrier");
    rig.facade.enqueue_wait_for_events(queue, &[fill]).expect("legacy wait");

    rig.facade.flush(queue).expect("flush");
    assert!(rig.sim.pending_commands() >= 3);
    rig.facade.wait_for_events(&[marker]).expect("wait");
    for event in [fill, barrier, marker] {
        assert_eq!(rig.facade.event_status(event).expect("status"), ExecutionStatus::Complete);
    }
    assert_eq!(rig.sim.pending_commands(), 0);
}

// -- 2.0 --

#[test]
fn svm_copies_round_trip() {
    let rig = Rig::new(VersionTier::V2_0);
    let (_, context, queue) = rig.queue();
    let svm = rig
        .facade
        .svm_alloc(context, MemFlags::READ_WRITE, 16, 16)
        .expect("svm");
    assert_eq!(svm.as_ptr() as usize % 16, 0);

    let src: Vec<u8> = (1..=16).collect();
    let mut dst = vec![0u8; 16];
    // SAFETY: both ranges hold 16 bytes and the copies block.
    unsafe {
        rig.facade
            .enqueue_svm_memcpy(queue, true, svm.as_ptr(), src.as_ptr().cast::<c_void>(), 16, &[])
            .expect("to svm");
        rig.facade
            .enqueue_svm_memcpy(queue, true, dst.as_mut_ptr().cast::<c_void>(), svm.as_ptr(), 16, &[])
            .expect("from svm");
    }
    assert_eq!(dst, src);

    // SAFETY: no command uses the allocation any more.
    unsafe { rig.facade.svm_free(context, svm) }.expect("free");
    assert_eq!(rig.sim.call_count(EntryPoint::SvmFree), 1);
}

#[test]
fn pipes_report_their_geometry() {
    let rig = Rig::new(VersionTier::V2_0);
    let (_, context) = rig.context();
    let pipe = rig
        .facade
        .create_pipe(context, MemFlags::READ_WRITE, 8, 32)
        .expect("pipe");
    assert_eq!(
        rig.facade
            .query_u32(InfoTarget::Pipe(pipe.raw()), info::pipe::MAX_PACKETS)
            .expect("packets"),
        32
    );
    rig.facade.release(pipe).expect("release");
}
