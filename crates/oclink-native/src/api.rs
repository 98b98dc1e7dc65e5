// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The native call table as a set of traits.
//
// Methods mirror the C functions one-to-one: status codes come back as
// `ClInt`, created handles as `RawHandle` with an `errcode` out-parameter,
// and sizes through `&mut` out-parameters. Translation into `Result` happens
// one layer up. Methods that accept or hand back raw host pointers are
// `unsafe`; the caller vouches for the pointed-to memory.

#![allow(clippy::too_many_arguments)]

use std::ffi::{CStr, c_char, c_void};

use oclink_core::status::ClInt;
use oclink_core::types::{
    BufferRegion, DeviceType, HandleKind, ImageDesc, ImageFormat, MapFlags, MemFlags,
    NativeVariant, QueueProperties, RawHandle, RectCopy, RectRegion, VersionTier,
};

use crate::entry::EntryPoint;

/// Opaque value handed to the driver with a callback and passed back
/// unchanged when it fires.
pub type UserData = *mut c_void;

/// `void (CL_CALLBACK *)(const char *errinfo, const void *private_info, size_t cb, void *user_data)`
pub type ContextNotifyFn =
    extern "C" fn(errinfo: *const c_char, private_info: *const c_void, cb: usize, user_data: UserData);

/// `void (CL_CALLBACK *)(cl_program, void *user_data)`
pub type ProgramNotifyFn = extern "C" fn(program: RawHandle, user_data: UserData);

/// `void (CL_CALLBACK *)(cl_event, cl_int status, void *user_data)`
pub type EventNotifyFn = extern "C" fn(event: RawHandle, status: ClInt, user_data: UserData);

/// `void (CL_CALLBACK *)(cl_mem, void *user_data)`
pub type MemNotifyFn = extern "C" fn(memobj: RawHandle, user_data: UserData);

/// Object whose properties a `clGet*Info` call reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoTarget {
    Platform(RawHandle),
    Device(RawHandle),
    Context(RawHandle),
    CommandQueue(RawHandle),
    Memory(RawHandle),
    Image(RawHandle),
    Pipe(RawHandle),
    Sampler(RawHandle),
    Program(RawHandle),
    ProgramBuild { program: RawHandle, device: RawHandle },
    Kernel(RawHandle),
    KernelWorkGroup { kernel: RawHandle, device: RawHandle },
    KernelArg { kernel: RawHandle, index: u32 },
    Event(RawHandle),
    EventProfiling(RawHandle),
}

impl InfoTarget {
    /// The native query function serving this target.
    pub fn entry(self) -> EntryPoint {
        match self {
            Self::Platform(_) => EntryPoint::GetPlatformInfo,
            Self::Device(_) => EntryPoint::GetDeviceInfo,
            Self::Context(_) => EntryPoint::GetContextInfo,
            Self::CommandQueue(_) => EntryPoint::GetCommandQueueInfo,
            Self::Memory(_) => EntryPoint::GetMemObjectInfo,
            Self::Image(_) => EntryPoint::GetImageInfo,
            Self::Pipe(_) => EntryPoint::GetPipeInfo,
            Self::Sampler(_) => EntryPoint::GetSamplerInfo,
            Self::Program(_) => EntryPoint::GetProgramInfo,
            Self::ProgramBuild { .. } => EntryPoint::GetProgramBuildInfo,
            Self::Kernel(_) => EntryPoint::GetKernelInfo,
            Self::KernelWorkGroup { .. } => EntryPoint::GetKernelWorkGroupInfo,
            Self::KernelArg { .. } => EntryPoint::GetKernelArgInfo,
            Self::Event(_) => EntryPoint::GetEventInfo,
            Self::EventProfiling(_) => EntryPoint::GetEventProfilingInfo,
        }
    }

    /// The primary object being queried.
    pub fn subject(self) -> (HandleKind, RawHandle) {
        match self {
            Self::Platform(h) => (HandleKind::Platform, h),
            Self::Device(h) => (HandleKind::Device, h),
            Self::Context(h) => (HandleKind::Context, h),
            Self::CommandQueue(h) => (HandleKind::CommandQueue, h),
            Self::Memory(h) | Self::Image(h) | Self::Pipe(h) => (HandleKind::Memory, h),
            Self::Sampler(h) => (HandleKind::Sampler, h),
            Self::Program(h) | Self::ProgramBuild { program: h, .. } => (HandleKind::Program, h),
            Self::Kernel(h)
            | Self::KernelWorkGroup { kernel: h, .. }
            | Self::KernelArg { kernel: h, .. } => (HandleKind::Kernel, h),
            Self::Event(h) | Self::EventProfiling(h) => (HandleKind::Event, h),
        }
    }
}

/// Native retain entry for a handle kind. Platforms have none.
pub fn retain_entry(kind: HandleKind) -> Option<EntryPoint> {
    Some(match kind {
        HandleKind::Platform => return None,
        HandleKind::Device => EntryPoint::RetainDevice,
        HandleKind::Context => EntryPoint::RetainContext,
        HandleKind::CommandQueue => EntryPoint::RetainCommandQueue,
        HandleKind::Memory => EntryPoint::RetainMemObject,
        HandleKind::Program => EntryPoint::RetainProgram,
        HandleKind::Kernel => EntryPoint::RetainKernel,
        HandleKind::Event => EntryPoint::RetainEvent,
        HandleKind::Sampler => EntryPoint::RetainSampler,
    })
}

/// Native release entry for a handle kind. Platforms have none.
pub fn release_entry(kind: HandleKind) -> Option<EntryPoint> {
    Some(match kind {
        HandleKind::Platform => return None,
        HandleKind::Device => EntryPoint::ReleaseDevice,
        HandleKind::Context => EntryPoint::ReleaseContext,
        HandleKind::CommandQueue => EntryPoint::ReleaseCommandQueue,
        HandleKind::Memory => EntryPoint::ReleaseMemObject,
        HandleKind::Program => EntryPoint::ReleaseProgram,
        HandleKind::Kernel => EntryPoint::ReleaseKernel,
        HandleKind::Event => EntryPoint::ReleaseEvent,
        HandleKind::Sampler => EntryPoint::ReleaseSampler,
    })
}

/// Complete native call table. Implemented by the dynamically loaded
/// library and by the in-process simulation.
pub trait NativeApi:
    NativeDiscovery + NativeContext + NativeMemory + NativeProgram + NativeEvent + NativeEnqueue + NativeSvm
    + Send
    + Sync
{
    /// Binary variant this table was loaded for.
    fn variant(&self) -> NativeVariant;

    /// Highest tier whose entries this table can serve.
    fn tier(&self) -> VersionTier;

    /// Human-readable origin (library path, "simulated", ...).
    fn describe(&self) -> String;
}

/// Platforms, devices, sub-devices, info queries and reference counting.
pub trait NativeDiscovery {
    fn get_platform_ids(&self, platforms: Option<&mut [RawHandle]>, num_platforms: &mut u32) -> ClInt;

    fn get_device_ids(
        &self,
        platform: RawHandle,
        device_type: DeviceType,
        devices: Option<&mut [RawHandle]>,
        num_devices: &mut u32,
    ) -> ClInt;

    /// 1.2. `properties` is the zero-terminated partition property list.
    fn create_sub_devices(
        &self,
        device: RawHandle,
        properties: &[isize],
        devices: Option<&mut [RawHandle]>,
        num_devices: &mut u32,
    ) -> ClInt;

    /// Generic `clGet*Info`. With `value == None` only `size_ret` is written.
    fn get_info(
        &self,
        target: InfoTarget,
        param: u32,
        value: Option<&mut [u8]>,
        size_ret: &mut usize,
    ) -> ClInt;

    fn retain(&self, kind: HandleKind, handle: RawHandle) -> ClInt;

    fn release(&self, kind: HandleKind, handle: RawHandle) -> ClInt;
}

/// Contexts and command queues.
pub trait NativeContext {
    fn create_context(
        &self,
        properties: &[isize],
        devices: &[RawHandle],
        notify: Option<ContextNotifyFn>,
        user_data: UserData,
        errcode: &mut ClInt,
    ) -> RawHandle;

    fn create_context_from_type(
        &self,
        properties: &[isize],
        device_type: DeviceType,
        notify: Option<ContextNotifyFn>,
        user_data: UserData,
        errcode: &mut ClInt,
    ) -> RawHandle;

    /// 1.0 flags form.
    fn create_command_queue(
        &self,
        context: RawHandle,
        device: RawHandle,
        properties: QueueProperties,
        errcode: &mut ClInt,
    ) -> RawHandle;

    /// 2.0 properties form; `properties` is zero-terminated.
    fn create_command_queue_with_properties(
        &self,
        context: RawHandle,
        device: RawHandle,
        properties: &[u64],
        errcode: &mut ClInt,
    ) -> RawHandle;

    fn set_command_queue_property(
        &self,
        queue: RawHandle,
        properties: QueueProperties,
        enable: bool,
        old_properties: &mut u64,
    ) -> ClInt;

    fn flush(&self, queue: RawHandle) -> ClInt;

    fn finish(&self, queue: RawHandle) -> ClInt;
}

/// Buffers, images, pipes and samplers.
pub trait NativeMemory {
    /// # Safety
    /// `host_ptr` must satisfy the contract implied by `flags`.
    unsafe fn create_buffer(
        &self,
        context: RawHandle,
        flags: MemFlags,
        size: usize,
        host_ptr: *mut c_void,
        errcode: &mut ClInt,
    ) -> RawHandle;

    fn create_sub_buffer(
        &self,
        buffer: RawHandle,
        flags: MemFlags,
        region: &BufferRegion,
        errcode: &mut ClInt,
    ) -> RawHandle;

    /// # Safety
    /// See [`NativeMemory::create_buffer`].
    unsafe fn create_image_2d(
        &self,
        context: RawHandle,
        flags: MemFlags,
        format: &ImageFormat,
        width: usize,
        height: usize,
        row_pitch: usize,
        host_ptr: *mut c_void,
        errcode: &mut ClInt,
    ) -> RawHandle;

    /// # Safety
    /// See [`NativeMemory::create_buffer`].
    unsafe fn create_image_3d(
        &self,
        context: RawHandle,
        flags: MemFlags,
        format: &ImageFormat,
        width: usize,
        height: usize,
        depth: usize,
        row_pitch: usize,
        slice_pitch: usize,
        host_ptr: *mut c_void,
        errcode: &mut ClInt,
    ) -> RawHandle;

    /// # Safety
    /// See [`NativeMemory::create_buffer`].
    unsafe fn create_image(
        &self,
        context: RawHandle,
        flags: MemFlags,
        format: &ImageFormat,
        desc: &ImageDesc,
        host_ptr: *mut c_void,
        errcode: &mut ClInt,
    ) -> RawHandle;

    fn create_pipe(
        &self,
        context: RawHandle,
        flags: MemFlags,
        packet_size: u32,
        max_packets: u32,
        errcode: &mut ClInt,
    ) -> RawHandle;

    fn set_mem_object_destructor_callback(
        &self,
        memobj: RawHandle,
        notify: MemNotifyFn,
        user_data: UserData,
    ) -> ClInt;

    fn create_sampler(
        &self,
        context: RawHandle,
        normalized_coords: bool,
        addressing_mode: u32,
        filter_mode: u32,
        errcode: &mut ClInt,
    ) -> RawHandle;

    fn create_sampler_with_properties(
        &self,
        context: RawHandle,
        properties: &[u64],
        errcode: &mut ClInt,
    ) -> RawHandle;
}

/// Programs and kernels.
pub trait NativeProgram {
    fn create_program_with_source(
        &self,
        context: RawHandle,
        sources: &[&str],
        errcode: &mut ClInt,
    ) -> RawHandle;

    fn create_program_with_binary(
        &self,
        context: RawHandle,
        devices: &[RawHandle],
        binaries: &[&[u8]],
        binary_status: &mut [ClInt],
        errcode: &mut ClInt,
    ) -> RawHandle;

    fn build_program(
        &self,
        program: RawHandle,
        devices: &[RawHandle],
        options: &CStr,
        notify: Option<ProgramNotifyFn>,
        user_data: UserData,
    ) -> ClInt;

    fn compile_program(
        &self,
        program: RawHandle,
        devices: &[RawHandle],
        options: &CStr,
        headers: &[RawHandle],
        header_names: &[&CStr],
        notify: Option<ProgramNotifyFn>,
        user_data: UserData,
    ) -> ClInt;

    fn link_program(
        &self,
        context: RawHandle,
        devices: &[RawHandle],
        options: &CStr,
        inputs: &[RawHandle],
        notify: Option<ProgramNotifyFn>,
        user_data: UserData,
        errcode: &mut ClInt,
    ) -> RawHandle;

    fn create_kernel(&self, program: RawHandle, name: &CStr, errcode: &mut ClInt) -> RawHandle;

    fn create_kernels_in_program(
        &self,
        program: RawHandle,
        kernels: Option<&mut [RawHandle]>,
        num_kernels: &mut u32,
    ) -> ClInt;

    /// # Safety
    /// `value` must point to `size` readable bytes, or be null for local
    /// memory arguments.
    unsafe fn set_kernel_arg(
        &self,
        kernel: RawHandle,
        index: u32,
        size: usize,
        value: *const c_void,
    ) -> ClInt;

    /// # Safety
    /// `ptr` must lie inside an SVM allocation of the kernel's context.
    unsafe fn set_kernel_arg_svm_pointer(
        &self,
        kernel: RawHandle,
        index: u32,
        ptr: *const c_void,
    ) -> ClInt;
}

/// Events.
pub trait NativeEvent {
    fn create_user_event(&self, context: RawHandle, errcode: &mut ClInt) -> RawHandle;

    fn set_user_event_status(&self, event: RawHandle, status: ClInt) -> ClInt;

    fn set_event_callback(
        &self,
        event: RawHandle,
        callback_type: ClInt,
        notify: EventNotifyFn,
        user_data: UserData,
    ) -> ClInt;

    fn wait_for_events(&self, events: &[RawHandle]) -> ClInt;
}

/// Command submission.
pub trait NativeEnqueue {
    /// # Safety
    /// `dst` must be valid for `size` bytes of writes until the command
    /// completes.
    unsafe fn enqueue_read_buffer(
        &self,
        queue: RawHandle,
        buffer: RawHandle,
        blocking: bool,
        offset: usize,
        size: usize,
        dst: *mut c_void,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt;

    /// # Safety
    /// `src` must be valid for `size` bytes of reads until the command
    /// completes.
    unsafe fn enqueue_write_buffer(
        &self,
        queue: RawHandle,
        buffer: RawHandle,
        blocking: bool,
        offset: usize,
        size: usize,
        src: *const c_void,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt;

    /// # Safety
    /// `dst` must cover the host side of `rect` until the command completes.
    unsafe fn enqueue_read_buffer_rect(
        &self,
        queue: RawHandle,
        buffer: RawHandle,
        blocking: bool,
        rect: &RectRegion,
        dst: *mut c_void,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt;

    /// # Safety
    /// `src` must cover the host side of `rect` until the command completes.
    unsafe fn enqueue_write_buffer_rect(
        &self,
        queue: RawHandle,
        buffer: RawHandle,
        blocking: bool,
        rect: &RectRegion,
        src: *const c_void,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt;

    fn enqueue_copy_buffer(
        &self,
        queue: RawHandle,
        src: RawHandle,
        dst: RawHandle,
        src_offset: usize,
        dst_offset: usize,
        size: usize,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt;

    fn enqueue_copy_buffer_rect(
        &self,
        queue: RawHandle,
        src: RawHandle,
        dst: RawHandle,
        rect: &RectCopy,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt;

    fn enqueue_fill_buffer(
        &self,
        queue: RawHandle,
        buffer: RawHandle,
        pattern: &[u8],
        offset: usize,
        size: usize,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt;

    /// # Safety
    /// `dst` must cover `region` at the given pitches until the command
    /// completes.
    unsafe fn enqueue_read_image(
        &self,
        queue: RawHandle,
        image: RawHandle,
        blocking: bool,
        origin: [usize; 3],
        region: [usize; 3],
        row_pitch: usize,
        slice_pitch: usize,
        dst: *mut c_void,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt;

    /// # Safety
    /// `src` must cover `region` at the given pitches until the command
    /// completes.
    unsafe fn enqueue_write_image(
        &self,
        queue: RawHandle,
        image: RawHandle,
        blocking: bool,
        origin: [usize; 3],
        region: [usize; 3],
        row_pitch: usize,
        slice_pitch: usize,
        src: *const c_void,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt;

    fn enqueue_copy_image(
        &self,
        queue: RawHandle,
        src: RawHandle,
        dst: RawHandle,
        src_origin: [usize; 3],
        dst_origin: [usize; 3],
        region: [usize; 3],
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt;

    fn enqueue_fill_image(
        &self,
        queue: RawHandle,
        image: RawHandle,
        fill_color: &[u8; 16],
        origin: [usize; 3],
        region: [usize; 3],
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt;

    fn enqueue_map_buffer(
        &self,
        queue: RawHandle,
        buffer: RawHandle,
        blocking: bool,
        flags: MapFlags,
        offset: usize,
        size: usize,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
        errcode: &mut ClInt,
    ) -> *mut c_void;

    /// # Safety
    /// `mapped` must come from a map call on `memobj`.
    unsafe fn enqueue_unmap_mem_object(
        &self,
        queue: RawHandle,
        memobj: RawHandle,
        mapped: *mut c_void,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt;

    /// `global.len()` is the work dimension; `offset` and `local` must
    /// match it when present.
    fn enqueue_nd_range_kernel(
        &self,
        queue: RawHandle,
        kernel: RawHandle,
        offset: Option<&[usize]>,
        global: &[usize],
        local: Option<&[usize]>,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt;

    fn enqueue_task(
        &self,
        queue: RawHandle,
        kernel: RawHandle,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt;

    fn enqueue_marker(&self, queue: RawHandle, event: &mut RawHandle) -> ClInt;

    fn enqueue_barrier(&self, queue: RawHandle) -> ClInt;

    fn enqueue_wait_for_events(&self, queue: RawHandle, events: &[RawHandle]) -> ClInt;

    fn enqueue_marker_with_wait_list(
        &self,
        queue: RawHandle,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt;

    fn enqueue_barrier_with_wait_list(
        &self,
        queue: RawHandle,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt;
}

/// Shared virtual memory (2.0).
pub trait NativeSvm {
    fn svm_alloc(&self, context: RawHandle, flags: MemFlags, size: usize, alignment: u32) -> *mut c_void;

    /// # Safety
    /// `ptr` must come from `svm_alloc` on `context` and not be in use by
    /// any queued command.
    unsafe fn svm_free(&self, context: RawHandle, ptr: *mut c_void);

    /// # Safety
    /// Every pointer must come from `svm_alloc` and not be freed twice.
    unsafe fn enqueue_svm_free(
        &self,
        queue: RawHandle,
        pointers: &mut [*mut c_void],
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt;

    /// # Safety
    /// Both ranges must be valid for `size` bytes until the command
    /// completes.
    unsafe fn enqueue_svm_memcpy(
        &self,
        queue: RawHandle,
        blocking: bool,
        dst: *mut c_void,
        src: *const c_void,
        size: usize,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt;

    /// # Safety
    /// `ptr..ptr+size` must lie inside one SVM allocation.
    unsafe fn enqueue_svm_mem_fill(
        &self,
        queue: RawHandle,
        ptr: *mut c_void,
        pattern: &[u8],
        size: usize,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt;

    /// # Safety
    /// `ptr..ptr+size` must lie inside one SVM allocation.
    unsafe fn enqueue_svm_map(
        &self,
        queue: RawHandle,
        blocking: bool,
        flags: MapFlags,
        ptr: *mut c_void,
        size: usize,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt;

    /// # Safety
    /// `ptr` must have been mapped with `enqueue_svm_map`.
    unsafe fn enqueue_svm_unmap(
        &self,
        queue: RawHandle,
        ptr: *mut c_void,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_targets_route_to_matching_entry() {
        let h = RawHandle(0x40);
        assert_eq!(InfoTarget::Pipe(h).entry(), EntryPoint::GetPipeInfo);
        assert_eq!(InfoTarget::Pipe(h).subject(), (HandleKind::Memory, h));
        let arg = InfoTarget::KernelArg { kernel: h, index: 2 };
        assert_eq!(arg.entry().min_tier(), VersionTier::V1_2);
        assert_eq!(arg.subject().0, HandleKind::Kernel);
    }

    #[test]
    fn device_refcounting_needs_1_2() {
        assert_eq!(retain_entry(HandleKind::Device).map(EntryPoint::min_tier), Some(VersionTier::V1_2));
        assert_eq!(release_entry(HandleKind::Platform), None);
    }
}
