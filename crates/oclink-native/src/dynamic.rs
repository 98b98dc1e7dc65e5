// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Call table backed by the platform's OpenCL library, loaded at runtime.
//
// Every symbol is resolved optionally; the tier the library can serve is
// derived from which marker symbols are present. A call through a symbol the
// library does not export returns CL_INVALID_OPERATION.

#![allow(clippy::too_many_arguments)]

use std::ffi::{CStr, c_char, c_void};

use libloading::{Library, Symbol};
use oclink_core::config::BindingConfig;
use oclink_core::error::{OclinkError, Result};
use oclink_core::status::{CL_SUCCESS, ClInt};
use oclink_core::types::{
    BufferRegion, CL_BUFFER_CREATE_TYPE_REGION, DeviceType, HandleKind, ImageDesc, ImageFormat,
    MapFlags, MemFlags, NativeVariant, QueueProperties, RawHandle, RectCopy, RectRegion,
    VersionTier,
};
use tracing::{debug, info, warn};

use crate::api::{
    ContextNotifyFn, EventNotifyFn, InfoTarget, MemNotifyFn, NativeApi, NativeContext,
    NativeDiscovery, NativeEnqueue, NativeEvent, NativeMemory, NativeProgram, NativeSvm,
    ProgramNotifyFn, UserData,
};
use crate::entry::EntryPoint;

const CL_INVALID_OPERATION: ClInt = -59;
const CL_INVALID_VALUE: ClInt = -30;

type InfoFn = unsafe extern "C" fn(RawHandle, u32, usize, *mut c_void, *mut usize) -> ClInt;
type PairInfoFn =
    unsafe extern "C" fn(RawHandle, RawHandle, u32, usize, *mut c_void, *mut usize) -> ClInt;
type RefFn = unsafe extern "C" fn(RawHandle) -> ClInt;
type TaskFn =
    unsafe extern "C" fn(RawHandle, RawHandle, u32, *const RawHandle, *mut RawHandle) -> ClInt;

macro_rules! symbol_table {
    ($($field:ident: $entry:ident => $ty:ty;)*) => {
        struct Symbols {
            $($field: Option<$ty>,)*
        }

        impl Symbols {
            /// # Safety
            /// `lib` must be an OpenCL implementation whose exports match the
            /// declared C signatures.
            unsafe fn resolve(lib: &Library) -> Self {
                Self {
                    $($field: unsafe { load_fn_opt::<$ty>(lib, EntryPoint::$entry) },)*
                }
            }

            fn has(&self, entry: EntryPoint) -> bool {
                match entry {
                    $(EntryPoint::$entry => self.$field.is_some(),)*
                }
            }

            #[cfg(test)]
            fn empty() -> Self {
                Self {
                    $($field: None,)*
                }
            }
        }
    };
}

symbol_table! {
    get_platform_ids: GetPlatformIds => unsafe extern "C" fn(u32, *mut RawHandle, *mut u32) -> ClInt;
    get_platform_info: GetPlatformInfo => InfoFn;
    get_device_ids: GetDeviceIds => unsafe extern "C" fn(RawHandle, u64, u32, *mut RawHandle, *mut u32) -> ClInt;
    get_device_info: GetDeviceInfo => InfoFn;
    create_context: CreateContext => unsafe extern "C" fn(*const isize, u32, *const RawHandle, Option<ContextNotifyFn>, UserData, *mut ClInt) -> RawHandle;
    create_context_from_type: CreateContextFromType => unsafe extern "C" fn(*const isize, u64, Option<ContextNotifyFn>, UserData, *mut ClInt) -> RawHandle;
    retain_context: RetainContext => RefFn;
    release_context: ReleaseContext => RefFn;
    get_context_info: GetContextInfo => InfoFn;
    create_command_queue: CreateCommandQueue => unsafe extern "C" fn(RawHandle, RawHandle, u64, *mut ClInt) -> RawHandle;
    retain_command_queue: RetainCommandQueue => RefFn;
    release_command_queue: ReleaseCommandQueue => RefFn;
    get_command_queue_info: GetCommandQueueInfo => InfoFn;
    set_command_queue_property: SetCommandQueueProperty => unsafe extern "C" fn(RawHandle, u64, u32, *mut u64) -> ClInt;
    create_buffer: CreateBuffer => unsafe extern "C" fn(RawHandle, u64, usize, *mut c_void, *mut ClInt) -> RawHandle;
    create_image_2d: CreateImage2d => unsafe extern "C" fn(RawHandle, u64, *const ImageFormat, usize, usize, usize, *mut c_void, *mut ClInt) -> RawHandle;
    create_image_3d: CreateImage3d => unsafe extern "C" fn(RawHandle, u64, *const ImageFormat, usize, usize, usize, usize, usize, *mut c_void, *mut ClInt) -> RawHandle;
    retain_mem_object: RetainMemObject => RefFn;
    release_mem_object: ReleaseMemObject => RefFn;
    get_mem_object_info: GetMemObjectInfo => InfoFn;
    get_image_info: GetImageInfo => InfoFn;
    create_sampler: CreateSampler => unsafe extern "C" fn(RawHandle, u32, u32, u32, *mut ClInt) -> RawHandle;
    retain_sampler: RetainSampler => RefFn;
    release_sampler: ReleaseSampler => RefFn;
    get_sampler_info: GetSamplerInfo => InfoFn;
    create_program_with_source: CreateProgramWithSource => unsafe extern "C" fn(RawHandle, u32, *const *const c_char, *const usize, *mut ClInt) -> RawHandle;
    create_program_with_binary: CreateProgramWithBinary => unsafe extern "C" fn(RawHandle, u32, *const RawHandle, *const usize, *const *const u8, *mut ClInt, *mut ClInt) -> RawHandle;
    retain_program: RetainProgram => RefFn;
    release_program: ReleaseProgram => RefFn;
    build_program: BuildProgram => unsafe extern "C" fn(RawHandle, u32, *const RawHandle, *const c_char, Option<ProgramNotifyFn>, UserData) -> ClInt;
    get_program_info: GetProgramInfo => InfoFn;
    get_program_build_info: GetProgramBuildInfo => PairInfoFn;
    create_kernel: CreateKernel => unsafe extern "C" fn(RawHandle, *const c_char, *mut ClInt) -> RawHandle;
    create_kernels_in_program: CreateKernelsInProgram => unsafe extern "C" fn(RawHandle, u32, *mut RawHandle, *mut u32) -> ClInt;
    retain_kernel: RetainKernel => RefFn;
    release_kernel: ReleaseKernel => RefFn;
    set_kernel_arg: SetKernelArg => unsafe extern "C" fn(RawHandle, u32, usize, *const c_void) -> ClInt;
    get_kernel_info: GetKernelInfo => InfoFn;
    get_kernel_work_group_info: GetKernelWorkGroupInfo => PairInfoFn;
    wait_for_events: WaitForEvents => unsafe extern "C" fn(u32, *const RawHandle) -> ClInt;
    get_event_info: GetEventInfo => InfoFn;
    retain_event: RetainEvent => RefFn;
    release_event: ReleaseEvent => RefFn;
    get_event_profiling_info: GetEventProfilingInfo => InfoFn;
    flush: Flush => RefFn;
    finish: Finish => RefFn;
    enqueue_read_buffer: EnqueueReadBuffer => unsafe extern "C" fn(RawHandle, RawHandle, u32, usize, usize, *mut c_void, u32, *const RawHandle, *mut RawHandle) -> ClInt;
    enqueue_write_buffer: EnqueueWriteBuffer => unsafe extern "C" fn(RawHandle, RawHandle, u32, usize, usize, *const c_void, u32, *const RawHandle, *mut RawHandle) -> ClInt;
    enqueue_copy_buffer: EnqueueCopyBuffer => unsafe extern "C" fn(RawHandle, RawHandle, RawHandle, usize, usize, usize, u32, *const RawHandle, *mut RawHandle) -> ClInt;
    enqueue_read_image: EnqueueReadImage => unsafe extern "C" fn(RawHandle, RawHandle, u32, *const usize, *const usize, usize, usize, *mut c_void, u32, *const RawHandle, *mut RawHandle) -> ClInt;
    enqueue_write_image: EnqueueWriteImage => unsafe extern "C" fn(RawHandle, RawHandle, u32, *const usize, *const usize, usize, usize, *const c_void, u32, *const RawHandle, *mut RawHandle) -> ClInt;
    enqueue_copy_image: EnqueueCopyImage => unsafe extern "C" fn(RawHandle, RawHandle, RawHandle, *const usize, *const usize, *const usize, u32, *const RawHandle, *mut RawHandle) -> ClInt;
    enqueue_map_buffer: EnqueueMapBuffer => unsafe extern "C" fn(RawHandle, RawHandle, u32, u64, usize, usize, u32, *const RawHandle, *mut RawHandle, *mut ClInt) -> *mut c_void;
    enqueue_unmap_mem_object: EnqueueUnmapMemObject => unsafe extern "C" fn(RawHandle, RawHandle, *mut c_void, u32, *const RawHandle, *mut RawHandle) -> ClInt;
    enqueue_nd_range_kernel: EnqueueNdRangeKernel => unsafe extern "C" fn(RawHandle, RawHandle, u32, *const usize, *const usize, *const usize, u32, *const RawHandle, *mut RawHandle) -> ClInt;
    enqueue_task: EnqueueTask => TaskFn;
    enqueue_marker: EnqueueMarker => unsafe extern "C" fn(RawHandle, *mut RawHandle) -> ClInt;
    enqueue_wait_for_events: EnqueueWaitForEvents => unsafe extern "C" fn(RawHandle, u32, *const RawHandle) -> ClInt;
    enqueue_barrier: EnqueueBarrier => RefFn;

    create_sub_buffer: CreateSubBuffer => unsafe extern "C" fn(RawHandle, u64, u32, *const c_void, *mut ClInt) -> RawHandle;
    set_mem_object_destructor_callback: SetMemObjectDestructorCallback => unsafe extern "C" fn(RawHandle, MemNotifyFn, UserData) -> ClInt;
    create_user_event: CreateUserEvent => unsafe extern "C" fn(RawHandle, *mut ClInt) -> RawHandle;
    set_user_event_status: SetUserEventStatus => unsafe extern "C" fn(RawHandle, ClInt) -> ClInt;
    set_event_callback: SetEventCallback => unsafe extern "C" fn(RawHandle, ClInt, EventNotifyFn, UserData) -> ClInt;
    enqueue_read_buffer_rect: EnqueueReadBufferRect => unsafe extern "C" fn(RawHandle, RawHandle, u32, *const usize, *const usize, *const usize, usize, usize, usize, usize, *mut c_void, u32, *const RawHandle, *mut RawHandle) -> ClInt;
    enqueue_write_buffer_rect: EnqueueWriteBufferRect => unsafe extern "C" fn(RawHandle, RawHandle, u32, *const usize, *const usize, *const usize, usize, usize, usize, usize, *const c_void, u32, *const RawHandle, *mut RawHandle) -> ClInt;
    enqueue_copy_buffer_rect: EnqueueCopyBufferRect => unsafe extern "C" fn(RawHandle, RawHandle, RawHandle, *const usize, *const usize, *const usize, usize, usize, usize, usize, u32, *const RawHandle, *mut RawHandle) -> ClInt;

    create_sub_devices: CreateSubDevices => unsafe extern "C" fn(RawHandle, *const isize, u32, *mut RawHandle, *mut u32) -> ClInt;
    retain_device: RetainDevice => RefFn;
    release_device: ReleaseDevice => RefFn;
    create_image: CreateImage => unsafe extern "C" fn(RawHandle, u64, *const ImageFormat, *const ImageDesc, *mut c_void, *mut ClInt) -> RawHandle;
    compile_program: CompileProgram => unsafe extern "C" fn(RawHandle, u32, *const RawHandle, *const c_char, u32, *const RawHandle, *const *const c_char, Option<ProgramNotifyFn>, UserData) -> ClInt;
    link_program: LinkProgram => unsafe extern "C" fn(RawHandle, u32, *const RawHandle, *const c_char, u32, *const RawHandle, Option<ProgramNotifyFn>, UserData, *mut ClInt) -> RawHandle;
    get_kernel_arg_info: GetKernelArgInfo => unsafe extern "C" fn(RawHandle, u32, u32, usize, *mut c_void, *mut usize) -> ClInt;
    enqueue_fill_buffer: EnqueueFillBuffer => unsafe extern "C" fn(RawHandle, RawHandle, *const c_void, usize, usize, usize, u32, *const RawHandle, *mut RawHandle) -> ClInt;
    enqueue_fill_image: EnqueueFillImage => unsafe extern "C" fn(RawHandle, RawHandle, *const c_void, *const usize, *const usize, u32, *const RawHandle, *mut RawHandle) -> ClInt;
    enqueue_marker_with_wait_list: EnqueueMarkerWithWaitList => unsafe extern "C" fn(RawHandle, u32, *const RawHandle, *mut RawHandle) -> ClInt;
    enqueue_barrier_with_wait_list: EnqueueBarrierWithWaitList => unsafe extern "C" fn(RawHandle, u32, *const RawHandle, *mut RawHandle) -> ClInt;

    create_command_queue_with_properties: CreateCommandQueueWithProperties => unsafe extern "C" fn(RawHandle, RawHandle, *const u64, *mut ClInt) -> RawHandle;
    create_pipe: CreatePipe => unsafe extern "C" fn(RawHandle, u64, u32, u32, *const isize, *mut ClInt) -> RawHandle;
    get_pipe_info: GetPipeInfo => InfoFn;
    svm_alloc: SvmAlloc => unsafe extern "C" fn(RawHandle, u64, usize, u32) -> *mut c_void;
    svm_free: SvmFree => unsafe extern "C" fn(RawHandle, *mut c_void);
    create_sampler_with_properties: CreateSamplerWithProperties => unsafe extern "C" fn(RawHandle, *const u64, *mut ClInt) -> RawHandle;
    set_kernel_arg_svm_pointer: SetKernelArgSvmPointer => unsafe extern "C" fn(RawHandle, u32, *const c_void) -> ClInt;
    enqueue_svm_free: EnqueueSvmFree => unsafe extern "C" fn(RawHandle, u32, *mut *mut c_void, *const c_void, UserData, u32, *const RawHandle, *mut RawHandle) -> ClInt;
    enqueue_svm_memcpy: EnqueueSvmMemcpy => unsafe extern "C" fn(RawHandle, u32, *mut c_void, *const c_void, usize, u32, *const RawHandle, *mut RawHandle) -> ClInt;
    enqueue_svm_mem_fill: EnqueueSvmMemFill => unsafe extern "C" fn(RawHandle, *mut c_void, *const c_void, usize, usize, u32, *const RawHandle, *mut RawHandle) -> ClInt;
    enqueue_svm_map: EnqueueSvmMap => unsafe extern "C" fn(RawHandle, u32, u64, *mut c_void, usize, u32, *const RawHandle, *mut RawHandle) -> ClInt;
    enqueue_svm_unmap: EnqueueSvmUnmap => unsafe extern "C" fn(RawHandle, *mut c_void, u32, *const RawHandle, *mut RawHandle) -> ClInt;
}

/// Call a resolved symbol, or bail out with `$fallback` when the library
/// does not export it.
macro_rules! native {
    ($self:ident.$field:ident($($arg:expr),* $(,)?)) => {
        native!($self.$field($($arg),*) else CL_INVALID_OPERATION)
    };
    ($self:ident.$field:ident($($arg:expr),* $(,)?) else $fallback:expr) => {
        match $self.symbols.$field {
            // SAFETY: the pointer was resolved from the loaded library under
            // the C signature declared in `Symbols`; argument validity is the
            // caller's contract for the surrounding method.
            Some(f) => unsafe { f($($arg),*) },
            None => {
                warn!(symbol = stringify!($field), "entry point not exported by the loaded library");
                return $fallback;
            }
        }
    };
}

/// # Safety
/// `F` must be the C signature of the named export.
unsafe fn load_fn_opt<F: Copy>(lib: &Library, entry: EntryPoint) -> Option<F> {
    let sym: Option<Symbol<F>> = unsafe { lib.get(entry.symbol().as_bytes()).ok() };
    sym.map(|s| *s)
}

fn bool_arg(value: bool) -> u32 {
    u32::from(value)
}

fn wait_args(list: &[RawHandle]) -> (u32, *const RawHandle) {
    if list.is_empty() {
        (0, std::ptr::null())
    } else {
        (list.len() as u32, list.as_ptr())
    }
}

fn event_arg(event: Option<&mut RawHandle>) -> *mut RawHandle {
    event.map_or(std::ptr::null_mut(), |e| e as *mut RawHandle)
}

fn out_args(out: Option<&mut [RawHandle]>) -> (u32, *mut RawHandle) {
    match out {
        Some(buf) => (buf.len() as u32, buf.as_mut_ptr()),
        None => (0, std::ptr::null_mut()),
    }
}

fn props_arg<T>(props: &[T]) -> *const T {
    if props.is_empty() {
        std::ptr::null()
    } else {
        props.as_ptr()
    }
}

fn value_args(value: Option<&mut [u8]>) -> (usize, *mut c_void) {
    match value {
        Some(buf) => (buf.len(), buf.as_mut_ptr().cast()),
        None => (0, std::ptr::null_mut()),
    }
}

/// The platform's OpenCL library with its resolved entry points.
pub struct DynamicLibrary {
    variant: NativeVariant,
    path: String,
    tier: VersionTier,
    symbols: Symbols,
    _lib: Library,
}

impl DynamicLibrary {
    /// Try each configured candidate for `variant` in order and keep the
    /// first one that exports `clGetPlatformIDs`.
    pub fn open(variant: NativeVariant, config: &BindingConfig) -> Result<Self> {
        let mut failures = Vec::new();
        for candidate in config.libraries_for(variant) {
            // SAFETY: loading runs the library's initialisers; OpenCL ICD
            // loaders and vendor runtimes are expected to be well-behaved.
            let lib = match unsafe { Library::new(candidate) } {
                Ok(lib) => lib,
                Err(e) => {
                    debug!(library = %candidate, error = %e, "candidate did not load");
                    failures.push(format!("{candidate}: {e}"));
                    continue;
                }
            };
            // SAFETY: symbols are interpreted with the OpenCL C signatures.
            let symbols = unsafe { Symbols::resolve(&lib) };
            if symbols.get_platform_ids.is_none() {
                failures.push(format!("{candidate}: clGetPlatformIDs not exported"));
                continue;
            }
            let detected = detect_tier(&symbols);
            let tier = config.max_tier.map_or(detected, |cap| detected.min(cap));
            let missing = EntryPoint::ALL
                .iter()
                .filter(|e| e.min_tier() <= tier && !symbols.has(**e))
                .count();
            if missing > 0 {
                warn!(library = %candidate, missing, %tier, "library lacks some entry points of its tier");
            }
            info!(library = %candidate, %variant, %detected, %tier, "OpenCL library loaded");
            return Ok(Self {
                variant,
                path: candidate.clone(),
                tier,
                symbols,
                _lib: lib,
            });
        }
        Err(OclinkError::LibraryLoad(if failures.is_empty() {
            format!("no library candidates configured for {variant}")
        } else {
            failures.join("; ")
        }))
    }

    /// Whether the library exports `entry`.
    pub fn exports(&self, entry: EntryPoint) -> bool {
        self.symbols.has(entry)
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Highest tier whose marker symbol is exported.
fn detect_tier(symbols: &Symbols) -> VersionTier {
    if symbols.create_command_queue_with_properties.is_some() {
        VersionTier::V2_0
    } else if symbols.create_sub_devices.is_some() {
        VersionTier::V1_2
    } else if symbols.create_sub_buffer.is_some() {
        VersionTier::V1_1
    } else {
        VersionTier::V1_0
    }
}

impl NativeApi for DynamicLibrary {
    fn variant(&self) -> NativeVariant {
        self.variant
    }

    fn tier(&self) -> VersionTier {
        self.tier
    }

    fn describe(&self) -> String {
        self.path.clone()
    }
}

impl NativeDiscovery for DynamicLibrary {
    fn get_platform_ids(&self, platforms: Option<&mut [RawHandle]>, num_platforms: &mut u32) -> ClInt {
        let (len, ptr) = out_args(platforms);
        native!(self.get_platform_ids(len, ptr, num_platforms))
    }

    fn get_device_ids(
        &self,
        platform: RawHandle,
        device_type: DeviceType,
        devices: Option<&mut [RawHandle]>,
        num_devices: &mut u32,
    ) -> ClInt {
        let (len, ptr) = out_args(devices);
        native!(self.get_device_ids(platform, device_type.bits(), len, ptr, num_devices))
    }

    fn create_sub_devices(
        &self,
        device: RawHandle,
        properties: &[isize],
        devices: Option<&mut [RawHandle]>,
        num_devices: &mut u32,
    ) -> ClInt {
        let (len, ptr) = out_args(devices);
        native!(self.create_sub_devices(device, props_arg(properties), len, ptr, num_devices))
    }

    fn get_info(
        &self,
        target: InfoTarget,
        param: u32,
        value: Option<&mut [u8]>,
        size_ret: &mut usize,
    ) -> ClInt {
        let (len, ptr) = value_args(value);
        match target {
            InfoTarget::Platform(h) => native!(self.get_platform_info(h, param, len, ptr, size_ret)),
            InfoTarget::Device(h) => native!(self.get_device_info(h, param, len, ptr, size_ret)),
            InfoTarget::Context(h) => native!(self.get_context_info(h, param, len, ptr, size_ret)),
            InfoTarget::CommandQueue(h) => {
                native!(self.get_command_queue_info(h, param, len, ptr, size_ret))
            }
            InfoTarget::Memory(h) => native!(self.get_mem_object_info(h, param, len, ptr, size_ret)),
            InfoTarget::Image(h) => native!(self.get_image_info(h, param, len, ptr, size_ret)),
            InfoTarget::Pipe(h) => native!(self.get_pipe_info(h, param, len, ptr, size_ret)),
            InfoTarget::Sampler(h) => native!(self.get_sampler_info(h, param, len, ptr, size_ret)),
            InfoTarget::Program(h) => native!(self.get_program_info(h, param, len, ptr, size_ret)),
            InfoTarget::ProgramBuild { program, device } => {
                native!(self.get_program_build_info(program, device, param, len, ptr, size_ret))
            }
            InfoTarget::Kernel(h) => native!(self.get_kernel_info(h, param, len, ptr, size_ret)),
            InfoTarget::KernelWorkGroup { kernel, device } => {
                native!(self.get_kernel_work_group_info(kernel, device, param, len, ptr, size_ret))
            }
            InfoTarget::KernelArg { kernel, index } => {
                native!(self.get_kernel_arg_info(kernel, index, param, len, ptr, size_ret))
            }
            InfoTarget::Event(h) => native!(self.get_event_info(h, param, len, ptr, size_ret)),
            InfoTarget::EventProfiling(h) => {
                native!(self.get_event_profiling_info(h, param, len, ptr, size_ret))
            }
        }
    }

    fn retain(&self, kind: HandleKind, handle: RawHandle) -> ClInt {
        match kind {
            HandleKind::Platform => CL_SUCCESS,
            HandleKind::Device => native!(self.retain_device(handle)),
            HandleKind::Context => native!(self.retain_context(handle)),
            HandleKind::CommandQueue => native!(self.retain_command_queue(handle)),
            HandleKind::Memory => native!(self.retain_mem_object(handle)),
            HandleKind::Program => native!(self.retain_program(handle)),
            HandleKind::Kernel => native!(self.retain_kernel(handle)),
            HandleKind::Event => native!(self.retain_event(handle)),
            HandleKind::Sampler => native!(self.retain_sampler(handle)),
        }
    }

    fn release(&self, kind: HandleKind, handle: RawHandle) -> ClInt {
        match kind {
            HandleKind::Platform => CL_SUCCESS,
            HandleKind::Device => native!(self.release_device(handle)),
            HandleKind::Context => native!(self.release_context(handle)),
            HandleKind::CommandQueue => native!(self.release_command_queue(handle)),
            HandleKind::Memory => native!(self.release_mem_object(handle)),
            HandleKind::Program => native!(self.release_program(handle)),
            HandleKind::Kernel => native!(self.release_kernel(handle)),
            HandleKind::Event => native!(self.release_event(handle)),
            HandleKind::Sampler => native!(self.release_sampler(handle)),
        }
    }
}

/// Set `errcode` and produce a null handle for a missing create entry.
fn no_handle(errcode: &mut ClInt) -> RawHandle {
    *errcode = CL_INVALID_OPERATION;
    RawHandle::NULL
}

impl NativeContext for DynamicLibrary {
    fn create_context(
        &self,
        properties: &[isize],
        devices: &[RawHandle],
        notify: Option<ContextNotifyFn>,
        user_data: UserData,
        errcode: &mut ClInt,
    ) -> RawHandle {
        native!(self.create_context(
            props_arg(properties),
            devices.len() as u32,
            devices.as_ptr(),
            notify,
            user_data,
            errcode
        ) else no_handle(errcode))
    }

    fn create_context_from_type(
        &self,
        properties: &[isize],
        device_type: DeviceType,
        notify: Option<ContextNotifyFn>,
        user_data: UserData,
        errcode: &mut ClInt,
    ) -> RawHandle {
        native!(self.create_context_from_type(
            props_arg(properties),
            device_type.bits(),
            notify,
            user_data,
            errcode
        ) else no_handle(errcode))
    }

    fn create_command_queue(
        &self,
        context: RawHandle,
        device: RawHandle,
        properties: QueueProperties,
        errcode: &mut ClInt,
    ) -> RawHandle {
        native!(self.create_command_queue(context, device, properties.bits(), errcode) else no_handle(errcode))
    }

    fn create_command_queue_with_properties(
        &self,
        context: RawHandle,
        device: RawHandle,
        properties: &[u64],
        errcode: &mut ClInt,
    ) -> RawHandle {
        native!(self.create_command_queue_with_properties(context, device, props_arg(properties), errcode) else no_handle(errcode))
    }

    fn set_command_queue_property(
        &self,
        queue: RawHandle,
        properties: QueueProperties,
        enable: bool,
        old_properties: &mut u64,
    ) -> ClInt {
        native!(self.set_command_queue_property(queue, properties.bits(), bool_arg(enable), old_properties))
    }

    fn flush(&self, queue: RawHandle) -> ClInt {
        native!(self.flush(queue))
    }

    fn finish(&self, queue: RawHandle) -> ClInt {
        native!(self.finish(queue))
    }
}

impl NativeMemory for DynamicLibrary {
    unsafe fn create_buffer(
        &self,
        context: RawHandle,
        flags: MemFlags,
        size: usize,
        host_ptr: *mut c_void,
        errcode: &mut ClInt,
    ) -> RawHandle {
        native!(self.create_buffer(context, flags.bits(), size, host_ptr, errcode) else no_handle(errcode))
    }

    fn create_sub_buffer(
        &self,
        buffer: RawHandle,
        flags: MemFlags,
        region: &BufferRegion,
        errcode: &mut ClInt,
    ) -> RawHandle {
        let info = (region as *const BufferRegion).cast::<c_void>();
        native!(self.create_sub_buffer(buffer, flags.bits(), CL_BUFFER_CREATE_TYPE_REGION, info, errcode) else no_handle(errcode))
    }

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
    ) -> RawHandle {
        native!(self.create_image_2d(context, flags.bits(), format, width, height, row_pitch, host_ptr, errcode) else no_handle(errcode))
    }

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
    ) -> RawHandle {
        native!(self.create_image_3d(
            context,
            flags.bits(),
            format,
            width,
            height,
            depth,
            row_pitch,
            slice_pitch,
            host_ptr,
            errcode
        ) else no_handle(errcode))
    }

    unsafe fn create_image(
        &self,
        context: RawHandle,
        flags: MemFlags,
        format: &ImageFormat,
        desc: &ImageDesc,
        host_ptr: *mut c_void,
        errcode: &mut ClInt,
    ) -> RawHandle {
        native!(self.create_image(context, flags.bits(), format, desc, host_ptr, errcode) else no_handle(errcode))
    }

    fn create_pipe(
        &self,
        context: RawHandle,
        flags: MemFlags,
        packet_size: u32,
        max_packets: u32,
        errcode: &mut ClInt,
    ) -> RawHandle {
        native!(self.create_pipe(context, flags.bits(), packet_size, max_packets, std::ptr::null(), errcode) else no_handle(errcode))
    }

    fn set_mem_object_destructor_callback(
        &self,
        memobj: RawHandle,
        notify: MemNotifyFn,
        user_data: UserData,
    ) -> ClInt {
        native!(self.set_mem_object_destructor_callback(memobj, notify, user_data))
    }

    fn create_sampler(
        &self,
        context: RawHandle,
        normalized_coords: bool,
        addressing_mode: u32,
        filter_mode: u32,
        errcode: &mut ClInt,
    ) -> RawHandle {
        native!(self.create_sampler(context, bool_arg(normalized_coords), addressing_mode, filter_mode, errcode) else no_handle(errcode))
    }

    fn create_sampler_with_properties(
        &self,
        context: RawHandle,
        properties: &[u64],
        errcode: &mut ClInt,
    ) -> RawHandle {
        native!(self.create_sampler_with_properties(context, props_arg(properties), errcode) else no_handle(errcode))
    }
}

impl NativeProgram for DynamicLibrary {
    fn create_program_with_source(
        &self,
        context: RawHandle,
        sources: &[&str],
        errcode: &mut ClInt,
    ) -> RawHandle {
        let strings: Vec<*const c_char> = sources.iter().map(|s| s.as_ptr().cast()).collect();
        let lengths: Vec<usize> = sources.iter().map(|s| s.len()).collect();
        native!(self.create_program_with_source(
            context,
            sources.len() as u32,
            strings.as_ptr(),
            lengths.as_ptr(),
            errcode
        ) else no_handle(errcode))
    }

    fn create_program_with_binary(
        &self,
        context: RawHandle,
        devices: &[RawHandle],
        binaries: &[&[u8]],
        binary_status: &mut [ClInt],
        errcode: &mut ClInt,
    ) -> RawHandle {
        if binaries.len() != devices.len() || binary_status.len() != devices.len() {
            *errcode = CL_INVALID_VALUE;
            return RawHandle::NULL;
        }
        let lengths: Vec<usize> = binaries.iter().map(|b| b.len()).collect();
        let pointers: Vec<*const u8> = binaries.iter().map(|b| b.as_ptr()).collect();
        native!(self.create_program_with_binary(
            context,
            devices.len() as u32,
            devices.as_ptr(),
            lengths.as_ptr(),
            pointers.as_ptr(),
            binary_status.as_mut_ptr(),
            errcode
        ) else no_handle(errcode))
    }

    fn build_program(
        &self,
        program: RawHandle,
        devices: &[RawHandle],
        options: &CStr,
        notify: Option<ProgramNotifyFn>,
        user_data: UserData,
    ) -> ClInt {
        native!(self.build_program(
            program,
            devices.len() as u32,
            props_arg(devices),
            options.as_ptr(),
            notify,
            user_data
        ))
    }

    fn compile_program(
        &self,
        program: RawHandle,
        devices: &[RawHandle],
        options: &CStr,
        headers: &[RawHandle],
        header_names: &[&CStr],
        notify: Option<ProgramNotifyFn>,
        user_data: UserData,
    ) -> ClInt {
        if headers.len() != header_names.len() {
            return CL_INVALID_VALUE;
        }
        let names: Vec<*const c_char> = header_names.iter().map(|n| n.as_ptr()).collect();
        native!(self.compile_program(
            program,
            devices.len() as u32,
            props_arg(devices),
            options.as_ptr(),
            headers.len() as u32,
            props_arg(headers),
            props_arg(&names),
            notify,
            user_data
        ))
    }

    fn link_program(
        &self,
        context: RawHandle,
        devices: &[RawHandle],
        options: &CStr,
        inputs: &[RawHandle],
        notify: Option<ProgramNotifyFn>,
        user_data: UserData,
        errcode: &mut ClInt,
    ) -> RawHandle {
        native!(self.link_program(
            context,
            devices.len() as u32,
            props_arg(devices),
            options.as_ptr(),
            inputs.len() as u32,
            inputs.as_ptr(),
            notify,
            user_data,
            errcode
        ) else no_handle(errcode))
    }

    fn create_kernel(&self, program: RawHandle, name: &CStr, errcode: &mut ClInt) -> RawHandle {
        native!(self.create_kernel(program, name.as_ptr(), errcode) else no_handle(errcode))
    }

    fn create_kernels_in_program(
        &self,
        program: RawHandle,
        kernels: Option<&mut [RawHandle]>,
        num_kernels: &mut u32,
    ) -> ClInt {
        let (len, ptr) = out_args(kernels);
        native!(self.create_kernels_in_program(program, len, ptr, num_kernels))
    }

    unsafe fn set_kernel_arg(
        &self,
        kernel: RawHandle,
        index: u32,
        size: usize,
        value: *const c_void,
    ) -> ClInt {
        native!(self.set_kernel_arg(kernel, index, size, value))
    }

    unsafe fn set_kernel_arg_svm_pointer(
        &self,
        kernel: RawHandle,
        index: u32,
        ptr: *const c_void,
    ) -> ClInt {
        native!(self.set_kernel_arg_svm_pointer(kernel, index, ptr))
    }
}

impl NativeEvent for DynamicLibrary {
    fn create_user_event(&self, context: RawHandle, errcode: &mut ClInt) -> RawHandle {
        native!(self.create_user_event(context, errcode) else no_handle(errcode))
    }

    fn set_user_event_status(&self, event: RawHandle, status: ClInt) -> ClInt {
        native!(self.set_user_event_status(event, status))
    }

    fn set_event_callback(
        &self,
        event: RawHandle,
        callback_type: ClInt,
        notify: EventNotifyFn,
        user_data: UserData,
    ) -> ClInt {
        native!(self.set_event_callback(event, callback_type, notify, user_data))
    }

    fn wait_for_events(&self, events: &[RawHandle]) -> ClInt {
        native!(self.wait_for_events(events.len() as u32, events.as_ptr()))
    }
}

impl NativeEnqueue for DynamicLibrary {
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
    ) -> ClInt {
        let (n, w) = wait_args(wait_list);
        native!(self.enqueue_read_buffer(queue, buffer, bool_arg(blocking), offset, size, dst, n, w, event_arg(event)))
    }

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
    ) -> ClInt {
        let (n, w) = wait_args(wait_list);
        native!(self.enqueue_write_buffer(queue, buffer, bool_arg(blocking), offset, size, src, n, w, event_arg(event)))
    }

    unsafe fn enqueue_read_buffer_rect(
        &self,
        queue: RawHandle,
        buffer: RawHandle,
        blocking: bool,
        rect: &RectRegion,
        dst: *mut c_void,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        let (n, w) = wait_args(wait_list);
        native!(self.enqueue_read_buffer_rect(
            queue,
            buffer,
            bool_arg(blocking),
            rect.buffer_origin.as_ptr(),
            rect.host_origin.as_ptr(),
            rect.region.as_ptr(),
            rect.buffer_row_pitch,
            rect.buffer_slice_pitch,
            rect.host_row_pitch,
            rect.host_slice_pitch,
            dst,
            n,
            w,
            event_arg(event)
        ))
    }

    unsafe fn enqueue_write_buffer_rect(
        &self,
        queue: RawHandle,
        buffer: RawHandle,
        blocking: bool,
        rect: &RectRegion,
        src: *const c_void,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        let (n, w) = wait_args(wait_list);
        native!(self.enqueue_write_buffer_rect(
            queue,
            buffer,
            bool_arg(blocking),
            rect.buffer_origin.as_ptr(),
            rect.host_origin.as_ptr(),
            rect.region.as_ptr(),
            rect.buffer_row_pitch,
            rect.buffer_slice_pitch,
            rect.host_row_pitch,
            rect.host_slice_pitch,
            src,
            n,
            w,
            event_arg(event)
        ))
    }

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
    ) -> ClInt {
        let (n, w) = wait_args(wait_list);
        native!(self.enqueue_copy_buffer(queue, src, dst, src_offset, dst_offset, size, n, w, event_arg(event)))
    }

    fn enqueue_copy_buffer_rect(
        &self,
        queue: RawHandle,
        src: RawHandle,
        dst: RawHandle,
        rect: &RectCopy,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        let (n, w) = wait_args(wait_list);
        native!(self.enqueue_copy_buffer_rect(
            queue,
            src,
            dst,
            rect.src_origin.as_ptr(),
            rect.dst_origin.as_ptr(),
            rect.region.as_ptr(),
            rect.src_row_pitch,
            rect.src_slice_pitch,
            rect.dst_row_pitch,
            rect.dst_slice_pitch,
            n,
            w,
            event_arg(event)
        ))
    }

    fn enqueue_fill_buffer(
        &self,
        queue: RawHandle,
        buffer: RawHandle,
        pattern: &[u8],
        offset: usize,
        size: usize,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        let (n, w) = wait_args(wait_list);
        native!(self.enqueue_fill_buffer(
            queue,
            buffer,
            pattern.as_ptr().cast(),
            pattern.len(),
            offset,
            size,
            n,
            w,
            event_arg(event)
        ))
    }

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
    ) -> ClInt {
        let (n, w) = wait_args(wait_list);
        native!(self.enqueue_read_image(
            queue,
            image,
            bool_arg(blocking),
            origin.as_ptr(),
            region.as_ptr(),
            row_pitch,
            slice_pitch,
            dst,
            n,
            w,
            event_arg(event)
        ))
    }

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
    ) -> ClInt {
        let (n, w) = wait_args(wait_list);
        native!(self.enqueue_write_image(
            queue,
            image,
            bool_arg(blocking),
            origin.as_ptr(),
            region.as_ptr(),
            row_pitch,
            slice_pitch,
            src,
            n,
            w,
            event_arg(event)
        ))
    }

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
    ) -> ClInt {
        let (n, w) = wait_args(wait_list);
        native!(self.enqueue_copy_image(
            queue,
            src,
            dst,
            src_origin.as_ptr(),
            dst_origin.as_ptr(),
            region.as_ptr(),
            n,
            w,
            event_arg(event)
        ))
    }

    fn enqueue_fill_image(
        &self,
        queue: RawHandle,
        image: RawHandle,
        fill_color: &[u8; 16],
        origin: [usize; 3],
        region: [usize; 3],
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        let (n, w) = wait_args(wait_list);
        native!(self.enqueue_fill_image(
            queue,
            image,
            fill_color.as_ptr().cast(),
            origin.as_ptr(),
            region.as_ptr(),
            n,
            w,
            event_arg(event)
        ))
    }

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
    ) -> *mut c_void {
        let (n, w) = wait_args(wait_list);
        native!(self.enqueue_map_buffer(
            queue,
            buffer,
            bool_arg(blocking),
            flags.bits(),
            offset,
            size,
            n,
            w,
            event_arg(event),
            errcode
        ) else {
            *errcode = CL_INVALID_OPERATION;
            std::ptr::null_mut()
        })
    }

    unsafe fn enqueue_unmap_mem_object(
        &self,
        queue: RawHandle,
        memobj: RawHandle,
        mapped: *mut c_void,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        let (n, w) = wait_args(wait_list);
        native!(self.enqueue_unmap_mem_object(queue, memobj, mapped, n, w, event_arg(event)))
    }

    fn enqueue_nd_range_kernel(
        &self,
        queue: RawHandle,
        kernel: RawHandle,
        offset: Option<&[usize]>,
        global: &[usize],
        local: Option<&[usize]>,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        let dims = global.len();
        if offset.is_some_and(|o| o.len() != dims) || local.is_some_and(|l| l.len() != dims) {
            return CL_INVALID_VALUE;
        }
        let (n, w) = wait_args(wait_list);
        native!(self.enqueue_nd_range_kernel(
            queue,
            kernel,
            dims as u32,
            offset.map_or(std::ptr::null(), <[usize]>::as_ptr),
            global.as_ptr(),
            local.map_or(std::ptr::null(), <[usize]>::as_ptr),
            n,
            w,
            event_arg(event)
        ))
    }

    fn enqueue_task(
        &self,
        queue: RawHandle,
        kernel: RawHandle,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        let (n, w) = wait_args(wait_list);
        native!(self.enqueue_task(queue, kernel, n, w, event_arg(event)))
    }

    fn enqueue_marker(&self, queue: RawHandle, event: &mut RawHandle) -> ClInt {
        native!(self.enqueue_marker(queue, event))
    }

    fn enqueue_barrier(&self, queue: RawHandle) -> ClInt {
        native!(self.enqueue_barrier(queue))
    }

    fn enqueue_wait_for_events(&self, queue: RawHandle, events: &[RawHandle]) -> ClInt {
        native!(self.enqueue_wait_for_events(queue, events.len() as u32, events.as_ptr()))
    }

    fn enqueue_marker_with_wait_list(
        &self,
        queue: RawHandle,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        let (n, w) = wait_args(wait_list);
        native!(self.enqueue_marker_with_wait_list(queue, n, w, event_arg(event)))
    }

    fn enqueue_barrier_with_wait_list(
        &self,
        queue: RawHandle,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        let (n, w) = wait_args(wait_list);
        native!(self.enqueue_barrier_with_wait_list(queue, n, w, event_arg(event)))
    }
}

impl NativeSvm for DynamicLibrary {
    fn svm_alloc(&self, context: RawHandle, flags: MemFlags, size: usize, alignment: u32) -> *mut c_void {
        native!(self.svm_alloc(context, flags.bits(), size, alignment) else std::ptr::null_mut())
    }

    unsafe fn svm_free(&self, context: RawHandle, ptr: *mut c_void) {
        native!(self.svm_free(context, ptr) else ())
    }

    unsafe fn enqueue_svm_free(
        &self,
        queue: RawHandle,
        pointers: &mut [*mut c_void],
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        let (n, w) = wait_args(wait_list);
        native!(self.enqueue_svm_free(
            queue,
            pointers.len() as u32,
            pointers.as_mut_ptr(),
            std::ptr::null(),
            std::ptr::null_mut(),
            n,
            w,
            event_arg(event)
        ))
    }

    unsafe fn enqueue_svm_memcpy(
        &self,
        queue: RawHandle,
        blocking: bool,
        dst: *mut c_void,
        src: *const c_void,
        size: usize,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        let (n, w) = wait_args(wait_list);
        native!(self.enqueue_svm_memcpy(queue, bool_arg(blocking), dst, src, size, n, w, event_arg(event)))
    }

    unsafe fn enqueue_svm_mem_fill(
        &self,
        queue: RawHandle,
        ptr: *mut c_void,
        pattern: &[u8],
        size: usize,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        let (n, w) = wait_args(wait_list);
        native!(self.enqueue_svm_mem_fill(
            queue,
            ptr,
            pattern.as_ptr().cast(),
            pattern.len(),
            size,
            n,
            w,
            event_arg(event)
        ))
    }

    unsafe fn enqueue_svm_map(
        &self,
        queue: RawHandle,
        blocking: bool,
        flags: MapFlags,
        ptr: *mut c_void,
        size: usize,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        let (n, w) = wait_args(wait_list);
        native!(self.enqueue_svm_map(queue, bool_arg(blocking), flags.bits(), ptr, size, n, w, event_arg(event)))
    }

    unsafe fn enqueue_svm_unmap(
        &self,
        queue: RawHandle,
        ptr: *mut c_void,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        let (n, w) = wait_args(wait_list);
        native!(self.enqueue_svm_unmap(queue, ptr, n, w, event_arg(event)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn missing_library_reports_every_candidate() {
        let config = BindingConfig {
            unix_libraries: vec!["/nonexistent/libOpenCL-a.so".into(), "/nonexistent/libOpenCL-b.so".into()],
            ..BindingConfig::default()
        };
        let err = match DynamicLibrary::open(NativeVariant::Unix, &config) {
            Ok(_) => panic!("nonexistent library loaded"),
            Err(e) => e,
        };
        let message = err.to_string();
        assert!(message.contains("libOpenCL-a.so"), "{message}");
        assert!(message.contains("libOpenCL-b.so"), "{message}");
    }

    #[test]
    fn empty_candidate_list_is_a_load_error() {
        let config = BindingConfig {
            mac_libraries: Vec::new(),
            ..BindingConfig::default()
        };
        assert!(matches!(
            DynamicLibrary::open(NativeVariant::Mac, &config),
            Err(OclinkError::LibraryLoad(_))
        ));
    }

    /// Arguments seen by `recording_enqueue_task`: queue, kernel, wait count
    /// and first waited event.
    static TASK_CALL: Mutex<Option<(RawHandle, RawHandle, u32, RawHandle)>> = Mutex::new(None);

    unsafe extern "C" fn recording_enqueue_task(
        queue: RawHandle,
        kernel: RawHandle,
        num_events: u32,
        wait_list: *const RawHandle,
        event: *mut RawHandle,
    ) -> ClInt {
        // SAFETY: the caller passes `num_events` handles at `wait_list`.
        let first = if num_events == 0 { RawHandle::NULL } else { unsafe { *wait_list } };
        *TASK_CALL.lock().expect("lock") = Some((queue, kernel, num_events, first));
        if !event.is_null() {
            // SAFETY: a non-null event points to writable storage.
            unsafe { *event = RawHandle(0xe7) };
        }
        0
    }

    struct Table {
        symbols: Symbols,
    }

    fn enqueue_task_via(
        table: &Table,
        queue: RawHandle,
        kernel: RawHandle,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        let (n, w) = wait_args(wait_list);
        native!(table.enqueue_task(queue, kernel, n, w, event_arg(event)))
    }

    #[test]
    fn enqueue_task_passes_queue_and_kernel_separately() {
        let mut table = Table {
            symbols: Symbols::empty(),
        };
        assert!(!table.symbols.has(EntryPoint::EnqueueTask));
        assert_eq!(
            enqueue_task_via(&table, RawHandle(0x10), RawHandle(0x20), &[], None),
            CL_INVALID_OPERATION
        );

        table.symbols.enqueue_task = Some(recording_enqueue_task);
        assert!(table.symbols.has(EntryPoint::EnqueueTask));
        let wait = [RawHandle(0x30), RawHandle(0x40)];
        let mut event = RawHandle::NULL;
        let status = enqueue_task_via(&table, RawHandle(0x10), RawHandle(0x20), &wait, Some(&mut event));
        assert_eq!(status, 0);
        assert_eq!(
            *TASK_CALL.lock().expect("lock"),
            Some((RawHandle(0x10), RawHandle(0x20), 2, RawHandle(0x30)))
        );
        assert_eq!(event, RawHandle(0xe7));
    }

    #[test]
    fn bare_table_is_the_oldest_tier() {
        assert_eq!(detect_tier(&Symbols::empty()), VersionTier::V1_0);
    }

    #[test]
    fn wait_list_arguments() {
        assert_eq!(wait_args(&[]), (0, std::ptr::null()));
        let list = [RawHandle(1), RawHandle(2)];
        assert_eq!(wait_args(&list).0, 2);
        assert!(event_arg(None).is_null());
    }
}
