// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Deterministic in-process OpenCL driver.
//
// Serves the whole call table at a chosen tier without hardware: native
// reference counts, deferred destruction of objects other objects depend on,
// in-order queues whose non-blocking commands retire on `complete_pending`
// or `finish`, and real invocation of registered `extern "C"` callbacks.
// Calls above the configured tier fail with CL_INVALID_OPERATION, just as a
// library lacking the symbol would.

#![allow(clippy::too_many_arguments)]

mod info;
mod source;
mod state;

use std::ffi::{CStr, CString, c_void};
use std::sync::{Mutex, MutexGuard, PoisonError};

use oclink_core::status::ClInt;
use oclink_core::types::{
    BufferRegion, CL_QUEUE_PROPERTIES, CL_SAMPLER_ADDRESSING_MODE, CL_SAMPLER_FILTER_MODE,
    CL_SAMPLER_NORMALIZED_COORDS, DeviceType, HandleKind, ImageDesc, ImageFormat, MapFlags,
    MemFlags, NativeVariant, QueueProperties, RawHandle, RectCopy, RectRegion, VersionTier,
};
use tracing::{debug, warn};

use crate::api::{
    ContextNotifyFn, EventNotifyFn, InfoTarget, MemNotifyFn, NativeApi, NativeContext,
    NativeDiscovery, NativeEnqueue, NativeEvent, NativeMemory, NativeProgram, NativeSvm,
    ProgramNotifyFn, UserData, release_entry, retain_entry,
};
use crate::entry::EntryPoint;

use self::source::{error_directive, scan_kernels};
use self::state::*;

const CL_DEVICE_PARTITION_EQUALLY: isize = 0x1086;
const CL_DEVICE_PARTITION_BY_COUNTS: isize = 0x1087;
const CL_QUEUE_SIZE: u64 = 0x1094;
const CL_MEM_OBJECT_IMAGE2D: u32 = 0x10F1;
const CL_MEM_OBJECT_IMAGE3D: u32 = 0x10F2;
const CL_MEM_COPY_OVERLAP: ClInt = -8;
const CL_IMAGE_FORMAT_MISMATCH: ClInt = -9;
const CL_INVALID_WORK_GROUP_SIZE: ClInt = -54;
const CL_INVALID_DEVICE_PARTITION_COUNT: ClInt = -68;

/// In-process driver. See the module docs.
pub struct SimulatedDriver {
    tier: VersionTier,
    state: Mutex<SimState>,
}

fn status(result: Result<(), ClInt>) -> ClInt {
    match result {
        Ok(()) => CL_SUCCESS,
        Err(code) => code,
    }
}

fn created(result: Result<RawHandle, ClInt>, errcode: &mut ClInt) -> RawHandle {
    match result {
        Ok(handle) => {
            *errcode = CL_SUCCESS;
            handle
        }
        Err(code) => {
            *errcode = code;
            RawHandle::NULL
        }
    }
}

fn fill_out(list: &[RawHandle], out: Option<&mut [RawHandle]>, count: &mut u32) -> Result<(), ClInt> {
    if let Some(buf) = out {
        if buf.is_empty() {
            return Err(CL_INVALID_VALUE);
        }
        let n = buf.len().min(list.len());
        buf[..n].copy_from_slice(&list[..n]);
    }
    *count = list.len() as u32;
    Ok(())
}

/// Zero-terminated key/value property list.
fn check_properties<T: Copy + Default + PartialEq>(props: &[T]) -> Result<Vec<(T, T)>, ClInt> {
    if props.is_empty() {
        return Ok(Vec::new());
    }
    if props.len() % 2 == 0 || props[props.len() - 1] != T::default() {
        return Err(CL_INVALID_PROPERTY);
    }
    Ok(props[..props.len() - 1]
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1]))
        .collect())
}

fn element_size(format: &ImageFormat) -> Result<usize, ClInt> {
    let channels = match format.channel_order {
        0x10B0 | 0x10B1 | 0x10B8 | 0x10B9 => 1,
        0x10B2 | 0x10B3 => 2,
        0x10B4 => 3,
        0x10B5..=0x10B7 => 4,
        _ => return Err(CL_IMAGE_FORMAT_NOT_SUPPORTED),
    };
    let channel_bytes = match format.channel_data_type {
        0x10D0 | 0x10D2 | 0x10D7 | 0x10DA => 1,
        0x10D1 | 0x10D3 | 0x10D8 | 0x10DB | 0x10DD => 2,
        0x10D9 | 0x10DC | 0x10DE => 4,
        _ => return Err(CL_IMAGE_FORMAT_NOT_SUPPORTED),
    };
    Ok(channels * channel_bytes)
}

fn image_geometry(st: &SimState, image: RawHandle) -> Result<([usize; 3], usize), ClInt> {
    match &st.get(image, HandleKind::Memory)?.body {
        Body::Image {
            dims, element_size, ..
        } => Ok((*dims, *element_size)),
        _ => Err(CL_INVALID_MEM_OBJECT),
    }
}

fn in_bounds(origin: [usize; 3], region: [usize; 3], dims: [usize; 3]) -> Result<(), ClInt> {
    for axis in 0..3 {
        if region[axis] == 0 || origin[axis].saturating_add(region[axis]) > dims[axis] {
            return Err(CL_INVALID_VALUE);
        }
    }
    Ok(())
}

/// Spans between an image region and a host range laid out with
/// `host_pitch` (zeros mean tightly packed).
fn image_spans(
    st: &SimState,
    image: RawHandle,
    origin: [usize; 3],
    region: [usize; 3],
    host_pitch: (usize, usize),
) -> Result<Vec<Span>, ClInt> {
    let (dims, e) = image_geometry(st, image)?;
    in_bounds(origin, region, dims)?;
    Ok(rect_spans(
        [origin[0] * e, origin[1], origin[2]],
        [0, 0, 0],
        [region[0] * e, region[1], region[2]],
        (dims[0] * e, dims[0] * e * dims[1]),
        host_pitch,
    ))
}

/// Spans of a rectangular transfer inside a buffer, rebased onto its root.
fn buffer_rect_spans(
    st: &SimState,
    buffer: RawHandle,
    rect: &RectRegion,
) -> Result<(RawHandle, Vec<Span>), ClInt> {
    if rect.region.contains(&0) {
        return Err(CL_INVALID_VALUE);
    }
    let mut spans = rect_spans(
        rect.buffer_origin,
        rect.host_origin,
        rect.region,
        (rect.buffer_row_pitch, rect.buffer_slice_pitch),
        (rect.host_row_pitch, rect.host_slice_pitch),
    );
    let len = st.buffer_len(buffer)?;
    if extent(&spans) > len {
        return Err(CL_INVALID_VALUE);
    }
    let (root, base) = st.locate(buffer, 0, len)?;
    for span in &mut spans {
        span.dev += base;
    }
    Ok((root, spans))
}

fn devices_of_type(st: &SimState, device_type: DeviceType) -> Vec<RawHandle> {
    if device_type == DeviceType::ALL {
        return st.devices.clone();
    }
    if device_type == DeviceType::DEFAULT {
        return st.devices.iter().take(1).copied().collect();
    }
    st.devices
        .iter()
        .copied()
        .filter(|d| {
            matches!(
                st.objects.get(d).map(|o| &o.body),
                Some(Body::Device { device_type: t, .. }) if t.intersects(device_type)
            )
        })
        .collect()
}

impl SimulatedDriver {
    pub fn new(tier: VersionTier) -> Self {
        Self {
            tier,
            state: Mutex::new(SimState::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call, apply injected failures and the tier gate, run `f`
    /// under the state lock, then deliver notifications with the lock
    /// released.
    fn run<T>(
        &self,
        entry: EntryPoint,
        f: impl FnOnce(&mut SimState, &mut Vec<Notify>) -> Result<T, ClInt>,
    ) -> Result<T, ClInt> {
        let mut notes = Vec::new();
        let out = {
            let mut st = self.lock();
            *st.calls.entry(entry).or_insert(0) += 1;
            if let Some(code) = st.injected.remove(&entry) {
                debug!(%entry, code, "injected failure");
                Err(code)
            } else if entry.min_tier() > self.tier {
                Err(CL_INVALID_OPERATION)
            } else {
                f(&mut *st, &mut notes)
            }
        };
        fire(notes);
        out
    }

    /// The single simulated platform.
    pub fn platform(&self) -> RawHandle {
        self.lock().platform
    }

    /// Root devices: a GPU followed by a CPU.
    pub fn devices(&self) -> Vec<RawHandle> {
        self.lock().devices.clone()
    }

    /// Retire every queued command and deliver deferred build callbacks.
    /// Returns how many commands and builds completed.
    pub fn complete_pending(&self) -> usize {
        let mut notes = Vec::new();
        let retired = {
            let mut st = self.lock();
            let commands = st.complete_where(|_| true, &mut notes);
            let builds: Vec<_> = st.builds.drain(..).collect();
            for &(program, f, user_data) in &builds {
                notes.push(Notify::Program {
                    f,
                    program,
                    user_data,
                });
            }
            commands + builds.len()
        };
        fire(notes);
        retired
    }

    /// Report an asynchronous error on `context` through its notify
    /// function. Returns whether a callback was registered.
    pub fn raise_context_error(&self, context: RawHandle, message: &str) -> bool {
        let note = {
            let st = self.lock();
            match st.get(context, HandleKind::Context).map(|o| &o.body) {
                Ok(Body::Context {
                    notify: Some((f, user_data)),
                    ..
                }) => Some(Notify::Context {
                    f: *f,
                    message: CString::new(message.replace('\0', " ")).unwrap_or_default(),
                    user_data: *user_data,
                }),
                _ => None,
            }
        };
        let delivered = note.is_some();
        fire(note.into_iter().collect());
        delivered
    }

    /// Make the next call to `entry` fail with `code`.
    pub fn fail_next(&self, entry: EntryPoint, code: ClInt) {
        self.lock().injected.insert(entry, code);
    }

    /// How many times `entry` has been called.
    pub fn call_count(&self, entry: EntryPoint) -> usize {
        self.lock().calls.get(&entry).copied().unwrap_or(0)
    }

    /// External reference count, or `None` once the object is destroyed.
    pub fn native_refcount(&self, handle: RawHandle) -> Option<u32> {
        self.lock().objects.get(&handle).map(|o| o.refs)
    }

    /// Whether the driver still holds the object, by any reference.
    pub fn is_alive(&self, handle: RawHandle) -> bool {
        self.lock().objects.contains_key(&handle)
    }

    pub fn live_objects(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn pending_commands(&self) -> usize {
        self.lock().pending.len()
    }

    /// Reuse handle values of destroyed objects for new ones.
    pub fn recycle_handles(&self, enable: bool) {
        self.lock().recycle = enable;
    }

    /// Behave like drivers that return the build failure from a call that
    /// was given a notify function, and still invoke the notify later.
    pub fn fail_notified_builds(&self, enable: bool) {
        self.lock().fail_notified_builds = enable;
    }

    fn create_image_common(
        &self,
        entry: EntryPoint,
        context: RawHandle,
        flags: MemFlags,
        format: &ImageFormat,
        image_type: u32,
        dims: [usize; 3],
        pitches: (usize, usize),
        holds: Option<RawHandle>,
        host_ptr: usize,
    ) -> Result<RawHandle, ClInt> {
        self.run(entry, |st, _| {
            st.get(context, HandleKind::Context)?;
            let e = element_size(format)?;
            if dims.contains(&0) {
                return Err(CL_INVALID_IMAGE_SIZE);
            }
            let wants_ptr = flags.intersects(MemFlags::USE_HOST_PTR | MemFlags::COPY_HOST_PTR);
            if wants_ptr == (host_ptr == 0) {
                return Err(CL_INVALID_HOST_PTR);
            }
            let mut data = vec![0u8; dims[0] * dims[1] * dims[2] * e];
            if wants_ptr {
                let spans = rect_spans([0; 3], [0; 3], [dims[0] * e, dims[1], dims[2]], (0, 0), pitches);
                for s in spans {
                    // SAFETY: create contract: host_ptr covers the image at
                    // the given pitches.
                    unsafe {
                        std::ptr::copy_nonoverlapping(
                            (host_ptr as *const u8).add(s.host),
                            data[s.dev..s.dev + s.len].as_mut_ptr(),
                            s.len,
                        );
                    }
                }
            }
            Ok(st.alloc(
                HandleKind::Memory,
                Body::Image {
                    context,
                    flags,
                    format: *format,
                    image_type,
                    dims,
                    element_size: e,
                    data,
                },
                Some(holds.unwrap_or(context)),
            ))
        })
    }

    fn program_executable(st: &SimState, program: RawHandle) -> Result<(RawHandle, Vec<source::KernelSig>), ClInt> {
        match &st.get(program, HandleKind::Program)?.body {
            Body::Program {
                context,
                build_status,
                compiled,
                kernels,
                ..
            } if *build_status == CL_BUILD_SUCCESS && !*compiled => Ok((*context, kernels.clone())),
            _ => Err(CL_INVALID_PROGRAM_EXECUTABLE),
        }
    }

    fn check_kernel_ready(st: &SimState, kernel: RawHandle) -> Result<(), ClInt> {
        match &st.get(kernel, HandleKind::Kernel)?.body {
            Body::Kernel { args_set, .. } if args_set.iter().all(|set| *set) => Ok(()),
            _ => Err(CL_INVALID_KERNEL_ARGS),
        }
    }
}

impl NativeApi for SimulatedDriver {
    fn variant(&self) -> NativeVariant {
        NativeVariant::DEFAULT
    }

    fn tier(&self) -> VersionTier {
        self.tier
    }

    fn describe(&self) -> String {
        format!("simulated OpenCL {}", self.tier)
    }
}

impl NativeDiscovery for SimulatedDriver {
    fn get_platform_ids(&self, platforms: Option<&mut [RawHandle]>, num_platforms: &mut u32) -> ClInt {
        status(self.run(EntryPoint::GetPlatformIds, |st, _| {
            fill_out(&[st.platform], platforms, num_platforms)
        }))
    }

    fn get_device_ids(
        &self,
        platform: RawHandle,
        device_type: DeviceType,
        devices: Option<&mut [RawHandle]>,
        num_devices: &mut u32,
    ) -> ClInt {
        status(self.run(EntryPoint::GetDeviceIds, |st, _| {
            st.get(platform, HandleKind::Platform)?;
            let matching = devices_of_type(st, device_type);
            if matching.is_empty() {
                *num_devices = 0;
                return Err(CL_DEVICE_NOT_FOUND);
            }
            fill_out(&matching, devices, num_devices)
        }))
    }

    fn create_sub_devices(
        &self,
        device: RawHandle,
        properties: &[isize],
        devices: Option<&mut [RawHandle]>,
        num_devices: &mut u32,
    ) -> ClInt {
        status(self.run(EntryPoint::CreateSubDevices, |st, _| {
            let (device_type, name, compute_units) = match &st.get(device, HandleKind::Device)?.body {
                Body::Device {
                    device_type,
                    name,
                    compute_units,
                    ..
                } => (*device_type, *name, *compute_units as usize),
                _ => return Err(CL_INVALID_DEVICE),
            };
            let counts: Vec<usize> = match properties {
                [CL_DEVICE_PARTITION_EQUALLY, n, 0] if *n > 0 => {
                    let n = *n as usize;
                    if n > compute_units {
                        return Err(CL_INVALID_VALUE);
                    }
                    vec![n; compute_units / n]
                }
                [CL_DEVICE_PARTITION_BY_COUNTS, rest @ .., 0, 0] => {
                    if rest.is_empty() || rest.iter().any(|c| *c <= 0) {
                        return Err(CL_INVALID_DEVICE_PARTITION_COUNT);
                    }
                    rest.iter().map(|c| *c as usize).collect()
                }
                _ => return Err(CL_INVALID_VALUE),
            };
            if counts.iter().sum::<usize>() > compute_units {
                return Err(CL_INVALID_DEVICE_PARTITION_COUNT);
            }
            *num_devices = counts.len() as u32;
            if let Some(buf) = devices {
                if buf.len() < counts.len() {
                    return Err(CL_INVALID_VALUE);
                }
                let holder = (!st.is_root_device(device)).then_some(device);
                for (slot, units) in buf.iter_mut().zip(&counts) {
                    *slot = st.alloc(
                        HandleKind::Device,
                        Body::Device {
                            device_type,
                            name,
                            compute_units: *units as u32,
                            parent: Some(device),
                        },
                        holder,
                    );
                }
            }
            Ok(())
        }))
    }

    fn get_info(
        &self,
        target: InfoTarget,
        param: u32,
        value: Option<&mut [u8]>,
        size_ret: &mut usize,
    ) -> ClInt {
        status(self.run(target.entry(), |st, _| {
            let bytes = st.info(self.tier, target, param)?;
            match info::answer(&bytes, value, size_ret) {
                CL_SUCCESS => Ok(()),
                code => Err(code),
            }
        }))
    }

    fn retain(&self, kind: HandleKind, handle: RawHandle) -> ClInt {
        match retain_entry(kind) {
            None => CL_SUCCESS,
            Some(entry) => status(self.run(entry, |st, _| st.retain(handle, kind))),
        }
    }

    fn release(&self, kind: HandleKind, handle: RawHandle) -> ClInt {
        match release_entry(kind) {
            None => CL_SUCCESS,
            Some(entry) => status(self.run(entry, |st, notes| st.release(handle, kind, notes))),
        }
    }
}

impl NativeContext for SimulatedDriver {
    fn create_context(
        &self,
        properties: &[isize],
        devices: &[RawHandle],
        notify: Option<ContextNotifyFn>,
        user_data: UserData,
        errcode: &mut ClInt,
    ) -> RawHandle {
        let user_data = user_data as usize;
        created(
            self.run(EntryPoint::CreateContext, |st, _| {
                check_properties(properties)?;
                if devices.is_empty() {
                    return Err(CL_INVALID_VALUE);
                }
                for device in devices {
                    st.get(*device, HandleKind::Device)?;
                }
                Ok(st.alloc(
                    HandleKind::Context,
                    Body::Context {
                        devices: devices.to_vec(),
                        notify: notify.map(|f| (f, user_data)),
                    },
                    None,
                ))
            }),
            errcode,
        )
    }

    fn create_context_from_type(
        &self,
        properties: &[isize],
        device_type: DeviceType,
        notify: Option<ContextNotifyFn>,
        user_data: UserData,
        errcode: &mut ClInt,
    ) -> RawHandle {
        let user_data = user_data as usize;
        created(
            self.run(EntryPoint::CreateContextFromType, |st, _| {
                check_properties(properties)?;
                let devices = devices_of_type(st, device_type);
                if devices.is_empty() {
                    return Err(CL_DEVICE_NOT_FOUND);
                }
                Ok(st.alloc(
                    HandleKind::Context,
                    Body::Context {
                        devices,
                        notify: notify.map(|f| (f, user_data)),
                    },
                    None,
                ))
            }),
            errcode,
        )
    }

    fn create_command_queue(
        &self,
        context: RawHandle,
        device: RawHandle,
        properties: QueueProperties,
        errcode: &mut ClInt,
    ) -> RawHandle {
        created(
            self.run(EntryPoint::CreateCommandQueue, |st, _| {
                create_queue(st, context, device, properties)
            }),
            errcode,
        )
    }

    fn create_command_queue_with_properties(
        &self,
        context: RawHandle,
        device: RawHandle,
        properties: &[u64],
        errcode: &mut ClInt,
    ) -> RawHandle {
        created(
            self.run(EntryPoint::CreateCommandQueueWithProperties, |st, _| {
                let mut flags = QueueProperties::empty();
                for (key, value) in check_properties(properties)? {
                    match key {
                        CL_QUEUE_PROPERTIES => flags = QueueProperties::from_bits_truncate(value),
                        CL_QUEUE_SIZE => {}
                        _ => return Err(CL_INVALID_PROPERTY),
                    }
                }
                create_queue(st, context, device, flags)
            }),
            errcode,
        )
    }

    fn set_command_queue_property(
        &self,
        queue: RawHandle,
        properties: QueueProperties,
        enable: bool,
        old_properties: &mut u64,
    ) -> ClInt {
        status(self.run(EntryPoint::SetCommandQueueProperty, |st, _| {
            match &mut st.get_mut(queue, HandleKind::CommandQueue)?.body {
                Body::Queue {
                    properties: current,
                    ..
                } => {
                    *old_properties = *current;
                    if enable {
                        *current |= properties.bits();
                    } else {
                        *current &= !properties.bits();
                    }
                    Ok(())
                }
                _ => Err(invalid_code(HandleKind::CommandQueue)),
            }
        }))
    }

    fn flush(&self, queue: RawHandle) -> ClInt {
        status(self.run(EntryPoint::Flush, |st, _| st.context_of_queue(queue).map(|_| ())))
    }

    fn finish(&self, queue: RawHandle) -> ClInt {
        status(self.run(EntryPoint::Finish, |st, notes| {
            st.context_of_queue(queue)?;
            st.complete_where(|p| p.queue == queue, notes);
            Ok(())
        }))
    }
}

fn create_queue(
    st: &mut SimState,
    context: RawHandle,
    device: RawHandle,
    properties: QueueProperties,
) -> Result<RawHandle, ClInt> {
    match &st.get(context, HandleKind::Context)?.body {
        Body::Context { devices, .. } if devices.contains(&device) => {}
        _ => return Err(CL_INVALID_DEVICE),
    }
    if properties.intersects(QueueProperties::ON_DEVICE | QueueProperties::ON_DEVICE_DEFAULT) {
        return Err(CL_INVALID_QUEUE_PROPERTIES);
    }
    Ok(st.alloc(
        HandleKind::CommandQueue,
        Body::Queue {
            context,
            device,
            properties: properties.bits(),
        },
        Some(context),
    ))
}

impl NativeMemory for SimulatedDriver {
    unsafe fn create_buffer(
        &self,
        context: RawHandle,
        flags: MemFlags,
        size: usize,
        host_ptr: *mut c_void,
        errcode: &mut ClInt,
    ) -> RawHandle {
        let host_ptr = host_ptr as usize;
        created(
            self.run(EntryPoint::CreateBuffer, |st, _| {
                st.get(context, HandleKind::Context)?;
                if size == 0 {
                    return Err(CL_INVALID_BUFFER_SIZE);
                }
                let wants_ptr = flags.intersects(MemFlags::USE_HOST_PTR | MemFlags::COPY_HOST_PTR);
                if wants_ptr == (host_ptr == 0) {
                    return Err(CL_INVALID_HOST_PTR);
                }
                let data = if wants_ptr {
                    // SAFETY: create contract: host_ptr covers `size` bytes.
                    unsafe { std::slice::from_raw_parts(host_ptr as *const u8, size) }.to_vec()
                } else {
                    vec![0u8; size]
                };
                Ok(st.alloc(HandleKind::Memory, Body::Buffer { context, flags, data }, Some(context)))
            }),
            errcode,
        )
    }

    fn create_sub_buffer(
        &self,
        buffer: RawHandle,
        flags: MemFlags,
        region: &BufferRegion,
        errcode: &mut ClInt,
    ) -> RawHandle {
        created(
            self.run(EntryPoint::CreateSubBuffer, |st, _| {
                let (context, parent_flags, len) = match &st.get(buffer, HandleKind::Memory)?.body {
                    Body::Buffer { context, flags, data } => (*context, *flags, data.len()),
                    _ => return Err(CL_INVALID_MEM_OBJECT),
                };
                if region.size == 0 {
                    return Err(CL_INVALID_BUFFER_SIZE);
                }
                if region.origin.saturating_add(region.size) > len {
                    return Err(CL_INVALID_VALUE);
                }
                Ok(st.alloc(
                    HandleKind::Memory,
                    Body::SubBuffer {
                        context,
                        flags: if flags.is_empty() { parent_flags } else { flags },
                        origin: region.origin,
                        size: region.size,
                    },
                    Some(buffer),
                ))
            }),
            errcode,
        )
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
        created(
            self.create_image_common(
                EntryPoint::CreateImage2d,
                context,
                flags,
                format,
                CL_MEM_OBJECT_IMAGE2D,
                [width, height, 1],
                (row_pitch, 0),
                None,
                host_ptr as usize,
            ),
            errcode,
        )
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
        created(
            self.create_image_common(
                EntryPoint::CreateImage3d,
                context,
                flags,
                format,
                CL_MEM_OBJECT_IMAGE3D,
                [width, height, depth],
                (row_pitch, slice_pitch),
                None,
                host_ptr as usize,
            ),
            errcode,
        )
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
        let depth = desc.depth.max(desc.array_size).max(1);
        created(
            self.create_image_common(
                EntryPoint::CreateImage,
                context,
                flags,
                format,
                desc.image_type,
                [desc.width, desc.height.max(1), depth],
                (desc.row_pitch, desc.slice_pitch),
                (!desc.buffer.is_null()).then_some(desc.buffer),
                host_ptr as usize,
            ),
            errcode,
        )
    }

    fn create_pipe(
        &self,
        context: RawHandle,
        flags: MemFlags,
        packet_size: u32,
        max_packets: u32,
        errcode: &mut ClInt,
    ) -> RawHandle {
        created(
            self.run(EntryPoint::CreatePipe, |st, _| {
                st.get(context, HandleKind::Context)?;
                if packet_size == 0 || max_packets == 0 {
                    return Err(CL_INVALID_PIPE_SIZE);
                }
                Ok(st.alloc(
                    HandleKind::Memory,
                    Body::Pipe {
                        context,
                        flags,
                        packet_size,
                        max_packets,
                    },
                    Some(context),
                ))
            }),
            errcode,
        )
    }

    fn set_mem_object_destructor_callback(
        &self,
        memobj: RawHandle,
        notify: MemNotifyFn,
        user_data: UserData,
    ) -> ClInt {
        let user_data = user_data as usize;
        status(self.run(EntryPoint::SetMemObjectDestructorCallback, |st, _| {
            st.get_mut(memobj, HandleKind::Memory)?
                .destructors
                .push((notify, user_data));
            Ok(())
        }))
    }

    fn create_sampler(
        &self,
        context: RawHandle,
        normalized_coords: bool,
        addressing_mode: u32,
        filter_mode: u32,
        errcode: &mut ClInt,
    ) -> RawHandle {
        created(
            self.run(EntryPoint::CreateSampler, |st, _| {
                create_sampler(st, context, normalized_coords, addressing_mode, filter_mode)
            }),
            errcode,
        )
    }

    fn create_sampler_with_properties(
        &self,
        context: RawHandle,
        properties: &[u64],
        errcode: &mut ClInt,
    ) -> RawHandle {
        created(
            self.run(EntryPoint::CreateSamplerWithProperties, |st, _| {
                let (mut normalized, mut addressing, mut filter) = (true, 0x1132, 0x1140);
                for (key, value) in check_properties(properties)? {
                    match key {
                        CL_SAMPLER_NORMALIZED_COORDS => normalized = value != 0,
                        CL_SAMPLER_ADDRESSING_MODE => addressing = value as u32,
                        CL_SAMPLER_FILTER_MODE => filter = value as u32,
                        _ => return Err(CL_INVALID_VALUE),
                    }
                }
                create_sampler(st, context, normalized, addressing, filter)
            }),
            errcode,
        )
    }
}

fn create_sampler(
    st: &mut SimState,
    context: RawHandle,
    normalized: bool,
    addressing: u32,
    filter: u32,
) -> Result<RawHandle, ClInt> {
    st.get(context, HandleKind::Context)?;
    if !(0x1130..=0x1134).contains(&addressing) || !(0x1140..=0x1141).contains(&filter) {
        return Err(CL_INVALID_VALUE);
    }
    Ok(st.alloc(
        HandleKind::Sampler,
        Body::Sampler {
            context,
            normalized,
            addressing,
            filter,
        },
        Some(context),
    ))
}

fn context_devices(st: &SimState, context: RawHandle) -> Result<Vec<RawHandle>, ClInt> {
    match &st.get(context, HandleKind::Context)?.body {
        Body::Context { devices, .. } => Ok(devices.clone()),
        _ => Err(invalid_code(HandleKind::Context)),
    }
}

fn new_program(st: &mut SimState, context: RawHandle, devices: Vec<RawHandle>, source: String) -> RawHandle {
    st.alloc(
        HandleKind::Program,
        Body::Program {
            context,
            devices,
            source,
            options: String::new(),
            build_status: CL_BUILD_NONE,
            log: String::new(),
            compiled: false,
            kernels: Vec::new(),
        },
        Some(context),
    )
}

/// Run the simulated compiler over a program. Returns whether it succeeded.
fn compile(st: &mut SimState, program: RawHandle, options: &CStr, link: bool) -> Result<bool, ClInt> {
    match &mut st.get_mut(program, HandleKind::Program)?.body {
        Body::Program {
            source,
            options: stored,
            build_status,
            log,
            compiled,
            kernels,
            ..
        } => {
            *stored = options.to_string_lossy().into_owned();
            match error_directive(source) {
                Some(line) => {
                    *build_status = CL_BUILD_ERROR;
                    *log = format!("error: {}", line.trim_start_matches("#error").trim());
                    kernels.clear();
                    Ok(false)
                }
                None => {
                    *build_status = CL_BUILD_SUCCESS;
                    log.clear();
                    *compiled = !link;
                    *kernels = if link { scan_kernels(source) } else { Vec::new() };
                    Ok(true)
                }
            }
        }
        _ => Err(invalid_code(HandleKind::Program)),
    }
}

fn has_kernels_attached(st: &SimState, program: RawHandle) -> bool {
    st.objects
        .values()
        .any(|o| matches!(&o.body, Body::Kernel { program: p, .. } if *p == program))
}

impl NativeProgram for SimulatedDriver {
    fn create_program_with_source(
        &self,
        context: RawHandle,
        sources: &[&str],
        errcode: &mut ClInt,
    ) -> RawHandle {
        created(
            self.run(EntryPoint::CreateProgramWithSource, |st, _| {
                let devices = context_devices(st, context)?;
                if sources.is_empty() || sources.iter().all(|s| s.is_empty()) {
                    return Err(CL_INVALID_VALUE);
                }
                Ok(new_program(st, context, devices, sources.concat()))
            }),
            errcode,
        )
    }

    fn create_program_with_binary(
        &self,
        context: RawHandle,
        devices: &[RawHandle],
        binaries: &[&[u8]],
        binary_status: &mut [ClInt],
        errcode: &mut ClInt,
    ) -> RawHandle {
        created(
            self.run(EntryPoint::CreateProgramWithBinary, |st, _| {
                let members = context_devices(st, context)?;
                if devices.is_empty() || binaries.len() != devices.len() || binary_status.len() != devices.len() {
                    return Err(CL_INVALID_VALUE);
                }
                if devices.iter().any(|d| !members.contains(d)) {
                    return Err(CL_INVALID_DEVICE);
                }
                for (slot, binary) in binary_status.iter_mut().zip(binaries) {
                    *slot = if binary.is_empty() { -42 } else { CL_SUCCESS };
                }
                if binaries.iter().any(|b| b.is_empty()) {
                    return Err(CL_INVALID_VALUE);
                }
                let source = String::from_utf8_lossy(binaries[0]).into_owned();
                Ok(new_program(st, context, devices.to_vec(), source))
            }),
            errcode,
        )
    }

    fn build_program(
        &self,
        program: RawHandle,
        _devices: &[RawHandle],
        options: &CStr,
        notify: Option<ProgramNotifyFn>,
        user_data: UserData,
    ) -> ClInt {
        let user_data = user_data as usize;
        status(self.run(EntryPoint::BuildProgram, |st, _| {
            if has_kernels_attached(st, program) {
                return Err(CL_INVALID_OPERATION);
            }
            let ok = compile(st, program, options, true)?;
            match notify {
                Some(f) => {
                    st.builds.push((program, f, user_data));
                    if !ok && st.fail_notified_builds {
                        return Err(CL_BUILD_PROGRAM_FAILURE);
                    }
                    Ok(())
                }
                None if ok => Ok(()),
                None => Err(CL_BUILD_PROGRAM_FAILURE),
            }
        }))
    }

    fn compile_program(
        &self,
        program: RawHandle,
        _devices: &[RawHandle],
        options: &CStr,
        headers: &[RawHandle],
        header_names: &[&CStr],
        notify: Option<ProgramNotifyFn>,
        user_data: UserData,
    ) -> ClInt {
        let user_data = user_data as usize;
        status(self.run(EntryPoint::CompileProgram, |st, _| {
            if headers.len() != header_names.len() {
                return Err(CL_INVALID_VALUE);
            }
            for header in headers {
                st.get(*header, HandleKind::Program)?;
            }
            let ok = compile(st, program, options, false)?;
            match notify {
                Some(f) => {
                    st.builds.push((program, f, user_data));
                    Ok(())
                }
                None if ok => Ok(()),
                None => Err(CL_COMPILE_PROGRAM_FAILURE),
            }
        }))
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
        let user_data = user_data as usize;
        created(
            self.run(EntryPoint::LinkProgram, |st, _| {
                let members = context_devices(st, context)?;
                if inputs.is_empty() {
                    return Err(CL_INVALID_VALUE);
                }
                let mut sources = Vec::with_capacity(inputs.len());
                for input in inputs {
                    match &st.get(*input, HandleKind::Program)?.body {
                        Body::Program {
                            source,
                            compiled: true,
                            build_status: CL_BUILD_SUCCESS,
                            ..
                        } => sources.push(source.clone()),
                        _ => return Err(CL_INVALID_OPERATION),
                    }
                }
                let targets = if devices.is_empty() { members } else { devices.to_vec() };
                let linked = new_program(st, context, targets, sources.join("\n"));
                compile(st, linked, options, true)?;
                if let Some(f) = notify {
                    st.builds.push((linked, f, user_data));
                }
                Ok(linked)
            }),
            errcode,
        )
    }

    fn create_kernel(&self, program: RawHandle, name: &CStr, errcode: &mut ClInt) -> RawHandle {
        created(
            self.run(EntryPoint::CreateKernel, |st, _| {
                let (context, kernels) = Self::program_executable(st, program)?;
                let wanted = name.to_str().map_err(|_| CL_INVALID_KERNEL_NAME)?;
                let sig = kernels
                    .into_iter()
                    .find(|k| k.name == wanted)
                    .ok_or(CL_INVALID_KERNEL_NAME)?;
                Ok(new_kernel(st, context, program, sig))
            }),
            errcode,
        )
    }

    fn create_kernels_in_program(
        &self,
        program: RawHandle,
        kernels: Option<&mut [RawHandle]>,
        num_kernels: &mut u32,
    ) -> ClInt {
        status(self.run(EntryPoint::CreateKernelsInProgram, |st, _| {
            let (context, sigs) = Self::program_executable(st, program)?;
            *num_kernels = sigs.len() as u32;
            if let Some(buf) = kernels {
                if buf.len() < sigs.len() {
                    return Err(CL_INVALID_VALUE);
                }
                for (slot, sig) in buf.iter_mut().zip(sigs) {
                    *slot = new_kernel(st, context, program, sig);
                }
            }
            Ok(())
        }))
    }

    unsafe fn set_kernel_arg(
        &self,
        kernel: RawHandle,
        index: u32,
        _size: usize,
        _value: *const c_void,
    ) -> ClInt {
        status(self.run(EntryPoint::SetKernelArg, |st, _| mark_arg(st, kernel, index)))
    }

    unsafe fn set_kernel_arg_svm_pointer(
        &self,
        kernel: RawHandle,
        index: u32,
        _ptr: *const c_void,
    ) -> ClInt {
        status(self.run(EntryPoint::SetKernelArgSvmPointer, |st, _| mark_arg(st, kernel, index)))
    }
}

fn new_kernel(st: &mut SimState, context: RawHandle, program: RawHandle, sig: source::KernelSig) -> RawHandle {
    let args_set = vec![false; sig.args.len()];
    st.alloc(
        HandleKind::Kernel,
        Body::Kernel {
            context,
            program,
            name: sig.name,
            arg_names: sig.args,
            args_set,
        },
        Some(program),
    )
}

fn mark_arg(st: &mut SimState, kernel: RawHandle, index: u32) -> Result<(), ClInt> {
    match &mut st.get_mut(kernel, HandleKind::Kernel)?.body {
        Body::Kernel { args_set, .. } => {
            let slot = args_set.get_mut(index as usize).ok_or(CL_INVALID_ARG_INDEX)?;
            *slot = true;
            Ok(())
        }
        _ => Err(invalid_code(HandleKind::Kernel)),
    }
}

impl NativeEvent for SimulatedDriver {
    fn create_user_event(&self, context: RawHandle, errcode: &mut ClInt) -> RawHandle {
        created(
            self.run(EntryPoint::CreateUserEvent, |st, _| {
                st.get(context, HandleKind::Context)?;
                st.clock += 1;
                let now = st.clock;
                Ok(st.alloc(
                    HandleKind::Event,
                    Body::Event {
                        context,
                        queue: None,
                        command_type: command::USER,
                        status: CL_SUBMITTED,
                        callbacks: Vec::new(),
                        times: [now, 0, 0, 0],
                    },
                    Some(context),
                ))
            }),
            errcode,
        )
    }

    fn set_user_event_status(&self, event: RawHandle, execution_status: ClInt) -> ClInt {
        status(self.run(EntryPoint::SetUserEventStatus, |st, notes| {
            match &st.get(event, HandleKind::Event)?.body {
                Body::Event {
                    queue: None,
                    status,
                    ..
                } if *status > CL_COMPLETE => {}
                Body::Event { queue: None, .. } => return Err(CL_INVALID_OPERATION),
                _ => return Err(invalid_code(HandleKind::Event)),
            }
            if execution_status > CL_COMPLETE {
                return Err(CL_INVALID_VALUE);
            }
            st.settle(event, execution_status, notes);
            Ok(())
        }))
    }

    fn set_event_callback(
        &self,
        event: RawHandle,
        callback_type: ClInt,
        notify: EventNotifyFn,
        user_data: UserData,
    ) -> ClInt {
        let user_data = user_data as usize;
        status(self.run(EntryPoint::SetEventCallback, |st, notes| {
            if !(CL_COMPLETE..=CL_SUBMITTED).contains(&callback_type) {
                return Err(CL_INVALID_VALUE);
            }
            match &mut st.get_mut(event, HandleKind::Event)?.body {
                Body::Event {
                    status, callbacks, ..
                } => {
                    if *status <= callback_type {
                        notes.push(Notify::Event {
                            f: notify,
                            event,
                            status: *status,
                            user_data,
                        });
                    } else {
                        callbacks.push((callback_type, notify, user_data));
                    }
                    Ok(())
                }
                _ => Err(invalid_code(HandleKind::Event)),
            }
        }))
    }

    fn wait_for_events(&self, events: &[RawHandle]) -> ClInt {
        status(self.run(EntryPoint::WaitForEvents, |st, notes| {
            if events.is_empty() {
                return Err(CL_INVALID_VALUE);
            }
            for event in events {
                st.get(*event, HandleKind::Event)?;
            }
            st.complete_where(|_| true, notes);
            let mut failed = false;
            for event in events {
                if let Ok(SimObject {
                    body: Body::Event { status, .. },
                    ..
                }) = st.get(*event, HandleKind::Event)
                {
                    if *status > CL_COMPLETE {
                        warn!(%event, "wait on a user event that was never completed");
                        return Err(CL_INVALID_OPERATION);
                    }
                    failed |= *status < CL_COMPLETE;
                }
            }
            if failed {
                Err(CL_EXEC_STATUS_ERROR_FOR_EVENTS_IN_WAIT_LIST)
            } else {
                Ok(())
            }
        }))
    }
}

impl NativeEnqueue for SimulatedDriver {
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
        let host = dst as usize;
        status(self.run(EntryPoint::EnqueueReadBuffer, |st, notes| {
            if host == 0 || size == 0 {
                return Err(CL_INVALID_VALUE);
            }
            let (mem, dev) = st.locate(buffer, offset, size)?;
            let spans = vec![Span { dev, host: 0, len: size }];
            st.submit(queue, wait_list, event, blocking, command::READ_BUFFER, Work::ToHost { mem, spans, host }, notes)
        }))
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
        let host = src as usize;
        status(self.run(EntryPoint::EnqueueWriteBuffer, |st, notes| {
            if host == 0 || size == 0 {
                return Err(CL_INVALID_VALUE);
            }
            let (mem, dev) = st.locate(buffer, offset, size)?;
            let spans = vec![Span { dev, host: 0, len: size }];
            st.submit(queue, wait_list, event, blocking, command::WRITE_BUFFER, Work::FromHost { mem, spans, host }, notes)
        }))
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
        let host = dst as usize;
        status(self.run(EntryPoint::EnqueueReadBufferRect, |st, notes| {
            if host == 0 {
                return Err(CL_INVALID_VALUE);
            }
            let (mem, spans) = buffer_rect_spans(st, buffer, rect)?;
            st.submit(queue, wait_list, event, blocking, command::READ_BUFFER_RECT, Work::ToHost { mem, spans, host }, notes)
        }))
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
        let host = src as usize;
        status(self.run(EntryPoint::EnqueueWriteBufferRect, |st, notes| {
            if host == 0 {
                return Err(CL_INVALID_VALUE);
            }
            let (mem, spans) = buffer_rect_spans(st, buffer, rect)?;
            st.submit(queue, wait_list, event, blocking, command::WRITE_BUFFER_RECT, Work::FromHost { mem, spans, host }, notes)
        }))
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
        status(self.run(EntryPoint::EnqueueCopyBuffer, |st, notes| {
            if size == 0 {
                return Err(CL_INVALID_VALUE);
            }
            let (src_root, from) = st.locate(src, src_offset, size)?;
            let (dst_root, to) = st.locate(dst, dst_offset, size)?;
            if src_root == dst_root && from < to + size && to < from + size {
                return Err(CL_MEM_COPY_OVERLAP);
            }
            let spans = vec![Span { dev: from, host: to, len: size }];
            st.submit(
                queue,
                wait_list,
                event,
                false,
                command::COPY_BUFFER,
                Work::Copy { src: src_root, dst: dst_root, spans },
                notes,
            )
        }))
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
        status(self.run(EntryPoint::EnqueueCopyBufferRect, |st, notes| {
            if rect.region.contains(&0) {
                return Err(CL_INVALID_VALUE);
            }
            let mut spans = rect_spans(
                rect.src_origin,
                rect.dst_origin,
                rect.region,
                (rect.src_row_pitch, rect.src_slice_pitch),
                (rect.dst_row_pitch, rect.dst_slice_pitch),
            );
            let src_len = st.buffer_len(src)?;
            let dst_len = st.buffer_len(dst)?;
            let dst_extent = spans.iter().map(|s| s.host + s.len).max().unwrap_or(0);
            if extent(&spans) > src_len || dst_extent > dst_len {
                return Err(CL_INVALID_VALUE);
            }
            let (src_root, src_base) = st.locate(src, 0, src_len)?;
            let (dst_root, dst_base) = st.locate(dst, 0, dst_len)?;
            for span in &mut spans {
                span.dev += src_base;
                span.host += dst_base;
            }
            st.submit(
                queue,
                wait_list,
                event,
                false,
                command::COPY_BUFFER_RECT,
                Work::Copy { src: src_root, dst: dst_root, spans },
                notes,
            )
        }))
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
        status(self.run(EntryPoint::EnqueueFillBuffer, |st, notes| {
            let n = pattern.len();
            if n == 0 || size == 0 || offset % n != 0 || size % n != 0 {
                return Err(CL_INVALID_VALUE);
            }
            let (mem, dev) = st.locate(buffer, offset, size)?;
            let work = Work::Fill {
                mem,
                spans: vec![Span { dev, host: 0, len: size }],
                pattern: pattern.to_vec(),
            };
            st.submit(queue, wait_list, event, false, command::FILL_BUFFER, work, notes)
        }))
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
        let host = dst as usize;
        status(self.run(EntryPoint::EnqueueReadImage, |st, notes| {
            if host == 0 {
                return Err(CL_INVALID_VALUE);
            }
            let spans = image_spans(st, image, origin, region, (row_pitch, slice_pitch))?;
            st.submit(queue, wait_list, event, blocking, command::READ_IMAGE, Work::ToHost { mem: image, spans, host }, notes)
        }))
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
        let host = src as usize;
        status(self.run(EntryPoint::EnqueueWriteImage, |st, notes| {
            if host == 0 {
                return Err(CL_INVALID_VALUE);
            }
            let spans = image_spans(st, image, origin, region, (row_pitch, slice_pitch))?;
            st.submit(queue, wait_list, event, blocking, command::WRITE_IMAGE, Work::FromHost { mem: image, spans, host }, notes)
        }))
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
        status(self.run(EntryPoint::EnqueueCopyImage, |st, notes| {
            let (src_dims, e) = image_geometry(st, src)?;
            let (dst_dims, dst_e) = image_geometry(st, dst)?;
            if e != dst_e {
                return Err(CL_IMAGE_FORMAT_MISMATCH);
            }
            in_bounds(src_origin, region, src_dims)?;
            in_bounds(dst_origin, region, dst_dims)?;
            let spans = rect_spans(
                [src_origin[0] * e, src_origin[1], src_origin[2]],
                [dst_origin[0] * e, dst_origin[1], dst_origin[2]],
                [region[0] * e, region[1], region[2]],
                (src_dims[0] * e, src_dims[0] * e * src_dims[1]),
                (dst_dims[0] * e, dst_dims[0] * e * dst_dims[1]),
            );
            st.submit(queue, wait_list, event, false, command::COPY_IMAGE, Work::Copy { src, dst, spans }, notes)
        }))
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
        status(self.run(EntryPoint::EnqueueFillImage, |st, notes| {
            let (_, e) = image_geometry(st, image)?;
            let spans = image_spans(st, image, origin, region, (0, 0))?;
            let work = Work::Fill {
                mem: image,
                spans,
                pattern: fill_color[..e.min(16)].to_vec(),
            };
            st.submit(queue, wait_list, event, false, command::FILL_IMAGE, work, notes)
        }))
    }

    fn enqueue_map_buffer(
        &self,
        queue: RawHandle,
        buffer: RawHandle,
        _blocking: bool,
        flags: MapFlags,
        offset: usize,
        size: usize,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
        errcode: &mut ClInt,
    ) -> *mut c_void {
        let result = self.run(EntryPoint::EnqueueMapBuffer, |st, notes| {
            if size == 0 {
                return Err(CL_INVALID_VALUE);
            }
            let (mem, dev) = st.locate(buffer, offset, size)?;
            st.submit(queue, wait_list, event, true, command::MAP_BUFFER, Work::None, notes)?;
            let mut data = st
                .data_mut(mem)
                .map(|d| d[dev..dev + size].to_vec())
                .ok_or(CL_INVALID_MEM_OBJECT)?;
            let address = data.as_mut_ptr() as usize;
            st.mappings.insert(
                address,
                Mapping {
                    mem,
                    offset: dev,
                    data,
                    write_back: flags.intersects(MapFlags::WRITE | MapFlags::WRITE_INVALIDATE_REGION),
                },
            );
            Ok(address as *mut c_void)
        });
        match result {
            Ok(ptr) => {
                *errcode = CL_SUCCESS;
                ptr
            }
            Err(code) => {
                *errcode = code;
                std::ptr::null_mut()
            }
        }
    }

    unsafe fn enqueue_unmap_mem_object(
        &self,
        queue: RawHandle,
        memobj: RawHandle,
        mapped: *mut c_void,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        let address = mapped as usize;
        status(self.run(EntryPoint::EnqueueUnmapMemObject, |st, notes| {
            let root = st.locate(memobj, 0, 0).map(|(root, _)| root)?;
            if st.mappings.get(&address).is_none_or(|m| m.mem != root) {
                return Err(CL_INVALID_VALUE);
            }
            st.submit(queue, wait_list, event, false, command::UNMAP_MEM_OBJECT, Work::Unmap { address }, notes)
        }))
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
        status(self.run(EntryPoint::EnqueueNdRangeKernel, |st, notes| {
            let dims = global.len();
            if !(1..=3).contains(&dims) {
                return Err(CL_INVALID_WORK_DIMENSION);
            }
            if offset.is_some_and(|o| o.len() != dims) {
                return Err(CL_INVALID_VALUE);
            }
            if global.contains(&0) {
                return Err(CL_INVALID_GLOBAL_WORK_SIZE);
            }
            if let Some(local) = local {
                if local.len() != dims || local.iter().zip(global).any(|(l, g)| *l == 0 || g % l != 0) {
                    return Err(CL_INVALID_WORK_GROUP_SIZE);
                }
            }
            Self::check_kernel_ready(st, kernel)?;
            st.submit(queue, wait_list, event, false, command::NDRANGE_KERNEL, Work::None, notes)
        }))
    }

    fn enqueue_task(
        &self,
        queue: RawHandle,
        kernel: RawHandle,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        status(self.run(EntryPoint::EnqueueTask, |st, notes| {
            Self::check_kernel_ready(st, kernel)?;
            st.submit(queue, wait_list, event, false, command::TASK, Work::None, notes)
        }))
    }

    fn enqueue_marker(&self, queue: RawHandle, event: &mut RawHandle) -> ClInt {
        status(self.run(EntryPoint::EnqueueMarker, |st, notes| {
            st.submit(queue, &[], Some(event), false, command::MARKER, Work::None, notes)
        }))
    }

    fn enqueue_barrier(&self, queue: RawHandle) -> ClInt {
        status(self.run(EntryPoint::EnqueueBarrier, |st, notes| {
            st.submit(queue, &[], None, false, command::BARRIER, Work::None, notes)
        }))
    }

    fn enqueue_wait_for_events(&self, queue: RawHandle, events: &[RawHandle]) -> ClInt {
        status(self.run(EntryPoint::EnqueueWaitForEvents, |st, notes| {
            if events.is_empty() {
                return Err(CL_INVALID_VALUE);
            }
            for e in events {
                st.get(*e, HandleKind::Event)?;
            }
            st.submit(queue, events, None, false, command::BARRIER, Work::None, notes)
        }))
    }

    fn enqueue_marker_with_wait_list(
        &self,
        queue: RawHandle,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        status(self.run(EntryPoint::EnqueueMarkerWithWaitList, |st, notes| {
            st.submit(queue, wait_list, event, false, command::MARKER, Work::None, notes)
        }))
    }

    fn enqueue_barrier_with_wait_list(
        &self,
        queue: RawHandle,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        status(self.run(EntryPoint::EnqueueBarrierWithWaitList, |st, notes| {
            st.submit(queue, wait_list, event, false, command::BARRIER, Work::None, notes)
        }))
    }
}

impl NativeSvm for SimulatedDriver {
    fn svm_alloc(&self, context: RawHandle, _flags: MemFlags, size: usize, alignment: u32) -> *mut c_void {
        let result = self.run(EntryPoint::SvmAlloc, |st, _| {
            st.get(context, HandleKind::Context)?;
            let align = (alignment as usize).max(1);
            if size == 0 || !align.is_power_of_two() {
                return Err(CL_INVALID_VALUE);
            }
            let mut storage = vec![0u8; size + align];
            let base = storage.as_mut_ptr() as usize;
            let aligned = (base + align - 1) & !(align - 1);
            st.svm.insert(aligned, storage);
            Ok(aligned as *mut c_void)
        });
        result.unwrap_or(std::ptr::null_mut())
    }

    unsafe fn svm_free(&self, _context: RawHandle, ptr: *mut c_void) {
        let address = ptr as usize;
        let _ = self.run(EntryPoint::SvmFree, |st, _| {
            st.svm.remove(&address);
            Ok(())
        });
    }

    unsafe fn enqueue_svm_free(
        &self,
        queue: RawHandle,
        pointers: &mut [*mut c_void],
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        let addresses: Vec<usize> = pointers.iter().map(|p| *p as usize).collect();
        status(self.run(EntryPoint::EnqueueSvmFree, |st, notes| {
            if addresses.is_empty() {
                return Err(CL_INVALID_VALUE);
            }
            st.submit(queue, wait_list, event, false, command::SVM_FREE, Work::SvmFree(addresses), notes)
        }))
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
        let (dst, src) = (dst as usize, src as usize);
        status(self.run(EntryPoint::EnqueueSvmMemcpy, |st, notes| {
            if dst == 0 || src == 0 {
                return Err(CL_INVALID_VALUE);
            }
            if dst < src + size && src < dst + size {
                return Err(CL_MEM_COPY_OVERLAP);
            }
            st.submit(queue, wait_list, event, blocking, command::SVM_MEMCPY, Work::RawCopy { dst, src, len: size }, notes)
        }))
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
        let dst = ptr as usize;
        status(self.run(EntryPoint::EnqueueSvmMemFill, |st, notes| {
            if dst == 0 || pattern.is_empty() || size % pattern.len() != 0 {
                return Err(CL_INVALID_VALUE);
            }
            let work = Work::RawFill {
                dst,
                pattern: pattern.to_vec(),
                size,
            };
            st.submit(queue, wait_list, event, false, command::SVM_MEMFILL, work, notes)
        }))
    }

    unsafe fn enqueue_svm_map(
        &self,
        queue: RawHandle,
        blocking: bool,
        _flags: MapFlags,
        ptr: *mut c_void,
        _size: usize,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        let address = ptr as usize;
        status(self.run(EntryPoint::EnqueueSvmMap, |st, notes| {
            if address == 0 {
                return Err(CL_INVALID_VALUE);
            }
            st.submit(queue, wait_list, event, blocking, command::SVM_MAP, Work::None, notes)
        }))
    }

    unsafe fn enqueue_svm_unmap(
        &self,
        queue: RawHandle,
        ptr: *mut c_void,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
    ) -> ClInt {
        let address = ptr as usize;
        status(self.run(EntryPoint::EnqueueSvmUnmap, |st, notes| {
            if address == 0 {
                return Err(CL_INVALID_VALUE);
            }
            st.submit(queue, wait_list, event, false, command::SVM_UNMAP, Work::None, notes)
        }))
    }
}
