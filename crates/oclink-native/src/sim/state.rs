// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Object table, native reference counting and deferred command execution
// for the simulated driver.

use std::collections::HashMap;
use std::ffi::{CString, c_void};

use oclink_core::status::ClInt;
use oclink_core::types::{DeviceType, HandleKind, ImageFormat, MemFlags, RawHandle};
use tracing::debug;

use crate::api::{ContextNotifyFn, EventNotifyFn, MemNotifyFn, ProgramNotifyFn};
use crate::entry::EntryPoint;

use super::source::KernelSig;

pub(super) const CL_SUCCESS: ClInt = 0;
pub(super) const CL_DEVICE_NOT_FOUND: ClInt = -1;
pub(super) const CL_PROFILING_INFO_NOT_AVAILABLE: ClInt = -7;
pub(super) const CL_BUILD_PROGRAM_FAILURE: ClInt = -11;
pub(super) const CL_EXEC_STATUS_ERROR_FOR_EVENTS_IN_WAIT_LIST: ClInt = -14;
pub(super) const CL_COMPILE_PROGRAM_FAILURE: ClInt = -15;
pub(super) const CL_INVALID_VALUE: ClInt = -30;
pub(super) const CL_INVALID_DEVICE: ClInt = -33;
pub(super) const CL_INVALID_QUEUE_PROPERTIES: ClInt = -35;
pub(super) const CL_INVALID_HOST_PTR: ClInt = -37;
pub(super) const CL_INVALID_MEM_OBJECT: ClInt = -38;
pub(super) const CL_IMAGE_FORMAT_NOT_SUPPORTED: ClInt = -10;
pub(super) const CL_INVALID_IMAGE_SIZE: ClInt = -40;
pub(super) const CL_INVALID_PROGRAM_EXECUTABLE: ClInt = -45;
pub(super) const CL_INVALID_KERNEL_NAME: ClInt = -46;
pub(super) const CL_INVALID_ARG_INDEX: ClInt = -49;
pub(super) const CL_INVALID_KERNEL_ARGS: ClInt = -52;
pub(super) const CL_INVALID_WORK_DIMENSION: ClInt = -53;
pub(super) const CL_INVALID_EVENT_WAIT_LIST: ClInt = -57;
pub(super) const CL_INVALID_OPERATION: ClInt = -59;
pub(super) const CL_INVALID_BUFFER_SIZE: ClInt = -61;
pub(super) const CL_INVALID_GLOBAL_WORK_SIZE: ClInt = -63;
pub(super) const CL_INVALID_PROPERTY: ClInt = -64;
pub(super) const CL_INVALID_PIPE_SIZE: ClInt = -69;

pub(super) const CL_COMPLETE: ClInt = 0;
pub(super) const CL_SUBMITTED: ClInt = 2;
pub(super) const CL_QUEUED: ClInt = 3;

pub(super) const CL_BUILD_SUCCESS: ClInt = 0;
pub(super) const CL_BUILD_NONE: ClInt = -1;
pub(super) const CL_BUILD_ERROR: ClInt = -2;

/// `cl_command_type` values reported by events.
pub(super) mod command {
    pub const NDRANGE_KERNEL: u32 = 0x11F0;
    pub const TASK: u32 = 0x11F1;
    pub const READ_BUFFER: u32 = 0x11F3;
    pub const WRITE_BUFFER: u32 = 0x11F4;
    pub const COPY_BUFFER: u32 = 0x11F5;
    pub const READ_IMAGE: u32 = 0x11F6;
    pub const WRITE_IMAGE: u32 = 0x11F7;
    pub const COPY_IMAGE: u32 = 0x11F8;
    pub const MAP_BUFFER: u32 = 0x11FB;
    pub const UNMAP_MEM_OBJECT: u32 = 0x11FD;
    pub const MARKER: u32 = 0x11FE;
    pub const READ_BUFFER_RECT: u32 = 0x1201;
    pub const WRITE_BUFFER_RECT: u32 = 0x1202;
    pub const COPY_BUFFER_RECT: u32 = 0x1203;
    pub const USER: u32 = 0x1204;
    pub const BARRIER: u32 = 0x1205;
    pub const FILL_BUFFER: u32 = 0x1207;
    pub const FILL_IMAGE: u32 = 0x1208;
    pub const SVM_FREE: u32 = 0x1209;
    pub const SVM_MEMCPY: u32 = 0x120A;
    pub const SVM_MEMFILL: u32 = 0x120B;
    pub const SVM_MAP: u32 = 0x120C;
    pub const SVM_UNMAP: u32 = 0x120D;
}

/// Status code for a stale handle of `kind`.
pub(super) fn invalid_code(kind: HandleKind) -> ClInt {
    match kind {
        HandleKind::Platform => -32,
        HandleKind::Device => -33,
        HandleKind::Context => -34,
        HandleKind::CommandQueue => -36,
        HandleKind::Memory => -38,
        HandleKind::Sampler => -41,
        HandleKind::Program => -44,
        HandleKind::Kernel => -48,
        HandleKind::Event => -58,
    }
}

/// A driver-to-host notification, delivered after the state lock is dropped.
pub(super) enum Notify {
    Context {
        f: ContextNotifyFn,
        message: CString,
        user_data: usize,
    },
    Program {
        f: ProgramNotifyFn,
        program: RawHandle,
        user_data: usize,
    },
    Event {
        f: EventNotifyFn,
        event: RawHandle,
        status: ClInt,
        user_data: usize,
    },
    Memory {
        f: MemNotifyFn,
        memobj: RawHandle,
        user_data: usize,
    },
}

pub(super) fn fire(notes: Vec<Notify>) {
    for note in notes {
        match note {
            Notify::Context {
                f,
                message,
                user_data,
            } => f(message.as_ptr(), std::ptr::null(), 0, user_data as *mut c_void),
            Notify::Program {
                f,
                program,
                user_data,
            } => f(program, user_data as *mut c_void),
            Notify::Event {
                f,
                event,
                status,
                user_data,
            } => f(event, status, user_data as *mut c_void),
            Notify::Memory {
                f,
                memobj,
                user_data,
            } => f(memobj, user_data as *mut c_void),
        }
    }
}

pub(super) struct SimObject {
    pub kind: HandleKind,
    pub refs: u32,
    /// References held by the driver itself: dependent objects and
    /// in-flight commands.
    pub internal: u32,
    pub holds: Option<RawHandle>,
    pub destructors: Vec<(MemNotifyFn, usize)>,
    pub body: Body,
}

pub(super) enum Body {
    Platform,
    Device {
        device_type: DeviceType,
        name: &'static str,
        compute_units: u32,
        parent: Option<RawHandle>,
    },
    Context {
        devices: Vec<RawHandle>,
        notify: Option<(ContextNotifyFn, usize)>,
    },
    Queue {
        context: RawHandle,
        device: RawHandle,
        properties: u64,
    },
    Buffer {
        context: RawHandle,
        flags: MemFlags,
        data: Vec<u8>,
    },
    SubBuffer {
        context: RawHandle,
        flags: MemFlags,
        origin: usize,
        size: usize,
    },
    Image {
        context: RawHandle,
        flags: MemFlags,
        format: ImageFormat,
        image_type: u32,
        dims: [usize; 3],
        element_size: usize,
        data: Vec<u8>,
    },
    Pipe {
        context: RawHandle,
        flags: MemFlags,
        packet_size: u32,
        max_packets: u32,
    },
    Sampler {
        context: RawHandle,
        normalized: bool,
        addressing: u32,
        filter: u32,
    },
    Program {
        context: RawHandle,
        devices: Vec<RawHandle>,
        source: String,
        options: String,
        build_status: ClInt,
        log: String,
        compiled: bool,
        kernels: Vec<KernelSig>,
    },
    Kernel {
        context: RawHandle,
        program: RawHandle,
        name: String,
        arg_names: Vec<String>,
        args_set: Vec<bool>,
    },
    Event {
        context: RawHandle,
        queue: Option<RawHandle>,
        command_type: u32,
        status: ClInt,
        callbacks: Vec<(ClInt, EventNotifyFn, usize)>,
        /// queued, submit, start, end
        times: [u64; 4],
    },
}

/// One contiguous piece of a transfer: offset into the device bytes, offset
/// into the host (or second device) range, and length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Span {
    pub dev: usize,
    pub host: usize,
    pub len: usize,
}

pub(super) enum Work {
    None,
    ToHost {
        mem: RawHandle,
        spans: Vec<Span>,
        host: usize,
    },
    FromHost {
        mem: RawHandle,
        spans: Vec<Span>,
        host: usize,
    },
    /// `dev` offsets are in `src`, `host` offsets in `dst`.
    Copy {
        src: RawHandle,
        dst: RawHandle,
        spans: Vec<Span>,
    },
    Fill {
        mem: RawHandle,
        spans: Vec<Span>,
        pattern: Vec<u8>,
    },
    Unmap {
        address: usize,
    },
    RawCopy {
        dst: usize,
        src: usize,
        len: usize,
    },
    RawFill {
        dst: usize,
        pattern: Vec<u8>,
        size: usize,
    },
    SvmFree(Vec<usize>),
}

pub(super) struct Pending {
    pub queue: RawHandle,
    pub event: Option<RawHandle>,
    pub work: Work,
}

pub(super) struct Mapping {
    pub mem: RawHandle,
    pub offset: usize,
    pub data: Vec<u8>,
    pub write_back: bool,
}

pub(super) struct SimState {
    next_handle: usize,
    pub recycle: bool,
    /// Failed builds with a notify still report the failure from the call.
    pub fail_notified_builds: bool,
    free_handles: Vec<RawHandle>,
    pub objects: HashMap<RawHandle, SimObject>,
    pub calls: HashMap<EntryPoint, usize>,
    pub injected: HashMap<EntryPoint, ClInt>,
    pub pending: Vec<Pending>,
    pub builds: Vec<(RawHandle, ProgramNotifyFn, usize)>,
    pub mappings: HashMap<usize, Mapping>,
    pub svm: HashMap<usize, Vec<u8>>,
    pub clock: u64,
    pub platform: RawHandle,
    pub devices: Vec<RawHandle>,
}

impl SimState {
    pub fn new() -> Self {
        let mut state = Self {
            next_handle: 0x1000,
            recycle: false,
            fail_notified_builds: false,
            free_handles: Vec::new(),
            objects: HashMap::new(),
            calls: HashMap::new(),
            injected: HashMap::new(),
            pending: Vec::new(),
            builds: Vec::new(),
            mappings: HashMap::new(),
            svm: HashMap::new(),
            clock: 0,
            platform: RawHandle::NULL,
            devices: Vec::new(),
        };
        state.platform = state.alloc(HandleKind::Platform, Body::Platform, None);
        for (device_type, name, compute_units) in [
            (DeviceType::GPU, "oclink simulated GPU", 8),
            (DeviceType::CPU, "oclink simulated CPU", 4),
        ] {
            let device = state.alloc(
                HandleKind::Device,
                Body::Device {
                    device_type,
                    name,
                    compute_units,
                    parent: None,
                },
                None,
            );
            state.devices.push(device);
        }
        state
    }

    /// Create an object with one external reference. `holds` gains an
    /// internal reference for as long as the new object lives.
    pub fn alloc(&mut self, kind: HandleKind, body: Body, holds: Option<RawHandle>) -> RawHandle {
        let handle = match self.free_handles.pop() {
            Some(h) if self.recycle => h,
            _ => {
                let h = RawHandle(self.next_handle);
                self.next_handle += 0x10;
                h
            }
        };
        if let Some(owner) = holds.and_then(|h| self.objects.get_mut(&h)) {
            owner.internal += 1;
        }
        self.objects.insert(
            handle,
            SimObject {
                kind,
                refs: 1,
                internal: 0,
                holds,
                destructors: Vec::new(),
                body,
            },
        );
        handle
    }

    pub fn get(&self, handle: RawHandle, kind: HandleKind) -> Result<&SimObject, ClInt> {
        match self.objects.get(&handle) {
            Some(obj) if obj.kind == kind => Ok(obj),
            _ => Err(invalid_code(kind)),
        }
    }

    pub fn get_mut(&mut self, handle: RawHandle, kind: HandleKind) -> Result<&mut SimObject, ClInt> {
        match self.objects.get_mut(&handle) {
            Some(obj) if obj.kind == kind => Ok(obj),
            _ => Err(invalid_code(kind)),
        }
    }

    pub fn is_root_device(&self, handle: RawHandle) -> bool {
        self.devices.contains(&handle)
    }

    pub fn retain(&mut self, handle: RawHandle, kind: HandleKind) -> Result<(), ClInt> {
        if kind == HandleKind::Platform || self.is_root_device(handle) {
            return self.get(handle, kind).map(|_| ());
        }
        self.get_mut(handle, kind)?.refs += 1;
        Ok(())
    }

    pub fn release(&mut self, handle: RawHandle, kind: HandleKind, notes: &mut Vec<Notify>) -> Result<(), ClInt> {
        if kind == HandleKind::Platform || self.is_root_device(handle) {
            return self.get(handle, kind).map(|_| ());
        }
        let obj = self.get_mut(handle, kind)?;
        if obj.refs == 0 {
            return Err(invalid_code(kind));
        }
        obj.refs -= 1;
        self.collect(handle, notes);
        Ok(())
    }

    pub fn hold(&mut self, handle: RawHandle) {
        if let Some(obj) = self.objects.get_mut(&handle) {
            obj.internal += 1;
        }
    }

    pub fn unhold(&mut self, handle: RawHandle, notes: &mut Vec<Notify>) {
        if let Some(obj) = self.objects.get_mut(&handle) {
            obj.internal = obj.internal.saturating_sub(1);
            self.collect(handle, notes);
        }
    }

    /// Destroy `handle` if nothing references it any more, cascading to the
    /// object it holds.
    fn collect(&mut self, handle: RawHandle, notes: &mut Vec<Notify>) {
        let mut next = Some(handle);
        while let Some(h) = next.take() {
            let dead = self
                .objects
                .get(&h)
                .is_some_and(|o| o.refs == 0 && o.internal == 0);
            if !dead {
                break;
            }
            let Some(obj) = self.objects.remove(&h) else {
                break;
            };
            debug!(handle = %h, kind = %obj.kind, "simulated object destroyed");
            for (f, user_data) in obj.destructors.into_iter().rev() {
                notes.push(Notify::Memory {
                    f,
                    memobj: h,
                    user_data,
                });
            }
            if self.recycle {
                self.free_handles.push(h);
            }
            if let Some(owner) = obj.holds.and_then(|o| self.objects.get_mut(&o).map(|obj| (o, obj))) {
                owner.1.internal = owner.1.internal.saturating_sub(1);
                next = Some(owner.0);
            }
        }
    }

    pub fn context_of_queue(&self, queue: RawHandle) -> Result<(RawHandle, u64), ClInt> {
        match &self.get(queue, HandleKind::CommandQueue)?.body {
            Body::Queue {
                context,
                properties,
                ..
            } => Ok((*context, *properties)),
            _ => Err(invalid_code(HandleKind::CommandQueue)),
        }
    }

    pub fn context_of_mem(&self, mem: RawHandle) -> Result<RawHandle, ClInt> {
        match &self.get(mem, HandleKind::Memory)?.body {
            Body::Buffer { context, .. }
            | Body::SubBuffer { context, .. }
            | Body::Image { context, .. }
            | Body::Pipe { context, .. } => Ok(*context),
            _ => Err(CL_INVALID_MEM_OBJECT),
        }
    }

    /// Resolve `offset..offset+size` inside a buffer or sub-buffer to the
    /// root buffer and an absolute offset.
    pub fn locate(&self, mem: RawHandle, offset: usize, size: usize) -> Result<(RawHandle, usize), ClInt> {
        let end = offset.checked_add(size).ok_or(CL_INVALID_VALUE)?;
        match &self.get(mem, HandleKind::Memory)?.body {
            Body::Buffer { data, .. } if end <= data.len() => Ok((mem, offset)),
            Body::SubBuffer { origin, size: sub, .. } if end <= *sub => {
                let parent = self.objects.get(&mem).and_then(|o| o.holds).ok_or(CL_INVALID_MEM_OBJECT)?;
                Ok((parent, origin + offset))
            }
            Body::Buffer { .. } | Body::SubBuffer { .. } => Err(CL_INVALID_VALUE),
            _ => Err(CL_INVALID_MEM_OBJECT),
        }
    }

    /// Byte extent of a buffer or sub-buffer.
    pub fn buffer_len(&self, mem: RawHandle) -> Result<usize, ClInt> {
        match &self.get(mem, HandleKind::Memory)?.body {
            Body::Buffer { data, .. } => Ok(data.len()),
            Body::SubBuffer { size, .. } => Ok(*size),
            _ => Err(CL_INVALID_MEM_OBJECT),
        }
    }

    pub fn data_mut(&mut self, mem: RawHandle) -> Option<&mut Vec<u8>> {
        match self.objects.get_mut(&mem).map(|o| &mut o.body) {
            Some(Body::Buffer { data, .. }) | Some(Body::Image { data, .. }) => Some(data),
            _ => None,
        }
    }

    pub fn check_wait_list(&self, wait_list: &[RawHandle]) -> Result<(), ClInt> {
        for event in wait_list {
            self.get(*event, HandleKind::Event)
                .map_err(|_| CL_INVALID_EVENT_WAIT_LIST)?;
        }
        Ok(())
    }

    /// Queue a command. Blocking commands retire, together with everything
    /// queued before them on the same queue, before this returns.
    pub fn submit(
        &mut self,
        queue: RawHandle,
        wait_list: &[RawHandle],
        event: Option<&mut RawHandle>,
        blocking: bool,
        command_type: u32,
        work: Work,
        notes: &mut Vec<Notify>,
    ) -> Result<(), ClInt> {
        let (context, _) = self.context_of_queue(queue)?;
        self.check_wait_list(wait_list)?;
        self.clock += 1;
        let mut handle = None;
        if let Some(out) = event {
            let h = self.alloc(
                HandleKind::Event,
                Body::Event {
                    context,
                    queue: Some(queue),
                    command_type,
                    status: CL_QUEUED,
                    callbacks: Vec::new(),
                    times: [self.clock, 0, 0, 0],
                },
                Some(queue),
            );
            self.hold(h);
            *out = h;
            handle = Some(h);
        }
        self.pending.push(Pending {
            queue,
            event: handle,
            work,
        });
        if blocking {
            self.complete_where(|p| p.queue == queue, notes);
        }
        Ok(())
    }

    /// Retire matching pending commands in submission order.
    pub fn complete_where(&mut self, mut pred: impl FnMut(&Pending) -> bool, notes: &mut Vec<Notify>) -> usize {
        let (ready, rest): (Vec<Pending>, Vec<Pending>) =
            std::mem::take(&mut self.pending).into_iter().partition(|p| pred(p));
        self.pending = rest;
        let retired = ready.len();
        for pending in ready {
            self.execute(pending.work);
            if let Some(event) = pending.event {
                self.clock += 1;
                let now = self.clock;
                if let Ok(SimObject {
                    body: Body::Event { times, .. },
                    ..
                }) = self.get_mut(event, HandleKind::Event)
                {
                    times[1] = now;
                    times[2] = now;
                    times[3] = now + 1;
                }
                self.settle(event, CL_COMPLETE, notes);
                self.unhold(event, notes);
            }
        }
        retired
    }

    /// Move an event to a terminal status and queue its callbacks.
    pub fn settle(&mut self, event: RawHandle, status: ClInt, notes: &mut Vec<Notify>) {
        if let Ok(SimObject {
            body: Body::Event {
                status: current,
                callbacks,
                ..
            },
            ..
        }) = self.get_mut(event, HandleKind::Event)
        {
            *current = status;
            for (_, f, user_data) in callbacks.drain(..) {
                notes.push(Notify::Event {
                    f,
                    event,
                    status,
                    user_data,
                });
            }
        }
    }

    fn execute(&mut self, work: Work) {
        match work {
            Work::None => {}
            Work::ToHost { mem, spans, host } => {
                let Some(data) = self.data_mut(mem) else {
                    debug!(%mem, "read target vanished before execution");
                    return;
                };
                for s in spans {
                    // SAFETY: the enqueue contract keeps `host` valid for the
                    // whole span set until the command completes.
                    unsafe {
                        std::ptr::copy_nonoverlapping(
                            data[s.dev..s.dev + s.len].as_ptr(),
                            (host as *mut u8).add(s.host),
                            s.len,
                        );
                    }
                }
            }
            Work::FromHost { mem, spans, host } => {
                let Some(data) = self.data_mut(mem) else {
                    debug!(%mem, "write target vanished before execution");
                    return;
                };
                for s in spans {
                    // SAFETY: as above, for reads of host memory.
                    unsafe {
                        std::ptr::copy_nonoverlapping(
                            (host as *const u8).add(s.host),
                            data[s.dev..s.dev + s.len].as_mut_ptr(),
                            s.len,
                        );
                    }
                }
            }
            Work::Copy { src, dst, spans } => {
                let Some(source) = self.data_mut(src) else {
                    return;
                };
                let chunks: Vec<Vec<u8>> = spans.iter().map(|s| source[s.dev..s.dev + s.len].to_vec()).collect();
                let Some(target) = self.data_mut(dst) else {
                    return;
                };
                for (s, chunk) in spans.iter().zip(chunks) {
                    target[s.host..s.host + s.len].copy_from_slice(&chunk);
                }
            }
            Work::Fill { mem, spans, pattern } => {
                let Some(data) = self.data_mut(mem) else {
                    return;
                };
                for s in spans {
                    for (i, byte) in data[s.dev..s.dev + s.len].iter_mut().enumerate() {
                        *byte = pattern[(s.host + i) % pattern.len()];
                    }
                }
            }
            Work::Unmap { address } => {
                if let Some(mapping) = self.mappings.remove(&address) {
                    if mapping.write_back {
                        if let Some(data) = self.data_mut(mapping.mem) {
                            data[mapping.offset..mapping.offset + mapping.data.len()]
                                .copy_from_slice(&mapping.data);
                        }
                    }
                }
            }
            Work::RawCopy { dst, src, len } => {
                // SAFETY: SVM enqueue contract: both ranges valid for `len`.
                unsafe { std::ptr::copy(src as *const u8, dst as *mut u8, len) };
            }
            Work::RawFill { dst, pattern, size } => {
                for i in 0..size {
                    // SAFETY: SVM enqueue contract: `dst..dst+size` valid.
                    unsafe { *(dst as *mut u8).add(i) = pattern[i % pattern.len()] };
                }
            }
            Work::SvmFree(addresses) => {
                for address in addresses {
                    self.svm.remove(&address);
                }
            }
        }
    }
}

/// Spans for a rectangular region. `region[0]` and the origins' x are in
/// bytes; pitches of zero mean tightly packed.
pub(super) fn rect_spans(
    dev_origin: [usize; 3],
    host_origin: [usize; 3],
    region: [usize; 3],
    dev_pitch: (usize, usize),
    host_pitch: (usize, usize),
) -> Vec<Span> {
    let (dev_row, dev_slice) = packed(region, dev_pitch);
    let (host_row, host_slice) = packed(region, host_pitch);
    let dev_base = dev_origin[2] * dev_slice + dev_origin[1] * dev_row + dev_origin[0];
    let host_base = host_origin[2] * host_slice + host_origin[1] * host_row + host_origin[0];
    let mut spans = Vec::with_capacity(region[1] * region[2]);
    for z in 0..region[2] {
        for y in 0..region[1] {
            spans.push(Span {
                dev: dev_base + z * dev_slice + y * dev_row,
                host: host_base + z * host_slice + y * host_row,
                len: region[0],
            });
        }
    }
    spans
}

fn packed(region: [usize; 3], (row, slice): (usize, usize)) -> (usize, usize) {
    let row = if row == 0 { region[0] } else { row };
    let slice = if slice == 0 { row * region[1] } else { slice };
    (row, slice)
}

/// One past the furthest device byte touched.
pub(super) fn extent(spans: &[Span]) -> usize {
    spans.iter().map(|s| s.dev + s.len).max().unwrap_or(0)
}
