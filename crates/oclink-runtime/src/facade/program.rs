// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Programs, builds, kernels and kernel arguments.
//
// Build, compile and link accept an optional completion callback. With a
// callback the native call may return before the build finishes and the
// outcome is read from the build status afterwards; without one the call
// blocks and a failed build is an error.

use std::ffi::{CStr, CString, c_void};

use oclink_core::error::Result;
use oclink_core::info;
use oclink_core::status::{CL_SUCCESS, ClInt, check};
use oclink_core::types::RawHandle;
use oclink_native::EntryPoint;
use oclink_native::api::{InfoTarget, ProgramNotifyFn, UserData};
use tracing::{debug, info, instrument};

use super::{ComputeFacade, invalid_argument};
use crate::callback::{BuildCallback, HostCallback, RegistrationId, UserToken, program_trampoline};
use crate::handle::{ContextHandle, DeviceHandle, KernelHandle, MemHandle, ProgramHandle, SamplerHandle};

fn c_string(op: &'static str, what: &str, value: &str) -> Result<CString> {
    CString::new(value).map_err(|_| invalid_argument(op, format!("{what} contains a NUL byte")))
}

/// Bridge registration for an optional build callback.
struct BuildNotify {
    id: Option<RegistrationId>,
    notify: Option<ProgramNotifyFn>,
    user_data: UserData,
}

impl ComputeFacade {
    fn build_notify(&self, target: RawHandle, callback: Option<BuildCallback>, token: UserToken) -> BuildNotify {
        match callback {
            Some(cb) => {
                let id = self.bridge.register(target, HostCallback::ProgramBuild(cb), token);
                BuildNotify {
                    id: Some(id),
                    notify: Some(program_trampoline as ProgramNotifyFn),
                    user_data: id.as_user_data(),
                }
            }
            None => BuildNotify {
                id: None,
                notify: None,
                user_data: std::ptr::null_mut(),
            },
        }
    }

    /// Settle a build registration against the native status. A failed
    /// call keeps its registration: drivers may still notify afterwards, and
    /// whatever is left is unregistered when the program is reclaimed.
    fn settle_build(&self, notify: &BuildNotify, status: ClInt, op: &'static str) -> Result<Option<RegistrationId>> {
        if let Err(err) = check(status, op) {
            if let Some(id) = notify.id {
                debug!(%id, status, "build call failed, registration kept for a late notify");
            }
            return Err(err);
        }
        Ok(notify.id)
    }

    #[instrument(skip(self, sources), fields(context = %context, sources = sources.len()))]
    pub fn create_program_with_source(&self, context: ContextHandle, sources: &[&str]) -> Result<ProgramHandle> {
        let entry = EntryPoint::CreateProgramWithSource;
        let ctx = self.live(context, entry.symbol())?;
        if sources.is_empty() {
            return Err(invalid_argument(entry.symbol(), "no source strings"));
        }
        if sources.iter().any(|src| src.contains('\0')) {
            return Err(invalid_argument(entry.symbol(), "source string contains a NUL byte"));
        }
        let view = self.view()?;
        let mut errcode = 0;
        let raw = view
            .entry(entry)?
            .create_program_with_source(ctx, sources, &mut errcode);
        self.adopt(entry, raw, errcode, Some(ctx))
    }

    /// One binary per device. A per-device load failure is reported as the
    /// native call's error.
    pub fn create_program_with_binary(
        &self,
        context: ContextHandle,
        devices: &[DeviceHandle],
        binaries: &[&[u8]],
    ) -> Result<ProgramHandle> {
        let entry = EntryPoint::CreateProgramWithBinary;
        let ctx = self.live(context, entry.symbol())?;
        if devices.len() != binaries.len() {
            return Err(invalid_argument(entry.symbol(), "need exactly one binary per device"));
        }
        let raw_devices = self.live_list(devices, entry.symbol())?;
        let view = self.view()?;
        let mut binary_status = vec![CL_SUCCESS; devices.len()];
        let mut errcode = 0;
        let raw = view.entry(entry)?.create_program_with_binary(
            ctx,
            &raw_devices,
            binaries,
            &mut binary_status,
            &mut errcode,
        );
        if let Some((index, code)) = binary_status.iter().enumerate().find(|(_, s)| **s != CL_SUCCESS) {
            debug!(index, code, "binary rejected");
        }
        self.adopt(entry, raw, errcode, Some(ctx))
    }

    /// Build for `devices` (every device of the program when empty).
    ///
    /// With `on_done` the callback fires once, on any thread, when the
    /// build finishes, and its registration id is returned.
    #[instrument(skip(self, devices, on_done), fields(program = %program))]
    pub fn build_program(
        &self,
        program: ProgramHandle,
        devices: &[DeviceHandle],
        options: &str,
        on_done: Option<BuildCallback>,
        token: UserToken,
    ) -> Result<Option<RegistrationId>> {
        let entry = EntryPoint::BuildProgram;
        let prog = self.live(program, entry.symbol())?;
        let raw_devices = self.live_list(devices, entry.symbol())?;
        let options = c_string(entry.symbol(), "build options", options)?;
        let view = self.view()?;
        let api = view.entry(entry)?;
        let notify = self.build_notify(prog, on_done, token);
        let status = api.build_program(prog, &raw_devices, &options, notify.notify, notify.user_data);
        let id = self.settle_build(&notify, status, entry.symbol())?;
        info!(program = %program, "program build submitted");
        Ok(id)
    }

    /// 1.2 separate compilation. `headers` pairs each embedded header
    /// program with the include name sources use for it.
    #[instrument(skip(self, devices, headers, on_done), fields(program = %program))]
    pub fn compile_program(
        &self,
        program: ProgramHandle,
        devices: &[DeviceHandle],
        options: &str,
        headers: &[(ProgramHandle, &str)],
        on_done: Option<BuildCallback>,
        token: UserToken,
    ) -> Result<Option<RegistrationId>> {
        let entry = EntryPoint::CompileProgram;
        let op = entry.symbol();
        let prog = self.live(program, op)?;
        let raw_devices = self.live_list(devices, op)?;
        let options = c_string(op, "compile options", options)?;
        let mut header_handles = Vec::with_capacity(headers.len());
        let mut names = Vec::with_capacity(headers.len());
        for (header, name) in headers {
            header_handles.push(self.live(*header, op)?);
            names.push(c_string(op, "header name", name)?);
        }
        let name_refs: Vec<&CStr> = names.iter().map(CString::as_c_str).collect();
        let view = self.view()?;
        let api = view.entry(entry)?;
        let notify = self.build_notify(prog, on_done, token);
        let status = api.compile_program(
            prog,
            &raw_devices,
            &options,
            &header_handles,
            &name_refs,
            notify.notify,
            notify.user_data,
        );
        self.settle_build(&notify, status, op)
    }

    /// 1.2 link of compiled programs into a new executable program.
    #[instrument(skip(self, devices, inputs, on_done), fields(context = %context, inputs = inputs.len()))]
    pub fn link_program(
        &self,
        context: ContextHandle,
        devices: &[DeviceHandle],
        options: &str,
        inputs: &[ProgramHandle],
        on_done: Option<BuildCallback>,
        token: UserToken,
    ) -> Result<(ProgramHandle, Option<RegistrationId>)> {
        let entry = EntryPoint::LinkProgram;
        let op = entry.symbol();
        let ctx = self.live(context, op)?;
        let raw_devices = self.live_list(devices, op)?;
        let raw_inputs = self.live_list(inputs, op)?;
        let options = c_string(op, "link options", options)?;
        let view = self.view()?;
        let api = view.entry(entry)?;
        // the linked program does not exist yet
        let notify = self.build_notify(RawHandle::NULL, on_done, token);
        let mut errcode = 0;
        let raw = api.link_program(
            ctx,
            &raw_devices,
            &options,
            &raw_inputs,
            notify.notify,
            notify.user_data,
            &mut errcode,
        );
        match self.adopt(entry, raw, errcode, Some(ctx)) {
            Ok(linked) => {
                if let Some(id) = notify.id {
                    self.bridge.bind(id, linked.raw());
                }
                Ok((linked, notify.id))
            }
            Err(err) => {
                if let Some(id) = notify.id {
                    self.bridge.cancel(id);
                }
                Err(err)
            }
        }
    }

    /// Compiler output for `device`.
    pub fn build_log(&self, program: ProgramHandle, device: DeviceHandle) -> Result<String> {
        self.query_string(
            InfoTarget::ProgramBuild {
                program: program.raw(),
                device: device.raw(),
            },
            info::build::LOG,
        )
    }

    /// Kernel `name` of a built program. The kernel keeps the program alive.
    #[instrument(skip(self), fields(program = %program))]
    pub fn create_kernel(&self, program: ProgramHandle, name: &str) -> Result<KernelHandle> {
        let entry = EntryPoint::CreateKernel;
        let prog = self.live(program, entry.symbol())?;
        let name = c_string(entry.symbol(), "kernel name", name)?;
        let view = self.view()?;
        let mut errcode = 0;
        let raw = view.entry(entry)?.create_kernel(prog, &name, &mut errcode);
        self.adopt(entry, raw, errcode, Some(prog))
    }

    /// One kernel for every kernel function in a built program.
    pub fn create_kernels_in_program(&self, program: ProgramHandle) -> Result<Vec<KernelHandle>> {
        let entry = EntryPoint::CreateKernelsInProgram;
        let prog = self.live(program, entry.symbol())?;
        let view = self.view()?;
        let api = view.entry(entry)?;
        let mut count = 0u32;
        check(api.create_kernels_in_program(prog, None, &mut count), entry.symbol())?;
        let mut raw = vec![RawHandle::NULL; count as usize];
        check(
            api.create_kernels_in_program(prog, Some(&mut raw), &mut count),
            entry.symbol(),
        )?;
        raw.truncate(count as usize);
        raw.into_iter()
            .map(|h| self.adopt(entry, h, CL_SUCCESS, Some(prog)))
            .collect()
    }

    /// Bind a plain value argument.
    pub fn set_kernel_arg<T: Copy>(&self, kernel: KernelHandle, index: u32, value: &T) -> Result<()> {
        // SAFETY: `value` is a live reference to `size_of::<T>()` bytes.
        unsafe {
            self.set_kernel_arg_raw(
                kernel,
                index,
                size_of::<T>(),
                std::ptr::from_ref(value).cast::<c_void>(),
            )
        }
    }

    /// Bind a buffer, image or pipe argument.
    pub fn set_kernel_arg_mem(&self, kernel: KernelHandle, index: u32, memory: MemHandle) -> Result<()> {
        let raw = self.live(memory, EntryPoint::SetKernelArg.symbol())?;
        self.set_kernel_arg(kernel, index, &raw)
    }

    pub fn set_kernel_arg_sampler(&self, kernel: KernelHandle, index: u32, sampler: SamplerHandle) -> Result<()> {
        let raw = self.live(sampler, EntryPoint::SetKernelArg.symbol())?;
        self.set_kernel_arg(kernel, index, &raw)
    }

    /// Reserve `size` bytes of local memory for a `__local` argument.
    pub fn set_kernel_arg_local(&self, kernel: KernelHandle, index: u32, size: usize) -> Result<()> {
        if size == 0 {
            return Err(invalid_argument(EntryPoint::SetKernelArg.symbol(), "local size must be non-zero"));
        }
        // SAFETY: a null value with a size declares local memory.
        unsafe { self.set_kernel_arg_raw(kernel, index, size, std::ptr::null()) }
    }

    unsafe fn set_kernel_arg_raw(&self, kernel: KernelHandle, index: u32, size: usize, value: *const c_void) -> Result<()> {
        let entry = EntryPoint::SetKernelArg;
        let k = self.live(kernel, entry.symbol())?;
        let view = self.view()?;
        // SAFETY: forwarded caller contract.
        let status = unsafe { view.entry(entry)?.set_kernel_arg(k, index, size, value) };
        check(status, entry.symbol())
    }

    /// 2.0 shared virtual memory argument.
    ///
    /// # Safety
    /// `ptr` must lie inside an SVM allocation of the kernel's context that
    /// outlives every dispatch using this argument.
    pub unsafe fn set_kernel_arg_svm_pointer(&self, kernel: KernelHandle, index: u32, ptr: *const c_void) -> Result<()> {
        let entry = EntryPoint::SetKernelArgSvmPointer;
        let k = self.live(kernel, entry.symbol())?;
        let view = self.view()?;
        // SAFETY: forwarded caller contract.
        let status = unsafe { view.entry(entry)?.set_kernel_arg_svm_pointer(k, index, ptr) };
        check(status, entry.symbol())
    }

    /// 1.2 name of argument `index`, as written in the kernel source.
    pub fn kernel_arg_name(&self, kernel: KernelHandle, index: u32) -> Result<String> {
        self.query_string(
            InfoTarget::KernelArg {
                kernel: kernel.raw(),
                index,
            },
            info::kernel_arg::NAME,
        )
    }

    /// Number of arguments the kernel function takes.
    pub fn kernel_num_args(&self, kernel: KernelHandle) -> Result<u32> {
        self.query_u32(InfoTarget::Kernel(kernel.raw()), info::kernel::NUM_ARGS)
    }

    /// Current build status on `device` as the native `cl_build_status`.
    pub fn build_status(&self, program: ProgramHandle, device: DeviceHandle) -> Result<i32> {
        self.query_i32(
            InfoTarget::ProgramBuild {
                program: program.raw(),
                device: device.raw(),
            },
            info::build::STATUS,
        )
    }
}

/// Native `cl_build_status` values.
pub mod build_status {
    pub const SUCCESS: i32 = 0;
    pub const NONE: i32 = -1;
    pub const ERROR: i32 = -2;
    pub const IN_PROGRESS: i32 = -3;
}
