// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Buffers, sub-buffers, images, pipes and samplers.

use std::ffi::c_void;

use oclink_core::error::Result;
use oclink_core::status::check;
use oclink_core::types::{
    AddressingMode, BufferRegion, CL_SAMPLER_ADDRESSING_MODE, CL_SAMPLER_FILTER_MODE,
    CL_SAMPLER_NORMALIZED_COORDS, FilterMode, HandleKind, ImageDesc, ImageFormat, MemFlags,
};
use oclink_native::EntryPoint;
use tracing::{debug, instrument};

use super::{ComputeFacade, invalid_argument};
use crate::callback::{DestructorCallback, HostCallback, RegistrationId, UserToken, mem_destructor_trampoline};
use crate::handle::{ContextHandle, MemHandle, SamplerHandle};

const HOST_POINTER_FLAGS: MemFlags = MemFlags::USE_HOST_PTR.union(MemFlags::COPY_HOST_PTR);

impl ComputeFacade {
    /// Device-allocated buffer of `size` bytes.
    #[instrument(skip(self), fields(context = %context))]
    pub fn create_buffer(&self, context: ContextHandle, flags: MemFlags, size: usize) -> Result<MemHandle> {
        let entry = EntryPoint::CreateBuffer;
        if flags.intersects(HOST_POINTER_FLAGS) {
            return Err(invalid_argument(
                entry.symbol(),
                "host pointer flags need create_buffer_with_data or create_buffer_with_host_ptr",
            ));
        }
        // SAFETY: no host pointer flags, so the driver never touches host_ptr.
        unsafe { self.create_buffer_with_host_ptr(context, flags, size, std::ptr::null_mut()) }
    }

    /// Buffer initialised with a copy of `data`.
    pub fn create_buffer_with_data(&self, context: ContextHandle, flags: MemFlags, data: &[u8]) -> Result<MemHandle> {
        if flags.contains(MemFlags::USE_HOST_PTR) {
            return Err(invalid_argument(
                EntryPoint::CreateBuffer.symbol(),
                "USE_HOST_PTR would alias a borrowed slice",
            ));
        }
        // SAFETY: COPY_HOST_PTR reads `data.len()` bytes during the call only.
        unsafe {
            self.create_buffer_with_host_ptr(
                context,
                flags | MemFlags::COPY_HOST_PTR,
                data.len(),
                data.as_ptr().cast_mut().cast(),
            )
        }
    }

    /// Buffer over caller-managed host memory.
    ///
    /// # Safety
    /// With `COPY_HOST_PTR`, `host_ptr` must be readable for `size` bytes.
    /// With `USE_HOST_PTR`, it must stay valid and unaliased until the
    /// buffer is destroyed natively.
    pub unsafe fn create_buffer_with_host_ptr(
        &self,
        context: ContextHandle,
        flags: MemFlags,
        size: usize,
        host_ptr: *mut c_void,
    ) -> Result<MemHandle> {
        let entry = EntryPoint::CreateBuffer;
        let ctx = self.live(context, entry.symbol())?;
        let view = self.view()?;
        let mut errcode = 0;
        // SAFETY: forwarded caller contract.
        let raw = unsafe { view.entry(entry)?.create_buffer(ctx, flags, size, host_ptr, &mut errcode) };
        let buffer = self.adopt(entry, raw, errcode, Some(ctx))?;
        debug!(buffer = %buffer, size, "buffer created");
        Ok(buffer)
    }

    /// View into `region` of `buffer`; keeps `buffer` alive.
    #[instrument(skip(self), fields(buffer = %buffer))]
    pub fn create_sub_buffer(&self, buffer: MemHandle, flags: MemFlags, region: BufferRegion) -> Result<MemHandle> {
        let entry = EntryPoint::CreateSubBuffer;
        let parent = self.live(buffer, entry.symbol())?;
        if flags.intersects(HOST_POINTER_FLAGS | MemFlags::ALLOC_HOST_PTR) {
            return Err(invalid_argument(entry.symbol(), "sub-buffers inherit host pointer flags"));
        }
        let view = self.view()?;
        let mut errcode = 0;
        let raw = view.entry(entry)?.create_sub_buffer(parent, flags, &region, &mut errcode);
        self.adopt(entry, raw, errcode, Some(parent))
    }

    /// 1.0 two-dimensional image.
    ///
    /// # Safety
    /// As for [`ComputeFacade::create_buffer_with_host_ptr`], with the
    /// image's byte extent in place of `size`.
    pub unsafe fn create_image_2d(
        &self,
        context: ContextHandle,
        flags: MemFlags,
        format: ImageFormat,
        width: usize,
        height: usize,
        row_pitch: usize,
        host_ptr: *mut c_void,
    ) -> Result<MemHandle> {
        let entry = EntryPoint::CreateImage2d;
        let ctx = self.live(context, entry.symbol())?;
        let view = self.view()?;
        let mut errcode = 0;
        // SAFETY: forwarded caller contract.
        let raw = unsafe {
            view.entry(entry)?
                .create_image_2d(ctx, flags, &format, width, height, row_pitch, host_ptr, &mut errcode)
        };
        self.adopt(entry, raw, errcode, Some(ctx))
    }

    /// 1.0 three-dimensional image.
    ///
    /// # Safety
    /// As for [`ComputeFacade::create_image_2d`].
    pub unsafe fn create_image_3d(
        &self,
        context: ContextHandle,
        flags: MemFlags,
        format: ImageFormat,
        dims: [usize; 3],
        row_pitch: usize,
        slice_pitch: usize,
        host_ptr: *mut c_void,
    ) -> Result<MemHandle> {
        let entry = EntryPoint::CreateImage3d;
        let ctx = self.live(context, entry.symbol())?;
        let view = self.view()?;
        let mut errcode = 0;
        let [width, height, depth] = dims;
        // SAFETY: forwarded caller contract.
        let raw = unsafe {
            view.entry(entry)?.create_image_3d(
                ctx,
                flags,
                &format,
                width,
                height,
                depth,
                row_pitch,
                slice_pitch,
                host_ptr,
                &mut errcode,
            )
        };
        self.adopt(entry, raw, errcode, Some(ctx))
    }

    /// 1.2 description-based image. An image over `desc.buffer` keeps that
    /// buffer alive.
    ///
    /// # Safety
    /// As for [`ComputeFacade::create_image_2d`].
    pub unsafe fn create_image(
        &self,
        context: ContextHandle,
        flags: MemFlags,
        format: ImageFormat,
        desc: ImageDesc,
        host_ptr: *mut c_void,
    ) -> Result<MemHandle> {
        let entry = EntryPoint::CreateImage;
        let ctx = self.live(context, entry.symbol())?;
        let parent = if desc.buffer.is_null() {
            Some(ctx)
        } else {
            self.ledger.check_live(HandleKind::Memory, desc.buffer, entry.symbol())?;
            Some(desc.buffer)
        };
        let view = self.view()?;
        let mut errcode = 0;
        // SAFETY: forwarded caller contract.
        let raw = unsafe { view.entry(entry)?.create_image(ctx, flags, &format, &desc, host_ptr, &mut errcode) };
        self.adopt(entry, raw, errcode, parent)
    }

    /// 2.0 pipe of `max_packets` packets of `packet_size` bytes.
    pub fn create_pipe(
        &self,
        context: ContextHandle,
        flags: MemFlags,
        packet_size: u32,
        max_packets: u32,
    ) -> Result<MemHandle> {
        let entry = EntryPoint::CreatePipe;
        let ctx = self.live(context, entry.symbol())?;
        let view = self.view()?;
        let mut errcode = 0;
        let raw = view
            .entry(entry)?
            .create_pipe(ctx, flags, packet_size, max_packets, &mut errcode);
        self.adopt(entry, raw, errcode, Some(ctx))
    }

    /// Run `on_destroy` once, when the driver destroys `memory`. Callbacks
    /// fire in reverse registration order.
    #[instrument(skip(self, on_destroy), fields(memory = %memory))]
    pub fn set_destructor_callback(
        &self,
        memory: MemHandle,
        on_destroy: DestructorCallback,
        token: UserToken,
    ) -> Result<RegistrationId> {
        let entry = EntryPoint::SetMemObjectDestructorCallback;
        let mem = self.live(memory, entry.symbol())?;
        let view = self.view()?;
        let api = view.entry(entry)?;
        let id = self.bridge.register(mem, HostCallback::MemoryDestroyed(on_destroy), token);
        let status = api.set_mem_object_destructor_callback(mem, mem_destructor_trampoline, id.as_user_data());
        if let Err(err) = check(status, entry.symbol()) {
            self.bridge.cancel(id);
            return Err(err);
        }
        Ok(id)
    }

    /// 1.0 sampler; deprecated from 2.0 but still served.
    pub fn create_sampler(
        &self,
        context: ContextHandle,
        normalized_coords: bool,
        addressing: AddressingMode,
        filter: FilterMode,
    ) -> Result<SamplerHandle> {
        let entry = EntryPoint::CreateSampler;
        let ctx = self.live(context, entry.symbol())?;
        let view = self.view()?;
        let mut errcode = 0;
        let raw = view.entry(entry)?.create_sampler(
            ctx,
            normalized_coords,
            addressing.to_raw(),
            filter.to_raw(),
            &mut errcode,
        );
        self.adopt(entry, raw, errcode, Some(ctx))
    }

    /// 2.0 properties form of [`ComputeFacade::create_sampler`].
    pub fn create_sampler_with_properties(
        &self,
        context: ContextHandle,
        normalized_coords: bool,
        addressing: AddressingMode,
        filter: FilterMode,
    ) -> Result<SamplerHandle> {
        let entry = EntryPoint::CreateSamplerWithProperties;
        let ctx = self.live(context, entry.symbol())?;
        let props = [
            CL_SAMPLER_NORMALIZED_COORDS,
            u64::from(normalized_coords),
            CL_SAMPLER_ADDRESSING_MODE,
            u64::from(addressing.to_raw()),
            CL_SAMPLER_FILTER_MODE,
            u64::from(filter.to_raw()),
            0,
        ];
        let view = self.view()?;
        let mut errcode = 0;
        let raw = view
            .entry(entry)?
            .create_sampler_with_properties(ctx, &props, &mut errcode);
        self.adopt(entry, raw, errcode, Some(ctx))
    }
}
