// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command submission: transfers, fills, maps, kernel dispatch and
// synchronisation commands.
//
// Blocking transfers borrow host memory for the duration of the call and
// are safe. Non-blocking ones return an event and are `unsafe`: the host
// memory must stay valid, and untouched by the host, until that event is
// terminal. Events handed back by the driver start with one host reference.

#![allow(clippy::too_many_arguments)]

use std::ffi::c_void;

use oclink_core::error::Result;
use oclink_core::info;
use oclink_core::status::{ClInt, check};
use oclink_core::types::{MapFlags, RawHandle, RectCopy, RectRegion};
use oclink_native::api::InfoTarget;
use oclink_native::{EntryPoint, NativeApi};
use tracing::{debug, instrument, trace, warn};

use super::{ComputeFacade, invalid_argument};
use crate::handle::{EventHandle, KernelHandle, MemHandle, QueueHandle};

/// Host view of a mapped buffer range, live until passed to
/// [`ComputeFacade::unmap`].
#[derive(Debug)]
pub struct MappedRegion {
    buffer: MemHandle,
    ptr: *mut u8,
    len: usize,
}

impl MappedRegion {
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn buffer(&self) -> MemHandle {
        self.buffer
    }

    /// # Safety
    /// The buffer must not be written by the device while the slice is
    /// alive.
    pub unsafe fn as_slice(&self) -> &[u8] {
        // SAFETY: the driver mapped `len` bytes at `ptr` for this region.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    /// # Safety
    /// As for [`MappedRegion::as_slice`]; the map flags must allow host
    /// writes.
    pub unsafe fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: the driver mapped `len` bytes at `ptr` for this region.
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

/// Bytes of host memory a rectangular transfer touches.
fn rect_host_extent(op: &'static str, rect: &RectRegion) -> Result<usize> {
    let region = rect.region;
    if region.contains(&0) {
        return Err(invalid_argument(op, "rect region has a zero dimension"));
    }
    let overflow = || invalid_argument(op, "rect geometry overflows the address space");
    let row = if rect.host_row_pitch == 0 { region[0] } else { rect.host_row_pitch };
    let plane = row.checked_mul(region[1]).ok_or_else(overflow)?;
    let slice = if rect.host_slice_pitch == 0 { plane } else { rect.host_slice_pitch };
    if row < region[0] || slice < plane {
        return Err(invalid_argument(op, "host pitches are smaller than the region"));
    }
    let origin = rect.host_origin;
    // index of the last slice and row touched, then the end of that row
    let last = |o: usize, r: usize| o.checked_add(r - 1);
    let slices = last(origin[2], region[2])
        .and_then(|n| n.checked_mul(slice))
        .ok_or_else(overflow)?;
    let rows = last(origin[1], region[1])
        .and_then(|n| n.checked_mul(row))
        .ok_or_else(overflow)?;
    slices
        .checked_add(rows)
        .and_then(|n| n.checked_add(origin[0]))
        .and_then(|n| n.checked_add(region[0]))
        .ok_or_else(overflow)
}

/// Dispatch geometry checks shared by every ND-range.
fn check_work_dims(op: &'static str, offset: Option<&[usize]>, global: &[usize], local: Option<&[usize]>) -> Result<()> {
    let dims = global.len();
    if !(1..=3).contains(&dims) {
        return Err(invalid_argument(op, format!("work dimension must be 1, 2 or 3, got {dims}")));
    }
    if offset.is_some_and(|o| o.len() != dims) || local.is_some_and(|l| l.len() != dims) {
        return Err(invalid_argument(op, "offset and local sizes must match the global dimension"));
    }
    Ok(())
}

/// Fill patterns are 1 to 128 bytes, a power of two, and tile the range.
fn check_fill_pattern(op: &'static str, pattern: &[u8], offset: usize, size: usize) -> Result<()> {
    let len = pattern.len();
    if !(1..=128).contains(&len) || !len.is_power_of_two() {
        return Err(invalid_argument(op, format!("pattern of {len} bytes")));
    }
    if offset % len != 0 || size % len != 0 {
        return Err(invalid_argument(op, "offset and size must be multiples of the pattern size"));
    }
    Ok(())
}

impl ComputeFacade {
    /// Submit a command that hands back an event.
    pub(super) fn enqueue_evented(
        &self,
        entry: EntryPoint,
        queue: QueueHandle,
        wait: &[EventHandle],
        call: impl FnOnce(&dyn NativeApi, RawHandle, &[RawHandle], &mut RawHandle) -> ClInt,
    ) -> Result<EventHandle> {
        let q = self.live(queue, entry.symbol())?;
        let wait_list = self.live_list(wait, entry.symbol())?;
        let view = self.view()?;
        let mut event = RawHandle::NULL;
        let status = call(view.entry(entry)?, q, &wait_list, &mut event);
        let event = self.adopt_event(entry, status, event)?;
        trace!(op = entry.symbol(), event = %event, "enqueued");
        Ok(event)
    }

    /// Submit a command without an event.
    pub(super) fn enqueue_plain(
        &self,
        entry: EntryPoint,
        queue: QueueHandle,
        wait: &[EventHandle],
        call: impl FnOnce(&dyn NativeApi, RawHandle, &[RawHandle]) -> ClInt,
    ) -> Result<()> {
        let q = self.live(queue, entry.symbol())?;
        let wait_list = self.live_list(wait, entry.symbol())?;
        let view = self.view()?;
        check(call(view.entry(entry)?, q, &wait_list), entry.symbol())
    }

    /// Blocking read of `dst.len()` bytes at `offset`.
    #[instrument(skip(self, dst, wait), fields(buffer = %buffer, len = dst.len()))]
    pub fn read_buffer(
        &self,
        queue: QueueHandle,
        buffer: MemHandle,
        offset: usize,
        dst: &mut [u8],
        wait: &[EventHandle],
    ) -> Result<()> {
        let entry = EntryPoint::EnqueueReadBuffer;
        let mem = self.live(buffer, entry.symbol())?;
        let (ptr, len) = (dst.as_mut_ptr().cast::<c_void>(), dst.len());
        self.enqueue_plain(entry, queue, wait, |api, q, wl| {
            // SAFETY: blocking; `dst` is borrowed until the call returns.
            unsafe { api.enqueue_read_buffer(q, mem, true, offset, len, ptr, wl, None) }
        })
    }

    /// Blocking write of `src` at `offset`.
    #[instrument(skip(self, src, wait), fields(buffer = %buffer, len = src.len()))]
    pub fn write_buffer(
        &self,
        queue: QueueHandle,
        buffer: MemHandle,
        offset: usize,
        src: &[u8],
        wait: &[EventHandle],
    ) -> Result<()> {
        let entry = EntryPoint::EnqueueWriteBuffer;
        let mem = self.live(buffer, entry.symbol())?;
        let (ptr, len) = (src.as_ptr().cast::<c_void>(), src.len());
        self.enqueue_plain(entry, queue, wait, |api, q, wl| {
            // SAFETY: blocking; `src` is borrowed until the call returns.
            unsafe { api.enqueue_write_buffer(q, mem, true, offset, len, ptr, wl, None) }
        })
    }

    /// Non-blocking read into `dst`.
    ///
    /// # Safety
    /// `dst` must stay valid and must not be accessed until the returned
    /// event is terminal.
    pub unsafe fn read_buffer_async(
        &self,
        queue: QueueHandle,
        buffer: MemHandle,
        offset: usize,
        dst: &mut [u8],
        wait: &[EventHandle],
    ) -> Result<EventHandle> {
        let entry = EntryPoint::EnqueueReadBuffer;
        let mem = self.live(buffer, entry.symbol())?;
        let (ptr, len) = (dst.as_mut_ptr().cast::<c_void>(), dst.len());
        self.enqueue_evented(entry, queue, wait, |api, q, wl, ev| {
            // SAFETY: forwarded caller contract.
            unsafe { api.enqueue_read_buffer(q, mem, false, offset, len, ptr, wl, Some(ev)) }
        })
    }

    /// Non-blocking write from `src`.
    ///
    /// # Safety
    /// `src` must stay valid and unmodified until the returned event is
    /// terminal.
    pub unsafe fn write_buffer_async(
        &self,
        queue: QueueHandle,
        buffer: MemHandle,
        offset: usize,
        src: &[u8],
        wait: &[EventHandle],
    ) -> Result<EventHandle> {
        let entry = EntryPoint::EnqueueWriteBuffer;
        let mem = self.live(buffer, entry.symbol())?;
        let (ptr, len) = (src.as_ptr().cast::<c_void>(), src.len());
        self.enqueue_evented(entry, queue, wait, |api, q, wl, ev| {
            // SAFETY: forwarded caller contract.
            unsafe { api.enqueue_write_buffer(q, mem, false, offset, len, ptr, wl, Some(ev)) }
        })
    }

    /// 1.1 blocking rectangular read. `dst` must cover the host side of
    /// `rect`.
    pub fn read_buffer_rect(
        &self,
        queue: QueueHandle,
        buffer: MemHandle,
        rect: &RectRegion,
        dst: &mut [u8],
        wait: &[EventHandle],
    ) -> Result<()> {
        let entry = EntryPoint::EnqueueReadBufferRect;
        let mem = self.live(buffer, entry.symbol())?;
        let needed = rect_host_extent(entry.symbol(), rect)?;
        if dst.len() < needed {
            return Err(invalid_argument(
                entry.symbol(),
                format!("host slice holds {} bytes, rect reaches {needed}", dst.len()),
            ));
        }
        let ptr = dst.as_mut_ptr().cast::<c_void>();
        self.enqueue_plain(entry, queue, wait, |api, q, wl| {
            // SAFETY: blocking, and `dst` covers the host extent.
            unsafe { api.enqueue_read_buffer_rect(q, mem, true, rect, ptr, wl, None) }
        })
    }

    /// 1.1 blocking rectangular write. `src` must cover the host side of
    /// `rect`.
    pub fn write_buffer_rect(
        &self,
        queue: QueueHandle,
        buffer: MemHandle,
        rect: &RectRegion,
        src: &[u8],
        wait: &[EventHandle],
    ) -> Result<()> {
        let entry = EntryPoint::EnqueueWriteBufferRect;
        let mem = self.live(buffer, entry.symbol())?;
        let needed = rect_host_extent(entry.symbol(), rect)?;
        if src.len() < needed {
            return Err(invalid_argument(
                entry.symbol(),
                format!("host slice holds {} bytes, rect reaches {needed}", src.len()),
            ));
        }
        let ptr = src.as_ptr().cast::<c_void>();
        self.enqueue_plain(entry, queue, wait, |api, q, wl| {
            // SAFETY: blocking, and `src` covers the host extent.
            unsafe { api.enqueue_write_buffer_rect(q, mem, true, rect, ptr, wl, None) }
        })
    }

    /// Non-blocking form of [`ComputeFacade::read_buffer_rect`].
    ///
    /// # Safety
    /// As for [`ComputeFacade::read_buffer_async`].
    pub unsafe fn read_buffer_rect_async(
        &self,
        queue: QueueHandle,
        buffer: MemHandle,
        rect: &RectRegion,
        dst: &mut [u8],
        wait: &[EventHandle],
    ) -> Result<EventHandle> {
        let entry = EntryPoint::EnqueueReadBufferRect;
        let mem = self.live(buffer, entry.symbol())?;
        if dst.len() < rect_host_extent(entry.symbol(), rect)? {
            return Err(invalid_argument(entry.symbol(), "host slice is smaller than the rect"));
        }
        let ptr = dst.as_mut_ptr().cast::<c_void>();
        self.enqueue_evented(entry, queue, wait, |api, q, wl, ev| {
            // SAFETY: forwarded caller contract.
            unsafe { api.enqueue_read_buffer_rect(q, mem, false, rect, ptr, wl, Some(ev)) }
        })
    }

    /// Non-blocking form of [`ComputeFacade::write_buffer_rect`].
    ///
    /// # Safety
    /// As for [`ComputeFacade::write_buffer_async`].
    pub unsafe fn write_buffer_rect_async(
        &self,
        queue: QueueHandle,
        buffer: MemHandle,
        rect: &RectRegion,
        src: &[u8],
        wait: &[EventHandle],
    ) -> Result<EventHandle> {
        let entry = EntryPoint::EnqueueWriteBufferRect;
        let mem = self.live(buffer, entry.symbol())?;
        if src.len() < rect_host_extent(entry.symbol(), rect)? {
            return Err(invalid_argument(entry.symbol(), "host slice is smaller than the rect"));
        }
        let ptr = src.as_ptr().cast::<c_void>();
        self.enqueue_evented(entry, queue, wait, |api, q, wl, ev| {
            // SAFETY: forwarded caller contract.
            unsafe { api.enqueue_write_buffer_rect(q, mem, false, rect, ptr, wl, Some(ev)) }
        })
    }

    pub fn copy_buffer(
        &self,
        queue: QueueHandle,
        src: MemHandle,
        dst: MemHandle,
        src_offset: usize,
        dst_offset: usize,
        size: usize,
        wait: &[EventHandle],
    ) -> Result<EventHandle> {
        let entry = EntryPoint::EnqueueCopyBuffer;
        let (from, to) = (self.live(src, entry.symbol())?, self.live(dst, entry.symbol())?);
        self.enqueue_evented(entry, queue, wait, |api, q, wl, ev| {
            api.enqueue_copy_buffer(q, from, to, src_offset, dst_offset, size, wl, Some(ev))
        })
    }

    /// 1.1 rectangular buffer-to-buffer copy.
    pub fn copy_buffer_rect(
        &self,
        queue: QueueHandle,
        src: MemHandle,
        dst: MemHandle,
        rect: &RectCopy,
        wait: &[EventHandle],
    ) -> Result<EventHandle> {
        let entry = EntryPoint::EnqueueCopyBufferRect;
        let (from, to) = (self.live(src, entry.symbol())?, self.live(dst, entry.symbol())?);
        self.enqueue_evented(entry, queue, wait, |api, q, wl, ev| {
            api.enqueue_copy_buffer_rect(q, from, to, rect, wl, Some(ev))
        })
    }

    /// 1.2 fill of `size` bytes at `offset` with a repeated pattern.
    pub fn fill_buffer(
        &self,
        queue: QueueHandle,
        buffer: MemHandle,
        pattern: &[u8],
        offset: usize,
        size: usize,
        wait: &[EventHandle],
    ) -> Result<EventHandle> {
        let entry = EntryPoint::EnqueueFillBuffer;
        check_fill_pattern(entry.symbol(), pattern, offset, size)?;
        let mem = self.live(buffer, entry.symbol())?;
        self.enqueue_evented(entry, queue, wait, |api, q, wl, ev| {
            api.enqueue_fill_buffer(q, mem, pattern, offset, size, wl, Some(ev))
        })
    }

    /// Tightly packed byte size of `region` of `image`.
    fn image_extent(&self, op: &'static str, image: MemHandle, region: [usize; 3]) -> Result<usize> {
        if region.contains(&0) {
            return Err(invalid_argument(op, "image region has a zero dimension"));
        }
        let element = self.query_usize(InfoTarget::Image(image.raw()), info::image::ELEMENT_SIZE)?;
        Ok(element * region.iter().product::<usize>())
    }

    /// Blocking read of a tightly packed image region.
    pub fn read_image(
        &self,
        queue: QueueHandle,
        image: MemHandle,
        origin: [usize; 3],
        region: [usize; 3],
        dst: &mut [u8],
        wait: &[EventHandle],
    ) -> Result<()> {
        let entry = EntryPoint::EnqueueReadImage;
        let img = self.live(image, entry.symbol())?;
        let needed = self.image_extent(entry.symbol(), image, region)?;
        if dst.len() < needed {
            return Err(invalid_argument(
                entry.symbol(),
                format!("host slice holds {} bytes, region needs {needed}", dst.len()),
            ));
        }
        let ptr = dst.as_mut_ptr().cast::<c_void>();
        self.enqueue_plain(entry, queue, wait, |api, q, wl| {
            // SAFETY: blocking, and `dst` covers the packed region.
            unsafe { api.enqueue_read_image(q, img, true, origin, region, 0, 0, ptr, wl, None) }
        })
    }

    /// Blocking write of a tightly packed image region.
    pub fn write_image(
        &self,
        queue: QueueHandle,
        image: MemHandle,
        origin: [usize; 3],
        region: [usize; 3],
        src: &[u8],
        wait: &[EventHandle],
    ) -> Result<()> {
        let entry = EntryPoint::EnqueueWriteImage;
        let img = self.live(image, entry.symbol())?;
        let needed = self.image_extent(entry.symbol(), image, region)?;
        if src.len() < needed {
            return Err(invalid_argument(
                entry.symbol(),
                format!("host slice holds {} bytes, region needs {needed}", src.len()),
            ));
        }
        let ptr = src.as_ptr().cast::<c_void>();
        self.enqueue_plain(entry, queue, wait, |api, q, wl| {
            // SAFETY: blocking, and `src` covers the packed region.
            unsafe { api.enqueue_write_image(q, img, true, origin, region, 0, 0, ptr, wl, None) }
        })
    }

    /// Non-blocking image read with explicit host pitches.
    ///
    /// # Safety
    /// `dst` must cover `region` at the given pitches and stay valid and
    /// untouched until the returned event is terminal.
    pub unsafe fn read_image_async(
        &self,
        queue: QueueHandle,
        image: MemHandle,
        origin: [usize; 3],
        region: [usize; 3],
        pitches: (usize, usize),
        dst: *mut c_void,
        wait: &[EventHandle],
    ) -> Result<EventHandle> {
        let entry = EntryPoint::EnqueueReadImage;
        let img = self.live(image, entry.symbol())?;
        let (row, slice) = pitches;
        self.enqueue_evented(entry, queue, wait, |api, q, wl, ev| {
            // SAFETY: forwarded caller contract.
            unsafe { api.enqueue_read_image(q, img, false, origin, region, row, slice, dst, wl, Some(ev)) }
        })
    }

    /// Non-blocking image write with explicit host pitches.
    ///
    /// # Safety
    /// `src` must cover `region` at the given pitches and stay valid and
    /// unmodified until the returned event is terminal.
    pub unsafe fn write_image_async(
        &self,
        queue: QueueHandle,
        image: MemHandle,
        origin: [usize; 3],
        region: [usize; 3],
        pitches: (usize, usize),
        src: *const c_void,
        wait: &[EventHandle],
    ) -> Result<EventHandle> {
        let entry = EntryPoint::EnqueueWriteImage;
        let img = self.live(image, entry.symbol())?;
        let (row, slice) = pitches;
        self.enqueue_evented(entry, queue, wait, |api, q, wl, ev| {
            // SAFETY: forwarded caller contract.
            unsafe { api.enqueue_write_image(q, img, false, origin, region, row, slice, src, wl, Some(ev)) }
        })
    }

    pub fn copy_image(
        &self,
        queue: QueueHandle,
        src: MemHandle,
        dst: MemHandle,
        src_origin: [usize; 3],
        dst_origin: [usize; 3],
        region: [usize; 3],
        wait: &[EventHandle],
    ) -> Result<EventHandle> {
        let entry = EntryPoint::EnqueueCopyImage;
        let (from, to) = (self.live(src, entry.symbol())?, self.live(dst, entry.symbol())?);
        self.enqueue_evented(entry, queue, wait, |api, q, wl, ev| {
            api.enqueue_copy_image(q, from, to, src_origin, dst_origin, region, wl, Some(ev))
        })
    }

    /// 1.2 fill of an image region. `color` holds four channels as
    /// `float`, `int` or `uint`, depending on the image format.
    pub fn fill_image(
        &self,
        queue: QueueHandle,
        image: MemHandle,
        color: [u8; 16],
        origin: [usize; 3],
        region: [usize; 3],
        wait: &[EventHandle],
    ) -> Result<EventHandle> {
        let entry = EntryPoint::EnqueueFillImage;
        let img = self.live(image, entry.symbol())?;
        self.enqueue_evented(entry, queue, wait, |api, q, wl, ev| {
            api.enqueue_fill_image(q, img, &color, origin, region, wl, Some(ev))
        })
    }

    /// Blocking map of `size` bytes at `offset`. The map command has
    /// finished on return, so its event is released here.
    #[instrument(skip(self, wait), fields(buffer = %buffer))]
    pub fn map_buffer(
        &self,
        queue: QueueHandle,
        buffer: MemHandle,
        flags: MapFlags,
        offset: usize,
        size: usize,
        wait: &[EventHandle],
    ) -> Result<MappedRegion> {
        let entry = EntryPoint::EnqueueMapBuffer;
        if size == 0 {
            return Err(invalid_argument(entry.symbol(), "cannot map zero bytes"));
        }
        let mem = self.live(buffer, entry.symbol())?;
        let mut ptr = std::ptr::null_mut();
        let event = self.enqueue_evented(entry, queue, wait, |api, q, wl, ev| {
            let mut errcode = 0;
            ptr = api.enqueue_map_buffer(q, mem, true, flags, offset, size, wl, Some(ev), &mut errcode);
            errcode
        })?;
        if ptr.is_null() {
            if let Err(err) = self.release(event) {
                warn!(error = %err, "could not release the event of a failed map");
            }
            return Err(invalid_argument(entry.symbol(), "driver mapped a null pointer"));
        }
        self.release(event)?;
        debug!(size, "buffer mapped");
        Ok(MappedRegion {
            buffer,
            ptr: ptr.cast(),
            len: size,
        })
    }

    /// Hand a mapped range back to the device. Host writes land once the
    /// returned event completes.
    pub fn unmap(&self, queue: QueueHandle, region: MappedRegion, wait: &[EventHandle]) -> Result<EventHandle> {
        let entry = EntryPoint::EnqueueUnmapMemObject;
        let mem = self.live(region.buffer, entry.symbol())?;
        let ptr = region.ptr.cast::<c_void>();
        self.enqueue_evented(entry, queue, wait, |api, q, wl, ev| {
            // SAFETY: `region` came from a map of this buffer and is consumed.
            unsafe { api.enqueue_unmap_mem_object(q, mem, ptr, wl, Some(ev)) }
        })
    }

    /// Dispatch `kernel` over `global` work items in 1 to 3 dimensions.
    #[instrument(skip(self, wait), fields(kernel = %kernel))]
    pub fn enqueue_nd_range(
        &self,
        queue: QueueHandle,
        kernel: KernelHandle,
        offset: Option<&[usize]>,
        global: &[usize],
        local: Option<&[usize]>,
        wait: &[EventHandle],
    ) -> Result<EventHandle> {
        let entry = EntryPoint::EnqueueNdRangeKernel;
        check_work_dims(entry.symbol(), offset, global, local)?;
        let k = self.live(kernel, entry.symbol())?;
        self.enqueue_evented(entry, queue, wait, |api, q, wl, ev| {
            api.enqueue_nd_range_kernel(q, k, offset, global, local, wl, Some(ev))
        })
    }

    /// Single work-item dispatch; deprecated from 2.0.
    pub fn enqueue_task(&self, queue: QueueHandle, kernel: KernelHandle, wait: &[EventHandle]) -> Result<EventHandle> {
        let entry = EntryPoint::EnqueueTask;
        let k = self.live(kernel, entry.symbol())?;
        self.enqueue_evented(entry, queue, wait, |api, q, wl, ev| {
            api.enqueue_task(q, k, wl, Some(ev))
        })
    }

    /// 1.0 marker; deprecated from 1.2.
    pub fn enqueue_marker(&self, queue: QueueHandle) -> Result<EventHandle> {
        self.enqueue_evented(EntryPoint::EnqueueMarker, queue, &[], |api, q, _, ev| {
            api.enqueue_marker(q, ev)
        })
    }

    /// 1.0 barrier; deprecated from 1.2.
    pub fn enqueue_barrier(&self, queue: QueueHandle) -> Result<()> {
        self.enqueue_plain(EntryPoint::EnqueueBarrier, queue, &[], |api, q, _| api.enqueue_barrier(q))
    }

    /// 1.0 in-queue wait; deprecated from 1.2.
    pub fn enqueue_wait_for_events(&self, queue: QueueHandle, events: &[EventHandle]) -> Result<()> {
        let entry = EntryPoint::EnqueueWaitForEvents;
        if events.is_empty() {
            return Err(invalid_argument(entry.symbol(), "nothing to wait for"));
        }
        self.enqueue_plain(entry, queue, events, |api, q, wl| api.enqueue_wait_for_events(q, wl))
    }

    /// 1.2 marker completing after `wait` (or everything queued so far).
    pub fn enqueue_marker_with_wait_list(&self, queue: QueueHandle, wait: &[EventHandle]) -> Result<EventHandle> {
        self.enqueue_evented(EntryPoint::EnqueueMarkerWithWaitList, queue, wait, |api, q, wl, ev| {
            api.enqueue_marker_with_wait_list(q, wl, Some(ev))
        })
    }

    /// 1.2 barrier: later commands wait for `wait` (or everything queued
    /// so far).
    pub fn enqueue_barrier_with_wait_list(&self, queue: QueueHandle, wait: &[EventHandle]) -> Result<EventHandle> {
        self.enqueue_evented(EntryPoint::EnqueueBarrierWithWaitList, queue, wait, |api, q, wl, ev| {
            api.enqueue_barrier_with_wait_list(q, wl, Some(ev))
        })
    }
}

#[cfg(test)]
mod tests {
    use oclink_core::error::OclinkError;

    use super::*;

    #[test]
    fn tight_rect_extent_is_region_volume() {
        let rect = RectRegion {
            region: [4, 3, 2],
            ..RectRegion::default()
        };
        assert_eq!(rect_host_extent("t", &rect).expect("extent"), 24);
    }

    #[test]
    fn pitched_rect_extent_ends_at_last_row() {
        let rect = RectRegion {
            host_origin: [1, 1, 0],
            region: [4, 2, 1],
            host_row_pitch: 8,
            ..RectRegion::default()
        };
        // rows at 9..13 and 17..21
        assert_eq!(rect_host_extent("t", &rect).expect("extent"), 21);
    }

    #[test]
    fn narrow_pitch_is_rejected() {
        let rect = RectRegion {
            region: [4, 2, 1],
            host_row_pitch: 2,
            ..RectRegion::default()
        };
        assert!(rect_host_extent("t", &rect).is_err());
    }

    #[test]
    fn oversized_rect_geometry_is_rejected() {
        let huge = RectRegion {
            region: [usize::MAX, 2, 1],
            ..RectRegion::default()
        };
        assert!(matches!(
            rect_host_extent("t", &huge),
            Err(OclinkError::InvalidArgument { .. })
        ));
        let far = RectRegion {
            host_origin: [0, 0, usize::MAX],
            region: [4, 2, 2],
            ..RectRegion::default()
        };
        assert!(matches!(
            rect_host_extent("t", &far),
            Err(OclinkError::InvalidArgument { .. })
        ));
        let wide_pitch = RectRegion {
            region: [4, 2, 3],
            host_row_pitch: usize::MAX / 2,
            ..RectRegion::default()
        };
        assert!(rect_host_extent("t", &wide_pitch).is_err());
    }

    #[test]
    fn work_dims_must_agree() {
        assert!(check_work_dims("t", None, &[64], None).is_ok());
        assert!(check_work_dims("t", None, &[], None).is_err());
        assert!(check_work_dims("t", None, &[1, 1, 1, 1], None).is_err());
        assert!(check_work_dims("t", Some(&[0]), &[8, 8], None).is_err());
        assert!(check_work_dims("t", None, &[8, 8], Some(&[4])).is_err());
    }

    #[test]
    fn fill_pattern_rules() {
        assert!(check_fill_pattern("t", &[0; 4], 8, 16).is_ok());
        assert!(check_fill_pattern("t", &[0; 3], 0, 3).is_err());
        assert!(check_fill_pattern("t", &[], 0, 0).is_err());
        assert!(check_fill_pattern("t", &[0; 4], 2, 16).is_err());
    }
}
