// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// 2.0 shared virtual memory. SVM allocations are raw pointers owned by the
// caller, not handles, so the ledger does not track them.

use std::ffi::c_void;
use std::ptr::NonNull;

use oclink_core::error::{OclinkError, Result};
use oclink_core::status::StatusCode;
use oclink_core::types::{MapFlags, MemFlags};
use oclink_native::EntryPoint;
use tracing::{debug, instrument};

use super::{ComputeFacade, invalid_argument};
use crate::handle::{ContextHandle, EventHandle, QueueHandle};

impl ComputeFacade {
    /// Allocate `size` bytes shared between host and devices of `context`.
    /// `alignment` of zero picks the driver default.
    #[instrument(skip(self), fields(context = %context))]
    pub fn svm_alloc(
        &self,
        context: ContextHandle,
        flags: MemFlags,
        size: usize,
        alignment: u32,
    ) -> Result<NonNull<c_void>> {
        let entry = EntryPoint::SvmAlloc;
        if alignment != 0 && !alignment.is_power_of_two() {
            return Err(invalid_argument(entry.symbol(), "alignment must be a power of two"));
        }
        let ctx = self.live(context, entry.symbol())?;
        let view = self.view()?;
        let ptr = view.entry(entry)?.svm_alloc(ctx, flags, size, alignment);
        let ptr = NonNull::new(ptr).ok_or_else(|| OclinkError::NativeCall {
            op: entry.symbol(),
            status: StatusCode::MemObjectAllocationFailure,
            code: StatusCode::MemObjectAllocationFailure.code(),
        })?;
        debug!(size, "svm allocated");
        Ok(ptr)
    }

    /// Free an SVM allocation immediately.
    ///
    /// # Safety
    /// `ptr` must come from [`ComputeFacade::svm_alloc`] on `context`, must
    /// not be freed twice, and no queued command may still use it.
    pub unsafe fn svm_free(&self, context: ContextHandle, ptr: NonNull<c_void>) -> Result<()> {
        let entry = EntryPoint::SvmFree;
        let ctx = self.live(context, entry.symbol())?;
        let view = self.view()?;
        // SAFETY: forwarded caller contract.
        unsafe { view.entry(entry)?.svm_free(ctx, ptr.as_ptr()) };
        Ok(())
    }

    /// Free SVM allocations once `wait` completes.
    ///
    /// # Safety
    /// As for [`ComputeFacade::svm_free`], for every pointer.
    pub unsafe fn enqueue_svm_free(
        &self,
        queue: QueueHandle,
        pointers: &[NonNull<c_void>],
        wait: &[EventHandle],
    ) -> Result<EventHandle> {
        let entry = EntryPoint::EnqueueSvmFree;
        if pointers.is_empty() {
            return Err(invalid_argument(entry.symbol(), "no pointers to free"));
        }
        let mut raw: Vec<*mut c_void> = pointers.iter().map(|p| p.as_ptr()).collect();
        self.enqueue_evented(entry, queue, wait, |api, q, wl, ev| {
            // SAFETY: forwarded caller contract.
            unsafe { api.enqueue_svm_free(q, &mut raw, wl, Some(ev)) }
        })
    }

    /// Copy `size` bytes between SVM (or host) ranges.
    ///
    /// # Safety
    /// Both ranges must be valid for `size` bytes and must not overlap. A
    /// non-blocking copy keeps them in use until the returned event is
    /// terminal.
    pub unsafe fn enqueue_svm_memcpy(
        &self,
        queue: QueueHandle,
        blocking: bool,
        dst: *mut c_void,
        src: *const c_void,
        size: usize,
        wait: &[EventHandle],
    ) -> Result<EventHandle> {
        let entry = EntryPoint::EnqueueSvmMemcpy;
        if size == 0 || dst.is_null() || src.is_null() {
            return Err(invalid_argument(entry.symbol(), "null pointer or empty copy"));
        }
        self.enqueue_evented(entry, queue, wait, |api, q, wl, ev| {
            // SAFETY: forwarded caller contract.
            unsafe { api.enqueue_svm_memcpy(q, blocking, dst, src, size, wl, Some(ev)) }
        })
    }

    /// Fill `size` bytes at `ptr` with a repeated pattern.
    ///
    /// # Safety
    /// `ptr..ptr+size` must lie inside one SVM allocation.
    pub unsafe fn enqueue_svm_mem_fill(
        &self,
        queue: QueueHandle,
        ptr: NonNull<c_void>,
        pattern: &[u8],
        size: usize,
        wait: &[EventHandle],
    ) -> Result<EventHandle> {
        let entry = EntryPoint::EnqueueSvmMemFill;
        if pattern.is_empty() || !pattern.len().is_power_of_two() || size % pattern.len() != 0 {
            return Err(invalid_argument(entry.symbol(), "pattern must be a power of two that divides size"));
        }
        self.enqueue_evented(entry, queue, wait, |api, q, wl, ev| {
            // SAFETY: forwarded caller contract.
            unsafe { api.enqueue_svm_mem_fill(q, ptr.as_ptr(), pattern, size, wl, Some(ev)) }
        })
    }

    /// Make a coarse-grained SVM range accessible to the host.
    ///
    /// # Safety
    /// `ptr..ptr+size` must lie inside one SVM allocation.
    pub unsafe fn enqueue_svm_map(
        &self,
        queue: QueueHandle,
        blocking: bool,
        flags: MapFlags,
        ptr: NonNull<c_void>,
        size: usize,
        wait: &[EventHandle],
    ) -> Result<EventHandle> {
        let entry = EntryPoint::EnqueueSvmMap;
        self.enqueue_evented(entry, queue, wait, |api, q, wl, ev| {
            // SAFETY: forwarded caller contract.
            unsafe { api.enqueue_svm_map(q, blocking, flags, ptr.as_ptr(), size, wl, Some(ev)) }
        })
    }

    /// # Safety
    /// `ptr` must have been mapped with [`ComputeFacade::enqueue_svm_map`].
    pub unsafe fn enqueue_svm_unmap(
        &self,
        queue: QueueHandle,
        ptr: NonNull<c_void>,
        wait: &[EventHandle],
    ) -> Result<EventHandle> {
        let entry = EntryPoint::EnqueueSvmUnmap;
        self.enqueue_evented(entry, queue, wait, |api, q, wl, ev| {
            // SAFETY: forwarded caller contract.
            unsafe { api.enqueue_svm_unmap(q, ptr.as_ptr(), wl, Some(ev)) }
        })
    }
}
