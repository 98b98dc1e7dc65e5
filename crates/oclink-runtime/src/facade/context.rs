// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contexts and command queues.

use oclink_core::error::Result;
use oclink_core::status::{ClInt, check};
use oclink_core::types::{CL_QUEUE_PROPERTIES, DeviceType, QueueProperties, RawHandle};
use oclink_native::EntryPoint;
use oclink_native::api::{ContextNotifyFn, UserData};
use tracing::{info, instrument};

use super::{ComputeFacade, invalid_argument};
use crate::callback::{ContextErrorCallback, HostCallback, RegistrationId, UserToken, context_error_trampoline};
use crate::handle::{ContextHandle, DeviceHandle, QueueHandle};

const CL_QUEUE_SIZE: u64 = 0x1094;

impl ComputeFacade {
    /// Reserve a bridge slot for an optional error callback. The driver
    /// gets the trampoline and the id only when there is a callback.
    fn reserve_context_callback(
        &self,
        callback: Option<ContextErrorCallback>,
        token: UserToken,
    ) -> (Option<RegistrationId>, Option<ContextNotifyFn>, UserData) {
        match callback {
            Some(cb) => {
                let id = self.bridge.reserve(HostCallback::ContextError(cb), token);
                (Some(id), Some(context_error_trampoline as ContextNotifyFn), id.as_user_data())
            }
            None => (None, None, std::ptr::null_mut()),
        }
    }

    fn adopt_context(
        &self,
        entry: EntryPoint,
        raw: RawHandle,
        errcode: ClInt,
        id: Option<RegistrationId>,
    ) -> Result<ContextHandle> {
        match self.adopt(entry, raw, errcode, None) {
            Ok(context) => {
                if let Some(id) = id {
                    self.bridge.bind(id, context.raw());
                }
                Ok(context)
            }
            Err(err) => {
                if let Some(id) = id {
                    self.bridge.cancel(id);
                }
                Err(err)
            }
        }
    }

    /// Create a context over `devices`. `on_error` is invoked, from any
    /// thread, for asynchronous errors until the context is released.
    #[instrument(skip(self, devices, on_error), fields(devices = devices.len()))]
    pub fn create_context(
        &self,
        devices: &[DeviceHandle],
        on_error: Option<ContextErrorCallback>,
        token: UserToken,
    ) -> Result<ContextHandle> {
        let entry = EntryPoint::CreateContext;
        if devices.is_empty() {
            return Err(invalid_argument(entry.symbol(), "at least one device is required"));
        }
        let raw_devices = self.live_list(devices, entry.symbol())?;
        let view = self.view()?;
        let api = view.entry(entry)?;
        let (id, notify, user_data) = self.reserve_context_callback(on_error, token);
        let mut errcode = 0;
        let raw = api.create_context(&[], &raw_devices, notify, user_data, &mut errcode);
        let context = self.adopt_context(entry, raw, errcode, id)?;
        info!(context = %context, "context created");
        Ok(context)
    }

    /// Create a context over every device of `device_type` on the default
    /// platform.
    #[instrument(skip(self, on_error))]
    pub fn create_context_from_type(
        &self,
        device_type: DeviceType,
        on_error: Option<ContextErrorCallback>,
        token: UserToken,
    ) -> Result<ContextHandle> {
        let entry = EntryPoint::CreateContextFromType;
        let view = self.view()?;
        let api = view.entry(entry)?;
        let (id, notify, user_data) = self.reserve_context_callback(on_error, token);
        let mut errcode = 0;
        let raw = api.create_context_from_type(&[], device_type, notify, user_data, &mut errcode);
        let context = self.adopt_context(entry, raw, errcode, id)?;
        info!(context = %context, "context created");
        Ok(context)
    }

    /// 1.0 flags form; deprecated from 2.0 but still served.
    #[instrument(skip(self), fields(context = %context, device = %device))]
    pub fn create_command_queue(
        &self,
        context: ContextHandle,
        device: DeviceHandle,
        properties: QueueProperties,
    ) -> Result<QueueHandle> {
        let entry = EntryPoint::CreateCommandQueue;
        let ctx = self.live(context, entry.symbol())?;
        let dev = self.live(device, entry.symbol())?;
        let view = self.view()?;
        let mut errcode = 0;
        let raw = view.entry(entry)?.create_command_queue(ctx, dev, properties, &mut errcode);
        self.adopt(entry, raw, errcode, Some(ctx))
    }

    /// 2.0 properties form. `size` only applies to on-device queues.
    #[instrument(skip(self), fields(context = %context, device = %device))]
    pub fn create_command_queue_with_properties(
        &self,
        context: ContextHandle,
        device: DeviceHandle,
        properties: QueueProperties,
        size: Option<u32>,
    ) -> Result<QueueHandle> {
        let entry = EntryPoint::CreateCommandQueueWithProperties;
        let ctx = self.live(context, entry.symbol())?;
        let dev = self.live(device, entry.symbol())?;
        let mut props = Vec::with_capacity(5);
        if !properties.is_empty() {
            props.extend([CL_QUEUE_PROPERTIES, properties.bits()]);
        }
        if let Some(size) = size {
            props.extend([CL_QUEUE_SIZE, u64::from(size)]);
        }
        if !props.is_empty() {
            props.push(0);
        }
        let view = self.view()?;
        let mut errcode = 0;
        let raw = view
            .entry(entry)?
            .create_command_queue_with_properties(ctx, dev, &props, &mut errcode);
        self.adopt(entry, raw, errcode, Some(ctx))
    }

    /// Toggle queue properties in place. Returns the properties in effect
    /// before the change.
    pub fn set_command_queue_property(
        &self,
        queue: QueueHandle,
        properties: QueueProperties,
        enable: bool,
    ) -> Result<QueueProperties> {
        let entry = EntryPoint::SetCommandQueueProperty;
        let q = self.live(queue, entry.symbol())?;
        let view = self.view()?;
        let mut old = 0u64;
        check(
            view.entry(entry)?.set_command_queue_property(q, properties, enable, &mut old),
            entry.symbol(),
        )?;
        Ok(QueueProperties::from_bits_truncate(old))
    }

    pub fn flush(&self, queue: QueueHandle) -> Result<()> {
        let entry = EntryPoint::Flush;
        let q = self.live(queue, entry.symbol())?;
        check(self.view()?.entry(entry)?.flush(q), entry.symbol())
    }

    /// Block until every command queued on `queue` has completed.
    #[instrument(skip(self), fields(queue = %queue))]
    pub fn finish(&self, queue: QueueHandle) -> Result<()> {
        let entry = EntryPoint::Finish;
        let q = self.live(queue, entry.symbol())?;
        check(self.view()?.entry(entry)?.finish(q), entry.symbol())
    }
}
