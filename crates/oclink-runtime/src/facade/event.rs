// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Events: user events, status callbacks, waiting and profiling.

use oclink_core::error::Result;
use oclink_core::info;
use oclink_core::status::check;
use oclink_core::types::ExecutionStatus;
use oclink_native::EntryPoint;
use oclink_native::api::InfoTarget;
use tracing::{debug, instrument};

use super::{ComputeFacade, invalid_argument};
use crate::callback::{EventCallback, HostCallback, RegistrationId, UserToken, event_trampoline};
use crate::handle::{ContextHandle, EventHandle};

/// Device timestamps of a profiled command, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfilingInfo {
    pub queued: u64,
    pub submit: u64,
    pub start: u64,
    pub end: u64,
}

impl ProfilingInfo {
    /// Time spent executing.
    pub fn duration(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

impl ComputeFacade {
    /// 1.1 event the host completes explicitly. Starts `Submitted`.
    pub fn create_user_event(&self, context: ContextHandle) -> Result<EventHandle> {
        let entry = EntryPoint::CreateUserEvent;
        let ctx = self.live(context, entry.symbol())?;
        let view = self.view()?;
        let mut errcode = 0;
        let raw = view.entry(entry)?.create_user_event(ctx, &mut errcode);
        self.adopt(entry, raw, errcode, Some(ctx))
    }

    /// Complete a user event, or fail it with a negative code so commands
    /// waiting on it are abandoned. Can be done once.
    #[instrument(skip(self), fields(event = %event))]
    pub fn set_user_event_status(&self, event: EventHandle, status: ExecutionStatus) -> Result<()> {
        let entry = EntryPoint::SetUserEventStatus;
        match status {
            ExecutionStatus::Complete => {}
            ExecutionStatus::Error(code) if code < 0 => {}
            other => {
                return Err(invalid_argument(
                    entry.symbol(),
                    format!("user events can only be completed or failed, not set to {other:?}"),
                ));
            }
        }
        let ev = self.live(event, entry.symbol())?;
        let view = self.view()?;
        check(view.entry(entry)?.set_user_event_status(ev, status.to_raw()), entry.symbol())
    }

    /// Run `callback` once `event` reaches `trigger` (`Submitted`,
    /// `Running` or `Complete`), or fails. It fires exactly once, on any
    /// thread, even if the host has released the event by then. If the
    /// event is already past `trigger` it may fire before this returns.
    #[instrument(skip(self, callback), fields(event = %event))]
    pub fn set_event_callback(
        &self,
        event: EventHandle,
        trigger: ExecutionStatus,
        callback: EventCallback,
        token: UserToken,
    ) -> Result<RegistrationId> {
        let entry = EntryPoint::SetEventCallback;
        if !matches!(
            trigger,
            ExecutionStatus::Submitted | ExecutionStatus::Running | ExecutionStatus::Complete
        ) {
            return Err(invalid_argument(
                entry.symbol(),
                format!("{trigger:?} is not a callback trigger"),
            ));
        }
        let ev = self.live(event, entry.symbol())?;
        let view = self.view()?;
        let api = view.entry(entry)?;
        let id = self.bridge.register(ev, HostCallback::EventStatus(callback), token);
        let status = api.set_event_callback(ev, trigger.to_raw(), event_trampoline, id.as_user_data());
        if let Err(err) = check(status, entry.symbol()) {
            self.bridge.cancel(id);
            return Err(err);
        }
        debug!(%id, ?trigger, "event callback set");
        Ok(id)
    }

    /// Block until every event is terminal.
    #[instrument(skip(self, events), fields(events = events.len()))]
    pub fn wait_for_events(&self, events: &[EventHandle]) -> Result<()> {
        let entry = EntryPoint::WaitForEvents;
        if events.is_empty() {
            return Err(invalid_argument(entry.symbol(), "nothing to wait for"));
        }
        let raw = self.live_list(events, entry.symbol())?;
        let view = self.view()?;
        check(view.entry(entry)?.wait_for_events(&raw), entry.symbol())
    }

    pub fn event_status(&self, event: EventHandle) -> Result<ExecutionStatus> {
        self.query_i32(InfoTarget::Event(event.raw()), info::event::COMMAND_EXECUTION_STATUS)
            .map(ExecutionStatus::from_raw)
    }

    /// Timestamps of a completed command on a profiling-enabled queue.
    pub fn profiling_info(&self, event: EventHandle) -> Result<ProfilingInfo> {
        let target = InfoTarget::EventProfiling(event.raw());
        Ok(ProfilingInfo {
            queued: self.query_u64(target, info::profiling::QUEUED)?,
            submit: self.query_u64(target, info::profiling::SUBMIT)?,
            start: self.query_u64(target, info::profiling::START)?,
            end: self.query_u64(target, info::profiling::END)?,
        })
    }
}
