// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The facade: every operation resolves its entry point through the
// capability registry, calls the native table, translates the status, and
// keeps the handle ledger and callback bridge in step.
//
// Operations are grouped by resource in the submodules; this module holds
// the shared plumbing, reference counting, and info queries.

mod context;
mod discovery;
mod enqueue;
mod event;
mod memory;
mod program;
mod svm;

pub use discovery::Partition;
pub use enqueue::MappedRegion;
pub use event::ProfilingInfo;
pub use program::build_status;

use std::sync::Arc;

use oclink_core::error::{OclinkError, Result};
use oclink_core::status::{ClInt, check};
use oclink_core::types::{HandleKind, RawHandle};
use oclink_native::api::{InfoTarget, release_entry, retain_entry};
use oclink_native::EntryPoint;
use tracing::{debug, instrument};

use crate::callback::CallbackBridge;
use crate::handle::{Handle, Kind, raw_list};
use crate::ledger::{HandleLedger, Lifecycle, ReleaseOutcome};
use crate::query;
use crate::registry::{CapabilityRegistry, TierView};

/// Host-side entry point to the native compute API.
///
/// `Send + Sync`; every call is synchronous on the calling thread.
pub struct ComputeFacade {
    registry: Arc<CapabilityRegistry>,
    ledger: HandleLedger,
    bridge: &'static CallbackBridge,
}

impl ComputeFacade {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            registry,
            ledger: HandleLedger::new(),
            bridge: CallbackBridge::global(),
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &HandleLedger {
        &self.ledger
    }

    pub fn bridge(&self) -> &'static CallbackBridge {
        self.bridge
    }

    fn view(&self) -> Result<TierView> {
        self.registry.current()
    }

    /// Fail unless `handle` is usable by `op`.
    fn live<K: Kind>(&self, handle: Handle<K>, op: &'static str) -> Result<RawHandle> {
        self.ledger.check_live(K::KIND, handle.raw(), op)?;
        Ok(handle.raw())
    }

    fn live_list<K: Kind>(&self, handles: &[Handle<K>], op: &'static str) -> Result<Vec<RawHandle>> {
        for h in handles {
            self.live(*h, op)?;
        }
        Ok(raw_list(handles))
    }

    /// Translate a create call's result and start tracking the new handle.
    fn adopt<K: Kind>(
        &self,
        entry: EntryPoint,
        raw: RawHandle,
        errcode: ClInt,
        parent: Option<RawHandle>,
    ) -> Result<Handle<K>> {
        let op = entry.symbol();
        check(errcode, op)?;
        let handle = Handle::<K>::new(raw, op)?;
        self.ledger.record(K::KIND, raw, parent, op)?;
        debug!(op, handle = %handle, "created");
        Ok(handle)
    }

    /// Adopt an event handed back by an enqueue call.
    fn adopt_event(&self, entry: EntryPoint, status: ClInt, raw: RawHandle) -> Result<crate::handle::EventHandle> {
        self.adopt(entry, raw, status, None)
    }

    /// Take an extra host reference.
    #[instrument(skip(self), fields(handle = %handle))]
    pub fn retain<K: Kind>(&self, handle: Handle<K>) -> Result<()> {
        let op = retain_entry(K::KIND).map_or("retain", EntryPoint::symbol);
        if !self.ledger.begin_retain(K::KIND, handle.raw(), op)? {
            return Ok(());
        }
        let Some(entry) = retain_entry(K::KIND) else {
            return Ok(());
        };
        let view = self.view()?;
        check(view.entry(entry)?.retain(K::KIND, handle.raw()), op)?;
        self.ledger.finish_retain(handle.raw());
        Ok(())
    }

    /// Give up one host reference.
    ///
    /// Releasing a null, unknown, or already released handle fails with
    /// `InvalidHandle` without reaching the driver. Callbacks registered on
    /// a context or program stay reachable while the driver keeps the object
    /// alive through its children, and are unregistered once it is reclaimed.
    #[instrument(skip(self), fields(handle = %handle))]
    pub fn release<K: Kind>(&self, handle: Handle<K>) -> Result<ReleaseOutcome> {
        let raw = handle.raw();
        let op = release_entry(K::KIND).map_or("release", EntryPoint::symbol);
        let Some(pending) = self.ledger.begin_release(K::KIND, raw, op)? else {
            return Ok(ReleaseOutcome::Untracked);
        };
        let Some(entry) = release_entry(K::KIND) else {
            return Ok(self.ledger.commit(pending));
        };
        let status = self
            .view()
            .and_then(|view| check(view.entry(entry)?.release(K::KIND, raw), op));
        match status {
            Ok(()) => {
                let (outcome, reclaimed) = self.ledger.settle(pending);
                for gone in reclaimed {
                    if matches!(gone.kind, HandleKind::Context | HandleKind::Program) {
                        let purged = self.bridge.purge(gone.raw);
                        debug!(handle = %gone.raw, purged, "callbacks unregistered");
                    }
                }
                debug!(%raw, ?outcome, "released");
                Ok(outcome)
            }
            Err(err) => {
                self.ledger.abort(pending);
                Err(err)
            }
        }
    }

    /// Host-side lifecycle of a handle, if it was created here.
    pub fn lifecycle<K: Kind>(&self, handle: Handle<K>) -> Option<Lifecycle> {
        self.ledger.lifecycle(handle.raw())
    }

    /// Whether the host released `handle` and nothing derived from it is
    /// still alive.
    pub fn is_reclaimable<K: Kind>(&self, handle: Handle<K>) -> bool {
        self.ledger.is_reclaimable(handle.raw())
    }

    /// Raw bytes of an info query, fetched with the two-call protocol.
    pub fn query(&self, target: InfoTarget, param: u32) -> Result<Vec<u8>> {
        let (kind, subject) = target.subject();
        let op = target.entry().symbol();
        self.ledger.check_live(kind, subject, op)?;
        let view = self.view()?;
        query::fetch(view.entry(target.entry())?, target, param)
    }

    pub fn query_string(&self, target: InfoTarget, param: u32) -> Result<String> {
        query::decode_string(target.entry().symbol(), param, self.query(target, param)?)
    }

    pub fn query_u32(&self, target: InfoTarget, param: u32) -> Result<u32> {
        query::decode_u32(target.entry().symbol(), param, &self.query(target, param)?)
    }

    pub fn query_i32(&self, target: InfoTarget, param: u32) -> Result<i32> {
        query::decode_i32(target.entry().symbol(), param, &self.query(target, param)?)
    }

    pub fn query_u64(&self, target: InfoTarget, param: u32) -> Result<u64> {
        query::decode_u64(target.entry().symbol(), param, &self.query(target, param)?)
    }

    pub fn query_usize(&self, target: InfoTarget, param: u32) -> Result<usize> {
        query::decode_usize(target.entry().symbol(), param, &self.query(target, param)?)
    }

    pub fn query_usizes(&self, target: InfoTarget, param: u32) -> Result<Vec<usize>> {
        query::decode_usizes(target.entry().symbol(), param, &self.query(target, param)?)
    }

    pub fn query_handles(&self, target: InfoTarget, param: u32) -> Result<Vec<RawHandle>> {
        query::decode_handles(target.entry().symbol(), param, &self.query(target, param)?)
    }
}

fn invalid_argument(op: &'static str, reason: impl Into<String>) -> OclinkError {
    OclinkError::InvalidArgument {
        op,
        reason: reason.into(),
    }
}
