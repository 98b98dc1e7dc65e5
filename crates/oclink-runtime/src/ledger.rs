// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host-side bookkeeping for native reference counts.
//
// The driver owns the real counts. The ledger mirrors the references the
// host holds so that double releases and use-after-release are caught
// before they reach the driver, and so that a parent kept alive only by its
// children is not mistaken for reclaimed memory.
//
// Platforms and root devices are not reference counted and never enter the
// ledger. Released handles stay as tombstones so a stale handle is still
// recognised; only the most recent `tombstone_capacity` are kept, and a
// handle whose tombstone was evicted looks untracked again.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use oclink_core::error::{OclinkError, Result};
use oclink_core::types::{HandleKind, RawHandle};
use tracing::{debug, warn};

/// Where a handle is in its host-side life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Held by the host with this many references.
    Live(u32),
    /// Released by the host, kept alive natively by outstanding children.
    Detached { children: usize },
    /// Released by the host with nothing depending on it.
    Released,
}

/// Result of a successful release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Platform or root device: nothing to release.
    Untracked,
    /// The host still holds this many references.
    Alive(u32),
    Detached { children: usize },
    Released,
}

impl ReleaseOutcome {
    /// Whether the host gave up its last reference.
    pub fn is_final(self) -> bool {
        matches!(self, Self::Detached { .. } | Self::Released)
    }
}

#[derive(Debug)]
struct Entry {
    kind: HandleKind,
    parent: Option<RawHandle>,
    children: usize,
    state: Lifecycle,
}

/// A host reference taken off the ledger ahead of the native release call.
/// Hand it back through [`HandleLedger::commit`] or [`HandleLedger::abort`].
#[must_use]
#[derive(Debug)]
pub struct PendingRelease {
    raw: RawHandle,
    previous: Lifecycle,
}

/// Tombstones kept by [`HandleLedger::new`].
pub const DEFAULT_TOMBSTONE_CAPACITY: usize = 4096;

/// A handle that reached `Released` while settling a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reclaimed {
    pub kind: HandleKind,
    pub raw: RawHandle,
}

#[derive(Debug, Default)]
struct Book {
    entries: HashMap<RawHandle, Entry>,
    /// Released handles, oldest first.
    tombstones: VecDeque<RawHandle>,
}

impl Book {
    fn get(&self, raw: &RawHandle) -> Option<&Entry> {
        self.entries.get(raw)
    }

    fn get_mut(&mut self, raw: &RawHandle) -> Option<&mut Entry> {
        self.entries.get_mut(raw)
    }

    fn bury(&mut self, raw: RawHandle, capacity: usize) {
        self.tombstones.push_back(raw);
        while self.tombstones.len() > capacity {
            let Some(oldest) = self.tombstones.pop_front() else {
                break;
            };
            // a reissued value is live again and keeps its entry
            if self.entries.get(&oldest).is_some_and(|e| e.state == Lifecycle::Released) {
                self.entries.remove(&oldest);
            }
        }
    }
}

#[derive(Debug)]
pub struct HandleLedger {
    book: Mutex<Book>,
    tombstone_capacity: usize,
}

impl Default for HandleLedger {
    fn default() -> Self {
        Self::with_tombstone_capacity(DEFAULT_TOMBSTONE_CAPACITY)
    }
}

impl HandleLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tombstone_capacity(capacity: usize) -> Self {
        Self {
            book: Mutex::new(Book::default()),
            tombstone_capacity: capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Book> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a freshly created handle with one host reference. `parent` is
    /// the object it keeps alive natively, if that object is tracked.
    pub fn record(
        &self,
        kind: HandleKind,
        raw: RawHandle,
        parent: Option<RawHandle>,
        op: &'static str,
    ) -> Result<()> {
        if raw.is_null() {
            return Err(OclinkError::invalid_handle(kind, raw, op, "driver returned a null handle"));
        }
        let mut book = self.lock();
        let parent = parent.filter(|p| matches!(book.get(p).map(|e| e.state), Some(Lifecycle::Live(_))));
        if let Some(old) = book.get(&raw) {
            if old.state == Lifecycle::Released {
                debug!(%raw, %kind, "driver reissued a released handle value");
                book.tombstones.retain(|t| *t != raw);
            } else {
                warn!(%raw, %kind, state = ?old.state, "driver reissued a handle the host still tracks");
            }
        }
        if let Some(p) = parent.and_then(|p| book.get_mut(&p)) {
            p.children += 1;
        }
        book.entries.insert(
            raw,
            Entry {
                kind,
                parent,
                children: 0,
                state: Lifecycle::Live(1),
            },
        );
        Ok(())
    }

    /// Reject null, released, and wrongly-kinded handles. Handles the
    /// ledger has never seen pass: they came from queries or are untracked.
    pub fn check_live(&self, kind: HandleKind, raw: RawHandle, op: &'static str) -> Result<()> {
        if raw.is_null() {
            return Err(OclinkError::invalid_handle(kind, raw, op, "null handle"));
        }
        match self.lock().get(&raw) {
            None => Ok(()),
            Some(entry) if entry.kind != kind => {
                Err(OclinkError::invalid_handle(kind, raw, op, "handle is of a different kind"))
            }
            Some(Entry {
                state: Lifecycle::Live(_),
                ..
            }) => Ok(()),
            Some(_) => Err(OclinkError::invalid_handle(kind, raw, op, "use after release")),
        }
    }

    /// Whether the ledger tracks `raw` and the host still holds it.
    pub fn is_tracked(&self, raw: RawHandle) -> bool {
        matches!(
            self.lock().get(&raw).map(|e| e.state),
            Some(Lifecycle::Live(_))
        )
    }

    /// Validate a retain. `Ok(false)` means the handle is untracked and the
    /// retain is a no-op.
    pub fn begin_retain(&self, kind: HandleKind, raw: RawHandle, op: &'static str) -> Result<bool> {
        self.lookup_for_refcount(kind, raw, op).map(|entry| entry.is_some())
    }

    /// Count a retain the driver accepted.
    pub fn finish_retain(&self, raw: RawHandle) {
        if let Some(Entry {
            state: Lifecycle::Live(n),
            ..
        }) = self.lock().get_mut(&raw)
        {
            *n += 1;
        }
    }

    fn lookup_for_refcount(
        &self,
        kind: HandleKind,
        raw: RawHandle,
        op: &'static str,
    ) -> Result<Option<Lifecycle>> {
        if raw.is_null() {
            return Err(OclinkError::invalid_handle(kind, raw, op, "null handle"));
        }
        if kind == HandleKind::Platform {
            return Ok(None);
        }
        match self.lock().get(&raw) {
            None if kind == HandleKind::Device => Ok(None),
            None => Err(OclinkError::invalid_handle(kind, raw, op, "handle is not tracked")),
            Some(entry) if entry.kind != kind => {
                Err(OclinkError::invalid_handle(kind, raw, op, "handle is of a different kind"))
            }
            Some(Entry {
                state: Lifecycle::Live(n),
                ..
            }) => Ok(Some(Lifecycle::Live(*n))),
            Some(_) => Err(OclinkError::invalid_handle(kind, raw, op, "handle already released")),
        }
    }

    /// Take one host reference off `raw` before the native release.
    /// `Ok(None)` means the handle is untracked and nothing should be
    /// released natively.
    pub fn begin_release(
        &self,
        kind: HandleKind,
        raw: RawHandle,
        op: &'static str,
    ) -> Result<Option<PendingRelease>> {
        if self.lookup_for_refcount(kind, raw, op)?.is_none() {
            return Ok(None);
        }
        let mut book = self.lock();
        let Some(entry) = book.get_mut(&raw) else {
            return Err(OclinkError::invalid_handle(kind, raw, op, "handle is not tracked"));
        };
        let previous = entry.state;
        entry.state = match previous {
            Lifecycle::Live(n) if n > 1 => Lifecycle::Live(n - 1),
            Lifecycle::Live(_) if entry.children > 0 => Lifecycle::Detached {
                children: entry.children,
            },
            Lifecycle::Live(_) => Lifecycle::Released,
            // lost a race with another release of the last reference
            _ => return Err(OclinkError::invalid_handle(kind, raw, op, "handle already released")),
        };
        Ok(Some(PendingRelease { raw, previous }))
    }

    /// The driver released the handle: settle the parent chain.
    pub fn commit(&self, pending: PendingRelease) -> ReleaseOutcome {
        self.settle(pending).0
    }

    /// As [`HandleLedger::commit`], also listing every handle that became
    /// `Released`: the handle itself and any detached ancestors whose last
    /// child it was.
    pub fn settle(&self, pending: PendingRelease) -> (ReleaseOutcome, Vec<Reclaimed>) {
        let mut book = self.lock();
        let Some(entry) = book.get(&pending.raw) else {
            return (ReleaseOutcome::Released, Vec::new());
        };
        match entry.state {
            Lifecycle::Live(n) => (ReleaseOutcome::Alive(n), Vec::new()),
            Lifecycle::Detached { children } => (ReleaseOutcome::Detached { children }, Vec::new()),
            Lifecycle::Released => {
                let mut reclaimed = vec![Reclaimed {
                    kind: entry.kind,
                    raw: pending.raw,
                }];
                let parent = entry.parent;
                Self::child_gone(&mut book, parent, &mut reclaimed);
                for gone in &reclaimed {
                    book.bury(gone.raw, self.tombstone_capacity);
                }
                (ReleaseOutcome::Released, reclaimed)
            }
        }
    }

    /// The driver refused the release: put the reference back.
    pub fn abort(&self, pending: PendingRelease) {
        if let Some(entry) = self.lock().get_mut(&pending.raw) {
            entry.state = pending.previous;
        }
    }

    /// Walk up from a fully released child, releasing detached ancestors
    /// whose last child just went.
    fn child_gone(book: &mut Book, mut parent: Option<RawHandle>, reclaimed: &mut Vec<Reclaimed>) {
        while let Some(p) = parent.take() {
            let Some(entry) = book.get_mut(&p) else {
                break;
            };
            entry.children = entry.children.saturating_sub(1);
            match entry.state {
                Lifecycle::Detached { .. } if entry.children == 0 => {
                    debug!(handle = %p, "detached parent lost its last child");
                    entry.state = Lifecycle::Released;
                    reclaimed.push(Reclaimed { kind: entry.kind, raw: p });
                    parent = entry.parent;
                }
                Lifecycle::Detached { .. } => {
                    entry.state = Lifecycle::Detached {
                        children: entry.children,
                    };
                }
                _ => {}
            }
        }
    }

    pub fn lifecycle(&self, raw: RawHandle) -> Option<Lifecycle> {
        self.lock().get(&raw).map(|e| e.state)
    }

    pub fn host_refcount(&self, raw: RawHandle) -> Option<u32> {
        match self.lifecycle(raw)? {
            Lifecycle::Live(n) => Some(n),
            _ => Some(0),
        }
    }

    /// True only once the host has released `raw` and nothing it created
    /// from `raw` is still alive.
    pub fn is_reclaimable(&self, raw: RawHandle) -> bool {
        self.lifecycle(raw) == Some(Lifecycle::Released)
    }

    /// Number of handles the host still holds.
    pub fn live_count(&self) -> usize {
        self.lock()
            .entries
            .values()
            .filter(|e| matches!(e.state, Lifecycle::Live(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUF: RawHandle = RawHandle(0x100);
    const SUB: RawHandle = RawHandle(0x110);

    fn release(ledger: &HandleLedger, raw: RawHandle) -> Result<ReleaseOutcome> {
        let pending = ledger
            .begin_release(HandleKind::Memory, raw, "clReleaseMemObject")?
            .expect("tracked");
        Ok(ledger.commit(pending))
    }

    #[test]
    fn retain_then_two_releases_then_invalid() {
        let ledger = HandleLedger::new();
        ledger.record(HandleKind::Memory, BUF, None, "clCreateBuffer").expect("record");
        assert!(ledger.begin_retain(HandleKind::Memory, BUF, "clRetainMemObject").expect("live"));
        ledger.finish_retain(BUF);
        assert_eq!(ledger.host_refcount(BUF), Some(2));
        assert_eq!(release(&ledger, BUF).expect("first"), ReleaseOutcome::Alive(1));
        assert_eq!(release(&ledger, BUF).expect("second"), ReleaseOutcome::Released);
        let err = release(&ledger, BUF).unwrap_err();
        assert!(matches!(err, OclinkError::InvalidHandle { .. }));
    }

    #[test]
    fn parent_detaches_until_child_goes() {
        let ledger = HandleLedger::new();
        ledger.record(HandleKind::Memory, BUF, None, "clCreateBuffer").expect("parent");
        ledger.record(HandleKind::Memory, SUB, Some(BUF), "clCreateSubBuffer").expect("child");
        assert_eq!(release(&ledger, BUF).expect("parent"), ReleaseOutcome::Detached { children: 1 });
        assert!(!ledger.is_reclaimable(BUF));
        assert!(ledger.check_live(HandleKind::Memory, BUF, "use").is_err());
        assert_eq!(release(&ledger, SUB).expect("child"), ReleaseOutcome::Released);
        assert!(ledger.is_reclaimable(BUF));
    }

    #[test]
    fn abort_restores_the_reference() {
        let ledger = HandleLedger::new();
        ledger.record(HandleKind::Memory, BUF, None, "clCreateBuffer").expect("record");
        let pending = ledger
            .begin_release(HandleKind::Memory, BUF, "clReleaseMemObject")
            .expect("live")
            .expect("tracked");
        assert_eq!(ledger.lifecycle(BUF), Some(Lifecycle::Released));
        ledger.abort(pending);
        assert_eq!(ledger.lifecycle(BUF), Some(Lifecycle::Live(1)));
    }

    #[test]
    fn tombstone_is_replaced_by_reissue() {
        let ledger = HandleLedger::new();
        ledger.record(HandleKind::Event, BUF, None, "clCreateUserEvent").expect("first");
        let pending = ledger
            .begin_release(HandleKind::Event, BUF, "clReleaseEvent")
            .expect("live")
            .expect("tracked");
        ledger.commit(pending);
        ledger.record(HandleKind::Event, BUF, None, "clCreateUserEvent").expect("reissue");
        assert_eq!(ledger.lifecycle(BUF), Some(Lifecycle::Live(1)));
    }

    #[test]
    fn settle_reports_detached_ancestors_reclaimed_by_the_last_child() {
        let ctx = RawHandle(0x10);
        let ledger = HandleLedger::new();
        ledger.record(HandleKind::Context, ctx, None, "clCreateContext").expect("context");
        ledger.record(HandleKind::Memory, BUF, Some(ctx), "clCreateBuffer").expect("buffer");
        ledger.record(HandleKind::Memory, SUB, Some(BUF), "clCreateSubBuffer").expect("sub");

        let pending = ledger
            .begin_release(HandleKind::Context, ctx, "clReleaseContext")
            .expect("live")
            .expect("tracked");
        let (outcome, reclaimed) = ledger.settle(pending);
        assert_eq!(outcome, ReleaseOutcome::Detached { children: 1 });
        assert!(reclaimed.is_empty());

        assert_eq!(release(&ledger, BUF).expect("buffer"), ReleaseOutcome::Detached { children: 1 });
        let pending = ledger
            .begin_release(HandleKind::Memory, SUB, "clReleaseMemObject")
            .expect("live")
            .expect("tracked");
        let (outcome, reclaimed) = ledger.settle(pending);
        assert_eq!(outcome, ReleaseOutcome::Released);
        assert_eq!(
            reclaimed,
            vec![
                Reclaimed { kind: HandleKind::Memory, raw: SUB },
                Reclaimed { kind: HandleKind::Memory, raw: BUF },
                Reclaimed { kind: HandleKind::Context, raw: ctx },
            ]
        );
        assert!(ledger.is_reclaimable(ctx));
    }

    #[test]
    fn oldest_tombstones_are_forgotten_past_capacity() {
        let ledger = HandleLedger::with_tombstone_capacity(2);
        let handles = [RawHandle(0x100), RawHandle(0x200), RawHandle(0x300)];
        for raw in handles {
            ledger.record(HandleKind::Memory, raw, None, "clCreateBuffer").expect("record");
        }
        for raw in handles {
            assert_eq!(release(&ledger, raw).expect("release"), ReleaseOutcome::Released);
        }
        assert_eq!(ledger.lifecycle(handles[0]), None);
        assert_eq!(ledger.lifecycle(handles[1]), Some(Lifecycle::Released));
        assert_eq!(ledger.lifecycle(handles[2]), Some(Lifecycle::Released));
        assert!(ledger.check_live(HandleKind::Memory, handles[2], "use").is_err());

        // a reissued value is not evicted by its stale tombstone
        ledger.record(HandleKind::Memory, handles[1], None, "clCreateBuffer").expect("reissue");
        ledger.record(HandleKind::Memory, RawHandle(0x400), None, "clCreateBuffer").expect("record");
        release(&ledger, RawHandle(0x400)).expect("release");
        ledger.record(HandleKind::Memory, RawHandle(0x500), None, "clCreateBuffer").expect("record");
        release(&ledger, RawHandle(0x500)).expect("release");
        assert_eq!(ledger.lifecycle(handles[1]), Some(Lifecycle::Live(1)));
        assert_eq!(ledger.lifecycle(handles[2]), None);
    }

    #[test]
    fn platforms_and_root_devices_are_untracked() {
        let ledger = HandleLedger::new();
        let device = RawHandle(0x20);
        assert!(!ledger.begin_retain(HandleKind::Device, device, "clRetainDevice").expect("no-op"));
        assert!(ledger.begin_release(HandleKind::Platform, device, "release").expect("no-op").is_none());
        let err = ledger.begin_release(HandleKind::Context, device, "clReleaseContext").unwrap_err();
        assert!(matches!(err, OclinkError::InvalidHandle { .. }));
    }

    #[test]
    fn null_and_wrong_kind_are_rejected() {
        let ledger = HandleLedger::new();
        assert!(ledger.check_live(HandleKind::Kernel, RawHandle::NULL, "use").is_err());
        ledger.record(HandleKind::Kernel, BUF, None, "clCreateKernel").expect("record");
        assert!(ledger.check_live(HandleKind::Program, BUF, "use").is_err());
        assert!(ledger.record(HandleKind::Kernel, RawHandle::NULL, None, "clCreateKernel").is_err());
    }
}
