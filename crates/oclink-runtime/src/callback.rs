// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Callback bridge between driver threads and host closures.
//
// Registrations live in a process-wide arena keyed by a monotonically
// increasing id. The id, not a pointer, is what the driver carries as
// `user_data`, so a late or duplicated notification can never reach freed
// memory: an id that is no longer registered is logged and dropped.
//
// Callbacks may run on any thread, including driver threads the host did
// not create, and concurrently with the thread that issued the original
// operation. Closures must therefore be `Fn + Send + Sync`.

use std::collections::HashMap;
use std::ffi::{CStr, c_char, c_void};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use oclink_core::error::{OclinkError, Result};
use oclink_core::status::ClInt;
use oclink_core::types::{ExecutionStatus, RawHandle};
use oclink_native::api::UserData;
use tracing::{debug, warn};

/// Arena key; also the `user_data` value handed to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(u64);

impl RegistrationId {
    pub fn get(self) -> u64 {
        self.0
    }

    pub(crate) fn as_user_data(self) -> UserData {
        self.0 as usize as UserData
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Caller-chosen value passed back with every invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UserToken(pub u64);

/// Asynchronous error reported by a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextErrorReport {
    pub message: String,
    /// Implementation-specific diagnostic bytes, often empty.
    pub private_info: Vec<u8>,
}

pub type ContextErrorCallback = Arc<dyn Fn(&ContextErrorReport, UserToken) + Send + Sync>;
pub type BuildCallback = Arc<dyn Fn(RawHandle, UserToken) + Send + Sync>;
pub type EventCallback = Arc<dyn Fn(RawHandle, ExecutionStatus, UserToken) + Send + Sync>;
pub type DestructorCallback = Arc<dyn Fn(RawHandle, UserToken) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    /// Fires any number of times until the context is released.
    ContextError,
    /// Build, compile or link completion. Fires once.
    ProgramBuild,
    /// Event reached the requested status. Fires once.
    EventStatus,
    /// Memory object about to be destroyed. Fires once.
    MemoryDestroyed,
}

impl CallbackKind {
    pub fn is_one_shot(self) -> bool {
        self != Self::ContextError
    }
}

/// A host closure of one of the four shapes.
#[derive(Clone)]
pub enum HostCallback {
    ContextError(ContextErrorCallback),
    ProgramBuild(BuildCallback),
    EventStatus(EventCallback),
    MemoryDestroyed(DestructorCallback),
}

impl HostCallback {
    pub fn kind(&self) -> CallbackKind {
        match self {
            Self::ContextError(_) => CallbackKind::ContextError,
            Self::ProgramBuild(_) => CallbackKind::ProgramBuild,
            Self::EventStatus(_) => CallbackKind::EventStatus,
            Self::MemoryDestroyed(_) => CallbackKind::MemoryDestroyed,
        }
    }
}

/// What the driver reported.
enum Signal<'a> {
    ContextError(&'a ContextErrorReport),
    ProgramBuild(RawHandle),
    EventStatus(RawHandle, ExecutionStatus),
    MemoryDestroyed(RawHandle),
}

impl Signal<'_> {
    fn kind(&self) -> CallbackKind {
        match self {
            Self::ContextError(_) => CallbackKind::ContextError,
            Self::ProgramBuild(_) => CallbackKind::ProgramBuild,
            Self::EventStatus(..) => CallbackKind::EventStatus,
            Self::MemoryDestroyed(_) => CallbackKind::MemoryDestroyed,
        }
    }
}

struct Registration {
    target: RawHandle,
    callback: HostCallback,
    token: UserToken,
}

#[derive(Default)]
struct Arena {
    next: u64,
    slots: HashMap<u64, Registration>,
}

/// Process-wide registration table. See the module docs.
#[derive(Default)]
pub struct CallbackBridge {
    arena: Mutex<Arena>,
    dropped: AtomicUsize,
}

impl CallbackBridge {
    /// The bridge the native trampolines dispatch through.
    pub fn global() -> &'static CallbackBridge {
        static BRIDGE: OnceLock<CallbackBridge> = OnceLock::new();
        BRIDGE.get_or_init(CallbackBridge::default)
    }

    fn lock(&self) -> MutexGuard<'_, Arena> {
        self.arena.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate an id for a callback whose target handle is not known yet
    /// (the native call that creates it has not returned).
    pub fn reserve(&self, callback: HostCallback, token: UserToken) -> RegistrationId {
        self.register(RawHandle::NULL, callback, token)
    }

    /// Register a callback against an existing object.
    pub fn register(&self, target: RawHandle, callback: HostCallback, token: UserToken) -> RegistrationId {
        let mut arena = self.lock();
        arena.next += 1;
        let id = arena.next;
        debug!(id, %target, kind = ?callback.kind(), "callback registered");
        arena.slots.insert(
            id,
            Registration {
                target,
                callback,
                token,
            },
        );
        RegistrationId(id)
    }

    /// Attach a reserved registration to the handle the driver returned.
    pub fn bind(&self, id: RegistrationId, target: RawHandle) {
        if let Some(reg) = self.lock().slots.get_mut(&id.0) {
            reg.target = target;
        }
    }

    /// Drop a registration whose native call failed. Returns whether it
    /// was still registered.
    pub fn cancel(&self, id: RegistrationId) -> bool {
        self.lock().slots.remove(&id.0).is_some()
    }

    /// Drop every registration against `target`. Returns how many.
    pub fn purge(&self, target: RawHandle) -> usize {
        let mut arena = self.lock();
        let before = arena.slots.len();
        arena.slots.retain(|_, reg| reg.target != target);
        let purged = before - arena.slots.len();
        if purged > 0 {
            debug!(%target, purged, "callbacks purged");
        }
        purged
    }

    pub fn is_registered(&self, id: RegistrationId) -> bool {
        self.lock().slots.contains_key(&id.0)
    }

    /// Registrations currently held against `target`.
    pub fn registrations_for(&self, target: RawHandle) -> usize {
        self.lock().slots.values().filter(|r| r.target == target).count()
    }

    /// Notifications that could not be delivered since process start.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    fn dispatch(&self, id: u64, signal: Signal<'_>) -> Result<()> {
        let (callback, token) = {
            let mut arena = self.lock();
            let Some(reg) = arena.slots.get(&id) else {
                return Err(OclinkError::CallbackMarshaling {
                    id,
                    reason: "no registration with this id".to_string(),
                });
            };
            if reg.callback.kind() != signal.kind() {
                return Err(OclinkError::CallbackMarshaling {
                    id,
                    reason: format!(
                        "registered as {:?}, driver reported {:?}",
                        reg.callback.kind(),
                        signal.kind()
                    ),
                });
            }
            let entry = (reg.callback.clone(), reg.token);
            if signal.kind().is_one_shot() {
                arena.slots.remove(&id);
            }
            entry
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| match (&callback, &signal) {
            (HostCallback::ContextError(f), Signal::ContextError(report)) => f(report, token),
            (HostCallback::ProgramBuild(f), Signal::ProgramBuild(program)) => f(*program, token),
            (HostCallback::EventStatus(f), Signal::EventStatus(event, status)) => f(*event, *status, token),
            (HostCallback::MemoryDestroyed(f), Signal::MemoryDestroyed(mem)) => f(*mem, token),
            _ => {}
        }));
        outcome.map_err(|_| OclinkError::CallbackMarshaling {
            id,
            reason: "callback panicked".to_string(),
        })
    }

    fn deliver(&self, user_data: UserData, signal: Signal<'_>) {
        let id = user_data as usize as u64;
        if let Err(err) = self.dispatch(id, signal) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(error = %err, "native notification dropped");
        }
    }
}

pub(crate) extern "C" fn context_error_trampoline(
    errinfo: *const c_char,
    private_info: *const c_void,
    cb: usize,
    user_data: UserData,
) {
    let message = if errinfo.is_null() {
        String::new()
    } else {
        // SAFETY: the driver passes a NUL-terminated string valid for the
        // duration of the call.
        unsafe { CStr::from_ptr(errinfo) }.to_string_lossy().into_owned()
    };
    let private_info = if private_info.is_null() || cb == 0 {
        Vec::new()
    } else {
        // SAFETY: `private_info` points to `cb` bytes for the duration of
        // the call.
        unsafe { std::slice::from_raw_parts(private_info.cast::<u8>(), cb) }.to_vec()
    };
    let report = ContextErrorReport {
        message,
        private_info,
    };
    CallbackBridge::global().deliver(user_data, Signal::ContextError(&report));
}

pub(crate) extern "C" fn program_trampoline(program: RawHandle, user_data: UserData) {
    CallbackBridge::global().deliver(user_data, Signal::ProgramBuild(program));
}

pub(crate) extern "C" fn event_trampoline(event: RawHandle, status: ClInt, user_data: UserData) {
    CallbackBridge::global().deliver(
        user_data,
        Signal::EventStatus(event, ExecutionStatus::from_raw(status)),
    );
}

pub(crate) extern "C" fn mem_destructor_trampoline(memobj: RawHandle, user_data: UserData) {
    CallbackBridge::global().deliver(user_data, Signal::MemoryDestroyed(memobj));
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;

    use super::*;

    fn counting_event_callback(hits: &Arc<AtomicU64>) -> HostCallback {
        let hits = Arc::clone(hits);
        HostCallback::EventStatus(Arc::new(move |_event: RawHandle, _status: ExecutionStatus, token: UserToken| {
            hits.fetch_add(token.0, Ordering::SeqCst);
        }))
    }

    #[test]
    fn one_shot_fires_once() {
        let bridge = CallbackBridge::global();
        let hits = Arc::new(AtomicU64::new(0));
        let id = bridge.register(RawHandle(0x500), counting_event_callback(&hits), UserToken(3));
        event_trampoline(RawHandle(0x500), 0, id.as_user_data());
        event_trampoline(RawHandle(0x500), 0, id.as_user_data());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(!bridge.is_registered(id));
    }

    #[test]
    fn context_error_is_persistent_until_purged() {
        let bridge = CallbackBridge::global();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = bridge.reserve(
            HostCallback::ContextError(Arc::new(move |report: &ContextErrorReport, token: UserToken| {
                sink.lock().expect("sink").push((report.message.clone(), token));
            })),
            UserToken(9),
        );
        bridge.bind(id, RawHandle(0x600));
        let msg = c"out of resources";
        context_error_trampoline(msg.as_ptr(), std::ptr::null(), 0, id.as_user_data());
        context_error_trampoline(msg.as_ptr(), std::ptr::null(), 0, id.as_user_data());
        assert_eq!(seen.lock().expect("seen").len(), 2);
        assert_eq!(bridge.purge(RawHandle(0x600)), 1);
        context_error_trampoline(msg.as_ptr(), std::ptr::null(), 0, id.as_user_data());
        assert_eq!(seen.lock().expect("seen").len(), 2);
        assert_eq!(seen.lock().expect("seen")[0], ("out of resources".to_string(), UserToken(9)));
    }

    #[test]
    fn unknown_id_is_dropped() {
        let bridge = CallbackBridge::global();
        let before = bridge.dropped();
        program_trampoline(RawHandle(0x700), u64::MAX as usize as UserData);
        assert!(bridge.dropped() > before);
    }

    #[test]
    fn panicking_callback_is_contained() {
        let bridge = CallbackBridge::global();
        let id = bridge.register(
            RawHandle(0x800),
            HostCallback::MemoryDestroyed(Arc::new(|_: RawHandle, _: UserToken| panic!("cleanup failed"))),
            UserToken::default(),
        );
        let before = bridge.dropped();
        mem_destructor_trampoline(RawHandle(0x800), id.as_user_data());
        assert!(bridge.dropped() > before);
        assert!(!bridge.is_registered(id));
    }

    #[test]
    fn kind_mismatch_is_not_dispatched() {
        let bridge = CallbackBridge::global();
        let hits = Arc::new(AtomicU64::new(0));
        let id = bridge.register(RawHandle(0x900), counting_event_callback(&hits), UserToken(1));
        program_trampoline(RawHandle(0x900), id.as_user_data());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(bridge.is_registered(id));
        assert!(bridge.cancel(id));
    }
}
