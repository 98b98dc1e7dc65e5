// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Kind-tagged wrappers around native identifiers.

use std::fmt;
use std::marker::PhantomData;

use oclink_core::error::{OclinkError, Result};
use oclink_core::types::{HandleKind, RawHandle};

/// Resource kinds usable as the type parameter of [`Handle`].
pub trait Kind: Copy + Eq + std::hash::Hash + fmt::Debug + Send + Sync + 'static {
    const KIND: HandleKind;
}

/// Zero-sized kind markers.
pub mod kind {
    use super::Kind;
    use oclink_core::types::HandleKind;

    macro_rules! kinds {
        ($($name:ident),* $(,)?) => {
            $(
                #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
                pub struct $name;

                impl Kind for $name {
                    const KIND: HandleKind = HandleKind::$name;
                }
            )*
        };
    }

    kinds!(Platform, Device, Context, CommandQueue, Memory, Program, Kernel, Event, Sampler);
}

/// A non-null native identifier of a known kind.
///
/// `Handle` is `Copy`: it names a resource, it does not own a reference.
/// Reference bookkeeping lives in the facade's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle<K: Kind> {
    raw: RawHandle,
    _kind: PhantomData<K>,
}

impl<K: Kind> Handle<K> {
    /// Wrap `raw`, rejecting null.
    pub fn new(raw: RawHandle, op: &'static str) -> Result<Self> {
        if raw.is_null() {
            return Err(OclinkError::invalid_handle(K::KIND, raw, op, "null handle"));
        }
        Ok(Self {
            raw,
            _kind: PhantomData,
        })
    }

    pub fn raw(self) -> RawHandle {
        self.raw
    }

    pub fn kind(self) -> HandleKind {
        K::KIND
    }
}

impl<K: Kind> fmt::Display for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", K::KIND, self.raw)
    }
}

pub type PlatformHandle = Handle<kind::Platform>;
pub type DeviceHandle = Handle<kind::Device>;
pub type ContextHandle = Handle<kind::Context>;
pub type QueueHandle = Handle<kind::CommandQueue>;
pub type MemHandle = Handle<kind::Memory>;
pub type ProgramHandle = Handle<kind::Program>;
pub type KernelHandle = Handle<kind::Kernel>;
pub type EventHandle = Handle<kind::Event>;
pub type SamplerHandle = Handle<kind::Sampler>;

/// Raw values of a handle slice, for native list arguments.
pub(crate) fn raw_list<K: Kind>(handles: &[Handle<K>]) -> Vec<RawHandle> {
    handles.iter().map(|h| h.raw).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_rejected() {
        let err = ContextHandle::new(RawHandle::NULL, "clCreateContext").unwrap_err();
        match err {
            OclinkError::InvalidHandle { kind, op, .. } => {
                assert_eq!(kind, HandleKind::Context);
                assert_eq!(op, "clCreateContext");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn display_names_kind_and_value() {
        let h = QueueHandle::new(RawHandle(0x1a0), "test").expect("non-null");
        assert_eq!(h.to_string(), "command queue 0x1a0");
        assert_eq!(h.kind(), HandleKind::CommandQueue);
    }
}
