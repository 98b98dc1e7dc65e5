// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// oclink runtime: capability registry, handle lifecycle bookkeeping, the
// callback bridge and the facade operations built on them.

pub mod bootstrap;
pub mod callback;
pub mod facade;
pub mod handle;
pub mod ledger;
pub mod query;
pub mod registry;

pub use bootstrap::{Bootstrap, bootstrap, bootstrap_with};
pub use callback::{
    BuildCallback, CallbackBridge, ContextErrorCallback, ContextErrorReport, DestructorCallback,
    EventCallback, RegistrationId, UserToken,
};
pub use facade::{ComputeFacade, MappedRegion, Partition, ProfilingInfo, build_status};
pub use handle::{
    ContextHandle, DeviceHandle, EventHandle, Handle, KernelHandle, MemHandle, PlatformHandle,
    ProgramHandle, QueueHandle, SamplerHandle,
};
pub use ledger::{DEFAULT_TOMBSTONE_CAPACITY, HandleLedger, Lifecycle, Reclaimed, ReleaseOutcome};
pub use registry::{CapabilityRegistry, TierView};
