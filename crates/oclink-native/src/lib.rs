// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// oclink native layer: host platform resolution, the entry-point catalogue
// and the call table implementations behind `NativeApi`.

pub mod api;
pub mod dynamic;
pub mod entry;
pub mod platform;

#[cfg(feature = "simulated")]
pub mod sim;

use std::sync::Arc;

use oclink_core::config::BindingConfig;
use oclink_core::error::Result;
use oclink_core::types::NativeVariant;

pub use api::NativeApi;
pub use dynamic::DynamicLibrary;
pub use entry::EntryPoint;
pub use platform::{EnvironmentProbe, HostProbe, OsFamily};

#[cfg(feature = "simulated")]
pub use sim::SimulatedDriver;

/// Open the OpenCL library for `variant` and return it as a shared call
/// table.
pub fn load_native(variant: NativeVariant, config: &BindingConfig) -> Result<Arc<dyn NativeApi>> {
    let library = DynamicLibrary::open(variant, config)?;
    Ok(Arc::new(library))
}
