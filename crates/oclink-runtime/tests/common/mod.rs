// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared setup for the facade integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use oclink_core::types::{DeviceType, QueueProperties, VersionTier};
use oclink_native::SimulatedDriver;
use oclink_runtime::{
    CapabilityRegistry, ComputeFacade, ContextHandle, DeviceHandle, QueueHandle, UserToken,
};

pub const VECTOR_ADD: &str = "__kernel void vadd(__global const float *a, __global const float *b, __global float *out) {\n\
    size_t i = get_global_id(0);\n\
    out[i] = a[i] + b[i];\n\
}\n";

/// Route driver and facade logs to the test output. `RUST_LOG` overrides
/// the default `warn` filter.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

pub struct Rig {
    pub sim: Arc<SimulatedDriver>,
    pub facade: ComputeFacade,
}

impl Rig {
    pub fn new(tier: VersionTier) -> Self {
        init_tracing();
        let sim = Arc::new(SimulatedDriver::new(tier));
        let registry = Arc::new(CapabilityRegistry::new());
        registry.install(tier, sim.clone());
        Self {
            sim,
            facade: ComputeFacade::new(registry),
        }
    }

    pub fn gpu(&self) -> DeviceHandle {
        let platform = self.facade.platforms().expect("platforms")[0];
        self.facade
            .devices(platform, DeviceType::GPU)
            .expect("devices")
            .into_iter()
            .next()
            .expect("a GPU device")
    }

    pub fn context(&self) -> (DeviceHandle, ContextHandle) {
        let device = self.gpu();
        let context = self
            .facade
            .create_context(&[device], None, UserToken::default())
            .expect("context");
        (device, context)
    }

    /// Device, context and an in-order queue with profiling on.
    pub fn queue(&self) -> (DeviceHandle, ContextHandle, QueueHandle) {
        let (device, context) = self.context();
        let queue = self
            .facade
            .create_command_queue(context, device, QueueProperties::PROFILING_ENABLE)
            .expect("queue");
        (device, context, queue)
    }
}
