// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Startup: resolve the host variant, open its library, and install the
// call table at the highest tier it serves.

use std::sync::Arc;

use oclink_core::config::BindingConfig;
use oclink_core::error::Result;
use oclink_core::types::{NativeVariant, VersionTier};
use oclink_native::{NativeApi, load_native, platform};
use tracing::info;

use crate::facade::ComputeFacade;
use crate::registry::CapabilityRegistry;

/// Outcome of startup.
pub struct Bootstrap {
    variant: NativeVariant,
    tier: VersionTier,
    source: String,
    registry: Arc<CapabilityRegistry>,
}

impl Bootstrap {
    pub fn variant(&self) -> NativeVariant {
        self.variant
    }

    /// Tier the call table was installed at.
    pub fn tier(&self) -> VersionTier {
        self.tier
    }

    /// Where the call table came from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// A facade over the installed registry. Facades created here share
    /// the registry but keep separate handle ledgers.
    pub fn facade(&self) -> ComputeFacade {
        ComputeFacade::new(Arc::clone(&self.registry))
    }
}

/// Resolve, load and install the native library described by `config`.
pub fn bootstrap(config: &BindingConfig) -> Result<Bootstrap> {
    config.validate()?;
    let variant = platform::resolve();
    let api = load_native(variant, config)?;
    bootstrap_with(api, config)
}

/// Install an already opened call table, honouring `config`'s tier cap
/// and deprecation setting.
pub fn bootstrap_with(api: Arc<dyn NativeApi>, config: &BindingConfig) -> Result<Bootstrap> {
    let tier = config.max_tier.map_or(api.tier(), |cap| api.tier().min(cap));
    let registry = Arc::new(CapabilityRegistry::new());
    registry.set_deprecation_warnings(config.warn_on_deprecated);
    registry.install(tier, Arc::clone(&api));
    let source = api.describe();
    info!(variant = %api.variant(), %tier, %source, "oclink ready");
    Ok(Bootstrap {
        variant: api.variant(),
        tier,
        source,
        registry,
    })
}

#[cfg(test)]
mod tests {
    use oclink_native::SimulatedDriver;

    use super::*;

    #[test]
    fn installs_at_native_tier() {
        let boot = bootstrap_with(
            Arc::new(SimulatedDriver::new(VersionTier::V1_2)),
            &BindingConfig::default(),
        )
        .expect("bootstrap");
        assert_eq!(boot.tier(), VersionTier::V1_2);
        assert!(boot.registry().is_available(VersionTier::V1_2));
        assert!(!boot.registry().is_available(VersionTier::V2_0));
        assert!(boot.source().contains("simulated"));
    }

    #[test]
    fn config_caps_the_tier() {
        let config = BindingConfig {
            max_tier: Some(VersionTier::V1_1),
            ..BindingConfig::default()
        };
        let boot = bootstrap_with(Arc::new(SimulatedDriver::new(VersionTier::V2_0)), &config).expect("bootstrap");
        assert_eq!(boot.tier(), VersionTier::V1_1);
        assert_eq!(boot.registry().current_tier(), Some(VersionTier::V1_1));
    }

    #[test]
    fn facades_share_the_registry() {
        let boot = bootstrap_with(
            Arc::new(SimulatedDriver::new(VersionTier::V2_0)),
            &BindingConfig::default(),
        )
        .expect("bootstrap");
        let facade = boot.facade();
        assert_eq!(facade.registry().current_tier(), Some(VersionTier::V2_0));
        boot.registry().clear();
        assert!(facade.platforms().is_err());
    }
}
