// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capability registry: which tier of the native surface is usable, and
// through which call table.
//
// One call table is installed at one tier. Every lower tier is implied by
// it; every higher tier is not. Installing again replaces the previous
// table outright, whatever its tier, so a downgrade revokes the newer
// surface. Installation belongs to startup; the registry guards its own
// state but does not order installs against concurrent lookups.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use oclink_core::error::{OclinkError, Result};
use oclink_core::types::VersionTier;
use oclink_native::{EntryPoint, NativeApi};
use tracing::{info, warn};

#[derive(Clone)]
struct Installed {
    tier: VersionTier,
    api: Arc<dyn NativeApi>,
}

/// Holds the active call table and its tier.
pub struct CapabilityRegistry {
    installed: RwLock<Option<Installed>>,
    warn_on_deprecated: AtomicBool,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            installed: RwLock::new(None),
            warn_on_deprecated: AtomicBool::new(true),
        }
    }

    /// Toggle the once-per-entry warning for deprecated entry points.
    pub fn set_deprecation_warnings(&self, enabled: bool) {
        self.warn_on_deprecated.store(enabled, Ordering::Relaxed);
    }

    /// Make `api` the active table at `tier`. Tiers above `tier` become
    /// unavailable.
    pub fn install(&self, tier: VersionTier, api: Arc<dyn NativeApi>) {
        if tier > api.tier() {
            warn!(
                %tier,
                native_tier = %api.tier(),
                source = %api.describe(),
                "installing a call table above the tier it reports"
            );
        }
        info!(%tier, source = %api.describe(), "call table installed");
        *self.installed.write().unwrap_or_else(PoisonError::into_inner) = Some(Installed { tier, api });
    }

    /// Remove the active table. Every tier becomes unavailable.
    pub fn clear(&self) {
        *self.installed.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn snapshot(&self) -> Option<Installed> {
        self.installed.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn current_tier(&self) -> Option<VersionTier> {
        self.snapshot().map(|i| i.tier)
    }

    pub fn is_available(&self, tier: VersionTier) -> bool {
        self.current_tier().is_some_and(|installed| tier <= installed)
    }

    /// The active table viewed at `tier`.
    pub fn get(&self, tier: VersionTier) -> Result<TierView> {
        match self.snapshot() {
            Some(installed) if tier <= installed.tier => Ok(TierView {
                tier,
                api: installed.api,
                warn_on_deprecated: self.warn_on_deprecated.load(Ordering::Relaxed),
            }),
            other => Err(OclinkError::EntryPointNotAvailable {
                entry: tier_surface(tier),
                required: tier,
                installed: other.map(|i| i.tier),
            }),
        }
    }

    /// The active table at its installed tier.
    pub fn current(&self) -> Result<TierView> {
        let tier = self.current_tier().ok_or(OclinkError::EntryPointNotAvailable {
            entry: tier_surface(VersionTier::V1_0),
            required: VersionTier::V1_0,
            installed: None,
        })?;
        self.get(tier)
    }
}

fn tier_surface(tier: VersionTier) -> &'static str {
    match tier {
        VersionTier::V1_0 => "OpenCL 1.0 call table",
        VersionTier::V1_1 => "OpenCL 1.1 call table",
        VersionTier::V1_2 => "OpenCL 1.2 call table",
        VersionTier::V2_0 => "OpenCL 2.0 call table",
    }
}

/// A call table together with the tier it was obtained at.
#[derive(Clone)]
pub struct TierView {
    tier: VersionTier,
    api: Arc<dyn NativeApi>,
    warn_on_deprecated: bool,
}

impl TierView {
    pub fn tier(&self) -> VersionTier {
        self.tier
    }

    /// The table, after checking that `entry` belongs to this tier.
    pub fn entry(&self, entry: EntryPoint) -> Result<&dyn NativeApi> {
        if entry.min_tier() > self.tier {
            return Err(OclinkError::EntryPointNotAvailable {
                entry: entry.symbol(),
                required: entry.min_tier(),
                installed: Some(self.tier),
            });
        }
        if self.warn_on_deprecated && entry.deprecated_in().is_some_and(|dep| dep <= self.tier) {
            warn_deprecated_once(entry, self.tier);
        }
        Ok(self.api.as_ref())
    }
}

fn warn_deprecated_once(entry: EntryPoint, tier: VersionTier) {
    static WARNED: OnceLock<Mutex<HashSet<EntryPoint>>> = OnceLock::new();
    let first = WARNED
        .get_or_init(|| Mutex::new(HashSet::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(entry);
    if first {
        warn!(
            entry = entry.symbol(),
            deprecated_in = ?entry.deprecated_in(),
            %tier,
            "calling a deprecated entry point"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oclink_native::SimulatedDriver;
    use proptest::prelude::*;

    fn sim() -> Arc<dyn NativeApi> {
        Arc::new(SimulatedDriver::new(VersionTier::V2_0))
    }

    #[test]
    fn empty_registry_has_no_tiers() {
        let registry = CapabilityRegistry::new();
        assert_eq!(registry.current_tier(), None);
        for tier in VersionTier::ALL {
            assert!(!registry.is_available(tier));
        }
        let err = registry.get(VersionTier::V1_0).err().expect("nothing installed");
        assert!(matches!(err, OclinkError::EntryPointNotAvailable { installed: None, .. }));
    }

    #[test]
    fn install_1_2_implies_lower_tiers() {
        let registry = CapabilityRegistry::new();
        registry.install(VersionTier::V1_2, sim());
        assert!(registry.is_available(VersionTier::V1_0));
        assert!(registry.is_available(VersionTier::V1_1));
        assert!(registry.is_available(VersionTier::V1_2));
        assert!(!registry.is_available(VersionTier::V2_0));
    }

    #[test]
    fn downgrade_revokes_higher_tiers() {
        let registry = CapabilityRegistry::new();
        registry.install(VersionTier::V2_0, sim());
        registry.install(VersionTier::V1_0, sim());
        assert!(registry.is_available(VersionTier::V1_0));
        assert!(!registry.is_available(VersionTier::V1_1));
        assert!(!registry.is_available(VersionTier::V1_2));
        assert!(!registry.is_available(VersionTier::V2_0));
        assert!(registry.get(VersionTier::V1_1).is_err());
    }

    #[test]
    fn view_rejects_entries_above_its_tier() {
        let registry = CapabilityRegistry::new();
        registry.install(VersionTier::V2_0, sim());
        let view = registry.get(VersionTier::V1_1).expect("1.1 available");
        assert!(view.entry(EntryPoint::CreateUserEvent).is_ok());
        let err = view.entry(EntryPoint::CreatePipe).err().expect("pipe is 2.0");
        match err {
            OclinkError::EntryPointNotAvailable {
                entry,
                required,
                installed,
            } => {
                assert_eq!(entry, "clCreatePipe");
                assert_eq!(required, VersionTier::V2_0);
                assert_eq!(installed, Some(VersionTier::V1_1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn deprecated_entries_still_dispatch() {
        let registry = CapabilityRegistry::new();
        registry.install(VersionTier::V2_0, sim());
        let view = registry.current().expect("installed");
        assert!(view.entry(EntryPoint::CreateCommandQueue).is_ok());
        assert!(view.entry(EntryPoint::EnqueueTask).is_ok());
    }

    #[test]
    fn clear_removes_everything() {
        let registry = CapabilityRegistry::new();
        registry.install(VersionTier::V1_1, sim());
        registry.clear();
        assert!(!registry.is_available(VersionTier::V1_0));
        assert!(registry.current().is_err());
    }

    fn tier_strategy() -> impl Strategy<Value = VersionTier> {
        (0usize..4).prop_map(|i| VersionTier::from_index(i).unwrap_or(VersionTier::V1_0))
    }

    proptest! {
        #[test]
        fn availability_follows_the_last_install(installs in prop::collection::vec(tier_strategy(), 1..12)) {
            let registry = CapabilityRegistry::new();
            let api = sim();
            for tier in &installs {
                registry.install(*tier, Arc::clone(&api));
            }
            let last = *installs.last().expect("non-empty");
            for k in VersionTier::ALL {
                prop_assert_eq!(registry.is_available(k), last >= k);
                prop_assert_eq!(registry.get(k).is_ok(), last >= k);
            }
        }
    }
}
