// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform resolution: decide once per process which native binary variant
// to target.
//
// The OS family probe only distinguishes Windows from unix-likes. macOS
// reports itself as a unix-like, so the system identity call (`uname`) is
// consulted to tell it apart. A failing probe never aborts startup; the
// resolver falls back to `NativeVariant::DEFAULT`.

use std::sync::OnceLock;

use oclink_core::error::{OclinkError, Result};
use oclink_core::types::NativeVariant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Coarse operating system family, as far as the first probe can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    Unix,
    Unknown,
}

/// Failure of the system identity call.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("system identity call failed: {0}")]
    Syscall(String),

    #[error("system identity call not supported on this platform")]
    Unsupported,
}

/// Source of environment facts for the resolver.
pub trait EnvironmentProbe {
    /// Best-effort OS family.
    fn os_family(&self) -> OsFamily;

    /// Kernel / system name as reported by the identity call (e.g. "Darwin").
    fn system_name(&self) -> std::result::Result<String, ProbeError>;
}

/// Probe backed by the running host.
pub struct HostProbe;

impl EnvironmentProbe for HostProbe {
    fn os_family(&self) -> OsFamily {
        if cfg!(windows) {
            OsFamily::Windows
        } else if cfg!(unix) {
            OsFamily::Unix
        } else {
            OsFamily::Unknown
        }
    }

    #[cfg(unix)]
    fn system_name(&self) -> std::result::Result<String, ProbeError> {
        // SAFETY: `utsname` is plain data; zeroed is a valid initial value
        // and `uname` only writes NUL-terminated strings into its fields.
        let mut uts: libc::utsname = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::uname(&mut uts) };
        if rc != 0 {
            return Err(ProbeError::Syscall(
                std::io::Error::last_os_error().to_string(),
            ));
        }
        let sysname = unsafe { std::ffi::CStr::from_ptr(uts.sysname.as_ptr()) };
        Ok(sysname.to_string_lossy().into_owned())
    }

    #[cfg(not(unix))]
    fn system_name(&self) -> std::result::Result<String, ProbeError> {
        Err(ProbeError::Unsupported)
    }
}

static RESOLVED: OnceLock<NativeVariant> = OnceLock::new();

/// The native variant for this process. Probed on first call, memoized after.
pub fn resolve() -> NativeVariant {
    *RESOLVED.get_or_init(|| {
        let variant = resolve_with(&HostProbe);
        info!(%variant, "native library variant selected");
        variant
    })
}

/// Resolve against an arbitrary probe. Never fails; unknown answers fall
/// back to the default variant.
pub fn resolve_with(probe: &dyn EnvironmentProbe) -> NativeVariant {
    match resolve_strict(probe) {
        Ok(variant) => variant,
        Err(e) => {
            warn!(error = %e, default = %NativeVariant::DEFAULT, "platform probe inconclusive, using default variant");
            NativeVariant::DEFAULT
        }
    }
}

/// Resolve against a probe, reporting `PlatformUnresolved` instead of
/// defaulting when the environment cannot be identified.
pub fn resolve_strict(probe: &dyn EnvironmentProbe) -> Result<NativeVariant> {
    match probe.os_family() {
        OsFamily::Windows => Ok(NativeVariant::Windows),
        OsFamily::Unix => match probe.system_name() {
            Ok(name) => {
                debug!(system = %name, "system identity probed");
                Ok(classify_system_name(&name))
            }
            Err(e) => Err(OclinkError::PlatformUnresolved(e.to_string())),
        },
        OsFamily::Unknown => Err(OclinkError::PlatformUnresolved(
            "operating system family not recognised".into(),
        )),
    }
}

/// Map a unix system name to a variant.
fn classify_system_name(name: &str) -> NativeVariant {
    if name.trim().starts_with("Darwin") {
        NativeVariant::Mac
    } else {
        NativeVariant::Unix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeProbe {
        family: OsFamily,
        name: std::result::Result<&'static str, ()>,
    }

    impl EnvironmentProbe for FakeProbe {
        fn os_family(&self) -> OsFamily {
            self.family
        }

        fn system_name(&self) -> std::result::Result<String, ProbeError> {
            self.name
                .map(str::to_string)
                .map_err(|()| ProbeError::Syscall("denied".into()))
        }
    }

    #[test]
    fn darwin_on_unix_family_selects_mac() {
        let probe = FakeProbe {
            family: OsFamily::Unix,
            name: Ok("Darwin"),
        };
        assert_eq!(resolve_with(&probe), NativeVariant::Mac);
    }

    #[test]
    fn linux_selects_unix() {
        let probe = FakeProbe {
            family: OsFamily::Unix,
            name: Ok("Linux"),
        };
        assert_eq!(resolve_with(&probe), NativeVariant::Unix);
    }

    #[test]
    fn windows_family_skips_identity_call() {
        let probe = FakeProbe {
            family: OsFamily::Windows,
            name: Err(()),
        };
        assert_eq!(resolve_with(&probe), NativeVariant::Windows);
    }

    #[test]
    fn failing_identity_call_defaults() {
        let probe = FakeProbe {
            family: OsFamily::Unix,
            name: Err(()),
        };
        assert_eq!(resolve_with(&probe), NativeVariant::DEFAULT);
        assert!(matches!(
            resolve_strict(&probe),
            Err(OclinkError::PlatformUnresolved(_))
        ));
    }

    #[test]
    fn unknown_family_defaults() {
        let probe = FakeProbe {
            family: OsFamily::Unknown,
            name: Ok("Darwin"),
        };
        assert_eq!(resolve_with(&probe), NativeVariant::DEFAULT);
    }

    #[test]
    fn resolve_is_memoized() {
        assert_eq!(resolve(), resolve());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn host_probe_reports_linux() {
        assert_eq!(HostProbe.system_name().expect("uname"), "Linux");
        assert_eq!(resolve(), NativeVariant::Unix);
    }
}
