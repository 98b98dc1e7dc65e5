// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Binding configuration: which native binary to open for each platform variant.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OclinkError, Result};
use crate::types::{NativeVariant, VersionTier};

/// Settings consulted when the native library is located and installed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Candidate library names/paths for Windows, tried in order.
    pub windows_libraries: Vec<String>,
    /// Candidate library names/paths for macOS, tried in order.
    pub mac_libraries: Vec<String>,
    /// Candidate library names/paths for other unix-likes, tried in order.
    pub unix_libraries: Vec<String>,
    /// Never install a tier above this one, even if the library has it.
    pub max_tier: Option<VersionTier>,
    /// Log a warning the first time each deprecated entry point is called.
    pub warn_on_deprecated: bool,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            windows_libraries: vec!["OpenCL.dll".into()],
            mac_libraries: vec!["/System/Library/Frameworks/OpenCL.framework/OpenCL".into()],
            unix_libraries: vec!["libOpenCL.so.1".into(), "libOpenCL.so".into()],
            max_tier: None,
            warn_on_deprecated: true,
        }
    }
}

impl BindingConfig {
    /// Library candidates for the given variant.
    pub fn libraries_for(&self, variant: NativeVariant) -> &[String] {
        match variant {
            NativeVariant::Windows => &self.windows_libraries,
            NativeVariant::Mac => &self.mac_libraries,
            NativeVariant::Unix => &self.unix_libraries,
        }
    }

    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "binding configuration loaded");
        Ok(config)
    }

    /// Write the configuration as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Every variant needs at least one candidate library.
    pub fn validate(&self) -> Result<()> {
        for variant in [NativeVariant::Windows, NativeVariant::Mac, NativeVariant::Unix] {
            let libs = self.libraries_for(variant);
            if libs.is_empty() || libs.iter().any(|l| l.trim().is_empty()) {
                return Err(OclinkError::Config(format!(
                    "no usable library name configured for {variant}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_names_per_variant() {
        let config = BindingConfig::default();
        assert_eq!(config.libraries_for(NativeVariant::Windows), ["OpenCL.dll"]);
        assert!(config.libraries_for(NativeVariant::Mac)[0].contains("OpenCL.framework"));
        assert_eq!(config.libraries_for(NativeVariant::Unix)[0], "libOpenCL.so.1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("oclink.json");
        std::fs::write(&path, r#"{ "max_tier": "V1_2", "warn_on_deprecated": false }"#)
            .expect("write");

        let config = BindingConfig::load(&path).expect("load");
        assert_eq!(config.max_tier, Some(VersionTier::V1_2));
        assert!(!config.warn_on_deprecated);
        assert_eq!(config.windows_libraries, ["OpenCL.dll"]);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("oclink.json");
        let config = BindingConfig {
            unix_libraries: vec!["/opt/vendor/lib/libOpenCL.so".into()],
            ..Default::default()
        };
        config.save(&path).expect("save");
        assert_eq!(BindingConfig::load(&path).expect("load"), config);
    }

    #[test]
    fn empty_library_list_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("oclink.json");
        std::fs::write(&path, r#"{ "mac_libraries": [] }"#).expect("write");
        assert!(matches!(
            BindingConfig::load(&path),
            Err(OclinkError::Config(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = BindingConfig::load("/nonexistent/oclink.json").unwrap_err();
        assert!(matches!(err, OclinkError::Io(_)));
    }
}
