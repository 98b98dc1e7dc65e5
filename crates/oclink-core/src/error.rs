// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for oclink.

use thiserror::Error;

use crate::status::StatusCode;
use crate::types::{HandleKind, RawHandle, VersionTier};

/// Top-level error type for all oclink operations.
#[derive(Debug, Error)]
pub enum OclinkError {
    // -- Startup --
    #[error("could not determine the native library variant for this platform: {0}")]
    PlatformUnresolved(String),

    #[error("failed to load native library: {0}")]
    LibraryLoad(String),

    // -- Capability registry --
    #[error("entry point {entry} requires OpenCL {required}, installed tier is {}", tier_label(.installed))]
    EntryPointNotAvailable {
        entry: &'static str,
        required: VersionTier,
        installed: Option<VersionTier>,
    },

    // -- Resource lifecycle --
    #[error("invalid {kind} handle {raw} in {op}: {reason}")]
    InvalidHandle {
        kind: HandleKind,
        raw: RawHandle,
        op: &'static str,
        reason: &'static str,
    },

    // -- Driver --
    #[error("{op} failed: {status} ({code})")]
    NativeCall {
        op: &'static str,
        status: StatusCode,
        code: i32,
    },

    #[error("callback {id} could not be dispatched: {reason}")]
    CallbackMarshaling { id: u64, reason: String },

    #[error("could not decode {param:#x} returned by {op}: {reason}")]
    QueryDecode {
        op: &'static str,
        param: u32,
        reason: String,
    },

    #[error("invalid argument to {op}: {reason}")]
    InvalidArgument { op: &'static str, reason: String },

    // -- Configuration --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn tier_label(tier: &Option<VersionTier>) -> String {
    tier.map_or_else(|| "none".to_string(), |t| t.to_string())
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, OclinkError>;

/// How a caller should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The driver rejected the call; adjusting parameters or retrying may help.
    Recoverable,
    /// A programming error in the caller (bad handle, missing tier, bad argument).
    Defect,
    /// The host environment is missing something (library, config file).
    Environment,
}

impl OclinkError {
    /// Shorthand for an `InvalidHandle` error.
    pub fn invalid_handle(
        kind: HandleKind,
        raw: RawHandle,
        op: &'static str,
        reason: &'static str,
    ) -> Self {
        Self::InvalidHandle {
            kind,
            raw,
            op,
            reason,
        }
    }

    /// Classify this error for caller policy.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NativeCall { status, .. } if status.is_resource_exhaustion() => {
                ErrorClass::Recoverable
            }
            Self::NativeCall { status, .. } if status.is_invalid_object() => ErrorClass::Defect,
            Self::NativeCall { .. } => ErrorClass::Recoverable,
            Self::CallbackMarshaling { .. } => ErrorClass::Recoverable,

            Self::EntryPointNotAvailable { .. }
            | Self::InvalidHandle { .. }
            | Self::InvalidArgument { .. }
            | Self::QueryDecode { .. } => ErrorClass::Defect,

            Self::PlatformUnresolved(_)
            | Self::LibraryLoad(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Serialization(_) => ErrorClass::Environment,
        }
    }

    /// The native status code carried by this error, if any.
    pub fn native_code(&self) -> Option<i32> {
        match self {
            Self::NativeCall { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_call_message_names_operation_and_code() {
        let err = OclinkError::NativeCall {
            op: "clCreateBuffer",
            status: StatusCode::InvalidBufferSize,
            code: -61,
        };
        let msg = err.to_string();
        assert!(msg.contains("clCreateBuffer"));
        assert!(msg.contains("-61"));
        assert_eq!(err.native_code(), Some(-61));
    }

    #[test]
    fn missing_tier_message_mentions_none() {
        let err = OclinkError::EntryPointNotAvailable {
            entry: "clCreatePipe",
            required: VersionTier::V2_0,
            installed: None,
        };
        assert!(err.to_string().contains("none"));
        assert_eq!(err.class(), ErrorClass::Defect);
    }

    #[test]
    fn out_of_resources_is_recoverable() {
        let err = OclinkError::NativeCall {
            op: "clEnqueueNDRangeKernel",
            status: StatusCode::OutOfResources,
            code: -5,
        };
        assert_eq!(err.class(), ErrorClass::Recoverable);
    }

    #[test]
    fn invalid_mem_object_is_defect() {
        let err = OclinkError::NativeCall {
            op: "clReleaseMemObject",
            status: StatusCode::InvalidMemObject,
            code: -38,
        };
        assert_eq!(err.class(), ErrorClass::Defect);
    }
}
