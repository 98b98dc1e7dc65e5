// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the oclink binding facade.

use std::ffi::c_void;
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Which native binary distribution is targeted for this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NativeVariant {
    Windows,
    /// macOS ships OpenCL as a system framework.
    Mac,
    /// Linux, BSD, and other unix-likes using an ICD loader.
    Unix,
}

impl NativeVariant {
    /// Variant used when the environment probe gives no usable answer.
    pub const DEFAULT: Self = Self::Unix;
}

impl fmt::Display for NativeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Windows => "windows",
            Self::Mac => "mac",
            Self::Unix => "unix",
        })
    }
}

/// Capability level of the native API surface.
///
/// Ordered: every tier is a superset of the tiers below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VersionTier {
    V1_0,
    V1_1,
    V1_2,
    V2_0,
}

impl VersionTier {
    pub const ALL: [Self; 4] = [Self::V1_0, Self::V1_1, Self::V1_2, Self::V2_0];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn from_major_minor(major: u32, minor: u32) -> Option<Self> {
        match (major, minor) {
            (1, 0) => Some(Self::V1_0),
            (1, 1) => Some(Self::V1_1),
            (1, 2) => Some(Self::V1_2),
            (2, _) | (3, _) => Some(Self::V2_0),
            _ => None,
        }
    }

    /// Parse a platform or device version string such as
    /// `"OpenCL 1.2 CUDA 12.4.131"`. Versions above 2.0 clamp to 2.0.
    pub fn parse_version_string(version: &str) -> Option<Self> {
        let rest = version.trim().strip_prefix("OpenCL")?.trim_start();
        let number = rest.split_whitespace().next()?;
        let (major, minor) = number.split_once('.')?;
        Self::from_major_minor(major.parse().ok()?, minor.parse().ok()?)
    }
}

impl fmt::Display for VersionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::V1_0 => "1.0",
            Self::V1_1 => "1.1",
            Self::V1_2 => "1.2",
            Self::V2_0 => "2.0",
        })
    }
}

/// Pointer-sized opaque native identifier (`cl_platform_id`, `cl_mem`, ...).
///
/// Zero is never a live resource.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RawHandle(pub usize);

impl RawHandle {
    pub const NULL: Self = Self(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    pub fn from_ptr(ptr: *mut c_void) -> Self {
        Self(ptr as usize)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// The resource kinds a handle can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Platform,
    Device,
    Context,
    CommandQueue,
    Memory,
    Program,
    Kernel,
    Event,
    Sampler,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Platform => "platform",
            Self::Device => "device",
            Self::Context => "context",
            Self::CommandQueue => "command queue",
            Self::Memory => "memory",
            Self::Program => "program",
            Self::Kernel => "kernel",
            Self::Event => "event",
            Self::Sampler => "sampler",
        })
    }
}

bitflags! {
    /// `cl_device_type`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceType: u64 {
        const DEFAULT = 1 << 0;
        const CPU = 1 << 1;
        const GPU = 1 << 2;
        const ACCELERATOR = 1 << 3;
        const CUSTOM = 1 << 4;
        const ALL = 0xFFFF_FFFF;
    }

    /// `cl_mem_flags`, including the 2.0 SVM bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemFlags: u64 {
        const READ_WRITE = 1 << 0;
        const WRITE_ONLY = 1 << 1;
        const READ_ONLY = 1 << 2;
        const USE_HOST_PTR = 1 << 3;
        const ALLOC_HOST_PTR = 1 << 4;
        const COPY_HOST_PTR = 1 << 5;
        const HOST_WRITE_ONLY = 1 << 7;
        const HOST_READ_ONLY = 1 << 8;
        const HOST_NO_ACCESS = 1 << 9;
        const SVM_FINE_GRAIN_BUFFER = 1 << 10;
        const SVM_ATOMICS = 1 << 11;
    }

    /// `cl_map_flags`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MapFlags: u64 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const WRITE_INVALIDATE_REGION = 1 << 2;
    }

    /// `cl_command_queue_properties`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct QueueProperties: u64 {
        const OUT_OF_ORDER_EXEC_MODE_ENABLE = 1 << 0;
        const PROFILING_ENABLE = 1 << 1;
        const ON_DEVICE = 1 << 2;
        const ON_DEVICE_DEFAULT = 1 << 3;
    }
}

/// `CL_QUEUE_PROPERTIES` key used in 2.0 property lists.
pub const CL_QUEUE_PROPERTIES: u64 = 0x1093;

/// Execution status of a command, as reported by events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionStatus {
    Complete,
    Running,
    Submitted,
    Queued,
    /// Negative values: the command terminated abnormally with this code.
    Error(i32),
}

impl ExecutionStatus {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Complete,
            1 => Self::Running,
            2 => Self::Submitted,
            3 => Self::Queued,
            other => Self::Error(other),
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            Self::Complete => 0,
            Self::Running => 1,
            Self::Submitted => 2,
            Self::Queued => 3,
            Self::Error(code) => code,
        }
    }

    /// Complete or failed; no further transitions happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error(_))
    }
}

/// `cl_image_format`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageFormat {
    pub channel_order: u32,
    pub channel_data_type: u32,
}

/// `cl_image_desc` (1.2+). `buffer` is only used for 1D buffer images.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageDesc {
    pub image_type: u32,
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub array_size: usize,
    pub row_pitch: usize,
    pub slice_pitch: usize,
    pub num_mip_levels: u32,
    pub num_samples: u32,
    pub buffer: RawHandle,
}

/// `cl_buffer_region` used to create sub-buffers.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferRegion {
    pub origin: usize,
    pub size: usize,
}

/// `CL_BUFFER_CREATE_TYPE_REGION`
pub const CL_BUFFER_CREATE_TYPE_REGION: u32 = 0x1220;

/// Geometry of a rectangular buffer transfer (1.1+), in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RectRegion {
    pub buffer_origin: [usize; 3],
    pub host_origin: [usize; 3],
    pub region: [usize; 3],
    pub buffer_row_pitch: usize,
    pub buffer_slice_pitch: usize,
    pub host_row_pitch: usize,
    pub host_slice_pitch: usize,
}

/// Geometry of a rectangular buffer-to-buffer copy (1.1+), in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RectCopy {
    pub src_origin: [usize; 3],
    pub dst_origin: [usize; 3],
    pub region: [usize; 3],
    pub src_row_pitch: usize,
    pub src_slice_pitch: usize,
    pub dst_row_pitch: usize,
    pub dst_slice_pitch: usize,
}

/// Image sampling addressing mode (`cl_addressing_mode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    None,
    ClampToEdge,
    Clamp,
    Repeat,
    MirroredRepeat,
}

impl AddressingMode {
    pub fn to_raw(self) -> u32 {
        match self {
            Self::None => 0x1130,
            Self::ClampToEdge => 0x1131,
            Self::Clamp => 0x1132,
            Self::Repeat => 0x1133,
            Self::MirroredRepeat => 0x1134,
        }
    }
}

/// Image sampling filter (`cl_filter_mode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

impl FilterMode {
    pub fn to_raw(self) -> u32 {
        match self {
            Self::Nearest => 0x1140,
            Self::Linear => 0x1141,
        }
    }
}

/// Sampler property keys for the 2.0 properties form.
pub const CL_SAMPLER_NORMALIZED_COORDS: u64 = 0x1152;
pub const CL_SAMPLER_ADDRESSING_MODE: u64 = 0x1153;
pub const CL_SAMPLER_FILTER_MODE: u64 = 0x1154;
