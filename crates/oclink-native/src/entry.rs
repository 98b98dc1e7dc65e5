// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Catalogue of native entry points: exported symbol, introducing tier,
// and deprecation tier.

use std::fmt;

use oclink_core::types::VersionTier;

macro_rules! entry_points {
    ($($variant:ident => $symbol:literal, $tier:ident $(, deprecated $dep:ident)?;)*) => {
        /// One native function of the OpenCL 1.0–2.0 surface.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum EntryPoint {
            $($variant,)*
        }

        impl EntryPoint {
            pub const ALL: &'static [EntryPoint] = &[$(EntryPoint::$variant,)*];

            /// Exported C symbol name.
            pub fn symbol(self) -> &'static str {
                match self {
                    $(Self::$variant => $symbol,)*
                }
            }

            /// Lowest tier that provides this entry.
            pub fn min_tier(self) -> VersionTier {
                match self {
                    $(Self::$variant => VersionTier::$tier,)*
                }
            }

            /// Tier at which the entry was superseded, if any.
            pub fn deprecated_in(self) -> Option<VersionTier> {
                match self {
                    $(Self::$variant => entry_points!(@dep $($dep)?),)*
                }
            }
        }
    };
    (@dep) => { None };
    (@dep $dep:ident) => { Some(VersionTier::$dep) };
}

entry_points! {
    // 1.0
    GetPlatformIds => "clGetPlatformIDs", V1_0;
    GetPlatformInfo => "clGetPlatformInfo", V1_0;
    GetDeviceIds => "clGetDeviceIDs", V1_0;
    GetDeviceInfo => "clGetDeviceInfo", V1_0;
    CreateContext => "clCreateContext", V1_0;
    CreateContextFromType => "clCreateContextFromType", V1_0;
    RetainContext => "clRetainContext", V1_0;
    ReleaseContext => "clReleaseContext", V1_0;
    GetContextInfo => "clGetContextInfo", V1_0;
    CreateCommandQueue => "clCreateCommandQueue", V1_0, deprecated V2_0;
    RetainCommandQueue => "clRetainCommandQueue", V1_0;
    ReleaseCommandQueue => "clReleaseCommandQueue", V1_0;
    GetCommandQueueInfo => "clGetCommandQueueInfo", V1_0;
    SetCommandQueueProperty => "clSetCommandQueueProperty", V1_0, deprecated V1_1;
    CreateBuffer => "clCreateBuffer", V1_0;
    CreateImage2d => "clCreateImage2D", V1_0, deprecated V1_2;
    CreateImage3d => "clCreateImage3D", V1_0, deprecated V1_2;
    RetainMemObject => "clRetainMemObject", V1_0;
    ReleaseMemObject => "clReleaseMemObject", V1_0;
    GetMemObjectInfo => "clGetMemObjectInfo", V1_0;
    GetImageInfo => "clGetImageInfo", V1_0;
    CreateSampler => "clCreateSampler", V1_0, deprecated V2_0;
    RetainSampler => "clRetainSampler", V1_0;
    ReleaseSampler => "clReleaseSampler", V1_0;
    GetSamplerInfo => "clGetSamplerInfo", V1_0;
    CreateProgramWithSource => "clCreateProgramWithSource", V1_0;
    CreateProgramWithBinary => "clCreateProgramWithBinary", V1_0;
    RetainProgram => "clRetainProgram", V1_0;
    ReleaseProgram => "clReleaseProgram", V1_0;
    BuildProgram => "clBuildProgram", V1_0;
    GetProgramInfo => "clGetProgramInfo", V1_0;
    GetProgramBuildInfo => "clGetProgramBuildInfo", V1_0;
    CreateKernel => "clCreateKernel", V1_0;
    CreateKernelsInProgram => "clCreateKernelsInProgram", V1_0;
    RetainKernel => "clRetainKernel", V1_0;
    ReleaseKernel => "clReleaseKernel", V1_0;
    SetKernelArg => "clSetKernelArg", V1_0;
    GetKernelInfo => "clGetKernelInfo", V1_0;
    GetKernelWorkGroupInfo => "clGetKernelWorkGroupInfo", V1_0;
    WaitForEvents => "clWaitForEvents", V1_0;
    GetEventInfo => "clGetEventInfo", V1_0;
    RetainEvent => "clRetainEvent", V1_0;
    ReleaseEvent => "clReleaseEvent", V1_0;
    GetEventProfilingInfo => "clGetEventProfilingInfo", V1_0;
    Flush => "clFlush", V1_0;
    Finish => "clFinish", V1_0;
    EnqueueReadBuffer => "clEnqueueReadBuffer", V1_0;
    EnqueueWriteBuffer => "clEnqueueWriteBuffer", V1_0;
    EnqueueCopyBuffer => "clEnqueueCopyBuffer", V1_0;
    EnqueueReadImage => "clEnqueueReadImage", V1_0;
    EnqueueWriteImage => "clEnqueueWriteImage", V1_0;
    EnqueueCopyImage => "clEnqueueCopyImage", V1_0;
    EnqueueMapBuffer => "clEnqueueMapBuffer", V1_0;
    EnqueueUnmapMemObject => "clEnqueueUnmapMemObject", V1_0;
    EnqueueNdRangeKernel => "clEnqueueNDRangeKernel", V1_0;
    EnqueueTask => "clEnqueueTask", V1_0, deprecated V2_0;
    EnqueueMarker => "clEnqueueMarker", V1_0, deprecated V1_2;
    EnqueueWaitForEvents => "clEnqueueWaitForEvents", V1_0, deprecated V1_2;
    EnqueueBarrier => "clEnqueueBarrier", V1_0, deprecated V1_2;

    // 1.1
    CreateSubBuffer => "clCreateSubBuffer", V1_1;
    SetMemObjectDestructorCallback => "clSetMemObjectDestructorCallback", V1_1;
    CreateUserEvent => "clCreateUserEvent", V1_1;
    SetUserEventStatus => "clSetUserEventStatus", V1_1;
    SetEventCallback => "clSetEventCallback", V1_1;
    EnqueueReadBufferRect => "clEnqueueReadBufferRect", V1_1;
    EnqueueWriteBufferRect => "clEnqueueWriteBufferRect", V1_1;
    EnqueueCopyBufferRect => "clEnqueueCopyBufferRect", V1_1;

    // 1.2
    CreateSubDevices => "clCreateSubDevices", V1_2;
    RetainDevice => "clRetainDevice", V1_2;
    ReleaseDevice => "clReleaseDevice", V1_2;
    CreateImage => "clCreateImage", V1_2;
    CompileProgram => "clCompileProgram", V1_2;
    LinkProgram => "clLinkProgram", V1_2;
    GetKernelArgInfo => "clGetKernelArgInfo", V1_2;
    EnqueueFillBuffer => "clEnqueueFillBuffer", V1_2;
    EnqueueFillImage => "clEnqueueFillImage", V1_2;
    EnqueueMarkerWithWaitList => "clEnqueueMarkerWithWaitList", V1_2;
    EnqueueBarrierWithWaitList => "clEnqueueBarrierWithWaitList", V1_2;

    // 2.0
    CreateCommandQueueWithProperties => "clCreateCommandQueueWithProperties", V2_0;
    CreatePipe => "clCreatePipe", V2_0;
    GetPipeInfo => "clGetPipeInfo", V2_0;
    SvmAlloc => "clSVMAlloc", V2_0;
    SvmFree => "clSVMFree", V2_0;
    CreateSamplerWithProperties => "clCreateSamplerWithProperties", V2_0;
    SetKernelArgSvmPointer => "clSetKernelArgSVMPointer", V2_0;
    EnqueueSvmFree => "clEnqueueSVMFree", V2_0;
    EnqueueSvmMemcpy => "clEnqueueSVMMemcpy", V2_0;
    EnqueueSvmMemFill => "clEnqueueSVMMemFill", V2_0;
    EnqueueSvmMap => "clEnqueueSVMMap", V2_0;
    EnqueueSvmUnmap => "clEnqueueSVMUnmap", V2_0;
}

impl EntryPoint {
    /// Entries introduced at exactly `tier`.
    pub fn introduced_at(tier: VersionTier) -> impl Iterator<Item = EntryPoint> {
        Self::ALL.iter().copied().filter(move |e| e.min_tier() == tier)
    }

    /// Whether the entry is deprecated when running at `tier`.
    pub fn is_deprecated_at(self, tier: VersionTier) -> bool {
        self.deprecated_in().is_some_and(|dep| dep <= tier)
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for entry in EntryPoint::ALL {
            assert!(seen.insert(entry.symbol()), "duplicate {}", entry.symbol());
        }
    }

    #[test]
    fn deprecation_follows_introduction() {
        for entry in EntryPoint::ALL {
            if let Some(dep) = entry.deprecated_in() {
                assert!(dep > entry.min_tier(), "{entry} deprecated before it exists");
            }
        }
    }

    #[test]
    fn queue_creation_forms() {
        assert_eq!(EntryPoint::CreateCommandQueue.min_tier(), VersionTier::V1_0);
        assert!(EntryPoint::CreateCommandQueue.is_deprecated_at(VersionTier::V2_0));
        assert!(!EntryPoint::CreateCommandQueue.is_deprecated_at(VersionTier::V1_2));
        assert_eq!(
            EntryPoint::CreateCommandQueueWithProperties.min_tier(),
            VersionTier::V2_0
        );
    }

    #[test]
    fn every_tier_adds_entries() {
        for tier in VersionTier::ALL {
            assert!(EntryPoint::introduced_at(tier).count() > 0, "{tier} is empty");
        }
    }
}
