// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Native status code translation.
//
// Every value returned by the driver passes through `translate` or `check`
// before it reaches a caller. `CL_SUCCESS` maps to `Ok(())`; every other
// value maps to a named `StatusCode`.

use std::fmt;

use crate::error::{OclinkError, Result};

/// Raw native status code (`cl_int`).
pub type ClInt = i32;

pub const CL_SUCCESS: ClInt = 0;

macro_rules! status_codes {
    ($($variant:ident = $code:literal, $name:literal, $desc:literal;)*) => {
        /// Named failure kinds reported by the driver.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode {
            $($variant,)*
            /// A code outside the known taxonomy (vendor extension or newer API).
            Unknown(ClInt),
        }

        impl StatusCode {
            /// Map a non-success code to its named kind.
            pub fn from_code(code: ClInt) -> Self {
                match code {
                    $($code => Self::$variant,)*
                    other => Self::Unknown(other),
                }
            }

            /// The native integer value.
            pub fn code(self) -> ClInt {
                match self {
                    $(Self::$variant => $code,)*
                    Self::Unknown(other) => other,
                }
            }

            /// The C constant name (e.g. `CL_INVALID_VALUE`).
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                    Self::Unknown(_) => "CL_UNKNOWN_ERROR",
                }
            }

            /// Short explanation of what the driver rejected.
            pub fn description(self) -> &'static str {
                match self {
                    $(Self::$variant => $desc,)*
                    Self::Unknown(_) => "status code not recognised by this binding",
                }
            }
        }
    };
}

status_codes! {
    DeviceNotFound = -1, "CL_DEVICE_NOT_FOUND", "no device matched the requested type";
    DeviceNotAvailable = -2, "CL_DEVICE_NOT_AVAILABLE", "device is currently unavailable";
    CompilerNotAvailable = -3, "CL_COMPILER_NOT_AVAILABLE", "platform has no online compiler";
    MemObjectAllocationFailure = -4, "CL_MEM_OBJECT_ALLOCATION_FAILURE", "could not allocate memory for a memory object";
    OutOfResources = -5, "CL_OUT_OF_RESOURCES", "device resources exhausted";
    OutOfHostMemory = -6, "CL_OUT_OF_HOST_MEMORY", "host memory exhausted inside the driver";
    ProfilingInfoNotAvailable = -7, "CL_PROFILING_INFO_NOT_AVAILABLE", "queue was created without profiling or command is not complete";
    MemCopyOverlap = -8, "CL_MEM_COPY_OVERLAP", "source and destination regions overlap";
    ImageFormatMismatch = -9, "CL_IMAGE_FORMAT_MISMATCH", "source and destination image formats differ";
    ImageFormatNotSupported = -10, "CL_IMAGE_FORMAT_NOT_SUPPORTED", "image format not supported by the device";
    BuildProgramFailure = -11, "CL_BUILD_PROGRAM_FAILURE", "program build failed, see the build log";
    MapFailure = -12, "CL_MAP_FAILURE", "memory object could not be mapped";
    MisalignedSubBufferOffset = -13, "CL_MISALIGNED_SUB_BUFFER_OFFSET", "sub-buffer origin is not aligned to the device base address alignment";
    ExecStatusErrorForEventsInWaitList = -14, "CL_EXEC_STATUS_ERROR_FOR_EVENTS_IN_WAIT_LIST", "an event in the wait list failed";
    CompileProgramFailure = -15, "CL_COMPILE_PROGRAM_FAILURE", "program compilation failed";
    LinkerNotAvailable = -16, "CL_LINKER_NOT_AVAILABLE", "platform has no linker";
    LinkProgramFailure = -17, "CL_LINK_PROGRAM_FAILURE", "program link failed";
    DevicePartitionFailed = -18, "CL_DEVICE_PARTITION_FAILED", "device could not be partitioned";
    KernelArgInfoNotAvailable = -19, "CL_KERNEL_ARG_INFO_NOT_AVAILABLE", "program was not built with argument info";
    InvalidValue = -30, "CL_INVALID_VALUE", "an argument value is out of range";
    InvalidDeviceType = -31, "CL_INVALID_DEVICE_TYPE", "device type is not valid";
    InvalidPlatform = -32, "CL_INVALID_PLATFORM", "platform handle is not valid";
    InvalidDevice = -33, "CL_INVALID_DEVICE", "device handle is not valid";
    InvalidContext = -34, "CL_INVALID_CONTEXT", "context handle is not valid";
    InvalidQueueProperties = -35, "CL_INVALID_QUEUE_PROPERTIES", "queue properties are not supported by the device";
    InvalidCommandQueue = -36, "CL_INVALID_COMMAND_QUEUE", "command queue handle is not valid";
    InvalidHostPtr = -37, "CL_INVALID_HOST_PTR", "host pointer does not match the memory flags";
    InvalidMemObject = -38, "CL_INVALID_MEM_OBJECT", "memory object handle is not valid";
    InvalidImageFormatDescriptor = -39, "CL_INVALID_IMAGE_FORMAT_DESCRIPTOR", "image format descriptor is not valid";
    InvalidImageSize = -40, "CL_INVALID_IMAGE_SIZE", "image dimensions are not supported";
    InvalidSampler = -41, "CL_INVALID_SAMPLER", "sampler handle is not valid";
    InvalidBinary = -42, "CL_INVALID_BINARY", "program binary is not valid for the device";
    InvalidBuildOptions = -43, "CL_INVALID_BUILD_OPTIONS", "build options are not valid";
    InvalidProgram = -44, "CL_INVALID_PROGRAM", "program handle is not valid";
    InvalidProgramExecutable = -45, "CL_INVALID_PROGRAM_EXECUTABLE", "program has no successfully built executable";
    InvalidKernelName = -46, "CL_INVALID_KERNEL_NAME", "kernel name not found in program";
    InvalidKernelDefinition = -47, "CL_INVALID_KERNEL_DEFINITION", "kernel definition differs between devices";
    InvalidKernel = -48, "CL_INVALID_KERNEL", "kernel handle is not valid";
    InvalidArgIndex = -49, "CL_INVALID_ARG_INDEX", "kernel argument index out of range";
    InvalidArgValue = -50, "CL_INVALID_ARG_VALUE", "kernel argument value is not valid";
    InvalidArgSize = -51, "CL_INVALID_ARG_SIZE", "kernel argument size does not match";
    InvalidKernelArgs = -52, "CL_INVALID_KERNEL_ARGS", "kernel arguments have not all been set";
    InvalidWorkDimension = -53, "CL_INVALID_WORK_DIMENSION", "work dimension out of range";
    InvalidWorkGroupSize = -54, "CL_INVALID_WORK_GROUP_SIZE", "local work size is not valid";
    InvalidWorkItemSize = -55, "CL_INVALID_WORK_ITEM_SIZE", "work item count exceeds the device limit";
    InvalidGlobalOffset = -56, "CL_INVALID_GLOBAL_OFFSET", "global offset is not valid";
    InvalidEventWaitList = -57, "CL_INVALID_EVENT_WAIT_LIST", "event wait list is not valid";
    InvalidEvent = -58, "CL_INVALID_EVENT", "event handle is not valid";
    InvalidOperation = -59, "CL_INVALID_OPERATION", "operation is not valid in the current state";
    InvalidGlObject = -60, "CL_INVALID_GL_OBJECT", "GL object is not valid";
    InvalidBufferSize = -61, "CL_INVALID_BUFFER_SIZE", "buffer size is zero or too large";
    InvalidMipLevel = -62, "CL_INVALID_MIP_LEVEL", "mip level is not valid";
    InvalidGlobalWorkSize = -63, "CL_INVALID_GLOBAL_WORK_SIZE", "global work size is not valid";
    InvalidProperty = -64, "CL_INVALID_PROPERTY", "property name or value is not valid";
    InvalidImageDescriptor = -65, "CL_INVALID_IMAGE_DESCRIPTOR", "image descriptor is not valid";
    InvalidCompilerOptions = -66, "CL_INVALID_COMPILER_OPTIONS", "compiler options are not valid";
    InvalidLinkerOptions = -67, "CL_INVALID_LINKER_OPTIONS", "linker options are not valid";
    InvalidDevicePartitionCount = -68, "CL_INVALID_DEVICE_PARTITION_COUNT", "partition count is not valid";
    InvalidPipeSize = -69, "CL_INVALID_PIPE_SIZE", "pipe packet size or count is not valid";
    InvalidDeviceQueue = -70, "CL_INVALID_DEVICE_QUEUE", "device queue is not valid";
}

impl StatusCode {
    /// Failures that indicate the driver ran out of something rather than
    /// rejecting the caller's input.
    pub fn is_resource_exhaustion(self) -> bool {
        matches!(
            self,
            Self::MemObjectAllocationFailure
                | Self::OutOfResources
                | Self::OutOfHostMemory
                | Self::DeviceNotAvailable
        )
    }

    /// Failures that name a stale or foreign object handle.
    pub fn is_invalid_object(self) -> bool {
        matches!(
            self,
            Self::InvalidPlatform
                | Self::InvalidDevice
                | Self::InvalidContext
                | Self::InvalidCommandQueue
                | Self::InvalidMemObject
                | Self::InvalidSampler
                | Self::InvalidProgram
                | Self::InvalidKernel
                | Self::InvalidEvent
        )
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name(), self.description())
    }
}

/// Translate a native result into a structured outcome.
pub fn translate(code: ClInt) -> std::result::Result<(), StatusCode> {
    if code == CL_SUCCESS {
        Ok(())
    } else {
        Err(StatusCode::from_code(code))
    }
}

/// Translate and attach the operation name, producing the facade error.
pub fn check(code: ClInt, op: &'static str) -> Result<()> {
    translate(code).map_err(|status| {
        tracing::debug!(op, code, status = status.name(), "native call failed");
        OclinkError::NativeCall { op, status, code }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_translates_to_ok() {
        assert!(translate(CL_SUCCESS).is_ok());
        assert!(check(CL_SUCCESS, "clFinish").is_ok());
    }

    #[test]
    fn known_code_round_trips_name() {
        let status = translate(-38).unwrap_err();
        assert_eq!(status, StatusCode::InvalidMemObject);
        assert_eq!(status.code(), -38);
        assert_eq!(status.name(), "CL_INVALID_MEM_OBJECT");
    }

    #[test]
    fn unknown_code_is_preserved() {
        let status = translate(-1001).unwrap_err();
        assert_eq!(status, StatusCode::Unknown(-1001));
        assert_eq!(status.code(), -1001);
    }

    #[test]
    fn positive_codes_are_failures_too() {
        // Only the zero sentinel is success.
        assert!(translate(1).is_err());
    }

    #[test]
    fn check_carries_operation_name() {
        match check(-5, "clEnqueueNDRangeKernel") {
            Err(OclinkError::NativeCall { op, status, code }) => {
                assert_eq!(op, "clEnqueueNDRangeKernel");
                assert_eq!(status, StatusCode::OutOfResources);
                assert_eq!(code, -5);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
