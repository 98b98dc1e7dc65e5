// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Answers to `clGet*Info` queries against the simulated object table.

use oclink_core::info;
use oclink_core::status::ClInt;
use oclink_core::types::{QueueProperties, RawHandle, VersionTier};

use crate::api::InfoTarget;

use super::state::{
    Body, CL_INVALID_MEM_OBJECT, CL_INVALID_VALUE, CL_PROFILING_INFO_NOT_AVAILABLE, CL_SUCCESS,
    SimState,
};

const CL_MEM_OBJECT_BUFFER: u32 = 0x10F0;
const CL_MEM_OBJECT_PIPE: u32 = 0x10F7;

fn text(s: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(s.len() + 1);
    bytes.extend_from_slice(s.as_bytes());
    bytes.push(0);
    bytes
}

fn u32v(v: u32) -> Vec<u8> {
    v.to_ne_bytes().to_vec()
}

fn i32v(v: i32) -> Vec<u8> {
    v.to_ne_bytes().to_vec()
}

fn u64v(v: u64) -> Vec<u8> {
    v.to_ne_bytes().to_vec()
}

fn usizev(v: usize) -> Vec<u8> {
    v.to_ne_bytes().to_vec()
}

fn handles(list: &[RawHandle]) -> Vec<u8> {
    list.iter().flat_map(|h| h.0.to_ne_bytes()).collect()
}

fn handle(h: RawHandle) -> Vec<u8> {
    usizev(h.0)
}

/// Copy `bytes` out following the two-call convention.
pub(super) fn answer(bytes: &[u8], value: Option<&mut [u8]>, size_ret: &mut usize) -> ClInt {
    *size_ret = bytes.len();
    if let Some(buf) = value {
        if buf.len() < bytes.len() {
            return CL_INVALID_VALUE;
        }
        buf[..bytes.len()].copy_from_slice(bytes);
    }
    CL_SUCCESS
}

pub(super) fn version_string(tier: VersionTier) -> String {
    format!("OpenCL {tier} oclink-sim")
}

impl SimState {
    pub(super) fn info(&self, tier: VersionTier, target: InfoTarget, param: u32) -> Result<Vec<u8>, ClInt> {
        let (kind, subject) = target.subject();
        let obj = self.get(subject, kind)?;
        let refs = obj.refs;
        let bytes = match (target, &obj.body) {
            (InfoTarget::Platform(_), Body::Platform) => match param {
                info::platform::PROFILE => text("FULL_PROFILE"),
                info::platform::VERSION => text(&version_string(tier)),
                info::platform::NAME => text("oclink simulated platform"),
                info::platform::VENDOR => text("oclink"),
                info::platform::EXTENSIONS => text(""),
                _ => return Err(CL_INVALID_VALUE),
            },
            (
                InfoTarget::Device(_),
                Body::Device {
                    device_type,
                    name,
                    compute_units,
                    parent,
                },
            ) => match param {
                info::device::TYPE => u64v(device_type.bits()),
                info::device::MAX_COMPUTE_UNITS => u32v(*compute_units),
                info::device::MAX_WORK_GROUP_SIZE => usizev(256),
                info::device::GLOBAL_MEM_SIZE => u64v(1 << 30),
                info::device::NAME => text(name),
                info::device::VENDOR => text("oclink"),
                info::device::DRIVER_VERSION => text(env!("CARGO_PKG_VERSION")),
                info::device::VERSION => text(&version_string(tier)),
                info::device::EXTENSIONS => text(""),
                info::device::PLATFORM => handle(self.platform),
                info::device::PARENT_DEVICE if tier >= VersionTier::V1_2 => {
                    handle(parent.unwrap_or(RawHandle::NULL))
                }
                info::device::PARTITION_MAX_SUB_DEVICES if tier >= VersionTier::V1_2 => {
                    u32v(*compute_units)
                }
                info::device::REFERENCE_COUNT if tier >= VersionTier::V1_2 => u32v(refs),
                _ => return Err(CL_INVALID_VALUE),
            },
            (InfoTarget::Context(_), Body::Context { devices, .. }) => match param {
                info::context::REFERENCE_COUNT => u32v(refs),
                info::context::DEVICES => handles(devices),
                info::context::NUM_DEVICES => u32v(devices.len() as u32),
                info::context::PROPERTIES => Vec::new(),
                _ => return Err(CL_INVALID_VALUE),
            },
            (
                InfoTarget::CommandQueue(_),
                Body::Queue {
                    context,
                    device,
                    properties,
                },
            ) => match param {
                info::queue::CONTEXT => handle(*context),
                info::queue::DEVICE => handle(*device),
                info::queue::REFERENCE_COUNT => u32v(refs),
                info::queue::PROPERTIES => u64v(*properties),
                _ => return Err(CL_INVALID_VALUE),
            },
            (InfoTarget::Memory(_), body) => self.memory_info(subject, body, refs, param)?,
            (
                InfoTarget::Image(_),
                Body::Image {
                    format,
                    dims,
                    element_size,
                    ..
                },
            ) => match param {
                info::image::FORMAT => {
                    let mut bytes = u32v(format.channel_order);
                    bytes.extend(u32v(format.channel_data_type));
                    bytes
                }
                info::image::ELEMENT_SIZE => usizev(*element_size),
                info::image::ROW_PITCH => usizev(dims[0] * element_size),
                info::image::WIDTH => usizev(dims[0]),
                info::image::HEIGHT => usizev(dims[1]),
                info::image::DEPTH => usizev(dims[2]),
                _ => return Err(CL_INVALID_VALUE),
            },
            (
                InfoTarget::Pipe(_),
                Body::Pipe {
                    packet_size,
                    max_packets,
                    ..
                },
            ) => match param {
                info::pipe::PACKET_SIZE => u32v(*packet_size),
                info::pipe::MAX_PACKETS => u32v(*max_packets),
                _ => return Err(CL_INVALID_VALUE),
            },
            (
                InfoTarget::Sampler(_),
                Body::Sampler {
                    context,
                    normalized,
                    addressing,
                    filter,
                },
            ) => match param {
                info::sampler::REFERENCE_COUNT => u32v(refs),
                info::sampler::CONTEXT => handle(*context),
                info::sampler::NORMALIZED_COORDS => u32v(u32::from(*normalized)),
                info::sampler::ADDRESSING_MODE => u32v(*addressing),
                info::sampler::FILTER_MODE => u32v(*filter),
                _ => return Err(CL_INVALID_VALUE),
            },
            (
                InfoTarget::Program(_),
                Body::Program {
                    context,
                    devices,
                    source,
                    kernels,
                    build_status,
                    ..
                },
            ) => match param {
                info::program::REFERENCE_COUNT => u32v(refs),
                info::program::CONTEXT => handle(*context),
                info::program::NUM_DEVICES => u32v(devices.len() as u32),
                info::program::DEVICES => handles(devices),
                info::program::SOURCE => text(source),
                info::program::BINARY_SIZES => devices
                    .iter()
                    .flat_map(|_| source.len().to_ne_bytes())
                    .collect(),
                info::program::KERNEL_NAMES if *build_status == 0 => {
                    let names: Vec<&str> = kernels.iter().map(|k| k.name.as_str()).collect();
                    text(&names.join(";"))
                }
                _ => return Err(CL_INVALID_VALUE),
            },
            (
                InfoTarget::ProgramBuild { device, .. },
                Body::Program {
                    devices,
                    options,
                    build_status,
                    log,
                    ..
                },
            ) => {
                if !devices.contains(&device) {
                    return Err(super::state::CL_INVALID_DEVICE);
                }
                match param {
                    info::build::STATUS => i32v(*build_status),
                    info::build::OPTIONS => text(options),
                    info::build::LOG => text(log),
                    _ => return Err(CL_INVALID_VALUE),
                }
            }
            (
                InfoTarget::Kernel(_),
                Body::Kernel {
                    context,
                    program,
                    name,
                    arg_names,
                    ..
                },
            ) => match param {
                info::kernel::FUNCTION_NAME => text(name),
                info::kernel::NUM_ARGS => u32v(arg_names.len() as u32),
                info::kernel::REFERENCE_COUNT => u32v(refs),
                info::kernel::CONTEXT => handle(*context),
                info::kernel::PROGRAM => handle(*program),
                _ => return Err(CL_INVALID_VALUE),
            },
            (InfoTarget::KernelWorkGroup { .. }, Body::Kernel { .. }) => match param {
                info::work_group::WORK_GROUP_SIZE => usizev(256),
                info::work_group::COMPILE_WORK_GROUP_SIZE => {
                    [0usize; 3].iter().flat_map(|v| v.to_ne_bytes()).collect()
                }
                info::work_group::LOCAL_MEM_SIZE => u64v(0),
                _ => return Err(CL_INVALID_VALUE),
            },
            (InfoTarget::KernelArg { index, .. }, Body::Kernel { arg_names, .. }) => {
                let Some(arg) = arg_names.get(index as usize) else {
                    return Err(super::state::CL_INVALID_ARG_INDEX);
                };
                match param {
                    info::kernel_arg::NAME => text(arg),
                    _ => return Err(CL_INVALID_VALUE),
                }
            }
            (
                InfoTarget::Event(_),
                Body::Event {
                    context,
                    queue,
                    command_type,
                    status,
                    ..
                },
            ) => match param {
                info::event::COMMAND_QUEUE => handle(queue.unwrap_or(RawHandle::NULL)),
                info::event::COMMAND_TYPE => u32v(*command_type),
                info::event::REFERENCE_COUNT => u32v(refs),
                info::event::COMMAND_EXECUTION_STATUS => i32v(*status),
                info::event::CONTEXT => handle(*context),
                _ => return Err(CL_INVALID_VALUE),
            },
            (
                InfoTarget::EventProfiling(_),
                Body::Event {
                    queue,
                    status,
                    times,
                    ..
                },
            ) => {
                let profiled = queue
                    .and_then(|q| self.context_of_queue(q).ok())
                    .is_some_and(|(_, props)| {
                        QueueProperties::from_bits_truncate(props).contains(QueueProperties::PROFILING_ENABLE)
                    });
                if !profiled || *status != 0 {
                    return Err(CL_PROFILING_INFO_NOT_AVAILABLE);
                }
                match param {
                    info::profiling::QUEUED => u64v(times[0]),
                    info::profiling::SUBMIT => u64v(times[1]),
                    info::profiling::START => u64v(times[2]),
                    info::profiling::END => u64v(times[3]),
                    _ => return Err(CL_INVALID_VALUE),
                }
            }
            (InfoTarget::Image(_) | InfoTarget::Pipe(_), _) => return Err(CL_INVALID_MEM_OBJECT),
            _ => return Err(super::state::invalid_code(kind)),
        };
        Ok(bytes)
    }

    fn memory_info(&self, mem: RawHandle, body: &Body, refs: u32, param: u32) -> Result<Vec<u8>, ClInt> {
        let (context, flags, size, mem_type, offset) = match body {
            Body::Buffer { context, flags, data } => (*context, *flags, data.len(), CL_MEM_OBJECT_BUFFER, 0),
            Body::SubBuffer {
                context,
                flags,
                origin,
                size,
            } => (*context, *flags, *size, CL_MEM_OBJECT_BUFFER, *origin),
            Body::Image {
                context,
                flags,
                image_type,
                data,
                ..
            } => (*context, *flags, data.len(), *image_type, 0),
            Body::Pipe {
                context,
                flags,
                packet_size,
                max_packets,
            } => (
                *context,
                *flags,
                *packet_size as usize * *max_packets as usize,
                CL_MEM_OBJECT_PIPE,
                0,
            ),
            _ => return Err(CL_INVALID_MEM_OBJECT),
        };
        let associated = match body {
            Body::SubBuffer { .. } => self.objects.get(&mem).and_then(|o| o.holds),
            _ => None,
        };
        Ok(match param {
            info::memory::TYPE => u32v(mem_type),
            info::memory::FLAGS => u64v(flags.bits()),
            info::memory::SIZE => usizev(size),
            info::memory::HOST_PTR => usizev(0),
            info::memory::MAP_COUNT => u32v(
                self.mappings.values().filter(|m| m.mem == mem).count() as u32,
            ),
            info::memory::REFERENCE_COUNT => u32v(refs),
            info::memory::CONTEXT => handle(context),
            info::memory::ASSOCIATED_MEMOBJECT => handle(associated.unwrap_or(RawHandle::NULL)),
            info::memory::OFFSET => usizev(offset),
            _ => return Err(CL_INVALID_VALUE),
        })
    }
}

#[cfg(test)]
mod tests {
    use oclink_core::types::HandleKind;

    use super::*;

    #[test]
    fn two_call_answer() {
        let bytes = text("abc");
        let mut size = 0;
        assert_eq!(answer(&bytes, None, &mut size), CL_SUCCESS);
        assert_eq!(size, 4);
        let mut small = [0u8; 2];
        assert_eq!(answer(&bytes, Some(&mut small), &mut size), CL_INVALID_VALUE);
        let mut exact = vec![0u8; size];
        assert_eq!(answer(&bytes, Some(&mut exact), &mut size), CL_SUCCESS);
        assert_eq!(exact, b"abc\0");
    }

    #[test]
    fn platform_version_reflects_tier() {
        let state = SimState::new();
        let bytes = state
            .info(VersionTier::V1_1, InfoTarget::Platform(state.platform), info::platform::VERSION)
            .expect("version");
        assert_eq!(bytes, text("OpenCL 1.1 oclink-sim"));
        assert_eq!(
            VersionTier::parse_version_string(&version_string(VersionTier::V2_0)),
            Some(VersionTier::V2_0)
        );
    }

    #[test]
    fn device_refcount_query_needs_1_2() {
        let state = SimState::new();
        let device = state.devices[0];
        assert_eq!(
            state.info(VersionTier::V1_1, InfoTarget::Device(device), info::device::REFERENCE_COUNT),
            Err(CL_INVALID_VALUE)
        );
        assert!(state
            .info(VersionTier::V1_2, InfoTarget::Device(device), info::device::REFERENCE_COUNT)
            .is_ok());
    }

    #[test]
    fn unknown_subject_is_invalid_object() {
        let state = SimState::new();
        assert_eq!(
            state.info(VersionTier::V2_0, InfoTarget::Context(RawHandle(0x9999)), info::context::NUM_DEVICES),
            Err(super::super::state::invalid_code(HandleKind::Context))
        );
    }
}
