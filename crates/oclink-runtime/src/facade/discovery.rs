// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform, device and sub-device discovery.

use oclink_core::error::{OclinkError, Result};
use oclink_core::info;
use oclink_core::status::{CL_SUCCESS, StatusCode, check};
use oclink_core::types::{DeviceType, RawHandle, VersionTier};
use oclink_native::EntryPoint;
use oclink_native::api::InfoTarget;
use tracing::{debug, instrument};

use super::{ComputeFacade, invalid_argument};
use crate::handle::{DeviceHandle, Handle, PlatformHandle};

const CL_DEVICE_PARTITION_EQUALLY: isize = 0x1086;
const CL_DEVICE_PARTITION_BY_COUNTS: isize = 0x1087;
const CL_DEVICE_PARTITION_BY_COUNTS_LIST_END: isize = 0;

/// How a device is split into sub-devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Partition {
    /// As many sub-devices as fit, each with this many compute units.
    Equally(u32),
    /// One sub-device per entry, with that many compute units.
    ByCounts(Vec<u32>),
}

impl Partition {
    /// Zero-terminated native property list.
    fn properties(&self) -> Vec<isize> {
        match self {
            Self::Equally(units) => vec![CL_DEVICE_PARTITION_EQUALLY, *units as isize, 0],
            Self::ByCounts(counts) => {
                let mut props = Vec::with_capacity(counts.len() + 3);
                props.push(CL_DEVICE_PARTITION_BY_COUNTS);
                props.extend(counts.iter().map(|c| *c as isize));
                props.push(CL_DEVICE_PARTITION_BY_COUNTS_LIST_END);
                props.push(0);
                props
            }
        }
    }
}

impl ComputeFacade {
    /// Every platform the library exposes.
    #[instrument(skip(self))]
    pub fn platforms(&self) -> Result<Vec<PlatformHandle>> {
        let op = EntryPoint::GetPlatformIds.symbol();
        let view = self.view()?;
        let api = view.entry(EntryPoint::GetPlatformIds)?;
        let mut count = 0u32;
        check(api.get_platform_ids(None, &mut count), op)?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut raw = vec![RawHandle::NULL; count as usize];
        check(api.get_platform_ids(Some(&mut raw), &mut count), op)?;
        raw.truncate(count as usize);
        raw.into_iter().map(|h| Handle::new(h, op)).collect()
    }

    /// Devices of `device_type` on `platform`. No matching device is an
    /// empty list, not an error.
    #[instrument(skip(self), fields(platform = %platform))]
    pub fn devices(&self, platform: PlatformHandle, device_type: DeviceType) -> Result<Vec<DeviceHandle>> {
        let op = EntryPoint::GetDeviceIds.symbol();
        let view = self.view()?;
        let api = view.entry(EntryPoint::GetDeviceIds)?;
        let mut count = 0u32;
        match api.get_device_ids(platform.raw(), device_type, None, &mut count) {
            code if code == StatusCode::DeviceNotFound.code() => return Ok(Vec::new()),
            code => check(code, op)?,
        }
        let mut raw = vec![RawHandle::NULL; count as usize];
        check(
            api.get_device_ids(platform.raw(), device_type, Some(&mut raw), &mut count),
            op,
        )?;
        raw.truncate(count as usize);
        debug!(count = raw.len(), ?device_type, "devices enumerated");
        raw.into_iter().map(|h| Handle::new(h, op)).collect()
    }

    /// Partition `device`. Sub-devices are reference counted; those carved
    /// from another sub-device keep it alive.
    #[instrument(skip(self), fields(device = %device))]
    pub fn create_sub_devices(&self, device: DeviceHandle, partition: &Partition) -> Result<Vec<DeviceHandle>> {
        let op = EntryPoint::CreateSubDevices.symbol();
        if let Partition::ByCounts(counts) = partition {
            if counts.is_empty() || counts.contains(&0) {
                return Err(invalid_argument(op, "partition counts must be non-empty and non-zero"));
            }
        }
        let parent = self.live(device, op)?;
        let props = partition.properties();
        let view = self.view()?;
        let api = view.entry(EntryPoint::CreateSubDevices)?;
        let mut count = 0u32;
        check(api.create_sub_devices(parent, &props, None, &mut count), op)?;
        let mut raw = vec![RawHandle::NULL; count as usize];
        check(api.create_sub_devices(parent, &props, Some(&mut raw), &mut count), op)?;
        raw.truncate(count as usize);
        raw.into_iter()
            .map(|h| self.adopt(EntryPoint::CreateSubDevices, h, CL_SUCCESS, Some(parent)))
            .collect()
    }

    /// Tier the platform reports in its version string.
    pub fn platform_version(&self, platform: PlatformHandle) -> Result<VersionTier> {
        let version = self.query_string(InfoTarget::Platform(platform.raw()), info::platform::VERSION)?;
        VersionTier::parse_version_string(&version).ok_or_else(|| OclinkError::QueryDecode {
            op: EntryPoint::GetPlatformInfo.symbol(),
            param: info::platform::VERSION,
            reason: format!("unrecognised version string {version:?}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_counts_list_is_double_terminated() {
        let props = Partition::ByCounts(vec![2, 1]).properties();
        assert_eq!(props, vec![CL_DEVICE_PARTITION_BY_COUNTS, 2, 1, 0, 0]);
        assert_eq!(
            Partition::Equally(4).properties(),
            vec![CL_DEVICE_PARTITION_EQUALLY, 4, 0]
        );
    }
}
