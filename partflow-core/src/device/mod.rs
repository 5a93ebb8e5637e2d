// SPDX-License-Identifier: GPL-3.0-only

//! Block-device model.
//!
//! One [`Device`] per physical disk, detected LVM volume group, or assembled
//! RAID array. Every device owns exactly one partition table (nullable until
//! scanned). Instead of a deep inheritance tree, the kind-specific data is a
//! closed set of tagged variants dispatched through the [`VolumeManager`]
//! capability trait.

mod lvm;
mod raid;

pub use lvm::LvmDevice;
pub use raid::SoftwareRaid;

use serde::{Deserialize, Serialize};

use crate::partition::PartitionTable;
use partflow_types::DeviceKindTag;

/// Kind-specific payload of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Raw disk with an MBR/GPT table.
    Disk,
    /// LVM volume group; its "partitions" are logical volumes.
    Lvm(LvmDevice),
    /// Software RAID array; its table holds the array as one partition.
    Raid(SoftwareRaid),
}

impl DeviceKind {
    pub fn tag(&self) -> DeviceKindTag {
        match self {
            Self::Disk => DeviceKindTag::Disk,
            Self::Lvm(_) => DeviceKindTag::LvmVolumeGroup,
            Self::Raid(_) => DeviceKindTag::SoftwareRaid,
        }
    }
}

/// Capability of devices whose "partitions" are logical constructs mapped
/// onto other block devices.
pub trait VolumeManager {
    /// Device nodes of the constituent members (PVs / RAID members).
    fn member_nodes(&self) -> Vec<String>;
}

/// A physical or virtual block device owning one partition table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Device node path (e.g., "/dev/sda", "/dev/vg0").
    pub node: String,

    /// Human-readable name (disk model, VG name, array name).
    pub name: String,

    /// Icon hint for display layers.
    pub icon: String,

    pub logical_sector_size: u64,
    pub physical_sector_size: u64,
    pub total_sectors: u64,

    pub kind: DeviceKind,

    /// The partition table; None before the device is scanned.
    pub table: Option<PartitionTable>,
}

impl Device {
    pub fn new_disk(
        node: impl Into<String>,
        name: impl Into<String>,
        logical_sector_size: u64,
        physical_sector_size: u64,
        total_sectors: u64,
    ) -> Self {
        Self {
            node: node.into(),
            name: name.into(),
            icon: "drive-harddisk".to_string(),
            logical_sector_size,
            physical_sector_size,
            total_sectors,
            kind: DeviceKind::Disk,
            table: None,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.total_sectors * self.logical_sector_size
    }

    /// The volume-manager capability, for LVM/RAID devices.
    pub fn volume_manager(&self) -> Option<&dyn VolumeManager> {
        match &self.kind {
            DeviceKind::Disk => None,
            DeviceKind::Lvm(lvm) => Some(lvm),
            DeviceKind::Raid(raid) => Some(raid),
        }
    }

    pub fn as_lvm(&self) -> Option<&LvmDevice> {
        match &self.kind {
            DeviceKind::Lvm(lvm) => Some(lvm),
            _ => None,
        }
    }

    pub fn as_lvm_mut(&mut self) -> Option<&mut LvmDevice> {
        match &mut self.kind {
            DeviceKind::Lvm(lvm) => Some(lvm),
            _ => None,
        }
    }

    pub fn as_raid_mut(&mut self) -> Option<&mut SoftwareRaid> {
        match &mut self.kind {
            DeviceKind::Raid(raid) => Some(raid),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_devices_have_no_volume_manager() {
        let device = Device::new_disk("/dev/sda", "Test Disk", 512, 4096, 1_000_000);
        assert!(device.volume_manager().is_none());
        assert_eq!(device.kind.tag(), DeviceKindTag::Disk);
        assert_eq!(device.capacity(), 512_000_000);
    }
}
