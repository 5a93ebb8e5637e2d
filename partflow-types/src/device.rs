// SPDX-License-Identifier: GPL-3.0-only

//! Device kind tags shared between the scanner and the engine.

use serde::{Deserialize, Serialize};

/// What kind of block device an entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKindTag {
    /// Physical disk with an MBR/GPT partition table.
    Disk,
    /// LVM volume group presented as one virtual device.
    LvmVolumeGroup,
    /// Assembled software RAID array.
    SoftwareRaid,
}

impl DeviceKindTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disk => "disk",
            Self::LvmVolumeGroup => "lvm-vg",
            Self::SoftwareRaid => "md-raid",
        }
    }
}
