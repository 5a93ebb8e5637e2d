// SPDX-License-Identifier: GPL-3.0-only

//! LVM volume group presented as a device.
//!
//! The real on-disk entities are physical volumes living inside ordinary
//! partitions (possibly inside LUKS); this type maps them onto one virtual
//! device whose table children are logical volumes with synthetic,
//! contiguous sector ranges.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::VolumeManager;

/// Kind-specific data of an LVM volume-group device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LvmDevice {
    pub vg_name: String,

    /// VG UUID ("---" when the field query failed).
    pub uuid: String,

    /// Physical extent size in bytes.
    pub pe_size: u64,

    /// Extent counts; -1 when unknown. Invariant when known:
    /// alloc_pe + free_pe == total_pe.
    pub total_pe: i64,
    pub alloc_pe: i64,
    pub free_pe: i64,

    /// Logical volume path -> length in sectors, in mapped order.
    pub lv_sizes: BTreeMap<String, u64>,

    /// Device nodes of the partitions acting as PVs for this VG. These are
    /// references into other devices' partition trees, kept in sync by
    /// rescanning, never by incremental patching.
    pub physical_volumes: Vec<String>,
}

impl LvmDevice {
    pub fn new(vg_name: impl Into<String>, uuid: impl Into<String>, pe_size: u64) -> Self {
        Self {
            vg_name: vg_name.into(),
            uuid: uuid.into(),
            pe_size,
            total_pe: -1,
            alloc_pe: -1,
            free_pe: -1,
            lv_sizes: BTreeMap::new(),
            physical_volumes: Vec::new(),
        }
    }

    /// Whether the extent accounting resolved and is self-consistent.
    pub fn extents_consistent(&self) -> bool {
        self.total_pe >= 0
            && self.alloc_pe >= 0
            && self.free_pe >= 0
            && self.alloc_pe + self.free_pe == self.total_pe
    }

    /// Mapped sector layout of the logical volumes: each LV starts at the
    /// cumulative length of the LVs ordered before it. The order is the
    /// sorted LV path order, so the layout is stable across rescans. This
    /// mapping is a presentation convenience; it corresponds to no physical
    /// geometry.
    pub fn mapped_lv_layout(&self) -> Vec<(String, u64, u64)> {
        let mut layout = Vec::with_capacity(self.lv_sizes.len());
        let mut cursor = 0u64;
        for (lv_path, length) in &self.lv_sizes {
            if *length == 0 {
                continue;
            }
            layout.push((lv_path.clone(), cursor, cursor + length - 1));
            cursor += length;
        }
        layout
    }

    /// Total mapped length in sectors.
    pub fn mapped_sectors(&self) -> u64 {
        self.lv_sizes.values().sum()
    }
}

impl VolumeManager for LvmDevice {
    fn member_nodes(&self) -> Vec<String> {
        self.physical_volumes.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lvs_map_to_cumulative_sector_ranges() {
        let mut device = LvmDevice::new("vg0", "uuid", 4 * 1024 * 1024);
        device.lv_sizes.insert("/dev/vg0/lv1".to_string(), 100);
        device.lv_sizes.insert("/dev/vg0/lv2".to_string(), 200);

        let layout = device.mapped_lv_layout();
        assert_eq!(
            layout,
            vec![
                ("/dev/vg0/lv1".to_string(), 0, 99),
                ("/dev/vg0/lv2".to_string(), 100, 299),
            ]
        );
        assert_eq!(device.mapped_sectors(), 300);
    }

    #[test]
    fn extent_invariant_detects_inconsistency() {
        let mut device = LvmDevice::new("vg0", "uuid", 4 * 1024 * 1024);
        device.total_pe = 100;
        device.alloc_pe = 60;
        device.free_pe = 40;
        assert!(device.extents_consistent());

        device.free_pe = 50;
        assert!(!device.extents_consistent());

        device.free_pe = -1;
        assert!(!device.extents_consistent());
    }
}
