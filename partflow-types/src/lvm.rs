// SPDX-License-Identifier: GPL-3.0-only

//! LVM (Logical Volume Manager) scan rows.
//!
//! Shapes produced by the field-query wrappers in partflow-sys and consumed
//! by the engine when composing volume-group devices.

use serde::{Deserialize, Serialize};

/// Volume group information as reported by `vgs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VgInfo {
    /// Volume group name
    pub name: String,

    /// Volume group UUID ("---" when the query failed)
    pub uuid: String,

    /// Physical extent size in bytes
    pub pe_size: i64,

    /// Total physical extents (-1 when unknown)
    pub total_pe: i64,

    /// Allocated physical extents (-1 when unknown)
    pub alloc_pe: i64,

    /// Free physical extents (-1 when unknown)
    pub free_pe: i64,
}

impl VgInfo {
    /// Total size in bytes, when extent counts resolved.
    pub fn size_bytes(&self) -> Option<u64> {
        if self.pe_size < 0 || self.total_pe < 0 {
            return None;
        }
        Some(self.pe_size as u64 * self.total_pe as u64)
    }
}

/// Logical volume information as reported by `lvs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LvInfo {
    /// Parent volume group name
    pub vg_name: String,

    /// Device path (e.g., "/dev/vg0/root")
    pub lv_path: String,

    /// Size in bytes (-1 when unknown)
    pub size: i64,

    /// Whether the logical volume is active
    pub active: bool,
}

impl LvInfo {
    /// Short display form "vg/lv" derived from the path.
    pub fn display_name(&self) -> String {
        self.lv_path
            .strip_prefix("/dev/")
            .unwrap_or(&self.lv_path)
            .to_string()
    }
}

/// Physical volume information as reported by `pvs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PvInfo {
    /// Device path of the partition carrying the PV signature
    pub device: String,

    /// Volume group name (None if not assigned)
    pub vg_name: Option<String>,

    /// Total size in bytes (-1 when unknown)
    pub size: i64,

    /// Free space in bytes (-1 when unknown)
    pub free: i64,
}

impl PvInfo {
    /// Check if this PV is assigned to a VG.
    pub fn is_assigned(&self) -> bool {
        self.vg_name.is_some()
    }
}
