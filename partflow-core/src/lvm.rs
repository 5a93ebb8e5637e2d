// SPDX-License-Identifier: GPL-3.0-only

//! Cross-device LVM physical-volume bookkeeping.
//!
//! PV membership can only be determined after scanning every device, so the
//! scanner builds this context once per scan and operations append/remove
//! specific entries during preview/undo. The context is threaded explicitly
//! through the device model; there is no process-wide state, so independent
//! scan sessions (and tests) never interfere.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One discovered LVM physical volume, anywhere on the system (including
/// inside an open LUKS container).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PvEntry {
    /// Device node carrying the PV signature.
    pub device_node: String,

    /// Volume group this PV belongs to, if any.
    pub vg_name: Option<String>,

    /// Total size in bytes (-1 when unknown).
    pub size: i64,

    /// Free space in bytes (-1 when unknown).
    pub free: i64,

    /// Whether the PV sits inside a closed LUKS container. Cleared when the
    /// container is opened and the PV becomes directly visible.
    pub is_luks: bool,
}

impl PvEntry {
    /// Allocated extents on this PV, given the VG's extent size.
    pub fn allocated_pe(&self, pe_size: u64) -> i64 {
        if self.size < 0 || self.free < 0 || pe_size == 0 {
            return -1;
        }
        (self.size - self.free) / pe_size as i64
    }

    /// Extents this PV contributes in total, given the VG's extent size.
    pub fn total_pe(&self, pe_size: u64) -> i64 {
        if self.size < 0 || pe_size == 0 {
            return -1;
        }
        self.size / pe_size as i64
    }
}

/// Scan-wide LVM state: every discovered PV plus the PVs already claimed by
/// pending (not yet committed) operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LvmContext {
    /// Every PV on the system, across all devices.
    pub pv_list: Vec<PvEntry>,

    /// PVs assigned to an in-preview volume-group operation. Excluded from
    /// candidate lists and protected from independent deletion until the
    /// operation commits or is undone.
    dirty_pvs: BTreeSet<String>,

    /// PVs whose VG is scheduled for removal by a pending operation.
    orphan_pvs: BTreeSet<String>,
}

impl LvmContext {
    pub fn new(pv_list: Vec<PvEntry>) -> Self {
        Self {
            pv_list,
            ..Self::default()
        }
    }

    pub fn entry(&self, device_node: &str) -> Option<&PvEntry> {
        self.pv_list
            .iter()
            .find(|entry| entry.device_node == device_node)
    }

    pub fn entry_mut(&mut self, device_node: &str) -> Option<&mut PvEntry> {
        self.pv_list
            .iter_mut()
            .find(|entry| entry.device_node == device_node)
    }

    /// PVs available for a new volume group: unassigned and not claimed by
    /// a pending operation.
    pub fn candidate_pvs(&self) -> Vec<&PvEntry> {
        self.pv_list
            .iter()
            .filter(|entry| entry.vg_name.is_none() && !self.dirty_pvs.contains(&entry.device_node))
            .collect()
    }

    pub fn is_dirty(&self, device_node: &str) -> bool {
        self.dirty_pvs.contains(device_node)
    }

    pub fn mark_dirty(&mut self, device_node: &str) {
        self.dirty_pvs.insert(device_node.to_string());
    }

    pub fn unmark_dirty(&mut self, device_node: &str) {
        self.dirty_pvs.remove(device_node);
    }

    pub fn is_orphan(&self, device_node: &str) -> bool {
        self.orphan_pvs.contains(device_node)
    }

    pub fn mark_orphan(&mut self, device_node: &str) {
        self.orphan_pvs.insert(device_node.to_string());
    }

    pub fn unmark_orphan(&mut self, device_node: &str) {
        self.orphan_pvs.remove(device_node);
    }

    /// Flip the is_luks flag of the PV entry matching a device node, when
    /// its LUKS container is opened or closed.
    pub fn set_luks_flag(&mut self, device_node: &str, is_luks: bool) {
        if let Some(entry) = self.entry_mut(device_node) {
            entry.is_luks = is_luks;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pv(node: &str, vg: Option<&str>) -> PvEntry {
        PvEntry {
            device_node: node.to_string(),
            vg_name: vg.map(str::to_string),
            size: 400,
            free: 100,
            is_luks: false,
        }
    }

    #[test]
    fn dirty_pvs_leave_the_candidate_list() {
        let mut ctx = LvmContext::new(vec![pv("/dev/sda1", None), pv("/dev/sdb1", None)]);
        assert_eq!(ctx.candidate_pvs().len(), 2);

        ctx.mark_dirty("/dev/sda1");
        let candidates = ctx.candidate_pvs();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].device_node, "/dev/sdb1");

        ctx.unmark_dirty("/dev/sda1");
        assert_eq!(ctx.candidate_pvs().len(), 2);
    }

    #[test]
    fn assigned_pvs_are_never_candidates() {
        let ctx = LvmContext::new(vec![pv("/dev/sda1", Some("vg0")), pv("/dev/sdb1", None)]);
        assert_eq!(ctx.candidate_pvs().len(), 1);
    }

    #[test]
    fn pe_math_uses_sentinels_for_unknowns() {
        let entry = pv("/dev/sda1", None);
        assert_eq!(entry.total_pe(100), 4);
        assert_eq!(entry.allocated_pe(100), 3);

        let unknown = PvEntry {
            size: -1,
            ..entry
        };
        assert_eq!(unknown.total_pe(100), -1);
        assert_eq!(unknown.allocated_pe(100), -1);
    }
}
