// SPDX-License-Identifier: GPL-3.0-only

//! Change the set of physical volumes backing a volume group.
//!
//! The PV diff is computed at construction time, not at run time: the
//! requested target PV list is split into the PVs to add and the PVs to
//! remove, and the grow jobs come before any move+shrink pair so that free
//! extents exist to receive data evacuated from removed PVs. The extent
//! precondition is also checked here: if more extents must move than will
//! be free after the diff, the constructor refuses and nothing reaches the
//! stack.

use super::{Operation, OperationBase, impl_operation_accessors};
use crate::device::Device;
use crate::jobs::{Job, MovePhysicalVolumeJob, ResizeVolumeGroupJob, VgResizeDirection};
use crate::lvm::LvmContext;
use crate::stack::DeviceModel;

/// Model fields touched by preview, snapshotted for undo.
struct PreviewSnapshot {
    physical_volumes: Vec<String>,
    total_pe: i64,
    free_pe: i64,
    pv_assignments: Vec<(String, Option<String>)>,
}

pub struct ResizeVolumeGroupOperation {
    base: OperationBase,
    device_node: String,
    vg_name: String,
    target_pvs: Vec<String>,
    insert_pvs: Vec<String>,
    remove_pvs: Vec<String>,
    inserted_pe: i64,
    removed_total_pe: i64,
    snapshot: Option<PreviewSnapshot>,
}

impl ResizeVolumeGroupOperation {
    /// Returns None when the device is not a volume group, when any extent
    /// count is unknown, or when the precondition fails. Unknown accounting
    /// aborts rather than risking data evacuation with no room to land.
    pub fn new(device: &Device, target_pvs: Vec<String>, lvm: &LvmContext) -> Option<Self> {
        let vg = device.as_lvm()?;

        let insert_pvs: Vec<String> = target_pvs
            .iter()
            .filter(|pv| !vg.physical_volumes.contains(pv))
            .cloned()
            .collect();
        let remove_pvs: Vec<String> = vg
            .physical_volumes
            .iter()
            .filter(|pv| !target_pvs.contains(pv))
            .cloned()
            .collect();

        let mut moved_pe = 0i64;
        let mut removed_total_pe = 0i64;
        for pv in &remove_pvs {
            let entry = lvm.entry(pv)?;
            let allocated = entry.allocated_pe(vg.pe_size);
            let total = entry.total_pe(vg.pe_size);
            if allocated < 0 || total < 0 {
                return None;
            }
            moved_pe += allocated;
            removed_total_pe += total;
        }
        let mut inserted_pe = 0i64;
        for pv in &insert_pvs {
            let total = lvm.entry(pv)?.total_pe(vg.pe_size);
            if total < 0 {
                return None;
            }
            inserted_pe += total;
        }
        if vg.free_pe < 0 {
            return None;
        }
        if moved_pe > vg.free_pe + inserted_pe {
            tracing::warn!(
                vg = %vg.vg_name,
                moved_pe,
                free_pe = vg.free_pe,
                inserted_pe,
                "not enough free extents to evacuate removed PVs"
            );
            return None;
        }

        let mut jobs: Vec<Box<dyn Job>> = Vec::new();
        for pv in &insert_pvs {
            jobs.push(Box::new(ResizeVolumeGroupJob::new(
                &vg.vg_name,
                pv,
                VgResizeDirection::Grow,
            )));
        }
        for pv in &remove_pvs {
            jobs.push(Box::new(MovePhysicalVolumeJob::new(pv)));
            jobs.push(Box::new(ResizeVolumeGroupJob::new(
                &vg.vg_name,
                pv,
                VgResizeDirection::Shrink,
            )));
        }

        Some(Self {
            base: OperationBase::new(jobs),
            device_node: device.node.clone(),
            vg_name: vg.vg_name.clone(),
            target_pvs,
            insert_pvs,
            remove_pvs,
            inserted_pe,
            removed_total_pe,
            snapshot: None,
        })
    }
}

impl Operation for ResizeVolumeGroupOperation {
    impl_operation_accessors!();

    fn description(&self) -> String {
        format!(
            "Resize volume group {}: add {} PV(s), remove {} PV(s)",
            self.vg_name,
            self.insert_pvs.len(),
            self.remove_pvs.len()
        )
    }

    fn target_device(&self) -> &str {
        &self.device_node
    }

    fn preview(&mut self, model: &mut DeviceModel) {
        let (device, lvm) = model.split_mut(&self.device_node);
        let Some(vg) = device.and_then(Device::as_lvm_mut) else {
            return;
        };

        let mut pv_assignments = Vec::new();
        for pv in self.insert_pvs.iter().chain(&self.remove_pvs) {
            if let Some(entry) = lvm.entry(pv) {
                pv_assignments.push((pv.clone(), entry.vg_name.clone()));
            }
        }
        self.snapshot = Some(PreviewSnapshot {
            physical_volumes: vg.physical_volumes.clone(),
            total_pe: vg.total_pe,
            free_pe: vg.free_pe,
            pv_assignments,
        });

        vg.physical_volumes = self.target_pvs.clone();
        if vg.total_pe >= 0 {
            vg.total_pe += self.inserted_pe - self.removed_total_pe;
        }
        if vg.free_pe >= 0 {
            vg.free_pe += self.inserted_pe - self.removed_total_pe;
        }

        for pv in &self.insert_pvs {
            if let Some(entry) = lvm.entry_mut(pv) {
                entry.vg_name = Some(self.vg_name.clone());
            }
            lvm.mark_dirty(pv);
        }
        for pv in &self.remove_pvs {
            if let Some(entry) = lvm.entry_mut(pv) {
                entry.vg_name = None;
            }
            lvm.mark_dirty(pv);
        }
    }

    fn undo(&mut self, model: &mut DeviceModel) {
        let Some(snapshot) = self.snapshot.take() else {
            return;
        };
        let (device, lvm) = model.split_mut(&self.device_node);
        if let Some(vg) = device.and_then(Device::as_lvm_mut) {
            vg.physical_volumes = snapshot.physical_volumes;
            vg.total_pe = snapshot.total_pe;
            vg.free_pe = snapshot.free_pe;
        }
        for (pv, vg_name) in snapshot.pv_assignments {
            if let Some(entry) = lvm.entry_mut(&pv) {
                entry.vg_name = vg_name;
            }
            lvm.unmark_dirty(&pv);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceKind, LvmDevice};
    use crate::lvm::PvEntry;
    use crate::stack::DeviceModel;

    const PE: u64 = 1024;

    fn pv(node: &str, vg: Option<&str>, total_pe: i64, allocated_pe: i64) -> PvEntry {
        PvEntry {
            device_node: node.to_string(),
            vg_name: vg.map(str::to_string),
            size: total_pe * PE as i64,
            free: (total_pe - allocated_pe) * PE as i64,
            is_luks: false,
        }
    }

    fn vg_device(free_pe: i64) -> Device {
        let mut vg = LvmDevice::new("vg0", "uuid", PE);
        vg.total_pe = 400;
        vg.alloc_pe = 400 - free_pe;
        vg.free_pe = free_pe;
        vg.physical_volumes = vec!["/dev/sda1".to_string(), "/dev/sdb1".to_string()];

        let mut device = Device::new_disk("/dev/vg0", "vg0", 512, 512, 1_000);
        device.kind = DeviceKind::Lvm(vg);
        device
    }

    fn context() -> LvmContext {
        LvmContext::new(vec![
            pv("/dev/sda1", Some("vg0"), 200, 100),
            pv("/dev/sdb1", Some("vg0"), 200, 150),
            pv("/dev/sdc1", None, 20, 0),
        ])
    }

    fn target() -> Vec<String> {
        vec!["/dev/sda1".to_string(), "/dev/sdc1".to_string()]
    }

    #[test]
    fn refuses_when_moved_extents_exceed_free_plus_inserted() {
        // 150 extents must evacuate /dev/sdb1 but only 100 free + 20
        // inserted are available.
        let device = vg_device(100);
        assert!(ResizeVolumeGroupOperation::new(&device, target(), &context()).is_none());
    }

    #[test]
    fn grow_jobs_come_before_move_and_shrink() {
        let device = vg_device(200);
        let op = ResizeVolumeGroupOperation::new(&device, target(), &context())
            .expect("precondition holds");

        let descriptions: Vec<String> =
            op.jobs().iter().map(|job| job.description()).collect();
        assert_eq!(descriptions.len(), 3);
        assert!(descriptions[0].starts_with("Add /dev/sdc1"));
        assert!(descriptions[1].starts_with("Move extents off physical volume /dev/sdb1"));
        assert!(descriptions[2].starts_with("Remove /dev/sdb1"));
    }

    #[test]
    fn unknown_extent_accounting_refuses() {
        let device = vg_device(200);
        let mut ctx = context();
        ctx.entry_mut("/dev/sdb1").unwrap().free = -1;
        assert!(ResizeVolumeGroupOperation::new(&device, target(), &ctx).is_none());
    }

    #[test]
    fn preview_then_undo_restores_model_and_claims() {
        let device = vg_device(200);
        let mut op = ResizeVolumeGroupOperation::new(&device, target(), &context())
            .expect("precondition holds");

        let mut model = DeviceModel::new(vec![device], context());
        let before = model.clone();

        op.preview(&mut model);
        let vg = model.device("/dev/vg0").unwrap().as_lvm().unwrap();
        assert_eq!(vg.physical_volumes, target());
        assert_eq!(
            model.lvm.entry("/dev/sdc1").unwrap().vg_name.as_deref(),
            Some("vg0")
        );
        assert!(model.lvm.entry("/dev/sdb1").unwrap().vg_name.is_none());
        assert!(model.lvm.is_dirty("/dev/sdc1"));
        assert!(model.lvm.is_dirty("/dev/sdb1"));

        op.undo(&mut model);
        assert_eq!(model, before);
    }
}
