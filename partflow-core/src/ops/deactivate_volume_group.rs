// SPDX-License-Identifier: GPL-3.0-only

//! Deactivate a volume group and all its logical volumes.

use super::{Operation, OperationBase, impl_operation_accessors};
use crate::device::Device;
use crate::jobs::{DeactivateLogicalVolumeJob, DeactivateVolumeGroupJob, Job};
use crate::partition::PartitionTable;
use crate::stack::DeviceModel;
use partflow_types::PartitionTableType;

pub struct DeactivateVolumeGroupOperation {
    base: OperationBase,
    device_node: String,
    vg_name: String,
    old_table: Option<PartitionTable>,
}

impl DeactivateVolumeGroupOperation {
    /// Returns None when the device is not a volume group. Logical volumes
    /// are deactivated first; a VG with active LVs refuses to deactivate.
    pub fn new(device: &Device) -> Option<Self> {
        let vg = device.as_lvm()?;
        let lv_paths: Vec<String> = vg.lv_sizes.keys().cloned().collect();

        let jobs: Vec<Box<dyn Job>> = vec![
            Box::new(DeactivateLogicalVolumeJob::new(lv_paths)),
            Box::new(DeactivateVolumeGroupJob::new(&vg.vg_name)),
        ];

        Some(Self {
            base: OperationBase::new(jobs),
            device_node: device.node.clone(),
            vg_name: vg.vg_name.clone(),
            old_table: None,
        })
    }
}

impl Operation for DeactivateVolumeGroupOperation {
    impl_operation_accessors!();

    fn description(&self) -> String {
        format!("Deactivate volume group {}", self.vg_name)
    }

    fn target_device(&self) -> &str {
        &self.device_node
    }

    fn preview(&mut self, model: &mut DeviceModel) {
        let Some(device) = model.device_mut(&self.device_node) else {
            return;
        };
        // A deactivated VG exposes no logical volumes; its table becomes an
        // empty placeholder until the next rescan.
        let last = device.total_sectors.saturating_sub(1);
        self.old_table = device
            .table
            .replace(PartitionTable::new(PartitionTableType::None, 0, last));
    }

    fn undo(&mut self, model: &mut DeviceModel) {
        let Some(device) = model.device_mut(&self.device_node) else {
            return;
        };
        device.table = self.old_table.take();
    }
}
