// SPDX-License-Identifier: GPL-3.0-only

//! Copy an existing filesystem into a freshly created partition.

use super::{Operation, OperationBase, impl_operation_accessors};
use crate::device::Device;
use crate::jobs::{CheckFileSystemJob, CopyFileSystemJob, CreatePartitionJob, Job};
use crate::partition::{Partition, PartitionNode};
use crate::stack::DeviceModel;
use partflow_types::{PartitionRole, PartitionState, SupportLevel};

pub struct CopyOperation {
    base: OperationBase,
    device_node: String,
    sector_size: u64,
    target: Partition,
}

impl CopyOperation {
    /// `target` must be in the Copy state with its device node pointing at
    /// the source partition; the backend assigns the real node on commit.
    pub fn new(device: &Device, target: Partition, source_node: impl Into<String>) -> Self {
        debug_assert_eq!(target.state, PartitionState::Copy);

        let source_node = source_node.into();
        let mut jobs: Vec<Box<dyn Job>> = vec![
            Box::new(CreatePartitionJob::new(&device.node, target.clone())),
            Box::new(CopyFileSystemJob::new(target.clone(), source_node)),
        ];
        if target.fs.support_check() != SupportLevel::None {
            jobs.push(Box::new(CheckFileSystemJob::new(target.clone())));
        }

        Self {
            base: OperationBase::new(jobs),
            device_node: device.node.clone(),
            sector_size: device.logical_sector_size,
            target,
        }
    }
}

impl Operation for CopyOperation {
    impl_operation_accessors!();

    fn description(&self) -> String {
        format!(
            "Copy {} onto {}",
            self.target.display_device_node(),
            self.device_node
        )
    }

    fn target_device(&self) -> &str {
        &self.device_node
    }

    fn preview(&mut self, model: &mut DeviceModel) {
        let sector_size = self.sector_size;
        let Some(table) = model.table_mut(&self.device_node) else {
            return;
        };
        if self.target.is_role(PartitionRole::Logical) {
            if let Some(extended) = table.extended_mut() {
                extended.adjust_logical_numbers(-1, self.target.number as i64);
                extended.insert(self.target.clone());
            }
        } else {
            table.insert(self.target.clone());
        }
        table.update_unallocated(sector_size);
    }

    fn undo(&mut self, model: &mut DeviceModel) {
        let sector_size = self.sector_size;
        let Some(table) = model.table_mut(&self.device_node) else {
            return;
        };
        if self.target.is_role(PartitionRole::Logical) {
            if let Some(extended) = table.extended_mut() {
                extended.remove(self.target.first_sector);
                extended.adjust_logical_numbers(self.target.number as i64, -1);
            }
        } else {
            table.remove(self.target.first_sector);
        }
        table.update_unallocated(sector_size);
    }

    fn new_partition_target(&self) -> Option<(&str, u64)> {
        Some((&self.device_node, self.target.first_sector))
    }
}
