// SPDX-License-Identifier: GPL-3.0-only

//! Resize and/or move a partition.
//!
//! Job order depends on the direction: a shrinking filesystem is resized
//! before its table entry (so the entry never undercuts live data), a
//! growing one after. A move rewrites the entry first and relocates the
//! data into it, then re-checks.

use super::{Operation, OperationBase, impl_operation_accessors};
use crate::device::Device;
use crate::jobs::{
    CheckFileSystemJob, Job, MoveFileSystemJob, ResizeFileSystemJob, SetPartGeometryJob,
};
use crate::partition::{Partition, PartitionNode};
use crate::stack::DeviceModel;
use partflow_types::SupportLevel;

pub struct ResizeOperation {
    base: OperationBase,
    device_node: String,
    sector_size: u64,
    partition: Partition,
    old_first: u64,
    old_last: u64,
    new_first: u64,
    new_last: u64,
}

impl ResizeOperation {
    pub fn new(device: &Device, partition: Partition, new_first: u64, new_last: u64) -> Self {
        debug_assert!(new_last >= new_first);

        let old_first = partition.first_sector;
        let old_last = partition.last_sector;
        let old_length = partition.length();
        let new_length = new_last - new_first + 1;
        let sector_size = partition.sector_size;

        let checkable = partition.fs.support_check() != SupportLevel::None;
        let moving = new_first != old_first;
        let growing = new_length > old_length;
        let shrinking = new_length < old_length;

        let mut jobs: Vec<Box<dyn Job>> = Vec::new();
        if checkable {
            jobs.push(Box::new(CheckFileSystemJob::new(partition.clone())));
        }
        if shrinking {
            jobs.push(Box::new(ResizeFileSystemJob::new(
                partition.clone(),
                new_length * sector_size,
            )));
            jobs.push(Box::new(SetPartGeometryJob::new(
                &device.node,
                partition.clone(),
                old_first,
                old_first + new_length - 1,
            )));
        }
        if moving {
            // The entry moves first so the relocated data lands inside it.
            let length = old_length.min(new_length);
            jobs.push(Box::new(SetPartGeometryJob::new(
                &device.node,
                partition.clone(),
                new_first,
                new_first + length - 1,
            )));
            jobs.push(Box::new(MoveFileSystemJob::new(partition.clone(), new_first)));
        }
        if growing {
            jobs.push(Box::new(SetPartGeometryJob::new(
                &device.node,
                partition.clone(),
                new_first,
                new_last,
            )));
            jobs.push(Box::new(ResizeFileSystemJob::new(
                partition.clone(),
                new_length * sector_size,
            )));
        }
        if moving && checkable {
            jobs.push(Box::new(CheckFileSystemJob::new(partition.clone())));
        }

        Self {
            base: OperationBase::new(jobs),
            device_node: device.node.clone(),
            sector_size,
            partition,
            old_first,
            old_last,
            new_first,
            new_last,
        }
    }

    fn set_geometry(&self, model: &mut DeviceModel, first: u64, last: u64) {
        let sector_size = self.sector_size;
        let Some(table) = model.table_mut(&self.device_node) else {
            return;
        };
        if let Some(partition) = table.find_by_node_mut(&self.partition.device_node) {
            partition.first_sector = first;
            partition.last_sector = last;
        }
        table.update_unallocated(sector_size);
    }
}

impl Operation for ResizeOperation {
    impl_operation_accessors!();

    fn description(&self) -> String {
        format!(
            "Resize partition {} from [{}, {}] to [{}, {}]",
            self.partition.device_node,
            self.old_first,
            self.old_last,
            self.new_first,
            self.new_last
        )
    }

    fn target_device(&self) -> &str {
        &self.device_node
    }

    fn preview(&mut self, model: &mut DeviceModel) {
        self.set_geometry(model, self.new_first, self.new_last);
    }

    fn undo(&mut self, model: &mut DeviceModel) {
        self.set_geometry(model, self.old_first, self.old_last);
    }
}
