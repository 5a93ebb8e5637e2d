// SPDX-License-Identifier: GPL-3.0-only

//! Delete a partition.
//!
//! The filesystem signature is wiped (or the whole partition overwritten,
//! when shredding) before the table entry is removed. The reverse order
//! could leave a dangling signature that confuses later scans.

use super::{Operation, OperationBase, impl_operation_accessors};
use crate::device::Device;
use crate::jobs::{DeleteFileSystemJob, DeletePartitionJob, Job, ShredFileSystemJob};
use crate::partition::{Partition, PartitionNode};
use crate::stack::DeviceModel;
use partflow_types::{FileSystemType, PartitionRole, PartitionState};

/// What to do with the partition's contents on delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShredAction {
    #[default]
    NoShred,
    Zero,
    Random,
}

pub struct DeleteOperation {
    base: OperationBase,
    device_node: String,
    sector_size: u64,
    partition: Partition,
}

impl DeleteOperation {
    pub fn new(device: &Device, partition: Partition, shred: ShredAction) -> Self {
        let mut jobs: Vec<Box<dyn Job>> = vec![match shred {
            ShredAction::NoShred => {
                Box::new(DeleteFileSystemJob::new(&device.node, partition.clone()))
            }
            ShredAction::Zero => Box::new(ShredFileSystemJob::new(partition.clone(), false)),
            ShredAction::Random => Box::new(ShredFileSystemJob::new(partition.clone(), true)),
        }];

        // Extended containers and tables without real entries (LVM/RAID
        // virtual tables, loop "tables") have nothing to remove.
        let has_entry = device
            .table
            .as_ref()
            .map(|table| table.table_type.has_table_entries())
            .unwrap_or(false);
        if has_entry && !partition.is_role(PartitionRole::Extended) {
            jobs.push(Box::new(DeletePartitionJob::new(
                &device.node,
                partition.clone(),
            )));
        }

        Self {
            base: OperationBase::new(jobs),
            device_node: device.node.clone(),
            sector_size: device.logical_sector_size,
            partition,
        }
    }
}

impl Operation for DeleteOperation {
    impl_operation_accessors!();

    fn description(&self) -> String {
        format!("Delete partition {}", self.partition.display_device_node())
    }

    fn target_device(&self) -> &str {
        &self.device_node
    }

    fn preview(&mut self, model: &mut DeviceModel) {
        if self.partition.fs.fs_type() == FileSystemType::Lvm2Pv {
            model.lvm.mark_orphan(&self.partition.device_node);
        }
        let sector_size = self.sector_size;
        let Some(table) = model.table_mut(&self.device_node) else {
            return;
        };
        if self.partition.is_role(PartitionRole::Logical) {
            if let Some(extended) = table.extended_mut() {
                extended.remove(self.partition.first_sector);
                extended.adjust_logical_numbers(self.partition.number as i64, -1);
            }
        } else {
            table.remove(self.partition.first_sector);
        }
        table.update_unallocated(sector_size);
    }

    fn undo(&mut self, model: &mut DeviceModel) {
        if self.partition.fs.fs_type() == FileSystemType::Lvm2Pv {
            model.lvm.unmark_orphan(&self.partition.device_node);
        }
        let sector_size = self.sector_size;
        let Some(table) = model.table_mut(&self.device_node) else {
            return;
        };
        if self.partition.is_role(PartitionRole::Logical) {
            if let Some(extended) = table.extended_mut() {
                extended.adjust_logical_numbers(-1, self.partition.number as i64);
                extended.insert(self.partition.clone());
            }
        } else {
            table.insert(self.partition.clone());
        }
        table.update_unallocated(sector_size);
    }

    fn deleted_preview_target(&self) -> Option<(&str, u64)> {
        if self.partition.state == PartitionState::Existing {
            None
        } else {
            Some((self.device_node.as_str(), self.partition.first_sector))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FileSystem;
    use crate::partition::PartitionTable;
    use partflow_types::PartitionTableType;

    fn disk_with_table(table_type: PartitionTableType) -> Device {
        let mut device = Device::new_disk("/dev/sda", "Test Disk", 512, 512, 10_000);
        device.table = Some(PartitionTable::new(table_type, 0, 9_999));
        device
    }

    fn primary(first: u64, last: u64) -> Partition {
        Partition::new(
            "/dev/sda1",
            1,
            PartitionRole::Primary.into(),
            first,
            last,
            512,
            FileSystem::plain(FileSystemType::Ext4),
        )
    }

    #[test]
    fn plain_delete_runs_fs_wipe_before_entry_removal() {
        let device = disk_with_table(PartitionTableType::Gpt);
        let op = DeleteOperation::new(&device, primary(0, 999), ShredAction::NoShred);

        let descriptions: Vec<String> =
            op.jobs().iter().map(|job| job.description()).collect();
        assert_eq!(descriptions.len(), 2);
        assert!(descriptions[0].starts_with("Delete file system"));
        assert!(descriptions[1].starts_with("Delete partition"));
    }

    #[test]
    fn extended_delete_has_no_entry_removal_job() {
        let device = disk_with_table(PartitionTableType::MsDos);
        let mut extended = primary(1_000, 8_999);
        extended.roles = PartitionRole::Extended.into();
        let op = DeleteOperation::new(&device, extended, ShredAction::NoShred);
        assert_eq!(op.jobs().len(), 1);
    }

    #[test]
    fn virtual_table_delete_has_no_entry_removal_job() {
        let device = disk_with_table(PartitionTableType::Vmd);
        let op = DeleteOperation::new(&device, primary(0, 999), ShredAction::NoShred);
        assert_eq!(op.jobs().len(), 1);
        assert!(op.jobs()[0].description().starts_with("Delete file system"));
    }

    #[test]
    fn shred_replaces_the_signature_wipe() {
        let device = disk_with_table(PartitionTableType::Gpt);
        let op = DeleteOperation::new(&device, primary(0, 999), ShredAction::Random);
        assert!(op.jobs()[0].description().starts_with("Overwrite"));
        assert_eq!(op.jobs().len(), 2);
    }
}
