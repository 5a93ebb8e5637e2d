// SPDX-License-Identifier: GPL-3.0-only

//! Create a partition, optionally with a filesystem and label.

use super::{Operation, OperationBase, impl_operation_accessors};
use crate::device::Device;
use crate::jobs::{
    ChangePermissionJob, CreateFileSystemJob, CreatePartitionJob, Job, SetFileSystemLabelJob,
    SetPartFlagsJob,
};
use crate::partition::{Partition, PartitionNode};
use crate::stack::DeviceModel;
use partflow_types::{FileSystemType, PartitionRole, PartitionState};

pub struct NewOperation {
    base: OperationBase,
    device_node: String,
    sector_size: u64,
    partition: Partition,
}

impl NewOperation {
    /// `partition` must be in the New state. A filesystem-creation job is
    /// queued unless the type is unformatted/unknown or the partition is an
    /// extended container; a label job only when a non-empty label is given.
    pub fn new(device: &Device, partition: Partition, label: Option<String>) -> Self {
        debug_assert_eq!(partition.state, PartitionState::New);

        let mut jobs: Vec<Box<dyn Job>> = vec![Box::new(CreatePartitionJob::new(
            &device.node,
            partition.clone(),
        ))];
        if !partition.flags.is_empty() {
            jobs.push(Box::new(SetPartFlagsJob::new(
                &device.node,
                partition.clone(),
                partition.flags,
            )));
        }
        let fs_type = partition.fs.fs_type();
        if fs_type != FileSystemType::Unformatted
            && fs_type != FileSystemType::Unknown
            && !partition.is_role(PartitionRole::Extended)
        {
            jobs.push(Box::new(CreateFileSystemJob::new(
                partition.clone(),
                fs_type,
            )));
            if let Some(label) = label.filter(|label| !label.is_empty()) {
                jobs.push(Box::new(SetFileSystemLabelJob::new(
                    partition.clone(),
                    label,
                )));
            }
        }

        Self {
            base: OperationBase::new(jobs),
            device_node: device.node.clone(),
            sector_size: device.logical_sector_size,
            partition,
        }
    }

    /// Also open up permissions on the new filesystem's root, so a non-root
    /// user can populate it right away. Runs after every other job.
    pub fn with_open_permissions(mut self) -> Self {
        self.base
            .jobs
            .push(Box::new(ChangePermissionJob::new(self.partition.clone())));
        self
    }
}

impl Operation for NewOperation {
    impl_operation_accessors!();

    fn description(&self) -> String {
        format!(
            "Create a new {} partition ({} sectors) on {}",
            self.partition.fs.fs_type().as_str(),
            self.partition.length(),
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

    fn undo(&mut self, model: &mut DeviceModel) {
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

    fn new_partition_target(&self) -> Option<(&str, u64)> {
        Some((&self.device_node, self.partition.first_sector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FileSystem;
    use partflow_types::{PartitionFlag, PartitionTableType};

    fn gpt_disk() -> Device {
        let mut device = Device::new_disk("/dev/sda", "Test Disk", 512, 512, 10_000);
        device.table = Some(crate::partition::PartitionTable::new(
            PartitionTableType::Gpt,
            0,
            9_999,
        ));
        device
    }

    fn new_partition(fs_type: FileSystemType) -> Partition {
        let mut partition = Partition::new(
            "",
            1,
            PartitionRole::Primary.into(),
            0,
            999,
            512,
            FileSystem::plain(fs_type),
        );
        partition.state = PartitionState::New;
        partition
    }

    fn descriptions(op: &NewOperation) -> Vec<String> {
        op.jobs().iter().map(|job| job.description()).collect()
    }

    #[test]
    fn formatted_partition_gets_create_then_mkfs_then_label() {
        let op = NewOperation::new(
            &gpt_disk(),
            new_partition(FileSystemType::Ext4),
            Some("data".to_string()),
        );
        let jobs = descriptions(&op);
        assert_eq!(jobs.len(), 3);
        assert!(jobs[0].starts_with("Create new partition"));
        assert!(jobs[1].starts_with("Create ext4"));
        assert!(jobs[2].starts_with("Set label"));
    }

    #[test]
    fn unformatted_partition_gets_only_the_table_entry() {
        let op = NewOperation::new(
            &gpt_disk(),
            new_partition(FileSystemType::Unformatted),
            Some("ignored".to_string()),
        );
        assert_eq!(op.jobs().len(), 1);
    }

    #[test]
    fn flags_are_written_before_the_filesystem() {
        let mut partition = new_partition(FileSystemType::Fat32);
        partition.flags = PartitionFlag::Boot | PartitionFlag::Esp;
        partition.available_flags = partition.flags;

        let op = NewOperation::new(&gpt_disk(), partition, None);
        let jobs = descriptions(&op);
        assert_eq!(jobs.len(), 3);
        assert!(jobs[1].starts_with("Set flags"));
        assert!(jobs[2].starts_with("Create fat32"));
    }

    #[test]
    fn open_permissions_job_runs_last() {
        let op = NewOperation::new(&gpt_disk(), new_partition(FileSystemType::Ext4), None)
            .with_open_permissions();
        let jobs = descriptions(&op);
        assert!(jobs.last().unwrap().starts_with("Set permissions"));
    }
}
