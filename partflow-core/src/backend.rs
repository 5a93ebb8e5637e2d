// SPDX-License-Identifier: GPL-3.0-only

//! Backend collaborator traits.
//!
//! A concrete backend (libparted, sfdisk, a platform GEOM layer) implements
//! these; the engine only ever talks to the traits. Every method can fail;
//! failures surface as the enclosing job returning false.

use crate::device::Device;
use crate::fs::FileSystemDriverRegistry;
use crate::partition::Partition;
use partflow_types::FileSystemType;

/// Top-level backend: device discovery and open.
pub trait CoreBackend {
    /// Scan every block device on the system.
    fn scan_devices(&self) -> Vec<Device>;

    /// Scan a single device node.
    fn scan_device(&self, node: &str) -> Option<Device>;

    /// Detect the filesystem signature on a device node.
    fn detect_file_system(&self, node: &str) -> FileSystemType;

    /// Open a device for modification.
    fn open_device(&mut self, node: &str) -> Option<Box<dyn CoreBackendDevice>>;
}

/// An opened device.
pub trait CoreBackendDevice {
    /// Open the device's partition table for editing.
    fn open_partition_table(&mut self) -> Option<Box<dyn CoreBackendPartitionTable>>;
}

/// An opened partition table. All edits are staged until `commit`.
pub trait CoreBackendPartitionTable {
    /// Create the table entry for a new partition; returns the resulting
    /// device node path on success.
    fn create_partition(&mut self, partition: &Partition) -> Option<String>;

    /// Delete the table entry for a partition.
    fn delete_partition(&mut self, partition: &Partition) -> bool;

    /// Rewrite a partition's first/last sector.
    fn update_geometry(&mut self, partition: &Partition, first_sector: u64, last_sector: u64)
    -> bool;

    /// Wipe any filesystem signature inside the partition's sector range.
    fn clobber_file_system(&mut self, partition: &Partition) -> bool;

    /// Set the partition label/name (GPT) for a partition.
    fn set_partition_label(&mut self, partition: &Partition, label: &str) -> bool;

    /// Set the partition system type to match the partition's filesystem.
    fn set_partition_system_type(&mut self, partition: &Partition) -> bool;

    /// Set or clear a partition flag (boot, esp, ...).
    fn set_flag(&mut self, partition: &Partition, flag: &str, state: bool) -> bool;

    /// Commit staged edits to disk.
    fn commit(&mut self) -> bool;
}

/// Everything a job needs to touch the outside world.
pub struct ExecContext<'a> {
    pub backend: &'a mut dyn CoreBackend,
    pub drivers: &'a FileSystemDriverRegistry,
}

impl<'a> ExecContext<'a> {
    pub fn new(backend: &'a mut dyn CoreBackend, drivers: &'a FileSystemDriverRegistry) -> Self {
        Self { backend, drivers }
    }

    /// Open the partition table of a device, logging on failure.
    pub fn open_table(&mut self, device_node: &str) -> Option<Box<dyn CoreBackendPartitionTable>> {
        let mut device = match self.backend.open_device(device_node) {
            Some(device) => device,
            None => {
                tracing::warn!(device_node, "could not open device");
                return None;
            }
        };
        let table = device.open_partition_table();
        if table.is_none() {
            tracing::warn!(device_node, "could not open partition table");
        }
        table
    }
}
