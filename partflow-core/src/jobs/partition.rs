// SPDX-License-Identifier: GPL-3.0-only

//! Jobs editing partition-table entries through the backend.

use super::{Job, JobStatus, finish, targets_match};
use crate::backend::ExecContext;
use crate::partition::Partition;
use crate::report::Report;
use partflow_types::PartitionFlags;

/// Create the table entry for a new partition.
pub struct CreatePartitionJob {
    device_node: String,
    partition: Partition,
    created_node: Option<String>,
    status: JobStatus,
}

impl CreatePartitionJob {
    pub fn new(device_node: impl Into<String>, partition: Partition) -> Self {
        Self {
            device_node: device_node.into(),
            partition,
            created_node: None,
            status: JobStatus::Pending,
        }
    }

    /// Device node assigned by the backend, available after a successful
    /// run.
    pub fn created_node(&self) -> Option<&str> {
        self.created_node.as_deref()
    }
}

impl Job for CreatePartitionJob {
    fn description(&self) -> String {
        format!(
            "Create new partition {}",
            self.partition.display_device_node()
        )
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    fn run(&mut self, report: &mut Report, ctx: &mut ExecContext<'_>) -> bool {
        let Some(mut table) = ctx.open_table(&self.device_node) else {
            return finish(&mut self.status, report, false, "open partition table");
        };

        let created = table.create_partition(&self.partition);
        let ok = created.is_some() && table.commit();
        if let Some(node) = created {
            report.line(format!("created table entry {node}"));
            self.created_node = Some(node);
        }
        finish(&mut self.status, report, ok, "create partition")
    }
}

/// Delete the table entry for an existing partition.
pub struct DeletePartitionJob {
    device_node: String,
    partition: Partition,
    status: JobStatus,
}

impl DeletePartitionJob {
    pub fn new(device_node: impl Into<String>, partition: Partition) -> Self {
        Self {
            device_node: device_node.into(),
            partition,
            status: JobStatus::Pending,
        }
    }
}

impl Job for DeletePartitionJob {
    fn description(&self) -> String {
        format!("Delete partition {}", self.partition.device_node)
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    fn run(&mut self, report: &mut Report, ctx: &mut ExecContext<'_>) -> bool {
        if !targets_match(&self.device_node, &self.partition) {
            return finish(&mut self.status, report, false, "validate job target");
        }

        let Some(mut table) = ctx.open_table(&self.device_node) else {
            return finish(&mut self.status, report, false, "open partition table");
        };

        let ok = table.delete_partition(&self.partition) && table.commit();
        finish(&mut self.status, report, ok, "delete partition")
    }
}

/// Apply a partition's flag set: every available flag is written, set or
/// cleared, so stale flags from a previous occupant cannot survive.
pub struct SetPartFlagsJob {
    device_node: String,
    partition: Partition,
    flags: PartitionFlags,
    status: JobStatus,
}

impl SetPartFlagsJob {
    pub fn new(device_node: impl Into<String>, partition: Partition, flags: PartitionFlags) -> Self {
        Self {
            device_node: device_node.into(),
            partition,
            flags,
            status: JobStatus::Pending,
        }
    }
}

impl Job for SetPartFlagsJob {
    fn description(&self) -> String {
        format!(
            "Set flags of {} to [{}]",
            self.partition.display_device_node(),
            self.flags
                .iter()
                .map(|flag| flag.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    fn run(&mut self, report: &mut Report, ctx: &mut ExecContext<'_>) -> bool {
        let Some(mut table) = ctx.open_table(&self.device_node) else {
            return finish(&mut self.status, report, false, "open partition table");
        };

        let mut ok = true;
        for flag in self.partition.available_flags.iter() {
            let state = self.flags.contains(flag);
            if !table.set_flag(&self.partition, flag.as_str(), state) {
                report.line(format!("could not set flag {}", flag.as_str()));
                ok = false;
            }
        }
        ok = ok && table.commit();
        finish(&mut self.status, report, ok, "set partition flags")
    }
}

/// Rewrite a partition's first/last sector in the table.
pub struct SetPartGeometryJob {
    device_node: String,
    partition: Partition,
    new_first: u64,
    new_last: u64,
    status: JobStatus,
}

impl SetPartGeometryJob {
    pub fn new(
        device_node: impl Into<String>,
        partition: Partition,
        new_first: u64,
        new_last: u64,
    ) -> Self {
        debug_assert!(new_last >= new_first);
        Self {
            device_node: device_node.into(),
            partition,
            new_first,
            new_last,
            status: JobStatus::Pending,
        }
    }
}

impl Job for SetPartGeometryJob {
    fn description(&self) -> String {
        format!(
            "Set geometry of {}: [{}, {}]",
            self.partition.device_node, self.new_first, self.new_last
        )
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    fn run(&mut self, report: &mut Report, ctx: &mut ExecContext<'_>) -> bool {
        if !targets_match(&self.device_node, &self.partition) {
            return finish(&mut self.status, report, false, "validate job target");
        }

        let Some(mut table) = ctx.open_table(&self.device_node) else {
            return finish(&mut self.status, report, false, "open partition table");
        };

        let ok = table.update_geometry(&self.partition, self.new_first, self.new_last)
            && table.commit();
        finish(&mut self.status, report, ok, "update geometry")
    }
}
