// SPDX-License-Identifier: GPL-3.0-only

//! Atomic, independently-reportable units of work.
//!
//! A job either fully succeeds or fails; there is no partial terminal state.
//! Jobs never return errors upward — they return plain success/failure and
//! write diagnostic lines into their report scope. Each job captures its
//! parameters at construction time, so the preview model can keep mutating
//! afterwards.

mod fs;
mod lvm;
mod partition;
mod raid;

pub use fs::{
    ChangePermissionJob, CheckFileSystemJob, CopyFileSystemJob, CreateFileSystemJob,
    DeleteFileSystemJob, MoveFileSystemJob, ResizeFileSystemJob, SetFileSystemLabelJob,
    ShredFileSystemJob,
};
pub use lvm::{
    CreateVolumeGroupJob, DeactivateLogicalVolumeJob, DeactivateVolumeGroupJob,
    MovePhysicalVolumeJob, ResizeVolumeGroupJob, VgResizeDirection,
};
pub use partition::{CreatePartitionJob, DeletePartitionJob, SetPartFlagsJob, SetPartGeometryJob};
pub use raid::{ActivateRaidJob, CreateRaidArrayJob, DeactivateRaidJob};

use std::time::Duration;

use crate::backend::ExecContext;
use crate::partition::Partition;
use crate::report::Report;

/// Default deadline for a single external tool invocation.
pub const TOOL_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Pending,
    Success,
    Error,
}

/// One atomic step of an operation.
pub trait Job {
    fn description(&self) -> String;

    fn status(&self) -> JobStatus;

    /// Perform the work against the real collaborators. Writes into the
    /// given report scope; returns overall success.
    fn run(&mut self, report: &mut Report, ctx: &mut ExecContext<'_>) -> bool;
}

/// A job addressing partition P on device D must satisfy "P's recorded node
/// lives on D". A mismatch is a programming-contract violation; disk
/// operations must never proceed on a mismatched target.
pub(crate) fn targets_match(device_node: &str, partition: &Partition) -> bool {
    let matches = partition.device_node.starts_with(device_node);
    debug_assert!(
        matches,
        "partition {} does not belong to device {}",
        partition.device_node, device_node
    );
    if !matches {
        tracing::error!(
            partition = %partition.device_node,
            device = %device_node,
            "job target mismatch"
        );
    }
    matches
}

/// Record the outcome line and map it onto the status field.
pub(crate) fn finish(status: &mut JobStatus, report: &mut Report, ok: bool, what: &str) -> bool {
    if ok {
        *status = JobStatus::Success;
        report.line(format!("{what}: success"));
    } else {
        *status = JobStatus::Error;
        report.line(format!("{what}: failed"));
    }
    ok
}
