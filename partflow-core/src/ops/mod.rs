// SPDX-License-Identifier: GPL-3.0-only

//! Reversible, previewable units of user intent.
//!
//! An operation decomposes into an ordered list of jobs at construction
//! time. `preview` mutates the in-memory model to the intended end state
//! without touching hardware and `undo` exactly reverses it; `execute` runs
//! the jobs strictly in order, stopping at the first failure. Job order is a
//! correctness requirement (e.g. the filesystem signature is wiped before
//! its table entry is removed) and must never be reordered.

mod copy;
mod create_volume_group;
mod deactivate_volume_group;
mod delete;
mod new;
mod raid;
mod resize;
mod resize_volume_group;

pub use copy::CopyOperation;
pub use create_volume_group::{CreateVolumeGroupOperation, VolumeManagerKind};
pub use deactivate_volume_group::DeactivateVolumeGroupOperation;
pub use delete::{DeleteOperation, ShredAction};
pub use new::NewOperation;
pub use raid::{ActivateRaidOperation, DeactivateRaidOperation};
pub use resize::ResizeOperation;
pub use resize_volume_group::ResizeVolumeGroupOperation;

use uuid::Uuid;

use crate::backend::ExecContext;
use crate::jobs::Job;
use crate::report::Report;
use crate::stack::DeviceModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationStatus {
    #[default]
    None,
    Pending,
    Running,
    FinishedSuccess,
    FinishedWarning,
    Error,
}

/// Boilerplate shared by every concrete operation: id, status, and job-list
/// accessors delegating to the embedded [`OperationBase`].
macro_rules! impl_operation_accessors {
    () => {
        fn id(&self) -> uuid::Uuid {
            self.base.id
        }

        fn status(&self) -> $crate::ops::OperationStatus {
            self.base.status
        }

        fn set_status(&mut self, status: $crate::ops::OperationStatus) {
            self.base.status = status;
        }

        fn jobs(&self) -> &[Box<dyn $crate::jobs::Job>] {
            &self.base.jobs
        }

        fn jobs_mut(&mut self) -> &mut Vec<Box<dyn $crate::jobs::Job>> {
            &mut self.base.jobs
        }
    };
}
pub(crate) use impl_operation_accessors;

/// Shared bookkeeping embedded by every concrete operation.
pub(crate) struct OperationBase {
    pub id: Uuid,
    pub status: OperationStatus,
    pub jobs: Vec<Box<dyn Job>>,
}

impl OperationBase {
    pub fn new(jobs: Vec<Box<dyn Job>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: OperationStatus::None,
            jobs,
        }
    }
}

/// A unit of user intent.
pub trait Operation {
    fn id(&self) -> Uuid;

    fn description(&self) -> String;

    /// Node of the device this operation targets.
    fn target_device(&self) -> &str;

    fn status(&self) -> OperationStatus;

    fn set_status(&mut self, status: OperationStatus);

    fn jobs(&self) -> &[Box<dyn Job>];

    fn jobs_mut(&mut self) -> &mut Vec<Box<dyn Job>>;

    /// Apply the intended end state to the in-memory model. Tree-only
    /// mutation; no I/O.
    fn preview(&mut self, model: &mut DeviceModel);

    /// Exactly reverse `preview`, field for field.
    fn undo(&mut self, model: &mut DeviceModel);

    /// For the stack's merge rules: the (device node, first sector) of a
    /// partition this operation creates purely in preview, if any.
    fn new_partition_target(&self) -> Option<(&str, u64)> {
        None
    }

    /// For the stack's merge rules: the (device node, first sector) of a
    /// preview-only partition this operation deletes, if any. Deleting a
    /// partition that exists only in preview cancels its creating operation
    /// instead of queueing work.
    fn deleted_preview_target(&self) -> Option<(&str, u64)> {
        None
    }

    /// Run every job strictly in the order added. The first failing job
    /// stops the sequence; jobs after it do not run.
    fn execute(&mut self, report: &mut Report, ctx: &mut ExecContext<'_>) -> bool {
        self.set_status(OperationStatus::Running);
        tracing::debug!(operation = %self.description(), "executing");

        for index in 0..self.jobs().len() {
            let scope = report.add_child(self.jobs()[index].description());
            if !self.jobs_mut()[index].run(scope, ctx) {
                scope.line("job failed, aborting operation");
                self.set_status(OperationStatus::Error);
                return false;
            }
        }

        self.set_status(OperationStatus::FinishedSuccess);
        true
    }
}
