// SPDX-License-Identifier: GPL-3.0-only

//! Create an LVM volume group or a software RAID array.
//!
//! The member partitions are claimed (marked dirty) in preview so they
//! disappear from candidate lists and cannot be deleted while this operation
//! is pending. For RAID the array is created first; anything registering or
//! using the array must come after.

use super::{Operation, OperationBase, impl_operation_accessors};
use crate::jobs::{CreateRaidArrayJob, CreateVolumeGroupJob, Job};
use crate::stack::DeviceModel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeManagerKind {
    Lvm,
    /// `level` as mdadm spells it ("raid0", "raid1", ...).
    Raid { level: String },
}

pub struct CreateVolumeGroupOperation {
    base: OperationBase,
    /// VG name for LVM, array device node for RAID.
    name: String,
    member_nodes: Vec<String>,
    kind: VolumeManagerKind,
}

impl CreateVolumeGroupOperation {
    pub fn new(name: impl Into<String>, member_nodes: Vec<String>, kind: VolumeManagerKind) -> Self {
        let name = name.into();
        let jobs: Vec<Box<dyn Job>> = match &kind {
            VolumeManagerKind::Lvm => vec![Box::new(CreateVolumeGroupJob::new(
                &name,
                member_nodes.clone(),
            ))],
            VolumeManagerKind::Raid { level } => vec![Box::new(CreateRaidArrayJob::new(
                &name,
                level,
                member_nodes.clone(),
            ))],
        };

        Self {
            base: OperationBase::new(jobs),
            name,
            member_nodes,
            kind,
        }
    }
}

impl Operation for CreateVolumeGroupOperation {
    impl_operation_accessors!();

    fn description(&self) -> String {
        match &self.kind {
            VolumeManagerKind::Lvm => format!(
                "Create volume group {} over {} physical volume(s)",
                self.name,
                self.member_nodes.len()
            ),
            VolumeManagerKind::Raid { level } => format!(
                "Create {} array {} over {} member(s)",
                level,
                self.name,
                self.member_nodes.len()
            ),
        }
    }

    fn target_device(&self) -> &str {
        &self.name
    }

    fn preview(&mut self, model: &mut DeviceModel) {
        for node in &self.member_nodes {
            model.lvm.mark_dirty(node);
        }
    }

    fn undo(&mut self, model: &mut DeviceModel) {
        for node in &self.member_nodes {
            model.lvm.unmark_dirty(node);
        }
    }
}
