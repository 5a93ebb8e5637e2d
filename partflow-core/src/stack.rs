// SPDX-License-Identifier: GPL-3.0-only

//! The operation stack: scanned devices plus the ordered list of pending
//! operations.
//!
//! The stack owns the preview model. Pushing an operation previews it
//! immediately; popping undoes it. Related operations merge on push: the
//! delete of a partition that exists only in preview cancels the operation
//! that created it instead of queueing real work. Commit runs the pending
//! operations strictly in push order and stops at the first error.

use crate::backend::ExecContext;
use crate::device::Device;
use crate::lvm::LvmContext;
use crate::ops::{Operation, OperationStatus};
use crate::partition::{Partition, PartitionNode, PartitionTable};
use crate::report::Report;

/// The scanned state of the system: every device plus the cross-device LVM
/// bookkeeping. Rebuilt from scratch on every rescan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceModel {
    pub devices: Vec<Device>,
    pub lvm: LvmContext,
}

impl DeviceModel {
    pub fn new(devices: Vec<Device>, lvm: LvmContext) -> Self {
        Self { devices, lvm }
    }

    pub fn device(&self, node: &str) -> Option<&Device> {
        self.devices.iter().find(|device| device.node == node)
    }

    pub fn device_mut(&mut self, node: &str) -> Option<&mut Device> {
        self.devices.iter_mut().find(|device| device.node == node)
    }

    /// The partition table of a device, for preview mutation.
    pub fn table_mut(&mut self, node: &str) -> Option<&mut PartitionTable> {
        match self.device_mut(node) {
            Some(device) => device.table.as_mut(),
            None => {
                tracing::warn!(node, "no such device in model");
                None
            }
        }
    }

    /// Split borrow: one device plus the LVM context, for operations that
    /// update both in a single preview.
    pub fn split_mut(&mut self, node: &str) -> (Option<&mut Device>, &mut LvmContext) {
        let device = self.devices.iter_mut().find(|device| device.node == node);
        (device, &mut self.lvm)
    }

    /// Find a partition anywhere in the model by its device node.
    pub fn find_partition(&self, partition_node: &str) -> Option<&Partition> {
        self.devices
            .iter()
            .filter_map(|device| device.table.as_ref())
            .find_map(|table| table.find_by_node(partition_node))
    }
}

/// Ledger of pending operations over the preview model.
pub struct OperationStack {
    model: DeviceModel,
    operations: Vec<Box<dyn Operation>>,
}

impl OperationStack {
    pub fn new(model: DeviceModel) -> Self {
        Self {
            model,
            operations: Vec::new(),
        }
    }

    pub fn model(&self) -> &DeviceModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut DeviceModel {
        &mut self.model
    }

    pub fn operations(&self) -> &[Box<dyn Operation>] {
        &self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Replace the model after a rescan. Pending operations are dropped;
    /// they referred to the previous scan's state.
    pub fn reset(&mut self, model: DeviceModel) {
        if !self.operations.is_empty() {
            tracing::info!(
                pending = self.operations.len(),
                "dropping pending operations on rescan"
            );
        }
        self.operations.clear();
        self.model = model;
    }

    /// Preview an operation and append it, or merge it away.
    pub fn push(&mut self, mut operation: Box<dyn Operation>) {
        if let Some((node, first_sector)) = operation
            .deleted_preview_target()
            .map(|(node, first)| (node.to_string(), first))
        {
            let creator = self.operations.iter().position(|existing| {
                existing.new_partition_target() == Some((node.as_str(), first_sector))
            });
            if let Some(index) = creator {
                tracing::info!(
                    operation = %self.operations[index].description(),
                    "delete of previewed partition cancels its creating operation"
                );
                // Rewind everything, drop the creator, replay the rest. The
                // later previews may depend on the earlier ones, so partial
                // unwinding is not safe.
                for existing in self.operations.iter_mut().rev() {
                    existing.undo(&mut self.model);
                }
                self.operations.remove(index);
                for existing in self.operations.iter_mut() {
                    existing.preview(&mut self.model);
                }
                return;
            }
        }

        tracing::debug!(operation = %operation.description(), "push");
        operation.preview(&mut self.model);
        operation.set_status(OperationStatus::Pending);
        self.operations.push(operation);
    }

    /// Undo and return the most recent pending operation.
    pub fn pop(&mut self) -> Option<Box<dyn Operation>> {
        let mut operation = self.operations.pop()?;
        tracing::debug!(operation = %operation.description(), "pop");
        operation.undo(&mut self.model);
        operation.set_status(OperationStatus::None);
        Some(operation)
    }

    /// Undo every pending operation, newest first.
    pub fn clear(&mut self) {
        while self.pop().is_some() {}
    }

    /// Commit: run every pending operation in push order, stopping at the
    /// first error. On full success the ledger is emptied; on failure the
    /// remaining operations keep their Pending status for inspection.
    pub fn execute_all(&mut self, report: &mut Report, ctx: &mut ExecContext<'_>) -> bool {
        for operation in self.operations.iter_mut() {
            let scope = report.add_child(operation.description());
            if !operation.execute(scope, ctx) {
                tracing::error!(
                    operation = %operation.description(),
                    "commit aborted"
                );
                return false;
            }
        }
        self.operations.clear();
        true
    }
}
