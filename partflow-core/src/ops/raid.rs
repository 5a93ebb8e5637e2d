// SPDX-License-Identifier: GPL-3.0-only

//! Assemble and stop software RAID arrays.

use super::{Operation, OperationBase, impl_operation_accessors};
use crate::device::Device;
use crate::jobs::{ActivateRaidJob, DeactivateRaidJob, Job};
use crate::stack::DeviceModel;
use partflow_types::MdArrayState;

pub struct ActivateRaidOperation {
    base: OperationBase,
    device_node: String,
    old_state: Option<MdArrayState>,
}

impl ActivateRaidOperation {
    pub fn new(device: &Device) -> Self {
        let jobs: Vec<Box<dyn Job>> = vec![Box::new(ActivateRaidJob::new(&device.node))];
        Self {
            base: OperationBase::new(jobs),
            device_node: device.node.clone(),
            old_state: None,
        }
    }
}

impl Operation for ActivateRaidOperation {
    impl_operation_accessors!();

    fn description(&self) -> String {
        format!("Assemble RAID array {}", self.device_node)
    }

    fn target_device(&self) -> &str {
        &self.device_node
    }

    fn preview(&mut self, model: &mut DeviceModel) {
        if let Some(raid) = model
            .device_mut(&self.device_node)
            .and_then(Device::as_raid_mut)
        {
            self.old_state = Some(raid.state);
            raid.state = MdArrayState::Active;
        }
    }

    fn undo(&mut self, model: &mut DeviceModel) {
        if let Some(raid) = model
            .device_mut(&self.device_node)
            .and_then(Device::as_raid_mut)
        {
            if let Some(state) = self.old_state.take() {
                raid.state = state;
            }
        }
    }
}

pub struct DeactivateRaidOperation {
    base: OperationBase,
    device_node: String,
    old_state: Option<MdArrayState>,
}

impl DeactivateRaidOperation {
    pub fn new(device: &Device) -> Self {
        let jobs: Vec<Box<dyn Job>> = vec![Box::new(DeactivateRaidJob::new(&device.node))];
        Self {
            base: OperationBase::new(jobs),
            device_node: device.node.clone(),
            old_state: None,
        }
    }
}

impl Operation for DeactivateRaidOperation {
    impl_operation_accessors!();

    fn description(&self) -> String {
        format!("Stop RAID array {}", self.device_node)
    }

    fn target_device(&self) -> &str {
        &self.device_node
    }

    fn preview(&mut self, model: &mut DeviceModel) {
        if let Some(raid) = model
            .device_mut(&self.device_node)
            .and_then(Device::as_raid_mut)
        {
            self.old_state = Some(raid.state);
            raid.state = MdArrayState::Inactive;
        }
    }

    fn undo(&mut self, model: &mut DeviceModel) {
        if let Some(raid) = model
            .device_mut(&self.device_node)
            .and_then(Device::as_raid_mut)
        {
            if let Some(state) = self.old_state.take() {
                raid.state = state;
            }
        }
    }
}
