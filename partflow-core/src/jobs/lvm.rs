// SPDX-License-Identifier: GPL-3.0-only

//! Jobs driving the LVM command-line tools.

use super::{Job, JobStatus, TOOL_TIMEOUT, finish};
use crate::backend::ExecContext;
use crate::report::Report;
use partflow_sys::lvm as lvm_tools;

fn report_result(report: &mut Report, what: &str, result: partflow_sys::Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(error) => {
            report.line(format!("{what}: {error}"));
            false
        }
    }
}

/// Create a volume group over a set of physical volumes. Each PV device is
/// initialized with pvcreate first.
pub struct CreateVolumeGroupJob {
    vg_name: String,
    pv_nodes: Vec<String>,
    status: JobStatus,
}

impl CreateVolumeGroupJob {
    pub fn new(vg_name: impl Into<String>, pv_nodes: Vec<String>) -> Self {
        Self {
            vg_name: vg_name.into(),
            pv_nodes,
            status: JobStatus::Pending,
        }
    }
}

impl Job for CreateVolumeGroupJob {
    fn description(&self) -> String {
        format!(
            "Create volume group {} on {}",
            self.vg_name,
            self.pv_nodes.join(", ")
        )
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    fn run(&mut self, report: &mut Report, _ctx: &mut ExecContext<'_>) -> bool {
        for pv in &self.pv_nodes {
            if !report_result(
                report,
                "pvcreate",
                lvm_tools::create_physical_volume(pv, TOOL_TIMEOUT),
            ) {
                return finish(&mut self.status, report, false, "create volume group");
            }
        }
        let ok = report_result(
            report,
            "vgcreate",
            lvm_tools::create_volume_group(&self.vg_name, &self.pv_nodes, TOOL_TIMEOUT),
        );
        finish(&mut self.status, report, ok, "create volume group")
    }
}

/// Whether a ResizeVolumeGroupJob adds or removes a PV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VgResizeDirection {
    Grow,
    Shrink,
}

/// Add or remove one physical volume from a volume group.
pub struct ResizeVolumeGroupJob {
    vg_name: String,
    pv_node: String,
    direction: VgResizeDirection,
    status: JobStatus,
}

impl ResizeVolumeGroupJob {
    pub fn new(
        vg_name: impl Into<String>,
        pv_node: impl Into<String>,
        direction: VgResizeDirection,
    ) -> Self {
        Self {
            vg_name: vg_name.into(),
            pv_node: pv_node.into(),
            direction,
            status: JobStatus::Pending,
        }
    }

    pub fn direction(&self) -> VgResizeDirection {
        self.direction
    }
}

impl Job for ResizeVolumeGroupJob {
    fn description(&self) -> String {
        match self.direction {
            VgResizeDirection::Grow => {
                format!("Add {} to volume group {}", self.pv_node, self.vg_name)
            }
            VgResizeDirection::Shrink => {
                format!("Remove {} from volume group {}", self.pv_node, self.vg_name)
            }
        }
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    fn run(&mut self, report: &mut Report, _ctx: &mut ExecContext<'_>) -> bool {
        let result = match self.direction {
            VgResizeDirection::Grow => {
                if !report_result(
                    report,
                    "pvcreate",
                    lvm_tools::create_physical_volume(&self.pv_node, TOOL_TIMEOUT),
                ) {
                    return finish(&mut self.status, report, false, "resize volume group");
                }
                lvm_tools::extend_volume_group(&self.vg_name, &self.pv_node, TOOL_TIMEOUT)
            }
            VgResizeDirection::Shrink => {
                lvm_tools::reduce_volume_group(&self.vg_name, &self.pv_node, TOOL_TIMEOUT)
            }
        };
        let ok = report_result(report, "resize", result);
        finish(&mut self.status, report, ok, "resize volume group")
    }
}

/// Evacuate allocated extents off a physical volume about to be removed.
pub struct MovePhysicalVolumeJob {
    pv_node: String,
    status: JobStatus,
}

impl MovePhysicalVolumeJob {
    pub fn new(pv_node: impl Into<String>) -> Self {
        Self {
            pv_node: pv_node.into(),
            status: JobStatus::Pending,
        }
    }
}

impl Job for MovePhysicalVolumeJob {
    fn description(&self) -> String {
        format!("Move extents off physical volume {}", self.pv_node)
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    fn run(&mut self, report: &mut Report, _ctx: &mut ExecContext<'_>) -> bool {
        let ok = report_result(
            report,
            "pvmove",
            lvm_tools::move_physical_volume(&self.pv_node, TOOL_TIMEOUT),
        );
        finish(&mut self.status, report, ok, "move physical volume")
    }
}

/// Deactivate every logical volume of a volume group.
pub struct DeactivateLogicalVolumeJob {
    lv_paths: Vec<String>,
    status: JobStatus,
}

impl DeactivateLogicalVolumeJob {
    pub fn new(lv_paths: Vec<String>) -> Self {
        Self {
            lv_paths,
            status: JobStatus::Pending,
        }
    }
}

impl Job for DeactivateLogicalVolumeJob {
    fn description(&self) -> String {
        format!("Deactivate {} logical volume(s)", self.lv_paths.len())
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    fn run(&mut self, report: &mut Report, _ctx: &mut ExecContext<'_>) -> bool {
        for lv_path in &self.lv_paths {
            if !report_result(
                report,
                "lvchange",
                lvm_tools::set_logical_volume_active(lv_path, false, TOOL_TIMEOUT),
            ) {
                return finish(&mut self.status, report, false, "deactivate logical volumes");
            }
        }
        finish(&mut self.status, report, true, "deactivate logical volumes")
    }
}

/// Deactivate a volume group.
pub struct DeactivateVolumeGroupJob {
    vg_name: String,
    status: JobStatus,
}

impl DeactivateVolumeGroupJob {
    pub fn new(vg_name: impl Into<String>) -> Self {
        Self {
            vg_name: vg_name.into(),
            status: JobStatus::Pending,
        }
    }
}

impl Job for DeactivateVolumeGroupJob {
    fn description(&self) -> String {
        format!("Deactivate volume group {}", self.vg_name)
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    fn run(&mut self, report: &mut Report, _ctx: &mut ExecContext<'_>) -> bool {
        let ok = report_result(
            report,
            "vgchange",
            lvm_tools::set_volume_group_active(&self.vg_name, false, TOOL_TIMEOUT),
        );
        finish(&mut self.status, report, ok, "deactivate volume group")
    }
}
