// SPDX-License-Identifier: GPL-3.0-only

//! Jobs driving mdadm.

use super::{Job, JobStatus, TOOL_TIMEOUT, finish};
use crate::backend::ExecContext;
use crate::report::Report;
use partflow_sys::raid as raid_tools;

fn report_result(report: &mut Report, what: &str, result: partflow_sys::Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(error) => {
            report.line(format!("{what}: {error}"));
            false
        }
    }
}

/// Create a new array over a set of member devices. Must run before any job
/// that registers or uses the array.
pub struct CreateRaidArrayJob {
    array_node: String,
    level: String,
    members: Vec<String>,
    status: JobStatus,
}

impl CreateRaidArrayJob {
    pub fn new(array_node: impl Into<String>, level: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            array_node: array_node.into(),
            level: level.into(),
            members,
            status: JobStatus::Pending,
        }
    }
}

impl Job for CreateRaidArrayJob {
    fn description(&self) -> String {
        format!(
            "Create {} array {} over {} member(s)",
            self.level,
            self.array_node,
            self.members.len()
        )
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    fn run(&mut self, report: &mut Report, _ctx: &mut ExecContext<'_>) -> bool {
        let count = self.members.len().to_string();
        let mut args = vec![
            "--create",
            self.array_node.as_str(),
            "--level",
            self.level.as_str(),
            "--raid-devices",
            count.as_str(),
            "--run",
        ];
        args.extend(self.members.iter().map(String::as_str));

        let ok = match partflow_sys::cmd::run_capture_with_timeout("mdadm", &args, TOOL_TIMEOUT) {
            Ok(output) if output.success() => true,
            Ok(output) => {
                report.line(format!("mdadm --create: {}", output.stderr.trim()));
                false
            }
            Err(error) => {
                report.line(format!("mdadm --create: {error}"));
                false
            }
        };
        finish(&mut self.status, report, ok, "create raid array")
    }
}

/// Assemble (activate) a known array.
pub struct ActivateRaidJob {
    array_node: String,
    status: JobStatus,
}

impl ActivateRaidJob {
    pub fn new(array_node: impl Into<String>) -> Self {
        Self {
            array_node: array_node.into(),
            status: JobStatus::Pending,
        }
    }
}

impl Job for ActivateRaidJob {
    fn description(&self) -> String {
        format!("Assemble RAID array {}", self.array_node)
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    fn run(&mut self, report: &mut Report, _ctx: &mut ExecContext<'_>) -> bool {
        let ok = report_result(
            report,
            "mdadm --assemble",
            raid_tools::assemble_array(&self.array_node, TOOL_TIMEOUT),
        );
        finish(&mut self.status, report, ok, "assemble raid array")
    }
}

/// Stop (deactivate) an assembled array.
pub struct DeactivateRaidJob {
    array_node: String,
    status: JobStatus,
}

impl DeactivateRaidJob {
    pub fn new(array_node: impl Into<String>) -> Self {
        Self {
            array_node: array_node.into(),
            status: JobStatus::Pending,
        }
    }
}

impl Job for DeactivateRaidJob {
    fn description(&self) -> String {
        format!("Stop RAID array {}", self.array_node)
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    fn run(&mut self, report: &mut Report, _ctx: &mut ExecContext<'_>) -> bool {
        let ok = report_result(
            report,
            "mdadm --stop",
            raid_tools::stop_array(&self.array_node, TOOL_TIMEOUT),
        );
        finish(&mut self.status, report, ok, "stop raid array")
    }
}
