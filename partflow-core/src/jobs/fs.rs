// SPDX-License-Identifier: GPL-3.0-only

//! Jobs acting on filesystems through the driver collaborators.

use std::time::Duration;

use super::{Job, JobStatus, TOOL_TIMEOUT, finish, targets_match};
use crate::backend::ExecContext;
use crate::partition::Partition;
use crate::report::Report;
use partflow_types::FileSystemType;

fn no_driver(report: &mut Report, fs_type: FileSystemType) -> bool {
    report.line(format!("no driver for file system {}", fs_type.as_str()));
    false
}

/// Create a filesystem on a partition's device node.
pub struct CreateFileSystemJob {
    partition: Partition,
    fs_type: FileSystemType,
    status: JobStatus,
}

impl CreateFileSystemJob {
    pub fn new(partition: Partition, fs_type: FileSystemType) -> Self {
        Self {
            partition,
            fs_type,
            status: JobStatus::Pending,
        }
    }
}

impl Job for CreateFileSystemJob {
    fn description(&self) -> String {
        format!(
            "Create {} on {}",
            self.fs_type.as_str(),
            self.partition.display_device_node()
        )
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    fn run(&mut self, report: &mut Report, ctx: &mut ExecContext<'_>) -> bool {
        let ok = match ctx.drivers.get(self.fs_type) {
            Some(driver) => driver.create(report, &self.partition.device_node),
            None => no_driver(report, self.fs_type),
        };
        finish(&mut self.status, report, ok, "create file system")
    }
}

/// Wipe the filesystem signature inside a partition. Runs before the table
/// entry is removed, so no dangling signature can confuse later scans.
pub struct DeleteFileSystemJob {
    device_node: String,
    partition: Partition,
    status: JobStatus,
}

impl DeleteFileSystemJob {
    pub fn new(device_node: impl Into<String>, partition: Partition) -> Self {
        Self {
            device_node: device_node.into(),
            partition,
            status: JobStatus::Pending,
        }
    }
}

impl Job for DeleteFileSystemJob {
    fn description(&self) -> String {
        format!("Delete file system on {}", self.partition.device_node)
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

        let ok = table.clobber_file_system(&self.partition);
        finish(&mut self.status, report, ok, "clobber file system")
    }
}

/// Check a filesystem. A check immediately after a move can spuriously fail
/// before the backend has seen the moved data, so this job retries exactly
/// once after a fixed delay — the only built-in retry in the core.
pub struct CheckFileSystemJob {
    partition: Partition,
    retry_delay: Duration,
    status: JobStatus,
}

impl CheckFileSystemJob {
    pub fn new(partition: Partition) -> Self {
        Self {
            partition,
            retry_delay: Duration::from_secs(2),
            status: JobStatus::Pending,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

impl Job for CheckFileSystemJob {
    fn description(&self) -> String {
        format!("Check file system on {}", self.partition.device_node)
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    fn run(&mut self, report: &mut Report, ctx: &mut ExecContext<'_>) -> bool {
        let fs_type = self.partition.fs.fs_type();
        let Some(driver) = ctx.drivers.get(fs_type) else {
            let ok = no_driver(report, fs_type);
            return finish(&mut self.status, report, ok, "check file system");
        };

        let mut ok = driver.check(report, &self.partition.device_node);
        if !ok {
            report.line("check failed, retrying once");
            std::thread::sleep(self.retry_delay);
            ok = driver.check(report, &self.partition.device_node);
        }
        finish(&mut self.status, report, ok, "check file system")
    }
}

/// Grow or shrink a filesystem to a new byte length.
pub struct ResizeFileSystemJob {
    partition: Partition,
    new_length_bytes: u64,
    status: JobStatus,
}

impl ResizeFileSystemJob {
    pub fn new(partition: Partition, new_length_bytes: u64) -> Self {
        Self {
            partition,
            new_length_bytes,
            status: JobStatus::Pending,
        }
    }
}

impl Job for ResizeFileSystemJob {
    fn description(&self) -> String {
        format!(
            "Resize file system on {} to {} bytes",
            self.partition.device_node, self.new_length_bytes
        )
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    fn run(&mut self, report: &mut Report, ctx: &mut ExecContext<'_>) -> bool {
        let fs_type = self.partition.fs.fs_type();
        let ok = match ctx.drivers.get(fs_type) {
            Some(driver) => {
                if self.partition.mounted {
                    driver.resize_online(report, &self.partition.device_node, self.new_length_bytes)
                } else {
                    driver.resize(report, &self.partition.device_node, self.new_length_bytes)
                }
            }
            None => no_driver(report, fs_type),
        };
        finish(&mut self.status, report, ok, "resize file system")
    }
}

/// Relocate filesystem data to a new first sector.
pub struct MoveFileSystemJob {
    partition: Partition,
    new_first_sector: u64,
    status: JobStatus,
}

impl MoveFileSystemJob {
    pub fn new(partition: Partition, new_first_sector: u64) -> Self {
        Self {
            partition,
            new_first_sector,
            status: JobStatus::Pending,
        }
    }
}

impl Job for MoveFileSystemJob {
    fn description(&self) -> String {
        format!(
            "Move file system on {} to sector {}",
            self.partition.device_node, self.new_first_sector
        )
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    fn run(&mut self, report: &mut Report, ctx: &mut ExecContext<'_>) -> bool {
        let fs_type = self.partition.fs.fs_type();
        let ok = match ctx.drivers.get(fs_type) {
            Some(driver) => {
                driver.relocate(report, &self.partition.device_node, self.new_first_sector)
            }
            None => no_driver(report, fs_type),
        };
        finish(&mut self.status, report, ok, "move file system")
    }
}

/// Copy a filesystem from a source partition onto a target.
pub struct CopyFileSystemJob {
    target: Partition,
    source_node: String,
    status: JobStatus,
}

impl CopyFileSystemJob {
    pub fn new(target: Partition, source_node: impl Into<String>) -> Self {
        Self {
            target,
            source_node: source_node.into(),
            status: JobStatus::Pending,
        }
    }
}

impl Job for CopyFileSystemJob {
    fn description(&self) -> String {
        format!(
            "Copy file system from {} to {}",
            self.source_node,
            self.target.display_device_node()
        )
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    fn run(&mut self, report: &mut Report, ctx: &mut ExecContext<'_>) -> bool {
        let fs_type = self.target.fs.fs_type();
        let ok = match ctx.drivers.get(fs_type) {
            Some(driver) => driver.copy(report, &self.target.device_node, &self.source_node),
            None => no_driver(report, fs_type),
        };
        finish(&mut self.status, report, ok, "copy file system")
    }
}

/// Write a filesystem label.
pub struct SetFileSystemLabelJob {
    partition: Partition,
    label: String,
    status: JobStatus,
}

impl SetFileSystemLabelJob {
    pub fn new(partition: Partition, label: impl Into<String>) -> Self {
        Self {
            partition,
            label: label.into(),
            status: JobStatus::Pending,
        }
    }
}

impl Job for SetFileSystemLabelJob {
    fn description(&self) -> String {
        format!(
            "Set label of {} to \"{}\"",
            self.partition.device_node, self.label
        )
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    fn run(&mut self, report: &mut Report, ctx: &mut ExecContext<'_>) -> bool {
        let fs_type = self.partition.fs.fs_type();
        if let Some(max) = fs_type.max_label_length() {
            if self.label.len() > max {
                report.line(format!(
                    "label exceeds {} characters allowed by {}",
                    max,
                    fs_type.as_str()
                ));
                return finish(&mut self.status, report, false, "write label");
            }
        }

        let ok = match ctx.drivers.get(fs_type) {
            Some(driver) => {
                if self.partition.mounted {
                    driver.write_label_online(report, &self.partition.device_node, &self.label)
                } else {
                    driver.write_label(report, &self.partition.device_node, &self.label)
                }
            }
            None => no_driver(report, fs_type),
        };
        finish(&mut self.status, report, ok, "write label")
    }
}

/// Overwrite a partition's contents before its entry is deleted, either
/// with zeros or with random data. Whole mebibytes only; a final partial
/// block keeps its old contents.
pub struct ShredFileSystemJob {
    partition: Partition,
    random_source: bool,
    status: JobStatus,
}

impl ShredFileSystemJob {
    pub fn new(partition: Partition, random_source: bool) -> Self {
        Self {
            partition,
            random_source,
            status: JobStatus::Pending,
        }
    }
}

impl Job for ShredFileSystemJob {
    fn description(&self) -> String {
        format!(
            "Overwrite {} with {} data",
            self.partition.device_node,
            if self.random_source { "random" } else { "zero" }
        )
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    fn run(&mut self, report: &mut Report, _ctx: &mut ExecContext<'_>) -> bool {
        let source = if self.random_source {
            "/dev/urandom"
        } else {
            "/dev/zero"
        };
        let mebibytes = self.partition.capacity() / (1024 * 1024);
        let input = format!("if={source}");
        let output = format!("of={}", self.partition.device_node);
        let count = format!("count={mebibytes}");

        // No deadline here: overwriting a large partition legitimately
        // takes longer than any single-tool timeout.
        let ok = match partflow_sys::cmd::run_capture(
            "dd",
            &[&input, &output, "bs=1M", &count, "conv=fsync"],
        ) {
            Ok(_) => true,
            Err(error) => {
                report.line(format!("dd: {error}"));
                false
            }
        };
        finish(&mut self.status, report, ok, "overwrite file system")
    }
}

/// Open up permissions on the root of a freshly created filesystem, so a
/// non-root user can populate it. Mounts to a temporary point, runs chmod,
/// unmounts again.
pub struct ChangePermissionJob {
    partition: Partition,
    status: JobStatus,
}

impl ChangePermissionJob {
    pub fn new(partition: Partition) -> Self {
        Self {
            partition,
            status: JobStatus::Pending,
        }
    }
}

impl Job for ChangePermissionJob {
    fn description(&self) -> String {
        format!("Set permissions on {}", self.partition.device_node)
    }

    fn status(&self) -> JobStatus {
        self.status
    }

    fn run(&mut self, report: &mut Report, ctx: &mut ExecContext<'_>) -> bool {
        let fs_type = self.partition.fs.fs_type();
        let Some(driver) = ctx.drivers.get(fs_type) else {
            let ok = no_driver(report, fs_type);
            return finish(&mut self.status, report, ok, "set permissions");
        };

        let mount_point = std::env::temp_dir().join(format!(
            "partflow-perm-{}",
            self.partition.device_node.replace('/', "_")
        ));
        if std::fs::create_dir_all(&mount_point).is_err() {
            return finish(&mut self.status, report, false, "create mount point");
        }
        let mount_point_str = mount_point.to_string_lossy().to_string();

        if !driver.mount(report, &self.partition.device_node, &mount_point_str) {
            let _ = std::fs::remove_dir(&mount_point);
            return finish(&mut self.status, report, false, "mount file system");
        }

        let chmod_ok = partflow_sys::cmd::run_capture_with_timeout(
            "chmod",
            &["777", &mount_point_str],
            TOOL_TIMEOUT,
        )
        .map(|output| output.success())
        .unwrap_or(false);
        report.line(format!(
            "chmod 777 {}: {}",
            mount_point_str,
            if chmod_ok { "ok" } else { "failed" }
        ));

        let unmount_ok = driver.unmount(report, &self.partition.device_node);
        if unmount_ok {
            let _ = std::fs::remove_dir(&mount_point);
        }
        finish(
            &mut self.status,
            report,
            chmod_ok && unmount_ok,
            "set permissions",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CoreBackend, CoreBackendDevice, ExecContext};
    use crate::device::Device;
    use crate::fs::{FileSystem, FileSystemDriver, FileSystemDriverRegistry};
    use partflow_types::PartitionRole;

    struct NoopBackend;

    impl CoreBackend for NoopBackend {
        fn scan_devices(&self) -> Vec<Device> {
            Vec::new()
        }

        fn scan_device(&self, _node: &str) -> Option<Device> {
            None
        }

        fn detect_file_system(&self, _node: &str) -> FileSystemType {
            FileSystemType::Unknown
        }

        fn open_device(&mut self, _node: &str) -> Option<Box<dyn CoreBackendDevice>> {
            None
        }
    }

    // Succeeds at mount/unmount without touching any real device.
    struct LoopbackDriver;

    impl FileSystemDriver for LoopbackDriver {
        fn fs_type(&self) -> FileSystemType {
            FileSystemType::Ext4
        }

        fn create(&self, _report: &mut Report, _device_node: &str) -> bool {
            true
        }

        fn check(&self, _report: &mut Report, _device_node: &str) -> bool {
            true
        }

        fn resize(&self, _report: &mut Report, _device_node: &str, _new_length_bytes: u64) -> bool {
            true
        }

        fn write_label(&self, _report: &mut Report, _device_node: &str, _label: &str) -> bool {
            true
        }

        fn update_uuid(&self, _report: &mut Report, _device_node: &str) -> bool {
            true
        }

        fn copy(&self, _report: &mut Report, _target_node: &str, _source_node: &str) -> bool {
            true
        }

        fn relocate(&self, _report: &mut Report, _device_node: &str, _new_first_sector: u64) -> bool {
            true
        }

        fn mount(&self, _report: &mut Report, _device_node: &str, _mount_point: &str) -> bool {
            true
        }

        fn unmount(&self, _report: &mut Report, _device_node: &str) -> bool {
            true
        }
    }

    #[test]
    fn permission_job_removes_its_mount_point() {
        let partition = Partition::new(
            "/dev/partflow-perm-test",
            1,
            PartitionRole::Primary.into(),
            0,
            999,
            512,
            FileSystem::plain(FileSystemType::Ext4),
        );

        let mut registry = FileSystemDriverRegistry::new();
        registry.register(Box::new(LoopbackDriver));
        let mut backend = NoopBackend;
        let mut ctx = ExecContext::new(&mut backend, &registry);
        let mut report = Report::new_root();

        let mut job = ChangePermissionJob::new(partition);
        assert!(job.run(&mut report, &mut ctx));
        assert_eq!(job.status(), JobStatus::Success);

        let mount_point = std::env::temp_dir().join("partflow-perm-_dev_partflow-perm-test");
        assert!(!mount_point.exists());
    }
}
