// SPDX-License-Identifier: GPL-3.0-only

//! Filesystem capability model.
//!
//! A partition owns one [`FileSystem`]: either a plain filesystem or a LUKS
//! container structurally wrapping an inner one. Per-type behavior is a
//! data-driven support table, not a subclass per filesystem; the actual tool
//! invocations live behind the [`FileSystemDriver`] collaborator trait.

mod luks;

pub use luks::{CryptCollaborator, InnerProbe, LuksContainer, LuksVersion, PassphraseProvider};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::report::Report;
use partflow_types::{CommandCategory, FileSystemType, SupportLevel};

/// Support level for one command category of one filesystem type.
///
/// "Core" means the engine implements it itself (sector copy for move/copy),
/// "Tool" means an external utility does.
pub fn support_for(fs_type: FileSystemType, category: CommandCategory) -> SupportLevel {
    use CommandCategory::*;
    use FileSystemType::*;
    use SupportLevel::*;

    match fs_type {
        Ext2 | Ext3 | Ext4 => match category {
            Create | Grow | Shrink | Check | SetLabel | UpdateUuid => Tool,
            Move | Copy => Core,
        },
        Btrfs => match category {
            Create | Grow | Shrink | Check | SetLabel | UpdateUuid => Tool,
            Move | Copy => Core,
        },
        Xfs => match category {
            Create | Grow | Check | SetLabel | UpdateUuid => Tool,
            Shrink => None,
            Move | Copy => Core,
        },
        F2fs => match category {
            Create | Grow | Check | SetLabel => Tool,
            Shrink | UpdateUuid => None,
            Move | Copy => Core,
        },
        Fat16 | Fat32 => match category {
            Create | Check | SetLabel | UpdateUuid => Tool,
            Grow | Shrink => Tool,
            Move | Copy => Core,
        },
        Ntfs => match category {
            Create | Grow | Shrink | Check | SetLabel | UpdateUuid | Copy => Tool,
            Move => Core,
        },
        Exfat => match category {
            Create | Check | SetLabel => Tool,
            Grow | Shrink | UpdateUuid => None,
            Move | Copy => Core,
        },
        LinuxSwap => match category {
            Create | SetLabel | UpdateUuid => Tool,
            Grow | Shrink | Move | Copy => Core,
            Check => None,
        },
        // A LUKS container is never independently operable; only its open
        // payload is. The container delegates, see FileSystem::support.
        Luks | Luks2 => None,
        Lvm2Pv => match category {
            Create | Grow | Shrink | Check | UpdateUuid => Tool,
            Move | Copy | SetLabel => None,
        },
        Unformatted | Unknown => None,
    }
}

/// A plain (non-container) filesystem on a partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainFileSystem {
    pub fs_type: FileSystemType,
    pub label: Option<String>,
    pub uuid: Option<String>,
}

impl PlainFileSystem {
    pub fn new(fs_type: FileSystemType) -> Self {
        Self {
            fs_type,
            label: None,
            uuid: None,
        }
    }

    pub fn with_label(fs_type: FileSystemType, label: impl Into<String>) -> Self {
        Self {
            fs_type,
            label: Some(label.into()),
            uuid: None,
        }
    }
}

/// The filesystem owned by a partition: plain, or a LUKS container wrapping
/// an inner filesystem that only exists while the container is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileSystem {
    Plain(PlainFileSystem),
    Luks(LuksContainer),
}

impl Default for FileSystem {
    fn default() -> Self {
        FileSystem::Plain(PlainFileSystem::default())
    }
}

impl FileSystem {
    pub fn plain(fs_type: FileSystemType) -> Self {
        FileSystem::Plain(PlainFileSystem::new(fs_type))
    }

    /// Effective type. For an open LUKS container this is the inner
    /// filesystem's type, computed per call so generic code can treat the
    /// decrypted partition as its payload type.
    pub fn fs_type(&self) -> FileSystemType {
        match self {
            FileSystem::Plain(plain) => plain.fs_type,
            FileSystem::Luks(container) => container.effective_type(),
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            FileSystem::Plain(plain) => plain.label.as_deref(),
            FileSystem::Luks(container) => container.effective_label(),
        }
    }

    pub fn uuid(&self) -> Option<&str> {
        match self {
            FileSystem::Plain(plain) => plain.uuid.as_deref(),
            FileSystem::Luks(container) => container.effective_uuid(),
        }
    }

    /// Capability query. A closed container supports nothing; an open one
    /// delegates to its payload.
    pub fn support(&self, category: CommandCategory) -> SupportLevel {
        match self {
            FileSystem::Plain(plain) => support_for(plain.fs_type, category),
            FileSystem::Luks(container) => match container.inner() {
                Some(inner) => support_for(inner.fs_type, category),
                None => SupportLevel::None,
            },
        }
    }

    pub fn support_grow(&self) -> SupportLevel {
        self.support(CommandCategory::Grow)
    }

    pub fn support_shrink(&self) -> SupportLevel {
        self.support(CommandCategory::Shrink)
    }

    pub fn support_check(&self) -> SupportLevel {
        self.support(CommandCategory::Check)
    }

    pub fn support_set_label(&self) -> SupportLevel {
        self.support(CommandCategory::SetLabel)
    }
}

/// Collaborator performing the per-type tool invocations. One driver per
/// filesystem type; each action reports into the given scope and returns
/// plain success/failure.
pub trait FileSystemDriver {
    fn fs_type(&self) -> FileSystemType;

    fn create(&self, report: &mut Report, device_node: &str) -> bool;
    fn check(&self, report: &mut Report, device_node: &str) -> bool;
    fn resize(&self, report: &mut Report, device_node: &str, new_length_bytes: u64) -> bool;
    fn resize_online(&self, report: &mut Report, device_node: &str, new_length_bytes: u64) -> bool {
        let _ = (report, device_node, new_length_bytes);
        false
    }
    fn write_label(&self, report: &mut Report, device_node: &str, label: &str) -> bool;
    fn write_label_online(&self, report: &mut Report, device_node: &str, label: &str) -> bool {
        let _ = (report, device_node, label);
        false
    }
    fn update_uuid(&self, report: &mut Report, device_node: &str) -> bool;
    fn copy(&self, report: &mut Report, target_node: &str, source_node: &str) -> bool;
    fn relocate(&self, report: &mut Report, device_node: &str, new_first_sector: u64) -> bool;
    fn mount(&self, report: &mut Report, device_node: &str, mount_point: &str) -> bool;
    fn unmount(&self, report: &mut Report, device_node: &str) -> bool;
}

/// Driver lookup keyed on filesystem type.
#[derive(Default)]
pub struct FileSystemDriverRegistry {
    drivers: HashMap<FileSystemType, Box<dyn FileSystemDriver>>,
}

impl FileSystemDriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, driver: Box<dyn FileSystemDriver>) {
        self.drivers.insert(driver.fs_type(), driver);
    }

    pub fn get(&self, fs_type: FileSystemType) -> Option<&dyn FileSystemDriver> {
        self.drivers.get(&fs_type).map(|driver| driver.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_luks_supports_nothing() {
        let fs = FileSystem::Luks(LuksContainer::new(LuksVersion::Luks2));
        assert_eq!(fs.support_grow(), SupportLevel::None);
        assert_eq!(fs.support_check(), SupportLevel::None);
        assert_eq!(fs.fs_type(), FileSystemType::Luks2);
    }

    #[test]
    fn xfs_cannot_shrink() {
        let fs = FileSystem::plain(FileSystemType::Xfs);
        assert_eq!(fs.support_shrink(), SupportLevel::None);
        assert_eq!(fs.support_grow(), SupportLevel::Tool);
    }

    #[test]
    fn move_and_copy_are_core_for_ext4() {
        assert_eq!(
            support_for(FileSystemType::Ext4, CommandCategory::Move),
            SupportLevel::Core
        );
        assert_eq!(
            support_for(FileSystemType::Ext4, CommandCategory::Copy),
            SupportLevel::Core
        );
    }
}
