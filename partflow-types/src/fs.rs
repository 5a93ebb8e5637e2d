// SPDX-License-Identifier: GPL-3.0-only

//! Filesystem type identifiers and capability support levels.

use serde::{Deserialize, Serialize};

/// Known filesystem types, including the LUKS container pseudo-types and the
/// LVM physical-volume signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FileSystemType {
    Ext2,
    Ext3,
    Ext4,
    Btrfs,
    Xfs,
    F2fs,
    Fat16,
    Fat32,
    Ntfs,
    Exfat,
    LinuxSwap,
    Luks,
    Luks2,
    Lvm2Pv,
    #[default]
    Unformatted,
    Unknown,
}

impl FileSystemType {
    /// Blkid/tool-facing string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ext2 => "ext2",
            Self::Ext3 => "ext3",
            Self::Ext4 => "ext4",
            Self::Btrfs => "btrfs",
            Self::Xfs => "xfs",
            Self::F2fs => "f2fs",
            Self::Fat16 => "fat16",
            Self::Fat32 => "fat32",
            Self::Ntfs => "ntfs",
            Self::Exfat => "exfat",
            Self::LinuxSwap => "linux-swap",
            Self::Luks => "crypto_LUKS",
            Self::Luks2 => "crypto_LUKS2",
            Self::Lvm2Pv => "LVM2_member",
            Self::Unformatted => "unformatted",
            Self::Unknown => "unknown",
        }
    }

    /// Parse from a blkid/tool string.
    pub fn parse(s: &str) -> Self {
        match s {
            "ext2" => Self::Ext2,
            "ext3" => Self::Ext3,
            "ext4" => Self::Ext4,
            "btrfs" => Self::Btrfs,
            "xfs" => Self::Xfs,
            "f2fs" => Self::F2fs,
            "fat16" | "msdos" => Self::Fat16,
            "fat32" | "vfat" => Self::Fat32,
            "ntfs" => Self::Ntfs,
            "exfat" => Self::Exfat,
            "linux-swap" | "swap" => Self::LinuxSwap,
            "crypto_LUKS" => Self::Luks,
            "crypto_LUKS2" => Self::Luks2,
            "LVM2_member" => Self::Lvm2Pv,
            "unformatted" | "" => Self::Unformatted,
            _ => Self::Unknown,
        }
    }

    /// Whether this type is one of the LUKS container variants.
    pub fn is_crypt(&self) -> bool {
        matches!(self, Self::Luks | Self::Luks2)
    }

    /// Maximum label length the filesystem's tooling accepts, if labels are
    /// supported at all.
    pub fn max_label_length(&self) -> Option<usize> {
        match self {
            Self::Ext2 | Self::Ext3 | Self::Ext4 => Some(16),
            Self::Btrfs | Self::Xfs | Self::F2fs => Some(255),
            Self::Fat16 | Self::Fat32 | Self::Exfat => Some(11),
            Self::Ntfs => Some(128),
            Self::LinuxSwap => Some(15),
            Self::Luks | Self::Luks2 => Some(32),
            Self::Lvm2Pv | Self::Unformatted | Self::Unknown => None,
        }
    }
}

/// How a filesystem command category is supported: not at all, implemented in
/// the core itself, or by an external tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportLevel {
    None,
    Core,
    Tool,
}

impl SupportLevel {
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Filesystem command categories queried per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandCategory {
    Create,
    Grow,
    Shrink,
    Move,
    Copy,
    Check,
    SetLabel,
    UpdateUuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filesystem_type_strings_roundtrip() {
        for fs in [
            FileSystemType::Ext4,
            FileSystemType::Btrfs,
            FileSystemType::Luks2,
            FileSystemType::Lvm2Pv,
        ] {
            assert_eq!(FileSystemType::parse(fs.as_str()), fs);
        }
    }

    #[test]
    fn unknown_strings_map_to_unknown() {
        assert_eq!(FileSystemType::parse("zfs"), FileSystemType::Unknown);
        assert_eq!(FileSystemType::parse(""), FileSystemType::Unformatted);
    }
}
