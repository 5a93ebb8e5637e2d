// SPDX-License-Identifier: GPL-3.0-only

//! Partition roles, states and table types.

use enumflags2::{BitFlags, bitflags};
use serde::{Deserialize, Serialize};

/// Role a partition plays in its table. A partition may carry more than one
/// role (e.g. a logical partition holding a LUKS container).
#[bitflags]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionRole {
    Primary = 1 << 0,
    Extended = 1 << 1,
    Logical = 1 << 2,
    Unallocated = 1 << 3,
    Luks = 1 << 4,
    LvmLv = 1 << 5,
}

/// Role bitset. Empty means "no role assigned".
pub type PartitionRoles = BitFlags<PartitionRole>;

/// Table-entry flag of a partition. Which flags are available depends on
/// the table type and is reported per partition by the backend.
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionFlag {
    Boot = 1 << 0,
    Esp = 1 << 1,
    Hidden = 1 << 2,
    Raid = 1 << 3,
    Lvm = 1 << 4,
}

impl PartitionFlag {
    /// Flag name as the backends spell it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boot => "boot",
            Self::Esp => "esp",
            Self::Hidden => "hidden",
            Self::Raid => "raid",
            Self::Lvm => "lvm",
        }
    }
}

/// Flag bitset.
pub type PartitionFlags = BitFlags<PartitionFlag>;

/// Whether a partition exists on disk or only in the preview model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PartitionState {
    /// Scanned from the device; exists on disk.
    #[default]
    Existing,
    /// Created by a pending operation, not yet committed.
    New,
    /// Copy target of a pending copy operation.
    Copy,
    /// Restore target of a pending restore operation.
    Restore,
}

/// Partition table type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionTableType {
    /// MBR/DOS (Master Boot Record)
    MsDos,

    /// GPT (GUID Partition Table)
    Gpt,

    /// Virtual mapped device table used for LVM volume groups and RAID
    /// arrays; its "partitions" are logical constructs.
    Vmd,

    /// No recognizable table.
    None,
}

impl PartitionTableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MsDos => "msdos",
            Self::Gpt => "gpt",
            Self::Vmd => "vmd",
            Self::None => "none",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "msdos" | "dos" | "mbr" => Some(Self::MsDos),
            "gpt" => Some(Self::Gpt),
            "vmd" => Some(Self::Vmd),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    /// Highest primary-partition count the table supports. Vmd tables have
    /// no fixed limit; we use the GPT default for them.
    pub fn max_primaries(&self) -> u32 {
        match self {
            Self::MsDos => 4,
            Self::Gpt | Self::Vmd => 128,
            Self::None => 0,
        }
    }

    /// Whether a delete on this table type removes a real table entry.
    /// Vmd tables have no entries to remove; their members are managed by
    /// the volume manager's own tooling.
    pub fn has_table_entries(&self) -> bool {
        matches!(self, Self::MsDos | Self::Gpt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_type_strings_roundtrip() {
        for t in [
            PartitionTableType::MsDos,
            PartitionTableType::Gpt,
            PartitionTableType::Vmd,
            PartitionTableType::None,
        ] {
            assert_eq!(PartitionTableType::parse(t.as_str()), Some(t));
        }
        assert_eq!(
            PartitionTableType::parse("dos"),
            Some(PartitionTableType::MsDos)
        );
    }

    #[test]
    fn roles_compose_as_bitset() {
        let roles: PartitionRoles = PartitionRole::Logical | PartitionRole::Luks;
        assert!(roles.contains(PartitionRole::Logical));
        assert!(!roles.contains(PartitionRole::Unallocated));
    }
}
