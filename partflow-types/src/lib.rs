// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for the partflow partition-management engine.
//!
//! This crate defines the single source of truth for the storage domain types
//! used throughout the stack:
//!
//! - **partflow-sys**: produces these types from LVM/mdadm field queries
//! - **partflow-core**: builds its device/partition/operation model on them
//!
//! The types here are plain data: no device handles, no tool invocations.

pub mod common;
pub mod device;
pub mod fs;
pub mod lvm;
pub mod partition;
pub mod raid;

pub use common::{SECTOR_UNKNOWN, UUID_UNKNOWN, bytes_to_pretty, pretty_to_bytes};
pub use device::DeviceKindTag;
pub use fs::{CommandCategory, FileSystemType, SupportLevel};
pub use lvm::{LvInfo, PvInfo, VgInfo};
pub use partition::{
    PartitionFlag, PartitionFlags, PartitionRole, PartitionRoles, PartitionState,
    PartitionTableType,
};
pub use raid::{MdArrayInfo, MdArrayState};
