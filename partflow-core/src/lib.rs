// SPDX-License-Identifier: GPL-3.0-only

//! Partition-management engine: device/partition model, operation/job
//! pipeline, and the LVM/RAID volume-manager-device mapping.
//!
//! The engine keeps an in-memory preview of disk state. User intent becomes
//! an [`ops::Operation`], which is previewed against the model (tree-only
//! mutation, no I/O) and pushed onto the [`stack::OperationStack`]. On
//! commit, each operation's [`jobs::Job`]s run strictly in order against the
//! backend and filesystem collaborators, writing into a hierarchical
//! [`report::Report`].
//!
//! Concrete backends (libparted, sfdisk, ...) and filesystem drivers
//! (mkfs.*, resize2fs, ...) are external collaborators behind the traits in
//! [`backend`] and [`fs`].

pub mod backend;
pub mod device;
pub mod fs;
pub mod jobs;
pub mod lvm;
pub mod ops;
pub mod partition;
pub mod report;
pub mod scan;
pub mod stack;

pub use backend::{CoreBackend, CoreBackendDevice, CoreBackendPartitionTable, ExecContext};
pub use device::{Device, DeviceKind, LvmDevice, SoftwareRaid, VolumeManager};
pub use fs::{
    CryptCollaborator, FileSystem, FileSystemDriver, FileSystemDriverRegistry, LuksContainer,
    PassphraseProvider, PlainFileSystem,
};
pub use lvm::{LvmContext, PvEntry};
pub use ops::{
    ActivateRaidOperation, CopyOperation, CreateVolumeGroupOperation, DeactivateRaidOperation,
    DeactivateVolumeGroupOperation, DeleteOperation, NewOperation, Operation, OperationStatus,
    ResizeOperation, ResizeVolumeGroupOperation, ShredAction, VolumeManagerKind,
};
pub use partition::{Partition, PartitionNode, PartitionTable};
pub use report::Report;
pub use scan::{DeviceScanner, ScanEvent, SystemVolumeManagerScanner, VolumeManagerScanner};
pub use stack::{DeviceModel, OperationStack};
