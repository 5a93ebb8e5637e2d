// SPDX-License-Identifier: GPL-3.0-only

//! Low-level system operations for the partflow engine.
//!
//! This crate wraps the external tools the engine shells out to:
//! - the LVM command-line suite (vgs/lvs/pvs field queries, vgcreate, ...)
//! - mdadm and /proc/mdstat for software RAID
//! - the system mount table (/etc/fstab) with crash-safe rewriting
//!
//! Everything here is synchronous; callers that must not block run these
//! from a worker thread.

pub mod cmd;
pub mod error;
pub mod fstab;
pub mod lvm;
pub mod raid;

pub use cmd::{CommandOutput, run_capture, run_capture_with_timeout};
pub use error::{Result, SysError};
pub use fstab::{FsSpec, FstabEntry, FstabLine, TagLookup, read_fstab_entries, write_mountpoints};
