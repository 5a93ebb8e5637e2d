// SPDX-License-Identifier: GPL-3.0-only

//! Software RAID (mdraid) scan rows.

use serde::{Deserialize, Serialize};

/// Assembly state of an mdraid array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MdArrayState {
    Active,
    Inactive,
    Degraded,
}

/// One array as reported by `mdadm --detail --scan` merged with
/// /proc/mdstat state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MdArrayInfo {
    /// Array device path (e.g., "/dev/md0")
    pub device: String,

    /// Array name from metadata, when present
    pub name: Option<String>,

    /// Array UUID ("---" when the query failed)
    pub uuid: String,

    /// RAID level ("raid0", "raid1", ...), when known
    pub level: Option<String>,

    /// Chunk size in bytes (-1 when unknown)
    pub chunk_size: i64,

    /// Total array size in sectors (-1 when unknown)
    pub total_sectors: i64,

    /// Member device paths
    pub members: Vec<String>,

    /// Assembly state
    pub state: MdArrayState,
}
