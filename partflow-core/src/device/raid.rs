// SPDX-License-Identifier: GPL-3.0-only

//! Software RAID array presented as a device.

use serde::{Deserialize, Serialize};

use super::VolumeManager;
use partflow_types::MdArrayState;

/// Kind-specific data of an mdraid array device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftwareRaid {
    /// Array name from metadata, when present.
    pub array_name: Option<String>,

    /// Array UUID ("---" when unknown).
    pub uuid: String,

    /// RAID level ("raid0", "raid1", ...), when known.
    pub level: Option<String>,

    /// Chunk size in bytes (-1 when unknown).
    pub chunk_size: i64,

    /// Member device nodes.
    pub members: Vec<String>,

    pub state: MdArrayState,
}

impl SoftwareRaid {
    pub fn is_active(&self) -> bool {
        matches!(self.state, MdArrayState::Active | MdArrayState::Degraded)
    }
}

impl VolumeManager for SoftwareRaid {
    fn member_nodes(&self) -> Vec<String> {
        self.members.clone()
    }
}
