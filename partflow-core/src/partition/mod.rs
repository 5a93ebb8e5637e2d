// SPDX-License-Identifier: GPL-3.0-only

//! Partition tree model.
//!
//! A [`PartitionTable`] is the root node of a device's partition tree;
//! extended partitions are internal nodes holding logicals. Free space is
//! represented by synthetic children with the Unallocated role, regenerated
//! by [`PartitionTable::update_unallocated`] after every tree mutation so
//! that each sector between the usable bounds is accounted for by exactly
//! one child.
//!
//! Children are owned by value; removal is an explicit tree mutation, never
//! implicit in object lifetime.

use serde::{Deserialize, Serialize};

use crate::fs::FileSystem;
use crate::lvm::LvmContext;
use partflow_types::{
    FileSystemType, PartitionFlags, PartitionRole, PartitionRoles, PartitionState,
    PartitionTableType,
};

/// First device number the OS hands to logical partitions.
pub const FIRST_LOGICAL_NUMBER: u32 = 5;

/// A partition, logical volume, or synthetic unallocated region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Real device node for existing partitions; a placeholder for preview
    /// partitions (see [`Partition::display_device_node`]).
    pub device_node: String,

    /// Partition number within the table (0 for unallocated nodes).
    pub number: u32,

    pub roles: PartitionRoles,
    pub state: PartitionState,

    /// First sector, inclusive.
    pub first_sector: u64,

    /// Last sector, inclusive. Always >= first_sector.
    pub last_sector: u64,

    /// Logical sector size of the owning device, in bytes.
    pub sector_size: u64,

    pub mount_point: Option<String>,
    pub mounted: bool,

    /// Table-entry flags currently set.
    pub flags: PartitionFlags,

    /// Flags the table type allows on this partition.
    pub available_flags: PartitionFlags,

    pub fs: FileSystem,

    /// Logical children; only meaningful while the Extended role is set.
    children: Vec<Partition>,
}

impl Partition {
    pub fn new(
        device_node: impl Into<String>,
        number: u32,
        roles: PartitionRoles,
        first_sector: u64,
        last_sector: u64,
        sector_size: u64,
        fs: FileSystem,
    ) -> Self {
        debug_assert!(last_sector >= first_sector);
        Self {
            device_node: device_node.into(),
            number,
            roles,
            state: PartitionState::Existing,
            first_sector,
            last_sector,
            sector_size,
            mount_point: None,
            mounted: false,
            flags: PartitionFlags::empty(),
            available_flags: PartitionFlags::empty(),
            fs,
            children: Vec::new(),
        }
    }

    /// Synthetic free-space node filling [first_sector, last_sector].
    pub fn new_unallocated(first_sector: u64, last_sector: u64, sector_size: u64) -> Self {
        Self::new(
            String::new(),
            0,
            PartitionRole::Unallocated.into(),
            first_sector,
            last_sector,
            sector_size,
            FileSystem::default(),
        )
    }

    /// Length in sectors; at least 1 by the geometry invariant.
    pub fn length(&self) -> u64 {
        self.last_sector - self.first_sector + 1
    }

    pub fn capacity(&self) -> u64 {
        self.length() * self.sector_size
    }

    pub fn is_role(&self, role: PartitionRole) -> bool {
        self.roles.contains(role)
    }

    /// Display value for the device node. Preview partitions have no real
    /// path until their operation commits, and unallocated space has none
    /// at all.
    pub fn display_device_node(&self) -> String {
        if self.is_role(PartitionRole::Unallocated) {
            return "unallocated".to_string();
        }
        match self.state {
            PartitionState::Existing => self.device_node.clone(),
            PartitionState::New => format!("New partition #{}", self.number),
            PartitionState::Copy => format!("Copy of {}", self.device_node),
            PartitionState::Restore => format!("Restore target #{}", self.number),
        }
    }

    /// Whether a delete may be attempted. Mounted partitions and PVs that
    /// belong to a volume group (or are claimed by a pending operation)
    /// must not be deleted.
    pub fn can_delete(&self, lvm: &LvmContext) -> bool {
        if self.mounted || self.is_role(PartitionRole::Unallocated) {
            return false;
        }
        if self.fs.fs_type() == FileSystemType::Lvm2Pv {
            if lvm.is_dirty(&self.device_node) {
                return false;
            }
            if let Some(entry) = lvm.entry(&self.device_node) {
                if entry.vg_name.is_some() {
                    return false;
                }
            }
        }
        // An extended partition with real logical children goes last.
        if self.is_role(PartitionRole::Extended)
            && self
                .children
                .iter()
                .any(|child| !child.is_role(PartitionRole::Unallocated))
        {
            return false;
        }
        true
    }

    pub fn can_mount(&self) -> bool {
        !self.mounted
            && !self.is_role(PartitionRole::Unallocated)
            && self.fs.fs_type() != FileSystemType::Unformatted
            && self.fs.fs_type() != FileSystemType::Unknown
    }

    /// Renumber sibling logicals after a delete or insert within an
    /// extended partition, so later jobs addressing "partition N" still hit
    /// the intended device node. Exactly one argument is >= 0 per call.
    pub fn adjust_logical_numbers(&mut self, deleted_number: i64, inserted_number: i64) {
        debug_assert!(self.is_role(PartitionRole::Extended));
        debug_assert!((deleted_number >= 0) != (inserted_number >= 0));

        for child in &mut self.children {
            if !child.is_role(PartitionRole::Logical) {
                continue;
            }
            let number = child.number as i64;
            if deleted_number >= 0 && number > deleted_number {
                child.set_number(child.number - 1);
            } else if inserted_number >= 0 && number >= inserted_number {
                child.set_number(child.number + 1);
            }
        }
    }

    fn set_number(&mut self, number: u32) {
        self.number = number;
        if self.state == PartitionState::Existing && !self.device_node.is_empty() {
            self.device_node = renumbered_node(&self.device_node, number);
        }
    }
}

/// Rewrite the numeric suffix of a device node ("/dev/sda7" -> "/dev/sda6").
fn renumbered_node(node: &str, number: u32) -> String {
    let stem = node.trim_end_matches(|c: char| c.is_ascii_digit());
    format!("{stem}{number}")
}

/// A container of partitions kept sorted ascending by first sector. The two
/// concrete owners are [`PartitionTable`] and extended [`Partition`]s.
pub trait PartitionNode {
    fn children(&self) -> &[Partition];
    fn children_mut(&mut self) -> &mut Vec<Partition>;

    /// First sector children may occupy, inclusive.
    fn first_usable_sector(&self) -> u64;

    /// Last sector children may occupy, inclusive.
    fn last_usable_sector(&self) -> u64;

    /// Add a child and restore the sort invariant. Callers are responsible
    /// for not producing overlaps; this layer does not validate them.
    fn insert(&mut self, partition: Partition) {
        let children = self.children_mut();
        children.push(partition);
        children.sort_by_key(|child| child.first_sector);
    }

    /// Remove the child starting at the given sector. Returns false when no
    /// such child exists; callers treat that as recoverable.
    fn remove(&mut self, first_sector: u64) -> bool {
        let children = self.children_mut();
        match children
            .iter()
            .position(|child| child.first_sector == first_sector)
        {
            Some(index) => {
                children.remove(index);
                true
            }
            None => {
                tracing::warn!(first_sector, "no child to remove at sector");
                false
            }
        }
    }

    /// Find the child (not recursing) whose range contains the sector.
    fn child_at(&self, sector: u64) -> Option<&Partition> {
        self.children()
            .iter()
            .find(|child| child.first_sector <= sector && sector <= child.last_sector)
    }

    fn find_by_node(&self, device_node: &str) -> Option<&Partition> {
        for child in self.children() {
            if child.device_node == device_node && !child.is_role(PartitionRole::Unallocated) {
                return Some(child);
            }
            if let Some(found) = child.find_by_node(device_node) {
                return Some(found);
            }
        }
        None
    }

    fn find_by_node_mut(&mut self, device_node: &str) -> Option<&mut Partition> {
        // Two passes keep the borrow checker happy with recursion.
        let index = self.children().iter().position(|child| {
            child.device_node == device_node && !child.is_role(PartitionRole::Unallocated)
        });
        if let Some(index) = index {
            return Some(&mut self.children_mut()[index]);
        }
        for child in self.children_mut() {
            if let Some(found) = child.find_by_node_mut(device_node) {
                return Some(found);
            }
        }
        None
    }
}

impl PartitionNode for Partition {
    fn children(&self) -> &[Partition] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<Partition> {
        &mut self.children
    }

    fn first_usable_sector(&self) -> u64 {
        self.first_sector
    }

    fn last_usable_sector(&self) -> u64 {
        self.last_sector
    }
}

/// The root partition node of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionTable {
    pub table_type: PartitionTableType,
    pub first_usable: u64,
    pub last_usable: u64,
    pub max_primaries: u32,
    children: Vec<Partition>,
}

impl PartitionTable {
    pub fn new(table_type: PartitionTableType, first_usable: u64, last_usable: u64) -> Self {
        Self {
            table_type,
            first_usable,
            last_usable,
            max_primaries: table_type.max_primaries(),
            children: Vec::new(),
        }
    }

    /// Number of real (non-unallocated) primary entries.
    pub fn primaries(&self) -> u32 {
        self.children
            .iter()
            .filter(|child| !child.is_role(PartitionRole::Unallocated))
            .count() as u32
    }

    pub fn extended(&self) -> Option<&Partition> {
        self.children
            .iter()
            .find(|child| child.is_role(PartitionRole::Extended))
    }

    pub fn extended_mut(&mut self) -> Option<&mut Partition> {
        self.children
            .iter_mut()
            .find(|child| child.is_role(PartitionRole::Extended))
    }

    /// Regenerate every synthetic unallocated child so the tree exactly
    /// covers [first_usable, last_usable], recursing into extended
    /// partitions. Gaps of zero length produce no node.
    pub fn update_unallocated(&mut self, sector_size: u64) {
        regenerate_unallocated(
            &mut self.children,
            self.first_usable,
            self.last_usable,
            sector_size,
        );
    }
}

impl PartitionNode for PartitionTable {
    fn children(&self) -> &[Partition] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<Partition> {
        &mut self.children
    }

    fn first_usable_sector(&self) -> u64 {
        self.first_usable
    }

    fn last_usable_sector(&self) -> u64 {
        self.last_usable
    }
}

fn regenerate_unallocated(
    children: &mut Vec<Partition>,
    first_usable: u64,
    last_usable: u64,
    sector_size: u64,
) {
    children.retain(|child| !child.is_role(PartitionRole::Unallocated));
    children.sort_by_key(|child| child.first_sector);

    let mut gaps = Vec::new();
    let mut cursor = first_usable;
    for child in children.iter() {
        if child.first_sector > cursor {
            gaps.push((cursor, child.first_sector - 1));
        }
        cursor = child.last_sector + 1;
    }
    if cursor <= last_usable {
        gaps.push((cursor, last_usable));
    }

    for (first, last) in gaps {
        children.push(Partition::new_unallocated(first, last, sector_size));
    }
    children.sort_by_key(|child| child.first_sector);

    for child in children.iter_mut() {
        if child.is_role(PartitionRole::Extended) {
            let (first, last) = (child.first_sector, child.last_sector);
            regenerate_unallocated(child.children_mut(), first, last, sector_size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(node: &str, number: u32, first: u64, last: u64) -> Partition {
        Partition::new(
            node,
            number,
            PartitionRole::Primary.into(),
            first,
            last,
            512,
            FileSystem::plain(FileSystemType::Ext4),
        )
    }

    fn logical(node: &str, number: u32, first: u64, last: u64) -> Partition {
        Partition::new(
            node,
            number,
            PartitionRole::Logical.into(),
            first,
            last,
            512,
            FileSystem::plain(FileSystemType::Ext4),
        )
    }

    fn assert_full_coverage(node: &dyn PartitionNode) {
        let mut cursor = node.first_usable_sector();
        for child in node.children() {
            assert_eq!(child.first_sector, cursor, "gap or overlap at {cursor}");
            assert!(child.length() >= 1);
            cursor = child.last_sector + 1;
        }
        assert_eq!(cursor, node.last_usable_sector() + 1);
    }

    #[test]
    fn unallocated_nodes_exactly_fill_every_gap() {
        let mut table = PartitionTable::new(PartitionTableType::Gpt, 34, 9999);
        table.insert(plain("/dev/sda1", 1, 100, 499));
        table.insert(plain("/dev/sda2", 2, 1000, 8999));
        table.update_unallocated(512);

        assert_full_coverage(&table);
        let unallocated: Vec<_> = table
            .children()
            .iter()
            .filter(|child| child.is_role(PartitionRole::Unallocated))
            .collect();
        assert_eq!(unallocated.len(), 3);
        assert_eq!(unallocated[0].first_sector, 34);
        assert_eq!(unallocated[0].last_sector, 99);
        assert_eq!(unallocated[2].last_sector, 9999);
    }

    #[test]
    fn adjacent_partitions_produce_no_zero_length_nodes() {
        let mut table = PartitionTable::new(PartitionTableType::Gpt, 0, 999);
        table.insert(plain("/dev/sda1", 1, 0, 499));
        table.insert(plain("/dev/sda2", 2, 500, 999));
        table.update_unallocated(512);

        assert_full_coverage(&table);
        assert_eq!(table.children().len(), 2);
    }

    #[test]
    fn insert_keeps_children_sorted_by_first_sector() {
        let mut table = PartitionTable::new(PartitionTableType::MsDos, 0, 9999);
        table.insert(plain("/dev/sda2", 2, 5000, 5999));
        table.insert(plain("/dev/sda1", 1, 100, 999));
        table.insert(plain("/dev/sda3", 3, 2000, 2999));

        let firsts: Vec<u64> = table
            .children()
            .iter()
            .map(|child| child.first_sector)
            .collect();
        assert_eq!(firsts, vec![100, 2000, 5000]);
    }

    #[test]
    fn remove_of_missing_child_is_recoverable() {
        let mut table = PartitionTable::new(PartitionTableType::Gpt, 0, 999);
        table.insert(plain("/dev/sda1", 1, 0, 499));
        assert!(table.remove(0));
        assert!(!table.remove(0));
    }

    #[test]
    fn extended_partition_fills_its_own_gaps() {
        let mut table = PartitionTable::new(PartitionTableType::MsDos, 0, 9999);
        let mut extended = Partition::new(
            "/dev/sda2",
            2,
            PartitionRole::Extended.into(),
            1000,
            8999,
            512,
            FileSystem::default(),
        );
        extended.insert(logical("/dev/sda5", 5, 2000, 2999));
        table.insert(plain("/dev/sda1", 1, 0, 999));
        table.insert(extended);
        table.update_unallocated(512);

        assert_full_coverage(&table);
        let extended = table.extended().expect("extended present");
        assert_full_coverage(extended);
        assert_eq!(extended.children().len(), 3);
    }

    #[test]
    fn logical_renumbering_round_trips() {
        let mut extended = Partition::new(
            "/dev/sda1",
            1,
            PartitionRole::Extended.into(),
            0,
            9999,
            512,
            FileSystem::default(),
        );
        for (number, first) in [(5u32, 0u64), (6, 1000), (7, 2000), (8, 3000)] {
            extended.insert(logical(
                &format!("/dev/sda{number}"),
                number,
                first,
                first + 999,
            ));
        }

        // Delete logical #7.
        extended.remove(2000);
        extended.adjust_logical_numbers(7, -1);
        let numbers: Vec<u32> = extended.children().iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![5, 6, 7]);
        assert_eq!(extended.children()[2].device_node, "/dev/sda7");

        // Re-insert at the old slot restores the original numbering.
        extended.adjust_logical_numbers(-1, 7);
        extended.insert(logical("/dev/sda7", 7, 2000, 2999));
        let numbers: Vec<u32> = extended.children().iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![5, 6, 7, 8]);
        assert_eq!(extended.children()[3].device_node, "/dev/sda8");
    }

    #[test]
    fn preview_partitions_display_placeholders() {
        let mut partition = plain("/dev/sda1", 1, 0, 99);
        partition.state = PartitionState::New;
        assert_eq!(partition.display_device_node(), "New partition #1");

        let unallocated = Partition::new_unallocated(0, 99, 512);
        assert_eq!(unallocated.display_device_node(), "unallocated");
    }
}
