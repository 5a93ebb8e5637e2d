// SPDX-License-Identifier: GPL-3.0-only

//! Device scanning and volume-manager composition.
//!
//! The backend reports raw block devices; the volume-manager scanner reports
//! LVM and mdraid state from the system tools. Composition turns those into
//! one [`DeviceModel`]: a virtual device per volume group (its logical
//! volumes mapped onto synthetic contiguous sector ranges) and per RAID
//! array, plus the cross-device PV bookkeeping, including PVs only reachable
//! through open LUKS containers.

use std::thread;

use crate::backend::CoreBackend;
use crate::device::{Device, DeviceKind, LvmDevice, SoftwareRaid};
use crate::fs::{FileSystem, LuksContainer, LuksVersion};
use crate::lvm::{LvmContext, PvEntry};
use crate::partition::{Partition, PartitionNode, PartitionTable};
use crate::stack::DeviceModel;
use partflow_types::{
    FileSystemType, LvInfo, MdArrayInfo, PartitionRole, PartitionTableType, PvInfo, VgInfo,
};

/// Progress notifications for callers driving a UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Started,
    DeviceScanned { node: String },
    Finished,
}

/// Source of LVM and mdraid scan rows. The production implementation shells
/// out to the system tools; tests substitute canned rows.
pub trait VolumeManagerScanner {
    fn volume_groups(&self) -> Vec<VgInfo>;
    fn logical_volumes(&self) -> Vec<LvInfo>;
    fn physical_volumes(&self) -> Vec<PvInfo>;
    fn raid_arrays(&self) -> Vec<MdArrayInfo>;
}

/// Scanner backed by the lvm2 and mdadm tools. Tool failures degrade to
/// empty row sets; a system without LVM or RAID simply contributes nothing.
#[derive(Debug, Default)]
pub struct SystemVolumeManagerScanner;

impl SystemVolumeManagerScanner {
    pub fn new() -> Self {
        Self
    }
}

impl VolumeManagerScanner for SystemVolumeManagerScanner {
    fn volume_groups(&self) -> Vec<VgInfo> {
        partflow_sys::lvm::scan_vgs().unwrap_or_else(|error| {
            tracing::warn!(%error, "vgs scan failed");
            Vec::new()
        })
    }

    fn logical_volumes(&self) -> Vec<LvInfo> {
        partflow_sys::lvm::scan_lvs().unwrap_or_else(|error| {
            tracing::warn!(%error, "lvs scan failed");
            Vec::new()
        })
    }

    fn physical_volumes(&self) -> Vec<PvInfo> {
        partflow_sys::lvm::scan_pvs().unwrap_or_else(|error| {
            tracing::warn!(%error, "pvs scan failed");
            Vec::new()
        })
    }

    fn raid_arrays(&self) -> Vec<MdArrayInfo> {
        partflow_sys::raid::scan_arrays().unwrap_or_else(|error| {
            tracing::warn!(%error, "mdadm scan failed");
            Vec::new()
        })
    }
}

/// Composes the full device model out of the backend and tool scans.
pub struct DeviceScanner;

impl DeviceScanner {
    /// Synchronous full scan.
    pub fn scan(
        backend: &dyn CoreBackend,
        scanner: &dyn VolumeManagerScanner,
        mut on_event: impl FnMut(ScanEvent),
    ) -> DeviceModel {
        on_event(ScanEvent::Started);

        let mut devices = backend.scan_devices();
        for device in &devices {
            on_event(ScanEvent::DeviceScanned {
                node: device.node.clone(),
            });
        }

        let pv_list: Vec<PvEntry> = scanner
            .physical_volumes()
            .into_iter()
            .map(pv_entry)
            .collect();

        let lvs = scanner.logical_volumes();
        for vg in scanner.volume_groups() {
            let device = compose_vg_device(backend, &vg, &lvs, &pv_list);
            on_event(ScanEvent::DeviceScanned {
                node: device.node.clone(),
            });
            devices.push(device);
        }

        for array in scanner.raid_arrays() {
            let device = compose_raid_device(backend, &array);
            on_event(ScanEvent::DeviceScanned {
                node: device.node.clone(),
            });
            devices.push(device);
        }

        on_event(ScanEvent::Finished);
        DeviceModel::new(devices, LvmContext::new(pv_list))
    }

    /// Full scan on a worker thread. Events arrive on that thread; the model
    /// is returned through the join handle.
    pub fn scan_in_background<B, V, F>(
        backend: B,
        scanner: V,
        mut on_event: F,
    ) -> thread::JoinHandle<DeviceModel>
    where
        B: CoreBackend + Send + 'static,
        V: VolumeManagerScanner + Send + 'static,
        F: FnMut(ScanEvent) + Send + 'static,
    {
        thread::spawn(move || Self::scan(&backend, &scanner, &mut on_event))
    }
}

/// A PV row as cross-device bookkeeping. PVs reported on a device-mapper
/// node live inside an open LUKS container; they vanish from the tools'
/// view when the container closes, so the flag is tracked here.
fn pv_entry(info: PvInfo) -> PvEntry {
    let is_luks = info.device.starts_with("/dev/mapper/");
    PvEntry {
        device_node: info.device,
        vg_name: info.vg_name,
        size: info.size,
        free: info.free,
        is_luks,
    }
}

/// One virtual device per volume group. Logical volumes become partitions
/// at cumulative synthetic offsets; free extents show up as trailing
/// unallocated space.
fn compose_vg_device(
    backend: &dyn CoreBackend,
    vg: &VgInfo,
    lvs: &[LvInfo],
    pv_list: &[PvEntry],
) -> Device {
    let pe_size = vg.pe_size.max(0) as u64;
    let mut lvm = LvmDevice::new(&vg.name, &vg.uuid, pe_size);
    lvm.total_pe = vg.total_pe;
    lvm.alloc_pe = vg.alloc_pe;
    lvm.free_pe = vg.free_pe;

    const SECTOR: u64 = 512;
    for lv in lvs.iter().filter(|lv| lv.vg_name == vg.name) {
        let sectors = if lv.size < 0 { 0 } else { lv.size as u64 / SECTOR };
        lvm.lv_sizes.insert(lv.lv_path.clone(), sectors);
    }

    lvm.physical_volumes = pv_list
        .iter()
        .filter(|entry| entry.vg_name.as_deref() == Some(vg.name.as_str()))
        .map(|entry| entry.device_node.clone())
        .collect();

    let total_sectors = match vg.size_bytes() {
        Some(bytes) => bytes / SECTOR,
        None => lvm.mapped_sectors(),
    }
    .max(1);

    let mut table = PartitionTable::new(PartitionTableType::Vmd, 0, total_sectors - 1);
    for (index, (lv_path, first, last)) in lvm.mapped_lv_layout().into_iter().enumerate() {
        let fs = detect_fs(backend, &lv_path);
        table.insert(Partition::new(
            lv_path,
            index as u32 + 1,
            PartitionRole::LvmLv.into(),
            first,
            last,
            SECTOR,
            fs,
        ));
    }
    table.update_unallocated(SECTOR);

    let node = format!("/dev/{}", vg.name);
    Device {
        node,
        name: vg.name.clone(),
        icon: "drive-multidisk".to_string(),
        logical_sector_size: SECTOR,
        physical_sector_size: SECTOR,
        total_sectors,
        kind: DeviceKind::Lvm(lvm),
        table: Some(table),
    }
}

/// One device per mdraid array; an active array's table exposes the whole
/// array as a single partition.
fn compose_raid_device(backend: &dyn CoreBackend, array: &MdArrayInfo) -> Device {
    let raid = SoftwareRaid {
        array_name: array.name.clone(),
        uuid: array.uuid.clone(),
        level: array.level.clone(),
        chunk_size: array.chunk_size,
        members: array.members.clone(),
        state: array.state,
    };

    let total_sectors = array.total_sectors.max(0) as u64;
    let table = if raid.is_active() && total_sectors > 0 {
        let mut table = PartitionTable::new(PartitionTableType::Vmd, 0, total_sectors - 1);
        let fs = detect_fs(backend, &array.device);
        table.insert(Partition::new(
            &array.device,
            1,
            PartitionRole::Primary.into(),
            0,
            total_sectors - 1,
            512,
            fs,
        ));
        Some(table)
    } else {
        None
    };

    Device {
        node: array.device.clone(),
        name: array
            .name
            .clone()
            .unwrap_or_else(|| array.device.clone()),
        icon: "drive-multidisk".to_string(),
        logical_sector_size: 512,
        physical_sector_size: 512,
        total_sectors,
        kind: DeviceKind::Raid(raid),
        table,
    }
}

/// Probe a node's filesystem; a crypt signature becomes a closed LUKS
/// container whose payload is unknown until opened.
fn detect_fs(backend: &dyn CoreBackend, node: &str) -> FileSystem {
    let fs_type = backend.detect_file_system(node);
    if fs_type.is_crypt() {
        let version = if fs_type == FileSystemType::Luks {
            LuksVersion::Luks1
        } else {
            LuksVersion::Luks2
        };
        FileSystem::Luks(LuksContainer::new(version))
    } else {
        FileSystem::plain(fs_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CoreBackendDevice, CoreBackendPartitionTable};
    use partflow_types::MdArrayState;

    struct FakeBackend;

    impl CoreBackend for FakeBackend {
        fn scan_devices(&self) -> Vec<Device> {
            vec![Device::new_disk("/dev/sda", "Test Disk", 512, 512, 100_000)]
        }

        fn scan_device(&self, _: &str) -> Option<Device> {
            None
        }

        fn detect_file_system(&self, node: &str) -> FileSystemType {
            match node {
                "/dev/vg0/lv1" => FileSystemType::Ext4,
                "/dev/vg0/lv2" => FileSystemType::Luks2,
                _ => FileSystemType::Unknown,
            }
        }

        fn open_device(&mut self, _: &str) -> Option<Box<dyn CoreBackendDevice>> {
            None
        }
    }

    struct FakeScanner;

    impl VolumeManagerScanner for FakeScanner {
        fn volume_groups(&self) -> Vec<VgInfo> {
            vec![VgInfo {
                name: "vg0".to_string(),
                uuid: "AbCdEf".to_string(),
                pe_size: 4 * 1024 * 1024,
                total_pe: 100,
                alloc_pe: 40,
                free_pe: 60,
            }]
        }

        fn logical_volumes(&self) -> Vec<LvInfo> {
            vec![
                LvInfo {
                    vg_name: "vg0".to_string(),
                    lv_path: "/dev/vg0/lv1".to_string(),
                    size: 100 * 512,
                    active: true,
                },
                LvInfo {
                    vg_name: "vg0".to_string(),
                    lv_path: "/dev/vg0/lv2".to_string(),
                    size: 200 * 512,
                    active: true,
                },
            ]
        }

        fn physical_volumes(&self) -> Vec<PvInfo> {
            vec![
                PvInfo {
                    device: "/dev/sda1".to_string(),
                    vg_name: Some("vg0".to_string()),
                    size: 200 * 1024 * 1024,
                    free: 120 * 1024 * 1024,
                },
                PvInfo {
                    device: "/dev/mapper/secret".to_string(),
                    vg_name: Some("vg0".to_string()),
                    size: 220 * 1024 * 1024,
                    free: 220 * 1024 * 1024,
                },
                PvInfo {
                    device: "/dev/sdb1".to_string(),
                    vg_name: None,
                    size: 100 * 1024 * 1024,
                    free: 100 * 1024 * 1024,
                },
            ]
        }

        fn raid_arrays(&self) -> Vec<MdArrayInfo> {
            vec![MdArrayInfo {
                device: "/dev/md0".to_string(),
                name: Some("backup".to_string()),
                uuid: "a1:b2".to_string(),
                level: Some("raid1".to_string()),
                chunk_size: -1,
                total_sectors: 4_096,
                members: vec!["/dev/sdc1".to_string(), "/dev/sdd1".to_string()],
                state: MdArrayState::Active,
            }]
        }
    }

    #[test]
    fn logical_volumes_map_to_cumulative_sector_ranges() {
        let model = DeviceScanner::scan(&FakeBackend, &FakeScanner, |_| {});

        let vg = model.device("/dev/vg0").expect("vg device");
        let table = vg.table.as_ref().expect("vg table");
        assert_eq!(table.table_type, PartitionTableType::Vmd);

        let lv1 = table.find_by_node("/dev/vg0/lv1").expect("lv1");
        assert_eq!((lv1.first_sector, lv1.last_sector), (0, 99));
        let lv2 = table.find_by_node("/dev/vg0/lv2").expect("lv2");
        assert_eq!((lv2.first_sector, lv2.last_sector), (100, 299));

        // 100 extents of 4 MiB = 819200 sectors; the tail past the mapped
        // LVs is unallocated.
        assert_eq!(vg.total_sectors, 819_200);
        let tail = table.child_at(300).expect("tail node");
        assert!(tail.is_role(PartitionRole::Unallocated));
        assert_eq!(tail.last_sector, 819_199);
    }

    #[test]
    fn luks_wrapped_lv_is_a_closed_container() {
        let model = DeviceScanner::scan(&FakeBackend, &FakeScanner, |_| {});
        let lv2 = model.find_partition("/dev/vg0/lv2").expect("lv2");
        assert!(matches!(lv2.fs, FileSystem::Luks(_)));
        assert_eq!(lv2.fs.fs_type(), FileSystemType::Luks2);
    }

    #[test]
    fn pv_list_records_assignment_and_luks_nesting() {
        let model = DeviceScanner::scan(&FakeBackend, &FakeScanner, |_| {});

        let nested = model.lvm.entry("/dev/mapper/secret").expect("nested pv");
        assert!(nested.is_luks);
        assert_eq!(nested.vg_name.as_deref(), Some("vg0"));
        let plain = model.lvm.entry("/dev/sda1").expect("plain pv");
        assert!(!plain.is_luks);

        let vg = model.device("/dev/vg0").unwrap().as_lvm().unwrap();
        assert_eq!(
            vg.physical_volumes,
            vec!["/dev/sda1".to_string(), "/dev/mapper/secret".to_string()]
        );
    }

    #[test]
    fn active_arrays_become_single_partition_devices() {
        let model = DeviceScanner::scan(&FakeBackend, &FakeScanner, |_| {});

        let md = model.device("/dev/md0").expect("array device");
        assert_eq!(md.name, "backup");
        let table = md.table.as_ref().expect("array table");
        assert_eq!(table.children().len(), 1);
        assert_eq!(table.children()[0].last_sector, 4_095);
    }

    #[test]
    fn scan_emits_started_devices_and_finished() {
        let mut events = Vec::new();
        DeviceScanner::scan(&FakeBackend, &FakeScanner, |event| events.push(event));

        assert_eq!(events.first(), Some(&ScanEvent::Started));
        assert_eq!(events.last(), Some(&ScanEvent::Finished));
        let scanned: Vec<&ScanEvent> = events
            .iter()
            .filter(|event| matches!(event, ScanEvent::DeviceScanned { .. }))
            .collect();
        assert_eq!(scanned.len(), 3);
    }

    #[test]
    fn background_scan_returns_the_same_model() {
        let handle = DeviceScanner::scan_in_background(FakeBackend, FakeScanner, |_| {});
        let model = handle.join().expect("scan thread");
        assert_eq!(model.devices.len(), 3);
    }
}
