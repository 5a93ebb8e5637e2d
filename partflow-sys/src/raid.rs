// SPDX-License-Identifier: GPL-3.0-only

//! Software RAID (mdraid) discovery and control via mdadm and /proc/mdstat.

use std::collections::HashMap;
use std::time::Duration;

use partflow_types::{MdArrayInfo, MdArrayState, UUID_UNKNOWN};

use crate::cmd::{run_capture, run_capture_with_timeout};
use crate::{Result, SysError};

#[derive(Debug, Clone)]
struct MdArrayScan {
    device: String,
    name: Option<String>,
    uuid: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct MdstatState {
    level: Option<String>,
    members: Vec<String>,
    active: bool,
    degraded: bool,
}

fn parse_mdadm_scan(output: &str) -> Vec<MdArrayScan> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || !line.starts_with("ARRAY ") {
                return None;
            }

            let mut parts = line.split_whitespace();
            let _array = parts.next()?;
            let device = parts.next()?.to_string();

            let mut name = None;
            let mut uuid = None;

            for token in parts {
                if let Some(value) = token.strip_prefix("name=") {
                    name = Some(value.to_string());
                }
                if let Some(value) = token.strip_prefix("UUID=") {
                    uuid = Some(value.to_string());
                }
            }

            Some(MdArrayScan { device, name, uuid })
        })
        .collect()
}

fn parse_proc_mdstat(output: &str) -> HashMap<String, MdstatState> {
    let mut map = HashMap::new();
    let mut current_array: Option<String> = None;

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("Personalities") || line.starts_with("unused") {
            continue;
        }

        if line.starts_with("md") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 4 {
                let array = parts[0].to_string();
                let active = parts.get(2).is_some_and(|state| *state == "active");
                let level = parts
                    .iter()
                    .find(|part| part.starts_with("raid"))
                    .map(|part| (*part).to_string());
                let members: Vec<String> = parts
                    .iter()
                    .filter(|part| part.contains('[') && part.contains(']'))
                    .map(|part| format!("/dev/{}", part.split('[').next().unwrap_or(part)))
                    .collect();

                map.insert(
                    array.clone(),
                    MdstatState {
                        level,
                        members,
                        active,
                        degraded: false,
                    },
                );
                current_array = Some(array);
            }
            continue;
        }

        // The "[n/m] [U_]" status sits mid-line on the blocks continuation
        // ("... blocks super 1.2 [2/1] [U_]"); '_' marks a missing member.
        if let Some(array) = current_array.as_ref() {
            let degraded = line
                .split_whitespace()
                .any(|token| token.starts_with('[') && token.ends_with(']') && token.contains('_'));
            if degraded {
                if let Some(state) = map.get_mut(array) {
                    state.degraded = true;
                }
            }
        }
    }

    map
}

fn merge_scan(scans: Vec<MdArrayScan>, mdstat: HashMap<String, MdstatState>) -> Vec<MdArrayInfo> {
    scans
        .into_iter()
        .map(|scan| {
            let short = scan.device.strip_prefix("/dev/").unwrap_or(&scan.device);
            let stat = mdstat.get(short).cloned().unwrap_or_default();
            let state = if !stat.active {
                MdArrayState::Inactive
            } else if stat.degraded {
                MdArrayState::Degraded
            } else {
                MdArrayState::Active
            };
            MdArrayInfo {
                device: scan.device,
                name: scan.name,
                uuid: scan.uuid.unwrap_or_else(|| UUID_UNKNOWN.to_string()),
                level: stat.level,
                chunk_size: -1,
                total_sectors: -1,
                members: stat.members,
                state,
            }
        })
        .collect()
}

/// Discover assembled and known mdraid arrays.
pub fn scan_arrays() -> Result<Vec<MdArrayInfo>> {
    if !cfg!(feature = "mdadm-tools") || which::which("mdadm").is_err() {
        return Ok(Vec::new());
    }

    let scan_output = run_capture("mdadm", &["--detail", "--scan"]).unwrap_or_default();
    let mdstat_output = std::fs::read_to_string("/proc/mdstat").unwrap_or_default();

    Ok(merge_scan(
        parse_mdadm_scan(&scan_output),
        parse_proc_mdstat(&mdstat_output),
    ))
}

fn run_mdadm(args: &[&str], timeout: Duration) -> Result<()> {
    which::which("mdadm").map_err(|_| SysError::ToolMissing("mdadm".to_string()))?;
    let output = run_capture_with_timeout("mdadm", args, timeout)?;
    if !output.success() {
        return Err(SysError::OperationFailed(format!(
            "mdadm {} failed: {}",
            args.join(" "),
            output.stderr.trim()
        )));
    }
    Ok(())
}

/// Assemble an array from its known metadata.
pub fn assemble_array(device: &str, timeout: Duration) -> Result<()> {
    run_mdadm(&["--assemble", device], timeout)
}

/// Stop an assembled array.
pub fn stop_array(device: &str, timeout: Duration) -> Result<()> {
    run_mdadm(&["--stop", device], timeout)
}

/// Stop and immediately re-assemble an array, picking up member changes.
pub fn reassemble_array(device: &str, timeout: Duration) -> Result<()> {
    stop_array(device, timeout)?;
    run_mdadm(&["--assemble", "--scan", device], timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCAN: &str =
        "ARRAY /dev/md0 metadata=1.2 name=host:0 UUID=a1b2c3d4:e5f60718:293a4b5c:6d7e8f90\n";

    const MDSTAT: &str = "\
Personalities : [raid1]
md0 : active raid1 sdb1[1] sda1[0]
      1046528 blocks super 1.2 [2/1] [U_]

unused devices: <none>
";

    #[test]
    fn parses_mdadm_detail_scan() {
        let scans = parse_mdadm_scan(SCAN);
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].device, "/dev/md0");
        assert_eq!(scans[0].name.as_deref(), Some("host:0"));
        assert!(scans[0].uuid.as_deref().unwrap().starts_with("a1b2c3d4"));
    }

    #[test]
    fn mdstat_marks_degraded_arrays() {
        let stat = parse_proc_mdstat(MDSTAT);
        let md0 = stat.get("md0").expect("md0 parsed");
        assert!(md0.active);
        assert!(md0.degraded);
        assert_eq!(md0.level.as_deref(), Some("raid1"));
        assert_eq!(md0.members, vec!["/dev/sdb1", "/dev/sda1"]);
    }

    #[test]
    fn merged_state_prefers_degraded_over_active() {
        let arrays = merge_scan(parse_mdadm_scan(SCAN), parse_proc_mdstat(MDSTAT));
        assert_eq!(arrays.len(), 1);
        assert_eq!(arrays[0].state, MdArrayState::Degraded);
        assert_eq!(arrays[0].chunk_size, -1);
    }

    #[test]
    fn healthy_array_is_not_degraded() {
        let mdstat = "\
Personalities : [raid1]
md1 : active raid1 sdd1[1] sdc1[0]
      2093056 blocks super 1.2 [2/2] [UU]

unused devices: <none>
";
        let stat = parse_proc_mdstat(mdstat);
        assert!(!stat.get("md1").expect("md1 parsed").degraded);
    }

    #[test]
    fn unknown_array_defaults_to_inactive() {
        let arrays = merge_scan(parse_mdadm_scan(SCAN), HashMap::new());
        assert_eq!(arrays[0].state, MdArrayState::Inactive);
        assert!(arrays[0].members.is_empty());
    }
}
