// SPDX-License-Identifier: GPL-3.0-only

//! LVM command-line contract.
//!
//! Field queries use `--noheadings --units b --nosuffix -o <fields>` with a
//! tab separator and are parsed line-wise. A field that fails to parse maps
//! to the -1 / "---" sentinels instead of failing the whole scan.

use std::time::Duration;

use partflow_types::{LvInfo, PvInfo, SECTOR_UNKNOWN, UUID_UNKNOWN, VgInfo};

use crate::cmd::{run_capture, run_capture_with_timeout};
use crate::{Result, SysError};

fn parse_tabbed_line(line: &str) -> Vec<String> {
    line.split('\t')
        .map(|part| part.trim().to_string())
        .collect()
}

fn numeric_or_unknown(field: &str) -> i64 {
    field.parse().unwrap_or(SECTOR_UNKNOWN)
}

fn uuid_or_unknown(field: &str) -> String {
    if field.is_empty() {
        UUID_UNKNOWN.to_string()
    } else {
        field.to_string()
    }
}

// vgs has no allocated-extent field; allocated is derived as total - free.
fn parse_vgs(output: &str) -> Vec<VgInfo> {
    output
        .lines()
        .filter_map(|line| {
            // Only leading indentation may be stripped: a full trim would eat
            // trailing tabs and with them the empty fields they delimit.
            let line = line.trim_start();
            if line.is_empty() {
                return None;
            }
            let cols = parse_tabbed_line(line);
            if cols.len() < 5 || cols[0].is_empty() {
                return None;
            }
            let total = numeric_or_unknown(&cols[3]);
            let free = numeric_or_unknown(&cols[4]);
            let alloc = if total >= 0 && free >= 0 {
                total - free
            } else {
                SECTOR_UNKNOWN
            };
            Some(VgInfo {
                name: cols[0].clone(),
                uuid: uuid_or_unknown(&cols[1]),
                pe_size: numeric_or_unknown(&cols[2]),
                total_pe: total,
                alloc_pe: alloc,
                free_pe: free,
            })
        })
        .collect()
}

fn parse_lvs(output: &str) -> Vec<LvInfo> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim_start();
            if line.is_empty() {
                return None;
            }
            let cols = parse_tabbed_line(line);
            if cols.len() < 4 || cols[1].is_empty() {
                return None;
            }
            Some(LvInfo {
                vg_name: cols[0].clone(),
                lv_path: cols[1].clone(),
                size: numeric_or_unknown(&cols[2]),
                active: cols[3].eq_ignore_ascii_case("active") || cols[3] == "y",
            })
        })
        .collect()
}

fn parse_pvs(output: &str) -> Vec<PvInfo> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim_start();
            if line.is_empty() {
                return None;
            }
            let cols = parse_tabbed_line(line);
            if cols.len() < 4 || cols[0].is_empty() {
                return None;
            }
            let vg_name = if cols[1].is_empty() {
                None
            } else {
                Some(cols[1].clone())
            };
            Some(PvInfo {
                device: cols[0].clone(),
                vg_name,
                size: numeric_or_unknown(&cols[2]),
                free: numeric_or_unknown(&cols[3]),
            })
        })
        .collect()
}

fn require_tool(tool: &str) -> Result<()> {
    which::which(tool).map_err(|_| SysError::ToolMissing(tool.to_string()))?;
    Ok(())
}

const FIELD_QUERY_ARGS: [&str; 6] = ["--noheadings", "--units", "b", "--nosuffix", "--separator", "\t"];

fn field_query(tool: &str, fields: &str, extra: &[&str]) -> Result<String> {
    require_tool(tool)?;
    let mut args: Vec<&str> = FIELD_QUERY_ARGS.to_vec();
    args.push("-o");
    args.push(fields);
    args.extend_from_slice(extra);
    run_capture(tool, &args)
}

/// List every volume group with extent accounting.
pub fn scan_vgs() -> Result<Vec<VgInfo>> {
    if !cfg!(feature = "lvm-tools") {
        return Ok(Vec::new());
    }
    let output = field_query(
        "vgs",
        "vg_name,vg_uuid,vg_extent_size,vg_extent_count,vg_free_count",
        &[],
    )?;
    Ok(parse_vgs(&output))
}

/// List every logical volume, across all volume groups.
pub fn scan_lvs() -> Result<Vec<LvInfo>> {
    if !cfg!(feature = "lvm-tools") {
        return Ok(Vec::new());
    }
    let output = field_query("lvs", "vg_name,lv_path,lv_size,lv_active", &[])?;
    Ok(parse_lvs(&output))
}

/// List every physical volume, including unassigned ones.
pub fn scan_pvs() -> Result<Vec<PvInfo>> {
    if !cfg!(feature = "lvm-tools") {
        return Ok(Vec::new());
    }
    let output = field_query("pvs", "pv_name,vg_name,pv_size,pv_free", &[])?;
    Ok(parse_pvs(&output))
}

/// Query a single field of one volume group, one value per line.
pub fn query_vg_field(vg_name: &str, field: &str) -> Result<Vec<String>> {
    let output = field_query("vgs", field, &[vg_name])?;
    Ok(output
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect())
}

fn run_action(tool: &str, args: &[&str], timeout: Duration) -> Result<()> {
    require_tool(tool)?;
    let output = run_capture_with_timeout(tool, args, timeout)?;
    if !output.success() {
        return Err(SysError::OperationFailed(format!(
            "{tool} {} failed: {}",
            args.join(" "),
            output.stderr.trim()
        )));
    }
    Ok(())
}

pub fn create_physical_volume(device: &str, timeout: Duration) -> Result<()> {
    run_action("pvcreate", &["-ff", "--yes", device], timeout)
}

pub fn remove_physical_volume(device: &str, timeout: Duration) -> Result<()> {
    run_action("pvremove", &["--force", "--yes", device], timeout)
}

pub fn create_volume_group(vg_name: &str, pv_devices: &[String], timeout: Duration) -> Result<()> {
    let mut args = vec!["--yes", vg_name];
    args.extend(pv_devices.iter().map(String::as_str));
    run_action("vgcreate", &args, timeout)
}

pub fn remove_volume_group(vg_name: &str, timeout: Duration) -> Result<()> {
    run_action("vgremove", &["--yes", vg_name], timeout)
}

pub fn extend_volume_group(vg_name: &str, pv_device: &str, timeout: Duration) -> Result<()> {
    run_action("vgextend", &["--yes", vg_name, pv_device], timeout)
}

pub fn reduce_volume_group(vg_name: &str, pv_device: &str, timeout: Duration) -> Result<()> {
    run_action("vgreduce", &["--yes", vg_name, pv_device], timeout)
}

/// Evacuate all allocated extents off a physical volume.
pub fn move_physical_volume(pv_device: &str, timeout: Duration) -> Result<()> {
    run_action("pvmove", &[pv_device], timeout)
}

pub fn set_volume_group_active(vg_name: &str, active: bool, timeout: Duration) -> Result<()> {
    let flag = if active { "-ay" } else { "-an" };
    run_action("vgchange", &[flag, vg_name], timeout)
}

pub fn set_logical_volume_active(lv_path: &str, active: bool, timeout: Duration) -> Result<()> {
    let flag = if active { "-ay" } else { "-an" };
    run_action("lvchange", &[flag, lv_path], timeout)
}

pub fn create_logical_volume(
    vg_name: &str,
    lv_name: &str,
    size_bytes: u64,
    timeout: Duration,
) -> Result<()> {
    let size = format!("{size_bytes}b");
    run_action(
        "lvcreate",
        &["--yes", "-L", &size, "-n", lv_name, vg_name],
        timeout,
    )
}

pub fn resize_logical_volume(lv_path: &str, size_bytes: u64, timeout: Duration) -> Result<()> {
    let size = format!("{size_bytes}b");
    run_action("lvresize", &["--force", "-L", &size, lv_path], timeout)
}

pub fn remove_logical_volume(lv_path: &str, timeout: Duration) -> Result<()> {
    run_action("lvremove", &["--yes", lv_path], timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lvm_outputs() {
        let vgs = parse_vgs("vg0\tAbCdEf\t4194304\t100\t25\n");
        let lvs = parse_lvs("vg0\t/dev/vg0/root\t53687091200\tactive\n");
        let pvs = parse_pvs("/dev/sda2\tvg0\t100\t25\n");

        assert_eq!(vgs.len(), 1);
        assert_eq!(lvs.len(), 1);
        assert_eq!(pvs.len(), 1);
        assert_eq!(vgs[0].name, "vg0");
        assert_eq!(vgs[0].alloc_pe + vgs[0].free_pe, vgs[0].total_pe);
        assert_eq!(lvs[0].display_name(), "vg0/root");
        assert_eq!(pvs[0].vg_name.as_deref(), Some("vg0"));
    }

    #[test]
    fn empty_fields_map_to_sentinels() {
        let vgs = parse_vgs("vg0\t\t\t\t\n");
        assert_eq!(vgs.len(), 1);
        assert_eq!(vgs[0].uuid, UUID_UNKNOWN);
        assert_eq!(vgs[0].total_pe, -1);
        assert_eq!(vgs[0].pe_size, -1);
        assert_eq!(vgs[0].alloc_pe, -1);
    }

    #[test]
    fn trailing_empty_fields_keep_the_row() {
        // vgs indents rows; empty trailing fields arrive as bare tabs.
        let vgs = parse_vgs("  vg0\tAbCdEf\t4194304\t\t\n");
        assert_eq!(vgs.len(), 1);
        assert_eq!(vgs[0].total_pe, -1);

        let lvs = parse_lvs("  vg0\t/dev/vg0/root\t\t\n");
        assert_eq!(lvs.len(), 1);
        assert_eq!(lvs[0].size, -1);
        assert!(!lvs[0].active);

        let pvs = parse_pvs("  /dev/sdc1\t\t\t\n");
        assert_eq!(pvs.len(), 1);
        assert!(!pvs[0].is_assigned());
        assert_eq!(pvs[0].free, -1);
    }

    #[test]
    fn unassigned_pv_has_no_vg() {
        let pvs = parse_pvs("/dev/sdb1\t\t500\t500\n");
        assert!(!pvs[0].is_assigned());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let lvs = parse_lvs("\n\n  \nvg0\t/dev/vg0/swap\t2147483648\ty\n");
        assert_eq!(lvs.len(), 1);
        assert!(lvs[0].active);
    }
}
