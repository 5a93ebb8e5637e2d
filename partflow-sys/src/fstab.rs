// SPDX-License-Identifier: GPL-3.0-only

//! Mount-table (/etc/fstab) reading and crash-safe rewriting.
//!
//! Lines that do not split into 4, 5 or 6 whitespace-separated fields are
//! preserved verbatim as comment lines, so a rewrite never destroys content
//! it did not understand.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, SysError};

/// Classified fs_spec (first fstab field).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FsSpec {
    Uuid(String),
    Label(String),
    PartUuid(String),
    PartLabel(String),
    DevicePath(String),
    /// Anything unrecognized; kept for display, never resolved.
    Comment(String),
}

impl FsSpec {
    /// Classify a raw fs_spec field.
    pub fn classify(raw: &str) -> Self {
        if let Some(value) = raw.strip_prefix("UUID=") {
            Self::Uuid(value.to_string())
        } else if let Some(value) = raw.strip_prefix("LABEL=") {
            Self::Label(value.to_string())
        } else if let Some(value) = raw.strip_prefix("PARTUUID=") {
            Self::PartUuid(value.to_string())
        } else if let Some(value) = raw.strip_prefix("PARTLABEL=") {
            Self::PartLabel(value.to_string())
        } else if raw.starts_with('/') {
            Self::DevicePath(raw.to_string())
        } else {
            Self::Comment(raw.to_string())
        }
    }
}

/// Collaborator resolving UUID/LABEL/PARTUUID/PARTLABEL tags to device nodes.
pub trait TagLookup {
    fn resolve(&self, spec: &FsSpec) -> Option<String>;
}

/// One parsed data line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FstabEntry {
    pub fs_spec: String,
    pub mount_point: Option<String>,
    pub fs_type: String,
    pub options: Option<String>,
    pub dump_freq: u32,
    pub pass_number: u32,
    /// Trailing "# ..." comment on the same line, verbatim.
    pub comment: Option<String>,
}

impl FstabEntry {
    /// Resolved device node for this entry, via the tag-lookup collaborator
    /// for tag specs and directly for /-rooted paths.
    pub fn device_node(&self, lookup: &dyn TagLookup) -> Option<String> {
        match FsSpec::classify(&self.fs_spec) {
            FsSpec::DevicePath(path) => Some(path),
            FsSpec::Comment(_) => None,
            spec => lookup.resolve(&spec),
        }
    }
}

/// One line of the file: either a data entry or verbatim text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FstabLine {
    Comment(String),
    Entry(FstabEntry),
}

fn parse_line(line: &str) -> FstabLine {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return FstabLine::Comment(line.to_string());
    }

    let (data, comment) = match trimmed.find('#') {
        Some(pos) => (&trimmed[..pos], Some(trimmed[pos..].to_string())),
        None => (trimmed, None),
    };

    let fields: Vec<&str> = data.split_whitespace().collect();
    if !(4..=6).contains(&fields.len()) {
        return FstabLine::Comment(line.to_string());
    }

    let mount_point = match fields[1] {
        "none" => None,
        other => Some(other.to_string()),
    };
    let options = match fields[3] {
        "defaults" => None,
        other => Some(other.to_string()),
    };

    FstabLine::Entry(FstabEntry {
        fs_spec: fields[0].to_string(),
        mount_point,
        fs_type: fields[2].to_string(),
        options,
        dump_freq: fields.get(4).and_then(|f| f.parse().ok()).unwrap_or(0),
        pass_number: fields.get(5).and_then(|f| f.parse().ok()).unwrap_or(0),
        comment,
    })
}

fn render_line(line: &FstabLine) -> String {
    match line {
        FstabLine::Comment(text) => text.clone(),
        FstabLine::Entry(entry) => {
            let mut out = format!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                entry.fs_spec,
                entry.mount_point.as_deref().unwrap_or("none"),
                entry.fs_type,
                entry.options.as_deref().unwrap_or("defaults"),
                entry.dump_freq,
                entry.pass_number,
            );
            if let Some(comment) = &entry.comment {
                out.push('\t');
                out.push_str(comment);
            }
            out
        }
    }
}

/// Read and parse an fstab file, preserving everything.
pub fn read_fstab_entries(path: &Path) -> Result<Vec<FstabLine>> {
    let contents = fs::read_to_string(path)?;
    Ok(contents.lines().map(parse_line).collect())
}

/// Regenerate the file deterministically and swap it into place crash-safe:
/// write a temp sibling, rename the original to a .bak sibling, then rename
/// the temp file over the original. A failure after the .bak rename still
/// leaves a usable backup.
pub fn write_mountpoints(path: &Path, lines: &[FstabLine]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| SysError::OperationFailed(format!("invalid fstab path: {path:?}")))?;

    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));
    let bak_path = path.with_file_name(format!("{file_name}.bak"));

    {
        let mut tmp = fs::File::create(&tmp_path)?;
        for line in lines {
            writeln!(tmp, "{}", render_line(line))?;
        }
        tmp.sync_all()?;
    }

    if path.exists() {
        if let Err(error) = fs::rename(path, &bak_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(SysError::OperationFailed(format!(
                "could not back up {path:?}: {error}"
            )));
        }
    }

    fs::rename(&tmp_path, path).map_err(|error| {
        SysError::OperationFailed(format!("could not replace {path:?}: {error}"))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapLookup(HashMap<String, String>);

    impl TagLookup for MapLookup {
        fn resolve(&self, spec: &FsSpec) -> Option<String> {
            let key = match spec {
                FsSpec::Uuid(v) => format!("UUID={v}"),
                FsSpec::Label(v) => format!("LABEL={v}"),
                FsSpec::PartUuid(v) => format!("PARTUUID={v}"),
                FsSpec::PartLabel(v) => format!("PARTLABEL={v}"),
                _ => return None,
            };
            self.0.get(&key).cloned()
        }
    }

    #[test]
    fn classifies_fs_specs() {
        assert_eq!(
            FsSpec::classify("UUID=1234-ABCD"),
            FsSpec::Uuid("1234-ABCD".to_string())
        );
        assert_eq!(
            FsSpec::classify("/dev/sda1"),
            FsSpec::DevicePath("/dev/sda1".to_string())
        );
        assert_eq!(
            FsSpec::classify("proc"),
            FsSpec::Comment("proc".to_string())
        );
    }

    #[test]
    fn parses_and_normalizes_data_lines() {
        let line = parse_line("/dev/sda1 / ext4 defaults 0 1");
        let FstabLine::Entry(entry) = &line else {
            panic!("expected entry");
        };
        assert_eq!(entry.mount_point.as_deref(), Some("/"));
        assert_eq!(entry.options, None);
        assert_eq!(render_line(&line), "/dev/sda1\t/\text4\tdefaults\t0\t1");
    }

    #[test]
    fn malformed_lines_survive_verbatim() {
        let raw = "this is not an fstab entry at all, too many fields here ok";
        assert_eq!(parse_line(raw), FstabLine::Comment(raw.to_string()));
    }

    #[test]
    fn tag_specs_resolve_through_lookup() {
        let lookup = MapLookup(HashMap::from([(
            "UUID=1234-ABCD".to_string(),
            "/dev/sdb2".to_string(),
        )]));
        let FstabLine::Entry(entry) = parse_line("UUID=1234-ABCD /home ext4 noatime 0 2") else {
            panic!("expected entry");
        };
        assert_eq!(entry.device_node(&lookup).as_deref(), Some("/dev/sdb2"));
    }

    #[test]
    fn write_then_read_roundtrips_with_tab_normalization() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fstab");
        std::fs::write(
            &path,
            "# static file system information\n/dev/sda1 / ext4 defaults 0 1\nUUID=99 /boot vfat umask=0077 0 2\n",
        )
        .expect("seed fstab");

        let lines = read_fstab_entries(&path).expect("read");
        write_mountpoints(&path, &lines).expect("write");

        let rewritten = std::fs::read_to_string(&path).expect("reread");
        assert_eq!(
            rewritten,
            "# static file system information\n/dev/sda1\t/\text4\tdefaults\t0\t1\nUUID=99\t/boot\tvfat\tumask=0077\t0\t2\n"
        );

        // A second pass is byte-stable.
        let lines2 = read_fstab_entries(&path).expect("read again");
        write_mountpoints(&path, &lines2).expect("write again");
        assert_eq!(std::fs::read_to_string(&path).expect("reread"), rewritten);

        // The previous version is kept as a .bak sibling.
        assert!(path.with_file_name("fstab.bak").exists());
    }
}
