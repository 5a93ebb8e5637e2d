// SPDX-License-Identifier: GPL-3.0-only

//! Common utility values and helpers shared across models.

use anyhow::{Result, bail};

/// Sentinel for numeric quantities a field query could not resolve.
pub const SECTOR_UNKNOWN: i64 = -1;

/// Sentinel for UUID strings a field query could not resolve.
pub const UUID_UNKNOWN: &str = "---";

/// Convert bytes to human-readable format (e.g., "1.50 GB")
pub fn bytes_to_pretty(bytes: u64, add_bytes: bool) -> String {
    let mut steps = 0;
    let mut val: f64 = bytes as f64;

    while val > 1024. && steps <= 8 {
        val /= 1024.;
        steps += 1;
    }

    let unit = match steps {
        0 => "B",
        1 => "KB",
        2 => "MB",
        3 => "GB",
        4 => "TB",
        5 => "PB",
        6 => "EB",
        7 => "ZB",
        _ => "YB",
    };

    if add_bytes && steps > 0 {
        format!("{:.2} {} ({} bytes)", val, unit, bytes)
    } else if steps > 0 {
        format!("{:.2} {}", val, unit)
    } else {
        format!("{} {}", bytes, unit)
    }
}

/// Parse a human-readable size ("1.5 GB", "512 MB") back into bytes.
pub fn pretty_to_bytes(pretty: &str) -> Result<u64> {
    let trimmed = pretty.trim();
    let split = trimmed
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(trimmed.len());
    let (num, unit) = trimmed.split_at(split);
    let value: f64 = num.trim().parse()?;

    let factor: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "KB" | "KIB" => 1024,
        "MB" | "MIB" => 1024u64.pow(2),
        "GB" | "GIB" => 1024u64.pow(3),
        "TB" | "TIB" => 1024u64.pow(4),
        "PB" | "PIB" => 1024u64.pow(5),
        other => bail!("unrecognized size unit: {other}"),
    };

    Ok((value * factor as f64).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_and_parses_sizes() {
        assert_eq!(bytes_to_pretty(512, false), "512 B");
        assert_eq!(bytes_to_pretty(1536 * 1024, false), "1.50 MB");
        assert_eq!(pretty_to_bytes("1.50 MB").unwrap(), 1536 * 1024);
        assert_eq!(pretty_to_bytes("512").unwrap(), 512);
        assert!(pretty_to_bytes("12 parsecs").is_err());
    }
}
