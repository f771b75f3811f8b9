use std::fs;
use std::path::{Path, PathBuf};

pub const MOUNTS_PATH: &str = "/proc/mounts";

/// Mount point of the first /proc/mounts entry backed by one of `devices`
/// or a partition of one.
pub fn find_mount_point(devices: &[PathBuf]) -> Option<PathBuf> {
    let content = fs::read_to_string(MOUNTS_PATH).ok()?;
    mount_point_for(devices, &content)
}

pub fn mount_point_for(devices: &[PathBuf], mounts: &str) -> Option<PathBuf> {
    for line in mounts.lines() {
        let mut parts = line.split_whitespace();
        let (Some(source), Some(target)) = (parts.next(), parts.next()) else { continue };
        if !source.starts_with('/') { continue; }

        let source = fs::canonicalize(source).unwrap_or_else(|_| PathBuf::from(source));
        if devices.iter().any(|d| is_same_or_partition(d, &source)) {
            return Some(PathBuf::from(unescape(target)));
        }
    }
    None
}

/// `/dev/sda` owns `/dev/sda1`; `/dev/nvme0n1` owns `/dev/nvme0n1p2`.
fn is_same_or_partition(device: &Path, source: &Path) -> bool {
    if device == source { return true; }
    let (Some(dev), Some(src)) = (device.to_str(), source.to_str()) else { return false };
    let Some(rest) = src.strip_prefix(dev) else { return false };
    // A trailing digit means the kernel inserts `p` before the partition
    // number; without it, md1 would own md10.
    let rest = if dev.ends_with(|c: char| c.is_ascii_digit()) {
        let Some(rest) = rest.strip_prefix('p') else { return false };
        rest
    } else {
        rest
    };
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
}

/// /proc/mounts encodes spaces and friends as octal escapes (`\040`).
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && bytes[i + 1..i + 4].iter().all(|b| (b'0'..=b'7').contains(b)) {
            let s = std::str::from_utf8(&bytes[i + 1..i + 4]).unwrap_or("0");
            out.push(u8::from_str_radix(s, 8).unwrap_or(b'?'));
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
