use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

pub const DEFAULT_GROUP: &str = "default";

/// Devices sharing a group name, in the order they were first given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskGroup {
    pub name:    String,
    pub devices: Vec<PathBuf>,
}

/// Split one `group:device` or bare `device` argument.
///
/// Anything starting with `/` is a bare path, since by-path names such as
/// `/dev/disk/by-path/pci-0000:00:17.0-ata-1` contain colons.
pub fn parse_entry(entry: &str) -> Result<(&str, &str)> {
    let (group, device) = match entry.split_once(':') {
        Some((g, d)) if !entry.starts_with('/') => (g, d),
        _ => (DEFAULT_GROUP, entry),
    };
    if group.is_empty() { bail!("empty group name in {:?}", entry); }
    if device.is_empty() { bail!("empty device path in {:?}", entry); }
    Ok((group, device))
}

/// Group disk arguments, resolving each path to its real device so
/// symlinks like /dev/disk/by-id/... collapse onto /dev/sdX.
pub fn group_disks<S, F>(entries: &[S], resolve: F) -> Result<Vec<DiskGroup>>
where
    S: AsRef<str>,
    F: Fn(&Path) -> std::io::Result<PathBuf>,
{
    let mut groups: Vec<DiskGroup> = Vec::new();

    for entry in entries {
        let entry = entry.as_ref();
        let (group, device) = parse_entry(entry)?;
        let device = resolve(Path::new(device))
            .with_context(|| format!("cannot resolve device {}", device))?;

        if let Some(owner) = groups.iter().find(|g| g.name != group && g.devices.contains(&device)) {
            bail!("{} is listed in both groups {} and {}", device.display(), owner.name, group);
        }

        match groups.iter_mut().find(|g| g.name == group) {
            Some(g) if g.devices.contains(&device) => {}
            Some(g) => g.devices.push(device),
            None => groups.push(DiskGroup { name: group.to_string(), devices: vec![device] }),
        }
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn identity(p: &Path) -> io::Result<PathBuf> {
        Ok(p.to_path_buf())
    }

    #[test]
    fn bare_paths_go_to_default_group() {
        assert_eq!(parse_entry("/dev/sda").unwrap(), ("default", "/dev/sda"));
        assert_eq!(
            parse_entry("/dev/disk/by-path/pci-0000:00:17.0-ata-1").unwrap(),
            ("default", "/dev/disk/by-path/pci-0000:00:17.0-ata-1")
        );
        assert_eq!(parse_entry("tank:/dev/sdb").unwrap(), ("tank", "/dev/sdb"));
    }

    #[test]
    fn empty_parts_are_rejected() {
        assert!(parse_entry(":/dev/sda").is_err());
        assert!(parse_entry("tank:").is_err());
        assert!(parse_entry("").is_err());
    }

    #[test]
    fn merges_entries_by_group() {
        let groups = group_disks(&["a:/dev/sda", "a:/dev/sdb", "b:/dev/sdc"], identity).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "a");
        assert_eq!(groups[0].devices, vec![PathBuf::from("/dev/sda"), PathBuf::from("/dev/sdb")]);
        assert_eq!(groups[1].name, "b");
        assert_eq!(groups[1].devices, vec![PathBuf::from("/dev/sdc")]);
    }

    #[test]
    fn symlinked_names_collapse() {
        let resolve = |p: &Path| -> io::Result<PathBuf> {
            if p.starts_with("/dev/disk/by-id") { Ok(PathBuf::from("/dev/sda")) } else { Ok(p.to_path_buf()) }
        };
        let groups = group_disks(&["/dev/disk/by-id/ata-WDC-1", "/dev/sda"], resolve).unwrap();
        assert_eq!(groups, vec![DiskGroup { name: "default".into(), devices: vec!["/dev/sda".into()] }]);
    }

    #[test]
    fn device_in_two_groups_is_an_error() {
        assert!(group_disks(&["a:/dev/sda", "b:/dev/sda"], identity).is_err());
    }

    #[test]
    fn unresolvable_device_is_an_error() {
        let err = group_disks(&["/nonexistent/disk"], |p: &Path| std::fs::canonicalize(p)).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/disk"));
    }

    #[test]
    fn resolves_real_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("sdx");
        std::fs::write(&target, b"").unwrap();
        let link = dir.path().join("by-id-disk");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let entries = vec![format!("g:{}", link.display()), format!("g:{}", target.display())];
        let groups = group_disks(&entries, |p: &Path| std::fs::canonicalize(p)).unwrap();
        assert_eq!(groups[0].devices, vec![std::fs::canonicalize(&target).unwrap()]);
    }
}
