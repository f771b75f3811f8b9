use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DISKSTATS_PATH: &str = "/proc/diskstats";

/// Cumulative counters from one line of /proc/diskstats.
///
/// Field order follows Documentation/admin-guide/iostats.rst.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiskCounters {
    pub reads_completed:  u64,
    pub reads_merged:     u64,
    pub sectors_read:     u64,
    pub ms_reading:       u64,
    pub writes_completed: u64,
    pub writes_merged:    u64,
    pub sectors_written:  u64,
    pub ms_writing:       u64,
    pub ios_in_progress:  u64,
    pub ms_io:            u64,
    pub weighted_ms_io:   u64,
}

/// Device path (`/dev/<name>`) → counters, captured at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    devices: BTreeMap<PathBuf, DiskCounters>,
}

impl Snapshot {
    pub fn get(&self, device: &Path) -> Option<&DiskCounters> {
        self.devices.get(device)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &DiskCounters)> {
        self.devices.iter()
    }

    /// Only the listed devices that are present in this snapshot.
    pub fn subset<'a, I>(&self, devices: I) -> Snapshot
    where
        I: IntoIterator<Item = &'a PathBuf>,
    {
        let devices = devices
            .into_iter()
            .filter_map(|d| self.devices.get(d).map(|c| (d.clone(), *c)))
            .collect();
        Snapshot { devices }
    }

    pub fn insert(&mut self, device: PathBuf, counters: DiskCounters) {
        self.devices.insert(device, counters);
    }
}

impl FromIterator<(PathBuf, DiskCounters)> for Snapshot {
    fn from_iter<T: IntoIterator<Item = (PathBuf, DiskCounters)>>(iter: T) -> Self {
        Snapshot { devices: iter.into_iter().collect() }
    }
}

/// Read /proc/diskstats. An unreadable source is an error; bad lines are not.
pub fn read_diskstats() -> Result<Snapshot> {
    read_diskstats_from(Path::new(DISKSTATS_PATH))
}

pub fn read_diskstats_from(path: &Path) -> Result<Snapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    Ok(parse_diskstats(&content))
}

pub fn parse_diskstats(content: &str) -> Snapshot {
    let mut snapshot = Snapshot::default();

    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 14 { continue; }

        if let Some(counters) = parse_counters(&fields[3..14]) {
            snapshot.insert(Path::new("/dev").join(fields[2]), counters);
        }
    }
    snapshot
}

fn parse_counters(fields: &[&str]) -> Option<DiskCounters> {
    let mut v = [0u64; 11];
    for (slot, s) in v.iter_mut().zip(fields) {
        *slot = s.parse().ok()?;
    }
    Some(DiskCounters {
        reads_completed:  v[0],
        reads_merged:     v[1],
        sectors_read:     v[2],
        ms_reading:       v[3],
        writes_completed: v[4],
        writes_merged:    v[5],
        sectors_written:  v[6],
        ms_writing:       v[7],
        ios_in_progress:  v[8],
        ms_io:            v[9],
        weighted_ms_io:   v[10],
    })
}
