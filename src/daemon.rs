use crate::collectors::diskstats::{self, Snapshot};
use crate::control::DeviceController;
use crate::models::array::{Array, Transition};
use anyhow::Result;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Owns every array for the life of the process and drives them from
/// one diskstats sample per tick.
pub struct Monitor<C: DeviceController> {
    pub arrays:     Vec<Array>,
    pub controller: C,
    pub interval:   Duration,
    pub source:     PathBuf,
}

impl<C: DeviceController> Monitor<C> {
    pub fn new(arrays: Vec<Array>, controller: C, interval: Duration) -> Self {
        Self { arrays, controller, interval, source: PathBuf::from(diskstats::DISKSTATS_PATH) }
    }

    /// Sample once and evaluate every array against that sample.
    pub fn tick_once(&mut self, now: Instant) -> Result<Vec<(usize, Transition)>> {
        let snapshot = diskstats::read_diskstats_from(&self.source)?;
        if snapshot.is_empty() {
            log::warn!("{} lists no devices", self.source.display());
        } else {
            log::trace!("sampled {} devices", snapshot.len());
        }
        Ok(self.evaluate(&snapshot, now))
    }

    pub fn evaluate(&mut self, snapshot: &Snapshot, now: Instant) -> Vec<(usize, Transition)> {
        let controller = &self.controller;
        self.arrays
            .iter_mut()
            .enumerate()
            .filter_map(|(i, array)| array.tick(snapshot, now, controller).map(|t| (i, t)))
            .collect()
    }

    /// Poll forever. Only an unreadable diskstats source ends the loop.
    pub fn run(&mut self) -> Result<()> {
        for array in &self.arrays {
            let members: Vec<String> = array.devices.iter().map(|d| d.display().to_string()).collect();
            let mount = array.mount_hint.as_ref()
                .map(|m| m.display().to_string())
                .unwrap_or_else(|| "(none)".to_string());
            log::info!("array {}: {} (mount {})", array.name, members.join(", "), mount);
        }

        let mut deadline = Instant::now();
        loop {
            let now = Instant::now();
            self.tick_once(now)?;

            deadline += self.interval;
            let now = Instant::now();
            if deadline > now {
                std::thread::sleep(deadline - now);
            } else {
                log::debug!("tick overran by {:?}", now - deadline);
                deadline = now;
            }
        }
    }
}
