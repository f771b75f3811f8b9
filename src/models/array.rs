use crate::collectors::diskstats::Snapshot;
use crate::control::DeviceController;
use crate::util::human::fmt_elapsed;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// What happened to an array on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Activity seen while in standby; `asleep_for` is time since power down.
    Woke { asleep_for: Duration },
    /// Inactivity timeout hit; `up_for` is time since the last wake.
    PoweredDown { up_for: Duration },
}

/// A group of devices spun up and down as one unit.
#[derive(Debug)]
pub struct Array {
    pub name:         String,
    pub devices:      Vec<PathBuf>,
    pub timeout:      Duration,
    pub mount_hint:   Option<PathBuf>,
    pub is_up:        bool,
    pub last_access:  Instant,
    pub last_standby: Instant,
    pub last_wake:    Instant,
    previous: Option<Snapshot>,
}

impl Array {
    /// Starts up: disks already spinning at launch are left alone until
    /// the timeout elapses.
    pub fn new(name: String, devices: Vec<PathBuf>, timeout: Duration, now: Instant) -> Self {
        Self {
            name,
            devices,
            timeout,
            mount_hint:   None,
            is_up:        true,
            last_access:  now,
            last_standby: now,
            last_wake:    now,
            previous:     None,
        }
    }

    pub fn with_mount_hint(mut self, mount: Option<PathBuf>) -> Self {
        self.mount_hint = mount;
        self
    }

    #[cfg(test)]
    pub fn previous_counters(&self) -> Option<&Snapshot> {
        self.previous.as_ref()
    }

    /// Evaluate one poll tick against the shared kernel snapshot.
    ///
    /// The wake edge is applied before the timeout check, so an array never
    /// powers down on the tick it woke up.
    pub fn tick(
        &mut self,
        snapshot: &Snapshot,
        now: Instant,
        controller: &dyn DeviceController,
    ) -> Option<Transition> {
        let current = snapshot.subset(&self.devices);
        let active = self.previous.as_ref().is_some_and(|prev| changed(prev, &current));
        let mut transition = None;

        if active && !self.is_up {
            let asleep_for = now.saturating_duration_since(self.last_standby);
            self.is_up = true;
            self.last_wake = now;
            log::info!("{}: woke after {} in standby", self.name, fmt_elapsed(asleep_for));
            controller.wake_up(&self.devices, self.mount_hint.as_deref());
            transition = Some(Transition::Woke { asleep_for });
        }

        if active {
            self.last_access = self.last_access.max(now);
        }

        if self.is_up && now.saturating_duration_since(self.last_access) > self.timeout {
            let up_for = now.saturating_duration_since(self.last_wake);
            self.is_up = false;
            self.last_standby = now;
            log::info!("{}: powering down after {} up", self.name, fmt_elapsed(up_for));
            controller.power_down(&self.devices);
            transition = Some(Transition::PoweredDown { up_for });
        }

        self.previous = Some(current);
        transition
    }
}

/// A device counts only if it's present in both samples; one that drops
/// out of /proc/diskstats for a tick is "no data", not activity.
fn changed(prev: &Snapshot, curr: &Snapshot) -> bool {
    curr.iter().any(|(dev, c)| prev.get(dev).is_some_and(|p| p != c))
}
