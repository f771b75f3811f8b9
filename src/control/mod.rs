pub mod hdparm;

use std::path::{Path, PathBuf};

pub use hdparm::HdparmController;

/// Physical actions the array state machine delegates.
///
/// Both calls are best-effort: failures are logged by the implementation
/// and never reach the caller.
pub trait DeviceController {
    /// Force every device to spin up and report what holds files open
    /// under `mount_hint`.
    fn wake_up(&self, devices: &[PathBuf], mount_hint: Option<&Path>);

    /// Put every device into standby, concurrently, returning once all
    /// commands have finished.
    fn power_down(&self, devices: &[PathBuf]);
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::cell::RefCell;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        WakeUp(Vec<PathBuf>, Option<PathBuf>),
        PowerDown(Vec<PathBuf>),
    }

    /// Records every call instead of touching hardware.
    #[derive(Default)]
    pub struct RecordingController {
        pub calls: RefCell<Vec<Call>>,
    }

    impl RecordingController {
        pub fn wake_count(&self) -> usize {
            self.calls.borrow().iter().filter(|c| matches!(c, Call::WakeUp(..))).count()
        }

        pub fn power_down_count(&self) -> usize {
            self.calls.borrow().iter().filter(|c| matches!(c, Call::PowerDown(..))).count()
        }
    }

    impl DeviceController for RecordingController {
        fn wake_up(&self, devices: &[PathBuf], mount_hint: Option<&Path>) {
            self.calls.borrow_mut().push(Call::WakeUp(devices.to_vec(), mount_hint.map(Path::to_path_buf)));
        }

        fn power_down(&self, devices: &[PathBuf]) {
            self.calls.borrow_mut().push(Call::PowerDown(devices.to_vec()));
        }
    }
}
