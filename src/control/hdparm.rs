use super::DeviceController;
use crate::collectors::open_files;
use anyhow::{bail, Context, Result};
use std::fs::OpenOptions;
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

/// O_DIRECT needs a buffer aligned to the logical block size; 4 KiB covers
/// both 512e and 4Kn drives.
const PROBE_BLOCK: usize = 4096;

/// Drives disks through external utilities: a direct read to wake them,
/// `hdparm -y` (or whatever is configured) to put them in standby.
pub struct HdparmController {
    pub power_down_cmd: Vec<String>,
    pub open_files_cmd: String,
    pub dry_run:        bool,
}

impl HdparmController {
    pub fn new(power_down_cmd: Vec<String>, open_files_cmd: String, dry_run: bool) -> Self {
        Self { power_down_cmd, open_files_cmd, dry_run }
    }

    fn log_open_files(&self, mount: &Path) {
        match open_files::list_open_files(&self.open_files_cmd, mount) {
            Ok(files) if files.is_empty() => {
                log::info!("no open files under {}", mount.display());
            }
            Ok(files) => {
                for f in &files {
                    log::info!("open: {} ({}) {}", f.command, f.pid, f.path.display());
                }
            }
            Err(e) => log::warn!("open file listing for {} failed: {:#}", mount.display(), e),
        }
    }
}

impl DeviceController for HdparmController {
    fn wake_up(&self, devices: &[PathBuf], mount_hint: Option<&Path>) {
        if self.dry_run {
            for dev in devices {
                log::info!("[dry-run] would read probe {}", dev.display());
            }
        } else {
            std::thread::scope(|s| {
                for dev in devices {
                    s.spawn(move || {
                        let started = Instant::now();
                        match read_probe(dev) {
                            Ok(()) => log::debug!("{} answered after {:?}", dev.display(), started.elapsed()),
                            Err(e) => log::warn!("wake probe on {} failed: {:#}", dev.display(), e),
                        }
                    });
                }
            });
        }

        match mount_hint {
            Some(mount) => self.log_open_files(mount),
            None => log::debug!(
                "no mount hint for {}, skipping open-file listing",
                devices.iter().map(|d| d.display().to_string()).collect::<Vec<_>>().join(", ")
            ),
        }
    }

    fn power_down(&self, devices: &[PathBuf]) {
        std::thread::scope(|s| {
            for dev in devices {
                s.spawn(move || {
                    if self.dry_run {
                        log::info!("[dry-run] would run {} {}", self.power_down_cmd.join(" "), dev.display());
                        return;
                    }
                    if let Err(e) = run_power_down(&self.power_down_cmd, dev) {
                        log::warn!("power down of {} failed: {:#}", dev.display(), e);
                    }
                });
            }
        });
    }
}

/// Read the first block with O_DIRECT so the page cache can't satisfy it.
fn read_probe(dev: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_DIRECT)
        .open(dev)
        .with_context(|| format!("open {}", dev.display()))?;

    let mut raw = vec![0u8; PROBE_BLOCK * 2];
    let offset = raw.as_ptr().align_offset(PROBE_BLOCK);
    let buf = &mut raw[offset..offset + PROBE_BLOCK];
    file.read_at(buf, 0).with_context(|| format!("read {}", dev.display()))?;
    Ok(())
}

fn run_power_down(cmd: &[String], dev: &Path) -> Result<()> {
    let Some((program, args)) = cmd.split_first() else {
        bail!("no power down command configured");
    };
    let out = Command::new(program)
        .args(args)
        .arg(dev)
        .output()
        .with_context(|| format!("{} not found", program))?;

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        bail!("{} exited with {}: {}", program, out.status, stderr.trim());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn power_down_reports_failing_command() {
        let cmd = vec!["false".to_string()];
        assert!(run_power_down(&cmd, Path::new("/dev/null")).is_err());
    }

    #[test]
    fn power_down_passes_device_as_last_argument() {
        let cmd = vec!["test".to_string(), "-e".to_string()];
        assert!(run_power_down(&cmd, Path::new("/")).is_ok());
        assert!(run_power_down(&cmd, Path::new("/nonexistent/dev")).is_err());
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(run_power_down(&[], Path::new("/dev/null")).is_err());
    }

    #[test]
    fn missing_program_is_an_error() {
        let cmd = vec!["/nonexistent/hdparm".to_string(), "-y".to_string()];
        assert!(run_power_down(&cmd, Path::new("/dev/null")).is_err());
    }

    #[test]
    fn failures_stay_inside_the_controller() {
        let ctl = HdparmController::new(
            vec!["false".to_string()],
            "/nonexistent/lsof".to_string(),
            false,
        );
        let devs = vec![PathBuf::from("/nonexistent/a"), PathBuf::from("/nonexistent/b")];
        ctl.power_down(&devs);
        ctl.wake_up(&devs, Some(Path::new("/")));
        ctl.wake_up(&devs, None);
    }

    fn sh(script: &str) -> Vec<String> {
        // The device path is appended, so the script sees it as $0.
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn power_down_runs_devices_concurrently() {
        let ctl = HdparmController::new(sh("sleep 1"), "lsof".to_string(), false);
        let devs: Vec<PathBuf> = ["/dev/a", "/dev/b", "/dev/c"].iter().map(PathBuf::from).collect();

        let started = Instant::now();
        ctl.power_down(&devs);
        let took = started.elapsed();
        assert!(took >= Duration::from_secs(1), "returned before commands finished: {:?}", took);
        assert!(took < Duration::from_millis(2500), "ran sequentially: {:?}", took);
    }

    #[test]
    fn one_failing_device_does_not_stop_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let good_a = dir.path().join("sda");
        let good_b = dir.path().join("sdb");
        let missing = dir.path().join("sdz");
        std::fs::write(&good_a, b"").unwrap();
        std::fs::write(&good_b, b"").unwrap();

        let ctl = HdparmController::new(
            sh("test -e \"$0\" && touch \"$0.done\""),
            "lsof".to_string(),
            false,
        );
        ctl.power_down(&[missing, good_a, good_b]);

        assert!(dir.path().join("sda.done").exists());
        assert!(dir.path().join("sdb.done").exists());
        assert!(!dir.path().join("sdz.done").exists());
    }
}
