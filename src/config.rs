use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub commands: CommandsConfig,

    /// Mount point per group, used for open-file diagnostics on wake.
    /// Groups without an entry fall back to /proc/mounts.
    #[serde(default)]
    pub mounts: BTreeMap<String, PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Idle seconds before an array is put in standby (applies to every array)
    pub timeout_secs: u64,
    /// Poll interval in milliseconds
    pub interval_ms: u64,
    /// Log device commands instead of running them
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Standby command; the device path is appended
    pub power_down: Vec<String>,
    /// lsof-compatible program for open-file listings
    pub open_files: String,
}

// ── Defaults ─────────────────────────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { timeout_secs: 3600, interval_ms: 1000, dry_run: false }
    }
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            power_down: vec!["hdparm".into(), "-y".into()],
            open_files: "lsof".into(),
        }
    }
}

// ── Load ──────────────────────────────────────────────────────────────

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist and parse. The default location is
    /// optional: when it can't be read, defaults are used and written
    /// there for next time.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return load_from(path);
        }
        let Some(path) = Self::config_path() else { return Ok(Config::default()) };
        if !path.exists() {
            if let Err(e) = try_write_defaults(&path) {
                log::debug!("could not write default config to {}: {:#}", path.display(), e);
            }
            return Ok(Config::default());
        }
        load_from(&path)
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("spindown").join("spindown.toml"))
    }

    /// Mount hint configured for `group`, if any.
    pub fn mount_for(&self, group: &str) -> Option<&Path> {
        self.mounts.get(group).map(PathBuf::as_path)
    }
}

fn load_from(path: &Path) -> Result<Config> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

fn try_write_defaults(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = toml::to_string_pretty(&Config::default())?;
    fs::write(path, format!("# spindown configuration\n# Generated on first run, edit freely\n\n{}", text))?;
    Ok(())
}
