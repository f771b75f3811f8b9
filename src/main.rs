mod collectors;
mod config;
mod control;
mod daemon;
mod disk_spec;
mod models;
mod util;

use anyhow::{bail, Result};
use clap::Parser;
use config::Config;
use control::HdparmController;
use daemon::Monitor;
use models::array::Array;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "spindown", about = "Spin down idle disk arrays and wake them on access", version = "0.1")]
struct Cli {
    /// Disks to manage: /dev/sdX or group:/dev/sdX (same group = one array)
    disks: Vec<String>,

    /// Idle seconds before an array is put in standby
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Poll interval in milliseconds
    #[arg(short, long)]
    interval: Option<u64>,

    /// Config file (default: ~/.config/spindown/spindown.toml)
    #[arg(short = 'c', long)]
    config_file: Option<PathBuf>,

    /// Log spin-up and standby commands instead of running them
    #[arg(long)]
    dry_run: bool,

    /// Print the arrays' current diskstats counters as JSON and exit
    #[arg(long)]
    json: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    show_config: bool,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut cfg = Config::load(cli.config_file.as_deref())?;
    if let Some(t) = cli.timeout { cfg.general.timeout_secs = t; }
    if let Some(i) = cli.interval { cfg.general.interval_ms = i; }
    cfg.general.dry_run |= cli.dry_run;

    if cli.show_config {
        return run_print_config(&cfg, cli.config_file);
    }
    if cli.disks.is_empty() {
        bail!("no disks given (try `spindown archive:/dev/sdb archive:/dev/sdc`)");
    }

    let groups = disk_spec::group_disks(&cli.disks, |p| std::fs::canonicalize(p))?;

    if cli.json {
        return run_json_snapshot(&groups);
    }
    run_daemon(&cfg, groups)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn run_print_config(cfg: &Config, explicit: Option<PathBuf>) -> Result<()> {
    let path = explicit
        .or_else(Config::config_path)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "(unknown)".to_string());
    println!("Config: {}", path);
    println!();
    println!("[general]");
    println!("  timeout_secs = {}", cfg.general.timeout_secs);
    println!("  interval_ms  = {}", cfg.general.interval_ms);
    println!("  dry_run      = {}", cfg.general.dry_run);
    println!();
    println!("[commands]");
    println!("  power_down = {}", cfg.commands.power_down.join(" "));
    println!("  open_files = {}", cfg.commands.open_files);
    println!();
    println!("[mounts]");
    if cfg.mounts.is_empty() {
        println!("  (none, using /proc/mounts)");
    }
    for (group, mount) in &cfg.mounts {
        println!("  {} → {}", group, mount.display());
    }
    Ok(())
}

fn run_json_snapshot(groups: &[disk_spec::DiskGroup]) -> Result<()> {
    use serde_json::{json, Value};

    let snapshot = collectors::diskstats::read_diskstats()?;
    let arrays: Vec<Value> = groups.iter().map(|g| {
        let devices: Vec<Value> = g.devices.iter().map(|d| {
            json!({
                "device":   d,
                "counters": snapshot.get(d),
            })
        }).collect();
        json!({ "name": g.name, "devices": devices })
    }).collect();

    let out = json!({
        "spindown_version": "0.1",
        "timestamp": chrono::Local::now().to_rfc3339(),
        "arrays": arrays,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn run_daemon(cfg: &Config, groups: Vec<disk_spec::DiskGroup>) -> Result<()> {
    let timeout  = Duration::from_secs(cfg.general.timeout_secs);
    let interval = Duration::from_millis(cfg.general.interval_ms.max(100));

    log::info!(
        "spindown starting: {} array(s), timeout {}, poll {:?}{}",
        groups.len(),
        util::human::fmt_elapsed(timeout),
        interval,
        if cfg.general.dry_run { ", dry run" } else { "" }
    );
    if !nix::unistd::Uid::effective().is_root() && !cfg.general.dry_run {
        log::warn!("not running as root; spin-up reads and standby commands will likely fail");
    }

    let started = Instant::now();
    let arrays: Vec<Array> = groups.into_iter().map(|g| {
        let mount = cfg.mount_for(&g.name)
            .map(PathBuf::from)
            .or_else(|| collectors::mounts::find_mount_point(&g.devices));
        Array::new(g.name, g.devices, timeout, started).with_mount_hint(mount)
    }).collect();

    let controller = HdparmController::new(
        cfg.commands.power_down.clone(),
        cfg.commands.open_files.clone(),
        cfg.general.dry_run,
    );
    Monitor::new(arrays, controller, interval).run()
}
