use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// One open file reported by lsof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFile {
    pub pid:     u32,
    pub command: String,
    pub path:    PathBuf,
}

/// Run `lsof -w -F pcn <mount>` and list the files held open beneath it.
///
/// lsof exits 1 when nothing matches, so the exit code is ignored and
/// only the field output is parsed.
pub fn list_open_files(program: &str, mount: &Path) -> Result<Vec<OpenFile>> {
    let out = Command::new(program)
        .args(["-w", "-F", "pcn"])
        .arg(mount)
        .output()
        .with_context(|| format!("{} not found", program))?;

    Ok(parse_lsof_fields(&String::from_utf8_lossy(&out.stdout)))
}

fn parse_lsof_fields(text: &str) -> Vec<OpenFile> {
    let mut files = Vec::new();
    let mut pid: Option<u32> = None;
    let mut command = String::new();

    for line in text.lines() {
        let Some(tag) = line.chars().next() else { continue };
        let value = &line[tag.len_utf8()..];
        match tag {
            'p' => {
                pid = value.parse().ok();
                command.clear();
            }
            'c' => command = value.to_string(),
            'n' => {
                if let Some(pid) = pid {
                    files.push(OpenFile { pid, command: command.clone(), path: PathBuf::from(value) });
                }
            }
            _ => {}
        }
    }
    files
}
