// Author: Dustin Pilgrim
// License: MIT

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Size-based rotation for `--log-file`.
#[derive(Clone, Copy, Debug)]
pub struct LogPolicy {
    /// Rotate once the live log reaches this many bytes.
    pub max_bytes: u64,
    /// `<log>.1` .. `<log>.N`; 0 deletes the live log instead.
    pub keep_backups: u32,
}

impl Default for LogPolicy {
    fn default() -> Self {
        LogPolicy {
            max_bytes: 5 * 1024 * 1024,
            keep_backups: 5,
        }
    }
}

/// State of the log file when a run starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogStart {
    /// Missing or empty.
    Fresh,
    /// Earlier runs are in it; this run appends.
    Continued,
    /// The previous log hit the size limit; `backups` files now trail it.
    Rotated { backups: u32 },
}

impl LogStart {
    /// Runs appended to the same file are separated by one blank line.
    pub fn needs_separator(self) -> bool {
        self == LogStart::Continued
    }

    fn label(self) -> &'static str {
        match self {
            LogStart::Fresh => "fresh",
            LogStart::Continued => "continued",
            LogStart::Rotated { .. } => "rotated",
        }
    }
}

/// Create the log directory and rotate the log if it is over the limit.
pub fn prepare_log_file(path: &Path, policy: LogPolicy) -> io::Result<LogStart> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let len = match fs::metadata(path) {
        Ok(m) => m.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LogStart::Fresh),
        Err(e) => return Err(e),
    };

    if len == 0 {
        Ok(LogStart::Fresh)
    } else if len < policy.max_bytes {
        Ok(LogStart::Continued)
    } else {
        let backups = rotate(path, policy.keep_backups)?;
        Ok(LogStart::Rotated { backups })
    }
}

/// First record of every run.
pub fn run_header(start: Option<LogStart>) -> String {
    let pid = std::process::id();
    let version = env!("CARGO_PKG_VERSION");
    match start {
        Some(s) => format!("==== wb {version} run start pid={pid} log={} ====", s.label()),
        None => format!("==== wb {version} run start pid={pid} ===="),
    }
}

/// Shift `<log>.N-1` to `<log>.N` down to the live log. Returns how many backups exist afterwards.
fn rotate(path: &Path, keep_backups: u32) -> io::Result<u32> {
    if keep_backups == 0 {
        remove_if_present(path)?;
        return Ok(0);
    }

    remove_if_present(&backup_path(path, keep_backups))?;
    for n in (1..keep_backups).rev() {
        rename_if_present(&backup_path(path, n), &backup_path(path, n + 1))?;
    }
    fs::rename(path, backup_path(path, 1))?;

    Ok((1..=keep_backups)
        .take_while(|n| backup_path(path, *n).exists())
        .count() as u32)
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn rename_if_present(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn backup_path(base: &Path, n: u32) -> PathBuf {
    let mut s = OsString::from(base.as_os_str());
    s.push(format!(".{n}"));
    PathBuf::from(s)
}

/// One raw newline, written outside eventline.
pub fn write_separator(path: &Path) -> io::Result<()> {
    let mut f = fs::OpenOptions::new().create(true).append(true).open(path)?;
    f.write_all(b"\n")?;
    f.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_empty_and_small_logs() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let log = dir.path().join("nested/wb.log");

        assert_eq!(prepare_log_file(&log, LogPolicy::default())?, LogStart::Fresh);
        assert!(log.parent().is_some_and(Path::exists));

        fs::write(&log, b"")?;
        assert_eq!(prepare_log_file(&log, LogPolicy::default())?, LogStart::Fresh);

        fs::write(&log, b"previous run\n")?;
        let start = prepare_log_file(&log, LogPolicy::default())?;
        assert_eq!(start, LogStart::Continued);
        assert!(start.needs_separator());
        Ok(())
    }

    #[test]
    fn oversized_log_is_shifted_into_backups() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let log = dir.path().join("wb.log");
        let policy = LogPolicy { max_bytes: 4, keep_backups: 2 };

        fs::write(&log, b"first")?;
        assert_eq!(prepare_log_file(&log, policy)?, LogStart::Rotated { backups: 1 });
        assert!(!log.exists());
        assert_eq!(fs::read(backup_path(&log, 1))?, b"first");

        fs::write(&log, b"second")?;
        assert_eq!(prepare_log_file(&log, policy)?, LogStart::Rotated { backups: 2 });

        fs::write(&log, b"third")?;
        let start = prepare_log_file(&log, policy)?;
        assert_eq!(start, LogStart::Rotated { backups: 2 });
        assert!(!start.needs_separator());
        assert_eq!(fs::read(backup_path(&log, 1))?, b"third");
        assert_eq!(fs::read(backup_path(&log, 2))?, b"second");
        assert!(!backup_path(&log, 3).exists());
        Ok(())
    }

    #[test]
    fn zero_backups_just_deletes() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let log = dir.path().join("wb.log");
        fs::write(&log, b"too big")?;

        let start = prepare_log_file(&log, LogPolicy { max_bytes: 1, keep_backups: 0 })?;
        assert_eq!(start, LogStart::Rotated { backups: 0 });
        assert!(!log.exists());
        assert!(!backup_path(&log, 1).exists());
        Ok(())
    }

    #[test]
    fn separator_appends_one_newline() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let log = dir.path().join("wb.log");
        fs::write(&log, b"run 1")?;

        write_separator(&log)?;
        assert_eq!(fs::read(&log)?, b"run 1\n");
        Ok(())
    }

    #[test]
    fn header_names_the_log_state() {
        assert!(run_header(Some(LogStart::Rotated { backups: 3 })).contains("log=rotated"));
        assert!(run_header(None).contains(&format!("pid={}", std::process::id())));
    }
}
