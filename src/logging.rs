// Author: Dustin Pilgrim
// License: MIT

use anyhow::{Context, Result};
use std::path::Path;

use crate::logrotate::{self, LogPolicy};

/// Initialize eventline once, before the Wayland connection exists.
///
/// Console output by default; with `log_path` everything goes to a rotated file instead.
pub fn init_eventline(log_path: Option<&Path>, verbose: bool) -> Result<()> {
    // Rotate/prepare the log file *before* eventline opens it.
    let start = match log_path {
        Some(p) => Some(
            logrotate::prepare_log_file(p, LogPolicy::default())
                .with_context(|| format!("prepare_log_file: {}", p.display()))?,
        ),
        None => None,
    };

    if let (Some(p), Some(s)) = (log_path, start) {
        if s.needs_separator() {
            logrotate::write_separator(p)
                .with_context(|| format!("write separator: {}", p.display()))?;
        }
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime for eventline init")?;

    rt.block_on(async {
        eventline::runtime::init().await;
    });

    match log_path {
        Some(p) => {
            eventline::runtime::enable_console_output(false);
            eventline::runtime::enable_file_output(p)
                .with_context(|| format!("enable eventline file output: {}", p.display()))?;
        }
        None => {
            eventline::runtime::enable_console_output(true);
            eventline::runtime::enable_console_color(true);
            eventline::runtime::enable_console_timestamp(true);
        }
    }
    eventline::runtime::enable_console_duration(false);

    eventline::runtime::set_log_level(if verbose {
        eventline::runtime::LogLevel::Debug
    } else {
        eventline::runtime::LogLevel::Info
    });

    eventline::info!("{}", logrotate::run_header(start));
    Ok(())
}
