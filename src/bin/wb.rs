// Author: Dustin Pilgrim
// License: MIT

use anyhow::{Context, Result};
use clap::Parser;

use wb::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = cli.log_path().context("resolve log path")?;
    wb::logging::init_eventline(log_path.as_deref(), cli.verbose)?;

    let config = cli.bar_config()?;
    eventline::info!(
        "startup height={} width={} layer={:?} zone={} bg={} fg={}",
        config.surface.height,
        config.surface.width,
        config.surface.layer,
        config.surface.exclusive_zone,
        config.theme.background.to_hex(),
        config.theme.foreground.to_hex(),
    );

    if let Err(e) = wb::bar::run(config) {
        eventline::error!("fatal err={:#}", e);
        return Err(e);
    }
    Ok(())
}
