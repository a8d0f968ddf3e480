// Author: Dustin Pilgrim
// License: MIT

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use crate::config::{BarConfig, Edges, LayerSurfaceConfig, Margins, Rgba, Theme};

#[derive(Parser, Debug)]
#[command(
    name = "wb",
    about = "Wayland status bar: each line read from stdin replaces the bar content",
    long_about = "Wayland status bar: each line read from stdin replaces the bar content.\n\n\
                  Within a line, the unit separator (\\x1f) splits up to three segments\n\
                  drawn left, centered and right aligned.\n\n\
                  Example:\n  \
                  while :; do printf 'wb\\x1f%s\\x1f\\n' \"$(date +%T)\"; sleep 1; done | wb",
    version
)]
pub struct Cli {
    /// Bar height in logical pixels.
    #[arg(long, default_value_t = 24)]
    pub height: u32,

    /// Bar width in logical pixels (0 stretches across the output).
    #[arg(long, default_value_t = 0)]
    pub width: u32,

    /// Anchor the bar to the bottom edge instead of the top.
    #[arg(long, short = 'b')]
    pub bottom: bool,

    /// Layer-shell layer to place the bar on.
    #[arg(long, short = 'l', value_enum, default_value_t = LayerArg::Top)]
    pub layer: LayerArg,

    /// Margins as "top,right,bottom,left" (or a single value for all edges).
    #[arg(long, default_value = "0,0,0,0")]
    pub margins: String,

    /// Space reserved from other windows (defaults to the bar height, -1 ignores other panels).
    #[arg(long, allow_negative_numbers = true)]
    pub exclusive_zone: Option<i32>,

    /// Background colour (e.g. "#1d2021" or "#1d2021cc").
    #[arg(long, default_value = "#1d2021ff")]
    pub bg: String,

    /// Foreground (text) colour.
    #[arg(long, default_value = "#ebdbb2ff")]
    pub fg: String,

    /// Log to a file instead of the console.
    ///
    /// Without a value the log goes to $XDG_STATE_HOME/wb/wb.log.
    #[arg(long, num_args = 0..=1, default_missing_value = "", value_name = "PATH")]
    pub log_file: Option<String>,

    /// Enable debug logging.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LayerArg {
    Background,
    Bottom,
    Top,
    Overlay,
}

impl Cli {
    pub fn bar_config(&self) -> Result<BarConfig> {
        let vertical = if self.bottom { Edges::BOTTOM } else { Edges::TOP };
        let anchor = vertical | Edges::LEFT | Edges::RIGHT;

        let exclusive_zone = self
            .exclusive_zone
            .unwrap_or_else(|| i32::try_from(self.height).unwrap_or(i32::MAX));

        let surface = LayerSurfaceConfig {
            width: self.width,
            height: self.height,
            anchor,
            margins: Margins::parse(&self.margins)?,
            exclusive_zone,
            layer: self.layer.into(),
        };

        let theme = Theme {
            background: Rgba::parse(&self.bg).context("--bg")?,
            foreground: Rgba::parse(&self.fg).context("--fg")?,
        };

        Ok(BarConfig { surface, theme })
    }

    /// Resolved log file, if file logging was requested.
    pub fn log_path(&self) -> Result<Option<PathBuf>> {
        match &self.log_file {
            None => Ok(None),
            Some(p) if p.trim().is_empty() => Ok(Some(crate::path::paths()?.log_path)),
            Some(p) => Ok(Some(crate::path::expand_user_path(p)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayerTier;

    #[test]
    fn defaults_anchor_top_and_reserve_height() -> Result<()> {
        let cli = Cli::try_parse_from(["wb"])?;
        let cfg = cli.bar_config()?;

        assert_eq!(cfg.surface.height, 24);
        assert_eq!(cfg.surface.width, 0);
        assert_eq!(cfg.surface.exclusive_zone, 24);
        assert_eq!(cfg.surface.anchor, Edges::TOP | Edges::LEFT | Edges::RIGHT);
        assert_eq!(cfg.surface.layer, LayerTier::Top);
        assert_eq!(cfg.theme, Theme::default());
        assert!(cli.log_path()?.is_none());
        Ok(())
    }

    #[test]
    fn bottom_bar_with_overrides() -> Result<()> {
        let cli = Cli::try_parse_from([
            "wb",
            "--bottom",
            "--height",
            "30",
            "--layer",
            "overlay",
            "--margins",
            "4,8,0,8",
            "--exclusive-zone",
            "-1",
            "--fg",
            "#ffffff",
        ])?;
        let cfg = cli.bar_config()?;

        assert_eq!(cfg.surface.anchor, Edges::BOTTOM | Edges::LEFT | Edges::RIGHT);
        assert_eq!(cfg.surface.height, 30);
        assert_eq!(cfg.surface.exclusive_zone, -1);
        assert_eq!(cfg.surface.layer, LayerTier::Overlay);
        assert_eq!(cfg.surface.margins, Margins { top: 4, right: 8, bottom: 0, left: 8 });
        assert_eq!(cfg.theme.foreground, Rgba { r: 0xff, g: 0xff, b: 0xff, a: 0xff });
        Ok(())
    }

    #[test]
    fn explicit_log_file_is_kept() -> Result<()> {
        let cli = Cli::try_parse_from(["wb", "--log-file", "/tmp/wb-test.log"])?;
        assert_eq!(cli.log_path()?, Some(PathBuf::from("/tmp/wb-test.log")));
        Ok(())
    }

    #[test]
    fn bad_colour_is_rejected() -> Result<()> {
        let cli = Cli::try_parse_from(["wb", "--bg", "nope"])?;
        assert!(cli.bar_config().is_err());
        Ok(())
    }
}
