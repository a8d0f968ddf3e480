// Author: Dustin Pilgrim
// License: MIT

use anyhow::{bail, Result};
use eventline as el;

use wayland_protocols_wlr::layer_shell::v1::client::{
    zwlr_layer_shell_v1::Layer,
    zwlr_layer_surface_v1::Anchor,
};

/// Edge bitmask, values match `zwlr_layer_surface_v1.anchor`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Edges(u32);

impl Edges {
    pub const TOP: Edges = Edges(1);
    pub const BOTTOM: Edges = Edges(2);
    pub const LEFT: Edges = Edges(4);
    pub const RIGHT: Edges = Edges(8);

    pub fn contains(self, other: Edges) -> bool {
        self.0 & other.0 == other.0
    }

    pub(crate) fn to_anchor(self) -> Anchor {
        Anchor::from_bits_truncate(self.0)
    }
}

impl std::ops::BitOr for Edges {
    type Output = Edges;

    fn bitor(self, rhs: Edges) -> Edges {
        Edges(self.0 | rhs.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Margins {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl Margins {
    /// Parse "top,right,bottom,left" (CSS order). A single value applies to all four.
    pub fn parse(s: &str) -> Result<Margins> {
        let parts: Vec<i32> = s
            .split(',')
            .map(|p| p.trim().parse::<i32>())
            .collect::<Result<_, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid margins '{s}': {e}"))?;

        match parts.as_slice() {
            [all] => Ok(Margins {
                top: *all,
                right: *all,
                bottom: *all,
                left: *all,
            }),
            [top, right, bottom, left] => Ok(Margins {
                top: *top,
                right: *right,
                bottom: *bottom,
                left: *left,
            }),
            _ => bail!("Invalid margins '{s}': expected 1 or 4 comma-separated values"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerTier {
    Background,
    Bottom,
    Top,
    Overlay,
}

impl LayerTier {
    pub(crate) fn to_layer(self) -> Layer {
        match self {
            LayerTier::Background => Layer::Background,
            LayerTier::Bottom => Layer::Bottom,
            LayerTier::Top => Layer::Top,
            LayerTier::Overlay => Layer::Overlay,
        }
    }
}

impl From<crate::cli::LayerArg> for LayerTier {
    fn from(l: crate::cli::LayerArg) -> Self {
        match l {
            crate::cli::LayerArg::Background => LayerTier::Background,
            crate::cli::LayerArg::Bottom => LayerTier::Bottom,
            crate::cli::LayerArg::Top => LayerTier::Top,
            crate::cli::LayerArg::Overlay => LayerTier::Overlay,
        }
    }
}

/// Layer surface parameters shared by every output's panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerSurfaceConfig {
    pub width: u32,
    pub height: u32,
    pub anchor: Edges,
    pub margins: Margins,
    pub exclusive_zone: i32,
    pub layer: LayerTier,
}

impl Default for LayerSurfaceConfig {
    fn default() -> Self {
        LayerSurfaceConfig {
            width: 0,
            height: 24,
            anchor: Edges::TOP | Edges::LEFT | Edges::RIGHT,
            margins: Margins::default(),
            exclusive_zone: 24,
            layer: LayerTier::Top,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    /// Parse colour from hex string (with or without # prefix).
    /// Examples: "#FF5733", "FF5733CC"
    pub fn parse(s: &str) -> Result<Rgba> {
        let s = s.trim();
        let hex = s.strip_prefix('#').unwrap_or(s);

        if !hex.is_ascii() || (hex.len() != 6 && hex.len() != 8) {
            bail!("Invalid colour '{s}': expected #RRGGBB or #RRGGBBAA");
        }

        let r = u8::from_str_radix(&hex[0..2], 16)?;
        let g = u8::from_str_radix(&hex[2..4], 16)?;
        let b = u8::from_str_radix(&hex[4..6], 16)?;
        let a = if hex.len() == 8 {
            u8::from_str_radix(&hex[6..8], 16)?
        } else {
            0xFF
        };

        el::debug!(
            "wb.config.colour input={input} rgba={r},{g},{b},{a}",
            input = s,
            r = r as i64,
            g = g as i64,
            b = b as i64,
            a = a as i64
        );

        Ok(Rgba { r, g, b, a })
    }

    /// Premultiplied ARGB8888 pixel value.
    #[inline]
    pub fn argb8888(self) -> u32 {
        let a = self.a as u32;
        let pm = |c: u8| (c as u32 * a + 127) / 255;
        (a << 24) | (pm(self.r) << 16) | (pm(self.g) << 8) | pm(self.b)
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Theme {
    pub background: Rgba,
    pub foreground: Rgba,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            background: Rgba { r: 0x1d, g: 0x20, b: 0x21, a: 0xff },
            foreground: Rgba { r: 0xeb, g: 0xdb, b: 0xb2, a: 0xff },
        }
    }
}

/// Everything the bar needs after command line parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct BarConfig {
    pub surface: LayerSurfaceConfig,
    pub theme: Theme,
}
