// Author: Dustin Pilgrim
// License: MIT

use crate::config::{Rgba, Theme};
use crate::wayland::{Canvas, Painter, RenderContext};

use super::glyphs::{self, ADVANCE, GLYPH_HEIGHT};
use super::input::Content;

/// Draws the background and the three status segments.
pub struct StatusPainter {
    theme: Theme,
    content: Content,
}

impl StatusPainter {
    pub fn new(theme: Theme) -> StatusPainter {
        StatusPainter {
            theme,
            content: Content::default(),
        }
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn set_content(&mut self, content: Content) {
        self.content = content;
    }
}

/// Pixels per font unit for a bar `height` pixels tall.
pub fn glyph_unit(height: u32) -> u32 {
    (height / 12).max(1)
}

fn draw_text(canvas: &mut Canvas<'_>, text: &str, x: i32, y: i32, unit: u32, colour: Rgba) {
    let mut pen = x;
    for c in text.chars() {
        for (col, bits) in glyphs::glyph(c).iter().enumerate() {
            for row in 0..GLYPH_HEIGHT {
                if bits & (1 << row) != 0 {
                    canvas.fill_rect(
                        pen + (col as u32 * unit) as i32,
                        y + (row * unit) as i32,
                        unit,
                        unit,
                        colour,
                    );
                }
            }
        }
        pen += (ADVANCE * unit) as i32;
    }
}

impl Painter for StatusPainter {
    fn draw(&mut self, ctx: &mut RenderContext<'_>) {
        ctx.canvas.fill(self.theme.background);

        let unit = glyph_unit(ctx.height);
        let pad = (2 * unit) as i32;
        let width = ctx.width as i32;
        let y = (ctx.height as i32 - (GLYPH_HEIGHT * unit) as i32) / 2;

        let [left, center, right] = self.content.segments();
        let w = |s: &str| (glyphs::text_width(s) * unit) as i32;

        draw_text(&mut ctx.canvas, left, pad, y, unit, self.theme.foreground);
        draw_text(&mut ctx.canvas, center, (width - w(center)) / 2, y, unit, self.theme.foreground);
        draw_text(&mut ctx.canvas, right, width - pad - w(right), y, unit, self.theme.foreground);
    }
}
