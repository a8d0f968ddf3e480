// Author: Dustin Pilgrim
// License: MIT

use crate::config::Rgba;

/// Drawable view over a mapped ARGB8888 buffer (premultiplied, little endian).
pub struct Canvas<'a> {
    bytes: &'a mut [u8],
    width: u32,
    height: u32,
    stride: u32,
}

impl<'a> Canvas<'a> {
    /// `None` when `bytes` cannot hold `height` rows of `stride` bytes.
    pub fn new(bytes: &'a mut [u8], width: u32, height: u32, stride: u32) -> Option<Canvas<'a>> {
        let needed = (stride as usize).checked_mul(height as usize)?;
        if bytes.len() < needed || (stride as usize) < width as usize * 4 {
            return None;
        }
        Some(Canvas {
            bytes,
            width,
            height,
            stride,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Overwrite every pixel (no blending).
    pub fn fill(&mut self, colour: Rgba) {
        let px = colour.argb8888().to_le_bytes();
        let row_bytes = self.width as usize * 4;
        for row in self.bytes.chunks_exact_mut(self.stride as usize).take(self.height as usize) {
            for dst in row[..row_bytes].chunks_exact_mut(4) {
                dst.copy_from_slice(&px);
            }
        }
    }

    /// Paint a rectangle clipped to the canvas, compositing `colour` over what is there.
    pub fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, colour: Rgba) {
        let x0 = x.max(0) as i64;
        let y0 = y.max(0) as i64;
        let x1 = (x as i64 + w as i64).min(self.width as i64);
        let y1 = (y as i64 + h as i64).min(self.height as i64);
        if x1 <= x0 || y1 <= y0 {
            return;
        }

        let src = colour.argb8888();
        for py in y0..y1 {
            let row = py as usize * self.stride as usize;
            for px in x0..x1 {
                let off = row + px as usize * 4;
                let dst = &mut self.bytes[off..off + 4];
                let under = u32::from_le_bytes([dst[0], dst[1], dst[2], dst[3]]);
                dst.copy_from_slice(&over(src, under).to_le_bytes());
            }
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let off = y as usize * self.stride as usize + x as usize * 4;
        let b = &self.bytes[off..off + 4];
        Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Premultiplied source-over.
#[inline]
fn over(src: u32, dst: u32) -> u32 {
    let sa = src >> 24;
    if sa == 0xFF {
        return src;
    }
    if sa == 0 {
        return dst;
    }

    let inv = 255 - sa;
    let channel = |shift: u32| {
        let s = (src >> shift) & 0xFF;
        let d = (dst >> shift) & 0xFF;
        (s + (d * inv + 127) / 255).min(255) << shift
    };
    channel(24) | channel(16) | channel(8) | channel(0)
}

/// Handed to the painter for the duration of one render.
pub struct RenderContext<'a> {
    /// Physical pixels.
    pub width: u32,
    pub height: u32,
    pub scale: i32,
    pub canvas: Canvas<'a>,
}

/// Content side of a render: mutates the canvas in place.
pub trait Painter {
    fn draw(&mut self, ctx: &mut RenderContext<'_>);
}

impl<F> Painter for F
where
    F: FnMut(&mut RenderContext<'_>),
{
    fn draw(&mut self, ctx: &mut RenderContext<'_>) {
        self(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba = Rgba { r: 0xff, g: 0, b: 0, a: 0xff };
    const BLUE: Rgba = Rgba { r: 0, g: 0, b: 0xff, a: 0xff };

    #[test]
    fn rejects_short_backing_memory() {
        let mut bytes = vec![0u8; 15];
        assert!(Canvas::new(&mut bytes, 2, 2, 8).is_none());

        let mut bytes = vec![0u8; 16];
        assert!(Canvas::new(&mut bytes, 2, 2, 4).is_none(), "stride narrower than a row");
        assert!(Canvas::new(&mut bytes, 2, 2, 8).is_some());
    }

    #[test]
    fn fill_then_clipped_rect() {
        let mut bytes = vec![0u8; 4 * 4 * 4];
        let mut c = Canvas::new(&mut bytes, 4, 4, 16).expect("canvas");

        c.fill(RED);
        c.fill_rect(-1, 2, 2, 5, BLUE);

        assert_eq!(c.pixel(0, 0), Some(0xffff0000));
        assert_eq!(c.pixel(0, 2), Some(0xff0000ff));
        assert_eq!(c.pixel(0, 3), Some(0xff0000ff));
        assert_eq!(c.pixel(1, 2), Some(0xffff0000));
        assert_eq!(c.pixel(4, 0), None);

        // little endian ARGB: B, G, R, A in memory
        assert_eq!(&bytes[0..4], &[0x00, 0x00, 0xff, 0xff]);
    }

    #[test]
    fn translucent_rect_composites() {
        let mut bytes = vec![0u8; 4];
        let mut c = Canvas::new(&mut bytes, 1, 1, 4).expect("canvas");
        c.fill(Rgba { r: 0, g: 0, b: 0, a: 0xff });

        c.fill_rect(0, 0, 1, 1, Rgba { r: 0xff, g: 0xff, b: 0xff, a: 0x80 });
        assert_eq!(c.pixel(0, 0), Some(0xff808080));
    }

    #[test]
    fn closures_are_painters() {
        let mut calls = 0;
        let mut painter = |ctx: &mut RenderContext<'_>| {
            calls += 1;
            ctx.canvas.fill(BLUE);
        };

        let mut bytes = vec![0u8; 8];
        let canvas = Canvas::new(&mut bytes, 2, 1, 8).expect("canvas");
        let mut ctx = RenderContext { width: 2, height: 1, scale: 1, canvas };
        painter.draw(&mut ctx);

        assert_eq!(ctx.canvas.pixel(1, 0), Some(0xff0000ff));
        drop(ctx);
        assert_eq!(calls, 1);
    }
}
