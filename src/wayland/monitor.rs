// Author: Dustin Pilgrim
// License: MIT

use eventline as el;

use wayland_client::{
    protocol::{wl_buffer::WlBuffer, wl_output::WlOutput},
    Proxy,
};

use super::canvas::{Painter, RenderContext};
use super::shm::{BufferBackend, BufferHandle, PoolBuffer};
use super::surface::{LayerHandles, Phase, SurfaceController};
use super::DisplayError;

/// Index of a monitor in the connection's monitor list; stable for the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MonitorId(pub(crate) usize);

impl MonitorId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Logical size times the output scale (scales below 1 count as 1).
pub fn physical_size(width: u32, height: u32, scale: i32) -> (u32, u32) {
    let s = scale.max(1) as u32;
    (width.saturating_mul(s), height.saturating_mul(s))
}

/// Bring `buffer` to the surface's physical size and let `painter` draw into it.
///
/// Returns the physical size drawn, or `None` when the surface is not ready to show anything.
pub(crate) fn paint_into<B, H>(
    surface: &SurfaceController,
    scale: i32,
    buffer: &mut PoolBuffer<H>,
    backend: &mut B,
    painter: &mut dyn Painter,
) -> Result<Option<(u32, u32)>, DisplayError>
where
    B: BufferBackend<Handle = H>,
    H: BufferHandle,
{
    let (lw, lh) = surface.logical_size();
    if !surface.is_ready() || lw == 0 || lh == 0 {
        return Ok(None);
    }

    let (width, height) = physical_size(lw, lh, scale);
    buffer.ensure(backend, width, height)?;

    let Some(canvas) = buffer.canvas() else {
        return Ok(None);
    };
    let mut ctx = RenderContext {
        width,
        height,
        scale: scale.max(1),
        canvas,
    };
    painter.draw(&mut ctx);

    Ok(Some((width, height)))
}

/// One physical display and the panel shown on it.
pub struct OutputMonitor {
    id: MonitorId,
    global_name: u32,
    output: WlOutput,
    name: Option<String>,
    scale: i32,
    surface: SurfaceController,
    buffer: PoolBuffer<WlBuffer>,
    buffer_busy: bool,
    redraw: bool,
    released: bool,
}

impl OutputMonitor {
    pub(crate) fn new(id: MonitorId, global_name: u32, output: WlOutput) -> OutputMonitor {
        OutputMonitor {
            id,
            global_name,
            output,
            name: None,
            scale: 1,
            surface: SurfaceController::default(),
            buffer: PoolBuffer::default(),
            buffer_busy: false,
            redraw: false,
            released: false,
        }
    }

    pub fn id(&self) -> MonitorId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("(unknown)")
    }

    pub fn scale(&self) -> i32 {
        self.scale
    }

    pub fn phase(&self) -> Phase {
        self.surface.phase()
    }

    pub fn logical_size(&self) -> (u32, u32) {
        self.surface.logical_size()
    }

    /// Current buffer dimensions, (0, 0) when no buffer is allocated.
    pub fn buffer_size(&self) -> (u32, u32) {
        (self.buffer.width(), self.buffer.height())
    }

    pub(crate) fn global_name(&self) -> u32 {
        self.global_name
    }

    /// The output proxy is gone; nothing of this monitor is left on the wire.
    pub(crate) fn is_released(&self) -> bool {
        self.released
    }

    #[cfg(test)]
    pub(crate) fn output(&self) -> &WlOutput {
        &self.output
    }

    pub(crate) fn wants_redraw(&self) -> bool {
        self.redraw && self.surface.is_ready()
    }

    pub(crate) fn request_redraw(&mut self) {
        self.redraw = true;
    }

    /// Store the scale; on the first one, `realize` creates the panel surface.
    pub(crate) fn on_scale(
        &mut self,
        factor: i32,
        realize: impl FnOnce(&WlOutput) -> LayerHandles,
    ) {
        self.scale = factor;

        if self.surface.on_scale() {
            self.surface.attach(realize(&self.output));
            el::info!(
                "wayland.surface.realized idx={idx} name={name} scale={scale}",
                idx = self.id.0 as i64,
                name = self.name(),
                scale = factor as i64
            );
        }
    }

    pub(crate) fn on_name(&mut self, name: String) {
        let was = self.name.is_some();
        self.name = Some(name);
        if !was {
            el::info!(
                "wayland.output.name idx={idx} name={name}",
                idx = self.id.0 as i64,
                name = self.name()
            );
        }
    }

    pub(crate) fn on_configure(&mut self, serial: u32, width: u32, height: u32) {
        let Some(c) = self.surface.on_configure(serial, width, height) else {
            el::debug!(
                "wayland.surface.configure ignored name={} phase={:?}",
                self.name(),
                self.surface.phase()
            );
            return;
        };

        self.surface.acknowledge(c.ack);

        el::info!(
            "wayland.surface.configure name={name} w={w} h={h} serial={serial}",
            name = self.name(),
            w = width as i64,
            h = height as i64,
            serial = serial as i64
        );

        if c.resized {
            self.redraw = true;
        }
    }

    pub(crate) fn on_closed(&mut self) {
        el::warn!("wayland.surface.closed name={name}", name = self.name());
        self.surface.close();
        self.buffer.destroy();
        self.buffer_busy = false;
        self.redraw = false;
    }

    pub(crate) fn on_buffer_released(&mut self) {
        self.buffer_busy = false;
    }

    /// Release everything this monitor created, output included.
    pub(crate) fn teardown(&mut self) {
        self.surface.close();
        self.buffer.destroy();
        self.buffer_busy = false;
        self.redraw = false;
        if !self.released && self.output.version() >= 3 {
            self.output.release();
        }
        self.released = true;
    }

    /// Draw a frame with `painter` and commit it. Returns `false` when the monitor was not ready.
    pub(crate) fn render<B>(&mut self, backend: &mut B, painter: &mut dyn Painter) -> Result<bool, DisplayError>
    where
        B: BufferBackend<Handle = WlBuffer>,
    {
        self.redraw = false;

        let (bw, bh) = self.buffer_size();
        if self.buffer_busy {
            el::debug!(
                "wayland.render buffer_still_held name={name}",
                name = self.name()
            );
        }

        let Some((width, height)) =
            paint_into(&self.surface, self.scale, &mut self.buffer, backend, painter)?
        else {
            return Ok(false);
        };

        if (bw, bh) != (width, height) {
            self.buffer_busy = false;
            el::info!(
                "wayland.buffer.resized name={name} w={w} h={h} scale={scale}",
                name = self.name(),
                w = width as i64,
                h = height as i64,
                scale = self.scale as i64
            );
        }

        let (Some(surface), Some(buffer)) = (self.surface.surface(), self.buffer.handle()) else {
            return Ok(false);
        };

        let (lw, lh) = self.surface.logical_size();
        surface.set_buffer_scale(self.scale.max(1));
        surface.attach(Some(buffer), 0, 0);
        surface.damage(0, 0, lw as i32, lh as i32);
        surface.commit();
        self.buffer_busy = true;

        Ok(true)
    }
}
