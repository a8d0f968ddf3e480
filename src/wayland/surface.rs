// Author: Dustin Pilgrim
// License: MIT

use wayland_client::{
    protocol::{wl_compositor::WlCompositor, wl_output::WlOutput, wl_surface::WlSurface},
    QueueHandle,
};

use wayland_protocols_wlr::layer_shell::v1::client::{
    zwlr_layer_shell_v1::ZwlrLayerShellV1,
    zwlr_layer_surface_v1::{KeyboardInteractivity, ZwlrLayerSurfaceV1},
};

use crate::config::LayerSurfaceConfig;

use super::display::WlState;
use super::monitor::MonitorId;

pub const NAMESPACE: &str = "wb";

/// Lifecycle of an output's panel surface.
///
/// `Unbound -> Pending` on the first scale event, `Pending -> Ready` on the first
/// configure, `Closed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Unbound,
    Pending,
    Ready,
    Closed,
}

pub(crate) struct LayerHandles {
    pub(crate) surface: WlSurface,
    pub(crate) layer: ZwlrLayerSurfaceV1,
}

/// A configure that still has to be acknowledged with its own serial.
#[must_use = "every configure must be acknowledged"]
#[derive(Debug, PartialEq, Eq)]
pub struct PendingAck {
    serial: u32,
}

impl PendingAck {
    pub fn serial(&self) -> u32 {
        self.serial
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Configured {
    pub ack: PendingAck,
    /// Logical size differs from the previous configure.
    pub resized: bool,
}

pub struct SurfaceController {
    phase: Phase,
    handles: Option<LayerHandles>,
    width: u32,
    height: u32,
}

impl Default for SurfaceController {
    fn default() -> Self {
        SurfaceController {
            phase: Phase::Unbound,
            handles: None,
            width: 0,
            height: 0,
        }
    }
}

impl SurfaceController {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Last acknowledged logical size.
    pub fn logical_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready
    }

    /// Returns `true` exactly once: when the caller has to realize the surface.
    pub fn on_scale(&mut self) -> bool {
        if self.phase != Phase::Unbound {
            return false;
        }
        self.phase = Phase::Pending;
        true
    }

    pub(crate) fn attach(&mut self, handles: LayerHandles) {
        self.handles = Some(handles);
    }

    pub fn on_configure(&mut self, serial: u32, width: u32, height: u32) -> Option<Configured> {
        match self.phase {
            Phase::Unbound | Phase::Closed => None,
            Phase::Pending | Phase::Ready => {
                let resized = (self.width, self.height) != (width, height);
                self.width = width;
                self.height = height;
                self.phase = Phase::Ready;
                Some(Configured {
                    ack: PendingAck { serial },
                    resized,
                })
            }
        }
    }

    pub(crate) fn acknowledge(&self, ack: PendingAck) {
        if let Some(h) = &self.handles {
            h.layer.ack_configure(ack.serial);
        }
    }

    /// Destroy the protocol objects and stay closed for good.
    pub fn close(&mut self) {
        if let Some(h) = self.handles.take() {
            h.layer.destroy();
            h.surface.destroy();
        }
        self.phase = Phase::Closed;
    }

    pub(crate) fn surface(&self) -> Option<&WlSurface> {
        self.handles.as_ref().map(|h| &h.surface)
    }
}

/// Create the panel's surface and layer surface on `output` and do the initial commit.
pub(crate) fn realize(
    compositor: &WlCompositor,
    layer_shell: &ZwlrLayerShellV1,
    output: &WlOutput,
    config: &LayerSurfaceConfig,
    qh: &QueueHandle<WlState>,
    owner: MonitorId,
) -> LayerHandles {
    let surface = compositor.create_surface(qh, ());

    let layer = layer_shell.get_layer_surface(
        &surface,
        Some(output),
        config.layer.to_layer(),
        NAMESPACE.into(),
        qh,
        owner,
    );

    layer.set_size(config.width, config.height);
    layer.set_anchor(config.anchor.to_anchor());
    layer.set_margin(
        config.margins.top,
        config.margins.right,
        config.margins.bottom,
        config.margins.left,
    );
    layer.set_exclusive_zone(config.exclusive_zone);
    layer.set_keyboard_interactivity(KeyboardInteractivity::None);

    surface.commit();
    LayerHandles { surface, layer }
}
