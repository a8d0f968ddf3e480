// Author: Dustin Pilgrim
// License: MIT

pub mod canvas;
pub mod display;
pub mod monitor;
pub mod registry;
pub mod shm;
pub mod surface;

pub use canvas::{Canvas, Painter, RenderContext};
pub use display::{DisplayConnection, ScaleCallback, ScaleResponse};
pub use monitor::{MonitorId, OutputMonitor};
pub use surface::Phase;

use wayland_client::{
    backend::WaylandError,
    globals::GlobalError,
    ConnectError, DispatchError,
};

#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("could not connect to the wayland display")]
    Connect(#[from] ConnectError),

    #[error("registry initialisation failed")]
    Registry(#[from] GlobalError),

    #[error("compositor does not advertise {0} (need a layer-shell capable compositor)")]
    MissingGlobal(&'static str),

    #[error("{interface} v{version} is too old (need at least v{required})")]
    UnsupportedVersion {
        interface: &'static str,
        version: u32,
        required: u32,
    },

    #[error("compositor advertises no wl_output")]
    NoOutputs,

    #[error("wayland dispatch failed")]
    Dispatch(#[from] DispatchError),

    #[error("wayland connection error")]
    Wayland(#[from] WaylandError),

    #[error("shared memory allocation failed")]
    Shm(#[source] std::io::Error),

    #[error("buffer {width}x{height} is empty")]
    EmptyBuffer { width: u32, height: u32 },

    #[error("buffer {width}x{height} exceeds the shm pool size limit")]
    BufferTooLarge { width: u32, height: u32 },
}
