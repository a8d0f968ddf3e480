// Author: Dustin Pilgrim
// License: MIT

use std::fs::File;
use std::os::fd::{AsFd, BorrowedFd};
use std::path::{Path, PathBuf};

use eventline as el;
use memmap2::MmapMut;

use wayland_client::{
    protocol::{
        wl_buffer::WlBuffer,
        wl_shm::{self, WlShm},
    },
    QueueHandle,
};

use super::canvas::Canvas;
use super::display::WlState;
use super::monitor::MonitorId;
use super::DisplayError;

/// ARGB8888: one 32-bit word per pixel.
pub const BYTES_PER_PIXEL: u32 = 4;

/// Stride and byte size for a `width`x`height` ARGB8888 buffer.
///
/// wl_shm pool sizes are `i32`, so anything larger is refused up front.
pub fn buffer_layout(width: u32, height: u32) -> Result<(u32, usize), DisplayError> {
    if width == 0 || height == 0 {
        return Err(DisplayError::EmptyBuffer { width, height });
    }

    let too_large = || DisplayError::BufferTooLarge { width, height };
    let stride = width.checked_mul(BYTES_PER_PIXEL).ok_or_else(too_large)?;
    let size = (stride as u64) * (height as u64);
    if size > i32::MAX as u64 {
        return Err(too_large());
    }

    Ok((stride, size as usize))
}

/// Anonymous file mapped into our address space.
///
/// The descriptor is only needed until the compositor has it (pool creation);
/// after `release_fd` only the mapping keeps the memory alive.
pub struct ShmRegion {
    file: Option<File>,
    mmap: MmapMut,
}

impl ShmRegion {
    pub fn create_in(dir: &Path, size: usize) -> Result<ShmRegion, DisplayError> {
        let file = tempfile::tempfile_in(dir).map_err(DisplayError::Shm)?;
        file.set_len(size as u64).map_err(DisplayError::Shm)?;
        let mmap = unsafe { MmapMut::map_mut(&file).map_err(DisplayError::Shm)? };

        Ok(ShmRegion {
            file: Some(file),
            mmap,
        })
    }

    pub fn fd(&self) -> Option<BorrowedFd<'_>> {
        self.file.as_ref().map(|f| f.as_fd())
    }

    pub fn release_fd(&mut self) {
        self.file = None;
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.mmap[..]
    }
}

/// Protocol side of a buffer: turns a mapped region into a handle the compositor can read.
pub trait BufferBackend {
    type Handle: BufferHandle;

    fn create_buffer(
        &mut self,
        region: &ShmRegion,
        width: u32,
        height: u32,
        stride: u32,
    ) -> Result<Self::Handle, DisplayError>;

    /// Where the anonymous backing files are created.
    fn alloc_dir(&self) -> PathBuf {
        crate::path::shm_dir()
    }
}

pub trait BufferHandle {
    fn release(self);
}

impl BufferHandle for WlBuffer {
    fn release(self) {
        self.destroy();
    }
}

/// One output's pixel buffer: mapped memory plus its protocol handle.
///
/// Either fully allocated or fully empty; `destroy` returns it to empty.
pub struct PoolBuffer<H: BufferHandle> {
    handle: Option<H>,
    region: Option<ShmRegion>,
    width: u32,
    height: u32,
    size: usize,
}

impl<H: BufferHandle> Default for PoolBuffer<H> {
    fn default() -> Self {
        PoolBuffer {
            handle: None,
            region: None,
            width: 0,
            height: 0,
            size: 0,
        }
    }
}

impl<H: BufferHandle> PoolBuffer<H> {
    pub fn create<B>(backend: &mut B, width: u32, height: u32) -> Result<Self, DisplayError>
    where
        B: BufferBackend<Handle = H>,
    {
        let (stride, size) = buffer_layout(width, height)?;

        let mut region = ShmRegion::create_in(&backend.alloc_dir(), size)?;
        let handle = backend.create_buffer(&region, width, height, stride)?;
        region.release_fd();

        el::debug!(
            "wayland.buffer.created w={w} h={h} stride={stride} bytes={bytes}",
            w = width as i64,
            h = height as i64,
            stride = stride as i64,
            bytes = size as i64
        );

        Ok(PoolBuffer {
            handle: Some(handle),
            region: Some(region),
            width,
            height,
            size,
        })
    }

    /// Make sure the buffer is exactly `width`x`height`.
    ///
    /// Returns `true` when a new buffer was allocated; an unchanged size keeps the current handle.
    pub fn ensure<B>(&mut self, backend: &mut B, width: u32, height: u32) -> Result<bool, DisplayError>
    where
        B: BufferBackend<Handle = H>,
    {
        if !self.is_empty() && self.width == width && self.height == height {
            return Ok(false);
        }

        self.destroy();
        *self = PoolBuffer::create(backend, width, height)?;
        Ok(true)
    }

    /// Release the handle and the mapping. No-op on an empty buffer.
    pub fn destroy(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.release();
        }
        self.region = None;
        self.width = 0;
        self.height = 0;
        self.size = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.handle.is_none()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn handle(&self) -> Option<&H> {
        self.handle.as_ref()
    }

    pub fn canvas(&mut self) -> Option<Canvas<'_>> {
        let (width, height) = (self.width, self.height);
        let region = self.region.as_mut()?;
        Canvas::new(region.bytes_mut(), width, height, width * BYTES_PER_PIXEL)
    }
}

impl<H: BufferHandle> Drop for PoolBuffer<H> {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// `wl_shm` backed buffers; the pool is destroyed right away, the buffer keeps the memory.
pub(crate) struct WlShmBackend<'a> {
    pub(crate) shm: &'a WlShm,
    pub(crate) qh: &'a QueueHandle<WlState>,
    pub(crate) owner: MonitorId,
}

impl BufferBackend for WlShmBackend<'_> {
    type Handle = WlBuffer;

    fn create_buffer(
        &mut self,
        region: &ShmRegion,
        width: u32,
        height: u32,
        stride: u32,
    ) -> Result<WlBuffer, DisplayError> {
        let fd = region.fd().ok_or_else(|| {
            DisplayError::Shm(std::io::Error::other("shm descriptor already released"))
        })?;

        let pool = self.shm.create_pool(fd, region.len() as i32, self.qh, ());
        let buffer = pool.create_buffer(
            0,
            width as i32,
            height as i32,
            stride as i32,
            wl_shm::Format::Argb8888,
            self.qh,
            self.owner,
        );
        pool.destroy();

        Ok(buffer)
    }
}
