// Author: Dustin Pilgrim
// License: MIT

pub mod glyphs;
pub mod input;
pub mod paint;

pub use input::{Content, LineBuffer};
pub use paint::StatusPainter;

use std::io;
use std::os::fd::AsRawFd;

use anyhow::{Context, Result};
use eventline as el;
use wayland_client::backend::WaylandError;

use crate::config::{BarConfig, Theme};
use crate::wayland::{DisplayConnection, DisplayError, OutputMonitor, Painter, ScaleResponse};

/// Largest stdin read per wakeup.
pub const READ_CHUNK: usize = 4096;

/// Something that can put a frame on every ready output right now.
pub trait FrameScheduler {
    fn schedule_frame(&mut self, painter: &mut dyn Painter) -> Result<usize, DisplayError>;
}

impl FrameScheduler for DisplayConnection {
    fn schedule_frame(&mut self, painter: &mut dyn Painter) -> Result<usize, DisplayError> {
        DisplayConnection::schedule_frame(self, painter)
    }
}

/// Stdin side of the bar: line assembly plus the painter showing the latest line.
pub struct Status {
    lines: LineBuffer,
    painter: StatusPainter,
}

impl Status {
    pub fn new(theme: Theme) -> Status {
        Status {
            lines: LineBuffer::default(),
            painter: StatusPainter::new(theme),
        }
    }

    pub fn painter_mut(&mut self) -> &mut StatusPainter {
        &mut self.painter
    }

    pub fn content(&self) -> &Content {
        self.painter.content()
    }

    /// Feed one stdin read. A completed line replaces the content and schedules one frame.
    pub fn on_input<S>(&mut self, bytes: &[u8], sched: &mut S) -> Result<bool, DisplayError>
    where
        S: FrameScheduler + ?Sized,
    {
        let Some(line) = self.lines.push(bytes) else {
            return Ok(false);
        };

        self.painter.set_content(Content::new(&line));
        el::debug!("bar.input content={:?}", self.painter.content().as_str());

        sched.schedule_frame(&mut self.painter)?;
        Ok(true)
    }
}

fn on_scale(monitor: &OutputMonitor, scale: i32) -> ScaleResponse {
    el::info!(
        "bar.scale name={name} scale={scale} phase={phase}",
        name = monitor.name(),
        scale = scale as i64,
        phase = format!("{:?}", monitor.phase())
    );
    ScaleResponse::Redraw
}

pub fn run(config: BarConfig) -> Result<()> {
    eventline::scope!(
        "wb.bar",
        success = "exiting",
        failure = "crashed",
        aborted = "aborted",
        {
            let mut display: DisplayConnection = eventline::scope!(
                "wb.display.create",
                success = "ready",
                failure = "failed",
                aborted = "aborted",
                {
                    let d = DisplayConnection::create(config.surface, Box::new(on_scale))
                        .context("connect to compositor")?;
                    Ok::<DisplayConnection, anyhow::Error>(d)
                }
            )?;

            for m in display.monitors() {
                let (w, h) = m.logical_size();
                eventline::info!(
                    "output idx={} name={} scale={} phase={:?} size={}x{}",
                    m.id().index(),
                    m.name(),
                    m.scale(),
                    m.phase(),
                    w,
                    h
                );
            }

            let mut status = Status::new(config.theme);

            // Background before the first status line arrives.
            let res = display
                .schedule_frame(status.painter_mut())
                .context("initial frame")
                .and_then(|_| event_loop(&mut display, &mut status));

            display.destroy();
            res?;

            Ok::<(), anyhow::Error>(())
        }
    )
}

fn event_loop(display: &mut DisplayConnection, status: &mut Status) -> Result<()> {
    let mut buf = [0u8; READ_CHUNK];
    let mut stdin_open = true;

    loop {
        let Some(guard) = display.prepare_read()? else {
            display.dispatch(status.painter_mut())?;
            continue;
        };

        let mut fds = [
            libc::pollfd {
                fd: guard.connection_fd().as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
            libc::pollfd {
                // negative descriptors are skipped by poll(2)
                fd: if stdin_open { libc::STDIN_FILENO } else { -1 },
                events: libc::POLLIN,
                revents: 0,
            },
        ];

        let ret = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err).context("poll");
        }

        if fds[0].revents != 0 {
            match guard.read() {
                Ok(_) => {}
                Err(WaylandError::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e).context("read wayland events"),
            }
        } else {
            drop(guard);
        }

        display.dispatch(status.painter_mut())?;

        if stdin_open && fds[1].revents != 0 {
            stdin_open = read_stdin(&mut buf, display, status)?;
        }
    }
}

/// Returns `false` once stdin is finished.
fn read_stdin(buf: &mut [u8], display: &mut DisplayConnection, status: &mut Status) -> Result<bool> {
    let n = unsafe {
        libc::read(
            libc::STDIN_FILENO,
            buf.as_mut_ptr() as *mut libc::c_void,
            buf.len(),
        )
    };

    if n < 0 {
        let err = io::Error::last_os_error();
        return match err.kind() {
            io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => Ok(true),
            _ => Err(err).context("read stdin"),
        };
    }
    if n == 0 {
        el::info!(
            "bar.input eof; keeping last content pending={pending}",
            pending = status.lines.pending() as i64
        );
        return Ok(false);
    }

    status.on_input(&buf[..n as usize], display)?;
    Ok(true)
}
