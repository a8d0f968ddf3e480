// Author: Dustin Pilgrim
// License: MIT

use eventline as el;

use wayland_client::{
    globals::{registry_queue_init, GlobalListContents},
    protocol::{
        wl_buffer::{self, WlBuffer},
        wl_compositor::WlCompositor,
        wl_output::{self, WlOutput},
        wl_registry::{self, WlRegistry},
        wl_shm::WlShm,
        wl_shm_pool::WlShmPool,
        wl_surface::WlSurface,
    },
    Connection, Dispatch, EventQueue, Proxy, QueueHandle,
};

use wayland_protocols_wlr::layer_shell::v1::client::{
    zwlr_layer_shell_v1::ZwlrLayerShellV1,
    zwlr_layer_surface_v1::{self, ZwlrLayerSurfaceV1},
};

use crate::config::LayerSurfaceConfig;

use super::canvas::Painter;
use super::monitor::{MonitorId, OutputMonitor};
use super::registry::{self, Advertised, Bind};
use super::shm::WlShmBackend;
use super::surface::{self, Phase};
use super::DisplayError;

pub use wayland_client::backend::ReadEventsGuard;

/// Round-trips allowed for freshly realized surfaces to get their first configure.
const MAX_SETTLE_ROUNDTRIPS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleResponse {
    Redraw,
    Ignore,
}

/// Called for every `wl_output.scale` event, once the monitor's handshake has settled.
pub type ScaleCallback = Box<dyn FnMut(&OutputMonitor, i32) -> ScaleResponse>;

/// Everything the protocol handlers touch.
pub struct WlState {
    config: LayerSurfaceConfig,
    compositor: WlCompositor,
    shm: WlShm,
    layer_shell: ZwlrLayerShellV1,
    monitors: Vec<OutputMonitor>,
    scale_events: Vec<(MonitorId, i32)>,
}

impl WlState {
    /// Bind a `wl_output`. A slot whose output was released is reused, so the
    /// collection never holds more than the peak number of connected outputs.
    fn add_output(&mut self, registry: &WlRegistry, bind: Bind, qh: &QueueHandle<WlState>) -> MonitorId {
        let free = self.monitors.iter().position(OutputMonitor::is_released);
        let id = MonitorId(free.unwrap_or(self.monitors.len()));
        let output: WlOutput = registry.bind(bind.name, bind.version, qh, id);
        let monitor = OutputMonitor::new(id, bind.name, output);

        match free {
            Some(i) => self.monitors[i] = monitor,
            None => self.monitors.push(monitor),
        }

        el::info!(
            "wayland.output.bound idx={idx} global={global} version={version}",
            idx = id.index() as i64,
            global = bind.name as i64,
            version = bind.version as i64
        );
        id
    }

    fn on_output_scale(&mut self, id: MonitorId, factor: i32, qh: &QueueHandle<WlState>) {
        let compositor = &self.compositor;
        let layer_shell = &self.layer_shell;
        let config = &self.config;
        let Some(m) = self.monitors.get_mut(id.index()) else { return };

        m.on_scale(factor, |output| {
            surface::realize(compositor, layer_shell, output, config, qh, id)
        });
        self.scale_events.push((id, factor));
    }

    fn on_global_remove(&mut self, name: u32) {
        let Some(m) = self
            .monitors
            .iter_mut()
            .find(|m| m.global_name() == name && !m.is_released())
        else {
            return;
        };

        el::warn!(
            "wayland.output.removed idx={idx} name={name}",
            idx = m.id().index() as i64,
            name = m.name()
        );
        m.teardown();
    }

    fn any_pending(&self) -> bool {
        self.monitors.iter().any(|m| m.phase() == Phase::Pending)
    }
}

/// The compositor connection, its globals and one monitor per output.
pub struct DisplayConnection {
    conn: Connection,
    queue: EventQueue<WlState>,
    qh: QueueHandle<WlState>,
    state: WlState,
    on_scale: ScaleCallback,
}

impl DisplayConnection {
    pub fn create(config: LayerSurfaceConfig, on_scale: ScaleCallback) -> Result<Self, DisplayError> {
        let conn = Connection::connect_to_env()?;
        let (globals, queue) = registry_queue_init::<WlState>(&conn)?;
        let qh = queue.handle();

        let advertised: Vec<Advertised> = globals
            .contents()
            .clone_list()
            .into_iter()
            .map(Advertised::from)
            .collect();
        let plan = registry::plan(&advertised)?;

        let registry = globals.registry();
        let shm: WlShm = registry.bind(plan.shm.name, plan.shm.version, &qh, ());
        let compositor: WlCompositor =
            registry.bind(plan.compositor.name, plan.compositor.version, &qh, ());
        let layer_shell: ZwlrLayerShellV1 =
            registry.bind(plan.layer_shell.name, plan.layer_shell.version, &qh, ());

        let mut state = WlState {
            config,
            compositor,
            shm,
            layer_shell,
            monitors: Vec::with_capacity(plan.outputs.len()),
            scale_events: Vec::new(),
        };
        for bind in &plan.outputs {
            state.add_output(registry, *bind, &qh);
        }

        el::info!(
            "wayland.connect compositor=v{compositor} layer_shell=v{layer_shell} outputs={outputs}",
            compositor = plan.compositor.version as i64,
            layer_shell = plan.layer_shell.version as i64,
            outputs = plan.outputs.len() as i64
        );

        let mut display = DisplayConnection {
            conn,
            queue,
            qh,
            state,
            on_scale,
        };

        // Output events (scale, name, done) for the outputs bound above.
        display.roundtrip()?;
        display.settle()?;
        display.notify_scale_changes();

        el::info!(
            "wayland initialized ready={ready}",
            ready = display.ready_count() as i64
        );
        Ok(display)
    }

    pub fn roundtrip(&mut self) -> Result<usize, DisplayError> {
        Ok(self.queue.roundtrip(&mut self.state)?)
    }

    pub fn flush(&self) -> Result<(), DisplayError> {
        Ok(self.conn.flush()?)
    }

    /// Flush and prepare a read. `None` means events are already queued: call `dispatch` first.
    pub fn prepare_read(&self) -> Result<Option<ReadEventsGuard>, DisplayError> {
        self.flush()?;
        Ok(self.queue.prepare_read())
    }

    /// Handle queued events, finish pending handshakes and redraw what asked for it.
    pub fn dispatch(&mut self, painter: &mut dyn Painter) -> Result<usize, DisplayError> {
        let n = self.queue.dispatch_pending(&mut self.state)?;
        self.settle()?;
        self.notify_scale_changes();
        self.render_pending(painter)?;
        Ok(n)
    }

    /// Render and commit every ready monitor now. Returns how many frames were submitted.
    pub fn schedule_frame(&mut self, painter: &mut dyn Painter) -> Result<usize, DisplayError> {
        let mut committed = 0;
        for m in self.state.monitors.iter_mut() {
            let mut backend = WlShmBackend {
                shm: &self.state.shm,
                qh: &self.qh,
                owner: m.id(),
            };
            if m.render(&mut backend, painter)? {
                committed += 1;
            }
        }

        el::debug!("wayland.schedule_frame committed={n}", n = committed as i64);
        Ok(committed)
    }

    pub fn monitors(&self) -> &[OutputMonitor] {
        &self.state.monitors
    }

    pub fn ready_count(&self) -> usize {
        self.state.monitors.iter().filter(|m| m.phase() == Phase::Ready).count()
    }

    /// Tear down monitors first, then the globals they were created from, then disconnect.
    pub fn destroy(mut self) {
        for m in self.state.monitors.iter_mut() {
            m.teardown();
        }
        self.state.monitors.clear();

        if self.state.layer_shell.version() >= 3 {
            self.state.layer_shell.destroy();
        }
        if self.state.shm.version() >= 2 {
            self.state.shm.release();
        }

        if let Err(e) = self.conn.flush() {
            el::warn!("wayland.destroy flush failed err={}", e);
        }
        el::info!("wayland destroyed");
    }

    fn settle(&mut self) -> Result<(), DisplayError> {
        for _ in 0..MAX_SETTLE_ROUNDTRIPS {
            if !self.state.any_pending() {
                return Ok(());
            }
            self.roundtrip()?;
        }

        if self.state.any_pending() {
            el::warn!("wayland.settle surfaces still waiting for configure");
        }
        Ok(())
    }

    fn notify_scale_changes(&mut self) {
        for (id, scale) in std::mem::take(&mut self.state.scale_events) {
            let Some(m) = self.state.monitors.get_mut(id.index()) else { continue };
            if (self.on_scale)(m, scale) == ScaleResponse::Redraw {
                m.request_redraw();
            }
        }
    }

    fn render_pending(&mut self, painter: &mut dyn Painter) -> Result<(), DisplayError> {
        for m in self.state.monitors.iter_mut().filter(|m| m.wants_redraw()) {
            let mut backend = WlShmBackend {
                shm: &self.state.shm,
                qh: &self.qh,
                owner: m.id(),
            };
            m.render(&mut backend, painter)?;
        }
        Ok(())
    }
}

/* ---------- Dispatch ---------- */

impl Dispatch<WlRegistry, GlobalListContents> for WlState {
    fn event(
        state: &mut WlState,
        proxy: &WlRegistry,
        event: wl_registry::Event,
        _data: &GlobalListContents,
        _conn: &Connection,
        qh: &QueueHandle<WlState>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } if interface == registry::WL_OUTPUT => match registry::OUTPUT.negotiate(version) {
                Ok(version) => {
                    state.add_output(proxy, Bind { name, version }, qh);
                }
                Err(e) => {
                    el::warn!("wayland.output.skipped global={} err={}", name, e);
                }
            },
            wl_registry::Event::GlobalRemove { name } => state.on_global_remove(name),
            _ => {}
        }
    }
}

impl Dispatch<WlOutput, MonitorId> for WlState {
    fn event(
        state: &mut WlState,
        _proxy: &WlOutput,
        event: wl_output::Event,
        data: &MonitorId,
        _conn: &Connection,
        qh: &QueueHandle<WlState>,
    ) {
        let id = *data;

        match event {
            wl_output::Event::Scale { factor } => state.on_output_scale(id, factor, qh),
            wl_output::Event::Name { name } => {
                if let Some(m) = state.monitors.get_mut(id.index()) {
                    m.on_name(name);
                }
            }
            wl_output::Event::Done => {
                if let Some(m) = state.monitors.get(id.index()) {
                    el::info!(
                        "wayland.output.done name={name} scale={scale}",
                        name = m.name(),
                        scale = m.scale() as i64
                    );
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<ZwlrLayerSurfaceV1, MonitorId> for WlState {
    fn event(
        state: &mut WlState,
        _proxy: &ZwlrLayerSurfaceV1,
        event: zwlr_layer_surface_v1::Event,
        data: &MonitorId,
        _conn: &Connection,
        _qh: &QueueHandle<WlState>,
    ) {
        let Some(m) = state.monitors.get_mut(data.index()) else { return };

        match event {
            zwlr_layer_surface_v1::Event::Configure {
                serial,
                width,
                height,
            } => m.on_configure(serial, width, height),
            zwlr_layer_surface_v1::Event::Closed => m.on_closed(),
            _ => {}
        }
    }
}

impl Dispatch<WlBuffer, MonitorId> for WlState {
    fn event(
        state: &mut WlState,
        _proxy: &WlBuffer,
        event: wl_buffer::Event,
        data: &MonitorId,
        _conn: &Connection,
        _qh: &QueueHandle<WlState>,
    ) {
        if let wl_buffer::Event::Release = event {
            if let Some(m) = state.monitors.get_mut(data.index()) {
                m.on_buffer_released();
            }
        }
    }
}

wayland_client::delegate_noop!(WlState: ignore WlCompositor);
wayland_client::delegate_noop!(WlState: ignore WlShm);
wayland_client::delegate_noop!(WlState: ignore WlShmPool);
wayland_client::delegate_noop!(WlState: ignore WlSurface);
wayland_client::delegate_noop!(WlState: ignore ZwlrLayerShellV1);

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::os::unix::net::UnixStream;
    use std::rc::Rc;

    use crate::wayland::canvas::RenderContext;

    wayland_client::delegate_noop!(WlState: ignore WlRegistry);

    /// A connection over one end of a socketpair. Requests queue up client side and
    /// nothing answers, so events are fed to the handlers directly.
    struct Harness {
        display: DisplayConnection,
        registry: WlRegistry,
        _server: UnixStream,
    }

    fn harness(on_scale: ScaleCallback) -> Harness {
        let (client, server) = UnixStream::pair().expect("socketpair");
        let conn = Connection::from_socket(client).expect("connection");
        let queue = conn.new_event_queue::<WlState>();
        let qh = queue.handle();
        let registry = conn.display().get_registry(&qh, ());

        let state = WlState {
            config: LayerSurfaceConfig::default(),
            compositor: registry.bind(1, 4, &qh, ()),
            shm: registry.bind(2, 1, &qh, ()),
            layer_shell: registry.bind(3, 4, &qh, ()),
            monitors: Vec::new(),
            scale_events: Vec::new(),
        };

        Harness {
            display: DisplayConnection {
                conn,
                queue,
                qh,
                state,
                on_scale,
            },
            registry,
            _server: server,
        }
    }

    impl Harness {
        fn add_output(&mut self, name: u32) -> MonitorId {
            let qh = self.display.qh.clone();
            self.display
                .state
                .add_output(&self.registry, Bind { name, version: 4 }, &qh)
        }

        fn scale(&mut self, id: MonitorId, factor: i32) {
            let qh = self.display.qh.clone();
            self.display.state.on_output_scale(id, factor, &qh);
        }

        fn monitor(&mut self, id: MonitorId) -> &mut OutputMonitor {
            &mut self.display.state.monitors[id.index()]
        }
    }

    fn ignore_scale() -> ScaleCallback {
        Box::new(|_: &OutputMonitor, _: i32| ScaleResponse::Ignore)
    }

    #[test]
    fn output_reaches_ready_through_scale_and_configure() {
        let mut h = harness(ignore_scale());
        let id = h.add_output(7);
        assert_eq!(h.monitor(id).phase(), Phase::Unbound);

        h.scale(id, 1);
        assert_eq!(h.monitor(id).phase(), Phase::Pending);
        assert!(h.display.state.any_pending());

        h.monitor(id).on_configure(11, 1920, 24);
        assert_eq!(h.monitor(id).phase(), Phase::Ready);
        assert_eq!(h.monitor(id).logical_size(), (1920, 24));
        assert!(!h.display.state.any_pending());
        assert_eq!(h.display.ready_count(), 1);
        assert_eq!(h.display.monitors().len(), 1);
    }

    #[test]
    fn redraw_response_renders_once_per_scale_event() -> anyhow::Result<()> {
        let response = Rc::new(Cell::new(ScaleResponse::Ignore));
        let calls = Rc::new(Cell::new(0usize));
        let (r, c) = (response.clone(), calls.clone());
        let mut h = harness(Box::new(move |m: &OutputMonitor, scale: i32| {
            assert_eq!(m.scale(), scale);
            c.set(c.get() + 1);
            r.get()
        }));

        let frames = Cell::new(0usize);
        let mut painter = |_: &mut RenderContext<'_>| frames.set(frames.get() + 1);

        let id = h.add_output(7);
        h.scale(id, 1);
        h.monitor(id).on_configure(1, 800, 24);
        h.display.notify_scale_changes();
        assert_eq!(calls.get(), 1);

        // the first configure asks for a frame on its own
        h.display.render_pending(&mut painter)?;
        h.display.render_pending(&mut painter)?;
        assert_eq!(frames.get(), 1);

        response.set(ScaleResponse::Redraw);
        h.scale(id, 2);
        h.display.notify_scale_changes();
        h.display.render_pending(&mut painter)?;
        h.display.render_pending(&mut painter)?;
        assert_eq!(calls.get(), 2);
        assert_eq!(frames.get(), 2);
        assert_eq!(h.monitor(id).buffer_size(), (1600, 48));

        response.set(ScaleResponse::Ignore);
        h.scale(id, 2);
        h.display.notify_scale_changes();
        h.display.render_pending(&mut painter)?;
        assert_eq!(calls.get(), 3);
        assert_eq!(frames.get(), 2);
        Ok(())
    }

    #[test]
    fn closed_then_removed_output_is_released() {
        let mut h = harness(ignore_scale());
        let id = h.add_output(7);
        h.scale(id, 1);
        h.monitor(id).on_configure(1, 1280, 24);

        h.monitor(id).on_closed();
        assert_eq!(h.monitor(id).phase(), Phase::Closed);
        assert!(h.monitor(id).output().is_alive());

        h.display.state.on_global_remove(7);
        assert!(h.monitor(id).is_released());
        assert!(!h.monitor(id).output().is_alive());
        assert_eq!(h.monitor(id).phase(), Phase::Closed);

        // repeated or unknown removals change nothing
        h.display.state.on_global_remove(7);
        h.display.state.on_global_remove(99);
        assert_eq!(h.display.monitors().len(), 1);
    }

    #[test]
    fn removing_a_live_output_tears_it_down() {
        let mut h = harness(ignore_scale());
        let keep = h.add_output(7);
        let gone = h.add_output(8);
        for id in [keep, gone] {
            h.scale(id, 1);
            h.monitor(id).on_configure(1, 1280, 24);
        }

        h.display.state.on_global_remove(8);

        assert_eq!(h.monitor(gone).phase(), Phase::Closed);
        assert!(!h.monitor(gone).output().is_alive());
        assert_eq!(h.monitor(keep).phase(), Phase::Ready);
        assert_eq!(h.display.ready_count(), 1);
    }

    #[test]
    fn hotplug_reuses_released_slot() {
        let mut h = harness(ignore_scale());
        let first = h.add_output(7);
        let second = h.add_output(8);

        h.display.state.on_global_remove(7);
        let replug = h.add_output(9);

        assert_eq!(replug, first);
        assert_ne!(replug, second);
        assert_eq!(h.display.monitors().len(), 2);
        assert_eq!(h.monitor(replug).phase(), Phase::Unbound);
        assert_eq!(h.monitor(replug).global_name(), 9);
        assert!(!h.monitor(replug).is_released());

        // the old global name no longer maps to anything
        h.display.state.on_global_remove(7);
        assert!(!h.monitor(replug).is_released());
    }
}
