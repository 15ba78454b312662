#![allow(dead_code)]

use std::sync::Once;

use meridian::{
    config::ShellConfig,
    input::SeatId,
    output::OutputId,
    shell::{Shell, ShellEvent, ShellSurfaceId},
    surface::SurfaceId,
    utils::{ClientId, Logical, Rectangle, Size},
};

static LOGGING: Once = Once::new();

fn init_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub const DESKTOP: ClientId = ClientId(1);
pub const APP: ClientId = ClientId(2);

pub struct Desktop {
    pub shell: Shell,
    pub output: OutputId,
    pub seat: SeatId,
    events: Vec<ShellEvent>,
}

impl Desktop {
    pub fn start() -> Self {
        Self::with_config(ShellConfig {
            animate_workspace_switch: false,
            ..ShellConfig::default()
        })
    }

    pub fn with_config(config: ShellConfig) -> Self {
        init_logging();
        let mut shell = Shell::new(config);
        shell.set_privileged_client(Some(DESKTOP));
        let output = shell.add_output("DP-1", Rectangle::from_loc_and_size((0, 0), (1920, 1080)));
        let seat = shell.add_seat("seat0");
        let mut desktop = Desktop {
            shell,
            output,
            seat,
            events: Vec::new(),
        };
        desktop.flush();
        desktop
    }

    /// Collect the events emitted so far
    pub fn flush(&mut self) -> &[ShellEvent] {
        self.events = self.shell.drain_events().collect();
        &self.events
    }

    /// Create a toplevel window and commit its first buffer
    pub fn map_window(&mut self, size: impl Into<Size<i32, Logical>>) -> (SurfaceId, ShellSurfaceId) {
        let surface = self.shell.create_surface(APP);
        let window = self.shell.get_shell_surface(surface).expect("fresh surface");
        self.shell.set_toplevel(window);
        self.shell.committed(window, size.into(), 0, 0);
        (surface, window)
    }

    /// Dock a panel of the desktop client to the top of the output
    pub fn top_panel(&mut self, height: i32) -> SurfaceId {
        let surface = self.shell.create_surface(DESKTOP);
        self.shell
            .set_panel(surface, self.output, meridian::shell::PanelEdge::Top)
            .expect("desktop client is privileged");
        self.shell.surface_committed(surface, (1920, height).into());
        surface
    }

    pub fn configures(&mut self, surface: SurfaceId) -> Vec<Size<i32, Logical>> {
        self.flush()
            .iter()
            .filter_map(|e| match e {
                ShellEvent::Configure { surface: s, size, .. } if *s == surface => Some(*size),
                _ => None,
            })
            .collect()
    }
}
