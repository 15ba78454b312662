//! The window-management core
//!
//! A [`Shell`] owns the whole state of the desktop: client surfaces and the windows built
//! from them, the scene graph, outputs, seats, focus scopes and workspaces. The compositor
//! creates one, feeds it requests and input events from its event loop, calls
//! [`Shell::tick`] on every repaint of an output, and dispatches what the shell asks of
//! the outside world after every call by draining [`Shell::drain_events`].
//!
//! ```
//! use meridian::{config::ShellConfig, shell::{Shell, ShellEvent}, utils::{ClientId, Rectangle}};
//!
//! let mut shell = Shell::new(ShellConfig::default());
//! let output = shell.add_output("DP-1", Rectangle::from_loc_and_size((0, 0), (1920, 1080)));
//!
//! let surface = shell.create_surface(ClientId(1));
//! let window = shell.get_shell_surface(surface).unwrap();
//! shell.set_toplevel(window);
//! shell.committed(window, (800, 600).into(), 0, 0);
//!
//! assert!(shell.drain_events().any(|e| e == ShellEvent::Mapped(surface)));
//! # let _ = output;
//! ```
//!
//! Objects are referred to by small copyable handles ([`SurfaceId`], [`ShellSurfaceId`],
//! [`OutputId`], [`SeatId`], ...). A handle to a destroyed object is never reused, and
//! operations given such a handle do nothing.

use std::collections::{HashMap, VecDeque};

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{info_span, instrument, trace};

use crate::{
    config::ShellConfig,
    focus::{FocusScope, ScopeKind},
    input::{
        pointer::{AxisFrame, ButtonState, CursorIcon, GrabError},
        KeyState, Seat, SeatId,
    },
    output::{Output, OutputId},
    scene::{LayerKind, Scene},
    surface::{RoleError, Surface, SurfaceId},
    utils::{ClientId, Logical, Point, Serial, SerialCounter, Size, Time},
    workspace::{Pager, Workspace, WorkspaceId, MAX_WORKSPACES},
};

mod bindings;
pub mod grabs;
mod placement;
mod popup;
mod privileged;
mod surface;

pub use self::bindings::{Binding, BindingId, BindingTrigger};
pub use self::grabs::{ResizeEdge, ResizeError};
pub use self::popup::PopupGrab;
pub use self::privileged::PanelEdge;
pub use self::surface::{ShellSurface, ShellSurfaceId, SurfaceType};

use self::{bindings::Bindings, popup::Popup, privileged::DesktopSurface};

/// Errors of the shell requests
///
/// All of them are violations of the protocol contract by a client; the request was
/// refused and no state changed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShellError {
    /// The surface already has a different role
    #[error(transparent)]
    Role(#[from] RoleError),
    /// Invalid edges given to an interactive resize
    #[error(transparent)]
    Resize(#[from] ResizeError),
    /// A grab serial did not match
    #[error(transparent)]
    Grab(#[from] GrabError),
    /// The request is reserved to the privileged client
    #[error("{0} is not allowed to use privileged shell requests")]
    NotPrivileged(ClientId),
    /// The surface does not exist
    #[error("{0} does not exist")]
    UnknownSurface(SurfaceId),
}

/// Something the shell wants the outside world to do or know
#[derive(Debug, Clone, PartialEq)]
pub enum ShellEvent {
    /// Ask the client to resize its surface
    ///
    /// A zero size lets the client pick the size.
    Configure {
        /// The surface
        surface: SurfaceId,
        /// The requested size
        size: Size<i32, Logical>,
        /// The edges being dragged, during an interactive resize
        edges: ResizeEdge,
    },
    /// A surface became visible
    Mapped(SurfaceId),
    /// A surface stopped being visible
    Unmapped(SurfaceId),
    /// A surface became the active one of its scope
    Activated(SurfaceId),
    /// A surface lost activation
    Deactivated(SurfaceId),
    /// The keyboard focus of a seat changed
    KeyboardFocus {
        /// The seat
        seat: SeatId,
        /// The newly focused surface
        surface: Option<SurfaceId>,
    },
    /// A key event for the keyboard focus
    KeyboardKey {
        /// The seat
        seat: SeatId,
        /// The focused surface
        surface: SurfaceId,
        /// Hardware keycode
        keycode: u32,
        /// Pressed or released
        state: KeyState,
        /// Serial of the event
        serial: Serial,
        /// Timestamp with millisecond granularity
        time: u32,
    },
    /// The pointer of a seat entered a surface
    PointerEnter {
        /// The seat
        seat: SeatId,
        /// The entered surface
        surface: SurfaceId,
        /// Pointer location in surface-local coordinates
        location: Point<f64, Logical>,
    },
    /// The pointer of a seat left a surface
    PointerLeave {
        /// The seat
        seat: SeatId,
        /// The surface left
        surface: SurfaceId,
    },
    /// The pointer of a seat moved over a surface
    PointerMotion {
        /// The seat
        seat: SeatId,
        /// The surface under the pointer
        surface: SurfaceId,
        /// Pointer location in surface-local coordinates
        location: Point<f64, Logical>,
        /// Timestamp with millisecond granularity
        time: u32,
    },
    /// A button event for the surface under the pointer
    PointerButton {
        /// The seat
        seat: SeatId,
        /// The focused surface
        surface: SurfaceId,
        /// Button code
        button: u32,
        /// Pressed or released
        state: ButtonState,
        /// Serial of the event
        serial: Serial,
        /// Timestamp with millisecond granularity
        time: u32,
    },
    /// An axis frame for the surface under the pointer
    PointerAxis {
        /// The seat
        seat: SeatId,
        /// The focused surface
        surface: SurfaceId,
        /// The scroll amounts
        frame: AxisFrame,
    },
    /// The cursor icon of a seat should change
    CursorChanged {
        /// The seat
        seat: SeatId,
        /// The icon to show
        icon: CursorIcon,
    },
    /// A pointer grab ended
    GrabEnded {
        /// The seat
        seat: SeatId,
        /// The serial returned when the grab started
        serial: Serial,
    },
    /// A workspace became the current one of an output
    WorkspaceActivated {
        /// The output
        output: OutputId,
        /// The workspace
        workspace: WorkspaceId,
    },
    /// A popup was dismissed
    PopupDone(SurfaceId),
    /// A key, button or axis binding was triggered
    BindingTriggered {
        /// The seat that triggered it
        seat: SeatId,
        /// The binding
        binding: BindingId,
    },
    /// Check that the client owning a surface is alive
    Ping {
        /// The surface
        surface: SurfaceId,
        /// Serial the client has to answer with
        serial: Serial,
    },
    /// Something changed on an output and it needs to be repainted
    RepaintNeeded(OutputId),
}

/// The window-management state of the desktop
#[derive(Debug)]
pub struct Shell {
    pub(crate) span: tracing::Span,
    pub(crate) config: ShellConfig,
    pub(crate) serials: SerialCounter,
    pub(crate) surfaces: IndexMap<SurfaceId, Surface>,
    pub(crate) scene: Scene,
    pub(crate) outputs: IndexMap<OutputId, Output>,
    pub(crate) seats: IndexMap<SeatId, Seat>,
    pub(crate) apps_scope: FocusScope,
    pub(crate) lock_scope: FocusScope,
    pub(crate) workspaces: Vec<Workspace>,
    pub(crate) pager: Pager,
    pub(crate) shell_surfaces: IndexMap<ShellSurfaceId, ShellSurface>,
    pub(crate) shell_surface_of: HashMap<SurfaceId, ShellSurfaceId>,
    pub(crate) popups: IndexMap<SurfaceId, Popup>,
    pub(crate) desktop_surfaces: IndexMap<SurfaceId, DesktopSurface>,
    pub(crate) privileged_client: Option<ClientId>,
    pub(crate) locked: bool,
    pub(crate) positions: HashMap<(String, String), Point<i32, Logical>>,
    pub(crate) bindings: Bindings,
    pub(crate) events: VecDeque<ShellEvent>,
}

impl Shell {
    /// Create a new shell, with the configured number of workspaces and no output
    pub fn new(config: ShellConfig) -> Self {
        let span = info_span!("shell");
        let mut shell = Shell {
            span,
            serials: SerialCounter::default(),
            surfaces: IndexMap::new(),
            scene: Scene::new(),
            outputs: IndexMap::new(),
            seats: IndexMap::new(),
            apps_scope: FocusScope::new(ScopeKind::Apps),
            lock_scope: FocusScope::new(ScopeKind::Locked),
            workspaces: Vec::new(),
            pager: Pager::default(),
            shell_surfaces: IndexMap::new(),
            shell_surface_of: HashMap::new(),
            popups: IndexMap::new(),
            desktop_surfaces: IndexMap::new(),
            privileged_client: None,
            locked: false,
            positions: HashMap::new(),
            bindings: Bindings::default(),
            events: VecDeque::new(),
            config,
        };
        for _ in 0..shell.config.workspaces.clamp(1, MAX_WORKSPACES) {
            shell.add_workspace();
        }
        shell
    }

    /// The configuration the shell was created with
    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// The scene graph
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Take the events emitted since the last call, oldest first
    ///
    /// Outputs whose content changed get a [`ShellEvent::RepaintNeeded`] at the end.
    pub fn drain_events(&mut self) -> impl Iterator<Item = ShellEvent> + '_ {
        for output in self.scene.take_damage() {
            if self.outputs.contains_key(&output) {
                self.events.push_back(ShellEvent::RepaintNeeded(output));
            }
        }
        self.events.drain(..)
    }

    pub(crate) fn push_event(&mut self, event: ShellEvent) {
        trace!(parent: &self.span, ?event, "event");
        self.events.push_back(event);
    }

    /// Advance time-driven state on a repaint of `output`
    ///
    /// Runs the animations bound to the output and checks for unanswered pings.
    #[instrument(level = "trace", parent = &self.span, skip(self))]
    pub fn tick(&mut self, output: OutputId, now: Time) {
        self.tick_workspaces(output, now);
        self.check_pings(now);
    }

    /// Whether the session is locked
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// The cached positions of windows that were closed, keyed by application id and
    /// title, for the embedder to persist
    pub fn cached_positions(&self) -> impl Iterator<Item = (&(String, String), &Point<i32, Logical>)> {
        self.positions.iter()
    }

    /// Restore a cached window position, e.g. from a previous session
    pub fn cache_position(&mut self, app_id: String, title: String, position: Point<i32, Logical>) {
        self.positions.insert((app_id, title), position);
    }

    /// Show or hide the dashboard layer
    pub fn set_dashboard_visible(&mut self, visible: bool) {
        self.scene
            .set_layer_visible(LayerKind::Dashboard, visible && !self.locked);
        self.refresh_pointer_focus();
    }

    /// Whether the dashboard layer is shown
    pub fn is_dashboard_visible(&self) -> bool {
        self.scene.layer(LayerKind::Dashboard).is_visible()
    }
}
