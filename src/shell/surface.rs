use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::{debug, instrument, trace};

use crate::{
    input::{
        pointer::{CursorIcon, GrabStartData},
        SeatId,
    },
    output::OutputId,
    scene::{LayerKind, ViewId, ViewKind},
    surface::{Role, SurfaceId},
    utils::{ids::id_type, Logical, Point, Rectangle, Serial, Size, Time},
    workspace::WorkspaceId,
};

use super::{
    grabs::{snap_location, BusyGrab, MoveGrab, ResizeEdge, ResizeGrab},
    placement::{centered, clamp_into, fullscreen_placement},
    Shell, ShellError, ShellEvent,
};

id_type!(
    /// Handle to a [`ShellSurface`]
    ShellSurfaceId,
    "shell_surface"
);

/// The kind of window a shell surface currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceType {
    /// Not shown yet (or not anymore)
    #[default]
    None,
    /// A regular window
    Toplevel {
        /// Covering the available geometry of its output
        maximized: bool,
        /// Covering its whole output
        fullscreen: bool,
        /// The output explicitly requested for maximized or fullscreen state
        output: Option<OutputId>,
    },
    /// A window attached to another one, e.g. a dialog
    Transient {
        /// The window it is attached to
        parent: ShellSurfaceId,
        /// Location relative to the parent
        offset: Point<i32, Logical>,
        /// Whether it must not be activated when mapped
        inactive: bool,
    },
}

impl SurfaceType {
    fn is_maximized(&self) -> bool {
        matches!(self, SurfaceType::Toplevel { maximized: true, .. })
    }

    fn is_fullscreen(&self) -> bool {
        matches!(self, SurfaceType::Toplevel { fullscreen: true, .. })
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct OutputViews {
    pub(crate) view: ViewId,
    pub(crate) backdrop: Option<ViewId>,
}

// What was last laid out; a toplevel is only laid out again when this changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct SavedState {
    pub(crate) size: Size<i32, Logical>,
    pub(crate) maximized: bool,
    pub(crate) fullscreen: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingPing {
    pub(crate) serial: Serial,
    pub(crate) sent: Time,
}

/// A surface managed as a window
#[derive(Debug)]
pub struct ShellSurface {
    pub(crate) id: ShellSurfaceId,
    pub(crate) surface: SurfaceId,
    pub(crate) kind: SurfaceType,
    pub(crate) views: IndexMap<OutputId, OutputViews>,
    pub(crate) output: Option<OutputId>,
    pub(crate) resize_edges: ResizeEdge,
    pub(crate) resizing: bool,
    pub(crate) workspace: WorkspaceId,
    pub(crate) responsive: bool,
    pub(crate) saved: SavedState,
    pub(crate) location: Point<i32, Logical>,
    pub(crate) restore: Option<(Point<i32, Logical>, Size<i32, Logical>)>,
    pub(crate) minimized: bool,
    pub(crate) mapped: bool,
    pub(crate) ping: Option<PendingPing>,
    pub(crate) busy_seats: SmallVec<[SeatId; 2]>,
}

impl ShellSurface {
    /// Handle of this window
    pub fn id(&self) -> ShellSurfaceId {
        self.id
    }

    /// The surface shown by this window
    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    /// The kind of window
    pub fn surface_type(&self) -> SurfaceType {
        self.kind
    }

    /// The workspace the window lives on
    pub fn workspace(&self) -> WorkspaceId {
        self.workspace
    }

    /// The output the window was placed on
    pub fn output(&self) -> Option<OutputId> {
        self.output
    }

    /// Top-left corner of the window in workspace coordinates, which are global
    /// coordinates while its workspace is shown
    pub fn location(&self) -> Point<i32, Logical> {
        self.location
    }

    /// Last committed size
    pub fn size(&self) -> Size<i32, Logical> {
        self.saved.size
    }

    /// Whether the window is shown
    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    /// Whether the window is minimized
    pub fn is_minimized(&self) -> bool {
        self.minimized
    }

    /// Whether the window is maximized
    pub fn is_maximized(&self) -> bool {
        self.kind.is_maximized()
    }

    /// Whether the window is fullscreen
    pub fn is_fullscreen(&self) -> bool {
        self.kind.is_fullscreen()
    }

    /// Whether the client answered its pings in time
    pub fn is_responsive(&self) -> bool {
        self.responsive
    }

    /// The edges being dragged by an interactive resize
    pub fn resize_edges(&self) -> ResizeEdge {
        self.resize_edges
    }

    /// The view of this window on an output
    pub fn view(&self, output: OutputId) -> Option<ViewId> {
        self.views.get(&output).map(|v| v.view)
    }

    /// The views of this window, one per output
    pub fn views(&self) -> impl Iterator<Item = ViewId> + '_ {
        self.views.values().map(|v| v.view)
    }

    /// The backdrop shown beneath the window on an output while it is fullscreen
    pub fn backdrop(&self, output: OutputId) -> Option<ViewId> {
        self.views.get(&output).and_then(|v| v.backdrop)
    }
}

impl Shell {
    /// Turn a surface into a window
    ///
    /// The window is created on the last activated workspace. Asking again for the same
    /// surface returns the existing window.
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn get_shell_surface(&mut self, surface: SurfaceId) -> Result<ShellSurfaceId, ShellError> {
        let s = self
            .surfaces
            .get_mut(&surface)
            .ok_or(ShellError::UnknownSurface(surface))?;
        s.set_role(Role::Shell)?;
        if let Some(id) = self.shell_surface_of.get(&surface) {
            return Ok(*id);
        }

        let workspace = self.pager.last_active();
        s.workspace_mask = workspace.mask();

        let id = ShellSurfaceId::next();
        self.shell_surfaces.insert(
            id,
            ShellSurface {
                id,
                surface,
                kind: SurfaceType::None,
                views: IndexMap::new(),
                output: None,
                resize_edges: ResizeEdge::NONE,
                resizing: false,
                workspace,
                responsive: true,
                saved: SavedState::default(),
                location: Point::default(),
                restore: None,
                minimized: false,
                mapped: false,
                ping: None,
                busy_seats: SmallVec::new(),
            },
        );
        self.shell_surface_of.insert(surface, id);
        self.update_activable(id);

        let outputs: SmallVec<[OutputId; 4]> = self.outputs.keys().copied().collect();
        for output in outputs {
            self.create_window_view(id, output);
        }
        debug!(shell_surface = %id, "shell surface created");
        Ok(id)
    }

    /// Access a window
    pub fn shell_surface(&self, id: ShellSurfaceId) -> Option<&ShellSurface> {
        self.shell_surfaces.get(&id)
    }

    /// The window built from a surface, if any
    pub fn shell_surface_of(&self, surface: SurfaceId) -> Option<ShellSurfaceId> {
        self.shell_surface_of.get(&surface).copied()
    }

    /// Iterate over all windows, in creation order
    pub fn shell_surfaces(&self) -> impl Iterator<Item = &ShellSurface> {
        self.shell_surfaces.values()
    }

    /// Make the window a regular toplevel window
    ///
    /// Leaving the maximized or fullscreen state asks the client to go back to its
    /// previous size; the previous location is restored on the next commit.
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn set_toplevel(&mut self, id: ShellSurfaceId) {
        let Some(sh) = self.shell_surfaces.get_mut(&id) else {
            return;
        };
        let was_constrained = sh.kind.is_maximized() || sh.kind.is_fullscreen();
        sh.kind = SurfaceType::Toplevel {
            maximized: false,
            fullscreen: false,
            output: None,
        };
        if was_constrained {
            let size = sh.restore.map(|(_, size)| size).unwrap_or_default();
            self.configure_window(id, size, ResizeEdge::NONE);
        }
        self.update_activable(id);
    }

    /// Attach the window to `parent`, at `offset` relative to it
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn set_parent(&mut self, id: ShellSurfaceId, parent: ShellSurfaceId, offset: Point<i32, Logical>, inactive: bool) {
        if id == parent || self.is_ancestor(id, parent) {
            trace!("refusing a transient cycle");
            return;
        }
        let Some(workspace) = self.shell_surfaces.get(&parent).map(|p| p.workspace) else {
            return;
        };
        let Some(sh) = self.shell_surfaces.get_mut(&id) else {
            return;
        };
        sh.kind = SurfaceType::Transient {
            parent,
            offset,
            inactive,
        };
        let mapped = sh.mapped;
        self.set_window_workspace(id, workspace);
        self.update_activable(id);
        if mapped {
            self.anchor_transient(id);
            self.sync_window_views(id);
            self.restack_window(id);
        }
    }

    // windows without a type and inactive transients are never activated
    fn update_activable(&mut self, id: ShellSurfaceId) {
        let Some(sh) = self.shell_surfaces.get(&id) else {
            return;
        };
        let activable = !matches!(
            sh.kind,
            SurfaceType::None | SurfaceType::Transient { inactive: true, .. }
        );
        let surface = sh.surface;
        let Some(s) = self.surfaces.get_mut(&surface) else {
            return;
        };
        if s.window_activable == activable {
            return;
        }
        s.window_activable = activable;
        if !activable {
            self.surface_unavailable(surface);
        }
    }

    // whether `ancestor` is `id` or one of its transient parents
    fn is_ancestor(&self, ancestor: ShellSurfaceId, mut id: ShellSurfaceId) -> bool {
        for _ in 0..self.shell_surfaces.len() {
            if id == ancestor {
                return true;
            }
            match self.shell_surfaces.get(&id).map(|s| s.kind) {
                Some(SurfaceType::Transient { parent, .. }) => id = parent,
                _ => return false,
            }
        }
        false
    }

    /// Maximize the window on `output`, or on the output it is shown on
    ///
    /// The client is asked to take the size of the available geometry; the window is
    /// moved to its top-left corner on the next commit.
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn set_maximized(&mut self, id: ShellSurfaceId, output: Option<OutputId>) {
        let Some(output) = self.constrain_output(id, output) else {
            return;
        };
        let Some(area) = self.outputs.get(&output).map(|o| o.available) else {
            return;
        };
        let Some(sh) = self.shell_surfaces.get_mut(&id) else {
            return;
        };
        sh.kind = SurfaceType::Toplevel {
            maximized: true,
            fullscreen: false,
            output: Some(output),
        };
        if sh.mapped {
            sh.output = Some(output);
        }
        self.configure_window(id, area.size, ResizeEdge::NONE);
    }

    /// Make the window cover `output`, or the output it is shown on
    ///
    /// The window is shown above everything but overlays, on an opaque backdrop. If it
    /// does not commit the size of the output, it is centered and scaled to fit.
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn set_fullscreen(&mut self, id: ShellSurfaceId, output: Option<OutputId>) {
        let Some(output) = self.constrain_output(id, output) else {
            return;
        };
        let Some(area) = self.outputs.get(&output).map(|o| o.geometry) else {
            return;
        };
        let Some(sh) = self.shell_surfaces.get_mut(&id) else {
            return;
        };
        sh.kind = SurfaceType::Toplevel {
            maximized: false,
            fullscreen: true,
            output: Some(output),
        };
        if sh.mapped {
            sh.output = Some(output);
        }
        self.configure_window(id, area.size, ResizeEdge::NONE);
    }

    // pick the output for a maximized or fullscreen window, remembering where to go back to
    fn constrain_output(&mut self, id: ShellSurfaceId, requested: Option<OutputId>) -> Option<OutputId> {
        let sh = self.shell_surfaces.get(&id)?;
        let output = requested
            .filter(|o| self.outputs.contains_key(o))
            .or(sh.output.filter(|o| self.outputs.contains_key(o)))
            .or_else(|| self.select_output(sh.workspace))?;
        let sh = self.shell_surfaces.get_mut(&id)?;
        if sh.mapped && !sh.kind.is_maximized() && !sh.kind.is_fullscreen() {
            sh.restore = Some((sh.location, sh.saved.size));
        }
        Some(output)
    }

    /// The client committed a new state of the window's surface
    ///
    /// `dx` and `dy` move the window by the given amount, as requested by the client
    /// when attaching its new content.
    #[instrument(level = "trace", parent = &self.span, skip(self))]
    pub fn committed(&mut self, id: ShellSurfaceId, size: Size<i32, Logical>, dx: i32, dy: i32) {
        let Some(sh) = self.shell_surfaces.get(&id) else {
            trace!("commit on a destroyed shell surface");
            return;
        };
        let (surface, kind, mapped) = (sh.surface, sh.kind, sh.mapped);
        if let Some(s) = self.surfaces.get_mut(&surface) {
            s.size = size;
        }

        if size.is_empty() {
            self.unmap_window(id);
            if let Some(sh) = self.shell_surfaces.get_mut(&id) {
                sh.kind = SurfaceType::None;
                sh.saved = SavedState::default();
            }
            self.update_activable(id);
            return;
        }

        match kind {
            SurfaceType::None => return,
            _ if !mapped => {
                self.map_window(id, size);
                return;
            }
            SurfaceType::Toplevel {
                maximized,
                fullscreen,
                ..
            } => {
                let state = SavedState {
                    size,
                    maximized,
                    fullscreen,
                };
                if self.layout_toplevel(id, state, (dx, dy).into()) {
                    self.sync_window_views(id);
                    self.restack_window(id);
                }
            }
            SurfaceType::Transient { .. } => {
                if let Some(sh) = self.shell_surfaces.get_mut(&id) {
                    sh.saved.size = size;
                }
                self.anchor_transient(id);
            }
        }

        self.sync_window_views(id);
        self.refresh_pointer_focus();
    }

    fn map_window(&mut self, id: ShellSurfaceId, size: Size<i32, Logical>) {
        let Some(sh) = self.shell_surfaces.get(&id) else {
            return;
        };
        let (surface, kind, workspace) = (sh.surface, sh.kind, sh.workspace);
        let mut activate = true;

        match kind {
            SurfaceType::None => return,
            SurfaceType::Toplevel {
                maximized,
                fullscreen,
                output,
            } => {
                let output = output
                    .filter(|o| self.outputs.contains_key(o))
                    .or_else(|| self.select_output(workspace));
                let location = match output.and_then(|o| self.outputs.get(&o)) {
                    Some(o) if fullscreen => fullscreen_placement(size, o.geometry).location,
                    Some(o) if maximized => o.available.loc,
                    Some(o) => match self.cached_location(surface) {
                        Some(cached) => clamp_into(cached, size, o.available),
                        None => centered(size, o.available),
                    },
                    None => self.cached_location(surface).unwrap_or_default(),
                };
                let Some(sh) = self.shell_surfaces.get_mut(&id) else {
                    return;
                };
                sh.output = output;
                sh.location = location;
                sh.saved = SavedState {
                    size,
                    maximized,
                    fullscreen,
                };
            }
            SurfaceType::Transient { parent, inactive, .. } => {
                activate = !inactive;
                let output = self.shell_surfaces.get(&parent).and_then(|p| p.output);
                let Some(sh) = self.shell_surfaces.get_mut(&id) else {
                    return;
                };
                sh.output = output;
                sh.saved = SavedState {
                    size,
                    ..Default::default()
                };
                self.anchor_transient(id);
            }
        }

        if let Some(sh) = self.shell_surfaces.get_mut(&id) {
            sh.mapped = true;
        }
        if let Some(s) = self.surfaces.get_mut(&surface) {
            s.mapped = true;
        }
        self.sync_window_views(id);
        self.restack_window(id);
        debug!(parent: &self.span, shell_surface = %id, "mapped");
        self.push_event(ShellEvent::Mapped(surface));
        if activate {
            self.activate(surface);
        }
        self.refresh_pointer_focus();
    }

    // returns whether the window changed layer
    fn layout_toplevel(&mut self, id: ShellSurfaceId, state: SavedState, delta: Point<i32, Logical>) -> bool {
        let Some(sh) = self.shell_surfaces.get(&id) else {
            return false;
        };
        let previous = sh.saved;
        if previous == state {
            if let Some(sh) = self.shell_surfaces.get_mut(&id) {
                sh.location += delta;
            }
            return false;
        }

        let output = sh.output.and_then(|o| self.outputs.get(&o));
        let mut location = sh.location;
        if state.fullscreen {
            if let Some(o) = output {
                location = fullscreen_placement(state.size, o.geometry).location;
            }
        } else if state.maximized {
            if let Some(o) = output {
                location = o.available.loc;
            }
        } else if previous.maximized || previous.fullscreen {
            if let Some((restored, _)) = sh.restore {
                location = restored;
            }
        } else {
            if sh.resize_edges.intersects(ResizeEdge::LEFT) {
                location.x += previous.size.w - state.size.w;
            }
            if sh.resize_edges.intersects(ResizeEdge::TOP) {
                location.y += previous.size.h - state.size.h;
            }
            location += delta;
        }

        let Some(sh) = self.shell_surfaces.get_mut(&id) else {
            return false;
        };
        sh.location = location;
        sh.saved = state;
        if !state.maximized && !state.fullscreen && (previous.maximized || previous.fullscreen) {
            sh.restore = None;
        }
        if !sh.resizing {
            sh.resize_edges = ResizeEdge::NONE;
        }
        previous.fullscreen != state.fullscreen
    }

    fn anchor_transient(&mut self, id: ShellSurfaceId) {
        let Some(SurfaceType::Transient { parent, offset, .. }) = self.shell_surfaces.get(&id).map(|s| s.kind) else {
            return;
        };
        let Some(parent_location) = self.shell_surfaces.get(&parent).map(|p| p.location) else {
            return;
        };
        if let Some(sh) = self.shell_surfaces.get_mut(&id) {
            sh.location = parent_location + offset;
        }
    }

    fn unmap_window(&mut self, id: ShellSurfaceId) {
        let Some(sh) = self.shell_surfaces.get_mut(&id) else {
            return;
        };
        if !sh.mapped {
            return;
        }
        sh.mapped = false;
        let surface = sh.surface;
        let views: SmallVec<[ViewId; 8]> = sh
            .views
            .values()
            .flat_map(|v| std::iter::once(v.view).chain(v.backdrop))
            .collect();
        for view in views {
            self.scene.remove_from_layer(view);
        }
        if let Some(s) = self.surfaces.get_mut(&surface) {
            s.mapped = false;
        }
        self.dismiss_popups_of(surface);
        debug!(parent: &self.span, shell_surface = %id, "unmapped");
        self.push_event(ShellEvent::Unmapped(surface));
        self.surface_unavailable(surface);

        // transient children go away with their parent
        let children: SmallVec<[ShellSurfaceId; 4]> = self
            .shell_surfaces
            .values()
            .filter(|s| matches!(s.kind, SurfaceType::Transient { parent, .. } if parent == id))
            .map(|s| s.id)
            .collect();
        for child in children {
            self.unmap_window(child);
        }
        self.refresh_pointer_focus();
    }

    /// Stack the window (and its transient children) on top of its layer
    pub fn raise(&mut self, id: ShellSurfaceId) {
        let Some(sh) = self.shell_surfaces.get(&id) else {
            return;
        };
        if !sh.mapped {
            return;
        }
        let views: SmallVec<[OutputViews; 4]> = sh.views.values().copied().collect();
        for views in views {
            if let Some(backdrop) = views.backdrop {
                self.scene.raise_on_top(backdrop);
            }
            self.scene.raise_on_top(views.view);
        }
        let children: SmallVec<[ShellSurfaceId; 4]> = self
            .shell_surfaces
            .values()
            .filter(|s| matches!(s.kind, SurfaceType::Transient { parent, .. } if parent == id))
            .map(|s| s.id)
            .collect();
        for child in children {
            if child != id {
                self.raise(child);
            }
        }
        let surface = self.shell_surfaces.get(&id).map(|s| s.surface);
        if let Some(surface) = surface {
            self.restack_popups_of(surface);
        }
    }

    /// Start an interactive move of the window with the pointer of `seat`
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn move_surface(&mut self, id: ShellSurfaceId, seat: SeatId) -> Option<Serial> {
        let grab = self.move_grab(id, seat)?;
        Some(self.start_grab(seat, grab, None))
    }

    pub(crate) fn move_grab(&self, id: ShellSurfaceId, seat: SeatId) -> Option<MoveGrab> {
        let sh = self.shell_surfaces.get(&id)?;
        if !sh.mapped || sh.kind.is_fullscreen() || sh.kind.is_maximized() {
            return None;
        }
        Some(MoveGrab {
            start_data: self.grab_start_data(seat)?,
            window: id,
            initial_window_location: sh.location,
        })
    }

    /// Start an interactive resize of the window with the pointer of `seat`
    ///
    /// `edges` is the raw edge mask of the request; it is validated before anything
    /// else happens.
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn resize_surface(&mut self, id: ShellSurfaceId, seat: SeatId, edges: u32) -> Result<Option<Serial>, ShellError> {
        let edges = ResizeEdge::validate(edges)?;
        let Some(sh) = self.shell_surfaces.get(&id) else {
            return Ok(None);
        };
        if !sh.mapped || sh.kind.is_fullscreen() || sh.kind.is_maximized() {
            return Ok(None);
        }
        let Some(start_data) = self.grab_start_data(seat) else {
            return Ok(None);
        };
        let grab = ResizeGrab {
            start_data,
            window: id,
            edges,
            initial_window_location: sh.location,
            initial_window_size: sh.saved.size,
            last_window_size: sh.saved.size,
        };
        Ok(Some(self.start_grab(seat, grab, None)))
    }

    /// Hide the window without destroying it
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn minimize(&mut self, id: ShellSurfaceId) {
        let Some(sh) = self.shell_surfaces.get_mut(&id) else {
            return;
        };
        if !sh.mapped || sh.minimized {
            return;
        }
        sh.minimized = true;
        let surface = sh.surface;
        self.restack_window(id);
        self.surface_unavailable(surface);
        self.refresh_pointer_focus();
    }

    /// Show a minimized window again, on top of its layer, and activate it
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn restore(&mut self, id: ShellSurfaceId) {
        let Some(sh) = self.shell_surfaces.get_mut(&id) else {
            return;
        };
        if !sh.minimized {
            return;
        }
        sh.minimized = false;
        let surface = sh.surface;
        self.restack_window(id);
        self.activate(surface);
        self.refresh_pointer_focus();
    }

    /// Show the busy cursor while the pointer of `seat` is over the window
    pub fn set_busy_cursor(&mut self, id: ShellSurfaceId, seat: SeatId) -> Option<Serial> {
        let grab = self.busy_grab(id, seat)?;
        Some(self.start_grab(seat, grab, Some(CursorIcon::Wait)))
    }

    fn busy_grab(&self, id: ShellSurfaceId, seat: SeatId) -> Option<BusyGrab> {
        let sh = self.shell_surfaces.get(&id)?;
        if !sh.mapped {
            return None;
        }
        Some(BusyGrab {
            start_data: self.grab_start_data(seat)?,
            window: id,
            surface: sh.surface,
        })
    }

    // the busy grab to install when the pointer of `seat` enters an unresponsive window
    pub(crate) fn busy_grab_under(&self, seat: SeatId, focus: Option<ViewId>) -> Option<BusyGrab> {
        let surface = self.scene.view(focus?)?.surface()?;
        let id = self.shell_surface_of(surface)?;
        if self.shell_surfaces.get(&id)?.responsive {
            return None;
        }
        self.busy_grab(id, seat)
    }

    /// Mark the client of the window as responsive or not
    ///
    /// Pointers hovering an unresponsive window show the busy cursor; it goes away as soon
    /// as the window is responsive again.
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn set_responsive(&mut self, id: ShellSurfaceId, responsive: bool) {
        let Some(sh) = self.shell_surfaces.get_mut(&id) else {
            return;
        };
        if sh.responsive == responsive {
            return;
        }
        sh.responsive = responsive;
        let surface = sh.surface;
        if responsive {
            let busy = sh.busy_seats.clone();
            for seat in busy {
                self.end_grab(seat);
            }
        } else {
            let hovering: SmallVec<[SeatId; 4]> = self
                .seats
                .values()
                .filter(|s| s.pointer.focused_surface == Some(surface) && !s.pointer.is_grabbed())
                .map(|s| s.id)
                .collect();
            for seat in hovering {
                self.set_busy_cursor(id, seat);
            }
        }
    }

    /// Check that the client of the window is alive
    ///
    /// Emits a [`ShellEvent::Ping`]; the client has to answer with [`Shell::pong`] before
    /// the configured timeout. While a ping is unanswered, no new one is sent.
    pub fn ping(&mut self, id: ShellSurfaceId, now: Time) -> Option<Serial> {
        let sh = self.shell_surfaces.get(&id)?;
        if let Some(ping) = sh.ping {
            return Some(ping.serial);
        }
        let surface = sh.surface;
        let serial = self.serials.next_serial();
        if let Some(sh) = self.shell_surfaces.get_mut(&id) {
            sh.ping = Some(PendingPing { serial, sent: now });
        }
        self.push_event(ShellEvent::Ping { surface, serial });
        Some(serial)
    }

    /// The client answered a ping
    pub fn pong(&mut self, surface: SurfaceId, serial: Serial) {
        let Some(id) = self.shell_surface_of(surface) else {
            return;
        };
        let Some(sh) = self.shell_surfaces.get_mut(&id) else {
            return;
        };
        if sh.ping.map(|p| p.serial) != Some(serial) {
            trace!(parent: &self.span, %surface, %serial, "stale pong");
            return;
        }
        sh.ping = None;
        self.set_responsive(id, true);
    }

    pub(crate) fn check_pings(&mut self, now: Time) {
        let timeout = self.config.ping_timeout;
        let late: SmallVec<[ShellSurfaceId; 4]> = self
            .shell_surfaces
            .values()
            .filter(|s| s.responsive)
            .filter(|s| matches!(s.ping, Some(p) if p.sent.duration_since(now) > timeout))
            .map(|s| s.id)
            .collect();
        for id in late {
            debug!(parent: &self.span, shell_surface = %id, "unresponsive");
            self.set_responsive(id, false);
        }
    }

    /// Move the window to another workspace
    pub fn move_to_workspace(&mut self, id: ShellSurfaceId, workspace: WorkspaceId) {
        if workspace.index() >= self.workspaces.len() {
            return;
        }
        self.set_window_workspace(id, workspace);
        let children: SmallVec<[ShellSurfaceId; 4]> = self
            .shell_surfaces
            .values()
            .filter(|s| matches!(s.kind, SurfaceType::Transient { parent, .. } if parent == id))
            .map(|s| s.id)
            .collect();
        for child in children {
            self.move_to_workspace(child, workspace);
        }
        if let Some(surface) = self.shell_surfaces.get(&id).map(|s| s.surface) {
            if self.apps_scope.active() == Some(surface) && !self.is_workspace_shown(workspace) {
                self.surface_unavailable(surface);
            }
        }
        self.refresh_pointer_focus();
    }

    fn set_window_workspace(&mut self, id: ShellSurfaceId, workspace: WorkspaceId) {
        let Some(sh) = self.shell_surfaces.get_mut(&id) else {
            return;
        };
        sh.workspace = workspace;
        let surface = sh.surface;
        if let Some(s) = self.surfaces.get_mut(&surface) {
            s.workspace_mask = workspace.mask();
        }
        self.sync_window_views(id);
    }

    pub(crate) fn destroy_shell_surface(&mut self, id: ShellSurfaceId) {
        let seats: SmallVec<[SeatId; 4]> = self
            .seats
            .values()
            .filter(|s| s.pointer.grab_shell_surface() == Some(id))
            .map(|s| s.id)
            .collect();
        for seat in seats {
            self.cancel_grab(seat);
        }

        self.unmap_window(id);

        let children: SmallVec<[ShellSurfaceId; 4]> = self
            .shell_surfaces
            .values()
            .filter(|s| matches!(s.kind, SurfaceType::Transient { parent, .. } if parent == id))
            .map(|s| s.id)
            .collect();
        for child in children {
            if let Some(sh) = self.shell_surfaces.get_mut(&child) {
                sh.kind = SurfaceType::None;
            }
            self.update_activable(child);
        }

        let Some(sh) = self.shell_surfaces.shift_remove(&id) else {
            return;
        };
        self.shell_surface_of.remove(&sh.surface);
        if matches!(
            sh.kind,
            SurfaceType::Toplevel {
                maximized: false,
                fullscreen: false,
                ..
            }
        ) && sh.saved.size.w > 0
        {
            if let Some(key) = self.position_key(sh.surface) {
                self.positions.insert(key, sh.location);
            }
        }
        for views in sh.views.values() {
            self.scene.destroy_view(views.view);
            if let Some(backdrop) = views.backdrop {
                self.scene.destroy_view(backdrop);
            }
        }
        debug!(parent: &self.span, shell_surface = %id, "shell surface destroyed");
    }

    fn position_key(&self, surface: SurfaceId) -> Option<(String, String)> {
        let s = self.surfaces.get(&surface)?;
        Some((s.app_id.clone()?, s.title.clone().unwrap_or_default()))
    }

    fn cached_location(&self, surface: SurfaceId) -> Option<Point<i32, Logical>> {
        self.positions.get(&self.position_key(surface)?).copied()
    }

    pub(crate) fn grab_start_data(&self, seat: SeatId) -> Option<GrabStartData> {
        let pointer = self.pointer(seat)?;
        Some(GrabStartData {
            focus: pointer.focus,
            button: pointer.pressed.first().copied().unwrap_or(0),
            location: pointer.location,
        })
    }

    /// Ask the client of a window to resize its surface
    pub(crate) fn configure_window(&mut self, id: ShellSurfaceId, size: Size<i32, Logical>, edges: ResizeEdge) {
        if let Some(surface) = self.shell_surfaces.get(&id).map(|s| s.surface) {
            self.push_event(ShellEvent::Configure { surface, size, edges });
        }
    }

    pub(crate) fn set_resizing(&mut self, id: ShellSurfaceId, edges: ResizeEdge, resizing: bool) {
        if let Some(sh) = self.shell_surfaces.get_mut(&id) {
            sh.resizing = resizing;
            if resizing {
                sh.resize_edges = edges;
            }
        }
    }

    pub(crate) fn set_busy_seat(&mut self, id: ShellSurfaceId, seat: SeatId, busy: bool) {
        if let Some(sh) = self.shell_surfaces.get_mut(&id) {
            sh.busy_seats.retain(|s| *s != seat);
            if busy {
                sh.busy_seats.push(seat);
            }
        }
    }

    /// The rectangle windows are kept in: the available geometry of the window's output
    pub(crate) fn window_bounds(&self, id: ShellSurfaceId) -> Option<Rectangle<i32, Logical>> {
        let sh = self.shell_surfaces.get(&id)?;
        match sh.output.and_then(|o| self.outputs.get(&o)) {
            Some(output) => Some(output.available),
            None => Some(Rectangle::from_loc_and_size(sh.location, sh.saved.size)),
        }
    }

    pub(crate) fn snap_window_location(&self, id: ShellSurfaceId, location: Point<i32, Logical>) -> Point<i32, Logical> {
        let (Some(sh), Some(bounds)) = (self.shell_surfaces.get(&id), self.window_bounds(id)) else {
            return location;
        };
        snap_location(location, sh.saved.size, bounds, self.config.snap_threshold)
    }

    pub(crate) fn set_window_location(&mut self, id: ShellSurfaceId, location: Point<i32, Logical>) {
        let Some(sh) = self.shell_surfaces.get_mut(&id) else {
            return;
        };
        let delta = location - sh.location;
        sh.location = location;
        self.sync_window_views(id);

        // transient children follow
        let children: SmallVec<[ShellSurfaceId; 4]> = self
            .shell_surfaces
            .values()
            .filter(|s| matches!(s.kind, SurfaceType::Transient { parent, .. } if parent == id))
            .map(|s| s.id)
            .collect();
        for child in children {
            if let Some(location) = self.shell_surfaces.get(&child).map(|c| c.location + delta) {
                self.set_window_location(child, location);
            }
        }
    }

    pub(crate) fn create_window_view(&mut self, id: ShellSurfaceId, output: OutputId) {
        let Some(surface) = self.shell_surfaces.get(&id).map(|s| s.surface) else {
            return;
        };
        let view = self.scene.create_view(ViewKind::Surface(surface));
        if let Some(v) = self.scene.view_mut(view) {
            v.set_output(Some(output));
        }
        if let Some(sh) = self.shell_surfaces.get_mut(&id) {
            sh.views.insert(output, OutputViews { view, backdrop: None });
        }
        self.sync_window_views(id);
        self.restack_window(id);
    }

    pub(crate) fn destroy_window_view(&mut self, id: ShellSurfaceId, output: OutputId) {
        let Some(views) = self.shell_surfaces.get_mut(&id).and_then(|s| s.views.shift_remove(&output)) else {
            return;
        };
        self.scene.destroy_view(views.view);
        if let Some(backdrop) = views.backdrop {
            self.scene.destroy_view(backdrop);
        }
    }

    // bring the views of a window in line with its state
    pub(crate) fn sync_window_views(&mut self, id: ShellSurfaceId) {
        let Some(sh) = self.shell_surfaces.get(&id) else {
            return;
        };
        let size = sh.saved.size;
        let fullscreen_area = if sh.kind.is_fullscreen() {
            sh.output.and_then(|o| self.outputs.get(&o)).map(|o| o.geometry)
        } else {
            None
        };
        let placement = fullscreen_area.map(|area| fullscreen_placement(size, area));
        let location = placement.map(|p| p.location).unwrap_or(sh.location);
        let workspace = sh.workspace;
        let views: SmallVec<[(OutputId, OutputViews); 4]> = sh.views.iter().map(|(o, v)| (*o, *v)).collect();

        for (output, mut views) in views {
            let root = self.workspace_root(workspace, output);
            self.scene.set_transform_parent(views.view, root);
            if let Some(view) = self.scene.view_mut(views.view) {
                view.set_position(location.to_f64());
                view.set_size(size);
                view.set_transform(placement.and_then(|p| p.transform));
            }

            match (fullscreen_area, views.backdrop) {
                (Some(area), backdrop) => {
                    let backdrop = backdrop.unwrap_or_else(|| {
                        self.scene.create_view(ViewKind::Backdrop {
                            color: self.config.backdrop_color,
                        })
                    });
                    self.scene.set_transform_parent(backdrop, root);
                    if let Some(view) = self.scene.view_mut(backdrop) {
                        view.set_output(Some(output));
                        view.set_position(area.loc.to_f64());
                        view.set_size(area.size);
                    }
                    views.backdrop = Some(backdrop);
                }
                (None, Some(backdrop)) => {
                    self.scene.destroy_view(backdrop);
                    views.backdrop = None;
                }
                (None, None) => {}
            }
            if let Some(sh) = self.shell_surfaces.get_mut(&id) {
                sh.views.insert(output, views);
            }
        }
    }

    // put the views of a window in the layer matching its state
    pub(crate) fn restack_window(&mut self, id: ShellSurfaceId) {
        let Some(sh) = self.shell_surfaces.get(&id) else {
            return;
        };
        let views: SmallVec<[OutputViews; 4]> = sh.views.values().copied().collect();
        let layer = if !sh.mapped {
            None
        } else if sh.minimized {
            Some(LayerKind::Minimized)
        } else {
            match sh.kind {
                SurfaceType::None => None,
                SurfaceType::Toplevel { fullscreen: true, .. } => Some(LayerKind::Fullscreen),
                SurfaceType::Toplevel { .. } => Some(LayerKind::Apps),
                SurfaceType::Transient { parent, .. } => Some(self.window_layer(parent).unwrap_or(LayerKind::Apps)),
            }
        };

        for views in views {
            match layer {
                Some(layer) => {
                    if let Some(backdrop) = views.backdrop {
                        self.scene.add_view(layer, backdrop);
                    }
                    self.scene.add_view(layer, views.view);
                }
                None => {
                    self.scene.remove_from_layer(views.view);
                    if let Some(backdrop) = views.backdrop {
                        self.scene.remove_from_layer(backdrop);
                    }
                }
            }
        }

        // transient children stay with their parent
        let children: SmallVec<[ShellSurfaceId; 4]> = self
            .shell_surfaces
            .values()
            .filter(|s| s.mapped && matches!(s.kind, SurfaceType::Transient { parent, .. } if parent == id))
            .map(|s| s.id)
            .collect();
        for child in children {
            if child != id {
                self.restack_window(child);
            }
        }
        let surface = self.shell_surfaces.get(&id).map(|s| s.surface);
        if let Some(surface) = surface {
            self.restack_popups_of(surface);
        }
    }

    fn window_layer(&self, id: ShellSurfaceId) -> Option<LayerKind> {
        let sh = self.shell_surfaces.get(&id)?;
        let view = sh.views.values().next()?.view;
        self.scene.view(view)?.layer()
    }

    /// Re-place the windows of a removed output on the remaining ones
    pub(crate) fn evacuate_output(&mut self, removed: OutputId, old_geometry: Rectangle<i32, Logical>) {
        let ids: SmallVec<[ShellSurfaceId; 8]> = self.shell_surfaces.keys().copied().collect();
        for id in ids {
            self.destroy_window_view(id, removed);
            let Some(sh) = self.shell_surfaces.get(&id) else {
                continue;
            };
            if sh.output != Some(removed) {
                continue;
            }
            let workspace = sh.workspace;
            let new_output = self.select_output(workspace);
            let Some(target) = new_output.and_then(|o| self.outputs.get(&o)).map(|o| (o.id, o.geometry, o.available)) else {
                if let Some(sh) = self.shell_surfaces.get_mut(&id) {
                    sh.output = None;
                }
                continue;
            };
            let (output, geometry, available) = target;
            let Some(sh) = self.shell_surfaces.get_mut(&id) else {
                continue;
            };
            let carried = sh.location - old_geometry.loc + available.loc;
            sh.location = clamp_into(carried, sh.saved.size, available);
            sh.output = Some(output);
            let kind = sh.kind;
            if let SurfaceType::Toplevel {
                maximized,
                fullscreen,
                output: Some(_),
            } = kind
            {
                sh.kind = SurfaceType::Toplevel {
                    maximized,
                    fullscreen,
                    output: Some(output),
                };
                if maximized {
                    sh.location = available.loc;
                    self.configure_window(id, available.size, ResizeEdge::NONE);
                } else if fullscreen {
                    self.configure_window(id, geometry.size, ResizeEdge::NONE);
                }
            }
            self.sync_window_views(id);
        }
    }
}
