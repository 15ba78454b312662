//! Workspaces and the pager
//!
//! Workspaces are laid out on a grid. Each output shows one of them at a time, its
//! *current* workspace, while the others are panned away out of the output's bounds.
//! Every workspace has one [`WorkspaceView`] per output: a root transform view the
//! windows of the workspace are parented to, and a background view.
//!
//! The [`Pager`] records the current workspace of every output and the workspace that
//! was activated last, which new windows are created on.

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::{debug, instrument, trace, warn};

use crate::{
    animation::{Animation, AnimationFrame},
    focus::ScopeKind,
    input::SeatId,
    output::OutputId,
    scene::{Affine, LayerKind, ViewId, ViewKind},
    shell::{grabs::DesktopGridGrab, Shell, ShellEvent},
    surface::WorkspaceMask,
    utils::{Logical, Point, Rectangle, Serial, Time},
};

/// Identifies a workspace by its index, starting from 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct WorkspaceId(usize);

impl WorkspaceId {
    /// Index of the workspace in creation order
    pub fn index(&self) -> usize {
        self.0
    }

    /// The mask designating this workspace alone
    pub fn mask(&self) -> WorkspaceMask {
        // ids are only handed out below MAX_WORKSPACES
        WorkspaceMask(1 << self.0)
    }
}

impl std::fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "workspace@{}", self.0)
    }
}

/// Number of workspaces a [`WorkspaceMask`] can tell apart
pub const MAX_WORKSPACES: usize = u32::BITS as usize;

/// Number of columns and rows of the grid holding `count` workspaces
pub fn grid_size(count: usize) -> (usize, usize) {
    let rows = if count > 2 { 2 } else { 1 };
    let cols = (count + 1).div_ceil(rows);
    (cols, rows)
}

/// Column and row of the workspace at `index` on the grid of `count` workspaces,
/// filled row by row
pub fn grid_position(index: usize, count: usize) -> (usize, usize) {
    let (cols, _) = grid_size(count);
    (index % cols, index / cols)
}

/// The part of a workspace bound to one output
#[derive(Debug)]
pub struct WorkspaceView {
    pub(crate) root: ViewId,
    pub(crate) background: ViewId,
    pub(crate) pan: Point<f64, Logical>,
    pub(crate) animation: Animation<Point<f64, Logical>>,
}

impl WorkspaceView {
    /// The root transform view windows of the workspace are parented to
    pub fn root(&self) -> ViewId {
        self.root
    }

    /// The background view of the workspace
    pub fn background(&self) -> ViewId {
        self.background
    }

    /// The pan offset of the workspace, once any running animation completes
    pub fn pan(&self) -> Point<f64, Logical> {
        self.pan
    }

    /// Whether the pan offset is being animated
    pub fn is_animating(&self) -> bool {
        self.animation.is_running()
    }
}

/// A logical desktop
#[derive(Debug)]
pub struct Workspace {
    pub(crate) id: WorkspaceId,
    pub(crate) grid: (usize, usize),
    pub(crate) views: IndexMap<OutputId, WorkspaceView>,
}

impl Workspace {
    /// Id of the workspace
    pub fn id(&self) -> WorkspaceId {
        self.id
    }

    /// Column and row of the workspace on the grid
    pub fn grid_position(&self) -> (usize, usize) {
        self.grid
    }

    /// The part of the workspace bound to `output`
    pub fn view(&self, output: OutputId) -> Option<&WorkspaceView> {
        self.views.get(&output)
    }

    /// The pan offset of the workspace on `output`
    pub fn pan(&self, output: OutputId) -> Option<Point<f64, Logical>> {
        self.views.get(&output).map(|v| v.pan)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct GridGrab {
    output: OutputId,
    seat: SeatId,
    serial: Serial,
}

/// Which workspace each output shows
#[derive(Debug, Default)]
pub struct Pager {
    current: IndexMap<OutputId, WorkspaceId>,
    last_active: WorkspaceId,
    grid: SmallVec<[OutputId; 2]>,
    grid_grabs: Vec<GridGrab>,
}

impl Pager {
    /// The current workspace of an output
    pub fn current(&self, output: OutputId) -> Option<WorkspaceId> {
        self.current.get(&output).copied()
    }

    /// The workspace activated last, on any output
    pub fn last_active(&self) -> WorkspaceId {
        self.last_active
    }

    /// Whether `workspace` is the current workspace of `output`
    pub fn is_active(&self, workspace: WorkspaceId, output: OutputId) -> bool {
        self.current(output) == Some(workspace)
    }

    /// Whether the desktop grid is shown on `output`
    pub fn is_grid_shown(&self, output: OutputId) -> bool {
        self.grid.contains(&output)
    }
}

// top-left corner of a workspace on the grid, relative to the output
fn grid_offset(grid: (usize, usize), geometry: Rectangle<i32, Logical>) -> Point<f64, Logical> {
    Point::from((
        (grid.0 as i32 * geometry.size.w) as f64,
        (grid.1 as i32 * geometry.size.h) as f64,
    ))
}

impl Shell {
    /// Access the pager
    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    /// All workspaces, in creation order
    pub fn workspaces(&self) -> &[Workspace] {
        &self.workspaces
    }

    /// The workspace at `index`, if it exists
    pub fn workspace(&self, index: usize) -> Option<WorkspaceId> {
        self.workspaces.get(index).map(|w| w.id)
    }

    /// The current workspace of an output
    pub fn current_workspace(&self, output: OutputId) -> Option<WorkspaceId> {
        self.pager.current(output)
    }

    /// Append a new workspace
    ///
    /// Grid positions of all workspaces are recomputed and the pan offsets of every output
    /// are reapplied without animation. Returns `None` once [`MAX_WORKSPACES`] exist.
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn add_workspace(&mut self) -> Option<WorkspaceId> {
        if self.workspaces.len() >= MAX_WORKSPACES {
            warn!("workspace limit reached");
            return None;
        }
        let id = WorkspaceId(self.workspaces.len());
        self.workspaces.push(Workspace {
            id,
            grid: (0, 0),
            views: IndexMap::new(),
        });
        let count = self.workspaces.len();
        for workspace in &mut self.workspaces {
            workspace.grid = grid_position(workspace.id.0, count);
        }

        let outputs: SmallVec<[OutputId; 4]> = self.outputs.keys().copied().collect();
        for output in outputs {
            self.create_workspace_view(id, output);
            self.reapply_pan(output);
        }
        debug!(workspace = %id, "workspace added");
        Some(id)
    }

    /// Make `workspace` the current workspace of `output`
    ///
    /// Every workspace of the output is panned so the target sits at the origin, smoothly
    /// if `animate` is set and the configuration allows it. The most recently active
    /// window of the workspace is activated.
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn activate_workspace(&mut self, workspace: WorkspaceId, output: OutputId, animate: bool) {
        if workspace.0 >= self.workspaces.len() {
            trace!("unknown workspace");
            return;
        }
        let Some(geometry) = self.outputs.get(&output).map(|o| o.geometry) else {
            trace!("unknown output");
            return;
        };
        let previous = self.pager.current.insert(output, workspace);
        self.pager.last_active = workspace;

        let animate = animate
            && self.config.animate_workspace_switch
            && previous.is_some()
            && previous != Some(workspace)
            && !self.pager.is_grid_shown(output);
        let target = grid_offset(self.workspaces[workspace.0].grid, geometry);
        for idx in 0..self.workspaces.len() {
            let pan = grid_offset(self.workspaces[idx].grid, geometry) - target;
            self.set_pan(idx, output, pan, animate);
        }
        if !self.pager.is_grid_shown(output) {
            self.update_workspace_masks(output);
        }

        self.push_event(ShellEvent::WorkspaceActivated { output, workspace });
        self.focus_workspace(workspace);
        self.refresh_pointer_focus();
    }

    /// Switch `output` to the next workspace, wrapping around
    pub fn activate_next_workspace(&mut self, output: OutputId) {
        self.change_workspace(output, 1);
    }

    /// Switch `output` to the previous workspace, wrapping around
    pub fn activate_previous_workspace(&mut self, output: OutputId) {
        self.change_workspace(output, -1);
    }

    /// Switch `output` to the workspace `delta` positions away, wrapping around
    pub fn change_workspace(&mut self, output: OutputId, delta: isize) {
        let count = self.workspaces.len() as isize;
        let Some(current) = self.pager.current(output) else {
            return;
        };
        let next = (current.0 as isize + delta).rem_euclid(count) as usize;
        self.activate_workspace(WorkspaceId(next), output, true);
    }

    /// Whether `workspace` is the current workspace of any output
    pub fn is_workspace_shown(&self, workspace: WorkspaceId) -> bool {
        self.pager.current.values().any(|w| *w == workspace)
    }

    /// Union of the masks of the workspaces currently shown
    pub(crate) fn shown_workspaces_mask(&self) -> WorkspaceMask {
        self.pager
            .current
            .values()
            .fold(WorkspaceMask(0), |mask, w| mask | w.mask())
    }

    pub(crate) fn workspace_root(&self, workspace: WorkspaceId, output: OutputId) -> Option<ViewId> {
        self.workspaces.get(workspace.0)?.views.get(&output).map(|v| v.root)
    }

    fn set_pan(&mut self, idx: usize, output: OutputId, pan: Point<f64, Logical>, animate: bool) {
        let duration = self.config.workspace_switch_duration;
        let easing = self.config.workspace_switch_easing;
        let Some(view) = self.workspaces[idx].views.get_mut(&output) else {
            return;
        };
        view.pan = pan;
        let root = view.root;
        if animate {
            let from = self.scene.view(root).map(|v| v.position()).unwrap_or_default();
            view.animation.set_start(from);
            view.animation.set_target(pan);
            view.animation.set_easing(easing);
            view.animation.run(output, duration);
        } else {
            view.animation.stop();
            if let Some(root) = self.scene.view_mut(root) {
                root.set_position(pan);
            }
        }
    }

    // lay the roots of an output out again, after its geometry or the grid changed
    pub(crate) fn reapply_pan(&mut self, output: OutputId) {
        if self.pager.is_grid_shown(output) {
            self.layout_grid(output);
            return;
        }
        let Some(geometry) = self.outputs.get(&output).map(|o| o.geometry) else {
            return;
        };
        let current = self.pager.current(output).unwrap_or(self.pager.last_active);
        let target = grid_offset(self.workspaces[current.0].grid, geometry);
        for idx in 0..self.workspaces.len() {
            let pan = grid_offset(self.workspaces[idx].grid, geometry) - target;
            self.set_pan(idx, output, pan, false);
            if let Some(view) = self.workspaces[idx].views.get(&output) {
                let (root, background) = (view.root, view.background);
                if let Some(root) = self.scene.view_mut(root) {
                    root.set_transform(None);
                }
                if let Some(background) = self.scene.view_mut(background) {
                    background.set_position(geometry.loc.to_f64());
                    background.set_size(geometry.size);
                }
            }
        }
        self.update_workspace_masks(output);
    }

    // Window locations are global, so a workspace panned away on one output may land on
    // a neighbouring output. Only the current workspace and those sliding in or out are
    // shown; the others are clipped to nothing.
    fn update_workspace_masks(&mut self, output: OutputId) {
        let Some(geometry) = self.outputs.get(&output).map(|o| o.geometry) else {
            return;
        };
        let current = self.pager.current(output);
        for workspace in &self.workspaces {
            let Some(view) = workspace.views.get(&output) else {
                continue;
            };
            let shown = current == Some(workspace.id) || view.animation.is_running();
            let mask = if shown {
                geometry
            } else {
                Rectangle::from_loc_and_size(geometry.loc, (0, 0))
            };
            if let Some(root) = self.scene.view_mut(view.root) {
                root.set_mask(Some(mask));
            }
        }
    }

    /// Advance the pan animations driven by `output`
    pub(crate) fn tick_workspaces(&mut self, output: OutputId, now: Time) {
        if self.pager.is_grid_shown(output) {
            return;
        }
        let span = self.span.clone();
        let mut finished = false;
        for workspace in &mut self.workspaces {
            let Some(view) = workspace.views.get_mut(&output) else {
                continue;
            };
            if view.animation.output() != Some(output) {
                continue;
            }
            let Some(frame) = view.animation.tick(now) else {
                continue;
            };
            if let AnimationFrame::Finished(_) = frame {
                trace!(parent: &span, workspace = %workspace.id, "pan finished");
                finished = true;
            }
            if let Some(root) = self.scene.view_mut(view.root) {
                root.set_position(frame.value());
            }
        }
        if finished {
            self.update_workspace_masks(output);
        }
    }

    pub(crate) fn create_workspace_view(&mut self, workspace: WorkspaceId, output: OutputId) {
        let Some((geometry, output_root)) = self.outputs.get(&output).map(|o| (o.geometry, o.root)) else {
            return;
        };
        let root = self.scene.create_view(ViewKind::Root);
        self.scene.set_transform_parent(root, Some(output_root));
        if let Some(view) = self.scene.view_mut(root) {
            view.set_output(Some(output));
            view.set_mask(Some(geometry));
        }

        // transparent, never takes input
        let background = self.scene.create_view(ViewKind::Backdrop { color: [0.0; 4] });
        self.scene.set_transform_parent(background, Some(root));
        if let Some(view) = self.scene.view_mut(background) {
            view.set_output(Some(output));
            view.set_position(geometry.loc.to_f64());
            view.set_size(geometry.size);
            view.set_input_region(Some(Rectangle::default()));
        }
        self.scene.add_view(LayerKind::Background, background);

        if let Some(ws) = self.workspaces.get_mut(workspace.0) {
            ws.views.insert(
                output,
                WorkspaceView {
                    root,
                    background,
                    pan: Point::default(),
                    animation: Animation::new(Point::default(), Point::default()),
                },
            );
        }
    }

    /// Set up the workspaces and pager for a new output
    pub(crate) fn attach_workspaces(&mut self, output: OutputId) {
        for idx in 0..self.workspaces.len() {
            self.create_workspace_view(WorkspaceId(idx), output);
        }
        let current = self.pager.last_active;
        self.pager.current.insert(output, current);
        self.reapply_pan(output);
    }

    /// Retire the workspace views and paging record of a removed output
    pub(crate) fn detach_workspaces(&mut self, output: OutputId) {
        self.pager.current.shift_remove(&output);
        self.pager.grid.retain(|o| *o != output);
        self.pager.grid_grabs.retain(|g| g.output != output);
        let views: SmallVec<[WorkspaceView; 4]> = self
            .workspaces
            .iter_mut()
            .filter_map(|w| w.views.shift_remove(&output))
            .collect();
        for view in views {
            self.scene.destroy_view(view.background);
            self.scene.destroy_view(view.root);
        }
    }

    // apply the activation rules of a workspace to the apps scope
    fn focus_workspace(&mut self, workspace: WorkspaceId) {
        let mask = workspace.mask();
        if let Some(active) = self.apps_scope.active() {
            if self.is_focus_candidate(active, mask) {
                return;
            }
        }
        let candidate = self
            .apps_scope
            .candidate(|s| self.is_focus_candidate(s, mask));
        match candidate {
            Some(surface) => self.activate(surface),
            None => self.deactivate_scope(ScopeKind::Apps),
        }
    }

    /// Scale the workspaces of `output` down so the whole grid fits on it
    ///
    /// Every seat gets a navigation grab; a click shows the workspace under the pointer.
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn show_desktop_grid(&mut self, output: OutputId) {
        if !self.outputs.contains_key(&output) || self.pager.is_grid_shown(output) {
            return;
        }
        self.pager.grid.push(output);
        self.layout_grid(output);

        let seats: SmallVec<[SeatId; 4]> = self.seats.keys().copied().collect();
        for seat in seats {
            let Some(start_data) = self.grab_start_data(seat) else {
                continue;
            };
            let serial = self.start_grab(seat, DesktopGridGrab { start_data, output }, None);
            self.pager.grid_grabs.push(GridGrab { output, seat, serial });
        }
        self.refresh_pointer_focus();
    }

    /// Go back from the desktop grid to the current workspace of `output`
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn hide_desktop_grid(&mut self, output: OutputId) {
        if !self.pager.is_grid_shown(output) {
            return;
        }
        self.pager.grid.retain(|o| *o != output);
        self.reapply_pan(output);

        let grabs: SmallVec<[GridGrab; 4]> = self.pager.grid_grabs.iter().filter(|g| g.output == output).copied().collect();
        self.pager.grid_grabs.retain(|g| g.output != output);
        for grab in grabs {
            // the grab may already have been replaced
            let _ = self.end_grab_with_serial(grab.seat, grab.serial);
        }
        self.refresh_pointer_focus();
    }

    /// The workspace shown under `location` while the desktop grid of `output` is shown
    pub fn grid_workspace_at(&self, output: OutputId, location: Point<f64, Logical>) -> Option<WorkspaceId> {
        if !self.pager.is_grid_shown(output) {
            return None;
        }
        let geometry = self.outputs.get(&output)?.geometry;
        self.workspaces
            .iter()
            .find(|w| grid_cell(w.grid, self.workspaces.len(), geometry).to_f64().contains(location))
            .map(|w| w.id)
    }

    fn layout_grid(&mut self, output: OutputId) {
        let Some(geometry) = self.outputs.get(&output).map(|o| o.geometry) else {
            return;
        };
        let count = self.workspaces.len();
        let (cols, rows) = grid_size(count);
        let scale = 1.0 / cols.max(rows) as f64;
        let origin = geometry.loc.to_f64();

        for workspace in &mut self.workspaces {
            let Some(view) = workspace.views.get_mut(&output) else {
                continue;
            };
            view.animation.stop();
            let cell = grid_cell(workspace.grid, count, geometry);
            // maps the output origin of the workspace frame onto the cell origin
            let position = cell.loc.to_f64() - Point::from((origin.x * scale, origin.y * scale));
            if let Some(root) = self.scene.view_mut(view.root) {
                root.set_transform(Some(Affine::scale(scale, scale)));
                root.set_position(position);
                root.set_mask(Some(cell));
            }
        }
    }
}

// the rectangle a workspace occupies on the desktop grid of an output
fn grid_cell(grid: (usize, usize), count: usize, geometry: Rectangle<i32, Logical>) -> Rectangle<i32, Logical> {
    let (cols, rows) = grid_size(count);
    let scale = 1.0 / cols.max(rows) as f64;
    let (w, h) = (geometry.size.w as f64 * scale, geometry.size.h as f64 * scale);
    let margin_x = (geometry.size.w as f64 - w * cols as f64) / 2.0;
    let margin_y = (geometry.size.h as f64 - h * rows as f64) / 2.0;
    let loc = Point::<f64, Logical>::from((
        geometry.loc.x as f64 + margin_x + grid.0 as f64 * w,
        geometry.loc.y as f64 + margin_y + grid.1 as f64 * h,
    ));
    Rectangle::from_loc_and_size(loc.to_i32_round(), (w.round() as i32, h.round() as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_layout() {
        assert_eq!(grid_size(1), (2, 1));
        assert_eq!(grid_size(2), (3, 1));
        assert_eq!(grid_size(3), (2, 2));
        assert_eq!(grid_size(4), (3, 2));

        let positions: Vec<_> = (0..4).map(|i| grid_position(i, 4)).collect();
        assert_eq!(positions, vec![(0, 0), (1, 0), (2, 0), (0, 1)]);
    }

    #[test]
    fn grid_cells_are_centered() {
        let geometry = Rectangle::from_loc_and_size((0, 0), (1920, 1080));
        // 3 workspaces: 2x2 grid at half scale, filling the output
        assert_eq!(
            grid_cell((1, 1), 3, geometry),
            Rectangle::from_loc_and_size((960, 540), (960, 540))
        );
        // 4 workspaces: 3x2 grid at a third, centered vertically
        assert_eq!(
            grid_cell((0, 0), 4, geometry),
            Rectangle::from_loc_and_size((0, 180), (640, 360))
        );
    }

    #[test]
    fn workspace_switch_pans_and_wraps() {
        let mut shell = Shell::new(crate::config::ShellConfig {
            workspaces: 3,
            animate_workspace_switch: false,
            ..Default::default()
        });
        let output = shell.add_output("DP-1", Rectangle::from_loc_and_size((0, 0), (1920, 1080)));
        let ws2 = shell.workspace(2).unwrap();

        shell.activate_workspace(ws2, output, true);
        assert_eq!(shell.current_workspace(output), Some(ws2));
        assert_eq!(shell.workspaces()[2].pan(output), Some(Point::from((0.0, 0.0))));
        assert_eq!(shell.workspaces()[0].pan(output), Some(Point::from((0.0, -1080.0))));

        shell.activate_next_workspace(output);
        assert_eq!(shell.current_workspace(output), shell.workspace(0));
        shell.activate_previous_workspace(output);
        assert_eq!(shell.current_workspace(output), Some(ws2));
    }

    #[test]
    fn animated_switch_reaches_target() {
        let mut shell = Shell::new(crate::config::ShellConfig::default());
        let output = shell.add_output("DP-1", Rectangle::from_loc_and_size((0, 0), (1920, 1080)));
        let ws1 = shell.workspace(1).unwrap();
        shell.activate_workspace(ws1, output, true);

        let root = shell.workspaces()[0].view(output).unwrap().root();
        assert!(shell.workspaces()[0].view(output).unwrap().is_animating());
        shell.tick(output, Time::from_millis(0));
        assert_eq!(shell.scene().view(root).unwrap().position(), Point::from((0.0, 0.0)));
        shell.tick(output, Time::from_millis(1000));
        assert_eq!(shell.scene().view(root).unwrap().position(), Point::from((-1920.0, 0.0)));
        assert!(!shell.workspaces()[0].view(output).unwrap().is_animating());
    }
}
