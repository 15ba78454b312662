//! Outputs
//!
//! An [`Output`] is a rectangle of the global compositor space shown on one screen. The
//! shell keeps track of the geometry of each output and of the part of it not covered
//! by panels, the *available geometry*, where windows are placed, maximized and snapped.
//!
//! Outputs are created with [`Shell::add_output`](crate::shell::Shell::add_output) and
//! referred to by their [`OutputId`], which stays stable for the lifetime of the output
//! and can serve as a per-client resource key.

use smallvec::SmallVec;
use tracing::{debug, instrument};

use crate::{
    scene::{ViewId, ViewKind},
    shell::{ResizeEdge, Shell, ShellSurfaceId, SurfaceType},
    utils::{ids::id_type, Logical, Rectangle},
};

id_type!(
    /// Handle to an [`Output`]
    OutputId,
    "output"
);

/// A screen of the compositor
#[derive(Debug)]
pub struct Output {
    pub(crate) id: OutputId,
    pub(crate) name: String,
    pub(crate) geometry: Rectangle<i32, Logical>,
    pub(crate) available: Rectangle<i32, Logical>,
    pub(crate) root: ViewId,
    pub(crate) panels: SmallVec<[ViewId; 4]>,
    pub(crate) overlays: Vec<ViewId>,
    pub(crate) background: Option<ViewId>,
}

impl Output {
    pub(crate) fn new(id: OutputId, name: String, geometry: Rectangle<i32, Logical>, root: ViewId) -> Self {
        Output {
            id,
            name,
            geometry,
            available: geometry,
            root,
            panels: SmallVec::new(),
            overlays: Vec::new(),
            background: None,
        }
    }

    /// Handle of this output
    pub fn id(&self) -> OutputId {
        self.id
    }

    /// Name of this output, as given by the embedder
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Geometry in the global compositor space
    pub fn geometry(&self) -> Rectangle<i32, Logical> {
        self.geometry
    }

    /// The part of the geometry not reserved by panels
    pub fn available_geometry(&self) -> Rectangle<i32, Logical> {
        self.available
    }

    /// The root transform view of this output
    pub fn root_view(&self) -> ViewId {
        self.root
    }

    /// Views of the panels docked on this output
    pub fn panels(&self) -> &[ViewId] {
        &self.panels
    }

    /// Views of the overlays shown on this output
    pub fn overlays(&self) -> &[ViewId] {
        &self.overlays
    }

    /// The view of the background of this output, if any
    pub fn background(&self) -> Option<ViewId> {
        self.background
    }
}

/// Compute the available geometry of an output given the global rectangles its panels
/// reserve
///
/// Wide panels are docked to the top or bottom edge, depending on which half of the
/// output their center lies in; tall panels to the left or right edge. Each panel
/// removes the strip it covers from that edge.
pub fn available_geometry<I>(geometry: Rectangle<i32, Logical>, panels: I) -> Rectangle<i32, Logical>
where
    I: IntoIterator<Item = Rectangle<i32, Logical>>,
{
    let center = geometry.center();
    let (mut left, mut top) = (geometry.loc.x, geometry.loc.y);
    let (mut right, mut bottom) = (geometry.right(), geometry.bottom());

    for panel in panels {
        let Some(panel) = panel.intersection(geometry) else {
            continue;
        };
        let panel_center = panel.center();
        if panel.size.w >= panel.size.h {
            if panel_center.y < center.y {
                top = top.max(panel.bottom());
            } else {
                bottom = bottom.min(panel.loc.y);
            }
        } else if panel_center.x < center.x {
            left = left.max(panel.right());
        } else {
            right = right.min(panel.loc.x);
        }
    }

    Rectangle::from_extremities((left, top), (right.max(left), bottom.max(top)))
}

impl Shell {
    /// Register a new output covering `geometry` in the global space
    ///
    /// It shows the last activated workspace, and every window gets a view on it.
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn add_output(&mut self, name: &str, geometry: Rectangle<i32, Logical>) -> OutputId {
        let id = OutputId::next();
        let root = self.scene.create_view(ViewKind::Root);
        if let Some(view) = self.scene.view_mut(root) {
            view.set_output(Some(id));
        }
        self.outputs
            .insert(id, Output::new(id, name.to_owned(), geometry, root));
        self.attach_workspaces(id);

        let windows: SmallVec<[ShellSurfaceId; 8]> = self.shell_surfaces.keys().copied().collect();
        for window in windows {
            self.create_window_view(window, id);
        }
        self.attach_popups(id);
        debug!(output = %id, "output added");
        self.refresh_pointer_focus();
        id
    }

    /// Remove an output
    ///
    /// Windows shown on it move to the output elected by the usual vote, keeping their
    /// position relative to the output as far as the new available geometry allows.
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn remove_output(&mut self, output: OutputId) {
        self.hide_desktop_grid(output);
        let Some(removed) = self.outputs.shift_remove(&output) else {
            return;
        };
        self.detach_desktop_surfaces(output);
        self.detach_popups(output);
        self.detach_workspaces(output);
        self.evacuate_output(output, removed.geometry);
        self.scene.destroy_view(removed.root);
        debug!(%output, "output removed");
        self.refresh_pointer_focus();
    }

    /// Change the geometry of an output, e.g. after a mode change
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn set_output_geometry(&mut self, output: OutputId, geometry: Rectangle<i32, Logical>) {
        let Some(o) = self.outputs.get_mut(&output) else {
            return;
        };
        if o.geometry == geometry {
            return;
        }
        o.geometry = geometry;
        self.reapply_pan(output);
        self.update_available_geometry(output);

        let fullscreen: SmallVec<[ShellSurfaceId; 2]> = self
            .shell_surfaces
            .values()
            .filter(|s| s.output == Some(output))
            .filter(|s| matches!(s.kind, SurfaceType::Toplevel { fullscreen: true, .. }))
            .map(|s| s.id)
            .collect();
        for window in fullscreen {
            self.configure_window(window, geometry.size, ResizeEdge::NONE);
            self.sync_window_views(window);
        }
        self.refresh_pointer_focus();
    }

    /// Access an output
    pub fn output(&self, output: OutputId) -> Option<&Output> {
        self.outputs.get(&output)
    }

    /// Iterate over the outputs, in registration order
    pub fn outputs(&self) -> impl Iterator<Item = &Output> {
        self.outputs.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output() -> Rectangle<i32, Logical> {
        Rectangle::from_loc_and_size((0, 0), (1920, 1080))
    }

    #[test]
    fn no_panels_keeps_geometry() {
        assert_eq!(available_geometry(output(), []), output());
    }

    #[test]
    fn top_panel() {
        let panel = Rectangle::from_loc_and_size((0, 0), (1920, 30));
        assert_eq!(
            available_geometry(output(), [panel]),
            Rectangle::from_loc_and_size((0, 30), (1920, 1050))
        );
    }

    #[test]
    fn panels_on_every_edge() {
        let panels = [
            Rectangle::from_loc_and_size((0, 0), (1920, 30)),
            Rectangle::from_loc_and_size((0, 1040), (1920, 40)),
            Rectangle::from_loc_and_size((0, 30), (48, 1010)),
            Rectangle::from_loc_and_size((1900, 30), (20, 1010)),
        ];
        assert_eq!(
            available_geometry(output(), panels),
            Rectangle::from_loc_and_size((48, 30), (1852, 1010))
        );
    }

    #[test]
    fn panels_of_other_outputs_are_ignored() {
        let second = Rectangle::from_loc_and_size((1920, 0), (1280, 1024));
        let panel = Rectangle::from_loc_and_size((0, 0), (1920, 30));
        assert_eq!(available_geometry(second, [panel]), second);
    }
}
