//! Surfaces of the privileged desktop client
//!
//! The desktop client draws the parts of the shell that are not windows: the background
//! of every output, panels docked to their edges, overlays, and the lock screen. The
//! requests placing them are only honored for the client recognized with
//! [`Shell::set_privileged_client`].

use smallvec::SmallVec;
use tracing::{debug, info, instrument, warn};

use crate::{
    focus::ScopeKind,
    input::{pointer::CursorIcon, SeatId},
    output::{available_geometry, OutputId},
    scene::{LayerKind, ViewId, ViewKind},
    surface::{Role, SurfaceId},
    utils::{ClientId, Logical, Point, Rectangle, Serial, Size},
};

use super::{grabs::ClientGrab, ResizeEdge, Shell, ShellError, ShellEvent, ShellSurfaceId, SurfaceType};

/// Edge of an output a panel is docked to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelEdge {
    /// Top edge
    Top,
    /// Bottom edge
    Bottom,
    /// Left edge
    Left,
    /// Right edge
    Right,
}

#[derive(Debug)]
pub(crate) struct DesktopSurface {
    pub(crate) surface: SurfaceId,
    pub(crate) role: Role,
    pub(crate) output: Option<OutputId>,
    pub(crate) view: Option<ViewId>,
    pub(crate) edge: Option<PanelEdge>,
}

// where a panel of `size` sits on an output
fn panel_location(edge: PanelEdge, size: Size<i32, Logical>, geometry: Rectangle<i32, Logical>) -> Point<i32, Logical> {
    match edge {
        PanelEdge::Top | PanelEdge::Left => geometry.loc,
        PanelEdge::Bottom => Point::new(geometry.loc.x, geometry.bottom() - size.h),
        PanelEdge::Right => Point::new(geometry.right() - size.w, geometry.loc.y),
    }
}

impl Shell {
    /// Recognize `client` as the desktop client, allowed to use the privileged requests
    #[instrument(level = "info", parent = &self.span, skip(self))]
    pub fn set_privileged_client(&mut self, client: Option<ClientId>) {
        info!("privileged client changed");
        self.privileged_client = client;
    }

    /// The client allowed to use the privileged requests
    pub fn privileged_client(&self) -> Option<ClientId> {
        self.privileged_client
    }

    fn check_privileged(&self, surface: SurfaceId) -> Result<(), ShellError> {
        let client = self
            .surfaces
            .get(&surface)
            .ok_or(ShellError::UnknownSurface(surface))?
            .client;
        if self.privileged_client != Some(client) {
            warn!(parent: &self.span, %client, %surface, "privileged request refused");
            return Err(ShellError::NotPrivileged(client));
        }
        Ok(())
    }

    // give `surface` its role and a view on `output`, replacing any previous placement
    fn place_desktop_surface(
        &mut self,
        surface: SurfaceId,
        role: Role,
        output: OutputId,
        edge: Option<PanelEdge>,
    ) -> Result<ViewId, ShellError> {
        self.check_privileged(surface)?;
        if let Some(s) = self.surfaces.get_mut(&surface) {
            s.set_role(role)?;
            s.mapped = true;
        }
        self.destroy_desktop_surface(surface);

        let view = self.scene.create_view(ViewKind::Surface(surface));
        let root = self.outputs.get(&output).map(|o| o.root);
        self.scene.set_transform_parent(view, root);
        if let Some(v) = self.scene.view_mut(view) {
            v.set_output(Some(output));
        }
        self.desktop_surfaces.insert(
            surface,
            DesktopSurface {
                surface,
                role,
                output: Some(output),
                view: Some(view),
                edge,
            },
        );
        self.layout_desktop_surface(surface);
        self.push_event(ShellEvent::Mapped(surface));
        Ok(view)
    }

    fn layout_desktop_surface(&mut self, surface: SurfaceId) {
        let Some(d) = self.desktop_surfaces.get(&surface) else {
            return;
        };
        let (Some(view), Some(geometry)) = (d.view, d.output.and_then(|o| self.outputs.get(&o)).map(|o| o.geometry))
        else {
            return;
        };
        let size = self.surfaces.get(&surface).map(|s| s.size).unwrap_or_default();
        let location = match d.edge {
            Some(edge) => panel_location(edge, size, geometry),
            None => geometry.loc,
        };
        if let Some(v) = self.scene.view_mut(view) {
            v.set_position(location.to_f64());
            v.set_size(size);
        }
    }

    /// Use `surface` as the background of `output`
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn set_background(&mut self, surface: SurfaceId, output: OutputId) -> Result<(), ShellError> {
        if !self.outputs.contains_key(&output) {
            return Ok(());
        }
        let previous = self.outputs.get(&output).and_then(|o| o.background);
        if let Some(previous) = previous.and_then(|v| self.scene.view(v)).and_then(|v| v.surface()) {
            if previous != surface {
                self.check_privileged(surface)?;
                self.destroy_desktop_surface(previous);
            }
        }
        let view = self.place_desktop_surface(surface, Role::Background, output, None)?;
        self.scene.add_view(LayerKind::BaseBackground, view);
        if let Some(o) = self.outputs.get_mut(&output) {
            o.background = Some(view);
        }
        Ok(())
    }

    /// Dock `surface` as a panel to an edge of `output`
    ///
    /// The strip it covers is removed from the available geometry of the output.
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn set_panel(&mut self, surface: SurfaceId, output: OutputId, edge: PanelEdge) -> Result<(), ShellError> {
        if !self.outputs.contains_key(&output) {
            return Ok(());
        }
        let view = self.place_desktop_surface(surface, Role::Panel, output, Some(edge))?;
        self.scene.add_view(LayerKind::Panels, view);
        if let Some(o) = self.outputs.get_mut(&output) {
            o.panels.push(view);
        }
        self.update_available_geometry(output);
        self.refresh_pointer_focus();
        Ok(())
    }

    /// Show `surface` above everything on `output`
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn set_overlay(&mut self, surface: SurfaceId, output: OutputId) -> Result<(), ShellError> {
        if !self.outputs.contains_key(&output) {
            return Ok(());
        }
        let view = self.place_desktop_surface(surface, Role::Overlay, output, None)?;
        self.scene.add_view(LayerKind::Overlay, view);
        if let Some(o) = self.outputs.get_mut(&output) {
            o.overlays.push(view);
        }
        self.refresh_pointer_focus();
        Ok(())
    }

    /// Use `surface` as the lock screen on `output`
    ///
    /// It is only shown while the session is locked, and then receives the keyboard focus.
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn set_lock_surface(&mut self, surface: SurfaceId, output: OutputId) -> Result<(), ShellError> {
        if !self.outputs.contains_key(&output) {
            return Ok(());
        }
        let view = self.place_desktop_surface(surface, Role::Lock, output, None)?;
        if self.locked {
            self.scene.add_view(LayerKind::Overlay, view);
            self.activate(surface);
            self.refresh_pointer_focus();
        }
        Ok(())
    }

    /// Lock the session
    ///
    /// Session content is hidden, every seat follows the lock screen and pointer grabs
    /// are cancelled.
    #[instrument(level = "info", parent = &self.span, skip(self))]
    pub fn lock(&mut self) {
        if self.locked {
            return;
        }
        self.locked = true;
        info!("session locked");

        let seats: SmallVec<[SeatId; 4]> = self.seats.keys().copied().collect();
        for seat in &seats {
            self.cancel_grab(*seat);
            self.end_grab(*seat);
        }
        for kind in LayerKind::ALL.iter().filter(|k| k.is_session_content()) {
            self.scene.set_layer_visible(*kind, false);
        }
        let locks: SmallVec<[(SurfaceId, ViewId); 2]> = self
            .desktop_surfaces
            .values()
            .filter(|d| d.role == Role::Lock)
            .filter_map(|d| Some((d.surface, d.view?)))
            .collect();
        for (_, view) in &locks {
            self.scene.add_view(LayerKind::Overlay, *view);
        }
        self.rebind_seats(&seats, ScopeKind::Locked);
        if let Some((surface, _)) = locks.first() {
            self.activate(*surface);
        }
        self.refresh_pointer_focus();
    }

    /// Unlock the session, giving the keyboard focus back to the active application
    #[instrument(level = "info", parent = &self.span, skip(self))]
    pub fn unlock(&mut self) {
        if !self.locked {
            return;
        }
        self.locked = false;
        info!("session unlocked");

        for kind in LayerKind::ALL.iter().filter(|k| k.is_session_content()) {
            if *kind != LayerKind::Dashboard {
                self.scene.set_layer_visible(*kind, true);
            }
        }
        let locks: SmallVec<[ViewId; 2]> = self
            .desktop_surfaces
            .values()
            .filter(|d| d.role == Role::Lock)
            .filter_map(|d| d.view)
            .collect();
        for view in locks {
            self.scene.remove_from_layer(view);
        }
        self.deactivate_scope(ScopeKind::Locked);

        let seats: SmallVec<[SeatId; 4]> = self.seats.keys().copied().collect();
        self.rebind_seats(&seats, ScopeKind::Apps);
        self.refresh_pointer_focus();
    }

    fn rebind_seats(&mut self, seats: &[SeatId], scope: ScopeKind) {
        let other = match scope {
            ScopeKind::Apps => ScopeKind::Locked,
            ScopeKind::Locked => ScopeKind::Apps,
        };
        for seat in seats {
            self.scope_mut(other).unbind_seat(*seat);
            self.scope_mut(scope).bind_seat(*seat);
            if let Some(s) = self.seats.get_mut(seat) {
                s.scope = scope;
            }
            let active = self.scope(scope).active();
            self.set_keyboard_focus(*seat, active);
        }
    }

    /// Forward the pointer events of `seat` to `surface` until the grab is ended
    ///
    /// Only available to the privileged client, e.g. for a launcher following the pointer.
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn start_client_grab(&mut self, seat: SeatId, surface: SurfaceId) -> Result<Option<Serial>, ShellError> {
        self.check_privileged(surface)?;
        let view = self
            .scene
            .views()
            .find(|v| v.surface() == Some(surface) && v.layer().is_some())
            .map(|v| v.id());
        let (Some(view), Some(start_data)) = (view, self.grab_start_data(seat)) else {
            return Ok(None);
        };
        Ok(Some(self.start_grab(seat, ClientGrab { start_data, view }, Some(CursorIcon::Default))))
    }

    /// End a grab started with [`Shell::start_client_grab`]
    pub fn end_client_grab(&mut self, seat: SeatId, serial: Serial) -> Result<(), ShellError> {
        Ok(self.end_grab_with_serial(seat, serial)?)
    }

    /// Recompute the available geometry of `output` from its panels
    ///
    /// Maximized windows on the output are asked to follow.
    pub(crate) fn update_available_geometry(&mut self, output: OutputId) {
        let Some(o) = self.outputs.get(&output) else {
            return;
        };
        let panels: SmallVec<[Rectangle<i32, Logical>; 4]> = o
            .panels
            .iter()
            .filter_map(|view| {
                let v = self.scene.view(*view)?;
                let region = v.input_region();
                let loc = self.scene.map_to_global(*view, region.loc.to_f64())?;
                Some(Rectangle::from_loc_and_size(loc.to_i32_round(), region.size))
            })
            .collect();
        let available = available_geometry(o.geometry, panels);
        if available == o.available {
            return;
        }
        debug!(parent: &self.span, %output, ?available, "available geometry changed");
        if let Some(o) = self.outputs.get_mut(&output) {
            o.available = available;
        }

        let maximized: SmallVec<[ShellSurfaceId; 4]> = self
            .shell_surfaces
            .values()
            .filter(|s| s.output == Some(output))
            .filter(|s| matches!(s.kind, SurfaceType::Toplevel { maximized: true, .. }))
            .map(|s| s.id)
            .collect();
        for window in maximized {
            self.configure_window(window, available.size, ResizeEdge::NONE);
        }
    }

    pub(crate) fn desktop_surface_committed(&mut self, surface: SurfaceId) {
        let Some(d) = self.desktop_surfaces.get(&surface) else {
            return;
        };
        let (role, output) = (d.role, d.output);
        self.layout_desktop_surface(surface);
        if let (Role::Panel, Some(output)) = (role, output) {
            self.update_available_geometry(output);
        }
    }

    pub(crate) fn detach_desktop_surfaces(&mut self, output: OutputId) {
        let views: SmallVec<[ViewId; 4]> = self
            .desktop_surfaces
            .values_mut()
            .filter(|d| d.output == Some(output))
            .filter_map(|d| {
                d.output = None;
                d.view.take()
            })
            .collect();
        for view in views {
            self.scene.destroy_view(view);
        }
    }

    pub(crate) fn destroy_desktop_surface(&mut self, surface: SurfaceId) {
        let Some(d) = self.desktop_surfaces.shift_remove(&surface) else {
            return;
        };
        let Some(view) = d.view else {
            return;
        };
        self.scene.destroy_view(view);
        let Some(output) = d.output else {
            return;
        };
        if let Some(o) = self.outputs.get_mut(&output) {
            o.panels.retain(|v| *v != view);
            o.overlays.retain(|v| *v != view);
            if o.background == Some(view) {
                o.background = None;
            }
        }
        if d.role == Role::Panel {
            self.update_available_geometry(output);
        }
        debug!(parent: &self.span, %surface, role = %d.role, "desktop surface removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panels_dock_to_their_edge() {
        let geometry = Rectangle::from_loc_and_size((0, 0), (1920, 1080));
        assert_eq!(panel_location(PanelEdge::Top, (1920, 30).into(), geometry), Point::from((0, 0)));
        assert_eq!(panel_location(PanelEdge::Bottom, (1920, 40).into(), geometry), Point::from((0, 1040)));
        assert_eq!(panel_location(PanelEdge::Right, (48, 1080).into(), geometry), Point::from((1872, 0)));
    }
}
