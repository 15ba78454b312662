use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::{debug, instrument, trace};

use crate::{
    input::{
        pointer::{
            AxisFrame, ButtonEvent, ButtonState, GrabStartData, MotionEvent, PointerGrab, PointerInnerHandle,
        },
        SeatId,
    },
    output::OutputId,
    scene::{LayerKind, ViewId, ViewKind},
    surface::{Role, SurfaceId},
    utils::{ClientId, Logical, Point, Serial},
};

use super::{Shell, ShellError, ShellEvent};

#[derive(Debug)]
pub(crate) struct Popup {
    pub(crate) surface: SurfaceId,
    pub(crate) parent: SurfaceId,
    pub(crate) offset: Point<i32, Logical>,
    pub(crate) views: IndexMap<OutputId, ViewId>,
    pub(crate) seat: SeatId,
    pub(crate) serial: Option<Serial>,
}

/// Grab of a seat while one of its popups is shown
///
/// A press on a surface of another client (or on nothing) dismisses the popup.
pub struct PopupGrab {
    start_data: GrabStartData,
    popup: SurfaceId,
    client: ClientId,
}

impl std::fmt::Debug for PopupGrab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopupGrab")
            .field("popup", &self.popup)
            .field("client", &self.client)
            .finish()
    }
}

impl PointerGrab for PopupGrab {
    fn motion(
        &mut self,
        handle: &mut PointerInnerHandle<'_>,
        focus: Option<(ViewId, Point<f64, Logical>)>,
        event: &MotionEvent,
    ) {
        if !handle.shell().popups.contains_key(&self.popup) {
            handle.unset_grab();
        }
        handle.motion(focus, event);
    }

    fn button(&mut self, handle: &mut PointerInnerHandle<'_>, event: &ButtonEvent) {
        if event.state == ButtonState::Pressed {
            let seat = handle.seat();
            let shell = handle.shell();
            let inside = shell
                .pointer(seat)
                .and_then(|p| p.focused_surface)
                .and_then(|s| shell.surfaces.get(&s))
                .map(|s| s.client == self.client)
                .unwrap_or(false);
            if !inside {
                shell.dismiss_popup_chain(self.popup);
                handle.unset_grab();
                return;
            }
        }
        handle.button(event);
    }

    fn axis(&mut self, handle: &mut PointerInnerHandle<'_>, details: AxisFrame) {
        handle.axis(details);
    }

    fn start_data(&self) -> &GrabStartData {
        &self.start_data
    }
}

impl Shell {
    /// Show `surface` as a popup of `parent`, at `offset` from its origin
    ///
    /// The pointer of `seat` is grabbed until the user clicks outside of the popup's client;
    /// the popup is then dismissed with a [`ShellEvent::PopupDone`].
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn set_popup(
        &mut self,
        surface: SurfaceId,
        parent: SurfaceId,
        offset: Point<i32, Logical>,
        seat: SeatId,
    ) -> Result<Option<Serial>, ShellError> {
        if !self.surfaces.contains_key(&parent) {
            return Err(ShellError::UnknownSurface(parent));
        }
        let s = self
            .surfaces
            .get_mut(&surface)
            .ok_or(ShellError::UnknownSurface(surface))?;
        s.set_role(Role::Popup)?;
        s.mapped = true;
        let client = s.client;

        self.destroy_popup(surface);
        self.popups.insert(
            surface,
            Popup {
                surface,
                parent,
                offset,
                views: IndexMap::new(),
                seat,
                serial: None,
            },
        );
        self.rebuild_popup_views(surface);
        self.push_event(ShellEvent::Mapped(surface));

        let Some(start_data) = self.grab_start_data(seat) else {
            return Ok(None);
        };
        let serial = self.start_grab(
            seat,
            PopupGrab {
                start_data,
                popup: surface,
                client,
            },
            None,
        );
        if let Some(popup) = self.popups.get_mut(&surface) {
            popup.serial = Some(serial);
        }
        self.refresh_pointer_focus();
        Ok(Some(serial))
    }

    // views of the popup follow the views of its parent, one per output
    fn rebuild_popup_views(&mut self, surface: SurfaceId) {
        let Some(popup) = self.popups.get_mut(&surface) else {
            return;
        };
        let old: SmallVec<[ViewId; 4]> = popup.views.drain(..).map(|(_, v)| v).collect();
        let (parent, offset) = (popup.parent, popup.offset);
        for view in old {
            self.scene.destroy_view(view);
        }

        let parents: SmallVec<[(ViewId, OutputId, LayerKind); 4]> = self
            .scene
            .views()
            .filter(|v| v.surface() == Some(parent))
            .filter_map(|v| Some((v.id(), v.output()?, v.layer()?)))
            .collect();
        let size = self.surfaces.get(&surface).map(|s| s.size).unwrap_or_default();
        for (parent_view, output, layer) in parents {
            let view = self.scene.create_view(ViewKind::Surface(surface));
            self.scene.set_transform_parent(view, Some(parent_view));
            if let Some(v) = self.scene.view_mut(view) {
                v.set_output(Some(output));
                v.set_position(offset.to_f64());
                v.set_size(size);
            }
            self.scene.add_view(layer, view);
            if let Some(popup) = self.popups.get_mut(&surface) {
                popup.views.insert(output, view);
            }
        }
    }

    /// Put the popups of `parent` back on top of it, after it was raised or moved to
    /// another layer
    pub(crate) fn restack_popups_of(&mut self, parent: SurfaceId) {
        let popups: SmallVec<[(SurfaceId, OutputId, ViewId); 4]> = self
            .popups
            .values()
            .filter(|p| p.parent == parent)
            .flat_map(|p| p.views.iter().map(move |(output, view)| (p.surface, *output, *view)))
            .collect();
        for (popup, output, view) in popups {
            let layer = self
                .scene
                .views()
                .find(|v| v.surface() == Some(parent) && v.output() == Some(output))
                .and_then(|v| v.layer());
            match layer {
                Some(layer) => self.scene.add_view(layer, view),
                None => self.scene.remove_from_layer(view),
            }
            self.restack_popups_of(popup);
        }
    }

    pub(crate) fn resize_popup_views(&mut self, surface: SurfaceId) {
        let Some(popup) = self.popups.get(&surface) else {
            return;
        };
        let size = self.surfaces.get(&surface).map(|s| s.size).unwrap_or_default();
        for view in popup.views.values() {
            if let Some(v) = self.scene.view_mut(*view) {
                v.set_size(size);
            }
        }
    }

    pub(crate) fn attach_popups(&mut self, _output: OutputId) {
        let popups: SmallVec<[SurfaceId; 4]> = self.popups.keys().copied().collect();
        for popup in popups {
            self.rebuild_popup_views(popup);
        }
    }

    pub(crate) fn detach_popups(&mut self, output: OutputId) {
        let views: SmallVec<[ViewId; 4]> = self
            .popups
            .values_mut()
            .filter_map(|p| p.views.shift_remove(&output))
            .collect();
        for view in views {
            self.scene.destroy_view(view);
        }
    }

    /// Dismiss a popup together with the popups it belongs to and those opened from it
    pub(crate) fn dismiss_popup_chain(&mut self, surface: SurfaceId) {
        let mut root = surface;
        for _ in 0..self.popups.len() {
            match self.popups.get(&root).map(|p| p.parent) {
                Some(parent) if parent != root && self.popups.contains_key(&parent) => root = parent,
                _ => break,
            }
        }
        self.dismiss_popup(root);
    }

    /// Dismiss a popup and the popups opened from it
    pub fn dismiss_popup(&mut self, surface: SurfaceId) {
        if !self.popups.contains_key(&surface) {
            trace!(parent: &self.span, %surface, "not a shown popup");
            return;
        }
        self.dismiss_popups_of(surface);
        self.destroy_popup(surface);
        if let Some(s) = self.surfaces.get_mut(&surface) {
            s.mapped = false;
        }
        debug!(parent: &self.span, %surface, "popup dismissed");
        self.push_event(ShellEvent::PopupDone(surface));
        self.push_event(ShellEvent::Unmapped(surface));
    }

    /// Dismiss every popup opened from `parent`
    pub(crate) fn dismiss_popups_of(&mut self, parent: SurfaceId) {
        let children: SmallVec<[SurfaceId; 2]> = self
            .popups
            .values()
            .filter(|p| p.parent == parent)
            .map(|p| p.surface)
            .collect();
        for child in children {
            self.dismiss_popup(child);
        }
    }

    pub(crate) fn destroy_popup(&mut self, surface: SurfaceId) {
        let Some(popup) = self.popups.shift_remove(&surface) else {
            return;
        };
        for view in popup.views.values() {
            self.scene.destroy_view(*view);
        }
        if let Some(serial) = popup.serial {
            // the grab may already have been replaced
            let _ = self.end_grab_with_serial(popup.seat, serial);
        }
        self.refresh_pointer_focus();
    }
}
