//! The pointer grabs used by the shell
//!
//! Each interactive operation (moving or resizing a window, the busy cursor over an
//! unresponsive window, the desktop grid, ...) is a [`PointerGrab`] installed on the
//! pointer of the seat that started it, for the duration of the operation.

use thiserror::Error;

use crate::{
    input::pointer::{
        AxisFrame, ButtonEvent, ButtonState, GrabStartData, MotionEvent, PointerGrab, PointerInnerHandle,
        BTN_LEFT,
    },
    output::OutputId,
    scene::ViewId,
    surface::SurfaceId,
    utils::{Logical, Point, Rectangle, Size},
};

use super::ShellSurfaceId;

bitflags::bitflags! {
    /// Edges of a window being dragged during an interactive resize
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ResizeEdge: u32 {
        /// No edge
        const NONE = 0;
        /// Top edge
        const TOP = 1;
        /// Bottom edge
        const BOTTOM = 2;
        /// Left edge
        const LEFT = 4;
        /// Top-left corner
        const TOP_LEFT = 5;
        /// Bottom-left corner
        const BOTTOM_LEFT = 6;
        /// Right edge
        const RIGHT = 8;
        /// Top-right corner
        const TOP_RIGHT = 9;
        /// Bottom-right corner
        const BOTTOM_RIGHT = 10;
    }
}

/// An invalid set of edges was given to an interactive resize
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ResizeError {
    /// No edge at all
    #[error("no resize edge given")]
    NoEdge,
    /// Bits not designating any edge
    #[error("unknown resize edge bits {0:#x}")]
    UnknownEdges(u32),
    /// Two opposite edges at once
    #[error("opposite resize edges {0:?} given together")]
    OppositeEdges(ResizeEdge),
}

impl ResizeEdge {
    /// Validate the raw edges of a resize request
    pub fn validate(bits: u32) -> Result<ResizeEdge, ResizeError> {
        let edges = ResizeEdge::from_bits(bits).ok_or(ResizeError::UnknownEdges(bits))?;
        if edges.is_empty() {
            return Err(ResizeError::NoEdge);
        }
        let left_right = ResizeEdge::LEFT | ResizeEdge::RIGHT;
        let top_bottom = ResizeEdge::TOP | ResizeEdge::BOTTOM;
        if edges.contains(left_right) {
            return Err(ResizeError::OppositeEdges(left_right));
        }
        if edges.contains(top_bottom) {
            return Err(ResizeError::OppositeEdges(top_bottom));
        }
        Ok(edges)
    }
}

/// Snap a coordinate range `[start, start + len)` to the bounds `[lo, hi)` if either of
/// its ends is within `threshold`
fn snap_axis(start: i32, len: i32, lo: i32, hi: i32, threshold: i32) -> i32 {
    if (start - lo).abs() < threshold {
        lo
    } else if (start + len - hi).abs() < threshold {
        hi - len
    } else {
        start
    }
}

/// Snap a window rectangle so that its edges stick to those of `bounds`
pub(crate) fn snap_location(
    location: Point<i32, Logical>,
    size: Size<i32, Logical>,
    bounds: Rectangle<i32, Logical>,
    threshold: i32,
) -> Point<i32, Logical> {
    if threshold <= 0 {
        return location;
    }
    Point::new(
        snap_axis(location.x, size.w, bounds.loc.x, bounds.right(), threshold),
        snap_axis(location.y, size.h, bounds.loc.y, bounds.bottom(), threshold),
    )
}

/// Interactive move of a window
pub struct MoveGrab {
    pub(crate) start_data: GrabStartData,
    pub(crate) window: ShellSurfaceId,
    pub(crate) initial_window_location: Point<i32, Logical>,
}

impl std::fmt::Debug for MoveGrab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MoveGrab").field("window", &self.window).finish()
    }
}

impl PointerGrab for MoveGrab {
    fn start(&mut self, handle: &mut PointerInnerHandle<'_>) {
        handle.set_focus(None);
    }

    fn focus(&mut self, _handle: &mut PointerInnerHandle<'_>, _focus: Option<(ViewId, Point<f64, Logical>)>) {}

    fn motion(
        &mut self,
        handle: &mut PointerInnerHandle<'_>,
        _focus: Option<(ViewId, Point<f64, Logical>)>,
        event: &MotionEvent,
    ) {
        // While the grab is active, no client has pointer focus
        handle.motion(None, event);

        let delta = event.location - self.start_data.location;
        let new_location = (self.initial_window_location.to_f64() + delta).to_i32_round();

        let shell = handle.shell();
        if shell.shell_surface(self.window).is_none() {
            handle.unset_grab();
            return;
        }
        let snapped = shell.snap_window_location(self.window, new_location);
        shell.set_window_location(self.window, snapped);
    }

    fn button(&mut self, handle: &mut PointerInnerHandle<'_>, event: &ButtonEvent) {
        handle.button(event);
        if handle.current_pressed().is_empty() {
            // No more buttons are pressed, release the grab.
            handle.unset_grab();
        }
    }

    fn axis(&mut self, handle: &mut PointerInnerHandle<'_>, details: AxisFrame) {
        handle.axis(details)
    }

    fn start_data(&self) -> &GrabStartData {
        &self.start_data
    }

    fn shell_surface(&self) -> Option<ShellSurfaceId> {
        Some(self.window)
    }
}

/// Interactive resize of a window
pub struct ResizeGrab {
    pub(crate) start_data: GrabStartData,
    pub(crate) window: ShellSurfaceId,
    pub(crate) edges: ResizeEdge,
    pub(crate) initial_window_location: Point<i32, Logical>,
    pub(crate) initial_window_size: Size<i32, Logical>,
    pub(crate) last_window_size: Size<i32, Logical>,
}

impl std::fmt::Debug for ResizeGrab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResizeGrab")
            .field("window", &self.window)
            .field("edges", &self.edges)
            .field("last_window_size", &self.last_window_size)
            .finish()
    }
}

impl ResizeGrab {
    fn snap(&self, mut size: Size<i32, Logical>, bounds: Rectangle<i32, Logical>, threshold: i32) -> Size<i32, Logical> {
        if threshold <= 0 {
            return size;
        }
        let initial = Rectangle::from_loc_and_size(self.initial_window_location, self.initial_window_size);
        if self.edges.intersects(ResizeEdge::LEFT) {
            let left = initial.right() - size.w;
            if (left - bounds.loc.x).abs() < threshold {
                size.w = initial.right() - bounds.loc.x;
            }
        } else if self.edges.intersects(ResizeEdge::RIGHT) {
            let right = initial.loc.x + size.w;
            if (right - bounds.right()).abs() < threshold {
                size.w = bounds.right() - initial.loc.x;
            }
        }
        if self.edges.intersects(ResizeEdge::TOP) {
            let top = initial.bottom() - size.h;
            if (top - bounds.loc.y).abs() < threshold {
                size.h = initial.bottom() - bounds.loc.y;
            }
        } else if self.edges.intersects(ResizeEdge::BOTTOM) {
            let bottom = initial.loc.y + size.h;
            if (bottom - bounds.bottom()).abs() < threshold {
                size.h = bounds.bottom() - initial.loc.y;
            }
        }
        size
    }
}

impl PointerGrab for ResizeGrab {
    fn start(&mut self, handle: &mut PointerInnerHandle<'_>) {
        handle.set_focus(None);
        handle.shell().set_resizing(self.window, self.edges, true);
    }

    fn focus(&mut self, _handle: &mut PointerInnerHandle<'_>, _focus: Option<(ViewId, Point<f64, Logical>)>) {}

    fn motion(
        &mut self,
        handle: &mut PointerInnerHandle<'_>,
        _focus: Option<(ViewId, Point<f64, Logical>)>,
        event: &MotionEvent,
    ) {
        // While the grab is active, no client has pointer focus
        handle.motion(None, event);

        let shell = handle.shell();
        let Some(bounds) = shell.window_bounds(self.window) else {
            handle.unset_grab();
            return;
        };

        let (mut dx, mut dy) = (event.location - self.start_data.location).into();

        let mut new_window_width = self.initial_window_size.w;
        let mut new_window_height = self.initial_window_size.h;

        let left_right = ResizeEdge::LEFT | ResizeEdge::RIGHT;
        let top_bottom = ResizeEdge::TOP | ResizeEdge::BOTTOM;

        if self.edges.intersects(left_right) {
            if self.edges.intersects(ResizeEdge::LEFT) {
                dx = -dx;
            }

            new_window_width = (self.initial_window_size.w as f64 + dx) as i32;
        }

        if self.edges.intersects(top_bottom) {
            if self.edges.intersects(ResizeEdge::TOP) {
                dy = -dy;
            }

            new_window_height = (self.initial_window_size.h as f64 + dy) as i32;
        }

        let size = self.snap(
            (new_window_width, new_window_height).into(),
            bounds,
            shell.config.snap_threshold,
        );
        let size = Size::from((size.w.max(1), size.h.max(1)));

        if size != self.last_window_size {
            self.last_window_size = size;
            shell.configure_window(self.window, size, self.edges);
        }
    }

    fn button(&mut self, handle: &mut PointerInnerHandle<'_>, event: &ButtonEvent) {
        handle.button(event);
        if handle.current_pressed().is_empty() {
            // No more buttons are pressed, release the grab.
            handle.unset_grab();
        }
    }

    fn axis(&mut self, handle: &mut PointerInnerHandle<'_>, details: AxisFrame) {
        handle.axis(details)
    }

    fn ended(&mut self, handle: &mut PointerInnerHandle<'_>) {
        let shell = handle.shell();
        if shell.shell_surface(self.window).is_some() {
            shell.set_resizing(self.window, self.edges, false);
            shell.configure_window(self.window, self.last_window_size, ResizeEdge::NONE);
        }
    }

    fn start_data(&self) -> &GrabStartData {
        &self.start_data
    }

    fn shell_surface(&self) -> Option<ShellSurfaceId> {
        Some(self.window)
    }
}

/// Busy cursor over an unresponsive window
///
/// Ends as soon as the pointer leaves the window. Pressing the left button on it starts
/// an interactive move.
pub struct BusyGrab {
    pub(crate) start_data: GrabStartData,
    pub(crate) window: ShellSurfaceId,
    pub(crate) surface: SurfaceId,
}

impl std::fmt::Debug for BusyGrab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusyGrab").field("window", &self.window).finish()
    }
}

impl BusyGrab {
    fn follow(&mut self, handle: &mut PointerInnerHandle<'_>, focus: Option<(ViewId, Point<f64, Logical>)>) {
        let over_window = focus
            .and_then(|(view, _)| handle.shell().scene.view(view)?.surface())
            .map(|surface| surface == self.surface)
            .unwrap_or(false);
        if !over_window {
            handle.unset_grab();
        }
    }
}

impl PointerGrab for BusyGrab {
    fn start(&mut self, handle: &mut PointerInnerHandle<'_>) {
        let seat = handle.seat();
        handle.shell().set_busy_seat(self.window, seat, true);
    }

    fn focus(&mut self, handle: &mut PointerInnerHandle<'_>, focus: Option<(ViewId, Point<f64, Logical>)>) {
        handle.set_focus(focus);
        self.follow(handle, focus);
    }

    fn motion(
        &mut self,
        handle: &mut PointerInnerHandle<'_>,
        focus: Option<(ViewId, Point<f64, Logical>)>,
        event: &MotionEvent,
    ) {
        handle.motion(focus, event);
        self.follow(handle, focus);
    }

    fn button(&mut self, handle: &mut PointerInnerHandle<'_>, event: &ButtonEvent) {
        if event.state == ButtonState::Pressed && event.button == BTN_LEFT {
            let seat = handle.seat();
            let shell = handle.shell();
            shell.activate(self.surface);
            if let Some(grab) = shell.move_grab(self.window, seat) {
                handle.set_grab(grab, None);
            }
            return;
        }
        handle.button(event);
    }

    fn axis(&mut self, handle: &mut PointerInnerHandle<'_>, details: AxisFrame) {
        handle.axis(details);
    }

    fn ended(&mut self, handle: &mut PointerInnerHandle<'_>) {
        let seat = handle.seat();
        handle.shell().set_busy_seat(self.window, seat, false);
    }

    fn start_data(&self) -> &GrabStartData {
        &self.start_data
    }

    fn shell_surface(&self) -> Option<ShellSurfaceId> {
        Some(self.window)
    }
}

/// Pointer events forwarded untouched to a surface of the privileged client
pub struct ClientGrab {
    pub(crate) start_data: GrabStartData,
    pub(crate) view: ViewId,
}

impl std::fmt::Debug for ClientGrab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientGrab").field("view", &self.view).finish()
    }
}

impl ClientGrab {
    fn target(&self, handle: &mut PointerInnerHandle<'_>) -> Option<(ViewId, Point<f64, Logical>)> {
        let location = handle.current_location();
        let local = handle.shell().scene.map_from_global(self.view, location)?;
        Some((self.view, local))
    }
}

impl PointerGrab for ClientGrab {
    fn start(&mut self, handle: &mut PointerInnerHandle<'_>) {
        let target = self.target(handle);
        handle.set_focus(target);
    }

    fn focus(&mut self, _handle: &mut PointerInnerHandle<'_>, _focus: Option<(ViewId, Point<f64, Logical>)>) {}

    fn motion(
        &mut self,
        handle: &mut PointerInnerHandle<'_>,
        _focus: Option<(ViewId, Point<f64, Logical>)>,
        event: &MotionEvent,
    ) {
        match self.target(handle) {
            Some(target) => handle.motion(Some(target), event),
            None => handle.unset_grab(),
        }
    }

    fn button(&mut self, handle: &mut PointerInnerHandle<'_>, event: &ButtonEvent) {
        handle.button(event);
    }

    fn axis(&mut self, handle: &mut PointerInnerHandle<'_>, details: AxisFrame) {
        handle.axis(details);
    }

    fn start_data(&self) -> &GrabStartData {
        &self.start_data
    }
}

/// Navigation of the desktop grid; a click picks the workspace under the pointer
pub struct DesktopGridGrab {
    pub(crate) start_data: GrabStartData,
    pub(crate) output: OutputId,
}

impl std::fmt::Debug for DesktopGridGrab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesktopGridGrab").field("output", &self.output).finish()
    }
}

impl PointerGrab for DesktopGridGrab {
    fn start(&mut self, handle: &mut PointerInnerHandle<'_>) {
        handle.set_focus(None);
    }

    fn focus(&mut self, _handle: &mut PointerInnerHandle<'_>, _focus: Option<(ViewId, Point<f64, Logical>)>) {}

    fn motion(
        &mut self,
        handle: &mut PointerInnerHandle<'_>,
        _focus: Option<(ViewId, Point<f64, Logical>)>,
        event: &MotionEvent,
    ) {
        handle.motion(None, event);
    }

    fn button(&mut self, handle: &mut PointerInnerHandle<'_>, event: &ButtonEvent) {
        if event.state != ButtonState::Pressed {
            return;
        }
        let location = handle.current_location();
        let shell = handle.shell();
        let picked = shell.grid_workspace_at(self.output, location);
        shell.hide_desktop_grid(self.output);
        if let Some(workspace) = picked {
            shell.activate_workspace(workspace, self.output, false);
        }
        handle.unset_grab();
    }

    fn axis(&mut self, _handle: &mut PointerInnerHandle<'_>, _details: AxisFrame) {}

    fn cancel(&mut self, handle: &mut PointerInnerHandle<'_>) {
        handle.shell().hide_desktop_grid(self.output);
        handle.unset_grab();
    }

    fn start_data(&self) -> &GrabStartData {
        &self.start_data
    }
}

/// Swallows all pointer input; the next press ends it
pub struct InertGrab {
    pub(crate) start_data: GrabStartData,
}

impl InertGrab {
    /// Create an inert grab starting at the current pointer state of `seat`
    pub fn new(start_data: GrabStartData) -> Self {
        InertGrab { start_data }
    }
}

impl std::fmt::Debug for InertGrab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InertGrab").finish()
    }
}

impl PointerGrab for InertGrab {
    fn start(&mut self, handle: &mut PointerInnerHandle<'_>) {
        handle.set_focus(None);
    }

    fn focus(&mut self, _handle: &mut PointerInnerHandle<'_>, _focus: Option<(ViewId, Point<f64, Logical>)>) {}

    fn motion(
        &mut self,
        handle: &mut PointerInnerHandle<'_>,
        _focus: Option<(ViewId, Point<f64, Logical>)>,
        event: &MotionEvent,
    ) {
        handle.motion(None, event);
    }

    fn button(&mut self, handle: &mut PointerInnerHandle<'_>, event: &ButtonEvent) {
        if event.state == ButtonState::Pressed {
            handle.unset_grab();
        }
    }

    fn axis(&mut self, _handle: &mut PointerInnerHandle<'_>, _details: AxisFrame) {}

    fn start_data(&self) -> &GrabStartData {
        &self.start_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_edges_validation() {
        assert_eq!(ResizeEdge::validate(ResizeEdge::BOTTOM_RIGHT.bits()), Ok(ResizeEdge::BOTTOM_RIGHT));
        assert_eq!(ResizeEdge::validate(0), Err(ResizeError::NoEdge));
        assert_eq!(
            ResizeEdge::validate((ResizeEdge::LEFT | ResizeEdge::RIGHT).bits()),
            Err(ResizeError::OppositeEdges(ResizeEdge::LEFT | ResizeEdge::RIGHT))
        );
        assert_eq!(
            ResizeEdge::validate((ResizeEdge::TOP | ResizeEdge::BOTTOM | ResizeEdge::LEFT).bits()),
            Err(ResizeError::OppositeEdges(ResizeEdge::TOP | ResizeEdge::BOTTOM))
        );
        assert_eq!(ResizeEdge::validate(0x30), Err(ResizeError::UnknownEdges(0x30)));
    }

    #[test]
    fn snapping() {
        let bounds = Rectangle::from_loc_and_size((0, 30), (1920, 1050));
        let size = Size::from((800, 600));
        assert_eq!(snap_location((5, 40).into(), size, bounds, 12), Point::from((0, 30)));
        assert_eq!(snap_location((1115, 475).into(), size, bounds, 12), Point::from((1120, 480)));
        assert_eq!(snap_location((300, 300).into(), size, bounds, 12), Point::from((300, 300)));
        assert_eq!(snap_location((5, 40).into(), size, bounds, 0), Point::from((5, 40)));
    }
}
