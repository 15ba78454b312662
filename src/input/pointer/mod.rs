//! Pointer-related types of the shell's input handling
//!
//! Every [`Seat`](super::Seat) has a [`Pointer`]. Pointer events are handed to the shell with
//! [`Shell::pointer_motion`], [`Shell::pointer_button`] and [`Shell::pointer_axis`]; they are
//! intercepted by the active [`PointerGrab`] if any, or else routed by the default grab to
//! the content under the pointer.
//!
//! Only one grab can be installed on a pointer at a time. [`Shell::start_grab`] replaces
//! the current grab (whose [`PointerGrab::ended`] runs to completion first) and
//! [`Shell::end_grab`] returns to the default behavior.

use std::{collections::VecDeque, fmt};

use smallvec::SmallVec;
use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

use crate::{
    scene::ViewId,
    shell::{Shell, ShellEvent, ShellSurfaceId},
    surface::SurfaceId,
    utils::{Logical, Point, Serial},
};

use super::SeatId;

pub use cursor_icon::CursorIcon;

mod grab;
pub(crate) use grab::{DefaultGrab, GrabRequest, GrabStatus};
pub use grab::{GrabStartData, PointerGrab};

/// Linux input code of the left mouse button
pub const BTN_LEFT: u32 = 0x110;
/// Linux input code of the right mouse button
pub const BTN_RIGHT: u32 = 0x111;
/// Linux input code of the middle mouse button
pub const BTN_MIDDLE: u32 = 0x112;

/// State of the pointer of a seat
pub struct Pointer {
    pub(crate) location: Point<f64, Logical>,
    pub(crate) pressed: SmallVec<[u32; 4]>,
    pub(crate) focus: Option<(ViewId, Point<f64, Logical>)>,
    pub(crate) focused_surface: Option<SurfaceId>,
    pub(crate) grab: GrabStatus,
    pub(crate) default_grab: Option<Box<dyn PointerGrab>>,
    pub(crate) pending: VecDeque<GrabRequest>,
    pub(crate) dispatching: bool,
    // serial of the custom grab whose handler is currently running
    pub(crate) handling: Option<Serial>,
    pub(crate) cursor: CursorIcon,
    // presses swallowed by a binding, whose release must be swallowed as well
    pub(crate) consumed: SmallVec<[u32; 2]>,
}

impl fmt::Debug for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pointer")
            .field("location", &self.location)
            .field("pressed", &self.pressed)
            .field("focus", &self.focus)
            .field("focused_surface", &self.focused_surface)
            .field("grab", &self.grab)
            .field("default_grab", &self.default_grab.as_ref().map(|_| "..."))
            .field("pending", &self.pending)
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl Pointer {
    pub(crate) fn new() -> Self {
        Pointer {
            location: Point::default(),
            pressed: SmallVec::new(),
            focus: None,
            focused_surface: None,
            grab: GrabStatus::None,
            default_grab: None,
            pending: VecDeque::new(),
            dispatching: false,
            handling: None,
            cursor: CursorIcon::Default,
            consumed: SmallVec::new(),
        }
    }

    /// Location of the pointer in the global space
    pub fn location(&self) -> Point<f64, Logical> {
        self.location
    }

    /// Currently pressed buttons
    pub fn pressed(&self) -> &[u32] {
        &self.pressed
    }

    /// The view under the pointer that receives its events, with the pointer location
    /// relative to it
    pub fn focus(&self) -> Option<(ViewId, Point<f64, Logical>)> {
        self.focus
    }

    /// The surface receiving pointer events
    pub fn focused_surface(&self) -> Option<SurfaceId> {
        self.focused_surface
    }

    /// The cursor icon currently requested by the shell
    pub fn cursor(&self) -> CursorIcon {
        self.cursor
    }

    /// Whether a custom grab is installed
    pub fn is_grabbed(&self) -> bool {
        !matches!(self.grab, GrabStatus::None)
    }

    /// Serial of the installed custom grab
    pub fn grab_serial(&self) -> Option<Serial> {
        match self.grab {
            GrabStatus::Active(serial, _) => Some(serial),
            _ => None,
        }
    }

    /// Start data of the installed custom grab
    pub fn grab_start_data(&self) -> Option<GrabStartData> {
        match &self.grab {
            GrabStatus::Active(_, grab) => Some(*grab.start_data()),
            _ => None,
        }
    }

    pub(crate) fn grab_shell_surface(&self) -> Option<ShellSurfaceId> {
        match &self.grab {
            GrabStatus::Active(_, grab) => grab.shell_surface(),
            _ => None,
        }
    }
}

/// Error of the grab operations
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum GrabError {
    /// The serial does not designate the installed grab
    #[error("grab serial mismatch: the installed grab has serial {expected}, got {got}")]
    SerialMismatch {
        /// Serial of the installed grab
        expected: Serial,
        /// Serial given by the caller
        got: Serial,
    },
}

/// Pointer motion event
#[derive(Debug, Clone)]
pub struct MotionEvent {
    /// Location of the pointer in compositor space
    pub location: Point<f64, Logical>,
    /// Serial of the event
    pub serial: Serial,
    /// Timestamp of the event, with millisecond granularity
    pub time: u32,
}

/// Describes the physical state of a button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonState {
    /// Button is released
    Released,
    /// Button is pressed
    Pressed,
}

/// Mouse button click and release notifications.
/// The location of the click is given by the last motion or enter event.
#[derive(Debug, Clone, Copy)]
pub struct ButtonEvent {
    /// Serial of the event
    pub serial: Serial,
    /// Timestamp with millisecond granularity, with an undefined base.
    pub time: u32,
    /// Button that produced the event
    ///
    /// The button is a button code as defined in the
    /// Linux kernel's linux/input-event-codes.h header file, e.g. [`BTN_LEFT`].
    pub button: u32,
    /// Physical state of the button
    pub state: ButtonState,
}

/// Source of an axis event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisSource {
    /// Finger on a touchpad
    Finger,
    /// Continuous scrolling device
    Continuous,
    /// Scroll wheel
    Wheel,
    /// Scroll wheel tilted sideways
    WheelTilt,
}

/// A frame of pointer axis events.
/// Frames of axis events should be considers as one logical action.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct AxisFrame {
    /// Source of the axis event, if known
    pub source: Option<AxisSource>,
    /// Time of the axis event
    pub time: u32,
    /// Raw scroll value per axis of the event, horizontal then vertical
    pub axis: (f64, f64),
    /// Discrete representation of scroll value per axis, if available
    pub v120: Option<(i32, i32)>,
    /// If the axis is considered having stopped movement
    ///
    /// Only useful in conjunction of [`AxisSource::Finger`] events
    pub stop: (bool, bool),
}

impl AxisFrame {
    /// Create a new frame of axis events
    pub fn new(time: u32) -> Self {
        AxisFrame {
            time,
            ..Default::default()
        }
    }

    /// Specify the source of the events
    pub fn source(mut self, source: AxisSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Specify the vertical scroll amount
    pub fn vertical(mut self, value: f64) -> Self {
        self.axis.1 = value;
        self
    }

    /// Specify the horizontal scroll amount
    pub fn horizontal(mut self, value: f64) -> Self {
        self.axis.0 = value;
        self
    }
}

/// This inner handle is accessed from inside a pointer grab logic, and directly
/// sends event to the client
pub struct PointerInnerHandle<'a> {
    shell: &'a mut Shell,
    seat: SeatId,
}

impl<'a> fmt::Debug for PointerInnerHandle<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointerInnerHandle")
            .field("seat", &self.seat)
            .finish()
    }
}

impl<'a> PointerInnerHandle<'a> {
    /// Access the whole shell
    pub fn shell(&mut self) -> &mut Shell {
        self.shell
    }

    /// The seat this pointer belongs to
    pub fn seat(&self) -> SeatId {
        self.seat
    }

    /// Replace the current grab once the current handler returns
    ///
    /// Returns the serial of the new grab.
    pub fn set_grab<G: PointerGrab + 'static>(&mut self, grab: G, cursor: Option<CursorIcon>) -> Serial {
        let serial = self.shell.serials.next_serial();
        if let Some(pointer) = self.shell.pointer_mut(self.seat) {
            pointer.pending.push_back(GrabRequest::Set {
                serial,
                grab: Box::new(grab),
                cursor,
            });
        }
        serial
    }

    /// Return to the default behavior once the current handler returns
    ///
    /// Only the grab whose handler made the request is ended: if it was already replaced
    /// by the time the request is processed, nothing happens.
    pub fn unset_grab(&mut self) {
        if let Some(pointer) = self.shell.pointer_mut(self.seat) {
            let target = pointer.handling;
            pointer.pending.push_back(GrabRequest::Unset { target });
        }
    }

    /// Access the current focus of this pointer
    pub fn current_focus(&self) -> Option<(ViewId, Point<f64, Logical>)> {
        self.shell.pointer(self.seat).and_then(|p| p.focus)
    }

    /// Access the current location of this pointer in the global space
    pub fn current_location(&self) -> Point<f64, Logical> {
        self.shell.pointer(self.seat).map(|p| p.location).unwrap_or_default()
    }

    /// A list of the currently physically pressed buttons
    ///
    /// This still includes buttons that your grab have intercepted and not sent
    /// to the client.
    pub fn current_pressed(&self) -> &[u32] {
        self.shell.pointer(self.seat).map(|p| p.pressed()).unwrap_or(&[])
    }

    /// Change the cursor icon of this pointer
    pub fn set_cursor(&mut self, icon: CursorIcon) {
        self.shell.set_cursor(self.seat, icon);
    }

    /// Move the pointer focus without a motion event
    pub fn set_focus(&mut self, focus: Option<(ViewId, Point<f64, Logical>)>) {
        self.update_focus(focus, None);
    }

    /// Notify that the pointer moved
    ///
    /// You provide the new focus of the pointer: the view on top of which the cursor is,
    /// together with the pointer location relative to it (or `None` if the pointer events
    /// should not reach any client).
    ///
    /// This will internally take care of emitting the appropriate enter, motion and leave
    /// events.
    pub fn motion(&mut self, focus: Option<(ViewId, Point<f64, Logical>)>, event: &MotionEvent) {
        self.update_focus(focus, Some(event.time));
    }

    /// Forward a button event to the focused surface
    pub fn button(&mut self, event: &ButtonEvent) {
        let Some(surface) = self.shell.pointer(self.seat).and_then(|p| p.focused_surface) else {
            return;
        };
        self.shell.push_event(ShellEvent::PointerButton {
            seat: self.seat,
            surface,
            button: event.button,
            state: event.state,
            serial: event.serial,
            time: event.time,
        });
    }

    /// Forward an axis frame to the focused surface
    pub fn axis(&mut self, details: AxisFrame) {
        let Some(surface) = self.shell.pointer(self.seat).and_then(|p| p.focused_surface) else {
            return;
        };
        self.shell.push_event(ShellEvent::PointerAxis {
            seat: self.seat,
            surface,
            frame: details,
        });
    }

    fn update_focus(&mut self, focus: Option<(ViewId, Point<f64, Logical>)>, time: Option<u32>) {
        let seat = self.seat;
        let surface = focus.and_then(|(view, _)| self.shell.scene.view(view)?.surface());
        let Some(pointer) = self.shell.pointer_mut(seat) else {
            return;
        };
        let previous = std::mem::replace(&mut pointer.focused_surface, surface);
        pointer.focus = focus;
        let location = focus.map(|(_, location)| location).unwrap_or_default();

        if previous != surface {
            if let Some(previous) = previous {
                self.shell.push_event(ShellEvent::PointerLeave {
                    seat,
                    surface: previous,
                });
            }
            if let Some(surface) = surface {
                self.shell.push_event(ShellEvent::PointerEnter {
                    seat,
                    surface,
                    location,
                });
            }
        } else if let (Some(surface), Some(time)) = (surface, time) {
            self.shell.push_event(ShellEvent::PointerMotion {
                seat,
                surface,
                location,
                time,
            });
        }
    }
}

impl Shell {
    pub(crate) fn pointer(&self, seat: SeatId) -> Option<&Pointer> {
        self.seats.get(&seat).map(|s| &s.pointer)
    }

    pub(crate) fn pointer_mut(&mut self, seat: SeatId) -> Option<&mut Pointer> {
        self.seats.get_mut(&seat).map(|s| &mut s.pointer)
    }

    /// Notify that the pointer of a seat moved to `location`, in the global space
    #[instrument(level = "trace", parent = &self.span, skip(self))]
    pub fn pointer_motion(&mut self, seat: SeatId, location: Point<f64, Logical>, time: u32) {
        let Some(pointer) = self.pointer_mut(seat) else {
            trace!("motion on an unknown seat");
            return;
        };
        pointer.location = location;
        let serial = self.serials.next_serial();
        let focus = self.scene.view_under(location);
        let event = MotionEvent {
            location,
            serial,
            time,
        };
        self.with_grab(seat, |handle, grab| grab.motion(handle, focus, &event));
    }

    /// Notify that a button of the pointer of a seat was pressed or released
    #[instrument(level = "trace", parent = &self.span, skip(self))]
    pub fn pointer_button(&mut self, seat: SeatId, button: u32, state: ButtonState, time: u32) {
        let Some(pointer) = self.pointer_mut(seat) else {
            trace!("button on an unknown seat");
            return;
        };
        match state {
            ButtonState::Pressed => {
                if !pointer.pressed.contains(&button) {
                    pointer.pressed.push(button);
                }
            }
            ButtonState::Released => pointer.pressed.retain(|b| *b != button),
        }

        match state {
            ButtonState::Pressed => {
                if self.trigger_button_binding(seat, button) {
                    if let Some(pointer) = self.pointer_mut(seat) {
                        pointer.consumed.push(button);
                    }
                    return;
                }
            }
            ButtonState::Released => {
                if let Some(pointer) = self.pointer_mut(seat) {
                    if let Some(idx) = pointer.consumed.iter().position(|b| *b == button) {
                        pointer.consumed.remove(idx);
                        return;
                    }
                }
            }
        }

        let event = ButtonEvent {
            serial: self.serials.next_serial(),
            time,
            button,
            state,
        };
        self.with_grab(seat, |handle, grab| grab.button(handle, &event));
    }

    /// Notify that the pointer of a seat scrolled
    #[instrument(level = "trace", parent = &self.span, skip(self))]
    pub fn pointer_axis(&mut self, seat: SeatId, frame: AxisFrame) {
        if self.pointer(seat).is_none() {
            return;
        }
        if self.trigger_axis_binding(seat, frame) {
            return;
        }
        self.with_grab(seat, |handle, grab| grab.axis(handle, frame));
    }

    /// Install a grab on the pointer of a seat
    ///
    /// Any installed grab is ended first, and its [`PointerGrab::ended`] runs to
    /// completion before the new grab's [`PointerGrab::start`]. If `cursor` is provided,
    /// the cursor icon is changed for the duration of the grab.
    ///
    /// When called from within a grab handler, the transition is applied right after
    /// that handler returns.
    pub fn start_grab<G: PointerGrab + 'static>(
        &mut self,
        seat: SeatId,
        grab: G,
        cursor: Option<CursorIcon>,
    ) -> Serial {
        let serial = self.serials.next_serial();
        if let Some(pointer) = self.pointer_mut(seat) {
            pointer.pending.push_back(GrabRequest::Set {
                serial,
                grab: Box::new(grab),
                cursor,
            });
            self.process_grab_requests(seat);
        }
        serial
    }

    /// End the grab of the pointer of a seat and return to the default behavior
    ///
    /// Does nothing if no grab is installed.
    pub fn end_grab(&mut self, seat: SeatId) {
        if let Some(pointer) = self.pointer_mut(seat) {
            let target = pointer.grab_serial().or(pointer.handling);
            pointer.pending.push_back(GrabRequest::Unset { target });
            self.process_grab_requests(seat);
        }
    }

    /// End the grab of the pointer of a seat, if `serial` designates it
    ///
    /// Succeeds without doing anything if no grab is installed.
    pub fn end_grab_with_serial(&mut self, seat: SeatId, serial: Serial) -> Result<(), GrabError> {
        match self.pointer(seat).and_then(|p| p.grab_serial()) {
            Some(expected) if expected != serial => {
                warn!(parent: &self.span, %seat, %expected, got = %serial, "refusing to end grab");
                Err(GrabError::SerialMismatch { expected, got: serial })
            }
            _ => {
                self.end_grab(seat);
                Ok(())
            }
        }
    }

    /// Ask the installed grab of a seat to stop, see [`PointerGrab::cancel`]
    pub fn cancel_grab(&mut self, seat: SeatId) {
        if matches!(self.pointer(seat).map(|p| &p.grab), Some(GrabStatus::Active(..))) {
            self.with_grab(seat, |handle, grab| grab.cancel(handle));
        }
    }

    /// Register a long-lived grab used instead of the passthrough behavior while no
    /// other grab is installed
    pub fn set_default_grab(&mut self, seat: SeatId, grab: Option<Box<dyn PointerGrab>>) {
        if let Some(pointer) = self.pointer_mut(seat) {
            pointer.default_grab = grab;
        }
    }

    /// Whether a custom grab is installed on the pointer of a seat
    pub fn is_grabbed(&self, seat: SeatId) -> bool {
        self.pointer(seat).map(|p| p.is_grabbed()).unwrap_or(false)
    }

    /// Change the cursor icon of a seat
    pub fn set_cursor(&mut self, seat: SeatId, icon: CursorIcon) {
        let Some(pointer) = self.pointer_mut(seat) else {
            return;
        };
        if pointer.cursor != icon {
            pointer.cursor = icon;
            self.push_event(ShellEvent::CursorChanged { seat, icon });
        }
    }

    /// Re-evaluate what lies under the pointer of every seat
    ///
    /// Called after the scene changed beneath pointers that did not move.
    pub fn refresh_pointer_focus(&mut self) {
        let seats: SmallVec<[SeatId; 4]> = self.seats.keys().copied().collect();
        for seat in seats {
            let Some(pointer) = self.pointer(seat) else {
                continue;
            };
            // a grab handler of this seat is running and will route the next event itself
            if matches!(pointer.grab, GrabStatus::Borrowed) {
                continue;
            }
            let location = pointer.location;
            let focus = self.scene.view_under(location);
            if self.pointer(seat).map(|p| p.focus) == Some(focus) {
                continue;
            }
            self.with_grab(seat, |handle, grab| grab.focus(handle, focus));
        }
    }

    pub(crate) fn with_grab<F>(&mut self, seat: SeatId, f: F)
    where
        F: FnOnce(&mut PointerInnerHandle<'_>, &mut dyn PointerGrab),
    {
        let Some(pointer) = self.pointer_mut(seat) else {
            return;
        };
        let status = std::mem::replace(&mut pointer.grab, GrabStatus::Borrowed);
        let (mut grab, serial, registered) = match status {
            GrabStatus::Borrowed => {
                warn!(parent: &self.span, %seat, "pointer grab accessed from within a pointer grab access");
                return;
            }
            GrabStatus::Active(serial, grab) => (grab, Some(serial), false),
            GrabStatus::None => match pointer.default_grab.take() {
                Some(grab) => (grab, None, true),
                None => (Box::new(DefaultGrab::new()) as Box<dyn PointerGrab>, None, false),
            },
        };

        pointer.handling = serial;
        f(
            &mut PointerInnerHandle {
                shell: &mut *self,
                seat,
            },
            &mut *grab,
        );

        if let Some(pointer) = self.pointer_mut(seat) {
            pointer.handling = None;
            match serial {
                Some(serial) => pointer.grab = GrabStatus::Active(serial, grab),
                None => {
                    pointer.grab = GrabStatus::None;
                    if registered && pointer.default_grab.is_none() {
                        pointer.default_grab = Some(grab);
                    }
                }
            }
        }
        self.process_grab_requests(seat);
    }

    pub(crate) fn process_grab_requests(&mut self, seat: SeatId) {
        match self.pointer_mut(seat) {
            Some(pointer) if !pointer.dispatching && !matches!(pointer.grab, GrabStatus::Borrowed) => {
                pointer.dispatching = true;
            }
            _ => return,
        }

        while let Some(request) = self.pointer_mut(seat).and_then(|p| p.pending.pop_front()) {
            match request {
                GrabRequest::Unset { target: Some(target) }
                    if self.pointer(seat).and_then(|p| p.grab_serial()) != Some(target) =>
                {
                    trace!(parent: &self.span, %seat, %target, "grab already gone, ignoring unset");
                }
                GrabRequest::Unset { .. } => self.uninstall_grab(seat),
                GrabRequest::Set { serial, grab, cursor } => {
                    self.uninstall_grab(seat);
                    debug!(parent: &self.span, %seat, %serial, "pointer grab started");
                    let Some(pointer) = self.pointer_mut(seat) else {
                        break;
                    };
                    pointer.grab = GrabStatus::Active(serial, grab);
                    if let Some(icon) = cursor {
                        self.set_cursor(seat, icon);
                    }
                    self.with_grab(seat, |handle, grab| grab.start(handle));
                }
            }
        }

        if let Some(pointer) = self.pointer_mut(seat) {
            pointer.dispatching = false;
        }
    }

    fn uninstall_grab(&mut self, seat: SeatId) {
        let Some(pointer) = self.pointer_mut(seat) else {
            return;
        };
        let GrabStatus::Active(serial, mut grab) = std::mem::replace(&mut pointer.grab, GrabStatus::None) else {
            // nothing installed; an `Unset` is then a no-op
            return;
        };
        pointer.handling = Some(serial);
        debug!(parent: &self.span, %seat, %serial, "pointer grab ended");
        grab.ended(&mut PointerInnerHandle {
            shell: &mut *self,
            seat,
        });
        drop(grab);
        if let Some(pointer) = self.pointer_mut(seat) {
            pointer.handling = None;
        }
        self.push_event(ShellEvent::GrabEnded { seat, serial });
        self.set_cursor(seat, CursorIcon::Default);

        // hand the pointer back to whatever is under it
        let Some(location) = self.pointer(seat).map(|p| p.location) else {
            return;
        };
        let focus = self.scene.view_under(location);
        self.with_grab(seat, |handle, grab| grab.focus(handle, focus));
    }
}
