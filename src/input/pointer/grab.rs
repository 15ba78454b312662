use std::fmt;

use crate::{
    scene::ViewId,
    shell::ShellSurfaceId,
    utils::{Logical, Point, Serial},
};

use super::{AxisFrame, ButtonEvent, ButtonState, CursorIcon, MotionEvent, PointerInnerHandle};

/// A trait to implement a pointer grab
///
/// In some context, it is necessary to temporarily change the behavior of the pointer. This is
/// typically known as a pointer grab. A typical example would be, during an interactive move of a
/// window, the underlying surfaces will no longer receive pointer events, the window follows the
/// pointer instead.
///
/// This trait is the interface to intercept regular pointer events and change them as needed, its
/// interface mimics the input methods of the [`Shell`](crate::shell::Shell).
///
/// Any interactions with the shell from within a grab should be done using the
/// [`PointerInnerHandle`] passed to every method. If your logic decides that the grab should end,
/// or be replaced by another one, the handle has methods to request it. Those requests are
/// applied once the current method returns, in the order they were made.
///
/// When your grab ends (either as you requested it or if it was forcefully cancelled), its
/// [`PointerGrab::ended`] method is invoked exactly once before it is dropped.
pub trait PointerGrab {
    /// The grab was installed
    ///
    /// Invoked once, right after the grab replaced the previous one.
    fn start(&mut self, handle: &mut PointerInnerHandle<'_>) {
        let _ = handle;
    }

    /// The content under the pointer changed without the pointer moving
    ///
    /// The default implementation moves the pointer focus to the new content.
    fn focus(&mut self, handle: &mut PointerInnerHandle<'_>, focus: Option<(ViewId, Point<f64, Logical>)>) {
        handle.set_focus(focus);
    }

    /// A motion was reported
    ///
    /// You generally will want to invoke [`PointerInnerHandle::motion`] as part of your processing.
    /// If you don't, the rest of the compositor will behave as if the motion event never occurred.
    ///
    /// Some grabs (such as interactive move and resize) unset the focus while they are active,
    /// this is achieved by just setting the focus to `None` when invoking
    /// [`PointerInnerHandle::motion`].
    fn motion(
        &mut self,
        handle: &mut PointerInnerHandle<'_>,
        focus: Option<(ViewId, Point<f64, Logical>)>,
        event: &MotionEvent,
    );

    /// A button press or release was reported
    ///
    /// You generally will want to invoke [`PointerInnerHandle::button`] as part of your processing.
    fn button(&mut self, handle: &mut PointerInnerHandle<'_>, event: &ButtonEvent);

    /// An axis scroll was reported
    fn axis(&mut self, handle: &mut PointerInnerHandle<'_>, details: AxisFrame);

    /// The shell asks the grab to stop
    ///
    /// The default implementation ends the grab.
    fn cancel(&mut self, handle: &mut PointerInnerHandle<'_>) {
        handle.unset_grab();
    }

    /// The grab was uninstalled
    ///
    /// Invoked exactly once, before the grab is dropped.
    fn ended(&mut self, handle: &mut PointerInnerHandle<'_>) {
        let _ = handle;
    }

    /// The data about the event that started the grab.
    fn start_data(&self) -> &GrabStartData;

    /// The window this grab operates on, if any
    ///
    /// Grabs bound to a window are cancelled when it is destroyed.
    fn shell_surface(&self) -> Option<ShellSurfaceId> {
        None
    }
}

/// Data about the event that started the grab.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrabStartData {
    /// The focused view and the pointer location relative to it, if any, at the start of the grab.
    pub focus: Option<(ViewId, Point<f64, Logical>)>,
    /// The button that initiated the grab, `0` if none was pressed.
    pub button: u32,
    /// The location of the pointer when the grab started, in the global compositor space.
    pub location: Point<f64, Logical>,
}

pub(crate) enum GrabStatus {
    None,
    Active(Serial, Box<dyn PointerGrab>),
    Borrowed,
}

// PointerGrab is a trait, so we have to impl Debug manually
impl fmt::Debug for GrabStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrabStatus::None => f.debug_tuple("GrabStatus::None").finish(),
            GrabStatus::Active(serial, _) => f.debug_tuple("GrabStatus::Active").field(&serial).finish(),
            GrabStatus::Borrowed => f.debug_tuple("GrabStatus::Borrowed").finish(),
        }
    }
}

// A grab transition requested while the grab slot was in use
pub(crate) enum GrabRequest {
    Set {
        serial: Serial,
        grab: Box<dyn PointerGrab>,
        cursor: Option<CursorIcon>,
    },
    // `target` is the grab that was running when the request was made; `None` ends
    // whatever grab is installed once the request is processed
    Unset {
        target: Option<Serial>,
    },
}

impl fmt::Debug for GrabRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrabRequest::Set { serial, cursor, .. } => f
                .debug_struct("GrabRequest::Set")
                .field("serial", serial)
                .field("cursor", cursor)
                .finish(),
            GrabRequest::Unset { target } => f
                .debug_struct("GrabRequest::Unset")
                .field("target", target)
                .finish(),
        }
    }
}

// The default grab, the behavior when no particular grab is in progress
//
// Routes motion to the content under the pointer and buttons to the focused content;
// a press activates and raises the window under the pointer.
pub(crate) struct DefaultGrab {
    start_data: GrabStartData,
}

impl DefaultGrab {
    pub(crate) fn new() -> Self {
        DefaultGrab {
            start_data: GrabStartData {
                focus: None,
                button: 0,
                location: Point::default(),
            },
        }
    }
}

impl DefaultGrab {
    // unresponsive windows show the busy cursor whenever they are hovered
    fn check_busy(&self, handle: &mut PointerInnerHandle<'_>, focus: Option<(ViewId, Point<f64, Logical>)>) {
        let seat = handle.seat();
        if let Some(grab) = handle.shell().busy_grab_under(seat, focus.map(|(view, _)| view)) {
            handle.set_grab(grab, Some(CursorIcon::Wait));
        }
    }
}

impl PointerGrab for DefaultGrab {
    fn focus(&mut self, handle: &mut PointerInnerHandle<'_>, focus: Option<(ViewId, Point<f64, Logical>)>) {
        handle.set_focus(focus);
        self.check_busy(handle, focus);
    }

    fn motion(
        &mut self,
        handle: &mut PointerInnerHandle<'_>,
        focus: Option<(ViewId, Point<f64, Logical>)>,
        event: &MotionEvent,
    ) {
        handle.motion(focus, event);
        self.check_busy(handle, focus);
    }

    fn button(&mut self, handle: &mut PointerInnerHandle<'_>, event: &ButtonEvent) {
        if event.state == ButtonState::Pressed {
            if let Some((view, _)) = handle.current_focus() {
                handle.shell().click_to_focus(view);
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
