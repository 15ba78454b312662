//! Input abstractions
//!
//! This module provides the [`Seat`] type, a group of input devices (one pointer and one
//! keyboard) operated by one user, and the entry points through which the compositor
//! feeds their events into the [`Shell`].
//!
//! ## How to use it
//!
//! ```
//! use meridian::{config::ShellConfig, shell::Shell};
//! use meridian::input::{pointer::{ButtonState, BTN_LEFT}, KeyState};
//!
//! let mut shell = Shell::new(ShellConfig::default());
//! let seat = shell.add_seat("seat-0");
//!
//! // forward the events of your input backend
//! shell.pointer_motion(seat, (100.0, 100.0).into(), 0);
//! shell.pointer_button(seat, BTN_LEFT, ButtonState::Pressed, 10);
//! shell.keyboard_key(seat, 30, KeyState::Pressed, 20);
//!
//! // and dispatch what the shell wants clients to know
//! for event in shell.drain_events() {
//!     println!("{event:?}");
//! }
//! ```

use bitflags::bitflags;
use tracing::{debug, instrument, trace};

use crate::{
    focus::ScopeKind,
    shell::{Shell, ShellEvent},
    surface::SurfaceId,
    utils::ids::id_type,
};

pub mod pointer;

use self::pointer::Pointer;

id_type!(
    /// Handle to a [`Seat`]
    SeatId,
    "seat"
);

bitflags! {
    /// Keyboard modifiers held down on a seat
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        /// Shift
        const SHIFT = 0b0001;
        /// Control
        const CTRL = 0b0010;
        /// Alt
        const ALT = 0b0100;
        /// The "logo" or "super" key
        const SUPER = 0b1000;
    }
}

/// Describes the physical state of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyState {
    /// Key is released
    Released,
    /// Key is pressed
    Pressed,
}

/// A group of input devices operated by one user
#[derive(Debug)]
pub struct Seat {
    pub(crate) id: SeatId,
    pub(crate) name: String,
    pub(crate) pointer: Pointer,
    pub(crate) keyboard_focus: Option<SurfaceId>,
    pub(crate) modifiers: Modifiers,
    pub(crate) scope: ScopeKind,
    // keys swallowed by a binding on press
    pub(crate) consumed_keys: Vec<u32>,
}

impl Seat {
    /// Handle of this seat
    pub fn id(&self) -> SeatId {
        self.id
    }

    /// Name of this seat
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pointer of this seat
    pub fn pointer(&self) -> &Pointer {
        &self.pointer
    }

    /// The surface receiving keyboard events
    pub fn keyboard_focus(&self) -> Option<SurfaceId> {
        self.keyboard_focus
    }

    /// Modifiers currently held down
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// The focus scope this seat's keyboard follows
    pub fn scope(&self) -> ScopeKind {
        self.scope
    }
}

impl Shell {
    /// Create a new seat
    ///
    /// Its keyboard follows the active application surface, or the lock screen if the
    /// session is locked.
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn add_seat(&mut self, name: &str) -> SeatId {
        let id = SeatId::next();
        let scope = if self.locked { ScopeKind::Locked } else { ScopeKind::Apps };
        self.seats.insert(
            id,
            Seat {
                id,
                name: name.to_owned(),
                pointer: Pointer::new(),
                keyboard_focus: None,
                modifiers: Modifiers::empty(),
                scope,
                consumed_keys: Vec::new(),
            },
        );
        self.scope_mut(scope).bind_seat(id);
        let active = self.scope(scope).active();
        self.set_keyboard_focus(id, active);
        debug!(seat = %id, "seat added");
        id
    }

    /// Remove a seat
    ///
    /// Its grab is ended; the active surfaces are left unchanged.
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn remove_seat(&mut self, seat: SeatId) {
        if !self.seats.contains_key(&seat) {
            return;
        }
        self.end_grab(seat);
        self.set_keyboard_focus(seat, None);
        if let Some(focused) = self.pointer(seat).and_then(|p| p.focused_surface) {
            self.push_event(ShellEvent::PointerLeave {
                seat,
                surface: focused,
            });
        }
        self.apps_scope.unbind_seat(seat);
        self.lock_scope.unbind_seat(seat);
        self.seats.shift_remove(&seat);
    }

    /// Access a seat
    pub fn seat(&self, seat: SeatId) -> Option<&Seat> {
        self.seats.get(&seat)
    }

    /// Iterate over all seats
    pub fn seats(&self) -> impl Iterator<Item = &Seat> {
        self.seats.values()
    }

    /// Update the modifiers held down on a seat
    pub fn set_modifiers(&mut self, seat: SeatId, modifiers: Modifiers) {
        if let Some(seat) = self.seats.get_mut(&seat) {
            seat.modifiers = modifiers;
        }
    }

    /// Notify that a key of a seat's keyboard was pressed or released
    ///
    /// Key presses matching a binding are consumed (together with their release);
    /// everything else is forwarded to the keyboard focus.
    #[instrument(level = "trace", parent = &self.span, skip(self))]
    pub fn keyboard_key(&mut self, seat: SeatId, keycode: u32, state: KeyState, time: u32) {
        if !self.seats.contains_key(&seat) {
            trace!("key on an unknown seat");
            return;
        }
        match state {
            KeyState::Pressed => {
                if self.trigger_key_binding(seat, keycode) {
                    if let Some(seat) = self.seats.get_mut(&seat) {
                        seat.consumed_keys.push(keycode);
                    }
                    return;
                }
            }
            KeyState::Released => {
                if let Some(seat) = self.seats.get_mut(&seat) {
                    if let Some(idx) = seat.consumed_keys.iter().position(|k| *k == keycode) {
                        seat.consumed_keys.remove(idx);
                        return;
                    }
                }
            }
        }

        let Some(surface) = self.seats.get(&seat).and_then(|s| s.keyboard_focus) else {
            return;
        };
        let serial = self.serials.next_serial();
        self.push_event(ShellEvent::KeyboardKey {
            seat,
            surface,
            keycode,
            state,
            serial,
            time,
        });
    }

    pub(crate) fn set_keyboard_focus(&mut self, seat: SeatId, surface: Option<SurfaceId>) {
        let Some(s) = self.seats.get_mut(&seat) else {
            return;
        };
        if s.keyboard_focus != surface {
            s.keyboard_focus = surface;
            trace!(parent: &self.span, %seat, ?surface, "keyboard focus");
            self.push_event(ShellEvent::KeyboardFocus { seat, surface });
        }
    }
}
