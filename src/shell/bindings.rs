//! Key, button and axis bindings
//!
//! A binding is triggered by an input event of a seat whose modifiers are exactly the
//! ones it was registered with. The event is then consumed: it reaches neither the grab
//! nor the focused client, and a [`ShellEvent::BindingTriggered`] is emitted instead.
//! Bindings are inactive while the session is locked.

use indexmap::IndexMap;
use tracing::{debug, instrument};

use crate::{
    input::{pointer::AxisFrame, Modifiers, SeatId},
    utils::ids::id_type,
};

use super::{Shell, ShellEvent};

id_type!(
    /// Handle to a [`Binding`]
    BindingId,
    "binding"
);

/// The input event a binding reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingTrigger {
    /// Press of a key, by hardware keycode
    Key(u32),
    /// Press of a pointer button
    Button(u32),
    /// Any scroll of the pointer
    Axis,
}

/// A registered binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    id: BindingId,
    trigger: BindingTrigger,
    modifiers: Modifiers,
}

impl Binding {
    /// Handle of this binding
    pub fn id(&self) -> BindingId {
        self.id
    }

    /// The event triggering it
    pub fn trigger(&self) -> BindingTrigger {
        self.trigger
    }

    /// The modifiers that must be held
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }
}

#[derive(Debug, Default)]
pub(crate) struct Bindings {
    list: IndexMap<BindingId, Binding>,
}

impl Bindings {
    fn find(&self, trigger: BindingTrigger, modifiers: Modifiers) -> Option<BindingId> {
        self.list
            .values()
            .find(|b| b.trigger == trigger && b.modifiers == modifiers)
            .map(|b| b.id)
    }
}

impl Shell {
    /// Register a binding
    ///
    /// When several bindings share a trigger and modifiers, the first registered wins.
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn add_binding(&mut self, trigger: BindingTrigger, modifiers: Modifiers) -> BindingId {
        let id = BindingId::next();
        self.bindings.list.insert(
            id,
            Binding {
                id,
                trigger,
                modifiers,
            },
        );
        id
    }

    /// Unregister a binding, returning whether it existed
    pub fn remove_binding(&mut self, binding: BindingId) -> bool {
        self.bindings.list.shift_remove(&binding).is_some()
    }

    /// Iterate over the registered bindings
    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.list.values()
    }

    fn trigger_binding(&mut self, seat: SeatId, trigger: BindingTrigger) -> bool {
        if self.locked {
            return false;
        }
        let Some(modifiers) = self.seats.get(&seat).map(|s| s.modifiers) else {
            return false;
        };
        let Some(binding) = self.bindings.find(trigger, modifiers) else {
            return false;
        };
        debug!(parent: &self.span, %seat, %binding, ?trigger, "binding triggered");
        self.push_event(ShellEvent::BindingTriggered { seat, binding });
        true
    }

    pub(crate) fn trigger_key_binding(&mut self, seat: SeatId, keycode: u32) -> bool {
        self.trigger_binding(seat, BindingTrigger::Key(keycode))
    }

    pub(crate) fn trigger_button_binding(&mut self, seat: SeatId, button: u32) -> bool {
        self.trigger_binding(seat, BindingTrigger::Button(button))
    }

    pub(crate) fn trigger_axis_binding(&mut self, seat: SeatId, frame: AxisFrame) -> bool {
        if frame.axis == (0.0, 0.0) && frame.v120.is_none() {
            return false;
        }
        self.trigger_binding(seat, BindingTrigger::Axis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ShellConfig, input::KeyState};

    #[test]
    fn exact_modifiers_trigger_and_consume() {
        let mut shell = Shell::new(ShellConfig::default());
        let seat = shell.add_seat("seat0");
        let binding = shell.add_binding(BindingTrigger::Key(30), Modifiers::SUPER);
        shell.drain_events().for_each(drop);

        shell.set_modifiers(seat, Modifiers::SUPER | Modifiers::SHIFT);
        shell.keyboard_key(seat, 30, KeyState::Pressed, 0);
        assert!(!shell
            .drain_events()
            .any(|e| matches!(e, ShellEvent::BindingTriggered { .. })));

        shell.set_modifiers(seat, Modifiers::SUPER);
        shell.keyboard_key(seat, 30, KeyState::Pressed, 1);
        shell.keyboard_key(seat, 30, KeyState::Released, 2);
        let events: Vec<_> = shell.drain_events().collect();
        assert!(events.contains(&ShellEvent::BindingTriggered { seat, binding }));
        assert!(!events.iter().any(|e| matches!(e, ShellEvent::KeyboardKey { .. })));

        assert!(shell.remove_binding(binding));
        assert!(!shell.remove_binding(binding));
        assert_eq!(shell.bindings().count(), 0);
    }
}
