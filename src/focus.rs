//! Activation and keyboard focus
//!
//! A [`FocusScope`] tracks which surface is active among a group of surfaces and which
//! seats follow it with their keyboard focus. The shell has two scopes: one for
//! regular applications and one for the lock screen. Seats are bound to exactly one of
//! them at a time.
//!
//! The scope only does the bookkeeping; the events resulting from a change are emitted
//! by the [`Shell`](crate::shell::Shell).

use std::collections::VecDeque;

use smallvec::SmallVec;
use tracing::{debug, instrument, trace};

use crate::{
    input::SeatId,
    scene::ViewId,
    shell::{Shell, ShellEvent},
    surface::{Role, SurfaceId, WorkspaceMask},
};

/// Which scope a [`FocusScope`] is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Regular application surfaces
    Apps,
    /// The lock screen
    Locked,
}

/// Result of a change of the active surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusChange {
    /// The surface that lost activation
    pub previous: Option<SurfaceId>,
    /// The surface that gained it
    pub current: Option<SurfaceId>,
}

/// An activation scope
#[derive(Debug, Clone)]
pub struct FocusScope {
    kind: ScopeKind,
    active: Option<SurfaceId>,
    seats: SmallVec<[SeatId; 2]>,
    // most recently activated first
    lru: VecDeque<SurfaceId>,
}

impl FocusScope {
    /// Create an empty scope
    pub fn new(kind: ScopeKind) -> Self {
        FocusScope {
            kind,
            active: None,
            seats: SmallVec::new(),
            lru: VecDeque::new(),
        }
    }

    /// Which scope this is
    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// The active surface
    pub fn active(&self) -> Option<SurfaceId> {
        self.active
    }

    /// Seats whose keyboard focus follows this scope
    pub fn seats(&self) -> &[SeatId] {
        &self.seats
    }

    /// Surfaces in order of most recent activation
    pub fn lru(&self) -> impl Iterator<Item = SurfaceId> + '_ {
        self.lru.iter().copied()
    }

    /// Make `surface` the active surface
    ///
    /// Returns `None` if it already was.
    pub fn activate(&mut self, surface: SurfaceId) -> Option<FocusChange> {
        if self.active == Some(surface) {
            return None;
        }
        self.lru.retain(|s| *s != surface);
        self.lru.push_front(surface);
        let previous = self.active.replace(surface);
        Some(FocusChange {
            previous,
            current: Some(surface),
        })
    }

    /// Leave the scope without an active surface
    pub fn deactivate(&mut self) -> Option<FocusChange> {
        let previous = self.active.take()?;
        Some(FocusChange {
            previous: Some(previous),
            current: None,
        })
    }

    /// The most recently activated surface accepted by `filter`
    pub fn candidate<F>(&self, mut filter: F) -> Option<SurfaceId>
    where
        F: FnMut(SurfaceId) -> bool,
    {
        self.lru.iter().copied().find(|s| filter(*s))
    }

    /// Forget a surface, e.g. because it was unmapped or destroyed
    ///
    /// If it was the active surface, the scope is left without an active surface and
    /// `true` is returned.
    pub fn remove(&mut self, surface: SurfaceId) -> bool {
        self.lru.retain(|s| *s != surface);
        if self.active == Some(surface) {
            self.active = None;
            true
        } else {
            false
        }
    }

    /// Bind a seat to this scope
    pub fn bind_seat(&mut self, seat: SeatId) {
        if !self.seats.contains(&seat) {
            self.seats.push(seat);
        }
    }

    /// Unbind a seat from this scope; the active surface is unchanged
    pub fn unbind_seat(&mut self, seat: SeatId) -> bool {
        let len = self.seats.len();
        self.seats.retain(|s| *s != seat);
        self.seats.len() != len
    }
}

impl Shell {
    /// Access a focus scope
    pub fn scope(&self, kind: ScopeKind) -> &FocusScope {
        match kind {
            ScopeKind::Apps => &self.apps_scope,
            ScopeKind::Locked => &self.lock_scope,
        }
    }

    pub(crate) fn scope_mut(&mut self, kind: ScopeKind) -> &mut FocusScope {
        match kind {
            ScopeKind::Apps => &mut self.apps_scope,
            ScopeKind::Locked => &mut self.lock_scope,
        }
    }

    /// The scope the seats currently follow
    pub fn current_scope(&self) -> ScopeKind {
        if self.locked {
            ScopeKind::Locked
        } else {
            ScopeKind::Apps
        }
    }

    /// The active surface of the scope the seats currently follow
    pub fn active_surface(&self) -> Option<SurfaceId> {
        self.scope(self.current_scope()).active()
    }

    fn scope_of(&self, surface: SurfaceId) -> ScopeKind {
        match self.surfaces.get(&surface).and_then(|s| s.role) {
            Some(Role::Lock) => ScopeKind::Locked,
            _ => ScopeKind::Apps,
        }
    }

    /// Make `surface` the active surface of its scope
    ///
    /// The seats bound to the scope move their keyboard focus to it. Surfaces that are
    /// not activable, not shown or minimized are ignored, as is the already active one.
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn activate(&mut self, surface: SurfaceId) {
        let Some(s) = self.surfaces.get(&surface) else {
            trace!("activating a destroyed surface");
            return;
        };
        if !s.is_activable() || !s.mapped {
            return;
        }
        if let Some(id) = self.shell_surface_of.get(&surface) {
            if self.shell_surfaces.get(id).map(|sh| sh.minimized).unwrap_or(false) {
                return;
            }
        }
        let kind = self.scope_of(surface);
        let Some(change) = self.scope_mut(kind).activate(surface) else {
            return;
        };
        self.apply_focus_change(kind, change);
    }

    pub(crate) fn deactivate_scope(&mut self, kind: ScopeKind) {
        if let Some(change) = self.scope_mut(kind).deactivate() {
            self.apply_focus_change(kind, change);
        }
    }

    fn apply_focus_change(&mut self, kind: ScopeKind, change: FocusChange) {
        debug!(parent: &self.span, scope = ?kind, previous = ?change.previous, current = ?change.current, "activation");
        if let Some(previous) = change.previous {
            self.push_event(ShellEvent::Deactivated(previous));
        }
        let seats: SmallVec<[SeatId; 4]> = self.scope(kind).seats().into();
        for seat in seats {
            self.set_keyboard_focus(seat, change.current);
        }
        if let Some(current) = change.current {
            self.push_event(ShellEvent::Activated(current));
        }
    }

    pub(crate) fn is_focus_candidate(&self, surface: SurfaceId, mask: WorkspaceMask) -> bool {
        let Some(s) = self.surfaces.get(&surface) else {
            return false;
        };
        let minimized = self
            .shell_surface_of
            .get(&surface)
            .and_then(|id| self.shell_surfaces.get(id))
            .map(|sh| sh.minimized)
            .unwrap_or(false);
        s.is_activable() && s.mapped && !minimized && s.workspace_mask.matches(mask)
    }

    /// Pass activation on after `surface` stopped being shown
    ///
    /// If it was active, the most recently active surface still shown on the current
    /// workspaces of the outputs takes over, if any.
    pub(crate) fn surface_unavailable(&mut self, surface: SurfaceId) {
        let kind = self.scope_of(surface);
        if !self.scope_mut(kind).remove(surface) {
            return;
        }
        self.push_event(ShellEvent::Deactivated(surface));
        let mask = match kind {
            ScopeKind::Apps => self.shown_workspaces_mask(),
            ScopeKind::Locked => WorkspaceMask::UNRESTRICTED,
        };
        let candidate = self.scope(kind).candidate(|s| self.is_focus_candidate(s, mask));
        match candidate {
            Some(next) => self.activate(next),
            None => {
                let seats: SmallVec<[SeatId; 4]> = self.scope(kind).seats().into();
                for seat in seats {
                    self.set_keyboard_focus(seat, None);
                }
            }
        }
    }

    /// Click-to-focus: activate and raise the window shown by `view`
    pub fn click_to_focus(&mut self, view: ViewId) {
        let Some(surface) = self.scene.view(view).and_then(|v| v.surface()) else {
            return;
        };
        if let Some(id) = self.shell_surface_of(surface) {
            self.activate(surface);
            self.raise(id);
        } else if self.scope_of(surface) == ScopeKind::Locked {
            self.activate(surface);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_active_surface() {
        let mut scope = FocusScope::new(ScopeKind::Apps);
        let (a, b) = (SurfaceId::next(), SurfaceId::next());

        assert_eq!(
            scope.activate(a),
            Some(FocusChange {
                previous: None,
                current: Some(a)
            })
        );
        assert_eq!(scope.activate(a), None);
        assert_eq!(
            scope.activate(b),
            Some(FocusChange {
                previous: Some(a),
                current: Some(b)
            })
        );
        assert_eq!(scope.active(), Some(b));
        assert_eq!(scope.lru().collect::<Vec<_>>(), vec![b, a]);
    }

    #[test]
    fn removing_active_picks_nothing_by_itself() {
        let mut scope = FocusScope::new(ScopeKind::Apps);
        let (a, b, c) = (SurfaceId::next(), SurfaceId::next(), SurfaceId::next());
        scope.activate(a);
        scope.activate(b);
        scope.activate(c);

        assert!(!scope.remove(a));
        assert!(scope.remove(c));
        assert_eq!(scope.active(), None);
        assert_eq!(scope.candidate(|_| true), Some(b));
        assert_eq!(scope.candidate(|s| s != b), None);
    }

    #[test]
    fn seats_bind_and_unbind() {
        let mut scope = FocusScope::new(ScopeKind::Locked);
        let seat = SeatId::next();
        let surface = SurfaceId::next();
        scope.bind_seat(seat);
        scope.bind_seat(seat);
        assert_eq!(scope.seats(), &[seat]);
        scope.activate(surface);
        assert!(scope.unbind_seat(seat));
        assert!(!scope.unbind_seat(seat));
        assert_eq!(scope.active(), Some(surface));
    }
}
