//! Client surfaces
//!
//! A [`Surface`] is the core's record of a compositable client surface: its committed
//! size, whether it is mapped, and the single role it was given. Everything the shell
//! builds on top (windows, panels, popups) starts with a role being assigned.

use std::fmt;

use smallvec::SmallVec;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::{
    input::SeatId,
    shell::Shell,
    utils::{ids::id_type, ClientId, Logical, Size},
};

id_type!(
    /// Handle to a [`Surface`]
    SurfaceId,
    "surface"
);

/// The purpose a surface was given by its client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// A regular window, managed as a shell surface
    Shell,
    /// A panel docked to an output edge
    Panel,
    /// A popup menu attached to another surface
    Popup,
    /// The background of an output
    Background,
    /// An overlay shown above everything else
    Overlay,
    /// The lock screen
    Lock,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Shell => "shell_surface",
            Role::Panel => "panel",
            Role::Popup => "popup",
            Role::Background => "background",
            Role::Overlay => "overlay",
            Role::Lock => "lock_surface",
        };
        f.write_str(name)
    }
}

/// Error returned when a surface is given a second, different role
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{surface} already has the role {existing}, cannot make it a {requested}")]
pub struct RoleError {
    /// The surface
    pub surface: SurfaceId,
    /// Its current role
    pub existing: Role,
    /// The role that was refused
    pub requested: Role,
}

/// Set of workspaces a surface may be shown on
///
/// The empty mask means the surface is not restricted to any workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WorkspaceMask(pub u32);

impl WorkspaceMask {
    /// Not restricted to any workspace
    pub const UNRESTRICTED: WorkspaceMask = WorkspaceMask(0);

    /// The mask of a single workspace
    ///
    /// Returns `None` past the last workspace a mask can designate, see
    /// [`MAX_WORKSPACES`](crate::workspace::MAX_WORKSPACES).
    pub fn single(index: usize) -> Option<Self> {
        u32::try_from(index)
            .ok()
            .and_then(|index| 1u32.checked_shl(index))
            .map(WorkspaceMask)
    }

    /// Whether no restriction applies
    pub fn is_unrestricted(&self) -> bool {
        self.0 == 0
    }

    /// Whether a surface with this mask may be shown where `other` is shown
    pub fn matches(&self, other: WorkspaceMask) -> bool {
        self.is_unrestricted() || self.0 & other.0 != 0
    }
}

impl std::ops::BitOr for WorkspaceMask {
    type Output = WorkspaceMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        WorkspaceMask(self.0 | rhs.0)
    }
}

/// A compositable client surface
#[derive(Debug, Clone)]
pub struct Surface {
    pub(crate) id: SurfaceId,
    pub(crate) client: ClientId,
    pub(crate) size: Size<i32, Logical>,
    pub(crate) mapped: bool,
    pub(crate) role: Option<Role>,
    pub(crate) activable: bool,
    // cleared while the window built on the surface is not shown or an inactive transient
    pub(crate) window_activable: bool,
    pub(crate) workspace_mask: WorkspaceMask,
    pub(crate) label: Option<String>,
    pub(crate) app_id: Option<String>,
    pub(crate) title: Option<String>,
}

impl Surface {
    pub(crate) fn new(id: SurfaceId, client: ClientId) -> Self {
        Surface {
            id,
            client,
            size: Size::default(),
            mapped: false,
            role: None,
            activable: true,
            window_activable: true,
            workspace_mask: WorkspaceMask::UNRESTRICTED,
            label: None,
            app_id: None,
            title: None,
        }
    }

    /// Handle of this surface
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    /// The client owning this surface
    pub fn client(&self) -> ClientId {
        self.client
    }

    /// Last committed size
    pub fn size(&self) -> Size<i32, Logical> {
        self.size
    }

    /// Whether the surface is currently shown
    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    /// The role of the surface, if one was assigned
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Assign a role
    ///
    /// Assigning the role the surface already has is accepted. Assigning a different one
    /// fails and leaves the surface untouched.
    pub fn set_role(&mut self, role: Role) -> Result<(), RoleError> {
        match self.role {
            Some(existing) if existing != role => Err(RoleError {
                surface: self.id,
                existing,
                requested: role,
            }),
            _ => {
                self.role = Some(role);
                Ok(())
            }
        }
    }

    /// Whether the surface can receive activation
    ///
    /// Windows without a type and transients attached as inactive never can, whatever
    /// was set with [`Shell::set_activable`].
    pub fn is_activable(&self) -> bool {
        self.activable && self.window_activable
    }

    /// Workspaces this surface may be shown on
    pub fn workspace_mask(&self) -> WorkspaceMask {
        self.workspace_mask
    }

    /// Debug label of the surface
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Application id, as set by the client
    pub fn app_id(&self) -> Option<&str> {
        self.app_id.as_deref()
    }

    /// Window title, as set by the client
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }
}

impl Shell {
    /// Register a new surface of `client`
    pub fn create_surface(&mut self, client: ClientId) -> SurfaceId {
        let id = SurfaceId::next();
        self.surfaces.insert(id, Surface::new(id, client));
        id
    }

    /// Forget a surface and everything the shell built on it
    #[instrument(level = "debug", parent = &self.span, skip(self))]
    pub fn destroy_surface(&mut self, surface: SurfaceId) {
        if !self.surfaces.contains_key(&surface) {
            return;
        }
        if let Some(id) = self.shell_surface_of(surface) {
            self.destroy_shell_surface(id);
        }
        self.dismiss_popups_of(surface);
        self.destroy_popup(surface);
        self.destroy_desktop_surface(surface);
        self.surface_unavailable(surface);
        self.apps_scope.remove(surface);
        self.lock_scope.remove(surface);

        let seats: SmallVec<[SeatId; 4]> = self
            .seats
            .values()
            .filter(|s| s.keyboard_focus == Some(surface))
            .map(|s| s.id)
            .collect();
        for seat in seats {
            self.set_keyboard_focus(seat, None);
        }
        for seat in self.seats.values_mut() {
            if seat.pointer.focused_surface == Some(surface) {
                seat.pointer.focused_surface = None;
                seat.pointer.focus = None;
            }
        }
        self.surfaces.shift_remove(&surface);
        debug!(%surface, "surface destroyed");
        self.refresh_pointer_focus();
    }

    /// A new buffer of `size` was committed on a surface that is not a window
    ///
    /// Windows go through [`Shell::committed`] instead, which also handles their
    /// mapping and placement.
    #[instrument(level = "trace", parent = &self.span, skip(self))]
    pub fn surface_committed(&mut self, surface: SurfaceId, size: Size<i32, Logical>) {
        let Some(s) = self.surfaces.get_mut(&surface) else {
            return;
        };
        if s.size == size {
            return;
        }
        s.size = size;
        let role = s.role;
        match role {
            Some(Role::Popup) => self.resize_popup_views(surface),
            Some(Role::Shell) | None => {}
            Some(_) => self.desktop_surface_committed(surface),
        }
        self.refresh_pointer_focus();
    }

    /// Access a surface
    pub fn surface(&self, surface: SurfaceId) -> Option<&Surface> {
        self.surfaces.get(&surface)
    }

    /// Set the application id of a surface
    pub fn set_app_id(&mut self, surface: SurfaceId, app_id: impl Into<String>) {
        if let Some(s) = self.surfaces.get_mut(&surface) {
            s.app_id = Some(app_id.into());
        }
    }

    /// Set the title of a surface
    pub fn set_title(&mut self, surface: SurfaceId, title: impl Into<String>) {
        if let Some(s) = self.surfaces.get_mut(&surface) {
            s.title = Some(title.into());
        }
    }

    /// Set the debug label of a surface
    pub fn set_label(&mut self, surface: SurfaceId, label: impl Into<String>) {
        if let Some(s) = self.surfaces.get_mut(&surface) {
            s.label = Some(label.into());
        }
    }

    /// Allow or forbid a surface to become active
    ///
    /// Forbidding it while it is active passes activation on.
    pub fn set_activable(&mut self, surface: SurfaceId, activable: bool) {
        let Some(s) = self.surfaces.get_mut(&surface) else {
            return;
        };
        s.activable = activable;
        if !activable {
            self.surface_unavailable(surface);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_is_exclusive() {
        let mut surface = Surface::new(SurfaceId::next(), ClientId(1));
        surface.set_role(Role::Shell).unwrap();
        surface.set_role(Role::Shell).unwrap();

        let err = surface.set_role(Role::Panel).unwrap_err();
        assert_eq!(err.existing, Role::Shell);
        assert_eq!(err.requested, Role::Panel);
        assert_eq!(surface.role(), Some(Role::Shell));
    }

    #[test]
    fn workspace_masks() {
        let ws0 = WorkspaceMask::single(0).unwrap();
        let ws1 = WorkspaceMask::single(1).unwrap();
        assert!(WorkspaceMask::UNRESTRICTED.matches(ws1));
        assert!(ws0.matches(ws0 | ws1));
        assert!(!ws0.matches(ws1));
        assert_eq!(WorkspaceMask::single(31), Some(WorkspaceMask(1 << 31)));
        assert_eq!(WorkspaceMask::single(32), None);
        assert_eq!(WorkspaceMask::single(40), None);
    }
}
