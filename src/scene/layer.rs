use crate::utils::{Logical, Rectangle};

use super::ViewId;

/// The stacking buckets of the scene, bottom to top
///
/// The derived ordering follows the global stacking order: a view in a greater layer is
/// always above a view in a lesser one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerKind {
    /// Minimized windows; never shown
    Minimized,
    /// The per-output background set by the privileged client
    BaseBackground,
    /// Per-workspace backgrounds
    Background,
    /// Regular application windows
    Apps,
    /// Dashboard surfaces, hidden unless toggled
    Dashboard,
    /// Surfaces shown on every workspace
    Sticky,
    /// Panels reserving screen edges
    Panels,
    /// Fullscreen windows and their backdrops
    Fullscreen,
    /// Overlays, notifications and the lock surface
    Overlay,
    /// The pointer cursor
    Cursor,
}

impl LayerKind {
    /// All layers, bottom to top
    pub const ALL: [LayerKind; 10] = [
        LayerKind::Minimized,
        LayerKind::BaseBackground,
        LayerKind::Background,
        LayerKind::Apps,
        LayerKind::Dashboard,
        LayerKind::Sticky,
        LayerKind::Panels,
        LayerKind::Fullscreen,
        LayerKind::Overlay,
        LayerKind::Cursor,
    ];

    pub(super) fn index(self) -> usize {
        self as usize
    }

    /// Layers holding per-session content, hidden while the session is locked
    pub fn is_session_content(self) -> bool {
        matches!(
            self,
            LayerKind::Background
                | LayerKind::Apps
                | LayerKind::Dashboard
                | LayerKind::Sticky
                | LayerKind::Panels
                | LayerKind::Fullscreen
        )
    }
}

/// An ordered list of views, bottom to top (the topmost view is last)
#[derive(Debug, Clone)]
pub struct Layer {
    kind: LayerKind,
    pub(super) views: Vec<ViewId>,
    pub(super) mask: Option<Rectangle<i32, Logical>>,
    pub(super) visible: bool,
}

impl Layer {
    pub(super) fn new(kind: LayerKind) -> Self {
        Layer {
            kind,
            views: Vec::new(),
            mask: None,
            visible: !matches!(kind, LayerKind::Minimized | LayerKind::Dashboard),
        }
    }

    /// Which layer this is
    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    /// The stacked views, bottom to top
    pub fn views(&self) -> &[ViewId] {
        &self.views
    }

    /// The topmost view
    pub fn top_view(&self) -> Option<ViewId> {
        self.views.last().copied()
    }

    /// Whether the layer is shown and receives input
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Rectangle (global) restricting where the layer is shown and receives input
    pub fn mask(&self) -> Option<Rectangle<i32, Logical>> {
        self.mask
    }

    pub(super) fn position(&self, view: ViewId) -> Option<usize> {
        self.views.iter().position(|v| *v == view)
    }

    pub(super) fn remove(&mut self, view: ViewId) -> bool {
        match self.position(view) {
            Some(idx) => {
                self.views.remove(idx);
                true
            }
            None => false,
        }
    }
}
