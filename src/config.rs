//! Tunables of the shell
//!
//! [`ShellConfig`] is handed to [`Shell::new`](crate::shell::Shell::new). Loading it from a
//! file is up to the embedder; every field has a sensible default.

use std::time::Duration;

use crate::animation::Easing;

/// Configuration of a [`Shell`](crate::shell::Shell)
#[derive(Debug, Clone, PartialEq)]
pub struct ShellConfig {
    /// Number of workspaces created at startup, between one and
    /// [`MAX_WORKSPACES`](crate::workspace::MAX_WORKSPACES)
    pub workspaces: usize,
    /// Distance in logical pixels under which moved or resized windows snap to the
    /// edges of the available geometry; `0` disables snapping
    pub snap_threshold: i32,
    /// Whether switching workspaces pans smoothly instead of jumping
    pub animate_workspace_switch: bool,
    /// Duration of the workspace switch pan
    pub workspace_switch_duration: Duration,
    /// Easing curve of the workspace switch pan
    pub workspace_switch_easing: Easing,
    /// Time after which an unanswered ping marks a surface unresponsive
    pub ping_timeout: Duration,
    /// RGBA colour of the backdrop shown behind fullscreen windows
    pub backdrop_color: [f32; 4],
}

impl Default for ShellConfig {
    fn default() -> Self {
        ShellConfig {
            workspaces: 4,
            snap_threshold: 12,
            animate_workspace_switch: true,
            workspace_switch_duration: Duration::from_millis(250),
            workspace_switch_easing: Easing::OutQuad,
            ping_timeout: Duration::from_millis(200),
            backdrop_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}
