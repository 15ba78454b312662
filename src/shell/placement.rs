use tracing::trace;

use crate::{
    output::OutputId,
    scene::Affine,
    utils::{Logical, Point, Rectangle, Size},
    workspace::WorkspaceId,
};

use super::Shell;

/// Where and how large a fullscreen window is shown
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FullscreenPlacement {
    pub(crate) location: Point<i32, Logical>,
    pub(crate) transform: Option<Affine>,
}

/// Center `size` in `area`, scaled down uniformly if it does not fit
pub(crate) fn fullscreen_placement(size: Size<i32, Logical>, area: Rectangle<i32, Logical>) -> FullscreenPlacement {
    if size == area.size || size.is_empty() {
        return FullscreenPlacement {
            location: area.loc,
            transform: None,
        };
    }
    let scale = (area.size.w as f64 / size.w as f64).min(area.size.h as f64 / size.h as f64);
    let shown = Size::<f64, Logical>::from((size.w as f64 * scale, size.h as f64 * scale));
    let location = Point::<f64, Logical>::from((
        area.loc.x as f64 + (area.size.w as f64 - shown.w) / 2.0,
        area.loc.y as f64 + (area.size.h as f64 - shown.h) / 2.0,
    ));
    FullscreenPlacement {
        location: location.to_i32_round(),
        transform: Some(Affine::scale(scale, scale)),
    }
}

/// Center `size` in `area`, never going past its top-left corner
pub(crate) fn centered(size: Size<i32, Logical>, area: Rectangle<i32, Logical>) -> Point<i32, Logical> {
    Point::new(
        area.loc.x + ((area.size.w - size.w) / 2).max(0),
        area.loc.y + ((area.size.h - size.h) / 2).max(0),
    )
}

/// Move `location` so that a window of `size` starts inside `area`
pub(crate) fn clamp_into(
    location: Point<i32, Logical>,
    size: Size<i32, Logical>,
    area: Rectangle<i32, Logical>,
) -> Point<i32, Logical> {
    let max_x = (area.right() - size.w).max(area.loc.x);
    let max_y = (area.bottom() - size.h).max(area.loc.y);
    Point::new(
        location.x.clamp(area.loc.x, max_x),
        location.y.clamp(area.loc.y, max_y),
    )
}

impl Shell {
    /// Elect the output a window of `workspace` should be shown on
    ///
    /// Outputs currently showing the workspace get 10 points, plus one point per seat
    /// pointer inside them. The first registered output wins ties.
    pub fn select_output(&self, workspace: WorkspaceId) -> Option<OutputId> {
        let mut best: Option<(OutputId, u32)> = None;
        for output in self.outputs.values() {
            let mut votes = 0;
            if self.pager.current(output.id) == Some(workspace) {
                votes += 10;
            }
            let geometry = output.geometry.to_f64();
            votes += self
                .seats
                .values()
                .filter(|seat| geometry.contains(seat.pointer.location))
                .count() as u32;
            trace!(parent: &self.span, output = %output.id, votes, "output vote");
            if best.map(|(_, best)| votes > best).unwrap_or(true) {
                best = Some((output.id, votes));
            }
        }
        best.map(|(output, _)| output)
    }

    /// The output whose geometry contains `location`
    pub fn output_at(&self, location: Point<f64, Logical>) -> Option<OutputId> {
        self.outputs
            .values()
            .find(|output| output.geometry.to_f64().contains(location))
            .map(|output| output.id)
    }
}
