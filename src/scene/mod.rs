//! The scene graph: views stacked in layers
//!
//! A [`View`] places some content (a client surface, a synthetic backdrop, or nothing
//! at all for pure coordinate frames) in the global compositor space. Views are
//! positioned relative to an optional transform parent, and are stacked in exactly one
//! [`Layer`] at a time. The layers themselves follow a fixed global order described by
//! [`LayerKind`].
//!
//! The [`Scene`] owns all views and layers. Handles to views are plain [`ViewId`]s; a
//! handle to a destroyed view simply resolves to nothing.

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::trace;

use crate::{
    output::OutputId,
    utils::{Logical, Point, Rectangle},
};

mod layer;
mod view;

pub use self::layer::{Layer, LayerKind};
pub use self::view::{Affine, View, ViewId, ViewKind};

/// Owner of every view and layer
#[derive(Debug)]
pub struct Scene {
    views: IndexMap<ViewId, View>,
    layers: Vec<Layer>,
}

impl Default for Scene {
    fn default() -> Self {
        Scene::new()
    }
}

impl Scene {
    /// Create an empty scene
    pub fn new() -> Self {
        Scene {
            views: IndexMap::new(),
            layers: LayerKind::ALL.iter().map(|kind| Layer::new(*kind)).collect(),
        }
    }

    /// Create a new, unstacked view
    pub fn create_view(&mut self, kind: ViewKind) -> ViewId {
        let id = ViewId::next();
        self.views.insert(id, View::new(id, kind));
        id
    }

    /// Destroy a view
    ///
    /// The view is removed from its layer and its children lose their transform parent.
    pub fn destroy_view(&mut self, id: ViewId) -> Option<View> {
        let view = self.views.shift_remove(&id)?;
        if let Some(layer) = view.layer {
            self.layers[layer.index()].remove(id);
        }
        for child in self.views.values_mut() {
            if child.parent == Some(id) {
                child.parent = None;
                child.dirty = true;
            }
        }
        Some(view)
    }

    /// Access a view
    pub fn view(&self, id: ViewId) -> Option<&View> {
        self.views.get(&id)
    }

    /// Mutably access a view
    pub fn view_mut(&mut self, id: ViewId) -> Option<&mut View> {
        self.views.get_mut(&id)
    }

    /// Iterate over all views, in creation order
    pub fn views(&self) -> impl Iterator<Item = &View> {
        self.views.values()
    }

    /// Access a layer
    pub fn layer(&self, kind: LayerKind) -> &Layer {
        &self.layers[kind.index()]
    }

    /// Show or hide a whole layer
    pub fn set_layer_visible(&mut self, kind: LayerKind, visible: bool) {
        let layer = &mut self.layers[kind.index()];
        if layer.visible != visible {
            layer.visible = visible;
            let views = layer.views.clone();
            self.mark_dirty(&views);
        }
    }

    /// Restrict a whole layer to a global rectangle
    pub fn set_layer_mask(&mut self, kind: LayerKind, mask: Option<Rectangle<i32, Logical>>) {
        let layer = &mut self.layers[kind.index()];
        if layer.mask != mask {
            layer.mask = mask;
            let views = layer.views.clone();
            self.mark_dirty(&views);
        }
    }

    /// Change the coordinate frame of a view
    ///
    /// Setting a parent that would create a cycle is refused and returns `false`.
    pub fn set_transform_parent(&mut self, id: ViewId, parent: Option<ViewId>) -> bool {
        if let Some(parent) = parent {
            if !self.views.contains_key(&parent) || self.ancestors(parent).any(|a| a == id) {
                return false;
            }
        }
        match self.views.get_mut(&id) {
            Some(view) => {
                if view.parent != parent {
                    view.parent = parent;
                    view.dirty = true;
                }
                true
            }
            None => false,
        }
    }

    /// Iterate over a view and its transform ancestors, innermost first
    pub fn ancestors(&self, id: ViewId) -> impl Iterator<Item = ViewId> + '_ {
        let mut next = self.views.get(&id).map(|v| v.id);
        std::iter::from_fn(move || {
            let current = next?;
            next = self.views.get(&current).and_then(|v| v.parent);
            Some(current)
        })
    }

    /// Map a point of the view's local frame into global coordinates
    pub fn map_to_global(&self, id: ViewId, point: Point<f64, Logical>) -> Option<Point<f64, Logical>> {
        self.views.get(&id)?;
        Some(
            self.ancestors(id)
                .filter_map(|a| self.views.get(&a))
                .fold(point, |p, view| view.to_parent(p)),
        )
    }

    /// Map a global point into the view's local frame
    ///
    /// Returns `None` if the view does not exist or its frame is degenerate.
    pub fn map_from_global(&self, id: ViewId, point: Point<f64, Logical>) -> Option<Point<f64, Logical>> {
        let chain: SmallVec<[ViewId; 4]> = self.ancestors(id).collect();
        if chain.is_empty() {
            return None;
        }
        chain
            .iter()
            .rev()
            .try_fold(point, |p, a| self.views.get(a)?.from_parent(p))
    }

    /// Global position of the view's origin
    pub fn global_position(&self, id: ViewId) -> Option<Point<f64, Logical>> {
        self.map_to_global(id, Point::default())
    }

    /// The clip rectangle in effect for a view, intersecting the masks of its ancestors
    ///
    /// `None` means the view is not clipped.
    pub fn effective_mask(&self, id: ViewId) -> Option<Rectangle<i32, Logical>> {
        self.ancestors(id)
            .filter_map(|a| self.views.get(&a).and_then(|v| v.mask))
            .fold(None, |acc: Option<Rectangle<i32, Logical>>, mask| match acc {
                None => Some(mask),
                Some(acc) => Some(acc.intersection(mask).unwrap_or_default()),
            })
    }

    /// Stack a view on top of a layer
    ///
    /// The view is removed from its previous layer first.
    pub fn add_view(&mut self, kind: LayerKind, id: ViewId) {
        let Some(view) = self.views.get_mut(&id) else {
            trace!(view = %id, "add_view on a destroyed view");
            return;
        };
        if matches!(view.kind, ViewKind::Root) {
            return;
        }
        let previous = view.layer.replace(kind);
        view.dirty = true;
        if let Some(previous) = previous {
            self.layers[previous.index()].remove(id);
        }
        self.layers[kind.index()].views.push(id);
    }

    /// Remove a view from its layer, keeping it alive
    pub fn remove_from_layer(&mut self, id: ViewId) {
        if let Some(view) = self.views.get_mut(&id) {
            if let Some(layer) = view.layer.take() {
                view.dirty = true;
                self.layers[layer.index()].remove(id);
            }
        }
    }

    /// Move a view to the top of its layer
    pub fn raise_on_top(&mut self, id: ViewId) {
        if let Some(layer) = self.views.get(&id).and_then(|v| v.layer) {
            let layer = &mut self.layers[layer.index()];
            if layer.top_view() != Some(id) && layer.remove(id) {
                layer.views.push(id);
                self.mark_dirty(&[id]);
            }
        }
    }

    /// Move a view to the bottom of its layer
    pub fn lower(&mut self, id: ViewId) {
        if let Some(layer) = self.views.get(&id).and_then(|v| v.layer) {
            let layer = &mut self.layers[layer.index()];
            if layer.views.first() != Some(&id) && layer.remove(id) {
                layer.views.insert(0, id);
                self.mark_dirty(&[id]);
            }
        }
    }

    /// Stack `id` directly above `sibling`
    ///
    /// Both views must live in the same layer, otherwise this is a no-op.
    pub fn place_above(&mut self, id: ViewId, sibling: ViewId) {
        if id == sibling {
            return;
        }
        let (Some(a), Some(b)) = (
            self.views.get(&id).and_then(|v| v.layer),
            self.views.get(&sibling).and_then(|v| v.layer),
        ) else {
            return;
        };
        if a != b {
            return;
        }
        let layer = &mut self.layers[a.index()];
        layer.remove(id);
        let idx = layer.position(sibling).map(|i| i + 1).unwrap_or(layer.views.len());
        layer.views.insert(idx, id);
        self.mark_dirty(&[id]);
    }

    /// Whether `above` is stacked higher than `below`
    pub fn is_above(&self, above: ViewId, below: ViewId) -> bool {
        let rank = |id: ViewId| {
            let layer = self.views.get(&id)?.layer?;
            Some((layer, self.layers[layer.index()].position(id)?))
        };
        matches!((rank(above), rank(below)), (Some(a), Some(b)) if a > b)
    }

    /// Iterate over the views of visible layers, topmost first
    pub fn stacking(&self) -> impl Iterator<Item = ViewId> + '_ {
        self.layers
            .iter()
            .rev()
            .filter(|layer| layer.visible)
            .flat_map(|layer| layer.views.iter().rev().copied())
    }

    /// Find the topmost view accepting input at a global point
    ///
    /// Returns the view together with the point in its local coordinates.
    pub fn view_under(&self, point: Point<f64, Logical>) -> Option<(ViewId, Point<f64, Logical>)> {
        for layer in self.layers.iter().rev().filter(|layer| layer.visible) {
            if let Some(mask) = layer.mask {
                if !mask.to_f64().contains(point) {
                    continue;
                }
            }
            for id in layer.views.iter().rev() {
                if let Some(local) = self.accepts_input(*id, point) {
                    return Some((*id, local));
                }
            }
        }
        None
    }

    fn accepts_input(&self, id: ViewId, point: Point<f64, Logical>) -> Option<Point<f64, Logical>> {
        let view = self.views.get(&id)?;
        if view.alpha <= 0.0 || view.size.is_empty() {
            return None;
        }
        if let Some(mask) = self.effective_mask(id) {
            if !mask.to_f64().contains(point) {
                return None;
            }
        }
        let local = self.map_from_global(id, point)?;
        view.input_region().to_f64().contains(local).then_some(local)
    }

    /// Outputs showing views changed since the last call, clearing the dirty flags
    pub fn take_damage(&mut self) -> SmallVec<[OutputId; 4]> {
        let mut outputs = SmallVec::new();
        for view in self.views.values_mut().filter(|v| v.dirty) {
            view.dirty = false;
            if let Some(output) = view.output {
                if !outputs.contains(&output) {
                    outputs.push(output);
                }
            }
        }
        outputs
    }

    fn mark_dirty(&mut self, ids: &[ViewId]) {
        for id in ids {
            if let Some(view) = self.views.get_mut(id) {
                view.dirty = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SurfaceId;

    fn surface_view(scene: &mut Scene, loc: (f64, f64), size: (i32, i32)) -> ViewId {
        let id = scene.create_view(ViewKind::Surface(SurfaceId::next()));
        let view = scene.view_mut(id).unwrap();
        view.set_position(loc);
        view.set_size(size);
        id
    }

    #[test]
    fn add_view_moves_between_layers() {
        let mut scene = Scene::new();
        let v = surface_view(&mut scene, (0.0, 0.0), (10, 10));
        scene.add_view(LayerKind::Apps, v);
        scene.add_view(LayerKind::Fullscreen, v);
        assert!(scene.layer(LayerKind::Apps).views().is_empty());
        assert_eq!(scene.layer(LayerKind::Fullscreen).views(), &[v]);
        assert_eq!(scene.view(v).unwrap().layer(), Some(LayerKind::Fullscreen));
    }

    #[test]
    fn raise_lower_and_place_above() {
        let mut scene = Scene::new();
        let a = surface_view(&mut scene, (0.0, 0.0), (10, 10));
        let b = surface_view(&mut scene, (0.0, 0.0), (10, 10));
        let c = surface_view(&mut scene, (0.0, 0.0), (10, 10));
        for v in [a, b, c] {
            scene.add_view(LayerKind::Apps, v);
        }
        assert_eq!(scene.layer(LayerKind::Apps).top_view(), Some(c));

        scene.raise_on_top(a);
        assert_eq!(scene.layer(LayerKind::Apps).views(), &[b, c, a]);

        scene.lower(a);
        assert_eq!(scene.layer(LayerKind::Apps).views(), &[a, b, c]);

        scene.place_above(a, b);
        assert_eq!(scene.layer(LayerKind::Apps).views(), &[b, a, c]);
        assert!(scene.is_above(a, b));
        assert!(scene.is_above(c, a));
    }

    #[test]
    fn place_above_requires_same_layer() {
        let mut scene = Scene::new();
        let a = surface_view(&mut scene, (0.0, 0.0), (10, 10));
        let b = surface_view(&mut scene, (0.0, 0.0), (10, 10));
        scene.add_view(LayerKind::Apps, a);
        scene.add_view(LayerKind::Panels, b);
        scene.place_above(a, b);
        assert_eq!(scene.view(a).unwrap().layer(), Some(LayerKind::Apps));
    }

    #[test]
    fn hit_test_respects_layers_and_stacking() {
        let mut scene = Scene::new();
        let app = surface_view(&mut scene, (0.0, 0.0), (100, 100));
        let app2 = surface_view(&mut scene, (50.0, 50.0), (100, 100));
        let panel = surface_view(&mut scene, (0.0, 0.0), (200, 20));
        scene.add_view(LayerKind::Apps, app);
        scene.add_view(LayerKind::Apps, app2);
        scene.add_view(LayerKind::Panels, panel);

        assert_eq!(scene.view_under((10.0, 10.0).into()).map(|h| h.0), Some(panel));
        assert_eq!(scene.view_under((10.0, 30.0).into()).map(|h| h.0), Some(app));
        let (hit, local) = scene.view_under((60.0, 60.0).into()).unwrap();
        assert_eq!(hit, app2);
        assert_eq!(local, Point::from((10.0, 10.0)));

        scene.set_layer_visible(LayerKind::Panels, false);
        assert_eq!(scene.view_under((10.0, 10.0).into()).map(|h| h.0), Some(app));
        assert_eq!(scene.view_under((500.0, 500.0).into()), None);
    }

    #[test]
    fn parent_chain_mapping_and_masks() {
        let mut scene = Scene::new();
        let root = scene.create_view(ViewKind::Root);
        scene.view_mut(root).unwrap().set_position((-1000.0, 0.0));
        scene
            .view_mut(root)
            .unwrap()
            .set_mask(Some(Rectangle::from_loc_and_size((0, 0), (800, 600))));

        let v = surface_view(&mut scene, (1100.0, 50.0), (100, 100));
        assert!(scene.set_transform_parent(v, Some(root)));
        scene.add_view(LayerKind::Apps, v);

        assert_eq!(scene.global_position(v), Some(Point::from((100.0, 50.0))));
        assert_eq!(
            scene.map_from_global(v, (110.0, 60.0).into()),
            Some(Point::from((10.0, 10.0)))
        );
        assert!(scene.view_under((110.0, 60.0).into()).is_some());

        // the mask of the root clips its children
        scene.view_mut(root).unwrap().set_position((-1750.0, 0.0));
        assert_eq!(scene.global_position(v), Some(Point::from((-650.0, 50.0))));
        assert!(scene.view_under((-640.0, 60.0).into()).is_none());

        // no cycles
        assert!(!scene.set_transform_parent(root, Some(v)));
    }

    #[test]
    fn scaled_views_hit_test_through_inverse() {
        let mut scene = Scene::new();
        let v = surface_view(&mut scene, (100.0, 100.0), (200, 200));
        scene
            .view_mut(v)
            .unwrap()
            .set_transform(Some(Affine::scale(0.5, 0.5)));
        scene.add_view(LayerKind::Apps, v);

        let (_, local) = scene.view_under((150.0, 150.0).into()).unwrap();
        assert_eq!(local, Point::from((100.0, 100.0)));
        assert!(scene.view_under((250.0, 250.0).into()).is_none());
    }

    #[test]
    fn destroy_clears_layer_and_children() {
        let mut scene = Scene::new();
        let parent = surface_view(&mut scene, (10.0, 10.0), (10, 10));
        let child = surface_view(&mut scene, (5.0, 5.0), (10, 10));
        scene.set_transform_parent(child, Some(parent));
        scene.add_view(LayerKind::Apps, parent);
        scene.destroy_view(parent);
        assert!(scene.layer(LayerKind::Apps).views().is_empty());
        assert_eq!(scene.view(child).unwrap().transform_parent(), None);
        assert_eq!(scene.global_position(child), Some(Point::from((5.0, 5.0))));
        // stale handle
        scene.raise_on_top(parent);
        scene.add_view(LayerKind::Apps, parent);
        assert!(scene.layer(LayerKind::Apps).views().is_empty());
    }
}
