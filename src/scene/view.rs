use crate::{
    output::OutputId,
    surface::SurfaceId,
    utils::{ids::id_type, Logical, Point, Rectangle, Size},
};

use super::LayerKind;

id_type!(
    /// Handle to a [`View`] stored in a [`Scene`](super::Scene)
    ViewId,
    "view"
);

/// A 2D affine transformation
///
/// Maps `(x, y)` to `(a·x + c·y + tx, b·x + d·y + ty)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    /// x scale / rotation component
    pub a: f64,
    /// y shear / rotation component
    pub b: f64,
    /// x shear / rotation component
    pub c: f64,
    /// y scale / rotation component
    pub d: f64,
    /// horizontal translation
    pub tx: f64,
    /// vertical translation
    pub ty: f64,
}

impl Default for Affine {
    fn default() -> Self {
        Affine::IDENTITY
    }
}

impl Affine {
    /// The identity transformation
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    /// A scale around the origin
    pub fn scale(sx: f64, sy: f64) -> Self {
        Affine {
            a: sx,
            d: sy,
            ..Affine::IDENTITY
        }
    }

    /// A translation
    pub fn translate(tx: f64, ty: f64) -> Self {
        Affine {
            tx,
            ty,
            ..Affine::IDENTITY
        }
    }

    /// `self` followed by `next`
    pub fn then(self, next: Affine) -> Affine {
        Affine {
            a: next.a * self.a + next.c * self.b,
            b: next.b * self.a + next.d * self.b,
            c: next.a * self.c + next.c * self.d,
            d: next.b * self.c + next.d * self.d,
            tx: next.a * self.tx + next.c * self.ty + next.tx,
            ty: next.b * self.tx + next.d * self.ty + next.ty,
        }
    }

    /// Apply the transformation to a point
    pub fn apply(&self, point: Point<f64, Logical>) -> Point<f64, Logical> {
        Point::new(
            self.a * point.x + self.c * point.y + self.tx,
            self.b * point.x + self.d * point.y + self.ty,
        )
    }

    /// The inverse transformation, `None` if degenerate
    pub fn invert(&self) -> Option<Affine> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f64::EPSILON {
            return None;
        }
        let a = self.d / det;
        let b = -self.b / det;
        let c = -self.c / det;
        let d = self.a / det;
        Some(Affine {
            a,
            b,
            c,
            d,
            tx: -(a * self.tx + c * self.ty),
            ty: -(b * self.tx + d * self.ty),
        })
    }

    /// Whether this is the identity
    pub fn is_identity(&self) -> bool {
        *self == Affine::IDENTITY
    }
}

/// What a [`View`] shows
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewKind {
    /// The content of a client surface
    Surface(SurfaceId),
    /// A synthetic solid rectangle, e.g. the backdrop of a fullscreen window
    Backdrop {
        /// RGBA colour of the rectangle
        color: [f32; 4],
    },
    /// A pure coordinate frame other views are parented to; never stacked
    Root,
}

/// A placement of something in the scene graph
#[derive(Debug, Clone)]
pub struct View {
    pub(super) id: ViewId,
    pub(super) kind: ViewKind,
    pub(super) position: Point<f64, Logical>,
    pub(super) size: Size<i32, Logical>,
    pub(super) alpha: f64,
    pub(super) transform: Option<Affine>,
    pub(super) output: Option<OutputId>,
    pub(super) parent: Option<ViewId>,
    pub(super) layer: Option<LayerKind>,
    pub(super) input_region: Option<Rectangle<i32, Logical>>,
    pub(super) mask: Option<Rectangle<i32, Logical>>,
    pub(super) dirty: bool,
}

impl View {
    pub(super) fn new(id: ViewId, kind: ViewKind) -> Self {
        View {
            id,
            kind,
            position: Point::default(),
            size: Size::default(),
            alpha: 1.0,
            transform: None,
            output: None,
            parent: None,
            layer: None,
            input_region: None,
            mask: None,
            dirty: true,
        }
    }

    /// Handle of this view
    pub fn id(&self) -> ViewId {
        self.id
    }

    /// What this view shows
    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    /// The surface shown, if any
    pub fn surface(&self) -> Option<SurfaceId> {
        match self.kind {
            ViewKind::Surface(surface) => Some(surface),
            _ => None,
        }
    }

    /// Position in the frame of the transform parent (global if there is none)
    pub fn position(&self) -> Point<f64, Logical> {
        self.position
    }

    /// Set the position in the frame of the transform parent
    pub fn set_position(&mut self, position: impl Into<Point<f64, Logical>>) {
        let position = position.into();
        if self.position != position {
            self.position = position;
            self.dirty = true;
        }
    }

    /// Untransformed size of the content
    pub fn size(&self) -> Size<i32, Logical> {
        self.size
    }

    /// Set the untransformed size of the content
    pub fn set_size(&mut self, size: impl Into<Size<i32, Logical>>) {
        let size = size.into();
        if self.size != size {
            self.size = size;
            self.dirty = true;
        }
    }

    /// Opacity in `[0, 1]`
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Set the opacity, clamped to `[0, 1]`
    pub fn set_alpha(&mut self, alpha: f64) {
        let alpha = alpha.clamp(0.0, 1.0);
        if self.alpha != alpha {
            self.alpha = alpha;
            self.dirty = true;
        }
    }

    /// The transformation applied to the content before positioning
    pub fn transform(&self) -> Option<Affine> {
        self.transform
    }

    /// Set or clear the content transformation
    pub fn set_transform(&mut self, transform: Option<Affine>) {
        let transform = transform.filter(|t| !t.is_identity());
        if self.transform != transform {
            self.transform = transform;
            self.dirty = true;
        }
    }

    /// The output this view is assigned to
    pub fn output(&self) -> Option<OutputId> {
        self.output
    }

    /// Assign the view to an output
    pub fn set_output(&mut self, output: Option<OutputId>) {
        if self.output != output {
            self.output = output;
            self.dirty = true;
        }
    }

    /// The view whose coordinate frame this view is positioned in
    pub fn transform_parent(&self) -> Option<ViewId> {
        self.parent
    }

    /// The layer this view is stacked in, if any
    pub fn layer(&self) -> Option<LayerKind> {
        self.layer
    }

    /// Restrict input to a sub-rectangle of the content, in local coordinates
    pub fn set_input_region(&mut self, region: Option<Rectangle<i32, Logical>>) {
        self.input_region = region;
    }

    /// The input region in local coordinates
    pub fn input_region(&self) -> Rectangle<i32, Logical> {
        self.input_region
            .unwrap_or_else(|| Rectangle::from_loc_and_size((0, 0), self.size))
    }

    /// Clip this view and its children to a global rectangle
    pub fn set_mask(&mut self, mask: Option<Rectangle<i32, Logical>>) {
        if self.mask != mask {
            self.mask = mask;
            self.dirty = true;
        }
    }

    /// The clip rectangle set on this view itself
    pub fn mask(&self) -> Option<Rectangle<i32, Logical>> {
        self.mask
    }

    /// Whether the view changed since the last repaint
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Map a local point one level up, into the parent's frame
    pub(super) fn to_parent(&self, point: Point<f64, Logical>) -> Point<f64, Logical> {
        let point = match self.transform {
            Some(t) => t.apply(point),
            None => point,
        };
        point + self.position
    }

    /// Map a point of the parent's frame into this view's frame
    pub(super) fn from_parent(&self, point: Point<f64, Logical>) -> Option<Point<f64, Logical>> {
        let point = point - self.position;
        match self.transform {
            Some(t) => t.invert().map(|inv| inv.apply(point)),
            None => Some(point),
        }
    }
}
