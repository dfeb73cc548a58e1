use kurbo::{BezPath, Circle, Point, Shape, Vec2};

use crate::{
    foundation::{
        core::Rgba8,
        error::{ShadowError, ShadowResult},
    },
    gpu::image::PixelFormat,
};

const FLATTEN_TOLERANCE: f64 = 0.1;

/// Screen-space primitive shape in pixel coordinates (origin top-left, y down).
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    /// Filled circle, used for joints.
    Disc {
        /// Center in pixels.
        center: Point,
        /// Radius in pixels.
        radius: f64,
    },
    /// Filled stadium between two points, used for bones.
    Capsule {
        /// First end.
        a: Point,
        /// Second end.
        b: Point,
        /// Half width in pixels.
        radius: f64,
    },
}

impl Primitive {
    /// Outline as a path.
    pub fn to_path(&self) -> BezPath {
        match *self {
            Self::Disc { center, radius } => Circle::new(center, radius).to_path(FLATTEN_TOLERANCE),
            Self::Capsule { a, b, radius } => capsule_path(a, b, radius),
        }
    }
}

fn capsule_path(a: Point, b: Point, radius: f64) -> BezPath {
    let d = b - a;
    let len = d.hypot();
    if len <= f64::EPSILON {
        return Circle::new(a, radius).to_path(FLATTEN_TOLERANCE);
    }
    let n = Vec2::new(-d.y, d.x) * (radius / len);
    let mut path = BezPath::new();
    path.move_to(a + n);
    path.line_to(b + n);
    path.line_to(b - n);
    path.line_to(a - n);
    path.close_path();
    for el in Circle::new(a, radius).path_elements(FLATTEN_TOLERANCE) {
        path.push(el);
    }
    for el in Circle::new(b, radius).path_elements(FLATTEN_TOLERANCE) {
        path.push(el);
    }
    path
}

/// One colored primitive with a view depth (larger is farther).
#[derive(Clone, Debug, PartialEq)]
pub struct DrawItem {
    /// Shape.
    pub shape: Primitive,
    /// Fill color.
    pub color: Rgba8,
    /// Distance from the camera.
    pub depth: f32,
}

/// Primitives to rasterize into one target, drawn far to near.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DrawList {
    items: Vec<DrawItem>,
}

impl DrawList {
    /// Add an item.
    pub fn push(&mut self, item: DrawItem) {
        self.items.push(item);
    }

    /// Sort far to near. Stable, so equal depths keep insertion order.
    pub fn sort_by_depth(&mut self) {
        self.items
            .sort_by(|a, b| b.depth.total_cmp(&a.depth));
    }

    /// Items in draw order.
    pub fn items(&self) -> &[DrawItem] {
        &self.items
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing will be drawn.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Rasterize `draw` over a `clear` background into `out`, stored in `format`.
pub(crate) fn rasterize_cpu(
    width: u32,
    height: u32,
    clear: Rgba8,
    draw: &DrawList,
    format: PixelFormat,
    out: &mut [u8],
) -> ShadowResult<()> {
    let w: u16 = width
        .try_into()
        .map_err(|_| ShadowError::render("raster target width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| ShadowError::render("raster target height exceeds u16"))?;
    if out.len() != usize::from(w) * usize::from(h) * 4 {
        return Err(ShadowError::render("raster target storage size mismatch"));
    }

    let mut ctx = vello_cpu::RenderContext::new(w, h);
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
        clear.r, clear.g, clear.b, clear.a,
    ));
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
        0.0,
        0.0,
        f64::from(w),
        f64::from(h),
    ));
    for item in draw.items() {
        let c = item.color;
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a));
        ctx.fill_path(&bezpath_to_cpu(&item.shape.to_path()));
    }
    ctx.flush();

    let mut pixmap = vello_cpu::Pixmap::new(w, h);
    ctx.render_to_pixmap(&mut pixmap);

    for (dst, src) in out
        .chunks_exact_mut(4)
        .zip(pixmap.data_as_u8_slice().chunks_exact(4))
    {
        let straight = unpremultiply([src[0], src[1], src[2], src[3]]);
        dst.copy_from_slice(&format.store_rgba(straight));
    }
    Ok(())
}

fn unpremultiply(px: [u8; 4]) -> [u8; 4] {
    let a = px[3];
    if a == 0 || a == 255 {
        return px;
    }
    let un = |c: u8| ((u32::from(c) * 255 + u32::from(a) / 2) / u32::from(a)).min(255) as u8;
    [un(px[0]), un(px[1]), un(px[2]), a]
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let p = |p: Point| vello_cpu::kurbo::Point::new(p.x, p.y);
    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(a) => out.move_to(p(a)),
            PathEl::LineTo(a) => out.line_to(p(a)),
            PathEl::QuadTo(a, b) => out.quad_to(p(a), p(b)),
            PathEl::CurveTo(a, b, c) => out.curve_to(p(a), p(b), p(c)),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/gpu/raster.rs"]
mod tests;
