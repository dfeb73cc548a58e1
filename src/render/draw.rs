use kurbo::Point;

use crate::{
    foundation::core::{Mat4, Size2, Vec2, Vec3},
    gpu::raster::{DrawItem, DrawList, Primitive},
    scene::{camera::Camera, entity::max_axis_scale, stage::Stage},
};

/// Bone half-width relative to the smaller adjacent joint radius.
const BONE_WIDTH: f32 = 0.6;

/// Project every enabled entity of `stage` through `camera` into a depth-sorted draw list.
pub fn build_draw_list(stage: &Stage, camera: &Camera, size: Size2) -> DrawList {
    let view = camera.view();
    let mut list = DrawList::default();
    for entity in stage.entities().iter().filter(|e| e.enabled) {
        let geo = entity.world_geometry();
        let scale = max_axis_scale(&entity.transform);
        let projected: Vec<_> = geo
            .points
            .iter()
            .map(|p| camera.project(&view, *p, size))
            .collect();

        for &(a, b) in &geo.bones {
            let (Some(pa), Some(pb)) = (projected[a], projected[b]) else {
                continue;
            };
            let axis = geo.points[b] - geo.points[a];
            let radius = geo.radii[a].min(geo.radii[b]) * scale * BONE_WIDTH;
            list.push(DrawItem {
                shape: Primitive::Capsule {
                    a: to_point(pa.px),
                    b: to_point(pb.px),
                    radius: f64::from(radius * 0.5 * (pa.px_per_unit + pb.px_per_unit)),
                },
                color: geo.colors[b].shaded(camera.shade_along(axis)),
                depth: 0.5 * (pa.depth + pb.depth),
            });
        }
        for (i, p) in projected.iter().enumerate() {
            let Some(p) = p else { continue };
            list.push(DrawItem {
                shape: Primitive::Disc {
                    center: to_point(p.px),
                    radius: f64::from(geo.radii[i] * scale * p.px_per_unit),
                },
                color: geo.colors[i],
                // Joints sit on top of the bones meeting them.
                depth: p.depth - geo.radii[i] * scale,
            });
        }
    }
    list.sort_by_depth();
    list
}

/// `camera` moved sideways by `offset` along its own x axis.
pub fn offset_camera(camera: &Camera, offset: f32) -> Camera {
    let mut eye = camera.clone();
    eye.transform = camera.transform * Mat4::from_translation(Vec3::new(offset, 0.0, 0.0));
    eye
}

fn to_point(v: Vec2) -> Point {
    Point::new(f64::from(v.x), f64::from(v.y))
}

#[cfg(test)]
#[path = "../../tests/unit/render/draw.rs"]
mod tests;
