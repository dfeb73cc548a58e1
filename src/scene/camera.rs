use crate::foundation::core::{Mat4, Size2, Vec2, Vec3};

/// Camera lens.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// Parallel projection showing `scale` world units vertically.
    Orthographic {
        /// Visible height in world units; smaller draws the subject larger.
        scale: f32,
    },
    /// Pinhole projection.
    Perspective {
        /// Vertical field of view in radians.
        fov_y: f32,
    },
}

/// Directional light attached to the camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    /// Share of the color kept where the light grazes a surface.
    pub ambient: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self { ambient: 0.35 }
    }
}

/// A point mapped to the render target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projected {
    /// Pixel position, origin top-left, y down.
    pub px: Vec2,
    /// Distance in front of the camera.
    pub depth: f32,
    /// Pixels per world unit at this depth.
    pub px_per_unit: f32,
}

/// Off-screen camera.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    /// World-from-camera transform; the camera looks down its local -z.
    pub transform: Mat4,
    /// Lens.
    pub projection: Projection,
    /// Near clip distance.
    pub near: f32,
    /// Far clip distance.
    pub far: f32,
    /// Light carried by the camera, `None` for unlit rendering.
    pub light: Option<DirectionalLight>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            transform: Mat4::IDENTITY,
            projection: Projection::Orthographic { scale: 1.0 },
            near: 0.1,
            far: 100.0,
            light: Some(DirectionalLight::default()),
        }
    }
}

impl Camera {
    /// Point the camera from `from` at `target`; both are in `relative_to`'s space if given.
    pub fn look_at(&mut self, target: Vec3, from: Vec3, relative_to: Option<&Mat4>) {
        let (target, from) = match relative_to {
            Some(m) => (m.transform_point3(target), m.transform_point3(from)),
            None => (target, from),
        };
        if (target - from).length_squared() <= f32::EPSILON {
            self.transform = Mat4::from_translation(from);
            return;
        }
        let forward = (target - from).normalize();
        let up = if forward.cross(Vec3::Y).length_squared() <= 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        self.transform = Mat4::look_at_rh(from, target, up).inverse();
    }

    /// Camera position in world space.
    pub fn position(&self) -> Vec3 {
        self.transform.w_axis.truncate()
    }

    /// Viewing direction in world space.
    pub fn forward(&self) -> Vec3 {
        -self.transform.z_axis.truncate().normalize_or_zero()
    }

    /// Camera-from-world transform.
    pub fn view(&self) -> Mat4 {
        self.transform.inverse()
    }

    /// Map a world point to pixels; `None` outside the near/far range.
    pub fn project(&self, view: &Mat4, world: Vec3, size: Size2) -> Option<Projected> {
        let v = view.transform_point3(world);
        let depth = -v.z;
        if !(self.near..=self.far).contains(&depth) {
            return None;
        }
        let (w, h) = (size.width as f32, size.height as f32);
        let aspect = w / h;
        match self.projection {
            Projection::Orthographic { scale } => {
                let ppu = h / scale;
                Some(Projected {
                    px: Vec2::new((v.x / (scale * aspect) + 0.5) * w, (0.5 - v.y / scale) * h),
                    depth,
                    px_per_unit: ppu,
                })
            }
            Projection::Perspective { fov_y } => {
                let f = 1.0 / (fov_y * 0.5).tan();
                let ndc = Vec2::new(v.x * f / (aspect * depth), v.y * f / depth);
                Some(Projected {
                    px: Vec2::new((ndc.x * 0.5 + 0.5) * w, (0.5 - ndc.y * 0.5) * h),
                    depth,
                    px_per_unit: f * h / (2.0 * depth),
                })
            }
        }
    }

    /// Brightness factor for a surface whose tangent runs along `axis`.
    pub fn shade_along(&self, axis: Vec3) -> f32 {
        let Some(light) = self.light else {
            return 1.0;
        };
        let l = self.forward();
        let a = axis.normalize_or_zero();
        let facing = (1.0 - a.dot(l).powi(2)).max(0.0).sqrt();
        light.ambient + (1.0 - light.ambient) * facing
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/camera.rs"]
mod tests;
