use crate::foundation::error::{ShadowError, ShadowResult};

pub use glam::{Mat4, Quat, Vec2, Vec3};

/// Natural pixel size of a video or render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Size2 {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size2 {
    /// Create a validated, non-empty size.
    pub fn new(width: u32, height: u32) -> ShadowResult<Self> {
        if width == 0 || height == 0 {
            return Err(ShadowError::validation(format!(
                "size must be non-zero, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    /// Height divided by width, used to size display planes.
    pub fn aspect_hw(self) -> f32 {
        self.height as f32 / self.width as f32
    }

    /// Number of pixels.
    pub fn pixel_count(self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }
}

/// Straight-alpha RGBA8 color used for scene materials.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8 {
    /// Opaque color from RGB components.
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Opaque white.
    pub const WHITE: Self = Self::opaque(255, 255, 255);

    /// Scale RGB by `factor` (clamped to `[0, 1]`), keeping alpha.
    pub fn shaded(self, factor: f32) -> Self {
        let f = factor.clamp(0.0, 1.0);
        let s = |c: u8| ((f32::from(c) * f).round() as i32).clamp(0, 255) as u8;
        Self {
            r: s(self.r),
            g: s(self.g),
            b: s(self.b),
            a: self.a,
        }
    }
}

/// Axis-aligned bounding box in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds3 {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Bounds3 {
    /// Box around a sphere.
    pub fn from_sphere(center: Vec3, radius: f32) -> Self {
        let r = Vec3::splat(radius.max(0.0));
        Self {
            min: center - r,
            max: center + r,
        }
    }

    /// Smallest box containing both.
    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Union of an optional accumulator with a new box.
    pub fn merge(acc: Option<Self>, other: Self) -> Option<Self> {
        Some(match acc {
            Some(a) => a.union(other),
            None => other,
        })
    }

    /// Center point.
    pub fn center(self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Edge lengths.
    pub fn extents(self) -> Vec3 {
        self.max - self.min
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
