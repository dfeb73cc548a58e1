use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::{
    foundation::{
        core::{Size2, Vec3},
        error::{ShadowError, ShadowResult},
    },
    gpu::mutable::DisplayHandle,
};

/// A textured plane presenting one image to the host's scene.
///
/// Clones share the enable and attach flags.
#[derive(Clone, Debug)]
pub struct DisplayEntity {
    name: &'static str,
    handle: DisplayHandle,
    position: Vec3,
    enabled: Arc<AtomicBool>,
    attached: Arc<AtomicBool>,
}

impl DisplayEntity {
    pub(crate) fn new(
        name: &'static str,
        handle: DisplayHandle,
        position: Vec3,
        enabled: bool,
    ) -> Self {
        Self {
            name,
            handle,
            position,
            enabled: Arc::new(AtomicBool::new(enabled)),
            attached: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Entity name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Read-only view of the presented image.
    pub fn handle(&self) -> &DisplayHandle {
        &self.handle
    }

    /// Placement in the host scene.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Pixel size of the presented image.
    pub fn size(&self) -> Size2 {
        self.handle.size()
    }

    /// Plane extent: one unit wide, height following the image aspect.
    pub fn plane_size(&self) -> (f32, f32) {
        (1.0, self.size().aspect_hw())
    }

    /// Show or hide the plane.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Whether the plane is shown.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Whether the plane is still part of the host scene.
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub(crate) fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }

    /// Read the presented image as RGBA8.
    pub fn read_rgba8(&self) -> ShadowResult<Vec<u8>> {
        if !self.is_attached() {
            return Err(ShadowError::TornDown);
        }
        self.handle.read_rgba8()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mix/display.rs"]
mod tests;
