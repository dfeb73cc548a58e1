use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use futures::channel::oneshot;

use crate::{
    foundation::{
        core::{Mat4, Rgba8, Size2, Vec3},
        error::{ShadowError, ShadowResult},
    },
    gpu::{
        backend::GpuBackend,
        command::{BatchTiming, Command, CommandBatch},
        image::{GpuImage, ImageDesc, ImageUsage, PixelFormat},
        raster::DrawList,
    },
    mix::events::{EventBus, PipelineEvent},
    render::draw::build_draw_list,
    scene::{
        camera::{Camera, DirectionalLight, Projection},
        entity::{Entity, EntityId},
        stage::Stage,
    },
};

/// Background of the scene image. Opaque black adds nothing in the blends.
pub const SCENE_CLEAR: Rgba8 = Rgba8::opaque(0, 0, 0);

/// Result of a render request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    /// A frame was rendered into the color image.
    Rendered,
    /// A previous render is still outstanding; nothing was done.
    Busy,
}

/// Off-screen renderer of the puppet stage into a color image.
pub struct SceneRenderer {
    backend: Arc<dyn GpuBackend>,
    stage: Stage,
    color: GpuImage,
    camera_distance: f32,
    is_rendering: Arc<AtomicBool>,
    events: EventBus<PipelineEvent>,
}

impl SceneRenderer {
    /// Renderer with a freshly allocated `Rgba8Unorm` color image of `size`.
    #[tracing::instrument(level = "debug", skip(backend, camera, events))]
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        size: Size2,
        camera: Camera,
        events: EventBus<PipelineEvent>,
    ) -> ShadowResult<Self> {
        let color = backend.create_image(ImageDesc::new(
            size,
            PixelFormat::Rgba8Unorm,
            ImageUsage::RENDER_TARGET | ImageUsage::SHADER_READ,
        ))?;
        Ok(Self::with_target(backend, color, camera, events))
    }

    /// Renderer drawing into an existing image.
    pub fn with_target(
        backend: Arc<dyn GpuBackend>,
        color: GpuImage,
        camera: Camera,
        events: EventBus<PipelineEvent>,
    ) -> Self {
        Self {
            backend,
            stage: Stage::new(camera),
            color,
            camera_distance: 20.0,
            is_rendering: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    /// The image every render writes.
    pub fn color_image(&self) -> &GpuImage {
        &self.color
    }

    /// Size of the color image.
    pub fn size(&self) -> Size2 {
        self.color.size()
    }

    /// The stage.
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Mutable stage.
    pub fn stage_mut(&mut self) -> &mut Stage {
        &mut self.stage
    }

    /// Add an entity to the stage.
    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        self.stage.add_entity(entity)
    }

    /// Remove an entity from the stage.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        self.stage.remove_entity(id)
    }

    /// Remove every entity; the camera stays.
    pub fn remove_all_entities(&mut self) {
        self.stage.remove_all_entities();
    }

    /// Point the camera; see [`Camera::look_at`].
    pub fn look_at(&mut self, target: Vec3, from: Vec3, relative_to: Option<&Mat4>) {
        self.stage.camera_mut().look_at(target, from, relative_to);
    }

    /// Distance [`SceneRenderer::auto_frame`] keeps from the framed center.
    pub fn set_camera_distance(&mut self, distance: f32) {
        self.camera_distance = distance;
    }

    /// Replace the camera lens.
    pub fn set_projection(&mut self, projection: Projection) {
        self.stage.camera_mut().projection = projection;
    }

    /// Turn the camera's directional light on or off.
    pub fn set_default_light(&mut self, enabled: bool) {
        self.stage.camera_mut().light = enabled.then(DirectionalLight::default);
    }

    /// Aim the camera at the center of all enabled entities. `false` if there is nothing to frame.
    pub fn auto_frame(&mut self) -> bool {
        auto_frame_stage(&mut self.stage, self.camera_distance)
    }

    /// Whether a render is outstanding.
    pub fn is_rendering(&self) -> bool {
        self.is_rendering.load(Ordering::Acquire)
    }

    /// Render the stage into the color image.
    ///
    /// Returns [`RenderOutcome::Busy`] without doing anything while a previous render is
    /// outstanding. On success [`PipelineEvent::RenderUpdated`] is emitted from the backend's
    /// queue thread before this future resolves.
    pub async fn render_async(&self) -> ShadowResult<RenderOutcome> {
        if self
            .is_rendering
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(RenderOutcome::Busy);
        }
        let draw = build_draw_list(&self.stage, self.stage.camera(), self.size());
        let guard = Arc::clone(&self.is_rendering);
        let events = self.events.clone();
        let on_done = move |ok: bool| {
            guard.store(false, Ordering::Release);
            if ok {
                events.emit(&PipelineEvent::RenderUpdated);
            }
        };
        let rx = match submit_raster(self.backend.as_ref(), &self.color, draw, on_done) {
            Ok(rx) => rx,
            Err(e) => {
                self.is_rendering.store(false, Ordering::Release);
                return Err(e);
            }
        };
        await_raster(rx).await?;
        Ok(RenderOutcome::Rendered)
    }
}

/// Aim the stage camera at the union of visual bounds from `distance` along +z.
pub(crate) fn auto_frame_stage(stage: &mut Stage, distance: f32) -> bool {
    let Some(bounds) = stage.visual_bounds() else {
        return false;
    };
    let center = bounds.center();
    stage
        .camera_mut()
        .look_at(center, center + Vec3::new(0.0, 0.0, distance), None);
    true
}

/// Submit one raster pass. `on_done(succeeded)` runs on the queue thread before the
/// returned receiver resolves.
pub(crate) fn submit_raster(
    backend: &dyn GpuBackend,
    target: &GpuImage,
    draw: DrawList,
    on_done: impl FnOnce(bool) + Send + 'static,
) -> ShadowResult<oneshot::Receiver<ShadowResult<BatchTiming>>> {
    target
        .require(ImageUsage::RENDER_TARGET, "scene render")
        .map_err(|e| ShadowError::render(format!("render target unusable: {e}")))?;
    let mut batch = CommandBatch::new("scene_render");
    batch.push(Command::Rasterize {
        target: target.clone(),
        clear: SCENE_CLEAR,
        draw: Arc::new(draw),
    });
    let (tx, rx) = oneshot::channel();
    backend
        .submit(
            batch,
            Box::new(move |res| {
                on_done(res.is_ok());
                let _ = tx.send(res);
            }),
        )
        .map_err(|e| ShadowError::render(format!("render submit failed: {e}")))?;
    Ok(rx)
}

pub(crate) async fn await_raster(
    rx: oneshot::Receiver<ShadowResult<BatchTiming>>,
) -> ShadowResult<BatchTiming> {
    match rx.await {
        Ok(Ok(timing)) => {
            tracing::trace!(elapsed = ?timing.duration(), "scene render completed");
            Ok(timing)
        }
        Ok(Err(e)) => Err(ShadowError::render(format!("scene render failed: {e}"))),
        Err(oneshot::Canceled) => Err(ShadowError::render(
            "render completion was dropped by the backend",
        )),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/renderer.rs"]
mod tests;
