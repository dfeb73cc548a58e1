use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use parking_lot::Mutex;

use crate::{
    composite::blend::Eye,
    foundation::{
        core::{Mat4, Size2, Vec3},
        error::ShadowResult,
    },
    gpu::{
        backend::GpuBackend,
        image::{GpuImage, ImageDesc, ImageUsage, PixelFormat},
    },
    mix::events::{EventBus, PipelineEvent},
    render::{
        draw::{build_draw_list, offset_camera},
        renderer::{RenderOutcome, auto_frame_stage, await_raster, submit_raster},
    },
    scene::{
        camera::Camera,
        entity::{Entity, EntityId},
        stage::Stage,
    },
};

/// Half the distance between the two eyes, in world units.
pub const EYE_OFFSET: f32 = 0.05;

/// Renders the stage twice, from two eyes side by side, into a left and a right image.
pub struct StereoRenderer {
    backend: Arc<dyn GpuBackend>,
    stage: Stage,
    left: GpuImage,
    right: GpuImage,
    camera_distance: f32,
    is_rendering: Arc<AtomicBool>,
    events: EventBus<PipelineEvent>,
}

impl StereoRenderer {
    /// Renderer with two `Rgba8Unorm` eye images of `size`.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        size: Size2,
        camera: Camera,
        events: EventBus<PipelineEvent>,
    ) -> ShadowResult<Self> {
        let desc = ImageDesc::new(
            size,
            PixelFormat::Rgba8Unorm,
            ImageUsage::RENDER_TARGET | ImageUsage::SHADER_READ,
        );
        let left = backend.create_image(desc)?;
        let right = backend.create_image(desc)?;
        Ok(Self {
            backend,
            stage: Stage::new(camera),
            left,
            right,
            camera_distance: 20.0,
            is_rendering: Arc::new(AtomicBool::new(false)),
            events,
        })
    }

    /// Image rendered for `eye`.
    pub fn image(&self, eye: Eye) -> &GpuImage {
        match eye {
            Eye::Left => &self.left,
            Eye::Right => &self.right,
        }
    }

    /// Camera rig at the midpoint of the eyes.
    pub fn rig(&self) -> &Camera {
        self.stage.camera()
    }

    /// Camera of one eye.
    pub fn eye_camera(&self, eye: Eye) -> Camera {
        let offset = match eye {
            Eye::Left => -EYE_OFFSET,
            Eye::Right => EYE_OFFSET,
        };
        offset_camera(self.stage.camera(), offset)
    }

    /// The stage shared by both eyes.
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Mutable stage.
    pub fn stage_mut(&mut self) -> &mut Stage {
        &mut self.stage
    }

    /// Add an entity.
    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        self.stage.add_entity(entity)
    }

    /// Remove an entity.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        self.stage.remove_entity(id)
    }

    /// Remove every entity; the rig stays.
    pub fn remove_all_entities(&mut self) {
        self.stage.remove_all_entities();
    }

    /// Point the rig.
    pub fn look_at(&mut self, target: Vec3, from: Vec3, relative_to: Option<&Mat4>) {
        self.stage.camera_mut().look_at(target, from, relative_to);
    }

    /// Distance used by [`StereoRenderer::auto_frame`].
    pub fn set_camera_distance(&mut self, distance: f32) {
        self.camera_distance = distance;
    }

    /// Aim the rig at the center of all enabled entities.
    pub fn auto_frame(&mut self) -> bool {
        auto_frame_stage(&mut self.stage, self.camera_distance)
    }

    /// Whether either eye is outstanding.
    pub fn is_rendering(&self) -> bool {
        self.is_rendering.load(Ordering::Acquire)
    }

    /// Render the left eye, wait for it, then the right eye.
    ///
    /// Busy while either eye is outstanding. `RenderUpdated` is emitted once, after the right eye.
    pub async fn render_async(&self) -> ShadowResult<RenderOutcome> {
        if self
            .is_rendering
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(RenderOutcome::Busy);
        }
        let size = self.left.size();
        let mut pass = StereoPass::new(Arc::clone(&self.is_rendering));

        let left_draw = build_draw_list(&self.stage, &self.eye_camera(Eye::Left), size);
        let handoff = Arc::clone(&pass.handoff);
        let left_done = move |ok: bool| handoff.left_finished(ok);
        let rx = submit_raster(self.backend.as_ref(), &self.left, left_draw, left_done)
            .inspect_err(|_| pass.handoff.release())?;
        await_raster(rx).await?;

        let right_draw = build_draw_list(&self.stage, &self.eye_camera(Eye::Right), size);
        let guard = Arc::clone(&self.is_rendering);
        let events = self.events.clone();
        let right_done = move |ok: bool| {
            guard.store(false, Ordering::Release);
            if ok {
                events.emit(&PipelineEvent::RenderUpdated);
            }
        };
        let submitted = submit_raster(self.backend.as_ref(), &self.right, right_draw, right_done);
        let rx = match submitted {
            Ok(rx) => {
                pass.right_submitted();
                rx
            }
            Err(e) => {
                pass.handoff.release();
                return Err(e);
            }
        };
        await_raster(rx).await?;
        Ok(RenderOutcome::Rendered)
    }
}

#[derive(Default)]
struct HandoffState {
    left_finished: bool,
    abandoned: bool,
    released: bool,
}

/// Clears the busy flag exactly once on behalf of a stereo pass that has not reached its
/// right eye.
struct Handoff {
    flag: Arc<AtomicBool>,
    state: Mutex<HandoffState>,
}

impl Handoff {
    fn release_locked(&self, st: &mut HandoffState) {
        if !st.released {
            st.released = true;
            self.flag.store(false, Ordering::Release);
        }
    }

    fn release(&self) {
        let mut st = self.state.lock();
        self.release_locked(&mut st);
    }

    fn left_finished(&self, ok: bool) {
        let mut st = self.state.lock();
        st.left_finished = true;
        if !ok || st.abandoned {
            self.release_locked(&mut st);
        }
    }

    fn abandon(&self) {
        let mut st = self.state.lock();
        st.abandoned = true;
        if st.left_finished {
            self.release_locked(&mut st);
        }
    }
}

/// Owned by the render future until the right eye is submitted. Dropping it early leaves the
/// busy flag to the left eye's completion, or clears it if that already ran.
struct StereoPass {
    handoff: Arc<Handoff>,
    armed: bool,
}

impl StereoPass {
    fn new(flag: Arc<AtomicBool>) -> Self {
        Self {
            handoff: Arc::new(Handoff {
                flag,
                state: Mutex::new(HandoffState::default()),
            }),
            armed: true,
        }
    }

    /// The right eye's completion owns the flag from here on.
    fn right_submitted(&mut self) {
        self.armed = false;
    }
}

impl Drop for StereoPass {
    fn drop(&mut self) {
        if self.armed {
            self.handoff.abandon();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/stereo.rs"]
mod tests;
