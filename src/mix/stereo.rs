use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    composite::{
        blend::{Eye, StereoStyle},
        compositor::{CompositeOutcome, Compositor},
    },
    config::MixConfig,
    foundation::{
        core::Size2,
        error::{ShadowError, ShadowResult},
    },
    gpu::{
        backend::GpuBackend,
        image::{ImageDesc, ImageUsage, PixelFormat},
        mutable::{DisplayHandle, MutableImage},
    },
    mix::events::{EventBus, PipelineEvent, SubscriptionId},
    render::{renderer::RenderOutcome, stereo::StereoRenderer},
    scene::{
        camera::Camera,
        entity::{Entity, EntityId},
    },
};

struct Outputs {
    left: MutableImage,
    right: MutableImage,
}

/// Stereo counterpart of the mix manager: two eye renders routed into two outputs.
///
/// Every finished stereo render triggers a stereo composite.
pub struct StereoMix {
    renderer: StereoRenderer,
    compositor: Arc<Compositor>,
    outputs: Arc<Outputs>,
    style: Arc<RwLock<StereoStyle>>,
    events: EventBus<PipelineEvent>,
    subscription: Option<SubscriptionId>,
}

impl StereoMix {
    /// Stereo pipeline of `size` using the blend and stereo styles of `config`.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        size: Size2,
        camera: Camera,
        config: &MixConfig,
        events: EventBus<PipelineEvent>,
    ) -> ShadowResult<Self> {
        config.validate()?;
        let mut renderer =
            StereoRenderer::new(Arc::clone(&backend), size, camera, events.clone())?;
        renderer.set_camera_distance(config.camera_distance);
        let desc = ImageDesc::new(
            size,
            PixelFormat::Bgra8Unorm,
            ImageUsage::SHADER_READ | ImageUsage::SHADER_WRITE,
        );
        let outputs = Arc::new(Outputs {
            left: MutableImage::new(Arc::clone(&backend), desc)?,
            right: MutableImage::new(Arc::clone(&backend), desc)?,
        });
        let compositor = Arc::new(Compositor::new(
            backend,
            config.blend_style,
            config.gray_add,
            events.clone(),
        ));
        let style = Arc::new(RwLock::new(config.stereo_style));

        let subscription = {
            let compositor = Arc::clone(&compositor);
            let outputs = Arc::clone(&outputs);
            let style = Arc::clone(&style);
            let left = renderer.image(Eye::Left).clone();
            let right = renderer.image(Eye::Right).clone();
            events.subscribe(move |e: &PipelineEvent| {
                if matches!(e, PipelineEvent::RenderUpdated) {
                    compositor.composite_stereo(
                        &left,
                        &right,
                        &outputs.left,
                        &outputs.right,
                        *style.read(),
                    );
                }
            })
        };

        Ok(Self {
            renderer,
            compositor,
            outputs,
            style,
            events,
            subscription: Some(subscription),
        })
    }

    /// The stereo renderer.
    pub fn renderer(&self) -> &StereoRenderer {
        &self.renderer
    }

    /// Add a puppet entity to the shared stage.
    pub fn add_entity(&mut self, entity: Entity) -> ShadowResult<EntityId> {
        self.ensure_live()?;
        Ok(self.renderer.add_entity(entity))
    }

    /// Aim the rig at everything on stage.
    pub fn auto_frame(&mut self) -> ShadowResult<bool> {
        self.ensure_live()?;
        Ok(self.renderer.auto_frame())
    }

    /// Render both eyes; the composite follows from the render notification.
    pub async fn render_and_composite(&self) -> ShadowResult<RenderOutcome> {
        self.ensure_live()?;
        self.renderer.render_async().await
    }

    /// Run one stereo composite of the current eye images.
    pub fn composite(&self) -> ShadowResult<CompositeOutcome> {
        self.ensure_live()?;
        Ok(self.compositor.composite_stereo(
            self.renderer.image(Eye::Left),
            self.renderer.image(Eye::Right),
            &self.outputs.left,
            &self.outputs.right,
            *self.style.read(),
        ))
    }

    /// Change the eye routing and composite again right away.
    pub fn set_stereo_style(&self, style: StereoStyle) -> ShadowResult<CompositeOutcome> {
        self.ensure_live()?;
        *self.style.write() = style;
        tracing::debug!(style = ?style, "stereo style changed");
        self.composite()
    }

    /// Current eye routing.
    pub fn stereo_style(&self) -> StereoStyle {
        *self.style.read()
    }

    /// The shared compositor.
    pub fn compositor(&self) -> &Arc<Compositor> {
        &self.compositor
    }

    /// Read-only handle on the output presented to `eye`.
    pub fn output(&self, eye: Eye) -> DisplayHandle {
        match eye {
            Eye::Left => self.outputs.left.display_handle(),
            Eye::Right => self.outputs.right.display_handle(),
        }
    }

    /// Whether [`StereoMix::clean`] has run.
    pub fn is_torn_down(&self) -> bool {
        self.subscription.is_none()
    }

    /// Unwire and empty the stage. Safe to call repeatedly.
    pub fn clean(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.events.unsubscribe(id);
            self.renderer.remove_all_entities();
            tracing::debug!("stereo mix torn down");
        }
    }

    fn ensure_live(&self) -> ShadowResult<()> {
        if self.is_torn_down() {
            Err(ShadowError::TornDown)
        } else {
            Ok(())
        }
    }
}

impl Drop for StereoMix {
    fn drop(&mut self) {
        self.clean();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mix/stereo.rs"]
mod tests;
