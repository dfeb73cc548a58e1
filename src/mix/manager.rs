use std::sync::{Arc, Weak};

use crate::{
    assets::provider::AssetProvider,
    composite::{
        blend::BlendStyle,
        compositor::{CompositeOutcome, Compositor},
    },
    config::MixConfig,
    foundation::{
        core::{Size2, Vec3},
        error::{ShadowError, ShadowResult},
    },
    gpu::{
        backend::GpuBackend,
        image::{GpuImage, ImageDesc, ImageUsage, PixelFormat},
        mutable::MutableImage,
    },
    mix::{
        display::DisplayEntity,
        events::{EventBus, PipelineEvent, SubscriptionId},
        puppet::Puppet,
        tracking::{AnchorEventKind, PoseEvent, SubjectKind},
    },
    render::{
        framing::{AutoFramePolicy, FrameAttempt},
        renderer::{RenderOutcome, SceneRenderer},
    },
    scene::camera::{Camera, DirectionalLight, Projection},
    video::{player::VideoPlayer, tap::VideoFrameTap},
};

/// Lifecycle of a [`MixManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MixState {
    /// Constructed, no session yet.
    Uninitialized,
    /// Session built; waiting for pose updates.
    Ready,
    /// Pose updates are flowing.
    Tracking,
    /// Cleaned up. Terminal.
    TornDown,
}

/// What one [`MixManager::update_pose`] call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoseUpdate {
    /// Auto-frame result, for added anchors.
    pub framing: Option<FrameAttempt>,
    /// Render result, on every Nth update.
    pub render: Option<RenderOutcome>,
    /// Composite result of the follow-up populate.
    pub composite: Option<CompositeOutcome>,
}

struct Session {
    kind: SubjectKind,
    renderer: SceneRenderer,
    output: MutableImage,
    tap: VideoFrameTap,
    compositor: Arc<Compositor>,
    player: Arc<VideoPlayer>,
    output_display: DisplayEntity,
    video_display: DisplayEntity,
    subscriptions: Vec<SubscriptionId>,
    puppet: Option<Puppet>,
    framing: AutoFramePolicy,
    updates: u64,
}

/// Orchestrates the scene renderer, the video tap and the compositor for one subject.
///
/// Compositing is triggered by render completion, by new video frames and by
/// [`MixManager::populate_if_idle`].
pub struct MixManager {
    backend: Arc<dyn GpuBackend>,
    assets: Arc<dyn AssetProvider>,
    config: MixConfig,
    events: EventBus<PipelineEvent>,
    state: MixState,
    session: Option<Session>,
}

impl MixManager {
    /// Manager in [`MixState::Uninitialized`].
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        assets: Arc<dyn AssetProvider>,
        config: MixConfig,
    ) -> Self {
        Self {
            backend,
            assets,
            config,
            events: EventBus::new(),
            state: MixState::Uninitialized,
            session: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MixState {
        self.state
    }

    /// Notifications of this manager's pipeline. Handlers run on the emitting thread.
    pub fn events(&self) -> &EventBus<PipelineEvent> {
        &self.events
    }

    /// Active configuration.
    pub fn config(&self) -> &MixConfig {
        &self.config
    }

    /// Build a session for `video_name` at its natural size.
    ///
    /// Running setup again replaces the previous session, including its images.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn setup(&mut self, video_name: &str, kind: SubjectKind) -> ShadowResult<()> {
        self.ensure_live()?;
        self.config.validate()?;
        if let Some(old) = self.session.take() {
            self.teardown(old);
        }

        let source = self.assets.video(video_name)?;
        let size = source.natural_size().map_err(|e| {
            ShadowError::setup(format!("natural size of '{video_name}' unavailable: {e}"))
        })?;
        tracing::info!(width = size.width, height = size.height, "video natural size");

        let camera = Camera {
            projection: Projection::Orthographic {
                scale: self.ortho_scale(kind),
            },
            near: self.config.near,
            far: self.config.far,
            light: self.config.default_light.then(DirectionalLight::default),
            ..Camera::default()
        };
        let mut renderer =
            SceneRenderer::new(Arc::clone(&self.backend), size, camera, self.events.clone())
                .map_err(|e| ShadowError::setup(format!("scene renderer: {e}")))?;
        renderer.set_camera_distance(self.config.camera_distance);

        let output = self.surface(size, "output image")?;
        let raw = self.surface(size, "raw video image")?;
        let tap = VideoFrameTap::new(Arc::clone(&self.backend), self.events.clone());
        let compositor = Arc::new(Compositor::new(
            Arc::clone(&self.backend),
            self.config.blend_style,
            self.config.gray_add,
            self.events.clone(),
        ));
        let player = Arc::new(VideoPlayer::new(
            source,
            tap.clone(),
            raw.clone(),
            self.events.clone(),
        ));

        let subscriptions = self.wire(
            renderer.color_image().clone(),
            &tap,
            &compositor,
            &output,
            &player,
        );

        self.session = Some(Session {
            kind,
            output_display: DisplayEntity::new(
                "MixedTexture",
                output.display_handle(),
                Vec3::new(0.0, 1.0, -2.0),
                true,
            ),
            video_display: DisplayEntity::new(
                "OriginalVideo",
                raw.display_handle(),
                Vec3::new(1.2, 1.0, -2.0),
                false,
            ),
            renderer,
            output,
            tap,
            compositor,
            player,
            subscriptions,
            puppet: None,
            framing: AutoFramePolicy::new(self.config.auto_frame_max_attempts),
            updates: 0,
        });
        self.state = MixState::Ready;
        Ok(())
    }

    /// Put the subject's puppet on stage and size the camera for it.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn load_model(&mut self) -> ShadowResult<()> {
        self.ensure_live()?;
        let hand_scale = self.config.hand_ortho_scale;
        let body_scale = self.config.body_ortho_scale;
        let assets = Arc::clone(&self.assets);
        let skeletons = self.config.skeletons.clone();
        let session = self.session_mut()?;

        if let Some(old) = session.puppet.take() {
            old.unload(session.renderer.stage_mut());
        }
        let scale = match session.kind {
            SubjectKind::Hand => hand_scale,
            SubjectKind::Body => body_scale,
        };
        session
            .renderer
            .set_projection(Projection::Orthographic { scale });
        let puppet = Puppet::load(
            session.kind,
            session.renderer.stage_mut(),
            assets.as_ref(),
            &skeletons.hand,
            &skeletons.body,
        )?;
        session.puppet = Some(puppet);
        session.framing.reset();
        Ok(())
    }

    /// Feed one tracking event to the puppet.
    ///
    /// Added anchors run the bounded auto-frame policy; every Nth update renders and then
    /// calls [`MixManager::populate_if_idle`].
    pub async fn update_pose(&mut self, event: &PoseEvent) -> ShadowResult<PoseUpdate> {
        self.ensure_live()?;
        let every = u64::from(self.config.render_every_n_updates.max(1));
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| ShadowError::setup("mix manager is not set up"))?;
        let Some(puppet) = session.puppet.as_ref() else {
            return Err(ShadowError::setup("load_model must run before update_pose"));
        };
        puppet.apply(session.renderer.stage_mut(), event)?;

        let mut out = PoseUpdate::default();
        if event.kind == AnchorEventKind::Added {
            let renderer = &mut session.renderer;
            out.framing = Some(session.framing.try_frame(|| renderer.auto_frame()));
        }
        session.updates += 1;
        self.state = MixState::Tracking;

        if session.updates % every == 0 {
            let outcome = session.renderer.render_async().await?;
            out.render = Some(outcome);
            if outcome == RenderOutcome::Rendered {
                out.composite = self.populate_if_idle()?;
            }
        }
        Ok(out)
    }

    /// Render the stage once, outside the update cadence.
    pub async fn render(&self) -> ShadowResult<RenderOutcome> {
        self.ensure_live()?;
        self.session()?.renderer.render_async().await
    }

    /// Composite now unless the video is advancing. `None` while playing.
    pub fn populate_if_idle(&self) -> ShadowResult<Option<CompositeOutcome>> {
        self.ensure_live()?;
        let s = self.session()?;
        if s.player.is_advancing() {
            return Ok(None);
        }
        Ok(Some(s.compositor.composite(
            s.renderer.color_image(),
            s.tap.latest_image().as_ref(),
            &s.output,
        )))
    }

    /// Start playback.
    pub fn play(&self) -> ShadowResult<()> {
        self.ensure_live()?;
        self.session()?.player.play()
    }

    /// Pause playback.
    pub fn pause(&self) -> ShadowResult<()> {
        self.ensure_live()?;
        self.session()?.player.pause();
        Ok(())
    }

    /// Present `frame` and continue from there.
    pub fn seek(&self, frame: u64) -> ShadowResult<()> {
        self.ensure_live()?;
        self.session()?.player.seek(frame)
    }

    /// Present the next video frame without the playback clock. `false` at the end.
    pub fn step_video(&self) -> ShadowResult<bool> {
        self.ensure_live()?;
        self.session()?.player.step()
    }

    /// Select the blend style of subsequent passes.
    pub fn set_blend_style(&mut self, style: BlendStyle) -> ShadowResult<()> {
        self.ensure_live()?;
        self.config.blend_style = style;
        if let Some(s) = &self.session {
            s.compositor.set_style(style);
        }
        Ok(())
    }

    /// Current blend style.
    pub fn blend_style(&self) -> BlendStyle {
        self.config.blend_style
    }

    /// Toggle the camera's directional light.
    pub fn set_default_light(&mut self, enabled: bool) -> ShadowResult<()> {
        self.ensure_live()?;
        self.config.default_light = enabled;
        self.session_mut()?.renderer.set_default_light(enabled);
        Ok(())
    }

    /// Display entity presenting the composite.
    pub fn output_display(&self) -> ShadowResult<&DisplayEntity> {
        self.ensure_live()?;
        Ok(&self.session()?.output_display)
    }

    /// Display entity presenting the unprocessed video. Disabled initially.
    pub fn video_display(&self) -> ShadowResult<&DisplayEntity> {
        self.ensure_live()?;
        Ok(&self.session()?.video_display)
    }

    /// The session's video tap.
    pub fn tap(&self) -> ShadowResult<VideoFrameTap> {
        self.ensure_live()?;
        Ok(self.session()?.tap.clone())
    }

    /// The session's compositor.
    pub fn compositor(&self) -> ShadowResult<Arc<Compositor>> {
        self.ensure_live()?;
        Ok(Arc::clone(&self.session()?.compositor))
    }

    /// The session's renderer.
    pub fn renderer(&self) -> ShadowResult<&SceneRenderer> {
        self.ensure_live()?;
        Ok(&self.session()?.renderer)
    }

    /// Mutable access to the session's renderer.
    pub fn renderer_mut(&mut self) -> ShadowResult<&mut SceneRenderer> {
        self.ensure_live()?;
        Ok(&mut self.session_mut()?.renderer)
    }

    /// Tear the session down. Safe to call any number of times.
    #[tracing::instrument(level = "info", skip(self))]
    pub fn clean(&mut self) {
        if let Some(session) = self.session.take() {
            self.teardown(session);
        }
        self.events.clear();
        self.state = MixState::TornDown;
    }

    fn teardown(&self, mut session: Session) {
        for id in session.subscriptions.drain(..) {
            self.events.unsubscribe(id);
        }
        session.player.pause();
        session.tap.detach();
        if let Some(p) = session.puppet.take() {
            p.unload(session.renderer.stage_mut());
        }
        session.renderer.remove_all_entities();
        session.output_display.detach();
        session.video_display.detach();
        tracing::debug!("session torn down");
    }

    fn wire(
        &self,
        scene: GpuImage,
        tap: &VideoFrameTap,
        compositor: &Arc<Compositor>,
        output: &MutableImage,
        player: &Arc<VideoPlayer>,
    ) -> Vec<SubscriptionId> {
        let composite = {
            let tap = tap.clone();
            let compositor = Arc::clone(compositor);
            let output = output.clone();
            move |e: &PipelineEvent| {
                if matches!(
                    e,
                    PipelineEvent::RenderUpdated | PipelineEvent::NewVideoFrame { .. }
                ) {
                    compositor.composite(&scene, tap.latest_image().as_ref(), &output);
                }
            }
        };
        let player: Weak<VideoPlayer> = Arc::downgrade(player);
        let rewind = move |e: &PipelineEvent| {
            if !matches!(e, PipelineEvent::PlaybackFinished) {
                return;
            }
            if let Some(player) = player.upgrade() {
                if let Err(e) = player.seek(0) {
                    tracing::warn!(error = %e, "rewind after playback failed");
                }
                player.pause();
            }
        };
        vec![self.events.subscribe(composite), self.events.subscribe(rewind)]
    }

    fn surface(&self, size: Size2, what: &str) -> ShadowResult<MutableImage> {
        MutableImage::new(
            Arc::clone(&self.backend),
            ImageDesc::new(
                size,
                PixelFormat::Bgra8Unorm,
                ImageUsage::SHADER_READ | ImageUsage::SHADER_WRITE,
            ),
        )
        .map_err(|e| ShadowError::setup(format!("{what}: {e}")))
    }

    fn ortho_scale(&self, kind: SubjectKind) -> f32 {
        match kind {
            SubjectKind::Hand => self.config.hand_ortho_scale,
            SubjectKind::Body => self.config.body_ortho_scale,
        }
    }

    fn ensure_live(&self) -> ShadowResult<()> {
        if self.state == MixState::TornDown {
            Err(ShadowError::TornDown)
        } else {
            Ok(())
        }
    }

    fn session(&self) -> ShadowResult<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| ShadowError::setup("mix manager is not set up"))
    }

    fn session_mut(&mut self) -> ShadowResult<&mut Session> {
        self.session
            .as_mut()
            .ok_or_else(|| ShadowError::setup("mix manager is not set up"))
    }
}

impl Drop for MixManager {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.teardown(session);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mix/manager.rs"]
mod tests;
