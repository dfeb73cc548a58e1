use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use parking_lot::{Mutex, RwLock};

use crate::{
    composite::blend::{BlendStyle, Eye, StereoStyle},
    config::GrayAddParams,
    foundation::error::ShadowResult,
    gpu::{
        backend::GpuBackend,
        command::{Command, CommandBatch, Completion, KernelKind},
        image::{GpuImage, ImageDesc, ImageUsage, PixelFormat},
        mutable::{MutableImage, PendingReplace},
    },
    mix::events::{EventBus, PipelineEvent},
};

/// What a compositing call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompositeOutcome {
    /// A batch was submitted; the output is published when it completes.
    Submitted,
    /// A previous pass is still in flight; nothing was done.
    Dropped,
    /// Not even a plain copy could be submitted; the output keeps its previous content.
    Abandoned,
}

/// Blends the scene image with the latest video image into an output image.
///
/// At most one pass is in flight per compositor; calls made meanwhile return
/// [`CompositeOutcome::Dropped`] without blocking.
pub struct Compositor {
    backend: Arc<dyn GpuBackend>,
    style: RwLock<BlendStyle>,
    gray_add: GrayAddParams,
    in_flight: Arc<AtomicBool>,
    events: EventBus<PipelineEvent>,
}

type PendingSlot = Arc<Mutex<Vec<(MutableImage, PendingReplace)>>>;

impl Compositor {
    /// Compositor submitting to `backend`.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        style: BlendStyle,
        gray_add: GrayAddParams,
        events: EventBus<PipelineEvent>,
    ) -> Self {
        Self {
            backend,
            style: RwLock::new(style),
            gray_add,
            in_flight: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    /// Current blend style.
    pub fn style(&self) -> BlendStyle {
        *self.style.read()
    }

    /// Blend style used from the next pass on.
    pub fn set_style(&self, style: BlendStyle) {
        *self.style.write() = style;
    }

    /// Whether a pass has not signaled completion yet.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Blend `scene` with `video` (if any) into the next backing store of `output`.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn composite(
        &self,
        scene: &GpuImage,
        video: Option<&GpuImage>,
        output: &MutableImage,
    ) -> CompositeOutcome {
        if !self.try_acquire() {
            return CompositeOutcome::Dropped;
        }
        let style = self.style();
        let pending = match output.replace() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "no output store available, skipping composite");
                self.release();
                return CompositeOutcome::Abandoned;
            }
        };
        let target = pending.target().clone();
        let slot: PendingSlot = Arc::new(Mutex::new(vec![(output.clone(), pending)]));

        let batch = match self.plan(style, scene, video, &target) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(%style, error = %e, "blend unavailable, falling back to copy");
                copy_batch(&[(scene, &target)])
            }
        };
        let fallback = copy_batch(&[(scene, &target)]);
        self.submit_with_fallback(batch, fallback, slot, style)
    }

    /// Route the eye images into two outputs as selected by `stereo`.
    pub fn composite_stereo(
        &self,
        left: &GpuImage,
        right: &GpuImage,
        out_left: &MutableImage,
        out_right: &MutableImage,
        stereo: StereoStyle,
    ) -> CompositeOutcome {
        if !self.try_acquire() {
            return CompositeOutcome::Dropped;
        }
        let mut stores = Vec::with_capacity(2);
        for out in [out_left, out_right] {
            match out.replace() {
                Ok(p) => stores.push((out.clone(), p)),
                Err(e) => {
                    tracing::warn!(error = %e, "no stereo output store available");
                    for (img, p) in stores {
                        img.abandon(p);
                    }
                    self.release();
                    return CompositeOutcome::Abandoned;
                }
            }
        }
        let pick = |eye: Eye| match eye {
            Eye::Left => left,
            Eye::Right => right,
        };
        let (for_left, for_right) = stereo.sources();
        let batch = copy_batch(&[
            (pick(for_left), stores[0].1.target()),
            (pick(for_right), stores[1].1.target()),
        ]);
        let slot: PendingSlot = Arc::new(Mutex::new(stores));
        let style = self.style();
        self.submit_with_fallback(batch, CommandBatch::new("stereo_fallback"), slot, style)
    }

    fn try_acquire(&self) -> bool {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn release(&self) {
        self.in_flight.store(false, Ordering::Release);
    }

    fn plan(
        &self,
        style: BlendStyle,
        scene: &GpuImage,
        video: Option<&GpuImage>,
        target: &GpuImage,
    ) -> ShadowResult<CommandBatch> {
        let mut batch = CommandBatch::new(style.as_str());
        match (style, video) {
            (BlendStyle::ColorAdd, Some(video)) => {
                batch.push(Command::Add {
                    a: scene.clone(),
                    b: video.clone(),
                    dst: target.clone(),
                });
            }
            (BlendStyle::GrayAdd, video) => {
                let scene_gray = self.temp_like(target)?;
                batch.push(Command::ThresholdBinary {
                    src: scene.clone(),
                    dst: scene_gray.clone(),
                    threshold: self.gray_add.scene_threshold,
                    max: self.gray_add.scene_max,
                });
                match video.map(|v| (v, self.temp_like(target))) {
                    Some((video, Ok(video_gray))) => {
                        batch.push(Command::ThresholdToZero {
                            src: video.clone(),
                            dst: video_gray.clone(),
                            threshold: self.gray_add.video_threshold,
                        });
                        batch.push(Command::Add {
                            a: scene_gray,
                            b: video_gray,
                            dst: target.clone(),
                        });
                    }
                    Some((_, Err(e))) => {
                        tracing::warn!(error = %e, "no video temporary, showing the thresholded scene");
                        batch.push(Command::Copy {
                            src: scene_gray,
                            dst: target.clone(),
                        });
                    }
                    None => {
                        batch.push(Command::Copy {
                            src: scene_gray,
                            dst: target.clone(),
                        });
                    }
                }
            }
            (BlendStyle::GrayMixRed, Some(video))
                if self.backend.supports_kernel(KernelKind::GrayMixRed) =>
            {
                batch.push(Command::Kernel {
                    kind: KernelKind::GrayMixRed,
                    a: video.clone(),
                    b: scene.clone(),
                    dst: target.clone(),
                });
            }
            _ => {
                batch.push(Command::Copy {
                    src: scene.clone(),
                    dst: target.clone(),
                });
            }
        }
        batch.validate()?;
        Ok(batch)
    }

    fn temp_like(&self, target: &GpuImage) -> ShadowResult<GpuImage> {
        self.backend.create_image(ImageDesc::new(
            target.size(),
            PixelFormat::Rgba8Unorm,
            ImageUsage::SHADER_READ | ImageUsage::SHADER_WRITE,
        ))
    }

    fn submit_with_fallback(
        &self,
        batch: CommandBatch,
        fallback: CommandBatch,
        slot: PendingSlot,
        style: BlendStyle,
    ) -> CompositeOutcome {
        let label = batch.label();
        match self.backend.submit(batch, self.completion(Arc::clone(&slot), style)) {
            Ok(()) => return CompositeOutcome::Submitted,
            Err(e) => {
                tracing::warn!(batch = label, error = %e, "composite submit failed");
            }
        }
        if !fallback.is_empty() {
            match self
                .backend
                .submit(fallback, self.completion(Arc::clone(&slot), style))
            {
                Ok(()) => return CompositeOutcome::Submitted,
                Err(e) => tracing::warn!(error = %e, "fallback copy submit failed"),
            }
        }
        for (img, pending) in slot.lock().drain(..) {
            img.abandon(pending);
        }
        self.release();
        CompositeOutcome::Abandoned
    }

    fn completion(
        &self,
        slot: PendingSlot,
        style: BlendStyle,
    ) -> Completion {
        let guard = Arc::clone(&self.in_flight);
        let events = self.events.clone();
        Box::new(move |res| {
            let stores: Vec<_> = slot.lock().drain(..).collect();
            match res {
                Ok(timing) => {
                    for (img, pending) in stores {
                        img.commit(pending);
                    }
                    guard.store(false, Ordering::Release);
                    tracing::debug!(
                        %style,
                        gpu_time = ?timing.duration(),
                        "composite completed"
                    );
                    events.emit(&PipelineEvent::CompositeCompleted { timing, style });
                }
                Err(e) => {
                    for (img, pending) in stores {
                        img.abandon(pending);
                    }
                    guard.store(false, Ordering::Release);
                    tracing::warn!(%style, error = %e, "composite batch failed");
                }
            }
        })
    }
}

fn copy_batch(pairs: &[(&GpuImage, &GpuImage)]) -> CommandBatch {
    let mut batch = CommandBatch::new("copy");
    for (src, dst) in pairs {
        batch.push(Command::Copy {
            src: (*src).clone(),
            dst: (*dst).clone(),
        });
    }
    batch
}

#[cfg(test)]
#[path = "../../tests/unit/composite/compositor.rs"]
mod tests;
