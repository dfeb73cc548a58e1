use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
};

use parking_lot::RwLock;

use crate::{
    foundation::error::{ShadowError, ShadowResult},
    gpu::{
        backend::GpuBackend,
        image::{GpuImage, ImageDesc, ImageUsage},
    },
    mix::events::{EventBus, PipelineEvent},
    video::frame::{CompositionRequest, RequestOutcome, VideoFrame},
};

struct TapInner {
    backend: Arc<dyn GpuBackend>,
    events: EventBus<PipelineEvent>,
    epoch: AtomicU64,
    next_seq: AtomicU64,
    detached: AtomicBool,
    latest: RwLock<Option<Latest>>,
    pending: AtomicUsize,
}

struct Latest {
    seq: u64,
    index: u64,
    image: GpuImage,
}

/// Cancellation epoch and arrival order of one scheduled conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Ticket {
    epoch: u64,
    seq: u64,
}

/// Pass-through compositor on the video path that keeps a device copy of the latest frame.
///
/// Every request is answered with its own source frame; the device copy is made afterwards on
/// the rayon pool and announced with [`PipelineEvent::NewVideoFrame`].
#[derive(Clone)]
pub struct VideoFrameTap {
    inner: Arc<TapInner>,
}

impl VideoFrameTap {
    /// Tap converting frames on `backend`.
    pub fn new(backend: Arc<dyn GpuBackend>, events: EventBus<PipelineEvent>) -> Self {
        Self {
            inner: Arc::new(TapInner {
                backend,
                events,
                epoch: AtomicU64::new(0),
                next_seq: AtomicU64::new(0),
                detached: AtomicBool::new(false),
                latest: RwLock::new(None),
                pending: AtomicUsize::new(0),
            }),
        }
    }

    /// Answer `request` and schedule the device copy of its frame.
    pub fn start_request(&self, request: CompositionRequest) {
        if self.inner.detached.load(Ordering::Acquire) {
            request.finish(RequestOutcome::Cancelled);
            return;
        }

        let tracks = request.source_track_ids();
        if tracks.len() != 1 {
            tracing::warn!(
                frame = request.frame_index(),
                count = tracks.len(),
                "rejecting composition request"
            );
            request.finish(RequestOutcome::Failed(ShadowError::SourceCount {
                count: tracks.len(),
            }));
            return;
        }
        let index = request.frame_index();
        let Some(frame) = request.source_frame(tracks[0]).cloned() else {
            let missing = tracks[0];
            request.finish(RequestOutcome::Failed(ShadowError::validation(format!(
                "request for frame {index} has no frame for {missing:?}"
            ))));
            return;
        };

        request.finish(RequestOutcome::Composed(frame.clone()));

        let ticket = self.ticket();
        let tap = self.clone();
        rayon::spawn(move || {
            tap.publish(frame, ticket);
        });
    }

    /// Reserve the next arrival slot and count it as pending.
    pub(crate) fn ticket(&self) -> Ticket {
        self.inner.pending.fetch_add(1, Ordering::AcqRel);
        Ticket {
            epoch: self.inner.epoch.load(Ordering::Acquire),
            seq: self.inner.next_seq.fetch_add(1, Ordering::AcqRel) + 1,
        }
    }

    /// Convert `frame` and store it as latest unless a cancel happened since the ticket was
    /// taken or a later arrival is already stored.
    pub(crate) fn publish(&self, frame: VideoFrame, ticket: Ticket) {
        let converted = convert_frame(self.inner.backend.as_ref(), &frame);
        let stored = match converted {
            Ok(image) => {
                let mut latest = self.inner.latest.write();
                let newer = latest.as_ref().is_none_or(|l| ticket.seq > l.seq);
                if self.inner.epoch.load(Ordering::Acquire) != ticket.epoch {
                    tracing::trace!(frame = frame.index, "dropping cancelled frame conversion");
                    false
                } else if !newer {
                    tracing::trace!(frame = frame.index, "dropping superseded frame conversion");
                    false
                } else {
                    *latest = Some(Latest {
                        seq: ticket.seq,
                        index: frame.index,
                        image,
                    });
                    true
                }
            }
            Err(e) => {
                tracing::warn!(frame = frame.index, error = %e, "video frame conversion failed");
                false
            }
        };
        self.inner.pending.fetch_sub(1, Ordering::AcqRel);
        if stored {
            self.inner
                .events
                .emit(&PipelineEvent::NewVideoFrame { frame: frame.index });
        }
    }

    /// Invalidate conversions in flight and forget the latest image.
    pub fn cancel_all_pending_requests(&self) {
        let mut latest = self.inner.latest.write();
        self.inner.epoch.fetch_add(1, Ordering::AcqRel);
        *latest = None;
    }

    /// Cancel everything and answer all later requests with [`RequestOutcome::Cancelled`].
    pub fn detach(&self) {
        self.inner.detached.store(true, Ordering::Release);
        self.cancel_all_pending_requests();
    }

    /// Whether [`VideoFrameTap::detach`] was called.
    pub fn is_detached(&self) -> bool {
        self.inner.detached.load(Ordering::Acquire)
    }

    /// Device copy of the most recent frame.
    pub fn latest_image(&self) -> Option<GpuImage> {
        self.inner.latest.read().as_ref().map(|l| l.image.clone())
    }

    /// Presentation index of the most recent frame.
    pub fn latest_frame_index(&self) -> Option<u64> {
        self.inner.latest.read().as_ref().map(|l| l.index)
    }

    /// Conversions scheduled but not yet finished.
    pub fn pending_conversions(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }
}

fn convert_frame(backend: &dyn GpuBackend, frame: &VideoFrame) -> ShadowResult<GpuImage> {
    let image = backend.create_image(ImageDesc::new(
        frame.size(),
        frame.format,
        ImageUsage::SHADER_READ,
    ))?;
    backend.upload(&image, &frame.data)?;
    Ok(image)
}

#[cfg(test)]
#[path = "../../tests/unit/video/tap.rs"]
mod tests;
