use std::{sync::Arc, time::Duration};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use parking_lot::Mutex;

use crate::{
    foundation::error::{ShadowError, ShadowResult},
    gpu::{
        image::{rgba_into_format, to_rgba_bytes},
        mutable::MutableImage,
    },
    mix::events::{EventBus, PipelineEvent},
    video::{
        frame::{CompositionRequest, RequestOutcome},
        source::VideoSource,
        tap::VideoFrameTap,
    },
};

/// Transport state of a [`VideoPlayer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeControlStatus {
    /// Not advancing.
    Paused,
    /// Asked to play, clock not running yet.
    WaitingToPlay,
    /// Advancing at the source frame rate.
    Playing,
}

/// Readiness of the player's item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemStatus {
    /// Not inspected yet.
    Unknown,
    /// Frames can be presented.
    ReadyToPlay,
    /// The source cannot be played.
    Failed,
}

struct PlayerState {
    position: u64,
    status: TimeControlStatus,
    item: ItemStatus,
    clock: Option<Sender<()>>,
}

struct PlayerInner {
    source: Arc<dyn VideoSource>,
    tap: VideoFrameTap,
    raw_output: MutableImage,
    events: EventBus<PipelineEvent>,
    state: Mutex<PlayerState>,
}

/// Frame clock driving a [`VideoSource`] through a [`VideoFrameTap`].
///
/// Frames the tap hands back are uploaded into `raw_output`, the unprocessed video surface.
pub struct VideoPlayer {
    inner: Arc<PlayerInner>,
}

impl VideoPlayer {
    /// Player positioned at frame 0, paused.
    pub fn new(
        source: Arc<dyn VideoSource>,
        tap: VideoFrameTap,
        raw_output: MutableImage,
        events: EventBus<PipelineEvent>,
    ) -> Self {
        let inner = Arc::new(PlayerInner {
            source,
            tap,
            raw_output,
            events,
            state: Mutex::new(PlayerState {
                position: 0,
                status: TimeControlStatus::Paused,
                item: ItemStatus::Unknown,
                clock: None,
            }),
        });
        let item = if inner.source.frame_count() > 0 && inner.source.natural_size().is_ok() {
            ItemStatus::ReadyToPlay
        } else {
            ItemStatus::Failed
        };
        inner.set_item(item);
        Self { inner }
    }

    /// Transport state.
    pub fn status(&self) -> TimeControlStatus {
        self.inner.state.lock().status
    }

    /// Item readiness.
    pub fn item_status(&self) -> ItemStatus {
        self.inner.state.lock().item
    }

    /// Index of the next frame to present.
    pub fn position(&self) -> u64 {
        self.inner.state.lock().position
    }

    /// Whether frames are being advanced by the clock.
    pub fn is_advancing(&self) -> bool {
        self.status() == TimeControlStatus::Playing
    }

    /// The tap requests go through.
    pub fn tap(&self) -> &VideoFrameTap {
        &self.inner.tap
    }

    /// Start the frame clock. No-op while already playing.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn play(&self) -> ShadowResult<()> {
        let stop_rx = {
            let mut st = self.inner.state.lock();
            if st.item != ItemStatus::ReadyToPlay {
                return Err(ShadowError::setup(format!(
                    "'{}' is not ready to play",
                    self.inner.source.name()
                )));
            }
            if st.clock.is_some() {
                return Ok(());
            }
            let (tx, rx) = crossbeam_channel::bounded(0);
            st.clock = Some(tx);
            st.status = TimeControlStatus::WaitingToPlay;
            rx
        };
        self.inner
            .events
            .emit(&PipelineEvent::PlayerStatusChanged(TimeControlStatus::WaitingToPlay));

        let fps = self.inner.source.fps();
        let period = Duration::from_secs_f64(if fps > 0.0 { 1.0 / fps } else { 1.0 / 30.0 });
        let inner = Arc::clone(&self.inner);
        std::thread::Builder::new()
            .name("shadowmix-player-clock".to_owned())
            .spawn(move || run_clock(inner, stop_rx, period))
            .map_err(|e| ShadowError::setup(format!("failed to start player clock: {e}")))?;
        Ok(())
    }

    /// Stop the frame clock. Returns without waiting for the clock thread.
    pub fn pause(&self) {
        self.inner.stop_clock();
    }

    /// Present `frame` (clamped to the last frame); playback continues after it.
    pub fn seek(&self, frame: u64) -> ShadowResult<()> {
        let last = self.inner.source.frame_count().saturating_sub(1);
        let frame = frame.min(last);
        self.inner.present(frame)?;
        self.inner.state.lock().position = frame + 1;
        Ok(())
    }

    /// Present the frame at the current position and advance. `false` once playback finished.
    pub fn step(&self) -> ShadowResult<bool> {
        self.inner.step()
    }
}

impl Drop for VideoPlayer {
    fn drop(&mut self) {
        self.inner.stop_clock();
    }
}

impl PlayerInner {
    fn set_item(&self, item: ItemStatus) {
        {
            let mut st = self.state.lock();
            if st.item == item {
                return;
            }
            st.item = item;
        }
        tracing::debug!(?item, source = self.source.name(), "item status changed");
        self.events.emit(&PipelineEvent::ItemStatusChanged(item));
    }

    fn set_status(&self, status: TimeControlStatus) {
        {
            let mut st = self.state.lock();
            if st.status == status {
                return;
            }
            st.status = status;
        }
        tracing::debug!(?status, "player status changed");
        self.events.emit(&PipelineEvent::PlayerStatusChanged(status));
    }

    fn stop_clock(&self) {
        let clock = self.state.lock().clock.take();
        drop(clock);
        self.set_status(TimeControlStatus::Paused);
    }

    fn step(&self) -> ShadowResult<bool> {
        let position = self.state.lock().position;
        if position >= self.source.frame_count() {
            self.stop_clock();
            self.events.emit(&PipelineEvent::PlaybackFinished);
            return Ok(false);
        }
        self.present(position)?;
        self.state.lock().position = position + 1;
        Ok(true)
    }

    fn present(&self, index: u64) -> ShadowResult<()> {
        let frame = self.source.decode_frame(index)?;
        let sources = self
            .source
            .required_source_tracks()
            .into_iter()
            .map(|t| (t, frame.clone()))
            .collect();
        let (tx, rx) = crossbeam_channel::bounded(1);
        let request = CompositionRequest::new(index, sources, move |outcome| {
            let _ = tx.send(outcome);
        });
        self.tap.start_request(request);

        match rx.recv() {
            Ok(RequestOutcome::Composed(frame)) => {
                let want = self.raw_output.desc().format;
                if frame.format == want {
                    self.raw_output.upload_and_commit(&frame.data)
                } else {
                    let mut bytes = to_rgba_bytes(frame.format, &frame.data);
                    rgba_into_format(want, &mut bytes);
                    self.raw_output.upload_and_commit(&bytes)
                }
            }
            Ok(RequestOutcome::Failed(e)) => {
                tracing::warn!(frame = index, error = %e, "composition request failed");
                self.set_item(ItemStatus::Failed);
                Err(e)
            }
            Ok(RequestOutcome::Cancelled) | Err(_) => Err(ShadowError::Cancelled),
        }
    }

    fn mark_playing(&self) -> bool {
        if self.state.lock().clock.is_none() {
            return false;
        }
        self.set_status(TimeControlStatus::Playing);
        true
    }
}

fn run_clock(inner: Arc<PlayerInner>, stop: Receiver<()>, period: Duration) {
    if !inner.mark_playing() {
        return;
    }
    let ticker = crossbeam_channel::tick(period);
    loop {
        crossbeam_channel::select! {
            recv(stop) -> _ => break,
            recv(ticker) -> _ => {
                if matches!(stop.try_recv(), Err(TryRecvError::Disconnected)) {
                    break;
                }
                match inner.step() {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) if e.is_cancellation() => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "stopping playback");
                        inner.stop_clock();
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/video/player.rs"]
mod tests;
