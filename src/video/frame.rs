use std::sync::Arc;

use crate::{
    foundation::{
        core::Size2,
        error::{ShadowError, ShadowResult},
    },
    gpu::image::PixelFormat,
};

/// Identifier of a source track in a composition request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u32);

/// One decoded video frame in host memory.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoFrame {
    /// Presentation index.
    pub index: u64,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Byte order of `data`.
    pub format: PixelFormat,
    /// Tightly packed pixels.
    pub data: Arc<Vec<u8>>,
}

impl VideoFrame {
    /// Wrap `data`, checking its length against the size.
    pub fn new(
        index: u64,
        size: Size2,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> ShadowResult<Self> {
        let want = size.pixel_count() * 4;
        if data.len() != want {
            return Err(ShadowError::validation(format!(
                "frame {index}: expected {want} bytes for {}x{}, got {}",
                size.width,
                size.height,
                data.len()
            )));
        }
        Ok(Self {
            index,
            width: size.width,
            height: size.height,
            format,
            data: Arc::new(data),
        })
    }

    /// Pixel size.
    pub fn size(&self) -> Size2 {
        Size2 {
            width: self.width,
            height: self.height,
        }
    }
}

/// How a composition request was finished.
#[derive(Debug)]
pub enum RequestOutcome {
    /// The composed frame handed back to playback.
    Composed(VideoFrame),
    /// The request could not be served.
    Failed(ShadowError),
    /// The request was cancelled during teardown.
    Cancelled,
}

impl RequestOutcome {
    /// The composed frame, if any.
    pub fn frame(&self) -> Option<&VideoFrame> {
        match self {
            Self::Composed(f) => Some(f),
            _ => None,
        }
    }
}

type Reply = Box<dyn FnOnce(RequestOutcome) + Send + 'static>;

/// A playback pipeline asking for the output frame of one presentation time.
///
/// Must be finished exactly once; dropping an unfinished request reports it as cancelled.
pub struct CompositionRequest {
    frame_index: u64,
    sources: Vec<(TrackId, VideoFrame)>,
    reply: Option<Reply>,
}

impl std::fmt::Debug for CompositionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositionRequest")
            .field("frame_index", &self.frame_index)
            .field("source_tracks", &self.source_track_ids())
            .finish()
    }
}

impl CompositionRequest {
    /// Request over `sources`, answered through `reply`.
    pub fn new(
        frame_index: u64,
        sources: Vec<(TrackId, VideoFrame)>,
        reply: impl FnOnce(RequestOutcome) + Send + 'static,
    ) -> Self {
        Self {
            frame_index,
            sources,
            reply: Some(Box::new(reply)),
        }
    }

    /// Presentation index being composed.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Tracks the request needs frames from.
    pub fn source_track_ids(&self) -> Vec<TrackId> {
        self.sources.iter().map(|(t, _)| *t).collect()
    }

    /// Frame of one source track.
    pub fn source_frame(&self, track: TrackId) -> Option<&VideoFrame> {
        self.sources
            .iter()
            .find(|(t, _)| *t == track)
            .map(|(_, f)| f)
    }

    /// Deliver the outcome.
    pub fn finish(mut self, outcome: RequestOutcome) {
        if let Some(reply) = self.reply.take() {
            reply(outcome);
        }
    }
}

impl Drop for CompositionRequest {
    fn drop(&mut self) {
        if let Some(reply) = self.reply.take() {
            reply(RequestOutcome::Cancelled);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/video/frame.rs"]
mod tests;
