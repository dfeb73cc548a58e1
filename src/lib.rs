//! shadowmix renders a tracked puppet (a hand pair or a body skeleton) off screen and mixes it,
//! frame by frame, with a decoded video into one "shadow" image.
//!
//! The pipeline has three stages:
//!
//! - a [`SceneRenderer`] drawing the posed skeletons into a scene image on demand
//! - a [`VideoFrameTap`] capturing every decoded frame as a device image without holding up
//!   playback
//! - a [`Compositor`] blending both into a [`MutableImage`] with a [`BlendStyle`], never more
//!   than one pass in flight
//!
//! [`MixManager`] wires them together for one [`SubjectKind`].
#![forbid(unsafe_code)]

mod foundation;

/// Built-in skeletons and named video sources.
pub mod assets;
/// Blend styles and the compositor.
pub mod composite;
/// Runtime configuration.
pub mod config;
/// Device images and backends.
pub mod gpu;
/// Session orchestration.
pub mod mix;
/// Off-screen scene rendering.
pub mod render;
/// Puppet scene model.
pub mod scene;
/// Video sources, the frame tap and the player.
pub mod video;

pub use crate::foundation::core::{Bounds3, Mat4, Quat, Rgba8, Size2, Vec2, Vec3};
pub use crate::foundation::error::{ShadowError, ShadowResult};

pub use crate::assets::provider::{AssetProvider, BuiltinAssets};
pub use crate::composite::blend::{BlendStyle, Eye, StereoStyle};
pub use crate::composite::compositor::{CompositeOutcome, Compositor};
pub use crate::config::{CpuBackendOpts, GrayAddParams, MixConfig};
pub use crate::gpu::backend::{BackendKind, GpuBackend, create_backend};
pub use crate::gpu::cpu::CpuBackend;
pub use crate::gpu::deferred::DeferredBackend;
pub use crate::gpu::image::{GpuImage, ImageDesc, ImageUsage, PixelFormat};
pub use crate::gpu::mutable::{DisplayHandle, MutableImage};
#[cfg(feature = "gpu")]
pub use crate::gpu::wgpu_backend::WgpuBackend;
pub use crate::mix::display::DisplayEntity;
pub use crate::mix::events::{EventBus, PipelineEvent, SubscriptionId};
pub use crate::mix::manager::{MixManager, MixState, PoseUpdate};
pub use crate::mix::stereo::StereoMix;
pub use crate::mix::tracking::{AnchorEventKind, Chirality, PoseEvent, SubjectKind, SyntheticHands};
pub use crate::render::framing::{AutoFramePolicy, FrameAttempt};
pub use crate::render::renderer::{RenderOutcome, SceneRenderer};
pub use crate::render::stereo::StereoRenderer;
pub use crate::scene::camera::{Camera, DirectionalLight, Projection};
pub use crate::video::player::{ItemStatus, TimeControlStatus, VideoPlayer};
pub use crate::video::source::{FfmpegVideoSource, SyntheticVideo, VideoSource};
pub use crate::video::tap::VideoFrameTap;
