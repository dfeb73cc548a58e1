use std::sync::Arc;

use crate::{
    config::CpuBackendOpts,
    foundation::error::{ShadowError, ShadowResult},
    gpu::{
        command::{CommandBatch, Completion, KernelKind},
        image::{GpuImage, ImageDesc},
    },
};

/// Device that owns images and executes command batches asynchronously.
///
/// Batches run in submission order on one device queue. `submit` never blocks on execution;
/// `done` is called exactly once from the queue's thread.
pub trait GpuBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Allocate a zero-filled image.
    fn create_image(&self, desc: ImageDesc) -> ShadowResult<GpuImage>;

    /// Whether [`crate::gpu::command::Command::Kernel`] of `kind` can run here.
    fn supports_kernel(&self, kind: KernelKind) -> bool;

    /// Validate and enqueue `batch`. On `Err` nothing was enqueued and `done` was dropped.
    fn submit(&self, batch: CommandBatch, done: Completion) -> ShadowResult<()>;

    /// Replace the contents of `image` with `bytes`, laid out in the image's own format.
    fn upload(&self, image: &GpuImage, bytes: &[u8]) -> ShadowResult<()>;

    /// Read `image` back as tightly packed logical RGBA8.
    fn read_rgba8(&self, image: &GpuImage) -> ShadowResult<Vec<u8>>;
}

/// Which backend [`create_backend`] builds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Rayon-parallel CPU queue, always available.
    Cpu,
    /// wgpu device with vello rasterization.
    #[cfg(feature = "gpu")]
    Gpu,
}

/// Build a shared backend of `kind`.
pub fn create_backend(
    kind: BackendKind,
    opts: &CpuBackendOpts,
) -> ShadowResult<Arc<dyn GpuBackend>> {
    match kind {
        BackendKind::Cpu => Ok(Arc::new(crate::gpu::cpu::CpuBackend::new(opts.clone())?)),
        #[cfg(feature = "gpu")]
        BackendKind::Gpu => Ok(Arc::new(crate::gpu::wgpu_backend::WgpuBackend::new()?)),
        #[allow(unreachable_patterns)]
        _ => Err(ShadowError::setup("requested backend is not available")),
    }
}
