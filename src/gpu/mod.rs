//! Device images, command batches and the backends that execute them.

pub mod backend;
pub mod command;
pub mod cpu;
pub mod deferred;
pub mod image;
pub mod kernels;
pub mod mutable;
pub(crate) mod queue;
pub mod raster;
#[cfg(feature = "gpu")]
pub mod wgpu_backend;
