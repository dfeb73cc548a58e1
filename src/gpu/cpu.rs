use std::{sync::Arc, time::Instant};

use crate::{
    config::CpuBackendOpts,
    foundation::error::{ShadowError, ShadowResult},
    gpu::{
        backend::GpuBackend,
        command::{BatchTiming, Command, CommandBatch, Completion, KernelKind},
        image::{GpuImage, ImageDesc, rgba_into_format, to_rgba_bytes},
        kernels,
        queue::{DeviceQueue, Executor},
        raster,
    },
};

/// CPU device: images live in host memory, batches run on a dedicated queue thread and
/// fan out per row on the rayon pool.
pub struct CpuBackend {
    exec: Arc<CpuExecutor>,
    queue: DeviceQueue,
}

/// Synchronous batch executor behind [`CpuBackend`].
pub struct CpuExecutor {
    opts: CpuBackendOpts,
}

impl CpuBackend {
    /// Start the queue thread.
    pub fn new(opts: CpuBackendOpts) -> ShadowResult<Self> {
        let exec = Arc::new(CpuExecutor { opts });
        let run = Arc::clone(&exec);
        let executor: Executor = Arc::new(move |batch: &CommandBatch| run.execute_batch(batch));
        let queue = DeviceQueue::spawn("shadowmix-cpu-queue", executor)?;
        Ok(Self { exec, queue })
    }

    /// Run `batch` on the calling thread, bypassing the queue.
    pub fn execute_batch(&self, batch: &CommandBatch) -> ShadowResult<BatchTiming> {
        batch.validate()?;
        self.exec.execute_batch(batch)
    }
}

impl CpuExecutor {
    fn execute_batch(&self, batch: &CommandBatch) -> ShadowResult<BatchTiming> {
        let start = Instant::now();
        for cmd in batch.commands() {
            self.execute(cmd)?;
        }
        Ok(BatchTiming {
            start,
            end: Instant::now(),
        })
    }

    fn execute(&self, cmd: &Command) -> ShadowResult<()> {
        let parallel = self.opts.parallel_rows;
        match cmd {
            Command::Rasterize {
                target,
                clear,
                draw,
            } => {
                let mut out = target.cpu_bytes()?.write();
                raster::rasterize_cpu(
                    target.width(),
                    target.height(),
                    *clear,
                    draw,
                    target.format(),
                    &mut out,
                )
            }
            Command::Copy { src, dst } => {
                let rgba = read_logical(src)?;
                write_logical(dst, rgba)
            }
            Command::Add { a, b, dst } => {
                let (a, b) = (read_logical(a)?, read_logical(b)?);
                let mut out = vec![0u8; a.len()];
                kernels::add_saturating(&a, &b, &mut out, dst.desc().row_bytes(), parallel)?;
                write_logical(dst, out)
            }
            Command::ThresholdBinary {
                src,
                dst,
                threshold,
                max,
            } => {
                let src = read_logical(src)?;
                let mut out = vec![0u8; src.len()];
                kernels::threshold_binary(
                    &src,
                    &mut out,
                    *threshold,
                    *max,
                    dst.desc().row_bytes(),
                    parallel,
                )?;
                write_logical(dst, out)
            }
            Command::ThresholdToZero {
                src,
                dst,
                threshold,
            } => {
                let src = read_logical(src)?;
                let mut out = vec![0u8; src.len()];
                kernels::threshold_to_zero(
                    &src,
                    &mut out,
                    *threshold,
                    dst.desc().row_bytes(),
                    parallel,
                )?;
                write_logical(dst, out)
            }
            Command::Kernel { kind, a, b, dst } => match kind {
                KernelKind::GrayMixRed => {
                    let (video, scene) = (read_logical(a)?, read_logical(b)?);
                    let mut out = vec![0u8; video.len()];
                    kernels::gray_mix_red(
                        &video,
                        &scene,
                        &mut out,
                        dst.desc().row_bytes(),
                        parallel,
                    )?;
                    write_logical(dst, out)
                }
            },
        }
    }
}

fn read_logical(image: &GpuImage) -> ShadowResult<Vec<u8>> {
    let bytes = image.cpu_bytes()?.read();
    Ok(to_rgba_bytes(image.format(), &bytes))
}

fn write_logical(image: &GpuImage, mut rgba: Vec<u8>) -> ShadowResult<()> {
    rgba_into_format(image.format(), &mut rgba);
    let mut dst = image.cpu_bytes()?.write();
    if dst.len() != rgba.len() {
        return Err(ShadowError::render("destination storage size mismatch"));
    }
    *dst = rgba;
    Ok(())
}

impl GpuBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn create_image(&self, desc: ImageDesc) -> ShadowResult<GpuImage> {
        GpuImage::new_cpu(desc)
    }

    fn supports_kernel(&self, kind: KernelKind) -> bool {
        match kind {
            KernelKind::GrayMixRed => true,
        }
    }

    #[tracing::instrument(level = "trace", skip_all, fields(batch = batch.label(), commands = batch.len()))]
    fn submit(&self, batch: CommandBatch, done: Completion) -> ShadowResult<()> {
        batch.validate()?;
        self.queue.enqueue(batch, done)
    }

    fn upload(&self, image: &GpuImage, bytes: &[u8]) -> ShadowResult<()> {
        let mut dst = image.cpu_bytes()?.write();
        if dst.len() != bytes.len() {
            return Err(ShadowError::render(format!(
                "upload expects {} bytes for {}x{}, got {}",
                dst.len(),
                image.width(),
                image.height(),
                bytes.len()
            )));
        }
        dst.copy_from_slice(bytes);
        Ok(())
    }

    fn read_rgba8(&self, image: &GpuImage) -> ShadowResult<Vec<u8>> {
        read_logical(image)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/gpu/cpu.rs"]
mod tests;
