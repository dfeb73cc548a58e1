use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    foundation::{
        core::Rgba8,
        error::{ShadowError, ShadowResult},
    },
    gpu::{
        image::{GpuImage, ImageUsage},
        raster::DrawList,
    },
};

/// Custom compute kernels a backend may or may not provide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KernelKind {
    /// Grayscale video with the scene's luminance mixed in as red.
    GrayMixRed,
}

/// One device operation.
///
/// Every write lands in `dst`/`target`, which must not alias any source of the same command.
#[derive(Clone, Debug)]
pub enum Command {
    /// Clear `target` to `clear` and rasterize `draw` into it.
    Rasterize {
        /// Render target.
        target: GpuImage,
        /// Background color.
        clear: Rgba8,
        /// Depth-sorted primitives.
        draw: Arc<DrawList>,
    },
    /// Copy `src` into `dst`, converting pixel format if needed.
    Copy {
        /// Source.
        src: GpuImage,
        /// Destination.
        dst: GpuImage,
    },
    /// Per-channel saturating add of `a` and `b`, alpha included.
    Add {
        /// Primary source.
        a: GpuImage,
        /// Secondary source.
        b: GpuImage,
        /// Destination.
        dst: GpuImage,
    },
    /// Luminance above `threshold` becomes `max`, everything else 0.
    ThresholdBinary {
        /// Source.
        src: GpuImage,
        /// Destination.
        dst: GpuImage,
        /// Normalized threshold in `[0, 1]`.
        threshold: f32,
        /// Normalized output level in `[0, 1]`.
        max: f32,
    },
    /// Luminance above `threshold` is kept, everything else becomes 0.
    ThresholdToZero {
        /// Source.
        src: GpuImage,
        /// Destination.
        dst: GpuImage,
        /// Normalized threshold in `[0, 1]`.
        threshold: f32,
    },
    /// Custom compute kernel over two equally sized inputs.
    Kernel {
        /// Which kernel.
        kind: KernelKind,
        /// First input (the video image for [`KernelKind::GrayMixRed`]).
        a: GpuImage,
        /// Second input (the scene image for [`KernelKind::GrayMixRed`]).
        b: GpuImage,
        /// Destination.
        dst: GpuImage,
    },
}

impl Command {
    /// Name used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rasterize { .. } => "rasterize",
            Self::Copy { .. } => "copy",
            Self::Add { .. } => "add",
            Self::ThresholdBinary { .. } => "threshold_binary",
            Self::ThresholdToZero { .. } => "threshold_to_zero",
            Self::Kernel { .. } => "kernel",
        }
    }

    /// Check usages and sizes before any work is encoded.
    pub fn validate(&self) -> ShadowResult<()> {
        match self {
            Self::Rasterize { target, .. } => target.require(ImageUsage::RENDER_TARGET, "raster"),
            Self::Copy { src, dst } => {
                src.require(ImageUsage::SHADER_READ, "copy source")?;
                dst.require(ImageUsage::SHADER_WRITE, "copy destination")?;
                same_size(&[src, dst], "copy")
            }
            Self::ThresholdBinary { src, dst, .. } | Self::ThresholdToZero { src, dst, .. } => {
                src.require(ImageUsage::SHADER_READ, "threshold source")?;
                dst.require(ImageUsage::SHADER_WRITE, "threshold destination")?;
                not_aliased(src, dst, "threshold")?;
                same_size(&[src, dst], "threshold")
            }
            Self::Add { a, b, dst } | Self::Kernel { a, b, dst, .. } => {
                a.require(ImageUsage::SHADER_READ, "primary source")?;
                b.require(ImageUsage::SHADER_READ, "secondary source")?;
                dst.require(ImageUsage::SHADER_WRITE, "destination")?;
                not_aliased(a, dst, self.label())?;
                not_aliased(b, dst, self.label())?;
                same_size(&[a, b, dst], self.label())
            }
        }
    }
}

fn same_size(images: &[&GpuImage], what: &str) -> ShadowResult<()> {
    let first = images[0].size();
    if images.iter().all(|i| i.size() == first) {
        Ok(())
    } else {
        let sizes: Vec<_> = images
            .iter()
            .map(|i| format!("{}x{}", i.width(), i.height()))
            .collect();
        Err(ShadowError::render(format!(
            "{what} operands differ in size: {}",
            sizes.join(", ")
        )))
    }
}

fn not_aliased(src: &GpuImage, dst: &GpuImage, what: &str) -> ShadowResult<()> {
    if src.ptr_eq(dst) {
        Err(ShadowError::render(format!(
            "{what} destination aliases a source"
        )))
    } else {
        Ok(())
    }
}

/// Ordered list of commands submitted as one unit.
#[derive(Clone, Debug, Default)]
pub struct CommandBatch {
    label: &'static str,
    commands: Vec<Command>,
}

impl CommandBatch {
    /// Empty batch labelled for logs.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            commands: Vec::new(),
        }
    }

    /// Append a command.
    pub fn push(&mut self, cmd: Command) -> &mut Self {
        self.commands.push(cmd);
        self
    }

    /// Log label.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Commands in execution order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether no command was recorded.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Validate every command.
    pub fn validate(&self) -> ShadowResult<()> {
        if self.commands.is_empty() {
            return Err(ShadowError::render(format!(
                "batch '{}' has no commands",
                self.label
            )));
        }
        self.commands.iter().try_for_each(Command::validate)
    }
}

/// Device-side execution window of a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchTiming {
    /// When the queue started executing the batch.
    pub start: Instant,
    /// When the last command finished.
    pub end: Instant,
}

impl BatchTiming {
    /// `end - start`.
    pub fn duration(&self) -> Duration {
        self.end.saturating_duration_since(self.start)
    }
}

/// Called exactly once when a submitted batch finishes or fails on the device queue.
pub type Completion = Box<dyn FnOnce(ShadowResult<BatchTiming>) + Send + 'static>;

#[cfg(test)]
#[path = "../../tests/unit/gpu/command.rs"]
mod tests;
