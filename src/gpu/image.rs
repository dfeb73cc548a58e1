use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use parking_lot::RwLock;

use crate::foundation::{
    core::Size2,
    error::{ShadowError, ShadowResult},
};

bitflags::bitflags! {
    /// How an image may be used by command batches.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u8 {
        /// Target of a raster command.
        const RENDER_TARGET = 1 << 0;
        /// Source of copy, add, threshold and kernel commands.
        const SHADER_READ = 1 << 1;
        /// Destination of copy, add, threshold and kernel commands.
        const SHADER_WRITE = 1 << 2;
    }
}

/// Byte order of an 8-bit-per-channel image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// `r, g, b, a`.
    Rgba8Unorm,
    /// `b, g, r, a`, the layout decoded video frames arrive in.
    Bgra8Unorm,
}

impl PixelFormat {
    /// Convert one pixel stored in this format to logical RGBA.
    #[inline]
    pub fn to_rgba(self, px: [u8; 4]) -> [u8; 4] {
        match self {
            Self::Rgba8Unorm => px,
            Self::Bgra8Unorm => [px[2], px[1], px[0], px[3]],
        }
    }

    /// Convert one logical RGBA pixel into this format.
    #[inline]
    pub fn store_rgba(self, px: [u8; 4]) -> [u8; 4] {
        // The swizzle is its own inverse.
        self.to_rgba(px)
    }
}

/// Creation parameters for a [`GpuImage`]. Mip level count and array length are always 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageDesc {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Storage layout.
    pub format: PixelFormat,
    /// Allowed uses.
    pub usage: ImageUsage,
}

impl ImageDesc {
    /// Descriptor for an image of `size`.
    pub fn new(size: Size2, format: PixelFormat, usage: ImageUsage) -> Self {
        Self {
            width: size.width,
            height: size.height,
            format,
            usage,
        }
    }

    /// Always 1.
    pub fn mip_level_count(&self) -> u32 {
        1
    }

    /// Always 1.
    pub fn array_length(&self) -> u32 {
        1
    }

    /// Pixel size.
    pub fn size(&self) -> Size2 {
        Size2 {
            width: self.width,
            height: self.height,
        }
    }

    /// Bytes per tightly packed row.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * 4
    }

    /// Bytes of tightly packed storage.
    pub fn byte_len(&self) -> usize {
        self.row_bytes() * self.height as usize
    }

    /// Reject zero-sized or usage-less descriptors.
    pub fn validate(&self) -> ShadowResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ShadowError::setup(format!(
                "image size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.usage.is_empty() {
            return Err(ShadowError::setup("image usage must not be empty"));
        }
        Ok(())
    }
}

/// Process-unique image identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub u64);

impl ImageId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Backend-owned pixel storage.
pub(crate) enum ImageStorage {
    /// Tightly packed bytes in the image's own [`PixelFormat`].
    Cpu(RwLock<Vec<u8>>),
    #[cfg(feature = "gpu")]
    Wgpu(crate::gpu::wgpu_backend::WgpuTexture),
}

struct ImageInner {
    id: ImageId,
    desc: ImageDesc,
    storage: ImageStorage,
}

/// Reference-counted handle to a fixed-size 2D image owned by a device backend.
///
/// Storage is released when the last handle drops. Dimensions never change.
#[derive(Clone)]
pub struct GpuImage {
    inner: Arc<ImageInner>,
}

impl std::fmt::Debug for GpuImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuImage")
            .field("id", &self.inner.id)
            .field("desc", &self.inner.desc)
            .finish()
    }
}

impl GpuImage {
    pub(crate) fn from_storage(desc: ImageDesc, storage: ImageStorage) -> ShadowResult<Self> {
        desc.validate()?;
        Ok(Self {
            inner: Arc::new(ImageInner {
                id: ImageId::next(),
                desc,
                storage,
            }),
        })
    }

    pub(crate) fn new_cpu(desc: ImageDesc) -> ShadowResult<Self> {
        desc.validate()?;
        let bytes = vec![0u8; desc.byte_len()];
        Self::from_storage(desc, ImageStorage::Cpu(RwLock::new(bytes)))
    }

    /// Identity of this image.
    pub fn id(&self) -> ImageId {
        self.inner.id
    }

    /// Creation descriptor.
    pub fn desc(&self) -> &ImageDesc {
        &self.inner.desc
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.inner.desc.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.inner.desc.height
    }

    /// Pixel size.
    pub fn size(&self) -> Size2 {
        self.inner.desc.size()
    }

    /// Storage layout.
    pub fn format(&self) -> PixelFormat {
        self.inner.desc.format
    }

    /// Allowed uses.
    pub fn usage(&self) -> ImageUsage {
        self.inner.desc.usage
    }

    /// Whether both handles refer to the same storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live handles to this storage.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub(crate) fn storage(&self) -> &ImageStorage {
        &self.inner.storage
    }

    pub(crate) fn cpu_bytes(&self) -> ShadowResult<&RwLock<Vec<u8>>> {
        match &self.inner.storage {
            ImageStorage::Cpu(bytes) => Ok(bytes),
            #[cfg(feature = "gpu")]
            ImageStorage::Wgpu(_) => Err(ShadowError::render(
                "image is owned by the gpu backend, not the cpu backend",
            )),
        }
    }

    pub(crate) fn require(&self, usage: ImageUsage, role: &str) -> ShadowResult<()> {
        if self.usage().contains(usage) {
            Ok(())
        } else {
            Err(ShadowError::render(format!(
                "{role} image {:?} lacks usage {usage:?} (has {:?})",
                self.id(),
                self.usage()
            )))
        }
    }
}

/// Convert tightly packed pixels from `format` into logical RGBA.
pub fn to_rgba_bytes(format: PixelFormat, bytes: &[u8]) -> Vec<u8> {
    match format {
        PixelFormat::Rgba8Unorm => bytes.to_vec(),
        PixelFormat::Bgra8Unorm => {
            let mut out = bytes.to_vec();
            for px in out.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
            out
        }
    }
}

/// Convert logical RGBA pixels into `format`, in place.
pub fn rgba_into_format(format: PixelFormat, bytes: &mut [u8]) {
    if format == PixelFormat::Bgra8Unorm {
        for px in bytes.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
    }
}

/// Tightly packed `width x height` pixels of one logical RGBA color, stored in `format`.
pub fn solid_bytes(format: PixelFormat, width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let px = format.store_rgba(rgba);
    let mut out = Vec::with_capacity(width as usize * height as usize * 4);
    for _ in 0..(width as usize * height as usize) {
        out.extend_from_slice(&px);
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/gpu/image.rs"]
mod tests;
