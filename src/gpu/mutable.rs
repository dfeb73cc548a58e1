use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use parking_lot::{Mutex, RwLock};

use crate::{
    foundation::{core::Size2, error::ShadowResult},
    gpu::{
        backend::GpuBackend,
        image::{GpuImage, ImageDesc},
    },
};

struct MutableInner {
    desc: ImageDesc,
    backend: Arc<dyn GpuBackend>,
    front: RwLock<GpuImage>,
    spare: Mutex<Option<GpuImage>>,
    generation: AtomicU64,
}

/// Output image whose backing store is swapped once per compositing pass.
///
/// A pass writes into the store returned by [`MutableImage::replace`]; readers keep seeing the
/// previous front store until [`MutableImage::commit`] publishes the new one.
#[derive(Clone)]
pub struct MutableImage {
    inner: Arc<MutableInner>,
}

/// Back store handed out for one pass. Publish with [`MutableImage::commit`].
#[derive(Debug)]
pub struct PendingReplace {
    target: GpuImage,
}

impl PendingReplace {
    /// Image the pass must write into.
    pub fn target(&self) -> &GpuImage {
        &self.target
    }
}

impl MutableImage {
    /// Allocate the initial front store.
    pub fn new(backend: Arc<dyn GpuBackend>, desc: ImageDesc) -> ShadowResult<Self> {
        let front = backend.create_image(desc)?;
        Ok(Self {
            inner: Arc::new(MutableInner {
                desc,
                backend,
                front: RwLock::new(front),
                spare: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        })
    }

    /// Descriptor shared by every backing store.
    pub fn desc(&self) -> &ImageDesc {
        &self.inner.desc
    }

    /// Pixel size.
    pub fn size(&self) -> Size2 {
        self.inner.desc.size()
    }

    /// Number of committed passes.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Next back store: the recycled spare if nothing else holds it, else a fresh allocation.
    pub fn replace(&self) -> ShadowResult<PendingReplace> {
        let spare = self.inner.spare.lock().take();
        let target = match spare {
            Some(img) if img.handle_count() == 1 => img,
            _ => self.inner.backend.create_image(self.inner.desc)?,
        };
        Ok(PendingReplace { target })
    }

    /// Publish a completed back store as the new front store.
    pub fn commit(&self, pending: PendingReplace) {
        let old = std::mem::replace(&mut *self.inner.front.write(), pending.target);
        *self.inner.spare.lock() = Some(old);
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Give back an unused back store without publishing it.
    pub fn abandon(&self, pending: PendingReplace) {
        *self.inner.spare.lock() = Some(pending.target);
    }

    /// Upload `bytes` (in the image's format) into a back store and publish it.
    pub fn upload_and_commit(&self, bytes: &[u8]) -> ShadowResult<()> {
        let pending = self.replace()?;
        match self.inner.backend.upload(&pending.target, bytes) {
            Ok(()) => {
                self.commit(pending);
                Ok(())
            }
            Err(e) => {
                self.abandon(pending);
                Err(e)
            }
        }
    }

    /// Read-only view of the front store.
    pub fn display_handle(&self) -> DisplayHandle {
        DisplayHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Read-only access to the latest committed output.
#[derive(Clone)]
pub struct DisplayHandle {
    inner: Arc<MutableInner>,
}

impl std::fmt::Debug for DisplayHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayHandle")
            .field("desc", &self.inner.desc)
            .field("generation", &self.generation())
            .finish()
    }
}

impl DisplayHandle {
    /// Current front store.
    pub fn current(&self) -> GpuImage {
        self.inner.front.read().clone()
    }

    /// Pixel size.
    pub fn size(&self) -> Size2 {
        self.inner.desc.size()
    }

    /// Number of committed passes.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Read the front store back as logical RGBA8.
    pub fn read_rgba8(&self) -> ShadowResult<Vec<u8>> {
        let img = self.current();
        self.inner.backend.read_rgba8(&img)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/gpu/mutable.rs"]
mod tests;
