use std::{
    collections::VecDeque,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use parking_lot::Mutex;

use crate::{
    config::CpuBackendOpts,
    foundation::error::{ShadowError, ShadowResult},
    gpu::{
        backend::GpuBackend,
        command::{CommandBatch, Completion, KernelKind},
        cpu::CpuBackend,
        image::{GpuImage, ImageDesc},
    },
};

/// CPU backend whose queue only advances when told to.
///
/// Submitted batches wait until [`DeferredBackend::release_one`] or
/// [`DeferredBackend::release_all`] runs them on the calling thread. Allocation, submission and
/// kernel support can be made to fail, which makes every scheduling and degradation path of the
/// pipeline reproducible.
pub struct DeferredBackend {
    cpu: CpuBackend,
    pending: Mutex<VecDeque<(CommandBatch, Completion)>>,
    submits: AtomicUsize,
    allocations_left: Mutex<Option<usize>>,
    fail_submits: AtomicUsize,
    kernels: AtomicBool,
}

impl DeferredBackend {
    /// Backend with nothing pending and no faults.
    pub fn new() -> ShadowResult<Self> {
        Ok(Self {
            cpu: CpuBackend::new(CpuBackendOpts {
                parallel_rows: false,
            })?,
            pending: Mutex::new(VecDeque::new()),
            submits: AtomicUsize::new(0),
            allocations_left: Mutex::new(None),
            fail_submits: AtomicUsize::new(0),
            kernels: AtomicBool::new(true),
        })
    }

    /// Run the oldest pending batch. Returns `false` if none was pending.
    pub fn release_one(&self) -> bool {
        let job = self.pending.lock().pop_front();
        match job {
            Some((batch, done)) => {
                done(self.cpu.execute_batch(&batch));
                true
            }
            None => false,
        }
    }

    /// Run pending batches, including ones submitted by completions, until none is left.
    pub fn release_all(&self) -> usize {
        let mut n = 0;
        while self.release_one() {
            n += 1;
        }
        n
    }

    /// Batches waiting to run.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Accepted submissions so far.
    pub fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    /// Allow only `n` more image allocations; `None` removes the limit.
    pub fn limit_allocations(&self, n: Option<usize>) {
        *self.allocations_left.lock() = n;
    }

    /// Reject the next `n` submissions.
    pub fn fail_next_submits(&self, n: usize) {
        self.fail_submits.store(n, Ordering::SeqCst);
    }

    /// Toggle custom kernel support.
    pub fn set_kernel_support(&self, supported: bool) {
        self.kernels.store(supported, Ordering::SeqCst);
    }
}

impl GpuBackend for DeferredBackend {
    fn name(&self) -> &'static str {
        "deferred"
    }

    fn create_image(&self, desc: ImageDesc) -> ShadowResult<GpuImage> {
        let mut left = self.allocations_left.lock();
        if let Some(n) = left.as_mut() {
            if *n == 0 {
                return Err(ShadowError::setup("image allocation refused"));
            }
            *n -= 1;
        }
        self.cpu.create_image(desc)
    }

    fn supports_kernel(&self, kind: KernelKind) -> bool {
        self.kernels.load(Ordering::SeqCst) && self.cpu.supports_kernel(kind)
    }

    fn submit(&self, batch: CommandBatch, done: Completion) -> ShadowResult<()> {
        batch.validate()?;
        let refused = self
            .fail_submits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ShadowError::render("submission refused"));
        }
        self.submits.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().push_back((batch, done));
        Ok(())
    }

    fn upload(&self, image: &GpuImage, bytes: &[u8]) -> ShadowResult<()> {
        self.cpu.upload(image, bytes)
    }

    fn read_rgba8(&self, image: &GpuImage) -> ShadowResult<Vec<u8>> {
        self.cpu.read_rgba8(image)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/gpu/deferred.rs"]
mod tests;
