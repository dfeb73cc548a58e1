use std::{sync::Arc, thread};

use crossbeam_channel::{Receiver, Sender};

use crate::{
    foundation::error::{ShadowError, ShadowResult},
    gpu::command::{BatchTiming, CommandBatch, Completion},
};

/// Executes one batch synchronously on the queue thread.
pub(crate) type Executor = Arc<dyn Fn(&CommandBatch) -> ShadowResult<BatchTiming> + Send + Sync>;

struct Job {
    batch: CommandBatch,
    done: Completion,
}

/// FIFO device queue backed by one worker thread.
///
/// The worker exits once the queue is dropped and pending jobs drained.
pub(crate) struct DeviceQueue {
    tx: Sender<Job>,
}

impl DeviceQueue {
    pub(crate) fn spawn(name: &str, exec: Executor) -> ShadowResult<Self> {
        let (tx, rx) = crossbeam_channel::unbounded::<Job>();
        thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || run(rx, exec))
            .map_err(|e| ShadowError::setup(format!("failed to spawn device queue: {e}")))?;
        Ok(Self { tx })
    }

    pub(crate) fn enqueue(&self, batch: CommandBatch, done: Completion) -> ShadowResult<()> {
        self.tx
            .send(Job { batch, done })
            .map_err(|_| ShadowError::render("device queue is shut down"))
    }
}

fn run(rx: Receiver<Job>, exec: Executor) {
    for job in rx {
        let label = job.batch.label();
        let res = exec(&job.batch);
        if let Err(e) = &res {
            tracing::warn!(batch = label, error = %e, "batch failed on device queue");
        }
        (job.done)(res);
    }
    tracing::debug!("device queue drained");
}
