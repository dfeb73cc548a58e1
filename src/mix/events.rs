use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crossbeam_channel::Receiver;
use parking_lot::RwLock;

use crate::{
    composite::blend::BlendStyle,
    gpu::command::BatchTiming,
    video::player::{ItemStatus, TimeControlStatus},
};

/// Notifications raised by the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineEvent {
    /// The scene renderer finished a pass; its color image holds the new frame.
    RenderUpdated,
    /// The frame tap stored a new latest video image.
    NewVideoFrame {
        /// Presentation index of the frame.
        frame: u64,
    },
    /// Playback reached the end of the source.
    PlaybackFinished,
    /// Player transport changed.
    PlayerStatusChanged(TimeControlStatus),
    /// Player item readiness changed.
    ItemStatusChanged(ItemStatus),
    /// A compositor batch completed and its output was published.
    CompositeCompleted {
        /// Device execution window.
        timing: BatchTiming,
        /// Style the pass ran with.
        style: BlendStyle,
    },
}

/// Subscription handle returned by [`EventBus::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct BusInner<E> {
    next: AtomicU64,
    handlers: RwLock<Vec<(SubscriptionId, Handler<E>)>>,
}

/// Synchronous publish/subscribe fan-out.
///
/// Handlers run on the emitting thread, in subscription order. A handler may subscribe,
/// unsubscribe or emit re-entrantly. Use [`EventBus::subscribe_channel`] to hop threads.
pub struct EventBus<E> {
    inner: Arc<BusInner<E>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            inner: Arc::new(BusInner {
                next: AtomicU64::new(1),
                handlers: RwLock::new(Vec::new()),
            }),
        }
    }
}

impl<E: Clone + Send + 'static> EventBus<E> {
    /// Empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`.
    pub fn subscribe(&self, handler: impl Fn(&E) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next.fetch_add(1, Ordering::Relaxed));
        self.inner.handlers.write().push((id, Arc::new(handler)));
        id
    }

    /// Forward every event into a channel. The subscription stays until unsubscribed or cleared.
    pub fn subscribe_channel(&self) -> (SubscriptionId, Receiver<E>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let id = self.subscribe(move |e: &E| {
            let _ = tx.send(e.clone());
        });
        (id, rx)
    }

    /// Remove a handler; returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.inner.handlers.write();
        let before = handlers.len();
        handlers.retain(|(h, _)| *h != id);
        handlers.len() != before
    }

    /// Remove every handler.
    pub fn clear(&self) {
        self.inner.handlers.write().clear();
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.inner.handlers.read().len()
    }

    /// Deliver `event` to every handler registered at the time of the call.
    pub fn emit(&self, event: &E) {
        let handlers: Vec<Handler<E>> = self
            .inner
            .handlers
            .read()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for h in handlers {
            h(event);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mix/events.rs"]
mod tests;
