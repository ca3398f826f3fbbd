//! Per-channel delivery callback.
//!
//! The external source calls `IngestHandler::on_bundle` with a freshly acquired
//! root frame whenever a bundle is available. The handler owns that root for the
//! duration of the call: it is released on every exit path, whether or not a
//! matching frame was forwarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::channel::Channel;
use crate::classify::{classify, StreamSelector};
use crate::frame::{Frame, FrameHandle};
use crate::handoff::HandoffQueue;

/// Outcome of one delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// A matching frame was handed to the channel's queue.
    Forwarded {
        /// An unconsumed frame was dropped to make room.
        replaced_pending: bool,
    },
    /// Nothing in the bundle matched the channel's selector.
    NoMatch,
}

/// Counters for an ingest handler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HandlerStats {
    pub bundles: u64,
    pub forwarded: u64,
    pub missed: u64,
}

#[derive(Default)]
struct HandlerCounters {
    bundles: AtomicU64,
    forwarded: AtomicU64,
    missed: AtomicU64,
}

/// Delivery callback for one channel. Cheap to clone; clones share the queue.
pub struct IngestHandler<H: FrameHandle> {
    channel: Channel,
    selector: StreamSelector,
    queue: Arc<HandoffQueue<Frame<H>>>,
    counters: Arc<HandlerCounters>,
}

impl<H: FrameHandle> IngestHandler<H> {
    pub fn new(
        channel: Channel,
        selector: StreamSelector,
        queue: Arc<HandoffQueue<Frame<H>>>,
    ) -> Self {
        Self {
            channel,
            selector,
            queue,
            counters: Arc::new(HandlerCounters::default()),
        }
    }

    /// Classify a delivered bundle and forward the match, if any.
    pub fn on_bundle(&self, bundle: H) -> Delivery {
        let root = Frame::from_handle(bundle);
        self.counters.bundles.fetch_add(1, Ordering::Relaxed);

        let Some(frame) = classify(&root, &self.selector) else {
            self.counters.missed.fetch_add(1, Ordering::Relaxed);
            log::trace!("{} handler: no matching frame in bundle", self.channel);
            return Delivery::NoMatch;
        };

        let replaced_pending = self.queue.enqueue(frame);
        self.counters.forwarded.fetch_add(1, Ordering::Relaxed);
        if replaced_pending {
            log::debug!("{} handler: dropped unconsumed frame", self.channel);
        }
        Delivery::Forwarded { replaced_pending }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn selector(&self) -> &StreamSelector {
        &self.selector
    }

    pub fn stats(&self) -> HandlerStats {
        HandlerStats {
            bundles: self.counters.bundles.load(Ordering::Relaxed),
            forwarded: self.counters.forwarded.load(Ordering::Relaxed),
            missed: self.counters.missed.load(Ordering::Relaxed),
        }
    }
}

impl<H: FrameHandle> Clone for IngestHandler<H> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel,
            selector: self.selector,
            queue: self.queue.clone(),
            counters: self.counters.clone(),
        }
    }
}
