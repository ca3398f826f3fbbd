//! Tick-driven conversion cycle.
//!
//! Each `tick()`:
//! 1. Polls every channel's queue once, in `Channel::ALL` order
//! 2. Loads any polled frame into the retained state, then releases it
//! 3. Leaves a channel's state untouched when its queue was empty
//! 4. Bakes exactly once, after every channel has been processed

use anyhow::Result;
use std::sync::Arc;

use crate::channel::Channel;
use crate::frame::{Frame, FrameHandle};
use crate::handoff::HandoffQueue;

use super::baker::Baker;
use super::maps::BakeTargets;
use super::state::RetainedState;

/// What a tick did with one channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelUpdate {
    /// A new frame was loaded.
    Fresh,
    /// Queue was empty; previous state reused.
    Stale,
    /// A frame was polled but could not be loaded; previous state reused.
    Rejected,
}

/// Result of one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickReport {
    /// 1-based tick number.
    pub tick: u64,
    pub color: ChannelUpdate,
    pub geometry: ChannelUpdate,
}

impl TickReport {
    pub fn update(&self, channel: Channel) -> ChannelUpdate {
        match channel {
            Channel::Color => self.color,
            Channel::Geometry => self.geometry,
        }
    }
}

/// Result of tearing the cycle down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShutdownReport {
    pub ticks: u64,
    /// Pending frames released from the queues.
    pub released_pending: usize,
}

/// Consumer side of the hand-off. Owns the retained state exclusively.
pub struct BakeCycle<H: FrameHandle, B: Baker> {
    queues: [Arc<HandoffQueue<Frame<H>>>; 2],
    state: RetainedState,
    baker: B,
    targets: BakeTargets,
    ticks: u64,
}

impl<H: FrameHandle, B: Baker> BakeCycle<H, B> {
    pub fn new(
        color: Arc<HandoffQueue<Frame<H>>>,
        geometry: Arc<HandoffQueue<Frame<H>>>,
        baker: B,
        targets: BakeTargets,
    ) -> Self {
        Self {
            queues: [color, geometry],
            state: RetainedState::new(),
            baker,
            targets,
            ticks: 0,
        }
    }

    /// Run one conversion/bake step. Not reentrant (`&mut self`).
    pub fn tick(&mut self) -> Result<TickReport> {
        let color = self.drain(Channel::Color);
        let geometry = self.drain(Channel::Geometry);

        self.ticks += 1;
        let report = TickReport {
            tick: self.ticks,
            color,
            geometry,
        };
        self.baker.bake(&self.state, &mut self.targets)?;
        log::debug!(
            "tick {}: color={:?} geometry={:?} baker={}",
            report.tick,
            report.color,
            report.geometry,
            self.baker.name()
        );
        Ok(report)
    }

    fn drain(&mut self, channel: Channel) -> ChannelUpdate {
        let Some(frame) = self.queues[channel.index()].poll() else {
            return ChannelUpdate::Stale;
        };
        // `frame` is released when this function returns, after the copy.
        match self.state.load(channel, &frame) {
            Ok(()) => ChannelUpdate::Fresh,
            Err(e) => {
                log::warn!("{} frame rejected: {}", channel, e);
                ChannelUpdate::Rejected
            }
        }
    }

    pub fn state(&self) -> &RetainedState {
        &self.state
    }

    pub fn targets(&self) -> &BakeTargets {
        &self.targets
    }

    pub fn baker(&self) -> &B {
        &self.baker
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn queue(&self, channel: Channel) -> &Arc<HandoffQueue<Frame<H>>> {
        &self.queues[channel.index()]
    }

    /// Release anything still pending in the queues.
    ///
    /// Delivery must be quiesced first, or a late delivery may land in a queue
    /// after it was drained (it is then released when the queue itself drops).
    pub fn shutdown(self) -> ShutdownReport {
        let released_pending = self.queues.iter().filter(|queue| queue.clear()).count();
        log::info!(
            "bake cycle stopped after {} ticks ({} pending frames released)",
            self.ticks,
            released_pending
        );
        ShutdownReport {
            ticks: self.ticks,
            released_pending,
        }
    }
}
