//! Wiring for one baker: two hand-off queues, their delivery handlers and the
//! tick cycle that drains them.

use anyhow::Result;
use std::sync::Arc;

use crate::bake::{BakeCycle, BakeTargets, Baker, ShutdownReport, TickReport};
use crate::channel::Channel;
use crate::classify::StreamSelector;
use crate::frame::FrameHandle;
use crate::handoff::{HandoffQueue, QueueStats};
use crate::ingest::{HandlerStats, IngestHandler};

/// Settings for building a `Pipeline`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineSettings {
    pub map_width: u32,
    pub map_height: u32,
    pub color_selector: StreamSelector,
    pub geometry_selector: StreamSelector,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            map_width: 256,
            map_height: 256,
            color_selector: Channel::Color.default_selector(),
            geometry_selector: Channel::Geometry.default_selector(),
        }
    }
}

/// Snapshot of per-channel counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub handler: HandlerStats,
    pub queue: QueueStats,
}

pub struct Pipeline<H: FrameHandle, B: Baker> {
    handlers: [IngestHandler<H>; 2],
    cycle: BakeCycle<H, B>,
}

impl<H: FrameHandle, B: Baker> Pipeline<H, B> {
    pub fn new(settings: &PipelineSettings, baker: B) -> Result<Self> {
        let targets = BakeTargets::new(settings.map_width, settings.map_height)?;
        let color_queue = Arc::new(HandoffQueue::new());
        let geometry_queue = Arc::new(HandoffQueue::new());
        let handlers = [
            IngestHandler::new(
                Channel::Color,
                settings.color_selector,
                color_queue.clone(),
            ),
            IngestHandler::new(
                Channel::Geometry,
                settings.geometry_selector,
                geometry_queue.clone(),
            ),
        ];
        let cycle = BakeCycle::new(color_queue, geometry_queue, baker, targets);
        Ok(Self { handlers, cycle })
    }

    /// Delivery callback for `channel`. Hand clones to delivery threads.
    pub fn handler(&self, channel: Channel) -> IngestHandler<H> {
        self.handlers[channel.index()].clone()
    }

    pub fn tick(&mut self) -> Result<TickReport> {
        self.cycle.tick()
    }

    pub fn cycle(&self) -> &BakeCycle<H, B> {
        &self.cycle
    }

    pub fn stats(&self, channel: Channel) -> ChannelStats {
        ChannelStats {
            handler: self.handlers[channel.index()].stats(),
            queue: self.cycle.queue(channel).stats(),
        }
    }

    /// Tear down. Quiesce delivery (stop calling handlers) before this.
    pub fn shutdown(self) -> ShutdownReport {
        self.cycle.shutdown()
    }
}
