//! Point Cloud Baker
//!
//! This crate hands sensor frames from an asynchronous delivery source to a
//! periodic consumer that bakes the latest color and point-cloud data into
//! attribute maps.
//!
//! # Architecture
//!
//! The hand-off enforces four invariants by construction:
//!
//! 1. **Release Once**: Every acquired frame reference is released exactly once.
//!    `Frame` is move-only and releases on drop.
//! 2. **Never Block Delivery**: Each channel has a capacity-1 overwrite queue;
//!    the newest frame replaces (and releases) an unconsumed one.
//! 3. **Stale Is Valid**: A tick with no new frame for a channel reuses that
//!    channel's retained data.
//! 4. **One Bake Per Tick**: The bake runs exactly once per tick, after every
//!    channel has finished loading.
//!
//! # Module Structure
//!
//! - `frame`: Frame handle contract and the owning `Frame` guard
//! - `classify`: Stream selectors and recursive bundle search
//! - `handoff`: Single-slot overwrite queue
//! - `ingest`: Delivery handlers and the synthetic source
//! - `bake`: Retained state, bake targets, and the tick cycle
//! - `pipeline`: Wiring of queues, handlers, and cycle
//! - `config`: File and environment configuration

pub mod bake;
pub mod channel;
pub mod classify;
pub mod config;
pub mod frame;
pub mod handoff;
pub mod ingest;
pub mod pipeline;

pub use bake::{
    AttributeMap, BakeCycle, BakeStats, BakeTargets, Baker, ChannelUpdate, ColorImage, CpuBaker,
    PointCloud, RetainedState, ShutdownReport, TickReport,
};
pub use channel::Channel;
pub use classify::{classify, StreamSelector};
pub use frame::{Frame, FrameHandle, FramePayload, PixelFormat, StreamDescriptor, StreamKind};
pub use handoff::{HandoffQueue, QueueStats};
pub use ingest::{
    Delivery, HandlerStats, IngestHandler, ReleaseLedger, SourceSettings, SourceStats,
    SyntheticFrame, SyntheticNode, SyntheticSource,
};
pub use pipeline::{ChannelStats, Pipeline, PipelineSettings};
