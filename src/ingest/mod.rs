//! Frame ingestion.
//!
//! This module provides the delivery side of the hand-off:
//! - `IngestHandler`: per-channel callback invoked by the external source
//! - Synthetic source (`stub://`) for demos and testing
//!
//! The ingestion layer is responsible for:
//! - Taking ownership of each delivered root frame for the duration of the call
//! - Classifying the bundle with the channel's selector
//! - Forwarding at most one frame per bundle into the channel's queue
//!
//! The ingestion layer MUST NOT:
//! - Block on the tick timeline
//! - Retain any frame past the hand-off
//! - Leak a frame on any exit path

pub mod handler;
pub mod synthetic;

pub use handler::{Delivery, HandlerStats, IngestHandler};
pub use synthetic::{
    ReleaseLedger, SourceSettings, SourceStats, SyntheticFrame, SyntheticNode, SyntheticSource,
};
