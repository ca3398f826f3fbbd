//! In-memory frame source.
//!
//! `SyntheticFrame` is a reference-counted, fully instrumented `FrameHandle`:
//! every acquisition and release is recorded in a shared `ReleaseLedger`, so
//! ownership mistakes (leaks, double releases) show up as an unbalanced ledger.
//!
//! `SyntheticSource` produces composite `[depth, color, points]` bundles for
//! `stub://` URLs, standing in for a physical sensor.

use anyhow::{anyhow, Result};
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::frame::{FrameHandle, FramePayload, PixelFormat, StreamDescriptor, StreamKind};

/// Largest accepted color frame edge, in pixels.
pub const MAX_SOURCE_DIMENSION: u32 = 4096;
/// Largest accepted point count per point-cloud frame.
pub const MAX_SOURCE_POINTS: u32 = 1 << 22;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

// ----------------------------------------------------------------------------
// SyntheticNode: immutable frame tree
// ----------------------------------------------------------------------------

enum NodeData {
    Empty,
    Color {
        width: u32,
        height: u32,
        rgba: Vec<u8>,
    },
    Points {
        vertices: Vec<[f32; 3]>,
        uvs: Vec<[f32; 2]>,
    },
    Composite(Vec<Arc<SyntheticNode>>),
}

/// One node of a synthetic bundle tree. Shared between all handles to it.
pub struct SyntheticNode {
    id: u64,
    descriptor: StreamDescriptor,
    data: NodeData,
}

impl SyntheticNode {
    fn build(descriptor: StreamDescriptor, data: NodeData) -> Self {
        Self {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
            descriptor,
            data,
        }
    }

    /// RGBA8 color leaf on stream index 0.
    pub fn color(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self::build(
            StreamDescriptor::new(StreamKind::Color, PixelFormat::Rgba8, 0),
            NodeData::Color {
                width,
                height,
                rgba,
            },
        )
    }

    /// Z16 depth leaf. Carries no payload.
    pub fn depth() -> Self {
        Self::build(
            StreamDescriptor::new(StreamKind::Depth, PixelFormat::Z16, 0),
            NodeData::Empty,
        )
    }

    /// Point cloud leaf (XYZ32F, derived from the depth stream).
    pub fn points(vertices: Vec<[f32; 3]>, uvs: Vec<[f32; 2]>) -> Self {
        Self::build(
            StreamDescriptor::new(StreamKind::Depth, PixelFormat::Xyz32f, 0),
            NodeData::Points { vertices, uvs },
        )
    }

    /// Leaf with an arbitrary descriptor and no payload.
    pub fn leaf(descriptor: StreamDescriptor) -> Self {
        Self::build(descriptor, NodeData::Empty)
    }

    /// Bundle of child frames.
    pub fn composite(children: Vec<SyntheticNode>) -> Self {
        Self::build(
            StreamDescriptor::new(StreamKind::Any, PixelFormat::Any, 0),
            NodeData::Composite(children.into_iter().map(Arc::new).collect()),
        )
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

// ----------------------------------------------------------------------------
// ReleaseLedger: acquisition/release accounting
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default)]
struct NodeCounts {
    acquired: u64,
    released: u64,
}

#[derive(Debug, Default)]
struct LedgerState {
    /// Nodes with unsettled counts. Settled nodes are dropped unless
    /// `keep_history` is set.
    nodes: HashMap<u64, NodeCounts>,
    total_acquired: u64,
    total_released: u64,
    over_released: u64,
    keep_history: bool,
}

/// Shared acquisition and release counters.
///
/// Only nodes with references still outstanding (or released too often) are
/// tracked, so a long-running source keeps the ledger at the size of its live
/// frames. `with_history` keeps settled nodes too, for per-node assertions.
#[derive(Clone, Default)]
pub struct ReleaseLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl ReleaseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger that remembers per-node counts after they settle.
    pub fn with_history() -> Self {
        let ledger = Self::default();
        ledger.lock().keep_history = true;
        ledger
    }

    /// Acquisitions of `id`. Settled nodes read as zero without history.
    pub fn acquired(&self, id: u64) -> u64 {
        self.lock().nodes.get(&id).map_or(0, |c| c.acquired)
    }

    /// Releases of `id`. Settled nodes read as zero without history.
    pub fn released(&self, id: u64) -> u64 {
        self.lock().nodes.get(&id).map_or(0, |c| c.released)
    }

    pub fn total_acquired(&self) -> u64 {
        self.lock().total_acquired
    }

    pub fn total_released(&self) -> u64 {
        self.lock().total_released
    }

    /// Number of nodes currently held in the ledger.
    pub fn tracked_nodes(&self) -> usize {
        self.lock().nodes.len()
    }

    /// References acquired but not yet released.
    pub fn outstanding(&self) -> u64 {
        self.lock()
            .nodes
            .values()
            .map(|c| c.acquired.saturating_sub(c.released))
            .sum()
    }

    /// True when no node was released more often than it was acquired.
    pub fn no_over_release(&self) -> bool {
        self.lock().over_released == 0
    }

    /// Every acquired reference released exactly once.
    pub fn is_balanced(&self) -> bool {
        let state = self.lock();
        state.over_released == 0 && state.nodes.values().all(|c| c.released == c.acquired)
    }

    fn record_acquire(&self, id: u64) {
        let mut state = self.lock();
        state.total_acquired += 1;
        state.nodes.entry(id).or_default().acquired += 1;
    }

    fn record_release(&self, id: u64) {
        let mut state = self.lock();
        state.total_released += 1;
        let counts = state.nodes.entry(id).or_default();
        let over = counts.released >= counts.acquired;
        counts.released += 1;
        let settled = counts.released == counts.acquired;
        if over {
            state.over_released += 1;
        } else if settled && !state.keep_history {
            state.nodes.remove(&id);
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ----------------------------------------------------------------------------
// SyntheticFrame: FrameHandle implementation
// ----------------------------------------------------------------------------

/// Acquired reference to a synthetic node.
pub struct SyntheticFrame {
    node: Arc<SyntheticNode>,
    ledger: ReleaseLedger,
    released: bool,
}

impl SyntheticFrame {
    /// Acquire the root reference of a freshly built tree.
    pub fn acquire(node: SyntheticNode, ledger: &ReleaseLedger) -> Self {
        Self::acquire_shared(Arc::new(node), ledger.clone())
    }

    fn acquire_shared(node: Arc<SyntheticNode>, ledger: ReleaseLedger) -> Self {
        ledger.record_acquire(node.id);
        Self {
            node,
            ledger,
            released: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.node.id
    }
}

impl FrameHandle for SyntheticFrame {
    fn descriptor(&self) -> StreamDescriptor {
        self.node.descriptor
    }

    fn is_composite(&self) -> bool {
        matches!(self.node.data, NodeData::Composite(_))
    }

    fn child_count(&self) -> usize {
        match &self.node.data {
            NodeData::Composite(children) => children.len(),
            _ => 0,
        }
    }

    fn child(&self, index: usize) -> Option<Self> {
        match &self.node.data {
            NodeData::Composite(children) => children
                .get(index)
                .map(|child| Self::acquire_shared(child.clone(), self.ledger.clone())),
            _ => None,
        }
    }

    fn retain(&self) -> Self {
        Self::acquire_shared(self.node.clone(), self.ledger.clone())
    }

    fn payload(&self) -> FramePayload<'_> {
        match &self.node.data {
            NodeData::Color {
                width,
                height,
                rgba,
            } => FramePayload::Color {
                width: *width,
                height: *height,
                rgba,
            },
            NodeData::Points { vertices, uvs } => FramePayload::Points { vertices, uvs },
            NodeData::Empty | NodeData::Composite(_) => FramePayload::Empty,
        }
    }

    fn release(&mut self) {
        // Recorded even when repeated, so double releases unbalance the ledger.
        if self.released {
            log::error!("synthetic frame {} released twice", self.node.id);
        }
        self.released = true;
        self.ledger.record_release(self.node.id);
    }
}

// ----------------------------------------------------------------------------
// SyntheticSource: stub:// bundle producer
// ----------------------------------------------------------------------------

/// Configuration for a synthetic bundle source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceSettings {
    /// Source URL. Only `stub://` is built in.
    pub url: String,
    /// Bundles delivered per second.
    pub fps: u32,
    /// Color frame dimensions.
    pub width: u32,
    pub height: u32,
    /// Points per point-cloud frame.
    pub points: u32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            url: "stub://sensor".to_string(),
            fps: 30,
            width: 64,
            height: 48,
            points: 64 * 48,
        }
    }
}

/// Statistics for a synthetic source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub bundles_produced: u64,
    pub url: String,
}

/// Synthetic bundle producer.
pub struct SyntheticSource {
    settings: SourceSettings,
    ledger: ReleaseLedger,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(settings: SourceSettings, ledger: ReleaseLedger) -> Result<Self> {
        if !settings.url.starts_with("stub://") {
            return Err(anyhow!(
                "unsupported source url {} (only stub:// sources are built in)",
                settings.url
            ));
        }
        if settings.width == 0 || settings.height == 0 {
            return Err(anyhow!("source dimensions must be non-zero"));
        }
        if settings.width > MAX_SOURCE_DIMENSION || settings.height > MAX_SOURCE_DIMENSION {
            return Err(anyhow!(
                "source dimensions must be at most {}x{}",
                MAX_SOURCE_DIMENSION,
                MAX_SOURCE_DIMENSION
            ));
        }
        if settings.points > MAX_SOURCE_POINTS {
            return Err(anyhow!(
                "source point count must be at most {}",
                MAX_SOURCE_POINTS
            ));
        }
        Ok(Self {
            settings,
            ledger,
            frame_count: 0,
        })
    }

    /// Synthetic sources are always "connected".
    pub fn connect(&mut self) -> Result<()> {
        log::info!(
            "SyntheticSource: connected to {} ({}x{}, {} points)",
            self.settings.url,
            self.settings.width,
            self.settings.height,
            self.settings.points
        );
        Ok(())
    }

    /// Produce the next `[depth, color, points]` bundle as an acquired root.
    pub fn next_bundle(&mut self) -> SyntheticFrame {
        self.frame_count += 1;
        let depth = SyntheticNode::depth();
        let color = SyntheticNode::color(
            self.settings.width,
            self.settings.height,
            self.generate_gradient(),
        );
        let (vertices, uvs) = self.generate_point_grid();
        let points = SyntheticNode::points(vertices, uvs);
        SyntheticFrame::acquire(
            SyntheticNode::composite(vec![depth, color, points]),
            &self.ledger,
        )
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            bundles_produced: self.frame_count,
            url: self.settings.url.clone(),
        }
    }

    pub fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    /// Horizontal gradient that scrolls one column per frame.
    fn generate_gradient(&self) -> Vec<u8> {
        let (w, h) = (self.settings.width as u64, self.settings.height as u64);
        let mut rgba = Vec::with_capacity((w * h * 4) as usize);
        for y in 0..h {
            for x in 0..w {
                let shifted = (x + self.frame_count) % w;
                rgba.push((shifted * 255 / w.max(1)) as u8);
                rgba.push((y * 255 / h.max(1)) as u8);
                rgba.push((self.frame_count % 256) as u8);
                rgba.push(255);
            }
        }
        rgba
    }

    /// Jittered grid on a plane one metre away, with matching UVs.
    fn generate_point_grid(&self) -> (Vec<[f32; 3]>, Vec<[f32; 2]>) {
        let mut rng = rand::thread_rng();
        let count = self.settings.points as usize;
        let columns = (count as f32).sqrt().ceil().max(1.0) as usize;
        let rows = count.div_ceil(columns).max(1);
        let mut vertices = Vec::with_capacity(count);
        let mut uvs = Vec::with_capacity(count);
        for i in 0..count {
            let u = (i % columns) as f32 / columns as f32;
            let v = (i / columns) as f32 / rows as f32;
            let z = 1.0 + rng.gen_range(-0.01f32..0.01f32);
            vertices.push([u - 0.5, 0.5 - v, z]);
            uvs.push([u, v]);
        }
        (vertices, uvs)
    }
}
