//! Frame resource isolation layer.
//!
//! Frames are delivered by an external source as opaque handles that must be
//! released exactly once per acquisition. This module enforces that at the type level:
//!
//! - `FrameHandle`: the capability set an external frame resource provides.
//! - `Frame`: move-only owning guard. Dropping it releases the handle.
//! - `Children`: lazy iterator over a composite frame's children.
//!
//! There is no way to get the raw handle back out of a `Frame`, so a handle
//! cannot escape its guard and be released twice or not at all.

use serde::Deserialize;

// ----------------------------------------------------------------------------
// Stream descriptors
// ----------------------------------------------------------------------------

/// Category of sensor stream a leaf frame belongs to.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Any,
    Depth,
    Color,
    Infrared,
    Fisheye,
    Gyro,
    Accel,
    Pose,
    Other,
}

/// Data layout of a leaf frame.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Any,
    Z16,
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
    Y8,
    Y16,
    Xyz32f,
    MotionXyz32f,
}

/// Immutable (kind, format, index) tuple attached to a frame.
///
/// Used only for classification, never stored past it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StreamDescriptor {
    pub kind: StreamKind,
    pub format: PixelFormat,
    pub index: u32,
}

impl StreamDescriptor {
    pub const fn new(kind: StreamKind, format: PixelFormat, index: u32) -> Self {
        Self {
            kind,
            format,
            index,
        }
    }
}

/// Borrowed view of a leaf frame's data. Valid only while the frame is held.
#[derive(Clone, Copy, Debug)]
pub enum FramePayload<'a> {
    Empty,
    /// Tightly packed RGBA8 texels, row-major.
    Color {
        width: u32,
        height: u32,
        rgba: &'a [u8],
    },
    /// Point cloud vertices with optional per-vertex texture coordinates.
    Points {
        vertices: &'a [[f32; 3]],
        uvs: &'a [[f32; 2]],
    },
}

// ----------------------------------------------------------------------------
// FrameHandle: external resource contract
// ----------------------------------------------------------------------------

/// Capabilities an externally owned frame resource provides.
///
/// Every value of an implementing type represents one acquired reference.
/// The holder is responsible for exactly one `release()` call; wrap handles
/// in `Frame` and let drop do it.
pub trait FrameHandle: Send + Sized + 'static {
    /// Stream descriptor of this frame.
    fn descriptor(&self) -> StreamDescriptor;

    /// True when this frame is a bundle of child frames rather than a leaf.
    fn is_composite(&self) -> bool;

    /// Number of children. Zero for leaf frames.
    fn child_count(&self) -> usize;

    /// Acquire child `index`. Each call returns a newly acquired reference.
    fn child(&self, index: usize) -> Option<Self>;

    /// Acquire another reference to this same frame.
    fn retain(&self) -> Self;

    /// Borrow the frame's data.
    fn payload(&self) -> FramePayload<'_>;

    /// Give back this reference. Must be called exactly once per acquired value.
    fn release(&mut self);
}

// ----------------------------------------------------------------------------
// Frame: owning guard
// ----------------------------------------------------------------------------

/// Owned frame reference. Released exactly once, when dropped.
///
/// Explicitly NOT `Clone`: use `retain()` to acquire a second reference.
pub struct Frame<H: FrameHandle> {
    handle: H,
}

impl<H: FrameHandle> Frame<H> {
    /// Take ownership of an acquired handle.
    pub fn from_handle(handle: H) -> Self {
        Self { handle }
    }

    pub fn descriptor(&self) -> StreamDescriptor {
        self.handle.descriptor()
    }

    pub fn is_composite(&self) -> bool {
        self.handle.is_composite()
    }

    pub fn payload(&self) -> FramePayload<'_> {
        self.handle.payload()
    }

    /// Acquire an independent reference to the same frame.
    pub fn retain(&self) -> Self {
        Self::from_handle(self.handle.retain())
    }

    /// Lazily acquire this frame's children in order.
    ///
    /// A child is only acquired when the iterator is advanced onto it. Dropping
    /// the iterator early leaves the remaining children untouched.
    pub fn children(&self) -> Children<'_, H> {
        let count = if self.handle.is_composite() {
            self.handle.child_count()
        } else {
            0
        };
        Children {
            parent: &self.handle,
            next: 0,
            count,
        }
    }

    /// Borrow the underlying handle for read-only queries.
    pub fn handle(&self) -> &H {
        &self.handle
    }
}

impl<H: FrameHandle> Drop for Frame<H> {
    fn drop(&mut self) {
        self.handle.release();
    }
}

impl<H: FrameHandle> std::fmt::Debug for Frame<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("descriptor", &self.descriptor())
            .field("composite", &self.is_composite())
            .finish()
    }
}

/// Lazy child iterator returned by `Frame::children`.
pub struct Children<'a, H: FrameHandle> {
    parent: &'a H,
    next: usize,
    count: usize,
}

impl<H: FrameHandle> Iterator for Children<'_, H> {
    type Item = Frame<H>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.count {
            let index = self.next;
            self.next += 1;
            if let Some(child) = self.parent.child(index) {
                return Some(Frame::from_handle(child));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.count - self.next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::synthetic::{ReleaseLedger, SyntheticFrame, SyntheticNode};

    #[test]
    fn dropping_frame_releases_once() {
        let ledger = ReleaseLedger::with_history();
        let node = SyntheticNode::depth();
        let id = node.id();

        let frame = Frame::from_handle(SyntheticFrame::acquire(node, &ledger));
        assert_eq!(ledger.acquired(id), 1);
        assert_eq!(ledger.released(id), 0);

        drop(frame);
        assert_eq!(ledger.released(id), 1);
        assert!(ledger.is_balanced());
    }

    #[test]
    fn retain_acquires_independent_reference() {
        let ledger = ReleaseLedger::with_history();
        let node = SyntheticNode::depth();
        let id = node.id();

        let frame = Frame::from_handle(SyntheticFrame::acquire(node, &ledger));
        let second = frame.retain();
        assert_eq!(ledger.acquired(id), 2);

        drop(frame);
        assert_eq!(ledger.released(id), 1);
        assert_eq!(second.descriptor().kind, StreamKind::Depth);

        drop(second);
        assert!(ledger.is_balanced());
    }

    #[test]
    fn children_are_acquired_lazily() {
        let ledger = ReleaseLedger::with_history();
        let first = SyntheticNode::depth();
        let second = SyntheticNode::depth();
        let (first_id, second_id) = (first.id(), second.id());
        let root = Frame::from_handle(SyntheticFrame::acquire(
            SyntheticNode::composite(vec![first, second]),
            &ledger,
        ));

        let mut children = root.children();
        let child = children.next().expect("first child");
        assert_eq!(ledger.acquired(first_id), 1);
        assert_eq!(ledger.acquired(second_id), 0);

        drop(child);
        drop(children);
        assert_eq!(ledger.released(first_id), 1);
        assert_eq!(ledger.acquired(second_id), 0);
    }

    #[test]
    fn leaf_has_no_children() {
        let ledger = ReleaseLedger::with_history();
        let frame = Frame::from_handle(SyntheticFrame::acquire(
            SyntheticNode::color(1, 1, vec![0, 0, 0, 255]),
            &ledger,
        ));
        assert!(!frame.is_composite());
        assert_eq!(frame.children().count(), 0);
    }
}
