//! Frame bundle classification.
//!
//! `classify` searches a (possibly nested) bundle for the first leaf frame a
//! `StreamSelector` accepts. Ownership rules:
//!
//! - The root is borrowed. It belongs to the caller and is never released here.
//! - Every child acquired during the walk is either returned or released
//!   once its subtree has been searched.
//! - The walk stops at the first match; later siblings are never acquired.

use serde::Deserialize;

use crate::frame::{Frame, FrameHandle, PixelFormat, StreamDescriptor, StreamKind};

/// Predicate over stream descriptors. `None` fields match anything.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct StreamSelector {
    pub kind: Option<StreamKind>,
    pub format: Option<PixelFormat>,
    pub index: Option<u32>,
}

impl StreamSelector {
    pub fn matches(&self, descriptor: &StreamDescriptor) -> bool {
        self.kind.map_or(true, |kind| kind == descriptor.kind)
            && self.format.map_or(true, |format| format == descriptor.format)
            && self.index.map_or(true, |index| index == descriptor.index)
    }

    fn accepts<H: FrameHandle>(&self, frame: &Frame<H>) -> bool {
        !frame.is_composite() && self.matches(&frame.descriptor())
    }
}

/// Find the leaf frame in `root` that `selector` accepts.
///
/// When the root itself matches, a retained reference to it is returned so
/// that the caller's own reference stays independently releasable.
pub fn classify<H: FrameHandle>(root: &Frame<H>, selector: &StreamSelector) -> Option<Frame<H>> {
    if selector.accepts(root) {
        return Some(root.retain());
    }
    search_children(root, selector)
}

fn search_children<H: FrameHandle>(
    parent: &Frame<H>,
    selector: &StreamSelector,
) -> Option<Frame<H>> {
    for child in parent.children() {
        if let Some(found) = search(child, selector) {
            return Some(found);
        }
    }
    None
}

// Consumes `frame`: either it is the match, or it is released on return.
fn search<H: FrameHandle>(frame: Frame<H>, selector: &StreamSelector) -> Option<Frame<H>> {
    if selector.accepts(&frame) {
        return Some(frame);
    }
    search_children(&frame, selector)
}
