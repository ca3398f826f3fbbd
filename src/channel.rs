use crate::classify::StreamSelector;
use crate::frame::{PixelFormat, StreamKind};

/// Logical stream category with its own selector and hand-off queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Color-like data (RGBA texels).
    Color,
    /// Geometry-like data (point cloud vertices).
    Geometry,
}

impl Channel {
    /// Every channel, in tick processing order.
    pub const ALL: [Channel; 2] = [Channel::Color, Channel::Geometry];

    pub fn name(self) -> &'static str {
        match self {
            Channel::Color => "color",
            Channel::Geometry => "geometry",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Channel::Color => 0,
            Channel::Geometry => 1,
        }
    }

    /// Selector used when configuration does not override it.
    pub fn default_selector(self) -> StreamSelector {
        match self {
            Channel::Color => StreamSelector {
                kind: Some(StreamKind::Color),
                format: Some(PixelFormat::Rgba8),
                index: Some(0),
            },
            Channel::Geometry => StreamSelector {
                kind: None,
                format: Some(PixelFormat::Xyz32f),
                index: None,
            },
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
