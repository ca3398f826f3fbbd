use anyhow::{anyhow, Result};

use crate::channel::Channel;
use crate::frame::{Frame, FrameHandle, FramePayload};

/// Copy of the most recently loaded color frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColorImage {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8, row-major.
    pub rgba: Vec<u8>,
}

impl ColorImage {
    /// Nearest-neighbour sample at normalized coordinates.
    ///
    /// Returns `None` for coordinates outside `[0, 1]`.
    pub fn sample(&self, uv: [f32; 2]) -> Option<[u8; 4]> {
        let [u, v] = uv;
        if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) {
            return None;
        }
        let x = ((u * self.width as f32) as u32).min(self.width.saturating_sub(1));
        let y = ((v * self.height as f32) as u32).min(self.height.saturating_sub(1));
        let offset = ((y as usize) * (self.width as usize) + x as usize) * 4;
        let texel = self.rgba.get(offset..offset + 4)?;
        Some([texel[0], texel[1], texel[2], texel[3]])
    }
}

/// Copy of the most recently loaded point cloud.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointCloud {
    pub vertices: Vec<[f32; 3]>,
    /// Per-vertex color texture coordinates. Empty when the source has none.
    pub uvs: Vec<[f32; 2]>,
}

impl PointCloud {
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

/// Per-channel data carried across ticks until superseded.
///
/// Holds copies only, never frame handles, so nothing here needs releasing.
#[derive(Clone, Debug, Default)]
pub struct RetainedState {
    pub color: Option<ColorImage>,
    pub points: Option<PointCloud>,
    pub color_updates: u64,
    pub points_updates: u64,
}

impl RetainedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy what `channel` needs out of `frame`.
    ///
    /// The payload is validated before anything is overwritten: on error the
    /// previous state is left intact. The frame itself is never kept.
    pub fn load<H: FrameHandle>(&mut self, channel: Channel, frame: &Frame<H>) -> Result<()> {
        match (channel, frame.payload()) {
            (
                Channel::Color,
                FramePayload::Color {
                    width,
                    height,
                    rgba,
                },
            ) => {
                if width == 0 || height == 0 {
                    return Err(anyhow!("color frame has zero dimensions"));
                }
                let expected = (width as usize)
                    .checked_mul(height as usize)
                    .and_then(|v| v.checked_mul(4))
                    .ok_or_else(|| anyhow!("color frame dimensions overflow"))?;
                if rgba.len() != expected {
                    return Err(anyhow!(
                        "color frame length mismatch: expected {}, got {}",
                        expected,
                        rgba.len()
                    ));
                }
                let image = self.color.get_or_insert_with(ColorImage::default);
                image.width = width;
                image.height = height;
                image.rgba.clear();
                image.rgba.extend_from_slice(rgba);
                self.color_updates += 1;
                Ok(())
            }
            (Channel::Geometry, FramePayload::Points { vertices, uvs }) => {
                if !uvs.is_empty() && uvs.len() != vertices.len() {
                    return Err(anyhow!(
                        "point frame uv count mismatch: {} vertices, {} uvs",
                        vertices.len(),
                        uvs.len()
                    ));
                }
                let cloud = self.points.get_or_insert_with(PointCloud::default);
                cloud.vertices.clear();
                cloud.vertices.extend_from_slice(vertices);
                cloud.uvs.clear();
                cloud.uvs.extend_from_slice(uvs);
                self.points_updates += 1;
                Ok(())
            }
            (channel, payload) => Err(anyhow!(
                "{} channel cannot load {:?} frame ({})",
                channel,
                frame.descriptor().format,
                payload_name(&payload)
            )),
        }
    }
}

fn payload_name(payload: &FramePayload<'_>) -> &'static str {
    match payload {
        FramePayload::Empty => "no payload",
        FramePayload::Color { .. } => "color payload",
        FramePayload::Points { .. } => "point payload",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{PixelFormat, StreamDescriptor, StreamKind};
    use crate::ingest::synthetic::{ReleaseLedger, SyntheticFrame, SyntheticNode};

    fn frame(node: SyntheticNode, ledger: &ReleaseLedger) -> Frame<SyntheticFrame> {
        Frame::from_handle(SyntheticFrame::acquire(node, ledger))
    }

    #[test]
    fn loads_color_without_keeping_frame() {
        let ledger = ReleaseLedger::new();
        let mut state = RetainedState::new();
        let color = frame(SyntheticNode::color(1, 1, vec![1, 2, 3, 4]), &ledger);

        state.load(Channel::Color, &color).expect("load color");
        drop(color);

        assert!(ledger.is_balanced());
        let image = state.color.as_ref().expect("color image");
        assert_eq!(image.rgba, vec![1, 2, 3, 4]);
        assert_eq!(state.color_updates, 1);
        assert!(state.points.is_none());
    }

    #[test]
    fn rejected_load_keeps_previous_state() {
        let ledger = ReleaseLedger::new();
        let mut state = RetainedState::new();
        let good = frame(SyntheticNode::color(1, 1, vec![9, 9, 9, 9]), &ledger);
        state.load(Channel::Color, &good).expect("load color");

        let truncated = frame(SyntheticNode::color(2, 2, vec![0; 4]), &ledger);
        assert!(state.load(Channel::Color, &truncated).is_err());

        let image = state.color.as_ref().expect("color image");
        assert_eq!((image.width, image.height), (1, 1));
        assert_eq!(image.rgba, vec![9, 9, 9, 9]);
        assert_eq!(state.color_updates, 1);
    }

    #[test]
    fn wrong_payload_for_channel_is_rejected() {
        let ledger = ReleaseLedger::new();
        let mut state = RetainedState::new();
        let color = frame(SyntheticNode::color(1, 1, vec![0; 4]), &ledger);
        let descriptor = StreamDescriptor::new(StreamKind::Depth, PixelFormat::Xyz32f, 0);
        let empty = frame(SyntheticNode::leaf(descriptor), &ledger);

        assert!(state.load(Channel::Geometry, &color).is_err());
        assert!(state.load(Channel::Geometry, &empty).is_err());
        assert!(state.points.is_none());
    }

    #[test]
    fn points_with_mismatched_uvs_are_rejected() {
        let ledger = ReleaseLedger::new();
        let mut state = RetainedState::new();
        let points = frame(
            SyntheticNode::points(vec![[0.0; 3], [1.0; 3]], vec![[0.0; 2]]),
            &ledger,
        );
        assert!(state.load(Channel::Geometry, &points).is_err());

        let no_uvs = frame(SyntheticNode::points(vec![[0.0; 3]], vec![]), &ledger);
        state.load(Channel::Geometry, &no_uvs).expect("load points");
        assert_eq!(state.points.as_ref().map(PointCloud::len), Some(1));
    }

    #[test]
    fn color_sample_uses_nearest_texel() {
        let image = ColorImage {
            width: 2,
            height: 1,
            rgba: vec![255, 0, 0, 255, 0, 0, 255, 255],
        };
        assert_eq!(image.sample([0.1, 0.5]), Some([255, 0, 0, 255]));
        assert_eq!(image.sample([0.9, 0.5]), Some([0, 0, 255, 255]));
        assert_eq!(image.sample([1.0, 1.0]), Some([0, 0, 255, 255]));
        assert_eq!(image.sample([-0.1, 0.5]), None);
    }
}
