use anyhow::{anyhow, Result};

use super::baker::Baker;
use super::state::RetainedState;

/// Fixed-size 2D output buffer, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeMap<T> {
    width: u32,
    height: u32,
    texels: Vec<T>,
}

impl<T: Copy + Default> AttributeMap<T> {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("attribute map dimensions must be non-zero"));
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| anyhow!("attribute map dimensions overflow"))?;
        Ok(Self {
            width,
            height,
            texels: vec![T::default(); len],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn texels(&self) -> &[T] {
        &self.texels
    }

    pub fn texels_mut(&mut self) -> &mut [T] {
        &mut self.texels
    }

    pub fn len(&self) -> usize {
        self.texels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texels.is_empty()
    }

    pub fn get(&self, x: u32, y: u32) -> Option<T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.texels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }
}

/// Output buffers the bake writes into.
#[derive(Clone, Debug, PartialEq)]
pub struct BakeTargets {
    /// Per-point color sampled from the color frame.
    pub color_map: AttributeMap<[u8; 4]>,
    /// Per-point position; `w` is 1.0 for occupied texels.
    pub position_map: AttributeMap<[f32; 4]>,
}

impl BakeTargets {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            color_map: AttributeMap::new(width, height)?,
            position_map: AttributeMap::new(width, height)?,
        })
    }
}

/// Counters for the CPU baker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BakeStats {
    pub bakes: u64,
    /// Texels written from a point in the most recent bake.
    pub occupied_texels: usize,
    /// Points that did not fit into the maps in the most recent bake.
    pub dropped_points: usize,
}

/// Reference baker: one point per texel, color sampled at the point's UV.
#[derive(Default)]
pub struct CpuBaker {
    stats: BakeStats,
}

impl CpuBaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> BakeStats {
        self.stats
    }
}

impl Baker for CpuBaker {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn bake(&mut self, state: &RetainedState, targets: &mut BakeTargets) -> Result<()> {
        if targets.color_map.len() != targets.position_map.len() {
            return Err(anyhow!("color and position maps differ in size"));
        }
        let capacity = targets.position_map.len();
        let points = state.points.as_ref();
        let point_count = points.map_or(0, |cloud| cloud.len());
        let occupied = point_count.min(capacity);

        let positions = targets.position_map.texels_mut();
        for (i, texel) in positions.iter_mut().enumerate() {
            *texel = match points.and_then(|cloud| cloud.vertices.get(i)) {
                Some(&[x, y, z]) => [x, y, z, 1.0],
                _ => [0.0; 4],
            };
        }

        let colors = targets.color_map.texels_mut();
        for (i, texel) in colors.iter_mut().enumerate() {
            let uv = points.and_then(|cloud| cloud.uvs.get(i));
            *texel = match (state.color.as_ref(), uv) {
                (Some(image), Some(&uv)) => image.sample(uv).unwrap_or([0; 4]),
                _ => [0; 4],
            };
        }

        self.stats.bakes += 1;
        self.stats.occupied_texels = occupied;
        self.stats.dropped_points = point_count - occupied;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bake::state::{ColorImage, PointCloud};

    fn state(
        points: Vec<[f32; 3]>,
        uvs: Vec<[f32; 2]>,
        color: Option<ColorImage>,
    ) -> RetainedState {
        RetainedState {
            points: Some(PointCloud {
                vertices: points,
                uvs,
            }),
            color,
            ..RetainedState::default()
        }
    }

    #[test]
    fn rejects_zero_sized_maps() {
        assert!(BakeTargets::new(0, 4).is_err());
        assert!(AttributeMap::<u8>::new(4, 0).is_err());
    }

    #[test]
    fn empty_state_bakes_zeroed_maps() {
        let mut baker = CpuBaker::new();
        let mut targets = BakeTargets::new(2, 2).expect("targets");
        targets.position_map.texels_mut()[0] = [1.0; 4];

        baker
            .bake(&RetainedState::default(), &mut targets)
            .expect("bake");

        assert!(targets.position_map.texels().iter().all(|t| *t == [0.0; 4]));
        assert!(targets.color_map.texels().iter().all(|t| *t == [0; 4]));
        assert_eq!(baker.stats().bakes, 1);
    }

    #[test]
    fn writes_positions_and_sampled_colors() {
        let color = ColorImage {
            width: 2,
            height: 1,
            rgba: vec![255, 0, 0, 255, 0, 255, 0, 255],
        };
        let state = state(
            vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
            vec![[0.0, 0.0], [0.99, 0.0]],
            Some(color),
        );
        let mut baker = CpuBaker::new();
        let mut targets = BakeTargets::new(2, 2).expect("targets");

        baker.bake(&state, &mut targets).expect("bake");

        assert_eq!(targets.position_map.get(0, 0), Some([1.0, 2.0, 3.0, 1.0]));
        assert_eq!(targets.position_map.get(1, 0), Some([4.0, 5.0, 6.0, 1.0]));
        assert_eq!(targets.position_map.get(0, 1), Some([0.0; 4]));
        assert_eq!(targets.color_map.get(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(targets.color_map.get(1, 0), Some([0, 255, 0, 255]));
        assert_eq!(baker.stats().occupied_texels, 2);
    }

    #[test]
    fn positions_bake_without_color() {
        let state = state(vec![[1.0, 1.0, 1.0]], vec![[0.5, 0.5]], None);
        let mut baker = CpuBaker::new();
        let mut targets = BakeTargets::new(1, 1).expect("targets");

        baker.bake(&state, &mut targets).expect("bake");

        assert_eq!(targets.position_map.get(0, 0), Some([1.0, 1.0, 1.0, 1.0]));
        assert_eq!(targets.color_map.get(0, 0), Some([0; 4]));
    }

    #[test]
    fn excess_points_are_dropped() {
        let state = state(vec![[0.5; 3]; 5], vec![], None);
        let mut baker = CpuBaker::new();
        let mut targets = BakeTargets::new(2, 1).expect("targets");

        baker.bake(&state, &mut targets).expect("bake");

        assert_eq!(baker.stats().occupied_texels, 2);
        assert_eq!(baker.stats().dropped_points, 3);
    }
}
