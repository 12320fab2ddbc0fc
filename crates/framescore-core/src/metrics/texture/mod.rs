//! No-reference texture descriptors.

pub mod blur;
pub mod glcm;
pub mod lbp;
pub mod sharpness;
pub mod svd;

use ndarray::Array2;

use crate::error::Result;
use crate::frame::{Frame, PixelLayout};
use crate::metrics::{resolve_planes, FrameScore, FrameScorer};
use crate::naming::expand;

pub use blur::Blur;
pub use glcm::Glcm;
pub use lbp::{LbpMethod, LocalBinaryPattern};
pub use sharpness::Sharpness;
pub use svd::Svd;

/// A set of scalar descriptors computed independently on each plane.
pub(crate) trait PlaneDescriptor: Send + Sync {
    /// Base key names, one per value returned by `describe`.
    fn base_names(&self) -> &[&'static str];

    fn describe(&self, plane: &Array2<f32>) -> Vec<f64>;
}

/// Runs a [`PlaneDescriptor`] over the requested planes of each frame and
/// lays the values out in [`expand`] order (base outer, plane inner).
pub(crate) struct PlaneScorer<D> {
    descriptor: D,
    planes: Vec<usize>,
    keys: Vec<String>,
}

impl<D: PlaneDescriptor> PlaneScorer<D> {
    pub(crate) fn new(
        descriptor: D,
        requested: Option<&[usize]>,
        layout: PixelLayout,
    ) -> Result<Self> {
        let mut planes = resolve_planes(requested, layout);
        planes.sort_unstable();
        planes.dedup();
        let keys = expand(descriptor.base_names(), layout, &planes)?;
        Ok(Self {
            descriptor,
            planes,
            keys,
        })
    }
}

impl<D: PlaneDescriptor> FrameScorer for PlaneScorer<D> {
    fn score(&self, reference: &Frame, _: Option<&Frame>, _: bool) -> Result<FrameScore> {
        let per_plane: Vec<Vec<f64>> = self
            .planes
            .iter()
            .map(|&p| self.descriptor.describe(reference.plane(p)))
            .collect();
        let bases = self.descriptor.base_names().len();
        let mut score = FrameScore::default();
        for b in 0..bases {
            for (i, values) in per_plane.iter().enumerate() {
                let key = &self.keys[b * self.planes.len() + i];
                score = score.prop(key.clone(), values[b]);
            }
        }
        Ok(score)
    }
}
