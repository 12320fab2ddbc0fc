pub mod backend;
pub mod cambi;
pub mod edge;
pub mod gmsd;
pub mod hash;
pub mod learned;
pub mod mdsi;
pub mod psnr;
pub mod ssim;
pub mod stats;
pub mod texture;
pub mod vif;

use std::sync::Arc;

use ndarray::Array2;
use tracing::debug;

use crate::error::{MetricError, Result};
use crate::frame::{Frame, PixelLayout, PropValue};
use crate::scored::ScoredSequence;
use crate::sequence::{FrameSource, Sequence};
use crate::validate::{validate, validate_pair, LayoutSet};

pub use backend::{BackendMetric, ScoringBackend};
pub use cambi::{Cambi, CambiParams};
pub use edge::Edge;
pub use gmsd::Gmsd;
pub use hash::PerceptualHash;
pub use learned::{
    Dataset, InferenceBackend, LearnedQuality, ModelLoader, ModelSpec, PoolingMethod,
};
pub use mdsi::Mdsi;
pub use psnr::{Psnr, PsnrWeights};
pub use ssim::Ssim;
pub use stats::{Comparison, PlaneComparison, PlaneStatistics, Statistic};
pub use texture::{Blur, Glcm, LbpMethod, LocalBinaryPattern, Sharpness, Svd};
pub use vif::Vif;

/// A quality metric: validates its inputs and annotates frames with scores.
pub trait Metric: Send + Sync {
    fn name(&self) -> &str;

    /// Layouts this metric accepts.
    fn formats(&self) -> LayoutSet;

    /// Metadata keys written on each output frame for inputs of `layout`.
    fn props(&self, layout: PixelLayout) -> Result<Vec<String>>;

    /// Names accepted by [`ScoredSequence::auxiliary`].
    fn auxiliary_outputs(&self) -> &[&'static str] {
        &[]
    }

    /// Whether a distorted sequence must accompany the reference.
    fn requires_reference(&self) -> bool;

    fn compute(&self, reference: &Sequence, distorted: Option<&Sequence>)
        -> Result<ScoredSequence>;
}

/// Scores and named maps for one frame (or frame pair).
#[derive(Debug, Default)]
pub struct FrameScore {
    pub props: Vec<(String, PropValue)>,
    pub maps: Vec<(&'static str, Array2<f32>)>,
}

impl FrameScore {
    pub fn prop(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.push((key.into(), value.into()));
        self
    }

    pub fn map(mut self, name: &'static str, data: Array2<f32>) -> Self {
        self.maps.push((name, data));
        self
    }
}

/// Per-frame computation behind a metric.
///
/// `distorted` is `None` for no-reference metrics. Maps are only needed when
/// `want_maps` is set; scorers may skip building them otherwise.
pub trait FrameScorer: Send + Sync {
    fn score(&self, reference: &Frame, distorted: Option<&Frame>, want_maps: bool)
        -> Result<FrameScore>;

    /// Shape `(height, width)` of map `name` for `width` x `height` input.
    fn map_shape(&self, _name: &str, width: usize, height: usize) -> (usize, usize) {
        (height, width)
    }
}

/// Resolve the inputs of `metric`: validate layouts and, for full-reference
/// metrics, require and check the distorted sequence.
///
/// No-reference metrics analyze `distorted` when it is given, else `reference`.
pub(crate) fn resolve_inputs(
    metric: &dyn Metric,
    reference: &Sequence,
    distorted: Option<&Sequence>,
) -> Result<(Sequence, Option<Sequence>)> {
    let formats = metric.formats();
    if metric.requires_reference() {
        let distorted = distorted.ok_or_else(|| MetricError::MissingInput {
            metric: metric.name().to_string(),
        })?;
        validate(reference, &formats)?;
        validate(distorted, &formats)?;
        validate_pair(reference, distorted)?;
        Ok((reference.clone(), Some(distorted.clone())))
    } else {
        let subject = distorted.unwrap_or(reference);
        validate(subject, &formats)?;
        Ok((subject.clone(), None))
    }
}

/// Layout of the analyzed input after validating `metric`'s inputs.
pub(crate) fn input_layout(
    metric: &dyn Metric,
    reference: &Sequence,
    distorted: Option<&Sequence>,
) -> Result<PixelLayout> {
    let (subject, _) = resolve_inputs(metric, reference, distorted)?;
    Ok(subject.layout())
}

/// Standard `compute` body: validate, name the props, and wrap the scorer in
/// lazy primary and auxiliary sequences.
pub(crate) fn compute_with(
    metric: &dyn Metric,
    scorer: Arc<dyn FrameScorer>,
    reference: &Sequence,
    distorted: Option<&Sequence>,
) -> Result<ScoredSequence> {
    let (reference, distorted) = resolve_inputs(metric, reference, distorted)?;
    if reference.is_empty() {
        return Err(MetricError::EmptySequence);
    }
    let props = metric.props(reference.layout())?;
    debug!(
        metric = metric.name(),
        input = %reference.describe(),
        props = ?props,
        "Dispatching metric"
    );

    let inputs = Arc::new(ScoredInputs {
        metric: metric.name().to_string(),
        scorer,
        reference,
        distorted,
    });
    let primary = Sequence::new(PrimaryOutput {
        inputs: inputs.clone(),
    });
    let mut scored = ScoredSequence::new(metric.name(), props, primary);
    for &name in metric.auxiliary_outputs() {
        let (height, width) =
            inputs
                .scorer
                .map_shape(name, inputs.reference.width(), inputs.reference.height());
        scored = scored.with_auxiliary(
            name,
            Sequence::new(AuxiliaryOutput {
                inputs: inputs.clone(),
                name,
                width,
                height,
            }),
        );
    }
    Ok(scored)
}

struct ScoredInputs {
    metric: String,
    scorer: Arc<dyn FrameScorer>,
    reference: Sequence,
    distorted: Option<Sequence>,
}

impl ScoredInputs {
    fn score(&self, index: usize, want_maps: bool) -> Result<(Frame, FrameScore)> {
        let reference = self.reference.frame(index)?;
        match &self.distorted {
            Some(distorted) => {
                let distorted = distorted.frame(index)?;
                let score = self.scorer.score(&reference, Some(&distorted), want_maps)?;
                Ok((distorted, score))
            }
            None => {
                let score = self.scorer.score(&reference, None, want_maps)?;
                Ok((reference, score))
            }
        }
    }
}

/// The annotated input: distorted frames for full-reference metrics, the
/// analyzed frames otherwise.
struct PrimaryOutput {
    inputs: Arc<ScoredInputs>,
}

impl FrameSource for PrimaryOutput {
    fn len(&self) -> usize {
        self.inputs.reference.len()
    }

    fn width(&self) -> usize {
        self.output().width()
    }

    fn height(&self) -> usize {
        self.output().height()
    }

    fn layout(&self) -> PixelLayout {
        self.output().layout()
    }

    fn frame(&self, index: usize) -> Result<Frame> {
        let (mut frame, score) = self.inputs.score(index, false)?;
        for (key, value) in score.props {
            frame.set_prop(key, value);
        }
        Ok(frame)
    }
}

impl PrimaryOutput {
    fn output(&self) -> &Sequence {
        self.inputs
            .distorted
            .as_ref()
            .unwrap_or(&self.inputs.reference)
    }
}

/// One named map per frame, as a GRAYS sequence.
struct AuxiliaryOutput {
    inputs: Arc<ScoredInputs>,
    name: &'static str,
    width: usize,
    height: usize,
}

impl FrameSource for AuxiliaryOutput {
    fn len(&self) -> usize {
        self.inputs.reference.len()
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn layout(&self) -> PixelLayout {
        PixelLayout::GRAYS
    }

    fn frame(&self, index: usize) -> Result<Frame> {
        let (_, score) = self.inputs.score(index, true)?;
        let map = score
            .maps
            .into_iter()
            .find(|(name, _)| *name == self.name)
            .map(|(_, data)| data)
            .ok_or_else(|| MetricError::NoSuchAuxiliaryOutput {
                metric: self.inputs.metric.clone(),
                name: self.name.to_string(),
            })?;
        let mut frame = Frame::gray(map);
        for (key, value) in score.props {
            frame.set_prop(key, value);
        }
        Ok(frame)
    }
}

/// Requested planes, defaulting to every plane of `layout`.
pub(crate) fn resolve_planes(requested: Option<&[usize]>, layout: PixelLayout) -> Vec<usize> {
    match requested {
        Some(planes) => planes.to_vec(),
        None => (0..layout.num_planes()).collect(),
    }
}

/// Plane as f64 on the 0-255 scale.
pub(crate) fn to_8bit_scale(plane: &Array2<f32>) -> Array2<f64> {
    plane.mapv(|v| v as f64 * 255.0)
}

/// Automatic downsampling factor used by SSIM and MDSI.
pub(crate) fn auto_downsample_factor(width: usize, height: usize) -> usize {
    let f = (width.min(height) as f64 / crate::consts::AUTO_DOWNSAMPLE_TARGET).round() as usize;
    f.max(1)
}
