use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::frame::{Frame, PixelLayout};
use crate::scored::ScoredSequence;
use crate::sequence::Sequence;
use crate::validate::LayoutSet;

use super::{compute_with, FrameScore, FrameScorer, Metric};

/// An external scorer treated as a pure function of one or two frames.
///
/// Implementations must be deterministic; errors are propagated as-is and
/// never retried.
pub trait ScoringBackend: Send + Sync {
    fn name(&self) -> &str;

    fn formats(&self) -> LayoutSet;

    /// Keys returned by `score` for inputs of `layout`.
    fn props(&self, layout: PixelLayout) -> Result<Vec<String>>;

    fn full_reference(&self) -> bool;

    fn score(&self, reference: &Frame, distorted: Option<&Frame>) -> Result<Vec<(String, f64)>>;
}

/// Adapts any [`ScoringBackend`] to the [`Metric`] interface.
#[derive(Clone)]
pub struct BackendMetric {
    backend: Arc<dyn ScoringBackend>,
}

impl fmt::Debug for BackendMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendMetric")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl BackendMetric {
    pub fn new(backend: impl ScoringBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn from_arc(backend: Arc<dyn ScoringBackend>) -> Self {
        Self { backend }
    }
}

impl Metric for BackendMetric {
    fn name(&self) -> &str {
        self.backend.name()
    }

    fn formats(&self) -> LayoutSet {
        self.backend.formats()
    }

    fn props(&self, layout: PixelLayout) -> Result<Vec<String>> {
        self.backend.props(layout)
    }

    fn requires_reference(&self) -> bool {
        self.backend.full_reference()
    }

    fn compute(
        &self,
        reference: &Sequence,
        distorted: Option<&Sequence>,
    ) -> Result<ScoredSequence> {
        let scorer = BackendScorer {
            backend: self.backend.clone(),
        };
        compute_with(self, Arc::new(scorer), reference, distorted)
    }
}

struct BackendScorer {
    backend: Arc<dyn ScoringBackend>,
}

impl FrameScorer for BackendScorer {
    fn score(&self, reference: &Frame, distorted: Option<&Frame>, _: bool) -> Result<FrameScore> {
        let values = self.backend.score(reference, distorted)?;
        Ok(values
            .into_iter()
            .fold(FrameScore::default(), |score, (key, value)| score.prop(key, value)))
    }
}
