use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::consts::{DEFAULT_MAX_BATCH_SIZE, MODEL_BLOCK_SIZE};
use crate::error::{MetricError, Result};
use crate::filters::ResampleFilter;
use crate::frame::{Frame, PixelLayout};
use crate::scored::ScoredSequence;
use crate::sequence::{FrameSource, Sequence};
use crate::validate::{validate, validate_pair, LayoutSet};

use super::Metric;

const KEY: &str = "wadiqam";

/// Training set the model weights were fitted on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    #[default]
    Tid,
    Live,
}

/// How the model pools patch scores into a frame score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolingMethod {
    #[default]
    Patchwise,
    Weighted,
}

/// What a [`ModelLoader`] is asked to load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelSpec {
    pub dataset: Dataset,
    pub method: PoolingMethod,
}

/// A loaded model. Shared read-only across concurrent frame requests.
pub trait InferenceBackend: Send + Sync {
    /// One score per frame of the batch. `distorted`, when given, pairs
    /// index-for-index with `reference`.
    fn infer(&self, reference: &[Frame], distorted: Option<&[Frame]>) -> Result<Vec<f64>>;
}

/// Opens model weights from a directory.
pub trait ModelLoader: Send + Sync {
    fn load(&self, path: &Path, spec: &ModelSpec) -> Result<Arc<dyn InferenceBackend>>;
}

/// Learned image-quality model, full-reference when a distorted sequence is
/// given and no-reference otherwise.
///
/// Weights are loaded on the first `compute` and reused for the lifetime of
/// the metric.
pub struct LearnedQuality {
    pub model_path: Option<PathBuf>,
    pub dataset: Dataset,
    pub method: PoolingMethod,
    pub max_batch_size: usize,
    loader: Arc<dyn ModelLoader>,
    model: Mutex<Option<Arc<dyn InferenceBackend>>>,
}

impl fmt::Debug for LearnedQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LearnedQuality")
            .field("model_path", &self.model_path)
            .field("dataset", &self.dataset)
            .field("method", &self.method)
            .field("max_batch_size", &self.max_batch_size)
            .finish()
    }
}

impl LearnedQuality {
    pub fn new(loader: impl ModelLoader + 'static) -> Self {
        Self {
            model_path: None,
            dataset: Dataset::default(),
            method: PoolingMethod::default(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            loader: Arc::new(loader),
            model: Mutex::new(None),
        }
    }

    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    pub fn with_dataset(mut self, dataset: Dataset) -> Self {
        self.dataset = dataset;
        self
    }

    pub fn with_method(mut self, method: PoolingMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    fn model(&self) -> Result<Arc<dyn InferenceBackend>> {
        let path = self
            .model_path
            .as_deref()
            .ok_or_else(|| MetricError::MissingConfiguration {
                metric: KEY.to_string(),
                what: "model_path".to_string(),
            })?;
        let mut slot = self.model.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(model) = slot.as_ref() {
            return Ok(model.clone());
        }
        let spec = ModelSpec {
            dataset: self.dataset,
            method: self.method,
        };
        let model = self.loader.load(path, &spec)?;
        info!(path = %path.display(), ?spec, "Loaded quality model");
        *slot = Some(model.clone());
        Ok(model)
    }
}

/// Smallest multiples of [`MODEL_BLOCK_SIZE`] covering `width` x `height`.
pub fn padded_dimensions(width: usize, height: usize) -> (usize, usize) {
    let up = |v: usize| v.div_ceil(MODEL_BLOCK_SIZE).max(1) * MODEL_BLOCK_SIZE;
    (up(width), up(height))
}

fn prepare(sequence: &Sequence) -> Result<Sequence> {
    let (width, height) = padded_dimensions(sequence.width(), sequence.height());
    if (width, height) == (sequence.width(), sequence.height()) {
        return Ok(sequence.clone());
    }
    sequence.resize(width, height, ResampleFilter::Lanczos3)
}

impl Metric for LearnedQuality {
    fn name(&self) -> &str {
        KEY
    }

    fn formats(&self) -> LayoutSet {
        LayoutSet::from([
            PixelLayout::RGB24,
            PixelLayout::RGB30,
            PixelLayout::RGB48,
            PixelLayout::RGBS,
        ])
    }

    fn props(&self, _layout: PixelLayout) -> Result<Vec<String>> {
        Ok(vec![KEY.to_string()])
    }

    fn requires_reference(&self) -> bool {
        false
    }

    fn compute(
        &self,
        reference: &Sequence,
        distorted: Option<&Sequence>,
    ) -> Result<ScoredSequence> {
        if self.max_batch_size == 0 {
            return Err(MetricError::InvalidParameter(
                "max_batch_size must be positive".to_string(),
            ));
        }
        let formats = self.formats();
        validate(reference, &formats)?;
        if let Some(distorted) = distorted {
            validate(distorted, &formats)?;
            validate_pair(reference, distorted)?;
        }
        if reference.is_empty() {
            return Err(MetricError::EmptySequence);
        }
        let model = self.model()?;

        let batches = reference.len().div_ceil(self.max_batch_size);
        debug!(
            input = %reference.describe(),
            full_reference = distorted.is_some(),
            batches,
            "Dispatching learned quality model"
        );
        let source = BatchedScores {
            output: distorted.unwrap_or(reference).clone(),
            reference: prepare(reference)?,
            distorted: distorted.map(prepare).transpose()?,
            model,
            batch_size: self.max_batch_size,
            cache: (0..batches).map(|_| Mutex::new(None)).collect(),
        };
        Ok(ScoredSequence::new(
            KEY,
            vec![KEY.to_string()],
            Sequence::new(source),
        ))
    }
}

/// Scores frames batch by batch; every frame of a batch is served from one
/// inference call.
struct BatchedScores {
    output: Sequence,
    reference: Sequence,
    distorted: Option<Sequence>,
    model: Arc<dyn InferenceBackend>,
    batch_size: usize,
    cache: Vec<Mutex<Option<Arc<Vec<f64>>>>>,
}

impl BatchedScores {
    fn batch(&self, batch: usize) -> Result<Arc<Vec<f64>>> {
        let slot = self
            .cache
            .get(batch)
            .ok_or(MetricError::FrameIndexOutOfRange {
                index: batch * self.batch_size,
                total: self.output.len(),
            })?;
        let mut slot = slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(scores) = slot.as_ref() {
            return Ok(scores.clone());
        }

        let start = batch * self.batch_size;
        let end = (start + self.batch_size).min(self.reference.len());
        let reference: Vec<Frame> = (start..end)
            .map(|i| self.reference.frame(i))
            .collect::<Result<_>>()?;
        let distorted: Option<Vec<Frame>> = self
            .distorted
            .as_ref()
            .map(|d| (start..end).map(|i| d.frame(i)).collect::<Result<_>>())
            .transpose()?;

        let scores = self.model.infer(&reference, distorted.as_deref())?;
        if scores.len() != reference.len() {
            return Err(MetricError::Backend(format!(
                "model returned {} scores for a batch of {}",
                scores.len(),
                reference.len()
            )));
        }
        let scores = Arc::new(scores);
        *slot = Some(scores.clone());
        Ok(scores)
    }
}

impl FrameSource for BatchedScores {
    fn len(&self) -> usize {
        self.output.len()
    }

    fn width(&self) -> usize {
        self.output.width()
    }

    fn height(&self) -> usize {
        self.output.height()
    }

    fn layout(&self) -> PixelLayout {
        self.output.layout()
    }

    fn frame(&self, index: usize) -> Result<Frame> {
        let mut frame = self.output.frame(index)?;
        let scores = self.batch(index / self.batch_size)?;
        frame.set_prop(KEY, scores[index % self.batch_size]);
        Ok(frame)
    }
}
