//! Pre-processing before a metric runs, and post-processing of metric maps.

use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::consts::{
    BANDING_SMOOTHING_KERNEL, DIMENSION_ALIGNMENT, MIN_TILE_HEIGHT, MIN_TILE_WIDTH,
};
use crate::error::{MetricError, Result};
use crate::filters::convolve::convolve_3x3;
use crate::filters::{resize_plane, ResampleFilter};
use crate::frame::{Frame, PixelLayout, SampleType};
use crate::metrics::{Cambi, CambiParams, Metric};
use crate::scored::ScoredSequence;
use crate::sequence::Sequence;
use crate::validate::{validate, validate_pair};

/// Spatial (or spatio-temporal) reduction applied to both inputs before
/// comparing them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Reduction {
    /// Strip `percentage` of each dimension, half from each side.
    Crop {
        #[serde(default = "default_crop")]
        percentage: u32,
    },
    /// Lanczos downscale by `percentage` of each dimension.
    Downsample {
        #[serde(default = "default_downsample")]
        percentage: u32,
    },
    /// Split every `frame_step`-th frame into `chunks` x `chunks` tiles, one
    /// tile per output frame.
    Hybrid {
        #[serde(default = "default_chunks")]
        chunks: usize,
        #[serde(default = "default_frame_step")]
        frame_step: usize,
    },
}

fn default_crop() -> u32 {
    25
}

fn default_downsample() -> u32 {
    50
}

fn default_chunks() -> usize {
    4
}

fn default_frame_step() -> usize {
    1
}

impl Reduction {
    pub fn crop() -> Self {
        Reduction::Crop {
            percentage: default_crop(),
        }
    }

    pub fn downsample() -> Self {
        Reduction::Downsample {
            percentage: default_downsample(),
        }
    }

    pub fn hybrid() -> Self {
        Reduction::Hybrid {
            chunks: default_chunks(),
            frame_step: default_frame_step(),
        }
    }

    /// Apply the reduction to one sequence.
    pub fn apply(&self, sequence: &Sequence) -> Result<Sequence> {
        let (width, height) = (sequence.width(), sequence.height());
        match *self {
            Reduction::Crop { percentage } => {
                check_percentage(percentage)?;
                let x = align_up(width * percentage as usize / 200);
                let y = align_up(height * percentage as usize / 200);
                if 2 * x >= width || 2 * y >= height {
                    return Err(MetricError::InvalidReduction(format!(
                        "cropping {percentage}% leaves nothing of {width}x{height}"
                    )));
                }
                sequence.crop(x, y, x, y)
            }
            Reduction::Downsample { percentage } => {
                check_percentage(percentage)?;
                let w = align_down(width - 2 * (width * percentage as usize / 200));
                let h = align_down(height - 2 * (height * percentage as usize / 200));
                if w == 0 || h == 0 {
                    return Err(MetricError::InvalidReduction(format!(
                        "downsampling {width}x{height} by {percentage}% leaves nothing"
                    )));
                }
                sequence.resize(w, h, ResampleFilter::Lanczos3)
            }
            Reduction::Hybrid { chunks, frame_step } => tile(sequence, chunks, frame_step),
        }
    }
}

fn check_percentage(percentage: u32) -> Result<()> {
    if percentage >= 100 {
        return Err(MetricError::InvalidReduction(format!(
            "reduction percentage must be below 100, got {percentage}"
        )));
    }
    Ok(())
}

fn align_up(v: usize) -> usize {
    v.div_ceil(DIMENSION_ALIGNMENT) * DIMENSION_ALIGNMENT
}

fn align_down(v: usize) -> usize {
    v - v % DIMENSION_ALIGNMENT
}

/// Interleave the `chunks` x `chunks` tiles (row-major) of every
/// `frame_step`-th frame: output frame `n * chunks^2 + t` is tile `t` of
/// selected frame `n`.
fn tile(sequence: &Sequence, chunks: usize, frame_step: usize) -> Result<Sequence> {
    if chunks == 0 || frame_step == 0 {
        return Err(MetricError::InvalidReduction(format!(
            "hybrid reduction needs positive chunks and frame_step, got {chunks} and {frame_step}"
        )));
    }
    let (width, height) = (sequence.width(), sequence.height());
    // Tiles start and end on the chroma grid.
    let layout = sequence.layout();
    let step_w = 1usize << layout.subsampling_w;
    let step_h = 1usize << layout.subsampling_h;
    let tile_w = width / chunks / step_w * step_w;
    let tile_h = height / chunks / step_h * step_h;
    if tile_w < MIN_TILE_WIDTH || tile_h < MIN_TILE_HEIGHT {
        return Err(MetricError::InvalidReduction(format!(
            "{chunks} chunks ({tile_w}x{tile_h}) is too many for {width}x{height}; \
             tiles must be at least {MIN_TILE_WIDTH}x{MIN_TILE_HEIGHT}"
        )));
    }
    if tile_w * chunks != width || tile_h * chunks != height {
        warn!(
            right = width - tile_w * chunks,
            bottom = height - tile_h * chunks,
            "Hybrid tiling drops remainder pixels"
        );
    }

    let selected = sequence.select_every(frame_step, 0)?;
    let mut tiles = Vec::with_capacity(chunks * chunks);
    for row in 0..chunks {
        for col in 0..chunks {
            let (left, top) = (col * tile_w, row * tile_h);
            let right = width - left - tile_w;
            let bottom = height - top - tile_h;
            tiles.push(selected.crop(left, top, right, bottom)?);
        }
    }
    debug!(chunks, frame_step, tile_w, tile_h, "Tiled sequence");
    Sequence::interleave(&tiles)
}

/// Reduce both inputs (when asked) and run `metric` on the result.
pub fn compare(
    reference: &Sequence,
    distorted: &Sequence,
    metric: &dyn Metric,
    reduction: Option<&Reduction>,
) -> Result<ScoredSequence> {
    match reduction {
        None => metric.compute(reference, Some(distorted)),
        Some(reduction) => {
            validate_pair(reference, distorted)?;
            let reference = reduction.apply(reference)?;
            let distorted = reduction.apply(distorted)?;
            metric.compute(&reference, Some(&distorted))
        }
    }
}

/// CAMBI parameters tuned for visualizing banding.
pub fn banding_params() -> CambiParams {
    CambiParams {
        topk: 0.1,
        tvi_threshold: 0.012,
        ..CambiParams::default()
    }
}

/// Full-resolution banding visibility mask.
///
/// The five CAMBI scale maps are upsampled, combined as `sum(ln(i) * m_i)`
/// for `i = 1..=5`, square-rooted, multiplied by `ln(scale)` and smoothed
/// with a 3x3 binomial kernel. Output frames are GRAYS and carry the source
/// frame's props plus `cambi`.
pub fn banding_mask(sequence: &Sequence, scale: f64, params: CambiParams) -> Result<Sequence> {
    if scale <= 0.0 {
        return Err(MetricError::InvalidParameter(format!(
            "banding scale must be positive, got {scale}"
        )));
    }
    let layout = sequence.layout();
    let input = if layout.sample_type == SampleType::Integer && layout.bits > 10 {
        sequence.convert(layout.with_depth(SampleType::Integer, 10))?
    } else {
        sequence.clone()
    };
    let cambi = Cambi::new(params);
    validate(&input, cambi.formats())?;
    cambi.check_params()?;

    let (width, height) = (input.width(), input.height());
    let gain = scale.ln() as f32;
    Ok(input.map_frames(PixelLayout::GRAYS, move |_, frame| {
        let result = cambi.score_frame(&frame)?;
        let mut combined = Array2::<f32>::zeros((height, width));
        for (i, map) in result.maps.iter().enumerate() {
            let weight = ((i + 1) as f32).ln();
            if weight == 0.0 {
                continue;
            }
            let full = resize_plane(map, height, width, ResampleFilter::Bicubic);
            Zip::from(&mut combined)
                .and(&full)
                .for_each(|acc, &m| *acc += weight * m);
        }
        combined.mapv_inplace(|v| v.max(0.0).sqrt() * gain);
        let mut mask = Frame::gray(convolve_3x3(&combined, &BANDING_SMOOTHING_KERNEL));
        mask.props = frame.props;
        mask.set_prop("cambi", result.score);
        Ok(mask)
    }))
}
