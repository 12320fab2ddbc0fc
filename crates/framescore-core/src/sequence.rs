use std::fmt;
use std::sync::Arc;

use ndarray::s;

use crate::error::{MetricError, Result};
use crate::filters::{resize_plane, ResampleFilter};
use crate::frame::{ColorFamily, Frame, PixelLayout, SampleType};

/// A finite, randomly indexable producer of frames sharing one layout.
pub trait FrameSource: Send + Sync {
    fn len(&self) -> usize;
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn layout(&self) -> PixelLayout;
    fn frame(&self, index: usize) -> Result<Frame>;
}

/// Cheap-to-clone handle to a lazy frame sequence.
///
/// Adapters (`resize`, `crop`, `interleave`, ...) build new sequences that
/// pull from their inputs on demand; nothing is computed until a frame is
/// requested.
#[derive(Clone)]
pub struct Sequence {
    source: Arc<dyn FrameSource>,
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl Sequence {
    pub fn new(source: impl FrameSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    pub fn from_arc(source: Arc<dyn FrameSource>) -> Self {
        Self { source }
    }

    /// In-memory sequence. All frames must share layout and dimensions.
    pub fn from_frames(frames: Vec<Frame>) -> Result<Self> {
        let first = frames.first().ok_or(MetricError::EmptySequence)?;
        let (layout, width, height) = (first.layout, first.width(), first.height());
        for frame in &frames[1..] {
            if frame.layout != layout || frame.width() != width || frame.height() != height {
                return Err(MetricError::DimensionMismatch {
                    reference: format!("{width}x{height} {layout}"),
                    distorted: format!("{}x{} {}", frame.width(), frame.height(), frame.layout),
                });
            }
        }
        Ok(Self::new(FrameList {
            frames,
            layout,
            width,
            height,
        }))
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.len() == 0
    }

    pub fn width(&self) -> usize {
        self.source.width()
    }

    pub fn height(&self) -> usize {
        self.source.height()
    }

    pub fn layout(&self) -> PixelLayout {
        self.source.layout()
    }

    pub fn frame(&self, index: usize) -> Result<Frame> {
        let total = self.len();
        if index >= total {
            return Err(MetricError::FrameIndexOutOfRange { index, total });
        }
        self.source.frame(index)
    }

    /// Sequential iterator over every frame.
    pub fn frames(&self) -> impl Iterator<Item = Result<Frame>> + '_ {
        (0..self.len()).map(move |i| self.frame(i))
    }

    /// One-line summary, e.g. `640x480 YUV420P8, 50 frames`.
    pub fn describe(&self) -> String {
        format!(
            "{}x{} {}, {} frames",
            self.width(),
            self.height(),
            self.layout(),
            self.len()
        )
    }

    pub fn resize(&self, width: usize, height: usize, filter: ResampleFilter) -> Result<Sequence> {
        if width == 0 || height == 0 {
            return Err(MetricError::InvalidDimensions { width, height });
        }
        check_subsampling(self.layout(), width, height)?;
        if width == self.width() && height == self.height() {
            return Ok(self.clone());
        }
        Ok(Sequence::new(Resized {
            inner: self.clone(),
            width,
            height,
            filter,
        }))
    }

    /// Remove `left`/`top`/`right`/`bottom` pixels from the edges.
    pub fn crop(&self, left: usize, top: usize, right: usize, bottom: usize) -> Result<Sequence> {
        let (w, h) = (self.width(), self.height());
        if left + right >= w || top + bottom >= h {
            return Err(MetricError::InvalidParameter(format!(
                "crop {left},{top},{right},{bottom} leaves nothing of a {w}x{h} frame"
            )));
        }
        let layout = self.layout();
        check_subsampling(layout, left, top)?;
        let width = w - left - right;
        let height = h - top - bottom;
        check_subsampling(layout, width, height)?;
        Ok(Sequence::new(Cropped {
            inner: self.clone(),
            left,
            top,
            width,
            height,
        }))
    }

    /// Every `step`-th frame starting at `offset`.
    pub fn select_every(&self, step: usize, offset: usize) -> Result<Sequence> {
        if step == 0 || offset >= step {
            return Err(MetricError::InvalidParameter(format!(
                "select_every needs 0 <= offset < step, got step {step}, offset {offset}"
            )));
        }
        let len = (self.len() + step - 1 - offset) / step;
        Ok(Sequence::new(SelectEvery {
            inner: self.clone(),
            step,
            offset,
            len,
        }))
    }

    /// Round-robin merge: output frame `k` is frame `k / n` of input `k % n`.
    pub fn interleave(inputs: &[Sequence]) -> Result<Sequence> {
        let first = inputs.first().ok_or(MetricError::EmptySequence)?;
        for seq in &inputs[1..] {
            if seq.width() != first.width()
                || seq.height() != first.height()
                || seq.layout() != first.layout()
                || seq.len() != first.len()
            {
                return Err(MetricError::DimensionMismatch {
                    reference: first.describe(),
                    distorted: seq.describe(),
                });
            }
        }
        Ok(Sequence::new(Interleaved {
            inputs: inputs.to_vec(),
        }))
    }

    /// Change sample type / bit depth, keeping family and subsampling.
    pub fn convert(&self, target: PixelLayout) -> Result<Sequence> {
        let source = self.layout();
        if target.family != source.family
            || target.subsampling_w != source.subsampling_w
            || target.subsampling_h != source.subsampling_h
        {
            return Err(MetricError::InvalidParameter(format!(
                "cannot convert {source} to {target}: only sample format changes are supported"
            )));
        }
        if target == source {
            return Ok(self.clone());
        }
        Ok(self.map_frames(target, move |_, mut frame| {
            if target.sample_type == SampleType::Integer {
                let max = ((1u64 << target.bits) - 1) as f32;
                for plane in frame.planes.iter_mut() {
                    plane.mapv_inplace(|v| (v.clamp(0.0, 1.0) * max).round() / max);
                }
            }
            frame.layout = target;
            Ok(frame)
        }))
    }

    /// Apply `f(index, frame)` lazily. Dimensions are preserved; the output
    /// frames are expected to carry `layout`.
    pub fn map_frames<F>(&self, layout: PixelLayout, f: F) -> Sequence
    where
        F: Fn(usize, Frame) -> Result<Frame> + Send + Sync + 'static,
    {
        Sequence::new(Mapped {
            inner: self.clone(),
            layout,
            f: Box::new(f),
        })
    }
}

fn check_subsampling(layout: PixelLayout, width: usize, height: usize) -> Result<()> {
    if layout.family != ColorFamily::Yuv {
        return Ok(());
    }
    let mod_w = 1usize << layout.subsampling_w;
    let mod_h = 1usize << layout.subsampling_h;
    if width % mod_w != 0 || height % mod_h != 0 {
        return Err(MetricError::InvalidParameter(format!(
            "{width}x{height} is not aligned to the {layout} chroma grid ({mod_w}x{mod_h})"
        )));
    }
    Ok(())
}

struct FrameList {
    frames: Vec<Frame>,
    layout: PixelLayout,
    width: usize,
    height: usize,
}

impl FrameSource for FrameList {
    fn len(&self) -> usize {
        self.frames.len()
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn layout(&self) -> PixelLayout {
        self.layout
    }

    fn frame(&self, index: usize) -> Result<Frame> {
        self.frames
            .get(index)
            .cloned()
            .ok_or(MetricError::FrameIndexOutOfRange {
                index,
                total: self.frames.len(),
            })
    }
}

struct Resized {
    inner: Sequence,
    width: usize,
    height: usize,
    filter: ResampleFilter,
}

impl FrameSource for Resized {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn layout(&self) -> PixelLayout {
        self.inner.layout()
    }

    fn frame(&self, index: usize) -> Result<Frame> {
        let mut frame = self.inner.frame(index)?;
        let layout = frame.layout;
        for (i, plane) in frame.planes.iter_mut().enumerate() {
            let (h, w) = layout.plane_dims(i, self.width, self.height);
            let mut resized = resize_plane(plane, h, w, self.filter);
            if !layout.is_float() {
                resized.mapv_inplace(|v| v.clamp(0.0, 1.0));
            }
            *plane = resized;
        }
        Ok(frame)
    }
}

struct Cropped {
    inner: Sequence,
    left: usize,
    top: usize,
    width: usize,
    height: usize,
}

impl FrameSource for Cropped {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn layout(&self) -> PixelLayout {
        self.inner.layout()
    }

    fn frame(&self, index: usize) -> Result<Frame> {
        let mut frame = self.inner.frame(index)?;
        let layout = frame.layout;
        for (i, plane) in frame.planes.iter_mut().enumerate() {
            let (top, left) = if i == 0 || layout.family != ColorFamily::Yuv {
                (self.top, self.left)
            } else {
                (self.top >> layout.subsampling_h, self.left >> layout.subsampling_w)
            };
            let (h, w) = layout.plane_dims(i, self.width, self.height);
            *plane = plane.slice(s![top..top + h, left..left + w]).to_owned();
        }
        Ok(frame)
    }
}

struct SelectEvery {
    inner: Sequence,
    step: usize,
    offset: usize,
    len: usize,
}

impl FrameSource for SelectEvery {
    fn len(&self) -> usize {
        self.len
    }

    fn width(&self) -> usize {
        self.inner.width()
    }

    fn height(&self) -> usize {
        self.inner.height()
    }

    fn layout(&self) -> PixelLayout {
        self.inner.layout()
    }

    fn frame(&self, index: usize) -> Result<Frame> {
        self.inner.frame(index * self.step + self.offset)
    }
}

struct Interleaved {
    inputs: Vec<Sequence>,
}

impl FrameSource for Interleaved {
    fn len(&self) -> usize {
        self.inputs.len() * self.inputs[0].len()
    }

    fn width(&self) -> usize {
        self.inputs[0].width()
    }

    fn height(&self) -> usize {
        self.inputs[0].height()
    }

    fn layout(&self) -> PixelLayout {
        self.inputs[0].layout()
    }

    fn frame(&self, index: usize) -> Result<Frame> {
        let n = self.inputs.len();
        self.inputs[index % n].frame(index / n)
    }
}

type FrameFn = Box<dyn Fn(usize, Frame) -> Result<Frame> + Send + Sync>;

struct Mapped {
    inner: Sequence,
    layout: PixelLayout,
    f: FrameFn,
}

impl FrameSource for Mapped {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn width(&self) -> usize {
        self.inner.width()
    }

    fn height(&self) -> usize {
        self.inner.height()
    }

    fn layout(&self) -> PixelLayout {
        self.layout
    }

    fn frame(&self, index: usize) -> Result<Frame> {
        let frame = self.inner.frame(index)?;
        (self.f)(index, frame)
    }
}
