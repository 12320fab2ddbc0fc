use std::collections::BTreeMap;
use std::fmt;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{MetricError, Result};

/// Semantic type of a frame's planes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorFamily {
    Gray,
    Yuv,
    Rgb,
    /// A layout the metrics cannot interpret (e.g. a compat/packed format).
    Undefined,
}

impl ColorFamily {
    pub fn num_planes(&self) -> usize {
        match self {
            ColorFamily::Gray => 1,
            ColorFamily::Yuv | ColorFamily::Rgb => 3,
            ColorFamily::Undefined => 0,
        }
    }
}

impl fmt::Display for ColorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorFamily::Gray => write!(f, "Gray"),
            ColorFamily::Yuv => write!(f, "YUV"),
            ColorFamily::Rgb => write!(f, "RGB"),
            ColorFamily::Undefined => write!(f, "Undefined"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleType {
    Integer,
    Float,
}

/// Pixel layout descriptor shared by every frame of a sequence.
///
/// Samples are always stored as normalized `f32` in [0.0, 1.0]; `bits` and
/// `sample_type` record the format the data came from (and the format the
/// metrics validate against).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelLayout {
    pub family: ColorFamily,
    pub sample_type: SampleType,
    pub bits: u8,
    /// log2 horizontal chroma subsampling.
    pub subsampling_w: u8,
    /// log2 vertical chroma subsampling.
    pub subsampling_h: u8,
}

const fn layout(
    family: ColorFamily,
    sample_type: SampleType,
    bits: u8,
    subsampling_w: u8,
    subsampling_h: u8,
) -> PixelLayout {
    PixelLayout {
        family,
        sample_type,
        bits,
        subsampling_w,
        subsampling_h,
    }
}

impl PixelLayout {
    pub const GRAY8: PixelLayout = layout(ColorFamily::Gray, SampleType::Integer, 8, 0, 0);
    pub const GRAY10: PixelLayout = layout(ColorFamily::Gray, SampleType::Integer, 10, 0, 0);
    pub const GRAY12: PixelLayout = layout(ColorFamily::Gray, SampleType::Integer, 12, 0, 0);
    pub const GRAY16: PixelLayout = layout(ColorFamily::Gray, SampleType::Integer, 16, 0, 0);
    pub const GRAYS: PixelLayout = layout(ColorFamily::Gray, SampleType::Float, 32, 0, 0);

    pub const YUV410P8: PixelLayout = layout(ColorFamily::Yuv, SampleType::Integer, 8, 2, 2);
    pub const YUV411P8: PixelLayout = layout(ColorFamily::Yuv, SampleType::Integer, 8, 2, 0);
    pub const YUV420P8: PixelLayout = layout(ColorFamily::Yuv, SampleType::Integer, 8, 1, 1);
    pub const YUV422P8: PixelLayout = layout(ColorFamily::Yuv, SampleType::Integer, 8, 1, 0);
    pub const YUV440P8: PixelLayout = layout(ColorFamily::Yuv, SampleType::Integer, 8, 0, 1);
    pub const YUV444P8: PixelLayout = layout(ColorFamily::Yuv, SampleType::Integer, 8, 0, 0);
    pub const YUV420P10: PixelLayout = layout(ColorFamily::Yuv, SampleType::Integer, 10, 1, 1);
    pub const YUV422P10: PixelLayout = layout(ColorFamily::Yuv, SampleType::Integer, 10, 1, 0);
    pub const YUV444P10: PixelLayout = layout(ColorFamily::Yuv, SampleType::Integer, 10, 0, 0);
    pub const YUV420P12: PixelLayout = layout(ColorFamily::Yuv, SampleType::Integer, 12, 1, 1);
    pub const YUV444P16: PixelLayout = layout(ColorFamily::Yuv, SampleType::Integer, 16, 0, 0);
    pub const YUV420PS: PixelLayout = layout(ColorFamily::Yuv, SampleType::Float, 32, 1, 1);
    pub const YUV422PS: PixelLayout = layout(ColorFamily::Yuv, SampleType::Float, 32, 1, 0);
    pub const YUV444PS: PixelLayout = layout(ColorFamily::Yuv, SampleType::Float, 32, 0, 0);

    pub const RGB24: PixelLayout = layout(ColorFamily::Rgb, SampleType::Integer, 8, 0, 0);
    pub const RGB30: PixelLayout = layout(ColorFamily::Rgb, SampleType::Integer, 10, 0, 0);
    pub const RGB48: PixelLayout = layout(ColorFamily::Rgb, SampleType::Integer, 16, 0, 0);
    pub const RGBS: PixelLayout = layout(ColorFamily::Rgb, SampleType::Float, 32, 0, 0);

    pub const UNDEFINED: PixelLayout = layout(ColorFamily::Undefined, SampleType::Integer, 8, 0, 0);

    pub fn num_planes(&self) -> usize {
        self.family.num_planes()
    }

    pub fn is_float(&self) -> bool {
        self.sample_type == SampleType::Float
    }

    /// Same family and subsampling, different sample format.
    pub fn with_depth(&self, sample_type: SampleType, bits: u8) -> PixelLayout {
        PixelLayout {
            sample_type,
            bits,
            ..*self
        }
    }

    /// Dimensions of plane `plane` for a frame of `width` x `height`.
    pub fn plane_dims(&self, plane: usize, width: usize, height: usize) -> (usize, usize) {
        if plane == 0 || self.family != ColorFamily::Yuv {
            (height, width)
        } else {
            (height >> self.subsampling_h, width >> self.subsampling_w)
        }
    }

    /// Canonical name, e.g. `YUV420P8`, `GRAYS`, `RGB48`.
    pub fn name(&self) -> String {
        match self.family {
            ColorFamily::Gray => match self.sample_type {
                SampleType::Float => "GRAYS".to_string(),
                SampleType::Integer => format!("GRAY{}", self.bits),
            },
            ColorFamily::Yuv => {
                let ss = match (self.subsampling_w, self.subsampling_h) {
                    (0, 0) => "444",
                    (1, 0) => "422",
                    (1, 1) => "420",
                    (0, 1) => "440",
                    (2, 0) => "411",
                    (2, 2) => "410",
                    _ => "4xx",
                };
                match self.sample_type {
                    SampleType::Float => format!("YUV{ss}PS"),
                    SampleType::Integer => format!("YUV{ss}P{}", self.bits),
                }
            }
            ColorFamily::Rgb => match self.sample_type {
                SampleType::Float => "RGBS".to_string(),
                SampleType::Integer => format!("RGB{}", self.bits as u32 * 3),
            },
            ColorFamily::Undefined => "Undefined".to_string(),
        }
    }
}

impl fmt::Display for PixelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// A frame property value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PropValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl PropValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Int(v) => Some(*v as f64),
            PropValue::Float(v) => Some(*v),
            PropValue::Text(_) => None,
        }
    }
}

impl From<f64> for PropValue {
    fn from(v: f64) -> Self {
        PropValue::Float(v)
    }
}

impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        PropValue::Int(v)
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::Text(v.to_string())
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        PropValue::Text(v)
    }
}

pub type Props = BTreeMap<String, PropValue>;

/// A single planar frame.
/// Pixel values are f32 in [0.0, 1.0], one array per plane with shape (height, width).
#[derive(Clone, Debug)]
pub struct Frame {
    pub planes: Vec<Array2<f32>>,
    pub layout: PixelLayout,
    pub props: Props,
}

impl Frame {
    /// Build a frame, checking plane count and chroma plane dimensions.
    pub fn new(planes: Vec<Array2<f32>>, layout: PixelLayout) -> Result<Self> {
        if layout.family != ColorFamily::Undefined && planes.len() != layout.num_planes() {
            return Err(MetricError::InvalidPlanes {
                planes: (0..planes.len()).collect(),
                planes_available: layout.num_planes(),
            });
        }
        let (h, w) = planes.first().map(|p| p.dim()).ok_or(MetricError::InvalidPlanes {
            planes: Vec::new(),
            planes_available: layout.num_planes(),
        })?;
        if h == 0 || w == 0 {
            return Err(MetricError::InvalidDimensions {
                width: w,
                height: h,
            });
        }
        for (i, plane) in planes.iter().enumerate().skip(1) {
            if plane.dim() != layout.plane_dims(i, w, h) {
                return Err(MetricError::InvalidDimensions {
                    width: plane.ncols(),
                    height: plane.nrows(),
                });
            }
        }
        Ok(Self {
            planes,
            layout,
            props: Props::new(),
        })
    }

    /// Single-plane float frame.
    pub fn gray(data: Array2<f32>) -> Self {
        Self {
            planes: vec![data],
            layout: PixelLayout::GRAYS,
            props: Props::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.planes[0].ncols()
    }

    pub fn height(&self) -> usize {
        self.planes[0].nrows()
    }

    pub fn plane(&self, index: usize) -> &Array2<f32> {
        &self.planes[index]
    }

    pub fn prop(&self, key: &str) -> Option<&PropValue> {
        self.props.get(key)
    }

    pub fn set_prop(&mut self, key: impl Into<String>, value: impl Into<PropValue>) {
        self.props.insert(key.into(), value.into());
    }
}
