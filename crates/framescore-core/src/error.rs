use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricError {
    #[error("Unsupported format: expected one of [{expected}] but got {actual}")]
    UnsupportedFormat { actual: String, expected: String },

    #[error("{metric} is a full-reference metric and needs a distorted sequence")]
    MissingInput { metric: String },

    #[error("{metric} requires {what}")]
    MissingConfiguration { metric: String, what: String },

    #[error("Invalid color family: {0}")]
    InvalidColorFamily(String),

    #[error("{metric} has no auxiliary output named '{name}'")]
    NoSuchAuxiliaryOutput { metric: String, name: String },

    #[error("Column '{0}' not found in the result table")]
    UnknownColumn(String),

    #[error("File already exists: {}", .0.display())]
    FileExists(PathBuf),

    #[error("Persisted table {} does not match this sequence: {reason}", .path.display())]
    TableMismatch { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid SER file: {0}")]
    InvalidSer(String),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Sequences differ: reference is {reference}, distorted is {distorted}")]
    DimensionMismatch { reference: String, distorted: String },

    #[error("Frame index {index} out of range (total: {total})")]
    FrameIndexOutOfRange { index: usize, total: usize },

    #[error("Invalid planes {planes:?} for a {planes_available}-plane layout")]
    InvalidPlanes {
        planes: Vec<usize>,
        planes_available: usize,
    },

    #[error("Invalid reduction: {0}")]
    InvalidReduction(String),

    #[error("Frame {index} is missing property '{name}'")]
    MissingProperty { index: usize, name: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Scoring backend error: {0}")]
    Backend(String),

    #[error("Failed to parse result table: {0}")]
    Parse(String),

    #[error("Plotting error: {0}")]
    Plot(String),

    #[error("Empty frame sequence")]
    EmptySequence,
}

pub type Result<T> = std::result::Result<T, MetricError>;
