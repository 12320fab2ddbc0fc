use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::compose::Reduction;
use crate::consts::DEFAULT_READ_AHEAD;
use crate::metrics::{
    Blur, Cambi, CambiParams, Edge, Glcm, Gmsd, LocalBinaryPattern, Mdsi, Metric,
    PerceptualHash, PlaneComparison, PlaneStatistics, Psnr, Sharpness, Ssim, Svd, Vif,
};

/// A metric and its parameters, selected by `kind`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricConfig {
    Psnr(Psnr),
    Ssim(Ssim),
    Gmsd(Gmsd),
    Mdsi(Mdsi),
    Vif,
    Cambi(CambiParams),
    Hash,
    Lbp(LocalBinaryPattern),
    Glcm,
    Sharpness(Sharpness),
    Blur(Blur),
    Svd(Svd),
    Stats(PlaneStatistics),
    Compare(PlaneComparison),
    Edge(Edge),
}

impl Default for MetricConfig {
    fn default() -> Self {
        MetricConfig::Psnr(Psnr::default())
    }
}

impl MetricConfig {
    /// The `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            MetricConfig::Psnr(_) => "psnr",
            MetricConfig::Ssim(_) => "ssim",
            MetricConfig::Gmsd(_) => "gmsd",
            MetricConfig::Mdsi(_) => "mdsi",
            MetricConfig::Vif => "vif",
            MetricConfig::Cambi(_) => "cambi",
            MetricConfig::Hash => "hash",
            MetricConfig::Lbp(_) => "lbp",
            MetricConfig::Glcm => "glcm",
            MetricConfig::Sharpness(_) => "sharpness",
            MetricConfig::Blur(_) => "blur",
            MetricConfig::Svd(_) => "svd",
            MetricConfig::Stats(_) => "stats",
            MetricConfig::Compare(_) => "compare",
            MetricConfig::Edge(_) => "edge",
        }
    }

    /// Default configuration for a `kind` tag.
    pub fn from_kind(kind: &str) -> Option<Self> {
        let config = match kind {
            "psnr" => MetricConfig::Psnr(Psnr::default()),
            "ssim" => MetricConfig::Ssim(Ssim::default()),
            "gmsd" => MetricConfig::Gmsd(Gmsd::default()),
            "mdsi" => MetricConfig::Mdsi(Mdsi::default()),
            "vif" => MetricConfig::Vif,
            "cambi" => MetricConfig::Cambi(CambiParams::default()),
            "hash" => MetricConfig::Hash,
            "lbp" => MetricConfig::Lbp(LocalBinaryPattern::default()),
            "glcm" => MetricConfig::Glcm,
            "sharpness" => MetricConfig::Sharpness(Sharpness::default()),
            "blur" => MetricConfig::Blur(Blur::default()),
            "svd" => MetricConfig::Svd(Svd::default()),
            "stats" => MetricConfig::Stats(PlaneStatistics::default()),
            "compare" => MetricConfig::Compare(PlaneComparison::default()),
            "edge" => MetricConfig::Edge(Edge::default()),
            _ => return None,
        };
        Some(config)
    }

    /// Whether the metric compares two sequences.
    pub fn full_reference(&self) -> bool {
        self.build().requires_reference()
    }

    pub fn build(&self) -> Box<dyn Metric> {
        match self {
            MetricConfig::Psnr(m) => Box::new(m.clone()),
            MetricConfig::Ssim(m) => Box::new(m.clone()),
            MetricConfig::Gmsd(m) => Box::new(m.clone()),
            MetricConfig::Mdsi(m) => Box::new(m.clone()),
            MetricConfig::Vif => Box::new(Vif),
            MetricConfig::Cambi(params) => Box::new(Cambi::new(params.clone())),
            MetricConfig::Hash => Box::new(PerceptualHash),
            MetricConfig::Lbp(m) => Box::new(m.clone()),
            MetricConfig::Glcm => Box::new(Glcm),
            MetricConfig::Sharpness(m) => Box::new(m.clone()),
            MetricConfig::Blur(m) => Box::new(m.clone()),
            MetricConfig::Svd(m) => Box::new(m.clone()),
            MetricConfig::Stats(m) => Box::new(m.clone()),
            MetricConfig::Compare(m) => Box::new(m.clone()),
            MetricConfig::Edge(m) => Box::new(m.clone()),
        }
    }
}

/// One scoring run: inputs, metric, optional reduction and table output.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoreConfig {
    pub reference: PathBuf,
    pub distorted: Option<PathBuf>,
    /// Frames computed ahead of the one being consumed.
    #[serde(default = "default_read_ahead")]
    pub read_ahead: usize,
    /// CSV path for the result table.
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default)]
    pub metric: MetricConfig,
    pub reduction: Option<Reduction>,
}

fn default_read_ahead() -> usize {
    DEFAULT_READ_AHEAD
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            reference: PathBuf::from("reference.ser"),
            distorted: Some(PathBuf::from("distorted.ser")),
            read_ahead: DEFAULT_READ_AHEAD,
            output: Some(PathBuf::from("scores.csv")),
            overwrite: false,
            metric: MetricConfig::default(),
            reduction: None,
        }
    }
}
