use std::path::PathBuf;

use framescore_core::compose::Reduction;
use framescore_core::config::{MetricConfig, ScoreConfig};
use framescore_core::metrics::{PsnrWeights, Statistic};

const KINDS: [&str; 15] = [
    "psnr",
    "ssim",
    "gmsd",
    "mdsi",
    "vif",
    "cambi",
    "hash",
    "lbp",
    "glcm",
    "sharpness",
    "blur",
    "svd",
    "stats",
    "compare",
    "edge",
];

#[test]
fn test_every_kind_builds() {
    for kind in KINDS {
        let config = MetricConfig::from_kind(kind).unwrap();
        assert_eq!(config.kind(), kind);
        let metric = config.build();
        assert!(!metric.name().is_empty());
        assert!(!metric.formats().is_empty(), "{kind} accepts nothing");
    }
    assert!(MetricConfig::from_kind("wadiqam").is_none());
}

#[test]
fn test_full_reference_flags() {
    let full: Vec<&str> = KINDS
        .iter()
        .copied()
        .filter(|k| MetricConfig::from_kind(k).unwrap().full_reference())
        .collect();
    assert_eq!(
        full,
        ["psnr", "ssim", "gmsd", "mdsi", "vif", "hash", "compare"]
    );
}

#[test]
fn test_metric_config_from_json() {
    let config: MetricConfig = serde_json::from_str(r#"{"kind":"ssim","plane":1}"#).unwrap();
    match &config {
        MetricConfig::Ssim(ssim) => {
            assert_eq!(ssim.plane, 1);
            assert!(ssim.downsample, "unspecified fields keep defaults");
        }
        other => panic!("expected ssim, got {other:?}"),
    }
    assert_eq!(config.build().name(), "ssim");

    let config: MetricConfig =
        serde_json::from_str(r#"{"kind":"stats","stats":["mean","std_dev"]}"#).unwrap();
    match config {
        MetricConfig::Stats(stats) => {
            assert_eq!(stats.stats, vec![Statistic::Mean, Statistic::StdDev])
        }
        other => panic!("expected stats, got {other:?}"),
    }

    let config: MetricConfig =
        serde_json::from_str(r#"{"kind":"psnr","weights":{"custom":[2.0,1.0,1.0]}}"#).unwrap();
    match config {
        MetricConfig::Psnr(psnr) => {
            assert_eq!(psnr.weights, PsnrWeights::Custom(vec![2.0, 1.0, 1.0]))
        }
        other => panic!("expected psnr, got {other:?}"),
    }
}

#[test]
fn test_unit_kinds_from_json() {
    let config: MetricConfig = serde_json::from_str(r#"{"kind":"vif"}"#).unwrap();
    assert_eq!(config.kind(), "vif");
    let config: MetricConfig = serde_json::from_str(r#"{"kind":"glcm"}"#).unwrap();
    assert_eq!(config.build().name(), "glcm");
}

#[test]
fn test_unknown_kind_is_rejected() {
    assert!(serde_json::from_str::<MetricConfig>(r#"{"kind":"nope"}"#).is_err());
}

#[test]
fn test_score_config_defaults() {
    let config: ScoreConfig = serde_json::from_str(r#"{"reference":"in.ser"}"#).unwrap();
    assert_eq!(config.reference, PathBuf::from("in.ser"));
    assert!(config.distorted.is_none());
    assert_eq!(config.read_ahead, 1);
    assert!(!config.overwrite);
    assert_eq!(config.metric.kind(), "psnr");
    assert!(config.reduction.is_none());
}

#[test]
fn test_score_config_round_trip() {
    let config = ScoreConfig {
        reference: PathBuf::from("ref.ser"),
        distorted: Some(PathBuf::from("dist.ser")),
        read_ahead: 6,
        output: Some(PathBuf::from("out.csv")),
        overwrite: true,
        metric: MetricConfig::from_kind("gmsd").unwrap(),
        reduction: Some(Reduction::Hybrid {
            chunks: 3,
            frame_step: 2,
        }),
    };
    let json = serde_json::to_string(&config).unwrap();
    let back: ScoreConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back.reference, config.reference);
    assert_eq!(back.distorted, config.distorted);
    assert_eq!(back.read_ahead, 6);
    assert_eq!(back.output, config.output);
    assert!(back.overwrite);
    assert_eq!(back.metric.kind(), "gmsd");
    assert_eq!(back.reduction, config.reduction);
}
