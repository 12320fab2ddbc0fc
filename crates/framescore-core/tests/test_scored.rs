#[allow(dead_code)]
mod common;

use std::sync::Arc;

use ndarray::Array2;
use tempfile::TempDir;

use framescore_core::error::MetricError;
use framescore_core::frame::Frame;
use framescore_core::metrics::{BackendMetric, Metric, Psnr, Ssim};
use framescore_core::sequence::Sequence;

use common::{distorted_sequence, gray_sequence, CountingBackend};

#[test]
fn test_table_is_materialized_once() {
    let reference = gray_sequence(32, 32, 6);
    let distorted = distorted_sequence(&reference, 0.05);
    let backend = CountingBackend::default();
    let metric = BackendMetric::new(backend.clone());

    let scored = metric.compute(&reference, Some(&distorted)).unwrap();
    assert_eq!(backend.calls(), 0, "compute must stay lazy");

    let first = scored.table(4).unwrap();
    assert_eq!(backend.calls(), 6);
    let second = scored.table(1).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(backend.calls(), 6);
    assert_eq!(first.columns(), ["counting_mad"]);
    assert_eq!(first.len(), 6);
}

#[test]
fn test_invalidate_recomputes() {
    let reference = gray_sequence(16, 16, 3);
    let distorted = distorted_sequence(&reference, 0.05);
    let backend = CountingBackend::default();
    let scored = BackendMetric::new(backend.clone())
        .compute(&reference, Some(&distorted))
        .unwrap();

    let first = scored.table(2).unwrap();
    scored.invalidate();
    let second = scored.table(2).unwrap();
    assert_eq!(backend.calls(), 6);
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(*first, *second, "deterministic backend must reproduce the table");
}

#[test]
fn test_backend_error_propagates() {
    let frames = (0..4)
        .map(|i| Frame::gray(Array2::from_elem((8, 8), i as f32 * 0.25)))
        .collect();
    let reference = Sequence::from_frames(frames).unwrap();
    let backend = CountingBackend {
        fail_at: Some(0.5),
        ..CountingBackend::default()
    };
    let scored = BackendMetric::new(backend)
        .compute(&reference, Some(&reference))
        .unwrap();

    assert!(scored.primary().frame(1).is_ok());
    match scored.primary().frame(2).unwrap_err() {
        MetricError::Backend(message) => assert!(message.contains("marked")),
        other => panic!("expected Backend error, got {other:?}"),
    }
    assert!(scored.table(2).is_err());
}

#[test]
fn test_unknown_auxiliary_output() {
    let seq = gray_sequence(16, 16, 1);
    let scored = Psnr::default().compute(&seq, Some(&seq)).unwrap();
    assert_eq!(scored.auxiliary_names().count(), 0);
    match scored.auxiliary("map").unwrap_err() {
        MetricError::NoSuchAuxiliaryOutput { metric, name } => {
            assert_eq!(metric, "psnr");
            assert_eq!(name, "map");
        }
        other => panic!("expected NoSuchAuxiliaryOutput, got {other:?}"),
    }
}

#[test]
fn test_auxiliary_frames_carry_scores() {
    let reference = gray_sequence(32, 32, 2);
    let distorted = distorted_sequence(&reference, 0.1);
    let scored = Ssim::default().compute(&reference, Some(&distorted)).unwrap();

    let map = scored.auxiliary("map").unwrap();
    assert_eq!(map.len(), 2);
    let frame = map.frame(1).unwrap();
    let from_map = frame.prop("ssim").and_then(|v| v.as_f64()).unwrap();
    let from_primary = scored
        .primary()
        .frame(1)
        .unwrap()
        .prop("ssim")
        .and_then(|v| v.as_f64())
        .unwrap();
    assert_eq!(from_map, from_primary);
}

#[test]
fn test_primary_frames_keep_distorted_pixels() {
    let reference = gray_sequence(16, 16, 1);
    let distorted = distorted_sequence(&reference, 0.1);
    let scored = Psnr::default().compute(&reference, Some(&distorted)).unwrap();
    let out = scored.primary().frame(0).unwrap();
    assert_eq!(out.plane(0), distorted.frame(0).unwrap().plane(0));
}

#[test]
fn test_write_csv_refuses_existing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scores.csv");
    let seq = gray_sequence(16, 16, 2);
    let scored = Psnr::default().compute(&seq, Some(&seq)).unwrap();

    scored.write_csv(&path, false, 2).unwrap();
    match scored.write_csv(&path, false, 2).unwrap_err() {
        MetricError::FileExists(existing) => assert_eq!(existing, path),
        other => panic!("expected FileExists, got {other:?}"),
    }
    scored.write_csv(&path, true, 2).unwrap();
}

#[test]
fn test_load_or_materialize_reuses_persisted_table() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cached.csv");
    let reference = gray_sequence(16, 16, 4);
    let distorted = distorted_sequence(&reference, 0.05);

    let backend = CountingBackend::default();
    let metric = BackendMetric::new(backend.clone());
    let first = metric
        .compute(&reference, Some(&distorted))
        .unwrap()
        .load_or_materialize(&path, 2)
        .unwrap();
    assert_eq!(backend.calls(), 4);
    assert!(path.exists());

    let second = metric
        .compute(&reference, Some(&distorted))
        .unwrap()
        .load_or_materialize(&path, 2)
        .unwrap();
    assert_eq!(backend.calls(), 4, "persisted table must be reused");
    assert_eq!(first.columns(), second.columns());
    for (a, b) in first.rows().iter().zip(second.rows()) {
        assert!((a[0] - b[0]).abs() < 1e-12);
    }
}

#[test]
fn test_load_or_materialize_rejects_foreign_table() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scores.csv");
    let short = gray_sequence(32, 32, 3);
    Ssim::default()
        .compute(&short, Some(&distorted_sequence(&short, 0.05)))
        .unwrap()
        .write_csv(&path, false, 2)
        .unwrap();
    let persisted = std::fs::read_to_string(&path).unwrap();

    let long = gray_sequence(32, 32, 7);
    let long_distorted = distorted_sequence(&long, 0.05);
    let err = Psnr::default()
        .compute(&long, Some(&long_distorted))
        .unwrap()
        .load_or_materialize(&path, 2)
        .unwrap_err();
    assert!(
        matches!(err, MetricError::TableMismatch { .. }),
        "other metric's columns must not be reused, got {err:?}"
    );

    let err = Ssim::default()
        .compute(&long, Some(&long_distorted))
        .unwrap()
        .load_or_materialize(&path, 2)
        .unwrap_err();
    assert!(
        matches!(err, MetricError::TableMismatch { .. }),
        "a 3-row table must not be reused for 7 frames, got {err:?}"
    );
    assert_eq!(std::fs::read_to_string(&path).unwrap(), persisted);
}

#[test]
fn test_empty_sequence_is_rejected() {
    assert!(matches!(
        Sequence::from_frames(Vec::new()).unwrap_err(),
        MetricError::EmptySequence
    ));
}
