#[allow(dead_code)]
mod common;

use approx::assert_relative_eq;

use framescore_core::compose::{banding_mask, banding_params, compare, Reduction};
use framescore_core::error::MetricError;
use framescore_core::frame::{Frame, PixelLayout};
use framescore_core::metrics::{CambiParams, Psnr};
use framescore_core::sequence::Sequence;

use common::{distorted_sequence, gray_sequence, position_frame, quantize, textured_plane};

fn position_sequence(width: usize, height: usize, frames: usize) -> Sequence {
    let frames = (0..frames)
        .map(|i| {
            let mut frame = position_frame(width, height);
            frame.set_prop("source", i as i64);
            frame
        })
        .collect();
    Sequence::from_frames(frames).unwrap()
}

#[test]
fn test_hybrid_tiles_interleave_row_major() {
    let (w, h) = (640, 360);
    let seq = position_sequence(w, h, 3);
    let reduced = Reduction::Hybrid {
        chunks: 2,
        frame_step: 1,
    }
    .apply(&seq)
    .unwrap();

    assert_eq!(reduced.len(), 12);
    assert_eq!((reduced.width(), reduced.height()), (320, 180));

    let expected_origin = [(0, 0), (0, 320), (180, 0), (180, 320)];
    for k in 0..reduced.len() {
        let frame = reduced.frame(k).unwrap();
        let (row, col) = expected_origin[k % 4];
        let expected = position_frame(w, h).plane(0)[[row, col]];
        assert_eq!(frame.plane(0)[[0, 0]], expected, "tile origin of output frame {k}");
        let source = frame.prop("source").and_then(|v| v.as_f64()).unwrap();
        assert_eq!(source as usize, k / 4);
    }
}

#[test]
fn test_hybrid_frame_step_selects_frames() {
    let seq = position_sequence(640, 360, 5);
    let reduced = Reduction::Hybrid {
        chunks: 2,
        frame_step: 2,
    }
    .apply(&seq)
    .unwrap();
    // frames 0, 2, 4
    assert_eq!(reduced.len(), 12);
    let last = reduced.frame(11).unwrap();
    assert_eq!(last.prop("source").and_then(|v| v.as_f64()), Some(4.0));
}

#[test]
fn test_hybrid_rejects_small_tiles() {
    let seq = position_sequence(600, 360, 1);
    let err = Reduction::Hybrid {
        chunks: 2,
        frame_step: 1,
    }
    .apply(&seq)
    .unwrap_err();
    assert!(matches!(err, MetricError::InvalidReduction(_)));

    let seq = position_sequence(640, 360, 1);
    assert!(Reduction::hybrid().apply(&seq).is_err(), "4 chunks of 640x360 is too many");
}

#[test]
fn test_hybrid_drops_remainder() {
    let seq = position_sequence(645, 363, 1);
    let reduced = Reduction::Hybrid {
        chunks: 2,
        frame_step: 1,
    }
    .apply(&seq)
    .unwrap();
    assert_eq!((reduced.width(), reduced.height()), (322, 181));
    assert_eq!(reduced.len(), 4);
}

#[test]
fn test_hybrid_tiles_follow_chroma_grid() {
    let seq = common::color_sequence(PixelLayout::YUV420PS, 642, 362, 1);
    let reduced = Reduction::Hybrid {
        chunks: 2,
        frame_step: 1,
    }
    .apply(&seq)
    .unwrap();
    assert_eq!((reduced.width(), reduced.height()), (320, 180));
    for k in 0..reduced.len() {
        let frame = reduced.frame(k).unwrap();
        assert_eq!(frame.plane(0).dim(), (180, 320));
        assert_eq!(frame.plane(1).dim(), (90, 160));
    }
}

#[test]
fn test_crop_dimensions() {
    let seq = gray_sequence(640, 360, 2);
    let cropped = Reduction::crop().apply(&seq).unwrap();
    // 80 px each side horizontally, 45 rounded up to 48 vertically
    assert_eq!((cropped.width(), cropped.height()), (480, 264));
    assert_eq!(cropped.len(), 2);

    let original = seq.frame(1).unwrap();
    let frame = cropped.frame(1).unwrap();
    assert_eq!(frame.plane(0)[[0, 0]], original.plane(0)[[48, 80]]);
}

#[test]
fn test_downsample_dimensions() {
    let seq = gray_sequence(640, 360, 1);
    let reduced = Reduction::downsample().apply(&seq).unwrap();
    assert_eq!((reduced.width(), reduced.height()), (320, 180));
    assert_eq!(reduced.frame(0).unwrap().plane(0).dim(), (180, 320));
}

#[test]
fn test_full_percentage_is_rejected() {
    let seq = gray_sequence(64, 64, 1);
    for reduction in [
        Reduction::Crop { percentage: 100 },
        Reduction::Downsample { percentage: 120 },
    ] {
        assert!(matches!(
            reduction.apply(&seq).unwrap_err(),
            MetricError::InvalidReduction(_)
        ));
    }
}

#[test]
fn test_compare_with_reduction() {
    let reference = gray_sequence(640, 360, 2);
    let distorted = distorted_sequence(&reference, 0.05);
    let reduction = Reduction::Hybrid {
        chunks: 2,
        frame_step: 1,
    };
    let scored = compare(&reference, &distorted, &Psnr::default(), Some(&reduction)).unwrap();
    let table = scored.table(4).unwrap();
    assert_eq!(table.len(), 8);
    assert!(table.column("psnr_gray").unwrap().iter().all(|v| v.is_finite()));

    let plain = compare(&reference, &distorted, &Psnr::default(), None).unwrap();
    assert_eq!(plain.table(2).unwrap().len(), 2);
}

#[test]
fn test_compare_checks_pair_before_reducing() {
    let reference = gray_sequence(640, 360, 2);
    let distorted = gray_sequence(640, 360, 3);
    let err = compare(
        &reference,
        &distorted,
        &Psnr::default(),
        Some(&Reduction::crop()),
    )
    .unwrap_err();
    assert!(matches!(err, MetricError::DimensionMismatch { .. }));
}

#[test]
fn test_reduction_serde_defaults() {
    let hybrid: Reduction = serde_json::from_str(r#"{"mode":"hybrid"}"#).unwrap();
    assert_eq!(hybrid, Reduction::hybrid());
    let crop: Reduction = serde_json::from_str(r#"{"mode":"crop","percentage":10}"#).unwrap();
    assert_eq!(crop, Reduction::Crop { percentage: 10 });
    let json = serde_json::to_string(&Reduction::downsample()).unwrap();
    assert_eq!(json, r#"{"mode":"downsample","percentage":50}"#);
}

#[test]
fn test_banding_mask_shape_and_props() {
    let ramp = textured_plane(96, 64, 0.0);
    let frames = (0..2)
        .map(|i| {
            let mut frame = Frame::new(vec![quantize(&ramp, 8)], PixelLayout::GRAY8).unwrap();
            frame.set_prop("source", i as i64);
            frame
        })
        .collect();
    let seq = Sequence::from_frames(frames).unwrap();

    let mask = banding_mask(&seq, 2.0, banding_params()).unwrap();
    assert_eq!(mask.layout(), PixelLayout::GRAYS);
    assert_eq!((mask.width(), mask.height(), mask.len()), (96, 64, 2));

    let frame = mask.frame(1).unwrap();
    assert_eq!(frame.plane(0).dim(), (64, 96));
    assert!(frame.plane(0).iter().all(|v| v.is_finite() && *v >= 0.0));
    assert!(frame.prop("cambi").and_then(|v| v.as_f64()).is_some());
    assert_eq!(frame.prop("source").and_then(|v| v.as_f64()), Some(1.0));
}

#[test]
fn test_banding_mask_flat_is_zero() {
    let plane = quantize(&common::constant_plane(64, 64, 0.5), 8);
    let seq = Sequence::from_frames(vec![Frame::new(vec![plane], PixelLayout::GRAY8).unwrap()])
        .unwrap();
    let frame = banding_mask(&seq, 2.0, CambiParams::default())
        .unwrap()
        .frame(0)
        .unwrap();
    assert!(frame.plane(0).iter().all(|&v| v.abs() < 1e-6));
    assert_relative_eq!(frame.prop("cambi").and_then(|v| v.as_f64()).unwrap(), 0.0);
}

#[test]
fn test_banding_mask_rejects_bad_input() {
    let seq = gray_sequence(32, 32, 1);
    assert!(matches!(
        banding_mask(&seq, 2.0, banding_params()).unwrap_err(),
        MetricError::UnsupportedFormat { .. }
    ));

    let plane = quantize(&textured_plane(32, 32, 0.0), 8);
    let seq = Sequence::from_frames(vec![Frame::new(vec![plane], PixelLayout::GRAY8).unwrap()])
        .unwrap();
    assert!(matches!(
        banding_mask(&seq, 0.0, banding_params()).unwrap_err(),
        MetricError::InvalidParameter(_)
    ));
}

#[test]
fn test_banding_mask_converts_deep_input() {
    let plane = quantize(&textured_plane(32, 32, 0.0), 16);
    let seq = Sequence::from_frames(vec![Frame::new(vec![plane], PixelLayout::GRAY16).unwrap()])
        .unwrap();
    let mask = banding_mask(&seq, 2.0, banding_params()).unwrap();
    assert_eq!(mask.frame(0).unwrap().plane(0).dim(), (32, 32));
}
